use tokio::sync::mpsc::{self, UnboundedSender};

pub(crate) type Job = Box<dyn FnOnce() + Send + 'static>;

/// FIFO deferral queue backing every callback delivery in the crate.
///
/// One dispatcher task is spawned per registry; notification passes and
/// assignment completions are enqueued as jobs rather than executed inline.
/// This provides the two scheduling guarantees the protocol relies on:
/// callbacks never run during the caller's synchronous burst of registry
/// calls, and jobs run in exactly the order they were enqueued. The task
/// exits once the registry and all of its tests are dropped.
#[derive(Debug, Clone)]
pub(crate) struct Dispatcher {
    sender: UnboundedSender<Job>,
}

impl Dispatcher {
    pub(crate) fn spawn() -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();
        tokio::spawn(async move {
            while let Some(job) = receiver.recv().await {
                job();
            }
            tracing::debug!("dispatcher finished");
        });
        Self { sender }
    }

    pub(crate) fn dispatch(&self, job: Job) {
        // Send only fails when the dispatcher task is gone, which means the
        // owning registry is already being torn down.
        if self.sender.send(job).is_err() {
            tracing::debug!("dropping job dispatched during registry teardown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_jobs_run_in_dispatch_order_after_the_synchronous_burst() {
        let dispatcher = Dispatcher::spawn();
        let order = Arc::new(Mutex::new(Vec::new()));
        let (done_tx, done_rx) = oneshot::channel();

        for i in 0..3 {
            let order = Arc::clone(&order);
            dispatcher.dispatch(Box::new(move || order.lock().unwrap().push(i)));
        }
        dispatcher.dispatch(Box::new(move || {
            let _ = done_tx.send(());
        }));

        // Nothing has run yet: the dispatcher task has not been polled.
        assert!(order.lock().unwrap().is_empty());

        done_rx.await.unwrap();
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_jobs_enqueued_from_inside_a_job_run_afterwards() {
        let dispatcher = Dispatcher::spawn();
        let order = Arc::new(Mutex::new(Vec::new()));
        let (done_tx, done_rx) = oneshot::channel();

        let inner_order = Arc::clone(&order);
        let inner_dispatcher = dispatcher.clone();
        dispatcher.dispatch(Box::new(move || {
            inner_order.lock().unwrap().push("outer");
            let inner_order = Arc::clone(&inner_order);
            inner_dispatcher.dispatch(Box::new(move || {
                inner_order.lock().unwrap().push("inner");
                let _ = done_tx.send(());
            }));
        }));

        done_rx.await.unwrap();
        assert_eq!(*order.lock().unwrap(), vec!["outer", "inner"]);
    }
}
