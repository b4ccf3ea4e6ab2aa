use std::fmt;

/// The event delivered to a subscriber callback once its test resolves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub test: String,
    pub variant: String,
}

pub(crate) type Callback = Box<dyn FnOnce(Assignment) + Send + 'static>;

/// A registered interest in a test's assignment: fire at most once, then
/// discarded. A subscriber whose variant filter does not match the resolved
/// variant is dropped without firing.
pub(crate) struct Subscriber {
    test: String,
    variant: Option<String>,
    callback: Callback,
}

impl Subscriber {
    pub(crate) fn new(test: impl Into<String>, variant: Option<String>, callback: Callback) -> Self {
        Self {
            test: test.into(),
            variant,
            callback,
        }
    }

    pub(crate) fn test_name(&self) -> &str {
        &self.test
    }

    pub(crate) fn matches_test(&self, test_name: &str) -> bool {
        self.test == test_name
    }

    /// An absent variant filter matches unconditionally.
    pub(crate) fn matches_test_and_variant(&self, test_name: &str, variant: &str) -> bool {
        if !self.matches_test(test_name) {
            return false;
        }
        match &self.variant {
            Some(filter) => filter == variant,
            None => true,
        }
    }

    pub(crate) fn notify(self, assignment: Assignment) {
        (self.callback)(assignment);
    }
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("test", &self.test)
            .field("variant", &self.variant)
            .finish_non_exhaustive()
    }
}
