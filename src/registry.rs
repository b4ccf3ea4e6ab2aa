use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::oneshot;

use crate::config::{RegistryConfig, TestConfig};
use crate::dispatch::Dispatcher;
use crate::error::{Error, ErrorDetails};
use crate::exposition::ExpositionManager;
use crate::sampler::resolve_sampler;
use crate::scope::{first_available_scope, FileScope, MemoryScope, Scope, ScopeChoice};
use crate::subscriber::{Assignment, Subscriber};
use crate::test::Test;

/// The top-level facade: owns the declared tests, relays subscribers that
/// registered before their test existed, and resolves sampler and scope
/// designations against the built-in catalogs.
///
/// A registry is an explicit instance constructed and owned by the embedding
/// application; there is no process-wide shared state. Construction spawns
/// the registry's dispatcher task, so it must happen inside a Tokio runtime.
/// Mutating calls return `&Self` to support chaining.
pub struct Registry {
    namespace: String,
    tests: Mutex<Vec<Arc<Test>>>,
    pending_subscribers: Mutex<Vec<Subscriber>>,
    exposition_manager: Arc<ExpositionManager>,
    scopes: HashMap<String, Arc<dyn Scope>>,
    memory_scope: Arc<dyn Scope>,
    dispatcher: Dispatcher,
}

impl Registry {
    /// A registry under the `default` namespace whose default scope is the
    /// in-memory scope.
    pub fn new() -> Self {
        Self::with_namespace("default")
    }

    pub fn with_namespace(namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        let memory_scope: Arc<dyn Scope> = Arc::new(MemoryScope::new());

        let mut scopes = HashMap::new();
        scopes.insert("memory".to_string(), Arc::clone(&memory_scope));
        scopes.insert("default".to_string(), Arc::clone(&memory_scope));

        Self {
            exposition_manager: Arc::new(ExpositionManager::new(namespace.clone())),
            namespace,
            tests: Mutex::new(Vec::new()),
            pending_subscribers: Mutex::new(Vec::new()),
            scopes,
            memory_scope,
            dispatcher: Dispatcher::spawn(),
        }
    }

    /// A registry whose `device` (and default) scope persists expositions as
    /// JSON under `path`, so assignments survive process restarts. Falls
    /// back to the in-memory scope per test if the path is not writable.
    pub fn with_device_scope(namespace: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        let mut registry = Self::with_namespace(namespace);
        let device: Arc<dyn Scope> = Arc::new(FileScope::new(path));
        registry
            .scopes
            .insert("device".to_string(), Arc::clone(&device));
        registry.scopes.insert("default".to_string(), device);
        registry
    }

    /// Builds a registry from a TOML declaration: namespace plus tests.
    pub fn from_toml_str(text: &str) -> Result<Self, Error> {
        let config = RegistryConfig::from_toml_str(text)?;
        let registry = match config.namespace {
            Some(namespace) => Self::with_namespace(namespace),
            None => Self::new(),
        };
        for test in config.tests {
            registry.add_test(test.load()?)?;
        }
        Ok(registry)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Declares a test.
    ///
    /// Validates the configuration, resolves the sampler and scope
    /// designations (failing fast on unknown names, before any sampler can
    /// run), and immediately relays any subscribers that were queued for
    /// this test name.
    pub fn add_test(&self, config: TestConfig) -> Result<&Self, Error> {
        config.validate()?;

        if self.find_test(&config.name).is_some() {
            return Err(Error::new(ErrorDetails::DuplicateTest { name: config.name }));
        }

        let sampler = resolve_sampler(&config.sampler)?;
        let scope = self.resolve_scope(&config.scope)?;

        let test = Test::new(
            config.name,
            config.variants,
            config.weights,
            sampler,
            scope,
            Arc::clone(&self.exposition_manager),
            self.dispatcher.clone(),
        );

        self.tests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::clone(&test));

        self.relay_pending_subscribers(&test);

        Ok(self)
    }

    /// Declares several tests in order. Not a transaction: an error leaves
    /// the earlier declarations in place.
    pub fn add_tests(&self, configs: impl IntoIterator<Item = TestConfig>) -> Result<&Self, Error> {
        for config in configs {
            self.add_test(config)?;
        }
        Ok(self)
    }

    /// Declares the tests from a TOML document against this registry.
    pub fn add_tests_from_toml(&self, text: &str) -> Result<&Self, Error> {
        let config = RegistryConfig::from_toml_str(text)?;
        for test in config.tests {
            self.add_test(test.load()?)?;
        }
        Ok(self)
    }

    pub fn get_test(&self, name: &str) -> Result<Arc<Test>, Error> {
        self.find_test(name).ok_or_else(|| {
            Error::new(ErrorDetails::TestNotFound {
                name: name.to_string(),
            })
        })
    }

    pub fn get_tests(&self) -> Vec<Arc<Test>> {
        self.tests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Subscribes to a test's assignment, whatever the variant.
    ///
    /// If the test is not declared yet, the subscriber is queued and relayed
    /// once `add_test` declares it. The callback fires at most once, always
    /// deferred, never during the caller's synchronous burst of calls.
    pub fn on(
        &self,
        test_name: &str,
        callback: impl FnOnce(Assignment) + Send + 'static,
    ) -> &Self {
        self.route_subscriber(Subscriber::new(test_name, None, Box::new(callback)));
        self
    }

    /// Subscribes to a test resolving to one specific variant. If another
    /// variant wins, the callback is dropped without firing.
    pub fn on_variant(
        &self,
        test_name: &str,
        variant: &str,
        callback: impl FnOnce(Assignment) + Send + 'static,
    ) -> &Self {
        self.route_subscriber(Subscriber::new(
            test_name,
            Some(variant.to_string()),
            Box::new(callback),
        ));
        self
    }

    /// The future form of [`on`](Self::on): resolves with the assignment
    /// once the test resolves. Yields `None` if the registry is dropped
    /// while the assignment is still pending.
    pub fn when(&self, test_name: &str) -> impl std::future::Future<Output = Option<Assignment>> {
        let (sender, receiver) = oneshot::channel();
        self.on(test_name, move |assignment| {
            let _ = sender.send(assignment);
        });
        async move { receiver.await.ok() }
    }

    /// Deletes every exposition record older than `cutoff` in every declared
    /// test's scope.
    pub fn purge_old_expositions(&self, cutoff: DateTime<Utc>) -> Result<&Self, Error> {
        for test in self.get_tests() {
            test.purge_old_expositions(cutoff)?;
        }
        Ok(self)
    }

    fn find_test(&self, name: &str) -> Option<Arc<Test>> {
        self.tests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|test| test.name() == name)
            .cloned()
    }

    fn route_subscriber(&self, subscriber: Subscriber) {
        match self.find_test(subscriber.test_name()) {
            Some(test) => test.add_subscriber(subscriber),
            None => self
                .pending_subscribers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(subscriber),
        }
    }

    fn relay_pending_subscribers(&self, test: &Arc<Test>) {
        let mut pending = self
            .pending_subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let queued = std::mem::take(&mut *pending);
        let mut unmatched = Vec::new();
        // add_subscriber never re-enters the registry, so the lock can stay
        // held across the relay.
        for subscriber in queued {
            if subscriber.matches_test(test.name()) {
                test.add_subscriber(subscriber);
            } else {
                unmatched.push(subscriber);
            }
        }
        *pending = unmatched;
    }

    /// Resolves a scope designation through the availability fallback chain:
    /// the requested scope first, then the always-available memory scope.
    fn resolve_scope(&self, choice: &ScopeChoice) -> Result<Arc<dyn Scope>, Error> {
        let requested = match choice {
            ScopeChoice::Default => Arc::clone(
                self.scopes
                    .get("default")
                    .unwrap_or(&self.memory_scope),
            ),
            ScopeChoice::Custom(scope) => Arc::clone(scope),
            ScopeChoice::Named(name) => match self.scopes.get(name) {
                Some(scope) => Arc::clone(scope),
                None => {
                    return Err(Error::new(ErrorDetails::ScopeNotFound { name: name.clone() }))
                }
            },
        };
        first_available_scope(vec![requested, Arc::clone(&self.memory_scope)])
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("namespace", &self.namespace)
            .field("tests", &self.get_tests().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::SamplerChoice;

    fn uniform_test(name: &str) -> TestConfig {
        TestConfig::new(name, ["red", "green"], SamplerChoice::named("uniform"))
    }

    #[tokio::test]
    async fn test_add_test_and_get_test_round_trip() {
        let registry = Registry::new();
        registry.add_test(uniform_test("header")).unwrap();

        let test = registry.get_test("header").unwrap();
        assert_eq!(test.name(), "header");
        assert_eq!(test.variants().to_vec(), vec!["red", "green"]);
        assert_eq!(registry.get_tests().len(), 1);
    }

    #[tokio::test]
    async fn test_get_test_fails_for_unknown_names() {
        let registry = Registry::new();
        let err = registry.get_test("header").unwrap_err();
        assert_eq!(
            *err.get_details(),
            ErrorDetails::TestNotFound {
                name: "header".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_duplicate_test_names_are_rejected() {
        let registry = Registry::new();
        registry.add_test(uniform_test("header")).unwrap();
        let err = registry.add_test(uniform_test("header")).unwrap_err();
        assert!(matches!(err.get_details(), ErrorDetails::DuplicateTest { .. }));
    }

    #[tokio::test]
    async fn test_unknown_scope_name_fails_fast() {
        let registry = Registry::new();
        let err = registry
            .add_test(uniform_test("header").with_scope(ScopeChoice::named("doesNotExist")))
            .unwrap_err();
        assert_eq!(
            *err.get_details(),
            ErrorDetails::ScopeNotFound {
                name: "doesNotExist".to_string()
            }
        );
        assert!(registry.get_test("header").is_err());
    }

    #[tokio::test]
    async fn test_unknown_sampler_name_fails_fast() {
        let registry = Registry::new();
        let err = registry
            .add_test(TestConfig::new(
                "header",
                ["red"],
                SamplerChoice::named("doesNotExist"),
            ))
            .unwrap_err();
        assert!(matches!(
            err.get_details(),
            ErrorDetails::SamplerNotFound { .. }
        ));
    }

    #[tokio::test]
    async fn test_add_tests_applies_in_order_and_stops_on_error() {
        let registry = Registry::new();
        let err = registry
            .add_tests([
                uniform_test("first"),
                TestConfig::new("second", ["red"], SamplerChoice::named("doesNotExist")),
                uniform_test("third"),
            ])
            .unwrap_err();
        assert!(matches!(
            err.get_details(),
            ErrorDetails::SamplerNotFound { .. }
        ));
        // Partial application: the first test stays declared, the third was
        // never reached.
        assert!(registry.get_test("first").is_ok());
        assert!(registry.get_test("third").is_err());
    }

    #[tokio::test]
    async fn test_device_scope_is_only_in_the_catalog_when_configured() {
        let registry = Registry::new();
        let err = registry
            .add_test(uniform_test("header").with_scope(ScopeChoice::named("device")))
            .unwrap_err();
        assert!(matches!(err.get_details(), ErrorDetails::ScopeNotFound { .. }));

        let dir = tempfile::tempdir().unwrap();
        let registry =
            Registry::with_device_scope("default", dir.path().join("expositions.json"));
        registry
            .add_test(uniform_test("header").with_scope(ScopeChoice::named("device")))
            .unwrap();
    }

    #[tokio::test]
    async fn test_from_toml_str_declares_namespace_and_tests() {
        let registry = Registry::from_toml_str(
            r#"
            namespace = "checkout"

            [[tests]]
            name = "button-color"
            variants = ["red", "green"]
            sampler = "uniform"
            "#,
        )
        .unwrap();
        assert_eq!(registry.namespace(), "checkout");
        assert!(registry.get_test("button-color").is_ok());
    }

    #[tokio::test]
    async fn test_calls_chain() {
        let registry = Registry::new();
        registry
            .add_test(uniform_test("header"))
            .unwrap()
            .on("header", |_| {})
            .on_variant("header", "red", |_| {})
            .purge_old_expositions(Utc::now())
            .unwrap();
    }
}
