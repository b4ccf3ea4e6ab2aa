//! Stable experiment variant assignment with persisted exposure records.
//!
//! `cohort` answers one question for the embedding application: *which
//! variant of test X is this scope in?* The answer is drawn once by a
//! pluggable sampler, persisted as an exposition record so repeated lookups
//! stay consistent, and delivered to subscribers asynchronously — whether
//! they registered before or after the test was declared, and before or
//! after the assignment resolved.
//!
//! ```no_run
//! use cohort::{Registry, SamplerChoice, TestConfig};
//!
//! # async fn demo() -> Result<(), cohort::Error> {
//! let registry = Registry::new();
//! registry
//!     .add_test(
//!         TestConfig::new("button-color", ["red", "green"], SamplerChoice::named("weighted"))
//!             .with_weights([("red", 10.0), ("green", 90.0)]),
//!     )?
//!     .on("button-color", |assignment| {
//!         println!("assigned {}", assignment.variant);
//!     });
//!
//! if let Some(assignment) = registry.when("button-color").await {
//!     println!("{} -> {}", assignment.test, assignment.variant);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Construction spawns a per-registry dispatcher task, so a [`Registry`]
//! must be created inside a Tokio runtime. Callbacks never run during the
//! caller's synchronous burst of registry calls, and fire in registration
//! order.

mod config;
mod dispatch;
mod error;
mod exposition;
mod registry;
mod sampler;
mod scope;
mod subscriber;

pub use config::{RegistryConfig, TestConfig, UninitializedTestConfig};
pub use error::{Error, ErrorDetails};
pub use exposition::{ExpositionDate, ExpositionDocument, ExpositionManager, ExpositionRecord};
pub use registry::Registry;
pub use sampler::{
    KeyedSampler, Sampler, SamplerChoice, TestProfile, UniformSampler, WeightedSampler,
};
pub use scope::{FileScope, MemoryScope, Scope, ScopeChoice};
pub use subscriber::Assignment;
pub use test::Test;
