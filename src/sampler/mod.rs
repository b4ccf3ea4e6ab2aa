use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{Error, ErrorDetails};

mod keyed;
mod uniform;
mod weighted;

pub use keyed::KeyedSampler;
pub use uniform::UniformSampler;
pub use weighted::WeightedSampler;

/// The slice of a test a sampler is allowed to see: its name, its variants,
/// and its optional weights. Samplers making cross-test-consistent decisions
/// (e.g. hashing a visitor id together with the test name) draw on all three.
#[derive(Debug, Clone)]
pub struct TestProfile {
    name: String,
    variants: Vec<String>,
    weights: Option<HashMap<String, f64>>,
}

impl TestProfile {
    pub(crate) fn new(
        name: String,
        variants: Vec<String>,
        weights: Option<HashMap<String, f64>>,
    ) -> Self {
        Self {
            name,
            variants,
            weights,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn variants(&self) -> &[String] {
        &self.variants
    }

    pub fn weights(&self) -> Option<&HashMap<String, f64>> {
        self.weights.as_ref()
    }

    pub fn weight_of(&self, variant: &str) -> f64 {
        self.weights
            .as_ref()
            .and_then(|weights| weights.get(variant))
            .copied()
            .unwrap_or(0.0)
    }
}

/// A variant selection policy.
///
/// `sample` must produce exactly one variant per invocation, synchronously or
/// after awaiting; returning a value is the completion signal. When the
/// test's variant list is non-empty, the returned variant must be drawn from
/// it (the caller validates this and rejects foreign variants).
#[async_trait]
pub trait Sampler: Send + Sync {
    async fn sample(&self, test: &TestProfile) -> Result<String, Error>;
}

/// How a test configuration designates its sampler: by catalog name, or as a
/// caller-supplied capability. Resolved once at test declaration time.
#[derive(Clone)]
pub enum SamplerChoice {
    Named(String),
    Custom(Arc<dyn Sampler>),
}

impl SamplerChoice {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    pub fn custom(sampler: impl Sampler + 'static) -> Self {
        Self::Custom(Arc::new(sampler))
    }
}

impl fmt::Debug for dyn Sampler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Sampler")
    }
}

impl fmt::Debug for SamplerChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SamplerChoice::Named(name) => f.debug_tuple("Named").field(name).finish(),
            SamplerChoice::Custom(_) => f.debug_tuple("Custom").field(&"..").finish(),
        }
    }
}

/// Resolves a sampler designation against the built-in catalog.
///
/// `default` matches the reference behavior: weighted selection when the
/// test carries weights, collapsing to uniform selection when it does not.
pub(crate) fn resolve_sampler(choice: &SamplerChoice) -> Result<Arc<dyn Sampler>, Error> {
    match choice {
        SamplerChoice::Custom(sampler) => Ok(Arc::clone(sampler)),
        SamplerChoice::Named(name) => match name.as_str() {
            "uniform" => Ok(Arc::new(UniformSampler)),
            "weighted" | "default" => Ok(Arc::new(WeightedSampler)),
            _ => Err(Error::new(ErrorDetails::SamplerNotFound {
                name: name.clone(),
            })),
        },
    }
}
