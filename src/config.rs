use std::collections::HashMap;

use serde::Deserialize;

use crate::error::{Error, ErrorDetails};
use crate::sampler::SamplerChoice;
use crate::scope::ScopeChoice;

/// A fully resolved test declaration, ready to hand to
/// [`Registry::add_test`](crate::Registry::add_test).
///
/// The sampler is mandatory; the type makes omitting it impossible here, and
/// [`UninitializedTestConfig::load`] rejects declarative configurations that
/// leave it out.
#[derive(Debug, Clone)]
pub struct TestConfig {
    pub name: String,
    pub variants: Vec<String>,
    pub weights: Option<HashMap<String, f64>>,
    pub sampler: SamplerChoice,
    pub scope: ScopeChoice,
}

impl TestConfig {
    pub fn new<V, I>(name: impl Into<String>, variants: I, sampler: SamplerChoice) -> Self
    where
        V: Into<String>,
        I: IntoIterator<Item = V>,
    {
        Self {
            name: name.into(),
            variants: variants.into_iter().map(Into::into).collect(),
            weights: None,
            sampler,
            scope: ScopeChoice::Default,
        }
    }

    pub fn with_weights<K, I>(mut self, weights: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, f64)>,
    {
        self.weights = Some(
            weights
                .into_iter()
                .map(|(name, weight)| (name.into(), weight))
                .collect(),
        );
        self
    }

    pub fn with_scope(mut self, scope: ScopeChoice) -> Self {
        self.scope = scope;
        self
    }

    /// Validates the declaration before any capability is exercised.
    pub(crate) fn validate(&self) -> Result<(), Error> {
        if self.name.is_empty() {
            return Err(Error::new(ErrorDetails::Config {
                message: "test name cannot be empty".to_string(),
            }));
        }

        if self.variants.is_empty() && matches!(self.sampler, SamplerChoice::Named(_)) {
            return Err(Error::new(ErrorDetails::Config {
                message: format!(
                    "test `{}` declares no variants; a catalog sampler needs at least one",
                    self.name
                ),
            }));
        }

        let mut seen = std::collections::HashSet::new();
        for variant in &self.variants {
            if !seen.insert(variant.as_str()) {
                return Err(Error::new(ErrorDetails::Config {
                    message: format!(
                        "test `{}` declares duplicate variant `{variant}`",
                        self.name
                    ),
                }));
            }
        }

        if let Some(weights) = &self.weights {
            for (variant, weight) in weights {
                if !self.variants.contains(variant) {
                    return Err(Error::new(ErrorDetails::Config {
                        message: format!(
                            "test `{}` weights variant `{variant}`, which is not one of its variants",
                            self.name
                        ),
                    }));
                }
                if *weight < 0.0 || !weight.is_finite() {
                    return Err(Error::new(ErrorDetails::Config {
                        message: format!(
                            "test `{}` has invalid weight {weight} for variant `{variant}`",
                            self.name
                        ),
                    }));
                }
            }
        }

        Ok(())
    }
}

/// A test declaration as it appears in a configuration file, before names
/// are resolved against the sampler and scope catalogs.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UninitializedTestConfig {
    pub name: String,
    #[serde(default)]
    pub variants: Vec<String>,
    #[serde(default)]
    pub weights: Option<HashMap<String, f64>>,
    #[serde(default)]
    pub sampler: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl UninitializedTestConfig {
    pub fn load(self) -> Result<TestConfig, Error> {
        let Some(sampler) = self.sampler else {
            return Err(Error::new(ErrorDetails::Config {
                message: format!("test `{}`: `sampler` is required", self.name),
            }));
        };

        Ok(TestConfig {
            name: self.name,
            variants: self.variants,
            weights: self.weights,
            sampler: SamplerChoice::Named(sampler),
            scope: match self.scope {
                Some(name) => ScopeChoice::Named(name),
                None => ScopeChoice::Default,
            },
        })
    }
}

/// A whole registry declared in TOML: an optional namespace plus a list of
/// tests.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistryConfig {
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub tests: Vec<UninitializedTestConfig>,
}

impl RegistryConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, Error> {
        toml::from_str(text).map_err(|e| {
            Error::new(ErrorDetails::Config {
                message: format!("failed to parse registry configuration: {e}"),
            })
        })
    }
}
