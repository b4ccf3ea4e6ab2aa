use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorDetails};
use crate::scope::Scope;

/// The document shape persisted through a [`Scope`].
///
/// Namespaces partition experiments sharing one physical storage location, so
/// multiple independent registries can coexist in the same scope without
/// collision.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpositionDocument {
    #[serde(default)]
    namespaces: HashMap<String, BTreeMap<String, ExpositionRecord>>,
}

impl ExpositionDocument {
    pub fn record(&self, namespace: &str, test_name: &str) -> Option<&ExpositionRecord> {
        self.namespaces.get(namespace)?.get(test_name)
    }

    fn namespace_mut(&mut self, namespace: &str) -> &mut BTreeMap<String, ExpositionRecord> {
        self.namespaces.entry(namespace.to_string()).or_default()
    }
}

/// The persisted record of which variant a scope was assigned for a test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpositionRecord {
    variant: String,
    date: ExpositionDate,
}

impl ExpositionRecord {
    pub fn variant(&self) -> &str {
        &self.variant
    }

    /// Normalizes the record's date for comparison.
    ///
    /// Dates round-trip through serialization as RFC 3339 text, so a record
    /// read back from storage may hold either a native timestamp or its
    /// previously serialized string form. Anything else is data corruption.
    pub fn recorded_at(&self) -> Result<DateTime<Utc>, Error> {
        match &self.date {
            ExpositionDate::Timestamp(date) => Ok(*date),
            ExpositionDate::Text(text) => DateTime::parse_from_rfc3339(text)
                .map(|date| date.with_timezone(&Utc))
                .map_err(|e| {
                    Error::new(ErrorDetails::CorruptExposition {
                        message: format!("exposition date `{text}` is not a valid timestamp: {e}"),
                    })
                }),
        }
    }
}

/// Either a native timestamp or a string a previous serialization produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExpositionDate {
    Timestamp(DateTime<Utc>),
    Text(String),
}

/// Reads and writes exposition records inside the namespaced document held by
/// a scope. All operations are parametrized by the bound namespace and an
/// explicit scope.
#[derive(Debug, Clone)]
pub struct ExpositionManager {
    namespace: String,
}

impl ExpositionManager {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns the recorded exposition for `test_name`, or `None` if no
    /// document, no namespace entry, or no test entry exists. Absence is
    /// never an error.
    pub fn get_exposition(
        &self,
        scope: &dyn Scope,
        test_name: &str,
    ) -> Result<Option<ExpositionRecord>, Error> {
        Ok(scope
            .load()?
            .and_then(|document| document.record(&self.namespace, test_name).cloned()))
    }

    /// Records an exposition, first write wins.
    ///
    /// If a record already exists for `(namespace, test_name)` the call keeps
    /// the existing variant, enforcing the never-resample invariant at the
    /// persistence layer as well: two registry instances racing across
    /// process restarts cannot overwrite each other's first assignment.
    pub fn register_exposition(
        &self,
        scope: &dyn Scope,
        test_name: &str,
        variant: &str,
    ) -> Result<(), Error> {
        let mut document = scope.load()?.unwrap_or_default();

        let expositions = document.namespace_mut(&self.namespace);
        if !expositions.contains_key(test_name) {
            expositions.insert(
                test_name.to_string(),
                ExpositionRecord {
                    variant: variant.to_string(),
                    date: ExpositionDate::Timestamp(Utc::now()),
                },
            );
        }

        scope.save(&document)
    }

    /// Deletes every record in the namespace older than `cutoff`.
    pub fn purge_old_expositions(
        &self,
        scope: &dyn Scope,
        cutoff: DateTime<Utc>,
    ) -> Result<(), Error> {
        let Some(mut document) = scope.load()? else {
            return Ok(());
        };
        let Some(expositions) = document.namespaces.get_mut(&self.namespace) else {
            return Ok(());
        };

        let mut stale = Vec::new();
        for (test_name, record) in expositions.iter() {
            if record.recorded_at()? < cutoff {
                stale.push(test_name.clone());
            }
        }
        for test_name in stale {
            expositions.remove(&test_name);
        }

        scope.save(&document)
    }
}
