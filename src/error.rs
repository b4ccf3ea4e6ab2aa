use std::fmt::{Debug, Display};

/// Crate-wide error type.
///
/// The struct member is private so that errors are constructed through
/// [`Error::new`], which logs them at the appropriate level exactly once at
/// the point of creation.
#[derive(Debug, PartialEq)]
pub struct Error(Box<ErrorDetails>);

impl Error {
    #[must_use]
    pub fn new(details: ErrorDetails) -> Self {
        details.log();
        Error(Box::new(details))
    }

    #[must_use]
    pub fn new_without_logging(details: ErrorDetails) -> Self {
        Error(Box::new(details))
    }

    #[must_use]
    pub fn get_details(&self) -> &ErrorDetails {
        &self.0
    }

    #[must_use]
    pub fn get_owned_details(self) -> ErrorDetails {
        *self.0
    }

    pub fn log(&self) {
        self.0.log();
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl From<ErrorDetails> for Error {
    fn from(details: ErrorDetails) -> Self {
        Error::new(details)
    }
}

impl std::error::Error for Error {}

#[derive(Debug, PartialEq)]
pub enum ErrorDetails {
    Config {
        message: String,
    },
    CorruptExposition {
        message: String,
    },
    DuplicateTest {
        name: String,
    },
    InvalidSampledVariant {
        test_name: String,
        variant: String,
    },
    NoVariantsToSample {
        test_name: String,
    },
    SamplerNotFound {
        name: String,
    },
    ScopeNotFound {
        name: String,
    },
    Storage {
        message: String,
    },
    TestNotFound {
        name: String,
    },
}

impl ErrorDetails {
    /// The tracing level at which this error should be logged.
    pub fn level(&self) -> tracing::Level {
        match self {
            ErrorDetails::Config { .. }
            | ErrorDetails::DuplicateTest { .. }
            | ErrorDetails::SamplerNotFound { .. }
            | ErrorDetails::ScopeNotFound { .. }
            | ErrorDetails::NoVariantsToSample { .. } => tracing::Level::WARN,
            ErrorDetails::TestNotFound { .. } => tracing::Level::DEBUG,
            ErrorDetails::CorruptExposition { .. }
            | ErrorDetails::InvalidSampledVariant { .. }
            | ErrorDetails::Storage { .. } => tracing::Level::ERROR,
        }
    }

    pub fn log(&self) {
        match self.level() {
            tracing::Level::ERROR => tracing::error!("{self}"),
            tracing::Level::WARN => tracing::warn!("{self}"),
            tracing::Level::INFO => tracing::info!("{self}"),
            tracing::Level::DEBUG => tracing::debug!("{self}"),
            tracing::Level::TRACE => tracing::trace!("{self}"),
        }
    }
}

impl Display for ErrorDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorDetails::Config { message } => {
                write!(f, "Configuration error: {message}")
            }
            ErrorDetails::CorruptExposition { message } => {
                write!(f, "Corrupt exposition record: {message}")
            }
            ErrorDetails::DuplicateTest { name } => {
                write!(f, "Test `{name}` is already registered")
            }
            ErrorDetails::InvalidSampledVariant { test_name, variant } => {
                write!(
                    f,
                    "Sampler for test `{test_name}` returned variant `{variant}`, which is not one of the configured variants"
                )
            }
            ErrorDetails::NoVariantsToSample { test_name } => {
                write!(f, "Test `{test_name}` has no variants to sample from")
            }
            ErrorDetails::SamplerNotFound { name } => {
                write!(f, "Sampler `{name}` not found")
            }
            ErrorDetails::ScopeNotFound { name } => {
                write!(f, "Scope `{name}` not found")
            }
            ErrorDetails::Storage { message } => {
                write!(f, "Storage error: {message}")
            }
            ErrorDetails::TestNotFound { name } => {
                write!(f, "Test `{name}` not found")
            }
        }
    }
}
