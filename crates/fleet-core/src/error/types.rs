//! Core error types

use fleet_store::StoreError;
use thiserror::Error;

/// Result type alias for coordination operations
pub type FleetResult<T> = Result<T, FleetError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context<C: std::fmt::Display>(self, context: C) -> FleetResult<T>;

    /// Add context lazily (only evaluated on error)
    fn with_context<C: std::fmt::Display, F: FnOnce() -> C>(self, f: F) -> FleetResult<T>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for Result<T, E> {
    fn context<C: std::fmt::Display>(self, context: C) -> FleetResult<T> {
        self.map_err(|e| FleetError::other(format!("{}: {}", context, e)))
    }

    fn with_context<C: std::fmt::Display, F: FnOnce() -> C>(self, f: F) -> FleetResult<T> {
        self.map_err(|e| FleetError::other(format!("{}: {}", f(), e)))
    }
}

/// Extension trait for turning missing values into lookup errors
pub trait OptionExt<T> {
    /// Convert `None` into a `NotFound` error for the given resource
    fn or_not_found(self, resource_type: &str, id: &str) -> FleetResult<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn or_not_found(self, resource_type: &str, id: &str) -> FleetResult<T> {
        self.ok_or_else(|| FleetError::not_found(resource_type, id))
    }
}

/// Main error type for the coordination engine
///
/// Environment drift (dead panes, missing sessions) is never an error; it is
/// reported as doctor findings instead.
#[derive(Error, Debug)]
pub enum FleetError {
    /// Malformed identifiers or arguments
    #[error("Invalid input: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    /// Unknown team, member, task or message
    #[error("{resource_type} not found: {id}")]
    NotFound { resource_type: String, id: String },

    /// Precondition rejection, usually overridable with force
    #[error("{message}")]
    Conflict {
        message: String,
        context: Option<String>,
    },

    /// Process host (multiplexer, signals) failures
    #[error("Host error: {message}")]
    Host {
        message: String,
        context: Option<String>,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        context: Option<String>,
    },

    /// Storage/persistence errors
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    /// Generic error with context
    #[error("Error: {message}")]
    Other { message: String },
}

impl FleetError {
    /// Stable code for programmatic handling
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "FLEET_VALIDATION",
            Self::NotFound { .. } => "FLEET_NOT_FOUND",
            Self::Conflict { .. } => "FLEET_CONFLICT",
            Self::Host { .. } => "FLEET_HOST",
            Self::Config { .. } => "FLEET_CONFIG",
            Self::Storage(_) => "FLEET_STORAGE",
            Self::Other { .. } => "FLEET_OTHER",
        }
    }

    /// Whether a force flag could override this rejection
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

impl From<serde_json::Error> for FleetError {
    fn from(e: serde_json::Error) -> Self {
        Self::Storage(StoreError::Serialization(e))
    }
}

impl From<std::io::Error> for FleetError {
    fn from(e: std::io::Error) -> Self {
        Self::Storage(StoreError::Io(e))
    }
}
