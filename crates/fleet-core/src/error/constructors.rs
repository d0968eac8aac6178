//! Constructor methods for FleetError

use super::types::FleetError;

impl FleetError {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: None,
        }
    }

    /// Create a validation error naming the offending field
    pub fn validation_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a lookup error
    pub fn not_found(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }

    /// Create a precondition conflict
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
            context: None,
        }
    }

    /// Create a precondition conflict with context
    pub fn conflict_with_context(message: impl Into<String>, context: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
            context: Some(context.into()),
        }
    }

    /// Create a host error
    pub fn host(message: impl Into<String>) -> Self {
        Self::Host {
            message: message.into(),
            context: None,
        }
    }

    /// Create a host error with context
    pub fn host_with_context(message: impl Into<String>, context: impl Into<String>) -> Self {
        Self::Host {
            message: message.into(),
            context: Some(context.into()),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            context: None,
        }
    }

    /// Create a configuration error with context
    pub fn config_with_context(message: impl Into<String>, context: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            context: Some(context.into()),
        }
    }

    /// Create a generic error
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }
}
