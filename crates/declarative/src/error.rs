//! Error types for declaration graphs.
//!
//! Every error here is raised while the graph is being built or
//! synthesized, before anything is handed to the provisioning backend.
//! Errors are categorized so callers can tell a bad input apart from a
//! broken reference or a self-contradicting resource.

use std::path::PathBuf;
use thiserror::Error;

/// Categories of construction errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Missing or malformed input (environment, names, config)
    Configuration,
    /// A declaration points at something that was never declared
    Reference,
    /// A declaration asks for two things that cannot both hold
    Policy,
    /// Reading or writing templates failed
    Io,
}

impl ErrorCategory {
    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Configuration => "Configuration error",
            Self::Reference => "Invalid reference",
            Self::Policy => "Contradictory policy",
            Self::Io => "Template I/O error",
        }
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Configuration => "Check the account, region and names in your config",
            Self::Reference => "Declare the referenced resource before the one using it",
            Self::Policy => "Pick one of the conflicting settings on the resource",
            Self::Io => "Check that the template path exists and is readable",
        }
    }
}

/// Errors that can occur while declaring or synthesizing a graph.
#[derive(Debug, Error)]
pub enum Error {
    /// A required environment value is unset
    #[error("missing environment value: {variable} is not set")]
    MissingEnvironment {
        /// Name of the variable (e.g. `CDK_ACCOUNT`)
        variable: &'static str,
    },

    /// An environment value is set but malformed
    #[error("invalid {field} '{value}': {reason}")]
    InvalidEnvironment {
        /// Which field was rejected (account or region)
        field: &'static str,
        /// The rejected value
        value: String,
        /// Why it was rejected
        reason: &'static str,
    },

    /// Two declarations share a logical id
    #[error("duplicate logical id: {0}")]
    DuplicateLogicalId(String),

    /// A declaration references an undeclared resource or parameter
    #[error("{from} references '{target}', which has not been declared")]
    UnknownReference {
        /// Logical id of the declaration holding the reference
        from: String,
        /// The missing target
        target: String,
    },

    /// Two resources of the same type claim the same physical name
    #[error("{resource_type} name '{name}' is used by both {first} and {second}")]
    NameCollision {
        /// CloudFormation resource type
        resource_type: String,
        /// The contested physical name
        name: String,
        /// Logical id declared first
        first: String,
        /// Logical id declared second
        second: String,
    },

    /// A physical name breaks the provider's naming rules
    #[error("invalid {kind} '{name}': {reason}")]
    InvalidName {
        /// What kind of name this is (e.g. "database identifier")
        kind: &'static str,
        /// The rejected name
        name: String,
        /// Which rule it broke
        reason: String,
    },

    /// A property value is outside what the provider accepts
    #[error("{resource}: invalid {property}: {reason}")]
    InvalidProperty {
        /// Logical id of the offending declaration
        resource: String,
        /// Property name
        property: &'static str,
        /// Why it was rejected
        reason: String,
    },

    /// A declaration carries settings that contradict each other
    #[error("{resource}: {detail}")]
    PolicyContradiction {
        /// Logical id of the offending declaration
        resource: String,
        /// What contradicts what
        detail: String,
    },

    /// A stateful resource was declared without a removal policy
    #[error("{resource} ({resource_type}) holds state and needs an explicit removal policy")]
    ImplicitRemovalPolicy {
        /// Logical id of the declaration
        resource: String,
        /// CloudFormation resource type
        resource_type: String,
    },

    /// Template file not found
    #[error("template not found: {}", .0.display())]
    TemplateNotFound(PathBuf),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::MissingEnvironment { .. }
            | Error::InvalidEnvironment { .. }
            | Error::NameCollision { .. }
            | Error::InvalidName { .. }
            | Error::InvalidProperty { .. }
            | Error::DuplicateLogicalId(_) => ErrorCategory::Configuration,
            Error::UnknownReference { .. } => ErrorCategory::Reference,
            Error::PolicyContradiction { .. } | Error::ImplicitRemovalPolicy { .. } => {
                ErrorCategory::Policy
            }
            Error::TemplateNotFound(_) | Error::Io(_) | Error::Json(_) => ErrorCategory::Io,
        }
    }
}

/// Result type for declaration operations.
pub type Result<T> = std::result::Result<T, Error>;
