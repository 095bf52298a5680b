//! Resource trait for declaration graphs
//!
//! A Resource is a typed declaration of something the provisioning backend
//! should create. It knows its logical id, its provider type, and how to
//! render itself into template properties. It never talks to the backend.

use crate::error::Result;
use crate::types::RemovalPolicy;
use serde_json::Value;
use std::fmt;

/// Core trait for declarations
///
/// # Example
///
/// ```ignore
/// use declarative::{Resource, ResourceGraph};
/// use serde_json::{json, Value};
///
/// #[derive(Debug)]
/// struct Topic { id: String }
///
/// impl Resource for Topic {
///     fn logical_id(&self) -> String { self.id.clone() }
///     fn resource_type(&self) -> &'static str { "AWS::SNS::Topic" }
///     fn properties(&self) -> Value { json!({}) }
/// }
///
/// let mut graph = ResourceGraph::new("Demo");
/// let topic = graph.add(&Topic { id: "Alerts".into() })?;
/// ```
pub trait Resource: fmt::Debug {
    /// Logical id, unique within the graph
    fn logical_id(&self) -> String;

    /// Provider resource type (e.g. "AWS::IAM::Role")
    fn resource_type(&self) -> &'static str;

    /// Human-readable description used by listings
    fn description(&self) -> String {
        format!("{} {}", self.resource_type(), self.logical_id())
    }

    /// Template properties
    fn properties(&self) -> Value;

    /// Physical name the backend will match existing resources by, if fixed
    fn physical_name(&self) -> Option<String> {
        None
    }

    /// Explicit teardown behaviour
    fn removal_policy(&self) -> Option<RemovalPolicy> {
        None
    }

    /// Whether the resource holds data and must state its removal policy
    fn is_stateful(&self) -> bool {
        false
    }

    /// Whether the provider type accepts a `Tags` property
    fn is_taggable(&self) -> bool {
        true
    }

    /// Ordering edges not visible in the properties
    fn depends_on(&self) -> Vec<String> {
        Vec::new()
    }

    /// Check the declaration for self-contradicting settings
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}
