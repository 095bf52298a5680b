//! # Declarative
//!
//! Typed declaration graphs for infrastructure.
//!
//! This crate provides the core abstractions for declaring resources once,
//! in a single pass, and handing the result to a provisioning backend as a
//! template. Nothing here contacts the backend.
//!
//! ## Core Concepts
//!
//! - **Resource**: A typed declaration that renders to template properties
//! - **ResourceGraph**: The append-only set of declarations for one unit
//! - **Handle**: Proof that a declaration was added; the only way to reference it
//! - **Template**: The synthesized output, with tags and removal policies applied
//!
//! ## Example
//!
//! ```ignore
//! use declarative::{Environment, Resource, ResourceGraph, StackProps, synthesize};
//! use serde_json::{json, Value};
//!
//! #[derive(Debug)]
//! struct Topic;
//!
//! impl Resource for Topic {
//!     fn logical_id(&self) -> String { "Alerts".into() }
//!     fn resource_type(&self) -> &'static str { "AWS::SNS::Topic" }
//!     fn properties(&self) -> Value { json!({}) }
//! }
//!
//! let env = Environment::resolve(Some("123456789012"), Some("eu-west-1"))?;
//! let props = StackProps::new(env).with_tag("app", "demo");
//!
//! let mut graph = ResourceGraph::new("Demo");
//! graph.add(&Topic)?;
//!
//! let template = synthesize(&graph, &props)?;
//! println!("{}", template.to_json_pretty()?);
//! ```
//!
//! ## Invariants
//!
//! [`ResourceGraph::add`] rejects a declaration when:
//!
//! - it references a logical id that was not declared before it
//! - its logical id, or its physical name within its type, is already taken
//! - it holds state but does not state a removal policy
//! - its own [`Resource::validate`] fails

pub mod context;
pub mod diff;
pub mod error;
pub mod graph;
pub mod resource;
pub mod synth;
pub mod types;

// Re-export main types at crate root
pub use context::{ACCOUNT_VAR, Environment, REGION_VAR, StackProps};
pub use diff::{ChangeKind, DiffSummary, ResourceDiff, compute_diffs, group_by_type};
pub use error::{Error, ErrorCategory, Result};
pub use graph::{Node, ResourceGraph};
pub use resource::Resource;
pub use synth::{Template, TemplateResource, synthesize};
pub use types::{Handle, Output, Parameter, Pseudo, RemovalPolicy, Tags, intrinsic};
