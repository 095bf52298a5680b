//! Declaration graph - the single-pass, append-only set of declarations

use crate::error::{Error, Result};
use crate::resource::Resource;
use crate::types::{Handle, Output, Parameter, RemovalPolicy, collect_references};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// An immutable declaration record
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub logical_id: String,
    pub resource_type: String,
    pub description: String,
    pub properties: Value,
    pub depends_on: Vec<String>,
    pub removal_policy: Option<RemovalPolicy>,
    pub physical_name: Option<String>,
    pub taggable: bool,
}

/// A deployment unit's declarations, in the order they were added
#[derive(Debug, Clone, Default)]
pub struct ResourceGraph {
    id: String,
    nodes: Vec<Node>,
    index: HashMap<String, usize>,
    names: HashMap<(String, String), String>,
    parameters: BTreeMap<String, Parameter>,
    outputs: BTreeMap<String, Output>,
}

impl ResourceGraph {
    /// Create an empty graph for the unit `id`
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Unit id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Add a declaration.
    ///
    /// The resource is validated, every reference it holds must point at an
    /// earlier declaration or parameter, and its physical name must not be
    /// taken by another resource of the same type.
    pub fn add<R: Resource + ?Sized>(&mut self, resource: &R) -> Result<Handle> {
        let logical_id = resource.logical_id();
        if self.is_declared(&logical_id) {
            return Err(Error::DuplicateLogicalId(logical_id));
        }

        resource.validate()?;

        let resource_type = resource.resource_type();
        let removal_policy = resource.removal_policy();
        if resource.is_stateful() && removal_policy.is_none() {
            return Err(Error::ImplicitRemovalPolicy {
                resource: logical_id,
                resource_type: resource_type.to_string(),
            });
        }

        let properties = resource.properties();
        let depends_on = resource.depends_on();
        let mut targets = BTreeSet::new();
        collect_references(&properties, &mut targets);
        targets.extend(depends_on.iter().cloned());
        if let Some(target) = targets.into_iter().find(|t| !self.is_declared(t)) {
            return Err(Error::UnknownReference {
                from: logical_id,
                target,
            });
        }

        let physical_name = resource.physical_name();
        if let Some(name) = &physical_name {
            let key = (resource_type.to_string(), name.clone());
            if let Some(first) = self.names.get(&key) {
                return Err(Error::NameCollision {
                    resource_type: resource_type.to_string(),
                    name: name.clone(),
                    first: first.clone(),
                    second: logical_id,
                });
            }
            self.names.insert(key, logical_id.clone());
        }

        log::debug!("declare {resource_type} {logical_id}");

        self.index.insert(logical_id.clone(), self.nodes.len());
        self.nodes.push(Node {
            logical_id: logical_id.clone(),
            resource_type: resource_type.to_string(),
            description: resource.description(),
            properties,
            depends_on,
            removal_policy,
            physical_name,
            taggable: resource.is_taggable(),
        });

        Ok(Handle::new(logical_id))
    }

    /// Declare a template parameter
    pub fn add_parameter(&mut self, id: impl Into<String>, parameter: Parameter) -> Result<Handle> {
        let id = id.into();
        if self.is_declared(&id) {
            return Err(Error::DuplicateLogicalId(id));
        }
        log::debug!("declare parameter {id}");
        self.parameters.insert(id.clone(), parameter);
        Ok(Handle::new(id))
    }

    /// Declare an output; its value may only reference declared ids
    pub fn add_output(
        &mut self,
        id: impl Into<String>,
        value: Value,
        description: Option<&str>,
    ) -> Result<()> {
        let id = id.into();
        if self.outputs.contains_key(&id) {
            return Err(Error::DuplicateLogicalId(id));
        }
        let mut targets = BTreeSet::new();
        collect_references(&value, &mut targets);
        if let Some(target) = targets.into_iter().find(|t| !self.is_declared(t)) {
            return Err(Error::UnknownReference { from: id, target });
        }
        self.outputs.insert(
            id,
            Output {
                value,
                description: description.map(str::to_string),
            },
        );
        Ok(())
    }

    /// Whether a resource or parameter with this id exists
    pub fn is_declared(&self, id: &str) -> bool {
        self.index.contains_key(id) || self.parameters.contains_key(id)
    }

    /// Look up a declaration
    pub fn get(&self, id: &str) -> Option<&Node> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    /// Look up the declaration behind a handle
    pub fn node(&self, handle: &Handle) -> Option<&Node> {
        self.get(handle.logical_id())
    }

    /// All declarations, in declaration order
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Declarations of one provider type
    pub fn nodes_of_type<'a>(&'a self, resource_type: &'a str) -> impl Iterator<Item = &'a Node> {
        self.nodes
            .iter()
            .filter(move |n| n.resource_type == resource_type)
    }

    /// Number of declarations of one provider type
    pub fn count_of_type(&self, resource_type: &str) -> usize {
        self.nodes_of_type(resource_type).count()
    }

    pub fn parameters(&self) -> &BTreeMap<String, Parameter> {
        &self.parameters
    }

    pub fn outputs(&self) -> &BTreeMap<String, Output> {
        &self.outputs
    }

    /// Total number of declarations
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if graph is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Declarations matching a target pattern
    ///
    /// Target format: "type" or "type.name", where type is a provider type
    /// or a short service alias ("iam", "ec2", "rds", ...).
    pub fn filter_by_target(&self, target: Option<&str>) -> Vec<&Node> {
        match target {
            None => self.nodes.iter().collect(),
            Some(t) => {
                let (resource_type, name) = parse_target(t);
                self.nodes
                    .iter()
                    .filter(|n| matches_filter(n, resource_type.as_deref(), name.as_deref()))
                    .collect()
            }
        }
    }
}

/// Parse a target string like "type.name" into (type, name)
fn parse_target(target: &str) -> (Option<String>, Option<String>) {
    let parts: Vec<&str> = target.split('.').collect();
    match parts.len() {
        1 => (Some(parts[0].to_string()), None),
        2 => (Some(parts[0].to_string()), Some(parts[1].to_string())),
        _ => (None, Some(target.to_string())),
    }
}

/// Check if a declaration matches the filter criteria
fn matches_filter(node: &Node, resource_type: Option<&str>, name: Option<&str>) -> bool {
    if let Some(rt) = resource_type {
        let rt = rt.to_ascii_lowercase();
        let full = node.resource_type.to_ascii_lowercase();
        // "AWS::EC2::Instance" matches "ec2", "instance" and "aws::ec2::instance"
        let mut segments = full.split("::").skip(1);
        let service = segments.next().unwrap_or_default();
        let kind = segments.next().unwrap_or_default();
        let matches_type = match rt.as_str() {
            "network" => service == "ec2" && kind != "instance" && kind != "securitygroup",
            "database" | "db" => service == "rds",
            _ => full == rt || service == rt || kind == rt,
        };
        if !matches_type {
            return false;
        }
    }

    if let Some(n) = name
        && !node.logical_id.contains(n)
    {
        return false;
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug)]
    struct TestResource {
        id: &'static str,
        kind: &'static str,
        name: Option<&'static str>,
        props: Value,
        stateful: bool,
        removal: Option<RemovalPolicy>,
    }

    impl TestResource {
        fn new(id: &'static str, props: Value) -> Self {
            Self {
                id,
                kind: "AWS::Test::Thing",
                name: None,
                props,
                stateful: false,
                removal: None,
            }
        }
    }

    impl Resource for TestResource {
        fn logical_id(&self) -> String {
            self.id.to_string()
        }

        fn resource_type(&self) -> &'static str {
            self.kind
        }

        fn properties(&self) -> Value {
            self.props.clone()
        }

        fn physical_name(&self) -> Option<String> {
            self.name.map(str::to_string)
        }

        fn removal_policy(&self) -> Option<RemovalPolicy> {
            self.removal
        }

        fn is_stateful(&self) -> bool {
            self.stateful
        }
    }

    #[test]
    fn test_parse_target() {
        assert_eq!(parse_target("iam"), (Some("iam".to_string()), None));
        assert_eq!(
            parse_target("iam.BastionRole"),
            (Some("iam".to_string()), Some("BastionRole".to_string()))
        );
        assert_eq!(parse_target("a.b.c"), (None, Some("a.b.c".to_string())));
    }

    #[test]
    fn test_add_returns_handle() {
        let mut graph = ResourceGraph::new("Unit");
        let a = graph.add(&TestResource::new("A", json!({}))).unwrap();
        assert_eq!(a.logical_id(), "A");
        assert_eq!(graph.len(), 1);
        assert!(graph.node(&a).is_some());
    }

    #[test]
    fn test_reference_must_be_declared_first() {
        let mut graph = ResourceGraph::new("Unit");
        let err = graph
            .add(&TestResource::new("B", json!({ "Target": { "Ref": "A" } })))
            .unwrap_err();
        assert!(matches!(err, Error::UnknownReference { ref target, .. } if target == "A"));
        assert!(graph.is_empty());

        let a = graph.add(&TestResource::new("A", json!({}))).unwrap();
        graph
            .add(&TestResource::new("B", json!({ "Target": a.reference() })))
            .unwrap();
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn test_duplicate_logical_id() {
        let mut graph = ResourceGraph::new("Unit");
        graph.add(&TestResource::new("A", json!({}))).unwrap();
        let err = graph.add(&TestResource::new("A", json!({}))).unwrap_err();
        assert!(matches!(err, Error::DuplicateLogicalId(id) if id == "A"));
    }

    #[test]
    fn test_name_collision() {
        let mut graph = ResourceGraph::new("Unit");
        let mut first = TestResource::new("A", json!({}));
        first.name = Some("shared");
        let mut second = TestResource::new("B", json!({}));
        second.name = Some("shared");
        graph.add(&first).unwrap();
        let err = graph.add(&second).unwrap_err();
        assert!(matches!(err, Error::NameCollision { ref first, .. } if first == "A"));
    }

    #[test]
    fn test_same_name_different_type_is_fine() {
        let mut graph = ResourceGraph::new("Unit");
        let mut first = TestResource::new("A", json!({}));
        first.name = Some("shared");
        let mut second = TestResource::new("B", json!({}));
        second.name = Some("shared");
        second.kind = "AWS::Test::Other";
        graph.add(&first).unwrap();
        graph.add(&second).unwrap();
    }

    #[test]
    fn test_stateful_needs_removal_policy() {
        let mut graph = ResourceGraph::new("Unit");
        let mut logs = TestResource::new("Logs", json!({}));
        logs.stateful = true;
        let err = graph.add(&logs).unwrap_err();
        assert!(matches!(err, Error::ImplicitRemovalPolicy { .. }));

        logs.removal = Some(RemovalPolicy::Destroy);
        graph.add(&logs).unwrap();
    }

    #[test]
    fn test_parameters_are_referenceable() {
        let mut graph = ResourceGraph::new("Unit");
        let image = graph
            .add_parameter(
                "ImageId",
                Parameter {
                    param_type: "String".into(),
                    default: None,
                    description: None,
                },
            )
            .unwrap();
        graph
            .add(&TestResource::new("A", json!({ "ImageId": image.reference() })))
            .unwrap();
    }

    #[test]
    fn test_output_references_checked() {
        let mut graph = ResourceGraph::new("Unit");
        let err = graph
            .add_output("Missing", json!({ "Ref": "Nope" }), None)
            .unwrap_err();
        assert!(matches!(err, Error::UnknownReference { .. }));
    }

    #[test]
    fn test_filter_by_target() {
        let mut graph = ResourceGraph::new("Unit");
        let mut role = TestResource::new("BastionRole", json!({}));
        role.kind = "AWS::IAM::Role";
        let mut vpc = TestResource::new("BastionVpc", json!({}));
        vpc.kind = "AWS::EC2::VPC";
        graph.add(&role).unwrap();
        graph.add(&vpc).unwrap();

        assert_eq!(graph.filter_by_target(None).len(), 2);
        assert_eq!(graph.filter_by_target(Some("iam")).len(), 1);
        assert_eq!(graph.filter_by_target(Some("network")).len(), 1);
        assert_eq!(graph.filter_by_target(Some("ec2.Role")).len(), 0);
        assert_eq!(graph.filter_by_target(Some("role.Bastion")).len(), 1);
    }
}
