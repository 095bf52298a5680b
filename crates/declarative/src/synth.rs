//! Synthesis - renders a declaration graph into the template handed to the
//! provisioning backend

use crate::context::StackProps;
use crate::error::{Error, Result};
use crate::graph::ResourceGraph;
use crate::types::{Output, Parameter, Tags};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";

/// One resource entry of a template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateResource {
    #[serde(rename = "Type")]
    pub resource_type: String,
    #[serde(rename = "Properties", default, skip_serializing_if = "is_empty_object")]
    pub properties: Value,
    #[serde(rename = "DependsOn", default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(rename = "DeletionPolicy", default, skip_serializing_if = "Option::is_none")]
    pub deletion_policy: Option<String>,
    #[serde(
        rename = "UpdateReplacePolicy",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub update_replace_policy: Option<String>,
}

fn is_empty_object(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// A synthesized template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    #[serde(rename = "AWSTemplateFormatVersion")]
    pub format_version: String,
    #[serde(rename = "Description", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "Parameters", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, Parameter>,
    #[serde(rename = "Resources")]
    pub resources: BTreeMap<String, TemplateResource>,
    #[serde(rename = "Outputs", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, Output>,
}

impl Template {
    /// Load a previously synthesized template
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::TemplateNotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Write the template as pretty JSON
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_json_pretty()?)?;
        Ok(())
    }

    /// Pretty JSON text
    pub fn to_json_pretty(&self) -> Result<String> {
        let mut text = serde_json::to_string_pretty(self)?;
        text.push('\n');
        Ok(text)
    }

    /// Resources of one provider type
    pub fn resources_of_type<'a>(
        &'a self,
        resource_type: &'a str,
    ) -> impl Iterator<Item = (&'a String, &'a TemplateResource)> {
        self.resources
            .iter()
            .filter(move |(_, r)| r.resource_type == resource_type)
    }
}

/// Render a graph into a template.
///
/// Unit tags are merged into the `Tags` of every taggable resource; tags a
/// resource declares itself win over unit tags with the same key.
pub fn synthesize(graph: &ResourceGraph, props: &StackProps) -> Result<Template> {
    let mut resources = BTreeMap::new();

    for node in graph.nodes() {
        let mut properties = node.properties.clone();
        if node.taggable && !props.tags.is_empty() {
            merge_tags(&mut properties, &props.tags);
        }
        let policy = node
            .removal_policy
            .map(|p| p.deletion_policy().to_string());

        resources.insert(
            node.logical_id.clone(),
            TemplateResource {
                resource_type: node.resource_type.clone(),
                properties,
                depends_on: node.depends_on.clone(),
                deletion_policy: policy.clone(),
                update_replace_policy: policy,
            },
        );
    }

    log::info!(
        "synthesized {} with {} resources, {} parameters, {} outputs",
        graph.id(),
        resources.len(),
        graph.parameters().len(),
        graph.outputs().len()
    );

    Ok(Template {
        format_version: TEMPLATE_FORMAT_VERSION.to_string(),
        description: props.description.clone(),
        parameters: graph.parameters().clone(),
        resources,
        outputs: graph.outputs().clone(),
    })
}

fn merge_tags(properties: &mut Value, unit_tags: &Tags) {
    if !properties.is_object() {
        *properties = Value::Object(Map::new());
    }
    let Some(map) = properties.as_object_mut() else {
        return;
    };

    let mut merged: Tags = unit_tags.clone();
    if let Some(Value::Array(existing)) = map.get("Tags") {
        for tag in existing {
            if let (Some(key), Some(value)) = (
                tag.get("Key").and_then(Value::as_str),
                tag.get("Value").and_then(Value::as_str),
            ) {
                merged.insert(key.to_string(), value.to_string());
            }
        }
    }

    let tags: Vec<Value> = merged
        .into_iter()
        .map(|(k, v)| json!({ "Key": k, "Value": v }))
        .collect();
    map.insert("Tags".to_string(), Value::Array(tags));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Environment;
    use crate::resource::Resource;
    use crate::types::RemovalPolicy;

    #[derive(Debug)]
    struct Bucket {
        taggable: bool,
        tags: Vec<(&'static str, &'static str)>,
    }

    impl Resource for Bucket {
        fn logical_id(&self) -> String {
            "Bucket".into()
        }

        fn resource_type(&self) -> &'static str {
            "AWS::S3::Bucket"
        }

        fn properties(&self) -> Value {
            if self.tags.is_empty() {
                json!({ "BucketName": "b" })
            } else {
                let tags: Vec<Value> = self
                    .tags
                    .iter()
                    .map(|(k, v)| json!({ "Key": k, "Value": v }))
                    .collect();
                json!({ "BucketName": "b", "Tags": tags })
            }
        }

        fn removal_policy(&self) -> Option<RemovalPolicy> {
            Some(RemovalPolicy::Destroy)
        }

        fn is_taggable(&self) -> bool {
            self.taggable
        }
    }

    fn props() -> StackProps {
        let env = Environment::resolve(Some("123456789012"), Some("eu-west-1")).unwrap();
        StackProps::new(env).with_tag("app", "tag")
    }

    #[test]
    fn test_synth_applies_tags_and_policies() {
        let mut graph = ResourceGraph::new("Unit");
        graph
            .add(&Bucket {
                taggable: true,
                tags: vec![],
            })
            .unwrap();

        let template = synthesize(&graph, &props()).unwrap();
        let bucket = &template.resources["Bucket"];
        assert_eq!(bucket.deletion_policy.as_deref(), Some("Delete"));
        assert_eq!(bucket.update_replace_policy.as_deref(), Some("Delete"));
        assert_eq!(
            bucket.properties["Tags"],
            json!([{ "Key": "app", "Value": "tag" }])
        );
    }

    #[test]
    fn test_resource_tags_win() {
        let mut graph = ResourceGraph::new("Unit");
        graph
            .add(&Bucket {
                taggable: true,
                tags: vec![("app", "own"), ("Name", "b")],
            })
            .unwrap();

        let template = synthesize(&graph, &props()).unwrap();
        assert_eq!(
            template.resources["Bucket"].properties["Tags"],
            json!([{ "Key": "Name", "Value": "b" }, { "Key": "app", "Value": "own" }])
        );
    }

    #[test]
    fn test_untaggable_left_alone() {
        let mut graph = ResourceGraph::new("Unit");
        graph
            .add(&Bucket {
                taggable: false,
                tags: vec![],
            })
            .unwrap();

        let template = synthesize(&graph, &props()).unwrap();
        assert!(template.resources["Bucket"].properties.get("Tags").is_none());
    }

    #[test]
    fn test_write_and_load() {
        let mut graph = ResourceGraph::new("Unit");
        graph
            .add(&Bucket {
                taggable: true,
                tags: vec![],
            })
            .unwrap();
        let template = synthesize(&graph, &props()).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("Unit.template.json");
        template.write(&path).unwrap();
        let loaded = Template::load(&path).unwrap();
        assert_eq!(loaded, template);
    }

    #[test]
    fn test_load_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = Template::load(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, Error::TemplateNotFound(_)));
    }
}
