//! JSON Utilities for Template Rendering
//!
//! This module provides:
//! - A walker that finds every `Ref` / `Fn::GetAtt` target in a JSON value
//! - Rendering of a [`DeclarationGraph`] into a deployment template document
//! - Pretty-printing of the rendered template
//!
//! All maps are ordered, so rendering the same graph twice yields identical text.
use crate::template::{DeclarationGraph, GraphError};
use serde_json::{Map, Value, json};
use std::collections::{BTreeMap, BTreeSet};

pub const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";

/// Template-level description and metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateMeta {
    pub description: String,
    pub metadata: BTreeMap<String, String>,
}

/// Collects the targets of all `Ref` and `Fn::GetAtt` expressions in `value`.
///
/// Handles both the list form (`["Id", "Attr"]`) and the dotted string form
/// (`"Id.Attr"`) of `Fn::GetAtt`.
pub fn collect_references(value: &Value) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    walk(value, &mut found);
    found
}

fn walk(value: &Value, found: &mut BTreeSet<String>) {
    match value {
        Value::Object(map) => {
            if map.len() == 1 {
                if let Some(Value::String(target)) = map.get("Ref") {
                    found.insert(target.clone());
                    return;
                }
                match map.get("Fn::GetAtt") {
                    Some(Value::Array(parts)) => {
                        if let Some(Value::String(target)) = parts.first() {
                            found.insert(target.clone());
                        }
                        return;
                    }
                    Some(Value::String(dotted)) => {
                        if let Some((target, _)) = dotted.split_once('.') {
                            found.insert(target.to_string());
                        }
                        return;
                    }
                    _ => {}
                }
            }
            for nested in map.values() {
                walk(nested, found);
            }
        }
        Value::Array(items) => {
            for item in items {
                walk(item, found);
            }
        }
        _ => {}
    }
}

/// Renders `graph` as a deployment template.
///
/// # Arguments
/// * `graph` - The frozen declaration graph
/// * `meta` - Description and metadata for the template header
///
/// # Returns
/// The template as a `serde_json::Value`
pub fn render_template(graph: &DeclarationGraph, meta: &TemplateMeta) -> Result<Value, GraphError> {
    let mut resources = Map::new();
    for (id, node) in graph.nodes() {
        let mut entry = serde_json::to_value(&node.resource).map_err(|source| {
            GraphError::Serialize {
                id: id.clone(),
                source,
            }
        })?;
        if let Value::Object(fields) = &mut entry {
            let explicit = graph.explicit_dependencies(id);
            if !explicit.is_empty() {
                fields.insert("DependsOn".to_string(), json!(explicit));
            }
            if let Some(policy) = node.removal_policy {
                let policy = json!(policy);
                fields.insert("DeletionPolicy".to_string(), policy.clone());
                fields.insert("UpdateReplacePolicy".to_string(), policy);
            }
        }
        resources.insert(id.to_string(), entry);
    }

    let mut outputs = Map::new();
    for (id, output) in graph.outputs() {
        let value = serde_json::to_value(output).map_err(|source| GraphError::Serialize {
            id: id.clone(),
            source,
        })?;
        outputs.insert(id.to_string(), value);
    }

    let mut template = Map::new();
    template.insert(
        "AWSTemplateFormatVersion".to_string(),
        json!(TEMPLATE_FORMAT_VERSION),
    );
    if !meta.description.is_empty() {
        template.insert("Description".to_string(), json!(meta.description));
    }
    if !meta.metadata.is_empty() {
        template.insert("Metadata".to_string(), json!(meta.metadata));
    }
    if !graph.parameters().is_empty() {
        template.insert("Parameters".to_string(), json!(graph.parameters()));
    }
    template.insert("Resources".to_string(), Value::Object(resources));
    if !outputs.is_empty() {
        template.insert("Outputs".to_string(), Value::Object(outputs));
    }
    Ok(Value::Object(template))
}

/// Pretty-prints a rendered template with a trailing newline.
pub fn to_pretty_json(template: &Value) -> Result<String, serde_json::Error> {
    let mut text = serde_json::to_string_pretty(template)?;
    text.push('\n');
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfn_resources::{LogGroup, Output, Parameter, RemovalPolicy, Resource, arn_of};
    use crate::intrinsics::Expr;
    use crate::template::StackBuilder;

    #[test]
    fn test_collect_references() {
        let value = json!({
            "A": { "Ref": "First" },
            "B": [{ "Fn::GetAtt": ["Second", "Arn"] }, "literal"],
            "C": { "Fn::GetAtt": "Third.ProviderName" },
            "D": { "Fn::Join": ["", [{ "Ref": "AWS::Region" }, { "Ref": "Fourth" }]] },
            "E": { "Ref": "Fifth", "Other": 1 }
        });
        let found: Vec<String> = collect_references(&value).into_iter().collect();
        assert_eq!(
            found,
            vec!["AWS::Region", "First", "Fourth", "Second", "Third"]
        );
    }

    #[test]
    fn test_collect_references_empty() {
        assert!(collect_references(&json!({ "Name": "x", "List": [1, 2] })).is_empty());
    }

    #[test]
    fn test_render_template_sections() {
        let mut stack = StackBuilder::new();
        stack.parameter("AssetsBucket", Parameter::string("Bucket holding function code"));
        let first = stack
            .add_with_policy(
                "First",
                Resource::LogGroup(LogGroup {
                    log_group_name: Expr::lit("/first"),
                    retention_in_days: 7,
                }),
                RemovalPolicy::Destroy,
            )
            .unwrap();
        let second = stack
            .add(
                "Second",
                Resource::LogGroup(LogGroup {
                    log_group_name: Expr::lit("/second"),
                    retention_in_days: 7,
                }),
            )
            .unwrap();
        stack.depends_on(&second, &first);
        stack
            .output("firstArn", Output::exported(arn_of(&first), "firstArn"))
            .unwrap();
        let graph = stack.build().unwrap();

        let meta = TemplateMeta {
            description: "test".into(),
            metadata: BTreeMap::from([("Environment".to_string(), "dev".to_string())]),
        };
        let template = render_template(&graph, &meta).unwrap();

        assert_eq!(template["AWSTemplateFormatVersion"], json!("2010-09-09"));
        assert_eq!(template["Description"], json!("test"));
        assert_eq!(template["Metadata"]["Environment"], json!("dev"));
        assert_eq!(template["Parameters"]["AssetsBucket"]["Type"], json!("String"));
        assert_eq!(template["Resources"]["First"]["DeletionPolicy"], json!("Delete"));
        assert_eq!(template["Resources"]["First"]["UpdateReplacePolicy"], json!("Delete"));
        assert!(template["Resources"]["First"].get("DependsOn").is_none());
        assert_eq!(template["Resources"]["Second"]["DependsOn"], json!(["First"]));
        assert!(template["Resources"]["Second"].get("DeletionPolicy").is_none());
        assert_eq!(
            template["Outputs"]["firstArn"]["Export"]["Name"],
            json!("firstArn")
        );
    }

    #[test]
    fn test_pretty_json_is_stable() {
        let value = json!({ "b": 1, "a": [true] });
        let first = to_pretty_json(&value).unwrap();
        let second = to_pretty_json(&value).unwrap();
        assert_eq!(first, second);
        assert!(first.ends_with('\n'));
        assert!(first.find("\"a\"").unwrap() < first.find("\"b\"").unwrap());
    }
}
