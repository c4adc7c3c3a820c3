//! CloudFormation template model

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{Error, Result};

const FORMAT_VERSION: &str = "2010-09-09";

/// A CloudFormation template
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Template {
    /// Always `2010-09-09`
    #[serde(rename = "AWSTemplateFormatVersion")]
    pub format_version: String,
    /// Free-text description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Deploy-time inputs
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, Parameter>,
    /// Resources by logical id
    pub resources: BTreeMap<String, Resource>,
    /// Stack outputs
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, Output>,
}

/// A template parameter
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Parameter {
    /// Parameter type, e.g. `String`
    #[serde(rename = "Type")]
    pub kind: String,
    /// Description shown by the console
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Default value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl Parameter {
    /// A `String` parameter
    #[must_use]
    pub fn string(description: &str) -> Self {
        Self {
            kind: "String".to_string(),
            description: Some(description.to_string()),
            default: None,
        }
    }
}

/// What happens to a resource when it leaves the stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeletionPolicy {
    /// Delete it
    Delete,
    /// Keep it
    Retain,
    /// Snapshot, then delete
    Snapshot,
}

/// A template resource
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Resource {
    /// Resource type, e.g. `AWS::Cognito::UserPool`
    #[serde(rename = "Type")]
    pub kind: String,
    /// Resource properties
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub properties: Value,
    /// Logical ids this resource waits for
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    /// Deletion policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_policy: Option<DeletionPolicy>,
    /// Replacement policy, kept in step with the deletion policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_replace_policy: Option<DeletionPolicy>,
}

impl Resource {
    /// A resource of the given type
    #[must_use]
    pub fn new(kind: &str, properties: Value) -> Self {
        Self {
            kind: kind.to_string(),
            properties,
            depends_on: Vec::new(),
            deletion_policy: None,
            update_replace_policy: None,
        }
    }

    /// Wait for another resource
    #[must_use]
    pub fn depends_on(mut self, logical_id: &str) -> Self {
        self.depends_on.push(logical_id.to_string());
        self
    }

    /// Set both the deletion and the update-replace policy
    #[must_use]
    pub fn removal_policy(mut self, policy: DeletionPolicy) -> Self {
        self.deletion_policy = Some(policy);
        self.update_replace_policy = Some(policy);
        self
    }
}

/// A stack output
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Output {
    /// Output value
    pub value: Value,
    /// Description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Output {
    /// An output with the given value
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self {
            value,
            description: None,
        }
    }
}

/// `{ "Ref": id }`
#[must_use]
pub fn reference(logical_id: &str) -> Value {
    json!({ "Ref": logical_id })
}

/// `{ "Fn::GetAtt": [id, attribute] }`
#[must_use]
pub fn get_att(logical_id: &str, attribute: &str) -> Value {
    json!({ "Fn::GetAtt": [logical_id, attribute] })
}

/// `{ "Fn::Join": [delimiter, parts] }`
#[must_use]
pub fn join(delimiter: &str, parts: Vec<Value>) -> Value {
    json!({ "Fn::Join": [delimiter, parts] })
}

/// `{ "Fn::Sub": template }`
#[must_use]
pub fn sub(template: &str) -> Value {
    json!({ "Fn::Sub": template })
}

/// Output format of a synthesized template
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum TemplateFormat {
    /// JSON
    #[default]
    Json,
    /// YAML
    Yaml,
}

impl TemplateFormat {
    /// File extension
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
        }
    }
}

impl Default for Template {
    fn default() -> Self {
        Self {
            format_version: FORMAT_VERSION.to_string(),
            description: None,
            parameters: BTreeMap::new(),
            resources: BTreeMap::new(),
            outputs: BTreeMap::new(),
        }
    }
}

impl Template {
    /// An empty template
    #[must_use]
    pub fn new(description: &str) -> Self {
        Self {
            description: Some(description.to_string()),
            ..Self::default()
        }
    }

    /// Add a parameter
    pub fn add_parameter(&mut self, name: &str, parameter: Parameter) -> Result<()> {
        if self.parameters.contains_key(name) || self.resources.contains_key(name) {
            return Err(Error::Config(format!("Duplicate logical id: {name}")));
        }
        self.parameters.insert(name.to_string(), parameter);
        Ok(())
    }

    /// Add a resource
    pub fn add_resource(&mut self, logical_id: &str, resource: Resource) -> Result<()> {
        if self.resources.contains_key(logical_id) || self.parameters.contains_key(logical_id) {
            return Err(Error::Config(format!("Duplicate logical id: {logical_id}")));
        }
        self.resources.insert(logical_id.to_string(), resource);
        Ok(())
    }

    /// Add an output
    pub fn add_output(&mut self, name: &str, output: Output) {
        self.outputs.insert(name.to_string(), output);
    }

    /// Check that every `Ref`, `Fn::GetAtt`, `Fn::Sub` variable and
    /// `DependsOn` names something in the template.
    pub fn validate(&self) -> Result<()> {
        let mut dangling = BTreeSet::new();

        for (id, resource) in &self.resources {
            for dep in &resource.depends_on {
                if !self.resources.contains_key(dep) {
                    dangling.insert(format!("{id} DependsOn {dep}"));
                }
            }
            self.collect_dangling(id, &resource.properties, &mut dangling);
        }
        for (name, output) in &self.outputs {
            self.collect_dangling(name, &output.value, &mut dangling);
        }

        if dangling.is_empty() {
            Ok(())
        } else {
            Err(Error::Config(format!(
                "Template has dangling references: {}",
                dangling.into_iter().collect::<Vec<_>>().join(", ")
            )))
        }
    }

    fn defines(&self, name: &str) -> bool {
        name.starts_with("AWS::")
            || self.resources.contains_key(name)
            || self.parameters.contains_key(name)
    }

    fn collect_dangling(&self, owner: &str, value: &Value, dangling: &mut BTreeSet<String>) {
        match value {
            Value::Object(map) => {
                if let Some(Value::String(target)) = map.get("Ref") {
                    if !self.defines(target) {
                        dangling.insert(format!("{owner} -> Ref {target}"));
                    }
                }
                if let Some(Value::Array(args)) = map.get("Fn::GetAtt") {
                    if let Some(Value::String(target)) = args.first() {
                        if !self.resources.contains_key(target) {
                            dangling.insert(format!("{owner} -> GetAtt {target}"));
                        }
                    }
                }
                if let Some(Value::String(template)) = map.get("Fn::Sub") {
                    for var in sub_variables(template) {
                        let target = var.split_once('.').map_or(var, |(id, _)| id);
                        if !self.defines(target) {
                            dangling.insert(format!("{owner} -> Sub {var}"));
                        }
                    }
                }
                for nested in map.values() {
                    self.collect_dangling(owner, nested, dangling);
                }
            }
            Value::Array(items) => {
                for item in items {
                    self.collect_dangling(owner, item, dangling);
                }
            }
            _ => {}
        }
    }

    /// Pretty JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// YAML
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Render in the given format
    pub fn render(&self, format: TemplateFormat) -> Result<String> {
        match format {
            TemplateFormat::Json => self.to_json(),
            TemplateFormat::Yaml => self.to_yaml(),
        }
    }
}

/// `${Name}` and `${Name.Attr}` variables of a `Fn::Sub` string; `${!Literal}` is skipped
fn sub_variables(template: &str) -> Vec<&str> {
    let mut vars = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else { break };
        let var = &after[..end];
        if !var.starts_with('!') {
            vars.push(var);
        }
        rest = &after[end + 1..];
    }
    vars
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn template() -> Template {
        let mut t = Template::new("test");
        t.add_parameter("Bucket", Parameter::string("code bucket")).unwrap();
        t.add_resource("Pool", Resource::new("AWS::Cognito::UserPool", json!({})))
            .unwrap();
        t.add_resource(
            "Client",
            Resource::new("AWS::Cognito::UserPoolClient", json!({ "UserPoolId": reference("Pool") }))
                .depends_on("Pool"),
        )
        .unwrap();
        t.add_output("PoolArn", Output::new(get_att("Pool", "Arn")));
        t
    }

    #[test]
    fn intrinsics_have_the_cloudformation_shape() {
        assert_eq!(reference("X"), json!({ "Ref": "X" }));
        assert_eq!(get_att("X", "Arn"), json!({ "Fn::GetAtt": ["X", "Arn"] }));
        assert_eq!(
            join("", vec![json!("a"), reference("X")]),
            json!({ "Fn::Join": ["", ["a", { "Ref": "X" }]] })
        );
        assert_eq!(sub("${X}"), json!({ "Fn::Sub": "${X}" }));
    }

    #[test]
    fn serializes_with_cloudformation_keys() {
        let value = serde_json::to_value(template()).unwrap();
        assert_eq!(value["AWSTemplateFormatVersion"], "2010-09-09");
        assert_eq!(value["Resources"]["Client"]["Type"], "AWS::Cognito::UserPoolClient");
        assert_eq!(value["Resources"]["Client"]["DependsOn"], json!(["Pool"]));
        assert_eq!(value["Parameters"]["Bucket"]["Type"], "String");
        assert!(value["Resources"]["Pool"].get("DependsOn").is_none());
    }

    #[test]
    fn removal_policy_sets_both_policies() {
        let value = serde_json::to_value(
            Resource::new("AWS::Cognito::UserPool", json!({})).removal_policy(DeletionPolicy::Delete),
        )
        .unwrap();
        assert_eq!(value["DeletionPolicy"], "Delete");
        assert_eq!(value["UpdateReplacePolicy"], "Delete");
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut t = template();
        assert!(t.add_resource("Pool", Resource::new("AWS::S3::Bucket", json!({}))).is_err());
        assert!(t.add_parameter("Pool", Parameter::string("clash")).is_err());
    }

    #[test]
    fn complete_template_validates() {
        template().validate().unwrap();
    }

    #[test]
    fn dangling_references_are_reported() {
        let mut t = template();
        t.add_output("Bad", Output::new(sub("https://${Missing}.${AWS::Region}/${Pool.Arn}")));
        t.add_resource("Orphan", Resource::new("AWS::S3::Bucket", json!({})).depends_on("Ghost"))
            .unwrap();
        let err = t.validate().unwrap_err().to_string();
        assert!(err.contains("Missing"));
        assert!(err.contains("Ghost"));
        assert!(!err.contains("AWS::Region"));
    }

    #[test]
    fn sub_variables_skip_literals() {
        assert_eq!(
            sub_variables("${A}-${!Literal}-${B.Arn}-${AWS::Region}"),
            vec!["A", "B.Arn", "AWS::Region"]
        );
    }

    #[test]
    fn yaml_and_json_agree() {
        let t = template();
        let from_yaml: Value = serde_yaml::from_str(&t.to_yaml().unwrap()).unwrap();
        let from_json: Value = serde_json::from_str(&t.to_json().unwrap()).unwrap();
        assert_eq!(from_yaml, from_json);
    }
}
