//! Template synthesis tests

use pretty_assertions::assert_eq;
use serde_json::Value;
use tempfile::TempDir;

use cognito_playground::gateway::{FunctionName, HANDLER_ENV};
use cognito_playground::infra::{
    HttpApiStack, Stack, TemplateFormat, UserPoolStack, synth,
};

/// Test that the user-pool stack is written as JSON under its stack name
#[test]
fn test_synth_user_pool_json() {
    let dir = TempDir::new().unwrap();
    let stack = UserPoolStack::new("CognitoPlaygroundStack", "demo-playground");

    let path = synth(&stack, dir.path(), TemplateFormat::Json).unwrap();
    assert_eq!(
        path.file_name().unwrap().to_str().unwrap(),
        "CognitoPlaygroundStack.template.json"
    );

    let template: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(template["AWSTemplateFormatVersion"], "2010-09-09");
    assert_eq!(
        template["Resources"]["CognitoUserPool"]["Type"],
        "AWS::Cognito::UserPool"
    );
    assert_eq!(template["Outputs"]["LoginUsername"]["Value"], "user@example.com");
}

/// Test that YAML output parses to the same document as JSON
#[test]
fn test_synth_http_api_yaml() {
    let dir = TempDir::new().unwrap();
    let stack = HttpApiStack::new(
        "AwsLambdaStack",
        "us-east-1_rjf4huGs2",
        vec!["client123".to_string()],
    )
    .unwrap();

    let path = synth(&stack, dir.path().join("nested").as_path(), TemplateFormat::Yaml).unwrap();
    assert!(path.ends_with("nested/AwsLambdaStack.template.yaml"));

    let from_yaml: Value = serde_yaml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    let from_json: Value = serde_json::from_str(&stack.template().unwrap().to_json().unwrap()).unwrap();
    assert_eq!(from_yaml, from_json);
}

/// Test that both stacks pass their own reference check
#[test]
fn test_templates_have_no_dangling_references() {
    let stacks: Vec<Box<dyn Stack>> = vec![
        Box::new(UserPoolStack::new("CognitoPlaygroundStack", "demo")),
        Box::new(HttpApiStack::new("AwsLambdaStack", "us-east-1_x", vec!["c".to_string()]).unwrap()),
    ];
    for stack in &stacks {
        stack.template().unwrap().validate().unwrap();
    }
}

/// Test that every deployed function names a handler the bootstrap binary knows
#[test]
fn test_functions_name_known_handlers() {
    let stack = HttpApiStack::new("AwsLambdaStack", "us-east-1_x", vec!["c".to_string()]).unwrap();
    let template: Value = serde_json::from_str(&stack.template().unwrap().to_json().unwrap()).unwrap();

    let handlers: Vec<FunctionName> = ["PublicFunction", "PrivateFunction"]
        .iter()
        .map(|id| {
            let function = &template["Resources"][*id]["Properties"];
            assert_eq!(function["Handler"], "bootstrap");
            function["Environment"]["Variables"][HANDLER_ENV]
                .as_str()
                .unwrap()
                .parse()
                .unwrap()
        })
        .collect();
    assert_eq!(handlers, vec![FunctionName::Public, FunctionName::Private]);
}
