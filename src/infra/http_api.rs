//! HTTP API with a user-pool JWT authorizer in front of the function pair

use serde_json::{Value, json};

use super::Stack;
use super::template::{Output, Parameter, Resource, Template, get_att, join, reference, sub};
use crate::gateway::FunctionName;
use crate::gateway::functions::HANDLER_ENV;
use crate::{Error, Result};

const API: &str = "HttpApi";
const STAGE: &str = "HttpApiDefaultStage";
const AUTHORIZER: &str = "Authorizer";
const CODE_BUCKET: &str = "FunctionCodeBucket";
const CODE_KEY: &str = "FunctionCodeKey";

/// One routed function
struct RouteSpec {
    prefix: &'static str,
    path: &'static str,
    function: FunctionName,
    authorized: bool,
}

const ROUTES: [RouteSpec; 2] = [
    RouteSpec {
        prefix: "Private",
        path: "/private",
        function: FunctionName::Private,
        authorized: true,
    },
    RouteSpec {
        prefix: "Public",
        path: "/public",
        function: FunctionName::Public,
        authorized: false,
    },
];

/// The serverless API stack, bound to an already deployed user pool
#[derive(Debug, Clone)]
pub struct HttpApiStack {
    name: String,
    user_pool_id: String,
    client_ids: Vec<String>,
}

impl HttpApiStack {
    /// A stack whose authorizer trusts `user_pool_id` tokens issued to `client_ids`
    pub fn new(
        name: impl Into<String>,
        user_pool_id: impl Into<String>,
        client_ids: Vec<String>,
    ) -> Result<Self> {
        let user_pool_id = user_pool_id.into();
        if user_pool_id.is_empty() {
            return Err(Error::Config(
                "The HTTP API stack needs a user pool id".to_string(),
            ));
        }
        if client_ids.is_empty() {
            return Err(Error::Config(
                "The HTTP API stack needs at least one app client id".to_string(),
            ));
        }
        Ok(Self {
            name: name.into(),
            user_pool_id,
            client_ids,
        })
    }

    fn api(&self) -> Resource {
        Resource::new(
            "AWS::ApiGatewayV2::Api",
            json!({ "Name": self.name, "ProtocolType": "HTTP" }),
        )
    }

    fn stage() -> Resource {
        Resource::new(
            "AWS::ApiGatewayV2::Stage",
            json!({
                "ApiId": reference(API),
                "StageName": "$default",
                "AutoDeploy": true,
            }),
        )
    }

    fn authorizer(&self) -> Resource {
        Resource::new(
            "AWS::ApiGatewayV2::Authorizer",
            json!({
                "ApiId": reference(API),
                "AuthorizerType": "JWT",
                "Name": AUTHORIZER,
                "IdentitySource": ["$request.header.Authorization"],
                "JwtConfiguration": {
                    "Audience": self.client_ids,
                    "Issuer": sub(&format!(
                        "https://cognito-idp.${{AWS::Region}}.amazonaws.com/{}",
                        self.user_pool_id
                    )),
                },
            }),
        )
    }

    fn function_role() -> Resource {
        Resource::new(
            "AWS::IAM::Role",
            json!({
                "AssumeRolePolicyDocument": {
                    "Version": "2012-10-17",
                    "Statement": [{
                        "Effect": "Allow",
                        "Principal": { "Service": "lambda.amazonaws.com" },
                        "Action": "sts:AssumeRole",
                    }],
                },
                "ManagedPolicyArns": [
                    sub("arn:${AWS::Partition}:iam::aws:policy/service-role/AWSLambdaBasicExecutionRole"),
                ],
            }),
        )
    }

    fn function(role: &str, handler: FunctionName) -> Resource {
        Resource::new(
            "AWS::Lambda::Function",
            json!({
                "Code": {
                    "S3Bucket": reference(CODE_BUCKET),
                    "S3Key": reference(CODE_KEY),
                },
                "Handler": "bootstrap",
                "Runtime": "provided.al2023",
                "Role": get_att(role, "Arn"),
                "Environment": { "Variables": { HANDLER_ENV: handler.as_str() } },
            }),
        )
        .depends_on(role)
    }

    fn integration(function: &str) -> Resource {
        Resource::new(
            "AWS::ApiGatewayV2::Integration",
            json!({
                "ApiId": reference(API),
                "IntegrationType": "AWS_PROXY",
                "IntegrationUri": get_att(function, "Arn"),
                "PayloadFormatVersion": "2.0",
            }),
        )
    }

    fn route(def: &RouteSpec, integration: &str) -> Resource {
        let authorization_type = if def.authorized { "JWT" } else { "NONE" };
        let mut properties = json!({
            "ApiId": reference(API),
            "RouteKey": format!("GET {}", def.path),
            "Target": join("", vec![json!("integrations/"), reference(integration)]),
            "AuthorizationType": authorization_type,
        });
        if def.authorized {
            if let Value::Object(map) = &mut properties {
                map.insert("AuthorizerId".to_string(), reference(AUTHORIZER));
            }
        }
        Resource::new("AWS::ApiGatewayV2::Route", properties)
    }

    fn invoke_permission(def: &RouteSpec, function: &str) -> Resource {
        Resource::new(
            "AWS::Lambda::Permission",
            json!({
                "Action": "lambda:InvokeFunction",
                "FunctionName": get_att(function, "Arn"),
                "Principal": "apigateway.amazonaws.com",
                "SourceArn": sub(&format!(
                    "arn:${{AWS::Partition}}:execute-api:${{AWS::Region}}:${{AWS::AccountId}}:${{{API}}}/*/*{}",
                    def.path
                )),
            }),
        )
    }
}

impl Stack for HttpApiStack {
    fn name(&self) -> &str {
        &self.name
    }

    fn template(&self) -> Result<Template> {
        let mut t = Template::new("HTTP API with a Cognito JWT authorizer and two functions");

        t.add_parameter(CODE_BUCKET, Parameter::string("S3 bucket holding the function bundle"))?;
        t.add_parameter(CODE_KEY, Parameter::string("S3 key of the function bundle"))?;

        t.add_resource(API, self.api())?;
        t.add_resource(STAGE, Self::stage())?;
        t.add_resource(AUTHORIZER, self.authorizer())?;

        for def in &ROUTES {
            let role = format!("{}FunctionServiceRole", def.prefix);
            let function = format!("{}Function", def.prefix);
            let integration = format!("{}FnIntegration", def.prefix);

            t.add_resource(&role, Self::function_role())?;
            t.add_resource(&function, Self::function(&role, def.function))?;
            t.add_resource(&integration, Self::integration(&function))?;
            t.add_resource(&format!("{}Route", def.prefix), Self::route(def, &integration))?;
            t.add_resource(
                &format!("{}InvokePermission", def.prefix),
                Self::invoke_permission(def, &function),
            )?;
        }

        t.add_output(
            "ApiUrl",
            Output::new(sub(&format!(
                "https://${{{API}}}.execute-api.${{AWS::Region}}.${{AWS::URLSuffix}}/"
            ))),
        );

        t.validate()?;
        Ok(t)
    }
}
