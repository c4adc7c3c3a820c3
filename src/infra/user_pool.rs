//! User pool, hosted UI domain, app client and a ready-to-use demo user

use serde_json::{Value, json};

use super::Stack;
use super::template::{
    DeletionPolicy, Output, Parameter, Resource, Template, get_att, reference, sub,
};
use crate::Result;
use crate::config::DEFAULT_SCOPES;

/// Callback registered on the app client
pub const CALLBACK_URL: &str = "http://localhost:3000/callbacks/cognito/login";
/// Demo user created with the stack
pub const INITIAL_USER_EMAIL: &str = "user@example.com";
/// Its password, made permanent so the first login needs no reset
pub const INITIAL_USER_PASSWORD: &str = "Password123!";

const USER_POOL: &str = "CognitoUserPool";
const DOMAIN: &str = "CognitoDomain";
const CLIENT: &str = "CognitoUserPoolClient";
const PROVIDER_ROLE: &str = "AwsCustomResourceRole";
const PROVIDER: &str = "AwsCustomResourceProvider";
const PROVIDER_BUCKET: &str = "CustomResourceCodeBucket";
const PROVIDER_KEY: &str = "CustomResourceCodeKey";

/// The identity provider stack
#[derive(Debug, Clone)]
pub struct UserPoolStack {
    name: String,
    domain_prefix: String,
}

impl UserPoolStack {
    /// A stack whose hosted UI lives at `https://{domain_prefix}.auth.{region}.amazoncognito.com`
    #[must_use]
    pub fn new(name: impl Into<String>, domain_prefix: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            domain_prefix: domain_prefix.into(),
        }
    }

    fn user_pool() -> Resource {
        Resource::new(
            "AWS::Cognito::UserPool",
            json!({
                "AdminCreateUserConfig": { "AllowAdminCreateUserOnly": false },
                "UsernameAttributes": ["email"],
                "UsernameConfiguration": { "CaseSensitive": false },
                "AutoVerifiedAttributes": ["email"],
                "VerificationMessageTemplate": {
                    "DefaultEmailOption": "CONFIRM_WITH_LINK",
                    "EmailSubjectByLink": "Verify your email for our awesome app!",
                    "EmailMessageByLink": "You have been invited to join our awesome app! {##Verify Email##}",
                },
                "AccountRecoverySetting": {
                    "RecoveryMechanisms": [{ "Name": "verified_email", "Priority": 1 }],
                },
            }),
        )
        .removal_policy(DeletionPolicy::Delete)
    }

    fn domain(&self) -> Resource {
        Resource::new(
            "AWS::Cognito::UserPoolDomain",
            json!({
                "Domain": self.domain_prefix,
                "UserPoolId": reference(USER_POOL),
            }),
        )
        .removal_policy(DeletionPolicy::Delete)
    }

    fn client() -> Resource {
        Resource::new(
            "AWS::Cognito::UserPoolClient",
            json!({
                "UserPoolId": reference(USER_POOL),
                "GenerateSecret": true,
                "PreventUserExistenceErrors": "ENABLED",
                "SupportedIdentityProviders": ["COGNITO"],
                "ExplicitAuthFlows": ["ALLOW_USER_PASSWORD_AUTH", "ALLOW_REFRESH_TOKEN_AUTH"],
                "AllowedOAuthFlowsUserPoolClient": true,
                "AllowedOAuthFlows": ["code"],
                "AllowedOAuthScopes": DEFAULT_SCOPES,
                "CallbackURLs": [CALLBACK_URL],
            }),
        )
        .removal_policy(DeletionPolicy::Delete)
    }

    /// Role for the function that makes the admin SDK calls
    fn provider_role() -> Resource {
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
                "Policies": [{
                    "PolicyName": "InitialUserSetup",
                    "PolicyDocument": {
                        "Version": "2012-10-17",
                        "Statement": [{
                            "Effect": "Allow",
                            "Action": ["cognito-idp:AdminCreateUser", "cognito-idp:AdminSetUserPassword"],
                            "Resource": get_att(USER_POOL, "Arn"),
                        }],
                    },
                }],
            }),
        )
    }

    fn provider() -> Resource {
        Resource::new(
            "AWS::Lambda::Function",
            json!({
                "Code": {
                    "S3Bucket": reference(PROVIDER_BUCKET),
                    "S3Key": reference(PROVIDER_KEY),
                },
                "Handler": "index.handler",
                "Runtime": "nodejs20.x",
                "Timeout": 120,
                "Role": get_att(PROVIDER_ROLE, "Arn"),
            }),
        )
        .depends_on(PROVIDER_ROLE)
    }

    /// A custom resource that runs one SDK call on create
    fn sdk_call(action: &str, parameters: &Value, physical_id: &str) -> Resource {
        let call = json!({
            "service": "CognitoIdentityServiceProvider",
            "action": action,
            "parameters": parameters,
            "physicalResourceId": { "id": physical_id },
        });

        Resource::new(
            "Custom::AWS",
            json!({
                "ServiceToken": get_att(PROVIDER, "Arn"),
                "Create": sub(&call.to_string()),
                "InstallLatestAwsSdk": false,
            }),
        )
    }

    fn create_user() -> Resource {
        Self::sdk_call(
            "adminCreateUser",
            &json!({
                "UserPoolId": format!("${{{USER_POOL}}}"),
                "Username": INITIAL_USER_EMAIL,
                "TemporaryPassword": INITIAL_USER_PASSWORD,
                "UserAttributes": [
                    { "Name": "email", "Value": INITIAL_USER_EMAIL },
                    { "Name": "email_verified", "Value": "true" },
                ],
            }),
            "CreateUser",
        )
        .depends_on(USER_POOL)
    }

    fn confirm_user_password() -> Resource {
        Self::sdk_call(
            "adminSetUserPassword",
            &json!({
                "UserPoolId": format!("${{{USER_POOL}}}"),
                "Username": INITIAL_USER_EMAIL,
                "Password": INITIAL_USER_PASSWORD,
                "Permanent": true,
            }),
            "ConfirmUser",
        )
        .depends_on("CreateUser")
    }
}

impl Stack for UserPoolStack {
    fn name(&self) -> &str {
        &self.name
    }

    fn template(&self) -> Result<Template> {
        let mut t = Template::new("Cognito user pool with hosted UI, app client and demo user");

        t.add_parameter(
            PROVIDER_BUCKET,
            Parameter::string("S3 bucket holding the custom resource provider code"),
        )?;
        t.add_parameter(
            PROVIDER_KEY,
            Parameter::string("S3 key of the custom resource provider code"),
        )?;

        t.add_resource(USER_POOL, Self::user_pool())?;
        t.add_resource(DOMAIN, self.domain())?;
        t.add_resource(CLIENT, Self::client())?;
        t.add_resource(PROVIDER_ROLE, Self::provider_role())?;
        t.add_resource(PROVIDER, Self::provider())?;
        t.add_resource("CreateUser", Self::create_user())?;
        t.add_resource("ConfirmUserPassword", Self::confirm_user_password())?;

        t.add_output("UserPoolId", Output::new(reference(USER_POOL)));
        // Ref on a UserPoolDomain yields the prefix
        t.add_output(
            "HostedUiPath",
            Output::new(sub(&format!(
                "https://${{{DOMAIN}}}.auth.${{AWS::Region}}.amazoncognito.com"
            ))),
        );
        t.add_output("RedirectUri", Output::new(json!(CALLBACK_URL)));
        t.add_output("CognitoClientId", Output::new(reference(CLIENT)));
        // Demo only: publishing the secret as an output exposes it to anyone who can read the stack
        t.add_output("CognitoClientSecret", Output::new(get_att(CLIENT, "ClientSecret")));
        t.add_output("LoginUsername", Output::new(json!(INITIAL_USER_EMAIL)));
        t.add_output("LoginPassword", Output::new(json!(INITIAL_USER_PASSWORD)));

        t.validate()?;
        Ok(t)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn template() -> Value {
        let t = UserPoolStack::new("CognitoPlaygroundStack", "demo-playground")
            .template()
            .unwrap();
        serde_json::to_value(t).unwrap()
    }

    #[test]
    fn user_pool_signs_in_by_email() {
        let t = template();
        let pool = &t["Resources"][USER_POOL];
        assert_eq!(pool["Properties"]["UsernameAttributes"], json!(["email"]));
        assert_eq!(pool["Properties"]["UsernameConfiguration"]["CaseSensitive"], false);
        assert_eq!(pool["DeletionPolicy"], "Delete");
    }

    #[test]
    fn client_has_secret_and_code_grant() {
        let t = template();
        let client = &t["Resources"][CLIENT]["Properties"];
        assert_eq!(client["GenerateSecret"], true);
        assert_eq!(client["AllowedOAuthFlows"], json!(["code"]));
        assert_eq!(client["CallbackURLs"], json!([CALLBACK_URL]));
        assert!(
            client["ExplicitAuthFlows"]
                .as_array()
                .unwrap()
                .contains(&json!("ALLOW_USER_PASSWORD_AUTH"))
        );
    }

    #[test]
    fn domain_uses_the_prefix() {
        let t = template();
        assert_eq!(t["Resources"][DOMAIN]["Properties"]["Domain"], "demo-playground");
    }

    #[test]
    fn user_setup_runs_in_order() {
        let t = template();
        assert_eq!(t["Resources"]["CreateUser"]["DependsOn"], json!([USER_POOL]));
        assert_eq!(t["Resources"]["ConfirmUserPassword"]["DependsOn"], json!(["CreateUser"]));

        let create = t["Resources"]["CreateUser"]["Properties"]["Create"]["Fn::Sub"]
            .as_str()
            .unwrap();
        let call: Value = serde_json::from_str(create).unwrap();
        assert_eq!(call["action"], "adminCreateUser");
        assert_eq!(call["parameters"]["UserPoolId"], "${CognitoUserPool}");
        assert_eq!(call["parameters"]["Username"], INITIAL_USER_EMAIL);
    }

    #[test]
    fn password_is_made_permanent() {
        let t = template();
        let confirm = t["Resources"]["ConfirmUserPassword"]["Properties"]["Create"]["Fn::Sub"]
            .as_str()
            .unwrap();
        let call: Value = serde_json::from_str(confirm).unwrap();
        assert_eq!(call["action"], "adminSetUserPassword");
        assert_eq!(call["parameters"]["Permanent"], true);
    }

    #[test]
    fn outputs_feed_the_clients() {
        let t = template();
        let outputs = t["Outputs"].as_object().unwrap();
        let mut names: Vec<&str> = outputs.keys().map(String::as_str).collect();
        names.sort_unstable();
        assert_eq!(
            names,
            vec![
                "CognitoClientId",
                "CognitoClientSecret",
                "HostedUiPath",
                "LoginPassword",
                "LoginUsername",
                "RedirectUri",
                "UserPoolId",
            ]
        );
        assert_eq!(
            outputs["HostedUiPath"]["Value"]["Fn::Sub"],
            "https://${CognitoDomain}.auth.${AWS::Region}.amazoncognito.com"
        );
        assert_eq!(
            outputs["CognitoClientSecret"]["Value"],
            json!({ "Fn::GetAtt": [CLIENT, "ClientSecret"] })
        );
    }
}
