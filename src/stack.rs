//! Authentication stack composition.
//!
//! [`compose`] declares the user pool and everything around it: the Google
//! identity provider, the web client, the identity pool with its two trust
//! roles, the media storage policy and the exported outputs. [`synthesize`]
//! additionally renders the frozen graph as a deployment template.
use crate::cfn_resources::{
    AccountRecoverySetting, AdminCreateUserConfig, CognitoIdentityProvider, IdentityPool,
    IdentityPoolRoleAttachment, Output, PasswordPolicy, Permission, Policy, RemovalPolicy,
    Resource, Role, SchemaAttribute, UserPool, UserPoolClient, UserPoolIdentityProvider,
    UserPoolPolicies, arn_of,
};
use crate::config_utils::AppConfig;
use crate::iam_policy::{Conditions, PolicyDocument, Statement};
use crate::intrinsics::{Expr, LogicalId};
use crate::json_utils::{TemplateMeta, render_template};
use crate::naming::NameScope;
use crate::template::{DeclarationGraph, GraphError, StackBuilder};
use crate::triggers::{ComputeUnits, TriggerError, TriggerMap, TriggerPoint, assemble_triggers};
use crate::validation_utils::{is_valid_bucket_name, is_valid_function_name, is_valid_pool_name};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::info;

const IDENTITY_SERVICE: &str = "cognito-identity.amazonaws.com";
const USER_POOL_SERVICE: &str = "cognito-idp.amazonaws.com";

/// Provider name the client and identity provider agree on.
pub const GOOGLE_PROVIDER: &str = "Google";

/// Scopes requested from Google during federated sign-in.
pub const GOOGLE_SCOPES: [&str; 3] = ["profile", "email", "openid"];

/// Actions authenticated identities may perform on the media bucket.
pub const MEDIA_ACTIONS: [&str; 2] = ["s3:PutObject", "s3:GetObject"];

/// Placeholder redirect the web client is registered with.
pub const DEFAULT_CALLBACK_URL: &str = "https://example.com";

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("derived {kind} name {name:?} is not valid")]
    InvalidName { kind: &'static str, name: String },

    #[error(transparent)]
    Trigger(#[from] TriggerError),

    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Declares the full authentication stack and freezes it.
pub fn compose(
    config: &AppConfig,
    units: &dyn ComputeUnits,
) -> Result<DeclarationGraph, ComposeError> {
    let names = NameScope::for_config(config);
    check_names(&names)?;

    let mut stack = StackBuilder::new();
    let triggers = assemble_triggers(&mut stack, config, units)?;

    let pool = stack.add_with_policy(
        "UsersPool",
        Resource::UserPool(user_pool(&names, &triggers)),
        RemovalPolicy::Destroy,
    )?;

    for (point, function) in triggers.iter() {
        stack.add(
            &format!("{}InvokePermission", point.config_key()),
            Resource::Permission(Permission {
                action: "lambda:InvokeFunction",
                function_name: function.arn(),
                principal: USER_POOL_SERVICE.to_string(),
                source_arn: arn_of(&pool),
            }),
        )?;
    }

    let idp = stack.add(
        "GoogleIdP",
        Resource::IdentityProvider(google_provider(config, &pool)),
    )?;

    let client = stack.add(
        "WebAppClient",
        Resource::UserPoolClient(web_client(&names, &pool)),
    )?;
    // The client names the provider without referencing it.
    stack.depends_on(&client, &idp);

    let identity_pool = stack.add(
        "IdentityPool",
        Resource::IdentityPool(IdentityPool {
            identity_pool_name: names.identity_pool_name(),
            allow_unauthenticated_identities: false,
            cognito_identity_providers: vec![CognitoIdentityProvider {
                client_id: Expr::reference(&client),
                provider_name: Expr::get_att(&pool, "ProviderName"),
            }],
        }),
    )?;

    let authenticated = stack.add(
        "CognitoDefaultAuthenticatedRole",
        Resource::Role(trust_role(&identity_pool, "authenticated")),
    )?;
    let unauthenticated = stack.add(
        "CognitoDefaultUnauthenticatedRole",
        Resource::Role(trust_role(&identity_pool, "unauthenticated")),
    )?;

    stack.add(
        "CognitoDefaultAuthenticatedRoleDefaultPolicy",
        Resource::Policy(media_access_policy(&names, &authenticated)),
    )?;

    stack.add(
        "IdentityPoolRoleAttachment",
        Resource::RoleAttachment(IdentityPoolRoleAttachment {
            identity_pool_id: Expr::reference(&identity_pool),
            roles: BTreeMap::from([
                ("authenticated", arn_of(&authenticated)),
                ("unauthenticated", arn_of(&unauthenticated)),
            ]),
        }),
    )?;

    stack.output(
        "userPoolArnArn",
        Output::exported(arn_of(&pool), "awsUserPoolArn").with_description("User pool ARN"),
    )?;
    stack.output(
        "userPoolId",
        Output::exported(Expr::reference(&pool), "awsUserPoolId")
            .with_description("User pool id"),
    )?;
    stack.output(
        "clientId",
        Output::exported(Expr::reference(&client), "awsClientId")
            .with_description("Web client id"),
    )?;

    let graph = stack.build()?;
    info!(
        stack = %config.stack_id(),
        environment = %config.environment,
        region = %config.region,
        resources = graph.len(),
        edges = graph.edges().len(),
        "composed authentication stack"
    );
    Ok(graph)
}

/// Composes the stack and renders it as a deployment template.
pub fn synthesize(config: &AppConfig, units: &dyn ComputeUnits) -> Result<Value, ComposeError> {
    let graph = compose(config, units)?;
    Ok(render_template(&graph, &template_meta(config))?)
}

/// Template header for `config`.
pub fn template_meta(config: &AppConfig) -> TemplateMeta {
    let mut metadata = BTreeMap::from([
        ("StackName".to_string(), config.stack_id()),
        ("App".to_string(), config.app.clone()),
        ("Environment".to_string(), config.environment.clone()),
        ("Region".to_string(), config.region.clone()),
    ]);
    if let Some(account) = &config.account {
        metadata.insert("Account".to_string(), account.clone());
    }
    TemplateMeta {
        description: format!(
            "Authentication stack for {} ({})",
            config.app, config.environment
        ),
        metadata,
    }
}

fn check_names(names: &NameScope) -> Result<(), ComposeError> {
    let bucket = names.media_bucket();
    if !is_valid_bucket_name(&bucket) {
        return Err(ComposeError::InvalidName {
            kind: "media bucket",
            name: bucket,
        });
    }
    for (kind, name) in [
        ("user pool", names.user_pool_name()),
        ("identity pool", names.identity_pool_name()),
    ] {
        if !is_valid_pool_name(&name) {
            return Err(ComposeError::InvalidName { kind, name });
        }
    }
    for point in TriggerPoint::ALL {
        let name = names.function_name(point.unit_name());
        if !is_valid_function_name(&name) {
            return Err(ComposeError::InvalidName {
                kind: "function",
                name,
            });
        }
    }
    Ok(())
}

fn user_pool(names: &NameScope, triggers: &TriggerMap) -> UserPool {
    UserPool {
        user_pool_name: names.user_pool_name(),
        schema: vec![
            SchemaAttribute::string("email", true, true),
            SchemaAttribute::string("authChallenge", false, true),
        ],
        policies: UserPoolPolicies {
            password_policy: PasswordPolicy {
                minimum_length: 8,
                require_lowercase: true,
                require_numbers: true,
                require_symbols: true,
                require_uppercase: true,
            },
        },
        account_recovery_setting: AccountRecoverySetting::none(),
        admin_create_user_config: AdminCreateUserConfig {
            allow_admin_create_user_only: false,
        },
        username_attributes: vec!["email"],
        auto_verified_attributes: vec!["email"],
        lambda_config: triggers.lambda_config(),
    }
}

fn google_provider(config: &AppConfig, pool: &LogicalId) -> UserPoolIdentityProvider {
    UserPoolIdentityProvider {
        provider_name: GOOGLE_PROVIDER.to_string(),
        provider_type: GOOGLE_PROVIDER.to_string(),
        user_pool_id: Expr::reference(pool),
        provider_details: BTreeMap::from([
            ("client_id", config.google.client_id.clone()),
            ("client_secret", config.google.client_secret.clone()),
            ("authorize_scopes", GOOGLE_SCOPES.join(" ")),
        ]),
        attribute_mapping: BTreeMap::from([("email".to_string(), "email".to_string())]),
    }
}

fn web_client(names: &NameScope, pool: &LogicalId) -> UserPoolClient {
    UserPoolClient {
        client_name: names.client_name(),
        user_pool_id: Expr::reference(pool),
        generate_secret: false,
        supported_identity_providers: vec![GOOGLE_PROVIDER.to_string()],
        explicit_auth_flows: vec![
            "ALLOW_USER_PASSWORD_AUTH",
            "ALLOW_CUSTOM_AUTH",
            "ALLOW_USER_SRP_AUTH",
            "ALLOW_REFRESH_TOKEN_AUTH",
        ],
        allowed_oauth_flows: vec!["code", "implicit"],
        allowed_oauth_flows_user_pool_client: true,
        allowed_oauth_scopes: vec!["email", "openid", "profile"],
        callback_urls: vec![DEFAULT_CALLBACK_URL.to_string()],
    }
}

/// Role assumable by identity-pool identities in the given `amr` state.
fn trust_role(identity_pool: &LogicalId, amr: &str) -> Role {
    let condition = Conditions::from([
        (
            "StringEquals".to_string(),
            BTreeMap::from([(
                format!("{IDENTITY_SERVICE}:aud"),
                Expr::reference(identity_pool),
            )]),
        ),
        (
            "ForAnyValue:StringLike".to_string(),
            BTreeMap::from([(format!("{IDENTITY_SERVICE}:amr"), Expr::lit(amr))]),
        ),
    ]);
    Role {
        assume_role_policy_document: PolicyDocument::new(vec![Statement::web_identity_trust(
            IDENTITY_SERVICE,
            condition,
        )]),
        managed_policy_arns: Vec::new(),
    }
}

fn media_access_policy(names: &NameScope, role: &LogicalId) -> Policy {
    let bucket_arn = format!("arn:aws:s3:::{}", names.media_bucket());
    Policy {
        policy_name: "CognitoDefaultAuthenticatedRoleDefaultPolicy".to_string(),
        policy_document: PolicyDocument::new(vec![Statement::allow(
            MEDIA_ACTIONS,
            [Expr::lit(bucket_arn.as_str()), Expr::lit(format!("{bucket_arn}/*"))],
        )]),
        roles: vec![Expr::reference(role)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_utils::tests::demo_config;
    use crate::iam_policy::Effect;
    use crate::template::EdgeKind;
    use crate::triggers::AssetFunctions;
    use serde_json::json;

    fn demo_graph() -> DeclarationGraph {
        compose(&demo_config(), &AssetFunctions::default()).unwrap()
    }

    #[test]
    fn test_demo_pool_names() {
        let graph = demo_graph();
        let Some(Resource::UserPool(pool)) = graph.resource("UsersPool") else {
            panic!("user pool not declared");
        };
        assert_eq!(pool.user_pool_name, "demo-app1-cognitoUserPool");

        let Some(Resource::IdentityPool(identity_pool)) = graph.resource("IdentityPool") else {
            panic!("identity pool not declared");
        };
        assert_eq!(identity_pool.identity_pool_name, "demo-app1-IdentityPool");
        assert!(!identity_pool.allow_unauthenticated_identities);

        let Some(Resource::UserPoolClient(client)) = graph.resource("WebAppClient") else {
            panic!("client not declared");
        };
        assert_eq!(client.client_name, "demo-app1-userPoolClient");
    }

    #[test]
    fn test_user_pool_settings() {
        let graph = demo_graph();
        let node = graph.node("UsersPool").unwrap();
        assert_eq!(node.removal_policy, Some(RemovalPolicy::Destroy));
        let Resource::UserPool(pool) = &node.resource else {
            panic!("UsersPool is not a user pool");
        };
        assert_eq!(pool.policies.password_policy.minimum_length, 8);
        assert!(pool.policies.password_policy.require_symbols);
        assert!(!pool.admin_create_user_config.allow_admin_create_user_only);
        assert_eq!(pool.username_attributes, vec!["email"]);
        assert_eq!(
            pool.account_recovery_setting.recovery_mechanisms[0].name,
            "admin_only"
        );
        assert!(
            pool.schema
                .iter()
                .any(|attr| attr.name == "authChallenge" && attr.mutable && !attr.required)
        );
    }

    #[test]
    fn test_trigger_mapping_is_complete_and_distinct() {
        let graph = demo_graph();
        let Some(Resource::UserPool(pool)) = graph.resource("UsersPool") else {
            panic!("user pool not declared");
        };
        assert_eq!(pool.lambda_config.len(), 5);

        let mut targets = Vec::new();
        for point in TriggerPoint::ALL {
            let Some(Expr::GetAtt(target, attribute)) = pool.lambda_config.get(point.config_key())
            else {
                panic!("trigger {} is unbound", point);
            };
            assert_eq!(attribute, "Arn");
            assert!(matches!(
                graph.resource(target.as_str()),
                Some(Resource::Function(_))
            ));
            assert!(graph.has_edge("UsersPool", target.as_str(), EdgeKind::Reference));
            targets.push(target.clone());
        }
        targets.sort();
        targets.dedup();
        assert_eq!(targets.len(), 5);
    }

    #[test]
    fn test_each_trigger_can_be_invoked_by_the_pool() {
        let graph = demo_graph();
        for point in TriggerPoint::ALL {
            let id = format!("{}InvokePermission", point.config_key());
            let Some(Resource::Permission(permission)) = graph.resource(&id) else {
                panic!("missing {}", id);
            };
            assert_eq!(permission.principal, "cognito-idp.amazonaws.com");
            assert!(graph.has_edge(&id, "UsersPool", EdgeKind::Reference));
        }
    }

    #[test]
    fn test_client_depends_on_identity_provider() {
        let graph = demo_graph();
        assert!(graph.has_edge("WebAppClient", "GoogleIdP", EdgeKind::DependsOn));

        let order = graph.creation_order();
        let position = |id: &str| order.iter().position(|entry| entry.as_str() == id).unwrap();
        assert!(position("GoogleIdP") < position("WebAppClient"));
        assert!(position("UsersPool") < position("GoogleIdP"));
        assert!(position("WebAppClient") < position("IdentityPool"));
    }

    #[test]
    fn test_google_provider() {
        let graph = demo_graph();
        let Some(Resource::IdentityProvider(idp)) = graph.resource("GoogleIdP") else {
            panic!("Google provider not declared");
        };
        assert_eq!(idp.provider_type, "Google");
        assert_eq!(idp.provider_details["client_id"], "client.apps.googleusercontent.com");
        assert_eq!(idp.provider_details["client_secret"], "google-secret");
        assert_eq!(idp.provider_details["authorize_scopes"], "profile email openid");
        assert_eq!(idp.attribute_mapping["email"], "email");
    }

    #[test]
    fn test_authenticated_policy_is_scoped() {
        let graph = demo_graph();
        let Some(Resource::Policy(policy)) =
            graph.resource("CognitoDefaultAuthenticatedRoleDefaultPolicy")
        else {
            panic!("authenticated policy not declared");
        };
        assert_eq!(
            policy.roles,
            vec![Expr::reference(
                &LogicalId::parse("CognitoDefaultAuthenticatedRole").unwrap()
            )]
        );

        let statements = &policy.policy_document.statement;
        assert_eq!(statements.len(), 1);
        let statement = &statements[0];
        assert_eq!(statement.effect, Effect::Allow);
        assert_eq!(statement.action, vec!["s3:PutObject", "s3:GetObject"]);
        let resources: Vec<&str> = statement
            .resource
            .iter()
            .filter_map(Expr::as_literal)
            .collect();
        assert_eq!(
            resources,
            vec![
                "arn:aws:s3:::demo-app1-mediastorage",
                "arn:aws:s3:::demo-app1-mediastorage/*"
            ]
        );
        assert_eq!(statement.resource.len(), 2);
    }

    #[test]
    fn test_unauthenticated_role_has_no_permissions() {
        let graph = demo_graph();
        let attached: Vec<_> = graph
            .nodes()
            .filter_map(|(_, node)| match &node.resource {
                Resource::Policy(policy) => Some(policy),
                _ => None,
            })
            .filter(|policy| {
                policy.roles.contains(&Expr::reference(
                    &LogicalId::parse("CognitoDefaultUnauthenticatedRole").unwrap(),
                ))
            })
            .collect();
        assert!(attached.is_empty());
    }

    #[test]
    fn test_trust_roles() {
        let template = synthesize(&demo_config(), &AssetFunctions::default()).unwrap();
        for (id, amr) in [
            ("CognitoDefaultAuthenticatedRole", "authenticated"),
            ("CognitoDefaultUnauthenticatedRole", "unauthenticated"),
        ] {
            let document = &template["Resources"][id]["Properties"]["AssumeRolePolicyDocument"];
            let statement = &document["Statement"][0];
            assert_eq!(
                statement["Principal"],
                json!({ "Federated": "cognito-identity.amazonaws.com" })
            );
            assert_eq!(statement["Action"], json!(["sts:AssumeRoleWithWebIdentity"]));
            assert_eq!(
                statement["Condition"]["StringEquals"]["cognito-identity.amazonaws.com:aud"],
                json!({ "Ref": "IdentityPool" })
            );
            let amr_condition = &statement["Condition"]["ForAnyValue:StringLike"];
            assert_eq!(amr_condition["cognito-identity.amazonaws.com:amr"], json!(amr));
        }
    }

    #[test]
    fn test_role_attachment() {
        let graph = demo_graph();
        let Some(Resource::RoleAttachment(attachment)) =
            graph.resource("IdentityPoolRoleAttachment")
        else {
            panic!("role attachment not declared");
        };
        assert_eq!(
            attachment.roles["authenticated"],
            arn_of(&LogicalId::parse("CognitoDefaultAuthenticatedRole").unwrap())
        );
        assert_eq!(
            attachment.roles["unauthenticated"],
            arn_of(&LogicalId::parse("CognitoDefaultUnauthenticatedRole").unwrap())
        );
        assert!(graph.has_edge(
            "IdentityPoolRoleAttachment",
            "IdentityPool",
            EdgeKind::Reference
        ));
    }

    #[test]
    fn test_outputs() {
        let template = synthesize(&demo_config(), &AssetFunctions::default()).unwrap();
        let outputs = &template["Outputs"];
        assert_eq!(outputs.as_object().unwrap().len(), 3);
        assert_eq!(outputs["userPoolArnArn"]["Export"]["Name"], json!("awsUserPoolArn"));
        assert_eq!(
            outputs["userPoolArnArn"]["Value"],
            json!({ "Fn::GetAtt": ["UsersPool", "Arn"] })
        );
        assert_eq!(outputs["userPoolId"]["Export"]["Name"], json!("awsUserPoolId"));
        assert_eq!(outputs["userPoolId"]["Value"], json!({ "Ref": "UsersPool" }));
        assert_eq!(outputs["clientId"]["Export"]["Name"], json!("awsClientId"));
        assert_eq!(outputs["clientId"]["Value"], json!({ "Ref": "WebAppClient" }));
    }

    #[test]
    fn test_template_header_and_client_depends_on() {
        let template = synthesize(&demo_config(), &AssetFunctions::default()).unwrap();
        assert_eq!(template["Description"], json!("Authentication stack for app1 (dev)"));
        assert_eq!(template["Metadata"]["StackName"], json!("demo-cognitoStack"));
        assert_eq!(template["Resources"]["WebAppClient"]["DependsOn"], json!(["GoogleIdP"]));
        assert_eq!(template["Resources"]["UsersPool"]["DeletionPolicy"], json!("Delete"));
    }

    #[test]
    fn test_challenge_function_environment_is_complete() {
        let template = synthesize(&demo_config(), &AssetFunctions::default()).unwrap();
        let function = &template["Resources"]["CreateAuthChallengeFunction"]["Properties"];
        assert_eq!(
            function["Environment"]["Variables"],
            json!({
                "BASE_URL": "https://login.example.org",
                "SECRET_KEY": { "Ref": "MagicLinkSecret" },
                "SES_FROM_ADDRESS": "no-reply@example.org",
                "TIMEOUT_MINS": "15"
            })
        );
        assert_eq!(template["Parameters"]["MagicLinkSecret"]["NoEcho"], json!(true));
        assert_eq!(template["Parameters"]["AssetsBucket"].get("NoEcho"), None);
    }

    #[test]
    fn test_assembly_is_idempotent() {
        let config = demo_config();
        let first = compose(&config, &AssetFunctions::default()).unwrap();
        let second = compose(&config, &AssetFunctions::default()).unwrap();
        assert_eq!(first, second);

        let first = synthesize(&config, &AssetFunctions::default()).unwrap();
        let second = synthesize(&config, &AssetFunctions::default()).unwrap();
        assert_eq!(
            crate::json_utils::to_pretty_json(&first).unwrap(),
            crate::json_utils::to_pretty_json(&second).unwrap()
        );
    }

    #[test]
    fn test_uppercase_names_cannot_form_a_bucket() {
        let mut config = demo_config();
        config.stack_name = "Demo".to_string();
        let err = compose(&config, &AssetFunctions::default()).unwrap_err();
        assert!(matches!(
            err,
            ComposeError::InvalidName {
                kind: "media bucket",
                ..
            }
        ));
    }

    #[test]
    fn test_long_names_cannot_form_a_function_name() {
        let mut config = demo_config();
        config.stack_name = "s".repeat(32);
        config.app = "a".repeat(17);
        assert!(is_valid_bucket_name(&NameScope::for_config(&config).media_bucket()));

        let err = compose(&config, &AssetFunctions::default()).unwrap_err();
        let ComposeError::InvalidName { kind, name } = &err else {
            panic!("expected an invalid name, got {err}");
        };
        assert_eq!(*kind, "function");
        assert!(name.len() > 64, "{name}");
    }

    #[test]
    fn test_longest_accepted_names_fit_every_function() {
        let mut config = demo_config();
        config.stack_name = "s".repeat(22);
        config.app = "a".repeat(21);
        let graph = compose(&config, &AssetFunctions::default()).unwrap();
        let longest = graph
            .nodes()
            .filter_map(|(_, node)| match &node.resource {
                Resource::Function(function) => Some(function.function_name.len()),
                _ => None,
            })
            .max();
        assert_eq!(longest, Some(64));
    }
}
