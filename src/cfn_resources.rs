//! Resource Type Definitions
//!
//! Strongly-typed declarations for the resource kinds the authentication stack
//! uses: Cognito user pools, identity providers, clients and identity pools,
//! IAM roles and policies, Lambda functions and their log groups.
//!
//! Each struct serialises to the `Properties` block of its resource type, and
//! [`Resource`] carries the `Type` tag. Property names follow the provisioning
//! engine's PascalCase schema.
use crate::iam_policy::PolicyDocument;
use crate::intrinsics::{Expr, LogicalId};
use serde::Serialize;
use std::collections::BTreeMap;

/// A declared resource, tagged with its provisioning type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "Type", content = "Properties")]
pub enum Resource {
    #[serde(rename = "AWS::Cognito::UserPool")]
    UserPool(UserPool),
    #[serde(rename = "AWS::Cognito::UserPoolIdentityProvider")]
    IdentityProvider(UserPoolIdentityProvider),
    #[serde(rename = "AWS::Cognito::UserPoolClient")]
    UserPoolClient(UserPoolClient),
    #[serde(rename = "AWS::Cognito::IdentityPool")]
    IdentityPool(IdentityPool),
    #[serde(rename = "AWS::Cognito::IdentityPoolRoleAttachment")]
    RoleAttachment(IdentityPoolRoleAttachment),
    #[serde(rename = "AWS::IAM::Role")]
    Role(Role),
    #[serde(rename = "AWS::IAM::Policy")]
    Policy(Policy),
    #[serde(rename = "AWS::Lambda::Function")]
    Function(Function),
    #[serde(rename = "AWS::Lambda::Permission")]
    Permission(Permission),
    #[serde(rename = "AWS::Logs::LogGroup")]
    LogGroup(LogGroup),
}

impl Resource {
    /// Provisioning type name, e.g. `AWS::Cognito::UserPool`.
    pub fn type_name(&self) -> &'static str {
        match self {
            Resource::UserPool(_) => "AWS::Cognito::UserPool",
            Resource::IdentityProvider(_) => "AWS::Cognito::UserPoolIdentityProvider",
            Resource::UserPoolClient(_) => "AWS::Cognito::UserPoolClient",
            Resource::IdentityPool(_) => "AWS::Cognito::IdentityPool",
            Resource::RoleAttachment(_) => "AWS::Cognito::IdentityPoolRoleAttachment",
            Resource::Role(_) => "AWS::IAM::Role",
            Resource::Policy(_) => "AWS::IAM::Policy",
            Resource::Function(_) => "AWS::Lambda::Function",
            Resource::Permission(_) => "AWS::Lambda::Permission",
            Resource::LogGroup(_) => "AWS::Logs::LogGroup",
        }
    }
}

/// What the provisioning engine does with a resource on teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RemovalPolicy {
    #[serde(rename = "Delete")]
    Destroy,
    Retain,
}

// Cognito

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SchemaAttribute {
    pub name: String,
    pub attribute_data_type: &'static str,
    pub mutable: bool,
    pub required: bool,
}

impl SchemaAttribute {
    pub fn string(name: &str, required: bool, mutable: bool) -> Self {
        Self {
            name: name.to_string(),
            attribute_data_type: "String",
            mutable,
            required,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PasswordPolicy {
    pub minimum_length: u8,
    pub require_lowercase: bool,
    pub require_numbers: bool,
    pub require_symbols: bool,
    pub require_uppercase: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserPoolPolicies {
    pub password_policy: PasswordPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RecoveryOption {
    pub name: &'static str,
    pub priority: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AccountRecoverySetting {
    pub recovery_mechanisms: Vec<RecoveryOption>,
}

impl AccountRecoverySetting {
    /// No self-service recovery; only an administrator can reset a user.
    pub fn none() -> Self {
        Self {
            recovery_mechanisms: vec![RecoveryOption {
                name: "admin_only",
                priority: 1,
            }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AdminCreateUserConfig {
    pub allow_admin_create_user_only: bool,
}

/// Trigger name -> function ARN. Keys are the `LambdaConfig` property names.
pub type LambdaConfig = BTreeMap<&'static str, Expr>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserPool {
    pub user_pool_name: String,
    pub schema: Vec<SchemaAttribute>,
    pub policies: UserPoolPolicies,
    pub account_recovery_setting: AccountRecoverySetting,
    pub admin_create_user_config: AdminCreateUserConfig,
    pub username_attributes: Vec<&'static str>,
    pub auto_verified_attributes: Vec<&'static str>,
    pub lambda_config: LambdaConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserPoolIdentityProvider {
    pub provider_name: String,
    pub provider_type: String,
    pub user_pool_id: Expr,
    pub provider_details: BTreeMap<&'static str, String>,
    pub attribute_mapping: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserPoolClient {
    pub client_name: String,
    pub user_pool_id: Expr,
    pub generate_secret: bool,
    pub supported_identity_providers: Vec<String>,
    pub explicit_auth_flows: Vec<&'static str>,
    #[serde(rename = "AllowedOAuthFlows")]
    pub allowed_oauth_flows: Vec<&'static str>,
    #[serde(rename = "AllowedOAuthFlowsUserPoolClient")]
    pub allowed_oauth_flows_user_pool_client: bool,
    #[serde(rename = "AllowedOAuthScopes")]
    pub allowed_oauth_scopes: Vec<&'static str>,
    #[serde(rename = "CallbackURLs")]
    pub callback_urls: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CognitoIdentityProvider {
    pub client_id: Expr,
    pub provider_name: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct IdentityPool {
    pub identity_pool_name: String,
    pub allow_unauthenticated_identities: bool,
    pub cognito_identity_providers: Vec<CognitoIdentityProvider>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct IdentityPoolRoleAttachment {
    pub identity_pool_id: Expr,
    /// `authenticated` / `unauthenticated` -> role ARN.
    pub roles: BTreeMap<&'static str, Expr>,
}

// IAM

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Role {
    pub assume_role_policy_document: PolicyDocument,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub managed_policy_arns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Policy {
    pub policy_name: String,
    pub policy_document: PolicyDocument,
    pub roles: Vec<Expr>,
}

// Lambda

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct FunctionCode {
    pub s3_bucket: Expr,
    pub s3_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct FunctionEnvironment {
    pub variables: BTreeMap<String, Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Function {
    pub function_name: String,
    pub runtime: String,
    pub handler: String,
    pub role: Expr,
    pub code: FunctionCode,
    pub timeout: u32,
    pub memory_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<FunctionEnvironment>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Permission {
    pub action: &'static str,
    pub function_name: Expr,
    pub principal: String,
    pub source_arn: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct LogGroup {
    pub log_group_name: Expr,
    pub retention_in_days: u32,
}

/// A named value exported for other stacks.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Output {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub value: Expr,
    pub export: Export,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Export {
    pub name: String,
}

impl Output {
    pub fn exported(value: Expr, export_name: &str) -> Self {
        Self {
            description: None,
            value,
            export: Export {
                name: export_name.to_string(),
            },
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }
}

/// Template input supplied at deploy time.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Parameter {
    #[serde(rename = "Type")]
    pub kind: &'static str,
    pub description: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub no_echo: bool,
}

impl Parameter {
    pub fn string(description: &str) -> Self {
        Self {
            kind: "String",
            description: description.to_string(),
            no_echo: false,
        }
    }

    /// String parameter whose value the provisioning engine masks.
    pub fn secret(description: &str) -> Self {
        Self {
            no_echo: true,
            ..Self::string(description)
        }
    }
}

/// Shorthand for the `Arn` attribute of a declared resource.
pub fn arn_of(id: &LogicalId) -> Expr {
    Expr::get_att(id, "Arn")
}
