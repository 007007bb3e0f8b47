//! IAM policy documents for trust and permission statements.
use crate::intrinsics::Expr;
use serde::Serialize;
use std::collections::BTreeMap;

pub const POLICY_VERSION: &str = "2012-10-17";

/// Condition block: operator -> (key -> value).
pub type Conditions = BTreeMap<String, BTreeMap<String, Expr>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Effect {
    Allow,
    Deny,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Principal {
    Service(String),
    Federated(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Statement {
    pub effect: Effect,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal: Option<Principal>,
    pub action: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub resource: Vec<Expr>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub condition: Conditions,
}

impl Statement {
    /// Allows `actions` on `resources`.
    pub fn allow<A, R>(actions: A, resources: R) -> Self
    where
        A: IntoIterator,
        A::Item: Into<String>,
        R: IntoIterator<Item = Expr>,
    {
        Self {
            effect: Effect::Allow,
            principal: None,
            action: actions.into_iter().map(Into::into).collect(),
            resource: resources.into_iter().collect(),
            condition: Conditions::new(),
        }
    }

    /// Trust statement letting an AWS service assume the role.
    pub fn service_trust(service: &str) -> Self {
        Self {
            effect: Effect::Allow,
            principal: Some(Principal::Service(service.to_string())),
            action: vec!["sts:AssumeRole".to_string()],
            resource: Vec::new(),
            condition: Conditions::new(),
        }
    }

    /// Trust statement for web identities federated through `provider`.
    pub fn web_identity_trust(provider: &str, condition: Conditions) -> Self {
        Self {
            effect: Effect::Allow,
            principal: Some(Principal::Federated(provider.to_string())),
            action: vec!["sts:AssumeRoleWithWebIdentity".to_string()],
            resource: Vec::new(),
            condition,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    pub version: &'static str,
    pub statement: Vec<Statement>,
}

impl PolicyDocument {
    pub fn new(statement: Vec<Statement>) -> Self {
        Self {
            version: POLICY_VERSION,
            statement,
        }
    }
}
