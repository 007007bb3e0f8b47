//! Logical ids and template expressions.
//!
//! [`Expr`] is the value type used for every property that may point at
//! another declaration. It serialises to the provisioning engine's intrinsic
//! function syntax (`Ref`, `Fn::GetAtt`, `Fn::Join`).
use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};
use std::fmt;

/// Pseudo parameter holding the target account id.
pub const ACCOUNT_ID: &str = "AWS::AccountId";

/// Pseudo parameter holding the target region.
pub const REGION: &str = "AWS::Region";

/// Template-unique identifier of a declared resource or output.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct LogicalId(String);

impl LogicalId {
    /// Parses a logical id. Ids are 1-255 ASCII alphanumeric characters.
    pub fn parse(id: &str) -> Option<Self> {
        let valid = !id.is_empty()
            && id.len() <= 255
            && id.chars().all(|c| c.is_ascii_alphanumeric());
        valid.then(|| Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LogicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A property value: either a literal or a reference resolved at deploy time.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(String),
    /// `Ref` to a declared resource.
    Ref(LogicalId),
    /// `Ref` to a template parameter or pseudo parameter.
    Param(String),
    GetAtt(LogicalId, String),
    Join(String, Vec<Expr>),
}

impl Expr {
    pub fn lit(value: impl Into<String>) -> Self {
        Expr::Literal(value.into())
    }

    pub fn reference(id: &LogicalId) -> Self {
        Expr::Ref(id.clone())
    }

    pub fn get_att(id: &LogicalId, attribute: &str) -> Self {
        Expr::GetAtt(id.clone(), attribute.to_string())
    }

    pub fn param(name: &str) -> Self {
        Expr::Param(name.to_string())
    }

    pub fn join(parts: Vec<Expr>) -> Self {
        Expr::Join(String::new(), parts)
    }

    /// The literal text, when the expression has no deploy-time component.
    pub fn as_literal(&self) -> Option<&str> {
        match self {
            Expr::Literal(value) => Some(value),
            _ => None,
        }
    }
}

impl From<&str> for Expr {
    fn from(value: &str) -> Self {
        Expr::Literal(value.to_string())
    }
}

impl From<String> for Expr {
    fn from(value: String) -> Self {
        Expr::Literal(value)
    }
}

impl Serialize for Expr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Expr::Literal(value) => serializer.serialize_str(value),
            Expr::Ref(id) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("Ref", id.as_str())?;
                map.end()
            }
            Expr::Param(name) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("Ref", name)?;
                map.end()
            }
            Expr::GetAtt(id, attribute) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("Fn::GetAtt", &[id.as_str(), attribute.as_str()])?;
                map.end()
            }
            Expr::Join(separator, parts) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("Fn::Join", &(separator, parts))?;
                map.end()
            }
        }
    }
}
