//! Physical resource names.
//!
//! Every name is `{stack}-{app}-{suffix}`, a pure function of the stack and
//! app name, so parallel environments never collide.
use crate::config_utils::AppConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameScope {
    prefix: String,
}

impl NameScope {
    pub fn new(stack_name: &str, app: &str) -> Self {
        Self {
            prefix: format!("{stack_name}-{app}"),
        }
    }

    pub fn for_config(config: &AppConfig) -> Self {
        Self::new(&config.stack_name, &config.app)
    }

    pub fn name(&self, suffix: &str) -> String {
        format!("{}-{}", self.prefix, suffix)
    }

    pub fn user_pool_name(&self) -> String {
        self.name("cognitoUserPool")
    }

    pub fn client_name(&self) -> String {
        self.name("userPoolClient")
    }

    pub fn identity_pool_name(&self) -> String {
        self.name("IdentityPool")
    }

    /// Bucket authenticated users may read and write.
    pub fn media_bucket(&self) -> String {
        self.name("mediastorage")
    }

    pub fn function_name(&self, unit: &str) -> String {
        self.name(unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_names() {
        let names = NameScope::new("demo", "app1");
        assert_eq!(names.user_pool_name(), "demo-app1-cognitoUserPool");
        assert_eq!(names.identity_pool_name(), "demo-app1-IdentityPool");
        assert_eq!(names.client_name(), "demo-app1-userPoolClient");
        assert_eq!(names.media_bucket(), "demo-app1-mediastorage");
        assert_eq!(names.function_name("preSignUp"), "demo-app1-preSignUp");
    }

    #[test]
    fn test_names_are_deterministic() {
        let pairs = [("demo", "app1"), ("prod", "web"), ("a", "b")];
        for (stack, app) in pairs {
            let first = NameScope::new(stack, app);
            let second = NameScope::new(stack, app);
            assert_eq!(first, second);
            assert_eq!(first.user_pool_name(), second.user_pool_name());
            assert_eq!(first.media_bucket(), second.media_bucket());
        }
    }

    #[test]
    fn test_scopes_do_not_collide() {
        let dev = NameScope::new("dev", "app1");
        let prod = NameScope::new("prod", "app1");
        assert_ne!(dev.user_pool_name(), prod.user_pool_name());
        assert_ne!(dev.identity_pool_name(), prod.identity_pool_name());
    }
}
