//! Challenge-handling compute units and their trigger wiring.
//!
//! The user pool's custom authentication flow needs five triggers bound:
//! the four challenge points plus the post-confirmation hook. Declaring the
//! functions is the job of a [`ComputeUnits`] collaborator;
//! [`assemble_triggers`] only checks the wiring (every point bound once,
//! no function shared between points) and returns the [`TriggerMap`].
use crate::cfn_resources::{
    Function, FunctionCode, FunctionEnvironment, LambdaConfig, LogGroup, Parameter, Policy,
    Resource, Role, arn_of,
};
use crate::config_utils::AppConfig;
use crate::iam_policy::{PolicyDocument, Statement};
use crate::intrinsics::{self, Expr, LogicalId};
use crate::naming::NameScope;
use crate::template::{GraphError, StackBuilder};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Template parameter naming the bucket that holds function bundles.
pub const ASSETS_BUCKET_PARAM: &str = "AssetsBucket";

/// Template parameter carrying the key magic links are signed with.
pub const MAGIC_LINK_SECRET_PARAM: &str = "MagicLinkSecret";

const BASIC_EXECUTION_POLICY: &str =
    "arn:aws:iam::aws:policy/service-role/AWSLambdaBasicExecutionRole";

/// A named hook in the user pool's authentication flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TriggerPoint {
    PreSignUp,
    CreateAuthChallenge,
    DefineAuthChallenge,
    VerifyAuthChallengeResponse,
    PostConfirmation,
}

impl TriggerPoint {
    pub const ALL: [TriggerPoint; 5] = [
        TriggerPoint::PreSignUp,
        TriggerPoint::CreateAuthChallenge,
        TriggerPoint::DefineAuthChallenge,
        TriggerPoint::VerifyAuthChallengeResponse,
        TriggerPoint::PostConfirmation,
    ];

    /// Points served by the challenge function set.
    pub const CHALLENGE: [TriggerPoint; 4] = [
        TriggerPoint::PreSignUp,
        TriggerPoint::CreateAuthChallenge,
        TriggerPoint::DefineAuthChallenge,
        TriggerPoint::VerifyAuthChallengeResponse,
    ];

    /// Key of this trigger in the pool's `LambdaConfig`.
    pub fn config_key(self) -> &'static str {
        match self {
            TriggerPoint::PreSignUp => "PreSignUp",
            TriggerPoint::CreateAuthChallenge => "CreateAuthChallenge",
            TriggerPoint::DefineAuthChallenge => "DefineAuthChallenge",
            TriggerPoint::VerifyAuthChallengeResponse => "VerifyAuthChallengeResponse",
            TriggerPoint::PostConfirmation => "PostConfirmation",
        }
    }

    /// Bundle name of the function implementing this trigger.
    pub fn unit_name(self) -> &'static str {
        match self {
            TriggerPoint::PreSignUp => "preSignUp",
            TriggerPoint::CreateAuthChallenge => "createAuthChallenge",
            TriggerPoint::DefineAuthChallenge => "defineAuthChallenge",
            TriggerPoint::VerifyAuthChallengeResponse => "verifyAuthChallenge",
            TriggerPoint::PostConfirmation => "postConfirmation",
        }
    }

    fn handler(self) -> &'static str {
        match self {
            TriggerPoint::PreSignUp => "preSignUp.lambda_handler",
            TriggerPoint::CreateAuthChallenge => "createAuthChallenge.lambda_handler",
            TriggerPoint::DefineAuthChallenge => "defineAuthChallenge.lambda_handler",
            TriggerPoint::VerifyAuthChallengeResponse => "verifyAuthChallenge.lambda_handler",
            TriggerPoint::PostConfirmation => "lambda_function.lambda_handler",
        }
    }

    /// PascalCase prefix for the logical ids declared for this trigger.
    fn id_prefix(self) -> &'static str {
        match self {
            TriggerPoint::VerifyAuthChallengeResponse => "VerifyAuthChallenge",
            other => other.config_key(),
        }
    }
}

impl fmt::Display for TriggerPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.config_key())
    }
}

/// Reference to a declared function. The function itself stays owned by the graph.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FunctionRef {
    logical_id: LogicalId,
}

impl FunctionRef {
    pub fn new(logical_id: LogicalId) -> Self {
        Self { logical_id }
    }

    pub fn logical_id(&self) -> &LogicalId {
        &self.logical_id
    }

    pub fn arn(&self) -> Expr {
        arn_of(&self.logical_id)
    }
}

#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("trigger {0} has no function bound")]
    Missing(TriggerPoint),

    #[error("trigger {0} was returned by the wrong provider")]
    Unexpected(TriggerPoint),

    #[error("function {function} is bound to both {first} and {second}")]
    Duplicate {
        function: LogicalId,
        first: TriggerPoint,
        second: TriggerPoint,
    },

    #[error("trigger {0} is bound to {1}, which is not a declared function")]
    UnknownFunction(TriggerPoint, LogicalId),

    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Complete, validated trigger wiring for the user pool.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerMap(BTreeMap<TriggerPoint, FunctionRef>);

impl TriggerMap {
    pub fn get(&self, point: TriggerPoint) -> Option<&FunctionRef> {
        self.0.get(&point)
    }

    pub fn iter(&self) -> impl Iterator<Item = (TriggerPoint, &FunctionRef)> {
        self.0.iter().map(|(point, function)| (*point, function))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn lambda_config(&self) -> LambdaConfig {
        self.iter()
            .map(|(point, function)| (point.config_key(), function.arn()))
            .collect()
    }
}

/// Declares the functions behind the user pool triggers.
pub trait ComputeUnits {
    /// Declares the four challenge-flow functions.
    fn challenge_functions(
        &self,
        stack: &mut StackBuilder,
        config: &AppConfig,
    ) -> Result<BTreeMap<TriggerPoint, FunctionRef>, TriggerError>;

    /// Declares the post-confirmation function.
    fn post_confirmation(
        &self,
        stack: &mut StackBuilder,
        config: &AppConfig,
    ) -> Result<FunctionRef, TriggerError>;
}

/// Binds every trigger point to a function declared by `units`.
pub fn assemble_triggers(
    stack: &mut StackBuilder,
    config: &AppConfig,
    units: &dyn ComputeUnits,
) -> Result<TriggerMap, TriggerError> {
    let mut bound = units.challenge_functions(stack, config)?;
    if bound.contains_key(&TriggerPoint::PostConfirmation) {
        return Err(TriggerError::Unexpected(TriggerPoint::PostConfirmation));
    }
    if let Some(point) = TriggerPoint::CHALLENGE
        .into_iter()
        .find(|point| !bound.contains_key(point))
    {
        return Err(TriggerError::Missing(point));
    }

    let post_confirmation = units.post_confirmation(stack, config)?;
    bound.insert(TriggerPoint::PostConfirmation, post_confirmation);

    let mut seen: BTreeMap<&LogicalId, TriggerPoint> = BTreeMap::new();
    for (point, function) in &bound {
        if let Some(first) = seen.insert(function.logical_id(), *point) {
            return Err(TriggerError::Duplicate {
                function: function.logical_id().clone(),
                first,
                second: *point,
            });
        }
        if !matches!(stack.resource(function.logical_id()), Some(Resource::Function(_))) {
            return Err(TriggerError::UnknownFunction(
                *point,
                function.logical_id().clone(),
            ));
        }
    }

    debug!(count = bound.len(), "trigger wiring complete");
    Ok(TriggerMap(bound))
}

/// Declares each trigger as a Python function whose bundle lives in the
/// assets bucket under `functions/{unit}.zip`.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetFunctions {
    pub runtime: String,
    pub timeout_secs: u32,
    pub memory_mb: u32,
    pub log_retention_days: u32,
}

impl Default for AssetFunctions {
    fn default() -> Self {
        Self {
            runtime: "python3.12".to_string(),
            timeout_secs: 10,
            memory_mb: 128,
            log_retention_days: 7,
        }
    }
}

impl AssetFunctions {
    fn declare(
        &self,
        stack: &mut StackBuilder,
        config: &AppConfig,
        point: TriggerPoint,
        variables: BTreeMap<String, Expr>,
        statements: Vec<Statement>,
    ) -> Result<FunctionRef, GraphError> {
        let names = NameScope::for_config(config);
        let prefix = point.id_prefix();

        stack.parameter(
            ASSETS_BUCKET_PARAM,
            Parameter::string("Bucket holding the trigger function bundles"),
        );

        let role = stack.add(
            &format!("{prefix}ServiceRole"),
            Resource::Role(Role {
                assume_role_policy_document: PolicyDocument::new(vec![Statement::service_trust(
                    "lambda.amazonaws.com",
                )]),
                managed_policy_arns: vec![BASIC_EXECUTION_POLICY.to_string()],
            }),
        )?;

        let policy = if statements.is_empty() {
            None
        } else {
            Some(stack.add(
                &format!("{prefix}ServiceRoleDefaultPolicy"),
                Resource::Policy(Policy {
                    policy_name: format!("{prefix}ServiceRoleDefaultPolicy"),
                    policy_document: PolicyDocument::new(statements),
                    roles: vec![Expr::reference(&role)],
                }),
            )?)
        };

        let function = stack.add(
            &format!("{prefix}Function"),
            Resource::Function(Function {
                function_name: names.function_name(point.unit_name()),
                runtime: self.runtime.clone(),
                handler: point.handler().to_string(),
                role: arn_of(&role),
                code: FunctionCode {
                    s3_bucket: Expr::param(ASSETS_BUCKET_PARAM),
                    s3_key: format!("functions/{}.zip", point.unit_name()),
                },
                timeout: self.timeout_secs,
                memory_size: self.memory_mb,
                environment: (!variables.is_empty())
                    .then_some(FunctionEnvironment { variables }),
            }),
        )?;
        // The function must not run before its permissions exist.
        if let Some(policy) = &policy {
            stack.depends_on(&function, policy);
        }

        stack.add(
            &format!("{prefix}LogGroup"),
            Resource::LogGroup(LogGroup {
                log_group_name: Expr::join(vec![
                    Expr::lit("/aws/lambda/"),
                    Expr::reference(&function),
                ]),
                retention_in_days: self.log_retention_days,
            }),
        )?;

        debug!(trigger = %point, function = %function, "declared trigger function");
        Ok(FunctionRef::new(function))
    }

    fn challenge_environment(
        stack: &mut StackBuilder,
        config: &AppConfig,
    ) -> BTreeMap<String, Expr> {
        stack.parameter(
            MAGIC_LINK_SECRET_PARAM,
            Parameter::secret("Key the challenge function signs magic links with"),
        );
        let settings = &config.challenge;
        BTreeMap::from([
            (
                "TIMEOUT_MINS".to_string(),
                Expr::lit(settings.timeout_mins.to_string()),
            ),
            (
                "SES_FROM_ADDRESS".to_string(),
                Expr::lit(settings.ses_from_address.as_str()),
            ),
            ("BASE_URL".to_string(), Expr::lit(settings.base_url.as_str())),
            ("SECRET_KEY".to_string(), Expr::param(MAGIC_LINK_SECRET_PARAM)),
        ])
    }
}

impl ComputeUnits for AssetFunctions {
    fn challenge_functions(
        &self,
        stack: &mut StackBuilder,
        config: &AppConfig,
    ) -> Result<BTreeMap<TriggerPoint, FunctionRef>, TriggerError> {
        let mut functions = BTreeMap::new();
        for point in TriggerPoint::CHALLENGE {
            let (variables, statements) = match point {
                TriggerPoint::CreateAuthChallenge => (
                    Self::challenge_environment(stack, config),
                    vec![Statement::allow(
                        ["ses:SendEmail", "ses:SendRawEmail"],
                        [Expr::lit("*")],
                    )],
                ),
                _ => (BTreeMap::new(), Vec::new()),
            };
            let function = self.declare(stack, config, point, variables, statements)?;
            functions.insert(point, function);
        }
        Ok(functions)
    }

    fn post_confirmation(
        &self,
        stack: &mut StackBuilder,
        config: &AppConfig,
    ) -> Result<FunctionRef, TriggerError> {
        let variables = BTreeMap::from([(
            "DYNAMO_DB_TABLE_USERS".to_string(),
            Expr::lit(config.users_table.as_str()),
        )]);
        let table_arn = Expr::join(vec![
            Expr::lit("arn:aws:dynamodb:"),
            Expr::param(intrinsics::REGION),
            Expr::lit(":"),
            Expr::param(intrinsics::ACCOUNT_ID),
            Expr::lit(format!(":table/{}", config.users_table)),
        ]);
        let statements = vec![Statement::allow(["dynamodb:PutItem"], [table_arn])];
        Ok(self.declare(
            stack,
            config,
            TriggerPoint::PostConfirmation,
            variables,
            statements,
        )?)
    }
}
