//! # auth-stack
//!
//! Typed declarations for the Cognito authentication stack: a user pool with
//! a custom-challenge flow, federated Google sign-in, a web client, an
//! identity pool and its trust roles. The stack is assembled into an
//! immutable declaration graph and rendered as a deployment template for an
//! external provisioning engine.
//!
//! ## Modules
//! - [`config_utils`]: Environment-sourced deployment configuration
//! - [`validation_utils`]: Name, region, account and email checks
//! - [`naming`]: Physical resource names derived from stack and app
//! - [`intrinsics`], [`iam_policy`], [`cfn_resources`]: Typed resource declarations
//! - [`template`]: Builder and immutable declaration graph
//! - [`triggers`]: Challenge functions and user pool trigger wiring
//! - [`stack`]: Composition of the whole stack
//! - [`json_utils`]: Template rendering
//!
//! ## Usage
//! ```rust,no_run
//! use auth_stack::{AppConfig, AssetFunctions, synthesize, to_pretty_json};
//!
//! let config = AppConfig::from_env()?;
//! let template = synthesize(&config, &AssetFunctions::default())?;
//! println!("{}", to_pretty_json(&template)?);
//! # Ok::<(), anyhow::Error>(())
//! ```
pub mod cfn_resources;
pub mod config_utils;
pub mod iam_policy;
pub mod intrinsics;
pub mod json_utils;
pub mod naming;
pub mod stack;
pub mod template;
pub mod triggers;
pub mod validation_utils;

pub use config_utils::{AppConfig, ChallengeSettings, ConfigError, GoogleCredentials};

pub use json_utils::{TemplateMeta, render_template, to_pretty_json};

pub use stack::{ComposeError, compose, synthesize, template_meta};

pub use template::{DeclarationGraph, Edge, EdgeKind, GraphError, StackBuilder};

pub use triggers::{
    AssetFunctions, ComputeUnits, FunctionRef, TriggerError, TriggerMap, TriggerPoint,
    assemble_triggers,
};
