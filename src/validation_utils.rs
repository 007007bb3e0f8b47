//! Validation Utilities: Names, Regions, Accounts, and Addresses
//!
//! This module provides:
//! - Checks for the name segments every physical resource name is built from
//! - AWS region and account id format checks
//! - Strict sender email validation for the challenge mailer
//! - Naming-rule checks for S3 buckets, Cognito pools and Lambda functions
//!
//! ## Example
//! ```rust
//! use auth_stack::validation_utils::{is_valid_name_segment, is_valid_region};
//! assert!(is_valid_name_segment("demo"));
//! assert!(is_valid_region("us-east-1"));
//! ```
use regex::Regex;
use std::sync::LazyLock;

static NAME_SEGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9-]{0,30}[A-Za-z0-9])?$").expect("name segment regex")
});

static ENV_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9-]{0,15}$").expect("env name regex"));

static REGION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z]{2}(-gov|-iso[a-z]?)?-[a-z]+-[0-9]$").expect("region regex")
});

static ACCOUNT_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{12}$").expect("account id regex"));

static EMAIL_LOCAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._+\-]+$").expect("email local regex"));

static EMAIL_DOMAIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9.\-]+$").expect("email domain regex"));

static NUMERIC_DOMAIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[?\d+(\.\d+)+\]?$").expect("numeric domain regex"));

static BUCKET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9][a-z0-9.\-]{1,61}[a-z0-9]$").expect("bucket regex")
});

static POOL_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w\s+=,.@\-]{1,128}$").expect("pool name regex"));

static FUNCTION_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,64}$").expect("function name regex"));

/// Validates a stack or app name segment.
///
/// Segments are joined with `-` into physical names, so they may contain
/// letters, digits and inner hyphens only, and are capped at 32 characters.
pub fn is_valid_name_segment(segment: &str) -> bool {
    NAME_SEGMENT.is_match(segment)
}

/// Validates a deployment environment label such as `dev` or `prod-eu`.
pub fn is_valid_env_name(env: &str) -> bool {
    ENV_NAME.is_match(env)
}

/// Validates an AWS region code (`us-east-1`, `us-gov-west-1`, ...).
pub fn is_valid_region(region: &str) -> bool {
    REGION.is_match(region)
}

/// Validates a 12 digit AWS account id.
pub fn is_valid_account_id(account: &str) -> bool {
    ACCOUNT_ID.is_match(account)
}

/// Validates an email address format with strict requirements:
///
/// - Local part allows: alphanumeric, periods, hyphens, underscores, plus signs
/// - Local part cannot start or end with a dot, or contain consecutive dots
/// - Domain part cannot be an IP address, bracketed or not
/// - Domain must contain at least one dot and only valid characters
///
/// # Arguments
/// * `email_address` - The email address to validate
///
/// # Returns
/// `true` if the email address is valid, `false` otherwise
pub fn is_valid_email(email_address: &str) -> bool {
    let Some((local_part, domain_part)) = email_address.split_once('@') else {
        return false;
    };
    if domain_part.contains('@') {
        return false;
    }

    if !EMAIL_LOCAL.is_match(local_part)
        || local_part.starts_with('.')
        || local_part.ends_with('.')
        || local_part.contains("..")
    {
        return false;
    }

    if NUMERIC_DOMAIN.is_match(domain_part) || domain_part.starts_with("[IPv6:") {
        return false;
    }

    EMAIL_DOMAIN.is_match(domain_part)
        && !domain_part.starts_with(&['.', '-'][..])
        && !domain_part.ends_with(&['.', '-'][..])
        && domain_part.contains('.')
        && !domain_part.contains("..")
}

/// Validates an S3 bucket name.
///
/// Rules: 3-63 characters, lowercase letters, digits, dots and hyphens,
/// starting and ending with a letter or digit, no adjacent dots and not
/// formatted like an IPv4 address.
pub fn is_valid_bucket_name(name: &str) -> bool {
    BUCKET.is_match(name) && !name.contains("..") && !NUMERIC_DOMAIN.is_match(name)
}

/// Validates a Cognito user pool or identity pool name.
pub fn is_valid_pool_name(name: &str) -> bool {
    POOL_NAME.is_match(name)
}

/// Validates a Lambda function name: 1-64 letters, digits, hyphens or underscores.
pub fn is_valid_function_name(name: &str) -> bool {
    FUNCTION_NAME.is_match(name)
}
