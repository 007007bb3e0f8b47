//! Template synthesizer.
//!
//! Resolves the deployment configuration from the environment (and `.env`
//! when present), composes the authentication stack and writes the rendered
//! template to a file or stdout. Deploying it is left to the provisioning
//! engine.
use anyhow::{Context, Result};
use auth_stack::{
    AppConfig, AssetFunctions, compose, render_template, template_meta, to_pretty_json,
};
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "synth")]
#[command(about = "Render the authentication stack as a deployment template")]
struct Args {
    /// Write the template here instead of stdout
    #[arg(long, short)]
    out: Option<PathBuf>,

    /// Print the resource creation order to stderr
    #[arg(long)]
    order: bool,

    /// Runtime for the trigger functions
    #[arg(long, default_value = "python3.12")]
    runtime: String,

    /// Log retention for the trigger functions, in days
    #[arg(long, default_value = "7")]
    log_retention_days: u32,
}

#[cfg(not(tarpaulin_include))]
fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = AppConfig::from_env().context("resolving deployment configuration")?;
    info!(stack = %config.stack_id(), region = %config.region, "synthesizing");

    let units = AssetFunctions {
        runtime: args.runtime,
        log_retention_days: args.log_retention_days,
        ..AssetFunctions::default()
    };
    let graph = compose(&config, &units).context("composing authentication stack")?;

    if args.order {
        for (step, id) in graph.creation_order().iter().enumerate() {
            eprintln!("{:>3}. {}", step + 1, id);
        }
    }

    let template = render_template(&graph, &template_meta(&config))?;
    let text = to_pretty_json(&template)?;
    match args.out {
        Some(path) => {
            fs::write(&path, text)
                .with_context(|| format!("writing template to {}", path.display()))?;
            info!(path = %path.display(), resources = graph.len(), "template written");
        }
        None => print!("{text}"),
    }
    Ok(())
}
