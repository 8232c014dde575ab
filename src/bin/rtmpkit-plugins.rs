//! rtmpkit Plugin Tool
//!
//! Inspects the plugins an rtmpkit host would load and dry-runs option
//! dispatch against them.
//!
//! # Usage
//!
//! ```bash
//! # List registered plugins
//! rtmpkit-plugins list
//!
//! # Print the options plugins provide, as shown on a help screen
//! rtmpkit-plugins usage
//!
//! # Dispatch options onto a scratch connection
//! rtmpkit-plugins check --opt counts=1 --opt playpath=live
//!
//! # Search a specific directory instead of the system one
//! rtmpkit-plugins --plugin-dir ./target/debug list --json
//! ```

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use rtmpkit_core::config::{AppConfig, LogFormat, LoggingConfig};
use rtmpkit_plugin_api::{Connection, PluginHost};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// rtmpkit Plugin Tool - Inspect and exercise native plugins
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "RTMPKIT_CONFIG")]
    config: Option<PathBuf>,

    /// Plugin directory to search instead of the system directory
    #[arg(short, long)]
    plugin_dir: Option<PathBuf>,

    /// Override the configured log level
    #[arg(short, long)]
    log_level: Option<String>,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List registered plugins in registration order
    List,
    /// Print the options provided by plugins
    Usage,
    /// Dispatch connection options and report which plugin took each one
    Check {
        /// Option as name=value; may be repeated
        #[arg(long = "opt", value_name = "NAME=VALUE", value_parser = parse_option)]
        options: Vec<(String, String)>,
    },
}

#[derive(Debug, Serialize)]
struct CheckResult {
    option: String,
    value: String,
    plugin: Option<String>,
    handled: bool,
}

fn parse_option(raw: &str) -> Result<(String, String)> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("expected NAME=VALUE, got {raw:?}"))?;
    if name.is_empty() {
        return Err(anyhow!("option name must not be empty"));
    }
    Ok((name.to_string(), value.to_string()))
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match args.config {
        Some(ref path) => AppConfig::from_config_builder(path)
            .with_context(|| format!("Failed to load config file: {}", path.display()))?,
        None => AppConfig::new(),
    };
    if let Some(ref level) = args.log_level {
        config.logging.level = level.clone();
    }
    if let Some(ref dir) = args.plugin_dir {
        config.plugins.system_dir = dir.clone();
    }
    config.validate().context("Invalid configuration")?;

    init_logging(&config.logging)?;
    debug!(dirs = ?config.plugins.search_dirs(), "Plugin search path");

    let host = PluginHost::builder().config(config.plugins).build();

    match args.command {
        Command::List => list(&host, args.json),
        Command::Usage => usage(&host, args.json),
        Command::Check { ref options } => check(&host, options, args.json),
    }
}

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let level = logging.parse_level()?;
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match logging.format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
    Ok(())
}

fn list(host: &PluginHost, json: bool) -> Result<()> {
    let plugins = host.plugins();
    if json {
        println!("{}", serde_json::to_string_pretty(&plugins)?);
        return Ok(());
    }

    if plugins.is_empty() {
        println!("No plugins found");
        return Ok(());
    }
    for plugin in &plugins {
        println!(
            "{} {} ({} option{}) from {}",
            plugin.info.name,
            plugin.info.version,
            plugin.options.len(),
            if plugin.options.len() == 1 { "" } else { "s" },
            plugin.source
        );
        if !plugin.info.author.is_empty() {
            println!("    author:   {}", plugin.info.author);
        }
        if !plugin.info.homepage.is_empty() {
            println!("    homepage: {}", plugin.info.homepage);
        }
    }
    Ok(())
}

fn usage(host: &PluginHost, json: bool) -> Result<()> {
    let lines = host.option_usage();
    if json {
        println!("{}", serde_json::to_string_pretty(&lines)?);
    } else {
        for line in lines {
            println!("{line}");
        }
    }
    Ok(())
}

fn check(host: &PluginHost, options: &[(String, String)], json: bool) -> Result<()> {
    let mut connection = Connection::new();
    info!(connection = %connection.id(), "Dispatching options on scratch connection");

    let mut results = Vec::with_capacity(options.len());
    for (name, value) in options {
        let outcome = host
            .dispatch(&mut connection, name, value)
            .with_context(|| format!("Failed to dispatch option {name}"))?;
        let plugin = rtmpkit_plugin_api::find_plugin_by_option(host.registry(), name)
            .map(|(plugin, _)| plugin.name().to_string());
        results.push(CheckResult {
            option: name.clone(),
            value: value.clone(),
            plugin,
            handled: outcome.is_handled(),
        });
    }

    let instances = connection.instances().len();
    host.delete_all_instances(&mut connection);
    debug!(instances, "Scratch connection torn down");

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }
    for result in &results {
        match result.plugin {
            Some(ref plugin) => println!("{}={}: handled by {plugin}", result.option, result.value),
            None => println!("{}={}: not handled", result.option, result.value),
        }
    }
    Ok(())
}
