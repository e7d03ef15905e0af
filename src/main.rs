// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand, ValueEnum};
use kamaji::{
    config::OpenStackConfig,
    context::Context,
    models::{Compute, Project, Zone},
    openstack::{ResourcePath, ResourceShortcut, Scope, SessionProvider},
    remote::{MemoryStore, RemoteModel},
};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Parser)]
#[command(name = "kamaji-os", about = "Inspect and synchronize OpenStack resources")]
struct Cli {
    /// YAML configuration file; settings are read from the environment when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Project to scope requests to instead of the admin scope.
    #[arg(long, global = true)]
    project: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the resolved endpoint catalog.
    Endpoints,

    /// Fetch a resource, optionally filtering a collection down to one item.
    Get {
        /// Catalog service type (e.g. "compute")
        service: String,
        /// Resource collection (e.g. "os-hypervisors")
        resource: String,
        /// Extra path segments below the collection
        path: Vec<String>,
        /// `key=value` equality filter; values are parsed as JSON when possible
        #[arg(long = "filter", value_parser = parse_filter)]
        filters: Vec<(String, Value)>,
    },

    /// Synchronize a model against an in-memory store and print its rows.
    Sync {
        #[arg(value_enum)]
        model: SyncTarget,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SyncTarget {
    Compute,
    Project,
    Zone,
}

/// Parse `key=value`, reading the value as JSON and falling back to a string.
fn parse_filter(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    if key.is_empty() {
        return Err(format!("missing key in '{raw}'"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn main() -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("kamaji-os")
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

fn initialize_logging() {
    // RUST_LOG selects the level (default info), RUST_LOG_FORMAT=json switches output
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_writer(std::io::stderr)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_writer(std::io::stderr)
                .with_ansi(true)
                .compact()
                .init();
        }
    }
}

async fn async_main() -> Result<()> {
    let cli = Cli::parse();
    initialize_logging();
    debug!(?cli, "Parsed command line");

    let config = match &cli.config {
        Some(path) => OpenStackConfig::from_yaml_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => OpenStackConfig::from_env().context("loading configuration from environment")?,
    };
    let ctx = Context::new(config, Arc::new(MemoryStore::new()))?;
    let scope = cli.project.clone().map_or(Scope::Admin, Scope::project);

    let output = match cli.command {
        Command::Endpoints => {
            let endpoints = ctx.sessions().get_endpoints(&scope).await?;
            serde_json::to_value(endpoints)?
        }
        Command::Get {
            service,
            resource,
            path,
            filters,
        } => {
            let path = path
                .iter()
                .fold(ResourcePath::collection(), |path, segment| path.push(segment));
            let filters: Vec<(&str, Value)> = filters
                .iter()
                .map(|(key, value)| (key.as_str(), value.clone()))
                .collect();
            ResourceShortcut::new(ctx.client(scope), service, resource)
                .with_path(path)
                .get(&filters)
                .await?
        }
        Command::Sync { model } => match model {
            SyncTarget::Compute => sync_rows::<Compute>(&ctx, scope).await?,
            SyncTarget::Project => sync_rows::<Project>(&ctx, scope).await?,
            SyncTarget::Zone => sync_rows::<Zone>(&ctx, scope).await?,
        },
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn sync_rows<M: RemoteModel>(ctx: &Context, scope: Scope) -> Result<Value> {
    let objects = ctx.objects::<M>()?.with_scope(scope);
    let report = objects.synchronize().await?;
    info!(
        model = M::NAME,
        created = report.created,
        skipped = report.skipped,
        pruned = report.pruned,
        "Synchronize finished"
    );

    let rows: Vec<Value> = objects
        .all()
        .await?
        .iter()
        .map(|model| {
            let record = model.record();
            json!({
                "local_id": record.local_id(),
                "remote_id": record.remote_id(),
            })
        })
        .collect();
    Ok(Value::Array(rows))
}
