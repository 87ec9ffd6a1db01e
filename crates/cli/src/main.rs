//! CLI for the Warden protection evaluation engine.
//!
//! Pipeline: load directory -> build engine -> evaluate -> print decision.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use warden_core::{EvaluationRequest, IdentityContext, OperationType, UnitId, UnitIdSet};
use warden_engine::ProtectionEngine;
use warden_provider::{InMemoryDirectory, RetryPolicy, Retrying};

/// Exit status for an evaluation that ended in a typed failure.
const EXIT_EVALUATION_FAILED: i32 = 2;

#[derive(Parser, Debug)]
#[command(name = "warden", version, about = "Unit protection evaluation engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Decide whether an operation is restricted for a user.
    Evaluate {
        /// JSON document with `units`, `assignments`, and `memberships`.
        #[arg(short, long, env = "WARDEN_DIRECTORY")]
        directory: PathBuf,

        /// create, read, update, or delete.
        #[arg(short, long)]
        operation: OperationType,

        /// Resource whose unit assignments govern the decision.
        #[arg(short, long, conflicts_with = "units", required_unless_present = "units")]
        resource: Option<String>,

        /// Comma-separated unit ids; an empty value means no units.
        #[arg(long, value_delimiter = ',')]
        units: Option<Vec<String>>,

        /// Acting user. Omitting it makes the evaluation fail as forbidden.
        #[arg(short, long, env = "WARDEN_USER_ID")]
        user: Option<String>,

        #[arg(long, default_value_t = false)]
        json: bool,

        /// Retries for transient lookup failures.
        #[arg(long, env = "WARDEN_MAX_RETRIES", default_value_t = 0)]
        max_retries: u32,

        /// Backoff before the first retry; doubles per attempt.
        #[arg(long, env = "WARDEN_RETRY_BASE_MS", default_value_t = 200)]
        retry_base_ms: u64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Evaluate {
            directory,
            operation,
            resource,
            units,
            user,
            json,
            max_retries,
            retry_base_ms,
        } => {
            let t0 = Instant::now();

            // 1. Load the directory backing all three lookups.
            let backend = Arc::new(InMemoryDirectory::from_path(&directory)?);
            let policy = RetryPolicy::new(max_retries, Duration::from_millis(retry_base_ms));
            let engine = ProtectionEngine::from_directory(Arc::new(Retrying::new(
                backend.clone(),
                policy,
            )));

            // 2. Build the request.
            let identity = user.map(IdentityContext::new).unwrap_or_default();
            let request = build_request(resource, units, operation, identity);

            // 3. Evaluate.
            let outcome = engine.decide(&request).await;
            let calls = backend.calls();
            tracing::info!(
                lookups = calls.total(),
                elapsed_ms = t0.elapsed().as_millis() as u64,
                "evaluation finished"
            );

            // 4. Report.
            match outcome {
                Ok(decision) if json => {
                    println!("{}", serde_json::to_string_pretty(&decision)?);
                }
                Ok(decision) => {
                    let verdict = if decision.restricted {
                        "restricted"
                    } else {
                        "allowed"
                    };
                    println!(
                        "{} {}: {} ({}, {} unit(s))",
                        decision.operation,
                        request_target(&request),
                        verdict,
                        decision.reason,
                        decision.unit_ids.len()
                    );
                }
                Err(e) => {
                    if json {
                        let body = serde_json::json!({
                            "error": e.code(),
                            "status": e.status_hint(),
                            "message": e.to_string(),
                        });
                        println!("{}", serde_json::to_string_pretty(&body)?);
                    } else {
                        eprintln!("error [{}]: {e}", e.code());
                    }
                    std::process::exit(EXIT_EVALUATION_FAILED);
                }
            }
        }
    }

    Ok(())
}

fn build_request(
    resource: Option<String>,
    units: Option<Vec<String>>,
    operation: OperationType,
    identity: IdentityContext,
) -> EvaluationRequest {
    match resource {
        Some(resource_id) => EvaluationRequest::ByResource {
            resource_id: resource_id.into(),
            operation,
            identity,
        },
        None => EvaluationRequest::ByUnitIds {
            unit_ids: parse_unit_ids(units.unwrap_or_default()),
            operation,
            identity,
        },
    }
}

fn parse_unit_ids(raw: Vec<String>) -> UnitIdSet {
    raw.iter()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty())
        .map(UnitId::from)
        .collect()
}

fn request_target(request: &EvaluationRequest) -> String {
    match request {
        EvaluationRequest::ByResource { resource_id, .. } => format!("on {resource_id}"),
        EvaluationRequest::ByUnitIds { unit_ids, .. } => {
            let ids: Vec<&str> = unit_ids.iter().map(UnitId::as_str).collect();
            format!("over [{}]", ids.join(","))
        }
    }
}
