//! Benchmark runner binary.
//!
//! Evaluates one or more analysis backends against the patient-level
//! ground-truth suite and optionally pushes labeled results to the
//! external persistence endpoint.

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use claimscope::bench::{
    load_cases, render_summary, BenchmarkRunner, BenchmarkUpload, PatientBenchmarkMetrics,
    RestResultsPusher, ResultsPusher,
};
use claimscope::config::{Config, LoggingConfig};
use claimscope::services::llm::{
    LlmClient, LocalHeuristicProvider, ProviderRegistry, RemoteAnalysisProvider,
    HEURISTIC_PROVIDER_NAME,
};

#[derive(Parser, Debug)]
#[command(name = "claimscope-bench")]
#[command(version, about = "Claimscope - patient-level billing analysis benchmarks")]
struct Args {
    /// Backend to evaluate: medgemma | openai | gemini | baseline | all,
    /// or a raw registered provider name.
    #[arg(long, default_value = "baseline")]
    model: String,

    /// Case subset to run (e.g. high_signal).
    #[arg(long)]
    subset: Option<String>,

    /// Push results to the configured persistence endpoint.
    #[arg(long)]
    push_to_supabase: bool,

    /// Environment label attached to emitted results.
    #[arg(long, default_value = "local")]
    environment: String,

    /// Provenance labels attached to emitted results.
    #[arg(long)]
    commit_sha: Option<String>,
    #[arg(long)]
    branch_name: Option<String>,
    #[arg(long)]
    triggered_by: Option<String>,

    /// Path to configuration file.
    #[arg(long, value_name = "PATH")]
    config: Option<String>,

    /// Directory of patient_*.json cases (overrides config).
    #[arg(long, value_name = "DIR")]
    profiles_dir: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    let config = Config::load(args.config.as_deref().map(Path::new));
    let _log_guard = init_tracing(&config.logging);

    let registry = Arc::new(build_registry(&config).await);
    ProviderRegistry::install(registry.clone());
    tracing::info!(providers = ?registry.list(), "provider registry ready");

    let profiles_dir = args
        .profiles_dir
        .clone()
        .unwrap_or_else(|| config.benchmark.profiles_dir.clone());
    let cases = match load_cases(Path::new(&profiles_dir), args.subset.as_deref()) {
        Ok(cases) if !cases.is_empty() => cases,
        Ok(_) => {
            tracing::error!("no patient cases found in {profiles_dir}");
            return ExitCode::from(1);
        },
        Err(e) => {
            tracing::error!("{e}");
            return ExitCode::from(1);
        },
    };
    tracing::info!(cases = cases.len(), subset = ?args.subset, "loaded benchmark cases");

    let labels: Vec<String> = if args.model == "all" {
        ["medgemma", "openai", "gemini", "baseline"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    } else {
        vec![args.model.clone()]
    };

    let mut any_failed = false;
    for label in labels {
        let provider_name = resolve_provider_name(&config, &label);
        let Some(provider) = registry.get(&provider_name) else {
            tracing::error!(model = %label, provider = %provider_name, "provider not registered");
            any_failed = true;
            continue;
        };

        let runner = BenchmarkRunner::new(
            provider_name.clone(),
            provider,
            config.benchmark.cost_per_second,
        );
        let Some(metrics) = runner.run(&cases).await else {
            any_failed = true;
            continue;
        };

        println!("\n{}", render_summary(&metrics));

        if let Err(e) = save_results(&config, &metrics) {
            tracing::warn!("failed to save results: {e}");
        }

        if args.push_to_supabase {
            if let Err(e) = push_results(&config, &args, &metrics).await {
                tracing::error!("push failed: {e}");
                any_failed = true;
            }
        }
    }

    if any_failed {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}

/// Map a CLI model label to a registered provider name.
fn resolve_provider_name(config: &Config, label: &str) -> String {
    match label {
        "openai" => config.providers.openai.model.clone(),
        "gemini" => config.providers.gemini.model.clone(),
        "baseline" => HEURISTIC_PROVIDER_NAME.to_string(),
        "medgemma" => config
            .providers
            .medgemma
            .as_ref()
            .map(|b| b.model.clone())
            .unwrap_or_else(|| "medgemma".to_string()),
        other => other.to_string(),
    }
}

/// Register every configured provider. Health-check failures and missing
/// keys omit that provider without affecting the others.
async fn build_registry(config: &Config) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    registry.register_unchecked(Arc::new(LocalHeuristicProvider::new()));

    match LlmClient::new(config.retry.to_policy()) {
        Ok(client) => {
            let client = Arc::new(client);
            registry
                .register(Arc::new(RemoteAnalysisProvider::openai(
                    config.providers.openai.to_backend(),
                    client.clone(),
                )))
                .await;
            registry
                .register(Arc::new(RemoteAnalysisProvider::gemini(
                    config.providers.gemini.to_backend(),
                    client.clone(),
                )))
                .await;
            if let Some(medgemma) = &config.providers.medgemma {
                registry
                    .register(Arc::new(RemoteAnalysisProvider::openai(
                        medgemma.to_backend(),
                        client,
                    )))
                    .await;
            }
        },
        Err(e) => tracing::error!("failed to build LLM client: {e}"),
    }

    registry
}

fn save_results(config: &Config, metrics: &PatientBenchmarkMetrics) -> anyhow::Result<()> {
    let dir = Path::new(&config.benchmark.results_dir);
    std::fs::create_dir_all(dir).context("creating results directory")?;

    let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    let path = dir.join(format!("{}_{}.json", metrics.model_name, timestamp));
    let payload = serde_json::to_string_pretty(metrics).context("serializing results")?;
    std::fs::write(&path, payload).context("writing results file")?;

    tracing::info!(path = %path.display(), "results saved");
    Ok(())
}

async fn push_results(
    config: &Config,
    args: &Args,
    metrics: &PatientBenchmarkMetrics,
) -> anyhow::Result<()> {
    let endpoint = config
        .benchmark
        .push_endpoint
        .as_ref()
        .context("no push endpoint configured")?;
    let api_key = std::env::var(&config.benchmark.push_api_key_env).ok();

    let upload = BenchmarkUpload {
        model_name: metrics.model_name.clone(),
        environment: args.environment.clone(),
        commit_sha: args.commit_sha.clone(),
        branch_name: args.branch_name.clone(),
        triggered_by: args.triggered_by.clone(),
        generated_at: metrics.generated_at.clone(),
        metrics: metrics.clone(),
    };

    let pusher = RestResultsPusher::new(endpoint.clone(), api_key);
    pusher.push(&upload).await?;
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.clone()));

    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer());

    if let Some(file) = &logging.file {
        let path = Path::new(file);
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "claimscope-bench.log".to_string());
        let appender = tracing_appender::rolling::never(dir, name);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(non_blocking)
                    .with_ansi(false),
            )
            .init();
        Some(guard)
    } else {
        registry.init();
        None
    }
}
