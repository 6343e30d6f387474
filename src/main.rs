//! CLI entry point for the call outcome rater.
//!
//! Provides subcommands for pulling calls from the voice platform,
//! classifying stored calls, building routing-performance rollups and
//! analyzing a single call export.

mod infra;
mod services;

use crate::infra::config::{ClientConfig, require_env};
use crate::infra::vapi::client::VoicePlatformClient;
use crate::services::call_source::CallSource;
use anyhow::{Context, Result, bail};
use call_outcome_rater::analyzers::analyzer::build_report;
use call_outcome_rater::analyzers::window::Window;
use call_outcome_rater::analyzers::writetos3::write_json_to_s3;
use call_outcome_rater::classify::llm::LlmClassifier;
use call_outcome_rater::classify::{ClassifierMode, classify_offline};
use call_outcome_rater::features::{ExtractorConfig, Features};
use call_outcome_rater::fetch::auth::ApiKey;
use call_outcome_rater::llm::OpenAiChatClient;
use call_outcome_rater::{
    analyzers::aggregate::CallOutcome,
    fetch::{BasicClient, fetch_bytes},
    output::{OutcomeRow, append_records, print_json, write_json},
    parser::parse_calls,
    pipeline::Pipeline,
    store::{CallStore, ClassificationStore, group_by_day},
};
use chrono::{NaiveDate, TimeZone, Utc};
use clap::{Parser, Subcommand};
use std::ffi::OsStr;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

type ChatClient = OpenAiChatClient<ApiKey<BasicClient>>;

const DEFAULT_CONFIG: &str = "client.json";

#[derive(Parser)]
#[command(name = "call_outcome_rater")]
#[command(about = "Classify voice-assistant calls and report routing performance", long_about = None)]
struct Cli {
    /// Client config file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify a call export from a file or URL with rules only
    Analyze {
        /// Path to file or URL to fetch
        #[arg(value_name = "FILE_OR_URL")]
        source: String,

        /// CSV file to append results to
        #[arg(short, long, default_value = "outcomes.csv")]
        output: String,
    },
    /// Pull calls from the voice platform into daily call files
    Fetch {
        /// First UTC day to fetch (YYYY-MM-DD)
        #[arg(long)]
        from: NaiveDate,

        /// Last UTC day to fetch, inclusive (defaults to --from)
        #[arg(long)]
        to: Option<NaiveDate>,
    },
    /// Classify stored calls and merge results into the classification store
    Classify {
        #[arg(long)]
        from: NaiveDate,

        /// Last day, inclusive (defaults to --from)
        #[arg(long)]
        to: Option<NaiveDate>,

        /// Override the configured classifier mode (hybrid, llm, rules)
        #[arg(long, value_parser = parse_mode)]
        mode: Option<ClassifierMode>,

        /// Reclassify calls that already have a stored classification
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Build daily, weekly and rolling rollups
    Report {
        /// Last day of every window (defaults to the latest day with calls)
        #[arg(long)]
        end: Option<NaiveDate>,

        /// Extra window: day:YYYY-MM-DD, week:YYYY-Www, days:N, months:N,
        /// range:YYYY-MM-DD..YYYY-MM-DD
        #[arg(short, long = "window")]
        windows: Vec<String>,

        /// Skip the standard day/week/7d/30d/3m windows
        #[arg(long, default_value_t = false)]
        no_standard: bool,

        /// Write the report JSON here instead of stdout
        #[arg(short, long)]
        output: Option<String>,

        /// Append per-call rows for the report range to this CSV
        #[arg(long)]
        csv: Option<String>,

        /// Optional: S3 bucket name to upload the report to
        #[arg(long)]
        s3_bucket: Option<String>,

        /// Optional: Gzip the report before uploading to S3
        #[arg(long, default_value_t = false)]
        gzip: bool,
    },
}

fn parse_mode(s: &str) -> std::result::Result<ClassifierMode, String> {
    serde_json::from_value(serde_json::Value::String(s.to_lowercase()))
        .map_err(|_| format!("unknown mode '{s}' (expected hybrid, llm or rules)"))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/call_outcome_rater.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("call_outcome_rater.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze { source, output } => {
            let extractor = match &cli.config {
                Some(path) => ClientConfig::load(path)?.extractor(),
                None => ExtractorConfig::default(),
            };
            analyze(&source, &output, &extractor).await?;
        }
        Commands::Fetch { from, to } => {
            let config = load_config(cli.config.as_deref())?;
            fetch_days(&config, from, to.unwrap_or(from)).await?;
        }
        Commands::Classify {
            from,
            to,
            mode,
            force,
        } => {
            let config = load_config(cli.config.as_deref())?;
            classify_days(&config, from, to.unwrap_or(from), mode, force).await?;
        }
        Commands::Report {
            end,
            windows,
            no_standard,
            output,
            csv,
            s3_bucket,
            gzip,
        } => {
            let config = load_config(cli.config.as_deref())?;
            report(
                &config,
                end,
                &windows,
                no_standard,
                output.as_deref(),
                csv.as_deref(),
                s3_bucket.as_deref(),
                gzip,
            )
            .await?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&str>) -> Result<ClientConfig> {
    let path = path.unwrap_or(DEFAULT_CONFIG);
    let config = ClientConfig::load(path)?;
    info!(
        client_id = %config.client_id,
        client = config.display_name.as_deref().unwrap_or(""),
        data_dir = %config.data_dir,
        "Client config loaded"
    );
    Ok(config)
}

/// Loads call data from a local file path or fetches it over HTTP.
#[tracing::instrument(fields(source = %url))]
async fn fetcher(url: &str) -> Result<Vec<u8>> {
    let bytes = if url.starts_with("http") {
        let client = BasicClient::new();
        fetch_bytes(&client, url).await?
    } else {
        std::fs::read(url).with_context(|| format!("failed to read {url}"))?
    };
    Ok(bytes)
}

/// Rules-only pass over one export, appending one CSV row per call.
async fn analyze(source: &str, output: &str, extractor: &ExtractorConfig) -> Result<()> {
    let bytes = fetcher(source).await?;
    let calls = parse_calls(&bytes)?;

    let rows: Vec<OutcomeRow> = calls
        .iter()
        .map(|call| {
            let features = Features::from_call(call, extractor);
            let classification = classify_offline(call, &features);
            OutcomeRow::from(&CallOutcome::resolve(call, &features, classification))
        })
        .collect();

    append_records(output, &rows)?;
    info!(calls = rows.len(), output, "Export analyzed");
    Ok(())
}

#[tracing::instrument(skip(config), fields(client_id = %config.client_id, from = %from, to = %to))]
async fn fetch_days(config: &ClientConfig, from: NaiveDate, to: NaiveDate) -> Result<()> {
    let api_key = require_env(&config.voice_platform.api_key_env)?;
    let client = VoicePlatformClient::new(
        &api_key,
        config.voice_platform.base_url.clone(),
        config.voice_platform.page_size,
    )?;
    let store = CallStore::new(&config.data_dir);

    for day in from.iter_days().take_while(|d| *d <= to) {
        let (Some(start), Some(end)) = (
            day.and_hms_opt(0, 0, 0),
            day.succ_opt().and_then(|next| next.and_hms_opt(0, 0, 0)),
        ) else {
            bail!("day {day} is out of range");
        };

        let calls = client
            .list_calls(Utc.from_utc_datetime(&start), Utc.from_utc_datetime(&end))
            .await?;

        for (date, day_calls) in group_by_day(calls) {
            if date != day {
                warn!(requested = %day, got = %date, calls = day_calls.len(), "Platform returned calls outside the requested day");
            }
            let stored = store.merge_day(date, day_calls)?;
            info!(date = %date, stored, "Call day file updated");
        }
    }
    Ok(())
}

#[tracing::instrument(skip(config), fields(client_id = %config.client_id, from = %from, to = %to))]
async fn classify_days(
    config: &ClientConfig,
    from: NaiveDate,
    to: NaiveDate,
    mode: Option<ClassifierMode>,
    force: bool,
) -> Result<()> {
    let pipeline_config = config.pipeline(mode, force);

    // Credentials are checked before any work starts.
    let classifier: Option<LlmClassifier<ChatClient>> = if pipeline_config.mode.uses_model() {
        let api_key = require_env(&config.llm.api_key_env)?;
        let http = ApiKey::bearer(
            BasicClient::with_timeout(Duration::from_secs(config.llm.timeout_secs))?,
            &api_key,
        )?;
        let chat = OpenAiChatClient::new(http, config.llm.base_url.clone(), config.llm.model.clone())
            .with_temperature(config.llm.temperature);
        Some(LlmClassifier::new(chat).with_transcript_chars(config.classifier.transcript_chars))
    } else {
        None
    };

    let calls = CallStore::new(&config.data_dir);
    let store = ClassificationStore::new(&config.data_dir);
    let mut pipeline = Pipeline::new(&calls, &store, classifier.as_ref(), pipeline_config)?;
    let summary = pipeline.run(from, to).await?;

    if summary.failed_batches > 0 {
        warn!(
            failed_batches = summary.failed_batches,
            "Some batches failed and were classified by fallback rules; re-run to retry those calls"
        );
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
#[tracing::instrument(skip(config, windows), fields(client_id = %config.client_id))]
async fn report(
    config: &ClientConfig,
    end: Option<NaiveDate>,
    windows: &[String],
    no_standard: bool,
    output: Option<&str>,
    csv: Option<&str>,
    s3_bucket: Option<&str>,
    gzip: bool,
) -> Result<()> {
    let calls = CallStore::new(&config.data_dir);
    let store = ClassificationStore::new(&config.data_dir);

    let end = match end {
        Some(end) => end,
        None => calls
            .latest_day()?
            .context("no call data found; run `fetch` first or pass --end")?,
    };

    let mut requested = if no_standard {
        Vec::new()
    } else {
        Window::standard(end)
    };
    for spec in windows {
        requested.push(Window::parse(spec, end)?);
    }

    let (report, outcomes) = build_report(
        &calls,
        &store,
        &config.extractor(),
        &config.client_id,
        end,
        &requested,
    )?;

    for w in &report.windows {
        info!(
            window = %w.window.label,
            total = w.total_calls,
            routed = w.counts.routed,
            routing_rate = w.rates.routing_rate,
            "Window aggregated"
        );
    }

    match output {
        Some(path) => write_json(path, &report)?,
        None => print_json(&report)?,
    }

    if let Some(path) = csv {
        let rows: Vec<OutcomeRow> = outcomes.iter().map(OutcomeRow::from).collect();
        append_records(path, &rows)?;
    }

    if let Some(bucket) = s3_bucket {
        let aws = aws_config::load_from_env().await;
        let s3 = aws_sdk_s3::Client::new(&aws);
        let key = format!("reports/{}/{}.json", config.client_id, end);
        write_json_to_s3(&s3, bucket, &key, &report, gzip).await?;
        info!(bucket, key = %key, gzip, "Report uploaded to S3");
    }

    Ok(())
}
