use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use piiscan::classify::PatternClassifier;
use piiscan::config::{Config, RemoteConfig};
use piiscan::ocr::OcrProvider;
use piiscan::pipeline::{BatchProcessor, TracingProgress};
use piiscan::report::{assembler_for, ReportFormat};
use piiscan::source::{ImageSource, LocalDirectory, RemoteListing};
use piiscan::PiiScanError;

#[derive(Parser)]
#[command(name = "piiscan")]
#[command(about = "Detect PII in batches of images and write a report")]
struct Args {
    #[command(subcommand)]
    source: SourceCommand,

    /// Directory the report is written to
    #[arg(long, global = true, default_value = ".")]
    output: PathBuf,

    /// Report format: docx, json or text (default from REPORT_FORMAT)
    #[arg(long, global = true)]
    format: Option<ReportFormat>,

    /// Append a section listing images that failed
    #[arg(long, global = true)]
    include_failures: bool,

    /// Images processed at once (default from BATCH_CONCURRENCY)
    #[arg(long, global = true)]
    concurrency: Option<usize>,
}

#[derive(Subcommand)]
enum SourceCommand {
    /// Scan image files in a local directory
    Local {
        /// Directory containing png/jpg/jpeg/gif/bmp files
        dir: PathBuf,
    },
    /// Scan objects in S3 (or S3-compatible) buckets
    Remote {
        /// Bucket to scan; repeat for several. Lists all buckets when omitted
        #[arg(long = "bucket")]
        buckets: Vec<String>,

        #[arg(long, env = "AWS_ACCESS_KEY_ID", hide_env_values = true)]
        access_key: Option<String>,

        #[arg(long, env = "AWS_SECRET_ACCESS_KEY", hide_env_values = true)]
        secret_key: Option<String>,

        #[arg(long, env = "AWS_REGION")]
        region: Option<String>,

        /// Custom endpoint for S3-compatible stores (path-style addressing)
        #[arg(long, env = "S3_ENDPOINT")]
        endpoint: Option<String>,
    },
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "piiscan=info".into());
    let registry = tracing_subscriber::registry().with(filter);

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Merge the credential flags over the environment's remote section.
fn remote_config(
    base: Option<RemoteConfig>,
    access_key: Option<String>,
    secret_key: Option<String>,
    region: Option<String>,
    endpoint: Option<String>,
) -> anyhow::Result<RemoteConfig> {
    let mut config = match (base, access_key.as_deref(), secret_key.as_deref()) {
        (Some(base), _, _) => base,
        (None, Some(access), Some(secret)) => {
            let mut config = RemoteConfig::new(access, secret, "us-east-1");
            config.session_token = std::env::var("AWS_SESSION_TOKEN").ok();
            config
        }
        _ => {
            return Err(PiiScanError::Config(
                "AWS credentials required: set AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY \
                 or pass --access-key and --secret-key"
                    .to_string(),
            )
            .into())
        }
    };

    if let (Some(access), Some(secret)) = (access_key, secret_key) {
        config.access_key = access;
        config.secret_key = secret;
    }
    if let Some(region) = region {
        config.region = region;
    }
    if endpoint.is_some() {
        config.endpoint = endpoint;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    init_tracing();

    let mut config = Config::from_env();
    if let Some(format) = args.format {
        config.report.format = format;
    }
    if args.include_failures {
        config.report.include_failures = true;
    }
    if let Some(concurrency) = args.concurrency {
        config.batch.concurrency = concurrency;
    }
    let config = config.normalized();

    let source = match args.source {
        SourceCommand::Local { dir } => ImageSource::from(LocalDirectory::new(dir)),
        SourceCommand::Remote {
            buckets,
            access_key,
            secret_key,
            region,
            endpoint,
        } => {
            let remote = remote_config(
                config.remote.clone(),
                access_key,
                secret_key,
                region,
                endpoint,
            )?;
            tracing::info!(region = %remote.region, "Connecting to object storage...");
            ImageSource::from(RemoteListing::connect(remote)?.with_buckets(buckets))
        }
    };

    tracing::info!("Initializing OCR provider: {}...", config.ocr.model);
    let ocr = OcrProvider::new(&config.ocr)?;
    if let Some(reason) = ocr.unavailable_reason() {
        return Err(PiiScanError::OcrUnavailable(reason.to_string()).into());
    }
    let classifier = PatternClassifier::new(&config.classifier)?;

    let items = source.enumerate(&config.batch).await?;

    let processor = BatchProcessor::new(
        Arc::new(ocr),
        Arc::new(classifier),
        &config.batch,
        &config.fetch,
    )?;

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

    let result = processor.run_with(items, &TracingProgress, &cancel).await;

    let assembler = assembler_for(&config.report);
    let artifact = match assembler.assemble(&result) {
        Ok(artifact) => artifact,
        Err(PiiScanError::EmptyInput) => {
            tracing::warn!(
                failed = result.failed,
                skipped = result.skipped,
                "No images were processed successfully, no report written"
            );
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    tokio::fs::create_dir_all(&args.output).await?;
    let path = args.output.join(&artifact.filename);
    tokio::fs::write(&path, &artifact.bytes).await?;
    tracing::info!(
        path = %path.display(),
        bytes = artifact.len(),
        records = result.succeeded,
        failures = result.failed,
        "Report written"
    );

    Ok(())
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::warn!("Interrupt received, finishing in-flight images and stopping...");
            cancel.cancel();
        }
        Err(e) => tracing::warn!("Failed to install Ctrl+C handler: {}", e),
    }
}
