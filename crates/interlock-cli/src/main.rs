//! interlock CLI
//!
//! One-shot processing of a decision request against a live platform:
//! config → HTTP platform client → in-memory channel → consumer group.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tokio::time::{Duration, sleep};
use tracing::info;

use interlock_core::InterlockConfig;
use interlock_core::app::{
    ConsumerGroup, MessageConsumer, PARAM_ACTION, PARAM_MAXIMUM_RETRY, PARAM_TYPE, RequestIngestor,
    RequestParams,
};
use interlock_core::channel::{DecisionChannel, InMemoryDecisionChannel, RedeliveryPolicy};
use interlock_core::domain::{DecisionRequest, DeploymentEvent, RetryThreshold};
use interlock_core::impls::OctopusClient;
use interlock_core::observability::{LogFormat, init_logging};

#[derive(Debug, Parser)]
#[command(name = "interlock", version, about = "Answer paused deployments automatically")]
struct Cli {
    /// Log output format.
    #[arg(long, global = true, env = "INTERLOCK_LOG_FORMAT", default_value = "pretty")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Enqueue one decision request and process it until the channel drains.
    Process(RequestArgs),
    /// Validate a request and its payload locally without calling the platform.
    Check(RequestArgs),
}

#[derive(Debug, Args)]
struct RequestArgs {
    /// Interruption type (ManualIntervention, GuidedFailure).
    #[arg(long = "type")]
    interruption_type: String,

    /// Action to submit (Retry, Fail, Ignore, Exclude, Proceed, Abort).
    #[arg(long)]
    action: String,

    /// Guided failures tolerated before Retry becomes Fail.
    #[arg(long)]
    maximum_retry: Option<String>,

    /// Subscription payload file, `-` for stdin.
    #[arg(long, default_value = "-")]
    payload: PathBuf,

    /// Optional TOML config file. OCTOPUS_* env vars override it.
    #[arg(long, env = "INTERLOCK_CONFIG")]
    config: Option<PathBuf>,
}

impl RequestArgs {
    fn params(&self) -> RequestParams {
        let mut params = RequestParams::new();
        params.insert(PARAM_TYPE.to_string(), self.interruption_type.clone());
        params.insert(PARAM_ACTION.to_string(), self.action.clone());
        if let Some(max) = &self.maximum_retry {
            params.insert(PARAM_MAXIMUM_RETRY.to_string(), max.clone());
        }
        params
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format);

    match cli.command {
        Commands::Process(args) => process(args).await,
        Commands::Check(args) => check(args).await,
    }
}

async fn process(args: RequestArgs) -> Result<()> {
    // (A) 設定と platform client
    let config = InterlockConfig::load(args.config.as_deref()).context("loading configuration")?;
    let platform = OctopusClient::new(&config).context("building platform client")?;
    info!(server = config.base_url(), "configuration loaded");

    // (B) channel と consumer group
    let channel = Arc::new(InMemoryDecisionChannel::new(
        config.consumer.redelivery.clone(),
    ));
    let consumer = Arc::new(MessageConsumer::new(Arc::new(platform)));
    let group = ConsumerGroup::spawn(config.consumer.workers, channel.clone(), consumer);

    // (C) リクエスト投入
    let body = read_payload(&args.payload)?;
    let ingestor = RequestIngestor::new(channel.clone());
    let message_id = ingestor.accept(&args.params(), body).await?;
    println!("enqueued: {message_id}");

    // (D) drain されるまで待つ（ack か dead-letter のどちらか）
    loop {
        let counts = channel.counts().await?;
        if counts.is_drained() {
            println!(
                "counts: acknowledged={} dead_lettered={}",
                counts.acknowledged, counts.dead_lettered
            );
            break;
        }
        sleep(Duration::from_millis(100)).await;
    }

    // (E) 止める
    group.shutdown_and_join().await;

    let dead = channel.dead_letters().await;
    if !dead.is_empty() {
        for record in &dead {
            println!(
                "dead-lettered: {} after {} receive(s): {}",
                record.message_id,
                record.receive_count,
                record.last_error.as_deref().unwrap_or("unknown error")
            );
        }
        bail!("{} message(s) could not be processed", dead.len());
    }
    Ok(())
}

async fn check(args: RequestArgs) -> Result<()> {
    let body = read_payload(&args.payload)?;

    // ingestor と consumer が行う検証をそのまま通す（platform には触らない）
    let channel = Arc::new(InMemoryDecisionChannel::new(RedeliveryPolicy::default()));
    RequestIngestor::new(channel.clone())
        .accept(&args.params(), body)
        .await?;
    let lease = channel
        .try_lease()
        .await
        .context("validated request was not enqueued")?;
    let request = DecisionRequest::from_message(&lease.delivery().message)?;
    let event = DeploymentEvent::parse(&request.raw_payload)?;
    RetryThreshold::parse(Some(&request.maximum_retry))?;

    println!(
        "ok: {} {} on {} in {} (maximum retry {})",
        request.interruption_type,
        request.action,
        event.target_document(),
        event.space_id,
        request.maximum_retry
    );
    Ok(())
}

fn read_payload(path: &Path) -> Result<Vec<u8>> {
    if path.as_os_str() == "-" {
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .context("reading payload from stdin")?;
        return Ok(buf);
    }
    let buf = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    if buf.is_empty() {
        bail!("{} is empty", path.display());
    }
    Ok(buf)
}
