use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use annolite::config::{EngineConfig, ServiceConfig};
use annolite::pipeline::Pipeline;
use annolite::profiles::{UserProfile, UserTier};
use annolite::shutdown::install_shutdown_handler;
use annolite::store::JobStatus;

#[derive(Parser, Debug)]
#[command(name = "annolite")]
#[command(version)]
#[command(about = "Queue-driven genome annotation pipeline with tiered result archival")]
#[command(propagate_version = true)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Run all pipeline workers until interrupted
    Serve(ServeArgs),

    /// Submit an annotation job and wait for it to complete
    Submit(SubmitArgs),
}

#[derive(Parser, Debug)]
struct ServeArgs {
    /// Root directory for pipeline state (objects, job dirs, vault)
    #[arg(long, default_value = "./annolite-data")]
    root: PathBuf,

    /// External annotation command; the built-in pass-through engine is used
    /// when omitted
    #[arg(long)]
    annotator: Option<String>,
}

#[derive(Parser, Debug)]
struct SubmitArgs {
    /// Input file to annotate (e.g. a .vcf)
    input: PathBuf,

    /// Root directory for pipeline state
    #[arg(long, default_value = "./annolite-data")]
    root: PathBuf,

    /// User submitting the job
    #[arg(long, default_value = "local")]
    user: String,

    /// Contact address for the completion notification
    #[arg(long, default_value = "local@localhost")]
    email: String,

    /// Subscription tier of the submitting user
    #[arg(long, value_enum, default_value_t = TierArg::Free)]
    tier: TierArg,

    /// External annotation command; the built-in pass-through engine is used
    /// when omitted
    #[arg(long)]
    annotator: Option<String>,

    /// Seconds to wait for the job to complete
    #[arg(long, default_value = "60")]
    timeout: u64,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum TierArg {
    Free,
    Premium,
}

impl From<TierArg> for UserTier {
    fn from(tier: TierArg) -> Self {
        match tier {
            TierArg::Free => UserTier::FreeUser,
            TierArg::Premium => UserTier::PremiumUser,
        }
    }
}

fn build_config(root: PathBuf, annotator: Option<String>) -> ServiceConfig {
    let mut config = ServiceConfig::with_root(root);
    if let Some(program) = annotator {
        config.engine = EngineConfig::Command {
            program,
            args: Vec::new(),
        };
    }
    config
}

async fn run_serve(args: ServeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let pipeline = Pipeline::new(build_config(args.root, args.annotator));
    let shutdown = install_shutdown_handler();
    let handles = pipeline.spawn_workers(&shutdown);

    tracing::info!("pipeline serving, press Ctrl-C to stop");
    shutdown.cancelled().await;
    for handle in handles {
        let _ = handle.await;
    }
    Ok(())
}

async fn run_submit(args: SubmitArgs) -> Result<(), Box<dyn std::error::Error>> {
    let pipeline = Pipeline::new(build_config(args.root, args.annotator));
    pipeline.profiles.register(UserProfile {
        user_id: args.user.clone(),
        name: args.user.clone(),
        email: args.email.clone(),
        tier: args.tier.into(),
    });

    let shutdown = install_shutdown_handler();
    let _handles = pipeline.spawn_workers(&shutdown);

    let submission = pipeline.submit(&args.input, &args.user).await?;
    println!("submitted job {}", submission.job_id);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(args.timeout);
    loop {
        if let Some(record) = pipeline.records.get(&submission.job_id) {
            if record.job_status == JobStatus::Completed {
                println!("{}", serde_json::to_string_pretty(&record)?);
                shutdown.cancel();
                return Ok(());
            }
        }
        if tokio::time::Instant::now() >= deadline {
            shutdown.cancel();
            return Err(format!(
                "job {} did not complete within {} seconds",
                submission.job_id, args.timeout
            )
            .into());
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    match args.command {
        Commands::Serve(serve_args) => run_serve(serve_args).await,
        Commands::Submit(submit_args) => run_submit(submit_args).await,
    }
}
