mod cmd;
mod context;
mod output;

use clap::{Parser, Subcommand};
use cmd::config::ConfigSubcommand;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "tagsync",
    about = "Reconcile CRM contact tags with computed learner engagement state",
    version,
    propagate_version = true
)]
struct Cli {
    /// Config file (default: ./tagsync.yaml)
    #[arg(
        long,
        global = true,
        env = "TAGSYNC_CONFIG",
        default_value = "tagsync.yaml"
    )]
    config: PathBuf,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter config and rule catalog
    Init {
        /// CRM base URL to write into the config
        #[arg(long, default_value = "https://api.example-crm.com/v1")]
        crm_url: String,
    },

    /// Reconcile one enrollment's tags against the CRM
    Reconcile {
        /// Learner id
        #[arg(long)]
        learner: String,

        /// Offering id
        #[arg(long)]
        offering: String,

        /// Report the diff without mutating the CRM
        #[arg(long)]
        dry_run: bool,
    },

    /// Reconcile every enrollment in the snapshot through a worker pool
    Batch {
        /// Only enrollments with this status (active, cancelled, ...)
        #[arg(long)]
        status: Option<String>,

        /// Only enrollments for this offering
        #[arg(long)]
        offering: Option<String>,

        /// Worker pool size (overrides config)
        #[arg(long)]
        parallel: Option<usize>,

        /// Global deadline in seconds; enrollments still queued when it
        /// expires are skipped, in-flight ones finish
        #[arg(long)]
        timeout_seconds: Option<u64>,

        /// Report diffs without mutating the CRM
        #[arg(long)]
        dry_run: bool,
    },

    /// List the active rule catalog
    Rules {
        /// Only rules in this category
        #[arg(long)]
        category: Option<String>,
    },

    /// Show computed engagement facts for one enrollment
    Facts {
        /// Learner id
        #[arg(long)]
        learner: String,

        /// Offering id
        #[arg(long)]
        offering: String,
    },

    /// Classify tag strings as managed or native
    Classify {
        /// Tag strings to classify
        #[arg(required = true)]
        tags: Vec<String>,
    },

    /// Inspect and validate the config
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .init();

    let result = match cli.command {
        Commands::Init { crm_url } => cmd::init::run(&cli.config, &crm_url),
        Commands::Reconcile {
            learner,
            offering,
            dry_run,
        } => cmd::reconcile::run(&cli.config, &learner, &offering, dry_run, cli.json),
        Commands::Batch {
            status,
            offering,
            parallel,
            timeout_seconds,
            dry_run,
        } => cmd::batch::run(
            &cli.config,
            cmd::batch::BatchArgs {
                status,
                offering,
                parallel,
                timeout_seconds,
                dry_run,
            },
            cli.json,
        ),
        Commands::Rules { category } => cmd::rules::run(&cli.config, category.as_deref(), cli.json),
        Commands::Facts { learner, offering } => {
            cmd::facts::run(&cli.config, &learner, &offering, cli.json)
        }
        Commands::Classify { tags } => cmd::classify::run(&cli.config, &tags, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&cli.config, subcommand, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
