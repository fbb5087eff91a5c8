//! Sentiscope: sentiment analysis API, training jobs and operational tools.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod client;
mod commands;
mod smoke;

const DEFAULT_MODEL_PATH: &str = "model/fine_tuned_model";
const DEFAULT_EVALUATION_DIR: &str = "evaluation";

/// Sentiment analysis service and tooling
#[derive(Parser, Debug)]
#[command(name = "sentiscope")]
#[command(about = "Sentiment analysis API, model training and evaluation")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API
    Serve(ServeArgs),

    /// Fit the classification head on a base encoder and evaluate it
    Train(TrainArgs),

    /// Evaluate an existing model directory
    Evaluate(EvaluateArgs),

    /// Print the newest evaluation report
    Metrics {
        #[arg(long, env = "EVALUATION_DIR", default_value = DEFAULT_EVALUATION_DIR)]
        evaluation_dir: PathBuf,
    },

    /// Classify a single text locally
    Analyze {
        text: String,

        #[command(flatten)]
        model: ModelArgs,
    },

    /// Exercise every endpoint of a running API
    Smoke(SmokeArgs),

    /// Run database migrations
    Migrate {
        #[command(flatten)]
        db: DbArgs,
    },
}

/// PostgreSQL connection settings. `DATABASE_URL` wins when set.
#[derive(Args, Debug)]
struct DbArgs {
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: Option<String>,

    #[arg(long, env = "POSTGRES_HOST", default_value = "localhost")]
    postgres_host: String,

    #[arg(long, env = "POSTGRES_PORT", default_value_t = 5432)]
    postgres_port: u16,

    #[arg(long, env = "POSTGRES_USER", default_value = "postgres")]
    postgres_user: String,

    /// Required unless DATABASE_URL is set
    #[arg(long, env = "POSTGRES_PASSWORD", hide_env_values = true)]
    postgres_password: Option<String>,

    #[arg(long, env = "POSTGRES_DB", default_value = "sentiment_analysis")]
    postgres_db: String,

    #[arg(long, env = "DB_MAX_CONNECTIONS", default_value_t = sentiscope_store::DEFAULT_MAX_CONNECTIONS)]
    max_connections: u32,
}

#[derive(Args, Debug)]
struct ModelArgs {
    /// Fine-tuned model directory
    #[arg(long, env = "MODEL_PATH", default_value = DEFAULT_MODEL_PATH)]
    model_path: PathBuf,

    /// Hub checkpoint used when the fine-tuned model is missing or broken
    #[arg(long, env = "FALLBACK_MODEL", default_value = sentiscope_ai::DEFAULT_FALLBACK_MODEL)]
    fallback_model: String,
}

#[derive(Args, Debug)]
struct ServeArgs {
    #[command(flatten)]
    db: DbArgs,

    #[command(flatten)]
    model: ModelArgs,

    /// HS256 signing secret, at least 32 bytes
    #[arg(long, env = "SECRET_KEY", hide_env_values = true)]
    secret_key: Option<String>,

    #[arg(long, env = "ACCESS_TOKEN_EXPIRE_MINUTES", default_value_t = sentiscope_server::config::DEFAULT_TOKEN_TTL_MINUTES)]
    token_expire_minutes: i64,

    #[arg(long, env = "EVALUATION_DIR", default_value = DEFAULT_EVALUATION_DIR)]
    evaluation_dir: PathBuf,

    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8000")]
    bind: SocketAddr,

    /// Comma-separated allowed origins
    #[arg(long, env = "CORS_ORIGINS")]
    cors_origins: Option<String>,
}

#[derive(Args, Debug)]
struct TrainArgs {
    /// Local base encoder directory; fetched from the Hub when omitted
    #[arg(long)]
    base_model: Option<PathBuf>,

    #[arg(long, default_value = sentiscope_ai::DEFAULT_BASE_ENCODER)]
    base_repo: String,

    /// JSONL file of {"text", "label"} rows; built-in reviews when omitted
    #[arg(long)]
    dataset: Option<PathBuf>,

    #[arg(long, env = "MODEL_PATH", default_value = DEFAULT_MODEL_PATH)]
    output: PathBuf,

    #[arg(long, env = "EVALUATION_DIR", default_value = DEFAULT_EVALUATION_DIR)]
    evaluation_dir: PathBuf,

    #[arg(long, default_value_t = 3)]
    epochs: usize,

    #[arg(long, default_value_t = 100)]
    steps_per_epoch: usize,

    #[arg(long, default_value_t = 0.05)]
    learning_rate: f32,

    #[arg(long, default_value_t = 0.01)]
    weight_decay: f32,

    #[arg(long, default_value_t = 16)]
    batch_size: usize,
}

#[derive(Args, Debug)]
struct EvaluateArgs {
    #[arg(long, env = "MODEL_PATH", default_value = DEFAULT_MODEL_PATH)]
    model_path: PathBuf,

    #[arg(long)]
    dataset: Option<PathBuf>,

    #[arg(long, env = "EVALUATION_DIR", default_value = DEFAULT_EVALUATION_DIR)]
    evaluation_dir: PathBuf,

    /// Score only the seeded 20% hold-out split
    #[arg(long)]
    held_out_only: bool,
}

#[derive(Args, Debug)]
struct SmokeArgs {
    #[arg(long, env = "SENTISCOPE_URL", default_value = "http://localhost:8000")]
    base_url: String,

    #[arg(long, default_value = "smoke@example.com")]
    email: String,

    #[arg(long, default_value = "smoke-test-password")]
    password: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();
    tracing::info!("sentiscope v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Serve(args) => commands::serve(args).await,
        Commands::Train(args) => commands::train(args).await,
        Commands::Evaluate(args) => commands::evaluate(args).await,
        Commands::Metrics { evaluation_dir } => commands::metrics(&evaluation_dir),
        Commands::Analyze { text, model } => commands::analyze(&text, model).await,
        Commands::Smoke(args) => smoke::run(args).await,
        Commands::Migrate { db } => commands::migrate(db).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn train_flags_parse() {
        let cli = Cli::try_parse_from([
            "sentiscope",
            "train",
            "--epochs",
            "5",
            "--learning-rate",
            "0.1",
            "--dataset",
            "reviews.jsonl",
        ])
        .unwrap();
        let Commands::Train(args) = cli.command else {
            panic!("expected train");
        };
        assert_eq!(args.epochs, 5);
        assert_eq!(args.learning_rate, 0.1);
        assert_eq!(args.dataset, Some(PathBuf::from("reviews.jsonl")));
        assert_eq!(args.steps_per_epoch, 100);
    }

    #[test]
    fn analyze_takes_positional_text() {
        let cli = Cli::try_parse_from(["sentiscope", "-v", "analyze", "I love this product!"])
            .unwrap();
        assert!(cli.verbose);
        let Commands::Analyze { text, .. } = cli.command else {
            panic!("expected analyze");
        };
        assert_eq!(text, "I love this product!");
    }
}
