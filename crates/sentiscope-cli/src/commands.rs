//! Subcommand implementations.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use sentiscope_ai::{LoaderConfig, SentimentBackend, load_classifier};
use sentiscope_core::report::{confusion_matrix_for, latest_report, read_report};
use sentiscope_server::config::{default_cors_origins, parse_origins};
use sentiscope_server::{AppState, AuthConfig, ServerSettings};
use sentiscope_store::{
    PgPool, PgStore, connect_options, create_pool, create_pool_with, run_migrations,
};
use sentiscope_train::{EvaluateJob, JobOutcome, TrainConfig, TrainJob};
use tracing::info;

use crate::{DbArgs, EvaluateArgs, ModelArgs, ServeArgs, TrainArgs};

impl DbArgs {
    async fn connect(&self) -> Result<PgPool> {
        let pool = match &self.database_url {
            Some(url) => create_pool(url, self.max_connections).await,
            None => {
                let password = self
                    .postgres_password
                    .as_deref()
                    .context("set DATABASE_URL or POSTGRES_PASSWORD")?;
                let options = connect_options(
                    &self.postgres_host,
                    self.postgres_port,
                    &self.postgres_user,
                    password,
                    &self.postgres_db,
                );
                create_pool_with(options, self.max_connections).await
            }
        };
        pool.context("connecting to PostgreSQL")
    }
}

impl ModelArgs {
    fn loader_config(self) -> LoaderConfig {
        LoaderConfig {
            model_path: self.model_path,
            fallback_model: self.fallback_model,
        }
    }
}

pub async fn serve(args: ServeArgs) -> Result<()> {
    let secret = args
        .secret_key
        .context("SECRET_KEY must be set (at least 32 bytes)")?;
    let auth = AuthConfig::new(secret, args.token_expire_minutes)?;

    let pool = args.db.connect().await?;
    run_migrations(&pool).await?;
    let store = Arc::new(PgStore::new(pool));

    let settings = ServerSettings {
        evaluation_dir: args.evaluation_dir,
        model_path: args.model.model_path.clone(),
        cors_origins: args
            .cors_origins
            .as_deref()
            .map(parse_origins)
            .unwrap_or_else(default_cors_origins),
    };
    let model = Arc::new(load_classifier(&args.model.loader_config()).await?);

    let state = AppState::new(store, model, auth, settings);
    sentiscope_server::serve(state, args.bind).await
}

pub async fn migrate(db: DbArgs) -> Result<()> {
    let pool = db.connect().await?;
    run_migrations(&pool).await?;
    info!("Migrations completed successfully");
    Ok(())
}

pub async fn train(args: TrainArgs) -> Result<()> {
    let job = TrainJob {
        base_model: args.base_model,
        base_repo: args.base_repo,
        dataset: args.dataset,
        output_dir: args.output,
        evaluation_dir: args.evaluation_dir,
        config: TrainConfig {
            epochs: args.epochs,
            steps_per_epoch: args.steps_per_epoch,
            learning_rate: args.learning_rate,
            weight_decay: args.weight_decay,
        },
        batch_size: args.batch_size,
    };
    let outcome = sentiscope_train::run_training(&job).await?;
    print_outcome(&outcome);
    Ok(())
}

pub async fn evaluate(args: EvaluateArgs) -> Result<()> {
    let job = EvaluateJob {
        model_dir: args.model_path,
        dataset: args.dataset,
        evaluation_dir: args.evaluation_dir,
        held_out_only: args.held_out_only,
    };
    let outcome = sentiscope_train::run_evaluation(&job).await?;
    print_outcome(&outcome);
    Ok(())
}

fn print_outcome(outcome: &JobOutcome) {
    let m = &outcome.evaluation.metrics;
    println!("Evaluation on {} samples:", outcome.evaluation.test_size);
    println!("  accuracy:  {:.4}", m.accuracy);
    println!("  f1:        {:.4}", m.f1);
    println!("  precision: {:.4}", m.precision);
    println!("  recall:    {:.4}", m.recall);
    if let Some(auc) = outcome.evaluation.roc_auc {
        println!("  roc_auc:   {auc:.4}");
    }
    if let Some(dir) = &outcome.model_dir {
        println!("Model saved to {}", dir.display());
    }
    println!("Report: {}", outcome.report_path.display());
    println!("Confusion matrix: {}", outcome.confusion_matrix_path.display());
    if let Some(path) = &outcome.roc_curve_path {
        println!("ROC curve: {}", path.display());
    }
}

pub fn metrics(evaluation_dir: &Path) -> Result<()> {
    let Some(path) = latest_report(evaluation_dir)? else {
        println!("No evaluation results found in {}", evaluation_dir.display());
        return Ok(());
    };
    let report = read_report(&path)?;

    println!("Latest evaluation: {}", path.display());
    if let Some(ts) = report.timestamp {
        println!("Timestamp: {}", ts.format("%Y-%m-%d %H:%M:%S"));
    }
    for (name, value) in [
        ("accuracy", report.accuracy),
        ("f1", report.f1),
        ("precision", report.precision),
        ("recall", report.recall),
    ] {
        match value {
            Some(v) => println!("  {name:<10} {v:.4}"),
            None => println!("  {name:<10} -"),
        }
    }
    match confusion_matrix_for(&path) {
        Some(cm) => println!("Confusion matrix: {}", cm.display()),
        None => println!("Confusion matrix: not found"),
    }
    Ok(())
}

pub async fn analyze(text: &str, model: ModelArgs) -> Result<()> {
    let classifier = load_classifier(&model.loader_config()).await?;
    let prediction = classifier.analyze(text).await?;
    let out = serde_json::json!({
        "sentiment": prediction.label,
        "confidence": prediction.confidence,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
