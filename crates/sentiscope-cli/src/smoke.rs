//! End-to-end check of a running deployment.

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::SmokeArgs;
use crate::client::ApiClient;

const SAMPLE_TEXTS: &[&str] = &[
    "I love this product!",
    "This is terrible",
    "The service was okay, nothing special.",
];

pub async fn run(args: SmokeArgs) -> Result<()> {
    let mut client = ApiClient::new(&args.base_url);

    let health = client.health().await.context("GET /health")?;
    println!("health: {}", health.status);

    match client.register(&args.email, &args.password).await {
        Ok(user) => println!("registered {} (id {})", user.email, user.id),
        Err(e) if e.status() == Some(400) => {
            info!(email = %args.email, "user already registered");
            println!("{} already registered", args.email);
        }
        Err(e) => return Err(e).context("POST /register"),
    }

    let token = client
        .login(&args.email, &args.password)
        .await
        .context("POST /token")?;
    client.set_token(token.access_token);

    let me = client.me().await.context("GET /me")?;
    println!("authenticated as {}", me.email);

    for text in SAMPLE_TEXTS {
        let authed = client.analyze(text).await.context("POST /analyze")?;
        let public = client
            .analyze_public(text)
            .await
            .context("POST /analyze-public")?;
        if authed.sentiment != public.sentiment || authed.confidence != public.confidence {
            warn!(text, "public and authenticated results differ");
        }
        println!(
            "{:>8} {:.4}  {text}",
            authed.sentiment.as_str(),
            authed.confidence
        );
    }

    let info = client.model_info().await.context("GET /model-info")?;
    println!("model info: {}", serde_json::to_string(&info)?);

    let metrics = client.model_metrics().await.context("GET /model-metrics")?;
    println!(
        "model metrics ({:?}): accuracy {:.4}, f1 {:.4}, precision {:.4}, recall {:.4}",
        metrics.source, metrics.accuracy, metrics.f1, metrics.precision, metrics.recall
    );

    println!("smoke test passed");
    Ok(())
}
