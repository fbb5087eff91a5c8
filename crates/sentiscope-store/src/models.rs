//! Row types for the `users` and `sentiment_analyses` tables.

use chrono::{DateTime, Utc};
use sentiscope_core::Sentiment;
use serde::Serialize;

/// A registered account. Never updated or deleted by the service.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i32,
    pub email: String,
    /// Argon2 PHC string.
    pub hashed_password: String,
    pub created_at: DateTime<Utc>,
}

/// One logged classification. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct SentimentAnalysis {
    pub id: i32,
    pub text: String,
    #[sqlx(try_from = "String")]
    pub sentiment: Sentiment,
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
}
