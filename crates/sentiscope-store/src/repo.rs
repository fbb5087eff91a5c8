//! Repository operations behind the [`Store`] trait.

use async_trait::async_trait;
use sentiscope_core::Sentiment;
use sqlx::PgPool;
use tracing::debug;

use crate::{SentimentAnalysis, StoreError, User};

/// Persistence operations needed by the service.
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert a new user. A duplicate email yields [`StoreError::Conflict`].
    async fn create_user(&self, email: &str, hashed_password: &str) -> Result<User, StoreError>;

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Append one analysis row.
    async fn log_analysis(
        &self,
        text: &str,
        sentiment: Sentiment,
        confidence: f32,
    ) -> Result<SentimentAnalysis, StoreError>;

    async fn count_analyses(&self) -> Result<i64, StoreError>;
}

/// [`Store`] backed by a PostgreSQL pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn create_user(&self, email: &str, hashed_password: &str) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, hashed_password)
            VALUES ($1, $2)
            RETURNING id, email, hashed_password, created_at
            "#,
        )
        .bind(email)
        .bind(hashed_password)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::from_write(e, "email"))?;
        debug!(user_id = user.id, "created user");
        Ok(user)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, hashed_password, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn log_analysis(
        &self,
        text: &str,
        sentiment: Sentiment,
        confidence: f32,
    ) -> Result<SentimentAnalysis, StoreError> {
        let row = sqlx::query_as::<_, SentimentAnalysis>(
            r#"
            INSERT INTO sentiment_analyses (text, sentiment, confidence)
            VALUES ($1, $2, $3)
            RETURNING id, text, sentiment, confidence, created_at
            "#,
        )
        .bind(text)
        .bind(sentiment.as_str())
        .bind(f64::from(confidence))
        .fetch_one(&self.pool)
        .await?;
        debug!(analysis_id = row.id, sentiment = %row.sentiment, "logged analysis");
        Ok(row)
    }

    async fn count_analyses(&self) -> Result<i64, StoreError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM sentiment_analyses")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Connects to `DATABASE_URL` and applies migrations.
    async fn require_store() -> PgStore {
        let url = std::env::var("DATABASE_URL").unwrap_or_else(|_| {
            panic!(
                "DATABASE_URL not set. Start PostgreSQL and export e.g.\n  \
                 DATABASE_URL=postgres://postgres:<password>@localhost:5432/sentiment_analysis"
            )
        });
        let pool = crate::create_pool(&url, 2).await.unwrap();
        crate::run_migrations(&pool).await.unwrap();
        PgStore::new(pool)
    }

    fn unique_email(tag: &str) -> String {
        let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
        format!("{tag}-{nanos}@example.com")
    }

    #[tokio::test]
    #[ignore = "needs a PostgreSQL database at DATABASE_URL"]
    async fn duplicate_email_is_conflict() {
        let store = require_store().await;
        let email = unique_email("dup");

        let user = store.create_user(&email, "hash").await.unwrap();
        assert_eq!(user.email, email);

        let err = store.create_user(&email, "hash").await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)), "got {err:?}");

        let found = store.get_user_by_email(&email).await.unwrap().unwrap();
        assert_eq!(found.id, user.id);
    }

    #[tokio::test]
    #[ignore = "needs a PostgreSQL database at DATABASE_URL"]
    async fn unknown_email_is_none() {
        let store = require_store().await;
        let found = store
            .get_user_by_email(&unique_email("missing"))
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    #[ignore = "needs a PostgreSQL database at DATABASE_URL"]
    async fn log_analysis_appends_one_row() {
        let store = require_store().await;
        let before = store.count_analyses().await.unwrap();

        let row = store
            .log_analysis("I love this product!", Sentiment::Positive, 0.98)
            .await
            .unwrap();
        assert_eq!(row.sentiment, Sentiment::Positive);
        assert_eq!(row.text, "I love this product!");
        assert!((row.confidence - 0.98).abs() < 1e-6);

        assert_eq!(store.count_analyses().await.unwrap(), before + 1);
    }
}
