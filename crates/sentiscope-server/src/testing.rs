//! In-memory doubles for router and auth tests.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use sentiscope_ai::{Device, InferenceError, ModelInfo, ModelOrigin, SentimentBackend};
use sentiscope_core::{Prediction, Sentiment};
use sentiscope_store::{SentimentAnalysis, Store, StoreError, User};

use crate::{AppState, AuthConfig, ServerSettings};

pub const TEST_SECRET: &str = "test-secret-key-that-is-at-least-32-bytes";

pub fn auth_config() -> AuthConfig {
    AuthConfig::new(TEST_SECRET, 30).unwrap()
}

#[derive(Default)]
pub struct MemoryStore {
    users: Mutex<Vec<User>>,
    analyses: Mutex<Vec<SentimentAnalysis>>,
}

impl MemoryStore {
    pub fn analyses(&self) -> Vec<SentimentAnalysis> {
        self.analyses.lock().unwrap().clone()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, email: &str, hashed_password: &str) -> Result<User, StoreError> {
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|u| u.email == email) {
            return Err(StoreError::Conflict("email already exists".into()));
        }
        let user = User {
            id: users.len() as i32 + 1,
            email: email.to_string(),
            hashed_password: hashed_password.to_string(),
            created_at: Utc::now(),
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.lock().unwrap();
        Ok(users.iter().find(|u| u.email == email).cloned())
    }

    async fn log_analysis(
        &self,
        text: &str,
        sentiment: Sentiment,
        confidence: f32,
    ) -> Result<SentimentAnalysis, StoreError> {
        let mut rows = self.analyses.lock().unwrap();
        let row = SentimentAnalysis {
            id: rows.len() as i32 + 1,
            text: text.to_string(),
            sentiment,
            confidence: f64::from(confidence),
            created_at: Utc::now(),
        };
        rows.push(row.clone());
        Ok(row)
    }

    async fn count_analyses(&self) -> Result<i64, StoreError> {
        Ok(self.analyses.lock().unwrap().len() as i64)
    }
}

/// Deterministic keyword classifier; `failing` makes every call error.
pub struct StubBackend {
    pub failing: bool,
}

#[async_trait]
impl SentimentBackend for StubBackend {
    async fn analyze(&self, text: &str) -> Result<Prediction, InferenceError> {
        if self.failing {
            return Err(InferenceError::Runtime("stub failure".into()));
        }
        let lower = text.to_lowercase();
        let negative = ["terrible", "awful", "hate", "bad"]
            .iter()
            .any(|w| lower.contains(w));
        Ok(Prediction {
            label: if negative {
                Sentiment::Negative
            } else {
                Sentiment::Positive
            },
            confidence: if negative { 0.91 } else { 0.87 },
        })
    }

    async fn model_info(&self) -> ModelInfo {
        ModelInfo {
            model_type: "distilbert".into(),
            hidden_size: 768,
            num_labels: 2,
            vocab_size: 30522,
            device: Device::Cpu,
            source: ModelOrigin::Pretrained,
            max_length: 512,
            sidecar: None,
        }
    }
}

/// State over fresh doubles, reading metrics files from `dir`.
pub fn test_state(dir: &Path, failing: bool) -> (AppState, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::default());
    let settings = ServerSettings {
        evaluation_dir: dir.join("evaluation"),
        model_path: dir.join("model"),
        cors_origins: vec!["http://localhost:3000".into()],
    };
    let state = AppState::new(
        store.clone(),
        Arc::new(StubBackend { failing }),
        auth_config(),
        settings,
    );
    (state, store)
}
