//! HTTP client for a running Sentiscope API.

use reqwest::RequestBuilder;
use sentiscope_server::dto::{AnalyzeResponse, HealthResponse, TokenResponse, UserResponse};
use sentiscope_server::metrics::ModelMetrics;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Server { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
        }
    }
}

pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// `base_url` like `http://localhost:8000`; a trailing slash is dropped.
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        }
    }

    pub fn set_token(&mut self, token: String) {
        self.token = Some(token);
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        let resp = request.send().await?;
        let status = resp.status();
        debug!(status = status.as_u16(), url = %resp.url(), "response");
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Server {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp.json().await?)
    }

    pub async fn health(&self) -> Result<HealthResponse, ClientError> {
        self.send(self.client.get(self.url("/health"))).await
    }

    pub async fn register(&self, email: &str, password: &str) -> Result<UserResponse, ClientError> {
        let body = json!({ "email": email, "password": password });
        self.send(self.client.post(self.url("/register")).json(&body))
            .await
    }

    /// Password grant; stores nothing, see [`set_token`](Self::set_token).
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenResponse, ClientError> {
        let form = [("username", email), ("password", password)];
        self.send(self.client.post(self.url("/token")).form(&form))
            .await
    }

    pub async fn me(&self) -> Result<UserResponse, ClientError> {
        self.send(self.client.get(self.url("/me"))).await
    }

    pub async fn analyze(&self, text: &str) -> Result<AnalyzeResponse, ClientError> {
        let body = json!({ "text": text });
        self.send(self.client.post(self.url("/analyze")).json(&body))
            .await
    }

    pub async fn analyze_public(&self, text: &str) -> Result<AnalyzeResponse, ClientError> {
        let body = json!({ "text": text });
        self.send(self.client.post(self.url("/analyze-public")).json(&body))
            .await
    }

    pub async fn model_info(&self) -> Result<Map<String, Value>, ClientError> {
        self.send(self.client.get(self.url("/model-info"))).await
    }

    pub async fn model_metrics(&self) -> Result<ModelMetrics, ClientError> {
        self.send(self.client.get(self.url("/model-metrics"))).await
    }
}
