//! HTTP implementation of [`CoreApi`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, Response};
use serde_json::Value;
use tracing::debug;

use jobrun_core::RemoteId;

use crate::api::CoreApi;
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::operation::{Operation, Submission};

/// HTTP client for the remote service's REST API.
pub struct HttpClient {
    inner: reqwest::Client,
    base_url: String,
    username: Option<String>,
    password: Option<String>,
}

impl HttpClient {
    /// Create a new HTTP client from configuration.
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let inner = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ClientError::Connection(e.to_string()))?;

        Ok(Self {
            inner,
            base_url: config.endpoint.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    /// Base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!(method = %method, url = %url, "HTTP request");

        let builder = self.inner.request(method, url);
        match &self.username {
            Some(user) => builder.basic_auth(user, self.password.as_ref()),
            None => builder,
        }
    }
}

/// Map a non-2xx response to an error built by `err`.
fn check(response: Response, path: &str, err: fn(String) -> ClientError) -> Result<Response, ClientError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(err(format!("HTTP {}: {}", response.status(), path)))
    }
}

#[async_trait]
impl CoreApi for HttpClient {
    async fn submit(
        &self,
        operation: Operation,
        submission: Submission,
    ) -> Result<Value, ClientError> {
        let path = operation.path();
        let builder = self.request(Method::POST, path);

        let builder = match submission {
            Submission::Json(body) => builder.json(&body),
            Submission::Csv {
                filename,
                bytes,
                eda,
            } => {
                let part = Part::bytes(bytes)
                    .file_name(filename)
                    .mime_str("text/plain")
                    .map_err(|e| ClientError::Submission(e.to_string()))?;
                builder.multipart(Form::new().part("csv", part).text("eda", eda.to_string()))
            }
        };

        let response = builder
            .send()
            .await
            .map_err(|e| ClientError::Submission(e.to_string()))?;
        let response = check(response, path, ClientError::Submission)?;

        response
            .json()
            .await
            .map_err(|e| ClientError::Submission(e.to_string()))
    }

    async fn poll(&self, task_id: &RemoteId) -> Result<Value, ClientError> {
        self.get_json(&format!("/tasks/{}", task_id)).await
    }

    async fn cancel(&self, task_id: &RemoteId) -> Result<(), ClientError> {
        let path = format!("/tasks/{}/stop", task_id);
        let response = self
            .request(Method::PUT, &path)
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        check(response, &path, ClientError::Transport)?;
        Ok(())
    }

    async fn health(&self) -> Result<(), ClientError> {
        let path = "/workers/status";
        let response = self
            .request(Method::GET, path)
            .send()
            .await
            .map_err(|e| ClientError::Connection(e.to_string()))?;
        check(response, path, ClientError::Connection)?;
        Ok(())
    }

    async fn get_json(&self, path: &str) -> Result<Value, ClientError> {
        let response = self
            .request(Method::GET, path)
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        let response = check(response, path, ClientError::Transport)?;

        response
            .json()
            .await
            .map_err(|e| ClientError::Serialization(e.to_string()))
    }

    async fn fetch(&self, path: &str) -> Result<Vec<u8>, ClientError> {
        let response = self
            .request(Method::GET, path)
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        let response = check(response, path, ClientError::Transport)?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}
