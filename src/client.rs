//! # HTTP workspace client
//!
//! Implements [`WorkspaceClient`] and [`ResourceClient`] over the workspace
//! REST API with `reqwest`. Authentication is a bearer token; nothing else
//! about session handling lives here.
//!
//! Construct it with [`HttpWorkspaceClient::new_from_env`], which reads
//! `DATABRICKS_HOST` and `DATABRICKS_TOKEN` (a `.env` file is honoured).

use std::env;

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::WorkspaceError;
use crate::resources::{App, Job, Pipeline};
use crate::workspace::{ByteStream, ObjectInfo, ResourceClient, WorkspaceClient};

pub struct HttpWorkspaceClient {
    http: reqwest::Client,
    host: String,
    token: String,
}

#[derive(Deserialize)]
struct ListResponse {
    #[serde(default)]
    objects: Vec<ObjectInfo>,
}

#[derive(Deserialize)]
struct ApiError {
    #[serde(default)]
    error_code: String,
    #[serde(default)]
    message: String,
}

impl HttpWorkspaceClient {
    pub fn new(host: impl Into<String>, token: impl Into<String>) -> Self {
        let host = host.into().trim_end_matches('/').to_string();
        Self {
            http: reqwest::Client::new(),
            host,
            token: token.into(),
        }
    }

    pub fn new_from_env() -> Result<Self, WorkspaceError> {
        dotenvy::dotenv().ok();
        match (env::var("DATABRICKS_HOST"), env::var("DATABRICKS_TOKEN")) {
            (Ok(host), Ok(token)) => {
                let host = if host.starts_with("http://") || host.starts_with("https://") {
                    host
                } else {
                    format!("https://{host}")
                };
                tracing::info!(host = %host, "Initialized workspace client from environment");
                Ok(Self::new(host, token))
            }
            (Err(e), _) => {
                tracing::error!(error = ?e, "DATABRICKS_HOST missing in environment");
                Err(WorkspaceError::Config(format!("DATABRICKS_HOST: {e}")))
            }
            (_, Err(e)) => {
                tracing::error!(error = ?e, "DATABRICKS_TOKEN missing in environment");
                Err(WorkspaceError::Config(format!("DATABRICKS_TOKEN: {e}")))
            }
        }
    }

    async fn send(&self, endpoint: &str, query: &[(&str, &str)], subject: &str) -> Result<Response, WorkspaceError> {
        let url = format!("{}{}", self.host, endpoint);
        tracing::debug!(url = %url, subject = %subject, "Workspace API request");
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await?;
        check_status(response, subject).await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
        subject: &str,
    ) -> Result<T, WorkspaceError> {
        let response = self.send(endpoint, query, subject).await?;
        Ok(response.json::<T>().await?)
    }
}

async fn check_status(response: Response, subject: &str) -> Result<Response, WorkspaceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let api_error = serde_json::from_str::<ApiError>(&body).ok();
    let not_found = status == StatusCode::NOT_FOUND
        || api_error
            .as_ref()
            .is_some_and(|e| e.error_code == "RESOURCE_DOES_NOT_EXIST");
    if not_found {
        tracing::error!(subject = %subject, "Workspace object not found");
        return Err(WorkspaceError::NotFound {
            path: subject.to_string(),
        });
    }
    let message = api_error.map(|e| e.message).unwrap_or(body);
    tracing::error!(subject = %subject, status = %status, message = %message, "Workspace API returned error");
    Err(WorkspaceError::Api {
        path: subject.to_string(),
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl WorkspaceClient for HttpWorkspaceClient {
    async fn get_status(&self, path: &str) -> Result<ObjectInfo, WorkspaceError> {
        self.get_json("/api/2.0/workspace/get-status", &[("path", path)], path)
            .await
    }

    async fn list_directory(&self, path: &str) -> Result<Vec<ObjectInfo>, WorkspaceError> {
        let listing: ListResponse = self
            .get_json("/api/2.0/workspace/list", &[("path", path)], path)
            .await?;
        Ok(listing.objects)
    }

    async fn download(&self, path: &str) -> Result<ByteStream, WorkspaceError> {
        let response = self
            .send(
                "/api/2.0/workspace/export",
                &[("path", path), ("format", "SOURCE"), ("direct_download", "true")],
                path,
            )
            .await?;
        Ok(response
            .bytes_stream()
            .map_err(WorkspaceError::Transport)
            .boxed())
    }
}

#[async_trait]
impl ResourceClient for HttpWorkspaceClient {
    async fn get_job(&self, job_id: i64) -> Result<Job, WorkspaceError> {
        let id = job_id.to_string();
        self.get_json("/api/2.1/jobs/get", &[("job_id", id.as_str())], &format!("job {job_id}"))
            .await
    }

    async fn get_pipeline(&self, pipeline_id: &str) -> Result<Pipeline, WorkspaceError> {
        self.get_json(
            &format!("/api/2.0/pipelines/{pipeline_id}"),
            &[],
            &format!("pipeline {pipeline_id}"),
        )
        .await
    }

    async fn get_app(&self, name: &str) -> Result<App, WorkspaceError> {
        self.get_json(&format!("/api/2.0/apps/{name}"), &[], &format!("app {name}"))
            .await
    }
}
