#![allow(unused)]

//! # workspace: the remote side of generation
//!
//! This module defines the traits the generator talks to: [`WorkspaceClient`]
//! for the workspace file tree and [`ResourceClient`] for fetching the API
//! objects being turned into configuration.
//!
//! ## Interface & Extensibility
//! - Implement the traits for any backend: the HTTP client in [`crate::client`],
//!   an in-memory fake, or a local filesystem shim.
//! - All methods are async and return [`WorkspaceError`].
//!
//! ## Mocking & Testing
//! - Both traits are annotated for `mockall` so tests can generate deterministic mocks.

use std::collections::VecDeque;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use mockall::{automock, predicate::*};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use crate::error::WorkspaceError;
use crate::resources::{App, Job, Pipeline};

/// Byte stream of a downloaded workspace file.
pub type ByteStream = BoxStream<'static, Result<Bytes, WorkspaceError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObjectType {
    Notebook,
    Directory,
    Library,
    File,
    Repo,
    Dashboard,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Language {
    Python,
    Scala,
    Sql,
    R,
}

impl Language {
    /// Extension a local copy of a notebook in this language needs.
    pub fn extension(self) -> &'static str {
        match self {
            Language::Python => ".py",
            Language::Scala => ".scala",
            Language::Sql => ".sql",
            Language::R => ".r",
        }
    }
}

/// Metadata for one entry of the workspace tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectInfo {
    pub path: String,
    pub object_type: ObjectType,
    #[serde(default)]
    pub language: Option<Language>,
}

/// Access to the workspace file tree.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait WorkspaceClient: Send + Sync {
    /// Metadata for a single path. Fails with [`WorkspaceError::NotFound`] when absent.
    async fn get_status(&self, path: &str) -> Result<ObjectInfo, WorkspaceError>;

    /// Direct children of a directory.
    async fn list_directory(&self, path: &str) -> Result<Vec<ObjectInfo>, WorkspaceError>;

    /// Contents of a file or the source of a notebook.
    async fn download(&self, path: &str) -> Result<ByteStream, WorkspaceError>;
}

/// Access to the API objects configuration is generated from.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ResourceClient: Send + Sync {
    async fn get_job(&self, job_id: i64) -> Result<Job, WorkspaceError>;

    async fn get_pipeline(&self, pipeline_id: &str) -> Result<Pipeline, WorkspaceError>;

    async fn get_app(&self, name: &str) -> Result<App, WorkspaceError>;
}

/// Lists everything below `root`, descending into subdirectories unless their
/// name is in `excluded_dirs`. Excluded directories are neither returned nor listed.
pub async fn recursive_list<C>(
    client: &C,
    root: &str,
    excluded_dirs: &[String],
) -> Result<Vec<ObjectInfo>, WorkspaceError>
where
    C: WorkspaceClient + ?Sized,
{
    let mut pending = VecDeque::from([root.to_string()]);
    let mut found = Vec::new();
    while let Some(dir) = pending.pop_front() {
        for entry in client.list_directory(&dir).await? {
            if entry.object_type == ObjectType::Directory {
                let name = entry.path.rsplit('/').next().unwrap_or_default();
                if excluded_dirs.iter().any(|x| x == name) {
                    debug!(path = %entry.path, "Pruning excluded directory");
                    continue;
                }
                pending.push_back(entry.path.clone());
            }
            found.push(entry);
        }
    }
    Ok(found)
}
