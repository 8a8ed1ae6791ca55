#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bundle_generate::workspace::{
    ByteStream, Language, ObjectInfo, ObjectType, WorkspaceClient, WorkspaceError,
};
use bytes::Bytes;
use futures::StreamExt;

/// In-memory workspace tree. Records which directories were listed and how
/// many downloads ran at the same time.
#[derive(Default)]
pub struct FakeWorkspace {
    objects: BTreeMap<String, (ObjectInfo, Vec<u8>)>,
    latency: Option<Duration>,
    latencies: BTreeMap<String, Duration>,
    failing: BTreeSet<String>,
    pub listed: Mutex<Vec<String>>,
    pub downloads: AtomicUsize,
    pub completed: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeWorkspace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: &str, content: &str) -> Self {
        self.insert(path, ObjectType::File, None, content);
        self
    }

    pub fn with_notebook(mut self, path: &str, language: Language, content: &str) -> Self {
        self.insert(path, ObjectType::Notebook, Some(language), content);
        self
    }

    pub fn with_dir(mut self, path: &str) -> Self {
        self.insert(path, ObjectType::Directory, None, "");
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Latency for one path, overriding the shared one.
    pub fn with_latency_for(mut self, path: &str, latency: Duration) -> Self {
        self.latencies.insert(path.to_string(), latency);
        self
    }

    pub fn failing_on(mut self, path: &str) -> Self {
        self.failing.insert(path.to_string());
        self
    }

    fn insert(&mut self, path: &str, object_type: ObjectType, language: Option<Language>, content: &str) {
        let info = ObjectInfo {
            path: path.to_string(),
            object_type,
            language,
        };
        self.objects
            .insert(path.to_string(), (info, content.as_bytes().to_vec()));
    }

    fn not_found(path: &str) -> WorkspaceError {
        WorkspaceError::NotFound {
            path: path.to_string(),
        }
    }
}

#[async_trait]
impl WorkspaceClient for FakeWorkspace {
    async fn get_status(&self, path: &str) -> Result<ObjectInfo, WorkspaceError> {
        self.objects
            .get(path)
            .map(|(info, _)| info.clone())
            .ok_or_else(|| Self::not_found(path))
    }

    async fn list_directory(&self, path: &str) -> Result<Vec<ObjectInfo>, WorkspaceError> {
        self.listed.lock().unwrap().push(path.to_string());
        Ok(self
            .objects
            .values()
            .filter(|(info, _)| info.path.rsplit_once('/').map(|(dir, _)| dir) == Some(path))
            .map(|(info, _)| info.clone())
            .collect())
    }

    async fn download(&self, path: &str) -> Result<ByteStream, WorkspaceError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(latency) = self.latencies.get(path).copied().or(self.latency) {
            tokio::time::sleep(latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(path) {
            return Err(WorkspaceError::Api {
                path: path.to_string(),
                status: 500,
                message: "export failed".to_string(),
            });
        }
        let (_, content) = self.objects.get(path).ok_or_else(|| Self::not_found(path))?;
        self.downloads.fetch_add(1, Ordering::SeqCst);
        self.completed.lock().unwrap().push(path.to_string());
        let chunk: Result<Bytes, WorkspaceError> = Ok(Bytes::from(content.clone()));
        Ok(futures::stream::iter(vec![chunk]).boxed())
    }
}
