//! Path remapping and downloading of workspace files.
//!
//! Registration calls decide where each referenced remote file lands under the
//! source directory and rewrite the caller's reference to point at it,
//! relative to the config directory. Nothing touches the disk until
//! [`Downloader::flush_to_disk`], which first checks every destination and
//! only then fetches all files concurrently.
//!
//! A flush that fails halfway leaves the files already written in place.
//! There is no rollback; re-running with `--force` overwrites them.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use futures::{StreamExt, TryStreamExt};
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info};

use crate::error::GenerateError;
use crate::workspace::{recursive_list, ObjectInfo, ObjectType, WorkspaceClient};

/// Directory names never descended into when downloading a directory.
pub const DEFAULT_EXCLUDED_DIRS: &[&str] = &[".git", "node_modules", "__pycache__", ".venv", "venv"];

/// Number of files fetched at the same time during a flush.
pub const DEFAULT_CONCURRENCY: usize = 10;

pub struct Downloader<'a, C: ?Sized> {
    client: &'a C,
    files: BTreeMap<PathBuf, String>,
    source_dir: PathBuf,
    config_dir: PathBuf,
    excluded_dirs: Vec<String>,
    concurrency: usize,
}

impl<'a, C> Downloader<'a, C>
where
    C: WorkspaceClient + ?Sized,
{
    pub fn new(client: &'a C, source_dir: impl Into<PathBuf>, config_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            files: BTreeMap::new(),
            source_dir: source_dir.into(),
            config_dir: config_dir.into(),
            excluded_dirs: DEFAULT_EXCLUDED_DIRS.iter().map(|s| s.to_string()).collect(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_excluded_dirs<I, S>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_dirs = dirs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// The rename table: local destination to remote source.
    pub fn files(&self) -> &BTreeMap<PathBuf, String> {
        &self.files
    }

    /// Registers a single file, placed directly under the source directory.
    pub async fn mark_file_for_download(&mut self, remote_path: &mut String) -> Result<(), GenerateError> {
        let info = self.client.get_status(remote_path).await?;
        let base = parent_of(remote_path).to_string();
        self.register(remote_path, &base, extension_for(&info, false)?)
    }

    /// Registers a notebook, appending the extension of its language.
    pub async fn mark_notebook_for_download(&mut self, remote_path: &mut String) -> Result<(), GenerateError> {
        let info = self.client.get_status(remote_path).await?;
        let base = parent_of(remote_path).to_string();
        self.register(remote_path, &base, extension_for(&info, true)?)
    }

    /// Starts a walk rooted at `root`. Files registered through the walk keep
    /// their path below `root` under the source directory.
    pub fn walk(&mut self, root: impl Into<String>) -> DirectoryWalk<'_, 'a, C> {
        DirectoryWalk {
            downloader: self,
            root: root.into(),
        }
    }

    /// Registers every file below `dir_path`, pruning excluded directories,
    /// and rewrites `dir_path` to the source directory relative to the config directory.
    pub async fn mark_directory_for_download(&mut self, dir_path: &mut String) -> Result<(), GenerateError> {
        self.client.get_status(dir_path).await?;
        let entries = recursive_list(self.client, dir_path, &self.excluded_dirs).await?;
        info!(path = %dir_path, entries = entries.len(), "Listed remote directory");

        let mut walk = self.walk(dir_path.clone());
        for entry in entries {
            let mut path = entry.path;
            match entry.object_type {
                ObjectType::Directory => continue,
                ObjectType::Notebook => walk.mark_notebook_for_download(&mut path).await?,
                _ => walk.mark_file_for_download(&mut path).await?,
            }
        }

        let relative = relative_path(&self.config_dir, &self.source_dir)?;
        *dir_path = path_to_string(relative, &self.source_dir)?;
        Ok(())
    }

    fn register(&mut self, remote_path: &mut String, base: &str, extension: &str) -> Result<(), GenerateError> {
        let relative = strip_base(remote_path, base);
        let destination = self.source_dir.join(format!("{relative}{extension}"));
        let rewritten = relative_path(&self.config_dir, &destination)?;
        let rewritten = path_to_string(rewritten, &destination)?;

        if let Some(existing) = self.files.get(&destination) {
            if existing.as_str() != remote_path.as_str() {
                return Err(GenerateError::DuplicateDestination {
                    path: destination,
                    first: existing.clone(),
                    second: remote_path.clone(),
                });
            }
        }
        debug!(remote = %remote_path, local = %destination.display(), "Registered file for download");
        self.files.insert(destination, remote_path.clone());
        *remote_path = rewritten;
        Ok(())
    }

    /// Writes every registered file to disk.
    ///
    /// All destinations are checked before anything is fetched: an existing
    /// directory is always an error, an existing file is one unless `force`.
    /// Fetches then run concurrently; the first failure cancels the rest.
    pub async fn flush_to_disk(self, force: bool) -> Result<(), GenerateError> {
        let Downloader {
            client,
            files,
            concurrency,
            ..
        } = self;

        for destination in files.keys() {
            match tokio::fs::metadata(destination).await {
                Ok(meta) if meta.is_dir() => {
                    error!(path = %destination.display(), "Download destination is a directory");
                    return Err(GenerateError::IsDirectory(destination.clone()));
                }
                Ok(_) if !force => {
                    error!(path = %destination.display(), "Download destination already exists");
                    return Err(GenerateError::AlreadyExists(destination.clone()));
                }
                Ok(_) => debug!(path = %destination.display(), "Overwriting existing file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(GenerateError::io(destination)(e)),
            }
        }

        let count = files.len();
        info!(files = count, concurrency, "Downloading files");
        futures::stream::iter(files)
            .map(|(destination, remote)| async move { fetch_file(client, &remote, &destination).await })
            .buffer_unordered(concurrency)
            .try_collect::<Vec<()>>()
            .await?;
        info!(files = count, "All files downloaded");
        Ok(())
    }
}

/// A directory walk with a fixed root. Created by [`Downloader::walk`].
pub struct DirectoryWalk<'d, 'a, C: ?Sized> {
    downloader: &'d mut Downloader<'a, C>,
    root: String,
}

impl<C> DirectoryWalk<'_, '_, C>
where
    C: WorkspaceClient + ?Sized,
{
    pub fn root(&self) -> &str {
        &self.root
    }

    pub async fn mark_file_for_download(&mut self, remote_path: &mut String) -> Result<(), GenerateError> {
        let info = self.downloader.client.get_status(remote_path).await?;
        self.downloader
            .register(remote_path, &self.root, extension_for(&info, false)?)
    }

    pub async fn mark_notebook_for_download(&mut self, remote_path: &mut String) -> Result<(), GenerateError> {
        let info = self.downloader.client.get_status(remote_path).await?;
        self.downloader
            .register(remote_path, &self.root, extension_for(&info, true)?)
    }
}

async fn fetch_file<C>(client: &C, remote: &str, destination: &Path) -> Result<(), GenerateError>
where
    C: WorkspaceClient + ?Sized,
{
    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(GenerateError::io(parent))?;
    }
    let mut stream = client.download(remote).await.map_err(|e| {
        error!(remote = %remote, error = %e, "Failed to start download");
        e
    })?;
    let mut file = tokio::fs::File::create(destination)
        .await
        .map_err(GenerateError::io(destination))?;
    let mut written = 0usize;
    while let Some(chunk) = stream.try_next().await? {
        file.write_all(&chunk)
            .await
            .map_err(GenerateError::io(destination))?;
        written += chunk.len();
    }
    file.flush().await.map_err(GenerateError::io(destination))?;
    debug!(remote = %remote, local = %destination.display(), bytes = written, "Downloaded file");
    Ok(())
}

/// Notebooks get the extension of their language. Anything else is kept as is,
/// including files referenced where a notebook was expected.
fn extension_for(info: &ObjectInfo, notebook: bool) -> Result<&'static str, GenerateError> {
    if !notebook || info.object_type != ObjectType::Notebook {
        return Ok("");
    }
    match info.language {
        Some(language) => Ok(language.extension()),
        None => Err(GenerateError::UnsupportedLanguage {
            path: info.path.clone(),
        }),
    }
}

fn parent_of(remote_path: &str) -> &str {
    remote_path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// Strips `base` from the front of `path`, then exactly one leading separator.
fn strip_base<'p>(path: &'p str, base: &str) -> &'p str {
    let rest = path.strip_prefix(base).unwrap_or(path);
    rest.strip_prefix('/').unwrap_or(rest)
}

fn path_to_string(path: PathBuf, origin: &Path) -> Result<String, GenerateError> {
    path.into_os_string().into_string().map_err(|_| GenerateError::Path {
        base: PathBuf::new(),
        target: origin.to_path_buf(),
    })
}

/// Lexical path from `base` to `target`, like `filepath.Rel`: both sides are
/// cleaned first, and mixing absolute with relative or different drive
/// prefixes is an error.
pub(crate) fn relative_path(base: &Path, target: &Path) -> Result<PathBuf, GenerateError> {
    let fail = || GenerateError::Path {
        base: base.to_path_buf(),
        target: target.to_path_buf(),
    };
    let base_parts = clean(base);
    let target_parts = clean(target);
    if base.is_absolute() != target.is_absolute() {
        return Err(fail());
    }
    let prefix = |parts: &[Component<'_>]| match parts.first() {
        Some(Component::Prefix(p)) => Some(p.as_os_str().to_os_string()),
        _ => None,
    };
    if prefix(&base_parts) != prefix(&target_parts) {
        return Err(fail());
    }

    let common = base_parts
        .iter()
        .zip(&target_parts)
        .take_while(|(a, b)| a == b)
        .count();
    let ups = &base_parts[common..];
    if ups.iter().any(|c| matches!(c, Component::ParentDir)) {
        return Err(fail());
    }

    let mut out = PathBuf::new();
    for _ in ups {
        out.push("..");
    }
    for part in &target_parts[common..] {
        out.push(part.as_os_str());
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    Ok(out)
}

fn clean(path: &Path) -> Vec<Component<'_>> {
    let mut parts: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => parts.push(component),
            },
            other => parts.push(other),
        }
    }
    parts
}
