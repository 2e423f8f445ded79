//! Disk cache for remote video files.
//!
//! Files are named by the SHA-256 of their URL. A single background worker
//! downloads queued URLs and trims the directory to its byte budget, removing
//! the least recently touched files first.

mod queue;

pub use queue::{DownloadJob, DownloadQueue};

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use futures::StreamExt;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::VideoCacheConfig;
use crate::error::{AppError, AppResult};
use crate::logging::log_error;

const PARTIAL_EXTENSION: &str = "part";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetHandle {
    /// Fully downloaded copy on disk.
    Local(PathBuf),
    /// Not cached yet; play from the network while the download is queued.
    Streaming { url: String },
}

#[derive(Clone)]
pub struct VideoDiskCache {
    inner: Arc<Inner>,
}

struct Inner {
    directory: PathBuf,
    max_bytes: u64,
    http: reqwest::Client,
    queue: Mutex<DownloadQueue>,
    in_progress: Mutex<HashSet<String>>,
    wake: Notify,
}

impl VideoDiskCache {
    pub fn new(config: &VideoCacheConfig, http: reqwest::Client) -> AppResult<Self> {
        fs::create_dir_all(&config.directory)?;
        Ok(Self {
            inner: Arc::new(Inner {
                directory: config.directory.clone(),
                max_bytes: config.max_bytes,
                http,
                queue: Mutex::new(DownloadQueue::new(config.queue_capacity)),
                in_progress: Mutex::new(HashSet::new()),
                wake: Notify::new(),
            }),
        })
    }

    pub fn path_for(&self, url: &str) -> PathBuf {
        self.inner.directory.join(cache_key(url))
    }

    /// Local handle when cached (and refreshes its LRU timestamp), otherwise a
    /// streaming handle while the download is queued.
    pub async fn get_asset(&self, url: &str, priority: i32) -> AppResult<AssetHandle> {
        let path = self.path_for(url);
        if tokio::fs::try_exists(&path).await? {
            touch(path.clone()).await?;
            return Ok(AssetHandle::Local(path));
        }

        self.enqueue(url, priority)?;
        Ok(AssetHandle::Streaming {
            url: url.to_string(),
        })
    }

    /// Mark the cached file for `url` as recently used. Returns false when it is not cached.
    pub async fn touch_file(&self, url: &str) -> AppResult<bool> {
        let path = self.path_for(url);
        if !tokio::fs::try_exists(&path).await? {
            return Ok(false);
        }
        touch(path).await?;
        Ok(true)
    }

    /// Number of queued downloads.
    pub fn pending(&self) -> usize {
        self.inner.queue.lock().map(|q| q.len()).unwrap_or(0)
    }

    fn enqueue(&self, url: &str, priority: i32) -> AppResult<()> {
        let downloading = self
            .inner
            .in_progress
            .lock()
            .map_err(|e| AppError::Internal(e.to_string()))?
            .contains(url);
        if downloading {
            return Ok(());
        }

        let evicted = self
            .inner
            .queue
            .lock()
            .map_err(|e| AppError::Internal(e.to_string()))?
            .push(DownloadJob {
                url: url.to_string(),
                priority,
            });
        if let Some(job) = evicted {
            debug!("Download queue full, dropped {}", job.url);
        }
        self.inner.wake.notify_one();
        Ok(())
    }

    fn take_job(&self) -> Option<DownloadJob> {
        let job = self.inner.queue.lock().ok()?.pop()?;
        if let Ok(mut in_progress) = self.inner.in_progress.lock() {
            in_progress.insert(job.url.clone());
        }
        Some(job)
    }

    fn finish_job(&self, url: &str) {
        if let Ok(mut in_progress) = self.inner.in_progress.lock() {
            in_progress.remove(url);
        }
    }

    /// Start the download worker. Runs until aborted.
    pub fn spawn_worker(&self) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            info!("Video cache worker started in {:?}", cache.inner.directory);
            loop {
                let job = match cache.take_job() {
                    Some(job) => job,
                    None => {
                        cache.inner.wake.notified().await;
                        continue;
                    }
                };

                if let Err(e) = cache.download(&job.url).await {
                    warn!("Video download failed for {}: {}", job.url, e);
                    let partial = cache.path_for(&job.url).with_extension(PARTIAL_EXTENSION);
                    let _ = tokio::fs::remove_file(partial).await;
                }
                cache.finish_job(&job.url);

                let directory = cache.inner.directory.clone();
                let max_bytes = cache.inner.max_bytes;
                match tokio::task::spawn_blocking(move || trim_directory(&directory, max_bytes))
                    .await
                {
                    Ok(Ok(removed)) if removed > 0 => {
                        debug!("Trimmed {} cached videos", removed)
                    }
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => log_error("Failed to trim video cache", &e),
                    Err(e) => log_error("Video cache trim task failed", &e),
                }
            }
        })
    }

    async fn download(&self, url: &str) -> AppResult<PathBuf> {
        let target = self.path_for(url);
        let partial = target.with_extension(PARTIAL_EXTENSION);

        let response = self.inner.http.get(url).send().await?;
        if !response.status().is_success() {
            return Err(AppError::Api(format!("HTTP {} for {}", response.status(), url)));
        }

        let mut file = tokio::fs::File::create(&partial).await?;
        let mut body = response.bytes_stream();
        let mut written: u64 = 0;
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&partial, &target).await?;
        info!("Cached video {} ({} bytes)", url, written);
        Ok(target)
    }
}

fn cache_key(url: &str) -> String {
    hex_encode(Sha256::digest(url.as_bytes()))
}

fn hex_encode(bytes: impl AsRef<[u8]>) -> String {
    bytes
        .as_ref()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

async fn touch(path: PathBuf) -> AppResult<()> {
    tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        let file = fs::File::options().append(true).open(&path)?;
        file.set_modified(SystemTime::now())
    })
    .await??;
    Ok(())
}

/// Remove the least recently modified files until the directory holds at most
/// `max_bytes`. Partial downloads are ignored. Returns the number of files removed.
pub fn trim_directory(directory: &Path, max_bytes: u64) -> std::io::Result<usize> {
    let mut files: Vec<(PathBuf, u64, SystemTime)> = fs::read_dir(directory)?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().map_or(true, |ext| ext != PARTIAL_EXTENSION))
        .filter_map(|entry| {
            let md = entry.metadata().ok()?;
            if !md.is_file() {
                return None;
            }
            let mtime = md.modified().ok()?;
            Some((entry.path(), md.len(), mtime))
        })
        .collect();

    let mut total: u64 = files.iter().map(|(_, len, _)| len).sum();
    if total <= max_bytes {
        return Ok(0);
    }

    files.sort_by_key(|(_, _, mtime)| *mtime);
    let mut removed = 0;
    for (path, len, _) in files {
        if total <= max_bytes {
            break;
        }
        fs::remove_file(&path)?;
        total = total.saturating_sub(len);
        removed += 1;
    }
    Ok(removed)
}
