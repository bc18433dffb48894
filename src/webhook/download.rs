//! Best-effort audio downloads triggered by `tts_delivered` events.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio_util::task::TaskTracker;

use crate::error::{CreoleError, Result};
use crate::http::{shared_client, status_to_error};
use crate::util::timeout::with_timeout;

/// Where downloaded audio ends up.
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Persist the audio for `job_id`, returning where it was written.
    ///
    /// Writing the same job twice must leave a complete file, never a torn one.
    async fn store(&self, job_id: &str, audio: &[u8]) -> Result<PathBuf>;
}

/// Writes `<dir>/<job_id>.mp3`, via a temporary file and rename.
#[derive(Debug, Clone)]
pub struct FileAudioSink {
    dir: PathBuf,
}

impl FileAudioSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, job_id: &str) -> PathBuf {
        self.dir.join(format!("{}.mp3", sanitize_file_stem(job_id)))
    }
}

#[async_trait]
impl AudioSink for FileAudioSink {
    async fn store(&self, job_id: &str, audio: &[u8]) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(job_id);
        let tmp = path.with_extension(format!("mp3.{}.part", uuid::Uuid::new_v4().simple()));
        tokio::fs::write(&tmp, audio).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(path)
    }
}

/// Keep job ids from escaping the download directory.
fn sanitize_file_stem(job_id: &str) -> String {
    let cleaned: String = job_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "unknown".to_string()
    } else {
        cleaned
    }
}

/// Progress of the download for one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DownloadStatus {
    InFlight,
    Done { path: PathBuf, sha256: String, bytes: usize },
}

/// Result of asking for a download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    Started,
    /// A download for this job is running or already finished.
    AlreadyClaimed,
    /// No async runtime to run on; nothing was started.
    NoRuntime,
}

/// Largest audio body accepted unless configured otherwise (100 MiB).
pub const DEFAULT_MAX_AUDIO_BYTES: u64 = 100 * 1024 * 1024;

#[derive(Debug, Default)]
struct Claims {
    jobs: HashMap<String, DownloadStatus>,
    /// In-flight jobs to drop as soon as their download finishes.
    released: HashSet<String>,
}

/// Fetches delivered audio in the background, at most once per job.
///
/// A job is claimed before its task is spawned; a failed download releases
/// the claim so a redelivered event can try again.
pub struct AudioDownloader {
    sink: Arc<dyn AudioSink>,
    timeout: Duration,
    max_bytes: u64,
    claims: Mutex<Claims>,
    tasks: TaskTracker,
}

impl std::fmt::Debug for AudioDownloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioDownloader")
            .field("timeout", &self.timeout)
            .field("max_bytes", &self.max_bytes)
            .field("pending", &self.tasks.len())
            .finish()
    }
}

impl AudioDownloader {
    pub fn new(sink: Arc<dyn AudioSink>, timeout: Duration) -> Self {
        Self {
            sink,
            timeout,
            max_bytes: DEFAULT_MAX_AUDIO_BYTES,
            claims: Mutex::new(Claims::default()),
            tasks: TaskTracker::new(),
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    fn claims(&self) -> MutexGuard<'_, Claims> {
        self.claims.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn status(&self, job_id: &str) -> Option<DownloadStatus> {
        self.claims().jobs.get(job_id).cloned()
    }

    /// Number of jobs holding a claim.
    pub fn claimed(&self) -> usize {
        self.claims().jobs.len()
    }

    /// Drop the claim for `job_id`; a running download is dropped when it ends.
    pub fn forget(&self, job_id: &str) {
        let mut claims = self.claims();
        match claims.jobs.get(job_id) {
            Some(DownloadStatus::InFlight) => {
                claims.released.insert(job_id.to_string());
            }
            Some(DownloadStatus::Done { .. }) => {
                claims.jobs.remove(job_id);
            }
            None => {}
        }
    }

    /// Start a background download unless one is already claimed for `job_id`.
    pub fn schedule(self: &Arc<Self>, job_id: &str, url: &str) -> Schedule {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::error!(job_id, "No async runtime available for audio download");
            return Schedule::NoRuntime;
        };

        {
            let mut claims = self.claims();
            if claims.jobs.contains_key(job_id) {
                // The job is live again, so keep whatever the running download produces.
                claims.released.remove(job_id);
                tracing::info!(job_id, "Audio download already claimed, skipping");
                return Schedule::AlreadyClaimed;
            }
            claims
                .jobs
                .insert(job_id.to_string(), DownloadStatus::InFlight);
        }

        let this = Arc::clone(self);
        let job_id = job_id.to_string();
        let url = url.to_string();
        self.tasks.spawn_on(
            async move {
                tracing::info!(job_id = %job_id, %url, "Downloading audio");
                let result = this.fetch(&job_id, &url).await;

                let mut claims = this.claims();
                let released = claims.released.remove(&job_id);
                match result {
                    Ok(done) => {
                        if let DownloadStatus::Done { path, bytes, .. } = &done {
                            tracing::info!(job_id = %job_id, path = %path.display(), bytes, "Audio saved");
                        }
                        if released {
                            claims.jobs.remove(&job_id);
                        } else {
                            claims.jobs.insert(job_id, done);
                        }
                    }
                    Err(e) => {
                        tracing::error!(job_id = %job_id, error = %e, "Failed to download audio");
                        claims.jobs.remove(&job_id);
                    }
                }
            },
            &handle,
        );

        Schedule::Started
    }

    async fn fetch(&self, job_id: &str, url: &str) -> Result<DownloadStatus> {
        let audio = with_timeout(self.timeout, async {
            let response = shared_client().get(url).send().await?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(status_to_error(status.as_u16(), &body));
            }

            if response.content_length().is_some_and(|len| len > self.max_bytes) {
                return Err(self.too_large(job_id));
            }

            let mut audio = Vec::new();
            let mut chunks = response.bytes_stream();
            while let Some(chunk) = chunks.next().await {
                let chunk = chunk?;
                if (audio.len() + chunk.len()) as u64 > self.max_bytes {
                    return Err(self.too_large(job_id));
                }
                audio.extend_from_slice(&chunk);
            }
            Ok(audio)
        })
        .await?;

        if audio.is_empty() {
            return Err(CreoleError::Validation(format!(
                "Empty audio body for job {job_id}"
            )));
        }

        let sha256 = hex(&Sha256::digest(&audio));
        let path = self.sink.store(job_id, &audio).await?;
        Ok(DownloadStatus::Done {
            path,
            sha256,
            bytes: audio.len(),
        })
    }

    fn too_large(&self, job_id: &str) -> CreoleError {
        CreoleError::Validation(format!(
            "Audio for job {job_id} exceeds {} bytes",
            self.max_bytes
        ))
    }

    /// Wait for every download started so far.
    pub async fn wait_idle(&self) {
        self.tasks.close();
        self.tasks.wait().await;
        self.tasks.reopen();
    }

    /// Stop accepting work and wait up to `grace` for running downloads.
    pub async fn shutdown(&self, grace: Duration) {
        self.tasks.close();
        if tokio::time::timeout(grace, self.tasks.wait()).await.is_err() {
            tracing::warn!(pending = self.tasks.len(), "Audio downloads still running at shutdown");
        }
    }
}

fn hex(bytes: &[u8]) -> String {
    use std::fmt::Write;
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    })
}
