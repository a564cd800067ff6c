//! Scoped ownership of temporary conversion files
//!
//! Every job gets its own `job-<uuid>` directory under the temp root, so two
//! conversations uploading `report.docx` at the same time never collide.
//! Whatever the job tracked is deleted exactly once when the scope is
//! released or dropped; deletion failures are logged and never returned.

use std::io;
use std::path::{Component, Path, PathBuf};

/// Fallback for display names that reduce to nothing
const FALLBACK_NAME: &str = "upload";

const JOB_DIR_PREFIX: &str = "job-";

/// Temp files owned by one conversion job
#[derive(Debug)]
pub struct ScopedArtifacts {
    dir: PathBuf,
    paths: Vec<PathBuf>,
    released: bool,
}

impl ScopedArtifacts {
    /// Create a fresh job directory under `root`
    pub async fn create(root: &Path) -> io::Result<Self> {
        let dir = root.join(format!("{JOB_DIR_PREFIX}{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&dir).await?;
        tracing::debug!(dir = %dir.display(), "Created job directory");
        Ok(Self {
            dir,
            paths: Vec::new(),
            released: false,
        })
    }

    #[cfg(test)]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Reserve a path inside the job directory for a user-supplied name
    pub fn track(&mut self, display_name: &str) -> PathBuf {
        let path = self.dir.join(sanitize_file_name(display_name));
        self.adopt(path.clone());
        path
    }

    /// Take ownership of a path produced by someone else
    pub fn adopt(&mut self, path: PathBuf) {
        if !self.paths.contains(&path) {
            self.paths.push(path);
        }
    }

    /// Paths currently owned by this scope
    #[cfg(test)]
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Delete everything this scope owns
    pub async fn release(mut self) {
        self.released = true;

        for path in self.paths.drain(..) {
            log_removal(&path, tokio::fs::remove_file(&path).await);
        }

        // Sweeps partial converter output and tool scratch files
        match tokio::fs::remove_dir_all(&self.dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(
                    dir = %self.dir.display(),
                    error = %e,
                    "Failed to remove job directory"
                );
            }
        }
    }
}

// Only reached when a job is cancelled or panics before `release`
impl Drop for ScopedArtifacts {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        for path in self.paths.drain(..) {
            log_removal(&path, std::fs::remove_file(&path));
        }
        if let Err(e) = std::fs::remove_dir_all(&self.dir) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!(
                    dir = %self.dir.display(),
                    error = %e,
                    "Failed to remove job directory"
                );
            }
        }
    }
}

/// Remove job directories left behind by a previous process. Returns how
/// many were removed. Blocking; run it off the async workers.
pub fn sweep_stale_jobs(root: &Path) -> io::Result<usize> {
    let mut removed = 0;
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        let is_job = entry.file_name().to_string_lossy().starts_with(JOB_DIR_PREFIX);
        if !is_job || !entry.file_type()?.is_dir() {
            continue;
        }
        match std::fs::remove_dir_all(entry.path()) {
            Ok(()) => removed += 1,
            Err(e) => tracing::warn!(
                dir = %entry.path().display(),
                error = %e,
                "Failed to remove stale job directory"
            ),
        }
    }
    Ok(removed)
}

fn log_removal(path: &Path, result: io::Result<()>) {
    match result {
        Ok(()) => tracing::debug!(path = %path.display(), "Removed temp file"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to remove temp file"),
    }
}

/// Reduce a user-supplied name to a single safe path component
pub fn sanitize_file_name(display_name: &str) -> String {
    let last = Path::new(display_name)
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .last()
        .unwrap_or("");

    let cleaned: String = last
        .chars()
        .filter(|c| !c.is_control() && *c != '\\')
        .collect();
    let cleaned = cleaned.trim();
    let stem_dots = cleaned.len() - cleaned.trim_start_matches('.').len();

    match cleaned.get(stem_dots..) {
        None | Some("") => FALLBACK_NAME.to_string(),
        // A bare extension keeps its separator: `..png` stays a `.png`
        Some(rest) if stem_dots > 0 && !rest.contains('.') => format!("{FALLBACK_NAME}.{rest}"),
        Some(rest) => rest.to_string(),
    }
}
