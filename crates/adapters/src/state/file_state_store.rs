use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use domain::common::error::MonitorError;
use domain::registry::entity::MonitoredDomain;
use ports::secondary::metrics_port::MetricsPort;
use ports::secondary::state_store::StateStore;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};

const STATE_FILE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct StateFile {
    version: u32,
    saved_at: DateTime<Utc>,
    instance_id: String,
    domains: Vec<MonitoredDomain>,
}

/// JSON snapshot store with atomic replace.
///
/// Write protocol: serialise to a temp file in the same directory, fsync,
/// rename over the canonical path — a reader sees the old or the new
/// snapshot, never a blend. A malformed file at load time is moved aside
/// to `state.corrupt.<unix-ts>` and the service starts empty rather than
/// refusing to boot.
pub struct FileStateStore {
    path: PathBuf,
    instance_id: String,
    metrics: Arc<dyn MetricsPort>,
    /// Writes are serialised; two concurrent saves must not race the
    /// temp-file rename.
    write_lock: tokio::sync::Mutex<()>,
}

impl FileStateStore {
    /// Create the store under `dir/state.json`, creating `dir` if needed.
    pub async fn new(
        dir: &Path,
        instance_id: String,
        metrics: Arc<dyn MetricsPort>,
    ) -> Result<Self, MonitorError> {
        tokio::fs::create_dir_all(dir).await.map_err(|e| {
            MonitorError::Persistence(format!(
                "failed to create state directory {}: {e}",
                dir.display()
            ))
        })?;
        Ok(Self {
            path: dir.join("state.json"),
            instance_id,
            metrics,
            write_lock: tokio::sync::Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        self.path.with_extension("json.tmp")
    }

    fn quarantine_path(&self) -> PathBuf {
        let ts = Utc::now().timestamp();
        self.path.with_file_name(format!("state.corrupt.{ts}"))
    }

    async fn do_load(&self) -> Result<Vec<MonitoredDomain>, MonitorError> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "no state snapshot, starting empty");
                return Ok(vec![]);
            }
            Err(e) => {
                return Err(MonitorError::Persistence(format!(
                    "failed to read state file {}: {e}",
                    self.path.display()
                )));
            }
        };

        match serde_json::from_slice::<StateFile>(&raw) {
            Ok(state) => {
                if state.version != STATE_FILE_VERSION {
                    warn!(
                        found = state.version,
                        expected = STATE_FILE_VERSION,
                        "state file version mismatch, loading anyway"
                    );
                }
                info!(
                    domains = state.domains.len(),
                    saved_at = %state.saved_at,
                    "state snapshot loaded"
                );
                Ok(state.domains)
            }
            Err(parse_err) => {
                // Corrupt snapshot: keep the evidence, start empty.
                let quarantine = self.quarantine_path();
                error!(
                    path = %self.path.display(),
                    quarantine = %quarantine.display(),
                    error = %parse_err,
                    "state file corrupt, quarantining and starting empty"
                );
                self.metrics.record_state_corruption();
                if let Err(rename_err) = tokio::fs::rename(&self.path, &quarantine).await {
                    error!(error = %rename_err, "failed to quarantine corrupt state file");
                }
                Ok(vec![])
            }
        }
    }

    async fn do_save(&self, domains: &[MonitoredDomain]) -> Result<(), MonitorError> {
        let _guard = self.write_lock.lock().await;

        let state = StateFile {
            version: STATE_FILE_VERSION,
            saved_at: Utc::now(),
            instance_id: self.instance_id.clone(),
            domains: domains.to_vec(),
        };
        let body = serde_json::to_vec_pretty(&state)
            .map_err(|e| MonitorError::Persistence(format!("state serialisation failed: {e}")))?;

        let temp = self.temp_path();
        let mut file = tokio::fs::File::create(&temp).await.map_err(|e| {
            MonitorError::Persistence(format!("failed to create {}: {e}", temp.display()))
        })?;
        file.write_all(&body).await.map_err(|e| {
            MonitorError::Persistence(format!("failed to write {}: {e}", temp.display()))
        })?;
        file.sync_all().await.map_err(|e| {
            MonitorError::Persistence(format!("failed to fsync {}: {e}", temp.display()))
        })?;
        drop(file);

        tokio::fs::rename(&temp, &self.path).await.map_err(|e| {
            MonitorError::Persistence(format!(
                "failed to rename {} over {}: {e}",
                temp.display(),
                self.path.display()
            ))
        })
    }

    async fn probe_writable(&self) -> bool {
        let probe = self.path.with_file_name(".writable-probe");
        match tokio::fs::write(&probe, b"probe").await {
            Ok(()) => {
                let _ = tokio::fs::remove_file(&probe).await;
                true
            }
            Err(_) => false,
        }
    }
}

impl StateStore for FileStateStore {
    fn load<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<MonitoredDomain>, MonitorError>> + Send + 'a>>
    {
        Box::pin(self.do_load())
    }

    fn save<'a>(
        &'a self,
        domains: &'a [MonitoredDomain],
    ) -> Pin<Box<dyn Future<Output = Result<(), MonitorError>> + Send + 'a>> {
        Box::pin(self.do_save(domains))
    }

    fn is_writable<'a>(&'a self) -> Pin<Box<dyn Future<Output = bool> + Send + 'a>> {
        Box::pin(self.probe_writable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::common::entity::{DomainName, VerdictStatus};
    use ports::test_utils::NoopMetrics;
    use tempfile::tempdir;

    async fn store(dir: &Path) -> FileStateStore {
        FileStateStore::new(dir, "test".to_string(), Arc::new(NoopMetrics))
            .await
            .unwrap()
    }

    fn sample_domain(name: &str) -> MonitoredDomain {
        let mut domain =
            MonitoredDomain::new(DomainName::parse(name).unwrap(), true, Utc::now());
        domain.last_verdict = VerdictStatus::ConfirmedAvailable;
        domain.last_confidence = 0.95;
        domain.last_reported_status = Some(VerdictStatus::ConfirmedAvailable);
        domain.consecutive_failures = 2;
        domain
    }

    #[tokio::test]
    async fn missing_file_loads_empty() {
        let dir = tempdir().unwrap();
        let store = store(dir.path()).await;
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_then_load_roundtrips() {
        let dir = tempdir().unwrap();
        let store = store(dir.path()).await;

        let domains = vec![sample_domain("a.com"), sample_domain("b.com")];
        store.save(&domains).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded, domains);
    }

    #[tokio::test]
    async fn reload_with_fresh_store_sees_same_state() {
        let dir = tempdir().unwrap();
        {
            let store = store(dir.path()).await;
            store.save(&[sample_domain("a.com")]).await.unwrap();
        }
        let store2 = store(dir.path()).await;
        let loaded = store2.load().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(
            loaded[0].last_reported_status,
            Some(VerdictStatus::ConfirmedAvailable)
        );
    }

    #[tokio::test]
    async fn corrupt_file_is_quarantined_and_load_starts_empty() {
        let dir = tempdir().unwrap();
        let store = store(dir.path()).await;
        tokio::fs::write(store.path(), b"{ not json")
            .await
            .unwrap();

        let loaded = store.load().await.unwrap();
        assert!(loaded.is_empty());

        // The original file moved aside, nothing left at the canonical path.
        assert!(!store.path().exists());
        let mut entries = tokio::fs::read_dir(dir.path()).await.unwrap();
        let mut quarantined = false;
        while let Some(entry) = entries.next_entry().await.unwrap() {
            if entry
                .file_name()
                .to_string_lossy()
                .starts_with("state.corrupt.")
            {
                quarantined = true;
            }
        }
        assert!(quarantined, "corrupt file must be kept for inspection");
    }

    #[tokio::test]
    async fn repeated_saves_leave_consistent_state() {
        let dir = tempdir().unwrap();
        let store = store(dir.path()).await;
        for i in 0..10 {
            let mut domain = sample_domain("a.com");
            domain.consecutive_failures = i;
            store.save(&[domain]).await.unwrap();
        }
        let loaded = store.load().await.unwrap();
        assert_eq!(loaded[0].consecutive_failures, 9);
        // No leftover temp file.
        assert!(!store.temp_path().exists());
    }

    #[tokio::test]
    async fn transient_flags_do_not_survive_persistence() {
        let dir = tempdir().unwrap();
        let store = store(dir.path()).await;
        let mut domain = sample_domain("a.com");
        domain.in_flight = true;
        domain.pending_removal = true;
        store.save(&[domain]).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert!(!loaded[0].in_flight);
        assert!(!loaded[0].pending_removal);
    }

    #[tokio::test]
    async fn writable_probe_reflects_directory_state() {
        let dir = tempdir().unwrap();
        let store = store(dir.path()).await;
        assert!(store.is_writable().await);
    }
}
