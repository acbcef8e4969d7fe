//! Configuration file watcher for hot reload of breaker thresholds.
//!
//! Reloaded settings only reach breakers created after the reload; a breaker's
//! thresholds are fixed when it is first built.

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::ManagerConfig;

/// Watches one configuration file and emits every valid new version.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<ManagerConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and the receiving end for validated configurations.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<ManagerConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching. The returned handle must be kept alive.
    ///
    /// The parent directory is watched so that editors which save by renaming
    /// a temporary file over the original are still picked up.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx;
        let path = self.path.clone();
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if is_content_change(&event.kind) && touches(&event, &path) => {
                    match load_config(&path) {
                        Ok(config) => {
                            tracing::info!(path = ?path, "Configuration file changed, reloading");
                            let _ = tx.send(config);
                        }
                        Err(e) => {
                            tracing::error!(path = ?path, error = %e, "Rejected configuration reload, keeping current settings");
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

fn is_content_change(kind: &EventKind) -> bool {
    kind.is_modify() || kind.is_create()
}

fn touches(event: &Event, path: &Path) -> bool {
    event
        .paths
        .iter()
        .any(|p| p.file_name().is_some() && p.file_name() == path.file_name())
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, ModifyKind};

    const VALID: &str = "[breakers.defaults]\nfailure_threshold = 7\n";
    const INVALID: &str = "[breakers.defaults]\nminimum_calls = 0\n";

    /// Replace the file the way editors do: write a sibling, then rename.
    fn save(path: &Path, contents: &str) {
        let staged = path.with_extension("toml.swp");
        std::fs::write(&staged, contents).unwrap();
        std::fs::rename(&staged, path).unwrap();
    }

    #[tokio::test]
    async fn test_valid_change_is_sent_and_invalid_change_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("circuit.toml");
        std::fs::write(&path, "").unwrap();

        let (watcher, mut updates) = ConfigWatcher::new(&path);
        let _handle = watcher.run().unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        save(&path, VALID);
        let config = tokio::time::timeout(Duration::from_secs(5), updates.recv())
            .await
            .expect("valid change not delivered")
            .unwrap();
        assert_eq!(config.breakers.defaults.failure_threshold, 7);

        // Drain duplicate notifications for the same save.
        tokio::time::sleep(Duration::from_millis(300)).await;
        while updates.try_recv().is_ok() {}

        save(&path, INVALID);
        let next = tokio::time::timeout(Duration::from_secs(1), updates.recv()).await;
        assert!(next.is_err(), "Invalid configuration must not be delivered");
    }

    #[test]
    fn test_unrelated_files_are_ignored() {
        let event = Event::new(EventKind::Modify(ModifyKind::Any))
            .add_path(PathBuf::from("/etc/circuit/other.toml"));
        assert!(!touches(&event, Path::new("/etc/circuit/circuit.toml")));

        let event = Event::new(EventKind::Modify(ModifyKind::Any))
            .add_path(PathBuf::from("/etc/circuit/circuit.toml"));
        assert!(touches(&event, Path::new("/etc/circuit/circuit.toml")));
    }

    #[test]
    fn test_only_content_changes_trigger_reload() {
        assert!(is_content_change(&EventKind::Modify(ModifyKind::Any)));
        assert!(is_content_change(&EventKind::Create(CreateKind::File)));
        assert!(!is_content_change(&EventKind::Access(AccessKind::Any)));
    }
}
