use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::Duration;

use terra_world::{MapGenConfig, load_config_from_path};

/// Watches the config file and reloads it on change. Events are coalesced;
/// the driving loop polls once per tick.
pub struct ConfigWatcher {
    path: PathBuf,
    events: Receiver<()>,
}

impl ConfigWatcher {
    pub fn spawn(path: &Path) -> Self {
        let (tx, events) = mpsc::channel::<()>();
        let watched = path.to_path_buf();
        let spawned = thread::Builder::new()
            .name("terra-config-watch".into())
            .spawn(move || {
                use notify::{EventKind, RecursiveMode, Watcher};
                let on_event = move |res: Result<notify::Event, notify::Error>| {
                    if let Ok(event) = res {
                        match event.kind {
                            EventKind::Modify(_)
                            | EventKind::Create(_)
                            | EventKind::Remove(_)
                            | EventKind::Any => {
                                let _ = tx.send(());
                            }
                            _ => {}
                        }
                    }
                };
                let mut watcher = match notify::recommended_watcher(on_event) {
                    Ok(w) => w,
                    Err(e) => {
                        log::warn!("config watcher unavailable: {e}");
                        return;
                    }
                };
                if let Err(e) = watcher.watch(&watched, RecursiveMode::NonRecursive) {
                    log::warn!("cannot watch {}: {e}", watched.display());
                    return;
                }
                log::info!("watching {} for changes", watched.display());
                loop {
                    thread::sleep(Duration::from_secs(3600));
                }
            });
        if let Err(e) = spawned {
            log::warn!("failed to start config watcher thread: {e}");
        }
        Self::with_events(path.to_path_buf(), events)
    }

    /// Watcher fed by an existing event channel; each `()` marks a change.
    fn with_events(path: PathBuf, events: Receiver<()>) -> Self {
        Self { path, events }
    }

    /// Returns the freshly loaded (sanitized) config if the file changed since
    /// the last poll. A file that fails to load keeps the current config.
    pub fn poll(&self) -> Option<MapGenConfig> {
        if self.events.try_iter().count() == 0 {
            return None;
        }
        match load_config_from_path(&self.path) {
            Ok(cfg) => {
                log::info!("reloaded {}", self.path.display());
                Some(cfg)
            }
            Err(e) => {
                log::warn!("keeping previous config; {}: {e}", self.path.display());
                None
            }
        }
    }
}
