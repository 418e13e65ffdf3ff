use notify::event::EventKind;
use notify::{Config, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, RecvTimeoutError, channel};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum WatchSignal {
    Changed,
    Error(String),
}

/// Watches the tasks and projects trees and turns relevant file events into
/// reload signals.
///
/// A tree that does not exist yet is watched through its parent and attached
/// once it appears.
#[derive(Debug)]
pub struct TreeWatcher {
    watcher: RecommendedWatcher,
    rx: Receiver<WatchSignal>,
    pending: Vec<PathBuf>,
}

impl TreeWatcher {
    /// Blocks until a signal arrives, then swallows further `Changed` signals
    /// until `quiet` passes without one. Returns `None` once the watcher is gone.
    pub fn recv_coalesced(&mut self, quiet: Duration) -> Option<WatchSignal> {
        let first = self.rx.recv().ok()?;
        if let WatchSignal::Error(_) = first {
            return Some(first);
        }
        loop {
            match self.rx.recv_timeout(quiet) {
                Ok(WatchSignal::Changed) => continue,
                Ok(error @ WatchSignal::Error(_)) => return Some(error),
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => {
                    self.attach_pending();
                    return Some(WatchSignal::Changed);
                }
            }
        }
    }

    /// Trees still waiting to be created.
    pub fn pending(&self) -> &[PathBuf] {
        &self.pending
    }

    fn attach_pending(&mut self) {
        let watcher = &mut self.watcher;
        self.pending.retain(|path| {
            if !path.exists() {
                return true;
            }
            match watcher.watch(path, RecursiveMode::Recursive) {
                Ok(()) => {
                    debug!(path = %path.display(), "attached watcher to new tree");
                    false
                }
                Err(error) => {
                    warn!(path = %path.display(), %error, "failed to watch tree");
                    true
                }
            }
        });
    }
}

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("watch error: {0}")]
    Notify(#[from] notify::Error),
}

/// Watches every path in `paths` recursively. A path that does not exist yet
/// is picked up after its parent reports a change.
pub fn watch_trees(paths: &[&Path]) -> Result<TreeWatcher, WatchError> {
    let (tx, rx) = channel::<WatchSignal>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<notify::Event>| match res {
            Ok(event) => {
                if should_trigger_reload(&event) {
                    let _ = tx.send(WatchSignal::Changed);
                }
            }
            Err(error) => {
                let _ = tx.send(WatchSignal::Error(error.to_string()));
            }
        },
        Config::default(),
    )?;

    let mut pending = Vec::new();
    let mut parents: Vec<&Path> = Vec::new();
    for path in paths {
        if path.exists() {
            watcher.watch(path, RecursiveMode::Recursive)?;
            continue;
        }
        warn!(path = %path.display(), "tree does not exist yet; waiting for it");
        pending.push(path.to_path_buf());
        if let Some(parent) = path.parent().filter(|parent| parent.is_dir()) {
            if !parents.contains(&parent) {
                watcher.watch(parent, RecursiveMode::NonRecursive)?;
                parents.push(parent);
            }
        }
    }

    Ok(TreeWatcher {
        watcher,
        rx,
        pending,
    })
}

fn should_trigger_reload(event: &notify::Event) -> bool {
    if matches!(event.kind, EventKind::Access(_)) {
        return false;
    }
    if event.paths.is_empty() {
        return true;
    }

    event.paths.iter().any(|path| {
        matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some("json" | "jsonl")
        ) || path.extension().is_none()
    })
}
