//! Recursive vault watching with per-path debounce.
//!
//! Editors fire bursts of write events for a single save; each `.md` path
//! gets its own debounce deadline, reset on every new event, and the change
//! callback fires once per quiet path. Directory creations extend the watch
//! set on the fly.

use crate::error::{IndexerError, Result};
use ignore::WalkBuilder;
use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Default quiet period before a changed path is handed to the callback.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

type SharedWatcher = Arc<Mutex<Option<RecommendedWatcher>>>;

/// Handle for a running vault watcher. Dropping it (or calling
/// [`VaultWatcher::shutdown`]) stops the event loop and cancels pending
/// debounce timers.
pub struct VaultWatcher {
    shutdown_tx: mpsc::Sender<()>,
    _watcher: SharedWatcher,
}

impl VaultWatcher {
    /// Watch `root` recursively and invoke `on_change` with the absolute path
    /// of every debounced `.md` write. The callback runs on the watcher's
    /// task, serialized with event processing.
    pub fn spawn<F, Fut>(root: &Path, debounce: Duration, on_change: F) -> Result<Self>
    where
        F: FnMut(PathBuf) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (event_tx, event_rx) = mpsc::channel(1024);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = event_tx.blocking_send(res);
            },
            NotifyConfig::default(),
        )
        .map_err(|e| IndexerError::Watch(format!("watcher init failed: {e}")))?;

        for dir in non_hidden_dirs(root) {
            if let Err(e) = watcher.watch(&dir, RecursiveMode::NonRecursive) {
                log::warn!("failed to watch {}: {e}", dir.display());
            }
        }

        let watcher: SharedWatcher = Arc::new(Mutex::new(Some(watcher)));
        tokio::spawn(run_event_loop(
            event_rx,
            shutdown_rx,
            debounce,
            on_change,
            watcher.clone(),
        ));

        Ok(Self {
            shutdown_tx,
            _watcher: watcher,
        })
    }

    /// Stop the event loop. Pending debounce entries are dropped unfired.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

impl Drop for VaultWatcher {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.try_send(());
    }
}

/// The debounce loop itself, factored out of [`VaultWatcher::spawn`] so tests
/// can drive it with synthetic events under paused time.
pub(crate) async fn run_event_loop<F, Fut>(
    mut events: mpsc::Receiver<notify::Result<Event>>,
    mut shutdown: mpsc::Receiver<()>,
    debounce: Duration,
    mut on_change: F,
    watcher: SharedWatcher,
) where
    F: FnMut(PathBuf) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    let mut pending: HashMap<PathBuf, Instant> = HashMap::new();

    loop {
        let next_deadline = pending.values().min().copied();

        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                match event {
                    Ok(event) => handle_event(&event, debounce, &mut pending, &watcher),
                    Err(e) => log::warn!("watcher error: {e}"),
                }
            }
            _ = shutdown.recv() => break,
            () = async {
                if let Some(deadline) = next_deadline {
                    tokio::time::sleep_until(deadline).await;
                }
            }, if next_deadline.is_some() => {
                let now = Instant::now();
                let due: Vec<PathBuf> = pending
                    .iter()
                    .filter(|(_, deadline)| **deadline <= now)
                    .map(|(path, _)| path.clone())
                    .collect();
                for path in due {
                    pending.remove(&path);
                    on_change(path).await;
                }
            }
        }
    }
}

fn handle_event(
    event: &Event,
    debounce: Duration,
    pending: &mut HashMap<PathBuf, Instant>,
    watcher: &SharedWatcher,
) {
    let relevant = matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_));
    if !relevant {
        return;
    }

    for path in &event.paths {
        // Newly created directories must join the watch set.
        if path.is_dir() {
            if !is_hidden_name(path) {
                watch_subtree(watcher, path);
            }
            continue;
        }

        if path.extension().is_some_and(|ext| ext == "md") {
            pending.insert(path.clone(), Instant::now() + debounce);
        }
    }
}

fn watch_subtree(watcher: &SharedWatcher, start: &Path) {
    let dirs = non_hidden_dirs(start);
    let mut guard = match watcher.lock() {
        Ok(guard) => guard,
        Err(_) => {
            log::warn!("watcher lock poisoned");
            return;
        }
    };
    let Some(watcher) = guard.as_mut() else {
        return;
    };
    for dir in dirs {
        if let Err(e) = watcher.watch(&dir, RecursiveMode::NonRecursive) {
            log::warn!("failed to watch {}: {e}", dir.display());
        }
    }
}

/// All directories under `root` (inclusive) whose own name does not start
/// with a dot.
fn non_hidden_dirs(root: &Path) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    let walker = WalkBuilder::new(root)
        .standard_filters(false)
        .filter_entry(|entry| {
            entry.depth() == 0 || !entry.file_name().to_string_lossy().starts_with('.')
        })
        .build();
    for entry in walker {
        let Ok(entry) = entry else { continue };
        if entry.file_type().is_some_and(|ft| ft.is_dir()) {
            dirs.push(entry.path().to_path_buf());
        }
    }
    dirs
}

fn is_hidden_name(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, ModifyKind};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn modify_event(path: &Path) -> notify::Result<Event> {
        Ok(Event::new(EventKind::Modify(ModifyKind::Any)).add_path(path.to_path_buf()))
    }

    fn create_event(path: &Path) -> notify::Result<Event> {
        Ok(Event::new(EventKind::Create(CreateKind::File)).add_path(path.to_path_buf()))
    }

    struct Loop {
        event_tx: mpsc::Sender<notify::Result<Event>>,
        _shutdown_tx: mpsc::Sender<()>,
        fired: Arc<Mutex<Vec<PathBuf>>>,
        calls: Arc<AtomicUsize>,
    }

    fn start_loop(debounce: Duration) -> Loop {
        let (event_tx, event_rx) = mpsc::channel(64);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let fired = Arc::new(Mutex::new(Vec::new()));
        let calls = Arc::new(AtomicUsize::new(0));

        let fired_in_loop = fired.clone();
        let calls_in_loop = calls.clone();
        tokio::spawn(run_event_loop(
            event_rx,
            shutdown_rx,
            debounce,
            move |path| {
                let fired = fired_in_loop.clone();
                let calls = calls_in_loop.clone();
                async move {
                    fired.lock().unwrap().push(path);
                    calls.fetch_add(1, Ordering::SeqCst);
                }
            },
            Arc::new(Mutex::new(None)),
        ));

        Loop {
            event_tx,
            _shutdown_tx: shutdown_tx,
            fired,
            calls,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_events_collapse_into_one_callback() {
        let debounce = Duration::from_millis(500);
        let state = start_loop(debounce);
        let path = PathBuf::from("/vault/note.md");

        // Three writes within 100ms.
        for _ in 0..3 {
            state.event_tx.send(modify_event(&path)).await.unwrap();
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        // Not yet: the quiet period restarts with each event.
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(state.calls.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(state.calls.load(Ordering::SeqCst), 1);
        assert_eq!(state.fired.lock().unwrap().as_slice(), [path]);
    }

    #[tokio::test(start_paused = true)]
    async fn distinct_paths_debounce_independently() {
        let state = start_loop(Duration::from_millis(500));
        let a = PathBuf::from("/vault/a.md");
        let b = PathBuf::from("/vault/b.md");

        state.event_tx.send(create_event(&a)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        state.event_tx.send(modify_event(&b)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(state.fired.lock().unwrap().as_slice(), [a.clone()]);

        tokio::time::sleep(Duration::from_millis(300)).await;
        let fired = state.fired.lock().unwrap();
        assert_eq!(fired.len(), 2);
        assert!(fired.contains(&b));
    }

    #[tokio::test(start_paused = true)]
    async fn non_markdown_files_are_ignored() {
        let state = start_loop(Duration::from_millis(100));
        state
            .event_tx
            .send(modify_event(Path::new("/vault/image.png")))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(state.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn watcher_errors_do_not_stop_the_loop() {
        let state = start_loop(Duration::from_millis(100));
        state
            .event_tx
            .send(Err(notify::Error::generic("backend hiccup")))
            .await
            .unwrap();
        state
            .event_tx
            .send(modify_event(Path::new("/vault/note.md")))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(state.calls.load(Ordering::SeqCst), 1);
    }
}
