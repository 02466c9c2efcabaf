//! File system watcher for live rebuilds.
//!
//! ```text
//! ┌──────────┐    ┌───────────┐    ┌──────────────────────┐
//! │ notify   │───▶│ Coalescer │───▶│ build::rebuild(site) │
//! │ events   │    │ (debounce)│    │ one pass at a time   │
//! └──────────┘    └───────────┘    └──────────────────────┘
//! ```
//!
//! The watcher thread owns the [`Site`]. A burst of events is collected
//! until the source tree has been quiet for the debounce window, then
//! handed to a single pass. Events that arrive while a pass runs wait in
//! the channel and become exactly one further pass.

use crate::{build, debug, log, site::Site};
use anyhow::{Context, Result, anyhow};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::{
    collections::BTreeSet,
    path::PathBuf,
    sync::mpsc::{self, Receiver, RecvTimeoutError, Sender},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Message to the watch loop.
#[derive(Debug)]
pub enum WatchEvent {
    Fs(notify::Result<Event>),
    Stop,
}

// =============================================================================
// Coalescing
// =============================================================================

/// Union of changed paths since the last pass, with the debounce timer.
struct Coalescer {
    pending: BTreeSet<PathBuf>,
    last_event: Option<Instant>,
    debounce: Duration,
}

impl Coalescer {
    fn new(debounce: Duration) -> Self {
        Self {
            pending: BTreeSet::new(),
            last_event: None,
            debounce,
        }
    }

    /// Every event restarts the timer.
    fn add(&mut self, paths: Vec<PathBuf>) {
        self.pending.extend(paths);
        self.last_event = Some(Instant::now());
    }

    fn ready(&self) -> bool {
        !self.pending.is_empty() && self.last_event.is_some_and(|t| t.elapsed() >= self.debounce)
    }

    fn take(&mut self) -> Vec<PathBuf> {
        self.last_event = None;
        std::mem::take(&mut self.pending).into_iter().collect()
    }

    /// Time left until the window closes.
    fn timeout(&self) -> Duration {
        match self.last_event {
            Some(t) if !self.pending.is_empty() => self.debounce.saturating_sub(t.elapsed()),
            _ => IDLE_TIMEOUT,
        }
    }
}

const fn is_relevant(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) | EventKind::Any
    )
}

// =============================================================================
// Loop
// =============================================================================

/// Feed coalesced change sets to `rebuild` until stopped.
///
/// A closed channel flushes what is pending first. A watcher error ends the
/// loop.
pub fn run_loop(
    rx: &Receiver<WatchEvent>,
    debounce: Duration,
    mut rebuild: impl FnMut(Vec<PathBuf>),
) -> notify::Result<()> {
    let mut coalescer = Coalescer::new(debounce);

    loop {
        match rx.recv_timeout(coalescer.timeout()) {
            Ok(WatchEvent::Fs(Ok(event))) => {
                if is_relevant(&event) {
                    coalescer.add(event.paths);
                }
            }
            Ok(WatchEvent::Fs(Err(e))) => return Err(e),
            Ok(WatchEvent::Stop) => return Ok(()),
            Err(RecvTimeoutError::Timeout) => {
                if coalescer.ready() {
                    rebuild(coalescer.take());
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                if !coalescer.pending.is_empty() {
                    rebuild(coalescer.take());
                }
                return Ok(());
            }
        }
    }
}

fn rebuild_pass(site: &mut Site, changes: &[PathBuf]) {
    let root = &site.config().build.source;
    for path in changes {
        debug!("watch"; "changed: {}", path.strip_prefix(root).unwrap_or(path).display());
    }

    match build::rebuild(site, changes) {
        Ok(report) => report.log(),
        Err(e) => log!("watch"; "rebuild failed: {e}"),
    }
    eprintln!();
}

// =============================================================================
// Public API
// =============================================================================

/// A running watcher thread. [`stop`](Self::stop) hands the site back.
pub struct WatchHandle {
    tx: Sender<WatchEvent>,
    thread: JoinHandle<Site>,
}

impl WatchHandle {
    /// Watch the site's source tree and rebuild on changes.
    pub fn start(mut site: Site) -> Result<Self> {
        let (tx, rx) = mpsc::channel();
        let events = tx.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            events.send(WatchEvent::Fs(res)).ok();
        })
        .context("Failed to create file watcher")?;

        let source = site.config().build.source.clone();
        watcher
            .watch(&source, RecursiveMode::Recursive)
            .with_context(|| format!("Failed to watch {}", source.display()))?;
        log!("watch"; "watching {}", source.display());

        let debounce = site.config().serve.debounce();
        let thread = thread::Builder::new()
            .name("quire-watch".into())
            .spawn(move || {
                let _watcher = watcher;
                let result = run_loop(&rx, debounce, |changes| rebuild_pass(&mut site, &changes));
                if let Err(e) = result {
                    log!("watch"; "stopped: {e}");
                }
                site
            })
            .context("Failed to spawn watcher thread")?;

        Ok(Self { tx, thread })
    }

    /// Stop watching once the current pass (if any) is done.
    pub fn stop(self) -> Result<Site> {
        self.tx.send(WatchEvent::Stop).ok();
        self.thread
            .join()
            .map_err(|_| anyhow!("watcher thread panicked"))
    }
}
