//! Redirection history and the polling watcher: dedup against an in-memory
//! seen set backed by an append-only line store.

use anyhow::{Context, Result};
use monitor_core::{GatewayClient, MappingKey, Redirection};
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Every mapping identity seen so far, in first-seen order.
#[derive(Debug, Default)]
pub struct History {
    entries: Vec<Redirection>,
    keys: HashSet<MappingKey>,
}

impl History {
    pub fn new() -> Self {
        History::default()
    }

    pub fn contains(&self, r: &Redirection) -> bool {
        self.keys.contains(&r.key())
    }

    /// Insert a record; returns false if its identity was already present.
    pub fn insert(&mut self, r: Redirection) -> bool {
        if !self.keys.insert(r.key()) {
            return false;
        }
        self.entries.push(r);
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Redirection> {
        self.entries.iter()
    }
}

/// Pure dedup step: feed the live mapping table through the history set and
/// return the records whose identity was not seen before. No I/O, no clock.
pub fn sift(history: &mut History, live: Vec<Redirection>) -> Vec<Redirection> {
    let mut fresh = Vec::new();
    for r in live {
        if history.insert(r.clone()) {
            fresh.push(r);
        }
    }
    fresh
}

/// Append-only line store for the history. One JSON-encoded record per line,
/// appended to, never rewritten or compacted.
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        HistoryStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the full history. Never fails: a missing or unreadable file is an
    /// empty history, a malformed or non-UTF-8 line is skipped, and an I/O
    /// error mid-file keeps whatever loaded before it. Each case warns.
    pub fn load(&self) -> History {
        let mut history = History::new();
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return history,
            Err(e) => {
                eprintln!(
                    "warning: {}: cannot read history ({}), starting with empty history",
                    self.path.display(),
                    e
                );
                return history;
            }
        };
        for (lineno, line) in BufReader::new(file).lines().enumerate() {
            let line = match line {
                Ok(l) => l,
                // Invalid UTF-8 consumes the line, so later lines are intact.
                Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                    eprintln!(
                        "warning: {}:{}: skipping non-UTF-8 history line: {}",
                        self.path.display(),
                        lineno + 1,
                        e
                    );
                    continue;
                }
                Err(e) => {
                    eprintln!(
                        "warning: {}: stopped reading history at line {} ({}), keeping {} entr{} loaded so far",
                        self.path.display(),
                        lineno + 1,
                        e,
                        history.len(),
                        if history.len() == 1 { "y" } else { "ies" }
                    );
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match Redirection::from_line(&line) {
                Ok(r) => {
                    history.insert(r);
                }
                Err(e) => {
                    eprintln!(
                        "warning: {}:{}: skipping malformed history line: {}",
                        self.path.display(),
                        lineno + 1,
                        e
                    );
                }
            }
        }
        history
    }

    pub fn append(&self, r: &Redirection) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open {} for append", self.path.display()))?;
        writeln!(file, "{}", r.to_line()?)?;
        Ok(())
    }
}

/// Polls a gateway for its mapping table and promotes unseen redirections to
/// the history, alerting exactly once per identity.
pub struct Watcher<C> {
    client: C,
    store: HistoryStore,
    history: History,
}

impl<C: GatewayClient> Watcher<C> {
    /// Loads existing history from the store.
    pub fn new(client: C, store: HistoryStore) -> Self {
        let history = store.load();
        Watcher { client, store, history }
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// One poll cycle: fetch the live table, sift it, then handle each fresh
    /// record in order: alert first, persist second. Returns the number of
    /// fresh records.
    pub fn poll_once<F: FnMut(&Redirection)>(&mut self, mut on_alert: F) -> Result<usize> {
        let live = self.client.redirections()?;
        let fresh = sift(&mut self.history, live);
        for r in &fresh {
            on_alert(r);
            self.store.append(r)?;
        }
        Ok(fresh.len())
    }

    /// Poll forever at a fixed interval, invoking `on_alert` once per newly
    /// observed redirection. Only returns on error; gateway failures during
    /// polling propagate and end the loop.
    pub async fn run<F: FnMut(&Redirection)>(mut self, poll_interval: Duration, mut on_alert: F) -> Result<()> {
        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.poll_once(&mut on_alert)?;
        }
    }
}
