//! Session-wide mining statistics
//!
//! Workers flush hash counts here in batches; the controller and operator
//! tooling read point-in-time snapshots. Fields are loaded individually, so a
//! snapshot is approximately current rather than a cross-field transaction,
//! which is enough for monitoring.

use crate::pow::ProofOfWork;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy)]
struct SessionClock {
    started: Instant,
    started_unix: u64,
    stopped: Option<Instant>,
}

impl SessionClock {
    fn now() -> Self {
        Self {
            started: Instant::now(),
            started_unix: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
            stopped: None,
        }
    }

    fn elapsed(&self) -> Duration {
        match self.stopped {
            Some(stopped) => stopped.duration_since(self.started),
            None => self.started.elapsed(),
        }
    }
}

/// Thread-safe counters for one mining session
#[derive(Debug)]
pub struct MiningStatsRegistry {
    hashes_computed: AtomicU64,
    blocks_found: AtomicU64,
    blocks_rejected: AtomicU64,
    build_failures: AtomicU64,
    is_mining: AtomicBool,
    clock: Mutex<SessionClock>,
}

impl Default for MiningStatsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MiningStatsRegistry {
    pub fn new() -> Self {
        Self {
            hashes_computed: AtomicU64::new(0),
            blocks_found: AtomicU64::new(0),
            blocks_rejected: AtomicU64::new(0),
            build_failures: AtomicU64::new(0),
            is_mining: AtomicBool::new(false),
            clock: Mutex::new(SessionClock::now()),
        }
    }

    /// Zeroes all counters and starts a new session clock
    pub fn reset_session(&self) {
        self.hashes_computed.store(0, Ordering::SeqCst);
        self.blocks_found.store(0, Ordering::SeqCst);
        self.blocks_rejected.store(0, Ordering::SeqCst);
        self.build_failures.store(0, Ordering::SeqCst);
        *self.clock.lock().unwrap_or_else(|e| e.into_inner()) = SessionClock::now();
        self.is_mining.store(true, Ordering::SeqCst);
    }

    /// Freezes the session clock; counters keep their final values
    pub fn mark_stopped(&self) {
        self.is_mining.store(false, Ordering::SeqCst);
        let mut clock = self.clock.lock().unwrap_or_else(|e| e.into_inner());
        if clock.stopped.is_none() {
            clock.stopped = Some(Instant::now());
        }
    }

    pub fn add_hashes(&self, count: u64) {
        if count > 0 {
            self.hashes_computed.fetch_add(count, Ordering::Relaxed);
        }
    }

    pub fn record_block(&self) {
        self.blocks_found.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejection(&self) {
        self.blocks_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_build_failure(&self) {
        self.build_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn is_mining(&self) -> bool {
        self.is_mining.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> MiningStatsSnapshot {
        let clock = *self.clock.lock().unwrap_or_else(|e| e.into_inner());
        let elapsed = clock.elapsed();
        let hashes_computed = self.hashes_computed.load(Ordering::Relaxed);

        MiningStatsSnapshot {
            hashes_computed,
            blocks_found: self.blocks_found.load(Ordering::Relaxed),
            blocks_rejected: self.blocks_rejected.load(Ordering::Relaxed),
            build_failures: self.build_failures.load(Ordering::Relaxed),
            hash_rate: ProofOfWork::calculate_hash_rate(hashes_computed, elapsed.as_secs()),
            start_time: clock.started_unix,
            elapsed,
            is_mining: self.is_mining(),
        }
    }
}

/// Point-in-time view of [`MiningStatsRegistry`]
#[derive(Clone, Debug, Serialize)]
pub struct MiningStatsSnapshot {
    pub hashes_computed: u64,
    pub blocks_found: u64,
    pub blocks_rejected: u64,
    pub build_failures: u64,
    /// Hashes per second over the whole session
    pub hash_rate: f64,
    /// Session start, seconds since the unix epoch
    pub start_time: u64,
    pub elapsed: Duration,
    pub is_mining: bool,
}

impl MiningStatsSnapshot {
    /// Formats session stats as a readable string
    pub fn format_summary(&self) -> String {
        format!(
            "Mining Session Stats:\n  Status: {}\n  Hashes Computed: {}\n  Blocks Found: {}\n  \
             Blocks Rejected: {}\n  Hash Rate: {}\n  Runtime: {}s",
            if self.is_mining { "MINING" } else { "STOPPED" },
            self.hashes_computed,
            self.blocks_found,
            self.blocks_rejected,
            crate::utils::format_hash_rate(self.hash_rate),
            self.elapsed.as_secs()
        )
    }
}
