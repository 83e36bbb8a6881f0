//! Mining controller that owns the worker pool
//!
//! This module manages the lifecycle of a mining session: it validates the
//! configuration, partitions the nonce space, spawns one thread per worker,
//! and joins them again on stop. Collaborators are injected as trait objects
//! so the same controller mines against a node or the in-memory devnet.

use crate::chain::{ChainParams, ChainState, MempoolView};
use crate::config::MiningConfig;
use crate::errors::{MiningError, MiningResult};
use crate::pow::{PowHasher, Target};
use crate::stats::{MiningStatsRegistry, MiningStatsSnapshot};
use crate::submission::SubmissionGateway;
use crate::template::BlockTemplateBuilder;
use crate::utils;
use crate::worker::{MiningEvent, NonceRange, NonceSearchWorker, WorkerContext};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Events buffered between drains before new ones are dropped
pub const EVENT_CHANNEL_CAPACITY: usize = 1_024;

/// Entry point of a worker thread
pub(crate) type WorkerBody = Box<dyn FnOnce() + Send + 'static>;

/// A running session: its workers and their shared cancellation flag
struct MiningSession {
    cancel: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
}

/// Starts, stops and reports on mining sessions
pub struct MiningController {
    builder: Arc<BlockTemplateBuilder>,
    chain: Arc<dyn ChainState>,
    mempool: Arc<dyn MempoolView>,
    gateway: Arc<dyn SubmissionGateway>,
    hasher: Arc<dyn PowHasher>,
    stats: Arc<MiningStatsRegistry>,
    session: Mutex<Option<MiningSession>>,
    /// Kept across stop so late events can still be drained
    events: Mutex<Option<Receiver<MiningEvent>>>,
}

impl MiningController {
    pub fn new(
        params: ChainParams,
        chain: Arc<dyn ChainState>,
        mempool: Arc<dyn MempoolView>,
        gateway: Arc<dyn SubmissionGateway>,
        hasher: Arc<dyn PowHasher>,
    ) -> Self {
        Self {
            builder: Arc::new(BlockTemplateBuilder::new(params)),
            chain,
            mempool,
            gateway,
            hasher,
            stats: Arc::new(MiningStatsRegistry::new()),
            session: Mutex::new(None),
            events: Mutex::new(None),
        }
    }

    pub fn params(&self) -> &ChainParams {
        self.builder.params()
    }

    /// Starts a mining session with `config.threads` workers.
    ///
    /// Fails without side effects when a session is already running, the
    /// configuration is invalid, or a worker thread cannot be spawned.
    pub fn start(&self, config: MiningConfig) -> MiningResult<()> {
        self.start_with(config, |name, body| thread::Builder::new().name(name).spawn(body))
    }

    pub(crate) fn start_with<S>(&self, config: MiningConfig, mut spawn: S) -> MiningResult<()>
    where
        S: FnMut(String, WorkerBody) -> io::Result<JoinHandle<()>>,
    {
        let mut session = self.session.lock().unwrap_or_else(|e| e.into_inner());
        if session.is_some() {
            return Err(MiningError::AlreadyMining);
        }
        config.validate()?;

        if config.adaptive_difficulty || config.smart_fee_selection {
            log::info!(
                "adaptive_difficulty={} smart_fee_selection={} (no effect on template selection)",
                config.adaptive_difficulty,
                config.smart_fee_selection
            );
        }

        let config = Arc::new(config);
        let cancel = Arc::new(AtomicBool::new(false));
        let (event_tx, event_rx) = mpsc::sync_channel(EVENT_CHANNEL_CAPACITY);

        let ranges = NonceRange::partition(config.threads);
        let mut workers = Vec::with_capacity(ranges.len());
        let mut gates = Vec::with_capacity(ranges.len());
        for (worker_id, range) in ranges.into_iter().enumerate() {
            let ctx = WorkerContext {
                builder: Arc::clone(&self.builder),
                chain: Arc::clone(&self.chain),
                mempool: Arc::clone(&self.mempool),
                gateway: Arc::clone(&self.gateway),
                hasher: Arc::clone(&self.hasher),
                stats: Arc::clone(&self.stats),
                config: Arc::clone(&config),
                cancel: Arc::clone(&cancel),
                events: Some(event_tx.clone()),
            };

            // Workers idle until every thread is up; a closed gate means abort.
            let (gate_tx, gate_rx) = mpsc::channel::<()>();
            let body: WorkerBody = Box::new(move || {
                if gate_rx.recv().is_err() {
                    return;
                }
                let mut worker = NonceSearchWorker::new(worker_id, ctx, range);
                worker.run();
            });

            match spawn(format!("miner-{}", worker_id), body) {
                Ok(handle) => {
                    workers.push(handle);
                    gates.push(gate_tx);
                }
                Err(e) => {
                    log::error!("Failed to spawn worker {}: {}", worker_id, e);
                    cancel.store(true, Ordering::SeqCst);
                    drop(gates);
                    join_workers(workers);
                    return Err(MiningError::Spawn(e));
                }
            }
        }

        self.stats.reset_session();
        for gate in gates {
            let _ = gate.send(());
        }

        log::info!(
            "Mining started on {} with {} workers ({})",
            self.builder.params().name,
            workers.len(),
            self.hasher.name()
        );

        *self.events.lock().unwrap_or_else(|e| e.into_inner()) = Some(event_rx);
        *session = Some(MiningSession { cancel, workers });
        Ok(())
    }

    /// Stops the session and waits for workers to finish. No-op when idle.
    pub fn stop(&self) {
        let mut session = self.session.lock().unwrap_or_else(|e| e.into_inner());
        let Some(active) = session.take() else {
            return;
        };

        log::info!("Stopping mining session");
        active.cancel.store(true, Ordering::SeqCst);
        join_workers(active.workers);
        self.stats.mark_stopped();

        log::info!("Mining stopped: {}", self.stats.snapshot().format_summary());
    }

    pub fn stats(&self) -> MiningStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn is_mining(&self) -> bool {
        self.stats.is_mining()
    }

    /// Number of workers in the running session, 0 when idle
    pub fn worker_count(&self) -> usize {
        self.session
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map_or(0, |session| session.workers.len())
    }

    /// Collects pending worker events (non-blocking)
    pub fn drain_events(&self) -> Vec<MiningEvent> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|rx| rx.try_iter().collect())
            .unwrap_or_default()
    }

    /// Expected time to the next block at the session's current hash rate
    pub fn estimated_time_to_block(&self) -> Option<Duration> {
        let tip = self.chain.tip()?;
        let target = Target::derive(tip.bits, self.builder.params().pow_limit).ok()?;
        utils::estimated_time_to_block(self.stats.snapshot().hash_rate, &target)
    }
}

impl Drop for MiningController {
    fn drop(&mut self) {
        self.stop();
    }
}

fn join_workers(workers: Vec<JoinHandle<()>>) {
    for handle in workers {
        let name = handle.thread().name().unwrap_or("miner").to_string();
        match handle.join() {
            Ok(()) => log::debug!("Worker thread {} stopped", name),
            Err(e) => log::error!("Worker thread {} panicked: {:?}", name, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::EmptyMempool;
    use crate::devnet::DevnetChain;
    use crate::pow::DoubleSha256;
    use crate::submission::LoggingGateway;

    fn controller(bits: u32) -> MiningController {
        let chain = Arc::new(DevnetChain::with_bits(ChainParams::regtest(), bits));
        MiningController::new(
            ChainParams::regtest(),
            chain,
            Arc::new(EmptyMempool),
            Arc::new(LoggingGateway),
            Arc::new(DoubleSha256),
        )
    }

    #[test]
    fn test_new_controller_is_idle() {
        let controller = controller(0x207fffff);
        assert!(!controller.is_mining());
        assert_eq!(controller.worker_count(), 0);
        assert!(controller.drain_events().is_empty());
        assert_eq!(controller.estimated_time_to_block(), None);
    }

    #[test]
    fn test_start_and_stop() {
        let controller = controller(0x03000001);
        controller.start(MiningConfig::new(2, vec![0x51])).unwrap();
        assert!(controller.is_mining());
        assert_eq!(controller.worker_count(), 2);

        controller.stop();
        assert!(!controller.is_mining());
        assert_eq!(controller.worker_count(), 0);
    }

    #[test]
    fn test_invalid_config_spawns_nothing() {
        let controller = controller(0x03000001);
        let err = controller.start(MiningConfig::new(0, vec![0x51])).unwrap_err();
        assert!(matches!(err, MiningError::InvalidConfig(_)));
        assert!(!controller.is_mining());
        assert_eq!(controller.worker_count(), 0);
    }

    #[test]
    fn test_session_can_restart() {
        let controller = controller(0x03000001);
        controller.start(MiningConfig::new(1, vec![0x51])).unwrap();
        controller.stop();
        controller.start(MiningConfig::new(3, vec![0x51])).unwrap();
        assert_eq!(controller.worker_count(), 3);
        controller.stop();
    }

    #[test]
    fn test_spawn_failure_keeps_previous_stats() {
        let controller = controller(0x03000001);
        controller.start(MiningConfig::new(1, vec![0x51])).unwrap();
        thread::sleep(Duration::from_millis(100));
        controller.stop();
        let before = controller.stats();
        assert!(before.hashes_computed > 0);

        let mut spawned = 0;
        let err = controller
            .start_with(MiningConfig::new(3, vec![0x51]), |name, body| {
                spawned += 1;
                if spawned == 2 {
                    return Err(io::Error::new(io::ErrorKind::Other, "out of threads"));
                }
                thread::Builder::new().name(name).spawn(body)
            })
            .unwrap_err();
        assert!(matches!(err, MiningError::Spawn(_)));

        let after = controller.stats();
        assert!(!controller.is_mining());
        assert_eq!(controller.worker_count(), 0);
        assert_eq!(after.hashes_computed, before.hashes_computed);
        assert_eq!(after.start_time, before.start_time);
        assert_eq!(after.elapsed, before.elapsed);

        // The controller is still usable afterwards
        controller.start(MiningConfig::new(1, vec![0x51])).unwrap();
        assert_eq!(controller.worker_count(), 1);
        controller.stop();
    }

    #[test]
    fn test_drop_stops_workers() {
        let controller = controller(0x03000001);
        controller.start(MiningConfig::new(2, vec![0x51])).unwrap();
        drop(controller);
    }
}
