//! Mining worker thread implementation
//!
//! Each [`NonceSearchWorker`] runs on its own thread and cycles through
//! `Idle -> Building -> Searching -> {Found, Exhausted, Cancelled} -> Idle`
//! until the session's cancellation flag is raised. Workers own their block
//! templates outright; the only shared state they touch is the stats
//! registry, the cancellation flag and the event channel.

use crate::block::{BlockTemplate, NONCE_OFFSET};
use crate::chain::{ChainState, MempoolView};
use crate::config::{MiningConfig, MAX_RETRY_BACKOFF_MS};
use crate::errors::MiningResult;
use crate::pow::{PowHasher, Target};
use crate::stats::MiningStatsRegistry;
use crate::submission::{RejectReason, SubmissionGateway, SubmitOutcome};
use crate::template::BlockTemplateBuilder;
use crypto_hashes::Hash;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::SyncSender;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Longest uninterrupted sleep while backing off, bounds shutdown latency
const BACKOFF_SLICE: Duration = Duration::from_millis(50);

/// Floor for the backoff base so a failing worker never spins
const MIN_RETRY_BACKOFF_MS: u64 = 1;

/// Where a worker is in its mining cycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Building,
    Searching,
    Found,
    Exhausted,
    Cancelled,
}

/// Non-fatal notifications emitted by workers
#[derive(Clone, Debug)]
pub enum MiningEvent {
    TemplateBuilt {
        worker_id: usize,
        height: u64,
        timestamp: u32,
        transactions: usize,
    },
    BuildFailed {
        worker_id: usize,
        error: String,
    },
    RangeExhausted {
        worker_id: usize,
        last_nonce: u32,
    },
    StaleTemplate {
        worker_id: usize,
        height: u64,
    },
    BlockFound {
        worker_id: usize,
        hash: Hash,
        height: u64,
        nonce: u32,
    },
    BlockRejected {
        worker_id: usize,
        hash: Hash,
        reason: RejectReason,
    },
}

/// Inclusive slice of the 32-bit nonce space assigned to one worker
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NonceRange {
    pub first: u32,
    pub last: u32,
}

impl NonceRange {
    pub fn new(first: u32, last: u32) -> Self {
        debug_assert!(first <= last);
        Self { first, last }
    }

    pub fn full() -> Self {
        Self::new(0, u32::MAX)
    }

    /// Number of nonces in the range
    pub fn len(&self) -> u64 {
        self.last as u64 - self.first as u64 + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Splits the whole nonce space into `parts` disjoint, contiguous ranges
    pub fn partition(parts: usize) -> Vec<NonceRange> {
        let space = 1u64 << 32;
        let parts = (parts.max(1) as u64).min(space);
        let chunk = space / parts;
        let remainder = space % parts;

        let mut ranges = Vec::with_capacity(parts as usize);
        let mut start = 0u64;
        for i in 0..parts {
            let len = chunk + u64::from(i < remainder);
            let end = start + len - 1;
            ranges.push(NonceRange::new(start as u32, end as u32));
            start = end + 1;
        }
        ranges
    }
}

/// How a nonce search ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchOutcome {
    Found(u32),
    /// The range ended or the nonce counter would wrap
    Exhausted,
    /// The chain tip moved; the template no longer extends it
    Stale,
    Cancelled,
}

/// Shared handles every worker of a session receives
#[derive(Clone)]
pub struct WorkerContext {
    pub builder: Arc<BlockTemplateBuilder>,
    pub chain: Arc<dyn ChainState>,
    pub mempool: Arc<dyn MempoolView>,
    pub gateway: Arc<dyn SubmissionGateway>,
    pub hasher: Arc<dyn PowHasher>,
    pub stats: Arc<MiningStatsRegistry>,
    pub config: Arc<MiningConfig>,
    pub cancel: Arc<AtomicBool>,
    pub events: Option<SyncSender<MiningEvent>>,
}

/// A mining worker that builds templates and searches its nonce range
pub struct NonceSearchWorker {
    id: usize,
    ctx: WorkerContext,
    range: NonceRange,
    state: WorkerState,
    extra_nonce: u64,
    consecutive_failures: u32,
}

impl NonceSearchWorker {
    pub fn new(id: usize, ctx: WorkerContext, range: NonceRange) -> Self {
        Self {
            id,
            ctx,
            range,
            state: WorkerState::Idle,
            extra_nonce: 0,
            consecutive_failures: 0,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn range(&self) -> NonceRange {
        self.range
    }

    fn cancelled(&self) -> bool {
        self.ctx.cancel.load(Ordering::Relaxed)
    }

    /// Runs the mining loop (blocking, should be run in a thread)
    pub fn run(&mut self) {
        log::info!(
            "Worker {} started on nonces {:#010x}..={:#010x}",
            self.id,
            self.range.first,
            self.range.last
        );

        while !self.cancelled() {
            // A panicking collaborator must not take the thread down.
            let attempt = panic::catch_unwind(AssertUnwindSafe(|| self.mine_once()));
            if let Err(payload) = attempt {
                let message = panic_message(payload.as_ref());
                log::error!("Worker {} attempt panicked: {}", self.id, message);
                self.state = WorkerState::Idle;
                self.on_attempt_failure(message);
            }
        }

        self.state = WorkerState::Cancelled;
        log::info!("Worker {} stopped", self.id);
    }

    /// Performs one build-and-search cycle, returning the state it ended in.
    pub fn mine_once(&mut self) -> WorkerState {
        if self.cancelled() {
            self.state = WorkerState::Cancelled;
            return self.state;
        }

        self.state = WorkerState::Building;
        let (template, target) = match self.prepare() {
            Ok(prepared) => prepared,
            Err(e) => {
                self.state = WorkerState::Idle;
                if !e.is_transient() {
                    log::error!("Worker {} hit a non-transient build error: {}", self.id, e);
                }
                self.on_attempt_failure(e.to_string());
                return WorkerState::Idle;
            }
        };
        self.consecutive_failures = 0;

        self.state = WorkerState::Searching;
        let reached = match self.search(&template, &target) {
            SearchOutcome::Found(nonce) => {
                self.state = WorkerState::Found;
                self.submit(template, nonce);
                WorkerState::Found
            }
            SearchOutcome::Exhausted => {
                log::debug!("Worker {} exhausted its nonce range, rebuilding", self.id);
                self.emit(MiningEvent::RangeExhausted {
                    worker_id: self.id,
                    last_nonce: self.range.last,
                });
                WorkerState::Exhausted
            }
            SearchOutcome::Stale => {
                log::debug!("Worker {} template went stale, rebuilding", self.id);
                self.emit(MiningEvent::StaleTemplate {
                    worker_id: self.id,
                    height: template.height(),
                });
                WorkerState::Exhausted
            }
            SearchOutcome::Cancelled => WorkerState::Cancelled,
        };

        self.state = if reached == WorkerState::Cancelled {
            WorkerState::Cancelled
        } else {
            WorkerState::Idle
        };
        reached
    }

    /// Builds a fresh template and derives its target
    fn prepare(&mut self) -> MiningResult<(BlockTemplate, Target)> {
        let tip = self.ctx.chain.tip();
        self.extra_nonce = self.extra_nonce.wrapping_add(1);

        let template = self.ctx.builder.build(
            tip.as_ref(),
            &self.ctx.config,
            self.ctx.mempool.as_ref(),
            self.extra_nonce,
        )?;
        let target = Target::derive(template.bits(), self.ctx.builder.params().pow_limit)?;

        self.emit(MiningEvent::TemplateBuilt {
            worker_id: self.id,
            height: template.height(),
            timestamp: template.header().timestamp,
            transactions: template.transactions().len(),
        });
        Ok((template, target))
    }

    /// Searches this worker's nonce range on `template`.
    ///
    /// Hashes are flushed to the registry every `batch_size` attempts and
    /// when the search ends; the chain tip is re-checked at the same points.
    pub fn search(&self, template: &BlockTemplate, target: &Target) -> SearchOutcome {
        let hasher = self.ctx.hasher.as_ref();
        let batch_size = self.ctx.config.batch_size.max(1);
        let mut header = template.header().serialize();
        let mut nonce = self.range.first;
        let mut unflushed = 0u64;

        let outcome = loop {
            if self.cancelled() {
                break SearchOutcome::Cancelled;
            }

            header[NONCE_OFFSET..].copy_from_slice(&nonce.to_le_bytes());
            let hash = hasher.hash_header(&header);
            unflushed += 1;

            if target.is_met_by(&hash) {
                break SearchOutcome::Found(nonce);
            }

            if unflushed == batch_size {
                self.ctx.stats.add_hashes(unflushed);
                unflushed = 0;
                if self.tip_moved(template) {
                    break SearchOutcome::Stale;
                }
            }

            if nonce == self.range.last {
                break SearchOutcome::Exhausted;
            }
            nonce = match nonce.checked_add(1) {
                Some(next) => next,
                None => break SearchOutcome::Exhausted,
            };
        };

        self.ctx.stats.add_hashes(unflushed);
        outcome
    }

    fn tip_moved(&self, template: &BlockTemplate) -> bool {
        matches!(self.ctx.chain.tip(), Some(tip) if tip.hash != template.header().prev_block_hash)
    }

    fn submit(&mut self, template: BlockTemplate, nonce: u32) {
        let block = template.into_block(nonce);
        let hash = block.hash();
        self.ctx.stats.record_block();

        log::info!(
            "Worker {} found block {} at height {} with nonce {}",
            self.id,
            hash,
            block.height,
            nonce
        );

        match self.ctx.gateway.submit(&block) {
            SubmitOutcome::Accepted => {
                self.emit(MiningEvent::BlockFound {
                    worker_id: self.id,
                    hash,
                    height: block.height,
                    nonce,
                });
            }
            SubmitOutcome::Rejected(reason) => {
                log::warn!("Worker {} block {} rejected: {}", self.id, hash, reason);
                self.ctx.stats.record_rejection();
                self.emit(MiningEvent::BlockRejected {
                    worker_id: self.id,
                    hash,
                    reason,
                });
            }
        }
    }

    fn on_attempt_failure(&mut self, error: String) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        let delay = self.backoff_delay();
        log::warn!(
            "Worker {} failed to prepare work ({}), retrying in {}ms",
            self.id,
            error,
            delay.as_millis()
        );
        self.ctx.stats.record_build_failure();
        self.emit(MiningEvent::BuildFailed {
            worker_id: self.id,
            error,
        });
        self.sleep_unless_cancelled(delay);
    }

    /// Exponential backoff from the configured base, capped
    fn backoff_delay(&self) -> Duration {
        let exponent = self.consecutive_failures.saturating_sub(1).min(16);
        let millis = self
            .ctx
            .config
            .retry_backoff_ms
            .max(MIN_RETRY_BACKOFF_MS)
            .saturating_mul(1u64 << exponent)
            .min(MAX_RETRY_BACKOFF_MS);
        Duration::from_millis(millis)
    }

    fn sleep_unless_cancelled(&self, delay: Duration) {
        let deadline = Instant::now() + delay;
        while !self.cancelled() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep((deadline - now).min(BACKOFF_SLICE));
        }
    }

    fn emit(&self, event: MiningEvent) {
        if let Some(events) = &self.ctx.events {
            // Events are monitoring data; drop them when nobody keeps up.
            let _ = events.try_send(event);
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{Block, HEADER_SIZE};
    use crate::chain::{ChainParams, ChainTip, EmptyMempool};
    use crate::pow::DoubleSha256;
    use std::sync::atomic::AtomicU64;
    use std::sync::mpsc::{self, Receiver};
    use std::sync::Mutex;

    /// Every header hashes to zero, so any target is met
    struct ZeroHasher;

    impl PowHasher for ZeroHasher {
        fn name(&self) -> &'static str {
            "zero"
        }

        fn hash_header(&self, _header: &[u8; HEADER_SIZE]) -> Hash {
            Hash::zeroed()
        }
    }

    struct FixedChain(Option<ChainTip>);

    impl ChainState for FixedChain {
        fn tip(&self) -> Option<ChainTip> {
            self.0
        }
    }

    /// Returns `first` for the first call and `then` afterwards
    struct MovingChain {
        calls: AtomicU64,
        first: ChainTip,
        then: ChainTip,
    }

    impl ChainState for MovingChain {
        fn tip(&self) -> Option<ChainTip> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Some(self.first)
            } else {
                Some(self.then)
            }
        }
    }

    struct RecordingGateway {
        blocks: Mutex<Vec<Block>>,
        reject: bool,
    }

    impl RecordingGateway {
        fn new(reject: bool) -> Self {
            Self {
                blocks: Mutex::new(Vec::new()),
                reject,
            }
        }
    }

    impl SubmissionGateway for RecordingGateway {
        fn submit(&self, block: &Block) -> SubmitOutcome {
            self.blocks.lock().unwrap().push(block.clone());
            if self.reject {
                SubmitOutcome::Rejected(RejectReason::StaleTip)
            } else {
                SubmitOutcome::Accepted
            }
        }
    }

    fn tip(bits: u32) -> ChainTip {
        ChainTip {
            hash: Hash::from([5u8; 32]),
            height: 0,
            bits,
            median_time_past: 0,
        }
    }

    fn context(
        chain: Arc<dyn ChainState>,
        gateway: Arc<dyn SubmissionGateway>,
        hasher: Arc<dyn PowHasher>,
        batch_size: u64,
    ) -> (WorkerContext, Receiver<MiningEvent>) {
        let (tx, rx) = mpsc::sync_channel(1024);
        let mut config = MiningConfig::new(1, vec![0x51]);
        config.batch_size = batch_size;
        config.retry_backoff_ms = 1;
        let ctx = WorkerContext {
            builder: Arc::new(BlockTemplateBuilder::new(ChainParams::regtest())),
            chain,
            mempool: Arc::new(EmptyMempool),
            gateway,
            hasher,
            stats: Arc::new(MiningStatsRegistry::new()),
            config: Arc::new(config),
            cancel: Arc::new(AtomicBool::new(false)),
            events: Some(tx),
        };
        (ctx, rx)
    }

    #[test]
    fn test_partition_covers_nonce_space() {
        for parts in [1usize, 3, 4, 7] {
            let ranges = NonceRange::partition(parts);
            assert_eq!(ranges.len(), parts);
            assert_eq!(ranges[0].first, 0);
            assert_eq!(ranges[parts - 1].last, u32::MAX);
            for pair in ranges.windows(2) {
                assert_eq!(pair[0].last as u64 + 1, pair[1].first as u64);
            }
            let total: u64 = ranges.iter().map(NonceRange::len).sum();
            assert_eq!(total, 1u64 << 32);
        }
    }

    #[test]
    fn test_trivial_target_finds_first_nonce() {
        let gateway = Arc::new(RecordingGateway::new(false));
        let (ctx, rx) = context(
            Arc::new(FixedChain(Some(tip(0x207fffff)))),
            gateway.clone(),
            Arc::new(ZeroHasher),
            100,
        );
        let stats = ctx.stats.clone();
        let mut worker = NonceSearchWorker::new(0, ctx, NonceRange::new(1234, 5000));

        assert_eq!(worker.mine_once(), WorkerState::Found);
        assert_eq!(worker.state(), WorkerState::Idle);

        let blocks = gateway.blocks.lock().unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].header.nonce, 1234);
        assert_eq!(blocks[0].height, 1);
        assert_eq!(stats.snapshot().blocks_found, 1);
        assert_eq!(stats.snapshot().hashes_computed, 1);

        let events: Vec<MiningEvent> = rx.try_iter().collect();
        assert!(matches!(events[0], MiningEvent::TemplateBuilt { height: 1, .. }));
        assert!(matches!(events[1], MiningEvent::BlockFound { nonce: 1234, .. }));
    }

    #[test]
    fn test_found_block_satisfies_real_target() {
        let gateway = Arc::new(RecordingGateway::new(false));
        let (ctx, _rx) = context(
            Arc::new(FixedChain(Some(tip(0x207fffff)))),
            gateway.clone(),
            Arc::new(DoubleSha256),
            100,
        );
        let mut worker = NonceSearchWorker::new(0, ctx, NonceRange::full());

        // Roughly one in two hashes meets the regtest target
        assert_eq!(worker.mine_once(), WorkerState::Found);
        let blocks = gateway.blocks.lock().unwrap();
        let target = Target::derive(0x207fffff, ChainParams::regtest().pow_limit).unwrap();
        assert!(target.is_met_by(&blocks[0].hash()));
    }

    #[test]
    fn test_exhausts_range_at_nonce_wraparound() {
        let (ctx, rx) = context(
            Arc::new(FixedChain(Some(tip(0x03000001)))),
            Arc::new(RecordingGateway::new(false)),
            Arc::new(DoubleSha256),
            64,
        );
        let stats = ctx.stats.clone();
        let mut worker = NonceSearchWorker::new(0, ctx, NonceRange::new(0xFFFF_FF00, u32::MAX));

        assert_eq!(worker.mine_once(), WorkerState::Exhausted);
        assert_eq!(stats.snapshot().hashes_computed, 256);
        let events: Vec<MiningEvent> = rx.try_iter().collect();
        assert!(matches!(
            events.last(),
            Some(MiningEvent::RangeExhausted { last_nonce: u32::MAX, .. })
        ));
    }

    #[test]
    fn test_wraparound_triggers_template_rebuild() {
        let (ctx, rx) = context(
            Arc::new(FixedChain(Some(tip(0x03000001)))),
            Arc::new(RecordingGateway::new(false)),
            Arc::new(DoubleSha256),
            1_000,
        );
        let cancel = ctx.cancel.clone();
        let handle = thread::spawn(move || {
            let mut worker = NonceSearchWorker::new(0, ctx, NonceRange::new(0xFFFF_FFF0, u32::MAX));
            worker.run();
            worker.state()
        });

        let mut builds = 0;
        let mut exhausted = false;
        let deadline = Instant::now() + Duration::from_secs(10);
        while builds < 2 && Instant::now() < deadline {
            match rx.recv_timeout(Duration::from_millis(100)) {
                Ok(MiningEvent::TemplateBuilt { .. }) => builds += 1,
                Ok(MiningEvent::RangeExhausted { .. }) => exhausted = true,
                _ => {}
            }
        }
        cancel.store(true, Ordering::SeqCst);

        assert_eq!(handle.join().unwrap(), WorkerState::Cancelled);
        assert!(exhausted);
        assert!(builds >= 2);
    }

    #[test]
    fn test_cancelled_search_stops_immediately() {
        let (ctx, _rx) = context(
            Arc::new(FixedChain(Some(tip(0x03000001)))),
            Arc::new(RecordingGateway::new(false)),
            Arc::new(DoubleSha256),
            1_000,
        );
        let builder = ctx.builder.clone();
        let config = ctx.config.clone();
        let cancel = ctx.cancel.clone();
        let stats = ctx.stats.clone();
        let worker = NonceSearchWorker::new(0, ctx, NonceRange::full());

        let template = builder.build(Some(&tip(0x03000001)), &config, &EmptyMempool, 1).unwrap();
        let target = Target::derive(0x03000001, U256_MAX).unwrap();
        cancel.store(true, Ordering::SeqCst);
        assert_eq!(worker.search(&template, &target), SearchOutcome::Cancelled);
        assert_eq!(stats.snapshot().hashes_computed, 0);
    }

    const U256_MAX: primitive_types::U256 = primitive_types::U256::MAX;

    #[test]
    fn test_missing_tip_backs_off_and_retries() {
        let (ctx, rx) = context(
            Arc::new(FixedChain(None)),
            Arc::new(RecordingGateway::new(false)),
            Arc::new(DoubleSha256),
            1_000,
        );
        let stats = ctx.stats.clone();
        let mut worker = NonceSearchWorker::new(3, ctx, NonceRange::full());

        assert_eq!(worker.mine_once(), WorkerState::Idle);
        assert_eq!(worker.mine_once(), WorkerState::Idle);
        assert_eq!(stats.snapshot().build_failures, 2);
        assert_eq!(worker.backoff_delay(), Duration::from_millis(2));

        let events: Vec<MiningEvent> = rx.try_iter().collect();
        assert!(matches!(events[0], MiningEvent::BuildFailed { worker_id: 3, .. }));
    }

    #[test]
    fn test_malformed_bits_are_absorbed() {
        let (ctx, rx) = context(
            Arc::new(FixedChain(Some(tip(0x04923456)))),
            Arc::new(RecordingGateway::new(false)),
            Arc::new(DoubleSha256),
            1_000,
        );
        let mut worker = NonceSearchWorker::new(0, ctx, NonceRange::full());
        assert_eq!(worker.mine_once(), WorkerState::Idle);

        let failure = rx.try_iter().find_map(|event| match event {
            MiningEvent::BuildFailed { error, .. } => Some(error),
            _ => None,
        });
        assert!(failure.unwrap().contains("Malformed difficulty"));
    }

    #[test]
    fn test_tip_change_ends_search() {
        let mut moved = tip(0x03000001);
        moved.hash = Hash::from([6u8; 32]);
        moved.height = 1;
        let chain = MovingChain {
            calls: AtomicU64::new(0),
            first: tip(0x03000001),
            then: moved,
        };
        let (ctx, rx) = context(
            Arc::new(chain),
            Arc::new(RecordingGateway::new(false)),
            Arc::new(DoubleSha256),
            10,
        );
        let stats = ctx.stats.clone();
        let mut worker = NonceSearchWorker::new(0, ctx, NonceRange::full());

        assert_eq!(worker.mine_once(), WorkerState::Exhausted);
        assert_eq!(stats.snapshot().hashes_computed, 10);
        assert!(rx
            .try_iter()
            .any(|event| matches!(event, MiningEvent::StaleTemplate { height: 1, .. })));
    }

    #[test]
    fn test_rejected_block_is_non_fatal() {
        let gateway = Arc::new(RecordingGateway::new(true));
        let (ctx, rx) = context(
            Arc::new(FixedChain(Some(tip(0x207fffff)))),
            gateway.clone(),
            Arc::new(ZeroHasher),
            100,
        );
        let stats = ctx.stats.clone();
        let mut worker = NonceSearchWorker::new(0, ctx, NonceRange::full());

        assert_eq!(worker.mine_once(), WorkerState::Found);
        assert_eq!(worker.mine_once(), WorkerState::Found);
        assert_eq!(gateway.blocks.lock().unwrap().len(), 2);

        let snap = stats.snapshot();
        assert_eq!(snap.blocks_found, 2);
        assert_eq!(snap.blocks_rejected, 2);
        assert!(rx.try_iter().any(|event| matches!(
            event,
            MiningEvent::BlockRejected {
                reason: RejectReason::StaleTip,
                ..
            }
        )));
    }

    #[test]
    fn test_zero_backoff_still_pauses_between_retries() {
        let (mut ctx, _rx) = context(
            Arc::new(FixedChain(None)),
            Arc::new(RecordingGateway::new(false)),
            Arc::new(DoubleSha256),
            1_000,
        );
        let mut config = MiningConfig::new(1, vec![0x51]);
        config.retry_backoff_ms = 0;
        ctx.config = Arc::new(config);
        let stats = ctx.stats.clone();
        let cancel = ctx.cancel.clone();

        let handle = thread::spawn(move || NonceSearchWorker::new(0, ctx, NonceRange::full()).run());
        thread::sleep(Duration::from_millis(200));
        cancel.store(true, Ordering::SeqCst);
        handle.join().unwrap();

        // Doubling from a 1ms floor allows only a handful of attempts
        let failures = stats.snapshot().build_failures;
        assert!(failures >= 1);
        assert!(failures < 20, "worker spun through {} failed builds", failures);
    }

    #[test]
    fn test_backoff_is_capped() {
        let (ctx, _rx) = context(
            Arc::new(FixedChain(None)),
            Arc::new(RecordingGateway::new(false)),
            Arc::new(DoubleSha256),
            1_000,
        );
        let mut worker = NonceSearchWorker::new(0, ctx, NonceRange::full());
        worker.consecutive_failures = 40;
        assert!(worker.backoff_delay() <= Duration::from_millis(MAX_RETRY_BACKOFF_MS));
    }
}
