//! The miner loop as an explicit state machine.
//!
//! ```text
//! Idle -> RequestingJob -> Searching -> Submitting -> Idle
//!              |               |             |
//!              |               +- timed out -+-> RequestingJob
//!              +-- unreachable ------------------> Halted
//! ```
//!
//! Everything runs on the caller's task: one job at a time, and the only
//! suspension points are the two transport calls.

use super::protocol::{MinedBlock, MiningJob};
use super::search::{search, SearchLimits, SearchOutcome, SearchStats};
use super::transport::MiningTransport;
use crate::config::MinerConfig;
use crate::crypto::{validate_address, validate_hash};
use crate::error::{ChainError, Result};
use crate::transaction::iso_now;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MinerState {
    Idle,
    RequestingJob,
    Searching(MiningJob),
    Submitting(MinedBlock),
    /// Terminal: the node could not be reached.
    Halted,
}

/// What a completed transition produced, if anything worth reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Accepted { block_hash: String, message: String },
    /// The node refused the block (lost race, stale or invalid proof).
    Rejected(ChainError),
    TimedOut(SearchStats),
    Unreachable(ChainError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MinerExit {
    /// Single-shot mode finished its one submission.
    Completed,
    Unreachable(ChainError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MinerStats {
    pub jobs_requested: u64,
    pub blocks_accepted: u64,
    pub blocks_rejected: u64,
    pub searches_timed_out: u64,
    pub total_attempts: u64,
    pub search_time: Duration,
}

impl MinerStats {
    pub fn hash_rate(&self) -> f64 {
        SearchStats {
            attempts: self.total_attempts,
            elapsed: self.search_time,
        }
        .hash_rate()
    }

    fn record_search(&mut self, stats: &SearchStats) {
        self.total_attempts += stats.attempts;
        self.search_time += stats.elapsed;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinerSettings {
    pub address: String,
    pub mine_once: bool,
    pub limits: SearchLimits,
}

impl MinerSettings {
    pub fn from_config(config: &MinerConfig) -> Self {
        MinerSettings {
            address: config.address.clone(),
            mine_once: config.mine_once,
            limits: SearchLimits::with_budget(config.search_budget()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinerReport {
    pub exit: MinerExit,
    pub stats: MinerStats,
}

pub struct Miner<T> {
    transport: T,
    settings: MinerSettings,
    state: MinerState,
    stats: MinerStats,
}

impl<T: MiningTransport> Miner<T> {
    /// Fails with `Format` before touching the network if the payout
    /// address is malformed.
    pub fn new(transport: T, settings: MinerSettings) -> Result<Self> {
        validate_address(&settings.address)?;
        Ok(Miner {
            transport,
            settings,
            state: MinerState::Idle,
            stats: MinerStats::default(),
        })
    }

    pub fn state(&self) -> &MinerState {
        &self.state
    }

    pub fn stats(&self) -> &MinerStats {
        &self.stats
    }

    /// Performs a single transition.
    pub async fn step(&mut self) -> Option<CycleOutcome> {
        let state = std::mem::replace(&mut self.state, MinerState::Halted);
        let (next, outcome) = match state {
            MinerState::Idle => (MinerState::RequestingJob, None),
            MinerState::RequestingJob => self.request_job().await,
            MinerState::Searching(job) => self.search_job(&job),
            MinerState::Submitting(mined) => self.submit(mined).await,
            MinerState::Halted => (MinerState::Halted, None),
        };
        self.state = next;
        outcome
    }

    async fn request_job(&mut self) -> (MinerState, Option<CycleOutcome>) {
        self.stats.jobs_requested += 1;
        let job = match self.transport.fetch_job(&self.settings.address).await {
            Ok(job) => job,
            Err(e) => return (MinerState::Halted, Some(CycleOutcome::Unreachable(e))),
        };
        // A node handing out garbage is no more usable than a silent one.
        if let Err(e) = validate_hash(&job.block_data_hash) {
            return (MinerState::Halted, Some(CycleOutcome::Unreachable(e)));
        }

        debug!(
            "Job {} for block {}: difficulty {}, {} transactions",
            job.block_data_hash, job.index, job.difficulty, job.transactions_included
        );
        (MinerState::Searching(job), None)
    }

    fn search_job(&mut self, job: &MiningJob) -> (MinerState, Option<CycleOutcome>) {
        match search(job, iso_now(), &self.settings.limits) {
            SearchOutcome::Found(mined, stats) => {
                self.stats.record_search(&stats);
                info!(
                    "Found nonce {} for block {} after {} attempts ({:.0} H/s): {}",
                    mined.nonce,
                    job.index,
                    stats.attempts,
                    stats.hash_rate(),
                    mined.block_hash
                );
                (MinerState::Submitting(mined), None)
            }
            SearchOutcome::TimedOut(stats) => {
                self.stats.record_search(&stats);
                self.stats.searches_timed_out += 1;
                (
                    MinerState::RequestingJob,
                    Some(CycleOutcome::TimedOut(stats)),
                )
            }
        }
    }

    async fn submit(&mut self, mined: MinedBlock) -> (MinerState, Option<CycleOutcome>) {
        match self.transport.submit(&mined).await {
            Ok(response) => {
                self.stats.blocks_accepted += 1;
                let outcome = CycleOutcome::Accepted {
                    block_hash: mined.block_hash,
                    message: response.message,
                };
                (MinerState::Idle, Some(outcome))
            }
            Err(e) if e.is_unreachable() => {
                (MinerState::Halted, Some(CycleOutcome::Unreachable(e)))
            }
            Err(e) => {
                self.stats.blocks_rejected += 1;
                (MinerState::Idle, Some(CycleOutcome::Rejected(e)))
            }
        }
    }

    /// Runs until the node becomes unreachable or, in single-shot mode,
    /// until the first submission has been answered.
    pub async fn run(&mut self) -> MinerReport {
        let started = Instant::now();
        info!("Mining for {}", self.settings.address);

        let exit = loop {
            let Some(outcome) = self.step().await else {
                continue;
            };
            match outcome {
                CycleOutcome::Accepted { block_hash, message } => {
                    info!("{} ({})", message, block_hash);
                    if self.settings.mine_once {
                        break MinerExit::Completed;
                    }
                }
                CycleOutcome::Rejected(e) => {
                    warn!("Block rejected, requesting a new job: {}", e);
                    if self.settings.mine_once {
                        break MinerExit::Completed;
                    }
                }
                CycleOutcome::TimedOut(stats) => {
                    warn!(
                        "No solution after {} attempts in {:.1}s, requesting a new job",
                        stats.attempts,
                        stats.elapsed.as_secs_f64()
                    );
                }
                CycleOutcome::Unreachable(e) => {
                    error!("Node unreachable, stopping: {}", e);
                    break MinerExit::Unreachable(e);
                }
            }
        };

        info!(
            "Miner stopped after {:.1}s: {} jobs, {} accepted, {} rejected, {} timed out, {:.0} H/s",
            started.elapsed().as_secs_f64(),
            self.stats.jobs_requested,
            self.stats.blocks_accepted,
            self.stats.blocks_rejected,
            self.stats.searches_timed_out,
            self.stats.hash_rate()
        );
        MinerReport {
            exit,
            stats: self.stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::miner::protocol::SubmitResponse;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    const MINER: &str = "9a9f082f37270ff54c5ca4204a0e4da6951fe917";

    /// Replays canned answers and records submissions.
    #[derive(Default)]
    struct ScriptedTransport {
        jobs: Mutex<VecDeque<Result<MiningJob>>>,
        answers: Mutex<VecDeque<Result<SubmitResponse>>>,
        submitted: Mutex<Vec<MinedBlock>>,
    }

    impl ScriptedTransport {
        fn new(jobs: Vec<Result<MiningJob>>, answers: Vec<Result<SubmitResponse>>) -> Self {
            ScriptedTransport {
                jobs: Mutex::new(jobs.into()),
                answers: Mutex::new(answers.into()),
                submitted: Mutex::new(Vec::new()),
            }
        }
    }

    impl MiningTransport for ScriptedTransport {
        async fn fetch_job(&self, _miner_address: &str) -> Result<MiningJob> {
            self.jobs
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ChainError::Transport("script exhausted".into())))
        }

        async fn submit(&self, mined: &MinedBlock) -> Result<SubmitResponse> {
            self.submitted.lock().unwrap().push(mined.clone());
            self.answers
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ChainError::Transport("script exhausted".into())))
        }
    }

    fn job(difficulty: u32) -> MiningJob {
        MiningJob {
            index: 1,
            transactions_included: 0,
            difficulty,
            block_data_hash: "ab".repeat(32),
        }
    }

    fn settings(mine_once: bool) -> MinerSettings {
        MinerSettings {
            address: MINER.to_string(),
            mine_once,
            limits: SearchLimits {
                time_budget: Duration::from_secs(30),
                max_attempts: Some(200_000),
            },
        }
    }

    fn accepted() -> Result<SubmitResponse> {
        Ok(SubmitResponse::accepted(1))
    }

    #[test]
    fn test_malformed_address_rejected_locally() {
        let mut bad = settings(true);
        bad.address = "not-an-address".to_string();
        let result = Miner::new(ScriptedTransport::default(), bad);
        assert!(matches!(result, Err(ChainError::Format(_))));
    }

    #[tokio::test]
    async fn test_states_follow_cycle() {
        let transport = ScriptedTransport::new(vec![Ok(job(1))], vec![accepted()]);
        let mut miner = Miner::new(transport, settings(true)).unwrap();

        assert_eq!(miner.state(), &MinerState::Idle);
        assert_eq!(miner.step().await, None);
        assert_eq!(miner.state(), &MinerState::RequestingJob);
        assert_eq!(miner.step().await, None);
        assert!(matches!(miner.state(), MinerState::Searching(_)));
        assert_eq!(miner.step().await, None);
        assert!(matches!(miner.state(), MinerState::Submitting(_)));

        let outcome = miner.step().await;
        assert!(matches!(outcome, Some(CycleOutcome::Accepted { .. })));
        assert_eq!(miner.state(), &MinerState::Idle);
        assert_eq!(miner.stats().blocks_accepted, 1);
    }

    #[tokio::test]
    async fn test_single_shot_submits_valid_proof() {
        let transport = ScriptedTransport::new(vec![Ok(job(2))], vec![accepted()]);
        let mut miner = Miner::new(transport, settings(true)).unwrap();

        let report = miner.run().await;
        assert_eq!(report.exit, MinerExit::Completed);
        assert_eq!(report.stats.jobs_requested, 1);

        let submitted = miner.transport.submitted.lock().unwrap();
        assert_eq!(submitted.len(), 1);
        let mined = &submitted[0];
        assert!(mined.block_hash.starts_with("00"));
        assert_eq!(
            mined.block_hash,
            crate::blockchain::calculate_block_hash(
                &mined.block_data_hash,
                mined.nonce,
                &mined.date_created
            )
        );
    }

    #[tokio::test]
    async fn test_fetch_failure_halts() {
        let timeout = ChainError::NetworkTimeout("node".into(), Duration::from_secs(60));
        let transport = ScriptedTransport::new(vec![Err(timeout.clone())], vec![]);
        let mut miner = Miner::new(transport, settings(false)).unwrap();

        let report = miner.run().await;
        assert_eq!(report.exit, MinerExit::Unreachable(timeout));
        assert_eq!(miner.state(), &MinerState::Halted);
        assert_eq!(miner.step().await, None);
    }

    #[tokio::test]
    async fn test_remote_error_on_fetch_is_fatal() {
        let remote = ChainError::Remote {
            status: 400,
            message: "bad address".into(),
        };
        let transport = ScriptedTransport::new(vec![Err(remote.clone())], vec![]);
        let mut miner = Miner::new(transport, settings(false)).unwrap();

        assert_eq!(miner.run().await.exit, MinerExit::Unreachable(remote));
    }

    #[tokio::test]
    async fn test_rejection_requests_new_job() {
        let race = ChainError::Remote {
            status: 409,
            message: "Lost block race".into(),
        };
        let transport = ScriptedTransport::new(
            vec![Ok(job(1)), Ok(job(1))],
            vec![Err(race), accepted()],
        );
        let mut miner = Miner::new(transport, settings(false)).unwrap();

        // Third fetch hits the end of the script and halts the loop.
        let report = miner.run().await;
        assert!(matches!(report.exit, MinerExit::Unreachable(_)));
        assert_eq!(report.stats.jobs_requested, 3);
        assert_eq!(report.stats.blocks_rejected, 1);
        assert_eq!(report.stats.blocks_accepted, 1);
    }

    #[tokio::test]
    async fn test_submit_timeout_halts() {
        let timeout = ChainError::NetworkTimeout("node".into(), Duration::from_secs(60));
        let transport = ScriptedTransport::new(vec![Ok(job(1))], vec![Err(timeout.clone())]);
        let mut miner = Miner::new(transport, settings(false)).unwrap();

        assert_eq!(miner.run().await.exit, MinerExit::Unreachable(timeout));
    }

    #[tokio::test]
    async fn test_search_timeout_requests_new_job() {
        let mut limited = settings(false);
        limited.limits.max_attempts = Some(10);
        let transport = ScriptedTransport::new(vec![Ok(job(64))], vec![]);
        let mut miner = Miner::new(transport, limited).unwrap();

        miner.step().await;
        miner.step().await;
        let outcome = miner.step().await;
        assert!(matches!(outcome, Some(CycleOutcome::TimedOut(s)) if s.attempts == 10));
        assert_eq!(miner.state(), &MinerState::RequestingJob);
        assert_eq!(miner.stats().searches_timed_out, 1);
    }

    #[tokio::test]
    async fn test_malformed_job_halts() {
        let mut bad = job(1);
        bad.block_data_hash = "zz".to_string();
        let transport = ScriptedTransport::new(vec![Ok(bad)], vec![]);
        let mut miner = Miner::new(transport, settings(false)).unwrap();

        assert!(matches!(
            miner.run().await.exit,
            MinerExit::Unreachable(ChainError::Format(_))
        ));
    }
}
