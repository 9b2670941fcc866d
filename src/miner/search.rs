//! Proof-of-work nonce search.

use super::protocol::{MinedBlock, MiningJob};
use sha2::{Digest, Sha256};
use std::time::{Duration, Instant};

/// How many attempts run between wall-clock checks.
const CLOCK_CHECK_INTERVAL: u64 = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchLimits {
    pub time_budget: Duration,
    /// Optional hard cap on nonces tried, mainly for tests.
    pub max_attempts: Option<u64>,
}

impl SearchLimits {
    pub fn with_budget(time_budget: Duration) -> Self {
        SearchLimits {
            time_budget,
            max_attempts: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub attempts: u64,
    pub elapsed: Duration,
}

impl SearchStats {
    pub fn hash_rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.attempts as f64 / secs
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    Found(MinedBlock, SearchStats),
    /// The budget ran out; the job should be abandoned.
    TimedOut(SearchStats),
}

/// Counts leading zero hex digits of a raw digest.
fn leading_zero_nibbles(digest: &[u8]) -> u32 {
    let mut zeros = 0;
    for byte in digest {
        if *byte == 0 {
            zeros += 2;
        } else {
            if byte >> 4 == 0 {
                zeros += 1;
            }
            break;
        }
    }
    zeros
}

/// Tries nonces from zero upwards with `date_created` fixed for the whole
/// search, until a hash with `job.difficulty` leading zeros turns up or the
/// limits are exhausted.
pub fn search(job: &MiningJob, date_created: String, limits: &SearchLimits) -> SearchOutcome {
    let started = Instant::now();
    let mut prefix = Sha256::new();
    prefix.update(job.block_data_hash.as_bytes());
    prefix.update(b"|");
    let suffix = format!("|{}", date_created);

    let mut nonce: u64 = 0;
    loop {
        if limits.max_attempts.is_some_and(|max| nonce >= max) {
            break;
        }
        if nonce % CLOCK_CHECK_INTERVAL == 0 && nonce > 0 && started.elapsed() >= limits.time_budget {
            break;
        }

        let mut hasher = prefix.clone();
        hasher.update(nonce.to_string().as_bytes());
        hasher.update(suffix.as_bytes());
        let digest = hasher.finalize();

        if leading_zero_nibbles(&digest) >= job.difficulty {
            let stats = SearchStats {
                attempts: nonce + 1,
                elapsed: started.elapsed(),
            };
            let mined = MinedBlock {
                block_data_hash: job.block_data_hash.clone(),
                date_created,
                nonce,
                block_hash: hex::encode(digest),
            };
            return SearchOutcome::Found(mined, stats);
        }

        match nonce.checked_add(1) {
            Some(next) => nonce = next,
            None => break,
        }
    }

    SearchOutcome::TimedOut(SearchStats {
        attempts: nonce,
        elapsed: started.elapsed(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::{calculate_block_hash, leading_zeros};

    fn job(difficulty: u32) -> MiningJob {
        MiningJob {
            index: 1,
            transactions_included: 0,
            difficulty,
            block_data_hash: "5d".repeat(32),
        }
    }

    #[test]
    fn test_nibble_counting_matches_hex() {
        for bytes in [[0u8, 0, 0x12], [0, 0x0f, 0], [0x10, 0, 0], [0, 0, 0]] {
            assert_eq!(leading_zero_nibbles(&bytes), leading_zeros(&hex::encode(bytes)));
        }
    }

    #[test]
    fn test_finds_qualifying_nonce() {
        let date = "2018-02-01T12:00:00.000Z".to_string();
        let limits = SearchLimits {
            time_budget: Duration::from_secs(60),
            max_attempts: Some(1_000_000),
        };
        match search(&job(2), date.clone(), &limits) {
            SearchOutcome::Found(mined, stats) => {
                assert!(mined.block_hash.starts_with("00"));
                assert_eq!(mined.date_created, date);
                assert_eq!(
                    mined.block_hash,
                    calculate_block_hash(&mined.block_data_hash, mined.nonce, &date)
                );
                assert_eq!(stats.attempts, mined.nonce + 1);
            }
            other => panic!("expected a solution, got {:?}", other),
        }
    }

    #[test]
    fn test_difficulty_zero_accepts_first_nonce() {
        let limits = SearchLimits::with_budget(Duration::from_secs(1));
        match search(&job(0), "2018-02-01T12:00:00.000Z".to_string(), &limits) {
            SearchOutcome::Found(mined, _) => assert_eq!(mined.nonce, 0),
            other => panic!("expected a solution, got {:?}", other),
        }
    }

    #[test]
    fn test_attempt_cap_times_out() {
        let limits = SearchLimits {
            time_budget: Duration::from_secs(60),
            max_attempts: Some(100),
        };
        // 64 leading zeros is unreachable in practice.
        match search(&job(64), "2018-02-01T12:00:00.000Z".to_string(), &limits) {
            SearchOutcome::TimedOut(stats) => assert_eq!(stats.attempts, 100),
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[test]
    fn test_wall_clock_budget_times_out() {
        let limits = SearchLimits::with_budget(Duration::from_millis(20));
        let started = Instant::now();
        let outcome = search(&job(64), "2018-02-01T12:00:00.000Z".to_string(), &limits);
        assert!(matches!(outcome, SearchOutcome::TimedOut(_)));
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
