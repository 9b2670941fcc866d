//! Outstanding mining jobs, keyed by block data hash.
//!
//! Jobs keep their issuance order in an LRU cache so the table can be
//! bounded (oldest first out) and rendered as a plain list of `{ blockDataHash, block }`
//! records.

use super::chain::BlockCandidate;
use crate::error::ChainError;
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroUsize;

/// Upper bound on retained jobs.
pub const MAX_MINING_JOBS: usize = 1024;

const CAPACITY: NonZeroUsize = match NonZeroUsize::new(MAX_MINING_JOBS) {
    Some(capacity) => capacity,
    None => panic!("MAX_MINING_JOBS must be non-zero"),
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MiningJobRecord {
    pub block_data_hash: String,
    pub block: BlockCandidate,
}

/// Lookups go through `peek` so only (re-)issuing a job changes its age.
#[derive(Serialize, Deserialize)]
#[serde(try_from = "Vec<MiningJobRecord>", into = "Vec<MiningJobRecord>")]
pub struct MiningJobs {
    jobs: LruCache<String, BlockCandidate>,
}

impl MiningJobs {
    pub fn new() -> Self {
        MiningJobs {
            jobs: LruCache::new(CAPACITY),
        }
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn contains(&self, block_data_hash: &str) -> bool {
        self.jobs.contains(block_data_hash)
    }

    pub fn get(&self, block_data_hash: &str) -> Option<&BlockCandidate> {
        self.jobs.peek(block_data_hash)
    }

    /// Stores a candidate under its own data hash, evicting the oldest job
    /// when the table is full. Re-issuing an identical candidate refreshes it.
    pub fn insert(&mut self, candidate: BlockCandidate) {
        let key = candidate.block_data_hash.clone();
        if let Some((evicted, _)) = self.jobs.push(key.clone(), candidate) {
            if evicted != key {
                tracing::debug!("Evicted oldest mining job {}", evicted);
            }
        }
    }

    pub fn remove(&mut self, block_data_hash: &str) -> Option<BlockCandidate> {
        self.jobs.pop(block_data_hash)
    }

    /// Jobs in issuance order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BlockCandidate)> {
        self.jobs.iter().rev().map(|(k, c)| (k.as_str(), c))
    }

    pub fn to_records(&self) -> Vec<MiningJobRecord> {
        self.iter()
            .map(|(hash, block)| MiningJobRecord {
                block_data_hash: hash.to_string(),
                block: block.clone(),
            })
            .collect()
    }
}

impl Default for MiningJobs {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MiningJobs {
    fn clone(&self) -> Self {
        let mut jobs = MiningJobs::new();
        for (_, candidate) in self.iter() {
            jobs.insert(candidate.clone());
        }
        jobs
    }
}

impl PartialEq for MiningJobs {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl Eq for MiningJobs {}

impl fmt::Debug for MiningJobs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter().map(|(hash, _)| hash)).finish()
    }
}

impl TryFrom<Vec<MiningJobRecord>> for MiningJobs {
    type Error = ChainError;

    fn try_from(records: Vec<MiningJobRecord>) -> Result<Self, Self::Error> {
        let mut jobs = MiningJobs::new();
        for record in records {
            let actual = record.block.calculate_data_hash();
            if actual != record.block_data_hash || actual != record.block.block_data_hash {
                return Err(ChainError::Format(format!(
                    "Mining job key {} does not match block data hash {}",
                    record.block_data_hash, actual
                )));
            }
            jobs.insert(record.block);
        }
        Ok(jobs)
    }
}

impl From<MiningJobs> for Vec<MiningJobRecord> {
    fn from(jobs: MiningJobs) -> Self {
        jobs.to_records()
    }
}
