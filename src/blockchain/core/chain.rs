use crate::config::LedgerConfig;
use crate::crypto::{validate_address, Signature};
use crate::error::{ChainError, Result};
use crate::miner::protocol::{MinedBlock, MiningJob};
use crate::transaction::{validate_date, Transaction, TransactionDraft};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use tracing::{debug, info, warn};

use super::jobs::MiningJobs;
use super::state::{self, AddressBalance, Balances, SAFE_CONFIRMATIONS};
use super::validation::{calculate_block_hash, validate_submission_format, verify_proof};

pub const GENESIS_DATE: &str = "2018-01-01T00:00:00.000Z";
/// `prevBlockHash` of the genesis block.
pub const GENESIS_PREV_BLOCK_HASH: &str = "0";
pub const ZERO_ADDRESS: &str = "0000000000000000000000000000000000000000";
pub const ZERO_PUB_KEY: &str = "00000000000000000000000000000000000000000000000000000000000000000";
pub const ZERO_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Fields covered by `blockDataHash`, in canonical order.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BlockContent<'a> {
    index: u64,
    transactions: &'a [Transaction],
    difficulty: u32,
    prev_block_hash: &'a str,
    mined_by: &'a str,
}

/// A block awaiting its proof of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockCandidate {
    pub index: u64,
    pub transactions: Vec<Transaction>,
    pub difficulty: u32,
    pub prev_block_hash: String,
    pub mined_by: String,
    pub block_data_hash: String,
}

impl BlockCandidate {
    pub fn new(
        index: u64,
        transactions: Vec<Transaction>,
        difficulty: u32,
        prev_block_hash: String,
        mined_by: String,
    ) -> Self {
        let mut candidate = BlockCandidate {
            index,
            transactions,
            difficulty,
            prev_block_hash,
            mined_by,
            block_data_hash: String::new(),
        };
        candidate.block_data_hash = candidate.calculate_data_hash();
        candidate
    }

    pub fn calculate_data_hash(&self) -> String {
        let content = BlockContent {
            index: self.index,
            transactions: &self.transactions,
            difficulty: self.difficulty,
            prev_block_hash: &self.prev_block_hash,
            mined_by: &self.mined_by,
        };
        // Strings, integers and options only; serialization cannot fail.
        let canonical = serde_json::to_string(&content).unwrap_or_default();
        hex::encode(Sha256::digest(canonical.as_bytes()))
    }

    /// Attaches the miner's proof. The proof itself is checked by the caller.
    pub fn into_block(self, nonce: u64, date_created: String, block_hash: String) -> Block {
        Block {
            index: self.index,
            transactions: self.transactions,
            difficulty: self.difficulty,
            prev_block_hash: self.prev_block_hash,
            mined_by: self.mined_by,
            block_data_hash: self.block_data_hash,
            nonce,
            date_created,
            block_hash,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub index: u64,
    pub transactions: Vec<Transaction>,
    pub difficulty: u32,
    pub prev_block_hash: String,
    pub mined_by: String,
    pub block_data_hash: String,
    pub nonce: u64,
    pub date_created: String,
    pub block_hash: String,
}

impl Block {
    pub fn calculate_block_hash(&self) -> String {
        calculate_block_hash(&self.block_data_hash, self.nonce, &self.date_created)
    }

    /// Recomputes both hashes and checks the difficulty target.
    pub fn verify(&self) -> Result<()> {
        let content = BlockCandidate::new(
            self.index,
            self.transactions.clone(),
            self.difficulty,
            self.prev_block_hash.clone(),
            self.mined_by.clone(),
        );
        if content.block_data_hash != self.block_data_hash {
            return Err(ChainError::HashMismatch {
                expected: content.block_data_hash,
                submitted: self.block_data_hash.clone(),
            });
        }
        verify_proof(
            &self.block_data_hash,
            self.nonce,
            &self.date_created,
            &self.block_hash,
            self.difficulty,
        )
    }
}

/// Read-only summary served at `/info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerInfo {
    pub peers: usize,
    pub blocks_count: usize,
    pub current_difficulty: u32,
    pub cumulative_difficulty: u128,
    pub confirmed_transactions: usize,
    pub pending_transactions: usize,
}

/// The chain, the pending pool and the outstanding mining jobs.
///
/// Callers share a ledger behind a single lock; every mutating method
/// expects exclusive access for its whole duration.
#[derive(Debug, Clone)]
pub struct Ledger {
    blocks: Vec<Block>,
    pending_transactions: Vec<Transaction>,
    current_difficulty: u32,
    mining_jobs: MiningJobs,
    retarget_interval: u64,
    target_block_secs: u64,
}

impl Ledger {
    pub fn new(config: &LedgerConfig) -> Result<Self> {
        let genesis = Self::create_genesis_block(&config.faucet_address, config.total_supply)?;
        info!(
            "Genesis block {} credits {} to faucet {}",
            genesis.block_hash, config.total_supply, config.faucet_address
        );

        Ok(Ledger {
            blocks: vec![genesis],
            pending_transactions: Vec::new(),
            current_difficulty: config.initial_difficulty,
            mining_jobs: MiningJobs::new(),
            retarget_interval: config.retarget_interval,
            target_block_secs: config.target_block_secs,
        })
    }

    fn create_genesis_block(faucet_address: &str, total_supply: u64) -> Result<Block> {
        validate_address(faucet_address)?;

        let mut coinbase = TransactionDraft {
            from: ZERO_ADDRESS.to_string(),
            to: faucet_address.to_string(),
            value: total_supply,
            fee: 0,
            date_created: GENESIS_DATE.to_string(),
            data: Some("genesis tx".to_string()),
            sender_pub_key: ZERO_PUB_KEY.to_string(),
        }
        .seal()
        .with_signature(Signature::new(ZERO_HASH, ZERO_HASH));
        coinbase.mark_mined(0, true);

        let candidate = BlockCandidate::new(
            0,
            vec![coinbase],
            0,
            GENESIS_PREV_BLOCK_HASH.to_string(),
            ZERO_ADDRESS.to_string(),
        );
        let block_hash = calculate_block_hash(&candidate.block_data_hash, 0, GENESIS_DATE);
        Ok(candidate.into_block(0, GENESIS_DATE.to_string(), block_hash))
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn block(&self, index: u64) -> Option<&Block> {
        usize::try_from(index).ok().and_then(|i| self.blocks.get(i))
    }

    pub fn last_block(&self) -> &Block {
        // The genesis block is installed at construction and never removed.
        &self.blocks[self.blocks.len() - 1]
    }

    pub fn pending_transactions(&self) -> &[Transaction] {
        &self.pending_transactions
    }

    pub fn current_difficulty(&self) -> u32 {
        self.current_difficulty
    }

    pub fn mining_jobs(&self) -> &MiningJobs {
        &self.mining_jobs
    }

    pub fn confirmed_transaction_count(&self) -> usize {
        self.blocks.iter().map(|b| b.transactions.len()).sum()
    }

    /// Block order, then in-block order.
    pub fn confirmed_transactions(&self) -> Vec<&Transaction> {
        self.blocks
            .iter()
            .flat_map(|b| b.transactions.iter())
            .collect()
    }

    /// Confirmed first, then pending.
    pub fn all_transactions(&self) -> Vec<&Transaction> {
        let mut all = self.confirmed_transactions();
        all.extend(self.pending_transactions.iter());
        all
    }

    pub fn transactions_for_address(&self, address: &str) -> Vec<&Transaction> {
        self.all_transactions()
            .into_iter()
            .filter(|tx| tx.involves(address))
            .collect()
    }

    pub fn transaction_by_hash(&self, hash: &str) -> Option<&Transaction> {
        self.all_transactions()
            .into_iter()
            .find(|tx| tx.transaction_data_hash() == hash)
    }

    /// Signed balances from replaying confirmed transactions in chain order.
    pub fn balances(&self) -> Balances {
        state::replay_balances(self.blocks.iter().flat_map(|b| b.transactions.iter()))
    }

    pub fn balance_of(&self, address: &str) -> AddressBalance {
        let tip = self.last_block().index;
        let mut balance = AddressBalance::default();

        for block in &self.blocks {
            let confirmations = tip - block.index + 1;
            for tx in block.transactions.iter().filter(|tx| tx.involves(address)) {
                let delta = state::balance_delta(tx, address, false);
                balance.confirmed_balance += delta;
                if confirmations >= SAFE_CONFIRMATIONS {
                    balance.safe_balance += delta;
                }
            }
        }

        balance.pending_balance = balance.confirmed_balance
            + self
                .pending_transactions
                .iter()
                .filter(|tx| tx.involves(address))
                .map(|tx| state::balance_delta(tx, address, true))
                .sum::<i128>();
        balance
    }

    /// Sum of `16^difficulty` over all blocks.
    pub fn cumulative_difficulty(&self) -> u128 {
        self.blocks
            .iter()
            .map(|b| 16u128.saturating_pow(b.difficulty))
            .fold(0u128, |acc, work| acc.saturating_add(work))
    }

    pub fn info(&self) -> LedgerInfo {
        LedgerInfo {
            peers: 0,
            blocks_count: self.blocks.len(),
            current_difficulty: self.current_difficulty,
            cumulative_difficulty: self.cumulative_difficulty(),
            confirmed_transactions: self.confirmed_transaction_count(),
            pending_transactions: self.pending_transactions.len(),
        }
    }

    /// Admits a signed transaction into the pending pool.
    ///
    /// No funds check is made; balances may go negative.
    pub fn add_pending_transaction(&mut self, tx: Transaction) -> Result<&Transaction> {
        tx.validate()?;

        if self.transaction_by_hash(tx.transaction_data_hash()).is_some() {
            return Err(ChainError::DuplicateTransaction(
                tx.transaction_data_hash().to_string(),
            ));
        }

        debug!(
            "Pending transaction {} ({} -> {}, value {}, fee {})",
            tx.transaction_data_hash(),
            tx.from(),
            tx.to(),
            tx.value(),
            tx.fee()
        );
        self.pending_transactions.push(tx);
        Ok(&self.pending_transactions[self.pending_transactions.len() - 1])
    }

    /// Snapshots the pending pool into a candidate block for `miner_address`.
    pub fn issue_mining_job(&mut self, miner_address: &str) -> Result<MiningJob> {
        validate_address(miner_address)?;

        let index = self.blocks.len() as u64;
        let transactions: Vec<Transaction> = self
            .pending_transactions
            .iter()
            .cloned()
            .map(|mut tx| {
                tx.mark_mined(index, true);
                tx
            })
            .collect();

        let candidate = BlockCandidate::new(
            index,
            transactions,
            self.current_difficulty,
            self.last_block().block_hash.clone(),
            miner_address.to_string(),
        );

        let job = MiningJob {
            index,
            transactions_included: candidate.transactions.len(),
            difficulty: candidate.difficulty,
            block_data_hash: candidate.block_data_hash.clone(),
        };
        self.mining_jobs.insert(candidate);

        debug!(
            "Issued mining job {} for block {} to {} ({} transactions)",
            job.block_data_hash, index, miner_address, job.transactions_included
        );
        Ok(job)
    }

    /// Validates a solved job and appends it to the chain.
    ///
    /// On any error `blocks` and `pending_transactions` are left untouched.
    pub fn submit_mined_block(&mut self, mined: &MinedBlock) -> Result<&Block> {
        validate_submission_format(&mined.block_data_hash, &mined.date_created, &mined.block_hash)?;

        let (job_index, job_difficulty, job_prev_hash) = self
            .mining_jobs
            .get(&mined.block_data_hash)
            .map(|c| (c.index, c.difficulty, c.prev_block_hash.clone()))
            .ok_or_else(|| ChainError::JobNotFound(mined.block_data_hash.clone()))?;

        verify_proof(
            &mined.block_data_hash,
            mined.nonce,
            &mined.date_created,
            &mined.block_hash,
            job_difficulty,
        )?;

        let tip_index = self.last_block().index;
        if job_index != tip_index + 1 || job_prev_hash != self.last_block().block_hash {
            self.mining_jobs.remove(&mined.block_data_hash);
            warn!(
                "Rejected stale job {} for block {}: chain already at {}",
                mined.block_data_hash, job_index, tip_index
            );
            return Err(ChainError::ConsensusRace(format!(
                "block {} was already mined by another submission",
                job_index
            )));
        }

        let candidate = self
            .mining_jobs
            .remove(&mined.block_data_hash)
            .ok_or_else(|| ChainError::JobNotFound(mined.block_data_hash.clone()))?;
        let block = candidate.into_block(
            mined.nonce,
            mined.date_created.clone(),
            mined.block_hash.clone(),
        );

        let included: HashSet<&str> = block
            .transactions
            .iter()
            .map(|tx| tx.transaction_data_hash())
            .collect();
        self.pending_transactions
            .retain(|tx| !included.contains(tx.transaction_data_hash()));

        info!(
            "Mined block {} ({} transactions) by {}: {}",
            block.index,
            block.transactions.len(),
            block.mined_by,
            block.block_hash
        );
        self.blocks.push(block);
        self.adjust_difficulty();

        Ok(self.last_block())
    }

    /// Every `retarget_interval` blocks, nudge difficulty by one so block
    /// time tracks `target_block_secs`.
    fn adjust_difficulty(&mut self) {
        let interval = self.retarget_interval;
        let height = self.last_block().index;
        if interval == 0 || height < interval || height % interval != 0 {
            return;
        }

        let first = &self.blocks[(height - interval) as usize];
        let last = self.last_block();
        let (Ok(start), Ok(end)) = (validate_date(&first.date_created), validate_date(&last.date_created)) else {
            return;
        };

        let actual_secs = (end - start).num_seconds().max(0) as u64;
        let expected_secs = interval * self.target_block_secs;
        let previous = self.current_difficulty;

        if actual_secs.saturating_mul(2) < expected_secs {
            self.current_difficulty += 1;
        } else if actual_secs > expected_secs.saturating_mul(2) && self.current_difficulty > 1 {
            self.current_difficulty -= 1;
        }

        if self.current_difficulty != previous {
            info!(
                "Difficulty adjusted {} -> {} ({}s for {} blocks, target {}s)",
                previous, self.current_difficulty, actual_secs, interval, expected_secs
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::core::validation::meets_difficulty;
    use crate::crypto::KeyPair;

    const FAUCET: &str = "f3a1e69b6176052fcc4a3248f1c5a91dea308ca9";
    const MINER: &str = "9a9f082f37270ff54c5ca4204a0e4da6951fe917";
    const RECIPIENT: &str = "a1de0763f26176c6d68cc77e0a1c2c42045f2314";
    const SUPPLY: u64 = 1_000_000_000_000;

    fn ledger_with_difficulty(difficulty: u32) -> Ledger {
        Ledger::new(&LedgerConfig {
            initial_difficulty: difficulty,
            ..LedgerConfig::default()
        })
        .unwrap()
    }

    fn solve(job: &MiningJob) -> MinedBlock {
        let date_created = "2018-02-01T12:00:00.000Z".to_string();
        let mut nonce = 0u64;
        loop {
            let block_hash = calculate_block_hash(&job.block_data_hash, nonce, &date_created);
            if meets_difficulty(&block_hash, job.difficulty) {
                return MinedBlock {
                    block_data_hash: job.block_data_hash.clone(),
                    date_created,
                    nonce,
                    block_hash,
                };
            }
            nonce += 1;
        }
    }

    fn signed_transfer(sender: &KeyPair, value: u64, fee: u64, date: &str) -> Transaction {
        let mut tx = TransactionDraft {
            from: sender.address(),
            to: RECIPIENT.to_string(),
            value,
            fee,
            date_created: date.to_string(),
            data: None,
            sender_pub_key: sender.public_key_hex(),
        }
        .seal();
        tx.sign(sender).unwrap();
        tx
    }

    #[test]
    fn test_genesis_block() {
        let ledger = ledger_with_difficulty(1);
        assert_eq!(ledger.blocks().len(), 1);

        let genesis = ledger.last_block();
        assert_eq!(genesis.index, 0);
        assert_eq!(genesis.prev_block_hash, GENESIS_PREV_BLOCK_HASH);
        assert_eq!(genesis.transactions.len(), 1);
        assert!(genesis.verify().is_ok());

        let coinbase = &genesis.transactions[0];
        assert_eq!(coinbase.from(), ZERO_ADDRESS);
        assert_eq!(coinbase.to(), FAUCET);
        assert_eq!(coinbase.value(), SUPPLY);
        assert_eq!(coinbase.fee(), 0);
        assert!(coinbase.transfer_successful());
        assert_eq!(coinbase.mined_in_block_index(), Some(0));
    }

    #[test]
    fn test_genesis_is_deterministic() {
        let a = ledger_with_difficulty(1);
        let b = ledger_with_difficulty(3);
        assert_eq!(a.last_block(), b.last_block());
    }

    #[test]
    fn test_genesis_balances() {
        let ledger = ledger_with_difficulty(1);
        let balances = ledger.balances();
        assert_eq!(balances.len(), 2);
        assert_eq!(balances[FAUCET], SUPPLY as i128);
        assert_eq!(balances[ZERO_ADDRESS], -(SUPPLY as i128));
        assert!(!balances.contains_key(RECIPIENT));
    }

    #[test]
    fn test_cumulative_difficulty_weights_blocks_exponentially() {
        let mut ledger = ledger_with_difficulty(1);
        let mut block = ledger.last_block().clone();
        block.difficulty = 5;
        ledger.blocks.push(block.clone());
        ledger.blocks.push(block);

        assert_eq!(ledger.cumulative_difficulty(), 2_097_153);
    }

    #[test]
    fn test_mining_round_trip() {
        let mut ledger = ledger_with_difficulty(1);
        let job = ledger.issue_mining_job(MINER).unwrap();
        assert_eq!(job.difficulty, 1);
        assert_eq!(job.index, 1);
        assert!(ledger.mining_jobs().contains(&job.block_data_hash));

        let mined = solve(&job);
        let block = ledger.submit_mined_block(&mined).unwrap().clone();
        assert_eq!(block.index, 1);
        assert_eq!(block.mined_by, MINER);
        assert_eq!(block.prev_block_hash, ledger.blocks()[0].block_hash);
        assert!(block.block_hash.starts_with('0'));
        assert!(block.verify().is_ok());

        assert_eq!(ledger.blocks().len(), 2);
        assert!(!ledger.mining_jobs().contains(&job.block_data_hash));
    }

    #[test]
    fn test_job_cannot_be_consumed_twice() {
        let mut ledger = ledger_with_difficulty(1);
        let job = ledger.issue_mining_job(MINER).unwrap();
        let mined = solve(&job);

        ledger.submit_mined_block(&mined).unwrap();
        assert!(matches!(
            ledger.submit_mined_block(&mined),
            Err(ChainError::JobNotFound(_))
        ));
        assert_eq!(ledger.blocks().len(), 2);
    }

    #[test]
    fn test_unknown_job_leaves_state_unchanged() {
        let mut ledger = ledger_with_difficulty(1);
        let sender = KeyPair::generate();
        ledger
            .add_pending_transaction(signed_transfer(&sender, 5, 1, "2018-02-01T00:00:00.000Z"))
            .unwrap();

        let mined = MinedBlock {
            block_data_hash: "ab".repeat(32),
            date_created: "2018-02-01T12:00:00.000Z".to_string(),
            nonce: 0,
            block_hash: "0".repeat(64),
        };
        assert!(matches!(
            ledger.submit_mined_block(&mined),
            Err(ChainError::JobNotFound(_))
        ));
        assert_eq!(ledger.blocks().len(), 1);
        assert_eq!(ledger.pending_transactions().len(), 1);
    }

    #[test]
    fn test_wrong_hash_and_weak_hash_rejected() {
        let mut ledger = ledger_with_difficulty(1);
        let job = ledger.issue_mining_job(MINER).unwrap();
        let mut mined = solve(&job);

        let mut wrong = mined.clone();
        wrong.block_hash = "0".repeat(64);
        assert!(matches!(
            ledger.submit_mined_block(&wrong),
            Err(ChainError::HashMismatch { .. })
        ));

        // Find a nonce whose correctly computed hash misses the target.
        let mut nonce = 0;
        loop {
            let hash = calculate_block_hash(&job.block_data_hash, nonce, &mined.date_created);
            if !hash.starts_with('0') {
                mined.nonce = nonce;
                mined.block_hash = hash;
                break;
            }
            nonce += 1;
        }
        assert!(matches!(
            ledger.submit_mined_block(&mined),
            Err(ChainError::DifficultyNotMet { difficulty: 1, .. })
        ));

        assert_eq!(ledger.blocks().len(), 1);
        assert!(ledger.mining_jobs().contains(&job.block_data_hash));
    }

    #[test]
    fn test_malformed_submission_is_format_error() {
        let mut ledger = ledger_with_difficulty(1);
        let job = ledger.issue_mining_job(MINER).unwrap();
        let mut mined = solve(&job);
        mined.date_created = "not a date".to_string();
        assert!(matches!(
            ledger.submit_mined_block(&mined),
            Err(ChainError::Format(_))
        ));
        assert!(matches!(
            ledger.issue_mining_job("zz"),
            Err(ChainError::Format(_))
        ));
    }

    #[test]
    fn test_losing_job_reports_consensus_race() {
        let mut ledger = ledger_with_difficulty(1);
        let winner = ledger.issue_mining_job(MINER).unwrap();
        let loser = ledger.issue_mining_job(RECIPIENT).unwrap();
        assert_ne!(winner.block_data_hash, loser.block_data_hash);

        ledger.submit_mined_block(&solve(&winner)).unwrap();
        assert!(matches!(
            ledger.submit_mined_block(&solve(&loser)),
            Err(ChainError::ConsensusRace(_))
        ));
        assert_eq!(ledger.blocks().len(), 2);
        assert!(ledger.mining_jobs().is_empty());
    }

    #[test]
    fn test_mined_transactions_leave_pending_pool() {
        let mut ledger = ledger_with_difficulty(1);
        let sender = KeyPair::generate();
        let first = signed_transfer(&sender, 100, 10, "2018-02-01T00:00:00.000Z");
        let first_hash = first.transaction_data_hash().to_string();
        ledger.add_pending_transaction(first).unwrap();

        let job = ledger.issue_mining_job(MINER).unwrap();
        assert_eq!(job.transactions_included, 1);

        // Arrives after the job was issued, so it stays pending.
        let late = signed_transfer(&sender, 7, 1, "2018-02-01T00:00:01.000Z");
        ledger.add_pending_transaction(late).unwrap();

        ledger.submit_mined_block(&solve(&job)).unwrap();
        assert_eq!(ledger.pending_transactions().len(), 1);
        assert_eq!(ledger.confirmed_transaction_count(), 2);

        let mined_tx = ledger.transaction_by_hash(&first_hash).unwrap();
        assert_eq!(mined_tx.mined_in_block_index(), Some(1));
        assert!(mined_tx.transfer_successful());

        let balances = ledger.balances();
        assert_eq!(balances[&sender.address()], -110);
        assert_eq!(balances[RECIPIENT], 100);
    }

    #[test]
    fn test_transaction_queries() {
        let mut ledger = ledger_with_difficulty(1);
        let sender = KeyPair::generate();
        ledger
            .add_pending_transaction(signed_transfer(&sender, 3, 1, "2018-02-01T00:00:00.000Z"))
            .unwrap();

        assert_eq!(ledger.confirmed_transactions().len(), 1);
        let all = ledger.all_transactions();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].to(), FAUCET);
        assert_eq!(all[1].from(), sender.address());

        assert_eq!(ledger.transactions_for_address(RECIPIENT).len(), 1);
        assert_eq!(ledger.transactions_for_address(FAUCET).len(), 1);
        assert!(ledger.transactions_for_address(MINER).is_empty());
    }

    #[test]
    fn test_duplicate_and_unsigned_transactions_rejected() {
        let mut ledger = ledger_with_difficulty(1);
        let sender = KeyPair::generate();
        let tx = signed_transfer(&sender, 3, 1, "2018-02-01T00:00:00.000Z");

        ledger.add_pending_transaction(tx.clone()).unwrap();
        assert!(matches!(
            ledger.add_pending_transaction(tx.clone()),
            Err(ChainError::DuplicateTransaction(_))
        ));

        let unsigned = tx.draft().seal();
        assert!(matches!(
            ledger.add_pending_transaction(unsigned),
            Err(ChainError::InvalidTransaction(_))
        ));
        assert_eq!(ledger.pending_transactions().len(), 1);
    }

    #[test]
    fn test_balance_of_tracks_confirmations() {
        let mut ledger = ledger_with_difficulty(0);
        let sender = KeyPair::generate();
        ledger
            .add_pending_transaction(signed_transfer(&sender, 50, 5, "2018-02-01T00:00:00.000Z"))
            .unwrap();

        let pending = ledger.balance_of(RECIPIENT);
        assert_eq!(pending.confirmed_balance, 0);
        assert_eq!(pending.pending_balance, 50);

        let job = ledger.issue_mining_job(MINER).unwrap();
        ledger.submit_mined_block(&solve(&job)).unwrap();
        let confirmed = ledger.balance_of(RECIPIENT);
        assert_eq!(confirmed.confirmed_balance, 50);
        assert_eq!(confirmed.safe_balance, 0);

        for _ in 0..5 {
            let job = ledger.issue_mining_job(MINER).unwrap();
            ledger.submit_mined_block(&solve(&job)).unwrap();
        }
        let safe = ledger.balance_of(RECIPIENT);
        assert_eq!(safe.safe_balance, 50);
        assert_eq!(ledger.balance_of(&sender.address()).safe_balance, -55);

        let faucet = ledger.balance_of(FAUCET);
        assert_eq!(faucet.safe_balance, SUPPLY as i128);
    }

    #[test]
    fn test_ledger_info() {
        let ledger = ledger_with_difficulty(4);
        let info = ledger.info();
        assert_eq!(info.blocks_count, 1);
        assert_eq!(info.current_difficulty, 4);
        assert_eq!(info.cumulative_difficulty, 1);
        assert_eq!(info.confirmed_transactions, 1);
        assert_eq!(info.pending_transactions, 0);
        assert_eq!(info.peers, 0);
    }

    #[test]
    fn test_difficulty_retarget() {
        let mut ledger = Ledger::new(&LedgerConfig {
            initial_difficulty: 1,
            retarget_interval: 2,
            target_block_secs: 60,
            ..LedgerConfig::default()
        })
        .unwrap();

        // The first window starts at the 2018-01-01 genesis, far slower than
        // the target; difficulty stays at its floor of 1.
        for _ in 0..2 {
            let job = ledger.issue_mining_job(MINER).unwrap();
            ledger.submit_mined_block(&solve(&job)).unwrap();
        }
        assert_eq!(ledger.current_difficulty(), 1);

        // Blocks 3 and 4 share the fixed test timestamp: zero seconds elapsed.
        for _ in 0..2 {
            let job = ledger.issue_mining_job(MINER).unwrap();
            ledger.submit_mined_block(&solve(&job)).unwrap();
        }
        assert_eq!(ledger.current_difficulty(), 2);
    }
}
