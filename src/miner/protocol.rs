//! Wire contract between the node and external miners.
//!
//! - `GET  /mining/get-mining-job/{minerAddress}` answers with [`MiningJob`]
//! - `POST /mining/submit-mined-block` takes [`MinedBlock`] and answers with
//!   [`SubmitResponse`] or [`ErrorResponse`]

use serde::{Deserialize, Serialize};

pub const GET_MINING_JOB_PATH: &str = "/mining/get-mining-job";
pub const SUBMIT_MINED_BLOCK_PATH: &str = "/mining/submit-mined-block";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MiningJob {
    /// Height the candidate block will occupy.
    #[serde(default)]
    pub index: u64,
    #[serde(default)]
    pub transactions_included: usize,
    pub difficulty: u32,
    pub block_data_hash: String,
}

/// A solved proof for a previously issued job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MinedBlock {
    pub block_data_hash: String,
    pub date_created: String,
    pub nonce: u64,
    pub block_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub message: String,
}

impl SubmitResponse {
    pub fn accepted(index: u64) -> Self {
        SubmitResponse {
            message: format!("Block accepted: block {}", index),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error_msg: String,
}
