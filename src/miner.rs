//! Proof-of-work miner: job protocol, nonce search and the mining loop.

pub mod protocol;
pub mod search;
pub mod transport;
pub mod worker;

pub use protocol::{ErrorResponse, MinedBlock, MiningJob, SubmitResponse};
pub use search::{search, SearchLimits, SearchOutcome, SearchStats};
pub use transport::{LocalTransport, MiningTransport};
#[cfg(feature = "api")]
pub use transport::HttpTransport;
pub use worker::{CycleOutcome, Miner, MinerExit, MinerReport, MinerSettings, MinerState, MinerStats};
