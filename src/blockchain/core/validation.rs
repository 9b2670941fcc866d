use crate::crypto::validate_hash;
use crate::error::{ChainError, Result};
use crate::transaction::validate_date;
use sha2::{Digest, Sha256};

/// `SHA256("{blockDataHash}|{nonce}|{dateCreated}")` as lowercase hex.
pub fn calculate_block_hash(block_data_hash: &str, nonce: u64, date_created: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(block_data_hash.as_bytes());
    hasher.update(b"|");
    hasher.update(nonce.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(date_created.as_bytes());
    hex::encode(hasher.finalize())
}

/// Number of leading `'0'` hex characters.
pub fn leading_zeros(hash: &str) -> u32 {
    hash.bytes().take_while(|&b| b == b'0').count() as u32
}

pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
    leading_zeros(hash) >= difficulty
}

/// Checks a claimed proof against its data hash and difficulty.
///
/// The hash is recomputed independently; a mismatch is reported before the
/// difficulty is considered.
pub fn verify_proof(
    block_data_hash: &str,
    nonce: u64,
    date_created: &str,
    block_hash: &str,
    difficulty: u32,
) -> Result<()> {
    let expected = calculate_block_hash(block_data_hash, nonce, date_created);
    if expected != block_hash {
        return Err(ChainError::HashMismatch {
            expected,
            submitted: block_hash.to_string(),
        });
    }
    if !meets_difficulty(&expected, difficulty) {
        return Err(ChainError::DifficultyNotMet {
            difficulty,
            hash: expected,
        });
    }
    Ok(())
}

/// Format checks on a mined-block submission, run before any ledger lookup.
pub fn validate_submission_format(block_data_hash: &str, date_created: &str, block_hash: &str) -> Result<()> {
    validate_hash(block_data_hash)?;
    validate_hash(block_hash)?;
    validate_date(date_created)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_hash_is_deterministic() {
        let data_hash = "ab".repeat(32);
        let a = calculate_block_hash(&data_hash, 42, "2018-01-01T00:00:00.000Z");
        let b = calculate_block_hash(&data_hash, 42, "2018-01-01T00:00:00.000Z");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, calculate_block_hash(&data_hash, 43, "2018-01-01T00:00:00.000Z"));
    }

    #[test]
    fn test_block_hash_input_layout() {
        let expected = hex::encode(Sha256::digest(b"abc|7|2018-01-01T00:00:00.000Z"));
        assert_eq!(
            calculate_block_hash("abc", 7, "2018-01-01T00:00:00.000Z"),
            expected
        );
    }

    #[test]
    fn test_leading_zeros() {
        assert_eq!(leading_zeros("000a00"), 3);
        assert_eq!(leading_zeros("a000"), 0);
        assert!(meets_difficulty("00ff", 2));
        assert!(!meets_difficulty("00ff", 3));
        assert!(meets_difficulty("ffff", 0));
    }

    #[test]
    fn test_verify_proof_distinguishes_mismatch_from_difficulty() {
        let data_hash = "cd".repeat(32);
        let date = "2018-01-01T00:00:00.000Z";
        let hash = calculate_block_hash(&data_hash, 1, date);

        assert!(matches!(
            verify_proof(&data_hash, 1, date, &"0".repeat(64), 0),
            Err(ChainError::HashMismatch { .. })
        ));

        let zeros = leading_zeros(&hash);
        assert!(verify_proof(&data_hash, 1, date, &hash, zeros).is_ok());
        assert!(matches!(
            verify_proof(&data_hash, 1, date, &hash, zeros + 1),
            Err(ChainError::DifficultyNotMet { .. })
        ));
    }
}
