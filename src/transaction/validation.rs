/// Validation logic for transactions separated from type definitions
use crate::crypto::{self, validate_address, validate_public_key};
use crate::error::{ChainError, Result};
use crate::transaction::types::Transaction;

/// Parses an RFC 3339 / ISO-8601 timestamp.
pub fn validate_date(date: &str) -> Result<chrono::DateTime<chrono::FixedOffset>> {
    chrono::DateTime::parse_from_rfc3339(date)
        .map_err(|e| ChainError::Format(format!("Invalid ISO-8601 date {:?}: {}", date, e)))
}

/// Current UTC time with millisecond precision, e.g. `2018-02-01T23:23:56.337Z`.
pub fn iso_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

impl Transaction {
    /// Stateless field checks: addresses, sender key and creation date.
    pub fn validate_format(&self) -> Result<()> {
        validate_address(self.from())?;
        validate_address(self.to())?;
        validate_public_key(self.sender_pub_key())?;
        validate_date(self.date_created())?;
        Ok(())
    }

    /// Validates just the signature of the transaction, without access to ledger state.
    pub fn validate_signature(&self) -> Result<()> {
        let signature = self.sender_signature().ok_or_else(|| {
            ChainError::InvalidTransaction("Transaction not signed".to_string())
        })?;

        let sender_address = crypto::derive_address(self.sender_pub_key())?;
        if sender_address != self.from() {
            return Err(ChainError::InvalidTransaction(format!(
                "Sender address {} does not match public key address {}",
                self.from(),
                sender_address
            )));
        }

        if !crypto::verify(self.transaction_data_hash(), self.sender_pub_key(), signature)? {
            return Err(ChainError::InvalidTransaction(format!(
                "Invalid signature for transaction {}",
                self.transaction_data_hash()
            )));
        }
        Ok(())
    }

    /// Full admission check for a transaction entering the pending pool.
    pub fn validate(&self) -> Result<()> {
        self.validate_format()?;
        self.validate_signature()
    }
}
