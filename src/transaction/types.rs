/// Transaction types for powchain
use crate::crypto::{KeyPair, Signature};
use crate::error::{ChainError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// The hashed content of a transaction, before its data hash is sealed.
///
/// Field order is the canonical hashing order and must not change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDraft {
    pub from: String,
    pub to: String,
    pub value: u64,
    pub fee: u64,
    pub date_created: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    pub sender_pub_key: String,
}

impl TransactionDraft {
    /// SHA-256 of the compact JSON rendering of the seven hashed fields.
    pub fn data_hash(&self) -> String {
        // Serializing plain strings and integers cannot fail.
        let canonical = serde_json::to_string(self).unwrap_or_default();
        hex::encode(Sha256::digest(canonical.as_bytes()))
    }

    /// Computes and freezes the data hash, producing an unsigned transaction.
    pub fn seal(self) -> Transaction {
        let transaction_data_hash = self.data_hash();
        Transaction {
            from: self.from,
            to: self.to,
            value: self.value,
            fee: self.fee,
            date_created: self.date_created,
            data: self.data,
            sender_pub_key: self.sender_pub_key,
            transaction_data_hash,
            sender_signature: None,
            mined_in_block_index: None,
            transfer_successful: false,
        }
    }
}

/// A sealed value transfer.
///
/// The hashed fields are immutable once sealed. Only the signature and the
/// execution status (`minedInBlockIndex`, `transferSuccessful`) change
/// afterwards, and neither is covered by `transactionDataHash`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "TransactionRecord")]
pub struct Transaction {
    from: String,
    to: String,
    value: u64,
    fee: u64,
    date_created: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<String>,
    sender_pub_key: String,
    transaction_data_hash: String,
    sender_signature: Option<Signature>,
    mined_in_block_index: Option<u64>,
    transfer_successful: bool,
}

impl Transaction {
    pub fn from(&self) -> &str {
        &self.from
    }

    pub fn to(&self) -> &str {
        &self.to
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn fee(&self) -> u64 {
        self.fee
    }

    pub fn date_created(&self) -> &str {
        &self.date_created
    }

    pub fn data(&self) -> Option<&str> {
        self.data.as_deref()
    }

    pub fn sender_pub_key(&self) -> &str {
        &self.sender_pub_key
    }

    pub fn transaction_data_hash(&self) -> &str {
        &self.transaction_data_hash
    }

    pub fn sender_signature(&self) -> Option<&Signature> {
        self.sender_signature.as_ref()
    }

    pub fn mined_in_block_index(&self) -> Option<u64> {
        self.mined_in_block_index
    }

    pub fn transfer_successful(&self) -> bool {
        self.transfer_successful
    }

    pub fn involves(&self, address: &str) -> bool {
        self.from == address || self.to == address
    }

    /// The hashed fields, detached from signature and execution status.
    pub fn draft(&self) -> TransactionDraft {
        TransactionDraft {
            from: self.from.clone(),
            to: self.to.clone(),
            value: self.value,
            fee: self.fee,
            date_created: self.date_created.clone(),
            data: self.data.clone(),
            sender_pub_key: self.sender_pub_key.clone(),
        }
    }

    pub fn with_signature(mut self, signature: Signature) -> Self {
        self.sender_signature = Some(signature);
        self
    }

    /// Signs the data hash with the sender's key.
    pub fn sign(&mut self, keypair: &KeyPair) -> Result<()> {
        self.sender_signature = Some(keypair.sign(&self.transaction_data_hash)?);
        Ok(())
    }

    pub(crate) fn mark_mined(&mut self, block_index: u64, transfer_successful: bool) {
        self.mined_in_block_index = Some(block_index);
        self.transfer_successful = transfer_successful;
    }
}

/// Plain wire form of a transaction; converting it back re-derives the data
/// hash and rejects records whose stated hash disagrees.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionRecord {
    from: String,
    to: String,
    value: u64,
    fee: u64,
    date_created: String,
    #[serde(default)]
    data: Option<String>,
    sender_pub_key: String,
    transaction_data_hash: String,
    #[serde(default)]
    sender_signature: Option<Signature>,
    #[serde(default)]
    mined_in_block_index: Option<u64>,
    #[serde(default)]
    transfer_successful: bool,
}

impl TryFrom<TransactionRecord> for Transaction {
    type Error = ChainError;

    fn try_from(record: TransactionRecord) -> Result<Self> {
        let mut tx = TransactionDraft {
            from: record.from,
            to: record.to,
            value: record.value,
            fee: record.fee,
            date_created: record.date_created,
            data: record.data,
            sender_pub_key: record.sender_pub_key,
        }
        .seal();

        if tx.transaction_data_hash != record.transaction_data_hash {
            return Err(ChainError::Format(format!(
                "Transaction data hash mismatch: expected {}, got {}",
                tx.transaction_data_hash, record.transaction_data_hash
            )));
        }
        tx.sender_signature = record.sender_signature;
        tx.mined_in_block_index = record.mined_in_block_index;
        tx.transfer_successful = record.transfer_successful;
        Ok(tx)
    }
}

/// Body of `POST /transactions/send`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedTransactionRequest {
    #[serde(flatten)]
    pub draft: TransactionDraft,
    pub sender_signature: Signature,
}

impl SignedTransactionRequest {
    pub fn into_transaction(self) -> Transaction {
        self.draft.seal().with_signature(self.sender_signature)
    }
}
