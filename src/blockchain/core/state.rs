//! Balance aggregation over ledger history.
//!
//! Fees are always charged to the sender; the value moves only when the
//! transfer succeeded. Balances are signed and never clamped.

use crate::transaction::Transaction;
use serde::Serialize;
use std::collections::BTreeMap;

/// Confirmations after which a transaction counts toward the safe balance.
pub const SAFE_CONFIRMATIONS: u64 = 6;

pub type Balances = BTreeMap<String, i128>;

/// Replays transactions in order into a fresh balance table.
pub fn replay_balances<'a, I>(transactions: I) -> Balances
where
    I: IntoIterator<Item = &'a Transaction>,
{
    let mut balances = Balances::new();
    for tx in transactions {
        apply_transaction(&mut balances, tx);
    }
    balances
}

pub fn apply_transaction(balances: &mut Balances, tx: &Transaction) {
    balances.entry(tx.to().to_string()).or_insert(0);
    *balances.entry(tx.from().to_string()).or_insert(0) -= tx.fee() as i128;

    if tx.transfer_successful() {
        *balances.entry(tx.from().to_string()).or_insert(0) -= tx.value() as i128;
        *balances.entry(tx.to().to_string()).or_insert(0) += tx.value() as i128;
    }
}

/// Net effect of one transaction on `address`.
///
/// `assume_success` applies the value even when the transaction has not
/// executed yet; used for pending transactions.
pub fn balance_delta(tx: &Transaction, address: &str, assume_success: bool) -> i128 {
    let moves_value = assume_success || tx.transfer_successful();
    let mut delta = 0i128;
    if tx.from() == address {
        delta -= tx.fee() as i128;
        if moves_value {
            delta -= tx.value() as i128;
        }
    }
    if tx.to() == address && moves_value {
        delta += tx.value() as i128;
    }
    delta
}

/// Balance of a single address at three confidence levels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressBalance {
    /// Confirmed with at least [`SAFE_CONFIRMATIONS`] blocks on top.
    pub safe_balance: i128,
    pub confirmed_balance: i128,
    /// Confirmed plus every pending transaction.
    pub pending_balance: i128,
}
