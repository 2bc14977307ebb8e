//! Treasury/wallet types.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::error::{ModelError, Result};
use crate::ids::TransactionId;
use crate::page::Page;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Monetary amount in minor units (cents) of `currency`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Money {
    pub amount_minor: i64,
    pub currency: String,
}

impl Money {
    pub fn new(amount_minor: i64, currency: impl Into<String>) -> Self {
        Self {
            amount_minor,
            currency: currency.into(),
        }
    }

    pub fn is_positive(&self) -> bool {
        self.amount_minor > 0
    }

    pub fn checked_add(&self, other: &Money) -> Result<Money> {
        if self.currency != other.currency {
            return Err(ModelError::CurrencyMismatch {
                expected: self.currency.clone(),
                found: other.currency.clone(),
            });
        }
        Ok(Money::new(
            self.amount_minor.saturating_add(other.amount_minor),
            self.currency.clone(),
        ))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.amount_minor < 0 { "-" } else { "" };
        let abs = self.amount_minor.unsigned_abs();
        write!(f, "{sign}{}.{:02} {}", abs / 100, abs % 100, self.currency)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct WalletBalance {
    pub available: Money,
    pub pending: Money,
    pub total: Money,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TransactionKind {
    Sale,
    Purchase,
    Subscription,
    Withdrawal,
    Refund,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Transaction {
    pub id: TransactionId,
    pub kind: TransactionKind,
    pub amount: Money,
    pub status: TransactionStatus,
    #[cfg_attr(feature = "serde", serde(default))]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub type TransactionPage = Page<Transaction>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum WithdrawalMethod {
    BankTransfer,
    Card,
    CryptoWallet,
}

impl WithdrawalMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalMethod::BankTransfer => "bank_transfer",
            WithdrawalMethod::Card => "card",
            WithdrawalMethod::CryptoWallet => "crypto_wallet",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct WithdrawalRequest {
    pub amount: Money,
    pub method: WithdrawalMethod,
}

impl WithdrawalRequest {
    /// Rejects zero and negative amounts before anything is sent.
    pub fn new(amount: Money, method: WithdrawalMethod) -> Result<Self> {
        if !amount.is_positive() {
            return Err(ModelError::InvalidAmount(amount.amount_minor));
        }
        Ok(Self { amount, method })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct WithdrawalReceipt {
    pub transaction_id: TransactionId,
    pub status: TransactionStatus,
    #[cfg_attr(feature = "serde", serde(default))]
    pub estimated_arrival: Option<DateTime<Utc>>,
}
