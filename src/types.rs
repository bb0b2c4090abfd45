use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::errors::LendingError;

/// loan identifier assigned by the ledger
pub type LoanId = u64;

/// 20-byte account address
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct AccountId([u8; 20]);

impl AccountId {
    /// reserved "no account" value; marks deleted loans and unfunded lenders
    pub const NULL: AccountId = AccountId([0; 20]);

    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        AccountId(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn is_null(&self) -> bool {
        *self == Self::NULL
    }
}

impl FromStr for AccountId {
    type Err = LendingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || LendingError::InvalidAccount { input: s.to_string() };

        let hex = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        if hex.len() != 40 || !hex.is_ascii() {
            return Err(invalid());
        }

        let mut bytes = [0u8; 20];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).map_err(|_| invalid())?;
        }
        Ok(AccountId(bytes))
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x")?;
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl Serialize for AccountId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AccountId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// what backs a loan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Collateral {
    /// fungible deposit held by the ledger
    Deposit,
    /// a specific non-fungible token
    Nft { token_id: u64 },
}

impl Collateral {
    pub fn is_nft(&self) -> bool {
        matches!(self, Collateral::Nft { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Collateral::Deposit => "deposit-backed",
            Collateral::Nft { .. } => "nft-backed",
        }
    }
}

/// loan status derived from the ledger record and the current time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoanStatus {
    /// borrower is the null account
    Deleted,
    /// nft-backed request waiting for a lender
    AwaitingLender,
    /// funded and performing
    Active,
    /// next payment settles the loan
    FinalInstallment,
    /// payment deadline passed without payment
    PaymentMissed,
    /// loan term elapsed
    Expired,
}

impl LoanStatus {
    /// the ledger should close the loan
    pub fn requires_closure(&self) -> bool {
        matches!(self, LoanStatus::PaymentMissed | LoanStatus::Expired)
    }
}
