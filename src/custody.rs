// 6.5 custody.rs: collateral moves between trader accounts and the perp vault.
// the engine calls the bank last in every operation, so a failed transfer aborts the whole write set.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::events::TransferDirection;
use crate::types::{Coin, TraderAddr};

// Errors from the bank
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BankError {
    #[error("insufficient {denom} balance for {holder}: available {available}, requested {requested}")]
    InsufficientBalance {
        holder: String,
        denom: String,
        available: Decimal,
        requested: Decimal,
    },

    #[error("transfer amount must be positive, got {0}")]
    InvalidAmount(Decimal),

    #[error("bank rejected transfer: {0}")]
    Rejected(String),
}

// Trait for the token ledger. Implement this for the host chain's bank.
pub trait CollateralBank {
    fn send_from_account_to_vault(&mut self, trader: &TraderAddr, coin: &Coin) -> Result<(), BankError>;

    fn send_from_vault_to_account(&mut self, trader: &TraderAddr, coin: &Coin) -> Result<(), BankError>;
}

pub const VAULT_HOLDER: &str = "perp_vault";

// Balances book. One balance per (holder, denom); the vault is a holder like any other.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VaultLedger {
    balances: HashMap<String, HashMap<String, Decimal>>,
    total_deposited: Decimal,
    total_withdrawn: Decimal,
}

impl VaultLedger {
    pub fn new() -> Self {
        Self::default()
    }

    // Credits a trader from outside the system (faucet, bridge deposit)
    pub fn fund_account(&mut self, trader: &TraderAddr, coin: &Coin) -> Result<(), BankError> {
        validate_amount(coin)?;
        *self.entry(trader.as_str(), &coin.denom) += coin.amount;
        Ok(())
    }

    // Seeds the vault, e.g. from an insurance allocation
    pub fn fund_vault(&mut self, coin: &Coin) -> Result<(), BankError> {
        validate_amount(coin)?;
        *self.entry(VAULT_HOLDER, &coin.denom) += coin.amount;
        Ok(())
    }

    pub fn balance(&self, trader: &TraderAddr, denom: &str) -> Decimal {
        self.balance_of(trader.as_str(), denom)
    }

    pub fn vault_balance(&self, denom: &str) -> Decimal {
        self.balance_of(VAULT_HOLDER, denom)
    }

    pub fn total_deposited(&self) -> Decimal {
        self.total_deposited
    }

    pub fn total_withdrawn(&self) -> Decimal {
        self.total_withdrawn
    }

    fn balance_of(&self, holder: &str, denom: &str) -> Decimal {
        self.balances
            .get(holder)
            .and_then(|b| b.get(denom))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    fn entry(&mut self, holder: &str, denom: &str) -> &mut Decimal {
        self.balances
            .entry(holder.to_string())
            .or_default()
            .entry(denom.to_string())
            .or_insert(Decimal::ZERO)
    }

    fn transfer(&mut self, from: &str, to: &str, coin: &Coin) -> Result<(), BankError> {
        validate_amount(coin)?;
        let available = self.balance_of(from, &coin.denom);
        if available < coin.amount {
            return Err(BankError::InsufficientBalance {
                holder: from.to_string(),
                denom: coin.denom.clone(),
                available,
                requested: coin.amount,
            });
        }
        *self.entry(from, &coin.denom) -= coin.amount;
        *self.entry(to, &coin.denom) += coin.amount;
        Ok(())
    }
}

fn validate_amount(coin: &Coin) -> Result<(), BankError> {
    if coin.amount <= Decimal::ZERO {
        return Err(BankError::InvalidAmount(coin.amount));
    }
    Ok(())
}

impl CollateralBank for VaultLedger {
    fn send_from_account_to_vault(&mut self, trader: &TraderAddr, coin: &Coin) -> Result<(), BankError> {
        self.transfer(trader.as_str(), VAULT_HOLDER, coin)?;
        self.total_deposited += coin.amount;
        Ok(())
    }

    fn send_from_vault_to_account(&mut self, trader: &TraderAddr, coin: &Coin) -> Result<(), BankError> {
        self.transfer(VAULT_HOLDER, trader.as_str(), coin)?;
        self.total_withdrawn += coin.amount;
        Ok(())
    }
}

// Mock bank for testing. Records every transfer, never checks balances.
#[derive(Debug, Default)]
pub struct MockBank {
    transfers: Vec<(TransferDirection, TraderAddr, Coin)>,
    failure: Option<BankError>,
}

impl MockBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_with(&mut self, err: BankError) {
        self.failure = Some(err);
    }

    pub fn clear_failure(&mut self) {
        self.failure = None;
    }

    pub fn transfers(&self) -> &[(TransferDirection, TraderAddr, Coin)] {
        &self.transfers
    }

    fn record(&mut self, direction: TransferDirection, trader: &TraderAddr, coin: &Coin) -> Result<(), BankError> {
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        self.transfers.push((direction, trader.clone(), coin.clone()));
        Ok(())
    }
}

impl CollateralBank for MockBank {
    fn send_from_account_to_vault(&mut self, trader: &TraderAddr, coin: &Coin) -> Result<(), BankError> {
        self.record(TransferDirection::ToVault, trader, coin)
    }

    fn send_from_vault_to_account(&mut self, trader: &TraderAddr, coin: &Coin) -> Result<(), BankError> {
        self.record(TransferDirection::FromVault, trader, coin)
    }
}
