//! Points ledger. All balance changes go through `award` and `redeem`.

use tracing::{info, warn};

use crate::error::{QuizError, Result};

/// Price of one reward video.
pub const REDEMPTION_COST: u32 = 50;

#[derive(Debug, Default)]
pub struct PointsLedger {
  balance: u32,
  redemption_in_flight: bool,
}

impl PointsLedger {
  pub fn new(balance: u32) -> Self {
    Self { balance, redemption_in_flight: false }
  }

  pub fn balance(&self) -> u32 {
    self.balance
  }

  pub fn award(&mut self, amount: u32) -> u32 {
    self.balance = self.balance.saturating_add(amount);
    info!(target: "rewards", amount, balance = self.balance, "Points awarded");
    self.balance
  }

  /// Debit `amount`; refuses rather than going negative.
  pub fn redeem(&mut self, amount: u32) -> Result<u32> {
    if self.balance < amount {
      warn!(target: "rewards", amount, balance = self.balance, "Redeem refused");
      return Err(QuizError::InsufficientPoints { balance: self.balance, cost: amount });
    }
    self.balance -= amount;
    info!(target: "rewards", amount, balance = self.balance, "Points redeemed");
    Ok(self.balance)
  }

  /// Reserve the single redemption slot if `cost` is affordable. No debit happens here.
  pub fn begin_redemption(&mut self, cost: u32) -> Result<()> {
    if self.redemption_in_flight {
      return Err(QuizError::RedemptionInProgress);
    }
    if self.balance < cost {
      return Err(QuizError::InsufficientPoints { balance: self.balance, cost });
    }
    self.redemption_in_flight = true;
    Ok(())
  }

  pub fn end_redemption(&mut self) {
    self.redemption_in_flight = false;
  }

  pub fn redemption_in_flight(&self) -> bool {
    self.redemption_in_flight
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn award_and_redeem() {
    let mut l = PointsLedger::new(40);
    assert_eq!(l.award(10), 50);
    assert_eq!(l.redeem(REDEMPTION_COST), Ok(0));
    assert_eq!(
      l.redeem(1),
      Err(QuizError::InsufficientPoints { balance: 0, cost: 1 })
    );
    assert_eq!(l.balance(), 0);
  }

  #[test]
  fn award_saturates() {
    let mut l = PointsLedger::new(u32::MAX - 5);
    assert_eq!(l.award(10), u32::MAX);
  }

  #[test]
  fn only_one_redemption_slot() {
    let mut l = PointsLedger::new(120);
    l.begin_redemption(REDEMPTION_COST).unwrap();
    assert_eq!(l.begin_redemption(REDEMPTION_COST), Err(QuizError::RedemptionInProgress));
    assert_eq!(l.balance(), 120);
    l.end_redemption();
    assert!(!l.redemption_in_flight());
    assert!(l.begin_redemption(REDEMPTION_COST).is_ok());
  }

  #[test]
  fn begin_redemption_checks_balance() {
    let mut l = PointsLedger::new(49);
    assert_eq!(
      l.begin_redemption(REDEMPTION_COST),
      Err(QuizError::InsufficientPoints { balance: 49, cost: 50 })
    );
    assert!(!l.redemption_in_flight());
  }
}
