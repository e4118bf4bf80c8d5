use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::errors::{BillingError, Result};
use crate::fees::Fee;
use crate::types::{FeeId, SettlementRule};

/// check `amount` against the fee's settlement rule given what is already paid
pub fn validate_payment(fee: &Fee, already_paid: Money, amount: Money) -> Result<()> {
    let rule = fee.fee_type.settlement_rule();
    if rule == SettlementRule::Exact && already_paid.is_positive() && already_paid >= fee.amount {
        return Err(BillingError::FeeAlreadySettled { fee_id: fee.id });
    }
    if !amount.is_positive() {
        return Err(BillingError::invalid(format!(
            "payment amount must be positive, got {amount}"
        )));
    }

    match rule {
        SettlementRule::Exact => {
            if already_paid + amount > fee.amount {
                return Err(BillingError::OverPayment {
                    fee_amount: fee.amount,
                    already_paid,
                    provided: amount,
                });
            }
        }
        SettlementRule::Minimum => {
            // only the first payment has to reach the minimum
            if already_paid.is_zero() && amount < fee.amount {
                return Err(BillingError::UnderPayment {
                    minimum: fee.amount,
                    provided: amount,
                });
            }
        }
    }
    Ok(())
}

/// check an amount that replaces the recorded total
pub fn validate_replacement(fee: &Fee, amount: Money) -> Result<()> {
    validate_payment(fee, Money::ZERO, amount)
}

/// settlement state of one fee
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebtStatus {
    pub fee_id: FeeId,
    pub rule: SettlementRule,
    pub fee_amount: Money,
    pub paid_amount: Money,
    pub is_fully_paid: bool,
    /// never negative
    pub remaining_amount: Money,
}

impl DebtStatus {
    pub fn compute(fee: &Fee, paid_amount: Money) -> Self {
        Self {
            fee_id: fee.id,
            rule: fee.fee_type.settlement_rule(),
            fee_amount: fee.amount,
            paid_amount,
            is_fully_paid: paid_amount >= fee.amount,
            remaining_amount: fee.amount.saturating_sub(paid_amount),
        }
    }
}
