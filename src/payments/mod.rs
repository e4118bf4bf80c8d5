pub mod reconciler;
pub mod settlement;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::types::{ApartmentId, FeeId, PaymentRecordId, ResidentId};

pub use reconciler::PaymentReconciler;
pub use settlement::{validate_payment, validate_replacement, DebtStatus};

/// payment request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub payer_id: ResidentId,
    pub fee_id: FeeId,
    /// only consulted when the fee has no apartment of its own
    pub apartment_id: Option<ApartmentId>,
    pub payment_date: NaiveDate,
    pub amount: Money,
    pub notes: Option<String>,
}

impl PaymentRequest {
    pub fn new(payer_id: ResidentId, fee_id: FeeId, payment_date: NaiveDate, amount: Money) -> Self {
        Self {
            payer_id,
            fee_id,
            apartment_id: None,
            payment_date,
            amount,
            notes: None,
        }
    }

    pub fn with_apartment(mut self, apartment_id: ApartmentId) -> Self {
        self.apartment_id = Some(apartment_id);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// money applied against exactly one fee, accumulated in place on repeat payments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: PaymentRecordId,
    pub payer_id: ResidentId,
    pub fee_id: FeeId,
    pub apartment_id: ApartmentId,
    /// date of the latest payment
    pub payment_date: NaiveDate,
    /// total paid so far
    pub amount: Money,
    pub payment_count: u32,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl PaymentRecord {
    /// record with `amount` added, latest date and appended notes
    pub fn accumulate(&self, request: &PaymentRequest, now: DateTime<Utc>) -> PaymentRecord {
        PaymentRecord {
            amount: self.amount + request.amount,
            payment_count: self.payment_count + 1,
            payment_date: request.payment_date.max(self.payment_date),
            notes: join_notes(self.notes.as_deref(), request.notes.as_deref()),
            updated_at: Some(now),
            ..self.clone()
        }
    }
}

fn join_notes(existing: Option<&str>, new: Option<&str>) -> Option<String> {
    match (existing, new) {
        (Some(a), Some(b)) => Some(format!("{a}; {b}")),
        (a, b) => a.or(b).map(str::to_string),
    }
}
