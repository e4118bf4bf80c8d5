use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::types::{ApartmentId, BillingPeriod, FeeId, FeeType, PaymentRecordId, ResidentId};

/// all events emitted by the billing engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BillingEvent {
    // generation events
    FeeGenerated {
        fee_id: FeeId,
        apartment_id: ApartmentId,
        fee_type: FeeType,
        period: BillingPeriod,
        amount: Money,
        timestamp: DateTime<Utc>,
    },
    GenerationSkipped {
        apartment_id: ApartmentId,
        fee_type: FeeType,
        period: BillingPeriod,
        reason: String,
        timestamp: DateTime<Utc>,
    },
    GenerationFailed {
        apartment_id: ApartmentId,
        fee_type: FeeType,
        period: BillingPeriod,
        error: String,
        timestamp: DateTime<Utc>,
    },

    // lifecycle events
    FeeCreated {
        fee_id: FeeId,
        name: String,
        apartment_id: Option<ApartmentId>,
        amount: Money,
        timestamp: DateTime<Utc>,
    },
    FeeUpdated {
        fee_id: FeeId,
        timestamp: DateTime<Utc>,
    },
    FeeDeleted {
        fee_id: FeeId,
        timestamp: DateTime<Utc>,
    },
    FeeDeactivated {
        fee_id: FeeId,
        effective_to: NaiveDate,
        timestamp: DateTime<Utc>,
    },

    // payment events
    PaymentRecorded {
        record_id: PaymentRecordId,
        fee_id: FeeId,
        payer_id: ResidentId,
        amount: Money,
        total_paid: Money,
        timestamp: DateTime<Utc>,
    },
    PaymentUpdated {
        record_id: PaymentRecordId,
        fee_id: FeeId,
        old_amount: Money,
        new_amount: Money,
        timestamp: DateTime<Utc>,
    },

    // scheduler events
    ScheduledJobCompleted {
        job: String,
        created: usize,
        skipped: usize,
        failed: usize,
        timestamp: DateTime<Utc>,
    },
    ScheduledJobFailed {
        job: String,
        error: String,
        timestamp: DateTime<Utc>,
    },
    BillingGapDetected {
        period: BillingPeriod,
        timestamp: DateTime<Utc>,
    },
}

/// event store for collecting events during operations
#[derive(Debug, Default)]
pub struct EventStore {
    events: Vec<BillingEvent>,
}

impl EventStore {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn emit(&mut self, event: BillingEvent) {
        self.events.push(event);
    }

    pub fn take_events(&mut self) -> Vec<BillingEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[BillingEvent] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
