pub mod factory;
pub mod namer;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::types::{ApartmentId, BillingPeriod, FeeId, FeeType};

pub use factory::{FeeBuilder, FeeFactory};
pub use namer::FeeNamer;

/// structured idempotency key for generated fees
///
/// One apartment is billed at most once per key. The label distinguishes
/// differently named configs of the same fee type within a period.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeeKey {
    pub fee_type: FeeType,
    pub period: BillingPeriod,
    pub apartment_id: ApartmentId,
    pub label: Option<String>,
}

impl FeeKey {
    pub fn new(
        fee_type: FeeType,
        period: BillingPeriod,
        apartment_id: ApartmentId,
        label: Option<&str>,
    ) -> Self {
        Self {
            fee_type,
            period,
            apartment_id,
            label: normalize_label(label),
        }
    }
}

/// trims a custom label, blank labels become `None`
pub fn normalize_label(label: Option<&str>) -> Option<String> {
    label
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
}

/// one billable charge instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fee {
    pub id: FeeId,
    /// present on generated fees only
    pub key: Option<FeeKey>,
    pub name: String,
    pub description: Option<String>,
    pub fee_type: FeeType,
    pub amount: Money,
    /// reference price per unit (m², vehicle), informational
    pub unit_price: Option<Money>,
    pub apartment_id: Option<ApartmentId>,
    pub is_recurring: bool,
    pub is_active: bool,
    pub effective_from: Option<NaiveDate>,
    pub effective_to: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// partial update, `None` keeps the existing value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeeOverrides {
    pub name: Option<String>,
    pub description: Option<String>,
    pub fee_type: Option<FeeType>,
    pub amount: Option<Money>,
    pub unit_price: Option<Money>,
    pub apartment_id: Option<ApartmentId>,
    pub is_recurring: Option<bool>,
    pub is_active: Option<bool>,
    pub effective_from: Option<NaiveDate>,
    pub effective_to: Option<NaiveDate>,
}

impl FeeOverrides {
    pub fn is_empty(&self) -> bool {
        *self == FeeOverrides::default()
    }
}

impl Fee {
    /// new fee with `overrides` applied, identity and creation time preserved
    pub fn with_fields(&self, overrides: FeeOverrides, now: DateTime<Utc>) -> Fee {
        Fee {
            id: self.id,
            key: self.key.clone(),
            name: overrides.name.unwrap_or_else(|| self.name.clone()),
            description: overrides.description.or_else(|| self.description.clone()),
            fee_type: overrides.fee_type.unwrap_or(self.fee_type),
            amount: overrides.amount.unwrap_or(self.amount),
            unit_price: overrides.unit_price.or(self.unit_price),
            apartment_id: overrides.apartment_id.or(self.apartment_id),
            is_recurring: overrides.is_recurring.unwrap_or(self.is_recurring),
            is_active: overrides.is_active.unwrap_or(self.is_active),
            effective_from: overrides.effective_from.or(self.effective_from),
            effective_to: overrides.effective_to.or(self.effective_to),
            created_at: self.created_at,
            updated_at: Some(now),
        }
    }

    /// inactive copy ending today
    pub fn deactivated(&self, now: DateTime<Utc>) -> Fee {
        self.with_fields(
            FeeOverrides {
                is_active: Some(false),
                effective_to: Some(now.date_naive()),
                ..FeeOverrides::default()
            },
            now,
        )
    }

    /// still open for billing on `today`
    pub fn is_billable(&self, today: NaiveDate) -> bool {
        self.is_active && self.effective_to.map_or(true, |end| today <= end)
    }

    pub fn period(&self) -> Option<BillingPeriod> {
        self.key.as_ref().map(|k| k.period)
    }
}
