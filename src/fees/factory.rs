use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::decimal::Money;
use crate::errors::{BillingError, Result};
use crate::types::{Apartment, ApartmentId, FeeId, FeeType};

use super::{Fee, FeeKey};

/// entry points for building fees with consistent defaults
///
/// No business validation happens here; the generator and the lifecycle
/// service validate before persisting.
pub struct FeeFactory;

impl FeeFactory {
    /// active, one-off, effective from today
    pub fn base(now: DateTime<Utc>) -> FeeBuilder {
        FeeBuilder::new(now)
    }

    /// base defaults, recurring
    pub fn monthly(now: DateTime<Utc>) -> FeeBuilder {
        Self::base(now).recurring(true)
    }

    /// monthly fee already attached to an apartment
    pub fn monthly_for(apartment: &Apartment, now: DateTime<Utc>) -> FeeBuilder {
        Self::monthly(now).apartment_id(apartment.address_number)
    }

    /// builder pre-populated with every field of `fee`
    pub fn from(fee: &Fee) -> FeeBuilder {
        FeeBuilder {
            id: Some(fee.id),
            key: fee.key.clone(),
            name: Some(fee.name.clone()),
            description: fee.description.clone(),
            fee_type: Some(fee.fee_type),
            amount: Some(fee.amount),
            unit_price: fee.unit_price,
            apartment_id: fee.apartment_id,
            is_recurring: fee.is_recurring,
            is_active: fee.is_active,
            effective_from: fee.effective_from,
            effective_to: fee.effective_to,
            created_at: fee.created_at,
            updated_at: fee.updated_at,
        }
    }
}

/// builder for fees
#[derive(Debug, Clone)]
pub struct FeeBuilder {
    id: Option<FeeId>,
    key: Option<FeeKey>,
    name: Option<String>,
    description: Option<String>,
    fee_type: Option<FeeType>,
    amount: Option<Money>,
    unit_price: Option<Money>,
    apartment_id: Option<ApartmentId>,
    is_recurring: bool,
    is_active: bool,
    effective_from: Option<NaiveDate>,
    effective_to: Option<NaiveDate>,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl FeeBuilder {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            id: None,
            key: None,
            name: None,
            description: None,
            fee_type: None,
            amount: None,
            unit_price: None,
            apartment_id: None,
            is_recurring: false,
            is_active: true,
            effective_from: Some(now.date_naive()),
            effective_to: None,
            created_at: now,
            updated_at: None,
        }
    }

    pub fn key(mut self, key: FeeKey) -> Self {
        self.apartment_id = Some(key.apartment_id);
        self.fee_type = Some(key.fee_type);
        self.key = Some(key);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn fee_type(mut self, fee_type: FeeType) -> Self {
        self.fee_type = Some(fee_type);
        self
    }

    pub fn amount(mut self, amount: Money) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn unit_price(mut self, unit_price: Option<Money>) -> Self {
        self.unit_price = unit_price;
        self
    }

    pub fn apartment_id(mut self, apartment_id: ApartmentId) -> Self {
        self.apartment_id = Some(apartment_id);
        self
    }

    pub fn recurring(mut self, recurring: bool) -> Self {
        self.is_recurring = recurring;
        self
    }

    pub fn active(mut self, active: bool) -> Self {
        self.is_active = active;
        self
    }

    pub fn effective_from(mut self, date: NaiveDate) -> Self {
        self.effective_from = Some(date);
        self
    }

    pub fn effective_to(mut self, date: NaiveDate) -> Self {
        self.effective_to = Some(date);
        self
    }

    pub fn updated_at(mut self, at: DateTime<Utc>) -> Self {
        self.updated_at = Some(at);
        self
    }

    pub fn build(self) -> Result<Fee> {
        let name = self.name.ok_or_else(|| BillingError::invalid("fee name required"))?;
        let fee_type = self
            .fee_type
            .ok_or_else(|| BillingError::invalid("fee type required"))?;
        let amount = self
            .amount
            .ok_or_else(|| BillingError::invalid("fee amount required"))?;

        Ok(Fee {
            id: self.id.unwrap_or_else(Uuid::new_v4),
            key: self.key,
            name,
            description: self.description,
            fee_type,
            amount,
            unit_price: self.unit_price,
            apartment_id: self.apartment_id,
            is_recurring: self.is_recurring,
            is_active: self.is_active,
            effective_from: self.effective_from,
            effective_to: self.effective_to,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::Area;
    use crate::types::BillingPeriod;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 1, 0, 0).unwrap()
    }

    #[test]
    fn test_base_defaults() {
        let fee = FeeFactory::base(now())
            .name("Deposit")
            .fee_type(FeeType::DepositFee)
            .amount(Money::from_major(500_000))
            .build()
            .unwrap();

        assert!(fee.is_active);
        assert!(!fee.is_recurring);
        assert_eq!(fee.effective_from, NaiveDate::from_ymd_opt(2025, 6, 1));
        assert_eq!(fee.created_at, now());
        assert!(fee.key.is_none());
    }

    #[test]
    fn test_monthly_for_apartment() {
        let apartment = Apartment::new(101, Area::from_sqm(80));
        let period = BillingPeriod::new(2025, 6).unwrap();

        let fee = FeeFactory::monthly_for(&apartment, now())
            .key(FeeKey::new(FeeType::FloorArea, period, 101, None))
            .name("Floor area fee 2025-06 (apartment: 101)")
            .amount(Money::from_major(1_200_000))
            .build()
            .unwrap();

        assert!(fee.is_recurring);
        assert!(fee.is_active);
        assert_eq!(fee.apartment_id, Some(101));
        assert_eq!(fee.fee_type, FeeType::FloorArea);
        assert_eq!(fee.period(), Some(period));
    }

    #[test]
    fn test_missing_required_fields() {
        let err = FeeFactory::base(now())
            .fee_type(FeeType::WaterFee)
            .amount(Money::from_major(1))
            .build()
            .unwrap_err();
        assert!(matches!(err, BillingError::InvalidParameter { .. }));

        assert!(FeeFactory::base(now()).name("x").fee_type(FeeType::WaterFee).build().is_err());
    }

    #[test]
    fn test_from_copies_every_field() {
        let original = FeeFactory::monthly(now())
            .name("Water fee")
            .description("June")
            .fee_type(FeeType::WaterFee)
            .amount(Money::from_major(120_000))
            .unit_price(Some(Money::from_major(12_000)))
            .apartment_id(202)
            .effective_to(NaiveDate::from_ymd_opt(2025, 6, 30).unwrap())
            .build()
            .unwrap();

        let copy = FeeFactory::from(&original).build().unwrap();
        assert_eq!(copy, original);

        let later = Utc.with_ymd_and_hms(2025, 6, 5, 0, 0, 0).unwrap();
        let edited = FeeFactory::from(&original)
            .amount(Money::from_major(130_000))
            .updated_at(later)
            .build()
            .unwrap();
        assert_eq!(edited.id, original.id);
        assert_eq!(edited.unit_price, original.unit_price);
        assert_eq!(edited.amount, Money::from_major(130_000));
        assert_eq!(edited.updated_at, Some(later));
    }
}
