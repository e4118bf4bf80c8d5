use std::sync::Arc;

use hourglass_rs::SafeTimeProvider;
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::errors::{BillingError, Result};
use crate::events::{BillingEvent, EventStore};
use crate::fees::{Fee, FeeFactory, FeeOverrides};
use crate::store::{ApartmentDirectory, FeeStore, PaymentStore};
use crate::types::{ApartmentId, FeeId, FeeType};

/// manual fee creation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeCreateRequest {
    pub name: String,
    pub description: Option<String>,
    pub fee_type: FeeType,
    pub amount: Money,
    pub unit_price: Option<Money>,
    pub apartment_id: Option<ApartmentId>,
    pub is_recurring: bool,
}

impl FeeCreateRequest {
    pub fn new(name: impl Into<String>, fee_type: FeeType, amount: Money) -> Self {
        Self {
            name: name.into(),
            description: None,
            fee_type,
            amount,
            unit_price: None,
            apartment_id: None,
            is_recurring: false,
        }
    }

    pub fn for_apartment(mut self, apartment_id: ApartmentId) -> Self {
        self.apartment_id = Some(apartment_id);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(BillingError::invalid("fee name required"));
        }
        if !self.amount.is_positive() {
            return Err(BillingError::invalid(format!(
                "fee amount must be positive, got {}",
                self.amount
            )));
        }
        Ok(())
    }
}

/// manual create, edit, delete and deactivate
///
/// A fee with a recorded payment is frozen: every mutation here fails with
/// `UpdateRestricted` and only reconciliation may still deactivate it.
pub struct FeeLifecycle {
    apartments: Arc<dyn ApartmentDirectory>,
    fees: Arc<dyn FeeStore>,
    payments: Arc<dyn PaymentStore>,
    pub events: EventStore,
}

impl FeeLifecycle {
    pub fn new(
        apartments: Arc<dyn ApartmentDirectory>,
        fees: Arc<dyn FeeStore>,
        payments: Arc<dyn PaymentStore>,
    ) -> Self {
        Self {
            apartments,
            fees,
            payments,
            events: EventStore::new(),
        }
    }

    /// one fee for one apartment
    pub fn create_one_off(
        &mut self,
        request: FeeCreateRequest,
        time_provider: &SafeTimeProvider,
    ) -> Result<Fee> {
        request.validate()?;
        let apartment_id = request
            .apartment_id
            .ok_or_else(|| BillingError::invalid("apartment required for a one-off fee"))?;
        self.require_apartment(apartment_id)?;

        let fee = self.build(&request, request.name.clone(), apartment_id, time_provider)?;
        let fee = self.fees.insert_fee(fee)?;
        self.created(&fee, time_provider);
        Ok(fee)
    }

    /// one voluntary fee per apartment, apartments already holding it are skipped
    pub fn create_voluntary_for_all(
        &mut self,
        request: FeeCreateRequest,
        time_provider: &SafeTimeProvider,
    ) -> Result<Vec<Fee>> {
        if request.fee_type != FeeType::VoluntaryGeneral {
            return Err(BillingError::invalid(format!(
                "only voluntary fees can be created for all apartments, got {}",
                request.fee_type
            )));
        }
        request.validate()?;

        let mut created = Vec::new();
        for apartment in self.apartments.all_apartments()? {
            let name = format!("{} (apartment: {})", request.name.trim(), apartment.address_number);
            if self.fees.find_fee_by_name(&name, apartment.address_number)?.is_some() {
                continue;
            }

            let fee = self.build(&request, name, apartment.address_number, time_provider)?;
            match self.fees.insert_fee(fee) {
                Ok(fee) => {
                    self.created(&fee, time_provider);
                    created.push(fee);
                }
                // created concurrently since the lookup
                Err(BillingError::DuplicateFee { .. }) => continue,
                Err(e) => return Err(e),
            }
        }

        tracing::info!(name = %request.name, created = created.len(), "Lifecycle: voluntary fee issued");
        Ok(created)
    }

    /// partial edit of an unpaid fee
    pub fn update(
        &mut self,
        id: FeeId,
        overrides: FeeOverrides,
        time_provider: &SafeTimeProvider,
    ) -> Result<Fee> {
        let existing = self.require_unpaid(id, "update")?;

        if let Some(amount) = overrides.amount {
            if !amount.is_positive() {
                return Err(BillingError::invalid(format!(
                    "fee amount must be positive, got {amount}"
                )));
            }
        }
        let moves_apartment = overrides
            .apartment_id
            .map_or(false, |id| existing.apartment_id != Some(id));
        let retypes = overrides.fee_type.map_or(false, |t| t != existing.fee_type);

        // a generated fee's key pins its apartment and type
        if existing.key.is_some() && (moves_apartment || retypes) {
            return Err(BillingError::invalid(format!(
                "generated fee '{}' cannot change apartment or fee type",
                existing.name
            )));
        }
        if let Some(apartment_id) = overrides.apartment_id.filter(|_| moves_apartment) {
            self.require_apartment(apartment_id)?;
        }

        let now = time_provider.now();
        let fee = self
            .fees
            .update_unpaid_fee(existing.with_fields(overrides, now), "update")?;
        self.events.emit(BillingEvent::FeeUpdated {
            fee_id: fee.id,
            timestamp: now,
        });
        Ok(fee)
    }

    pub fn delete(&mut self, id: FeeId, time_provider: &SafeTimeProvider) -> Result<()> {
        self.require_unpaid(id, "delete")?;
        self.fees.delete_fee(id)?;

        tracing::info!(fee_id = %id, "Lifecycle: fee deleted");
        self.events.emit(BillingEvent::FeeDeleted {
            fee_id: id,
            timestamp: time_provider.now(),
        });
        Ok(())
    }

    pub fn deactivate(&mut self, id: FeeId, time_provider: &SafeTimeProvider) -> Result<Fee> {
        let existing = self.require_unpaid(id, "deactivate")?;
        let now = time_provider.now();
        let fee = self
            .fees
            .update_unpaid_fee(existing.deactivated(now), "deactivate")?;

        self.events.emit(BillingEvent::FeeDeactivated {
            fee_id: fee.id,
            effective_to: now.date_naive(),
            timestamp: now,
        });
        Ok(fee)
    }

    pub fn find(&self, id: FeeId) -> Result<Fee> {
        self.fees.find_fee(id)?.ok_or(BillingError::FeeNotFound { id })
    }

    pub fn fees_by_apartment(&self, apartment_id: ApartmentId) -> Result<Vec<Fee>> {
        self.fees.fees_by_apartment(apartment_id)
    }

    /// active fees of the apartment with no payment recorded
    pub fn unpaid_fees_by_apartment(&self, apartment_id: ApartmentId) -> Result<Vec<Fee>> {
        let mut unpaid = Vec::new();
        for fee in self.fees.fees_by_apartment(apartment_id)? {
            if fee.is_active && self.payments.payment_for_fee(fee.id)?.is_none() {
                unpaid.push(fee);
            }
        }
        Ok(unpaid)
    }

    fn build(
        &self,
        request: &FeeCreateRequest,
        name: String,
        apartment_id: ApartmentId,
        time_provider: &SafeTimeProvider,
    ) -> Result<Fee> {
        let mut builder = FeeFactory::base(time_provider.now())
            .name(name)
            .fee_type(request.fee_type)
            .amount(request.amount)
            .unit_price(request.unit_price)
            .apartment_id(apartment_id)
            .recurring(request.is_recurring);
        if let Some(description) = &request.description {
            builder = builder.description(description.clone());
        }
        builder.build()
    }

    fn created(&mut self, fee: &Fee, time_provider: &SafeTimeProvider) {
        self.events.emit(BillingEvent::FeeCreated {
            fee_id: fee.id,
            name: fee.name.clone(),
            apartment_id: fee.apartment_id,
            amount: fee.amount,
            timestamp: time_provider.now(),
        });
    }

    fn require_apartment(&self, apartment_id: ApartmentId) -> Result<()> {
        match self.apartments.find_apartment(apartment_id)? {
            Some(_) => Ok(()),
            None => Err(BillingError::ApartmentNotFound { id: apartment_id }),
        }
    }

    fn require_unpaid(&self, id: FeeId, operation: &str) -> Result<Fee> {
        let fee = self.find(id)?;
        if self.payments.payment_for_fee(id)?.is_some() {
            return Err(BillingError::UpdateRestricted {
                fee_id: fee.id,
                name: fee.name,
                operation: operation.to_string(),
            });
        }
        Ok(fee)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculators::{CalculatorRegistry, GenerationParams};
    use crate::decimal::Area;
    use crate::generator::MonthlyFeeGenerator;
    use crate::payments::{PaymentReconciler, PaymentRequest};
    use crate::store::InMemoryStore;
    use crate::types::{Apartment, BillingPeriod, Resident};
    use chrono::{NaiveDate, TimeZone, Utc};
    use hourglass_rs::TimeSource;

    fn setup() -> (Arc<InMemoryStore>, FeeLifecycle, SafeTimeProvider) {
        let store = Arc::new(InMemoryStore::new());
        for id in [101, 102, 201] {
            store.add_apartment(Apartment::new(id, Area::from_sqm(65))).unwrap();
        }
        let lifecycle = FeeLifecycle::new(store.clone(), store.clone(), store.clone());
        let time = SafeTimeProvider::new(TimeSource::Test(
            Utc.with_ymd_and_hms(2025, 6, 15, 10, 0, 0).unwrap(),
        ));
        (store, lifecycle, time)
    }

    fn pay(store: &Arc<InMemoryStore>, fee: &Fee, amount: Money, time: &SafeTimeProvider) {
        store
            .add_resident(Resident {
                id: 1,
                name: "Tran Thi B".to_string(),
                apartment_id: fee.apartment_id,
            })
            .unwrap();
        let mut reconciler =
            PaymentReconciler::new(store.clone(), store.clone(), store.clone(), store.clone());
        reconciler
            .create_payment(
                PaymentRequest::new(1, fee.id, NaiveDate::from_ymd_opt(2025, 6, 15).unwrap(), amount),
                time,
            )
            .unwrap();
    }

    #[test]
    fn test_create_one_off() {
        let (_, mut lifecycle, time) = setup();
        let request = FeeCreateRequest::new("Elevator repair", FeeType::MandatoryGeneral, Money::from_major(300_000))
            .for_apartment(101)
            .with_description("June repair share");

        let fee = lifecycle.create_one_off(request.clone(), &time).unwrap();
        assert!(fee.is_active);
        assert!(!fee.is_recurring);
        assert_eq!(fee.effective_from, NaiveDate::from_ymd_opt(2025, 6, 15));
        assert_eq!(fee.description.as_deref(), Some("June repair share"));

        let duplicate = lifecycle.create_one_off(request, &time).unwrap_err();
        assert!(matches!(duplicate, BillingError::DuplicateFee { apartment_id: 101, .. }));

        let missing = FeeCreateRequest::new("Repair", FeeType::MandatoryGeneral, Money::from_major(1))
            .for_apartment(999);
        assert_eq!(
            lifecycle.create_one_off(missing, &time).unwrap_err(),
            BillingError::ApartmentNotFound { id: 999 }
        );
    }

    #[test]
    fn test_create_voluntary_for_all() {
        let (store, mut lifecycle, time) = setup();
        let request = FeeCreateRequest::new("Flood relief", FeeType::VoluntaryGeneral, Money::from_major(100_000));

        let created = lifecycle.create_voluntary_for_all(request.clone(), &time).unwrap();
        assert_eq!(created.len(), 3);
        assert_eq!(created[0].name, "Flood relief (apartment: 101)");

        let again = lifecycle.create_voluntary_for_all(request, &time).unwrap();
        assert!(again.is_empty());
        assert_eq!(store.fee_count().unwrap(), 3);

        let wrong_type = FeeCreateRequest::new("Cleaning", FeeType::CleaningFee, Money::from_major(1));
        assert!(matches!(
            lifecycle.create_voluntary_for_all(wrong_type, &time),
            Err(BillingError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_update_unpaid_fee() {
        let (_, mut lifecycle, time) = setup();
        let fee = lifecycle
            .create_one_off(
                FeeCreateRequest::new("Water fee", FeeType::WaterFee, Money::from_major(120_000)).for_apartment(101),
                &time,
            )
            .unwrap();

        let updated = lifecycle
            .update(
                fee.id,
                FeeOverrides {
                    amount: Some(Money::from_major(130_000)),
                    ..FeeOverrides::default()
                },
                &time,
            )
            .unwrap();
        assert_eq!(updated.amount, Money::from_major(130_000));
        assert_eq!(updated.name, "Water fee");
        assert_eq!(lifecycle.find(fee.id).unwrap().amount, Money::from_major(130_000));

        let bad_apartment = FeeOverrides {
            apartment_id: Some(999),
            ..FeeOverrides::default()
        };
        assert_eq!(
            lifecycle.update(fee.id, bad_apartment, &time).unwrap_err(),
            BillingError::ApartmentNotFound { id: 999 }
        );
    }

    #[test]
    fn test_paid_fee_is_frozen() {
        let (store, mut lifecycle, time) = setup();
        let fee = lifecycle
            .create_one_off(
                FeeCreateRequest::new("Water fee", FeeType::WaterFee, Money::from_major(120_000)).for_apartment(101),
                &time,
            )
            .unwrap();
        pay(&store, &fee, Money::from_major(20_000), &time);

        let update = lifecycle.update(fee.id, FeeOverrides::default(), &time).unwrap_err();
        assert!(matches!(update, BillingError::UpdateRestricted { ref operation, .. } if operation == "update"));
        assert!(matches!(
            lifecycle.delete(fee.id, &time),
            Err(BillingError::UpdateRestricted { .. })
        ));
        assert!(matches!(
            lifecycle.deactivate(fee.id, &time),
            Err(BillingError::UpdateRestricted { .. })
        ));
        assert!(lifecycle.find(fee.id).unwrap().is_active);
        assert!(lifecycle.unpaid_fees_by_apartment(101).unwrap().is_empty());

        // a write that read the fee before the payment landed is still refused
        let stale = fee.deactivated(time.now());
        assert!(matches!(
            store.update_unpaid_fee(stale, "deactivate"),
            Err(BillingError::UpdateRestricted { ref operation, .. }) if operation == "deactivate"
        ));
        assert!(matches!(
            store.delete_fee(fee.id),
            Err(BillingError::UpdateRestricted { ref operation, .. }) if operation == "delete"
        ));
        assert!(store.find_fee(fee.id).unwrap().is_some());
    }

    #[test]
    fn test_delete_and_deactivate_unpaid() {
        let (_, mut lifecycle, time) = setup();
        let keep = lifecycle
            .create_one_off(
                FeeCreateRequest::new("Internet", FeeType::InternetFee, Money::from_major(200_000)).for_apartment(102),
                &time,
            )
            .unwrap();
        let deposit = lifecycle
            .create_one_off(
                FeeCreateRequest::new("Deposit", FeeType::DepositFee, Money::from_major(500_000)).for_apartment(102),
                &time,
            )
            .unwrap();

        lifecycle.delete(deposit.id, &time).unwrap();
        assert_eq!(lifecycle.find(deposit.id).unwrap_err(), BillingError::FeeNotFound { id: deposit.id });

        let inactive = lifecycle.deactivate(keep.id, &time).unwrap();
        assert!(!inactive.is_active);
        assert_eq!(inactive.effective_to, NaiveDate::from_ymd_opt(2025, 6, 15));
        assert_eq!(lifecycle.fees_by_apartment(102).unwrap().len(), 1);
        assert!(lifecycle.unpaid_fees_by_apartment(102).unwrap().is_empty());
    }

    #[test]
    fn test_generated_fee_keeps_apartment_and_type() {
        let (store, mut lifecycle, time) = setup();
        let registry = CalculatorRegistry::standard(store.clone(), store.clone());
        let mut generator = MonthlyFeeGenerator::new(store.clone(), store.clone(), registry);
        let june = BillingPeriod::new(2025, 6).unwrap();
        let params = GenerationParams::new(june).with_unit_price(Money::from_major(7_000));

        let first = generator.generate_for_all(FeeType::FloorArea, &params, &time).unwrap();
        assert_eq!(first.created_count(), 3);
        let fee = first.created().find(|f| f.apartment_id == Some(101)).cloned().unwrap();

        let moved = FeeOverrides {
            apartment_id: Some(102),
            ..FeeOverrides::default()
        };
        assert!(matches!(
            lifecycle.update(fee.id, moved, &time),
            Err(BillingError::InvalidParameter { .. })
        ));
        let retyped = FeeOverrides {
            fee_type: Some(FeeType::ManagementFee),
            ..FeeOverrides::default()
        };
        assert!(matches!(
            lifecycle.update(fee.id, retyped, &time),
            Err(BillingError::InvalidParameter { .. })
        ));

        // same apartment and other fields are still editable
        let adjusted = lifecycle
            .update(
                fee.id,
                FeeOverrides {
                    apartment_id: Some(101),
                    amount: Some(Money::from_major(450_000)),
                    ..FeeOverrides::default()
                },
                &time,
            )
            .unwrap();
        assert_eq!(adjusted.apartment_id, Some(101));
        assert_eq!(adjusted.key, fee.key);

        // rerun still sees every apartment as billed exactly once
        let rerun = generator.generate_for_all(FeeType::FloorArea, &params, &time).unwrap();
        assert_eq!(rerun.created_count(), 0);
        assert_eq!(rerun.skipped_count(), 3);
        for apartment_id in [101, 102, 201] {
            let in_june = store
                .fees_by_apartment(apartment_id)
                .unwrap()
                .into_iter()
                .filter(|f| f.period() == Some(june))
                .count();
            assert_eq!(in_june, 1);
        }
    }
}
