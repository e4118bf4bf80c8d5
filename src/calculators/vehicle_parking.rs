use std::sync::Arc;

use crate::decimal::Money;
use crate::errors::{BillingError, Result};
use crate::store::{PriceSettings, VehicleCounts};
use crate::types::{Apartment, FeeType, VehicleCategory};

use super::{CalculationResult, FeeCalculator, GenerationParams};

/// amount = Σ vehicles × price per category
pub struct VehicleParkingCalculator {
    vehicles: Arc<dyn VehicleCounts>,
    prices: Arc<dyn PriceSettings>,
}

impl VehicleParkingCalculator {
    pub fn new(vehicles: Arc<dyn VehicleCounts>, prices: Arc<dyn PriceSettings>) -> Self {
        Self { vehicles, prices }
    }
}

impl FeeCalculator for VehicleParkingCalculator {
    fn supports(&self, fee_type: FeeType) -> bool {
        fee_type == FeeType::VehicleParking
    }

    fn calculate(
        &self,
        apartment: &Apartment,
        params: &GenerationParams,
    ) -> Result<CalculationResult> {
        let mut total = Money::ZERO;
        let mut lines = Vec::new();

        for category in VehicleCategory::ALL {
            let count = self
                .vehicles
                .count_by_apartment_and_category(apartment.address_number, category)?;
            if count == 0 {
                continue;
            }

            // price only required for categories actually present
            let price = self.prices.price_for_category(category)?;
            let subtotal = price * rust_decimal::Decimal::from(count);
            total += subtotal;
            lines.push(format!("{category}: {count} x {price} = {subtotal}"));
        }

        if total.is_zero() {
            return Err(BillingError::NoBillableBasis {
                apartment_id: apartment.address_number,
                reason: "no vehicles registered".to_string(),
            });
        }

        Ok(CalculationResult {
            amount: total,
            unit_price: None,
            description: format!(
                "{} {} (apartment: {}): {}",
                FeeType::VehicleParking.display_name(),
                params.period,
                apartment.address_number,
                lines.join("; ")
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::Area;
    use crate::store::InMemoryStore;
    use crate::types::BillingPeriod;

    fn setup() -> (Arc<InMemoryStore>, VehicleParkingCalculator) {
        let store = Arc::new(InMemoryStore::new());
        store.add_apartment(Apartment::new(101, Area::from_sqm(60))).unwrap();
        let calculator = VehicleParkingCalculator::new(store.clone(), store.clone());
        (store, calculator)
    }

    fn params() -> GenerationParams {
        GenerationParams::new(BillingPeriod::new(2025, 6).unwrap())
    }

    #[test]
    fn test_sums_categories() {
        let (store, calculator) = setup();
        store.set_price(VehicleCategory::Motorbike, Money::from_major(70_000)).unwrap();
        store.set_price(VehicleCategory::Car, Money::from_major(1_200_000)).unwrap();
        store.set_vehicle_count(101, VehicleCategory::Motorbike, 2).unwrap();
        store.set_vehicle_count(101, VehicleCategory::Car, 1).unwrap();

        let apartment = Apartment::new(101, Area::from_sqm(60));
        let result = calculator.calculate(&apartment, &params()).unwrap();

        assert_eq!(result.amount, Money::from_major(1_340_000));
        assert!(result.unit_price.is_none());
        assert!(result.description.contains("Motorbike: 2 x 70000 = 140000"));
    }

    #[test]
    fn test_no_vehicles_is_no_billable_basis() {
        let (store, calculator) = setup();
        store.set_price(VehicleCategory::Car, Money::from_major(1_200_000)).unwrap();

        let apartment = Apartment::new(101, Area::from_sqm(60));
        let err = calculator.calculate(&apartment, &params()).unwrap_err();

        assert!(matches!(err, BillingError::NoBillableBasis { apartment_id: 101, .. }));
        assert!(err.is_batch_skip());
    }

    #[test]
    fn test_missing_price_only_matters_when_category_present() {
        let (store, calculator) = setup();
        store.set_price(VehicleCategory::Motorbike, Money::from_major(70_000)).unwrap();
        store.set_vehicle_count(101, VehicleCategory::Motorbike, 1).unwrap();

        let apartment = Apartment::new(101, Area::from_sqm(60));
        assert_eq!(
            calculator.calculate(&apartment, &params()).unwrap().amount,
            Money::from_major(70_000)
        );

        store.set_vehicle_count(101, VehicleCategory::Car, 1).unwrap();
        let err = calculator.calculate(&apartment, &params()).unwrap_err();
        assert!(matches!(
            err,
            BillingError::PriceSettingNotFound { category: VehicleCategory::Car }
        ));
    }
}
