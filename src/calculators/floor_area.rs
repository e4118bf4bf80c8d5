use crate::decimal::Money;
use crate::errors::{BillingError, Result};
use crate::fees::normalize_label;
use crate::types::{Apartment, FeeType};

use super::{CalculationResult, FeeCalculator, GenerationParams};

/// amount = unit price × floor area
#[derive(Debug, Clone, Copy, Default)]
pub struct FloorAreaCalculator;

impl FloorAreaCalculator {
    pub fn new() -> Self {
        Self
    }
}

impl FeeCalculator for FloorAreaCalculator {
    fn supports(&self, fee_type: FeeType) -> bool {
        fee_type == FeeType::FloorArea
    }

    fn calculate(
        &self,
        apartment: &Apartment,
        params: &GenerationParams,
    ) -> Result<CalculationResult> {
        let unit_price = params
            .unit_price
            .filter(Money::is_positive)
            .ok_or_else(|| {
                BillingError::invalid(format!(
                    "floor area fee for apartment {} needs a positive unit price",
                    apartment.address_number
                ))
            })?;

        let amount = unit_price * apartment.area;
        let head = normalize_label(params.label.as_deref())
            .unwrap_or_else(|| FeeType::FloorArea.display_name().to_string());

        Ok(CalculationResult {
            amount,
            unit_price: Some(unit_price),
            description: format!(
                "{head} {} (apartment: {}): {} x {unit_price} = {amount}",
                params.period, apartment.address_number, apartment.area
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::Area;
    use crate::types::BillingPeriod;
    use rust_decimal_macros::dec;

    fn params() -> GenerationParams {
        GenerationParams::new(BillingPeriod::new(2025, 6).unwrap())
    }

    #[test]
    fn test_area_times_unit_price_is_exact() {
        let calculator = FloorAreaCalculator::new();
        let apartment = Apartment::new(101, Area::from_decimal(dec!(75.5)));
        let params = params().with_unit_price(Money::from_major(15_000));

        for _ in 0..3 {
            let result = calculator.calculate(&apartment, &params).unwrap();
            assert_eq!(result.amount, Money::from_decimal(dec!(1132500)));
            assert_eq!(result.unit_price, Some(Money::from_major(15_000)));
        }
    }

    #[test]
    fn test_missing_or_zero_unit_price() {
        let calculator = FloorAreaCalculator::new();
        let apartment = Apartment::new(101, Area::from_sqm(60));

        let err = calculator.calculate(&apartment, &params()).unwrap_err();
        assert!(matches!(err, BillingError::InvalidParameter { .. }));

        let zero = params().with_unit_price(Money::ZERO);
        assert!(calculator.calculate(&apartment, &zero).is_err());
    }

    #[test]
    fn test_description_uses_label() {
        let calculator = FloorAreaCalculator::new();
        let apartment = Apartment::new(202, Area::from_sqm(50));
        let params = params()
            .with_unit_price(Money::from_major(7_000))
            .with_label("Management fee");

        let result = calculator.calculate(&apartment, &params).unwrap();
        assert!(result.description.starts_with("Management fee 2025-06 (apartment: 202)"));
        assert!(result.description.ends_with("= 350000"));
    }

    #[test]
    fn test_supports_only_floor_area() {
        let calculator = FloorAreaCalculator::new();
        assert!(calculator.supports(FeeType::FloorArea));
        assert!(!calculator.supports(FeeType::VehicleParking));
        assert!(!calculator.supports(FeeType::ManagementFee));
    }
}
