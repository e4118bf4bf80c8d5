use std::sync::Arc;

use crate::errors::{BillingError, Result};
use crate::store::{PriceSettings, VehicleCounts};
use crate::types::FeeType;

use super::{FeeCalculator, FloorAreaCalculator, VehicleParkingCalculator};

/// resolves the calculator for a fee type
///
/// Later registrations win, so a deployment can override a built-in strategy
/// by registering its own.
#[derive(Default, Clone)]
pub struct CalculatorRegistry {
    calculators: Vec<Arc<dyn FeeCalculator>>,
}

impl CalculatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// floor area and vehicle parking strategies
    pub fn standard(vehicles: Arc<dyn VehicleCounts>, prices: Arc<dyn PriceSettings>) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(FloorAreaCalculator::new()));
        registry.register(Arc::new(VehicleParkingCalculator::new(vehicles, prices)));
        registry
    }

    pub fn register(&mut self, calculator: Arc<dyn FeeCalculator>) {
        self.calculators.push(calculator);
    }

    pub fn resolve(&self, fee_type: FeeType) -> Result<Arc<dyn FeeCalculator>> {
        self.calculators
            .iter()
            .rev()
            .find(|c| c.supports(fee_type))
            .cloned()
            .ok_or(BillingError::UnsupportedFeeType { fee_type })
    }

    pub fn supports(&self, fee_type: FeeType) -> bool {
        self.calculators.iter().any(|c| c.supports(fee_type))
    }

    pub fn supported_types(&self) -> Vec<FeeType> {
        FeeType::ALL
            .into_iter()
            .filter(|t| self.supports(*t))
            .collect()
    }
}

impl std::fmt::Debug for CalculatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalculatorRegistry")
            .field("supported_types", &self.supported_types())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculators::{CalculationResult, GenerationParams};
    use crate::decimal::{Area, Money};
    use crate::store::InMemoryStore;
    use crate::types::{Apartment, BillingPeriod};

    /// flat charge for any apartment
    struct FlatCleaning;

    impl FeeCalculator for FlatCleaning {
        fn supports(&self, fee_type: FeeType) -> bool {
            fee_type == FeeType::CleaningFee
        }

        fn calculate(&self, _: &Apartment, _: &GenerationParams) -> Result<CalculationResult> {
            Ok(CalculationResult {
                amount: Money::from_major(50_000),
                unit_price: None,
                description: "cleaning".to_string(),
            })
        }
    }

    fn standard() -> CalculatorRegistry {
        let store = Arc::new(InMemoryStore::new());
        CalculatorRegistry::standard(store.clone(), store)
    }

    #[test]
    fn test_resolve_standard_types() {
        let registry = standard();
        assert!(registry.resolve(FeeType::FloorArea).unwrap().supports(FeeType::FloorArea));
        assert!(registry.resolve(FeeType::VehicleParking).is_ok());
        assert_eq!(
            registry.supported_types(),
            vec![FeeType::VehicleParking, FeeType::FloorArea]
        );
    }

    #[test]
    fn test_unsupported_type() {
        let registry = standard();
        let err = registry.resolve(FeeType::WaterFee).err().unwrap();
        assert_eq!(err, BillingError::UnsupportedFeeType { fee_type: FeeType::WaterFee });
    }

    #[test]
    fn test_register_new_type() {
        let mut registry = standard();
        registry.register(Arc::new(FlatCleaning));

        let calculator = registry.resolve(FeeType::CleaningFee).unwrap();
        let apartment = Apartment::new(101, Area::from_sqm(40));
        let params = GenerationParams::new(BillingPeriod::new(2025, 6).unwrap());
        assert_eq!(
            calculator.calculate(&apartment, &params).unwrap().amount,
            Money::from_major(50_000)
        );
    }
}
