pub mod floor_area;
pub mod registry;
pub mod vehicle_parking;

use serde::{Deserialize, Serialize};

use crate::config::FeeConfig;
use crate::decimal::Money;
use crate::errors::Result;
use crate::types::{Apartment, BillingPeriod, FeeType};

pub use floor_area::FloorAreaCalculator;
pub use registry::CalculatorRegistry;
pub use vehicle_parking::VehicleParkingCalculator;

/// inputs shared by every apartment in one generation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub period: BillingPeriod,
    /// price per unit for area-based fees
    pub unit_price: Option<Money>,
    /// custom name head, honoured for per-area fees
    pub label: Option<String>,
}

impl GenerationParams {
    pub fn new(period: BillingPeriod) -> Self {
        Self {
            period,
            unit_price: None,
            label: None,
        }
    }

    pub fn with_unit_price(mut self, unit_price: Money) -> Self {
        self.unit_price = Some(unit_price);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// params for one run of a config
    pub fn from_config(config: &FeeConfig, period: BillingPeriod) -> Self {
        Self::new(period)
            .with_unit_price(config.unit_price)
            .with_label(config.fee_name.clone())
    }
}

/// calculated charge for one apartment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationResult {
    pub amount: Money,
    pub unit_price: Option<Money>,
    pub description: String,
}

/// strategy computing one fee type's monthly charge
///
/// Implementations are stateless apart from read-only lookups and must not
/// persist anything.
pub trait FeeCalculator: Send + Sync {
    fn supports(&self, fee_type: FeeType) -> bool;

    /// `NoBillableBasis` when the apartment has nothing to bill for
    fn calculate(&self, apartment: &Apartment, params: &GenerationParams)
        -> Result<CalculationResult>;
}
