use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::decimal::Area;
use crate::errors::BillingError;

/// apartment address number, the apartment's identity
pub type ApartmentId = i64;

pub type ResidentId = i64;

pub type FeeId = Uuid;

pub type PaymentRecordId = Uuid;

pub type FeeConfigId = Uuid;

/// fee type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeeType {
    // general purpose
    MandatoryGeneral,
    VoluntaryGeneral,

    // monthly recurring
    VehicleParking,
    FloorArea,
    ManagementFee,
    MaintenanceFee,
    SecurityFee,
    CleaningFee,

    // utilities
    WaterFee,
    ElectricityFee,
    InternetFee,

    // special
    PenaltyFee,
    DepositFee,
    RegistrationFee,
}

/// how payments settle a fee
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettlementRule {
    /// total paid may never exceed the fee amount
    Exact,
    /// first payment must reach the fee amount, no upper bound afterwards
    Minimum,
}

impl FeeType {
    pub const ALL: [FeeType; 14] = [
        FeeType::MandatoryGeneral,
        FeeType::VoluntaryGeneral,
        FeeType::VehicleParking,
        FeeType::FloorArea,
        FeeType::ManagementFee,
        FeeType::MaintenanceFee,
        FeeType::SecurityFee,
        FeeType::CleaningFee,
        FeeType::WaterFee,
        FeeType::ElectricityFee,
        FeeType::InternetFee,
        FeeType::PenaltyFee,
        FeeType::DepositFee,
        FeeType::RegistrationFee,
    ];

    pub fn settlement_rule(&self) -> SettlementRule {
        match self {
            FeeType::VoluntaryGeneral => SettlementRule::Minimum,
            _ => SettlementRule::Exact,
        }
    }

    pub fn is_voluntary(&self) -> bool {
        self.settlement_rule() == SettlementRule::Minimum
    }

    /// priced per unit (vehicle, square metre)
    pub fn is_per_unit(&self) -> bool {
        matches!(self, FeeType::VehicleParking | FeeType::FloorArea)
    }

    pub fn unit_label(&self) -> &'static str {
        match self {
            FeeType::VehicleParking => "vehicle",
            FeeType::FloorArea => "m²",
            _ => "unit",
        }
    }

    /// default human-readable name used in generated fee names
    pub fn display_name(&self) -> &'static str {
        match self {
            FeeType::MandatoryGeneral => "Mandatory fee",
            FeeType::VoluntaryGeneral => "Voluntary contribution",
            FeeType::VehicleParking => "Vehicle parking fee",
            FeeType::FloorArea => "Floor area fee",
            FeeType::ManagementFee => "Management fee",
            FeeType::MaintenanceFee => "Maintenance fee",
            FeeType::SecurityFee => "Security fee",
            FeeType::CleaningFee => "Cleaning fee",
            FeeType::WaterFee => "Water fee",
            FeeType::ElectricityFee => "Electricity fee",
            FeeType::InternetFee => "Internet fee",
            FeeType::PenaltyFee => "Penalty fee",
            FeeType::DepositFee => "Deposit fee",
            FeeType::RegistrationFee => "Registration fee",
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            FeeType::MandatoryGeneral => "MANDATORY_GENERAL",
            FeeType::VoluntaryGeneral => "VOLUNTARY_GENERAL",
            FeeType::VehicleParking => "VEHICLE_PARKING",
            FeeType::FloorArea => "FLOOR_AREA",
            FeeType::ManagementFee => "MANAGEMENT_FEE",
            FeeType::MaintenanceFee => "MAINTENANCE_FEE",
            FeeType::SecurityFee => "SECURITY_FEE",
            FeeType::CleaningFee => "CLEANING_FEE",
            FeeType::WaterFee => "WATER_FEE",
            FeeType::ElectricityFee => "ELECTRICITY_FEE",
            FeeType::InternetFee => "INTERNET_FEE",
            FeeType::PenaltyFee => "PENALTY_FEE",
            FeeType::DepositFee => "DEPOSIT_FEE",
            FeeType::RegistrationFee => "REGISTRATION_FEE",
        }
    }
}

impl fmt::Display for FeeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for FeeType {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FeeType::ALL
            .iter()
            .copied()
            .find(|t| t.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| BillingError::invalid(format!("unknown fee type: {s}")))
    }
}

/// tracked vehicle categories for parking fees
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VehicleCategory {
    Motorbike,
    Car,
}

impl VehicleCategory {
    pub const ALL: [VehicleCategory; 2] = [VehicleCategory::Motorbike, VehicleCategory::Car];
}

impl fmt::Display for VehicleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VehicleCategory::Motorbike => f.write_str("Motorbike"),
            VehicleCategory::Car => f.write_str("Car"),
        }
    }
}

/// calendar month a recurring fee applies to
///
/// Years are limited to what the `YYYY-MM` form can carry, so every period
/// and its successor map onto real calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BillingPeriod {
    first: NaiveDate,
}

impl BillingPeriod {
    pub const MIN_YEAR: i32 = 1;
    pub const MAX_YEAR: i32 = 9999;

    pub fn new(year: i32, month: u32) -> Result<Self, BillingError> {
        if !(1..=12).contains(&month) {
            return Err(BillingError::invalid(format!(
                "billing month out of range: {month}"
            )));
        }
        if !(Self::MIN_YEAR..=Self::MAX_YEAR).contains(&year) {
            return Err(BillingError::invalid(format!(
                "billing year out of range: {year}"
            )));
        }
        let first = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| BillingError::invalid(format!("no calendar date for {year}-{month:02}")))?;
        Ok(Self { first })
    }

    /// the period a given date falls in
    pub fn containing(date: NaiveDate) -> Result<Self, BillingError> {
        Self::new(date.year(), date.month())
    }

    pub fn year(&self) -> i32 {
        self.first.year()
    }

    pub fn month(&self) -> u32 {
        self.first.month()
    }

    pub fn first_day(&self) -> NaiveDate {
        self.first
    }

    /// following month, fails past December of the last representable year
    pub fn next(&self) -> Result<Self, BillingError> {
        if self.month() == 12 {
            Self::new(self.year() + 1, 1)
        } else {
            Self::new(self.year(), self.month() + 1)
        }
    }

    pub fn last_day(&self) -> NaiveDate {
        let mut last = self.first;
        while let Some(day) = last.succ_opt().filter(|d| d.month() == self.first.month()) {
            last = day;
        }
        last
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year() && date.month() == self.month()
    }
}

impl fmt::Display for BillingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year(), self.month())
    }
}

impl FromStr for BillingPeriod {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || BillingError::invalid(format!("billing period must be YYYY-MM: {s}"));
        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(invalid());
        }
        let year = year.parse::<i32>().map_err(|_| invalid())?;
        let month = month.parse::<u32>().map_err(|_| invalid())?;
        BillingPeriod::new(year, month)
    }
}

impl TryFrom<String> for BillingPeriod {
    type Error = BillingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BillingPeriod> for String {
    fn from(period: BillingPeriod) -> Self {
        period.to_string()
    }
}

/// apartment occupancy status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApartmentStatus {
    Occupied,
    Vacant,
    Business,
}

/// apartment as seen by billing: identity, floor area, status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Apartment {
    pub address_number: ApartmentId,
    pub area: Area,
    pub status: ApartmentStatus,
    pub owner_id: Option<ResidentId>,
}

impl Apartment {
    pub fn new(address_number: ApartmentId, area: Area) -> Self {
        Self {
            address_number,
            area,
            status: ApartmentStatus::Occupied,
            owner_id: None,
        }
    }
}

/// resident acting as payer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resident {
    pub id: ResidentId,
    pub name: String,
    pub apartment_id: Option<ApartmentId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_billing_period_parse_and_display() {
        let period: BillingPeriod = "2025-06".parse().unwrap();
        assert_eq!(period.year(), 2025);
        assert_eq!(period.month(), 6);
        assert_eq!(period.to_string(), "2025-06");

        assert!("2025-13".parse::<BillingPeriod>().is_err());
        assert!("2025-6".parse::<BillingPeriod>().is_err());
        assert!("June 2025".parse::<BillingPeriod>().is_err());
    }

    #[test]
    fn test_billing_period_bounds() {
        let period = BillingPeriod::new(2024, 2).unwrap();
        assert_eq!(period.first_day(), NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(period.last_day(), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());

        let december = BillingPeriod::new(2024, 12).unwrap();
        assert_eq!(december.next().unwrap(), BillingPeriod::new(2025, 1).unwrap());
        assert_eq!(december.last_day(), NaiveDate::from_ymd_opt(2024, 12, 31).unwrap());
    }

    #[test]
    fn test_billing_period_rejects_unrepresentable_years() {
        assert!(BillingPeriod::new(0, 6).is_err());
        assert!(BillingPeriod::new(10_000, 1).is_err());
        assert!(BillingPeriod::new(i32::MAX, 1).is_err());
        assert!("0000-01".parse::<BillingPeriod>().is_err());

        let last = BillingPeriod::new(9999, 12).unwrap();
        assert_eq!(last.last_day(), NaiveDate::from_ymd_opt(9999, 12, 31).unwrap());
        assert!(last.next().is_err());

        let far = NaiveDate::from_ymd_opt(12_000, 3, 1).unwrap();
        assert!(BillingPeriod::containing(far).is_err());
        assert_eq!(
            BillingPeriod::containing(NaiveDate::from_ymd_opt(2025, 6, 17).unwrap()).unwrap(),
            BillingPeriod::new(2025, 6).unwrap()
        );
    }

    #[test]
    fn test_billing_period_serde_as_string() {
        let period = BillingPeriod::new(2025, 6).unwrap();
        let json = serde_json::to_string(&period).unwrap();
        assert_eq!(json, "\"2025-06\"");

        let back: BillingPeriod = serde_json::from_str(&json).unwrap();
        assert_eq!(back, period);
    }

    #[test]
    fn test_fee_type_settlement_rules() {
        assert_eq!(FeeType::VoluntaryGeneral.settlement_rule(), SettlementRule::Minimum);
        assert_eq!(FeeType::VehicleParking.settlement_rule(), SettlementRule::Exact);
        assert_eq!(FeeType::FloorArea.settlement_rule(), SettlementRule::Exact);
        assert!(FeeType::FloorArea.is_per_unit());
        assert!(!FeeType::WaterFee.is_per_unit());
    }

    #[test]
    fn test_fee_type_codes_round_trip() {
        for fee_type in FeeType::ALL {
            assert_eq!(fee_type.code().parse::<FeeType>().unwrap(), fee_type);
        }
        assert_eq!(
            serde_json::to_string(&FeeType::VehicleParking).unwrap(),
            "\"VEHICLE_PARKING\""
        );
    }
}
