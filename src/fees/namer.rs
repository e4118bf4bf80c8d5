use crate::types::{Apartment, BillingPeriod, FeeType};

use super::{normalize_label, FeeKey};

/// deterministic fee names and keys for generated fees
#[derive(Debug, Clone, Copy, Default)]
pub struct FeeNamer;

impl FeeNamer {
    pub fn new() -> Self {
        Self
    }

    /// human-readable name, e.g. `Vehicle parking fee 2025-06 (apartment: 101)`
    ///
    /// Only per-area fees honour a custom label; other types always use their
    /// type name so relabelling cannot create a second charge.
    pub fn build(
        &self,
        fee_type: FeeType,
        period: BillingPeriod,
        label: Option<&str>,
        apartment: &Apartment,
    ) -> String {
        let head = match (fee_type, normalize_label(label)) {
            (FeeType::FloorArea, Some(custom)) => custom,
            _ => fee_type.display_name().to_string(),
        };
        format!("{head} {period} (apartment: {})", apartment.address_number)
    }

    /// structured duplicate-detection key matching `build`
    pub fn key(
        &self,
        fee_type: FeeType,
        period: BillingPeriod,
        label: Option<&str>,
        apartment: &Apartment,
    ) -> FeeKey {
        let label = match fee_type {
            FeeType::FloorArea => label,
            _ => None,
        };
        FeeKey::new(fee_type, period, apartment.address_number, label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::Area;

    #[test]
    fn test_name_is_deterministic() {
        let namer = FeeNamer::new();
        let apartment = Apartment::new(101, Area::from_sqm(70));
        let period = BillingPeriod::new(2025, 6).unwrap();

        let first = namer.build(FeeType::FloorArea, period, Some("Service fee"), &apartment);
        let second = namer.build(FeeType::FloorArea, period, Some("Service fee"), &apartment);
        assert_eq!(first.as_bytes(), second.as_bytes());
        assert_eq!(first, "Service fee 2025-06 (apartment: 101)");
    }

    #[test]
    fn test_default_names() {
        let namer = FeeNamer::new();
        let apartment = Apartment::new(305, Area::from_sqm(70));
        let period = BillingPeriod::new(2025, 1).unwrap();

        assert_eq!(
            namer.build(FeeType::VehicleParking, period, None, &apartment),
            "Vehicle parking fee 2025-01 (apartment: 305)"
        );
        assert_eq!(
            namer.build(FeeType::FloorArea, period, Some("  "), &apartment),
            "Floor area fee 2025-01 (apartment: 305)"
        );
        // label ignored outside per-area fees
        assert_eq!(
            namer.build(FeeType::VehicleParking, period, Some("Parking"), &apartment),
            "Vehicle parking fee 2025-01 (apartment: 305)"
        );
    }

    #[test]
    fn test_key_tracks_label_only_for_floor_area() {
        let namer = FeeNamer::new();
        let apartment = Apartment::new(101, Area::from_sqm(70));
        let period = BillingPeriod::new(2025, 6).unwrap();

        let management = namer.key(FeeType::FloorArea, period, Some("Management"), &apartment);
        let service = namer.key(FeeType::FloorArea, period, Some("Service"), &apartment);
        assert_ne!(management, service);

        let parking_a = namer.key(FeeType::VehicleParking, period, Some("A"), &apartment);
        let parking_b = namer.key(FeeType::VehicleParking, period, None, &apartment);
        assert_eq!(parking_a, parking_b);
    }
}
