use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::Money;
use crate::errors::{BillingError, Result};
use crate::types::{FeeConfigId, FeeType};

/// monthly fire slot: day of month, hour, minute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSlot {
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
}

impl ScheduleSlot {
    pub fn new(day: u32, hour: u32, minute: u32) -> Result<Self> {
        let slot = Self { day, hour, minute };
        slot.validate_ranges()?;
        Ok(slot)
    }

    pub fn matches(&self, day: u32, hour: u32, minute: u32) -> bool {
        self.day == day && self.hour == hour && self.minute == minute
    }

    fn validate_ranges(&self) -> Result<()> {
        if !(1..=31).contains(&self.day) || self.hour > 23 || self.minute > 59 {
            return Err(BillingError::InvalidConfiguration {
                message: format!(
                    "schedule out of range: day {}, {:02}:{:02}",
                    self.day, self.hour, self.minute
                ),
            });
        }
        Ok(())
    }

    /// slot must sit on a tick boundary or it never fires
    pub fn validate(&self, tick_minutes: u32) -> Result<()> {
        self.validate_ranges()?;
        if tick_minutes == 0 || self.minute % tick_minutes != 0 {
            return Err(BillingError::InvalidConfiguration {
                message: format!(
                    "schedule minute {} is not a multiple of the {}-minute tick",
                    self.minute, tick_minutes
                ),
            });
        }
        Ok(())
    }
}

/// daily fire slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySlot {
    pub hour: u32,
    pub minute: u32,
}

/// variable-rate fee configuration (price per m²) with optional autogeneration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeConfig {
    pub id: FeeConfigId,
    /// label used for generated fee names
    pub fee_name: String,
    pub fee_type: FeeType,
    pub unit_price: Money,
    pub description: Option<String>,
    pub is_active: bool,
    pub effective_from: Option<NaiveDate>,
    pub effective_to: Option<NaiveDate>,
    pub auto_generate: bool,
    pub schedule: Option<ScheduleSlot>,
}

impl FeeConfig {
    /// active, manually triggered floor-area config
    pub fn floor_area(fee_name: impl Into<String>, unit_price: Money) -> Self {
        Self {
            id: Uuid::new_v4(),
            fee_name: fee_name.into(),
            fee_type: FeeType::FloorArea,
            unit_price,
            description: None,
            is_active: true,
            effective_from: None,
            effective_to: None,
            auto_generate: false,
            schedule: None,
        }
    }

    /// enable autogeneration at `slot`
    pub fn scheduled(mut self, slot: ScheduleSlot) -> Self {
        self.auto_generate = true;
        self.schedule = Some(slot);
        self
    }

    pub fn effective_between(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.effective_from = from;
        self.effective_to = to;
        self
    }

    /// active and `today` within the window, open bounds unrestricted
    pub fn is_effective(&self, today: NaiveDate) -> bool {
        self.is_active
            && self.effective_from.map_or(true, |from| from <= today)
            && self.effective_to.map_or(true, |to| today <= to)
    }

    /// active, autogenerating and scheduled exactly at this slot
    pub fn is_due_at(&self, day: u32, hour: u32, minute: u32) -> bool {
        self.is_active
            && self.auto_generate
            && self
                .schedule
                .map_or(false, |slot| slot.matches(day, hour, minute))
    }

    pub fn validate(&self, tick_minutes: u32) -> Result<()> {
        if self.fee_name.trim().is_empty() {
            return Err(BillingError::InvalidConfiguration {
                message: "fee config name required".to_string(),
            });
        }
        if !self.unit_price.is_positive() {
            return Err(BillingError::InvalidConfiguration {
                message: format!("unit price must be positive: {}", self.unit_price),
            });
        }
        if let (Some(from), Some(to)) = (self.effective_from, self.effective_to) {
            if from > to {
                return Err(BillingError::InvalidConfiguration {
                    message: format!("effective window reversed: {from} > {to}"),
                });
            }
        }
        match (self.auto_generate, self.schedule) {
            (true, None) => Err(BillingError::InvalidConfiguration {
                message: format!("'{}' autogenerates without a schedule", self.fee_name),
            }),
            (_, Some(slot)) => slot.validate(tick_minutes),
            (false, None) => Ok(()),
        }
    }

    /// configs seeded into an empty config store
    pub fn default_configs() -> Vec<FeeConfig> {
        vec![
            FeeConfig::floor_area("Management fee", Money::from_decimal(dec!(7000)))
                .scheduled(ScheduleSlot { day: 1, hour: 2, minute: 0 }),
            FeeConfig::floor_area("Service fee", Money::from_decimal(dec!(5000))),
        ]
    }
}

/// scheduler timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// tick granularity, must divide 60
    pub tick_minutes: u32,
    pub vehicle_parking_slot: ScheduleSlot,
    /// run for effective configs that do not autogenerate
    pub manual_configs_slot: ScheduleSlot,
    pub health_check: DailySlot,
    pub seed_default_configs: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::standard()
    }
}

impl SchedulerConfig {
    /// 15-minute ticks, parking on the 1st at 01:00, manual configs at 03:00,
    /// health check daily at 08:00
    pub fn standard() -> Self {
        Self {
            tick_minutes: 15,
            vehicle_parking_slot: ScheduleSlot { day: 1, hour: 1, minute: 0 },
            manual_configs_slot: ScheduleSlot { day: 1, hour: 3, minute: 0 },
            health_check: DailySlot { hour: 8, minute: 0 },
            seed_default_configs: true,
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: SchedulerConfig =
            serde_json::from_str(json).map_err(|e| BillingError::InvalidConfiguration {
                message: format!("scheduler config: {e}"),
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tick_minutes == 0 || 60 % self.tick_minutes != 0 {
            return Err(BillingError::InvalidConfiguration {
                message: format!("tick of {} minutes does not divide an hour", self.tick_minutes),
            });
        }
        self.vehicle_parking_slot.validate(self.tick_minutes)?;
        self.manual_configs_slot.validate(self.tick_minutes)?;
        ScheduleSlot::new(1, self.health_check.hour, self.health_check.minute)?
            .validate(self.tick_minutes)
    }

    /// `at` rounded down to the tick boundary
    pub fn round_to_tick(&self, at: DateTime<Utc>) -> DateTime<Utc> {
        let step = self.tick_minutes.max(1);
        let minute = (at.minute() / step) * step;
        at.with_minute(minute)
            .and_then(|t| t.with_second(0))
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or(at)
    }

    /// (day, hour, minute) of the tick containing `at`
    pub fn tick_slot(&self, at: DateTime<Utc>) -> (u32, u32, u32) {
        let rounded = self.round_to_tick(at);
        (rounded.day(), rounded.hour(), rounded.minute())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_effective_window() {
        let config = FeeConfig::floor_area("Management fee", Money::from_major(7_000))
            .effective_between(NaiveDate::from_ymd_opt(2025, 1, 1), NaiveDate::from_ymd_opt(2025, 12, 31));

        assert!(config.is_effective(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()));
        assert!(config.is_effective(NaiveDate::from_ymd_opt(2025, 12, 31).unwrap()));
        assert!(!config.is_effective(NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()));
        assert!(!config.is_effective(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()));

        let open = FeeConfig::floor_area("Open", Money::from_major(1));
        assert!(open.is_effective(NaiveDate::from_ymd_opt(1990, 1, 1).unwrap()));

        let mut inactive = open.clone();
        inactive.is_active = false;
        assert!(!inactive.is_effective(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()));
    }

    #[test]
    fn test_due_requires_exact_slot_and_autogeneration() {
        let slot = ScheduleSlot::new(5, 9, 30).unwrap();
        let config = FeeConfig::floor_area("Management fee", Money::from_major(7_000)).scheduled(slot);

        assert!(config.is_due_at(5, 9, 30));
        assert!(!config.is_due_at(5, 9, 45));
        assert!(!config.is_due_at(6, 9, 30));

        let mut manual = config.clone();
        manual.auto_generate = false;
        assert!(!manual.is_due_at(5, 9, 30));

        let mut inactive = config;
        inactive.is_active = false;
        assert!(!inactive.is_due_at(5, 9, 30));
    }

    #[test]
    fn test_validate_alignment() {
        let aligned = FeeConfig::floor_area("A", Money::from_major(5_000))
            .scheduled(ScheduleSlot::new(1, 2, 45).unwrap());
        assert!(aligned.validate(15).is_ok());

        let misaligned = FeeConfig::floor_area("B", Money::from_major(5_000))
            .scheduled(ScheduleSlot::new(1, 2, 10).unwrap());
        assert!(matches!(
            misaligned.validate(15),
            Err(BillingError::InvalidConfiguration { .. })
        ));

        let free = FeeConfig::floor_area("C", Money::ZERO);
        assert!(free.validate(15).is_err());

        assert!(ScheduleSlot::new(0, 1, 0).is_err());
        assert!(ScheduleSlot::new(1, 24, 0).is_err());
    }

    #[test]
    fn test_round_to_tick() {
        let config = SchedulerConfig::standard();
        let at = Utc.with_ymd_and_hms(2025, 6, 1, 1, 14, 59).unwrap();

        assert_eq!(config.round_to_tick(at), Utc.with_ymd_and_hms(2025, 6, 1, 1, 0, 0).unwrap());
        assert_eq!(config.tick_slot(at), (1, 1, 0));

        let later = Utc.with_ymd_and_hms(2025, 6, 1, 1, 44, 0).unwrap();
        assert_eq!(config.tick_slot(later), (1, 1, 30));
    }

    #[test]
    fn test_scheduler_config_from_json() {
        let json = r#"{
            "tick_minutes": 30,
            "vehicle_parking_slot": { "day": 1, "hour": 0, "minute": 30 },
            "manual_configs_slot": { "day": 2, "hour": 3, "minute": 0 },
            "health_check": { "hour": 7, "minute": 30 },
            "seed_default_configs": false
        }"#;

        let config = SchedulerConfig::from_json(json).unwrap();
        assert_eq!(config.tick_minutes, 30);
        assert_eq!(config.manual_configs_slot.day, 2);

        let bad_tick = json.replace("\"tick_minutes\": 30", "\"tick_minutes\": 7");
        assert!(SchedulerConfig::from_json(&bad_tick).is_err());
        assert!(SchedulerConfig::from_json("not json").is_err());
    }

    #[test]
    fn test_default_configs_are_valid() {
        let standard = SchedulerConfig::standard();
        assert!(standard.validate().is_ok());
        for config in FeeConfig::default_configs() {
            assert!(config.validate(standard.tick_minutes).is_ok());
        }
    }
}
