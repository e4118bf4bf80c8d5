pub mod calculators;
pub mod config;
pub mod decimal;
pub mod errors;
pub mod events;
pub mod fees;
pub mod generator;
pub mod lifecycle;
pub mod payments;
pub mod scheduler;
pub mod store;
pub mod types;
pub mod views;

// re-export key types
pub use calculators::{
    CalculationResult, CalculatorRegistry, FeeCalculator, FloorAreaCalculator, GenerationParams,
    VehicleParkingCalculator,
};
pub use config::{DailySlot, FeeConfig, ScheduleSlot, SchedulerConfig};
pub use decimal::{Area, Money};
pub use errors::{BillingError, Result};
pub use events::{BillingEvent, EventStore};
pub use fees::{Fee, FeeFactory, FeeKey, FeeNamer, FeeOverrides};
pub use generator::{ApartmentOutcome, GenerationReport, MonthlyFeeGenerator, SkipReason};
pub use lifecycle::{FeeCreateRequest, FeeLifecycle};
pub use payments::{DebtStatus, PaymentReconciler, PaymentRecord, PaymentRequest};
pub use scheduler::{FeeScheduler, HealthReport, JobOutcome, JobRun, ScheduledJob, TickReport};
pub use store::{
    ApartmentDirectory, FeeConfigStore, FeeStore, InMemoryStore, PaymentStore, PriceSettings,
    ResidentDirectory, VehicleCounts,
};
pub use types::{
    Apartment, ApartmentId, ApartmentStatus, BillingPeriod, FeeConfigId, FeeId, FeeType,
    PaymentRecordId, Resident, ResidentId, SettlementRule, VehicleCategory,
};
pub use views::{FeeView, GenerationSummary, PaymentRecordResponse};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
