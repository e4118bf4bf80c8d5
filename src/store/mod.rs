//! collaborator interfaces consumed by the billing engine
//!
//! Persistence technology is out of scope; `InMemoryStore` is the reference
//! backend used by tests and the demo.

pub mod memory;

use crate::config::FeeConfig;
use crate::decimal::Money;
use crate::errors::Result;
use crate::fees::{Fee, FeeKey};
use crate::payments::PaymentRecord;
use crate::types::{
    Apartment, ApartmentId, BillingPeriod, FeeConfigId, FeeId, PaymentRecordId, Resident,
    ResidentId, VehicleCategory,
};

pub use memory::InMemoryStore;

pub trait ApartmentDirectory: Send + Sync {
    fn all_apartments(&self) -> Result<Vec<Apartment>>;

    fn find_apartment(&self, id: ApartmentId) -> Result<Option<Apartment>>;
}

pub trait ResidentDirectory: Send + Sync {
    fn find_resident(&self, id: ResidentId) -> Result<Option<Resident>>;
}

pub trait VehicleCounts: Send + Sync {
    fn count_by_apartment_and_category(
        &self,
        apartment_id: ApartmentId,
        category: VehicleCategory,
    ) -> Result<u32>;
}

pub trait PriceSettings: Send + Sync {
    /// active monthly price per vehicle, `PriceSettingNotFound` when unset
    fn price_for_category(&self, category: VehicleCategory) -> Result<Money>;
}

pub trait FeeStore: Send + Sync {
    fn find_fee(&self, id: FeeId) -> Result<Option<Fee>>;

    fn find_fee_by_key(&self, key: &FeeKey) -> Result<Option<Fee>>;

    fn find_fee_by_name(&self, name: &str, apartment_id: ApartmentId) -> Result<Option<Fee>>;

    fn fees_by_apartment(&self, apartment_id: ApartmentId) -> Result<Vec<Fee>>;

    /// recurring and still active, newest first
    fn unpaid_recurring_fees(&self, apartment_id: ApartmentId) -> Result<Vec<Fee>>;

    /// recurring fees generated for `period`, ordered by apartment
    fn recurring_fees_for_period(&self, period: BillingPeriod) -> Result<Vec<Fee>>;

    /// recurring fees whose name contains `pattern`, ordered by apartment
    fn search_recurring_fees(&self, pattern: &str) -> Result<Vec<Fee>>;

    fn active_recurring_fees(&self) -> Result<Vec<Fee>>;

    /// atomic check-then-insert on the fee key and on `(name, apartment)`;
    /// a collision fails with `DuplicateFee`
    fn insert_fee(&self, fee: Fee) -> Result<Fee>;

    fn update_fee(&self, fee: Fee) -> Result<Fee>;

    /// `update_fee` that fails with `UpdateRestricted` when a payment exists,
    /// checked atomically against concurrent payment writes
    fn update_unpaid_fee(&self, fee: Fee, operation: &str) -> Result<Fee>;

    /// fails with `UpdateRestricted` once a payment exists for the fee
    fn delete_fee(&self, id: FeeId) -> Result<()>;
}

pub trait PaymentStore: Send + Sync {
    fn find_payment(&self, id: PaymentRecordId) -> Result<Option<PaymentRecord>>;

    /// the single record held against a fee
    fn payment_for_fee(&self, fee_id: FeeId) -> Result<Option<PaymentRecord>>;

    fn payments_by_payer(&self, payer_id: ResidentId) -> Result<Vec<PaymentRecord>>;

    fn payments_by_apartment(&self, apartment_id: ApartmentId) -> Result<Vec<PaymentRecord>>;

    /// every record, most recent payment date first
    fn all_payments(&self) -> Result<Vec<PaymentRecord>>;

    /// fails with `InvalidParameter` when the fee already has a record
    fn insert_payment(&self, record: PaymentRecord) -> Result<PaymentRecord>;

    /// atomic read-modify-write of the record held against `fee_id`
    ///
    /// `apply` sees the current record, if any, and returns the record to
    /// store. No other write to the fee's record can interleave, and an error
    /// from `apply` leaves the store untouched. `apply` must not call back
    /// into the payment store.
    fn upsert_payment(
        &self,
        fee_id: FeeId,
        apply: &mut dyn FnMut(Option<&PaymentRecord>) -> Result<PaymentRecord>,
    ) -> Result<PaymentRecord>;
}

pub trait FeeConfigStore: Send + Sync {
    fn all_configs(&self) -> Result<Vec<FeeConfig>>;

    fn find_config(&self, id: FeeConfigId) -> Result<Option<FeeConfig>>;

    fn save_config(&self, config: FeeConfig) -> Result<FeeConfig>;
}
