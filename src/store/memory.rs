use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::FeeConfig;
use crate::decimal::Money;
use crate::errors::{BillingError, Result};
use crate::fees::{Fee, FeeKey};
use crate::payments::PaymentRecord;
use crate::types::{
    Apartment, ApartmentId, BillingPeriod, FeeConfigId, FeeId, PaymentRecordId, Resident,
    ResidentId, VehicleCategory,
};

use super::{
    ApartmentDirectory, FeeConfigStore, FeeStore, PaymentStore, PriceSettings, ResidentDirectory,
    VehicleCounts,
};

/// in-memory backend implementing every collaborator trait
#[derive(Debug, Default)]
pub struct InMemoryStore {
    apartments: RwLock<HashMap<ApartmentId, Apartment>>,
    residents: RwLock<HashMap<ResidentId, Resident>>,
    vehicles: RwLock<HashMap<(ApartmentId, VehicleCategory), u32>>,
    prices: RwLock<HashMap<VehicleCategory, Money>>,
    fees: RwLock<HashMap<FeeId, Fee>>,
    payments: RwLock<HashMap<PaymentRecordId, PaymentRecord>>,
    configs: RwLock<HashMap<FeeConfigId, FeeConfig>>,
}

fn read<'a, T>(lock: &'a RwLock<T>, table: &str) -> Result<RwLockReadGuard<'a, T>> {
    lock.read()
        .map_err(|_| BillingError::storage(format!("{table} table lock poisoned")))
}

fn write<'a, T>(lock: &'a RwLock<T>, table: &str) -> Result<RwLockWriteGuard<'a, T>> {
    lock.write()
        .map_err(|_| BillingError::storage(format!("{table} table lock poisoned")))
}

fn sorted_by_apartment(mut fees: Vec<Fee>) -> Vec<Fee> {
    fees.sort_by(|a, b| {
        a.apartment_id
            .cmp(&b.apartment_id)
            .then_with(|| a.created_at.cmp(&b.created_at))
    });
    fees
}

/// first fee other than `fee` itself holding the same key or `(name, apartment)`
fn find_conflict<'a>(fees: &'a HashMap<FeeId, Fee>, fee: &Fee) -> Option<&'a Fee> {
    fees.values().filter(|f| f.id != fee.id).find(|existing| {
        let same_key = matches!((&existing.key, &fee.key), (Some(a), Some(b)) if a == b);
        let same_name = fee.apartment_id.is_some()
            && existing.apartment_id == fee.apartment_id
            && existing.name == fee.name;
        same_key || same_name
    })
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_apartment(&self, apartment: Apartment) -> Result<()> {
        write(&self.apartments, "apartment")?.insert(apartment.address_number, apartment);
        Ok(())
    }

    pub fn add_resident(&self, resident: Resident) -> Result<()> {
        write(&self.residents, "resident")?.insert(resident.id, resident);
        Ok(())
    }

    pub fn set_vehicle_count(
        &self,
        apartment_id: ApartmentId,
        category: VehicleCategory,
        count: u32,
    ) -> Result<()> {
        write(&self.vehicles, "vehicle")?.insert((apartment_id, category), count);
        Ok(())
    }

    pub fn set_price(&self, category: VehicleCategory, price: Money) -> Result<()> {
        write(&self.prices, "price setting")?.insert(category, price);
        Ok(())
    }

    pub fn remove_price(&self, category: VehicleCategory) -> Result<()> {
        write(&self.prices, "price setting")?.remove(&category);
        Ok(())
    }

    pub fn fee_count(&self) -> Result<usize> {
        Ok(read(&self.fees, "fee")?.len())
    }

    pub fn payment_count(&self) -> Result<usize> {
        Ok(read(&self.payments, "payment")?.len())
    }
}

impl ApartmentDirectory for InMemoryStore {
    fn all_apartments(&self) -> Result<Vec<Apartment>> {
        let mut apartments: Vec<Apartment> =
            read(&self.apartments, "apartment")?.values().cloned().collect();
        apartments.sort_by_key(|a| a.address_number);
        Ok(apartments)
    }

    fn find_apartment(&self, id: ApartmentId) -> Result<Option<Apartment>> {
        Ok(read(&self.apartments, "apartment")?.get(&id).cloned())
    }
}

impl ResidentDirectory for InMemoryStore {
    fn find_resident(&self, id: ResidentId) -> Result<Option<Resident>> {
        Ok(read(&self.residents, "resident")?.get(&id).cloned())
    }
}

impl VehicleCounts for InMemoryStore {
    fn count_by_apartment_and_category(
        &self,
        apartment_id: ApartmentId,
        category: VehicleCategory,
    ) -> Result<u32> {
        Ok(read(&self.vehicles, "vehicle")?
            .get(&(apartment_id, category))
            .copied()
            .unwrap_or(0))
    }
}

impl PriceSettings for InMemoryStore {
    fn price_for_category(&self, category: VehicleCategory) -> Result<Money> {
        read(&self.prices, "price setting")?
            .get(&category)
            .copied()
            .ok_or(BillingError::PriceSettingNotFound { category })
    }
}

impl FeeStore for InMemoryStore {
    fn find_fee(&self, id: FeeId) -> Result<Option<Fee>> {
        Ok(read(&self.fees, "fee")?.get(&id).cloned())
    }

    fn find_fee_by_key(&self, key: &FeeKey) -> Result<Option<Fee>> {
        Ok(read(&self.fees, "fee")?
            .values()
            .find(|f| f.key.as_ref() == Some(key))
            .cloned())
    }

    fn find_fee_by_name(&self, name: &str, apartment_id: ApartmentId) -> Result<Option<Fee>> {
        Ok(read(&self.fees, "fee")?
            .values()
            .find(|f| f.name == name && f.apartment_id == Some(apartment_id))
            .cloned())
    }

    fn fees_by_apartment(&self, apartment_id: ApartmentId) -> Result<Vec<Fee>> {
        let fees = read(&self.fees, "fee")?
            .values()
            .filter(|f| f.apartment_id == Some(apartment_id))
            .cloned()
            .collect();
        Ok(sorted_by_apartment(fees))
    }

    fn unpaid_recurring_fees(&self, apartment_id: ApartmentId) -> Result<Vec<Fee>> {
        let mut fees: Vec<Fee> = read(&self.fees, "fee")?
            .values()
            .filter(|f| f.apartment_id == Some(apartment_id) && f.is_recurring && f.is_active)
            .cloned()
            .collect();
        fees.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(fees)
    }

    fn recurring_fees_for_period(&self, period: BillingPeriod) -> Result<Vec<Fee>> {
        let fees = read(&self.fees, "fee")?
            .values()
            .filter(|f| f.is_recurring && f.period() == Some(period))
            .cloned()
            .collect();
        Ok(sorted_by_apartment(fees))
    }

    fn search_recurring_fees(&self, pattern: &str) -> Result<Vec<Fee>> {
        let fees = read(&self.fees, "fee")?
            .values()
            .filter(|f| f.is_recurring && f.name.contains(pattern))
            .cloned()
            .collect();
        Ok(sorted_by_apartment(fees))
    }

    fn active_recurring_fees(&self) -> Result<Vec<Fee>> {
        let fees = read(&self.fees, "fee")?
            .values()
            .filter(|f| f.is_recurring && f.is_active)
            .cloned()
            .collect();
        Ok(sorted_by_apartment(fees))
    }

    fn insert_fee(&self, fee: Fee) -> Result<Fee> {
        let mut fees = write(&self.fees, "fee")?;
        if let Some(existing) = find_conflict(&fees, &fee) {
            return Err(BillingError::DuplicateFee {
                name: existing.name.clone(),
                apartment_id: existing.apartment_id.unwrap_or_default(),
            });
        }
        if fees.contains_key(&fee.id) {
            return Err(BillingError::invalid(format!("fee id already used: {}", fee.id)));
        }
        fees.insert(fee.id, fee.clone());
        Ok(fee)
    }

    fn update_fee(&self, fee: Fee) -> Result<Fee> {
        let mut fees = write(&self.fees, "fee")?;
        if !fees.contains_key(&fee.id) {
            return Err(BillingError::FeeNotFound { id: fee.id });
        }
        if let Some(existing) = find_conflict(&fees, &fee) {
            return Err(BillingError::DuplicateFee {
                name: existing.name.clone(),
                apartment_id: existing.apartment_id.unwrap_or_default(),
            });
        }
        fees.insert(fee.id, fee.clone());
        Ok(fee)
    }

    fn update_unpaid_fee(&self, fee: Fee, operation: &str) -> Result<Fee> {
        // payments before fees, the order upsert_payment uses
        let payments = read(&self.payments, "payment")?;
        if payments.values().any(|p| p.fee_id == fee.id) {
            return Err(BillingError::UpdateRestricted {
                fee_id: fee.id,
                name: fee.name,
                operation: operation.to_string(),
            });
        }
        self.update_fee(fee)
    }

    fn delete_fee(&self, id: FeeId) -> Result<()> {
        let payments = read(&self.payments, "payment")?;
        let mut fees = write(&self.fees, "fee")?;
        let fee = fees.get(&id).ok_or(BillingError::FeeNotFound { id })?;
        if payments.values().any(|p| p.fee_id == id) {
            return Err(BillingError::UpdateRestricted {
                fee_id: id,
                name: fee.name.clone(),
                operation: "delete".to_string(),
            });
        }
        fees.remove(&id);
        Ok(())
    }
}

impl PaymentStore for InMemoryStore {
    fn find_payment(&self, id: PaymentRecordId) -> Result<Option<PaymentRecord>> {
        Ok(read(&self.payments, "payment")?.get(&id).cloned())
    }

    fn payment_for_fee(&self, fee_id: FeeId) -> Result<Option<PaymentRecord>> {
        Ok(read(&self.payments, "payment")?
            .values()
            .find(|p| p.fee_id == fee_id)
            .cloned())
    }

    fn payments_by_payer(&self, payer_id: ResidentId) -> Result<Vec<PaymentRecord>> {
        let mut records: Vec<PaymentRecord> = read(&self.payments, "payment")?
            .values()
            .filter(|p| p.payer_id == payer_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.payment_date.cmp(&a.payment_date));
        Ok(records)
    }

    fn payments_by_apartment(&self, apartment_id: ApartmentId) -> Result<Vec<PaymentRecord>> {
        let mut records: Vec<PaymentRecord> = read(&self.payments, "payment")?
            .values()
            .filter(|p| p.apartment_id == apartment_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.payment_date.cmp(&a.payment_date));
        Ok(records)
    }

    fn all_payments(&self) -> Result<Vec<PaymentRecord>> {
        let mut records: Vec<PaymentRecord> =
            read(&self.payments, "payment")?.values().cloned().collect();
        records.sort_by(|a, b| b.payment_date.cmp(&a.payment_date));
        Ok(records)
    }

    fn insert_payment(&self, record: PaymentRecord) -> Result<PaymentRecord> {
        let mut payments = write(&self.payments, "payment")?;
        if payments.values().any(|p| p.fee_id == record.fee_id) {
            return Err(BillingError::invalid(format!(
                "fee {} already has a payment record",
                record.fee_id
            )));
        }
        payments.insert(record.id, record.clone());
        Ok(record)
    }

    fn upsert_payment(
        &self,
        fee_id: FeeId,
        apply: &mut dyn FnMut(Option<&PaymentRecord>) -> Result<PaymentRecord>,
    ) -> Result<PaymentRecord> {
        let mut payments = write(&self.payments, "payment")?;
        let existing = payments.values().find(|p| p.fee_id == fee_id).cloned();
        let record = apply(existing.as_ref())?;

        if record.fee_id != fee_id {
            return Err(BillingError::invalid(format!(
                "payment record {} belongs to fee {}, not {fee_id}",
                record.id, record.fee_id
            )));
        }
        if let Some(existing) = existing.filter(|e| e.id != record.id) {
            return Err(BillingError::invalid(format!(
                "fee {fee_id} already has payment record {}",
                existing.id
            )));
        }
        payments.insert(record.id, record.clone());
        Ok(record)
    }
}

impl FeeConfigStore for InMemoryStore {
    fn all_configs(&self) -> Result<Vec<FeeConfig>> {
        let mut configs: Vec<FeeConfig> =
            read(&self.configs, "fee config")?.values().cloned().collect();
        configs.sort_by(|a, b| a.fee_name.cmp(&b.fee_name));
        Ok(configs)
    }

    fn find_config(&self, id: FeeConfigId) -> Result<Option<FeeConfig>> {
        Ok(read(&self.configs, "fee config")?.get(&id).cloned())
    }

    fn save_config(&self, config: FeeConfig) -> Result<FeeConfig> {
        write(&self.configs, "fee config")?.insert(config.id, config.clone());
        Ok(config)
    }
}
