use std::sync::Arc;

use chrono::{DateTime, Utc};
use hourglass_rs::SafeTimeProvider;
use uuid::Uuid;

use crate::decimal::Money;
use crate::errors::{BillingError, Result};
use crate::events::{BillingEvent, EventStore};
use crate::fees::Fee;
use crate::store::{ApartmentDirectory, FeeStore, PaymentStore, ResidentDirectory};
use crate::types::{ApartmentId, FeeId, PaymentRecordId, ResidentId};
use crate::views::PaymentRecordResponse;

use super::settlement::{validate_payment, validate_replacement, DebtStatus};
use super::{PaymentRecord, PaymentRequest};

/// validates and records payments against fees
///
/// Each fee holds at most one record; repeat payments accumulate onto it.
/// A recurring fee is deactivated as soon as its paid total reaches the fee
/// amount, whatever its settlement rule.
pub struct PaymentReconciler {
    residents: Arc<dyn ResidentDirectory>,
    apartments: Arc<dyn ApartmentDirectory>,
    fees: Arc<dyn FeeStore>,
    payments: Arc<dyn PaymentStore>,
    pub events: EventStore,
}

impl PaymentReconciler {
    pub fn new(
        residents: Arc<dyn ResidentDirectory>,
        apartments: Arc<dyn ApartmentDirectory>,
        fees: Arc<dyn FeeStore>,
        payments: Arc<dyn PaymentStore>,
    ) -> Self {
        Self {
            residents,
            apartments,
            fees,
            payments,
            events: EventStore::new(),
        }
    }

    /// record a payment, creating the fee's record or accumulating onto it
    ///
    /// Validation and the record write happen in one store transaction, so
    /// concurrent payments against the same fee are applied one at a time.
    pub fn create_payment(
        &mut self,
        request: PaymentRequest,
        time_provider: &SafeTimeProvider,
    ) -> Result<PaymentRecordResponse> {
        let now = time_provider.now();

        self.require_payer(request.payer_id)?;
        let fee = self.require_fee(request.fee_id)?;
        let apartment_id = fee
            .apartment_id
            .or(request.apartment_id)
            .ok_or_else(|| {
                BillingError::invalid(format!("no apartment for payment against fee {}", fee.id))
            })?;
        if self.apartments.find_apartment(apartment_id)?.is_none() {
            return Err(BillingError::ApartmentNotFound { id: apartment_id });
        }

        let fees = &self.fees;
        let record = self.payments.upsert_payment(fee.id, &mut |existing: Option<&PaymentRecord>| {
            // the fee may have been edited since the lookup above
            let fee = fees
                .find_fee(request.fee_id)?
                .ok_or(BillingError::FeeNotFound { id: request.fee_id })?;
            let already_paid = existing.map_or(Money::ZERO, |r| r.amount);
            validate_payment(&fee, already_paid, request.amount)?;

            Ok(match existing {
                Some(record) => record.accumulate(&request, now),
                None => PaymentRecord {
                    id: Uuid::new_v4(),
                    payer_id: request.payer_id,
                    fee_id: fee.id,
                    apartment_id,
                    payment_date: request.payment_date,
                    amount: request.amount,
                    payment_count: 1,
                    notes: request.notes.clone(),
                    created_at: now,
                    updated_at: None,
                },
            })
        })?;

        tracing::info!(
            fee_id = %fee.id,
            payer_id = request.payer_id,
            amount = %request.amount,
            total_paid = %record.amount,
            "Reconciler: payment recorded"
        );
        self.events.emit(BillingEvent::PaymentRecorded {
            record_id: record.id,
            fee_id: fee.id,
            payer_id: request.payer_id,
            amount: request.amount,
            total_paid: record.amount,
            timestamp: now,
        });

        let fee = self.require_fee(fee.id)?;
        let fee = self.deactivate_if_settled(fee, record.amount, now)?;
        Ok(PaymentRecordResponse::new(&record, &fee))
    }

    /// replace a record's amount, re-validated as a first payment
    pub fn update_payment(
        &mut self,
        record_id: PaymentRecordId,
        request: PaymentRequest,
        time_provider: &SafeTimeProvider,
    ) -> Result<PaymentRecordResponse> {
        let now = time_provider.now();

        let record = self
            .payments
            .find_payment(record_id)?
            .ok_or(BillingError::PaymentRecordNotFound { id: record_id })?;
        if request.fee_id != record.fee_id {
            return Err(BillingError::invalid(format!(
                "payment record {record_id} belongs to fee {}",
                record.fee_id
            )));
        }
        self.require_payer(request.payer_id)?;
        let fee = self.require_fee(record.fee_id)?;

        let fees = &self.fees;
        let mut old_amount = Money::ZERO;
        let updated = self.payments.upsert_payment(record.fee_id, &mut |existing: Option<&PaymentRecord>| {
            let current = existing
                .filter(|r| r.id == record_id)
                .ok_or(BillingError::PaymentRecordNotFound { id: record_id })?;
            let fee = fees
                .find_fee(current.fee_id)?
                .ok_or(BillingError::FeeNotFound { id: current.fee_id })?;
            validate_replacement(&fee, request.amount)?;

            old_amount = current.amount;
            Ok(PaymentRecord {
                payer_id: request.payer_id,
                payment_date: request.payment_date,
                amount: request.amount,
                notes: request.notes.clone().or_else(|| current.notes.clone()),
                updated_at: Some(now),
                ..current.clone()
            })
        })?;

        tracing::info!(
            record_id = %record_id,
            old_amount = %old_amount,
            new_amount = %updated.amount,
            "Reconciler: payment updated"
        );
        self.events.emit(BillingEvent::PaymentUpdated {
            record_id,
            fee_id: fee.id,
            old_amount,
            new_amount: updated.amount,
            timestamp: now,
        });

        let fee = self.require_fee(fee.id)?;
        let fee = self.deactivate_if_settled(fee, updated.amount, now)?;
        Ok(PaymentRecordResponse::new(&updated, &fee))
    }

    /// deactivate recurring fees that are fully paid but still active
    pub fn sweep_settled_fees(&mut self, time_provider: &SafeTimeProvider) -> Result<Vec<FeeId>> {
        let now = time_provider.now();
        let mut deactivated = Vec::new();

        for fee in self.fees.active_recurring_fees()? {
            let Some(record) = self.payments.payment_for_fee(fee.id)? else {
                continue;
            };
            let fee_id = fee.id;
            if !self.deactivate_if_settled(fee, record.amount, now)?.is_active {
                deactivated.push(fee_id);
            }
        }

        if !deactivated.is_empty() {
            tracing::warn!(count = deactivated.len(), "Reconciler: swept settled fees left active");
        }
        Ok(deactivated)
    }

    pub fn payment_for_fee(&self, fee_id: FeeId) -> Result<Option<PaymentRecord>> {
        self.payments.payment_for_fee(fee_id)
    }

    pub fn payments_by_payer(&self, payer_id: ResidentId) -> Result<Vec<PaymentRecord>> {
        self.payments.payments_by_payer(payer_id)
    }

    pub fn payments_by_apartment(&self, apartment_id: ApartmentId) -> Result<Vec<PaymentRecord>> {
        self.payments.payments_by_apartment(apartment_id)
    }

    pub fn all_payments(&self) -> Result<Vec<PaymentRecord>> {
        self.payments.all_payments()
    }

    pub fn total_paid_for_fee(&self, fee_id: FeeId) -> Result<Money> {
        Ok(self
            .payments
            .payment_for_fee(fee_id)?
            .map_or(Money::ZERO, |r| r.amount))
    }

    pub fn debt_status(&self, fee_id: FeeId) -> Result<DebtStatus> {
        let fee = self.require_fee(fee_id)?;
        Ok(DebtStatus::compute(&fee, self.total_paid_for_fee(fee_id)?))
    }

    /// no-op unless the fee is recurring, active and fully paid
    fn deactivate_if_settled(&mut self, fee: Fee, paid: Money, now: DateTime<Utc>) -> Result<Fee> {
        if !fee.is_recurring || !fee.is_active || paid < fee.amount {
            return Ok(fee);
        }

        let fee = self.fees.update_fee(fee.deactivated(now))?;
        let effective_to = fee.effective_to.unwrap_or_else(|| now.date_naive());

        tracing::info!(fee_id = %fee.id, name = %fee.name, "Reconciler: fee settled, deactivated");
        self.events.emit(BillingEvent::FeeDeactivated {
            fee_id: fee.id,
            effective_to,
            timestamp: now,
        });
        Ok(fee)
    }

    fn require_payer(&self, payer_id: ResidentId) -> Result<()> {
        match self.residents.find_resident(payer_id)? {
            Some(_) => Ok(()),
            None => Err(BillingError::ResidentNotFound { id: payer_id }),
        }
    }

    fn require_fee(&self, fee_id: FeeId) -> Result<Fee> {
        self.fees
            .find_fee(fee_id)?
            .ok_or(BillingError::FeeNotFound { id: fee_id })
    }
}
