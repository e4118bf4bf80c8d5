use std::sync::Arc;

use chrono::{DateTime, Utc};
use hourglass_rs::SafeTimeProvider;
use serde::{Deserialize, Serialize};

use crate::calculators::{CalculatorRegistry, FeeCalculator, GenerationParams};
use crate::errors::{BillingError, Result};
use crate::events::{BillingEvent, EventStore};
use crate::fees::{Fee, FeeFactory, FeeNamer};
use crate::store::{ApartmentDirectory, FeeStore};
use crate::types::{Apartment, ApartmentId, BillingPeriod, FeeType};

/// why an apartment produced no fee without it being an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    AlreadyBilled,
    NoBillableBasis,
}

/// per-apartment result of a batch run
#[derive(Debug, Clone, PartialEq)]
pub enum ApartmentOutcome {
    Created(Fee),
    Skipped {
        apartment_id: ApartmentId,
        reason: SkipReason,
        detail: String,
    },
    Failed {
        apartment_id: ApartmentId,
        error: BillingError,
    },
}

impl ApartmentOutcome {
    fn from_result(apartment_id: ApartmentId, result: Result<Fee>) -> Self {
        match result {
            Ok(fee) => ApartmentOutcome::Created(fee),
            Err(BillingError::DuplicateFee { name, .. }) => ApartmentOutcome::Skipped {
                apartment_id,
                reason: SkipReason::AlreadyBilled,
                detail: name,
            },
            Err(BillingError::NoBillableBasis { reason, .. }) => ApartmentOutcome::Skipped {
                apartment_id,
                reason: SkipReason::NoBillableBasis,
                detail: reason,
            },
            Err(error) => ApartmentOutcome::Failed { apartment_id, error },
        }
    }

    pub fn apartment_id(&self) -> ApartmentId {
        match self {
            // generated fees always carry their apartment
            ApartmentOutcome::Created(fee) => fee.apartment_id.unwrap_or_default(),
            ApartmentOutcome::Skipped { apartment_id, .. }
            | ApartmentOutcome::Failed { apartment_id, .. } => *apartment_id,
        }
    }
}

/// outcome of one `generate_for_all` call
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationReport {
    pub fee_type: FeeType,
    pub period: BillingPeriod,
    pub label: Option<String>,
    pub outcomes: Vec<ApartmentOutcome>,
}

impl GenerationReport {
    pub fn created(&self) -> impl Iterator<Item = &Fee> {
        self.outcomes.iter().filter_map(|o| match o {
            ApartmentOutcome::Created(fee) => Some(fee),
            _ => None,
        })
    }

    pub fn into_created(self) -> Vec<Fee> {
        self.outcomes
            .into_iter()
            .filter_map(|o| match o {
                ApartmentOutcome::Created(fee) => Some(fee),
                _ => None,
            })
            .collect()
    }

    pub fn created_count(&self) -> usize {
        self.created().count()
    }

    pub fn skipped_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, ApartmentOutcome::Skipped { .. }))
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, ApartmentOutcome::Failed { .. }))
            .count()
    }

    pub fn outcome_for(&self, apartment_id: ApartmentId) -> Option<&ApartmentOutcome> {
        self.outcomes.iter().find(|o| o.apartment_id() == apartment_id)
    }
}

/// monthly fee orchestrator
///
/// Resolves the calculator for the requested fee type, then bills every
/// apartment independently: a duplicate or an apartment with nothing to
/// bill is a skip, any other per-apartment error is recorded and the batch
/// moves on. Duplicate detection is the structured fee key; the store's
/// atomic insert closes the race between two concurrent runs.
pub struct MonthlyFeeGenerator {
    apartments: Arc<dyn ApartmentDirectory>,
    fees: Arc<dyn FeeStore>,
    registry: CalculatorRegistry,
    namer: FeeNamer,
    pub events: EventStore,
}

impl MonthlyFeeGenerator {
    pub fn new(
        apartments: Arc<dyn ApartmentDirectory>,
        fees: Arc<dyn FeeStore>,
        registry: CalculatorRegistry,
    ) -> Self {
        Self {
            apartments,
            fees,
            registry,
            namer: FeeNamer::new(),
            events: EventStore::new(),
        }
    }

    pub fn registry(&self) -> &CalculatorRegistry {
        &self.registry
    }

    /// bill every apartment; fails only when the fee type has no calculator
    /// or the apartment directory cannot be read
    pub fn generate_for_all(
        &mut self,
        fee_type: FeeType,
        params: &GenerationParams,
        time_provider: &SafeTimeProvider,
    ) -> Result<GenerationReport> {
        self.generate_for_all_at(fee_type, params, time_provider.now())
    }

    pub(crate) fn generate_for_all_at(
        &mut self,
        fee_type: FeeType,
        params: &GenerationParams,
        now: DateTime<Utc>,
    ) -> Result<GenerationReport> {
        let calculator = self.registry.resolve(fee_type)?;
        let apartments = self.apartments.all_apartments()?;

        tracing::info!(
            fee_type = %fee_type,
            period = %params.period,
            apartments = apartments.len(),
            "Generator: starting batch"
        );

        let mut outcomes = Vec::with_capacity(apartments.len());
        for apartment in &apartments {
            let result = self.generate_apartment(calculator.as_ref(), fee_type, apartment, params, now);
            let outcome = ApartmentOutcome::from_result(apartment.address_number, result);
            self.record(&outcome, fee_type, params.period, now);
            outcomes.push(outcome);
        }

        let report = GenerationReport {
            fee_type,
            period: params.period,
            label: params.label.clone(),
            outcomes,
        };

        tracing::info!(
            fee_type = %fee_type,
            period = %params.period,
            created = report.created_count(),
            skipped = report.skipped_count(),
            failed = report.failed_count(),
            "Generator: batch finished"
        );

        Ok(report)
    }

    /// bill one apartment, every condition surfaced to the caller
    pub fn generate_for_one(
        &mut self,
        apartment_id: ApartmentId,
        fee_type: FeeType,
        params: &GenerationParams,
        time_provider: &SafeTimeProvider,
    ) -> Result<Fee> {
        let apartment = self
            .apartments
            .find_apartment(apartment_id)?
            .ok_or(BillingError::ApartmentNotFound { id: apartment_id })?;
        let calculator = self.registry.resolve(fee_type)?;
        let now = time_provider.now();

        let result = self.generate_apartment(calculator.as_ref(), fee_type, &apartment, params, now);
        let outcome = ApartmentOutcome::from_result(apartment_id, result.clone());
        self.record(&outcome, fee_type, params.period, now);
        result
    }

    fn generate_apartment(
        &self,
        calculator: &dyn FeeCalculator,
        fee_type: FeeType,
        apartment: &Apartment,
        params: &GenerationParams,
        now: DateTime<Utc>,
    ) -> Result<Fee> {
        let label = params.label.as_deref();
        let key = self.namer.key(fee_type, params.period, label, apartment);
        let name = self.namer.build(fee_type, params.period, label, apartment);

        let already_billed = self.fees.find_fee_by_key(&key)?.is_some()
            || self
                .fees
                .find_fee_by_name(&name, apartment.address_number)?
                .is_some();
        if already_billed {
            return Err(BillingError::DuplicateFee {
                name,
                apartment_id: apartment.address_number,
            });
        }

        let calculation = calculator.calculate(apartment, params)?;
        if !calculation.amount.is_positive() {
            return Err(BillingError::NoBillableBasis {
                apartment_id: apartment.address_number,
                reason: format!("calculated amount is {}", calculation.amount),
            });
        }

        let fee = FeeFactory::monthly_for(apartment, now)
            .key(key)
            .name(name)
            .description(calculation.description)
            .amount(calculation.amount)
            .unit_price(calculation.unit_price)
            .build()?;

        self.fees.insert_fee(fee)
    }

    fn record(
        &mut self,
        outcome: &ApartmentOutcome,
        fee_type: FeeType,
        period: BillingPeriod,
        now: DateTime<Utc>,
    ) {
        match outcome {
            ApartmentOutcome::Created(fee) => {
                tracing::debug!(fee_id = %fee.id, name = %fee.name, amount = %fee.amount, "Generator: fee created");
                self.events.emit(BillingEvent::FeeGenerated {
                    fee_id: fee.id,
                    apartment_id: outcome.apartment_id(),
                    fee_type,
                    period,
                    amount: fee.amount,
                    timestamp: now,
                });
            }
            ApartmentOutcome::Skipped {
                apartment_id,
                reason,
                detail,
            } => {
                tracing::info!(apartment_id, reason = ?reason, detail = %detail, "Generator: apartment skipped");
                self.events.emit(BillingEvent::GenerationSkipped {
                    apartment_id: *apartment_id,
                    fee_type,
                    period,
                    reason: detail.clone(),
                    timestamp: now,
                });
            }
            ApartmentOutcome::Failed {
                apartment_id,
                error,
            } => {
                tracing::warn!(apartment_id, error = %error, "Generator: apartment failed");
                self.events.emit(BillingEvent::GenerationFailed {
                    apartment_id: *apartment_id,
                    fee_type,
                    period,
                    error: error.to_string(),
                    timestamp: now,
                });
            }
        }
    }

    /// recurring fees still awaiting payment, newest first
    pub fn unpaid_recurring_fees(&self, apartment_id: ApartmentId) -> Result<Vec<Fee>> {
        self.fees.unpaid_recurring_fees(apartment_id)
    }

    /// recurring fees generated for `period`
    pub fn fees_for_period(&self, period: BillingPeriod) -> Result<Vec<Fee>> {
        self.fees.recurring_fees_for_period(period)
    }

    /// recurring fees whose name contains `pattern`, e.g. `2025-06`
    pub fn search_fees(&self, pattern: &str) -> Result<Vec<Fee>> {
        self.fees.search_recurring_fees(pattern)
    }
}
