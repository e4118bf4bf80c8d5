/// serializable views for collaborators (http layer, reports)
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::fees::Fee;
use crate::generator::{ApartmentOutcome, GenerationReport, SkipReason};
use crate::payments::{DebtStatus, PaymentRecord};
use crate::types::{ApartmentId, FeeId, FeeType, PaymentRecordId, ResidentId, SettlementRule};

/// serializable view of a fee
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeView {
    pub id: FeeId,
    pub name: String,
    pub description: Option<String>,
    pub fee_type: FeeType,
    pub settlement_rule: SettlementRule,
    pub amount: Money,
    pub unit_price: Option<Money>,
    pub unit_label: String,
    pub apartment_id: Option<ApartmentId>,
    /// `YYYY-MM` for generated fees
    pub billing_period: Option<String>,
    pub is_recurring: bool,
    pub is_active: bool,
    pub effective_from: Option<NaiveDate>,
    pub effective_to: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl FeeView {
    pub fn from_fee(fee: &Fee) -> Self {
        FeeView {
            id: fee.id,
            name: fee.name.clone(),
            description: fee.description.clone(),
            fee_type: fee.fee_type,
            settlement_rule: fee.fee_type.settlement_rule(),
            amount: fee.amount,
            unit_price: fee.unit_price,
            unit_label: fee.fee_type.unit_label().to_string(),
            apartment_id: fee.apartment_id,
            billing_period: fee.period().map(|p| p.to_string()),
            is_recurring: fee.is_recurring,
            is_active: fee.is_active,
            effective_from: fee.effective_from,
            effective_to: fee.effective_to,
            created_at: fee.created_at,
            updated_at: fee.updated_at,
        }
    }

    /// convert to pretty-printed json string
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// payment record with the settlement state of its fee
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecordResponse {
    pub id: PaymentRecordId,
    pub payer_id: ResidentId,
    pub fee_id: FeeId,
    pub fee_name: String,
    pub apartment_id: ApartmentId,
    pub payment_date: NaiveDate,
    pub amount: Money,
    pub payment_count: u32,
    pub notes: Option<String>,
    pub fee_amount: Money,
    pub is_fully_paid: bool,
    pub remaining_amount: Money,
    pub fee_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl PaymentRecordResponse {
    pub fn new(record: &PaymentRecord, fee: &Fee) -> Self {
        let status = DebtStatus::compute(fee, record.amount);
        PaymentRecordResponse {
            id: record.id,
            payer_id: record.payer_id,
            fee_id: record.fee_id,
            fee_name: fee.name.clone(),
            apartment_id: record.apartment_id,
            payment_date: record.payment_date,
            amount: record.amount,
            payment_count: record.payment_count,
            notes: record.notes.clone(),
            fee_amount: fee.amount,
            is_fully_paid: status.is_fully_paid,
            remaining_amount: status.remaining_amount,
            fee_active: fee.is_active,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedView {
    pub apartment_id: ApartmentId,
    pub reason: SkipReason,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedView {
    pub apartment_id: ApartmentId,
    pub error: String,
}

/// counts and per-apartment detail of a generation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationSummary {
    pub fee_type: FeeType,
    pub billing_period: String,
    pub label: Option<String>,
    pub created: usize,
    pub skipped: usize,
    pub failed: usize,
    pub total_amount: Money,
    pub fees: Vec<FeeView>,
    pub skipped_apartments: Vec<SkippedView>,
    pub failed_apartments: Vec<FailedView>,
}

impl GenerationSummary {
    pub fn from_report(report: &GenerationReport) -> Self {
        let mut fees = Vec::new();
        let mut skipped_apartments = Vec::new();
        let mut failed_apartments = Vec::new();

        for outcome in &report.outcomes {
            match outcome {
                ApartmentOutcome::Created(fee) => fees.push(FeeView::from_fee(fee)),
                ApartmentOutcome::Skipped {
                    apartment_id,
                    reason,
                    detail,
                } => skipped_apartments.push(SkippedView {
                    apartment_id: *apartment_id,
                    reason: *reason,
                    detail: detail.clone(),
                }),
                ApartmentOutcome::Failed {
                    apartment_id,
                    error,
                } => failed_apartments.push(FailedView {
                    apartment_id: *apartment_id,
                    error: error.to_string(),
                }),
            }
        }

        GenerationSummary {
            fee_type: report.fee_type,
            billing_period: report.period.to_string(),
            label: report.label.clone(),
            created: fees.len(),
            skipped: skipped_apartments.len(),
            failed: failed_apartments.len(),
            total_amount: fees.iter().map(|f| f.amount).sum(),
            fees,
            skipped_apartments,
            failed_apartments,
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::BillingError;
    use crate::fees::{FeeFactory, FeeKey};
    use crate::types::BillingPeriod;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn generated_fee() -> Fee {
        let period = BillingPeriod::new(2025, 6).unwrap();
        FeeFactory::monthly(Utc.with_ymd_and_hms(2025, 6, 1, 1, 0, 0).unwrap())
            .key(FeeKey::new(FeeType::FloorArea, period, 101, None))
            .name("Floor area fee 2025-06 (apartment: 101)")
            .amount(Money::from_major(1_132_500))
            .unit_price(Some(Money::from_major(15_000)))
            .build()
            .unwrap()
    }

    #[test]
    fn test_fee_view_json() {
        let view = FeeView::from_fee(&generated_fee());
        assert_eq!(view.billing_period.as_deref(), Some("2025-06"));
        assert_eq!(view.settlement_rule, SettlementRule::Exact);

        let json = view.to_json_pretty().unwrap();
        assert!(json.contains("\"fee_type\": \"FLOOR_AREA\""));
        assert!(json.contains("\"amount\": \"1132500\""));
    }

    #[test]
    fn test_payment_response_reports_debt() {
        let fee = generated_fee();
        let record = PaymentRecord {
            id: Uuid::new_v4(),
            payer_id: 7,
            fee_id: fee.id,
            apartment_id: 101,
            payment_date: NaiveDate::from_ymd_opt(2025, 6, 10).unwrap(),
            amount: Money::from_major(132_500),
            payment_count: 1,
            notes: None,
            created_at: Utc.with_ymd_and_hms(2025, 6, 10, 9, 0, 0).unwrap(),
            updated_at: None,
        };

        let response = PaymentRecordResponse::new(&record, &fee);
        assert!(!response.is_fully_paid);
        assert_eq!(response.remaining_amount, Money::from_major(1_000_000));
        assert!(response.fee_active);
    }

    #[test]
    fn test_generation_summary() {
        let report = GenerationReport {
            fee_type: FeeType::FloorArea,
            period: BillingPeriod::new(2025, 6).unwrap(),
            label: None,
            outcomes: vec![
                ApartmentOutcome::Created(generated_fee()),
                ApartmentOutcome::Skipped {
                    apartment_id: 102,
                    reason: SkipReason::AlreadyBilled,
                    detail: "Floor area fee 2025-06 (apartment: 102)".to_string(),
                },
                ApartmentOutcome::Failed {
                    apartment_id: 103,
                    error: BillingError::invalid("needs a positive unit price"),
                },
            ],
        };

        let summary = GenerationSummary::from_report(&report);
        assert_eq!((summary.created, summary.skipped, summary.failed), (1, 1, 1));
        assert_eq!(summary.total_amount, Money::from_major(1_132_500));
        assert_eq!(summary.billing_period, "2025-06");
        assert!(summary.failed_apartments[0].error.contains("unit price"));
        assert!(summary.to_json_pretty().unwrap().contains("AlreadyBilled"));
    }
}
