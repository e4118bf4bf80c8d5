use thiserror::Error;

use crate::decimal::Money;
use crate::types::{ApartmentId, FeeId, FeeType, PaymentRecordId, ResidentId, VehicleCategory};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BillingError {
    #[error("fee already exists: {name} (apartment {apartment_id})")]
    DuplicateFee {
        name: String,
        apartment_id: ApartmentId,
    },

    #[error("no billable basis for apartment {apartment_id}: {reason}")]
    NoBillableBasis {
        apartment_id: ApartmentId,
        reason: String,
    },

    #[error("invalid parameter: {message}")]
    InvalidParameter {
        message: String,
    },

    #[error("apartment not found: {id}")]
    ApartmentNotFound {
        id: ApartmentId,
    },

    #[error("fee not found: {id}")]
    FeeNotFound {
        id: FeeId,
    },

    #[error("resident not found: {id}")]
    ResidentNotFound {
        id: ResidentId,
    },

    #[error("payment record not found: {id}")]
    PaymentRecordNotFound {
        id: PaymentRecordId,
    },

    #[error("no active price setting for vehicle category {category}")]
    PriceSettingNotFound {
        category: VehicleCategory,
    },

    #[error("over-payment: fee amount {fee_amount}, already paid {already_paid}, provided {provided}")]
    OverPayment {
        fee_amount: Money,
        already_paid: Money,
        provided: Money,
    },

    #[error("payment less than minimum: minimum {minimum}, provided {provided}")]
    UnderPayment {
        minimum: Money,
        provided: Money,
    },

    #[error("fee {fee_id} is already fully settled")]
    FeeAlreadySettled {
        fee_id: FeeId,
    },

    #[error("cannot {operation} fee '{name}' ({fee_id}): payment already recorded")]
    UpdateRestricted {
        fee_id: FeeId,
        name: String,
        operation: String,
    },

    #[error("unsupported fee type: {fee_type}")]
    UnsupportedFeeType {
        fee_type: FeeType,
    },

    #[error("invalid configuration: {message}")]
    InvalidConfiguration {
        message: String,
    },

    #[error("storage error: {message}")]
    Storage {
        message: String,
    },
}

impl BillingError {
    /// conditions a batch run records as a skip rather than a failure
    pub fn is_batch_skip(&self) -> bool {
        matches!(
            self,
            BillingError::DuplicateFee { .. } | BillingError::NoBillableBasis { .. }
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            BillingError::ApartmentNotFound { .. }
                | BillingError::FeeNotFound { .. }
                | BillingError::ResidentNotFound { .. }
                | BillingError::PaymentRecordNotFound { .. }
                | BillingError::PriceSettingNotFound { .. }
        )
    }

    pub fn is_settlement_violation(&self) -> bool {
        matches!(
            self,
            BillingError::OverPayment { .. }
                | BillingError::UnderPayment { .. }
                | BillingError::FeeAlreadySettled { .. }
        )
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        BillingError::InvalidParameter {
            message: message.into(),
        }
    }

    pub(crate) fn storage(message: impl Into<String>) -> Self {
        BillingError::Storage {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BillingError>;
