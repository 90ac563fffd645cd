// src/models/tier.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::{Validate, ValidationError};

// Faixa de desconto do cliente (dado de referência, editável)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CustomerTier {
    pub id: Uuid,
    pub name: String,
    pub discount_percentage: Decimal,
    pub min_rentals: i32,
    pub min_total_spend: Decimal,
    pub is_active: bool,
}

impl CustomerTier {
    /// As duas condições precisam ser atendidas (E lógico).
    pub fn is_met_by(&self, stats: &CustomerRentalStats) -> bool {
        stats.rental_count >= i64::from(self.min_rentals) && stats.total_spent >= self.min_total_spend
    }
}

// Payload para criar uma faixa
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewCustomerTier {
    #[validate(length(min = 1, max = 100, message = "O nome deve ter entre 1 e 100 caracteres."))]
    pub name: String,

    #[validate(custom(function = "validate_percentage"))]
    pub discount_percentage: Decimal,

    #[validate(range(min = 0, message = "O mínimo de locações não pode ser negativo."))]
    pub min_rentals: i32,

    #[validate(custom(function = "validate_non_negative"))]
    pub min_total_spend: Decimal,
}

fn validate_percentage(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO || *value > Decimal::ONE_HUNDRED {
        let mut err = ValidationError::new("percentage");
        err.message = Some("O desconto deve estar entre 0 e 100.".into());
        return Err(err);
    }
    Ok(())
}

fn validate_non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO {
        let mut err = ValidationError::new("non_negative");
        err.message = Some("O gasto mínimo não pode ser negativo.".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TierAssignment {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub tier_id: Uuid,
    pub assigned_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl TierAssignment {
    pub fn is_current_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at.is_none_or(|exp| exp > now)
    }
}

// Histórico agregado de locações de um cliente (todos os clientes, mesmo sem locação)
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CustomerRentalStats {
    pub customer_id: Uuid,
    pub rental_count: i64,
    pub total_spent: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TierAssignmentAction {
    Created,
    Reactivated,
    NoQualifyingTier,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierAssignmentDetail {
    pub customer_id: Uuid,
    pub tier_id: Option<Uuid>,
    pub action: TierAssignmentAction,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierAssignmentReport {
    // Clientes que ganharam uma atribuição nova (reativações não contam)
    pub created_count: usize,
    pub reactivated_count: usize,
    pub skipped_count: usize,
    pub failed_count: usize,
    pub details: Vec<TierAssignmentDetail>,
}
