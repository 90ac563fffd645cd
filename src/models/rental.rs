// src/models/rental.rs

use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// Mapeia o CREATE TYPE rental_status do banco
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "rental_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RentalStatus {
    Reserved,
    Active,
    Overdue,
    Returned,
}

impl fmt::Display for RentalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RentalStatus::Reserved => "reserved",
            RentalStatus::Active => "active",
            RentalStatus::Overdue => "overdue",
            RentalStatus::Returned => "returned",
        };
        f.write_str(s)
    }
}

// Reserva/locação de um ativo para um cliente num intervalo de datas
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RentalAgreement {
    pub id: Uuid,
    pub asset_id: Uuid,
    pub customer_id: Uuid,
    pub status: RentalStatus,
    pub start_date: NaiveDate,
    pub planned_return_date: NaiveDate,
    pub actual_end_date: Option<NaiveDate>,
    pub amount: Decimal,
}

impl RentalAgreement {
    /// Data de devolução que vale: a real, se houver, senão a prevista.
    pub fn effective_due_date(&self) -> NaiveDate {
        self.actual_end_date.unwrap_or(self.planned_return_date)
    }

    pub fn is_overdue_on(&self, today: NaiveDate) -> bool {
        self.status == RentalStatus::Active && self.effective_due_date() < today
    }

    pub fn is_startable_on(&self, today: NaiveDate) -> bool {
        self.status == RentalStatus::Reserved && self.start_date <= today
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agreement(status: RentalStatus, planned: NaiveDate, actual: Option<NaiveDate>) -> RentalAgreement {
        RentalAgreement {
            id: Uuid::new_v4(),
            asset_id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            status,
            start_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            planned_return_date: planned,
            actual_end_date: actual,
            amount: Decimal::from(100),
        }
    }

    #[test]
    fn overdue_only_counts_strictly_past_dates() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let yesterday = today.pred_opt().unwrap();

        assert!(!agreement(RentalStatus::Active, today, None).is_overdue_on(today));
        assert!(agreement(RentalStatus::Active, yesterday, None).is_overdue_on(today));
        // Já atrasado não é reprocessado
        assert!(!agreement(RentalStatus::Overdue, yesterday, None).is_overdue_on(today));
    }

    #[test]
    fn actual_end_date_overrides_the_planned_one() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let a = agreement(
            RentalStatus::Active,
            today.succ_opt().unwrap(),
            Some(today.pred_opt().unwrap()),
        );
        assert_eq!(a.effective_due_date(), today.pred_opt().unwrap());
        assert!(a.is_overdue_on(today));
    }
}
