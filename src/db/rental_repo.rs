// src/db/rental_repo.rs

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::store::{RentalStore, StoreTx},
    models::{
        asset::{AssetStatus, NewStatusHistoryEntry, RentalAsset, StatusHistoryEntry},
        rental::{RentalAgreement, RentalStatus},
        tier::{CustomerRentalStats, CustomerTier, NewCustomerTier, TierAssignment},
    },
};

const ASSET_COLUMNS: &str = "id, name, status, status_changed_at, created_at";
const AGREEMENT_COLUMNS: &str =
    "id, asset_id, customer_id, status, start_date, planned_return_date, actual_end_date, amount";
const TIER_COLUMNS: &str =
    "id, name, discount_percentage, min_rentals, min_total_spend, is_active";
const ASSIGNMENT_COLUMNS: &str = "id, customer_id, tier_id, assigned_at, expires_at, is_active";

// O repositório de locação: ativos, contratos, histórico e faixas de cliente
#[derive(Clone)]
pub struct RentalRepository {
    pool: PgPool,
}

impl RentalRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RentalStore for RentalRepository {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, AppError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgStoreTx { tx }))
    }

    async fn find_asset(&self, asset_id: Uuid) -> Result<Option<RentalAsset>, AppError> {
        let asset = sqlx::query_as::<_, RentalAsset>(&format!(
            "SELECT {ASSET_COLUMNS} FROM rental_assets WHERE id = $1"
        ))
        .bind(asset_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(asset)
    }

    async fn assets_in_status_since(
        &self,
        status: AssetStatus,
        changed_before: DateTime<Utc>,
    ) -> Result<Vec<RentalAsset>, AppError> {
        let assets = sqlx::query_as::<_, RentalAsset>(&format!(
            r#"
            SELECT {ASSET_COLUMNS}
            FROM rental_assets
            WHERE status = $1 AND status_changed_at <= $2
            ORDER BY status_changed_at ASC
            "#
        ))
        .bind(status)
        .bind(changed_before)
        .fetch_all(&self.pool)
        .await?;

        Ok(assets)
    }

    async fn history_for_asset(
        &self,
        asset_id: Uuid,
        limit: i64,
    ) -> Result<Vec<StatusHistoryEntry>, AppError> {
        let entries = sqlx::query_as::<_, StatusHistoryEntry>(
            r#"
            SELECT id, asset_id, previous_status, new_status, changed_by, changed_at, reason, notes
            FROM asset_status_history
            WHERE asset_id = $1
            ORDER BY changed_at DESC, seq DESC
            LIMIT $2
            "#,
        )
        .bind(asset_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    async fn reservations_starting_by(
        &self,
        today: NaiveDate,
    ) -> Result<Vec<RentalAgreement>, AppError> {
        let agreements = sqlx::query_as::<_, RentalAgreement>(&format!(
            r#"
            SELECT {AGREEMENT_COLUMNS}
            FROM rental_agreements
            WHERE status = 'reserved' AND start_date <= $1
            ORDER BY start_date ASC
            "#
        ))
        .bind(today)
        .fetch_all(&self.pool)
        .await?;

        Ok(agreements)
    }

    async fn active_agreements_due_before(
        &self,
        today: NaiveDate,
    ) -> Result<Vec<RentalAgreement>, AppError> {
        // Estritamente antes de hoje: devolução prevista para hoje ainda não está atrasada
        let agreements = sqlx::query_as::<_, RentalAgreement>(&format!(
            r#"
            SELECT {AGREEMENT_COLUMNS}
            FROM rental_agreements
            WHERE status = 'active'
              AND COALESCE(actual_end_date, planned_return_date) < $1
            ORDER BY planned_return_date ASC
            "#
        ))
        .bind(today)
        .fetch_all(&self.pool)
        .await?;

        Ok(agreements)
    }

    async fn customer_rental_stats(&self) -> Result<Vec<CustomerRentalStats>, AppError> {
        let stats = sqlx::query_as::<_, CustomerRentalStats>(
            r#"
            SELECT
                c.id AS customer_id,
                COUNT(ra.id) AS rental_count,
                COALESCE(SUM(ra.amount), 0) AS total_spent
            FROM customers c
            LEFT JOIN rental_agreements ra ON ra.customer_id = c.id
            GROUP BY c.id
            ORDER BY c.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(stats)
    }

    async fn active_tiers(&self) -> Result<Vec<CustomerTier>, AppError> {
        let tiers = sqlx::query_as::<_, CustomerTier>(&format!(
            r#"
            SELECT {TIER_COLUMNS}
            FROM customer_tiers
            WHERE is_active = true
            ORDER BY min_rentals DESC, min_total_spend DESC
            "#
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(tiers)
    }

    async fn find_tier(&self, tier_id: Uuid) -> Result<Option<CustomerTier>, AppError> {
        let tier = sqlx::query_as::<_, CustomerTier>(&format!(
            "SELECT {TIER_COLUMNS} FROM customer_tiers WHERE id = $1"
        ))
        .bind(tier_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(tier)
    }

    async fn create_tier(&self, tier: &NewCustomerTier) -> Result<CustomerTier, AppError> {
        let created = sqlx::query_as::<_, CustomerTier>(&format!(
            r#"
            INSERT INTO customer_tiers (name, discount_percentage, min_rentals, min_total_spend)
            VALUES ($1, $2, $3, $4)
            RETURNING {TIER_COLUMNS}
            "#
        ))
        .bind(&tier.name)
        .bind(tier.discount_percentage)
        .bind(tier.min_rentals)
        .bind(tier.min_total_spend)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn active_assignments_for(
        &self,
        customer_id: Uuid,
    ) -> Result<Vec<TierAssignment>, AppError> {
        let assignments = sqlx::query_as::<_, TierAssignment>(&format!(
            r#"
            SELECT {ASSIGNMENT_COLUMNS}
            FROM customer_tier_assignments
            WHERE customer_id = $1 AND is_active = true
            ORDER BY assigned_at DESC
            "#
        ))
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(assignments)
    }

    async fn elevated_user_ids(&self) -> Result<Vec<Uuid>, AppError> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id FROM users
            WHERE is_active = true AND role IN ('administrator', 'manager')
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}

// Transação curta: cada método relê/escreve na mesma conexão
pub struct PgStoreTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgStoreTx {
    async fn lock_asset(&mut self, asset_id: Uuid) -> Result<Option<RentalAsset>, AppError> {
        let asset = sqlx::query_as::<_, RentalAsset>(&format!(
            "SELECT {ASSET_COLUMNS} FROM rental_assets WHERE id = $1 FOR UPDATE"
        ))
        .bind(asset_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(asset)
    }

    async fn set_asset_status(
        &mut self,
        asset_id: Uuid,
        status: AssetStatus,
        changed_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE rental_assets SET status = $1, status_changed_at = $2 WHERE id = $3",
        )
        .bind(status)
        .bind(changed_at)
        .bind(asset_id)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("ativo {asset_id}")));
        }
        Ok(())
    }

    async fn append_history(
        &mut self,
        entry: NewStatusHistoryEntry,
    ) -> Result<StatusHistoryEntry, AppError> {
        let saved = sqlx::query_as::<_, StatusHistoryEntry>(
            r#"
            INSERT INTO asset_status_history (
                asset_id, previous_status, new_status, changed_by, changed_at, reason, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, asset_id, previous_status, new_status, changed_by, changed_at, reason, notes
            "#,
        )
        .bind(entry.asset_id)
        .bind(entry.previous_status)
        .bind(entry.new_status)
        .bind(entry.changed_by)
        .bind(entry.changed_at)
        .bind(entry.reason)
        .bind(entry.notes)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(saved)
    }

    async fn lock_agreement(
        &mut self,
        agreement_id: Uuid,
    ) -> Result<Option<RentalAgreement>, AppError> {
        let agreement = sqlx::query_as::<_, RentalAgreement>(&format!(
            "SELECT {AGREEMENT_COLUMNS} FROM rental_agreements WHERE id = $1 FOR UPDATE"
        ))
        .bind(agreement_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(agreement)
    }

    async fn set_agreement_status(
        &mut self,
        agreement_id: Uuid,
        status: RentalStatus,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE rental_agreements SET status = $1, updated_at = NOW() WHERE id = $2")
            .bind(status)
            .bind(agreement_id)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn find_active_assignment(
        &mut self,
        customer_id: Uuid,
        tier_id: Uuid,
    ) -> Result<Option<TierAssignment>, AppError> {
        let assignment = sqlx::query_as::<_, TierAssignment>(&format!(
            r#"
            SELECT {ASSIGNMENT_COLUMNS}
            FROM customer_tier_assignments
            WHERE customer_id = $1 AND tier_id = $2 AND is_active = true
            ORDER BY assigned_at DESC
            LIMIT 1
            FOR UPDATE
            "#
        ))
        .bind(customer_id)
        .bind(tier_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(assignment)
    }

    async fn reactivate_assignment(&mut self, assignment_id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE customer_tier_assignments SET is_active = true, expires_at = NULL WHERE id = $1",
        )
        .bind(assignment_id)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn deactivate_assignments(
        &mut self,
        customer_id: Uuid,
        keep: Option<Uuid>,
    ) -> Result<u64, AppError> {
        // `IS DISTINCT FROM` trata o NULL de `keep` como "não preserva nenhuma"
        let result = sqlx::query(
            r#"
            UPDATE customer_tier_assignments
            SET is_active = false
            WHERE customer_id = $1 AND is_active = true AND id IS DISTINCT FROM $2
            "#,
        )
        .bind(customer_id)
        .bind(keep)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected())
    }

    async fn insert_assignment(
        &mut self,
        customer_id: Uuid,
        tier_id: Uuid,
        assigned_at: DateTime<Utc>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<TierAssignment, AppError> {
        let assignment = sqlx::query_as::<_, TierAssignment>(&format!(
            r#"
            INSERT INTO customer_tier_assignments (customer_id, tier_id, assigned_at, expires_at, is_active)
            VALUES ($1, $2, $3, $4, true)
            RETURNING {ASSIGNMENT_COLUMNS}
            "#
        ))
        .bind(customer_id)
        .bind(tier_id)
        .bind(assigned_at)
        .bind(expires_at)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(assignment)
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        self.tx.commit().await?;
        Ok(())
    }
}
