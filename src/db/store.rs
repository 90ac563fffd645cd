// src/db/store.rs

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        asset::{AssetStatus, NewStatusHistoryEntry, RentalAsset, StatusHistoryEntry, TransitionRule},
        rental::{RentalAgreement, RentalStatus},
        tier::{CustomerRentalStats, CustomerTier, NewCustomerTier, TierAssignment},
    },
};

/// Consulta somente-leitura das arestas permitidas no grafo de status.
#[async_trait]
pub trait TransitionRuleStore: Send + Sync {
    /// A regra `from -> to`, se existir.
    async fn rule_for(
        &self,
        from: AssetStatus,
        to: AssetStatus,
    ) -> Result<Option<TransitionRule>, AppError>;

    /// Regras com disparo automático, na ordem em que devem ser avaliadas.
    async fn auto_rules(&self) -> Result<Vec<TransitionRule>, AppError>;
}

/// Leituras fora de transação (as consultas "quem está vencido") e abertura de
/// transações curtas, uma por ativo/contrato/cliente.
#[async_trait]
pub trait RentalStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, AppError>;

    async fn find_asset(&self, asset_id: Uuid) -> Result<Option<RentalAsset>, AppError>;

    /// Ativos em `status` cuja última mudança foi em `changed_before` ou antes.
    async fn assets_in_status_since(
        &self,
        status: AssetStatus,
        changed_before: DateTime<Utc>,
    ) -> Result<Vec<RentalAsset>, AppError>;

    /// Histórico do ativo, do mais novo para o mais antigo.
    async fn history_for_asset(
        &self,
        asset_id: Uuid,
        limit: i64,
    ) -> Result<Vec<StatusHistoryEntry>, AppError>;

    /// Reservas com início em `today` ou antes.
    async fn reservations_starting_by(
        &self,
        today: NaiveDate,
    ) -> Result<Vec<RentalAgreement>, AppError>;

    /// Locações ativas cuja data de devolução efetiva é anterior a `today`.
    async fn active_agreements_due_before(
        &self,
        today: NaiveDate,
    ) -> Result<Vec<RentalAgreement>, AppError>;

    async fn customer_rental_stats(&self) -> Result<Vec<CustomerRentalStats>, AppError>;

    /// Faixas ativas, ordenadas por (min_rentals, min_total_spend) decrescente.
    async fn active_tiers(&self) -> Result<Vec<CustomerTier>, AppError>;

    async fn find_tier(&self, tier_id: Uuid) -> Result<Option<CustomerTier>, AppError>;

    async fn create_tier(&self, tier: &NewCustomerTier) -> Result<CustomerTier, AppError>;

    async fn active_assignments_for(
        &self,
        customer_id: Uuid,
    ) -> Result<Vec<TierAssignment>, AppError>;

    /// Usuários ativos com cargo de administrador ou gerente.
    async fn elevated_user_ids(&self) -> Result<Vec<Uuid>, AppError>;
}

/// Uma transação aberta. `commit` confirma; descartar sem commit desfaz tudo.
#[async_trait]
pub trait StoreTx: Send {
    /// Relê o ativo com bloqueio de linha.
    async fn lock_asset(&mut self, asset_id: Uuid) -> Result<Option<RentalAsset>, AppError>;

    async fn set_asset_status(
        &mut self,
        asset_id: Uuid,
        status: AssetStatus,
        changed_at: DateTime<Utc>,
    ) -> Result<(), AppError>;

    async fn append_history(
        &mut self,
        entry: NewStatusHistoryEntry,
    ) -> Result<StatusHistoryEntry, AppError>;

    /// Relê o contrato com bloqueio de linha.
    async fn lock_agreement(
        &mut self,
        agreement_id: Uuid,
    ) -> Result<Option<RentalAgreement>, AppError>;

    async fn set_agreement_status(
        &mut self,
        agreement_id: Uuid,
        status: RentalStatus,
    ) -> Result<(), AppError>;

    async fn find_active_assignment(
        &mut self,
        customer_id: Uuid,
        tier_id: Uuid,
    ) -> Result<Option<TierAssignment>, AppError>;

    /// Marca como ativa e limpa a expiração.
    async fn reactivate_assignment(&mut self, assignment_id: Uuid) -> Result<(), AppError>;

    /// Desativa as atribuições ativas do cliente, exceto `keep` (se informado).
    /// Retorna quantas linhas foram desativadas.
    async fn deactivate_assignments(
        &mut self,
        customer_id: Uuid,
        keep: Option<Uuid>,
    ) -> Result<u64, AppError>;

    async fn insert_assignment(
        &mut self,
        customer_id: Uuid,
        tier_id: Uuid,
        assigned_at: DateTime<Utc>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<TierAssignment, AppError>;

    async fn commit(self: Box<Self>) -> Result<(), AppError>;
}
