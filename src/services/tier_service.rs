// src/services/tier_service.rs

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::{clock::Clock, error::AppError},
    db::RentalStore,
    models::tier::{
        CustomerRentalStats, CustomerTier, NewCustomerTier, TierAssignment, TierAssignmentAction,
        TierAssignmentDetail, TierAssignmentReport,
    },
};

/// Primeira faixa (na ordem decrescente de limites) cujas duas condições o cliente atende.
pub fn select_tier<'a>(stats: &CustomerRentalStats, tiers: &'a [CustomerTier]) -> Option<&'a CustomerTier> {
    tiers.iter().find(|tier| tier.is_active && tier.is_met_by(stats))
}

// Resultado de uma gravação de faixa para um cliente
enum Applied {
    Created(TierAssignment),
    Reactivated(Uuid),
}

#[derive(Clone)]
pub struct CustomerTierAssignmentEngine {
    store: Arc<dyn RentalStore>,
    clock: Arc<dyn Clock>,
}

impl CustomerTierAssignmentEngine {
    pub fn new(store: Arc<dyn RentalStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    // --- RECÁLCULO EM LOTE ---

    /// Recalcula a faixa de todos os clientes. Uma transação por cliente;
    /// a falha de um não bloqueia os demais.
    pub async fn auto_assign_all(&self) -> Result<TierAssignmentReport, AppError> {
        let stats = self.store.customer_rental_stats().await?;
        let tiers = self.store.active_tiers().await?;
        let mut report = TierAssignmentReport::default();

        for customer in stats {
            let Some(tier) = select_tier(&customer, &tiers) else {
                report.skipped_count += 1;
                report.details.push(TierAssignmentDetail {
                    customer_id: customer.customer_id,
                    tier_id: None,
                    action: TierAssignmentAction::NoQualifyingTier,
                    error: None,
                });
                continue;
            };

            let (action, error) = match self.apply(customer.customer_id, tier.id, None).await {
                Ok(Applied::Created(_)) => {
                    report.created_count += 1;
                    (TierAssignmentAction::Created, None)
                }
                Ok(Applied::Reactivated(_)) => {
                    report.reactivated_count += 1;
                    (TierAssignmentAction::Reactivated, None)
                }
                Err(e) => {
                    tracing::warn!(customer_id = %customer.customer_id, error = %e, "Falha ao atribuir faixa");
                    report.failed_count += 1;
                    (TierAssignmentAction::Failed, Some(e.to_string()))
                }
            };

            report.details.push(TierAssignmentDetail {
                customer_id: customer.customer_id,
                tier_id: Some(tier.id),
                action,
                error,
            });
        }

        tracing::info!(
            created = report.created_count,
            reactivated = report.reactivated_count,
            skipped = report.skipped_count,
            failed = report.failed_count,
            "Recálculo de faixas concluído"
        );

        Ok(report)
    }

    async fn apply(
        &self,
        customer_id: Uuid,
        tier_id: Uuid,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Applied, AppError> {
        let mut tx = self.store.begin().await?;

        let applied = match tx.find_active_assignment(customer_id, tier_id).await? {
            // Já está na faixa: reativa sem duplicar, e garante que é a única ativa
            Some(existing) => {
                tx.reactivate_assignment(existing.id).await?;
                tx.deactivate_assignments(customer_id, Some(existing.id)).await?;
                Applied::Reactivated(existing.id)
            }
            None => {
                tx.deactivate_assignments(customer_id, None).await?;
                let created = tx
                    .insert_assignment(customer_id, tier_id, self.clock.now(), expires_at)
                    .await?;
                Applied::Created(created)
            }
        };

        tx.commit().await?;
        Ok(applied)
    }

    // --- OPERAÇÕES AVULSAS ---

    pub async fn create_tier(&self, payload: NewCustomerTier) -> Result<CustomerTier, AppError> {
        payload.validate()?;
        let tier = self.store.create_tier(&payload).await?;
        tracing::info!(tier_id = %tier.id, name = %tier.name, "Faixa criada");
        Ok(tier)
    }

    /// Atribuição manual, com a mesma regra de exclusividade do lote.
    pub async fn assign_tier(
        &self,
        customer_id: Uuid,
        tier_id: Uuid,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<TierAssignment, AppError> {
        match self.store.find_tier(tier_id).await? {
            Some(tier) if tier.is_active => {}
            _ => return Err(AppError::NotFound(format!("faixa {tier_id}"))),
        }

        match self.apply(customer_id, tier_id, expires_at).await? {
            Applied::Created(assignment) => Ok(assignment),
            Applied::Reactivated(id) => self
                .store
                .active_assignments_for(customer_id)
                .await?
                .into_iter()
                .find(|a| a.id == id)
                .ok_or_else(|| AppError::NotFound(format!("atribuição {id}"))),
        }
    }

    /// A atribuição ativa e não expirada do cliente, se houver.
    pub async fn current_assignment(&self, customer_id: Uuid) -> Result<Option<TierAssignment>, AppError> {
        let now = self.clock.now();
        Ok(self
            .store
            .active_assignments_for(customer_id)
            .await?
            .into_iter()
            .find(|a| a.is_current_at(now)))
    }
}
