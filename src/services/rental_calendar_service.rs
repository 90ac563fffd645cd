// src/services/rental_calendar_service.rs

use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::json;
use uuid::Uuid;

use crate::{
    common::{clock::Clock, error::AppError},
    db::RentalStore,
    models::{
        asset::{AssetStatus, NewStatusHistoryEntry},
        notification::{Notification, NotificationSeverity},
        rental::{RentalAgreement, RentalStatus},
        scheduler::JobDetail,
    },
    services::notification_service::{dispatch_best_effort, NotificationDispatcher},
};

pub const RESERVATION_ACTIVATED_REASON: &str = "reservation activated";

/// Jobs guiados pelo calendário: início de reservas e detecção de atraso.
/// Os dois são idempotentes: depois de processado, o contrato não casa mais
/// com o filtro de seleção.
#[derive(Clone)]
pub struct RentalCalendarService {
    store: Arc<dyn RentalStore>,
    notifier: Arc<dyn NotificationDispatcher>,
    clock: Arc<dyn Clock>,
}

impl RentalCalendarService {
    pub fn new(
        store: Arc<dyn RentalStore>,
        notifier: Arc<dyn NotificationDispatcher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { store, notifier, clock }
    }

    // --- ATIVAÇÃO DE RESERVAS ---

    pub async fn activate_reservations(&self, today: NaiveDate) -> Result<Vec<JobDetail>, AppError> {
        let due = self.store.reservations_starting_by(today).await?;
        if due.is_empty() {
            return Ok(vec![]);
        }

        let recipients = self.recipients().await;
        let mut details = Vec::with_capacity(due.len());

        for candidate in due {
            match self.activate_one(candidate.id, today).await {
                Ok(agreement) => {
                    tracing::info!(
                        agreement_id = %agreement.id,
                        asset_id = %agreement.asset_id,
                        "Reserva ativada"
                    );
                    self.notify_agreement(
                        &recipients,
                        &agreement,
                        "notifications.rental.activated.title",
                        "notifications.rental.activated.message",
                        NotificationSeverity::Info,
                        json!({
                            "agreementId": agreement.id,
                            "assetId": agreement.asset_id,
                            "customerId": agreement.customer_id,
                            "startDate": agreement.start_date,
                            "plannedReturnDate": agreement.planned_return_date,
                        }),
                    )
                    .await;
                    details.push(JobDetail::ok(agreement.id, "reserved -> active"));
                }
                Err(e) => details.push(Self::failure_detail(candidate.id, &e)),
            }
        }

        Ok(details)
    }

    async fn activate_one(&self, agreement_id: Uuid, today: NaiveDate) -> Result<RentalAgreement, AppError> {
        let mut tx = self.store.begin().await?;

        // 1. Relê o contrato; outro processo pode ter mexido desde a seleção
        let mut agreement = tx
            .lock_agreement(agreement_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("contrato {agreement_id}")))?;

        if !agreement.is_startable_on(today) {
            return Err(AppError::ConcurrentModification(format!(
                "contrato {agreement_id} agora está {}",
                agreement.status
            )));
        }

        // 2. Contrato -> active
        tx.set_agreement_status(agreement_id, RentalStatus::Active).await?;
        agreement.status = RentalStatus::Active;

        // 3. Ativo -> rented sem passar pelas regras: transição do agendador.
        // O histórico continua sendo gravado.
        let asset = tx
            .lock_asset(agreement.asset_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("ativo {}", agreement.asset_id)))?;

        if asset.status != AssetStatus::Rented {
            let now = self.clock.now();
            tx.set_asset_status(asset.id, AssetStatus::Rented, now).await?;
            tx.append_history(NewStatusHistoryEntry {
                asset_id: asset.id,
                previous_status: asset.status,
                new_status: AssetStatus::Rented,
                changed_by: None,
                changed_at: now,
                reason: Some(RESERVATION_ACTIVATED_REASON.to_string()),
                notes: Some(format!("contrato {agreement_id}")),
            })
            .await?;
        }

        tx.commit().await?;
        Ok(agreement)
    }

    // --- DETECÇÃO DE ATRASO ---

    pub async fn detect_overdue(&self, today: NaiveDate) -> Result<Vec<JobDetail>, AppError> {
        let due = self.store.active_agreements_due_before(today).await?;
        if due.is_empty() {
            return Ok(vec![]);
        }

        let recipients = self.recipients().await;
        let mut details = Vec::with_capacity(due.len());

        for candidate in due {
            match self.mark_overdue(candidate.id, today).await {
                Ok(agreement) => {
                    let due_date = agreement.effective_due_date();
                    tracing::info!(agreement_id = %agreement.id, %due_date, "Locação em atraso");
                    self.notify_agreement(
                        &recipients,
                        &agreement,
                        "notifications.rental.overdue.title",
                        "notifications.rental.overdue.message",
                        NotificationSeverity::Warning,
                        json!({
                            "agreementId": agreement.id,
                            "assetId": agreement.asset_id,
                            "customerId": agreement.customer_id,
                            "dueDate": due_date,
                            "daysOverdue": (today - due_date).num_days(),
                        }),
                    )
                    .await;
                    details.push(JobDetail::ok(agreement.id, "active -> overdue"));
                }
                Err(e) => details.push(Self::failure_detail(candidate.id, &e)),
            }
        }

        Ok(details)
    }

    async fn mark_overdue(&self, agreement_id: Uuid, today: NaiveDate) -> Result<RentalAgreement, AppError> {
        let mut tx = self.store.begin().await?;

        let mut agreement = tx
            .lock_agreement(agreement_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("contrato {agreement_id}")))?;

        if !agreement.is_overdue_on(today) {
            return Err(AppError::ConcurrentModification(format!(
                "contrato {agreement_id} não está mais em atraso ativo"
            )));
        }

        tx.set_agreement_status(agreement_id, RentalStatus::Overdue).await?;
        tx.commit().await?;

        agreement.status = RentalStatus::Overdue;
        Ok(agreement)
    }

    // --- Auxiliares ---

    async fn recipients(&self) -> Vec<Uuid> {
        self.store.elevated_user_ids().await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Não foi possível buscar destinatários; seguindo sem avisos");
            vec![]
        })
    }

    // Um aviso por contrato afetado, entregue a cada administrador/gerente ativo.
    // Sem destinatários elevados, o contrato é processado e nenhum aviso sai.
    async fn notify_agreement(
        &self,
        recipients: &[Uuid],
        agreement: &RentalAgreement,
        title_key: &str,
        message_key: &str,
        severity: NotificationSeverity,
        params: serde_json::Value,
    ) {
        let notifications = recipients
            .iter()
            .map(|user_id| {
                Notification::new(*user_id, title_key, message_key, params.clone(), severity)
                    .related_to("rental_agreement", agreement.id)
            })
            .collect();
        dispatch_best_effort(self.notifier.as_ref(), notifications).await;
    }

    fn failure_detail(agreement_id: Uuid, e: &AppError) -> JobDetail {
        if e.is_concurrent_modification() {
            tracing::debug!(%agreement_id, reason = %e, "Contrato pulado");
            JobDetail::failed(agreement_id, format!("skipped: {e}"))
        } else {
            tracing::warn!(%agreement_id, error = %e, "Falha ao processar contrato");
            JobDetail::failed(agreement_id, e.to_string())
        }
    }
}
