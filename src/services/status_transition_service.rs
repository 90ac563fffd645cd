// src/services/status_transition_service.rs

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Duration;
use serde_json::json;
use uuid::Uuid;

use crate::{
    common::{clock::Clock, error::AppError},
    db::{RentalStore, TransitionRuleStore},
    models::{
        asset::{
            AssetStatus, AutoTransitionOutcome, DueTransition, NewStatusHistoryEntry, RentalAsset,
            StatusHistoryEntry, TransitionRequest,
        },
        notification::{Notification, NotificationSeverity},
    },
    services::{
        approval::ApprovalPolicy,
        notification_service::{dispatch_best_effort, NotificationDispatcher},
    },
};

pub const AUTO_TRANSITION_REASON: &str = "automatic transition after time elapsed";

// Status que geram aviso para administradores/gerentes
struct StatusAlert {
    title_key: &'static str,
    message_key: &'static str,
    severity: NotificationSeverity,
}

fn status_alert(status: AssetStatus) -> Option<StatusAlert> {
    let alert = match status {
        AssetStatus::Cleaning => StatusAlert {
            title_key: "notifications.asset.cleaning.title",
            message_key: "notifications.asset.cleaning.message",
            severity: NotificationSeverity::Info,
        },
        AssetStatus::Inspection => StatusAlert {
            title_key: "notifications.asset.inspection.title",
            message_key: "notifications.asset.inspection.message",
            severity: NotificationSeverity::Info,
        },
        AssetStatus::Repair => StatusAlert {
            title_key: "notifications.asset.repair.title",
            message_key: "notifications.asset.repair.message",
            severity: NotificationSeverity::Warning,
        },
        AssetStatus::Quarantine => StatusAlert {
            title_key: "notifications.asset.quarantine.title",
            message_key: "notifications.asset.quarantine.message",
            severity: NotificationSeverity::Error,
        },
        AssetStatus::Retired => StatusAlert {
            title_key: "notifications.asset.retired.title",
            message_key: "notifications.asset.retired.message",
            severity: NotificationSeverity::Warning,
        },
        // Sem mapeamento = sem aviso
        _ => return None,
    };
    Some(alert)
}

#[derive(Clone)]
pub struct StatusTransitionManager {
    store: Arc<dyn RentalStore>,
    rules: Arc<dyn TransitionRuleStore>,
    approvals: Arc<dyn ApprovalPolicy>,
    notifier: Arc<dyn NotificationDispatcher>,
    clock: Arc<dyn Clock>,
}

impl StatusTransitionManager {
    pub fn new(
        store: Arc<dyn RentalStore>,
        rules: Arc<dyn TransitionRuleStore>,
        approvals: Arc<dyn ApprovalPolicy>,
        notifier: Arc<dyn NotificationDispatcher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            rules,
            approvals,
            notifier,
            clock,
        }
    }

    // --- TRANSIÇÃO ---

    /// Valida e aplica uma mudança de status. O aviso pós-commit nunca desfaz a mudança.
    pub async fn transition(&self, request: TransitionRequest) -> Result<StatusHistoryEntry, AppError> {
        let (asset, entry) = self.apply(&request).await?;

        tracing::info!(
            asset_id = %entry.asset_id,
            from = %entry.previous_status,
            to = %entry.new_status,
            actor = ?entry.changed_by,
            "Status do ativo alterado"
        );

        self.notify_status_change(&asset, &entry).await;
        Ok(entry)
    }

    async fn apply(
        &self,
        request: &TransitionRequest,
    ) -> Result<(RentalAsset, StatusHistoryEntry), AppError> {
        // 1. Inicia Transação (drop sem commit = rollback)
        let mut tx = self.store.begin().await?;

        // 2. Relê o status atual com lock, fecha a corrida com outra transição
        let asset = tx
            .lock_asset(request.asset_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("ativo {}", request.asset_id)))?;

        if let Some(expected) = request.expected_status {
            if asset.status != expected {
                return Err(AppError::ConcurrentModification(format!(
                    "ativo {} está em {}, esperado {}",
                    asset.id, asset.status, expected
                )));
            }
        }

        // 3. A aresta precisa existir no grafo; de um status terminal não se sai
        let from = asset.status;
        let to = request.target_status;
        if from.is_terminal() {
            return Err(AppError::InvalidTransition { from, to });
        }
        let rule = self
            .rules
            .rule_for(from, to)
            .await?
            .ok_or(AppError::InvalidTransition { from, to })?;

        // 4. Aprovação: exige ator, a autoridade é da política injetada
        if rule.requires_approval {
            let actor = request.actor_id.ok_or(AppError::ApprovalRequired { from, to })?;
            if !self.approvals.can_approve(actor, from, to).await? {
                return Err(AppError::ApprovalDenied { from, to });
            }
        }

        // 5. Status + histórico na mesma transação
        let now = self.clock.now();
        tx.set_asset_status(asset.id, to, now).await?;
        let entry = tx
            .append_history(NewStatusHistoryEntry {
                asset_id: asset.id,
                previous_status: from,
                new_status: to,
                changed_by: request.actor_id,
                changed_at: now,
                reason: request.reason.clone(),
                notes: request.notes.clone(),
            })
            .await?;

        // 6. Commit
        tx.commit().await?;

        Ok((asset, entry))
    }

    async fn notify_status_change(&self, asset: &RentalAsset, entry: &StatusHistoryEntry) {
        let Some(alert) = status_alert(entry.new_status) else {
            return;
        };

        let recipients = match self.store.elevated_user_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::warn!(asset_id = %asset.id, error = %e, "Não foi possível buscar destinatários");
                return;
            }
        };

        let params = json!({
            "assetId": asset.id,
            "assetName": asset.name,
            "previousStatus": entry.previous_status,
            "newStatus": entry.new_status,
            "reason": entry.reason,
        });

        let notifications = recipients
            .into_iter()
            .map(|user_id| {
                Notification::new(user_id, alert.title_key, alert.message_key, params.clone(), alert.severity)
                    .related_to("rental_asset", asset.id)
            })
            .collect();

        dispatch_best_effort(self.notifier.as_ref(), notifications).await;
    }

    // --- HISTÓRICO ---

    pub async fn get_history(&self, asset_id: Uuid, limit: i64) -> Result<Vec<StatusHistoryEntry>, AppError> {
        if self.store.find_asset(asset_id).await?.is_none() {
            return Err(AppError::NotFound(format!("ativo {asset_id}")));
        }
        if limit <= 0 {
            return Ok(vec![]);
        }
        self.store.history_for_asset(asset_id, limit).await
    }

    // --- AUTO-TRANSIÇÕES ---

    /// Ativos cujo tempo no status atual atingiu o limite de alguma regra automática.
    /// Se mais de uma regra casar com o mesmo ativo, vale a primeira.
    pub async fn find_due_for_auto_transition(&self) -> Result<Vec<DueTransition>, AppError> {
        let now = self.clock.now();
        let mut seen = HashSet::new();
        let mut due = Vec::new();

        for rule in self.rules.auto_rules().await? {
            let Some(hours) = rule.auto_transition_after_hours.filter(|h| *h > 0) else {
                continue;
            };
            let cutoff = now - Duration::hours(i64::from(hours));

            for asset in self.store.assets_in_status_since(rule.from_status, cutoff).await? {
                if seen.insert(asset.id) {
                    due.push(DueTransition {
                        asset_id: asset.id,
                        from_status: rule.from_status,
                        to_status: rule.to_status,
                        after_hours: hours,
                    });
                }
            }
        }

        Ok(due)
    }

    /// Cada candidato é processado isoladamente; a falha de um não aborta os outros.
    pub async fn run_auto_transitions(&self) -> Result<Vec<AutoTransitionOutcome>, AppError> {
        let candidates = self.find_due_for_auto_transition().await?;
        let mut outcomes = Vec::with_capacity(candidates.len());

        for due in candidates {
            let request = TransitionRequest::new(due.asset_id, due.to_status)
                .reason(AUTO_TRANSITION_REASON)
                .expecting(due.from_status);

            let outcome = match self.transition(request).await {
                Ok(_) => AutoTransitionOutcome {
                    asset_id: due.asset_id,
                    from_status: due.from_status,
                    to_status: due.to_status,
                    success: true,
                    skipped: false,
                    error: None,
                },
                Err(e) => {
                    let skipped = e.is_concurrent_modification();
                    if skipped {
                        tracing::debug!(asset_id = %due.asset_id, reason = %e, "Auto-transição pulada");
                    } else {
                        tracing::warn!(asset_id = %due.asset_id, error = %e, "Auto-transição falhou");
                    }
                    AutoTransitionOutcome {
                        asset_id: due.asset_id,
                        from_status: due.from_status,
                        to_status: due.to_status,
                        success: false,
                        skipped,
                        error: Some(e.to_string()),
                    }
                }
            };
            outcomes.push(outcome);
        }

        Ok(outcomes)
    }
}
