// src/services/notification_service.rs

use async_trait::async_trait;
use sqlx::PgPool;

use crate::{common::error::AppError, models::notification::Notification};

/// Porta de saída "avise o usuário X do evento Y". A entrega (push em tempo
/// real, e-mail) fica fora daqui; quem chama nunca propaga a falha.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), AppError>;
}

// Persiste na tabela 'notifications'; o front busca/escuta de lá
#[derive(Clone)]
pub struct PgNotificationDispatcher {
    pool: PgPool,
}

impl PgNotificationDispatcher {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationDispatcher for PgNotificationDispatcher {
    async fn notify(&self, notification: &Notification) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO notifications (
                user_id, title_key, message_key, params, severity,
                related_entity_type, related_entity_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(notification.user_id)
        .bind(&notification.title_key)
        .bind(&notification.message_key)
        .bind(&notification.params)
        .bind(notification.severity)
        .bind(&notification.related_entity_type)
        .bind(notification.related_entity_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::NotificationDelivery(e.to_string()))?;

        Ok(())
    }
}

/// Envia tudo o que der; falhas viram log e não interrompem os demais envios.
/// Retorna quantas notificações foram entregues.
pub async fn dispatch_best_effort(
    dispatcher: &dyn NotificationDispatcher,
    notifications: Vec<Notification>,
) -> usize {
    let mut delivered = 0;
    for notification in notifications {
        match dispatcher.notify(&notification).await {
            Ok(()) => delivered += 1,
            Err(e) => {
                tracing::warn!(
                    user_id = %notification.user_id,
                    title_key = %notification.title_key,
                    error = %e,
                    "Falha ao enviar notificação (ignorada)"
                );
            }
        }
    }
    delivered
}
