// src/models/notification.rs

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "notification_severity", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum NotificationSeverity {
    Info,
    Success,
    Warning,
    Error,
}

// "Avise o usuário X do evento Y". Título e mensagem são chaves de tradução,
// o front resolve no idioma do usuário.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub user_id: Uuid,
    pub title_key: String,
    pub message_key: String,
    pub params: Value,
    pub severity: NotificationSeverity,
    pub related_entity_type: Option<String>,
    pub related_entity_id: Option<Uuid>,
}

impl Notification {
    pub fn new(
        user_id: Uuid,
        title_key: impl Into<String>,
        message_key: impl Into<String>,
        params: Value,
        severity: NotificationSeverity,
    ) -> Self {
        Self {
            user_id,
            title_key: title_key.into(),
            message_key: message_key.into(),
            params,
            severity,
            related_entity_type: None,
            related_entity_id: None,
        }
    }

    pub fn related_to(mut self, entity_type: &str, entity_id: Uuid) -> Self {
        self.related_entity_type = Some(entity_type.to_string());
        self.related_entity_id = Some(entity_id);
        self
    }
}
