// src/models/asset.rs

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// --- Enums ---

// Mapeia o CREATE TYPE asset_status do banco
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "asset_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AssetStatus {
    Available, // Estado inicial de um ativo recém-cadastrado
    Rented,
    Reserved,
    Cleaning,
    Inspection,
    Maintenance,
    Repair,
    Quarantine,
    Retired, // Terminal
}

impl AssetStatus {
    pub const ALL: [AssetStatus; 9] = [
        AssetStatus::Available,
        AssetStatus::Rented,
        AssetStatus::Reserved,
        AssetStatus::Cleaning,
        AssetStatus::Inspection,
        AssetStatus::Maintenance,
        AssetStatus::Repair,
        AssetStatus::Quarantine,
        AssetStatus::Retired,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetStatus::Available => "available",
            AssetStatus::Rented => "rented",
            AssetStatus::Reserved => "reserved",
            AssetStatus::Cleaning => "cleaning",
            AssetStatus::Inspection => "inspection",
            AssetStatus::Maintenance => "maintenance",
            AssetStatus::Repair => "repair",
            AssetStatus::Quarantine => "quarantine",
            AssetStatus::Retired => "retired",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AssetStatus::Retired)
    }
}

impl fmt::Display for AssetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Structs ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RentalAsset {
    pub id: Uuid,
    pub name: String,
    pub status: AssetStatus,
    pub status_changed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

// Uma aresta permitida no grafo de status (dado de referência, imutável)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TransitionRule {
    pub id: Uuid,
    pub from_status: AssetStatus,
    pub to_status: AssetStatus,
    pub requires_approval: bool,
    // NULL = só manual
    pub auto_transition_after_hours: Option<i32>,
    pub description: Option<String>,
}

impl TransitionRule {
    pub fn new(from_status: AssetStatus, to_status: AssetStatus) -> Self {
        Self {
            id: Uuid::new_v4(),
            from_status,
            to_status,
            requires_approval: false,
            auto_transition_after_hours: None,
            description: None,
        }
    }

    pub fn requiring_approval(mut self) -> Self {
        self.requires_approval = true;
        self
    }

    pub fn auto_after_hours(mut self, hours: i32) -> Self {
        self.auto_transition_after_hours = Some(hours);
        self
    }

    pub fn is_auto(&self) -> bool {
        matches!(self.auto_transition_after_hours, Some(h) if h > 0)
    }
}

// Registro de auditoria: só inserção, nunca alterado
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct StatusHistoryEntry {
    pub id: Uuid,
    pub asset_id: Uuid,
    pub previous_status: AssetStatus,
    pub new_status: AssetStatus,
    // NULL quando quem mudou foi o sistema
    pub changed_by: Option<Uuid>,
    pub changed_at: DateTime<Utc>,
    pub reason: Option<String>,
    pub notes: Option<String>,
}

// O que o serviço manda gravar no histórico
#[derive(Debug, Clone)]
pub struct NewStatusHistoryEntry {
    pub asset_id: Uuid,
    pub previous_status: AssetStatus,
    pub new_status: AssetStatus,
    pub changed_by: Option<Uuid>,
    pub changed_at: DateTime<Utc>,
    pub reason: Option<String>,
    pub notes: Option<String>,
}

// --- Payloads do gerenciador de transições ---

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionRequest {
    pub asset_id: Uuid,
    pub target_status: AssetStatus,
    pub actor_id: Option<Uuid>,
    pub reason: Option<String>,
    pub notes: Option<String>,
    // Preenchido pela varredura automática: se o status relido divergir, a linha é pulada
    #[serde(skip)]
    pub expected_status: Option<AssetStatus>,
}

impl TransitionRequest {
    pub fn new(asset_id: Uuid, target_status: AssetStatus) -> Self {
        Self {
            asset_id,
            target_status,
            actor_id: None,
            reason: None,
            notes: None,
            expected_status: None,
        }
    }

    pub fn by(mut self, actor_id: Uuid) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn expecting(mut self, status: AssetStatus) -> Self {
        self.expected_status = Some(status);
        self
    }
}

// Um ativo cujo tempo no status atual já estourou a regra automática
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DueTransition {
    pub asset_id: Uuid,
    pub from_status: AssetStatus,
    pub to_status: AssetStatus,
    pub after_hours: i32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoTransitionOutcome {
    pub asset_id: Uuid,
    pub from_status: AssetStatus,
    pub to_status: AssetStatus,
    pub success: bool,
    // Releitura divergiu: não é falha, só não havia mais o que fazer
    pub skipped: bool,
    pub error: Option<String>,
}
