// src/common/error.rs

use thiserror::Error;

use crate::models::asset::AssetStatus;

// Nosso tipo de erro único, com `thiserror` para melhor ergonomia.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    // Ativo, cliente, faixa ou contrato inexistente
    #[error("Não encontrado: {0}")]
    NotFound(String),

    #[error("Transição de status não permitida: {from} -> {to}")]
    InvalidTransition { from: AssetStatus, to: AssetStatus },

    #[error("Transição {from} -> {to} exige um aprovador")]
    ApprovalRequired { from: AssetStatus, to: AssetStatus },

    #[error("Aprovação negada para a transição {from} -> {to}")]
    ApprovalDenied { from: AssetStatus, to: AssetStatus },

    // A releitura dentro da transação não bate mais com o que foi selecionado.
    // Resultado esperado em lote: a linha é apenas pulada.
    #[error("Modificação concorrente: {0}")]
    ConcurrentModification(String),

    #[error("Falha ao entregar notificação: {0}")]
    NotificationDelivery(String),

    // Variante para erros de banco de dados (sqlx)
    #[error("Erro de banco de dados: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Variante genérica para qualquer outro erro inesperado
    #[error("Erro interno: {0}")]
    InternalServerError(#[from] anyhow::Error),
}

impl AppError {
    /// `true` para os erros que um lote trata como "linha pulada" e não como falha.
    pub fn is_concurrent_modification(&self) -> bool {
        matches!(self, AppError::ConcurrentModification(_))
    }
}
