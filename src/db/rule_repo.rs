// src/db/rule_repo.rs

use async_trait::async_trait;
use sqlx::PgPool;

use crate::{
    common::error::AppError,
    db::store::TransitionRuleStore,
    models::asset::{AssetStatus, TransitionRule},
};

const RULE_COLUMNS: &str =
    "id, from_status, to_status, requires_approval, auto_transition_after_hours, description";

// Regras de transição vivem na tabela 'transition_rules' (semeada pela migração)
#[derive(Clone)]
pub struct TransitionRuleRepository {
    pool: PgPool,
}

impl TransitionRuleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // Grafo completo, útil para telas de configuração e diagnóstico
    pub async fn list_all(&self) -> Result<Vec<TransitionRule>, AppError> {
        let rules = sqlx::query_as::<_, TransitionRule>(&format!(
            "SELECT {RULE_COLUMNS} FROM transition_rules ORDER BY from_status, to_status"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rules)
    }
}

#[async_trait]
impl TransitionRuleStore for TransitionRuleRepository {
    async fn rule_for(
        &self,
        from: AssetStatus,
        to: AssetStatus,
    ) -> Result<Option<TransitionRule>, AppError> {
        let rule = sqlx::query_as::<_, TransitionRule>(&format!(
            "SELECT {RULE_COLUMNS} FROM transition_rules WHERE from_status = $1 AND to_status = $2"
        ))
        .bind(from)
        .bind(to)
        .fetch_optional(&self.pool)
        .await?;

        Ok(rule)
    }

    async fn auto_rules(&self) -> Result<Vec<TransitionRule>, AppError> {
        // Ordem estável: a primeira regra que casar com o ativo é a que vale
        let rules = sqlx::query_as::<_, TransitionRule>(&format!(
            r#"
            SELECT {RULE_COLUMNS}
            FROM transition_rules
            WHERE auto_transition_after_hours IS NOT NULL
              AND auto_transition_after_hours > 0
            ORDER BY seq ASC
            "#
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rules)
    }
}
