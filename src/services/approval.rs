// src/services/approval.rs

use async_trait::async_trait;
use uuid::Uuid;

use crate::{common::error::AppError, models::asset::AssetStatus};

/// Quem pode aprovar uma transição marcada com `requires_approval`.
/// A regra real de autoridade é de outro módulo (RBAC); aqui só o contrato.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ApprovalPolicy: Send + Sync {
    async fn can_approve(
        &self,
        actor_id: Uuid,
        from: AssetStatus,
        to: AssetStatus,
    ) -> Result<bool, AppError>;
}

// Padrão enquanto a regra de autoridade não for definida: basta haver um ator
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAllApprovals;

#[async_trait]
impl ApprovalPolicy for AllowAllApprovals {
    async fn can_approve(
        &self,
        _actor_id: Uuid,
        _from: AssetStatus,
        _to: AssetStatus,
    ) -> Result<bool, AppError> {
        Ok(true)
    }
}
