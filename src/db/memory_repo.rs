// src/db/memory_repo.rs

//! Implementação em memória do store, com a mesma semântica transacional do
//! Postgres: uma transação segura o lock exclusivo do estado, trabalha numa
//! cópia e só publica no `commit`. Descartar a transação equivale ao ROLLBACK.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::store::{RentalStore, StoreTx, TransitionRuleStore},
    models::{
        asset::{AssetStatus, NewStatusHistoryEntry, RentalAsset, StatusHistoryEntry, TransitionRule},
        rental::{RentalAgreement, RentalStatus},
        tier::{CustomerRentalStats, CustomerTier, NewCustomerTier, TierAssignment},
    },
};

#[derive(Debug, Clone)]
struct StoredUser {
    id: Uuid,
    role: String,
    is_active: bool,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    assets: HashMap<Uuid, RentalAsset>,
    history: Vec<StatusHistoryEntry>,
    agreements: Vec<RentalAgreement>,
    customers: Vec<Uuid>,
    tiers: Vec<CustomerTier>,
    assignments: Vec<TierAssignment>,
    users: Vec<StoredUser>,
    // Clientes cuja gravação de faixa deve falhar (simula erro de banco por linha)
    rejected_customers: HashSet<Uuid>,
}

#[derive(Clone, Default)]
pub struct MemoryRentalStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryRentalStore {
    pub fn new() -> Self {
        Self::default()
    }

    // --- Carga de dados ---

    pub async fn add_asset(&self, name: &str, status: AssetStatus, changed_at: DateTime<Utc>) -> Uuid {
        let id = Uuid::new_v4();
        let asset = RentalAsset {
            id,
            name: name.to_string(),
            status,
            status_changed_at: changed_at,
            created_at: changed_at,
        };
        self.state.lock().await.assets.insert(id, asset);
        id
    }

    pub async fn add_customer(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.state.lock().await.customers.push(id);
        id
    }

    pub async fn add_agreement(&self, agreement: RentalAgreement) -> Uuid {
        let id = agreement.id;
        let mut state = self.state.lock().await;
        if !state.customers.contains(&agreement.customer_id) {
            state.customers.push(agreement.customer_id);
        }
        state.agreements.push(agreement);
        id
    }

    pub async fn add_tier(&self, name: &str, min_rentals: i32, min_total_spend: Decimal) -> Uuid {
        let id = Uuid::new_v4();
        self.state.lock().await.tiers.push(CustomerTier {
            id,
            name: name.to_string(),
            discount_percentage: Decimal::ZERO,
            min_rentals,
            min_total_spend,
            is_active: true,
        });
        id
    }

    pub async fn add_assignment(&self, assignment: TierAssignment) {
        self.state.lock().await.assignments.push(assignment);
    }

    pub async fn add_user(&self, role: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.state.lock().await.users.push(StoredUser {
            id,
            role: role.to_string(),
            is_active: true,
        });
        id
    }

    pub async fn reject_assignments_for(&self, customer_id: Uuid) {
        self.state.lock().await.rejected_customers.insert(customer_id);
    }

    // --- Inspeção ---

    pub async fn agreement(&self, agreement_id: Uuid) -> Option<RentalAgreement> {
        self.state
            .lock()
            .await
            .agreements
            .iter()
            .find(|a| a.id == agreement_id)
            .cloned()
    }

    pub async fn history_len(&self, asset_id: Uuid) -> usize {
        self.state
            .lock()
            .await
            .history
            .iter()
            .filter(|h| h.asset_id == asset_id)
            .count()
    }

    pub async fn assignments_for(&self, customer_id: Uuid) -> Vec<TierAssignment> {
        self.state
            .lock()
            .await
            .assignments
            .iter()
            .filter(|a| a.customer_id == customer_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl RentalStore for MemoryRentalStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, AppError> {
        let guard = self.state.clone().lock_owned().await;
        let working = (*guard).clone();
        Ok(Box::new(MemoryTx { guard, working }))
    }

    async fn find_asset(&self, asset_id: Uuid) -> Result<Option<RentalAsset>, AppError> {
        Ok(self.state.lock().await.assets.get(&asset_id).cloned())
    }

    async fn assets_in_status_since(
        &self,
        status: AssetStatus,
        changed_before: DateTime<Utc>,
    ) -> Result<Vec<RentalAsset>, AppError> {
        let state = self.state.lock().await;
        let mut assets: Vec<RentalAsset> = state
            .assets
            .values()
            .filter(|a| a.status == status && a.status_changed_at <= changed_before)
            .cloned()
            .collect();
        assets.sort_by_key(|a| a.status_changed_at);
        Ok(assets)
    }

    async fn history_for_asset(
        &self,
        asset_id: Uuid,
        limit: i64,
    ) -> Result<Vec<StatusHistoryEntry>, AppError> {
        let state = self.state.lock().await;
        // rev() primeiro: em empate de horário, o inserido por último vem antes
        let mut entries: Vec<StatusHistoryEntry> = state
            .history
            .iter()
            .rev()
            .filter(|h| h.asset_id == asset_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.changed_at.cmp(&a.changed_at));
        entries.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(entries)
    }

    async fn reservations_starting_by(
        &self,
        today: NaiveDate,
    ) -> Result<Vec<RentalAgreement>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .agreements
            .iter()
            .filter(|a| a.is_startable_on(today))
            .cloned()
            .collect())
    }

    async fn active_agreements_due_before(
        &self,
        today: NaiveDate,
    ) -> Result<Vec<RentalAgreement>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .agreements
            .iter()
            .filter(|a| a.is_overdue_on(today))
            .cloned()
            .collect())
    }

    async fn customer_rental_stats(&self) -> Result<Vec<CustomerRentalStats>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .customers
            .iter()
            .map(|customer_id| {
                let rentals = state.agreements.iter().filter(|a| a.customer_id == *customer_id);
                let (count, spent) = rentals.fold((0i64, Decimal::ZERO), |(c, s), a| (c + 1, s + a.amount));
                CustomerRentalStats {
                    customer_id: *customer_id,
                    rental_count: count,
                    total_spent: spent,
                }
            })
            .collect())
    }

    async fn active_tiers(&self) -> Result<Vec<CustomerTier>, AppError> {
        let state = self.state.lock().await;
        let mut tiers: Vec<CustomerTier> = state.tiers.iter().filter(|t| t.is_active).cloned().collect();
        tiers.sort_by(|a, b| {
            (b.min_rentals, b.min_total_spend).cmp(&(a.min_rentals, a.min_total_spend))
        });
        Ok(tiers)
    }

    async fn find_tier(&self, tier_id: Uuid) -> Result<Option<CustomerTier>, AppError> {
        Ok(self.state.lock().await.tiers.iter().find(|t| t.id == tier_id).cloned())
    }

    async fn create_tier(&self, tier: &NewCustomerTier) -> Result<CustomerTier, AppError> {
        let created = CustomerTier {
            id: Uuid::new_v4(),
            name: tier.name.clone(),
            discount_percentage: tier.discount_percentage,
            min_rentals: tier.min_rentals,
            min_total_spend: tier.min_total_spend,
            is_active: true,
        };
        self.state.lock().await.tiers.push(created.clone());
        Ok(created)
    }

    async fn active_assignments_for(
        &self,
        customer_id: Uuid,
    ) -> Result<Vec<TierAssignment>, AppError> {
        let state = self.state.lock().await;
        let mut assignments: Vec<TierAssignment> = state
            .assignments
            .iter()
            .filter(|a| a.customer_id == customer_id && a.is_active)
            .cloned()
            .collect();
        assignments.sort_by(|a, b| b.assigned_at.cmp(&a.assigned_at));
        Ok(assignments)
    }

    async fn elevated_user_ids(&self) -> Result<Vec<Uuid>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .iter()
            .filter(|u| u.is_active && matches!(u.role.as_str(), "administrator" | "manager"))
            .map(|u| u.id)
            .collect())
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn lock_asset(&mut self, asset_id: Uuid) -> Result<Option<RentalAsset>, AppError> {
        Ok(self.working.assets.get(&asset_id).cloned())
    }

    async fn set_asset_status(
        &mut self,
        asset_id: Uuid,
        status: AssetStatus,
        changed_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let asset = self
            .working
            .assets
            .get_mut(&asset_id)
            .ok_or_else(|| AppError::NotFound(format!("ativo {asset_id}")))?;
        asset.status = status;
        asset.status_changed_at = changed_at;
        Ok(())
    }

    async fn append_history(
        &mut self,
        entry: NewStatusHistoryEntry,
    ) -> Result<StatusHistoryEntry, AppError> {
        let saved = StatusHistoryEntry {
            id: Uuid::new_v4(),
            asset_id: entry.asset_id,
            previous_status: entry.previous_status,
            new_status: entry.new_status,
            changed_by: entry.changed_by,
            changed_at: entry.changed_at,
            reason: entry.reason,
            notes: entry.notes,
        };
        self.working.history.push(saved.clone());
        Ok(saved)
    }

    async fn lock_agreement(
        &mut self,
        agreement_id: Uuid,
    ) -> Result<Option<RentalAgreement>, AppError> {
        Ok(self.working.agreements.iter().find(|a| a.id == agreement_id).cloned())
    }

    async fn set_agreement_status(
        &mut self,
        agreement_id: Uuid,
        status: RentalStatus,
    ) -> Result<(), AppError> {
        if let Some(agreement) = self.working.agreements.iter_mut().find(|a| a.id == agreement_id) {
            agreement.status = status;
        }
        Ok(())
    }

    async fn find_active_assignment(
        &mut self,
        customer_id: Uuid,
        tier_id: Uuid,
    ) -> Result<Option<TierAssignment>, AppError> {
        Ok(self
            .working
            .assignments
            .iter()
            .filter(|a| a.customer_id == customer_id && a.tier_id == tier_id && a.is_active)
            .max_by_key(|a| a.assigned_at)
            .cloned())
    }

    async fn reactivate_assignment(&mut self, assignment_id: Uuid) -> Result<(), AppError> {
        if let Some(assignment) = self.working.assignments.iter_mut().find(|a| a.id == assignment_id) {
            assignment.is_active = true;
            assignment.expires_at = None;
        }
        Ok(())
    }

    async fn deactivate_assignments(
        &mut self,
        customer_id: Uuid,
        keep: Option<Uuid>,
    ) -> Result<u64, AppError> {
        let mut affected = 0;
        for assignment in self.working.assignments.iter_mut() {
            if assignment.customer_id == customer_id && assignment.is_active && Some(assignment.id) != keep {
                assignment.is_active = false;
                affected += 1;
            }
        }
        Ok(affected)
    }

    async fn insert_assignment(
        &mut self,
        customer_id: Uuid,
        tier_id: Uuid,
        assigned_at: DateTime<Utc>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<TierAssignment, AppError> {
        if self.working.rejected_customers.contains(&customer_id) {
            return Err(AppError::InternalServerError(anyhow::anyhow!(
                "falha simulada ao gravar faixa do cliente {customer_id}"
            )));
        }
        let assignment = TierAssignment {
            id: Uuid::new_v4(),
            customer_id,
            tier_id,
            assigned_at,
            expires_at,
            is_active: true,
        };
        self.working.assignments.push(assignment.clone());
        Ok(assignment)
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        let MemoryTx { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}

// Regras em memória, com lock próprio para não disputar com as transações do store
#[derive(Default)]
pub struct MemoryRuleStore {
    rules: RwLock<Vec<TransitionRule>>,
}

impl MemoryRuleStore {
    pub fn new(rules: Vec<TransitionRule>) -> Self {
        Self { rules: RwLock::new(rules) }
    }

    pub fn add(&self, rule: TransitionRule) {
        if let Ok(mut rules) = self.rules.write() {
            rules.push(rule);
        }
    }

    fn read(&self) -> Result<Vec<TransitionRule>, AppError> {
        self.rules
            .read()
            .map(|rules| rules.clone())
            .map_err(|_| AppError::InternalServerError(anyhow::anyhow!("lock de regras envenenado")))
    }
}

#[async_trait]
impl TransitionRuleStore for MemoryRuleStore {
    async fn rule_for(
        &self,
        from: AssetStatus,
        to: AssetStatus,
    ) -> Result<Option<TransitionRule>, AppError> {
        Ok(self
            .read()?
            .into_iter()
            .find(|r| r.from_status == from && r.to_status == to))
    }

    async fn auto_rules(&self) -> Result<Vec<TransitionRule>, AppError> {
        Ok(self.read()?.into_iter().filter(TransitionRule::is_auto).collect())
    }
}
