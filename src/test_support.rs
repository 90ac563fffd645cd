// src/test_support.rs

//! Peças compartilhadas pelos testes dos serviços.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    common::{clock::FixedClock, error::AppError},
    db::{MemoryRentalStore, MemoryRuleStore},
    models::{
        asset::{AssetStatus, TransitionRule},
        notification::Notification,
        rental::{RentalAgreement, RentalStatus},
    },
    services::{AllowAllApprovals, NotificationDispatcher, StatusTransitionManager},
};

pub fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

// Grafo de status usado na maioria dos testes (espelha a migração inicial)
pub fn standard_rules() -> Vec<TransitionRule> {
    use AssetStatus::*;
    vec![
        TransitionRule::new(Available, Rented),
        TransitionRule::new(Available, Reserved),
        TransitionRule::new(Available, Maintenance),
        TransitionRule::new(Available, Inspection),
        TransitionRule::new(Reserved, Rented),
        TransitionRule::new(Reserved, Available),
        TransitionRule::new(Rented, Cleaning),
        TransitionRule::new(Rented, Inspection),
        TransitionRule::new(Rented, Repair),
        TransitionRule::new(Cleaning, Inspection).auto_after_hours(2),
        TransitionRule::new(Cleaning, Available),
        TransitionRule::new(Inspection, Available),
        TransitionRule::new(Inspection, Maintenance),
        TransitionRule::new(Inspection, Repair),
        TransitionRule::new(Inspection, Quarantine),
        TransitionRule::new(Maintenance, Available),
        TransitionRule::new(Maintenance, Inspection),
        TransitionRule::new(Maintenance, Retired).requiring_approval(),
        TransitionRule::new(Repair, Inspection),
        TransitionRule::new(Repair, Retired).requiring_approval(),
        TransitionRule::new(Quarantine, Inspection).auto_after_hours(24),
        TransitionRule::new(Quarantine, Retired).requiring_approval(),
    ]
}

pub fn agreement(
    customer_id: Uuid,
    asset_id: Uuid,
    status: RentalStatus,
    start: NaiveDate,
    planned_return: NaiveDate,
    amount: i64,
) -> RentalAgreement {
    RentalAgreement {
        id: Uuid::new_v4(),
        asset_id,
        customer_id,
        status,
        start_date: start,
        planned_return_date: planned_return,
        actual_end_date: None,
        amount: Decimal::from(amount),
    }
}

/// Guarda tudo o que foi "enviado".
#[derive(Default)]
pub struct RecordingDispatcher {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingDispatcher {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationDispatcher for RecordingDispatcher {
    async fn notify(&self, notification: &Notification) -> Result<(), AppError> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

pub struct Harness {
    pub store: MemoryRentalStore,
    pub rules: Arc<MemoryRuleStore>,
    pub clock: Arc<FixedClock>,
    pub dispatcher: Arc<RecordingDispatcher>,
    pub manager: Arc<StatusTransitionManager>,
}

impl Harness {
    pub fn new(now: DateTime<Utc>) -> Self {
        let store = MemoryRentalStore::new();
        let rules = Arc::new(MemoryRuleStore::new(standard_rules()));
        let clock = Arc::new(FixedClock::new(now));
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let manager = Arc::new(StatusTransitionManager::new(
            Arc::new(store.clone()),
            rules.clone(),
            Arc::new(AllowAllApprovals),
            dispatcher.clone(),
            clock.clone(),
        ));
        Self { store, rules, clock, dispatcher, manager }
    }
}
