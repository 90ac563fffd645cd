// src/config.rs

use std::{env, sync::Arc, time::Duration};

use anyhow::{bail, Context};
use chrono::{FixedOffset, NaiveTime};
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    common::clock::{Clock, SystemClock},
    db::{RentalRepository, TransitionRuleRepository},
    models::scheduler::{JobKind, JobSchedule},
    services::{
        AllowAllApprovals, CustomerTierAssignmentEngine, PgNotificationDispatcher, RentalCalendarService,
        SchedulerOptions, StatusTransitionManager, TransitionScheduler,
    },
};

// Uma semana
const MAX_AUTO_TRANSITION_MINUTES: u64 = 7 * 24 * 60;
const MAX_TICK_SECS: u64 = 3600;

/// Configuração lida do ambiente (.env incluso).
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    pub scheduler_tick: Duration,
    pub utc_offset: FixedOffset,
    pub reservation_activation: JobSchedule,
    pub overdue_detection: JobSchedule,
    pub auto_transitions: JobSchedule,
    pub tier_assignment: JobSchedule,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    // Separado de `from_env` para os testes não dependerem do ambiente do processo
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url = lookup("DATABASE_URL").context("DATABASE_URL deve ser definida")?;

        let number = |key: &str, default: u64| -> anyhow::Result<u64> {
            match lookup(key) {
                Some(raw) => raw
                    .trim()
                    .parse::<u64>()
                    .with_context(|| format!("{key} inválido: '{raw}'")),
                None => Ok(default),
            }
        };
        let daily = |key: &str, default: &str| -> anyhow::Result<JobSchedule> {
            let raw = lookup(key).unwrap_or_else(|| default.to_string());
            Ok(JobSchedule::DailyAt(parse_time(&raw).with_context(|| format!("{key} inválido"))?))
        };

        let offset_minutes = match lookup("SCHEDULER_UTC_OFFSET_MINUTES") {
            Some(raw) => raw
                .trim()
                .parse::<i32>()
                .with_context(|| format!("SCHEDULER_UTC_OFFSET_MINUTES inválido: '{raw}'"))?,
            None => 0,
        };
        let utc_offset = offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .with_context(|| format!("Deslocamento de fuso fora do intervalo: {offset_minutes} min"))?;

        let tick_secs = number("SCHEDULER_TICK_SECS", 30)?;
        if !(1..=MAX_TICK_SECS).contains(&tick_secs) {
            bail!("SCHEDULER_TICK_SECS deve estar entre 1 e {MAX_TICK_SECS}, veio {tick_secs}");
        }

        // Horário fixo tem precedência sobre o intervalo
        let auto_transitions = match lookup("AUTO_TRANSITION_AT") {
            Some(raw) => JobSchedule::DailyAt(parse_time(&raw).context("AUTO_TRANSITION_AT inválido")?),
            None => {
                let minutes = number("AUTO_TRANSITION_EVERY_MINUTES", 60)?;
                if !(1..=MAX_AUTO_TRANSITION_MINUTES).contains(&minutes) {
                    bail!(
                        "AUTO_TRANSITION_EVERY_MINUTES deve estar entre 1 e {MAX_AUTO_TRANSITION_MINUTES}, veio {minutes}"
                    );
                }
                JobSchedule::Every(Duration::from_secs(minutes * 60))
            }
        };

        Ok(Self {
            database_url,
            max_connections: u32::try_from(number("DATABASE_MAX_CONNECTIONS", 5)?)
                .context("DATABASE_MAX_CONNECTIONS grande demais")?,
            acquire_timeout: Duration::from_secs(number("DATABASE_ACQUIRE_TIMEOUT_SECS", 3)?),
            scheduler_tick: Duration::from_secs(tick_secs),
            utc_offset,
            reservation_activation: daily("RESERVATION_ACTIVATION_AT", "00:05")?,
            overdue_detection: daily("OVERDUE_DETECTION_AT", "00:10")?,
            auto_transitions,
            tier_assignment: daily("TIER_ASSIGNMENT_AT", "02:00")?,
        })
    }
}

fn parse_time(raw: &str) -> anyhow::Result<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .with_context(|| format!("horário '{raw}' não está no formato HH:MM"))
}

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub transition_manager: Arc<StatusTransitionManager>,
    pub tier_engine: Arc<CustomerTierAssignmentEngine>,
    pub scheduler: Arc<TransitionScheduler>,
}

impl AppState {
    pub async fn new(settings: &Settings) -> anyhow::Result<Self> {
        let db_pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(settings.acquire_timeout)
            .connect(&settings.database_url)
            .await
            .context("Falha ao conectar ao banco de dados")?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        // --- Monta o gráfico de dependências ---
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let store = Arc::new(RentalRepository::new(db_pool.clone()));
        let rules = Arc::new(TransitionRuleRepository::new(db_pool.clone()));
        let notifier = Arc::new(PgNotificationDispatcher::new(db_pool.clone()));

        let transition_manager = Arc::new(StatusTransitionManager::new(
            store.clone(),
            rules,
            Arc::new(AllowAllApprovals),
            notifier.clone(),
            clock.clone(),
        ));
        let calendar = Arc::new(RentalCalendarService::new(store.clone(), notifier, clock.clone()));
        let tier_engine = Arc::new(CustomerTierAssignmentEngine::new(store, clock.clone()));

        let scheduler = Arc::new(TransitionScheduler::new(
            transition_manager.clone(),
            calendar,
            tier_engine.clone(),
            clock,
            SchedulerOptions {
                tick: settings.scheduler_tick,
                utc_offset: settings.utc_offset,
            },
        ));
        scheduler.register(JobKind::ReservationActivation, settings.reservation_activation);
        scheduler.register(JobKind::OverdueDetection, settings.overdue_detection);
        scheduler.register(JobKind::AutoTransitions, settings.auto_transitions);
        scheduler.register(JobKind::TierAssignment, settings.tier_assignment);

        Ok(Self {
            db_pool,
            transition_manager,
            tier_engine,
            scheduler,
        })
    }
}
