// src/services/scheduler.rs

//! Agendador dos jobs de ciclo de vida. Um único driver acorda a cada `tick`,
//! roda em sequência os jobs vencidos e calcula o próximo disparo de cada um.
//! Nenhum job roda em paralelo consigo mesmo (nem agendado x sob demanda).

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::{
    common::{clock::Clock, error::AppError},
    models::scheduler::{JobDetail, JobKind, JobReport, JobSchedule, JobStatus, SchedulerStatus},
    services::{
        rental_calendar_service::RentalCalendarService, status_transition_service::StatusTransitionManager,
        tier_service::CustomerTierAssignmentEngine,
    },
};

#[derive(Debug, Clone, Copy)]
pub struct SchedulerOptions {
    pub tick: Duration,
    pub utc_offset: FixedOffset,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(30),
            utc_offset: Utc.fix(),
        }
    }
}

#[derive(Debug, Clone)]
struct JobEntry {
    kind: JobKind,
    // None = job só executado sob demanda
    schedule: Option<JobSchedule>,
    next_run_at: Option<DateTime<Utc>>,
    last_run_at: Option<DateTime<Utc>>,
    last_updated_count: Option<usize>,
    last_error: Option<String>,
}

impl JobEntry {
    fn new(kind: JobKind) -> Self {
        Self {
            kind,
            schedule: None,
            next_run_at: None,
            last_run_at: None,
            last_updated_count: None,
            last_error: None,
        }
    }
}

struct Driver {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

struct SchedulerInner {
    transitions: Arc<StatusTransitionManager>,
    calendar: Arc<RentalCalendarService>,
    tiers: Arc<CustomerTierAssignmentEngine>,
    clock: Arc<dyn Clock>,
    options: SchedulerOptions,
    jobs: Mutex<Vec<JobEntry>>,
    // Um lock por tipo de job: impede sobreposição de execuções
    run_locks: HashMap<JobKind, Arc<tokio::sync::Mutex<()>>>,
}

pub struct TransitionScheduler {
    inner: Arc<SchedulerInner>,
    driver: Mutex<Option<Driver>>,
}

impl TransitionScheduler {
    pub fn new(
        transitions: Arc<StatusTransitionManager>,
        calendar: Arc<RentalCalendarService>,
        tiers: Arc<CustomerTierAssignmentEngine>,
        clock: Arc<dyn Clock>,
        options: SchedulerOptions,
    ) -> Self {
        let run_locks = [
            JobKind::ReservationActivation,
            JobKind::OverdueDetection,
            JobKind::AutoTransitions,
            JobKind::TierAssignment,
        ]
        .into_iter()
        .map(|kind| (kind, Arc::new(tokio::sync::Mutex::new(()))))
        .collect();

        Self {
            inner: Arc::new(SchedulerInner {
                transitions,
                calendar,
                tiers,
                clock,
                options,
                jobs: Mutex::new(Vec::new()),
                run_locks,
            }),
            driver: Mutex::new(None),
        }
    }

    /// Registra (ou reagenda) um job.
    pub fn register(&self, kind: JobKind, schedule: JobSchedule) {
        let next = schedule.next_after(self.inner.clock.now(), self.inner.options.utc_offset);
        let mut jobs = self.inner.jobs();
        match jobs.iter_mut().find(|j| j.kind == kind) {
            Some(entry) => {
                entry.schedule = Some(schedule);
                entry.next_run_at = next;
            }
            None => {
                let mut entry = JobEntry::new(kind);
                entry.schedule = Some(schedule);
                entry.next_run_at = next;
                jobs.push(entry);
            }
        }
        match next {
            Some(next) => tracing::info!(job = %kind, %schedule, next_run_at = %next, "Job registrado"),
            None => tracing::warn!(job = %kind, %schedule, "Job registrado sem próximo disparo"),
        }
    }

    // --- CICLO DE VIDA ---

    /// Sobe o driver. Chamar de novo com ele rodando não faz nada.
    pub fn start(&self) {
        let mut driver = self.driver_slot();
        if driver.as_ref().is_some_and(|d| !d.handle.is_finished()) {
            tracing::warn!("Agendador já está rodando; start ignorado");
            return;
        }

        // Recalcula os disparos a partir de agora, sem "atrasados" acumulados
        let now = self.inner.clock.now();
        for entry in self.inner.jobs().iter_mut() {
            if let Some(schedule) = entry.schedule {
                entry.next_run_at = schedule.next_after(now, self.inner.options.utc_offset);
            }
        }

        let (shutdown, receiver) = watch::channel(false);
        let handle = tokio::spawn(drive(self.inner.clone(), receiver));
        *driver = Some(Driver { shutdown, handle });

        tracing::info!(tick_secs = self.inner.options.tick.as_secs(), "🚀 Agendador iniciado");
    }

    /// Impede disparos futuros; um job em andamento termina antes.
    pub async fn stop(&self) {
        let Some(driver) = self.driver_slot().take() else {
            tracing::warn!("Agendador não está rodando; stop ignorado");
            return;
        };

        let _ = driver.shutdown.send(true);
        if let Err(e) = driver.handle.await {
            tracing::error!(error = %e, "Driver do agendador terminou com erro");
        }
        tracing::info!("Agendador parado");
    }

    pub fn is_running(&self) -> bool {
        self.driver_slot().as_ref().is_some_and(|d| !d.handle.is_finished())
    }

    pub fn get_status(&self) -> SchedulerStatus {
        let jobs = self
            .inner
            .jobs()
            .iter()
            .map(|j| JobStatus {
                job: j.kind,
                schedule: j.schedule.map_or_else(|| "on demand".to_string(), |s| s.to_string()),
                next_run_at: j.next_run_at,
                last_run_at: j.last_run_at,
                last_updated_count: j.last_updated_count,
                last_error: j.last_error.clone(),
            })
            .collect();

        SchedulerStatus {
            running: self.is_running(),
            jobs,
        }
    }

    // --- EXECUÇÃO SOB DEMANDA ---

    pub async fn trigger(&self, kind: JobKind) -> Result<JobReport, AppError> {
        self.inner.run(kind).await
    }

    pub async fn trigger_reservation_activation(&self) -> Result<JobReport, AppError> {
        self.trigger(JobKind::ReservationActivation).await
    }

    pub async fn trigger_overdue_detection(&self) -> Result<JobReport, AppError> {
        self.trigger(JobKind::OverdueDetection).await
    }

    pub async fn trigger_auto_transitions(&self) -> Result<JobReport, AppError> {
        self.trigger(JobKind::AutoTransitions).await
    }

    pub async fn trigger_tier_assignment(&self) -> Result<JobReport, AppError> {
        self.trigger(JobKind::TierAssignment).await
    }

    fn driver_slot(&self) -> MutexGuard<'_, Option<Driver>> {
        self.driver.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

async fn drive(inner: Arc<SchedulerInner>, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(inner.options.tick);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => break,
        }

        for kind in inner.due_jobs(inner.clock.now()) {
            // Cada execução vira uma task: erro ou panic ficam isolados nela
            let runner = inner.clone();
            match tokio::spawn(async move { runner.run(kind).await }).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    tracing::error!(job = %kind, error = %e, "Job agendado falhou; seguindo com os demais");
                }
                Err(join_err) => {
                    tracing::error!(job = %kind, error = %join_err, "Job agendado abortou");
                    inner.record(kind, inner.clock.now(), Err(format!("job abortado: {join_err}")));
                }
            }
            inner.schedule_next(kind);
        }
    }
}

impl SchedulerInner {
    fn jobs(&self) -> MutexGuard<'_, Vec<JobEntry>> {
        self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn today(&self) -> NaiveDate {
        self.clock.today(self.options.utc_offset)
    }

    fn due_jobs(&self, now: DateTime<Utc>) -> Vec<JobKind> {
        self.jobs()
            .iter()
            .filter(|j| j.next_run_at.is_some_and(|next| next <= now))
            .map(|j| j.kind)
            .collect()
    }

    fn schedule_next(&self, kind: JobKind) {
        let now = self.clock.now();
        if let Some(entry) = self.jobs().iter_mut().find(|j| j.kind == kind) {
            entry.next_run_at = entry
                .schedule
                .and_then(|schedule| schedule.next_after(now, self.options.utc_offset));
        }
    }

    fn record(&self, kind: JobKind, at: DateTime<Utc>, outcome: Result<usize, String>) {
        let mut jobs = self.jobs();
        let index = match jobs.iter().position(|j| j.kind == kind) {
            Some(index) => index,
            None => {
                jobs.push(JobEntry::new(kind));
                jobs.len() - 1
            }
        };
        if let Some(entry) = jobs.get_mut(index) {
            entry.last_run_at = Some(at);
            match outcome {
                Ok(count) => {
                    entry.last_updated_count = Some(count);
                    entry.last_error = None;
                }
                Err(message) => {
                    entry.last_updated_count = None;
                    entry.last_error = Some(message);
                }
            }
        }
    }

    async fn run(&self, kind: JobKind) -> Result<JobReport, AppError> {
        let lock = self
            .run_locks
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| Arc::new(tokio::sync::Mutex::new(())));
        let _running = lock.lock().await;

        let started_at = self.clock.now();
        tracing::info!(job = %kind, "Executando job");

        match self.execute(kind).await {
            Ok((updated_count, details)) => {
                let finished_at = self.clock.now();
                self.record(kind, finished_at, Ok(updated_count));
                tracing::info!(job = %kind, updated_count, items = details.len(), "Job concluído");
                Ok(JobReport {
                    job: kind,
                    updated_count,
                    details,
                    started_at,
                    finished_at,
                })
            }
            Err(e) => {
                self.record(kind, self.clock.now(), Err(e.to_string()));
                Err(e)
            }
        }
    }

    async fn execute(&self, kind: JobKind) -> Result<(usize, Vec<JobDetail>), AppError> {
        match kind {
            JobKind::ReservationActivation => {
                let details = self.calendar.activate_reservations(self.today()).await?;
                Ok((successes(&details), details))
            }
            JobKind::OverdueDetection => {
                let details = self.calendar.detect_overdue(self.today()).await?;
                Ok((successes(&details), details))
            }
            JobKind::AutoTransitions => {
                let details: Vec<JobDetail> = self
                    .transitions
                    .run_auto_transitions()
                    .await?
                    .into_iter()
                    .map(|o| {
                        let edge = format!("{} -> {}", o.from_status, o.to_status);
                        match o.error {
                            None => JobDetail::ok(o.asset_id, edge),
                            Some(e) if o.skipped => JobDetail::failed(o.asset_id, format!("{edge} skipped: {e}")),
                            Some(e) => JobDetail::failed(o.asset_id, format!("{edge}: {e}")),
                        }
                    })
                    .collect();
                Ok((successes(&details), details))
            }
            JobKind::TierAssignment => {
                let report = self.tiers.auto_assign_all().await?;
                let details = report
                    .details
                    .into_iter()
                    .map(|d| {
                        let message = match (&d.error, d.tier_id) {
                            (Some(e), _) => e.clone(),
                            (None, Some(tier_id)) => format!("{:?} {tier_id}", d.action),
                            (None, None) => format!("{:?}", d.action),
                        };
                        JobDetail {
                            entity_id: d.customer_id,
                            success: d.error.is_none(),
                            message,
                        }
                    })
                    .collect();
                Ok((report.created_count, details))
            }
        }
    }
}

fn successes(details: &[JobDetail]) -> usize {
    details.iter().filter(|d| d.success).count()
}
