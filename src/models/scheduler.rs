// src/models/scheduler.rs

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Days, FixedOffset, NaiveTime, TimeZone, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum JobKind {
    ReservationActivation,
    OverdueDetection,
    AutoTransitions,
    TierAssignment,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::ReservationActivation => "reservation_activation",
            JobKind::OverdueDetection => "overdue_detection",
            JobKind::AutoTransitions => "auto_transitions",
            JobKind::TierAssignment => "tier_assignment",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobSchedule {
    // Horário fixo diário, no fuso configurado
    DailyAt(NaiveTime),
    Every(Duration),
}

impl JobSchedule {
    /// Próximo disparo estritamente depois de `now`. `None` quando o instante
    /// não cabe no calendário (intervalo grande demais).
    pub fn next_after(&self, now: DateTime<Utc>, offset: FixedOffset) -> Option<DateTime<Utc>> {
        match self {
            JobSchedule::Every(interval) => {
                let step = chrono::Duration::from_std(*interval).ok()?;
                now.checked_add_signed(step)
            }
            JobSchedule::DailyAt(time) => {
                let local_now = now.with_timezone(&offset);
                let mut day = local_now.date_naive();
                if local_now.time() >= *time {
                    day = day.checked_add_days(Days::new(1))?;
                }
                offset
                    .from_local_datetime(&day.and_time(*time))
                    .earliest()
                    .map(|dt| dt.with_timezone(&Utc))
            }
        }
    }
}

impl fmt::Display for JobSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobSchedule::DailyAt(time) => write!(f, "daily at {}", time.format("%H:%M")),
            JobSchedule::Every(interval) => write!(f, "every {}s", interval.as_secs()),
        }
    }
}

// Uma linha processada por um job
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDetail {
    pub entity_id: Uuid,
    pub success: bool,
    pub message: String,
}

impl JobDetail {
    pub fn ok(entity_id: Uuid, message: impl Into<String>) -> Self {
        Self { entity_id, success: true, message: message.into() }
    }

    pub fn failed(entity_id: Uuid, message: impl Into<String>) -> Self {
        Self { entity_id, success: false, message: message.into() }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReport {
    pub job: JobKind,
    pub updated_count: usize,
    pub details: Vec<JobDetail>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    pub job: JobKind,
    pub schedule: String,
    pub next_run_at: Option<DateTime<Utc>>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_updated_count: Option<usize>,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStatus {
    pub running: bool,
    pub jobs: Vec<JobStatus>,
}
