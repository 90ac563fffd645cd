pub mod approval;
pub use approval::{AllowAllApprovals, ApprovalPolicy};
pub mod notification_service;
pub use notification_service::{NotificationDispatcher, PgNotificationDispatcher};
pub mod status_transition_service;
pub use status_transition_service::StatusTransitionManager;
pub mod rental_calendar_service;
pub use rental_calendar_service::RentalCalendarService;
pub mod tier_service;
pub use tier_service::CustomerTierAssignmentEngine;
pub mod scheduler;

pub use scheduler::{SchedulerOptions, TransitionScheduler};
