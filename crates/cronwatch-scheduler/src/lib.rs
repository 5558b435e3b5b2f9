//! # cronwatch scheduler
//!
//! Persistent recurring job scheduler with failure escalation.
//!
//! ## Architecture
//!
//! ```text
//!   timer tick / run(id, mode)
//!              │
//!              ▼
//! ┌───────────────────────────┐    ┌──────────────────┐
//! │        CronService        │───▶│ JobRunnerAdapter │──▶ JobRunner
//! │  job table + run locks    │    └──────────────────┘
//! │                           │    ┌──────────────────┐
//! │                           │───▶│ EscalationPolicy │
//! │                           │    └──────────────────┘
//! │                           │    ┌──────────────────┐
//! │                           │───▶│     JobStore     │
//! └─────────────┬─────────────┘    └──────────────────┘
//!               │ alert
//!               ▼
//!     EventSink + HeartbeatRequester
//! ```
//!
//! Schedules are evaluated by [`schedule::next_due`] against an injected
//! [`Clock`], so the whole service can be driven by a [`ManualClock`].

pub mod clock;
pub mod escalation;
mod locks;
pub mod runner;
pub mod schedule;
pub mod service;
mod service_run;
mod service_timer;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use escalation::{
    DEFAULT_FAILURE_ALERT_THROTTLE_MS, EscalationDecision, EscalationInput, EscalationPolicy,
    FAILURE_ALERT_THRESHOLD, alert_message,
};
pub use runner::{JobRunnerAdapter, RunOutcome};
pub use schedule::{ScheduleError, is_due, next_due, validate_schedule};
pub use service::{CronService, CronServiceBuilder, CronServiceConfig, CronStatus, ServiceState};
pub use service_run::{RunMode, RunReport};
pub use store::{FileJobStore, JobStore, MemoryJobStore, STORE_VERSION, StoreFile};
