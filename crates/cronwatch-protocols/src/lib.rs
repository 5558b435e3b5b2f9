//! # cronwatch protocols
//!
//! Job model and the capability interfaces the scheduler calls out through.
//! Contains only data types and trait definitions - no implementations.
//!
//! ## Capabilities
//!
//! - [`JobRunner`] - Executes a job payload
//! - [`EventSink`] - Receives failure alerts
//! - [`HeartbeatRequester`] - Asks the host to wake up now

pub mod capability;
pub mod error;
pub mod job;

pub use capability::{
    AlertMetadata, EventSink, HeartbeatRequester, JobRunRequest, JobRunner, NoopEventSink,
    NoopHeartbeat,
};
pub use error::{CronError, RunnerError, SinkError, StorageError};
pub use job::{
    CronJob, CronJobCreate, CronJobPatch, CronJobState, RunStatus, Schedule, SessionTarget,
    WakeMode,
};
