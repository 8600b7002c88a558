//! Pipeline services
//!
//! Ingestion (fetchers), processing (normalize, embed, cluster), scoring,
//! ranking, the tiered scheduler, and the Event Store they all write into.

pub mod fact_check;
pub mod ingestion;
pub mod processing;
pub mod ranking;
pub mod scheduler;
pub mod scoring;
pub mod store;

pub use fact_check::{DisabledFactChecker, FactChecker};
pub use ranking::{Ranker, Section};
pub use scheduler::{PipelineScheduler, SchedulerHandle};
pub use scoring::Scorer;
pub use store::{EventFilter, EventStore, ScoreUpdate};
