//! Resource synchronization engine behind `ferry`.
//!
//! Given a source (a live account or an extracted archive) and a target
//! live account, a run decides which source entities already exist on the
//! target, creates the rest, and rewrites every cross-entity reference in
//! their payloads to target-side identifiers.
//!
//! - **[`EntityKind`]**: the closed set of entity kinds, their fixed
//!   processing order, what each references, and how it is correlated.
//!
//! - **Identity** ([`identity`]): append-only [`IdentityMap`]s per kind
//!   and the resolver that decides create vs. update. Duplicate
//!   correlation keys fail the affected items instead of guessing.
//!
//! - **[`Rewriter`]**: layered old→new substitution over any JSON payload,
//!   longest match first, single pass, no cascading.
//!
//! - **[`TaskRunner`]**: bounded worker pool with a per-item delay and
//!   per-item failure (and panic) isolation.
//!
//! - **Sources** ([`source`]): [`LiveSource`] and [`Archive`] behind the
//!   [`SourceReader`] trait.
//!
//! - **[`Orchestrator`]**: drives phases in order, runs identity-only
//!   passes for referenced kinds that were not requested, and reports a
//!   [`RunReport`]. [`export()`] and [`restore()`] are the entry points.

mod adapters;
pub mod config;
pub mod error;
pub mod identity;
pub mod model;
pub mod orchestrator;
pub mod result;
pub mod rewrite;
pub mod runner;
pub mod source;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{SyncConfig, SyncMode};
pub use error::CoreError;
pub use identity::{IdentityMap, IdentityRegistry};
pub use model::{Correlation, EntityKind, EntityRecord};
pub use orchestrator::{NoopObserver, Orchestrator, SyncObserver, export, restore};
pub use result::{FailureRecord, PhaseMode, PhaseOutcome, PhaseReport, RunReport, SyncResult};
pub use rewrite::Rewriter;
pub use runner::{JobOutcome, TaskRunner};
pub use source::{Archive, ArchiveSummary, LiveSource, SourceReader};

// Callers need the cancellation handle type and the API client to start a run.
pub use ferry_api::{ApiClient, TransportConfig};
pub use tokio_util::sync::CancellationToken;
