// ── Orchestrator ──
//
// Drives one run: entity kinds strictly in processing order, one phase at
// a time. Each phase lists both sides, correlates, rewrites and writes
// through the kind's adapter on a bounded runner, then folds the new
// identifiers into the registry for the kinds that follow.

use std::collections::{BTreeSet, HashSet};

use ferry_api::ApiClient;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::adapters::{Adapter, ResourceAdapter, WriteContext, WriteOutcome};
use crate::config::{SyncConfig, SyncMode};
use crate::error::CoreError;
use crate::identity::{Decision, IdentityRegistry, resolve};
use crate::model::{Correlation, EntityKind, EntityRecord};
use crate::result::{PhaseMode, PhaseOutcome, PhaseReport, RunReport, SyncResult};
use crate::runner::TaskRunner;
use crate::source::{Archive, LiveSource, SourceReader};

// ── Observer ─────────────────────────────────────────────────────────

/// Progress and confirmation hooks. Every method has a no-op default.
pub trait SyncObserver {
    /// Asked before each full phase; `false` skips it.
    fn before_phase(&self, _kind: EntityKind) -> bool {
        true
    }

    fn phase_started(&self, _kind: EntityKind, _mode: PhaseMode, _total: usize) {}

    /// Called after every settled item with the running tally.
    fn item_settled(&self, _kind: EntityKind, _tally: &SyncResult, _total: usize) {}

    fn phase_finished(&self, _report: &PhaseReport) {}
}

/// Observer that accepts every phase and reports nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl SyncObserver for NoopObserver {}

// ── Orchestrator ─────────────────────────────────────────────────────

pub struct Orchestrator<'a, S, O> {
    source: &'a S,
    target: LiveSource,
    config: &'a SyncConfig,
    observer: &'a O,
    cancel: CancellationToken,
}

impl<'a, S: SourceReader, O: SyncObserver> Orchestrator<'a, S, O> {
    pub fn new(
        source: &'a S,
        target: &ApiClient,
        config: &'a SyncConfig,
        observer: &'a O,
    ) -> Self {
        Self {
            source,
            target: LiveSource::new(target.clone(), config.page_size),
            config,
            observer,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop the run at the next phase boundary once `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Process the requested kinds in processing order.
    pub async fn run(&self, requested: &[EntityKind]) -> RunReport {
        let requested: BTreeSet<EntityKind> = requested.iter().copied().collect();
        let mut registry = IdentityRegistry::new();
        let mut unavailable: HashSet<EntityKind> = HashSet::new();
        let mut report = RunReport::default();

        info!(mode = %self.config.mode, kinds = requested.len(), "sync run started");

        for kind in requested {
            if self.cancel.is_cancelled() {
                info!(next = %kind, "run cancelled between phases");
                report.cancelled = true;
                break;
            }

            if let Some(phase) = Self::blocked(kind, &unavailable) {
                unavailable.insert(kind);
                self.observer.phase_finished(&phase);
                report.phases.push(phase);
                continue;
            }

            // Kinds this one references must be resolved before its payloads
            // can be rewritten. Requested ones were handled earlier in the order.
            for dep in kind.references() {
                if registry.is_resolved(*dep) || unavailable.contains(dep) {
                    continue;
                }
                let phase = self.identity_pass(*dep, &mut registry).await;
                if phase.is_failure() {
                    unavailable.insert(*dep);
                }
                self.observer.phase_finished(&phase);
                report.phases.push(phase);
            }

            if let Some(phase) = Self::blocked(kind, &unavailable) {
                unavailable.insert(kind);
                self.observer.phase_finished(&phase);
                report.phases.push(phase);
                continue;
            }

            if !self.observer.before_phase(kind) {
                info!(%kind, "phase skipped");
                let phase = PhaseReport {
                    kind,
                    mode: PhaseMode::Full,
                    outcome: PhaseOutcome::Skipped,
                };
                self.observer.phase_finished(&phase);
                report.phases.push(phase);
                continue;
            }

            let phase = self.full_phase(kind, &mut registry).await;
            if phase.is_failure() {
                unavailable.insert(kind);
            }
            self.observer.phase_finished(&phase);
            report.phases.push(phase);
        }

        let totals = report.totals();
        info!(
            created = totals.created,
            updated = totals.updated,
            failed = totals.failed,
            failed_phases = report.phases.iter().filter(|p| p.is_failure()).count(),
            "sync run finished"
        );
        report
    }

    // ── Phases ───────────────────────────────────────────────────────

    async fn list_both(
        &self,
        kind: EntityKind,
        correlation: Correlation,
    ) -> Result<(Vec<EntityRecord>, Vec<EntityRecord>), CoreError> {
        let source = self.source.list(kind).await?;
        if source.is_empty() {
            debug!(%kind, "source holds no entities");
            return Ok((Vec::new(), Vec::new()));
        }
        let target = self.target.list(kind).await?;
        let tag = self.config.tag_name.as_str();
        let to_records = |items: Vec<serde_json::Value>| {
            items
                .into_iter()
                .map(move |item| EntityRecord::from_summary(kind, item, correlation, tag))
        };
        let source = to_records(source)
            .map(|record| record.tagged_by_own_id(correlation))
            .collect();
        Ok((source, to_records(target).collect()))
    }

    /// Blocked report when a referenced kind could not be resolved.
    fn blocked(kind: EntityKind, unavailable: &HashSet<EntityKind>) -> Option<PhaseReport> {
        let by = *kind
            .references()
            .iter()
            .find(|dep| unavailable.contains(*dep))?;
        warn!(%kind, blocked_by = %by, "phase blocked by unresolved dependency");
        Some(PhaseReport {
            kind,
            mode: PhaseMode::Full,
            outcome: PhaseOutcome::Blocked { by },
        })
    }

    fn aborted(kind: EntityKind, mode: PhaseMode, err: &CoreError) -> PhaseReport {
        error!(%kind, %mode, error = %err, "listing failed, phase aborted");
        PhaseReport {
            kind,
            mode,
            outcome: PhaseOutcome::Aborted {
                error: err.to_string(),
            },
        }
    }

    fn runner_for(&self, kind: EntityKind) -> TaskRunner {
        TaskRunner::new(
            self.config.concurrency_for(kind.concurrency()),
            self.config.item_delay,
        )
    }

    async fn full_phase(&self, kind: EntityKind, registry: &mut IdentityRegistry) -> PhaseReport {
        let correlation = kind.correlation(self.config.mode);
        let (source, target) = match self.list_both(kind, correlation).await {
            Ok(lists) => lists,
            Err(e) => return Self::aborted(kind, PhaseMode::Full, &e),
        };

        let planned = resolve(source, &target, correlation);
        let total = planned.len();
        info!(%kind, total, "phase started");
        self.observer.phase_started(kind, PhaseMode::Full, total);

        let mut result = SyncResult::default();
        let mut work: Vec<(EntityRecord, Option<String>)> = Vec::with_capacity(total);
        for item in planned {
            match item.decision {
                Decision::Conflict { message } => {
                    warn!(%kind, item = %item.record.name, %message, "item not written");
                    result.record_failure(item.record.name, CoreError::consistency(message));
                    self.observer.item_settled(kind, &result, total);
                }
                Decision::Update { target_id } => {
                    // Matched pairs are authoritative before anything is written.
                    if !kind.is_singleton() {
                        registry
                            .map_mut(kind)
                            .insert(item.record.id.clone(), target_id.clone());
                    }
                    work.push((item.record, Some(target_id)));
                }
                Decision::Create => work.push((item.record, None)),
            }
        }

        let rewriter = registry.rewriter_for(kind);
        let adapter = Adapter::for_kind(kind);
        let ctx = WriteContext {
            source: self.source,
            target: self.target.client(),
            rewriter: &rewriter,
            correlation,
            tag_name: &self.config.tag_name,
        };

        let jobs: Vec<_> = work
            .iter()
            .map(|(record, existing)| {
                let job = write_item(&adapter, &ctx, record, existing.as_deref());
                (record.name.clone(), job)
            })
            .collect();

        let outcomes = self
            .runner_for(kind)
            .run(jobs, |outcome| {
                match &outcome.result {
                    Ok((_, written)) if written.created => result.record_created(),
                    Ok(_) => result.record_updated(),
                    Err(e) => result.record_failure(outcome.name.clone(), e),
                }
                self.observer.item_settled(kind, &result, total);
            })
            .await;

        let map = registry.map_mut(kind);
        for outcome in outcomes {
            let (source_id, target_id, tokens) = match outcome.result {
                Ok((source_id, written)) => (source_id, written.target_id, written.tokens),
                // The entity exists on the target even though a later step
                // failed; later kinds must still point at it.
                Err(CoreError::PartialWrite {
                    source_id,
                    target_id,
                    ..
                }) => (source_id, target_id, Vec::new()),
                Err(_) => continue,
            };
            if !kind.is_singleton() {
                map.insert(source_id, target_id);
            }
            for (old, new) in tokens {
                map.insert_token(old, new);
            }
        }
        registry.mark_resolved(kind);

        info!(
            %kind,
            created = result.created,
            updated = result.updated,
            failed = result.failed,
            "phase finished"
        );
        PhaseReport {
            kind,
            mode: PhaseMode::Full,
            outcome: PhaseOutcome::Completed(result),
        }
    }

    /// List and correlate a kind without writing, so later kinds can
    /// rewrite references to it.
    async fn identity_pass(
        &self,
        kind: EntityKind,
        registry: &mut IdentityRegistry,
    ) -> PhaseReport {
        let correlation = kind.correlation(self.config.mode);
        let (source, target) = match self.list_both(kind, correlation).await {
            Ok(lists) => lists,
            Err(e) => return Self::aborted(kind, PhaseMode::IdentityOnly, &e),
        };

        let planned = resolve(source, &target, correlation);
        let total = planned.len();
        info!(%kind, total, "identity-only pass");
        self.observer
            .phase_started(kind, PhaseMode::IdentityOnly, total);

        let mut result = SyncResult::default();
        let mut matched: Vec<(EntityRecord, String)> = Vec::new();
        for item in planned {
            match item.decision {
                Decision::Conflict { message } => {
                    warn!(%kind, item = %item.record.name, %message, "item not correlated");
                    result.record_failure(item.record.name, CoreError::consistency(message));
                }
                Decision::Update { target_id } => {
                    registry
                        .map_mut(kind)
                        .insert(item.record.id.clone(), target_id.clone());
                    matched.push((item.record, target_id));
                }
                Decision::Create => {}
            }
        }

        if kind.has_secondary_token() {
            let jobs: Vec<_> = matched
                .iter()
                .map(|(record, target_id)| {
                    (
                        record.name.clone(),
                        self.pair_tokens(kind, record, target_id),
                    )
                })
                .collect();

            let outcomes = self
                .runner_for(kind)
                .run(jobs, |outcome| {
                    if let Err(e) = &outcome.result {
                        result.record_failure(outcome.name.clone(), e);
                    }
                    self.observer.item_settled(kind, &result, total);
                })
                .await;

            let map = registry.map_mut(kind);
            for (old, new) in outcomes.into_iter().filter_map(|o| o.result.ok().flatten()) {
                map.insert_token(old, new);
            }
        }
        registry.mark_resolved(kind);

        PhaseReport {
            kind,
            mode: PhaseMode::IdentityOnly,
            outcome: PhaseOutcome::Completed(result),
        }
    }

    /// Old → new alternate identifier of one matched pair.
    async fn pair_tokens(
        &self,
        kind: EntityKind,
        record: &EntityRecord,
        target_id: &str,
    ) -> Result<Option<(String, String)>, CoreError> {
        let Some(old) = self.source.secondary_token(kind, &record.id).await? else {
            return Ok(None);
        };
        match self.target.secondary_token(kind, target_id).await? {
            Some(new) => Ok(Some((old, new))),
            None => Err(CoreError::consistency(format!(
                "matched {kind} {target_id} has no token on the target"
            ))),
        }
    }
}

async fn write_item<S: SourceReader>(
    adapter: &Adapter,
    ctx: &WriteContext<'_, S>,
    record: &EntityRecord,
    existing: Option<&str>,
) -> Result<(String, WriteOutcome), CoreError> {
    let written = adapter.write(ctx, record, existing).await?;
    Ok((record.id.clone(), written))
}

// ── Entry points ─────────────────────────────────────────────────────

/// Copy the requested kinds from one live account to another, matching
/// tagged entities by tag value.
pub async fn export<O: SyncObserver>(
    source: &ApiClient,
    target: &ApiClient,
    kinds: &[EntityKind],
    config: &SyncConfig,
    observer: &O,
    cancel: CancellationToken,
) -> RunReport {
    let config = config.clone().with_mode(SyncMode::Export);
    let live = LiveSource::new(source.clone(), config.page_size);
    Orchestrator::new(&live, target, &config, observer)
        .with_cancellation(cancel)
        .run(kinds)
        .await
}

/// Write every kind of an archive back into a live account, matching
/// tagged entities by their archived id, then by tag value.
pub async fn restore<O: SyncObserver>(
    archive: &Archive,
    target: &ApiClient,
    config: &SyncConfig,
    observer: &O,
    cancel: CancellationToken,
) -> RunReport {
    let config = config.clone().with_mode(SyncMode::Restore);
    Orchestrator::new(archive, target, &config, observer)
        .with_cancellation(cancel)
        .run(&EntityKind::all())
        .await
}
