// ── Run results ──
//
// Per-phase tallies and the run-level report consumers render.

use serde::Serialize;

use crate::model::EntityKind;

/// One item that failed, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    pub name: String,
    pub error: String,
}

/// Created / updated / failed counters of one phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncResult {
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
    pub failures: Vec<FailureRecord>,
}

impl SyncResult {
    pub fn record_created(&mut self) {
        self.created += 1;
    }

    pub fn record_updated(&mut self) {
        self.updated += 1;
    }

    pub fn record_failure(&mut self, name: impl Into<String>, error: impl ToString) {
        self.failed += 1;
        self.failures.push(FailureRecord {
            name: name.into(),
            error: error.to_string(),
        });
    }

    /// Items settled so far.
    pub fn settled(&self) -> usize {
        self.created + self.updated + self.failed
    }
}

/// Whether a phase wrote anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "kebab-case")]
pub enum PhaseMode {
    Full,
    /// List and correlate only, to feed identifiers to later kinds.
    IdentityOnly,
}

/// How a phase ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PhaseOutcome {
    Completed(SyncResult),
    /// Listing one side failed; nothing was written.
    Aborted { error: String },
    /// A referenced kind could not be resolved.
    Blocked { by: EntityKind },
    /// The observer declined the phase.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseReport {
    pub kind: EntityKind,
    pub mode: PhaseMode,
    pub outcome: PhaseOutcome,
}

impl PhaseReport {
    pub fn is_failure(&self) -> bool {
        matches!(
            self.outcome,
            PhaseOutcome::Aborted { .. } | PhaseOutcome::Blocked { .. }
        )
    }

    pub fn result(&self) -> Option<&SyncResult> {
        match &self.outcome {
            PhaseOutcome::Completed(result) => Some(result),
            _ => None,
        }
    }
}

/// Ordered phase reports of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub phases: Vec<PhaseReport>,
    /// The run stopped between phases on request.
    pub cancelled: bool,
}

impl RunReport {
    /// A run is in error only when a whole phase failed; item failures
    /// never make it so.
    pub fn has_failed_phase(&self) -> bool {
        self.phases.iter().any(PhaseReport::is_failure)
    }

    pub fn phase(&self, kind: EntityKind, mode: PhaseMode) -> Option<&PhaseReport> {
        self.phases
            .iter()
            .find(|p| p.kind == kind && p.mode == mode)
    }

    /// Full-phase result of a kind, if it completed.
    pub fn result(&self, kind: EntityKind) -> Option<&SyncResult> {
        self.phase(kind, PhaseMode::Full)
            .and_then(PhaseReport::result)
    }

    /// Sum of all full-phase counters.
    pub fn totals(&self) -> SyncResult {
        self.phases
            .iter()
            .filter(|p| p.mode == PhaseMode::Full)
            .filter_map(PhaseReport::result)
            .fold(SyncResult::default(), |mut acc, r| {
                acc.created += r.created;
                acc.updated += r.updated;
                acc.failed += r.failed;
                acc.failures.extend(r.failures.iter().cloned());
                acc
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_failures_do_not_fail_the_run() {
        let mut result = SyncResult::default();
        result.record_created();
        result.record_failure("Sensor", "boom");
        let report = RunReport {
            phases: vec![PhaseReport {
                kind: EntityKind::Devices,
                mode: PhaseMode::Full,
                outcome: PhaseOutcome::Completed(result),
            }],
            cancelled: false,
        };
        assert!(!report.has_failed_phase());
        assert_eq!(report.totals().settled(), 2);
    }

    #[test]
    fn blocked_phase_fails_the_run() {
        let report = RunReport {
            phases: vec![PhaseReport {
                kind: EntityKind::Dashboards,
                mode: PhaseMode::Full,
                outcome: PhaseOutcome::Blocked {
                    by: EntityKind::Devices,
                },
            }],
            cancelled: false,
        };
        assert!(report.has_failed_phase());
        assert!(report.result(EntityKind::Dashboards).is_none());
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let outcome = PhaseOutcome::Blocked {
            by: EntityKind::RunUsers,
        };
        let json = serde_json::to_value(&outcome).unwrap_or_default();
        assert_eq!(json["status"], "blocked");
        assert_eq!(json["by"], "run_users");
    }
}
