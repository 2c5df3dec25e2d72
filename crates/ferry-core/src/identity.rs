// ── Identity correlation ──
//
// Per-kind old id → new id maps for one run, and the resolver that
// decides create vs. update for every source item.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use tracing::debug;

use crate::model::{Correlation, EntityKind, EntityRecord};
use crate::rewrite::Rewriter;

// ── IdentityMap ──────────────────────────────────────────────────────

/// Source → target identifiers for one kind. Append-only: the first
/// value written for a key stays authoritative for the rest of the run.
#[derive(Debug, Clone, Default)]
pub struct IdentityMap {
    ids: IndexMap<String, String>,
    /// Alternate identifiers (device tokens, dashboard share tokens).
    tokens: IndexMap<String, String>,
}

impl IdentityMap {
    /// Record a pair. Returns `false` (and keeps the existing value) when
    /// the key is already mapped.
    pub fn insert(&mut self, old: impl Into<String>, new: impl Into<String>) -> bool {
        insert_once(&mut self.ids, old.into(), new.into())
    }

    pub fn insert_token(&mut self, old: impl Into<String>, new: impl Into<String>) -> bool {
        insert_once(&mut self.tokens, old.into(), new.into())
    }

    pub fn get(&self, old: &str) -> Option<&str> {
        self.ids.get(old).map(String::as_str)
    }

    pub fn token(&self, old: &str) -> Option<&str> {
        self.tokens.get(old).map(String::as_str)
    }

    pub fn ids(&self) -> &IndexMap<String, String> {
        &self.ids
    }

    pub fn tokens(&self) -> &IndexMap<String, String> {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

fn insert_once(map: &mut IndexMap<String, String>, old: String, new: String) -> bool {
    if let Some(existing) = map.get(&old) {
        if existing != &new {
            debug!(old = %old, kept = %existing, ignored = %new, "identity already mapped");
        }
        return false;
    }
    map.insert(old, new);
    true
}

// ── IdentityRegistry ─────────────────────────────────────────────────

/// Every IdentityMap of one run, plus which kinds are fully resolved.
#[derive(Debug, Default)]
pub struct IdentityRegistry {
    maps: HashMap<EntityKind, IdentityMap>,
    resolved: HashSet<EntityKind>,
}

impl IdentityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn map(&self, kind: EntityKind) -> Option<&IdentityMap> {
        self.maps.get(&kind)
    }

    pub fn map_mut(&mut self, kind: EntityKind) -> &mut IdentityMap {
        self.maps.entry(kind).or_default()
    }

    pub fn mark_resolved(&mut self, kind: EntityKind) {
        self.resolved.insert(kind);
    }

    pub fn is_resolved(&self, kind: EntityKind) -> bool {
        self.resolved.contains(&kind)
    }

    /// Substitution table for payloads of `kind`: device ids and tokens
    /// first, then every other referenced kind in reference order.
    pub fn rewriter_for(&self, kind: EntityKind) -> Rewriter {
        let mut rewriter = Rewriter::new();
        let refs = kind.references();

        let ordered = refs
            .iter()
            .filter(|k| **k == EntityKind::Devices)
            .chain(refs.iter().filter(|k| **k != EntityKind::Devices));

        for dep in ordered {
            if let Some(map) = self.maps.get(dep) {
                rewriter.push_layer(map.ids());
                rewriter.push_layer(map.tokens());
            }
        }
        rewriter
    }
}

// ── Resolver ─────────────────────────────────────────────────────────

/// What to do with one source item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Create,
    Update { target_id: String },
    /// The item cannot be written safely.
    Conflict { message: String },
}

/// A source record paired with its decision.
#[derive(Debug, Clone)]
pub struct Planned {
    pub record: EntityRecord,
    pub decision: Decision,
}

/// Correlate source records against target records.
///
/// Duplicate keys fail fast: when a key appears on several source items,
/// or matches several target items, every source item carrying it is
/// planned as a conflict. The fallback key is consulted only when the
/// primary key matches nothing, and never claims a target that another
/// item already matched by its primary key.
pub fn resolve(
    source: Vec<EntityRecord>,
    target: &[EntityRecord],
    correlation: Correlation,
) -> Vec<Planned> {
    if correlation == Correlation::Singleton {
        return source
            .into_iter()
            .map(|record| {
                let target_id = target
                    .first()
                    .map_or_else(|| record.id.clone(), |t| t.id.clone());
                Planned {
                    record,
                    decision: Decision::Update { target_id },
                }
            })
            .collect();
    }

    let target: &[EntityRecord] = if correlation == Correlation::AlwaysCreate {
        &[]
    } else {
        target
    };
    let primary = KeyIndex::build(&source, target, primary_key);
    let fallback = KeyIndex::build(&source, target, fallback_key);

    let claimed: HashSet<String> = source
        .iter()
        .filter_map(|record| match primary.lookup(primary_key(record)?)? {
            Decision::Update { target_id } => Some(target_id),
            _ => None,
        })
        .collect();

    source
        .into_iter()
        .map(|record| {
            let decision = decide(&record, &primary, &fallback, &claimed);
            Planned { record, decision }
        })
        .collect()
}

fn primary_key(record: &EntityRecord) -> Option<&str> {
    record.correlation.as_deref()
}

fn fallback_key(record: &EntityRecord) -> Option<&str> {
    record.fallback.as_deref()
}

/// Source key multiplicity and target lookup for one key of a record.
struct KeyIndex<'t> {
    duplicated: HashSet<String>,
    targets: HashMap<&'t str, Vec<&'t str>>,
}

impl<'t> KeyIndex<'t> {
    fn build(
        source: &[EntityRecord],
        target: &'t [EntityRecord],
        key: fn(&EntityRecord) -> Option<&str>,
    ) -> Self {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for record in source {
            if let Some(k) = key(record) {
                *counts.entry(k).or_default() += 1;
            }
        }
        let duplicated = counts
            .into_iter()
            .filter(|(_, n)| *n > 1)
            .map(|(k, _)| k.to_owned())
            .collect();

        let mut targets: HashMap<&'t str, Vec<&'t str>> = HashMap::new();
        for record in target {
            if let Some(k) = key(record) {
                targets.entry(k).or_default().push(&record.id);
            }
        }
        Self {
            duplicated,
            targets,
        }
    }

    /// Decision for `key`, or `None` when it matches nothing.
    fn lookup(&self, key: &str) -> Option<Decision> {
        if self.duplicated.contains(key) {
            return Some(Decision::Conflict {
                message: format!("correlation key '{key}' is shared by several source items"),
            });
        }
        match self.targets.get(key).map(Vec::as_slice) {
            None | Some([]) => None,
            Some([target_id]) => Some(Decision::Update {
                target_id: (*target_id).to_owned(),
            }),
            Some(many) => Some(Decision::Conflict {
                message: format!(
                    "correlation key '{key}' matches {} target items",
                    many.len()
                ),
            }),
        }
    }
}

fn decide(
    record: &EntityRecord,
    primary: &KeyIndex<'_>,
    fallback: &KeyIndex<'_>,
    claimed: &HashSet<String>,
) -> Decision {
    if record.id.is_empty() {
        return Decision::Conflict {
            message: format!("'{}' has no identifier", record.name),
        };
    }

    if let Some(decision) = primary_key(record).and_then(|key| primary.lookup(key)) {
        return decision;
    }

    match fallback_key(record).and_then(|key| fallback.lookup(key)) {
        Some(Decision::Update { target_id }) if claimed.contains(&target_id) => {
            Decision::Conflict {
                message: format!("target {target_id} is already matched by id"),
            }
        }
        Some(decision) => decision,
        None => Decision::Create,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};

    use super::*;

    fn rec(id: &str, key: Option<&str>) -> EntityRecord {
        EntityRecord {
            id: id.into(),
            name: id.into(),
            correlation: key.map(str::to_owned),
            fallback: None,
            payload: Value::Null,
        }
    }

    /// Restore-shaped record: keyed by its own id, with a tag fallback.
    fn restored(id: &str, tag: Option<&str>) -> EntityRecord {
        EntityRecord {
            fallback: tag.map(str::to_owned),
            ..rec(id, Some(id))
        }
    }

    fn decisions(planned: &[Planned]) -> Vec<(&str, &Decision)> {
        planned
            .iter()
            .map(|p| (p.record.id.as_str(), &p.decision))
            .collect()
    }

    #[test]
    fn identity_map_is_append_only() {
        let mut map = IdentityMap::default();
        assert!(map.insert("devA", "devB"));
        assert!(!map.insert("devA", "devC"));
        assert_eq!(map.get("devA"), Some("devB"));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn tag_match_updates_and_unmatched_creates() {
        let source = vec![rec("a1", Some("x")), rec("a2", Some("y")), rec("a3", None)];
        let target = vec![rec("b1", Some("x")), rec("b9", Some("z"))];
        let planned = resolve(source, &target, Correlation::Tag);
        assert_eq!(
            decisions(&planned),
            vec![
                (
                    "a1",
                    &Decision::Update {
                        target_id: "b1".into()
                    }
                ),
                ("a2", &Decision::Create),
                ("a3", &Decision::Create),
            ]
        );
    }

    #[test]
    fn duplicate_source_keys_fail_fast() {
        let source = vec![rec("a1", Some("x")), rec("a2", Some("x")), rec("a3", Some("y"))];
        let planned = resolve(source, &[], Correlation::NaturalKey("name"));
        assert!(matches!(planned[0].decision, Decision::Conflict { .. }));
        assert!(matches!(planned[1].decision, Decision::Conflict { .. }));
        assert_eq!(planned[2].decision, Decision::Create);
    }

    #[test]
    fn ambiguous_target_match_is_conflict() {
        let source = vec![rec("a1", Some("x"))];
        let target = vec![rec("b1", Some("x")), rec("b2", Some("x"))];
        let planned = resolve(source, &target, Correlation::Tag);
        match &planned[0].decision {
            Decision::Conflict { message } => assert!(message.contains("2 target items")),
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn singleton_always_updates() {
        let planned = resolve(vec![rec("run", None)], &[], Correlation::Singleton);
        assert_eq!(
            planned[0].decision,
            Decision::Update {
                target_id: "run".into()
            }
        );
    }

    #[test]
    fn always_create_ignores_target() {
        let planned = resolve(
            vec![rec("a1", Some("x"))],
            &[rec("b1", Some("x"))],
            Correlation::AlwaysCreate,
        );
        assert_eq!(planned[0].decision, Decision::Create);
    }

    #[test]
    fn record_without_id_is_conflict() {
        let planned = resolve(vec![rec("", Some("x"))], &[], Correlation::SourceIdThenTag);
        assert!(matches!(planned[0].decision, Decision::Conflict { .. }));
    }

    #[test]
    fn restore_prefers_id_then_falls_back_to_tag() {
        let source = vec![
            restored("devA", Some("x")),
            restored("devC", Some("y")),
            restored("devD", Some("z")),
        ];
        // devA still lives under its archived id; devC was re-keyed by an
        // earlier restore; devD has never been written.
        let target = vec![restored("devA", Some("x")), restored("devB", Some("y"))];
        let planned = resolve(source, &target, Correlation::SourceIdThenTag);
        assert_eq!(
            decisions(&planned),
            vec![
                (
                    "devA",
                    &Decision::Update {
                        target_id: "devA".into()
                    }
                ),
                (
                    "devC",
                    &Decision::Update {
                        target_id: "devB".into()
                    }
                ),
                ("devD", &Decision::Create),
            ]
        );
    }

    #[test]
    fn fallback_never_claims_a_target_matched_by_id() {
        let source = vec![restored("devA", Some("x")), restored("devC", Some("x2"))];
        let target = vec![restored("devA", Some("x2"))];
        let planned = resolve(source, &target, Correlation::SourceIdThenTag);
        assert_eq!(
            planned[0].decision,
            Decision::Update {
                target_id: "devA".into()
            }
        );
        match &planned[1].decision {
            Decision::Conflict { message } => assert!(message.contains("already matched")),
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_fallback_tags_fail_fast() {
        let source = vec![restored("devA", Some("x")), restored("devC", Some("x"))];
        let target = vec![restored("devB", Some("x"))];
        let planned = resolve(source, &target, Correlation::SourceIdThenTag);
        assert!(matches!(planned[0].decision, Decision::Conflict { .. }));
        assert!(matches!(planned[1].decision, Decision::Conflict { .. }));
    }

    #[test]
    fn rewriter_puts_devices_first() {
        let mut registry = IdentityRegistry::new();
        registry.map_mut(EntityKind::Analysis).insert("shared", "from-analysis");
        registry.map_mut(EntityKind::Devices).insert("shared", "from-device");
        registry.map_mut(EntityKind::Devices).insert_token("tokA", "tokB");

        let rewriter = registry.rewriter_for(EntityKind::Dashboards);
        let out = rewriter.rewrite(&json!({ "a": "shared", "t": "tokA" }));
        assert_eq!(out, json!({ "a": "from-device", "t": "tokB" }));
    }

    #[test]
    fn rewriter_ignores_unreferenced_kinds() {
        let mut registry = IdentityRegistry::new();
        registry.map_mut(EntityKind::Secrets).insert("s1", "s2");
        let rewriter = registry.rewriter_for(EntityKind::Dashboards);
        assert!(rewriter.is_empty());
    }
}
