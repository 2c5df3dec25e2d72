// ── Entity model ──
//
// The closed set of entity kinds a run can touch, their fixed processing
// order, and the record shape every phase works with.

use ferry_api::Resource;
use serde::Serialize;
use serde_json::Value;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

use crate::config::SyncMode;

// ── EntityKind ───────────────────────────────────────────────────────

/// One category of platform resource.
///
/// Declaration order is processing order: every kind only references
/// kinds declared before it.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum EntityKind {
    Profile,
    Secrets,
    Files,
    Networks,
    Connectors,
    Devices,
    Analysis,
    Dictionaries,
    Dashboards,
    Actions,
    Access,
    RunUsers,
    Run,
}

impl EntityKind {
    /// Every kind, in processing order.
    pub fn all() -> Vec<Self> {
        Self::iter().collect()
    }

    /// Kinds whose identifiers may appear in this kind's payloads.
    pub fn references(self) -> &'static [EntityKind] {
        match self {
            Self::Profile
            | Self::Secrets
            | Self::Files
            | Self::Networks
            | Self::Dictionaries
            | Self::RunUsers => &[],
            Self::Connectors => &[Self::Networks],
            Self::Devices => &[Self::Networks, Self::Connectors],
            Self::Analysis => &[Self::Devices],
            Self::Dashboards | Self::Actions => &[Self::Devices, Self::Analysis],
            Self::Access => &[Self::Devices, Self::Analysis, Self::Dashboards],
            Self::Run => &[Self::Dashboards, Self::Analysis, Self::Devices],
        }
    }

    /// Default number of items in flight for this kind.
    pub fn concurrency(self) -> usize {
        match self {
            Self::Profile | Self::Analysis | Self::Dashboards | Self::Run => 1,
            Self::Dictionaries => 2,
            Self::Files | Self::Networks | Self::Connectors | Self::Devices => 3,
            Self::Secrets | Self::Access => 5,
            Self::Actions | Self::RunUsers => 10,
        }
    }

    /// How source items of this kind find their target counterpart.
    pub fn correlation(self, mode: SyncMode) -> Correlation {
        match self {
            Self::Profile | Self::Run => Correlation::Singleton,
            Self::Secrets => Correlation::NaturalKey("key"),
            Self::Files => Correlation::NaturalKey("path"),
            Self::Networks | Self::Connectors => Correlation::NaturalKey("name"),
            Self::Dictionaries => Correlation::NaturalKey("slug"),
            Self::RunUsers => Correlation::NaturalKey("email"),
            Self::Devices | Self::Analysis | Self::Dashboards | Self::Actions | Self::Access => {
                match mode {
                    SyncMode::Export => Correlation::Tag,
                    SyncMode::Restore => Correlation::SourceIdThenTag,
                }
            }
        }
    }

    /// Generic CRUD collection backing this kind, if any.
    pub fn resource(self) -> Option<Resource> {
        match self {
            Self::Secrets => Some(Resource::Secret),
            Self::Networks => Some(Resource::Network),
            Self::Connectors => Some(Resource::Connector),
            Self::Devices => Some(Resource::Device),
            Self::Analysis => Some(Resource::Analysis),
            Self::Dictionaries => Some(Resource::Dictionary),
            Self::Dashboards => Some(Resource::Dashboard),
            Self::Actions => Some(Resource::Action),
            Self::Access => Some(Resource::AccessPolicy),
            Self::RunUsers => Some(Resource::RunUser),
            Self::Profile | Self::Files | Self::Run => None,
        }
    }

    /// Summary fields requested when listing a live collection.
    pub fn list_fields(self) -> &'static [&'static str] {
        match self {
            Self::Secrets => &["id", "key", "tags"],
            Self::Networks | Self::Connectors => &["id", "name"],
            Self::Dictionaries => &["id", "name", "slug"],
            Self::Dashboards => &["id", "label", "tags"],
            Self::RunUsers => &["id", "name", "email", "tags"],
            Self::Devices | Self::Analysis | Self::Actions | Self::Access => {
                &["id", "name", "tags"]
            }
            Self::Profile | Self::Files | Self::Run => &[],
        }
    }

    /// Kinds with exactly one settings object per account.
    pub fn is_singleton(self) -> bool {
        matches!(self, Self::Profile | Self::Run)
    }

    /// Kinds that carry an alternate identifier besides their id.
    pub fn has_secondary_token(self) -> bool {
        matches!(self, Self::Devices | Self::Dashboards)
    }

    /// File holding this kind inside an archive directory.
    pub fn archive_file(self) -> String {
        format!("{self}.json")
    }
}

// ── Correlation ──────────────────────────────────────────────────────

/// Rule deciding whether a source item already exists in the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Correlation {
    /// Both sides carry `{key: <tag name>, value}` with equal value.
    Tag,
    /// Equality of one payload field.
    NaturalKey(&'static str),
    /// The target holds an entity with the same id; failing that, both
    /// sides carry the same tag value.
    SourceIdThenTag,
    /// The one source object always maps to the one target object.
    Singleton,
    /// Never matched; every item is created.
    AlwaysCreate,
}

impl Correlation {
    /// Extract the correlation key of a summary.
    pub fn key_of(self, id: &str, summary: &Value, tag_name: &str) -> Option<String> {
        match self {
            Self::Tag => tag_value(summary, tag_name),
            Self::NaturalKey(field) => summary
                .get(field)
                .and_then(Value::as_str)
                .filter(|v| !v.is_empty())
                .map(str::to_owned),
            Self::SourceIdThenTag => Some(id.to_owned()).filter(|id| !id.is_empty()),
            Self::Singleton | Self::AlwaysCreate => None,
        }
    }

    /// Second key, tried only when the first matches nothing.
    pub fn fallback_of(self, summary: &Value, tag_name: &str) -> Option<String> {
        match self {
            Self::SourceIdThenTag => tag_value(summary, tag_name),
            _ => None,
        }
    }

    /// Whether items of this rule are matched through the correlation tag.
    pub fn uses_tag(self) -> bool {
        matches!(self, Self::Tag | Self::SourceIdThenTag)
    }
}

/// Value of the tag with the given key, if present and non-empty.
pub fn tag_value(summary: &Value, tag_name: &str) -> Option<String> {
    summary
        .get("tags")?
        .as_array()?
        .iter()
        .find(|tag| tag.get("key").and_then(Value::as_str) == Some(tag_name))
        .and_then(|tag| tag.get("value"))
        .and_then(Value::as_str)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

// ── EntityRecord ─────────────────────────────────────────────────────

/// One listed entity: its id, display name, correlation keys and the
/// summary payload it was listed with.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRecord {
    pub id: String,
    pub name: String,
    pub correlation: Option<String>,
    pub fallback: Option<String>,
    pub payload: Value,
}

impl EntityRecord {
    /// Build a record from a listing summary.
    ///
    /// Files are identified by path and singletons by their kind name.
    /// A summary without an id keeps an empty id; the resolver fails it.
    pub fn from_summary(
        kind: EntityKind,
        summary: Value,
        correlation: Correlation,
        tag_name: &str,
    ) -> Self {
        let id = if kind.is_singleton() {
            kind.to_string()
        } else {
            let field = if kind == EntityKind::Files { "path" } else { "id" };
            summary
                .get(field)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned()
        };

        let name = ["name", "label", "key", "email", "path", "slug"]
            .iter()
            .find_map(|field| summary.get(*field).and_then(Value::as_str))
            .filter(|n| !n.is_empty())
            .map_or_else(|| display_fallback(kind, &id), str::to_owned);

        let fallback = correlation.fallback_of(&summary, tag_name);
        let correlation = correlation.key_of(&id, &summary, tag_name);

        Self {
            id,
            name,
            correlation,
            fallback,
            payload: summary,
        }
    }

    /// Source side: an untagged item is stamped with its own id when
    /// written, so it correlates by that id from the start.
    pub fn tagged_by_own_id(mut self, correlation: Correlation) -> Self {
        let slot = match correlation {
            Correlation::Tag => &mut self.correlation,
            Correlation::SourceIdThenTag => &mut self.fallback,
            _ => return self,
        };
        if slot.is_none() && !self.id.is_empty() {
            *slot = Some(self.id.clone());
        }
        self
    }

    /// Tag value this item is known by under `correlation`, if any.
    pub fn tag_key(&self, correlation: Correlation) -> Option<&str> {
        match correlation {
            Correlation::Tag => self.correlation.as_deref(),
            Correlation::SourceIdThenTag => self.fallback.as_deref(),
            _ => None,
        }
    }
}

fn display_fallback(kind: EntityKind, id: &str) -> String {
    if id.is_empty() {
        format!("<unnamed {kind}>")
    } else {
        id.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use serde_json::json;
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn references_always_point_earlier() {
        for kind in EntityKind::iter() {
            for dep in kind.references() {
                assert!(dep < &kind, "{kind} references later kind {dep}");
            }
        }
    }

    #[test]
    fn kind_names_round_trip_through_strum() {
        assert_eq!(EntityKind::RunUsers.to_string(), "run_users");
        assert_eq!(EntityKind::from_str("run_users").ok(), Some(EntityKind::RunUsers));
        assert_eq!(EntityKind::from_str("Devices").ok(), Some(EntityKind::Devices));
        assert_eq!(EntityKind::Dashboards.archive_file(), "dashboards.json");
    }

    #[test]
    fn concurrency_stays_in_range() {
        for kind in EntityKind::iter() {
            assert!((1..=10).contains(&kind.concurrency()));
        }
    }

    #[test]
    fn tag_kinds_switch_to_source_id_on_restore() {
        assert_eq!(
            EntityKind::Devices.correlation(SyncMode::Export),
            Correlation::Tag
        );
        assert_eq!(
            EntityKind::Devices.correlation(SyncMode::Restore),
            Correlation::SourceIdThenTag
        );
        assert_eq!(
            EntityKind::RunUsers.correlation(SyncMode::Restore),
            Correlation::NaturalKey("email")
        );
    }

    #[test]
    fn record_from_tagged_summary() {
        let summary = json!({
            "id": "devA",
            "name": "Sensor",
            "tags": [{ "key": "site", "value": "north" }, { "key": "export_id", "value": "x" }]
        });
        let record =
            EntityRecord::from_summary(EntityKind::Devices, summary, Correlation::Tag, "export_id");
        assert_eq!(record.id, "devA");
        assert_eq!(record.name, "Sensor");
        assert_eq!(record.correlation.as_deref(), Some("x"));
    }

    #[test]
    fn files_are_keyed_by_path() {
        let record = EntityRecord::from_summary(
            EntityKind::Files,
            json!({ "path": "img/logo.png", "public": true }),
            Correlation::NaturalKey("path"),
            "export_id",
        );
        assert_eq!(record.id, "img/logo.png");
        assert_eq!(record.correlation.as_deref(), Some("img/logo.png"));
    }

    #[test]
    fn singleton_record_uses_kind_name() {
        let record = EntityRecord::from_summary(
            EntityKind::Run,
            json!({ "name": "My App" }),
            Correlation::Singleton,
            "export_id",
        );
        assert_eq!(record.id, "run");
        assert!(record.correlation.is_none());
    }

    #[test]
    fn restore_record_keeps_tag_as_fallback() {
        let record = EntityRecord::from_summary(
            EntityKind::Devices,
            json!({ "id": "devA", "tags": [{ "key": "export_id", "value": "x" }] }),
            Correlation::SourceIdThenTag,
            "export_id",
        );
        assert_eq!(record.correlation.as_deref(), Some("devA"));
        assert_eq!(record.fallback.as_deref(), Some("x"));
        assert_eq!(record.tag_key(Correlation::SourceIdThenTag), Some("x"));
    }

    #[test]
    fn untagged_source_item_is_keyed_by_its_id() {
        let untagged = json!({ "id": "devA", "name": "Sensor" });
        let export = EntityRecord::from_summary(
            EntityKind::Devices,
            untagged.clone(),
            Correlation::Tag,
            "export_id",
        )
        .tagged_by_own_id(Correlation::Tag);
        assert_eq!(export.correlation.as_deref(), Some("devA"));

        let restore = EntityRecord::from_summary(
            EntityKind::Devices,
            untagged,
            Correlation::SourceIdThenTag,
            "export_id",
        )
        .tagged_by_own_id(Correlation::SourceIdThenTag);
        assert_eq!(restore.fallback.as_deref(), Some("devA"));

        let secret = EntityRecord::from_summary(
            EntityKind::Secrets,
            json!({ "id": "s1" }),
            Correlation::NaturalKey("key"),
            "export_id",
        )
        .tagged_by_own_id(Correlation::NaturalKey("key"));
        assert_eq!(secret.correlation, None);
    }

    #[test]
    fn empty_tag_value_is_no_key() {
        let summary = json!({ "tags": [{ "key": "export_id", "value": "" }] });
        assert_eq!(tag_value(&summary, "export_id"), None);
    }
}
