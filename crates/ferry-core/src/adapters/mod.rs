// ── Resource adapters ──
//
// One adapter per entity kind. An adapter reads an item's full payload
// from the source, strips server-managed fields, rewrites references and
// creates or edits the target counterpart. Composite kinds (dashboards,
// dictionaries, analysis) write their nested parts here as well.

mod analysis;
mod dashboards;
mod devices;
mod dictionaries;
mod files;
mod settings;
mod simple;

use ferry_api::{ApiClient, Resource};
use serde_json::{Value, json};

use crate::error::CoreError;
use crate::model::{Correlation, EntityKind, EntityRecord};
use crate::rewrite::Rewriter;
use crate::source::SourceReader;

pub(crate) use analysis::AnalysisAdapter;
pub(crate) use dashboards::DashboardAdapter;
pub(crate) use devices::DeviceAdapter;
pub(crate) use dictionaries::DictionaryAdapter;
pub(crate) use files::FileAdapter;
pub(crate) use settings::SettingsAdapter;
pub(crate) use simple::SimpleAdapter;

/// Fields the platform owns; never sent back on create or edit.
const MANAGED_FIELDS: &[&str] = &[
    "id",
    "created_at",
    "updated_at",
    "bucket",
    "profile",
    "token",
    "tokens",
];

// ── Context & outcome ────────────────────────────────────────────────

/// What a job may touch while writing one item.
pub(crate) struct WriteContext<'a, S> {
    pub source: &'a S,
    pub target: &'a ApiClient,
    pub rewriter: &'a Rewriter,
    pub correlation: Correlation,
    pub tag_name: &'a str,
}

impl<S> WriteContext<'_, S> {
    /// Make sure a body bound for the target carries the correlation tag
    /// the item is known by, so the next run finds it again.
    pub fn stamp(&self, record: &EntityRecord, body: &mut Value) {
        if let Some(value) = record.tag_key(self.correlation) {
            stamp_tag(body, self.tag_name, value);
        }
    }
}

/// Result of writing one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct WriteOutcome {
    pub target_id: String,
    pub created: bool,
    /// Old → new alternate identifiers learned while writing.
    pub tokens: Vec<(String, String)>,
}

impl WriteOutcome {
    pub fn new(target_id: impl Into<String>, created: bool) -> Self {
        Self {
            target_id: target_id.into(),
            created,
            tokens: Vec::new(),
        }
    }

    pub fn with_token(mut self, old: Option<String>, new: Option<String>) -> Self {
        if let (Some(old), Some(new)) = (old, new) {
            self.tokens.push((old, new));
        }
        self
    }
}

// ── Adapter seam ─────────────────────────────────────────────────────

pub(crate) trait ResourceAdapter {
    /// Create the item when `existing` is `None`, otherwise overwrite the
    /// target entity with that id.
    async fn write<S: SourceReader>(
        &self,
        ctx: &WriteContext<'_, S>,
        record: &EntityRecord,
        existing: Option<&str>,
    ) -> Result<WriteOutcome, CoreError>;
}

/// Adapter selected for a kind.
pub(crate) enum Adapter {
    Simple(SimpleAdapter),
    Devices(DeviceAdapter),
    Analysis(AnalysisAdapter),
    Dictionaries(DictionaryAdapter),
    Dashboards(DashboardAdapter),
    Settings(SettingsAdapter),
    Files(FileAdapter),
}

impl Adapter {
    pub fn for_kind(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Profile | EntityKind::Run => Self::Settings(SettingsAdapter::new(kind)),
            EntityKind::Files => Self::Files(FileAdapter),
            EntityKind::Devices => Self::Devices(DeviceAdapter),
            EntityKind::Analysis => Self::Analysis(AnalysisAdapter),
            EntityKind::Dictionaries => Self::Dictionaries(DictionaryAdapter),
            EntityKind::Dashboards => Self::Dashboards(DashboardAdapter),
            EntityKind::Secrets => Self::Simple(SimpleAdapter::new(kind, Resource::Secret)),
            EntityKind::Networks => Self::Simple(SimpleAdapter::new(kind, Resource::Network)),
            EntityKind::Connectors => Self::Simple(SimpleAdapter::new(kind, Resource::Connector)),
            EntityKind::Actions => Self::Simple(SimpleAdapter::new(kind, Resource::Action)),
            EntityKind::Access => Self::Simple(SimpleAdapter::new(kind, Resource::AccessPolicy)),
            EntityKind::RunUsers => Self::Simple(SimpleAdapter::new(kind, Resource::RunUser)),
        }
    }
}

impl ResourceAdapter for Adapter {
    async fn write<S: SourceReader>(
        &self,
        ctx: &WriteContext<'_, S>,
        record: &EntityRecord,
        existing: Option<&str>,
    ) -> Result<WriteOutcome, CoreError> {
        match self {
            Self::Simple(a) => a.write(ctx, record, existing).await,
            Self::Devices(a) => a.write(ctx, record, existing).await,
            Self::Analysis(a) => a.write(ctx, record, existing).await,
            Self::Dictionaries(a) => a.write(ctx, record, existing).await,
            Self::Dashboards(a) => a.write(ctx, record, existing).await,
            Self::Settings(a) => a.write(ctx, record, existing).await,
            Self::Files(a) => a.write(ctx, record, existing).await,
        }
    }
}

// ── Shared helpers ───────────────────────────────────────────────────

/// Copy of `payload` without server-managed fields, `last_*` fields, and
/// the given kind-specific fields.
pub(crate) fn strip_managed(payload: &Value, extra: &[&str]) -> Value {
    let Value::Object(map) = payload else {
        return payload.clone();
    };
    let kept = map
        .iter()
        .filter(|(key, _)| {
            !MANAGED_FIELDS.contains(&key.as_str())
                && !extra.contains(&key.as_str())
                && !key.starts_with("last_")
        })
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    Value::Object(kept)
}

/// Add `{key: tag_name, value}` to the body's tags unless a non-empty tag
/// with that key is already there.
pub(crate) fn stamp_tag(body: &mut Value, tag_name: &str, value: &str) {
    let Some(obj) = body.as_object_mut() else {
        return;
    };
    let tags = obj.entry("tags").or_insert_with(|| json!([]));
    let Some(tags) = tags.as_array_mut() else {
        return;
    };
    let key_of = |tag: &Value| tag.get("key").and_then(Value::as_str).map(str::to_owned);
    let present = tags.iter().any(|tag| {
        key_of(tag).as_deref() == Some(tag_name)
            && tag
                .get("value")
                .and_then(Value::as_str)
                .is_some_and(|v| !v.is_empty())
    });
    if present {
        return;
    }
    tags.retain(|tag| key_of(tag).as_deref() != Some(tag_name));
    tags.push(json!({ "key": tag_name, "value": value }));
}

/// Id and creation flag of an upserted entity.
pub(crate) struct Upserted {
    pub id: String,
    pub created: bool,
}

/// Edit `existing` or create a new entity in a generic collection.
pub(crate) async fn upsert(
    target: &ApiClient,
    resource: Resource,
    body: &Value,
    existing: Option<&str>,
) -> Result<Upserted, CoreError> {
    if let Some(id) = existing {
        target.edit(resource, id, body).await?;
        return Ok(Upserted {
            id: id.to_owned(),
            created: false,
        });
    }
    let created = target.create(resource, body).await?;
    Ok(Upserted {
        id: created.id,
        created: true,
    })
}
