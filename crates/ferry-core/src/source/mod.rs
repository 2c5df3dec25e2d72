// ── Sync sources ──
//
// Read side of a run. A source is either a live account or an extracted
// archive; both hand out the same payload shapes so adapters never care
// which one they read from.

mod archive;
mod live;

pub use archive::{Archive, ArchiveSummary};
pub use live::LiveSource;

use serde_json::Value;

use crate::error::CoreError;
use crate::model::EntityKind;

/// Everything the engine reads from the source side of a run.
///
/// Detail payloads are composed: dashboards carry their `widgets`,
/// dictionaries their `expressions`, devices their `tokens`.
#[allow(async_fn_in_trait)]
pub trait SourceReader {
    /// Cheap summaries of every entity of a kind. Singletons yield one
    /// object, or nothing when the source has none.
    async fn list(&self, kind: EntityKind) -> Result<Vec<Value>, CoreError>;

    /// Full payload of one entity.
    async fn detail(&self, kind: EntityKind, id: &str) -> Result<Value, CoreError>;

    /// Raw script body of an analysis, `None` when it has none.
    async fn script(&self, analysis_id: &str) -> Result<Option<Vec<u8>>, CoreError>;

    /// Raw content of a stored file.
    async fn file(&self, path: &str) -> Result<Vec<u8>, CoreError>;

    /// Alternate identifier of an entity (first device token, dashboard
    /// share token).
    async fn secondary_token(&self, kind: EntityKind, id: &str)
    -> Result<Option<String>, CoreError>;
}

/// First `tokens[].token` of a device payload.
pub(crate) fn first_device_token(device: &Value) -> Option<String> {
    device
        .get("tokens")?
        .as_array()?
        .iter()
        .find_map(|t| t.get("token").and_then(Value::as_str))
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
}

/// `anonymous_token` of a dashboard payload.
pub(crate) fn dashboard_share_token(dashboard: &Value) -> Option<String> {
    dashboard
        .get("anonymous_token")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
}
