// ── Dashboards ──
//
// A dashboard is written in three steps:
//
//   1. create the dashboard with an empty arrangement, or edit an existing
//      one without touching its current arrangement
//   2. write every widget under the target dashboard, growing a local
//      old widget id → new widget id map as it goes
//   3. edit the dashboard again with the rewritten arrangement
//
// Widgets may reference widgets written after them; those are edited a
// second time once the local map is complete. A failure after step 1
// leaves the previous arrangement in place.

use ferry_api::{ApiClient, Resource};
use indexmap::IndexMap;
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::{ResourceAdapter, WriteContext, WriteOutcome, strip_managed};
use crate::error::CoreError;
use crate::model::{EntityKind, EntityRecord};
use crate::source::{SourceReader, dashboard_share_token};

/// Composite fields written separately from the dashboard body.
const COMPOSITE_FIELDS: &[&str] = &["widgets", "arrangement", "anonymous_token"];

/// Widget fields the platform owns.
const WIDGET_MANAGED_FIELDS: &[&str] = &["dashboard"];

pub(crate) struct DashboardAdapter;

/// A widget already present on the target dashboard.
struct TargetWidget {
    id: String,
    key: (String, String),
}

fn widget_key(widget: &Value) -> (String, String) {
    let field = |name: &str| {
        widget
            .get(name)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned()
    };
    (field("type"), field("label"))
}

fn arrangement_widget_ids(dashboard: &Value) -> Vec<String> {
    dashboard
        .get("arrangement")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|e| e.get("widget_id").and_then(Value::as_str))
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

async fn target_widgets(
    target: &ApiClient,
    dashboard_id: &str,
) -> Result<Vec<TargetWidget>, CoreError> {
    let dashboard = target.info(Resource::Dashboard, dashboard_id).await?;
    let mut widgets = Vec::new();
    for id in arrangement_widget_ids(&dashboard) {
        let widget = target.widget_info(dashboard_id, &id).await?;
        widgets.push(TargetWidget {
            key: widget_key(&widget),
            id,
        });
    }
    Ok(widgets)
}

impl ResourceAdapter for DashboardAdapter {
    async fn write<S: SourceReader>(
        &self,
        ctx: &WriteContext<'_, S>,
        record: &EntityRecord,
        existing: Option<&str>,
    ) -> Result<WriteOutcome, CoreError> {
        let detail = ctx.source.detail(EntityKind::Dashboards, &record.id).await?;
        let source_share = dashboard_share_token(&detail);
        let widgets: Vec<Value> = detail
            .get("widgets")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let arrangement = detail.get("arrangement").cloned().unwrap_or(json!([]));

        let mut body = ctx
            .rewriter
            .rewrite(&strip_managed(&detail, COMPOSITE_FIELDS));
        ctx.stamp(record, &mut body);

        // ── 1. Dashboard ─────────────────────────────────────────────
        let (dashboard_id, created, unmatched) = match existing {
            Some(target_id) => {
                let target_share = ctx.target.dashboard_public_token(target_id).await?;
                if source_share.is_some() && target_share.is_none() {
                    return Err(CoreError::consistency(format!(
                        "target dashboard {target_id} is not publicly shared"
                    )));
                }
                let current = target_widgets(ctx.target, target_id).await?;
                ctx.target.edit(Resource::Dashboard, target_id, &body).await?;
                (target_id.to_owned(), false, current)
            }
            None => {
                if let Some(obj) = body.as_object_mut() {
                    obj.insert("arrangement".into(), json!([]));
                }
                let created = ctx.target.create(Resource::Dashboard, &body).await?;
                (created.id, true, Vec::new())
            }
        };

        let finished = write_contents(
            ctx,
            &dashboard_id,
            &widgets,
            &arrangement,
            unmatched,
            source_share.is_some(),
        )
        .await;
        match finished {
            Ok(target_share) => {
                Ok(WriteOutcome::new(dashboard_id, created).with_token(source_share, target_share))
            }
            Err(e) if created => Err(CoreError::partial(&record.id, dashboard_id, e)),
            Err(e) => Err(e),
        }
    }
}

/// Steps 2 and 3: widgets, then the arrangement. Returns the target's
/// share token when the source dashboard is shared.
async fn write_contents<S: SourceReader>(
    ctx: &WriteContext<'_, S>,
    dashboard_id: &str,
    widgets: &[Value],
    arrangement: &Value,
    mut unmatched: Vec<TargetWidget>,
    shared: bool,
) -> Result<Option<String>, CoreError> {
    // ── 2. Widgets ───────────────────────────────────────────────
    let mut local: IndexMap<String, String> = IndexMap::new();
    let mut written: Vec<(String, Value, Value)> = Vec::with_capacity(widgets.len());

    for widget in widgets {
        let old_id = widget
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();
        let key = widget_key(widget);
        let stripped = strip_managed(widget, WIDGET_MANAGED_FIELDS);
        let payload = ctx.rewriter.with_layer(&local).rewrite(&stripped);

        let position = unmatched.iter().position(|w| w.key == key);
        let matched = position.map(|idx| unmatched.remove(idx).id);

        let new_id = if let Some(target_widget) = matched {
            ctx.target
                .edit_widget(dashboard_id, &target_widget, &payload)
                .await
                .map_err(|e| widget_error(&key, &e))?;
            target_widget
        } else {
            ctx.target
                .create_widget(dashboard_id, &payload)
                .await
                .map_err(|e| widget_error(&key, &e))?
        };

        debug!(widget = %key.1, old = %old_id, new = %new_id, "widget written");
        if !old_id.is_empty() {
            local.insert(old_id, new_id.clone());
        }
        written.push((new_id, stripped, payload));
    }

    // Forward references among widgets resolve only now.
    let complete = ctx.rewriter.with_layer(&local);
    for (new_id, stripped, sent) in &written {
        let settled = complete.rewrite(stripped);
        if &settled != sent {
            ctx.target
                .edit_widget(dashboard_id, new_id, &settled)
                .await?;
        }
    }

    // ── 3. Arrangement ───────────────────────────────────────────
    ctx.target
        .edit(
            Resource::Dashboard,
            dashboard_id,
            &json!({ "arrangement": complete.rewrite(arrangement) }),
        )
        .await?;

    // The platform has no widget delete; leftovers only drop out of the
    // arrangement.
    for orphan in &unmatched {
        warn!(
            dashboard = %dashboard_id,
            widget = %orphan.id,
            label = %orphan.key.1,
            "target widget has no source counterpart and is no longer arranged"
        );
    }

    if shared {
        Ok(ctx.target.dashboard_public_token(dashboard_id).await?)
    } else {
        Ok(None)
    }
}

fn widget_error(key: &(String, String), err: &ferry_api::Error) -> CoreError {
    CoreError::Api {
        message: format!("widget '{}' ({}): {err}", key.1, key.0),
        status: err.status(),
    }
}
