// Analysis: the record itself, then its script body.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use ferry_api::{Resource, ScriptLanguage, ScriptUpload};
use serde_json::Value;
use tracing::debug;

use super::{ResourceAdapter, WriteContext, WriteOutcome, strip_managed, upsert};
use crate::error::CoreError;
use crate::model::{EntityKind, EntityRecord};
use crate::source::SourceReader;

pub(crate) struct AnalysisAdapter;

impl ResourceAdapter for AnalysisAdapter {
    async fn write<S: SourceReader>(
        &self,
        ctx: &WriteContext<'_, S>,
        record: &EntityRecord,
        existing: Option<&str>,
    ) -> Result<WriteOutcome, CoreError> {
        let detail = ctx.source.detail(EntityKind::Analysis, &record.id).await?;
        let mut body = ctx.rewriter.rewrite(&strip_managed(&detail, &[]));
        ctx.stamp(record, &mut body);
        let upserted = upsert(ctx.target, Resource::Analysis, &body, existing).await?;
        let partial = |e: CoreError| CoreError::partial(&record.id, &upserted.id, e);

        let Some(script) = ctx.source.script(&record.id).await.map_err(partial)? else {
            debug!(analysis = %record.name, "no script to upload");
            return Ok(WriteOutcome::new(upserted.id, upserted.created));
        };

        // Scripts embed device ids and tokens as plain text.
        let script = match String::from_utf8(script) {
            Ok(text) => ctx.rewriter.rewrite_str(&text).into_bytes(),
            Err(binary) => binary.into_bytes(),
        };

        let language =
            ScriptLanguage::from_runtime(detail.get("runtime").and_then(Value::as_str));
        let upload = ScriptUpload {
            name: language.file_name().to_owned(),
            content: STANDARD.encode(script),
            language,
        };
        ctx.target
            .upload_script(&upserted.id, &upload)
            .await
            .map_err(|e| {
                partial(CoreError::Script {
                    message: format!("upload for '{}' failed: {e}", record.name),
                })
            })?;

        Ok(WriteOutcome::new(upserted.id, upserted.created))
    }
}
