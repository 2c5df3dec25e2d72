// Stored files: content is copied to the same path on the target.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;

use super::{ResourceAdapter, WriteContext, WriteOutcome};
use crate::error::CoreError;
use crate::model::EntityRecord;
use crate::source::SourceReader;

pub(crate) struct FileAdapter;

impl ResourceAdapter for FileAdapter {
    async fn write<S: SourceReader>(
        &self,
        ctx: &WriteContext<'_, S>,
        record: &EntityRecord,
        existing: Option<&str>,
    ) -> Result<WriteOutcome, CoreError> {
        let path = &record.id;
        let content = ctx.source.file(path).await?;
        let public = record
            .payload
            .get("public")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        ctx.target
            .upload_file(path, &STANDARD.encode(content), public)
            .await?;
        Ok(WriteOutcome::new(path.clone(), existing.is_none()))
    }
}
