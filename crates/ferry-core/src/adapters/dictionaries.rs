// Dictionaries: the dictionary, then one expression table per language.

use ferry_api::Resource;
use serde_json::{Value, json};

use super::{ResourceAdapter, WriteContext, WriteOutcome, strip_managed, upsert};
use crate::error::CoreError;
use crate::model::{EntityKind, EntityRecord};
use crate::source::SourceReader;

pub(crate) struct DictionaryAdapter;

impl ResourceAdapter for DictionaryAdapter {
    async fn write<S: SourceReader>(
        &self,
        ctx: &WriteContext<'_, S>,
        record: &EntityRecord,
        existing: Option<&str>,
    ) -> Result<WriteOutcome, CoreError> {
        let detail = ctx
            .source
            .detail(EntityKind::Dictionaries, &record.id)
            .await?;
        let body = ctx
            .rewriter
            .rewrite(&strip_managed(&detail, &["languages", "expressions"]));
        let upserted = upsert(ctx.target, Resource::Dictionary, &body, existing).await?;

        let languages = detail
            .get("languages")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        for language in languages {
            let Some(code) = language.get("code").and_then(Value::as_str) else {
                continue;
            };
            let active = language
                .get("active")
                .and_then(Value::as_bool)
                .unwrap_or(true);
            let expressions = detail
                .get("expressions")
                .and_then(|e| e.get(code))
                .map_or_else(|| json!({}), |table| ctx.rewriter.rewrite(table));

            ctx.target
                .put_dictionary_language(&upserted.id, code, &expressions, active)
                .await?;
        }

        Ok(WriteOutcome::new(upserted.id, upserted.created))
    }
}
