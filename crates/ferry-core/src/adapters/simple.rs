// Flat entities: one payload, one create-or-edit call.

use ferry_api::Resource;

use super::{ResourceAdapter, WriteContext, WriteOutcome, strip_managed, upsert};
use crate::error::CoreError;
use crate::model::{EntityKind, EntityRecord};
use crate::source::SourceReader;

pub(crate) struct SimpleAdapter {
    kind: EntityKind,
    resource: Resource,
}

impl SimpleAdapter {
    pub fn new(kind: EntityKind, resource: Resource) -> Self {
        Self { kind, resource }
    }
}

impl ResourceAdapter for SimpleAdapter {
    async fn write<S: SourceReader>(
        &self,
        ctx: &WriteContext<'_, S>,
        record: &EntityRecord,
        existing: Option<&str>,
    ) -> Result<WriteOutcome, CoreError> {
        let detail = ctx.source.detail(self.kind, &record.id).await?;
        let mut body = ctx.rewriter.rewrite(&strip_managed(&detail, &[]));
        ctx.stamp(record, &mut body);
        let upserted = upsert(ctx.target, self.resource, &body, existing).await?;
        Ok(WriteOutcome::new(upserted.id, upserted.created))
    }
}
