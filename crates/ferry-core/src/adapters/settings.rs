// Singleton settings objects (run, profile): always one edit.

use serde_json::Value;

use super::{ResourceAdapter, WriteContext, WriteOutcome, strip_managed};
use crate::error::CoreError;
use crate::model::{EntityKind, EntityRecord};
use crate::source::SourceReader;

/// Account-unique fields that must not be copied between accounts.
const RUN_ACCOUNT_FIELDS: &[&str] = &["url", "sub_domain"];

pub(crate) struct SettingsAdapter {
    kind: EntityKind,
}

impl SettingsAdapter {
    pub fn new(kind: EntityKind) -> Self {
        Self { kind }
    }
}

impl ResourceAdapter for SettingsAdapter {
    async fn write<S: SourceReader>(
        &self,
        ctx: &WriteContext<'_, S>,
        record: &EntityRecord,
        _existing: Option<&str>,
    ) -> Result<WriteOutcome, CoreError> {
        let detail = ctx.source.detail(self.kind, &record.id).await?;
        let extra: &[&str] = if self.kind == EntityKind::Run {
            RUN_ACCOUNT_FIELDS
        } else {
            &[]
        };
        let body: Value = ctx.rewriter.rewrite(&strip_managed(&detail, extra));

        if self.kind == EntityKind::Run {
            ctx.target.edit_run_settings(&body).await?;
        } else {
            ctx.target.edit_profile_settings(&body).await?;
        }
        Ok(WriteOutcome::new(record.id.clone(), false))
    }
}
