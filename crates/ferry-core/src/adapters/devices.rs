// Devices: the access token is an identifier payloads embed, so every
// written device must yield an old token → new token pair.

use ferry_api::{ApiClient, Resource};

use super::{ResourceAdapter, WriteContext, WriteOutcome, strip_managed};
use crate::error::CoreError;
use crate::model::{EntityKind, EntityRecord};
use crate::source::{SourceReader, first_device_token};

pub(crate) struct DeviceAdapter;

async fn first_target_token(
    target: &ApiClient,
    device_id: &str,
) -> Result<Option<String>, CoreError> {
    Ok(target
        .device_tokens(device_id)
        .await?
        .into_iter()
        .map(|t| t.token)
        .find(|t| !t.is_empty()))
}

impl ResourceAdapter for DeviceAdapter {
    async fn write<S: SourceReader>(
        &self,
        ctx: &WriteContext<'_, S>,
        record: &EntityRecord,
        existing: Option<&str>,
    ) -> Result<WriteOutcome, CoreError> {
        let detail = ctx.source.detail(EntityKind::Devices, &record.id).await?;
        let source_token = first_device_token(&detail);
        let mut body = ctx.rewriter.rewrite(&strip_managed(&detail, &[]));
        ctx.stamp(record, &mut body);

        if let Some(target_id) = existing {
            // Check before writing so a mismatched pair leaves the target untouched.
            let target_token = first_target_token(ctx.target, target_id).await?;
            if source_token.is_some() && target_token.is_none() {
                return Err(CoreError::consistency(format!(
                    "target device {target_id} has no access token"
                )));
            }
            ctx.target.edit(Resource::Device, target_id, &body).await?;
            return Ok(WriteOutcome::new(target_id, false).with_token(source_token, target_token));
        }

        let created = ctx.target.create(Resource::Device, &body).await?;
        let token = match created.token {
            Some(token) => Some(token),
            None => first_target_token(ctx.target, &created.id)
                .await
                .map_err(|e| CoreError::partial(&record.id, &created.id, e))?,
        };
        if token.is_none() {
            return Err(CoreError::partial(
                &record.id,
                &created.id,
                CoreError::consistency(format!(
                    "device {} was created without an access token",
                    created.id
                )),
            ));
        }
        Ok(WriteOutcome::new(created.id, true).with_token(source_token, token))
    }
}
