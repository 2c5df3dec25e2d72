// Live account as a sync source (and as the listing side of a target).

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use ferry_api::ApiClient;
use serde_json::{Map, Value, json};
use tracing::debug;

use super::SourceReader;
use crate::error::CoreError;
use crate::model::EntityKind;

/// Reads entities straight from a platform account.
#[derive(Debug, Clone)]
pub struct LiveSource {
    client: ApiClient,
    page_size: u32,
}

impl LiveSource {
    pub fn new(client: ApiClient, page_size: u32) -> Self {
        Self {
            client,
            page_size: page_size.max(1),
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    async fn dashboard_detail(&self, id: &str) -> Result<Value, CoreError> {
        let mut dashboard = self.client.info(ferry_api::Resource::Dashboard, id).await?;

        let widget_ids: Vec<String> = dashboard
            .get("arrangement")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|e| e.get("widget_id").and_then(Value::as_str))
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();

        let mut widgets = Vec::with_capacity(widget_ids.len());
        for widget_id in &widget_ids {
            widgets.push(self.client.widget_info(id, widget_id).await?);
        }

        let share = self.client.dashboard_public_token(id).await?;
        if let Some(obj) = dashboard.as_object_mut() {
            obj.insert("widgets".into(), Value::Array(widgets));
            if let Some(token) = share {
                obj.insert("anonymous_token".into(), Value::String(token));
            }
        }
        Ok(dashboard)
    }

    async fn dictionary_detail(&self, id: &str) -> Result<Value, CoreError> {
        let mut dictionary = self.client.info(ferry_api::Resource::Dictionary, id).await?;

        let codes: Vec<String> = dictionary
            .get("languages")
            .and_then(Value::as_array)
            .map(|langs| {
                langs
                    .iter()
                    .filter_map(|l| l.get("code").and_then(Value::as_str))
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();

        let mut expressions = Map::new();
        for code in codes {
            let table = self.client.dictionary_language(id, &code).await?;
            expressions.insert(code, table);
        }

        if let Some(obj) = dictionary.as_object_mut() {
            obj.insert("expressions".into(), Value::Object(expressions));
        }
        Ok(dictionary)
    }
}

impl SourceReader for LiveSource {
    async fn list(&self, kind: EntityKind) -> Result<Vec<Value>, CoreError> {
        debug!(%kind, "listing live collection");
        match kind {
            EntityKind::Profile => Ok(vec![self.client.profile_settings().await?]),
            EntityKind::Run => Ok(vec![self.client.run_settings().await?]),
            EntityKind::Files => {
                let files = self.client.list_files().await?;
                Ok(files
                    .into_iter()
                    .map(|f| json!({ "path": f.path, "public": f.public }))
                    .collect())
            }
            _ => {
                let resource = kind
                    .resource()
                    .ok_or_else(|| CoreError::Internal(format!("{kind} has no collection")))?;
                Ok(self
                    .client
                    .list_all(resource, self.page_size, kind.list_fields())
                    .await?)
            }
        }
    }

    async fn detail(&self, kind: EntityKind, id: &str) -> Result<Value, CoreError> {
        match kind {
            EntityKind::Profile => Ok(self.client.profile_settings().await?),
            EntityKind::Run => Ok(self.client.run_settings().await?),
            EntityKind::Files => Ok(json!({ "path": id })),
            EntityKind::Dashboards => self.dashboard_detail(id).await,
            EntityKind::Dictionaries => self.dictionary_detail(id).await,
            EntityKind::Devices => {
                let mut device = self.client.info(ferry_api::Resource::Device, id).await?;
                let tokens = self.client.device_tokens(id).await?;
                if let Some(obj) = device.as_object_mut() {
                    obj.insert(
                        "tokens".into(),
                        serde_json::to_value(tokens).unwrap_or(Value::Null),
                    );
                }
                Ok(device)
            }
            _ => {
                let resource = kind
                    .resource()
                    .ok_or_else(|| CoreError::Internal(format!("{kind} has no collection")))?;
                Ok(self.client.info(resource, id).await?)
            }
        }
    }

    async fn script(&self, analysis_id: &str) -> Result<Option<Vec<u8>>, CoreError> {
        let Some(encoded) = self.client.download_script(analysis_id).await? else {
            return Ok(None);
        };
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| CoreError::Script {
                message: format!("analysis {analysis_id}: script is not valid base64: {e}"),
            })?;
        Ok(Some(bytes))
    }

    async fn file(&self, path: &str) -> Result<Vec<u8>, CoreError> {
        let encoded = self.client.file_content(path).await?;
        STANDARD
            .decode(encoded.trim())
            .map_err(|e| CoreError::Internal(format!("file {path}: invalid base64 content: {e}")))
    }

    async fn secondary_token(
        &self,
        kind: EntityKind,
        id: &str,
    ) -> Result<Option<String>, CoreError> {
        match kind {
            EntityKind::Devices => Ok(self
                .client
                .device_tokens(id)
                .await?
                .into_iter()
                .map(|t| t.token)
                .find(|t| !t.is_empty())),
            EntityKind::Dashboards => Ok(self.client.dashboard_public_token(id).await?),
            _ => Ok(None),
        }
    }
}
