// Hand-crafted async HTTP client for the platform REST API.
//
// Auth: `Authorization: Bearer <token>` default header.
// Every response is wrapped in a `{status, result, message}` envelope,
// which is stripped before the caller sees the payload.

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, RETRY_AFTER};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, trace};
use url::Url;

use crate::error::Error;
use crate::models::{
    Created, DeviceToken, Envelope, FileContent, FileEntry, PublicShare, ScriptDownload,
    ScriptUpload,
};
use crate::resource::Resource;
use crate::transport::TransportConfig;

/// Page size used when the caller has no preference.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

// ── Client ───────────────────────────────────────────────────────────

/// Async client for one platform account.
///
/// Cheap to clone (the inner `reqwest::Client` is reference counted), so a
/// run can hand copies to concurrent jobs.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ApiClient {
    // ── Constructors ─────────────────────────────────────────────────

    /// Build from an account token and transport config.
    ///
    /// Injects `Authorization: Bearer <token>` as a default header on every request.
    pub fn new(
        base_url: &str,
        token: &SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
            .map_err(|e| Error::Authentication {
                message: format!("invalid token header value: {e}"),
            })?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);

        let http = transport.build_client_with_headers(headers)?;
        let base_url = Self::normalize_base_url(base_url)?;
        Ok(Self { http, base_url })
    }

    /// Wrap an existing `reqwest::Client` (caller manages auth headers).
    pub fn from_reqwest(base_url: &str, http: reqwest::Client) -> Result<Self, Error> {
        let base_url = Self::normalize_base_url(base_url)?;
        Ok(Self { http, base_url })
    }

    /// The API root this client talks to.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Ensure the base URL ends with `/` so relative joins keep its path.
    fn normalize_base_url(raw: &str) -> Result<Url, Error> {
        let mut url = Url::parse(raw)?;
        let path = url.path().trim_end_matches('/').to_owned();
        url.set_path(&format!("{path}/"));
        Ok(url)
    }

    // ── URL builder ──────────────────────────────────────────────────

    /// Join a relative path (e.g. `"device/abc"`) onto the base URL.
    fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    // ── HTTP verbs ───────────────────────────────────────────────────

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let url = self.url(path)?;
        debug!("GET {url}");

        let resp = self.http.get(url).send().await?;
        parse_envelope(resp).await
    }

    async fn get_with_params<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, Error> {
        let url = self.url(path)?;
        debug!("GET {url} params={params:?}");

        let resp = self.http.get(url).query(params).send().await?;
        parse_envelope(resp).await
    }

    async fn post<T: DeserializeOwned, B: Serialize + Sync + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, Error> {
        let url = self.url(path)?;
        debug!("POST {url}");

        let resp = self.http.post(url).json(body).send().await?;
        parse_envelope(resp).await
    }

    async fn put<B: Serialize + Sync + ?Sized>(&self, path: &str, body: &B) -> Result<(), Error> {
        let url = self.url(path)?;
        debug!("PUT {url}");

        let resp = self.http.put(url).json(body).send().await?;
        // Edits answer with a human-readable message; only success matters.
        let _: Value = parse_envelope(resp).await?;
        Ok(())
    }

    // ━━ Public API ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    // ── Generic collections ──────────────────────────────────────────

    /// Fetch one page of summaries from a collection.
    pub async fn list_page(
        &self,
        resource: Resource,
        page: u32,
        amount: u32,
        fields: &[&str],
    ) -> Result<Vec<Value>, Error> {
        let mut params = vec![("page", page.to_string()), ("amount", amount.to_string())];
        if !fields.is_empty() {
            params.push(("fields", fields.join(",")));
        }
        self.get_with_params(resource.path(), &params).await
    }

    /// Fetch every summary of a collection.
    ///
    /// Pages are 1-based; collection stops at the first page shorter than
    /// `amount`.
    pub async fn list_all(
        &self,
        resource: Resource,
        amount: u32,
        fields: &[&str],
    ) -> Result<Vec<Value>, Error> {
        let amount = amount.max(1);
        let full_page = usize::try_from(amount).unwrap_or(usize::MAX);
        let mut all = Vec::new();
        let mut page = 1;

        loop {
            let items = self.list_page(resource, page, amount, fields).await?;
            let received = items.len();
            all.extend(items);

            if received < full_page {
                break;
            }
            page += 1;
        }

        Ok(all)
    }

    /// Fetch the full record of one entity.
    pub async fn info(&self, resource: Resource, id: &str) -> Result<Value, Error> {
        self.get(&format!("{}/{id}", resource.path())).await
    }

    /// Create an entity and return its new id (plus token, when minted).
    pub async fn create(&self, resource: Resource, body: &Value) -> Result<Created, Error> {
        let result: Value = self.post(resource.path(), body).await?;
        created_from(resource.created_id_field(), resource.label(), &result)
    }

    /// Overwrite an entity's editable fields.
    pub async fn edit(&self, resource: Resource, id: &str, body: &Value) -> Result<(), Error> {
        self.put(&format!("{}/{id}", resource.path()), body).await
    }

    // ── Devices ──────────────────────────────────────────────────────

    pub async fn device_tokens(&self, device_id: &str) -> Result<Vec<DeviceToken>, Error> {
        self.get(&format!("device/token/{device_id}")).await
    }

    // ── Dashboards ───────────────────────────────────────────────────

    pub async fn widget_info(&self, dashboard_id: &str, widget_id: &str) -> Result<Value, Error> {
        self.get(&format!("dashboard/{dashboard_id}/widget/{widget_id}"))
            .await
    }

    pub async fn create_widget(&self, dashboard_id: &str, body: &Value) -> Result<String, Error> {
        let result: Value = self
            .post(&format!("dashboard/{dashboard_id}/widget"), body)
            .await?;
        created_from("widget", "widget", &result).map(|c| c.id)
    }

    pub async fn edit_widget(
        &self,
        dashboard_id: &str,
        widget_id: &str,
        body: &Value,
    ) -> Result<(), Error> {
        self.put(&format!("dashboard/{dashboard_id}/widget/{widget_id}"), body)
            .await
    }

    /// Anonymous share token of a dashboard, `None` when sharing is off.
    pub async fn dashboard_public_token(&self, dashboard_id: &str) -> Result<Option<String>, Error> {
        let share: Option<PublicShare> = self
            .get(&format!("dashboard/{dashboard_id}/share/public"))
            .await?;
        Ok(share.and_then(|s| s.token).filter(|t| !t.is_empty()))
    }

    // ── Dictionaries ─────────────────────────────────────────────────

    pub async fn dictionary_language(&self, dictionary_id: &str, code: &str) -> Result<Value, Error> {
        self.get(&format!("dictionary/{dictionary_id}/{code}")).await
    }

    pub async fn put_dictionary_language(
        &self,
        dictionary_id: &str,
        code: &str,
        expressions: &Value,
        active: bool,
    ) -> Result<(), Error> {
        self.put(
            &format!("dictionary/{dictionary_id}/{code}"),
            &json!({ "dictionary": expressions, "active": active }),
        )
        .await
    }

    // ── Analysis scripts ─────────────────────────────────────────────

    pub async fn upload_script(&self, analysis_id: &str, file: &ScriptUpload) -> Result<(), Error> {
        let _: Value = self
            .post(
                &format!("analysis/{analysis_id}/upload"),
                &json!({ "file": file }),
            )
            .await?;
        Ok(())
    }

    /// Download the base64 script body, `None` when the analysis has no script.
    pub async fn download_script(&self, analysis_id: &str) -> Result<Option<String>, Error> {
        match self
            .get::<ScriptDownload>(&format!("analysis/{analysis_id}/download"))
            .await
        {
            Ok(script) => Ok(Some(script.content)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    // ── Singletons ───────────────────────────────────────────────────

    pub async fn run_settings(&self) -> Result<Value, Error> {
        self.get("run").await
    }

    pub async fn edit_run_settings(&self, body: &Value) -> Result<(), Error> {
        self.put("run", body).await
    }

    pub async fn profile_settings(&self) -> Result<Value, Error> {
        self.get("profile/settings").await
    }

    pub async fn edit_profile_settings(&self, body: &Value) -> Result<(), Error> {
        self.put("profile/settings", body).await
    }

    // ── Files ────────────────────────────────────────────────────────

    pub async fn list_files(&self) -> Result<Vec<FileEntry>, Error> {
        self.get("files").await
    }

    /// Base64 content of one stored file.
    pub async fn file_content(&self, path: &str) -> Result<String, Error> {
        let content: FileContent = self
            .get_with_params("files/content", &[("path", path.to_owned())])
            .await?;
        Ok(content.content)
    }

    pub async fn upload_file(&self, path: &str, content: &str, public: bool) -> Result<(), Error> {
        let _: Value = self
            .post(
                "files",
                &json!({ "path": path, "content": content, "public": public }),
            )
            .await?;
        Ok(())
    }
}

// ── Response handling ────────────────────────────────────────────────

/// Check the HTTP status, then unwrap the `{status, result, message}`
/// envelope and decode `result` into `T`.
async fn parse_envelope<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
    let status = resp.status();

    if status == reqwest::StatusCode::UNAUTHORIZED {
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::Authentication {
            message: envelope_message(&body).unwrap_or_else(|| "token rejected".into()),
        });
    }

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after_secs = resp
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0);
        return Err(Error::RateLimited { retry_after_secs });
    }

    let body = resp.text().await?;

    if !status.is_success() {
        let message = envelope_message(&body).unwrap_or_else(|| {
            if body.is_empty() {
                status.to_string()
            } else {
                preview(&body)
            }
        });
        return Err(Error::Api {
            status: status.as_u16(),
            message,
        });
    }

    let envelope: Envelope = serde_json::from_str(&body).map_err(|e| {
        Error::Deserialization {
            message: format!("{e} (body preview: {:?})", preview(&body)),
            body: body.clone(),
        }
    })?;

    if envelope.status == Some(false) {
        return Err(Error::Api {
            status: status.as_u16(),
            message: envelope
                .message
                .unwrap_or_else(|| "request rejected".into()),
        });
    }

    let result = envelope.result.unwrap_or(Value::Null);
    trace!(result = %result, "envelope result");
    serde_json::from_value(result).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body,
    })
}


// ── Helpers ──────────────────────────────────────────────────────────

/// First 200 characters of a response body.
fn preview(body: &str) -> String {
    body.chars().take(200).collect()
}

/// Best-effort extraction of `message` from an error body.
fn envelope_message(body: &str) -> Option<String> {
    serde_json::from_str::<Envelope>(body)
        .ok()
        .and_then(|e| e.message)
        .filter(|m| !m.is_empty())
}

/// Pull the new id out of a create response.
///
/// Accepts a bare string result, the collection-specific field, or a
/// generic `id` field.
fn created_from(field: &str, context: &str, result: &Value) -> Result<Created, Error> {
    let token = result
        .get("token")
        .and_then(Value::as_str)
        .map(str::to_owned);

    let id = match result {
        Value::String(id) => Some(id.clone()),
        Value::Object(map) => map
            .get(field)
            .or_else(|| map.get("id"))
            .and_then(Value::as_str)
            .map(str::to_owned),
        _ => None,
    };

    id.filter(|id| !id.is_empty())
        .map(|id| Created { id, token })
        .ok_or_else(|| Error::MissingField {
            field: field.to_owned(),
            context: format!("{context} create"),
        })
}
