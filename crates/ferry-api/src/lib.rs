// ferry-api: async client for the platform REST API.
//
// One `ApiClient` per account. Entity payloads are passed through as
// `serde_json::Value`; only envelope and nested helper shapes are typed.

pub mod client;
pub mod error;
pub mod models;
pub mod resource;
pub mod transport;

pub use client::{ApiClient, DEFAULT_PAGE_SIZE};
pub use error::Error;
pub use models::{
    Created, DeviceToken, FileContent, FileEntry, PublicShare, ScriptDownload, ScriptLanguage,
    ScriptUpload,
};
pub use resource::Resource;
pub use transport::{TlsMode, TransportConfig};
