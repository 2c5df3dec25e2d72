// ── Wire types ──
//
// Only the shapes ferry inspects are typed. Entity payloads stay as
// `serde_json::Value` end to end so unknown fields survive a migration.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The `{ status, result, message }` envelope wrapping every response.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope {
    #[serde(default)]
    pub status: Option<bool>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Result of a create call: the new id plus any secondary token the
/// platform mints only at creation time (devices, analysis).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Created {
    pub id: String,
    pub token: Option<String>,
}

/// One access token of a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceToken {
    pub token: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub permission: Option<String>,
}

/// Anonymous share settings of a dashboard.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PublicShare {
    #[serde(default)]
    pub token: Option<String>,
}

/// Runtime a script is uploaded for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptLanguage {
    Node,
    Python,
}

impl ScriptLanguage {
    /// Pick the language from an analysis runtime string; anything that
    /// is not python runs on node.
    pub fn from_runtime(runtime: Option<&str>) -> Self {
        match runtime {
            Some(r) if r.to_ascii_lowercase().starts_with("python") => Self::Python,
            _ => Self::Node,
        }
    }

    /// File name the platform expects for an uploaded script.
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Node => "script.js",
            Self::Python => "script.py",
        }
    }
}

/// Body of an analysis script upload.
#[derive(Debug, Clone, Serialize)]
pub struct ScriptUpload {
    pub name: String,
    /// Base64 encoded script body.
    pub content: String,
    pub language: ScriptLanguage,
}

/// Downloaded script body.
#[derive(Debug, Clone, Deserialize)]
pub struct ScriptDownload {
    /// Base64 encoded script body.
    pub content: String,
}

/// Entry of the account file listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: String,
    #[serde(default)]
    pub public: bool,
}

/// Base64 encoded file content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileContent {
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::ScriptLanguage;

    #[test]
    fn runtime_defaults_to_node() {
        assert_eq!(ScriptLanguage::from_runtime(None), ScriptLanguage::Node);
        assert_eq!(
            ScriptLanguage::from_runtime(Some("node")),
            ScriptLanguage::Node
        );
        assert_eq!(
            ScriptLanguage::from_runtime(Some("deno-rc")),
            ScriptLanguage::Node
        );
    }

    #[test]
    fn python_runtimes_are_detected() {
        assert_eq!(
            ScriptLanguage::from_runtime(Some("python")),
            ScriptLanguage::Python
        );
        assert_eq!(
            ScriptLanguage::from_runtime(Some("Python3.11")),
            ScriptLanguage::Python
        );
        assert_eq!(ScriptLanguage::Python.file_name(), "script.py");
    }
}
