// ── Archive source ──
//
// Read-only view over an extracted backup directory:
//
//   <dir>/<kind>.json         array of entities (object for run/profile)
//   <dir>/analysis/<id>.gz    gzip-compressed script bodies
//   <dir>/files/<path>        stored file content
//
// Collections are parsed once at open; scripts and files are read lazily.

use std::collections::HashMap;
use std::io::Read;
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use serde_json::Value;
use strum::IntoEnumIterator;
use tracing::debug;

use super::{SourceReader, dashboard_share_token, first_device_token};
use crate::error::CoreError;
use crate::model::EntityKind;

/// Per-kind entity counts, shown before a restore writes anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub counts: Vec<(EntityKind, usize)>,
    /// Analysis scripts present under `analysis/`.
    pub scripts: usize,
}

impl ArchiveSummary {
    pub fn count(&self, kind: EntityKind) -> usize {
        self.counts
            .iter()
            .find(|(k, _)| *k == kind)
            .map_or(0, |(_, n)| *n)
    }

    pub fn total(&self) -> usize {
        self.counts.iter().map(|(_, n)| n).sum()
    }
}

/// An extracted archive directory.
#[derive(Debug)]
pub struct Archive {
    root: PathBuf,
    collections: HashMap<EntityKind, Vec<Value>>,
}

impl Archive {
    /// Open an archive directory and parse every collection file present.
    /// A missing file means the archive holds no entities of that kind.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, CoreError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(CoreError::archive(root.display(), "not a directory"));
        }

        let mut collections = HashMap::new();
        for kind in EntityKind::iter() {
            let path = root.join(kind.archive_file());
            if !path.is_file() {
                continue;
            }
            let raw = std::fs::read_to_string(&path)
                .map_err(|e| CoreError::archive(path.display(), e))?;
            let parsed: Value = serde_json::from_str(&raw)
                .map_err(|e| CoreError::archive(path.display(), format!("invalid JSON: {e}")))?;

            let items = match parsed {
                Value::Array(items) => items,
                Value::Null => Vec::new(),
                obj @ Value::Object(_) if kind.is_singleton() => vec![obj],
                _ => {
                    return Err(CoreError::archive(
                        path.display(),
                        "expected a JSON array of entities",
                    ));
                }
            };
            debug!(%kind, count = items.len(), "loaded archive collection");
            collections.insert(kind, items);
        }

        Ok(Self { root, collections })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Counts of every kind present, in processing order.
    pub fn summary(&self) -> ArchiveSummary {
        let counts = EntityKind::iter()
            .filter_map(|kind| {
                self.collections
                    .get(&kind)
                    .filter(|items| !items.is_empty())
                    .map(|items| (kind, items.len()))
            })
            .collect();

        let scripts = std::fs::read_dir(self.root.join("analysis"))
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .filter(|e| e.path().extension().is_some_and(|ext| ext == "gz"))
                    .count()
            })
            .unwrap_or(0);

        ArchiveSummary { counts, scripts }
    }

    fn items(&self, kind: EntityKind) -> &[Value] {
        self.collections
            .get(&kind)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    fn find(&self, kind: EntityKind, id: &str) -> Option<&Value> {
        if kind.is_singleton() {
            return self.items(kind).first();
        }
        let field = if kind == EntityKind::Files { "path" } else { "id" };
        self.items(kind)
            .iter()
            .find(|item| item.get(field).and_then(Value::as_str) == Some(id))
    }

    /// Join an archive-relative path, refusing anything that escapes `base`.
    fn contained(base: &Path, relative: &str) -> Result<PathBuf, CoreError> {
        let relative = Path::new(relative.trim_start_matches('/'));
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes || relative.as_os_str().is_empty() {
            return Err(CoreError::archive(
                base.display(),
                format!("refusing path outside the archive: {}", relative.display()),
            ));
        }
        Ok(base.join(relative))
    }
}

impl SourceReader for Archive {
    async fn list(&self, kind: EntityKind) -> Result<Vec<Value>, CoreError> {
        Ok(self.items(kind).to_vec())
    }

    async fn detail(&self, kind: EntityKind, id: &str) -> Result<Value, CoreError> {
        self.find(kind, id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound {
                entity_type: kind.to_string(),
                identifier: id.to_owned(),
            })
    }

    async fn script(&self, analysis_id: &str) -> Result<Option<Vec<u8>>, CoreError> {
        let path = Self::contained(&self.root.join("analysis"), &format!("{analysis_id}.gz"))?;
        let compressed = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CoreError::archive(path.display(), e)),
        };
        let mut script = Vec::new();
        GzDecoder::new(compressed.as_slice())
            .read_to_end(&mut script)
            .map_err(|e| CoreError::Script {
                message: format!("{}: not a gzip stream: {e}", path.display()),
            })?;
        Ok(Some(script))
    }

    async fn file(&self, path: &str) -> Result<Vec<u8>, CoreError> {
        let full = Self::contained(&self.root.join("files"), path)?;
        tokio::fs::read(&full)
            .await
            .map_err(|e| CoreError::archive(full.display(), e))
    }

    async fn secondary_token(
        &self,
        kind: EntityKind,
        id: &str,
    ) -> Result<Option<String>, CoreError> {
        let token = match kind {
            EntityKind::Devices => self.find(kind, id).and_then(first_device_token),
            EntityKind::Dashboards => self.find(kind, id).and_then(dashboard_share_token),
            _ => None,
        };
        Ok(token)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Write;

    use flate2::Compression;
    use flate2::write::GzEncoder;
    use serde_json::json;

    use super::*;

    fn write(dir: &Path, name: &str, value: &Value) {
        std::fs::write(dir.join(name), serde_json::to_vec(value).unwrap()).unwrap();
    }

    #[tokio::test]
    async fn missing_collection_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let archive = Archive::open(dir.path()).unwrap();
        assert!(archive.list(EntityKind::Devices).await.unwrap().is_empty());
        assert_eq!(archive.summary().total(), 0);
    }

    #[tokio::test]
    async fn singleton_object_lists_as_one_item() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "run.json", &json!({ "name": "My App" }));

        let archive = Archive::open(dir.path()).unwrap();
        let run = archive.list(EntityKind::Run).await.unwrap();
        assert_eq!(run, vec![json!({ "name": "My App" })]);
        assert_eq!(
            archive.detail(EntityKind::Run, "run").await.unwrap()["name"],
            "My App"
        );
    }

    #[tokio::test]
    async fn tokens_and_summary() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "devices.json",
            &json!([
                { "id": "d1", "name": "A", "tokens": [{ "token": "t1", "name": "Default" }] },
                { "id": "d2", "name": "B", "tokens": [] }
            ]),
        );
        write(
            dir.path(),
            "dashboards.json",
            &json!([{ "id": "db1", "label": "Main", "anonymous_token": "anon1" }]),
        );

        let archive = Archive::open(dir.path()).unwrap();
        assert_eq!(
            archive
                .secondary_token(EntityKind::Devices, "d1")
                .await
                .unwrap()
                .as_deref(),
            Some("t1")
        );
        assert_eq!(
            archive
                .secondary_token(EntityKind::Devices, "d2")
                .await
                .unwrap(),
            None
        );
        assert_eq!(
            archive
                .secondary_token(EntityKind::Dashboards, "db1")
                .await
                .unwrap()
                .as_deref(),
            Some("anon1")
        );

        let summary = archive.summary();
        assert_eq!(summary.count(EntityKind::Devices), 2);
        assert_eq!(summary.count(EntityKind::Dashboards), 1);
        assert_eq!(summary.total(), 3);
    }

    #[tokio::test]
    async fn gzip_script_is_decompressed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("analysis")).unwrap();
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"console.log('devA');").unwrap();
        std::fs::write(dir.path().join("analysis/an1.gz"), encoder.finish().unwrap()).unwrap();

        let archive = Archive::open(dir.path()).unwrap();
        let script = archive.script("an1").await.unwrap().unwrap();
        assert_eq!(script, b"console.log('devA');");
        assert!(archive.script("an2").await.unwrap().is_none());
        assert_eq!(archive.summary().scripts, 1);
    }

    #[tokio::test]
    async fn file_paths_cannot_escape() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("files/img")).unwrap();
        std::fs::write(dir.path().join("files/img/logo.png"), b"png").unwrap();

        let archive = Archive::open(dir.path()).unwrap();
        assert_eq!(archive.file("img/logo.png").await.unwrap(), b"png");
        assert_eq!(archive.file("/img/logo.png").await.unwrap(), b"png");
        assert!(archive.file("../secret.txt").await.is_err());
    }

    #[test]
    fn invalid_json_is_archive_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("devices.json"), b"{not json").unwrap();
        let err = Archive::open(dir.path()).unwrap_err();
        assert!(matches!(err, CoreError::Archive { .. }));
    }

    #[test]
    fn object_for_collection_kind_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "devices.json", &json!({ "id": "d1" }));
        assert!(Archive::open(dir.path()).is_err());
    }
}
