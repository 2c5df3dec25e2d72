// ── Run configuration ──
//
// Describes *how* one synchronization run behaves. Built by the CLI (or a
// test) and handed in; the engine never reads config files or globals.

use std::time::Duration;

use serde::Serialize;

/// Which entry point a run belongs to. Decides how tag-correlated kinds
/// are matched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SyncMode {
    /// Live account to live account; match by tag.
    #[default]
    Export,
    /// Archive back into a live account; match by source id.
    Restore,
}

/// Settings for a single run.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub mode: SyncMode,
    /// Tag key used for correlation on export.
    pub tag_name: String,
    /// Pause after every item, inside its runner slot.
    pub item_delay: Duration,
    /// Page size for live listings.
    pub page_size: u32,
    /// Replaces every kind's built-in runner concurrency when set.
    pub concurrency_override: Option<usize>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            mode: SyncMode::Export,
            tag_name: "export_id".into(),
            item_delay: Duration::from_millis(200),
            page_size: ferry_api::DEFAULT_PAGE_SIZE,
            concurrency_override: None,
        }
    }
}

impl SyncConfig {
    pub fn with_mode(mut self, mode: SyncMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_tag_name(mut self, tag_name: impl Into<String>) -> Self {
        self.tag_name = tag_name.into();
        self
    }

    pub fn with_item_delay(mut self, item_delay: Duration) -> Self {
        self.item_delay = item_delay;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Runner concurrency for a kind, clamped to 1..=10.
    pub fn concurrency_for(&self, default: usize) -> usize {
        self.concurrency_override.unwrap_or(default).clamp(1, 10)
    }
}

#[cfg(test)]
mod tests {
    use super::SyncConfig;

    #[test]
    fn concurrency_is_clamped() {
        let mut config = SyncConfig::default();
        assert_eq!(config.concurrency_for(3), 3);
        config.concurrency_override = Some(50);
        assert_eq!(config.concurrency_for(3), 10);
        config.concurrency_override = Some(0);
        assert_eq!(config.concurrency_for(3), 1);
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = SyncConfig::default();
        assert_eq!(config.tag_name, "export_id");
        assert_eq!(config.item_delay.as_millis(), 200);
        assert_eq!(config.page_size, 100);
    }
}
