use serde::Deserialize;

use entmerge_core::EntityType;

const DEFAULT_MAX_SUMMARY_LENGTH: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Entity kinds that may be merged; anything else fails with `not-item`.
    pub mergeable_types: Vec<EntityType>,
    /// User summaries longer than this many characters are cut.
    pub max_summary_length: usize,
    pub merge_module: String,
    pub redirect_module: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mergeable_types: vec![EntityType::Item],
            max_summary_length: DEFAULT_MAX_SUMMARY_LENGTH,
            merge_module: "wbmergeitems".into(),
            redirect_module: "wbcreateredirect".into(),
        }
    }
}

impl EngineConfig {
    pub fn is_mergeable(&self, entity_type: EntityType) -> bool {
        self.mergeable_types.contains(&entity_type)
    }

    pub fn truncate_summary(&self, summary: Option<&str>) -> Option<String> {
        summary.map(|s| s.chars().take(self.max_summary_length).collect())
    }
}
