use std::{path::Path, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{
    context::{
        ContextSettings,
        DEFAULT_HIERARCHY_CACHE_SIZE,
        DEFAULT_LABEL_CACHE_SIZE,
        cache::capacity_from,
    },
    error::Result,
    filter::FilterPolicy,
    labels::{Label, LabelsStore, LabelsStoreMem, LabelsStoreZero},
    persist::{DEFAULT_LOOKUP_CACHE_SIZE, LabelMode, SqliteOptions, StoreRegistry},
    storefmt::{DEFAULT_BUFFER_CAPACITY, StoreFormat},
};

/// Settings for one protected dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AbacConfig {
    /// Label verdicts cached per request; zero or less disables.
    pub label_eval_cache_size: i64,
    pub hierarchy_cache_size: i64,
    /// Used for triples whose label list is empty.
    pub default_label: Option<String>,
    /// Verdict for triples when no labels store is configured.
    pub default_choice_no_labels: bool,
    /// Log each verdict at debug level.
    pub debug: bool,
    pub labels: StoreConfig,
}

impl Default for AbacConfig {
    fn default() -> Self {
        Self {
            label_eval_cache_size: DEFAULT_LABEL_CACHE_SIZE as i64,
            hierarchy_cache_size: DEFAULT_HIERARCHY_CACHE_SIZE as i64,
            default_label: None,
            default_choice_no_labels: true,
            debug: false,
            labels: StoreConfig::default(),
        }
    }
}

impl AbacConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        let config: AbacConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config = Self::from_json(&std::fs::read_to_string(path)?)?;
        log::info!("loaded access control config from {}", path.display());
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if let Some(text) = &self.default_label {
            Label::from_text(text).parse()?;
        }
        Ok(())
    }

    pub fn context_settings(&self) -> ContextSettings {
        ContextSettings {
            label_cache_size: capacity_from(self.label_eval_cache_size),
            hierarchy_cache_size: capacity_from(self.hierarchy_cache_size),
        }
    }

    pub fn filter_policy(&self) -> FilterPolicy {
        FilterPolicy {
            default_label: self.default_label.as_deref().map(Label::from_text),
            default_choice_no_labels: self.default_choice_no_labels,
        }
    }
}

/// Which labels store backs a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreConfig {
    #[default]
    Memory,
    Empty,
    Persistent(PersistentConfig),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistentConfig {
    pub path: String,
    #[serde(default)]
    pub format: StoreFormat,
    #[serde(default)]
    pub mode: LabelMode,
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,
    #[serde(default = "default_lookup_cache_size")]
    pub lookup_cache_size: usize,
}

fn default_buffer_capacity() -> usize {
    DEFAULT_BUFFER_CAPACITY
}

fn default_lookup_cache_size() -> usize {
    DEFAULT_LOOKUP_CACHE_SIZE
}

impl PersistentConfig {
    pub fn options(&self) -> SqliteOptions {
        SqliteOptions {
            format: self.format,
            mode: self.mode,
            buffer_capacity: self.buffer_capacity,
            lookup_cache_size: self.lookup_cache_size,
        }
    }
}

/// Build the labels store a dataset is configured with. Persistent stores
/// are opened through `registry`, so a directory is only opened once.
pub fn create_labels_store(
    config: &StoreConfig,
    registry: &StoreRegistry,
) -> Result<Arc<dyn LabelsStore>> {
    let store: Arc<dyn LabelsStore> = match config {
        StoreConfig::Memory => Arc::new(LabelsStoreMem::new()),
        StoreConfig::Empty => Arc::new(LabelsStoreZero::new()),
        StoreConfig::Persistent(persistent) => {
            registry.open(&persistent.path, persistent.options())?
        }
    };
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storefmt::HashAlgorithm;

    #[test]
    fn defaults() {
        let config = AbacConfig::from_json("{}").unwrap();
        assert_eq!(config, AbacConfig::default());
        assert!(config.default_choice_no_labels);
        let settings = config.context_settings();
        assert_eq!(settings.label_cache_size, 100_000);
        assert_eq!(settings.hierarchy_cache_size, 100);
    }

    #[test]
    fn non_positive_sizes_disable_caches() {
        let config =
            AbacConfig::from_json(r#"{"label_eval_cache_size": -1, "hierarchy_cache_size": 0}"#)
                .unwrap();
        let settings = config.context_settings();
        assert_eq!(settings.label_cache_size, 0);
        assert_eq!(settings.hierarchy_cache_size, 0);
    }

    #[test]
    fn persistent_store_config() {
        let config = AbacConfig::from_json(
            r#"{
                "default_label": "role=staff",
                "labels": {
                    "kind": "persistent",
                    "path": "/var/lib/labels",
                    "format": {"by_hash": {"algorithm": "sha512"}},
                    "mode": "merge"
                }
            }"#,
        )
        .unwrap();
        let StoreConfig::Persistent(persistent) = &config.labels else {
            panic!("expected a persistent store, got {:?}", config.labels);
        };
        assert_eq!(
            persistent.format,
            StoreFormat::ByHash {
                algorithm: HashAlgorithm::Sha512
            }
        );
        assert_eq!(persistent.mode, LabelMode::Merge);
        assert_eq!(persistent.buffer_capacity, DEFAULT_BUFFER_CAPACITY);
        assert_eq!(
            config.filter_policy().default_label,
            Some(Label::from_text("role=staff"))
        );
    }

    #[test]
    fn unit_format_names() {
        let config: PersistentConfig =
            serde_json::from_str(r#"{"path": "x", "format": "by_node_id"}"#).unwrap();
        assert_eq!(config.format, StoreFormat::ByNodeId);
        assert_eq!(config.mode, LabelMode::Overwrite);
    }

    #[test]
    fn bad_default_label_rejected() {
        let err = AbacConfig::from_json(r#"{"default_label": "role = "}"#).unwrap_err();
        assert!(err.is_syntax());
        assert!(AbacConfig::from_json(r#"{"labels": {"kind": "remote"}}"#).is_err());
    }

    #[test]
    fn factory_builds_each_kind() {
        let registry = StoreRegistry::new();
        let mem = create_labels_store(&StoreConfig::Memory, &registry).unwrap();
        assert_eq!(mem.properties().unwrap()["kind"], "memory");
        let empty = create_labels_store(&StoreConfig::Empty, &registry).unwrap();
        assert!(!empty.supports_remove());

        let dir = tempfile::tempdir().unwrap();
        let persistent = StoreConfig::Persistent(PersistentConfig {
            path: dir.path().display().to_string(),
            format: StoreFormat::ByString,
            mode: LabelMode::Overwrite,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            lookup_cache_size: 0,
        });
        let a = create_labels_store(&persistent, &registry).unwrap();
        let b = create_labels_store(&persistent, &registry).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }
}
