use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::Config;
use crate::rate_limit::AdaptiveLimiter;

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub api: Option<ApiConfig>,
    pub extraction: Option<ExtractionConfig>,
    pub concurrency: Option<ConcurrencyConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiConfig {
    pub api_key: Option<String>,
    pub api_base: Option<String>,
    pub model: Option<String>,
    pub scoring_model: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionConfig {
    pub max_tokens: Option<u32>,
    pub max_prompt_chars: Option<usize>,
    pub with_scoring: Option<bool>,
    pub with_insights: Option<bool>,
    pub with_key_slides: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    pub num_workers: Option<usize>,
    pub request_timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
    pub requests_per_minute: Option<u32>,
}

/// Platform config directory path: `<config_dir>/deckhand/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("deckhand").join("config.toml"))
}

/// Load config by cascading CWD `.deckhand.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(&PathBuf::from(".deckhand.toml"));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed.
pub fn load_from_path(path: &PathBuf) -> Option<ConfigFile> {
    let content = std::fs::read_to_string(path).ok()?;
    toml::from_str(&content).ok()
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    let (ba, oa) = (base.api.unwrap_or_default(), overlay.api.unwrap_or_default());
    let (be, oe) = (
        base.extraction.unwrap_or_default(),
        overlay.extraction.unwrap_or_default(),
    );
    let (bc, oc) = (
        base.concurrency.unwrap_or_default(),
        overlay.concurrency.unwrap_or_default(),
    );

    ConfigFile {
        api: Some(ApiConfig {
            api_key: oa.api_key.or(ba.api_key),
            api_base: oa.api_base.or(ba.api_base),
            model: oa.model.or(ba.model),
            scoring_model: oa.scoring_model.or(ba.scoring_model),
        }),
        extraction: Some(ExtractionConfig {
            max_tokens: oe.max_tokens.or(be.max_tokens),
            max_prompt_chars: oe.max_prompt_chars.or(be.max_prompt_chars),
            with_scoring: oe.with_scoring.or(be.with_scoring),
            with_insights: oe.with_insights.or(be.with_insights),
            with_key_slides: oe.with_key_slides.or(be.with_key_slides),
        }),
        concurrency: Some(ConcurrencyConfig {
            num_workers: oc.num_workers.or(bc.num_workers),
            request_timeout_secs: oc.request_timeout_secs.or(bc.request_timeout_secs),
            max_retries: oc.max_retries.or(bc.max_retries),
            requests_per_minute: oc.requests_per_minute.or(bc.requests_per_minute),
        }),
    }
}

impl ConfigFile {
    /// Apply file values over a base [`Config`]. Values already set by a
    /// higher-precedence source should be applied after this.
    pub fn apply(&self, config: &mut Config) {
        if let Some(api) = &self.api {
            if let Some(v) = &api.api_key {
                config.api_key = Some(v.clone());
            }
            if let Some(v) = &api.api_base {
                config.api_base = v.clone();
            }
            if let Some(v) = &api.model {
                config.model = v.clone();
            }
            if let Some(v) = &api.scoring_model {
                config.scoring_model = v.clone();
            }
        }
        if let Some(extraction) = &self.extraction {
            if let Some(v) = extraction.max_tokens {
                config.max_tokens = v;
            }
            if let Some(v) = extraction.max_prompt_chars {
                config.max_prompt_chars = v;
            }
            if let Some(v) = extraction.with_scoring {
                config.with_scoring = v;
            }
            if let Some(v) = extraction.with_insights {
                config.with_insights = v;
            }
            if let Some(v) = extraction.with_key_slides {
                config.with_key_slides = v;
            }
        }
        if let Some(concurrency) = &self.concurrency {
            if let Some(v) = concurrency.num_workers {
                config.num_workers = v;
            }
            if let Some(v) = concurrency.request_timeout_secs {
                config.request_timeout_secs = v;
            }
            if let Some(v) = concurrency.max_retries {
                config.max_retries = v;
            }
            if let Some(v) = concurrency.requests_per_minute {
                config.requests_per_minute = v;
                config.limiter = Arc::new(AdaptiveLimiter::per_minute(v));
            }
        }
    }
}

/// Save the current config to the platform config directory.
pub fn save_config(config: &ConfigFile) -> Result<PathBuf, String> {
    let path = config_path().ok_or_else(|| "Could not determine config directory".to_string())?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let content =
        toml::to_string_pretty(config).map_err(|e| format!("Failed to serialize config: {}", e))?;
    std::fs::write(&path, content).map_err(|e| format!("Failed to write config: {}", e))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_toml() {
        let config = ConfigFile {
            api: Some(ApiConfig {
                model: Some("gpt-4o-mini".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: ConfigFile = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.api.unwrap().model.unwrap(), "gpt-4o-mini");
    }

    #[test]
    fn absent_sections_deserialize_as_none() {
        let parsed: ConfigFile = toml::from_str("[api]\nmodel = \"gpt-4o\"\n").unwrap();
        assert!(parsed.extraction.is_none());
        assert!(parsed.concurrency.is_none());
    }

    #[test]
    fn merge_overlay_wins() {
        let base = ConfigFile {
            api: Some(ApiConfig {
                api_key: Some("base-key".into()),
                model: Some("base-model".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let overlay = ConfigFile {
            api: Some(ApiConfig {
                api_key: Some("overlay-key".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let merged = merge(base, overlay);
        let api = merged.api.unwrap();
        assert_eq!(api.api_key.unwrap(), "overlay-key");
        // Base values survive where the overlay is silent.
        assert_eq!(api.model.unwrap(), "base-model");
    }

    #[test]
    fn apply_sets_only_present_values() {
        let file = ConfigFile {
            concurrency: Some(ConcurrencyConfig {
                num_workers: Some(5),
                ..Default::default()
            }),
            ..Default::default()
        };
        let mut config = Config::default();
        let default_model = config.model.clone();
        file.apply(&mut config);
        assert_eq!(config.num_workers, 5);
        assert_eq!(config.model, default_model);
    }

    #[test]
    fn apply_rebuilds_limiter_with_new_rate() {
        let file = ConfigFile {
            concurrency: Some(ConcurrencyConfig {
                requests_per_minute: Some(90),
                ..Default::default()
            }),
            ..Default::default()
        };
        let mut config = Config::default();
        file.apply(&mut config);
        assert_eq!(config.requests_per_minute, 90);
    }

    #[test]
    fn load_from_missing_path_is_none() {
        assert!(load_from_path(&PathBuf::from("/nonexistent/deckhand.toml")).is_none());
    }

    #[test]
    fn load_from_real_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[concurrency]\nnum_workers = 7\n").unwrap();
        let parsed = load_from_path(&path).unwrap();
        assert_eq!(parsed.concurrency.unwrap().num_workers, Some(7));
    }
}
