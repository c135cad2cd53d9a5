//! Run configuration.
//!
//! Values resolve in order of precedence: CLI flags, then the config file
//! (YAML for `.yaml`/`.yml`, JSON otherwise), then built-in defaults.
//! Gateway credentials are read from the environment, see
//! [`OpenRouterAdapter::from_env`](crate::gateway::OpenRouterAdapter::from_env).

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::gateway::{PricingInfo, ProviderPreferences, ReasoningEffort};
use crate::generate::GenerationSettings;

pub const DEFAULT_CONCURRENCY: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid YAML in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("missing required setting: {0}")]
    Missing(&'static str),
    #[error("invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}

/// Explicit per-token USD rates. All three must be set for cost tracking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PricingOverride {
    pub prompt: Option<f64>,
    pub completion: Option<f64>,
    pub request: Option<f64>,
}

impl PricingOverride {
    pub fn resolve(&self) -> PricingInfo {
        PricingInfo::from_parts(self.prompt, self.completion, self.request)
    }
}

/// Settings as they appear in a config file. Also used for CLI overrides.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub model: Option<String>,
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub system_prompt: Option<String>,
    pub store_system: Option<bool>,
    pub concurrency: Option<usize>,
    pub reasoning_effort: Option<ReasoningEffort>,
    pub provider: Option<ProviderPreferences>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub pricing: Option<PricingOverride>,
}

impl FileConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &raw)
    }

    fn parse(path: &Path, raw: &str) -> Result<Self, ConfigError> {
        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml" | "yml")
        );
        if is_yaml {
            serde_yaml::from_str(raw).map_err(|source| ConfigError::Yaml {
                path: path.to_path_buf(),
                source,
            })
        } else {
            serde_json::from_str(raw).map_err(|source| ConfigError::Json {
                path: path.to_path_buf(),
                source,
            })
        }
    }

    /// Fields set in `overrides` win.
    pub fn merge(self, overrides: FileConfig) -> FileConfig {
        FileConfig {
            model: overrides.model.or(self.model),
            input: overrides.input.or(self.input),
            output: overrides.output.or(self.output),
            system_prompt: overrides.system_prompt.or(self.system_prompt),
            store_system: overrides.store_system.or(self.store_system),
            concurrency: overrides.concurrency.or(self.concurrency),
            reasoning_effort: overrides.reasoning_effort.or(self.reasoning_effort),
            provider: merge_provider(self.provider, overrides.provider),
            temperature: overrides.temperature.or(self.temperature),
            max_tokens: overrides.max_tokens.or(self.max_tokens),
            pricing: overrides.pricing.or(self.pricing),
        }
    }
}

fn merge_provider(
    base: Option<ProviderPreferences>,
    overrides: Option<ProviderPreferences>,
) -> Option<ProviderPreferences> {
    match (base, overrides) {
        (None, o) => o,
        (b, None) => b,
        (Some(b), Some(o)) => Some(ProviderPreferences {
            order: o.order.or(b.order),
            only: o.only.or(b.only),
            ignore: o.ignore.or(b.ignore),
            allow_fallbacks: o.allow_fallbacks.or(b.allow_fallbacks),
            sort: o.sort.or(b.sort),
            data_collection: o.data_collection.or(b.data_collection),
        }),
    }
}

/// Fully resolved configuration for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub concurrency: NonZeroUsize,
    pub generation: GenerationSettings,
    /// Explicit pricing from config; takes precedence over the catalog.
    pub pricing: Option<PricingOverride>,
}

impl RunConfig {
    pub fn resolve(config: FileConfig) -> Result<Self, ConfigError> {
        let model = config
            .model
            .filter(|m| !m.trim().is_empty())
            .ok_or(ConfigError::Missing("model"))?;
        let input = config.input.ok_or(ConfigError::Missing("input"))?;
        let output = config.output.ok_or(ConfigError::Missing("output"))?;

        let concurrency = config.concurrency.unwrap_or(DEFAULT_CONCURRENCY);
        let concurrency = NonZeroUsize::new(concurrency).ok_or_else(|| {
            ConfigError::InvalidValue("concurrency", "must be at least 1".to_string())
        })?;

        if let Some(t) = config.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(ConfigError::InvalidValue(
                    "temperature",
                    format!("{t} is outside 0.0..=2.0"),
                ));
            }
        }

        if let Some(pricing) = &config.pricing {
            let rates = [pricing.prompt, pricing.completion, pricing.request];
            if rates.iter().flatten().any(|r| !r.is_finite() || *r < 0.0) {
                return Err(ConfigError::InvalidValue(
                    "pricing",
                    "rates must be non-negative numbers".to_string(),
                ));
            }
        }

        Ok(Self {
            input,
            output,
            concurrency,
            generation: GenerationSettings {
                model,
                system_prompt: config.system_prompt.filter(|s| !s.trim().is_empty()),
                store_system: config.store_system.unwrap_or(false),
                provider: config.provider.filter(|p| !p.is_empty()),
                reasoning_effort: config.reasoning_effort,
                temperature: config.temperature,
                max_tokens: config.max_tokens,
            },
            pricing: config.pricing,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> FileConfig {
        FileConfig {
            model: Some("openai/gpt-5-mini".into()),
            input: Some("prompts.txt".into()),
            output: Some("out.jsonl".into()),
            ..Default::default()
        }
    }

    #[test]
    fn parses_yaml_config() {
        let raw = r#"
model: anthropic/claude-3-5-haiku
system_prompt: You are terse.
store_system: true
concurrency: 8
reasoning_effort: high
provider:
  order: [anthropic, bedrock]
  allow_fallbacks: false
pricing:
  prompt: 0.0000008
  completion: 0.000004
  request: 0
"#;
        let config = FileConfig::parse(Path::new("run.yaml"), raw).unwrap();
        assert_eq!(config.model.as_deref(), Some("anthropic/claude-3-5-haiku"));
        assert_eq!(config.concurrency, Some(8));
        assert_eq!(config.reasoning_effort, Some(ReasoningEffort::High));
        let provider = config.provider.unwrap();
        assert_eq!(
            provider.order,
            Some(vec!["anthropic".to_string(), "bedrock".to_string()])
        );
        assert_eq!(provider.allow_fallbacks, Some(false));
        assert!(config.pricing.unwrap().resolve().fully_known);
    }

    #[test]
    fn parses_json_config_and_rejects_unknown_keys() {
        let config =
            FileConfig::parse(Path::new("run.json"), r#"{"model":"m","store_system":true}"#)
                .unwrap();
        assert_eq!(config.store_system, Some(true));

        let err = FileConfig::parse(Path::new("run.json"), r#"{"modle":"m"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Json { .. }));
    }

    #[test]
    fn cli_overrides_win_over_file() {
        let file = FileConfig {
            concurrency: Some(2),
            system_prompt: Some("file".into()),
            provider: Some(ProviderPreferences {
                order: Some(vec!["a".into()]),
                sort: Some("price".into()),
                ..Default::default()
            }),
            ..minimal()
        };
        let cli = FileConfig {
            concurrency: Some(16),
            provider: Some(ProviderPreferences {
                allow_fallbacks: Some(false),
                ..Default::default()
            }),
            ..Default::default()
        };

        let merged = file.merge(cli);
        assert_eq!(merged.concurrency, Some(16));
        assert_eq!(merged.system_prompt.as_deref(), Some("file"));
        let provider = merged.provider.unwrap();
        assert_eq!(provider.order, Some(vec!["a".to_string()]));
        assert_eq!(provider.allow_fallbacks, Some(false));
        assert_eq!(provider.sort.as_deref(), Some("price"));
    }

    #[test]
    fn resolve_applies_defaults() {
        let run = RunConfig::resolve(minimal()).unwrap();
        assert_eq!(run.concurrency.get(), DEFAULT_CONCURRENCY);
        assert!(!run.generation.store_system);
        assert!(run.generation.system_prompt.is_none());
        assert!(run.pricing.is_none());
    }

    #[test]
    fn resolve_rejects_missing_and_invalid_values() {
        let err = RunConfig::resolve(FileConfig {
            model: None,
            ..minimal()
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::Missing("model")));

        let err = RunConfig::resolve(FileConfig {
            concurrency: Some(0),
            ..minimal()
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue("concurrency", _)));

        let err = RunConfig::resolve(FileConfig {
            pricing: Some(PricingOverride {
                prompt: Some(-1.0),
                ..Default::default()
            }),
            ..minimal()
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue("pricing", _)));
    }
}
