//! Model pricing resolution.
//!
//! Pricing is resolved once per run, either from explicit rates in the config
//! file or from the OpenRouter model catalog. Costs are in USD per token.

use async_trait::async_trait;
use serde::Deserialize;

use super::types::TokenUsage;

/// Pricing information for a model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricingInfo {
    pub prompt_per_token_usd: f64,
    pub completion_per_token_usd: f64,
    pub per_request_usd: f64,
    /// True only when all three rates were explicitly resolved. Cost is
    /// tracked for a run only when this is set.
    pub fully_known: bool,
}

impl PricingInfo {
    /// Pricing where every rate was resolved from a real source.
    pub fn known(prompt: f64, completion: f64, per_request: f64) -> Self {
        Self {
            prompt_per_token_usd: prompt,
            completion_per_token_usd: completion,
            per_request_usd: per_request,
            fully_known: true,
        }
    }

    /// Build from optional rates; missing rates default to zero and clear
    /// `fully_known`.
    pub fn from_parts(prompt: Option<f64>, completion: Option<f64>, per_request: Option<f64>) -> Self {
        Self {
            prompt_per_token_usd: prompt.unwrap_or(0.0),
            completion_per_token_usd: completion.unwrap_or(0.0),
            per_request_usd: per_request.unwrap_or(0.0),
            fully_known: prompt.is_some() && completion.is_some() && per_request.is_some(),
        }
    }

    /// Calculate the cost of one request.
    pub fn estimate(&self, usage: TokenUsage) -> f64 {
        self.per_request_usd
            + f64::from(usage.prompt_tokens) * self.prompt_per_token_usd
            + f64::from(usage.completion_tokens) * self.completion_per_token_usd
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PricingError {
    #[error("pricing request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("pricing request returned HTTP {0}")]
    Status(u16),
    #[error("invalid model catalog: {0}")]
    Parse(String),
}

/// Resolve pricing for a model id. `Ok(None)` means the model is unknown to
/// the catalog and cost tracking should be disabled.
#[async_trait]
pub trait PricingLookup: Send + Sync {
    async fn lookup(&self, model: &str) -> Result<Option<PricingInfo>, PricingError>;
}

// =============================================================================
// OPENROUTER MODEL CATALOG
// =============================================================================

#[derive(Deserialize)]
struct ModelsResponse {
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
    #[serde(default)]
    pricing: Option<ModelPricing>,
}

/// OpenRouter reports rates as decimal strings, e.g. `"0.0000008"`.
#[derive(Deserialize)]
struct ModelPricing {
    prompt: Option<String>,
    completion: Option<String>,
    request: Option<String>,
}

fn parse_rate(raw: Option<&str>) -> Option<f64> {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v >= 0.0)
}

/// Find `model` in a `GET /models` response body.
pub fn pricing_from_catalog(body: &str, model: &str) -> Result<Option<PricingInfo>, PricingError> {
    let catalog: ModelsResponse =
        serde_json::from_str(body).map_err(|e| PricingError::Parse(e.to_string()))?;

    let Some(entry) = catalog.data.into_iter().find(|m| m.id == model) else {
        return Ok(None);
    };
    let Some(pricing) = entry.pricing else {
        return Ok(None);
    };

    Ok(Some(PricingInfo::from_parts(
        parse_rate(pricing.prompt.as_deref()),
        parse_rate(pricing.completion.as_deref()),
        parse_rate(pricing.request.as_deref()),
    )))
}

/// Outcome of resolving pricing for a run.
#[derive(Debug, Clone, PartialEq)]
pub enum PricingResolution {
    Tracked(PricingInfo),
    /// Cost tracking is off; `reason` is worth one warning line.
    Disabled { reason: String },
}

impl PricingResolution {
    pub fn pricing(&self) -> Option<PricingInfo> {
        match self {
            PricingResolution::Tracked(p) => Some(*p),
            PricingResolution::Disabled { .. } => None,
        }
    }
}

/// Explicit pricing wins; otherwise ask `lookup`. Never fails: lookup errors
/// and incomplete rates disable cost tracking instead.
pub async fn resolve_pricing<L: PricingLookup + ?Sized>(
    lookup: &L,
    model: &str,
    explicit: Option<PricingInfo>,
) -> PricingResolution {
    if let Some(pricing) = explicit {
        return if pricing.fully_known {
            PricingResolution::Tracked(pricing)
        } else {
            PricingResolution::Disabled {
                reason: "configured pricing is missing a rate; cost tracking disabled".into(),
            }
        };
    }

    let reason = match lookup.lookup(model).await {
        Ok(Some(pricing)) if pricing.fully_known => return PricingResolution::Tracked(pricing),
        Ok(Some(_)) => format!("pricing for {model} is incomplete; cost tracking disabled"),
        Ok(None) => format!("no pricing found for {model}; cost tracking disabled"),
        Err(e) => format!("pricing lookup for {model} failed ({e}); cost tracking disabled"),
    };
    PricingResolution::Disabled { reason }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate() {
        // 1K input + 1K output at $0.80/1M and $4.00/1M, plus $0.001 per request
        let pricing = PricingInfo::known(0.000_000_8, 0.000_004, 0.001);
        let cost = pricing.estimate(TokenUsage::new(1_000, 1_000));
        assert!((cost - 0.0058).abs() < 1e-12, "got {cost}");
    }

    #[test]
    fn missing_rate_is_not_fully_known() {
        let pricing = PricingInfo::from_parts(Some(1e-6), Some(2e-6), None);
        assert!(!pricing.fully_known);
        assert_eq!(pricing.per_request_usd, 0.0);
    }

    #[test]
    fn catalog_lookup_parses_string_rates() {
        let body = r#"{"data":[
            {"id":"other/model","pricing":{"prompt":"1","completion":"1","request":"1"}},
            {"id":"openai/gpt-5-mini","pricing":{"prompt":"0.00000025","completion":"0.000002","request":"0","image":"0"}}
        ]}"#;
        let pricing = pricing_from_catalog(body, "openai/gpt-5-mini")
            .unwrap()
            .unwrap();
        assert!(pricing.fully_known);
        assert_eq!(pricing.prompt_per_token_usd, 0.000_000_25);
        assert_eq!(pricing.completion_per_token_usd, 0.000_002);
        assert_eq!(pricing.per_request_usd, 0.0);
    }

    #[test]
    fn catalog_lookup_without_request_rate_is_partial() {
        let body = r#"{"data":[{"id":"m","pricing":{"prompt":"0.1","completion":"0.2"}}]}"#;
        let pricing = pricing_from_catalog(body, "m").unwrap().unwrap();
        assert!(!pricing.fully_known);
    }

    #[test]
    fn catalog_lookup_unknown_model() {
        let body = r#"{"data":[]}"#;
        assert!(pricing_from_catalog(body, "m").unwrap().is_none());
        assert!(matches!(
            pricing_from_catalog("not json", "m"),
            Err(PricingError::Parse(_))
        ));
    }

    struct FixedLookup(Result<Option<PricingInfo>, u16>);

    #[async_trait]
    impl PricingLookup for FixedLookup {
        async fn lookup(&self, _model: &str) -> Result<Option<PricingInfo>, PricingError> {
            self.0.map_err(PricingError::Status)
        }
    }

    #[tokio::test]
    async fn explicit_pricing_skips_lookup() {
        let lookup = FixedLookup(Err(500));
        let explicit = PricingInfo::known(1e-6, 2e-6, 0.0);
        let resolved = resolve_pricing(&lookup, "m", Some(explicit)).await;
        assert_eq!(resolved, PricingResolution::Tracked(explicit));

        let partial = PricingInfo::from_parts(Some(1e-6), None, None);
        let resolved = resolve_pricing(&lookup, "m", Some(partial)).await;
        assert!(resolved.pricing().is_none());
    }

    #[tokio::test]
    async fn lookup_problems_disable_tracking() {
        let failing = resolve_pricing(&FixedLookup(Err(503)), "m", None).await;
        match failing {
            PricingResolution::Disabled { reason } => assert!(reason.contains("HTTP 503")),
            other => panic!("expected disabled, got {other:?}"),
        }

        let unknown = resolve_pricing(&FixedLookup(Ok(None)), "m", None).await;
        assert!(unknown.pricing().is_none());

        let partial = PricingInfo::from_parts(Some(1e-6), Some(1e-6), None);
        let incomplete = resolve_pricing(&FixedLookup(Ok(Some(partial))), "m", None).await;
        assert!(incomplete.pricing().is_none());

        let full = PricingInfo::known(1e-6, 1e-6, 0.0);
        let tracked = resolve_pricing(&FixedLookup(Ok(Some(full))), "m", None).await;
        assert_eq!(tracked.pricing(), Some(full));
    }
}
