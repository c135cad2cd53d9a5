//! Running spend estimate.

use crate::gateway::{PricingInfo, TokenUsage};

/// Tracks spend for a run. Cost is either tracked for every successful
/// request or not at all; partially known pricing disables tracking.
#[derive(Debug, Clone, Default)]
pub struct CostAccumulator {
    pricing: Option<PricingInfo>,
    total_usd: f64,
}

impl CostAccumulator {
    pub fn new(pricing: Option<PricingInfo>) -> Self {
        Self {
            pricing: pricing.filter(|p| p.fully_known),
            total_usd: 0.0,
        }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_tracking(&self) -> bool {
        self.pricing.is_some()
    }

    /// Add the cost of one successful request and return the increment.
    /// Missing usage still pays the per-request fee.
    pub fn charge(&mut self, usage: Option<TokenUsage>) -> Option<f64> {
        let pricing = self.pricing.as_ref()?;
        let delta = pricing.estimate(usage.unwrap_or_default());
        self.total_usd += delta;
        Some(delta)
    }

    pub fn total_usd(&self) -> f64 {
        self.total_usd
    }
}
