//! Centralized pricing configuration for ASR providers.
//!
//! This module provides a single source of truth for model pricing across all
//! providers. Pricing can be updated without modifying provider-specific code.
//!
//! Cost estimation is deterministic and offline: duration is rounded up to
//! the provider's billing increment, converted to minutes, and multiplied by
//! the per-minute rate. No network calls, no randomness; re-running a
//! pipeline over the same audio always reports the same spend.
//!
//! # Pricing Sources
//!
//! Prices are based on official provider pricing pages as of the last update.
//! All prices are in USD per minute of audio processed.
//!
//! # Updates
//!
//! When provider pricing changes, update the constants in this file.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

// =============================================================================
// Pricing Types
// =============================================================================

/// Billing plan applied when rounding audio duration for cost estimation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingPlan {
    /// Duration rounded up to the provider's increment, billed per minute.
    #[default]
    PerMinute,
}

impl BillingPlan {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingPlan::PerMinute => "per_minute",
        }
    }

    /// Parse from a string, falling back to the default plan.
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "per_minute" => BillingPlan::PerMinute,
            _ => BillingPlan::PerMinute,
        }
    }
}

impl fmt::Display for BillingPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Pricing information for a provider model.
#[derive(Debug, Clone)]
pub struct ModelPricing {
    /// Price in USD per minute of audio.
    pub rate_per_minute: f64,
    /// Billing increment in seconds; duration is rounded up to a multiple.
    pub increment_seconds: f64,
    /// Optional notes about pricing (e.g., "rounded to the nearest second").
    pub notes: Option<&'static str>,
}

impl ModelPricing {
    /// Create a new pricing entry.
    pub const fn new(rate_per_minute: f64, increment_seconds: f64) -> Self {
        Self {
            rate_per_minute,
            increment_seconds,
            notes: None,
        }
    }

    /// Create a pricing entry with notes.
    pub const fn with_notes(
        rate_per_minute: f64,
        increment_seconds: f64,
        notes: &'static str,
    ) -> Self {
        Self {
            rate_per_minute,
            increment_seconds,
            notes: Some(notes),
        }
    }
}

/// Fallback applied when a provider:model pair has no table entry.
pub const DEFAULT_PRICING: ModelPricing = ModelPricing::new(0.006, 60.0);

// =============================================================================
// ASR Provider Pricing
// =============================================================================

/// ASR pricing database.
/// Key format: "provider:model" (lowercase)
static ASR_PRICING: LazyLock<HashMap<&'static str, ModelPricing>> = LazyLock::new(|| {
    let mut m = HashMap::new();

    // -------------------------------------------------------------------------
    // OpenAI Whisper
    // https://openai.com/api/pricing/
    // -------------------------------------------------------------------------
    m.insert(
        "whisper_openai:whisper-1",
        ModelPricing::with_notes(0.006, 60.0, "Rounded to the nearest minute"),
    );
    m.insert(
        "whisper_openai:whisper-large-v3",
        ModelPricing::new(0.006, 60.0),
    );

    // -------------------------------------------------------------------------
    // Local Whisper (rate parity with the hosted default for comparison)
    // -------------------------------------------------------------------------
    m.insert("whisper:default", ModelPricing::new(0.006, 60.0));
    m.insert("whisper:large-v2", ModelPricing::new(0.012, 60.0));

    // -------------------------------------------------------------------------
    // Google Cloud Speech-to-Text
    // https://cloud.google.com/speech-to-text/pricing
    // -------------------------------------------------------------------------
    m.insert(
        "google_stt:chirp-3",
        ModelPricing::with_notes(0.016, 60.0, "Standard recognition, no data logging"),
    );
    m.insert("google_stt:chirp-2", ModelPricing::new(0.016, 60.0));
    m.insert("google_stt:google-default", ModelPricing::new(0.016, 60.0));

    m
});

/// Look up pricing for a provider/model pair.
///
/// Falls back to the provider's `default` entry, then to [`DEFAULT_PRICING`],
/// so estimation never fails for an unknown model.
pub fn lookup_pricing(provider: &str, model: Option<&str>) -> ModelPricing {
    let provider = if provider.is_empty() { "whisper" } else { provider };
    let model = model.filter(|m| !m.is_empty()).unwrap_or("default");
    let key = format!("{}:{}", provider.to_lowercase(), model.to_lowercase());
    if let Some(pricing) = ASR_PRICING.get(key.as_str()) {
        return pricing.clone();
    }
    let fallback = format!("{}:default", provider.to_lowercase());
    ASR_PRICING
        .get(fallback.as_str())
        .cloned()
        .unwrap_or(DEFAULT_PRICING)
}

/// Estimate the cost in USD of transcribing `seconds` of audio.
///
/// Duration is clamped to non-negative, rounded up to the billing increment,
/// converted to minutes, and priced at the table rate. The result is rounded
/// to 4 decimal places for stable persistence.
pub fn estimate_asr_cost(
    seconds: f64,
    provider: &str,
    model: Option<&str>,
    _plan: BillingPlan,
) -> f64 {
    let duration = seconds.max(0.0);
    let pricing = lookup_pricing(provider, model);
    let billed = if pricing.increment_seconds <= 0.0 {
        duration
    } else {
        (duration / pricing.increment_seconds).ceil() * pricing.increment_seconds
    };
    let minutes = billed / 60.0;
    round4(pricing.rate_per_minute * minutes)
}

/// Per-provider cost totals plus a grand total, each rounded to 4 decimals.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CostBreakdown {
    pub total: f64,
    pub providers: BTreeMap<String, f64>,
}

/// Aggregate per-message (provider, cost) pairs into a [`CostBreakdown`].
pub fn accumulate_costs<I>(items: I) -> CostBreakdown
where
    I: IntoIterator<Item = (String, f64)>,
{
    let mut breakdown = CostBreakdown::default();
    for (provider, cost) in items {
        breakdown.total += cost;
        *breakdown.providers.entry(provider).or_insert(0.0) += cost;
    }
    breakdown.total = round4(breakdown.total);
    for value in breakdown.providers.values_mut() {
        *value = round4(*value);
    }
    breakdown
}

/// List all provider:model keys with a pricing entry, sorted.
pub fn list_priced_models() -> Vec<&'static str> {
    let mut keys: Vec<&'static str> = ASR_PRICING.keys().copied().collect();
    keys.sort_unstable();
    keys
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

// =============================================================================
// Tests
// =============================================================================
