// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The request-scoped persona and its enum domains.
//!
//! Model output is loose about casing and spelling ("mid range", "LUXURY",
//! "relaxed"), so every enum here parses leniently through
//! [`BudgetTier::normalize`] and friends, and [`Persona::from_value`] is the
//! single place a JSON object becomes a typed persona.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::WaypointError;

/// Vibe used whenever inference cannot produce one.
pub const NEUTRAL_VIBE: &str = "General Voyager";

/// Confidence attached to the neutral persona.
pub const NEUTRAL_CONFIDENCE: f32 = 0.1;

/// Signal count at which the blend factor reaches zero.
pub const FULL_SIGNAL_COUNT: usize = 10;

fn squash(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Spending level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BudgetTier {
    Economy,
    #[serde(rename = "Mid-range")]
    MidRange,
    Luxury,
}

impl BudgetTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            BudgetTier::Economy => "Economy",
            BudgetTier::MidRange => "Mid-range",
            BudgetTier::Luxury => "Luxury",
        }
    }

    /// Lenient parse of model output.
    pub fn normalize(raw: &str) -> Option<Self> {
        match squash(raw).as_str() {
            "economy" | "budget" | "low" | "cheap" | "backpacker" => Some(BudgetTier::Economy),
            "midrange" | "mid" | "moderate" | "medium" | "standard" => Some(BudgetTier::MidRange),
            "luxury" | "high" | "premium" | "upscale" => Some(BudgetTier::Luxury),
            _ => None,
        }
    }
}

/// Travel pace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Pace {
    Slow,
    Balanced,
    Fast,
}

impl Pace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pace::Slow => "Slow",
            Pace::Balanced => "Balanced",
            Pace::Fast => "Fast",
        }
    }

    /// Lenient parse of model output.
    pub fn normalize(raw: &str) -> Option<Self> {
        match squash(raw).as_str() {
            "slow" | "relaxed" | "leisurely" => Some(Pace::Slow),
            "balanced" | "moderate" | "medium" => Some(Pace::Balanced),
            "fast" | "active" | "packed" | "intense" => Some(Pace::Fast),
            _ => None,
        }
    }
}

/// Preferred crowd level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SocialDensity {
    Low,
    Medium,
    High,
}

impl SocialDensity {
    pub fn as_str(&self) -> &'static str {
        match self {
            SocialDensity::Low => "Low",
            SocialDensity::Medium => "Medium",
            SocialDensity::High => "High",
        }
    }

    /// Lenient parse of model output.
    pub fn normalize(raw: &str) -> Option<Self> {
        match squash(raw).as_str() {
            "low" | "quiet" | "secluded" | "remote" => Some(SocialDensity::Low),
            "medium" | "moderate" | "mid" | "balanced" => Some(SocialDensity::Medium),
            "high" | "busy" | "crowded" | "lively" => Some(SocialDensity::High),
            _ => None,
        }
    }
}

macro_rules! display_as_str {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        })*
    };
}

display_as_str!(BudgetTier, Pace, SocialDensity);

/// Whether the request had any prior signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestMode {
    ColdStart,
    WarmStart,
}

impl RequestMode {
    pub fn from_signal_count(count: usize) -> Self {
        if count == 0 {
            RequestMode::ColdStart
        } else {
            RequestMode::WarmStart
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestMode::ColdStart => "COLD_START",
            RequestMode::WarmStart => "WARM_START",
        }
    }
}

impl fmt::Display for RequestMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Query-vs-signal weighting: 1.0 is purely query driven, 0.0 purely signal driven.
pub fn blend_factor(signal_count: usize) -> f32 {
    (1.0 - signal_count as f32 / FULL_SIGNAL_COUNT as f32).clamp(0.0, 1.0)
}

/// Inferred travel preferences for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    pub vibe: String,
    pub budget_tier: BudgetTier,
    pub pace: Pace,
    pub social_density: SocialDensity,
    pub intent: String,
    pub confidence: f32,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl Persona {
    /// The fallback persona used when inference fails.
    pub fn neutral() -> Self {
        Self {
            vibe: NEUTRAL_VIBE.into(),
            budget_tier: BudgetTier::MidRange,
            pace: Pace::Balanced,
            social_density: SocialDensity::Medium,
            intent: "No reliable signal; using a neutral traveller profile.".into(),
            confidence: NEUTRAL_CONFIDENCE,
            keywords: Vec::new(),
        }
    }

    /// Build a persona from an untyped JSON object.
    ///
    /// `vibe` and the three enum fields are required; `confidence` defaults to
    /// 0.5 and is clamped into `[0, 1]`; `keywords` may be an array or a
    /// comma-separated string.
    pub fn from_value(value: &Value) -> Result<Self, WaypointError> {
        let obj = value
            .as_object()
            .ok_or_else(|| WaypointError::parse("persona is not a JSON object"))?;

        let text = |keys: &[&str]| -> Option<String> {
            keys.iter()
                .filter_map(|k| obj.get(*k))
                .filter_map(Value::as_str)
                .map(str::trim)
                .find(|s| !s.is_empty())
                .map(str::to_string)
        };

        let vibe = text(&["vibe", "lifestyle_vibe", "lifestyleVibe"])
            .ok_or_else(|| WaypointError::parse("persona has no vibe"))?;

        let budget_raw = text(&["budget_tier", "budget", "budgetTier"])
            .ok_or_else(|| WaypointError::parse("persona has no budget tier"))?;
        let budget_tier = BudgetTier::normalize(&budget_raw)
            .ok_or_else(|| WaypointError::parse(format!("unknown budget tier '{budget_raw}'")))?;

        let pace_raw =
            text(&["pace"]).ok_or_else(|| WaypointError::parse("persona has no pace"))?;
        let pace = Pace::normalize(&pace_raw)
            .ok_or_else(|| WaypointError::parse(format!("unknown pace '{pace_raw}'")))?;

        let density_raw = text(&["social_density", "density", "socialDensity"])
            .ok_or_else(|| WaypointError::parse("persona has no social density"))?;
        let social_density = SocialDensity::normalize(&density_raw).ok_or_else(|| {
            WaypointError::parse(format!("unknown social density '{density_raw}'"))
        })?;

        let intent = text(&["intent", "intent_explanation", "explanation", "reasoning"])
            .unwrap_or_default();

        let confidence = match obj.get("confidence") {
            None | Some(Value::Null) => 0.5,
            Some(v) => clamp_unit(
                v.as_f64()
                    .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
                    .ok_or_else(|| WaypointError::parse("persona confidence is not a number"))?
                    as f32,
            ),
        };

        let keywords = match obj.get("keywords") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            Some(Value::String(s)) => s
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        };

        Ok(Self {
            vibe,
            budget_tier,
            pace,
            social_density,
            intent,
            confidence,
            keywords,
        })
    }

    /// Constraint tags rendered in a stable order: budget, pace, density.
    pub fn constraints(&self) -> Vec<String> {
        vec![
            format!("budget:{}", self.budget_tier),
            format!("pace:{}", self.pace),
            format!("density:{}", self.social_density),
        ]
    }

    pub fn is_neutral(&self) -> bool {
        self.vibe == NEUTRAL_VIBE && self.confidence <= NEUTRAL_CONFIDENCE
    }
}

/// Clamp into `[0, 1]`, mapping NaN to 0.
pub fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::json;

    use super::*;

    #[test]
    fn blend_factor_boundaries() {
        assert_eq!(blend_factor(0), 1.0);
        assert!((blend_factor(5) - 0.5).abs() < 1e-6);
        assert_eq!(blend_factor(10), 0.0);
        assert_eq!(blend_factor(12), 0.0);
    }

    #[test]
    fn mode_follows_signal_count() {
        assert_eq!(RequestMode::from_signal_count(0), RequestMode::ColdStart);
        assert_eq!(RequestMode::from_signal_count(1), RequestMode::WarmStart);
        assert_eq!(RequestMode::WarmStart.to_string(), "WARM_START");
    }

    #[test]
    fn neutral_persona_matches_fallback_shape() {
        let p = Persona::neutral();
        assert_eq!(p.vibe, "General Voyager");
        assert_eq!(p.budget_tier, BudgetTier::MidRange);
        assert_eq!(p.pace, Pace::Balanced);
        assert_eq!(p.social_density, SocialDensity::Medium);
        assert!((p.confidence - 0.1).abs() < 1e-6);
        assert!(p.is_neutral());
    }

    #[test]
    fn from_value_normalizes_loose_output() {
        let value = json!({
            "vibe": "  Alpine Slow Living ",
            "budget_tier": "mid range",
            "pace": "RELAXED",
            "social_density": "quiet",
            "intent": "wants calm",
            "confidence": 1.7,
            "keywords": "mountains, village , "
        });
        let p = Persona::from_value(&value).unwrap();
        assert_eq!(p.vibe, "Alpine Slow Living");
        assert_eq!(p.budget_tier, BudgetTier::MidRange);
        assert_eq!(p.pace, Pace::Slow);
        assert_eq!(p.social_density, SocialDensity::Low);
        assert_eq!(p.confidence, 1.0);
        assert_eq!(p.keywords, vec!["mountains", "village"]);
    }

    #[test]
    fn from_value_rejects_unknown_enum() {
        let value = json!({
            "vibe": "x", "budget_tier": "galactic", "pace": "slow", "social_density": "low"
        });
        let err = Persona::from_value(&value).unwrap_err();
        assert!(err.to_string().contains("galactic"));
    }

    #[test]
    fn from_value_rejects_empty_vibe_and_non_objects() {
        let value = json!({
            "vibe": "  ", "budget_tier": "Luxury", "pace": "Fast", "social_density": "High"
        });
        assert!(Persona::from_value(&value).is_err());
        assert!(Persona::from_value(&json!(["Luxury"])).is_err());
    }

    #[test]
    fn constraints_are_ordered() {
        let mut p = Persona::neutral();
        p.budget_tier = BudgetTier::Luxury;
        p.pace = Pace::Slow;
        p.social_density = SocialDensity::Low;
        assert_eq!(
            p.constraints(),
            vec!["budget:Luxury", "pace:Slow", "density:Low"]
        );
    }

    #[test]
    fn budget_tier_serializes_with_hyphen() {
        let json = serde_json::to_string(&BudgetTier::MidRange).unwrap();
        assert_eq!(json, "\"Mid-range\"");
    }

    proptest! {
        #[test]
        fn blend_factor_stays_in_unit_interval(n in 0usize..10_000) {
            let alpha = blend_factor(n);
            prop_assert!((0.0..=1.0).contains(&alpha));
            if n >= FULL_SIGNAL_COUNT {
                prop_assert_eq!(alpha, 0.0);
            }
        }

        #[test]
        fn parsed_confidence_is_clamped(c in -100.0f64..100.0) {
            let value = json!({
                "vibe": "v", "budget_tier": "Economy", "pace": "Fast",
                "social_density": "High", "confidence": c
            });
            let p = Persona::from_value(&value).unwrap();
            prop_assert!((0.0..=1.0).contains(&p.confidence));
        }

        #[test]
        fn normalize_never_panics(s in "\\PC*") {
            let _ = BudgetTier::normalize(&s);
            let _ = Pace::normalize(&s);
            let _ = SocialDensity::normalize(&s);
        }
    }
}
