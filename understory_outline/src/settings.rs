// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! User-facing settings and the render limits derived from them.

use core::ops::RangeInclusive;

/// Depth past which content is always truncated, whatever the settings say.
pub const HARD_DEPTH_CEILING: u32 = 256;

/// Node cap used when the user forces a full render.
pub const FORCED_NODE_CAP: usize = 100_000;

/// Extra nodes a single placeholder resolution may register.
pub const RESOLVE_BUDGET: usize = 500;

const LAZY_DEPTH_RANGE: RangeInclusive<u64> = 1..=20;
const LAZY_THRESHOLD_RANGE: RangeInclusive<u64> = 10..=1_000_000;
const MAX_NODES_RANGE: RangeInclusive<u64> = 10..=200_000;
const MAX_DEPTH_RANGE: RangeInclusive<u64> = 2..=256;

/// Limits the render planner works within.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RenderLimits {
    /// Registered nodes per full render before truncating.
    pub max_nodes: usize,
    /// Fixed depth ceiling; see [`HARD_DEPTH_CEILING`].
    pub max_hard_depth: u32,
    /// User-configured depth limit.
    pub max_depth: u32,
    /// Whether large trees render with lazy boundaries.
    pub lazy_enabled: bool,
    /// Node count above which lazy boundaries are used.
    pub lazy_threshold_nodes: usize,
    /// Depth at which lazy boundaries start.
    pub lazy_pre_render_depth: u32,
    /// Extra node budget granted to each resolution.
    pub resolve_budget: usize,
}

impl Default for RenderLimits {
    fn default() -> Self {
        OutlineSettings::default().limits()
    }
}

impl RenderLimits {
    /// The depth limit actually enforced.
    pub fn depth_limit(&self) -> u32 {
        self.max_depth.min(self.max_hard_depth)
    }

    /// Limits for a forced full render: no laziness, the forced node cap and
    /// the hard ceiling as the only depth bound.
    pub fn forced(&self) -> Self {
        Self {
            max_nodes: FORCED_NODE_CAP,
            max_depth: self.max_hard_depth,
            lazy_enabled: false,
            ..self.clone()
        }
    }
}

/// Persisted outline settings.
///
/// Every field is validated on its own: a missing, mistyped or unparsable value
/// falls back to its default and numbers are clamped to a safe range.
///
/// ```
/// use understory_outline::OutlineSettings;
///
/// let s = OutlineSettings::from_pairs([
///     ("maxRenderNodes", "3"),
///     ("lazyLoadEnabled", "false"),
///     ("maxRenderDepth", "deep"),
/// ]);
/// assert_eq!(s.max_render_nodes, 10);
/// assert!(!s.lazy_load_enabled);
/// assert_eq!(s.max_render_depth, 50);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OutlineSettings {
    /// Render large trees with lazy boundaries.
    pub lazy_load_enabled: bool,
    /// Depth at which lazy boundaries start.
    pub lazy_load_depth: u32,
    /// Node count above which lazy loading kicks in.
    pub lazy_load_threshold: usize,
    /// Nodes rendered before truncating.
    pub max_render_nodes: usize,
    /// Depth rendered before truncating.
    pub max_render_depth: u32,
}

impl Default for OutlineSettings {
    fn default() -> Self {
        Self {
            lazy_load_enabled: true,
            lazy_load_depth: 3,
            lazy_load_threshold: 1000,
            max_render_nodes: 5000,
            max_render_depth: 50,
        }
    }
}

impl OutlineSettings {
    /// Read settings from persisted string pairs. Unknown keys are ignored.
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut s = Self::default();
        for (key, raw) in pairs {
            let raw = raw.trim();
            match key {
                "lazyLoadEnabled" => match parse_bool(raw) {
                    Some(b) => s.lazy_load_enabled = b,
                    None => log::warn!("ignoring {key}={raw:?}: expected a boolean"),
                },
                "lazyLoadDepth" | "lazyLoadThreshold" | "maxRenderNodes" | "maxRenderDepth" => {
                    match parse_number(raw) {
                        Some(n) => s.set_number(key, n),
                        None => log::warn!("ignoring {key}={raw:?}: expected a number"),
                    }
                }
                _ => {}
            }
        }
        s.clamped()
    }

    /// Read settings from a JSON object. Anything else yields the defaults.
    #[cfg(feature = "json")]
    pub fn from_json_value(value: &serde_json::Value) -> Self {
        use serde_json::Value;

        let mut s = Self::default();
        let Some(map) = value.as_object() else {
            log::warn!("outline settings are not a JSON object; using defaults");
            return s;
        };
        for (key, v) in map {
            match (key.as_str(), v) {
                ("lazyLoadEnabled", Value::Bool(b)) => s.lazy_load_enabled = *b,
                ("lazyLoadEnabled", Value::String(raw)) => match parse_bool(raw.trim()) {
                    Some(b) => s.lazy_load_enabled = b,
                    None => log::warn!("ignoring lazyLoadEnabled={raw:?}: expected a boolean"),
                },
                (
                    k @ ("lazyLoadDepth" | "lazyLoadThreshold" | "maxRenderNodes" | "maxRenderDepth"),
                    v,
                ) => {
                    let n = match v {
                        Value::Number(n) => n.as_f64().and_then(float_to_u64),
                        Value::String(raw) => parse_number(raw.trim()),
                        _ => None,
                    };
                    match n {
                        Some(n) => s.set_number(k, n),
                        None => log::warn!("ignoring {k}={v}: expected a number"),
                    }
                }
                ("lazyLoadEnabled", other) => {
                    log::warn!("ignoring lazyLoadEnabled={other}: expected a boolean");
                }
                _ => {}
            }
        }
        s.clamped()
    }

    /// Read settings from JSON text. Invalid JSON yields the defaults.
    #[cfg(feature = "json")]
    pub fn from_json_str(text: &str) -> Self {
        match serde_json::from_str::<serde_json::Value>(text) {
            Ok(v) => Self::from_json_value(&v),
            Err(e) => {
                log::warn!("outline settings are not valid JSON ({e}); using defaults");
                Self::default()
            }
        }
    }

    /// Clamp every numeric field into its safe range.
    #[must_use]
    pub fn clamped(self) -> Self {
        Self {
            lazy_load_depth: clamp_u32(self.lazy_load_depth.into(), LAZY_DEPTH_RANGE),
            lazy_load_threshold: clamp_usize(self.lazy_load_threshold, LAZY_THRESHOLD_RANGE),
            max_render_nodes: clamp_usize(self.max_render_nodes, MAX_NODES_RANGE),
            max_render_depth: clamp_u32(self.max_render_depth.into(), MAX_DEPTH_RANGE),
            ..self
        }
    }

    /// Planner limits for these settings.
    pub fn limits(&self) -> RenderLimits {
        let s = self.clone().clamped();
        RenderLimits {
            max_nodes: s.max_render_nodes,
            max_hard_depth: HARD_DEPTH_CEILING,
            max_depth: s.max_render_depth,
            lazy_enabled: s.lazy_load_enabled,
            lazy_threshold_nodes: s.lazy_load_threshold,
            lazy_pre_render_depth: s.lazy_load_depth,
            resolve_budget: RESOLVE_BUDGET,
        }
    }

    // Values are clamped afterwards, so saturating here is enough.
    fn set_number(&mut self, key: &str, n: u64) {
        match key {
            "lazyLoadDepth" => self.lazy_load_depth = clamp_u32(n, LAZY_DEPTH_RANGE),
            "lazyLoadThreshold" => {
                self.lazy_load_threshold = clamp_usize_u64(n, LAZY_THRESHOLD_RANGE);
            }
            "maxRenderNodes" => self.max_render_nodes = clamp_usize_u64(n, MAX_NODES_RANGE),
            "maxRenderDepth" => self.max_render_depth = clamp_u32(n, MAX_DEPTH_RANGE),
            _ => {}
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

// Negative and fractional input is accepted and saturates at zero.
fn parse_number(raw: &str) -> Option<u64> {
    raw.parse::<u64>()
        .ok()
        .or_else(|| raw.parse::<f64>().ok().and_then(float_to_u64))
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "the value is finite and clamped to zero before the cast saturates it"
)]
fn float_to_u64(f: f64) -> Option<u64> {
    f.is_finite().then(|| f.max(0.0) as u64)
}

#[allow(clippy::cast_possible_truncation, reason = "clamped into a u32 range first")]
fn clamp_u32(n: u64, range: RangeInclusive<u64>) -> u32 {
    n.clamp(*range.start(), *range.end()) as u32
}

fn clamp_usize_u64(n: u64, range: RangeInclusive<u64>) -> usize {
    usize::try_from(n.clamp(*range.start(), *range.end())).unwrap_or(usize::MAX)
}

fn clamp_usize(n: usize, range: RangeInclusive<u64>) -> usize {
    clamp_usize_u64(u64::try_from(n).unwrap_or(u64::MAX), range)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documentation() {
        let l = RenderLimits::default();
        assert_eq!(l.max_nodes, 5000);
        assert_eq!(l.max_depth, 50);
        assert_eq!(l.lazy_threshold_nodes, 1000);
        assert_eq!(l.lazy_pre_render_depth, 3);
        assert!(l.lazy_enabled);
        assert_eq!(l.max_hard_depth, HARD_DEPTH_CEILING);
    }

    #[test]
    fn pairs_clamp_and_fall_back() {
        let s = OutlineSettings::from_pairs([
            ("lazyLoadDepth", "0"),
            ("lazyLoadThreshold", "-5"),
            ("maxRenderNodes", "9999999"),
            ("maxRenderDepth", "12.7"),
            ("lazyLoadEnabled", "maybe"),
            ("unrelated", "x"),
        ]);
        assert_eq!(s.lazy_load_depth, 1);
        assert_eq!(s.lazy_load_threshold, 10);
        assert_eq!(s.max_render_nodes, 200_000);
        assert_eq!(s.max_render_depth, 12);
        assert!(s.lazy_load_enabled, "invalid boolean keeps the default");
    }

    #[cfg(feature = "json")]
    #[test]
    fn json_values_are_checked_per_key() {
        let s = OutlineSettings::from_json_value(&serde_json::json!({
            "lazyLoadEnabled": "false",
            "lazyLoadDepth": "7",
            "lazyLoadThreshold": [1, 2],
            "maxRenderNodes": 1e12,
            "maxRenderDepth": 1000,
        }));
        assert!(!s.lazy_load_enabled);
        assert_eq!(s.lazy_load_depth, 7);
        assert_eq!(s.lazy_load_threshold, 1000, "wrong type keeps the default");
        assert_eq!(s.max_render_nodes, 200_000);
        assert_eq!(s.max_render_depth, 256);

        assert_eq!(OutlineSettings::from_json_str("{not json"), OutlineSettings::default());
        assert_eq!(OutlineSettings::from_json_str("[]"), OutlineSettings::default());
    }

    #[test]
    fn serde_defaults_fill_missing_keys() {
        let s: OutlineSettings = serde_json::from_str(r#"{"maxRenderDepth": 8}"#).unwrap();
        assert_eq!(s.max_render_depth, 8);
        assert_eq!(s.max_render_nodes, 5000);
    }

    #[test]
    fn forced_limits_drop_laziness() {
        let forced = RenderLimits::default().forced();
        assert!(!forced.lazy_enabled);
        assert_eq!(forced.max_nodes, FORCED_NODE_CAP);
        assert_eq!(forced.depth_limit(), HARD_DEPTH_CEILING);
    }
}
