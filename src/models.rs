//! Data models for inventory items, alloy recipes and solver output

use std::collections::BTreeMap;

use serde::Deserialize;
use thiserror::Error;

/// An item record as it appears in `items.json`, before validation.
#[derive(Debug, Clone, Deserialize)]
pub struct RawItem {
    pub name: String,
    pub mass_mb: f64,
    #[serde(default)]
    pub available: i64,
    #[serde(default)]
    pub composition: BTreeMap<String, f64>,
}

/// A validated inventory item. Composition fractions are non-negative
/// and sum to 1.0.
#[derive(Debug, Clone)]
pub struct Item {
    pub name: String,
    pub mass_mb: f64,
    pub available: u64,
    pub composition: BTreeMap<String, f64>,
}

/// Closed fractional interval an element must land in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElementBound {
    pub min: f64,
    pub max: f64,
}

/// Per-element composition bounds for one alloy recipe.
///
/// Elements absent from the map are unconstrained.
#[derive(Debug, Clone, Default)]
pub struct RecipeBounds {
    pub elements: BTreeMap<String, ElementBound>,
}

/// Composite comparison key for ranking candidates; lower is better.
///
/// Ordering priority: mass penalty, then scarcity, then number of
/// distinct item types.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankKey {
    pub mass_penalty: f64,
    pub scarcity: f64,
    pub type_count: usize,
}

impl RankKey {
    pub fn cmp_total(&self, other: &Self) -> std::cmp::Ordering {
        self.mass_penalty
            .total_cmp(&other.mass_penalty)
            .then(self.scarcity.total_cmp(&other.scarcity))
            .then(self.type_count.cmp(&other.type_count))
    }
}

/// One feasible assignment of counts to item types, with its derived
/// attributes filled in.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Item name -> count. Zero-count items are omitted.
    pub counts: BTreeMap<String, u64>,
    pub total_mass_mb: f64,
    /// Element -> mass fraction of the combined charge.
    pub fractions: BTreeMap<String, f64>,
    /// Sum of count/available over used items.
    pub scarcity: f64,
    pub key: RankKey,
}

/// Solver parameters. Defaults mirror the CLI defaults.
#[derive(Debug, Clone)]
pub struct SolveConfig {
    /// Target charge mass in mb.
    pub target_mb: f64,
    /// Accepted +/- deviation from the target.
    pub allowance_mb: f64,
    /// Maximum number of distinct item types per candidate.
    pub max_types: usize,
    /// How many top candidates to keep.
    pub top: usize,
    /// Rank overshooting candidates ahead of undershooting ones.
    pub prefer_overshoot: bool,
    /// Mass-penalty weight applied when the candidate overshoots.
    pub overshoot_weight: f64,
    /// Mass-penalty weight applied when the candidate undershoots.
    /// Much larger than `overshoot_weight` so any undershoot ranks
    /// behind a comparable overshoot.
    pub undershoot_weight: f64,
    /// Optional cap on search-tree nodes visited. `None` = unbounded.
    pub node_budget: Option<u64>,
}

impl Default for SolveConfig {
    fn default() -> Self {
        Self {
            target_mb: 0.0,
            allowance_mb: 144.0,
            max_types: 4,
            top: 1,
            prefer_overshoot: true,
            overshoot_weight: 1.0,
            undershoot_weight: 1000.0,
            node_budget: None,
        }
    }
}

impl SolveConfig {
    pub fn for_target(target_mb: f64) -> Self {
        Self {
            target_mb,
            ..Self::default()
        }
    }
}

/// Result of one solver run.
#[derive(Debug, Clone)]
pub struct SolveOutcome {
    /// Best first, at most `top` entries. Empty means no solution,
    /// which is a normal outcome rather than an error.
    pub candidates: Vec<Candidate>,
    /// True when the node budget ran out before the search finished.
    pub truncated: bool,
    pub nodes_visited: u64,
}

/// Malformed input data, detected before any search begins.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("item '{name}': mass must be positive, got {mass_mb}")]
    NonPositiveMass { name: String, mass_mb: f64 },

    #[error("item '{name}': available count must not be negative, got {available}")]
    NegativeAvailability { name: String, available: i64 },

    #[error("item '{name}': composition fractions must sum to a positive value")]
    EmptyComposition { name: String },

    #[error("item '{name}': element '{element}' has negative fraction {fraction}")]
    NegativeFraction {
        name: String,
        element: String,
        fraction: f64,
    },

    #[error("recipe bound for '{element}': [{min}, {max}] is not a valid sub-interval of [0, 1]")]
    InvalidBound { element: String, min: f64, max: f64 },

    #[error("target mass must be positive, got {0}")]
    NonPositiveTarget(f64),

    #[error("allowance must not be negative, got {0}")]
    NegativeAllowance(f64),

    #[error("max-types must be at least 1")]
    ZeroMaxTypes,

    #[error("top must be at least 1")]
    ZeroTop,
}
