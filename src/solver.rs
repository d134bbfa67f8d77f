//! Alloy charge combination search
//!
//! Enumerates subsets of inventory item types, searches integer counts
//! within each subset depth-first with mass-window pruning, filters the
//! results against the recipe's composition bounds, and ranks what
//! survives.

use std::collections::BTreeMap;

use crate::models::{
    Candidate, Item, RankKey, RawItem, RecipeBounds, SolveConfig, SolveOutcome, ValidationError,
};

/// Tolerance used when comparing composition fractions and when deciding
/// whether a composition already sums to 1.0.
pub const FRACTION_EPSILON: f64 = 1e-9;

/// Slack applied to pruning bounds only. Pruning must never drop a
/// candidate that the exact window would accept, so the bounds are
/// loosened by this much; emitted assignments are re-checked against the
/// exact window.
const PRUNE_EPSILON: f64 = 1e-9;

/// Validate a raw item record and normalize its composition to sum to 1.0.
pub fn normalize_item(raw: &RawItem) -> Result<Item, ValidationError> {
    if !(raw.mass_mb > 0.0) {
        return Err(ValidationError::NonPositiveMass {
            name: raw.name.clone(),
            mass_mb: raw.mass_mb,
        });
    }
    if raw.available < 0 {
        return Err(ValidationError::NegativeAvailability {
            name: raw.name.clone(),
            available: raw.available,
        });
    }
    for (element, &fraction) in &raw.composition {
        if !(fraction >= 0.0) {
            return Err(ValidationError::NegativeFraction {
                name: raw.name.clone(),
                element: element.clone(),
                fraction,
            });
        }
    }

    let sum: f64 = raw.composition.values().sum();
    if !(sum > 0.0) {
        return Err(ValidationError::EmptyComposition {
            name: raw.name.clone(),
        });
    }

    let composition = if (sum - 1.0).abs() > FRACTION_EPSILON {
        raw.composition
            .iter()
            .map(|(element, fraction)| (element.clone(), fraction / sum))
            .collect()
    } else {
        raw.composition.clone()
    };

    Ok(Item {
        name: raw.name.clone(),
        mass_mb: raw.mass_mb,
        available: raw.available as u64,
        composition,
    })
}

/// Check that every recipe bound is a valid sub-interval of [0, 1].
pub fn validate_bounds(bounds: &RecipeBounds) -> Result<(), ValidationError> {
    for (element, bound) in &bounds.elements {
        if !(bound.min >= 0.0 && bound.max <= 1.0 && bound.min <= bound.max) {
            return Err(ValidationError::InvalidBound {
                element: element.clone(),
                min: bound.min,
                max: bound.max,
            });
        }
    }
    Ok(())
}

fn validate_config(config: &SolveConfig) -> Result<(), ValidationError> {
    if !(config.target_mb > 0.0) {
        return Err(ValidationError::NonPositiveTarget(config.target_mb));
    }
    if !(config.allowance_mb >= 0.0) {
        return Err(ValidationError::NegativeAllowance(config.allowance_mb));
    }
    if config.max_types == 0 {
        return Err(ValidationError::ZeroMaxTypes);
    }
    if config.top == 0 {
        return Err(ValidationError::ZeroTop);
    }
    Ok(())
}

/// Lazy enumeration of index subsets of `{0, .., n-1}` of size 1 through
/// `max_len`, smaller subsets first, lexicographic within a size.
pub struct Subsets {
    n: usize,
    max_len: usize,
    size: usize,
    current: Vec<usize>,
    done: bool,
}

impl Subsets {
    pub fn new(n: usize, max_len: usize) -> Self {
        let max_len = max_len.min(n);
        Self {
            n,
            max_len,
            size: 0,
            current: Vec::new(),
            done: n == 0 || max_len == 0,
        }
    }
}

impl Iterator for Subsets {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Vec<usize>> {
        if self.done {
            return None;
        }
        if self.size == 0 {
            self.size = 1;
            self.current = vec![0];
            return Some(self.current.clone());
        }
        if next_combination(&mut self.current, self.n) {
            return Some(self.current.clone());
        }
        self.size += 1;
        if self.size > self.max_len {
            self.done = true;
            return None;
        }
        self.current = (0..self.size).collect();
        Some(self.current.clone())
    }
}

/// Advance `combo` to the lexicographically next k-combination of
/// `{0, .., n-1}`. Returns false when `combo` was the last one.
fn next_combination(combo: &mut [usize], n: usize) -> bool {
    let k = combo.len();
    let mut i = k;
    while i > 0 {
        i -= 1;
        if combo[i] < n - (k - i) {
            combo[i] += 1;
            for j in i + 1..k {
                combo[j] = combo[j - 1] + 1;
            }
            return true;
        }
    }
    false
}

/// Node-visit accounting for the optional search budget.
struct SearchBudget {
    limit: Option<u64>,
    visited: u64,
    exhausted: bool,
}

impl SearchBudget {
    fn new(limit: Option<u64>) -> Self {
        Self {
            limit,
            visited: 0,
            exhausted: false,
        }
    }

    /// Record one visited node. Returns false once the budget is spent.
    fn tick(&mut self) -> bool {
        self.visited += 1;
        if let Some(limit) = self.limit {
            if self.visited > limit {
                self.exhausted = true;
            }
        }
        !self.exhausted
    }
}

/// Depth-first integer-count search over one subset of item types.
///
/// Items are visited heaviest first so the suffix-maximum bound tightens
/// as early as possible. Every complete assignment whose total mass lands
/// inside the window is handed to `emit`; composition is not checked here.
struct CountSearch<'a> {
    items: &'a [Item],
    /// Indices into `items`, heaviest first.
    order: Vec<usize>,
    /// `suffix_max[i]` = largest mass attainable from positions i.. onward.
    suffix_max: Vec<f64>,
    counts: Vec<u64>,
    min_total: f64,
    max_total: f64,
}

impl<'a> CountSearch<'a> {
    fn new(items: &'a [Item], subset: &[usize], min_total: f64, max_total: f64) -> Self {
        let mut order = subset.to_vec();
        order.sort_by(|&a, &b| items[b].mass_mb.total_cmp(&items[a].mass_mb).then(a.cmp(&b)));

        let mut suffix_max = vec![0.0; order.len() + 1];
        for i in (0..order.len()).rev() {
            let item = &items[order[i]];
            suffix_max[i] = suffix_max[i + 1] + item.available as f64 * item.mass_mb;
        }

        let counts = vec![0; order.len()];
        Self {
            items,
            order,
            suffix_max,
            counts,
            min_total,
            max_total,
        }
    }

    fn run(&mut self, budget: &mut SearchBudget, emit: &mut impl FnMut(&[usize], &[u64])) {
        self.dfs(0, 0.0, budget, emit);
    }

    fn dfs(
        &mut self,
        pos: usize,
        mass: f64,
        budget: &mut SearchBudget,
        emit: &mut impl FnMut(&[usize], &[u64]),
    ) {
        if !budget.tick() {
            return;
        }
        // Counts only ever add mass, so overshooting the window is final.
        if mass > self.max_total + PRUNE_EPSILON {
            return;
        }
        // Even taking every remaining unit cannot reach the window floor.
        if mass + self.suffix_max[pos] < self.min_total - PRUNE_EPSILON {
            return;
        }
        if pos == self.order.len() {
            if mass >= self.min_total && mass <= self.max_total && mass > 0.0 {
                emit(&self.order, &self.counts);
            }
            return;
        }

        let item = &self.items[self.order[pos]];
        let headroom = ((self.max_total - mass) / item.mass_mb + PRUNE_EPSILON).floor();
        let cap = (item.available as f64).min(headroom).max(0.0) as u64;

        // Larger counts first, matching the preference for filling the
        // window from above.
        for count in (0..=cap).rev() {
            self.counts[pos] = count;
            self.dfs(pos + 1, mass + count as f64 * item.mass_mb, budget, emit);
            if budget.exhausted {
                return;
            }
        }
        self.counts[pos] = 0;
    }
}

/// Evaluate one complete assignment against the recipe bounds.
///
/// Returns the finished candidate, or `None` when a bounded element's
/// fraction falls outside its interval. Rejection here is ordinary
/// filtering, not an error.
fn evaluate(
    items: &[Item],
    order: &[usize],
    counts: &[u64],
    bounds: &RecipeBounds,
    config: &SolveConfig,
) -> Option<Candidate> {
    let mut total_mass = 0.0;
    let mut element_mass: BTreeMap<String, f64> = BTreeMap::new();
    let mut scarcity = 0.0;
    let mut used = 0usize;

    for (&idx, &count) in order.iter().zip(counts) {
        if count == 0 {
            continue;
        }
        let item = &items[idx];
        let mass = count as f64 * item.mass_mb;
        total_mass += mass;
        for (element, fraction) in &item.composition {
            *element_mass.entry(element.clone()).or_default() += mass * fraction;
        }
        scarcity += count as f64 / item.available as f64;
        used += 1;
    }

    if total_mass <= 0.0 {
        return None;
    }

    let fractions: BTreeMap<String, f64> = element_mass
        .into_iter()
        .map(|(element, mass)| (element, mass / total_mass))
        .collect();

    for (element, bound) in &bounds.elements {
        let fraction = fractions.get(element).copied().unwrap_or(0.0);
        if fraction < bound.min - FRACTION_EPSILON || fraction > bound.max + FRACTION_EPSILON {
            return None;
        }
    }

    let key = RankKey {
        mass_penalty: mass_penalty(total_mass, config),
        scarcity,
        type_count: used,
    };

    let counts_by_name = order
        .iter()
        .zip(counts)
        .filter(|&(_, &count)| count > 0)
        .map(|(&idx, &count)| (items[idx].name.clone(), count))
        .collect();

    Some(Candidate {
        counts: counts_by_name,
        total_mass_mb: total_mass,
        fractions,
        scarcity,
        key,
    })
}

/// Mass-preference term of the rank key. With overshoot preference on,
/// an undershoot is weighted so heavily that it ranks behind almost any
/// overshoot; with it off, deviation is penalized symmetrically.
fn mass_penalty(total_mass: f64, config: &SolveConfig) -> f64 {
    let deviation = total_mass - config.target_mb;
    if !config.prefer_overshoot {
        return deviation.abs();
    }
    if deviation >= 0.0 {
        deviation * config.overshoot_weight
    } else {
        deviation.abs() * config.undershoot_weight
    }
}

/// Search the inventory for charge combinations matching the recipe.
///
/// Validates and normalizes every input first, then runs the full
/// subset/count search. An empty candidate list is a normal "no solution"
/// outcome. When `config.node_budget` runs out mid-search the outcome is
/// flagged truncated and carries whatever was found up to that point.
pub fn solve(
    items: &[RawItem],
    bounds: &RecipeBounds,
    config: &SolveConfig,
) -> Result<SolveOutcome, ValidationError> {
    validate_config(config)?;
    validate_bounds(bounds)?;

    let normalized: Vec<Item> = items
        .iter()
        .map(normalize_item)
        .collect::<Result<_, _>>()?;

    // Items with nothing in stock can never appear in a candidate and
    // would break the scarcity term, so they leave the pool here.
    let pool: Vec<Item> = normalized
        .into_iter()
        .filter(|item| item.available > 0)
        .collect();

    let min_total = config.target_mb - config.allowance_mb;
    let max_total = config.target_mb + config.allowance_mb;

    let mut budget = SearchBudget::new(config.node_budget);
    let mut feasible: Vec<Candidate> = Vec::new();

    for subset in Subsets::new(pool.len(), config.max_types) {
        if budget.exhausted {
            break;
        }
        let mut search = CountSearch::new(&pool, &subset, min_total, max_total);
        search.run(&mut budget, &mut |order, counts| {
            if let Some(candidate) = evaluate(&pool, order, counts, bounds, config) {
                feasible.push(candidate);
            }
        });
    }

    // Stable, so candidates with identical keys keep encounter order.
    feasible.sort_by(|a, b| a.key.cmp_total(&b.key));
    feasible.truncate(config.top);

    Ok(SolveOutcome {
        candidates: feasible,
        truncated: budget.exhausted,
        nodes_visited: budget.visited,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ElementBound;

    fn raw(name: &str, mass_mb: f64, available: i64, composition: &[(&str, f64)]) -> RawItem {
        RawItem {
            name: name.to_string(),
            mass_mb,
            available,
            composition: composition
                .iter()
                .map(|&(element, fraction)| (element.to_string(), fraction))
                .collect(),
        }
    }

    fn bounds(entries: &[(&str, f64, f64)]) -> RecipeBounds {
        RecipeBounds {
            elements: entries
                .iter()
                .map(|&(element, min, max)| (element.to_string(), ElementBound { min, max }))
                .collect(),
        }
    }

    #[test]
    fn normalize_rescales_to_unit_sum() {
        let item = normalize_item(&raw("ore", 100.0, 5, &[("Cu", 3.0), ("Fe", 1.0)])).unwrap();
        assert!((item.composition["Cu"] - 0.75).abs() < 1e-12);
        assert!((item.composition["Fe"] - 0.25).abs() < 1e-12);
    }

    #[test]
    fn normalize_is_idempotent() {
        let once = normalize_item(&raw("ore", 100.0, 5, &[("Cu", 0.6), ("Sn", 0.4)])).unwrap();
        let again = normalize_item(&RawItem {
            name: once.name.clone(),
            mass_mb: once.mass_mb,
            available: once.available as i64,
            composition: once.composition.clone(),
        })
        .unwrap();
        for (element, fraction) in &once.composition {
            assert!((again.composition[element] - fraction).abs() < FRACTION_EPSILON);
        }
    }

    #[test]
    fn normalize_rejects_bad_records() {
        assert_eq!(
            normalize_item(&raw("ore", 0.0, 5, &[("Cu", 1.0)])).unwrap_err(),
            ValidationError::NonPositiveMass {
                name: "ore".to_string(),
                mass_mb: 0.0
            }
        );
        assert_eq!(
            normalize_item(&raw("ore", 100.0, -1, &[("Cu", 1.0)])).unwrap_err(),
            ValidationError::NegativeAvailability {
                name: "ore".to_string(),
                available: -1
            }
        );
        assert_eq!(
            normalize_item(&raw("ore", 100.0, 5, &[])).unwrap_err(),
            ValidationError::EmptyComposition {
                name: "ore".to_string()
            }
        );
        assert!(matches!(
            normalize_item(&raw("ore", 100.0, 5, &[("Cu", -0.5), ("Fe", 1.5)])),
            Err(ValidationError::NegativeFraction { .. })
        ));
    }

    #[test]
    fn bounds_validation() {
        assert!(validate_bounds(&bounds(&[("Cu", 0.5, 0.65)])).is_ok());
        assert!(validate_bounds(&bounds(&[("Cu", 0.7, 0.5)])).is_err());
        assert!(validate_bounds(&bounds(&[("Cu", -0.1, 0.5)])).is_err());
        assert!(validate_bounds(&bounds(&[("Cu", 0.5, 1.2)])).is_err());
    }

    #[test]
    fn subsets_cover_all_sizes_in_order() {
        let all: Vec<Vec<usize>> = Subsets::new(4, 2).collect();
        assert_eq!(
            all,
            vec![
                vec![0],
                vec![1],
                vec![2],
                vec![3],
                vec![0, 1],
                vec![0, 2],
                vec![0, 3],
                vec![1, 2],
                vec![1, 3],
                vec![2, 3],
            ]
        );
    }

    #[test]
    fn subsets_full_count() {
        // sum of C(5, k) for k = 1..=5
        assert_eq!(Subsets::new(5, 5).count(), 31);
        assert_eq!(Subsets::new(5, 2).count(), 15);
        assert_eq!(Subsets::new(0, 3).count(), 0);
    }

    #[test]
    fn subsets_are_restartable() {
        let first: Vec<_> = Subsets::new(3, 3).collect();
        let second: Vec<_> = Subsets::new(3, 3).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn config_validation() {
        let items = [raw("Cu", 100.0, 10, &[("Cu", 1.0)])];
        let recipe = bounds(&[("Cu", 0.0, 1.0)]);

        let mut config = SolveConfig::for_target(0.0);
        assert_eq!(
            solve(&items, &recipe, &config).unwrap_err(),
            ValidationError::NonPositiveTarget(0.0)
        );

        config.target_mb = 100.0;
        config.allowance_mb = -1.0;
        assert_eq!(
            solve(&items, &recipe, &config).unwrap_err(),
            ValidationError::NegativeAllowance(-1.0)
        );

        config.allowance_mb = 10.0;
        config.max_types = 0;
        assert_eq!(
            solve(&items, &recipe, &config).unwrap_err(),
            ValidationError::ZeroMaxTypes
        );

        config.max_types = 2;
        config.top = 0;
        assert_eq!(
            solve(&items, &recipe, &config).unwrap_err(),
            ValidationError::ZeroTop
        );
    }

    #[test]
    fn zero_availability_items_never_used() {
        let items = [
            raw("Empty", 100.0, 0, &[("Cu", 1.0)]),
            raw("Stocked", 100.0, 5, &[("Cu", 1.0)]),
        ];
        let recipe = bounds(&[("Cu", 0.9, 1.0)]);
        let mut config = SolveConfig::for_target(300.0);
        config.allowance_mb = 0.0;
        config.top = 10;

        let outcome = solve(&items, &recipe, &config).unwrap();
        assert!(!outcome.candidates.is_empty());
        for candidate in &outcome.candidates {
            assert!(!candidate.counts.contains_key("Empty"));
        }
    }

    #[test]
    fn budget_exhaustion_returns_partial_results() {
        let items = [
            raw("Cu", 10.0, 50, &[("Cu", 1.0)]),
            raw("Zn", 5.0, 50, &[("Zn", 1.0)]),
            raw("Bi", 7.0, 50, &[("Bi", 1.0)]),
        ];
        let recipe = RecipeBounds::default();
        let mut config = SolveConfig::for_target(200.0);
        config.allowance_mb = 50.0;
        config.max_types = 3;
        config.top = 1000;
        config.node_budget = Some(10);

        let outcome = solve(&items, &recipe, &config).unwrap();
        assert!(outcome.truncated);
        assert!(outcome.nodes_visited <= 11);

        let unbounded = solve(
            &items,
            &recipe,
            &SolveConfig {
                node_budget: None,
                ..config
            },
        )
        .unwrap();
        assert!(!unbounded.truncated);
        assert!(outcome.candidates.len() <= unbounded.candidates.len());
    }
}
