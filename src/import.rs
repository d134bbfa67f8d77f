//! JSON and inline-string ingestion for inventory items and recipes
//!
//! Reads `items.json` (array of item records) and `recipes.json` (object
//! of named recipes) into the store, and parses the inline CLI forms for
//! single-element items and ad-hoc recipe bounds.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use regex::Regex;
use rusqlite::Connection;

use crate::db;
use crate::models::{ElementBound, RawItem, RecipeBounds};
use crate::solver;

/// Counts of what an import run touched
#[derive(Debug, Default)]
pub struct ImportStats {
    pub items_imported: usize,
    pub recipes_imported: usize,
    pub skipped: usize,
}

impl fmt::Display for ImportStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Imported {} item(s), {} recipe(s). Skipped: {}",
            self.items_imported, self.recipes_imported, self.skipped
        )
    }
}

/// Import an items JSON file into the store.
///
/// Malformed records are skipped with a note on stderr rather than
/// aborting the whole import. Stored compositions are normalized.
pub fn import_items(conn: &Connection, path: &Path, stats: &mut ImportStats) -> Result<()> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let raw_items: Vec<RawItem> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {} as an item array", path.display()))?;

    for raw in raw_items {
        match solver::normalize_item(&raw) {
            Ok(item) => {
                db::upsert_item(conn, &item)?;
                stats.items_imported += 1;
            }
            Err(e) => {
                eprintln!("  Skipping item: {}", e);
                stats.skipped += 1;
            }
        }
    }
    Ok(())
}

/// Import a recipes JSON file into the store.
///
/// The expected shape is an object mapping recipe name to
/// `{"El": [min, max], ..}`. Recipes with invalid bounds are skipped.
pub fn import_recipes(conn: &Connection, path: &Path, stats: &mut ImportStats) -> Result<()> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let raw: BTreeMap<String, BTreeMap<String, (f64, f64)>> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {} as a recipe map", path.display()))?;

    for (name, elements) in raw {
        let bounds = RecipeBounds {
            elements: elements
                .into_iter()
                .map(|(element, (min, max))| (element, ElementBound { min, max }))
                .collect(),
        };
        match solver::validate_bounds(&bounds) {
            Ok(()) => {
                db::upsert_recipe(conn, &name, &bounds)?;
                stats.recipes_imported += 1;
            }
            Err(e) => {
                eprintln!("  Skipping recipe '{}': {}", name, e);
                stats.skipped += 1;
            }
        }
    }
    Ok(())
}

/// Parse an inline recipe spec like `Cu:0.50-0.65;Zn:0.20-0.30`
pub fn parse_recipe_spec(spec: &str) -> Result<RecipeBounds> {
    let part_re = Regex::new(r"^\s*([A-Za-z][A-Za-z0-9]*)\s*:\s*([0-9.]+)\s*-\s*([0-9.]+)\s*$")?;

    let mut bounds = RecipeBounds::default();
    for part in spec.split(';').filter(|p| !p.trim().is_empty()) {
        let cap = part_re
            .captures(part)
            .ok_or_else(|| anyhow!("Malformed recipe segment: '{}'", part.trim()))?;
        let element = cap[1].to_string();
        let min: f64 = cap[2].parse()?;
        let max: f64 = cap[3].parse()?;
        bounds.elements.insert(element, ElementBound { min, max });
    }
    if bounds.elements.is_empty() {
        return Err(anyhow!("Recipe spec '{}' contains no bounds", spec));
    }
    solver::validate_bounds(&bounds)?;
    Ok(bounds)
}

/// Parse an inline single-element item: `Name,mass,available,Element`
pub fn parse_add_item(spec: &str) -> Result<RawItem> {
    let parts: Vec<&str> = spec.split(',').map(str::trim).collect();
    if parts.len() != 4 {
        return Err(anyhow!(
            "Malformed --add-item entry '{}', expected 'Name,mass,available,Element'",
            spec
        ));
    }
    let mass_mb: f64 = parts[1]
        .parse()
        .with_context(|| format!("Bad mass in --add-item entry '{}'", spec))?;
    let available: i64 = parts[2]
        .parse()
        .with_context(|| format!("Bad available count in --add-item entry '{}'", spec))?;

    Ok(RawItem {
        name: parts[0].to_string(),
        mass_mb,
        available,
        composition: [(parts[3].to_string(), 1.0)].into_iter().collect(),
    })
}
