//! Database schema and operations for the inventory and recipe store

use std::collections::BTreeMap;

use anyhow::Result;
use rusqlite::Connection;

use crate::models::{ElementBound, Item, RawItem, RecipeBounds};

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Inventory items
        CREATE TABLE IF NOT EXISTS items (
            name TEXT PRIMARY KEY,
            mass_mb REAL NOT NULL,
            available INTEGER NOT NULL
        );

        -- Per-element composition of each item
        CREATE TABLE IF NOT EXISTS item_composition (
            item_name TEXT,
            element TEXT,
            fraction REAL NOT NULL,
            PRIMARY KEY (item_name, element)
        );

        -- Named alloy recipes
        CREATE TABLE IF NOT EXISTS recipes (
            name TEXT PRIMARY KEY
        );

        -- Fractional bounds per recipe element
        CREATE TABLE IF NOT EXISTS recipe_bounds (
            recipe_name TEXT,
            element TEXT,
            min_frac REAL NOT NULL,
            max_frac REAL NOT NULL,
            PRIMARY KEY (recipe_name, element)
        );

        CREATE INDEX IF NOT EXISTS idx_item_composition_item ON item_composition(item_name);
        CREATE INDEX IF NOT EXISTS idx_recipe_bounds_recipe ON recipe_bounds(recipe_name);
        "#,
    )?;
    Ok(())
}

/// Insert or replace an item and its composition rows
pub fn upsert_item(conn: &Connection, item: &Item) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO items (name, mass_mb, available) VALUES (?1, ?2, ?3)",
        (&item.name, item.mass_mb, item.available as i64),
    )?;
    conn.execute(
        "DELETE FROM item_composition WHERE item_name = ?1",
        [&item.name],
    )?;
    for (element, fraction) in &item.composition {
        conn.execute(
            "INSERT INTO item_composition (item_name, element, fraction) VALUES (?1, ?2, ?3)",
            (&item.name, element, fraction),
        )?;
    }
    Ok(())
}

/// Insert or replace a recipe and its bounds
pub fn upsert_recipe(conn: &Connection, name: &str, bounds: &RecipeBounds) -> Result<()> {
    conn.execute("INSERT OR REPLACE INTO recipes (name) VALUES (?1)", [name])?;
    conn.execute("DELETE FROM recipe_bounds WHERE recipe_name = ?1", [name])?;
    for (element, bound) in &bounds.elements {
        conn.execute(
            "INSERT INTO recipe_bounds (recipe_name, element, min_frac, max_frac)
             VALUES (?1, ?2, ?3, ?4)",
            (name, element, bound.min, bound.max),
        )?;
    }
    Ok(())
}

/// Clear all inventory and recipe data (for re-import)
pub fn clear_inventory(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        DELETE FROM recipe_bounds;
        DELETE FROM recipes;
        DELETE FROM item_composition;
        DELETE FROM items;
        "#,
    )?;
    Ok(())
}

/// List all items with their compositions, ordered by name.
///
/// Stored records come back as `RawItem`; the solver re-normalizes them
/// at its boundary.
pub fn list_items(conn: &Connection) -> Result<Vec<RawItem>> {
    let mut stmt = conn.prepare("SELECT name, mass_mb, available FROM items ORDER BY name")?;
    let rows = stmt.query_map([], |row| {
        Ok(RawItem {
            name: row.get(0)?,
            mass_mb: row.get(1)?,
            available: row.get(2)?,
            composition: BTreeMap::new(),
        })
    })?;

    let mut items = Vec::new();
    for row in rows {
        items.push(row?);
    }

    let mut comp_stmt = conn.prepare(
        "SELECT element, fraction FROM item_composition WHERE item_name = ?1 ORDER BY element",
    )?;
    for item in &mut items {
        let comp_rows = comp_stmt.query_map([&item.name], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
        })?;
        for row in comp_rows {
            let (element, fraction) = row?;
            item.composition.insert(element, fraction);
        }
    }
    Ok(items)
}

/// Get a single item by name
pub fn get_item(conn: &Connection, name: &str) -> Result<Option<RawItem>> {
    Ok(list_items(conn)?.into_iter().find(|item| item.name == name))
}

/// Get the bounds for a named recipe, or None if it does not exist
pub fn get_recipe(conn: &Connection, name: &str) -> Result<Option<RecipeBounds>> {
    let exists: bool = conn
        .prepare("SELECT 1 FROM recipes WHERE name = ?1")?
        .exists([name])?;
    if !exists {
        return Ok(None);
    }

    let mut stmt = conn.prepare(
        "SELECT element, min_frac, max_frac FROM recipe_bounds
         WHERE recipe_name = ?1 ORDER BY element",
    )?;
    let rows = stmt.query_map([name], |row| {
        Ok((
            row.get::<_, String>(0)?,
            ElementBound {
                min: row.get(1)?,
                max: row.get(2)?,
            },
        ))
    })?;

    let mut bounds = RecipeBounds::default();
    for row in rows {
        let (element, bound) = row?;
        bounds.elements.insert(element, bound);
    }
    Ok(Some(bounds))
}

/// List all recipe names
pub fn list_recipes(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM recipes ORDER BY name")?;
    let rows = stmt.query_map([], |row| row.get(0))?;

    let mut names = Vec::new();
    for row in rows {
        names.push(row?);
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn item_round_trip() {
        let conn = memory_db();
        let item = Item {
            name: "Purified Copper Ore".to_string(),
            mass_mb: 100.0,
            available: 27,
            composition: [("Cu".to_string(), 1.0)].into_iter().collect(),
        };
        upsert_item(&conn, &item).unwrap();

        let stored = get_item(&conn, "Purified Copper Ore").unwrap().unwrap();
        assert_eq!(stored.mass_mb, 100.0);
        assert_eq!(stored.available, 27);
        assert_eq!(stored.composition["Cu"], 1.0);
    }

    #[test]
    fn upsert_replaces_composition() {
        let conn = memory_db();
        let mut item = Item {
            name: "Mixed Dust".to_string(),
            mass_mb: 36.0,
            available: 10,
            composition: [("Cu".to_string(), 0.5), ("Sn".to_string(), 0.5)]
                .into_iter()
                .collect(),
        };
        upsert_item(&conn, &item).unwrap();

        item.composition = [("Bi".to_string(), 1.0)].into_iter().collect();
        upsert_item(&conn, &item).unwrap();

        let stored = get_item(&conn, "Mixed Dust").unwrap().unwrap();
        assert_eq!(stored.composition.len(), 1);
        assert_eq!(stored.composition["Bi"], 1.0);
    }

    #[test]
    fn recipe_round_trip() {
        let conn = memory_db();
        let bounds = RecipeBounds {
            elements: [
                ("Cu".to_string(), ElementBound { min: 0.5, max: 0.65 }),
                ("Zn".to_string(), ElementBound { min: 0.2, max: 0.3 }),
            ]
            .into_iter()
            .collect(),
        };
        upsert_recipe(&conn, "brass", &bounds).unwrap();

        let stored = get_recipe(&conn, "brass").unwrap().unwrap();
        assert_eq!(stored.elements.len(), 2);
        assert_eq!(stored.elements["Cu"], ElementBound { min: 0.5, max: 0.65 });
        assert!(get_recipe(&conn, "bronze").unwrap().is_none());
        assert_eq!(list_recipes(&conn).unwrap(), vec!["brass".to_string()]);
    }

    #[test]
    fn clear_removes_everything() {
        let conn = memory_db();
        let item = Item {
            name: "Ore".to_string(),
            mass_mb: 90.0,
            available: 41,
            composition: [("Zn".to_string(), 1.0)].into_iter().collect(),
        };
        upsert_item(&conn, &item).unwrap();
        upsert_recipe(&conn, "brass", &RecipeBounds::default()).unwrap();

        clear_inventory(&conn).unwrap();
        assert!(list_items(&conn).unwrap().is_empty());
        assert!(list_recipes(&conn).unwrap().is_empty());
    }
}
