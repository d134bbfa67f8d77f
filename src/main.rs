//! Alloy Charge Calculator
//!
//! Finds item combinations from a smelting inventory that match an
//! alloy recipe's composition bounds at a target charge mass.

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use rusqlite::Connection;

use alloy_calculator::models::{Item, RecipeBounds, SolveConfig, SolveOutcome};
use alloy_calculator::{db, import, solver};

#[derive(Parser)]
#[command(name = "alloy-calculator")]
#[command(about = "Alloy charge calculator for modded Minecraft smelting")]
struct Cli {
    /// Path to the SQLite inventory database
    #[arg(short, long, default_value = "alloy_inventory.db")]
    database: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import items and/or recipes from JSON files
    Import {
        /// Path to an items JSON array
        #[arg(long)]
        items_file: Option<PathBuf>,

        /// Path to a recipes JSON object
        #[arg(long)]
        recipes_file: Option<PathBuf>,

        /// Clear existing inventory and recipes before importing
        #[arg(long)]
        clear: bool,
    },

    /// Search the inventory for charge combinations matching a recipe
    Solve {
        /// Target charge mass in mb
        #[arg(short, long)]
        target: f64,

        /// Allowed +/- mass tolerance in mb
        #[arg(long, default_value = "144.0")]
        allowance: f64,

        /// Name of a stored recipe to solve for
        #[arg(long, default_value = "bismuth_bronze")]
        recipe_name: String,

        /// Inline recipe bounds, e.g. 'Cu:0.50-0.65;Zn:0.20-0.30' (overrides --recipe-name)
        #[arg(long)]
        recipe: Option<String>,

        /// Max distinct item types to combine
        #[arg(long, default_value = "4")]
        max_types: usize,

        /// How many top solutions to print
        #[arg(long, default_value = "1")]
        top: usize,

        /// Add a single-element item for this run: 'Name,mass,available,Element' (repeatable)
        #[arg(long)]
        add_item: Vec<String>,

        /// Do not prefer overshooting the target (preferred by default)
        #[arg(long)]
        no_prefer_overshoot: bool,

        /// Cap on search nodes visited before returning partial results
        #[arg(long)]
        budget: Option<u64>,

        /// Show per-candidate detail (fractions, rank key, nodes visited)
        #[arg(short, long)]
        verbose: bool,
    },

    /// List all items in the inventory
    ListItems,

    /// List all stored recipe names
    ListRecipes,

    /// Show the bounds of a stored recipe
    Recipe {
        /// Recipe name
        name: String,
    },

    /// Initialize an empty database with schema
    Init,

    /// Load sample TFG ore data and the bismuth bronze recipe
    LoadSample,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let conn = Connection::open(&cli.database)?;
    db::init_schema(&conn)?;

    match cli.command {
        Commands::Import {
            items_file,
            recipes_file,
            clear,
        } => {
            if clear {
                println!("Clearing existing inventory...");
                db::clear_inventory(&conn)?;
            }
            if items_file.is_none() && recipes_file.is_none() {
                return Err(anyhow!("Nothing to import: pass --items-file and/or --recipes-file"));
            }

            let mut stats = import::ImportStats::default();
            if let Some(path) = items_file {
                import::import_items(&conn, &path, &mut stats)?;
            }
            if let Some(path) = recipes_file {
                import::import_recipes(&conn, &path, &mut stats)?;
            }
            println!("{}", stats);
        }

        Commands::Solve {
            target,
            allowance,
            recipe_name,
            recipe,
            max_types,
            top,
            add_item,
            no_prefer_overshoot,
            budget,
            verbose,
        } => {
            let bounds = match recipe {
                Some(spec) => import::parse_recipe_spec(&spec)?,
                None => db::get_recipe(&conn, &recipe_name)?.ok_or_else(|| {
                    anyhow!(
                        "Recipe '{}' not found. Run 'load-sample' or 'import' first.",
                        recipe_name
                    )
                })?,
            };

            let mut items = db::list_items(&conn)?;
            for spec in &add_item {
                items.push(import::parse_add_item(spec)?);
            }
            if items.is_empty() {
                return Err(anyhow!(
                    "No items in inventory. Run 'import', 'load-sample' or pass --add-item."
                ));
            }

            let config = SolveConfig {
                target_mb: target,
                allowance_mb: allowance,
                max_types,
                top,
                prefer_overshoot: !no_prefer_overshoot,
                node_budget: budget,
                ..SolveConfig::default()
            };

            let outcome = solver::solve(&items, &bounds, &config)?;
            print_outcome(&outcome, &bounds, &config, verbose);
        }

        Commands::ListItems => {
            let items = db::list_items(&conn)?;
            if items.is_empty() {
                println!("No items in inventory. Run 'import' or 'load-sample' first.");
            } else {
                println!("{:<34} {:>9} {:>10}  Composition", "Item", "Mass (mb)", "Available");
                println!("{}", "-".repeat(70));
                for item in items {
                    let comp: Vec<String> = item
                        .composition
                        .iter()
                        .map(|(element, fraction)| format!("{}:{:.2}", element, fraction))
                        .collect();
                    println!(
                        "{:<34} {:>9.0} {:>10}  {}",
                        item.name,
                        item.mass_mb,
                        item.available,
                        comp.join(", ")
                    );
                }
            }
        }

        Commands::ListRecipes => {
            let recipes = db::list_recipes(&conn)?;
            if recipes.is_empty() {
                println!("No recipes stored. Run 'import' or 'load-sample' first.");
            } else {
                println!("Stored recipes:");
                for name in recipes {
                    println!("  {}", name);
                }
            }
        }

        Commands::Recipe { name } => match db::get_recipe(&conn, &name)? {
            Some(bounds) => {
                println!("Recipe: {}", name);
                for (element, bound) in &bounds.elements {
                    println!(
                        "  {}: {:.1}% - {:.1}%",
                        element,
                        bound.min * 100.0,
                        bound.max * 100.0
                    );
                }
            }
            None => println!("Recipe '{}' not found", name),
        },

        Commands::Init => {
            println!("Database initialized at: {}", cli.database.display());
        }

        Commands::LoadSample => {
            load_sample_data(&conn)?;
            println!("Sample data loaded successfully!");
        }
    }

    Ok(())
}

fn print_outcome(outcome: &SolveOutcome, bounds: &RecipeBounds, config: &SolveConfig, verbose: bool) {
    if outcome.truncated {
        println!(
            "Search budget exhausted after {} nodes; results below may be incomplete.\n",
            outcome.nodes_visited
        );
    }

    if outcome.candidates.is_empty() {
        println!(
            "No solutions found within +/-{} mb that satisfy the composition bounds.",
            config.allowance_mb
        );
        return;
    }

    println!("Showing top {} solution(s):\n", outcome.candidates.len());
    for (i, candidate) in outcome.candidates.iter().enumerate() {
        let diff = candidate.total_mass_mb - config.target_mb;
        println!(
            "Solution #{}: total mass = {:.1} mb ({}{:.1} vs target)",
            i + 1,
            candidate.total_mass_mb,
            if diff >= 0.0 { "+" } else { "" },
            diff
        );
        println!("  Breakdown:");
        for (name, count) in &candidate.counts {
            println!("    - {} x{}", name, count);
        }

        let percentages: Vec<String> = bounds
            .elements
            .keys()
            .map(|element| {
                let fraction = candidate.fractions.get(element).copied().unwrap_or(0.0);
                format!("{} {:.2}%", element, fraction * 100.0)
            })
            .collect();
        println!("  Percentages: {}", percentages.join(", "));
        println!("  Scarcity score: {:.4}", candidate.scarcity);

        if verbose {
            println!(
                "  Rank key: mass penalty {:.3}, scarcity {:.4}, {} type(s)",
                candidate.key.mass_penalty,
                candidate.key.scarcity,
                candidate.key.type_count
            );
        }
        println!();
    }

    if verbose {
        println!("Search visited {} node(s).", outcome.nodes_visited);
    }
}

/// Load the sample TFG inventory and default recipe for testing without
/// any JSON files
fn load_sample_data(conn: &Connection) -> Result<()> {
    use alloy_calculator::models::ElementBound;

    db::clear_inventory(conn)?;

    let sample: [(&str, &str, f64, u64); 8] = [
        ("Purified Copper Ore", "Cu", 100.0, 27),
        ("Purified Chalcopyrite Ore", "Cu", 84.0, 81),
        ("Small Pile of Chalcopyrite Dust", "Cu", 30.0, 84),
        ("Small Pile of Copper Dust", "Cu", 36.0, 17),
        ("Small Pile of Tetrahedrite Dust", "Cu", 31.0, 16),
        ("Small Pile of Bismuth Dust", "Bi", 36.0, 31),
        ("Purified Sphalerite Ore", "Zn", 90.0, 41),
        ("Small Pile of Sphalerite Dust", "Zn", 31.0, 28),
    ];

    for (name, element, mass_mb, available) in sample {
        let item = Item {
            name: name.to_string(),
            mass_mb,
            available,
            composition: [(element.to_string(), 1.0)].into_iter().collect(),
        };
        db::upsert_item(conn, &item)?;
    }

    let bismuth_bronze = RecipeBounds {
        elements: [
            ("Cu".to_string(), ElementBound { min: 0.50, max: 0.65 }),
            ("Zn".to_string(), ElementBound { min: 0.20, max: 0.30 }),
            ("Bi".to_string(), ElementBound { min: 0.10, max: 0.20 }),
        ]
        .into_iter()
        .collect(),
    };
    db::upsert_recipe(conn, "bismuth_bronze", &bismuth_bronze)?;

    println!("Loaded {} sample items and 1 recipe", sample.len());
    Ok(())
}
