//! Alloy Charge Calculator
//!
//! Searches an inventory of ores, dusts and ingots for integer-count
//! combinations that hit a target charge mass while keeping every
//! element of the melt inside the fractional bounds of an alloy recipe.

pub mod db;
pub mod import;
pub mod models;
pub mod solver;
