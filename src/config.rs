use serde::{Deserialize, Serialize};

use crate::binding::StackBoundary;
use crate::colour::{HeatScheme, Rgb, VARIABLE_PALETTE, colour_from_name};
use crate::geometry::Projection;
use crate::registry::ColumnSpec;
use crate::transition::Easing;

/// Map-wide settings, read from RON. Every field falls back to its default
/// when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    pub id_column: String,
    pub name_column: String,
    pub geometry_id_property: String,
    /// Base extrude unit; also the starting height multiplier.
    pub extrude_height: f64,
    pub extrude_scale_step: f64,
    pub top_n: usize,
    pub cycle_period_secs: f64,
    pub transition_millis: u64,
    pub transition_easing: Easing,
    /// Display height used for zero, empty and invalid values.
    pub zero_height_floor: f64,
    pub stack_boundary: StackBoundary,
    pub base_scheme: HeatScheme,
    pub palette: Vec<String>,
    pub projection: Projection,
    pub event_capacity: usize,
}

impl Default for MapConfig {
    fn default() -> Self {
        let columns = ColumnSpec::default();
        Self {
            id_column: columns.id_column,
            name_column: columns.name_column,
            geometry_id_property: "LGA_ID".to_string(),
            extrude_height: 0.02,
            extrude_scale_step: 2.0,
            top_n: 10,
            cycle_period_secs: 4.0,
            transition_millis: 1000,
            transition_easing: Easing::default(),
            zero_height_floor: 0.1,
            stack_boundary: StackBoundary::default(),
            base_scheme: HeatScheme::Red,
            palette: VARIABLE_PALETTE.iter().map(|s| s.to_string()).collect(),
            projection: Projection::default(),
            event_capacity: 1024,
        }
    }
}

impl MapConfig {
    pub fn columns(&self) -> ColumnSpec {
        ColumnSpec {
            id_column: self.id_column.clone(),
            name_column: self.name_column.clone(),
        }
    }

    /// Palette colour for the variable at `index`, cycling. Falls back to a
    /// name hash when the palette is empty or the entry is malformed.
    pub fn palette_colour(&self, index: usize, name: &str) -> Rgb {
        if self.palette.is_empty() {
            return colour_from_name(name);
        }
        let hex = &self.palette[index % self.palette.len()];
        Rgb::from_hex(hex).unwrap_or_else(|| {
            log::warn!("config: bad palette colour '{}', hashing '{}' instead", hex, name);
            colour_from_name(name)
        })
    }
}

/// One entry of the variable catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub name: String,
    pub colour: Option<Rgb>,
    pub group: Option<String>,
}

/// Known variables with optional chart colour and menu group, in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableCatalog {
    entries: Vec<CatalogEntry>,
}

impl VariableCatalog {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn get(&self, name: &str) -> Option<&CatalogEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn colour_of(&self, name: &str) -> Option<Rgb> {
        self.get(name).and_then(|e| e.colour)
    }

    /// Group names in first-appearance order.
    pub fn groups(&self) -> Vec<&str> {
        let mut groups: Vec<&str> = Vec::new();
        for group in self.entries.iter().filter_map(|e| e.group.as_deref()) {
            if !groups.contains(&group) {
                groups.push(group);
            }
        }
        groups
    }

    pub fn group_members(&self, group: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.group.as_deref() == Some(group))
            .map(|e| e.name.as_str())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
