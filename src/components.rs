use std::fmt;

use serde::{Deserialize, Serialize};

/// Region (LGA) identifier, taken from the dataset's id column and the
/// geometry's id property. Never use a raw integer where a RegionId is meant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegionId(pub i64);

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sequence number stamped on every map event. Never cast between Tick and
/// RegionId.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Tick(pub u64);

impl Tick {
    pub fn next(self) -> Self {
        Tick(self.0 + 1)
    }
}

/// Structured identity of a mesh on the rendering surface. The label string
/// carried next to it is for display only and is never parsed for identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MeshTag {
    /// Flat footprint of a region, coloured with the region fill.
    Base(RegionId),
    /// Extrusion of one variable stacked on a region.
    Data { region: RegionId, variable: String },
}

impl MeshTag {
    pub fn data(region: RegionId, variable: &str) -> Self {
        MeshTag::Data {
            region,
            variable: variable.to_string(),
        }
    }

    pub fn region(&self) -> RegionId {
        match self {
            MeshTag::Base(region) => *region,
            MeshTag::Data { region, .. } => *region,
        }
    }

    pub fn variable(&self) -> Option<&str> {
        match self {
            MeshTag::Base(_) => None,
            MeshTag::Data { variable, .. } => Some(variable),
        }
    }
}

/// Human-readable mesh label: `{region}: {variable} = {value}`.
pub fn mesh_label(region_name: &str, variable: &str, value: f64) -> String {
    format!("{region_name}: {variable} = {value}")
}

/// Recover `(region, variable)` from a label produced by [`mesh_label`].
/// Hosts use it to map a picked mesh's label back to a chart hover.
/// Splits on the first `:` and then on the last ` = `.
pub fn parse_mesh_label(label: &str) -> Option<(&str, &str)> {
    let (region, rest) = label.split_once(':')?;
    let variable = match rest.rsplit_once(" = ") {
        Some((variable, _)) => variable,
        None => rest,
    };
    Some((region.trim(), variable.trim()))
}
