use std::collections::HashMap;

use crate::colour::Rgb;
use crate::components::RegionId;
use crate::registry::DatasetRegistry;
use crate::views::RankedRegion;

/// One variable's slice of a bar.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub variable: String,
    pub y0: f64,
    pub y1: f64,
    pub colour: Rgb,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub region: RegionId,
    pub name: String,
    pub total: f64,
    pub segments: Vec<Segment>,
}

impl Bar {
    /// Total rounded to two decimals for the axis label.
    pub fn total_label(&self) -> String {
        format!("{:.2}", self.total)
    }
}

/// Stacked bar chart for the current dataset: one bar per highlighted
/// region, one segment per active variable in activation order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChartModel {
    pub bars: Vec<Bar>,
    pub y_domain: f64,
}

impl ChartModel {
    pub fn build(
        registry: &DatasetRegistry,
        highlighted: &[RankedRegion],
        active: &[String],
        colours: &HashMap<String, Rgb>,
        shared_domain: f64,
    ) -> Self {
        let mut bars = Vec::with_capacity(highlighted.len());
        for entry in highlighted {
            let Some(model) = registry.get(entry.region) else {
                continue;
            };
            let mut y = 0.0;
            let segments = active
                .iter()
                .map(|variable| {
                    let y0 = y;
                    y += model.value_of(variable);
                    Segment {
                        variable: variable.clone(),
                        y0,
                        y1: y,
                        colour: colours.get(variable).copied().unwrap_or(Rgb::BLACK),
                    }
                })
                .collect();
            bars.push(Bar {
                region: entry.region,
                name: entry.name.clone(),
                total: y,
                segments,
            });
        }
        let tallest = bars.iter().map(|b| b.total).fold(0.0, f64::max);
        Self {
            bars,
            y_domain: shared_domain.max(tallest),
        }
    }

    /// Bar under a pointer at `fraction` of the bar area's width.
    pub fn bar_at(&self, fraction: f64) -> Option<&Bar> {
        if self.bars.is_empty() || !(0.0..1.0).contains(&fraction) {
            return None;
        }
        let index = (fraction * self.bars.len() as f64).floor() as usize;
        self.bars.get(index)
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}
