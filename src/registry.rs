use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::components::RegionId;

/// Raw cell from a dataset row. Values are kept as loaded; coercion of
/// invalid numbers to 0 happens where they are consumed.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Empty,
}

impl CellValue {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return CellValue::Empty;
        }
        match trimmed.parse::<f64>() {
            Ok(v) => CellValue::Number(v),
            Err(_) => CellValue::Text(raw.to_string()),
        }
    }

    /// The finite numeric value, if there is one.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(v) if v.is_finite() => Some(*v),
            _ => None,
        }
    }

    /// Numeric value with NaN, empty, text and infinities coerced to 0.
    pub fn coerced(&self) -> f64 {
        self.as_number().unwrap_or(0.0)
    }

    /// True when the value displays as a zero-height extrusion.
    pub fn is_zero_value(&self) -> bool {
        self.coerced() == 0.0
    }
}

/// One region's identity, loaded variables and running total of the active
/// variables.
#[derive(Debug, Clone)]
pub struct RegionModel {
    pub id: RegionId,
    pub name: String,
    variables: HashMap<String, CellValue>,
    total: f64,
}

impl RegionModel {
    pub fn new(id: RegionId, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            variables: HashMap::new(),
            total: 0.0,
        }
    }

    /// Insert a variable. A repeated name keeps the later value and returns
    /// the one it replaced.
    pub fn add_variable(&mut self, name: &str, value: CellValue) -> Option<CellValue> {
        let previous = self.variables.insert(name.to_string(), value);
        if previous.is_some() {
            log::warn!(
                "region {} ({}): variable '{}' set twice, keeping the later value",
                self.name,
                self.id,
                name
            );
        }
        previous
    }

    pub fn get_variable(&self, name: &str) -> Option<&CellValue> {
        self.variables.get(name)
    }

    /// Coerced value of a variable; absent variables count as 0.
    pub fn value_of(&self, name: &str) -> f64 {
        self.variables.get(name).map_or(0.0, CellValue::coerced)
    }

    pub fn variable_count(&self) -> usize {
        self.variables.len()
    }

    /// Non-finite deltas are dropped so the total can never become NaN.
    pub fn add_to_total(&mut self, delta: f64) {
        if !delta.is_finite() {
            log::trace!("region {}: ignoring non-finite delta {}", self.id, delta);
            return;
        }
        self.total += delta;
    }

    pub fn set_total(&mut self, value: f64) {
        self.total = if value.is_finite() { value } else { 0.0 };
    }

    pub fn total(&self) -> f64 {
        self.total
    }
}

/// An ordered tabular row, `(column, raw value)` in header order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row(pub Vec<(String, String)>);

impl Row {
    /// Value of a column; with duplicate headers the last one wins.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v.as_str())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Row(iter
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect())
    }
}

/// Names of the two reserved columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub id_column: String,
    pub name_column: String,
}

impl Default for ColumnSpec {
    fn default() -> Self {
        Self {
            id_column: "LGA_id".to_string(),
            name_column: "LGA_name".to_string(),
        }
    }
}

impl ColumnSpec {
    pub fn is_reserved(&self, column: &str) -> bool {
        column == self.id_column || column == self.name_column
    }
}

/// Parse an integer-like id cell ("20110", " 20110 ", "20110.0").
pub fn parse_region_id(raw: &str) -> Option<RegionId> {
    let trimmed = raw.trim();
    if let Ok(v) = trimmed.parse::<i64>() {
        return Some(RegionId(v));
    }
    let v = trimmed.parse::<f64>().ok()?;
    (v.is_finite() && v.fract() == 0.0).then_some(RegionId(v as i64))
}

/// All regions of one loaded dataset, indexed by id.
#[derive(Debug, Default)]
pub struct DatasetRegistry {
    name: String,
    columns: ColumnSpec,
    regions: Vec<RegionModel>,
    index: HashMap<RegionId, usize>,
    variable_names: Vec<String>,
    rows: Vec<Row>,
}

impl DatasetRegistry {
    pub fn new(name: &str, columns: ColumnSpec) -> Self {
        Self {
            name: name.to_string(),
            columns,
            ..Default::default()
        }
    }

    /// Build region models from rows. Rows without a usable id are skipped
    /// with a warning; a repeated id replaces the earlier region.
    pub fn load<I: IntoIterator<Item = Row>>(&mut self, rows: I) {
        let mut skipped = 0usize;
        for row in rows {
            let Some(id) = row.get(&self.columns.id_column).and_then(parse_region_id) else {
                log::warn!(
                    "{}: row without a valid '{}' value, skipping",
                    self.name,
                    self.columns.id_column
                );
                skipped += 1;
                continue;
            };
            let name = row.get(&self.columns.name_column).unwrap_or("").trim();

            let mut region = RegionModel::new(id, name);
            for (column, raw) in &row.0 {
                if self.columns.is_reserved(column) {
                    continue;
                }
                if !self.variable_names.iter().any(|v| v == column) {
                    self.variable_names.push(column.clone());
                }
                region.add_variable(column, CellValue::parse(raw));
            }

            match self.index.get(&id) {
                Some(&slot) => {
                    log::warn!("{}: region {} appears twice, keeping the later row", self.name, id);
                    self.regions[slot] = region;
                }
                None => {
                    self.index.insert(id, self.regions.len());
                    self.regions.push(region);
                }
            }
            self.rows.push(row);
        }
        log::info!(
            "{}: loaded {} regions, {} variables ({} rows skipped)",
            self.name,
            self.regions.len(),
            self.variable_names.len(),
            skipped
        );
    }

    /// Largest coerced value of `variable` across all regions, starting at 0.
    pub fn maximum_of(&self, variable: &str) -> f64 {
        self.regions
            .iter()
            .map(|r| r.value_of(variable))
            .fold(0.0, f64::max)
    }

    pub fn get(&self, id: RegionId) -> Option<&RegionModel> {
        self.index.get(&id).map(|&i| &self.regions[i])
    }

    pub fn get_mut(&mut self, id: RegionId) -> Option<&mut RegionModel> {
        self.index.get(&id).map(|&i| &mut self.regions[i])
    }

    pub fn contains(&self, id: RegionId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&RegionModel> {
        self.regions.iter().find(|r| r.name == name)
    }

    /// Regions in load order.
    pub fn regions(&self) -> &[RegionModel] {
        &self.regions
    }

    pub fn ids(&self) -> impl Iterator<Item = RegionId> + '_ {
        self.regions.iter().map(|r| r.id)
    }

    /// Selectable variables in header order.
    pub fn variable_names(&self) -> &[String] {
        &self.variable_names
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &ColumnSpec {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}
