use std::io::Read;
use std::path::Path;

use crate::colour::Rgb;
use crate::config::{CatalogEntry, MapConfig, VariableCatalog};
use crate::registry::{ColumnSpec, DatasetRegistry, Row};

/// Failures reading map inputs from disk.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("io {0}")]
    Io(#[from] std::io::Error),
    #[error("csv {0}")]
    Csv(#[from] csv::Error),
    #[error("geojson {0}")]
    GeoJson(#[from] geojson::Error),
    #[error("shapefile {0}")]
    Shapefile(#[from] shapefile::Error),
    #[error("ron {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("kdl {0}")]
    Kdl(#[from] kdl::KdlError),
    #[error("missing column '{0}'")]
    MissingColumn(String),
    #[error("geojson input is not a FeatureCollection")]
    NotAFeatureCollection,
}

/// Parse a KDL file and return the document. Logs a warning and returns None on failure.
fn parse_kdl_file(path: &str) -> Option<kdl::KdlDocument> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            log::warn!("failed to read {}: {}", path, e);
            return None;
        }
    };
    match content.parse::<kdl::KdlDocument>() {
        Ok(doc) => Some(doc),
        Err(e) => {
            log::warn!("failed to parse KDL {}: {}", path, e);
            None
        }
    }
}

/// Helper to get a string value from a child node's first argument.
fn child_str<'a>(children: &'a kdl::KdlDocument, key: &str) -> Option<&'a str> {
    children.get_arg(key)?.as_string()
}

/// Read header-driven CSV rows. Cells are kept as raw strings.
pub fn read_rows<R: Read>(reader: R) -> Result<(Vec<String>, Vec<Row>), LoadError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);
    let headers: Vec<String> = csv_reader.headers()?.iter().map(String::from).collect();

    let mut rows = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        rows.push(
            headers
                .iter()
                .zip(record.iter())
                .map(|(h, v)| (h.as_str(), v))
                .collect(),
        );
    }
    Ok((headers, rows))
}

/// Load a dataset from CSV text already in memory.
pub fn dataset_from_reader<R: Read>(
    name: &str,
    reader: R,
    columns: &ColumnSpec,
) -> Result<DatasetRegistry, LoadError> {
    let (headers, rows) = read_rows(reader)?;
    if !headers.iter().any(|h| *h == columns.id_column) {
        return Err(LoadError::MissingColumn(columns.id_column.clone()));
    }
    if !headers.iter().any(|h| *h == columns.name_column) {
        log::warn!(
            "{}: no '{}' column, region names will be empty",
            name,
            columns.name_column
        );
    }
    let mut registry = DatasetRegistry::new(name, columns.clone());
    registry.load(rows);
    Ok(registry)
}

/// Load a dataset CSV. The registry is named after the file name.
pub fn load_dataset_csv(path: &str, columns: &ColumnSpec) -> Result<DatasetRegistry, LoadError> {
    let name = Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path);
    let file = std::fs::File::open(path)?;
    dataset_from_reader(name, file, columns)
}

/// Load map config from a RON file, falling back to defaults.
pub fn load_map_config(path: &str) -> MapConfig {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            log::warn!("failed to read {}: {}, using default config", path, e);
            return MapConfig::default();
        }
    };
    match parse_map_config(&content) {
        Ok(config) => config,
        Err(e) => {
            log::warn!("failed to parse RON {}: {}, using default config", path, e);
            MapConfig::default()
        }
    }
}

pub fn parse_map_config(text: &str) -> Result<MapConfig, LoadError> {
    Ok(ron::from_str::<MapConfig>(text)?)
}

/// Load the variable catalog from a KDL file. Missing or broken files give
/// an empty catalog.
pub fn load_variable_catalog(path: &str) -> VariableCatalog {
    let Some(doc) = parse_kdl_file(path) else {
        return VariableCatalog::default();
    };
    catalog_from_document(&doc)
}

pub fn parse_variable_catalog(text: &str) -> Result<VariableCatalog, LoadError> {
    let doc = text.parse::<kdl::KdlDocument>()?;
    Ok(catalog_from_document(&doc))
}

fn catalog_from_document(doc: &kdl::KdlDocument) -> VariableCatalog {
    let mut entries = Vec::new();
    for node in doc.nodes() {
        if node.name().value() != "variable" {
            continue;
        }

        // First argument is the column name, e.g. variable "Mammal_count"
        let Some(name) = node.get(0).and_then(|v| v.as_string()) else {
            log::warn!("catalog: variable node without a name");
            continue;
        };

        let (colour, group) = match node.children() {
            Some(children) => {
                let colour = child_str(children, "colour").and_then(|hex| {
                    let parsed = Rgb::from_hex(hex);
                    if parsed.is_none() {
                        log::warn!("catalog: bad colour '{}' for {}", hex, name);
                    }
                    parsed
                });
                (colour, child_str(children, "group").map(String::from))
            }
            None => (None, None),
        };

        entries.push(CatalogEntry {
            name: name.to_string(),
            colour,
            group,
        });
    }
    log::info!("catalog: {} variables", entries.len());
    VariableCatalog::new(entries)
}
