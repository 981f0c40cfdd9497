//! Headless map driver.
//!
//! Usage: lgamap GEOMETRY DATASET.csv [DATASET.csv ...] [--config map.ron]
//!        [--catalog variables.kdl] [--var NAME ...] [--key KEY ...]
//!        [--cycle SECONDS]
//!
//! GEOMETRY is a GeoJSON FeatureCollection or an ESRI shapefile (.shp).
//! Loads every dataset into its own scene, activates the given variables,
//! selects all datasets, presses the given keys through the coordinator's
//! key table and runs the cycle for the given simulated time, printing the
//! chart for each dataset shown.

use std::time::{Duration, Instant};

use lgamap::commands::Trigger;
use lgamap::config::MapConfig;
use lgamap::coordinator::Coordinator;
use lgamap::geometry::{self, GeometryFeature};
use lgamap::loading::{self, LoadError};
use lgamap::selector::DataSelector;
use lgamap::surface::SceneGraph;
use lgamap::views::ViewCollection;

const FRAME: Duration = Duration::from_millis(50);

struct Args {
    geometry: String,
    datasets: Vec<String>,
    config: Option<String>,
    catalog: Option<String>,
    variables: Vec<String>,
    keys: Vec<char>,
    cycle_secs: f64,
}

fn parse_args() -> Option<Args> {
    let mut args = std::env::args().skip(1);
    let mut positional = Vec::new();
    let mut parsed = Args {
        geometry: String::new(),
        datasets: Vec::new(),
        config: None,
        catalog: None,
        variables: Vec::new(),
        keys: Vec::new(),
        cycle_secs: 0.0,
    };
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => parsed.config = Some(args.next()?),
            "--catalog" => parsed.catalog = Some(args.next()?),
            "--var" => parsed.variables.push(args.next()?),
            "--key" => parsed.keys.push(args.next()?.chars().next()?),
            "--cycle" => parsed.cycle_secs = args.next()?.parse().ok()?,
            _ => positional.push(arg),
        }
    }
    let mut positional = positional.into_iter();
    parsed.geometry = positional.next()?;
    parsed.datasets = positional.collect();
    if parsed.datasets.is_empty() {
        return None;
    }
    Some(parsed)
}

fn load_geometry(path: &str, config: &MapConfig) -> Result<Vec<GeometryFeature>, LoadError> {
    if path.to_ascii_lowercase().ends_with(".shp") {
        geometry::load_shapefile(path, &config.geometry_id_property, &config.projection)
    } else {
        geometry::load_geojson(path, &config.geometry_id_property, &config.projection)
    }
}

fn print_chart(coordinator: &Coordinator<SceneGraph>) {
    let chart = coordinator.chart();
    println!(
        "== {} (y domain {:.2}) ==",
        coordinator.current().unwrap_or("-"),
        chart.y_domain
    );
    for bar in &chart.bars {
        let parts: Vec<String> = bar
            .segments
            .iter()
            .map(|s| format!("{}={:.2}", s.variable, s.y1 - s.y0))
            .collect();
        println!("{:>30}  {:>10}  {}", bar.name, bar.total_label(), parts.join(" "));
    }
}

fn main() {
    env_logger::init();

    let Some(args) = parse_args() else {
        eprintln!(
            "usage: lgamap GEOMETRY DATASET.csv [DATASET.csv ...] [--config map.ron] \
             [--catalog variables.kdl] [--var NAME ...] [--key KEY ...] [--cycle SECONDS]"
        );
        std::process::exit(2);
    };

    let config = args
        .config
        .as_deref()
        .map(loading::load_map_config)
        .unwrap_or_default();
    let catalog = args
        .catalog
        .as_deref()
        .map(loading::load_variable_catalog)
        .unwrap_or_default();

    let features = match load_geometry(&args.geometry, &config) {
        Ok(f) => f,
        Err(e) => {
            log::error!("{}: {}", args.geometry, e);
            std::process::exit(1);
        }
    };
    log::info!("{} footprints from {}", features.len(), args.geometry);

    let start = Instant::now();
    let mut coordinator: Coordinator<SceneGraph> = Coordinator::new(config.clone(), catalog);
    for path in &args.datasets {
        let registry = match loading::load_dataset_csv(path, &config.columns()) {
            Ok(r) => r,
            Err(e) => {
                log::error!("{}: {}", path, e);
                continue;
            }
        };
        let views = ViewCollection::build(SceneGraph::new(), &features, &registry, config.stack_boundary);
        coordinator.add_dataset(DataSelector::new(registry, views, config.base_scheme));
    }
    let names: Vec<String> = coordinator.dataset_names().map(String::from).collect();
    if names.is_empty() {
        log::error!("no dataset could be loaded");
        std::process::exit(1);
    }

    let mut now = start;
    for variable in &args.variables {
        coordinator.add_variable(variable, now);
    }
    for name in &names {
        coordinator.select_dataset(name, now);
        // Selecting animates; let it settle before the next request.
        now += Duration::from_millis(config.transition_millis) + FRAME;
        coordinator.tick(0.0, now);
    }
    for &key in &args.keys {
        if !coordinator.handle(Trigger::Key(key), now) {
            log::warn!("key '{}' is not bound", key);
        }
        now += Duration::from_millis(config.transition_millis) + FRAME;
        coordinator.tick(0.0, now);
    }
    print_chart(&coordinator);

    let mut shown = coordinator.current().map(String::from);
    let mut elapsed = 0.0;
    while elapsed < args.cycle_secs {
        now += FRAME;
        elapsed += FRAME.as_secs_f64();
        coordinator.tick(FRAME.as_secs_f64(), now);
        let current = coordinator.current().map(String::from);
        if current != shown {
            print_chart(&coordinator);
            shown = current;
        }
    }

    if let Some(surface) = coordinator.display_surface() {
        log::info!(
            "{} meshes on screen, {} extrusions, {} render requests",
            surface.len(),
            surface.data_mesh_count(),
            surface.render_requests()
        );
    }
}
