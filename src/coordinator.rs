use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::{Duration, Instant};

use crate::chart::ChartModel;
use crate::colour::{Rgb, colour_from_name};
use crate::commands::{Command, CommandBindings, Trigger};
use crate::components::{RegionId, Tick};
use crate::config::{MapConfig, VariableCatalog};
use crate::events::{EventLog, MapEvent};
use crate::selector::{DataSelector, ExtrudeSettings};
use crate::surface::{MeshKey, MeshPose, RenderSurface};
use crate::transition::PoseAnimator;

/// A state-mutating request. Requests that arrive while a transition is
/// running wait in a FIFO queue and run, in order, once it completes.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingOp {
    AddVariable(String),
    RemoveVariable(String),
    AddGroup(String),
    RemoveGroup(String),
    SelectDataset(String),
    DeselectDataset(String),
    SwitchDataset { name: String, animated: bool },
    ToggleRegion(RegionId),
    SetTopN(usize),
    ScaleUp,
    ScaleDown,
}

struct DatasetState<S: RenderSurface> {
    selector: DataSelector<S>,
    /// Regions charted for this dataset; toggles adjust it, top-N resets it.
    highlight_count: usize,
}

/// Keeps every loaded dataset in step and shows one of them.
///
/// The first dataset added is the *initial* one: its surface is the one on
/// screen. Showing another dataset poses the initial surface's meshes as the
/// other dataset's meshes for the same (region, variable).
pub struct Coordinator<S: RenderSurface> {
    config: MapConfig,
    catalog: VariableCatalog,
    datasets: BTreeMap<String, DatasetState<S>>,
    initial: Option<String>,
    current: Option<String>,
    selected: Vec<String>,
    active: Vec<String>,
    colours: HashMap<String, Rgb>,
    extrude: f64,
    top_n: usize,
    max_y_domain: f64,
    transitions: PoseAnimator,
    pending: VecDeque<PendingOp>,
    cycle_elapsed: f64,
    paused: bool,
    hovered: Option<RegionId>,
    bindings: CommandBindings,
    events: EventLog,
    tick: Tick,
}

impl<S: RenderSurface> Coordinator<S> {
    pub fn new(config: MapConfig, catalog: VariableCatalog) -> Self {
        Self {
            extrude: config.extrude_height,
            top_n: config.top_n,
            events: EventLog::new(config.event_capacity),
            tick: Tick::default(),
            config,
            catalog,
            datasets: BTreeMap::new(),
            initial: None,
            current: None,
            selected: Vec::new(),
            active: Vec::new(),
            colours: HashMap::new(),
            max_y_domain: 0.0,
            transitions: PoseAnimator::new(),
            pending: VecDeque::new(),
            cycle_elapsed: 0.0,
            paused: false,
            hovered: None,
            bindings: CommandBindings::defaults(),
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn initial(&self) -> Option<&str> {
        self.initial.as_deref()
    }

    /// Selected datasets, sorted by name. Cycling walks this list.
    pub fn selected(&self) -> &[String] {
        &self.selected
    }

    /// Active variables in activation (stack) order.
    pub fn active_variables(&self) -> &[String] {
        &self.active
    }

    pub fn dataset_names(&self) -> impl Iterator<Item = &str> {
        self.datasets.keys().map(String::as_str)
    }

    pub fn dataset(&self, name: &str) -> Option<&DataSelector<S>> {
        self.datasets.get(name).map(|d| &d.selector)
    }

    pub fn highlight_count(&self, name: &str) -> Option<usize> {
        self.datasets.get(name).map(|d| d.highlight_count)
    }

    /// The surface on screen (the initial dataset's).
    pub fn display_surface(&self) -> Option<&S> {
        let name = self.initial.as_ref()?;
        self.datasets.get(name).map(|d| d.selector.surface())
    }

    pub fn variable_colour(&self, variable: &str) -> Option<Rgb> {
        self.colours.get(variable).copied()
    }

    pub fn extrude_height(&self) -> f64 {
        self.extrude
    }

    pub fn top_n(&self) -> usize {
        self.top_n
    }

    pub fn max_y_domain(&self) -> f64 {
        self.max_y_domain
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn hovered(&self) -> Option<RegionId> {
        self.hovered
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_animating(&self, now: Instant) -> bool {
        self.transitions.any_active(now)
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Chart for the current dataset.
    pub fn chart(&self) -> ChartModel {
        let Some(state) = self.current.as_ref().and_then(|c| self.datasets.get(c)) else {
            return ChartModel::default();
        };
        ChartModel::build(
            state.selector.registry(),
            state.selector.highlighted(),
            &self.active,
            &self.colours,
            self.max_y_domain,
        )
    }

    // -----------------------------------------------------------------------
    // Datasets
    // -----------------------------------------------------------------------

    /// Register a loaded dataset. The first becomes the initial, current and
    /// only selected dataset. Later ones catch up with the active variables.
    pub fn add_dataset(&mut self, mut selector: DataSelector<S>) -> bool {
        let name = selector.name().to_string();
        if self.datasets.contains_key(&name) {
            log::warn!("dataset {} already loaded", name);
            return false;
        }

        let settings = self.settings();
        for i in 0..self.active.len() {
            let variable = &self.active[i];
            let colour = self.colours.get(variable).copied().unwrap_or(Rgb::BLACK);
            selector.add_variable_to_all(variable, &self.active[..=i], colour, settings, self.top_n);
        }
        if !self.active.is_empty() {
            selector.highlight_top(&self.active, self.top_n);
        }

        self.datasets.insert(
            name.clone(),
            DatasetState {
                selector,
                highlight_count: self.top_n,
            },
        );
        if self.initial.is_none() {
            self.initial = Some(name.clone());
            self.current = Some(name.clone());
            self.selected.push(name.clone());
        }
        log::info!("dataset {} added ({} loaded)", name, self.datasets.len());
        true
    }

    // -----------------------------------------------------------------------
    // Requests
    // -----------------------------------------------------------------------

    /// Run `op` now, or queue it behind the running transition.
    pub fn submit(&mut self, op: PendingOp, now: Instant) {
        if self.transitions.any_active(now) {
            self.pending.push_back(op);
            let queued = self.pending.len();
            log::debug!("transition running, {} operation(s) queued", queued);
            self.record(|tick| MapEvent::OperationDeferred { queued, tick });
            return;
        }
        self.settle();
        self.apply(op, now);
    }

    pub fn add_variable(&mut self, variable: &str, now: Instant) {
        self.submit(PendingOp::AddVariable(variable.to_string()), now);
    }

    pub fn remove_variable(&mut self, variable: &str, now: Instant) {
        self.submit(PendingOp::RemoveVariable(variable.to_string()), now);
    }

    pub fn add_group(&mut self, group: &str, now: Instant) {
        self.submit(PendingOp::AddGroup(group.to_string()), now);
    }

    pub fn remove_group(&mut self, group: &str, now: Instant) {
        self.submit(PendingOp::RemoveGroup(group.to_string()), now);
    }

    pub fn select_dataset(&mut self, name: &str, now: Instant) {
        self.submit(PendingOp::SelectDataset(name.to_string()), now);
    }

    pub fn deselect_dataset(&mut self, name: &str, now: Instant) {
        self.submit(PendingOp::DeselectDataset(name.to_string()), now);
    }

    pub fn switch_dataset(&mut self, name: &str, animated: bool, now: Instant) {
        self.submit(
            PendingOp::SwitchDataset {
                name: name.to_string(),
                animated,
            },
            now,
        );
    }

    pub fn toggle_region(&mut self, region: RegionId, now: Instant) {
        self.submit(PendingOp::ToggleRegion(region), now);
    }

    pub fn set_top_n(&mut self, n: usize, now: Instant) {
        self.submit(PendingOp::SetTopN(n), now);
    }

    pub fn scale_up(&mut self, now: Instant) {
        self.submit(PendingOp::ScaleUp, now);
    }

    pub fn scale_down(&mut self, now: Instant) {
        self.submit(PendingOp::ScaleDown, now);
    }

    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
        self.cycle_elapsed = 0.0;
        let paused = self.paused;
        log::info!("cycling {}", if paused { "paused" } else { "resumed" });
        self.record(|tick| MapEvent::PauseToggled { paused, tick });
    }

    /// Key and button table used by [`Coordinator::handle`].
    pub fn bindings(&self) -> &CommandBindings {
        &self.bindings
    }

    pub fn bindings_mut(&mut self) -> &mut CommandBindings {
        &mut self.bindings
    }

    /// Run whatever command a host key press or button click is bound to.
    /// Returns false for unbound triggers.
    pub fn handle(&mut self, trigger: Trigger, now: Instant) -> bool {
        let Some(command) = self.bindings.lookup(trigger) else {
            log::debug!("{:?} is not bound", trigger);
            return false;
        };
        self.dispatch(command, now);
        true
    }

    pub fn dispatch(&mut self, command: Command, now: Instant) {
        match command {
            Command::ToggleHoveredRegion => match self.hovered {
                Some(region) => self.toggle_region(region, now),
                None => log::debug!("toggle requested with no hovered region"),
            },
            Command::ScaleUp => self.scale_up(now),
            Command::ScaleDown => self.scale_down(now),
            Command::TogglePause => self.toggle_pause(),
            Command::SetTopN(n) => self.set_top_n(n, now),
        }
    }

    /// Map hover. Restores the previously hovered region and highlights the
    /// new one; `None` just restores.
    pub fn mouseover_map(&mut self, region: Option<RegionId>, now: Instant) {
        if self.hovered == region {
            return;
        }
        let previous = std::mem::replace(&mut self.hovered, region);
        let Some(state) = self.current_state_mut() else {
            return;
        };
        if let Some(previous) = previous {
            state.selector.mouseover_region(previous, true);
        }
        if let Some(region) = region {
            state.selector.mouseover_region(region, false);
        }
        self.sync_unless_animating(now);
    }

    /// Chart hover over a region's bar.
    pub fn mouseover_graph(&mut self, region_name: &str, restore: bool, now: Instant) -> bool {
        let Some(state) = self.current_state_mut() else {
            return false;
        };
        let found = state.selector.mouseover_variable(region_name, restore);
        if found {
            self.sync_unless_animating(now);
        }
        found
    }

    /// Advance transitions and the dataset cycle timer. Call once per frame
    /// with the seconds since the last call.
    pub fn tick(&mut self, dt: f64, now: Instant) {
        if !self.transitions.is_empty() {
            if self.transitions.any_active(now) {
                let frame = self.transitions.sample_all(now);
                self.write_display(&frame);
                return;
            }
            self.settle();
            self.drain_pending(now);
        }

        if self.paused || self.selected.len() < 2 || self.active.is_empty() {
            return;
        }
        if self.transitions.any_active(now) {
            return;
        }
        self.cycle_elapsed += dt;
        if self.cycle_elapsed >= self.config.cycle_period_secs {
            self.cycle_elapsed = 0.0;
            if let Some(next) = self.next_selected() {
                log::debug!("cycling to {}", next);
                self.switch_impl(&next, true, now);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    fn apply(&mut self, op: PendingOp, now: Instant) {
        self.cycle_elapsed = 0.0;
        match op {
            PendingOp::AddVariable(v) => self.add_variable_impl(&v),
            PendingOp::RemoveVariable(v) => self.remove_variable_impl(&v),
            PendingOp::AddGroup(g) => {
                let members: Vec<String> = self
                    .catalog
                    .group_members(&g)
                    .into_iter()
                    .map(String::from)
                    .collect();
                if members.is_empty() {
                    log::warn!("variable group '{}' is empty or unknown", g);
                }
                for v in members {
                    self.add_variable_impl(&v);
                }
            }
            PendingOp::RemoveGroup(g) => {
                let members: Vec<String> = self
                    .catalog
                    .group_members(&g)
                    .into_iter()
                    .map(String::from)
                    .collect();
                for v in members {
                    self.remove_variable_impl(&v);
                }
            }
            PendingOp::SelectDataset(name) => self.select_impl(&name, now),
            PendingOp::DeselectDataset(name) => self.deselect_impl(&name, now),
            PendingOp::SwitchDataset { name, animated } => self.switch_impl(&name, animated, now),
            PendingOp::ToggleRegion(region) => self.toggle_region_impl(region),
            PendingOp::SetTopN(n) => self.set_top_n_impl(n),
            PendingOp::ScaleUp => self.scale_impl(true, now),
            PendingOp::ScaleDown => self.scale_impl(false, now),
        }
    }

    fn add_variable_impl(&mut self, variable: &str) {
        if self.active.iter().any(|v| v == variable) {
            log::debug!("'{}' is already active", variable);
            return;
        }
        let known = self
            .datasets
            .values()
            .any(|d| d.selector.variable_names().iter().any(|v| v == variable));
        if !known {
            log::warn!("no dataset has a variable named '{}'", variable);
            return;
        }

        let colour = self.colour_for(variable);
        self.active.push(variable.to_string());
        let settings = self.settings();
        for state in self.datasets.values_mut() {
            state.selector.add_variable_to_all(
                variable,
                &self.active,
                colour,
                settings,
                state.highlight_count,
            );
            state.selector.highlight_top(&self.active, state.highlight_count);
        }
        self.recompute_y_domain();
        self.sync_display();
        let variable = variable.to_string();
        self.record(|tick| MapEvent::VariableAdded { variable, tick });
    }

    fn remove_variable_impl(&mut self, variable: &str) {
        let Some(pos) = self.active.iter().position(|v| v == variable) else {
            log::debug!("'{}' is not active", variable);
            return;
        };
        self.active.remove(pos);
        for state in self.datasets.values_mut() {
            state
                .selector
                .remove_variable(variable, &self.active, state.highlight_count);
            state.selector.highlight_top(&self.active, state.highlight_count);
        }
        self.recompute_y_domain();
        self.sync_display();
        let variable = variable.to_string();
        self.record(|tick| MapEvent::VariableRemoved { variable, tick });
    }

    fn select_impl(&mut self, name: &str, now: Instant) {
        if !self.datasets.contains_key(name) {
            log::warn!("cannot select unknown dataset {}", name);
            return;
        }
        if self.selected.iter().any(|s| s == name) {
            log::debug!("dataset {} is already selected", name);
            return;
        }
        self.selected.push(name.to_string());
        self.selected.sort();
        self.reset_highlight_counts();
        self.recompute_y_domain();
        let dataset = name.to_string();
        self.record(|tick| MapEvent::DatasetSelected { dataset, tick });
        let animated = !self.active.is_empty();
        self.switch_impl(name, animated, now);
        self.sync_unless_animating(now);
    }

    fn deselect_impl(&mut self, name: &str, now: Instant) {
        let Some(pos) = self.selected.iter().position(|s| s == name) else {
            log::debug!("dataset {} is not selected", name);
            return;
        };
        if self.selected.len() == 1 {
            log::warn!("cannot deselect {}, it is the only selected dataset", name);
            return;
        }
        self.selected.remove(pos);
        self.reset_highlight_counts();
        self.recompute_y_domain();
        let dataset = name.to_string();
        self.record(|tick| MapEvent::DatasetDeselected { dataset, tick });
        if self.current.as_deref() == Some(name) {
            let first = self.selected[0].clone();
            let animated = !self.active.is_empty();
            self.switch_impl(&first, animated, now);
        }
        self.sync_unless_animating(now);
    }

    fn switch_impl(&mut self, name: &str, animated: bool, now: Instant) {
        if !self.datasets.contains_key(name) {
            log::warn!("cannot switch to unknown dataset {}", name);
            return;
        }
        if self.current.as_deref() == Some(name) {
            return;
        }
        self.restore_hover();
        let from = self.current.replace(name.to_string()).unwrap_or_default();
        if animated {
            let snapshot = self.snapshot_display();
            self.animate_display(&snapshot, now);
        } else {
            self.sync_display();
        }
        self.cycle_elapsed = 0.0;
        log::info!("showing dataset {} (was {})", name, from);
        let to = name.to_string();
        self.record(|tick| MapEvent::DatasetSwitched {
            from,
            to,
            animated,
            tick,
        });
    }

    fn toggle_region_impl(&mut self, region: RegionId) {
        let active = self.active.clone();
        let Some(state) = self.current_state_mut() else {
            return;
        };
        let Some(highlighted) = state.selector.toggle_region(&active, region) else {
            log::debug!("cannot toggle unknown region {}", region);
            return;
        };
        state.highlight_count = if highlighted {
            state.highlight_count + 1
        } else {
            state.highlight_count.saturating_sub(1)
        };
        self.sync_display();
        self.record(|tick| MapEvent::RegionToggled {
            region,
            highlighted,
            tick,
        });
    }

    fn set_top_n_impl(&mut self, n: usize) {
        self.top_n = n;
        self.reset_highlight_counts();
        self.sync_display();
        self.record(|tick| MapEvent::TopNChanged { n, tick });
    }

    fn scale_impl(&mut self, up: bool, now: Instant) {
        let step = self.config.extrude_scale_step;
        if !step.is_finite() || step <= 0.0 {
            log::warn!("extrude scale step {} is not usable", step);
            return;
        }
        let factor = if up { step } else { 1.0 / step };
        let snapshot = self.snapshot_display();
        self.extrude *= factor;
        for state in self.datasets.values_mut() {
            state.selector.rescale(factor);
        }
        self.animate_display(&snapshot, now);
        let multiplier = self.extrude;
        self.record(|tick| MapEvent::ExtrusionRescaled { multiplier, tick });
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn settings(&self) -> ExtrudeSettings {
        ExtrudeSettings {
            multiplier: self.extrude,
            base_unit: self.config.extrude_height,
            zero_floor: self.config.zero_height_floor,
        }
    }

    fn record(&mut self, make: impl FnOnce(Tick) -> MapEvent) {
        self.tick = self.tick.next();
        self.events.push(make(self.tick));
    }

    fn current_state_mut(&mut self) -> Option<&mut DatasetState<S>> {
        let name = self.current.as_ref()?;
        self.datasets.get_mut(name)
    }

    /// Catalog colour, else the palette entry at the variable's column
    /// position, else a hash of its name. Fixed once assigned.
    fn colour_for(&mut self, variable: &str) -> Rgb {
        if let Some(colour) = self.colours.get(variable) {
            return *colour;
        }
        let index = self
            .initial
            .as_ref()
            .and_then(|i| self.datasets.get(i))
            .and_then(|d| d.selector.variable_names().iter().position(|v| v == variable));
        let colour = self
            .catalog
            .colour_of(variable)
            .or_else(|| index.map(|i| self.config.palette_colour(i, variable)))
            .unwrap_or_else(|| colour_from_name(variable));
        self.colours.insert(variable.to_string(), colour);
        colour
    }

    fn reset_highlight_counts(&mut self) {
        for state in self.datasets.values_mut() {
            state.highlight_count = self.top_n;
            state.selector.highlight_top(&self.active, self.top_n);
        }
    }

    /// Largest running total over the selected datasets.
    fn recompute_y_domain(&mut self) {
        self.max_y_domain = self
            .selected
            .iter()
            .filter_map(|name| self.datasets.get(name))
            .map(|d| d.selector.current_max_total())
            .fold(0.0, f64::max);
    }

    fn next_selected(&self) -> Option<String> {
        if self.selected.is_empty() {
            return None;
        }
        let next = match self
            .current
            .as_ref()
            .and_then(|c| self.selected.iter().position(|s| s == c))
        {
            Some(pos) => (pos + 1) % self.selected.len(),
            None => 0,
        };
        Some(self.selected[next].clone())
    }

    fn restore_hover(&mut self) {
        let Some(region) = self.hovered else {
            return;
        };
        if let Some(state) = self.current_state_mut() {
            state.selector.mouseover_region(region, true);
        }
        self.hovered = None;
    }

    /// Poses the on-screen meshes should have for the current dataset.
    fn display_targets(&self) -> Vec<(MeshKey, MeshPose)> {
        let Some(initial) = self.initial.as_ref().and_then(|i| self.datasets.get(i)) else {
            return Vec::new();
        };
        let current = self
            .current
            .as_ref()
            .and_then(|c| self.datasets.get(c))
            .unwrap_or(initial);

        let mut targets = Vec::new();
        for binding in initial.selector.views().bindings() {
            let shown = current.selector.views().get(binding.region());
            let base = shown.map_or_else(|| binding.base_pose(), |b| b.base_pose());
            targets.push((binding.base_mesh(), base));
            for mesh in binding.display_meshes() {
                let pose = shown
                    .and_then(|b| b.pose_of(&mesh.variable))
                    .or_else(|| binding.pose_of(&mesh.variable));
                if let Some(pose) = pose {
                    targets.push((mesh.key, pose));
                }
            }
        }
        targets
    }

    fn snapshot_display(&self) -> HashMap<MeshKey, MeshPose> {
        let Some(surface) = self.display_surface() else {
            return HashMap::new();
        };
        self.display_targets()
            .into_iter()
            .filter_map(|(key, _)| surface.pose(key).map(|pose| (key, pose)))
            .collect()
    }

    fn write_display(&mut self, poses: &[(MeshKey, MeshPose)]) {
        let Some(initial) = self.initial.as_ref() else {
            return;
        };
        let Some(state) = self.datasets.get_mut(initial) else {
            return;
        };
        let surface = state.selector.surface_mut();
        for &(key, pose) in poses {
            surface.set_pose(key, pose);
        }
        surface.request_render();
    }

    fn sync_display(&mut self) {
        let targets = self.display_targets();
        self.write_display(&targets);
    }

    fn sync_unless_animating(&mut self, now: Instant) {
        if !self.transitions.any_active(now) {
            self.sync_display();
        }
    }

    /// Start tweens from `from` to the current targets, and put the screen at
    /// the starting poses.
    fn animate_display(&mut self, from: &HashMap<MeshKey, MeshPose>, now: Instant) {
        let duration = Duration::from_millis(self.config.transition_millis);
        let easing = self.config.transition_easing;
        let targets = self.display_targets();
        if duration.is_zero() {
            self.write_display(&targets);
            return;
        }
        let mut start = Vec::with_capacity(targets.len());
        for (key, to) in targets {
            let from_pose = from.get(&key).copied().unwrap_or(to);
            self.transitions.start(key, from_pose, to, duration, easing, now);
            start.push((key, from_pose));
        }
        self.write_display(&start);
    }

    /// Drop finished tweens and pin the screen to the current targets.
    fn settle(&mut self) {
        if self.transitions.is_empty() {
            return;
        }
        self.transitions.finish_all();
        self.sync_display();
    }

    fn drain_pending(&mut self, now: Instant) {
        while !self.transitions.any_active(now) {
            let Some(op) = self.pending.pop_front() else {
                break;
            };
            log::debug!("running queued {:?}", op);
            self.settle();
            self.apply(op, now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::StackBoundary;
    use crate::colour::HeatScheme;
    use crate::geometry::{Footprint, GeometryFeature};
    use crate::registry::{ColumnSpec, DatasetRegistry, Row};
    use crate::surface::SceneGraph;
    use crate::views::ViewCollection;

    fn dataset(name: &str, values: &[(i64, &str, f64, f64)]) -> DataSelector<SceneGraph> {
        let mut reg = DatasetRegistry::new(name, ColumnSpec::default());
        reg.load(values.iter().map(|&(id, region, x, y)| {
            let (id, x, y) = (id.to_string(), x.to_string(), y.to_string());
            Row::from_iter([
                ("LGA_id", id.as_str()),
                ("LGA_name", region),
                ("x", x.as_str()),
                ("y", y.as_str()),
            ])
        }));
        let features: Vec<GeometryFeature> = values
            .iter()
            .map(|&(id, ..)| GeometryFeature {
                region: RegionId(id),
                footprint: Footprint::default(),
            })
            .collect();
        let views = ViewCollection::build(SceneGraph::new(), &features, &reg, StackBoundary::Inclusive);
        DataSelector::new(reg, views, HeatScheme::Red)
    }

    fn coordinator() -> Coordinator<SceneGraph> {
        let config = MapConfig {
            top_n: 2,
            ..MapConfig::default()
        };
        let mut c = Coordinator::new(config, VariableCatalog::default());
        c.add_dataset(dataset("2001.csv", &[(1, "A", 1.0, 2.0), (2, "B", 3.0, 4.0), (3, "C", 5.0, 0.0)]));
        c.add_dataset(dataset("2011.csv", &[(1, "A", 10.0, 20.0), (2, "B", 30.0, 40.0), (3, "C", 50.0, 0.0)]));
        c
    }

    fn display_z(c: &Coordinator<SceneGraph>, region: i64, variable: &str) -> f64 {
        let surface = c.display_surface().unwrap();
        let key = surface
            .find_by_tag(&crate::components::MeshTag::data(RegionId(region), variable))
            .unwrap();
        surface.pose(key).unwrap().z_offset
    }

    #[test]
    fn first_dataset_is_initial_and_selected() {
        let c = coordinator();
        assert_eq!(c.initial(), Some("2001.csv"));
        assert_eq!(c.current(), Some("2001.csv"));
        assert_eq!(c.selected(), &["2001.csv".to_string()]);
        assert_eq!(c.dataset_names().count(), 2);
    }

    #[test]
    fn add_variable_applies_to_every_dataset() {
        let mut c = coordinator();
        let now = Instant::now();
        c.add_variable("x", now);
        assert_eq!(c.active_variables(), &["x".to_string()]);
        for name in ["2001.csv", "2011.csv"] {
            assert_eq!(c.dataset(name).unwrap().surface().data_mesh_count(), 3);
        }
        assert_eq!(c.max_y_domain(), 5.0);
        assert_eq!(c.variable_colour("x"), Rgb::from_hex("#bcbd22"));
        let chart = c.chart();
        assert_eq!(chart.bars.len(), 2);
        assert_eq!(chart.bars[0].name, "C");
    }

    #[test]
    fn unknown_variable_is_ignored() {
        let mut c = coordinator();
        c.add_variable("nope", Instant::now());
        assert!(c.active_variables().is_empty());
        assert!(c.events().is_empty());
    }

    #[test]
    fn immediate_switch_poses_display_as_target() {
        let mut c = coordinator();
        let now = Instant::now();
        c.add_variable("x", now);
        let before = display_z(&c, 2, "x");
        c.switch_dataset("2011.csv", false, now);
        assert_eq!(c.current(), Some("2011.csv"));
        let after = display_z(&c, 2, "x");
        assert!((after - 10.0 * before).abs() < 1e-9);
        c.switch_dataset("2001.csv", false, now);
        assert!((display_z(&c, 2, "x") - before).abs() < 1e-9);
    }

    #[test]
    fn operations_during_transition_are_queued_in_order() {
        let mut c = coordinator();
        let t0 = Instant::now();
        c.add_variable("x", t0);
        c.switch_dataset("2011.csv", true, t0);
        assert!(c.is_animating(t0));

        c.add_variable("y", t0);
        c.set_top_n(1, t0);
        assert_eq!(c.pending_len(), 2);
        assert_eq!(c.active_variables().len(), 1);

        let t1 = t0 + Duration::from_millis(500);
        c.tick(0.5, t1);
        assert_eq!(c.pending_len(), 2);

        let t2 = t0 + Duration::from_millis(1100);
        c.tick(0.6, t2);
        assert_eq!(c.pending_len(), 0);
        assert_eq!(c.active_variables(), &["x".to_string(), "y".to_string()]);
        assert_eq!(c.top_n(), 1);

        let kinds: Vec<&str> = c
            .events()
            .iter()
            .map(|e| match e {
                MapEvent::VariableAdded { .. } => "add",
                MapEvent::DatasetSwitched { .. } => "switch",
                MapEvent::OperationDeferred { .. } => "defer",
                MapEvent::TopNChanged { .. } => "top",
                _ => "other",
            })
            .collect();
        assert_eq!(kinds, vec!["add", "switch", "defer", "defer", "add", "top"]);
    }

    #[test]
    fn animated_switch_interpolates() {
        let mut c = coordinator();
        let t0 = Instant::now();
        c.add_variable("x", t0);
        let start = display_z(&c, 2, "x");
        c.switch_dataset("2011.csv", true, t0);
        assert!((display_z(&c, 2, "x") - start).abs() < 1e-9);
        c.tick(0.5, t0 + Duration::from_millis(500));
        let mid = display_z(&c, 2, "x");
        assert!(mid > start && mid < 10.0 * start);
        c.tick(0.6, t0 + Duration::from_millis(1100));
        assert!((display_z(&c, 2, "x") - 10.0 * start).abs() < 1e-9);
    }

    #[test]
    fn cycling_walks_selected_datasets() {
        let mut c = coordinator();
        let mut now = Instant::now();
        c.add_variable("x", now);
        c.select_dataset("2011.csv", now);
        assert_eq!(c.selected(), &["2001.csv".to_string(), "2011.csv".to_string()]);
        assert_eq!(c.current(), Some("2011.csv"));

        now += Duration::from_millis(1100);
        c.tick(1.1, now);
        assert!(!c.is_animating(now));
        for _ in 0..4 {
            now += Duration::from_secs(1);
            c.tick(1.0, now);
        }
        assert_eq!(c.current(), Some("2001.csv"));
    }

    #[test]
    fn paused_does_not_cycle() {
        let mut c = coordinator();
        let mut now = Instant::now();
        c.add_variable("x", now);
        c.select_dataset("2011.csv", now);
        now += Duration::from_millis(1100);
        c.tick(1.1, now);
        c.dispatch(Command::TogglePause, now);
        assert!(c.is_paused());
        for _ in 0..10 {
            now += Duration::from_secs(1);
            c.tick(1.0, now);
        }
        assert_eq!(c.current(), Some("2011.csv"));
    }

    #[test]
    fn last_selected_dataset_cannot_be_deselected() {
        let mut c = coordinator();
        c.deselect_dataset("2001.csv", Instant::now());
        assert_eq!(c.selected().len(), 1);
    }

    #[test]
    fn deselecting_current_switches_to_first() {
        let mut c = coordinator();
        let now = Instant::now();
        c.select_dataset("2011.csv", now);
        assert_eq!(c.current(), Some("2011.csv"));
        c.deselect_dataset("2011.csv", now);
        assert_eq!(c.current(), Some("2001.csv"));
        assert_eq!(c.selected(), &["2001.csv".to_string()]);
    }

    #[test]
    fn toggle_adjusts_current_dataset_count_only() {
        let mut c = coordinator();
        let now = Instant::now();
        c.add_variable("x", now);
        c.mouseover_map(Some(RegionId(1)), now);
        c.dispatch(Command::ToggleHoveredRegion, now);
        assert_eq!(c.highlight_count("2001.csv"), Some(3));
        assert_eq!(c.highlight_count("2011.csv"), Some(2));
        assert_eq!(c.chart().bars.len(), 3);

        c.dispatch(Command::SetTopN(0), now);
        assert_eq!(c.highlight_count("2001.csv"), Some(0));
        assert_eq!(c.highlight_count("2011.csv"), Some(0));
        assert!(c.chart().is_empty());
    }

    #[test]
    fn scale_up_and_down_round_trip() {
        let mut c = coordinator();
        let mut now = Instant::now();
        c.add_variable("x", now);
        let z = display_z(&c, 3, "x");
        c.dispatch(Command::ScaleUp, now);
        assert!((c.extrude_height() - 0.04).abs() < 1e-12);
        now += Duration::from_millis(1100);
        c.tick(1.1, now);
        assert!((display_z(&c, 3, "x") - 2.0 * z).abs() < 1e-9);

        c.dispatch(Command::ScaleDown, now);
        now += Duration::from_millis(1100);
        c.tick(1.1, now);
        assert!((display_z(&c, 3, "x") - z).abs() < 1e-9);
    }

    #[test]
    fn variables_added_after_scaling_are_stretched() {
        let mut c = coordinator();
        let mut now = Instant::now();
        c.add_variable("x", now);
        c.scale_up(now);
        now += Duration::from_millis(1100);
        c.tick(1.1, now);
        c.add_variable("y", now);
        // B: x=3 -> 0.06 base units, y=4 -> 0.08; stretched by 2.
        assert!((display_z(&c, 2, "y") - 2.0 * 0.14).abs() < 1e-9);
    }

    #[test]
    fn late_dataset_catches_up() {
        let mut c = coordinator();
        let now = Instant::now();
        c.add_variable("x", now);
        c.add_dataset(dataset("2021.csv", &[(1, "A", 7.0, 0.0)]));
        let late = c.dataset("2021.csv").unwrap();
        assert_eq!(late.surface().data_mesh_count(), 1);
        assert_eq!(late.registry().get(RegionId(1)).unwrap().total(), 7.0);
    }

    #[test]
    fn mouseover_map_restores_previous() {
        let mut c = coordinator();
        let now = Instant::now();
        c.add_variable("x", now);
        c.mouseover_map(Some(RegionId(1)), now);
        c.mouseover_map(Some(RegionId(2)), now);
        let views = c.dataset("2001.csv").unwrap().views();
        assert!(!views.get(RegionId(1)).unwrap().is_highlighted());
        assert!(views.get(RegionId(2)).unwrap().is_highlighted());
        c.mouseover_map(None, now);
        let views = c.dataset("2001.csv").unwrap().views();
        assert!(!views.get(RegionId(2)).unwrap().is_highlighted());
    }

    #[test]
    fn groups_add_all_members() {
        use crate::config::CatalogEntry;
        let catalog = VariableCatalog::new(vec![
            CatalogEntry {
                name: "x".into(),
                colour: Rgb::from_hex("#000001"),
                group: Some("G".into()),
            },
            CatalogEntry {
                name: "y".into(),
                colour: None,
                group: Some("G".into()),
            },
        ]);
        let mut c = Coordinator::new(MapConfig::default(), catalog);
        c.add_dataset(dataset("a.csv", &[(1, "A", 1.0, 1.0)]));
        let now = Instant::now();
        c.add_group("G", now);
        assert_eq!(c.active_variables(), &["x".to_string(), "y".to_string()]);
        assert_eq!(c.variable_colour("x"), Rgb::from_hex("#000001"));
        c.remove_group("G", now);
        assert!(c.active_variables().is_empty());
    }

    #[test]
    fn hover_survives_adding_a_variable() {
        let mut c = coordinator();
        let now = Instant::now();
        c.add_variable("x", now);
        c.mouseover_map(Some(RegionId(1)), now);
        c.add_variable("y", now);
        c.tick(0.0, now + Duration::from_millis(1100));

        let binding = c.dataset("2001.csv").unwrap().views().get(RegionId(1)).unwrap();
        let base = binding.base_mesh();
        assert!(binding.is_highlighted());
        let surface = c.display_surface().unwrap();
        assert_eq!(surface.pose(base).unwrap().front, crate::colour::MOUSEOVER_YELLOW);

        c.mouseover_map(None, now + Duration::from_millis(1200));
        let heat = c.dataset("2001.csv").unwrap().views().get(RegionId(1)).unwrap().fill();
        assert_ne!(heat, crate::colour::MOUSEOVER_YELLOW);
        assert_eq!(c.display_surface().unwrap().pose(base).unwrap().front, heat);
    }

    #[test]
    fn linear_easing_from_config_reaches_the_display() {
        let config = MapConfig {
            transition_easing: crate::transition::Easing::Linear,
            ..MapConfig::default()
        };
        let mut c = Coordinator::new(config, VariableCatalog::default());
        c.add_dataset(dataset("2001.csv", &[(1, "A", 1.0, 0.0)]));
        c.add_dataset(dataset("2011.csv", &[(1, "A", 3.0, 0.0)]));
        let t0 = Instant::now();
        c.add_variable("x", t0);
        c.switch_dataset("2011.csv", true, t0);
        c.tick(0.0, t0 + Duration::from_millis(250));
        // 0.02 -> 0.06, a quarter of the way.
        assert!((display_z(&c, 1, "x") - 0.03).abs() < 1e-6);
    }

    #[test]
    fn triggers_run_bound_commands() {
        use crate::commands::Button;
        let mut c = coordinator();
        let now = Instant::now();
        assert!(c.handle(Trigger::Key('p'), now));
        assert!(c.is_paused());
        assert!(!c.handle(Trigger::Key('z'), now));

        c.bindings_mut().bind(Trigger::Key('z'), Command::TogglePause);
        assert!(c.handle(Trigger::Key('Z'), now));
        assert!(!c.is_paused());

        c.add_variable("x", now);
        assert!(c.handle(Trigger::Button(Button::ScaleUp), now));
        assert!((c.extrude_height() - 0.04).abs() < 1e-12);
    }
}
