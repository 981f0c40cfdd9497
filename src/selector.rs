use crate::binding::ExtrusionRequest;
use crate::colour::{HeatScheme, Rgb};
use crate::components::RegionId;
use crate::registry::DatasetRegistry;
use crate::surface::RenderSurface;
use crate::views::{RankedRegion, ViewCollection};

/// Extrusion settings shared by every region of a bulk add.
#[derive(Debug, Clone, Copy)]
pub struct ExtrudeSettings {
    pub multiplier: f64,
    pub base_unit: f64,
    pub zero_floor: f64,
}

/// Drives bulk add/remove/recolour across one dataset's views and keeps the
/// highlighted (charted) regions.
pub struct DataSelector<S: RenderSurface> {
    registry: DatasetRegistry,
    views: ViewCollection<S>,
    highlighted: Vec<RankedRegion>,
    scheme: HeatScheme,
}

impl<S: RenderSurface> DataSelector<S> {
    pub fn new(registry: DatasetRegistry, views: ViewCollection<S>, scheme: HeatScheme) -> Self {
        Self {
            registry,
            views,
            highlighted: Vec::new(),
            scheme,
        }
    }

    pub fn name(&self) -> &str {
        self.registry.name()
    }

    pub fn registry(&self) -> &DatasetRegistry {
        &self.registry
    }

    pub fn views(&self) -> &ViewCollection<S> {
        &self.views
    }

    pub fn surface(&self) -> &S {
        self.views.surface()
    }

    pub fn surface_mut(&mut self) -> &mut S {
        self.views.surface_mut()
    }

    /// Selectable variables in header order.
    pub fn variable_names(&self) -> &[String] {
        self.registry.variable_names()
    }

    /// Regions currently shown in the chart, in chart order.
    pub fn highlighted(&self) -> &[RankedRegion] {
        &self.highlighted
    }

    pub fn is_highlighted(&self, id: RegionId) -> bool {
        self.highlighted.iter().any(|r| r.region == id)
    }

    fn max_total(&mut self, active: &[String]) -> f64 {
        self.views.max_running_total_across(&mut self.registry, active)
    }

    /// Largest running total, without recomputing.
    pub fn current_max_total(&self) -> f64 {
        self.registry
            .regions()
            .iter()
            .map(|r| r.total())
            .fold(0.0, f64::max)
    }

    /// Recompute totals over `active` (which includes `variable`), extrude
    /// `variable` on every region and return the top `n` regions.
    pub fn add_variable_to_all(
        &mut self,
        variable: &str,
        active: &[String],
        side: Rgb,
        settings: ExtrudeSettings,
        n: usize,
    ) -> Vec<RankedRegion> {
        let max_total = self.max_total(active);
        let top = self.views.top_n(&self.registry, n);

        let request = ExtrusionRequest {
            variable,
            max_total,
            side,
            multiplier: settings.multiplier,
            base_unit: settings.base_unit,
            scheme: self.scheme,
            zero_floor: settings.zero_floor,
        };
        let registry = &self.registry;
        self.views.for_each_binding(|binding, surface| {
            if let Some(model) = registry.get(binding.region()) {
                binding.add_variable_display(model, &request, surface);
            }
        });
        log::debug!("{}: added '{}' (max total {})", self.name(), variable, max_total);
        self.views.surface_mut().request_render();
        top
    }

    /// Subtract `variable` from every total, remove its extrusions, recolour
    /// against the totals of `remaining` and return the top `n` regions.
    pub fn remove_variable(&mut self, variable: &str, remaining: &[String], n: usize) -> Vec<RankedRegion> {
        for binding in self.views.bindings() {
            if let Some(region) = self.registry.get_mut(binding.region()) {
                let value = region.value_of(variable);
                region.add_to_total(-value);
            }
        }
        let max_total = self.max_total(remaining);
        let top = self.views.top_n(&self.registry, n);

        let registry = &self.registry;
        let scheme = self.scheme;
        self.views.for_each_binding(|binding, surface| {
            binding.remove_variable_display(variable, surface);
            if let Some(model) = registry.get(binding.region()) {
                binding.apply_heat(model, max_total, scheme, surface);
            }
        });
        log::debug!("{}: removed '{}' (max total {})", self.name(), variable, max_total);
        self.views.surface_mut().request_render();
        top
    }

    /// Recolour the regions in `regions` green (added) or red (removing).
    /// Others keep their colour.
    pub fn recolor_selected(&mut self, active: &[String], regions: &[RegionId], removing: bool) {
        let max_total = self.max_total(active);
        let registry = &self.registry;
        self.views.for_each_binding(|binding, surface| {
            if !regions.contains(&binding.region()) {
                return;
            }
            if let Some(model) = registry.get(binding.region()) {
                binding.apply_selected(model, max_total, removing, surface);
            }
        });
        self.views.surface_mut().request_render();
    }

    /// Recolour one region as added or removed.
    pub fn recolor_single(&mut self, active: &[String], region: RegionId, removing: bool) {
        let max_total = self.max_total(active);
        let registry = &self.registry;
        let found = self.views.with_binding(region, |binding, surface| {
            if let Some(model) = registry.get(region) {
                binding.apply_selected(model, max_total, removing, surface);
            }
        });
        if found.is_none() {
            log::debug!("{}: no view for region {}", self.name(), region);
        }
        self.views.surface_mut().request_render();
    }

    /// Heat-colour every region, then mark the top `n` as added. Replaces the
    /// highlighted set and returns it.
    pub fn highlight_top(&mut self, active: &[String], n: usize) -> Vec<RankedRegion> {
        let max_total = self.max_total(active);
        self.highlighted = self.views.top_n(&self.registry, n);

        let registry = &self.registry;
        let highlighted = &self.highlighted;
        let scheme = self.scheme;
        self.views.for_each_binding(|binding, surface| {
            let Some(model) = registry.get(binding.region()) else {
                return;
            };
            if highlighted.iter().any(|r| r.region == binding.region()) {
                binding.apply_selected(model, max_total, false, surface);
            } else {
                binding.apply_heat(model, max_total, scheme, surface);
            }
        });
        self.views.surface_mut().request_render();
        self.highlighted.clone()
    }

    /// Add a region to, or drop it from, the highlighted set. Returns whether
    /// it is highlighted afterwards, or None for an unknown region.
    pub fn toggle_region(&mut self, active: &[String], region: RegionId) -> Option<bool> {
        self.views.get(region)?;
        let now_highlighted = match self.highlighted.iter().position(|r| r.region == region) {
            Some(pos) => {
                self.highlighted.remove(pos);
                false
            }
            None => {
                let model = self.registry.get(region)?;
                self.highlighted.push(RankedRegion {
                    region,
                    name: model.name.clone(),
                    total: model.total(),
                });
                self.highlighted.sort_by(|a, b| b.total.total_cmp(&a.total));
                true
            }
        };
        self.recolor_single(active, region, !now_highlighted);
        Some(now_highlighted)
    }

    /// Mouseover from the chart, which knows regions by name.
    pub fn mouseover_variable(&mut self, region_name: &str, restore: bool) -> bool {
        let Some(id) = self.views.find_by_name(region_name).map(|b| b.region()) else {
            log::debug!("{}: no region named '{}'", self.name(), region_name);
            return false;
        };
        self.mouseover_region(id, restore)
    }

    /// Mouseover from the map. Unknown regions are ignored.
    pub fn mouseover_region(&mut self, region: RegionId, restore: bool) -> bool {
        let found = self
            .views
            .with_binding(region, |binding, surface| {
                binding.set_mouseover_highlight(!restore, surface)
            })
            .is_some();
        if found {
            self.views.surface_mut().request_render();
        }
        found
    }

    /// Ranked regions with their current totals, largest first.
    pub fn ranked_totals(&self) -> Vec<RankedRegion> {
        self.views.ranked_totals(&self.registry)
    }

    pub fn top_regions(&self, n: usize) -> Vec<RankedRegion> {
        self.views.top_n(&self.registry, n)
    }

    /// Region entry by name, for the chart.
    pub fn region_total(&self, name: &str) -> Option<RankedRegion> {
        let binding = self.views.find_by_name(name)?;
        let model = self.registry.get(binding.region())?;
        Some(RankedRegion {
            region: model.id,
            name: model.name.clone(),
            total: model.total(),
        })
    }

    /// Multiply every extrusion by `factor`.
    pub fn rescale(&mut self, factor: f64) {
        self.views.rescale(factor);
        self.views.surface_mut().request_render();
    }

    /// Remove every extrusion, zero every total and clear the highlighted
    /// set.
    pub fn clear_all(&mut self) {
        self.views.clear_all();
        for binding in self.views.bindings() {
            if let Some(region) = self.registry.get_mut(binding.region()) {
                region.set_total(0.0);
            }
        }
        self.highlighted.clear();
        self.views.surface_mut().request_render();
    }
}
