use std::collections::HashMap;

use crate::binding::{RegionBinding, StackBoundary};
use crate::components::RegionId;
use crate::geometry::{Footprint, GeometryFeature};
use crate::registry::DatasetRegistry;
use crate::surface::RenderSurface;

/// A region and its running total, as shown in the chart.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedRegion {
    pub region: RegionId,
    pub name: String,
    pub total: f64,
}

/// All region bindings of one dataset, drawn onto one surface.
pub struct ViewCollection<S: RenderSurface> {
    surface: S,
    bindings: Vec<RegionBinding>,
    index: HashMap<RegionId, usize>,
}

impl<S: RenderSurface> ViewCollection<S> {
    /// Build one binding per region id in `features`, in first-seen order.
    /// Ids missing from either side are logged and left out.
    pub fn build(
        mut surface: S,
        features: &[GeometryFeature],
        registry: &DatasetRegistry,
        boundary: StackBoundary,
    ) -> Self {
        let mut order: Vec<RegionId> = Vec::new();
        let mut grouped: HashMap<RegionId, Vec<Footprint>> = HashMap::new();
        for feature in features {
            grouped
                .entry(feature.region)
                .or_insert_with(|| {
                    order.push(feature.region);
                    Vec::new()
                })
                .push(feature.footprint.clone());
        }

        let mut bindings = Vec::with_capacity(order.len());
        let mut index = HashMap::with_capacity(order.len());
        for id in order {
            let Some(model) = registry.get(id) else {
                log::warn!("{}: geometry region {} has no data row", registry.name(), id);
                continue;
            };
            let footprints = grouped.remove(&id).unwrap_or_default();
            index.insert(id, bindings.len());
            bindings.push(RegionBinding::new(model, footprints, boundary, &mut surface));
        }

        for id in registry.ids().filter(|id| !index.contains_key(id)) {
            log::warn!("{}: data region {} has no geometry", registry.name(), id);
        }
        log::info!("{}: {} region views built", registry.name(), bindings.len());

        surface.request_render();
        Self {
            surface,
            bindings,
            index,
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn bindings(&self) -> &[RegionBinding] {
        &self.bindings
    }

    pub fn get(&self, id: RegionId) -> Option<&RegionBinding> {
        self.index.get(&id).map(|&i| &self.bindings[i])
    }

    pub fn find_by_name(&self, name: &str) -> Option<&RegionBinding> {
        self.bindings.iter().find(|b| b.name() == name)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Run `f` on one binding with the surface.
    pub fn with_binding<R>(
        &mut self,
        id: RegionId,
        f: impl FnOnce(&mut RegionBinding, &mut S) -> R,
    ) -> Option<R> {
        let &i = self.index.get(&id)?;
        Some(f(&mut self.bindings[i], &mut self.surface))
    }

    /// Run `f` on every binding, in build order.
    pub fn for_each_binding(&mut self, mut f: impl FnMut(&mut RegionBinding, &mut S)) {
        for binding in self.bindings.iter_mut() {
            f(binding, &mut self.surface);
        }
    }

    /// Add `variable` to each bound region's total and return the running
    /// maximum. `first_pass` zeroes each total first; call once per active
    /// variable with `first_pass` only on the first call.
    pub fn accumulate_totals(
        &self,
        registry: &mut DatasetRegistry,
        variable: &str,
        first_pass: bool,
        mut running_max: f64,
    ) -> f64 {
        for binding in &self.bindings {
            let Some(region) = registry.get_mut(binding.region()) else {
                continue;
            };
            if first_pass {
                region.set_total(0.0);
            }
            let value = region.value_of(variable);
            region.add_to_total(value);
            running_max = running_max.max(region.total());
        }
        running_max
    }

    /// Recompute every total from `variables` and return the largest.
    /// No variables leaves totals untouched and returns 0.
    pub fn max_running_total_across(&self, registry: &mut DatasetRegistry, variables: &[String]) -> f64 {
        variables
            .iter()
            .enumerate()
            .fold(0.0, |max, (i, variable)| {
                self.accumulate_totals(registry, variable, i == 0, max)
            })
    }

    /// All bound regions by total, largest first. Equal totals keep build
    /// order.
    pub fn ranked_totals(&self, registry: &DatasetRegistry) -> Vec<RankedRegion> {
        let mut ranked: Vec<RankedRegion> = self
            .bindings
            .iter()
            .map(|b| RankedRegion {
                region: b.region(),
                name: b.name().to_string(),
                total: registry.get(b.region()).map_or(0.0, |r| r.total()),
            })
            .collect();
        ranked.sort_by(|a, b| b.total.total_cmp(&a.total));
        ranked
    }

    pub fn top_n(&self, registry: &DatasetRegistry, n: usize) -> Vec<RankedRegion> {
        let mut ranked = self.ranked_totals(registry);
        ranked.truncate(n);
        ranked
    }

    /// Rescale every binding's extrusions.
    pub fn rescale(&mut self, factor: f64) {
        self.for_each_binding(|b, s| b.rescale(factor, s));
    }

    /// Remove every extrusion from every binding.
    pub fn clear_all(&mut self) {
        self.for_each_binding(|b, s| b.clear(s));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ColumnSpec, Row};
    use crate::surface::SceneGraph;

    fn registry(rows: &[(i64, &str, &str)]) -> DatasetRegistry {
        let mut reg = DatasetRegistry::new("test.csv", ColumnSpec::default());
        reg.load(rows.iter().map(|&(id, name, v)| {
            let id = id.to_string();
            Row::from_iter([("LGA_id", id.as_str()), ("LGA_name", name), ("v", v)])
        }));
        reg
    }

    fn feature(id: i64) -> GeometryFeature {
        GeometryFeature {
            region: RegionId(id),
            footprint: Footprint::default(),
        }
    }

    #[test]
    fn build_groups_features_and_skips_mismatches() {
        let reg = registry(&[(1, "A", "10"), (2, "B", "30"), (3, "C", "5")]);
        let features = [feature(2), feature(1), feature(2), feature(9)];
        let views = ViewCollection::build(SceneGraph::new(), &features, &reg, StackBoundary::Inclusive);
        assert_eq!(views.len(), 2);
        assert_eq!(views.bindings()[0].region(), RegionId(2));
        assert_eq!(views.get(RegionId(2)).unwrap().footprints().len(), 2);
        assert!(views.get(RegionId(3)).is_none());
        assert!(views.get(RegionId(9)).is_none());
        assert_eq!(views.surface().len(), 2);
    }

    #[test]
    fn ranked_totals_example() {
        let mut reg = registry(&[(1, "A", "10"), (2, "B", "30"), (3, "C", "5")]);
        let features = [feature(1), feature(2), feature(3)];
        let views = ViewCollection::build(SceneGraph::new(), &features, &reg, StackBoundary::Inclusive);
        let max = views.max_running_total_across(&mut reg, &["v".to_string()]);
        assert_eq!(max, 30.0);

        let names: Vec<(String, f64)> = views
            .ranked_totals(&reg)
            .into_iter()
            .map(|r| (r.name, r.total))
            .collect();
        assert_eq!(
            names,
            vec![("B".into(), 30.0), ("A".into(), 10.0), ("C".into(), 5.0)]
        );
        let top: Vec<String> = views.top_n(&reg, 2).into_iter().map(|r| r.name).collect();
        assert_eq!(top, vec!["B", "A"]);
        assert!(views.top_n(&reg, 0).is_empty());
        assert_eq!(views.top_n(&reg, 50).len(), 3);
    }

    #[test]
    fn ties_keep_build_order() {
        let mut reg = registry(&[(1, "A", "5"), (2, "B", "5"), (3, "C", "5")]);
        let features = [feature(3), feature(1), feature(2)];
        let views = ViewCollection::build(SceneGraph::new(), &features, &reg, StackBoundary::Inclusive);
        views.max_running_total_across(&mut reg, &["v".to_string()]);
        let ids: Vec<RegionId> = views.ranked_totals(&reg).into_iter().map(|r| r.region).collect();
        assert_eq!(ids, vec![RegionId(3), RegionId(1), RegionId(2)]);
    }

    #[test]
    fn first_pass_resets_totals() {
        let mut reg = registry(&[(1, "A", "4")]);
        let views = ViewCollection::build(SceneGraph::new(), &[feature(1)], &reg, StackBoundary::Inclusive);
        reg.get_mut(RegionId(1)).unwrap().set_total(100.0);
        let max = views.accumulate_totals(&mut reg, "v", true, 0.0);
        assert_eq!(max, 4.0);
        let max = views.accumulate_totals(&mut reg, "v", false, max);
        assert_eq!(max, 8.0);
        assert_eq!(reg.get(RegionId(1)).unwrap().total(), 8.0);
    }

    #[test]
    fn invalid_values_accumulate_as_zero() {
        let mut reg = registry(&[(1, "A", ""), (2, "B", "NaN")]);
        let views = ViewCollection::build(
            SceneGraph::new(),
            &[feature(1), feature(2)],
            &reg,
            StackBoundary::Inclusive,
        );
        let max = views.max_running_total_across(&mut reg, &["v".to_string()]);
        assert_eq!(max, 0.0);
        assert!(reg.regions().iter().all(|r| r.total() == 0.0));
    }
}
