use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::colour::{HeatScheme, MOUSEOVER_YELLOW, NEUTRAL_GRAY, Rgb, region_identity_colour};
use crate::components::{MeshTag, RegionId, mesh_label};
use crate::geometry::Footprint;
use crate::registry::RegionModel;
use crate::surface::{MeshDescriptor, MeshKey, MeshPose, RenderSurface};

/// Which meshes move down when a mesh below them is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StackBoundary {
    /// Offsets strictly greater than the removed mesh's.
    Strict,
    /// Offsets greater than or equal to the removed mesh's.
    #[default]
    Inclusive,
}

impl StackBoundary {
    fn shifts(self, offset: f64, removed: f64) -> bool {
        match self {
            StackBoundary::Strict => offset.abs() > removed.abs(),
            StackBoundary::Inclusive => offset.abs() >= removed.abs(),
        }
    }
}

/// Parameters for one variable's extrusion on one region.
#[derive(Debug, Clone, Copy)]
pub struct ExtrusionRequest<'a> {
    pub variable: &'a str,
    /// Largest running total across regions, for heat normalization.
    pub max_total: f64,
    /// Side-face colour of the extrusion.
    pub side: Rgb,
    /// Current extrude height multiplier.
    pub multiplier: f64,
    /// Base extrude unit the multiplier started from.
    pub base_unit: f64,
    pub scheme: HeatScheme,
    /// Height used for zero, empty and invalid values.
    pub zero_floor: f64,
}

/// One variable's extrusion on a region.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayMesh {
    pub variable: String,
    pub key: MeshKey,
    /// Value shown in the label. Invalid and empty values report 0.
    pub value: f64,
    /// Value the height was derived from, floored for zero values.
    pub display_value: f64,
    /// Stack contribution in base units.
    pub height: f64,
    /// Cumulative stack position in base units, including this mesh.
    pub z_offset: f64,
    /// Ratio of the height multiplier to the base unit.
    pub stretch: f64,
    stretch_at_creation: f64,
}

impl DisplayMesh {
    /// Extruded depth on screen: value times the current multiplier.
    pub fn extrusion(&self) -> f64 {
        self.height * self.stretch
    }

    fn pose(&self, front: Rgb) -> MeshPose {
        MeshPose {
            z_offset: self.z_offset * self.stretch,
            z_scale: self.stretch / self.stretch_at_creation,
            front,
        }
    }
}

/// Heat colour of a region total against the largest total. A zero maximum
/// cannot be normalized and gives the region identity colour.
pub fn heat_colour(region: RegionId, total: f64, max_total: f64, scheme: HeatScheme) -> Rgb {
    if max_total == 0.0 {
        return region_identity_colour(region);
    }
    scheme.colour(total / max_total)
}

/// Colour for a region shown in the chart (green) or being dropped from it
/// (red). Regions marked as added never render pure white.
pub fn selection_colour(region: RegionId, total: f64, max_total: f64, removing: bool) -> Rgb {
    let scheme = if removing {
        HeatScheme::Red
    } else {
        HeatScheme::Green
    };
    let colour = heat_colour(region, total, max_total, scheme);
    if !removing && colour.is_white() {
        NEUTRAL_GRAY
    } else {
        colour
    }
}

/// A region's renderable state: its base footprint mesh, stacked variable
/// extrusions and the fill colour shared by the base mesh and every
/// extrusion's front face.
#[derive(Debug)]
pub struct RegionBinding {
    region: RegionId,
    name: String,
    footprints: Vec<Footprint>,
    base_mesh: MeshKey,
    fill: Rgb,
    mouseover_original: Option<Rgb>,
    meshes: SmallVec<[DisplayMesh; 4]>,
    stack_top: f64,
    boundary: StackBoundary,
}

impl RegionBinding {
    pub fn new<S: RenderSurface>(
        model: &RegionModel,
        footprints: Vec<Footprint>,
        boundary: StackBoundary,
        surface: &mut S,
    ) -> Self {
        let fill = region_identity_colour(model.id);
        let base_mesh = surface.add_mesh(
            MeshDescriptor {
                tag: MeshTag::Base(model.id),
                label: model.name.clone(),
                footprints: footprints.clone(),
                height: 0.0,
                side: fill,
                side_opacity: 1.0,
            },
            MeshPose::flat(fill),
        );
        Self {
            region: model.id,
            name: model.name.clone(),
            footprints,
            base_mesh,
            fill,
            mouseover_original: None,
            meshes: SmallVec::new(),
            stack_top: 0.0,
            boundary,
        }
    }

    pub fn region(&self) -> RegionId {
        self.region
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_mesh(&self) -> MeshKey {
        self.base_mesh
    }

    pub fn footprints(&self) -> &[Footprint] {
        &self.footprints
    }

    /// Fill colour as stored, ignoring any mouseover override.
    pub fn fill(&self) -> Rgb {
        self.mouseover_original.unwrap_or(self.fill)
    }

    /// Colour currently on screen.
    pub fn displayed_colour(&self) -> Rgb {
        self.fill
    }

    pub fn is_highlighted(&self) -> bool {
        self.mouseover_original.is_some()
    }

    pub fn stack_top(&self) -> f64 {
        self.stack_top
    }

    pub fn boundary(&self) -> StackBoundary {
        self.boundary
    }

    pub fn set_boundary(&mut self, boundary: StackBoundary) {
        self.boundary = boundary;
    }

    /// Extrusions in the order they were stacked.
    pub fn display_meshes(&self) -> &[DisplayMesh] {
        &self.meshes
    }

    pub fn mesh(&self, variable: &str) -> Option<&DisplayMesh> {
        self.meshes.iter().find(|m| m.variable == variable)
    }

    pub fn has_variable(&self, variable: &str) -> bool {
        self.mesh(variable).is_some()
    }

    /// Pose this binding wants for a variable's mesh.
    pub fn pose_of(&self, variable: &str) -> Option<MeshPose> {
        self.mesh(variable).map(|m| m.pose(self.fill))
    }

    pub fn base_pose(&self) -> MeshPose {
        MeshPose::flat(self.fill)
    }

    /// Stack a new extrusion for `request.variable` on top of the existing
    /// ones. Returns false without touching anything if the variable is
    /// already displayed.
    pub fn add_variable_display<S: RenderSurface>(
        &mut self,
        model: &RegionModel,
        request: &ExtrusionRequest<'_>,
        surface: &mut S,
    ) -> bool {
        if self.has_variable(request.variable) {
            log::warn!(
                "{}: '{}' is already displayed, not adding it again",
                self.name,
                request.variable
            );
            return false;
        }

        let cell = model.get_variable(request.variable);
        let zero_value = cell.is_none_or(|c| c.is_zero_value());
        let value = cell.map_or(0.0, |c| c.coerced());
        let display_value = if zero_value { request.zero_floor } else { value };

        let heat = heat_colour(self.region, model.total(), request.max_total, request.scheme);
        self.set_fill(heat, surface);

        let height = display_value * request.base_unit;
        let stretch = if request.base_unit == 0.0 {
            1.0
        } else {
            request.multiplier / request.base_unit
        };
        self.stack_top += height;

        let mesh = DisplayMesh {
            variable: request.variable.to_string(),
            key: MeshKey::default(),
            value,
            display_value,
            height,
            z_offset: self.stack_top,
            stretch,
            stretch_at_creation: stretch,
        };
        let key = surface.add_mesh(
            MeshDescriptor {
                tag: MeshTag::data(self.region, request.variable),
                label: mesh_label(&self.name, request.variable, value),
                footprints: self.footprints.clone(),
                height: height * stretch,
                side: request.side,
                side_opacity: 0.5,
            },
            mesh.pose(self.fill),
        );
        self.meshes.push(DisplayMesh { key, ..mesh });
        true
    }

    /// Remove a variable's extrusion and drop every mesh above it by the
    /// removed height. Returns false if the variable is not displayed.
    pub fn remove_variable_display<S: RenderSurface>(
        &mut self,
        variable: &str,
        surface: &mut S,
    ) -> bool {
        let Some(pos) = self.meshes.iter().position(|m| m.variable == variable) else {
            log::debug!("{}: '{}' is not displayed, nothing to remove", self.name, variable);
            return false;
        };
        let removed = self.meshes.remove(pos);
        surface.remove_mesh(removed.key);
        self.stack_top -= removed.height;

        for mesh in self.meshes.iter_mut() {
            if self.boundary.shifts(mesh.z_offset, removed.z_offset) {
                mesh.z_offset -= removed.height;
                surface.set_pose(mesh.key, mesh.pose(self.fill));
            }
        }
        true
    }

    /// Recolour to the heat colour of the current total.
    pub fn apply_heat<S: RenderSurface>(
        &mut self,
        model: &RegionModel,
        max_total: f64,
        scheme: HeatScheme,
        surface: &mut S,
    ) {
        self.set_fill(heat_colour(self.region, model.total(), max_total, scheme), surface);
    }

    /// Recolour as added to (green) or removed from (red) the chart.
    pub fn apply_selected<S: RenderSurface>(
        &mut self,
        model: &RegionModel,
        max_total: f64,
        removing: bool,
        surface: &mut S,
    ) {
        self.set_fill(
            selection_colour(self.region, model.total(), max_total, removing),
            surface,
        );
    }

    /// Temporarily show the mouseover colour. The true colour is captured on
    /// the first activation and restored exactly on deactivation.
    pub fn set_mouseover_highlight<S: RenderSurface>(&mut self, active: bool, surface: &mut S) {
        if active {
            if self.mouseover_original.is_none() {
                self.mouseover_original = Some(self.fill);
            }
            self.fill = MOUSEOVER_YELLOW;
        } else if let Some(original) = self.mouseover_original.take() {
            self.fill = original;
        }
        self.apply_fill(surface);
    }

    /// Multiply every extrusion's height and stack position by `factor`.
    pub fn rescale<S: RenderSurface>(&mut self, factor: f64, surface: &mut S) {
        for mesh in self.meshes.iter_mut() {
            mesh.stretch *= factor;
            surface.set_pose(mesh.key, mesh.pose(self.fill));
        }
    }

    /// Remove every extrusion and return to the identity colour.
    pub fn clear<S: RenderSurface>(&mut self, surface: &mut S) {
        for mesh in self.meshes.drain(..) {
            surface.remove_mesh(mesh.key);
        }
        self.stack_top = 0.0;
        self.mouseover_original = None;
        self.fill = region_identity_colour(self.region);
        self.apply_fill(surface);
    }

    // While a mouseover is showing, recolours land in the saved original so
    // the restore picks them up.
    fn set_fill<S: RenderSurface>(&mut self, colour: Rgb, surface: &mut S) {
        match self.mouseover_original.as_mut() {
            Some(original) => *original = colour,
            None => {
                self.fill = colour;
                self.apply_fill(surface);
            }
        }
    }

    fn apply_fill<S: RenderSurface>(&self, surface: &mut S) {
        surface.set_front_colour(self.base_mesh, self.fill);
        for mesh in &self.meshes {
            surface.set_front_colour(mesh.key, self.fill);
        }
    }
}
