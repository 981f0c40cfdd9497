use std::collections::HashMap;

use slotmap::{SlotMap, new_key_type};

use crate::colour::Rgb;
use crate::components::MeshTag;
use crate::geometry::Footprint;

new_key_type! {
    /// Handle to a mesh on a rendering surface. Stable across removals.
    pub struct MeshKey;
}

/// Everything needed to build a mesh. Geometry is fixed once added; only the
/// pose changes afterwards.
#[derive(Debug, Clone)]
pub struct MeshDescriptor {
    pub tag: MeshTag,
    /// Display label, e.g. `Alpine (S): owls = 4`.
    pub label: String,
    pub footprints: Vec<Footprint>,
    /// Extrusion depth before `z_scale` is applied. 0 for flat base meshes.
    pub height: f64,
    pub side: Rgb,
    pub side_opacity: f32,
}

/// Mutable placement and face colour of a mesh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshPose {
    pub z_offset: f64,
    pub z_scale: f64,
    pub front: Rgb,
}

impl MeshPose {
    pub fn flat(front: Rgb) -> Self {
        Self {
            z_offset: 0.0,
            z_scale: 1.0,
            front,
        }
    }

    pub fn lerp(&self, to: &MeshPose, t: f64) -> MeshPose {
        MeshPose {
            z_offset: self.z_offset + (to.z_offset - self.z_offset) * t,
            z_scale: self.z_scale + (to.z_scale - self.z_scale) * t,
            front: self.front.lerp(to.front, t as f32),
        }
    }
}

/// Rendering collaborator handed to every view-owning component. The core
/// signals `request_render` once per logical operation and never schedules
/// frames itself.
pub trait RenderSurface {
    fn add_mesh(&mut self, descriptor: MeshDescriptor, pose: MeshPose) -> MeshKey;
    fn remove_mesh(&mut self, key: MeshKey) -> bool;
    fn set_pose(&mut self, key: MeshKey, pose: MeshPose) -> bool;
    fn set_front_colour(&mut self, key: MeshKey, colour: Rgb) -> bool;
    fn pose(&self, key: MeshKey) -> Option<MeshPose>;
    fn find_by_tag(&self, tag: &MeshTag) -> Option<MeshKey>;
    fn request_render(&mut self);
}

/// Per-mesh data laid out for a GPU instance buffer.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MeshInstance {
    pub front: [f32; 4],
    pub side: [f32; 4],
    pub z_offset: f32,
    pub z_scale: f32,
    pub height: f32,
    pub _pad: f32,
}

struct SceneMesh {
    descriptor: MeshDescriptor,
    pose: MeshPose,
}

/// In-memory scene used headless and in tests. Hosts with a real renderer
/// read `instances()` after each render request.
#[derive(Default)]
pub struct SceneGraph {
    meshes: SlotMap<MeshKey, SceneMesh>,
    by_tag: HashMap<MeshTag, MeshKey>,
    render_requests: u64,
    dirty: bool,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    pub fn descriptor(&self, key: MeshKey) -> Option<&MeshDescriptor> {
        self.meshes.get(key).map(|m| &m.descriptor)
    }

    pub fn find_by_label(&self, label: &str) -> Option<MeshKey> {
        self.meshes
            .iter()
            .find(|(_, m)| m.descriptor.label == label)
            .map(|(k, _)| k)
    }

    /// Number of data (non-base) meshes currently in the scene.
    pub fn data_mesh_count(&self) -> usize {
        self.meshes
            .values()
            .filter(|m| matches!(m.descriptor.tag, MeshTag::Data { .. }))
            .count()
    }

    pub fn render_requests(&self) -> u64 {
        self.render_requests
    }

    /// Returns whether a render was requested since the last call.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub fn instances(&self) -> Vec<MeshInstance> {
        self.meshes
            .values()
            .map(|m| MeshInstance {
                front: m.pose.front.to_array(1.0),
                side: m.descriptor.side.to_array(m.descriptor.side_opacity),
                z_offset: m.pose.z_offset as f32,
                z_scale: m.pose.z_scale as f32,
                height: m.descriptor.height as f32,
                _pad: 0.0,
            })
            .collect()
    }

    pub fn instance_bytes(&self) -> Vec<u8> {
        bytemuck::cast_slice(&self.instances()).to_vec()
    }
}

impl RenderSurface for SceneGraph {
    fn add_mesh(&mut self, descriptor: MeshDescriptor, pose: MeshPose) -> MeshKey {
        let tag = descriptor.tag.clone();
        let key = self.meshes.insert(SceneMesh { descriptor, pose });
        if let Some(old) = self.by_tag.insert(tag, key) {
            log::warn!("scene: mesh tag reused, dropping previous mesh");
            self.meshes.remove(old);
        }
        key
    }

    fn remove_mesh(&mut self, key: MeshKey) -> bool {
        match self.meshes.remove(key) {
            Some(mesh) => {
                self.by_tag.remove(&mesh.descriptor.tag);
                true
            }
            None => false,
        }
    }

    fn set_pose(&mut self, key: MeshKey, pose: MeshPose) -> bool {
        match self.meshes.get_mut(key) {
            Some(mesh) => {
                mesh.pose = pose;
                true
            }
            None => false,
        }
    }

    fn set_front_colour(&mut self, key: MeshKey, colour: Rgb) -> bool {
        match self.meshes.get_mut(key) {
            Some(mesh) => {
                mesh.pose.front = colour;
                true
            }
            None => false,
        }
    }

    fn pose(&self, key: MeshKey) -> Option<MeshPose> {
        self.meshes.get(key).map(|m| m.pose)
    }

    fn find_by_tag(&self, tag: &MeshTag) -> Option<MeshKey> {
        self.by_tag.get(tag).copied()
    }

    fn request_render(&mut self) {
        self.render_requests += 1;
        self.dirty = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::RegionId;

    fn descriptor(tag: MeshTag) -> MeshDescriptor {
        MeshDescriptor {
            tag,
            label: "A: v = 1".into(),
            footprints: Vec::new(),
            height: 0.02,
            side: Rgb::BLACK,
            side_opacity: 0.5,
        }
    }

    #[test]
    fn add_find_remove() {
        let mut scene = SceneGraph::new();
        let tag = MeshTag::data(RegionId(1), "v");
        let key = scene.add_mesh(descriptor(tag.clone()), MeshPose::flat(Rgb::WHITE));
        assert_eq!(scene.find_by_tag(&tag), Some(key));
        assert_eq!(scene.find_by_label("A: v = 1"), Some(key));
        assert_eq!(scene.data_mesh_count(), 1);
        assert!(scene.remove_mesh(key));
        assert!(!scene.remove_mesh(key));
        assert!(scene.find_by_tag(&tag).is_none());
        assert!(scene.is_empty());
    }

    #[test]
    fn pose_updates_apply_only_to_live_meshes() {
        let mut scene = SceneGraph::new();
        let key = scene.add_mesh(
            descriptor(MeshTag::Base(RegionId(1))),
            MeshPose::flat(Rgb::WHITE),
        );
        assert!(scene.set_front_colour(key, Rgb::BLACK));
        assert_eq!(scene.pose(key).unwrap().front, Rgb::BLACK);
        scene.remove_mesh(key);
        assert!(!scene.set_pose(key, MeshPose::flat(Rgb::WHITE)));
        assert!(scene.pose(key).is_none());
    }

    #[test]
    fn render_requests_set_dirty_once() {
        let mut scene = SceneGraph::new();
        assert!(!scene.take_dirty());
        scene.request_render();
        assert_eq!(scene.render_requests(), 1);
        assert!(scene.take_dirty());
        assert!(!scene.take_dirty());
    }

    #[test]
    fn instance_buffer_matches_mesh_count() {
        let mut scene = SceneGraph::new();
        scene.add_mesh(
            descriptor(MeshTag::data(RegionId(1), "a")),
            MeshPose::flat(Rgb::WHITE),
        );
        scene.add_mesh(
            descriptor(MeshTag::data(RegionId(1), "b")),
            MeshPose::flat(Rgb::WHITE),
        );
        assert_eq!(scene.instances().len(), 2);
        assert_eq!(
            scene.instance_bytes().len(),
            2 * std::mem::size_of::<MeshInstance>()
        );
    }

    #[test]
    fn pose_lerp_midpoint() {
        let a = MeshPose::flat(Rgb::BLACK);
        let b = MeshPose {
            z_offset: 2.0,
            z_scale: 3.0,
            front: Rgb::WHITE,
        };
        let mid = a.lerp(&b, 0.5);
        assert!((mid.z_offset - 1.0).abs() < 1e-9);
        assert!((mid.z_scale - 2.0).abs() < 1e-9);
        assert!((mid.front.r - 0.5).abs() < 1e-6);
    }
}
