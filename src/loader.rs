//! Instance decoding and the primitive load pipeline.
//!
//! Every vertex invocation decodes its [`PrimitiveInstance`] from the
//! per-instance attributes, then dereferences it in a fixed order: layer,
//! clip area, render task, primitive header. [`load_primitive`] is the CPU
//! twin of the shader's `load_primitive()`.

use bytemuck::{Pod, Zeroable};

use crate::allocator::GpuFrame;
use crate::fetch::{
    fetch_alpha_batch_task, fetch_clip_area, fetch_layer, fetch_prim_geometry, fetch_prim_header,
};
use crate::layout::{self, CLIP_TASK_SENTINEL};
use crate::records::{AlphaBatchTask, ClipArea, PackedLayer};
use crate::types::RectWithSize;

/// Instance attributes as uploaded: `aData0` and `aData1`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct InstanceAttributes {
    /// `aData0`.
    pub data0: [i32; 4],
    /// `aData1`.
    pub data1: [i32; 4],
}

/// Wide instance layout with a separate geometry table. Three `ivec4`s.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct LegacyInstanceAttributes {
    /// `{global_prim_id, prim_address, task_index, clip_task_index}`.
    pub data0: [i32; 4],
    /// `{layer_index, element_index, user_data0, user_data1}`.
    pub data1: [i32; 4],
    /// `{z, 0, 0, 0}`.
    pub data2: [i32; 4],
}

/// One draw instance.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PrimitiveInstance {
    /// Resource cache address of the primitive header.
    pub prim_address: i32,
    /// Render task the primitive is drawn into.
    pub render_task_index: i32,
    /// Clip mask task, or [`CLIP_TASK_SENTINEL`].
    pub clip_task_index: i32,
    /// Layer index.
    pub layer_index: i32,
    /// Depth.
    pub z: i32,
    /// Opaque per-shader data.
    pub user_data: [i32; 3],
    /// Geometry table index, only present in the legacy layout.
    pub global_prim_id: Option<i32>,
}

impl PrimitiveInstance {
    /// An unclipped instance with no user data.
    #[must_use]
    pub fn new(prim_address: i32, render_task_index: i32, layer_index: i32, z: i32) -> Self {
        Self {
            prim_address,
            render_task_index,
            clip_task_index: CLIP_TASK_SENTINEL,
            layer_index,
            z,
            user_data: [0; 3],
            global_prim_id: None,
        }
    }

    /// Decode the compact layout.
    #[must_use]
    pub fn from_attributes(attributes: &InstanceAttributes) -> Self {
        let [prim_address, render_task_index, clip_task_index, layer_index] = attributes.data0;
        let [z, user0, user1, user2] = attributes.data1;
        Self {
            prim_address,
            render_task_index,
            clip_task_index,
            layer_index,
            z,
            user_data: [user0, user1, user2],
            global_prim_id: None,
        }
    }

    /// Encode in the compact layout. `global_prim_id` is dropped.
    #[must_use]
    pub fn to_attributes(&self) -> InstanceAttributes {
        let [user0, user1, user2] = self.user_data;
        InstanceAttributes {
            data0: [
                self.prim_address,
                self.render_task_index,
                self.clip_task_index,
                self.layer_index,
            ],
            data1: [self.z, user0, user1, user2],
        }
    }

    /// Decode the legacy wide layout. `element_index` becomes
    /// `user_data[0]`.
    #[must_use]
    pub fn from_legacy(attributes: &LegacyInstanceAttributes) -> Self {
        let [global_prim_id, prim_address, render_task_index, clip_task_index] = attributes.data0;
        let [layer_index, element_index, user0, user1] = attributes.data1;
        Self {
            prim_address,
            render_task_index,
            clip_task_index,
            layer_index,
            z: attributes.data2[0],
            user_data: [element_index, user0, user1],
            global_prim_id: Some(global_prim_id),
        }
    }

    /// Attach a clip task.
    #[must_use]
    pub fn with_clip_task(mut self, clip_task_index: i32) -> Self {
        self.clip_task_index = clip_task_index;
        self
    }

    /// Attach user data.
    #[must_use]
    pub fn with_user_data(mut self, user_data: [i32; 3]) -> Self {
        self.user_data = user_data;
        self
    }
}

/// Everything a primitive shader starts from.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Primitive {
    /// Layer the primitive lives in.
    pub layer: PackedLayer,
    /// Clip mask area; all zeros when unclipped.
    pub clip_area: ClipArea,
    /// Target region.
    pub task: AlphaBatchTask,
    /// Bounds in layer space.
    pub local_rect: RectWithSize,
    /// Clip in layer space.
    pub local_clip_rect: RectWithSize,
    /// First quad of the type-specific payload.
    pub specific_prim_address: i32,
    /// Opaque per-shader data.
    pub user_data: [i32; 3],
    /// Depth.
    pub z: f32,
}

/// Dereference an instance against a frame's textures.
///
/// Compact instances read their geometry from the header at
/// `prim_address` and their payload right after it. Legacy instances read
/// geometry from the geometry table, and `prim_address` points straight at
/// the payload.
#[must_use]
#[expect(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap
)]
pub fn load_primitive(frame: &GpuFrame, instance: &PrimitiveInstance) -> Primitive {
    let layer = fetch_layer(&frame.layers, instance.layer_index);
    let clip_area = fetch_clip_area(&frame.render_tasks, instance.clip_task_index);
    let task = fetch_alpha_batch_task(&frame.render_tasks, instance.render_task_index);
    let geometry = match instance.global_prim_id {
        Some(id) => fetch_prim_geometry(&frame.prim_geometry, id),
        None => fetch_prim_header(&frame.resource_cache, instance.prim_address),
    };
    let specific_prim_address = match instance.global_prim_id {
        Some(_) => instance.prim_address,
        None => instance
            .prim_address
            .wrapping_add(layout::VECS_PER_PRIM_HEADER as i32),
    };

    Primitive {
        layer,
        clip_area,
        task,
        local_rect: geometry.local_rect,
        local_clip_rect: geometry.local_clip_rect,
        specific_prim_address,
        user_data: instance.user_data,
        z: instance.z as f32,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::allocator::GpuFrameBuilder;
    use crate::options::RendererOptions;
    use crate::records::{PrimitiveGeometry, RectanglePrimitive, RenderTaskData, TableGeometry};
    use crate::types::ColorF;
    use lyon::math::{point, size};

    #[test]
    fn compact_attributes_round_trip() {
        let instance = PrimitiveInstance::new(12, 3, 1, 40)
            .with_clip_task(2)
            .with_user_data([7, 8, 9]);
        let attributes = instance.to_attributes();
        assert_eq!(attributes.data0, [12, 3, 2, 1]);
        assert_eq!(attributes.data1, [40, 7, 8, 9]);
        assert_eq!(PrimitiveInstance::from_attributes(&attributes), instance);
        assert_eq!(std::mem::size_of::<InstanceAttributes>(), 32);
    }

    #[test]
    fn legacy_layout_moves_element_index_into_user_data() {
        let legacy = LegacyInstanceAttributes {
            data0: [5, 100, 1, CLIP_TASK_SENTINEL],
            data1: [2, 17, 3, 4],
            data2: [9, 0, 0, 0],
        };
        let instance = PrimitiveInstance::from_legacy(&legacy);
        assert_eq!(instance.global_prim_id, Some(5));
        assert_eq!(instance.prim_address, 100);
        assert_eq!(instance.layer_index, 2);
        assert_eq!(instance.user_data, [17, 3, 4]);
        assert_eq!(instance.z, 9);
    }

    #[test]
    fn load_follows_the_instance_indices() {
        let mut frame = GpuFrameBuilder::new(&RendererOptions::default());
        let clip = RectWithSize::new(0.0, 0.0, 200.0, 200.0);
        frame.layers.push(&PackedLayer::identity(clip)).unwrap();
        let task = frame
            .render_tasks
            .push(&RenderTaskData::alpha_batch(
                point(0.0, 0.0),
                size(200.0, 200.0),
                point(0.0, 0.0),
                0.0,
            ))
            .unwrap();
        let geometry = PrimitiveGeometry::unclipped(RectWithSize::new(10.0, 10.0, 20.0, 20.0));
        let address = frame
            .resource_cache
            .push_primitive(
                &geometry,
                &RectanglePrimitive {
                    color: ColorF::WHITE,
                },
            )
            .unwrap();
        let legacy_geometry = PrimitiveGeometry::unclipped(RectWithSize::new(1.0, 1.0, 2.0, 2.0));
        let id = frame.prim_geometry.push(&TableGeometry(legacy_geometry)).unwrap();
        let frame = frame.finish();

        let instance = PrimitiveInstance::new(address.as_int(), task.as_int(), 0, 5);
        let prim = load_primitive(&frame, &instance);
        assert_eq!(prim.local_rect, geometry.local_rect);
        assert_eq!(prim.specific_prim_address, address.specific().as_int());
        assert_eq!(prim.clip_area, ClipArea::NONE);
        assert_eq!(prim.task.size, size(200.0, 200.0));
        assert_eq!(prim.layer.local_clip_rect, clip);

        let legacy = PrimitiveInstance {
            global_prim_id: Some(id.as_int()),
            ..instance
        };
        assert_eq!(load_primitive(&frame, &legacy).local_rect, legacy_geometry.local_rect);
    }

    #[test]
    fn addresses_at_the_top_of_the_int_range_read_as_zero() {
        let frame = GpuFrameBuilder::new(&RendererOptions::default()).finish();
        let instance = PrimitiveInstance::new(i32::MAX - 1, i32::MAX, i32::MAX, 0);
        let prim = load_primitive(&frame, &instance);
        assert_eq!(
            prim.specific_prim_address,
            (i32::MAX - 1).wrapping_add(layout::VECS_PER_PRIM_HEADER as i32)
        );
        assert!(prim.specific_prim_address < 0);
        assert_eq!(prim.local_rect, RectWithSize::zero());
        assert_eq!(prim.task.size, size(0.0, 0.0));
    }
}
