//! Vertex placement: clip clamping, snapping and the transform-aware path.
//!
//! These functions mirror `write_vertex`, `compute_snap_offset`,
//! `write_transform_vertex` and the fragment-side edge coverage in the
//! shared prelude. Positions flow from layer space, through the layer
//! transform into world space, then into device pixels and finally into the
//! render task's region of its target.

use lyon::math::{point, vector};

use crate::loader::Primitive;
use crate::records::{AlphaBatchTask, PackedLayer};
use crate::types::{transform_vec4, FrameUniforms, LayerTransform, Point, RectWithSize, Vector};

/// Distance, in device pixels, by which transformed edges are pushed out to
/// leave room for antialiasing.
pub const AA_EDGE_OFFSET: f32 = 2.0;

/// Where a vertex ended up.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct VertexInfo {
    /// Position in layer space.
    pub local_pos: Point,
    /// Position in device pixels, before snapping and task offset.
    pub screen_pos: Point,
    /// `gl_Position`.
    pub clip_pos: [f32; 4],
}

/// GLSL `clamp(p, rect.p0, rect.p0 + rect.size)`.
#[must_use]
pub fn clamp_rect(p: Point, rect: &RectWithSize) -> Point {
    let p1 = rect.p1();
    point(p.x.max(rect.p0.x).min(p1.x), p.y.max(rect.p0.y).min(p1.y))
}

/// Project a layer-space point to device pixels.
fn to_device(transform: &LayerTransform, p: Point, device_pixel_ratio: f32) -> Point {
    let [x, y, _, w] = transform_vec4(transform, [p.x, p.y, 0.0, 1.0]);
    point(x / w * device_pixel_ratio, y / w * device_pixel_ratio)
}

fn project(uniforms: &FrameUniforms, final_pos: Point, z: f32) -> [f32; 4] {
    transform_vec4(&uniforms.transform, [final_pos.x, final_pos.y, z, 1.0])
}

/// Sub-pixel offset that moves the snap rect's corners onto device pixels,
/// interpolated for `local_pos`.
///
/// The snap rect is grown to at least one device pixel so the
/// interpolation never divides by zero.
#[must_use]
pub fn compute_snap_offset(
    local_pos: Point,
    transform: &LayerTransform,
    snap_rect: &RectWithSize,
    device_pixel_ratio: f32,
) -> Vector {
    let min_size = 1.0 / device_pixel_ratio;
    let mut snap_rect = *snap_rect;
    snap_rect.size.width = snap_rect.size.width.max(min_size);
    snap_rect.size.height = snap_rect.size.height.max(min_size);

    let world_p0 = to_device(transform, snap_rect.p0, device_pixel_ratio);
    let world_p1 = to_device(transform, snap_rect.p1(), device_pixel_ratio);
    let offset = |v: f32| (v + 0.5).floor() - v;
    let offset_p0 = vector(offset(world_p0.x), offset(world_p0.y));
    let offset_p1 = vector(offset(world_p1.x), offset(world_p1.y));

    let t = vector(
        (local_pos.x - snap_rect.p0.x) / snap_rect.size.width,
        (local_pos.y - snap_rect.p0.y) / snap_rect.size.height,
    );
    vector(
        offset_p0.x + (offset_p1.x - offset_p0.x) * t.x,
        offset_p0.y + (offset_p1.y - offset_p0.y) * t.y,
    )
}

/// Place one corner of an axis-aligned primitive.
///
/// `unit_pos` is the `aPosition` corner of the unit quad. The local position
/// is clamped by the primitive clip, then by the layer clip, then
/// transformed, snapped and moved into the task's target region.
#[must_use]
#[expect(clippy::too_many_arguments)]
pub fn write_vertex(
    unit_pos: Point,
    instance_rect: &RectWithSize,
    local_clip_rect: &RectWithSize,
    z: f32,
    layer: &PackedLayer,
    task: &AlphaBatchTask,
    snap_rect: &RectWithSize,
    uniforms: &FrameUniforms,
) -> VertexInfo {
    let local_pos = point(
        instance_rect.p0.x + instance_rect.size.width * unit_pos.x,
        instance_rect.p0.y + instance_rect.size.height * unit_pos.y,
    );
    let clamped = clamp_rect(clamp_rect(local_pos, local_clip_rect), &layer.local_clip_rect);
    let snap = compute_snap_offset(
        clamped,
        &layer.transform,
        snap_rect,
        uniforms.device_pixel_ratio,
    );
    let device_pos = to_device(&layer.transform, clamped, uniforms.device_pixel_ratio);
    let final_pos = device_pos + snap - task.screen_space_origin.to_vector()
        + task.render_target_origin.to_vector();

    VertexInfo {
        local_pos: clamped,
        screen_pos: device_pos,
        clip_pos: project(uniforms, final_pos, z),
    }
}

/// [`write_vertex`] for a loaded primitive, snapping to its own rect.
#[must_use]
pub fn write_primitive_vertex(
    unit_pos: Point,
    prim: &Primitive,
    uniforms: &FrameUniforms,
) -> VertexInfo {
    write_vertex(
        unit_pos,
        &prim.local_rect,
        &prim.local_clip_rect,
        prim.z,
        &prim.layer,
        &prim.task,
        &prim.local_rect,
        uniforms,
    )
}

/// Intersection of the line through `p0, p1` with the line through
/// `p2, p3`.
#[must_use]
pub fn intersect_lines(p0: Point, p1: Point, p2: Point, p3: Point) -> Point {
    let d0 = p0 - p1;
    let d1 = p2 - p3;
    let s0 = p0.x * p1.y - p0.y * p1.x;
    let s1 = p2.x * p3.y - p2.y * p3.x;
    let d = d0.x * d1.y - d0.y * d1.x;
    let nx = s0 * d1.x - d0.x * s1;
    let ny = s0 * d1.y - d0.y * s1;
    point(nx / d, ny / d)
}

fn dot3(a: [f32; 3], b: [f32; 3]) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

/// Distance along `ray_dir` from `ray_origin` to the plane, if the ray
/// hits it in front of the origin.
fn ray_plane(
    normal: [f32; 3],
    plane_point: [f32; 3],
    ray_origin: [f32; 3],
    ray_dir: [f32; 3],
) -> Option<f32> {
    let denom = dot3(normal, ray_dir);
    if denom.abs() <= 1e-6 {
        return None;
    }
    let d = [
        plane_point[0] - ray_origin[0],
        plane_point[1] - ray_origin[1],
        plane_point[2] - ray_origin[2],
    ];
    let t = dot3(d, normal) / denom;
    (t >= 0.0).then_some(t)
}

/// Un-project a world-space point onto the layer plane and return it in
/// homogeneous layer coordinates.
#[must_use]
pub fn get_layer_pos(world_pos: Point, layer: &PackedLayer) -> [f32; 4] {
    let origin = transform_vec4(&layer.transform, [0.0, 0.0, 0.0, 1.0]);
    let plane_point = [origin[0] / origin[3], origin[1] / origin[3], origin[2] / origin[3]];
    // transpose(mat3(inv_transform)) * (0, 0, 1)
    let inv = layer.inv_transform.to_array();
    let normal = [inv[2], inv[6], inv[10]];

    let ray_origin = [world_pos.x, world_pos.y, -10_000.0];
    let ray_dir = [0.0, 0.0, 1.0];
    let t = ray_plane(normal, plane_point, ray_origin, ray_dir).unwrap_or(0.0);
    let z = ray_origin[2] + ray_dir[2] * t;
    transform_vec4(&layer.inv_transform, [world_pos.x, world_pos.y, z, 1.0])
}

/// The four corners of a rect in `aPosition` order, each with the corner
/// before and after it going around the rect.
fn corner_with_neighbours(rect: &RectWithSize, vertex_id: usize) -> (Point, Point, Point) {
    let p0 = rect.p0;
    let p3 = rect.p1();
    let p1 = point(p3.x, p0.y);
    let p2 = point(p0.x, p3.y);
    match vertex_id % 4 {
        0 => (p0, p1, p2),
        1 => (p1, p3, p0),
        2 => (p2, p0, p3),
        _ => (p3, p2, p1),
    }
}

fn normalize(v: Vector) -> Vector {
    let len = v.length();
    if len > 0.0 {
        v / len
    } else {
        v
    }
}

/// Result of the transform-aware vertex path.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TransformVertexInfo {
    /// Un-projected layer position, homogeneous.
    pub local_pos: [f32; 4],
    /// Device position after pushing the edges out.
    pub screen_pos: Point,
    /// Primitive rect after clipping, used for edge coverage.
    pub clipped_local_rect: RectWithSize,
    /// `gl_Position`.
    pub clip_pos: [f32; 4],
}

/// Place corner `vertex_id` (0..4, in unit-quad order) of a primitive whose
/// layer may have an arbitrary transform.
///
/// Both edges meeting at the corner are pushed outwards by
/// [`AA_EDGE_OFFSET`] device pixels and the corner moves to where the
/// pushed edges intersect. The layer position is recovered by casting a ray
/// onto the layer plane.
#[must_use]
pub fn write_transform_vertex(
    vertex_id: usize,
    local_rect: &RectWithSize,
    local_clip_rect: &RectWithSize,
    z: f32,
    layer: &PackedLayer,
    task: &AlphaBatchTask,
    uniforms: &FrameUniforms,
) -> TransformVertexInfo {
    let clip_p0 = clamp_rect(local_clip_rect.p0, &layer.local_clip_rect);
    let clip_p1 = clamp_rect(local_clip_rect.p1(), &layer.local_clip_rect);
    let clip = RectWithSize {
        p0: clip_p0,
        size: (clip_p1 - clip_p0).to_size(),
    };
    let lp0 = clamp_rect(local_rect.p0, &clip);
    let lp1 = clamp_rect(local_rect.p1(), &clip);
    let clipped_local_rect = RectWithSize {
        p0: lp0,
        size: (lp1 - lp0).to_size(),
    };

    let dpr = uniforms.device_pixel_ratio;
    let (cur_local, prev_local, next_local) =
        corner_with_neighbours(&clipped_local_rect, vertex_id);
    let cur = to_device(&layer.transform, cur_local, dpr);
    let prev = to_device(&layer.transform, prev_local, dpr);
    let next = to_device(&layer.transform, next_local, dpr);

    let dir_prev = normalize(cur - prev);
    let dir_next = normalize(cur - next);
    let norm_prev = vector(-dir_prev.y, dir_prev.x);
    let norm_next = vector(dir_next.y, -dir_next.x);

    let prev_offset = norm_prev * AA_EDGE_OFFSET;
    let next_offset = norm_next * AA_EDGE_OFFSET;
    let device_pos = intersect_lines(
        cur + prev_offset,
        prev + prev_offset,
        cur + next_offset,
        next + next_offset,
    );

    let local_pos = get_layer_pos(point(device_pos.x / dpr, device_pos.y / dpr), layer);
    let final_pos = device_pos - task.screen_space_origin.to_vector()
        + task.render_target_origin.to_vector();

    TransformVertexInfo {
        local_pos,
        screen_pos: device_pos,
        clipped_local_rect,
        clip_pos: project(uniforms, final_pos, z),
    }
}

/// Signed distance from `pos` to the rect `p0..p1`: negative inside.
#[must_use]
pub fn signed_distance_rect(pos: Point, p0: Point, p1: Point) -> f32 {
    let dx = (p0.x - pos.x).max(pos.x - p1.x);
    let dy = (p0.y - pos.y).max(pos.y - p1.y);
    let outside = vector(dx.max(0.0), dy.max(0.0)).length();
    let inside = dx.max(dy).min(0.0);
    outside + inside
}

fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Edge coverage for the transform fragment path.
///
/// `afwidth` is the screen-space derivative of the layer position
/// (`fwidth(local_pos)`), which only the fragment stage knows.
#[must_use]
pub fn transform_edge_alpha(local_pos: Point, local_rect: &RectWithSize, afwidth: f32) -> f32 {
    let d = signed_distance_rect(local_pos, local_rect.p0, local_rect.p1());
    1.0 - smoothstep(-afwidth, afwidth, d)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use lyon::math::size;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    fn task() -> AlphaBatchTask {
        AlphaBatchTask {
            screen_space_origin: point(0.0, 0.0),
            render_target_origin: point(0.0, 0.0),
            size: size(100.0, 100.0),
            render_target_layer_index: 0.0,
        }
    }

    #[test]
    fn snap_is_zero_for_aligned_rects() {
        let rect = RectWithSize::new(10.0, 20.0, 30.0, 40.0);
        let transform = LayerTransform::identity();
        for corner in [rect.p0, rect.p1(), point(25.0, 30.0)] {
            let snap = compute_snap_offset(corner, &transform, &rect, 1.0);
            assert_eq!(snap, vector(0.0, 0.0));
        }
    }

    #[test]
    fn snap_pulls_fractional_edges_to_pixels() {
        let rect = RectWithSize::new(10.25, 0.0, 20.0, 10.0);
        let snap = compute_snap_offset(rect.p0, &LayerTransform::identity(), &rect, 1.0);
        assert!(approx(snap.x, -0.25));
        let snap = compute_snap_offset(rect.p1(), &LayerTransform::identity(), &rect, 1.0);
        assert!(approx(snap.x, -0.25));
    }

    #[test]
    fn vertices_are_clamped_by_both_clips() {
        let layer = PackedLayer::identity(RectWithSize::new(0.0, 0.0, 50.0, 50.0));
        let uniforms = FrameUniforms::ortho(100.0, 100.0, 1.0);
        let rect = RectWithSize::new(10.0, 10.0, 80.0, 80.0);
        let clip = RectWithSize::new(0.0, 0.0, 60.0, 40.0);
        let vi = write_vertex(
            point(1.0, 1.0),
            &rect,
            &clip,
            0.0,
            &layer,
            &task(),
            &rect,
            &uniforms,
        );
        assert_eq!(vi.local_pos, point(50.0, 40.0));
        assert_eq!(vi.screen_pos, point(50.0, 40.0));
        // Centre of a 100x100 target lands at the origin of clip space.
        assert!(approx(vi.clip_pos[0], 0.0));
        assert!(approx(vi.clip_pos[1], 0.2));
    }

    #[test]
    fn task_offsets_move_into_the_target() {
        let layer = PackedLayer::identity(RectWithSize::new(0.0, 0.0, 1000.0, 1000.0));
        let uniforms = FrameUniforms::ortho(512.0, 512.0, 1.0);
        let rect = RectWithSize::new(100.0, 100.0, 10.0, 10.0);
        let task = AlphaBatchTask {
            screen_space_origin: point(100.0, 100.0),
            render_target_origin: point(0.0, 0.0),
            size: size(10.0, 10.0),
            render_target_layer_index: 0.0,
        };
        let vi = write_vertex(point(0.0, 0.0), &rect, &rect, 0.0, &layer, &task, &rect, &uniforms);
        // Device (100, 100) maps to target (0, 0), the top-left of clip space.
        assert!(approx(vi.clip_pos[0], -1.0));
        assert!(approx(vi.clip_pos[1], 1.0));
    }

    #[test]
    fn transform_vertices_grow_by_the_aa_margin() {
        let layer = PackedLayer::identity(RectWithSize::new(0.0, 0.0, 1000.0, 1000.0));
        let uniforms = FrameUniforms::ortho(1000.0, 1000.0, 1.0);
        let rect = RectWithSize::new(10.0, 10.0, 100.0, 50.0);
        let expected = [
            point(8.0, 8.0),
            point(112.0, 8.0),
            point(8.0, 62.0),
            point(112.0, 62.0),
        ];
        for (id, want) in expected.into_iter().enumerate() {
            let vi = write_transform_vertex(id, &rect, &rect, 0.0, &layer, &task(), &uniforms);
            assert!(approx(vi.screen_pos.x, want.x), "{id}: {:?}", vi.screen_pos);
            assert!(approx(vi.screen_pos.y, want.y), "{id}: {:?}", vi.screen_pos);
            // Identity layer: the recovered layer position is the device one.
            assert!(approx(vi.local_pos[0] / vi.local_pos[3], want.x));
            assert!(approx(vi.local_pos[1] / vi.local_pos[3], want.y));
        }
    }

    #[test]
    fn rotated_layer_corners_sit_outside_the_rect() {
        use lyon::geom::euclid::{default::Vector3D, Angle};

        let transform = LayerTransform::rotation(0.0, 0.0, 1.0, Angle::degrees(30.0))
            .then_translate(Vector3D::new(200.0, 150.0, 0.0));
        let layer =
            PackedLayer::new(transform, RectWithSize::new(-1000.0, -1000.0, 3000.0, 3000.0))
                .unwrap();
        let uniforms = FrameUniforms::ortho(1000.0, 1000.0, 1.0);
        let rect = RectWithSize::new(0.0, 0.0, 100.0, 100.0);
        let (lo, hi) = (-AA_EDGE_OFFSET, 100.0 + AA_EDGE_OFFSET);
        let expected = [point(lo, lo), point(hi, lo), point(lo, hi), point(hi, hi)];

        let close = |a: f32, b: f32| (a - b).abs() < 1e-3;
        for (id, want) in expected.into_iter().enumerate() {
            let vi = write_transform_vertex(id, &rect, &rect, 0.0, &layer, &task(), &uniforms);
            let local = point(vi.local_pos[0] / vi.local_pos[3], vi.local_pos[1] / vi.local_pos[3]);
            assert!(close(local.x, want.x) && close(local.y, want.y), "{id}: {local:?}");
            // A rigid transform keeps the margin the same size on screen.
            let device = to_device(&layer.transform, want, 1.0);
            assert!(close(vi.screen_pos.x, device.x), "{id}: {:?}", vi.screen_pos);
            assert!(close(vi.screen_pos.y, device.y), "{id}: {:?}", vi.screen_pos);
            assert_eq!(vi.clipped_local_rect, rect);
        }
    }

    #[test]
    fn layer_pos_inverts_a_scale() {
        let layer = PackedLayer::new(
            LayerTransform::scale(2.0, 2.0, 1.0),
            RectWithSize::new(0.0, 0.0, 100.0, 100.0),
        )
        .unwrap();
        let pos = get_layer_pos(point(20.0, 30.0), &layer);
        assert!(approx(pos[0] / pos[3], 10.0));
        assert!(approx(pos[1] / pos[3], 15.0));
    }

    #[test]
    fn edge_alpha_fades_across_the_boundary() {
        let rect = RectWithSize::new(0.0, 0.0, 10.0, 10.0);
        assert!(approx(transform_edge_alpha(point(5.0, 5.0), &rect, 0.5), 1.0));
        assert!(approx(transform_edge_alpha(point(10.0, 5.0), &rect, 0.5), 0.5));
        assert!(approx(transform_edge_alpha(point(12.0, 5.0), &rect, 0.5), 0.0));
        assert!(approx(signed_distance_rect(point(13.0, 14.0), rect.p0, rect.p1()), 5.0));
    }
}
