//! Shader source generation and compilation helpers.
//!
//! The data-layout part of every shader (layout constants, addressing,
//! record structs and their fetch functions) is generated from
//! [`crate::layout`], once as GLSL and once as HLSL. The rest of the shared
//! prelude and the program bodies are hand-written GLSL 1.40 (OpenGL 3.1).
//!
//! A program is assembled as:
//!
//! | Part                 | Stage   |
//! |----------------------|---------|
//! | `#version`           | both    |
//! | feature `#define`s   | both    |
//! | stage `#define`      | both    |
//! | samplers, uniforms   | both    |
//! | generated layout     | both    |
//! | vertex prelude       | vertex  |
//! | fragment prelude     | fragment|
//! | program body         | both    |

use crate::error::{Error, Result};
use crate::features::ShaderFeatures;
use crate::layout::{
    self, FieldKind, RecordLayout, RecordSource, SamplerSlot, CLIP_TASK_SENTINEL, FETCH_WIDTHS,
    GRADIENT_ENTRIES, MAX_VERTEX_TEXTURE_WIDTH,
};
use crate::records::ExtendMode;

/// GLSL version line shared by every program.
pub const GLSL_VERSION: &str = "#version 140\n";

/// Vertex attributes and the locations they are bound to before linking.
pub const ATTRIBUTES: [(&str, u32); 3] = [("aPosition", 0), ("aData0", 1), ("aData1", 2)];

/// Every `VECS_PER_*` define with its value.
#[must_use]
pub fn vecs_defines() -> Vec<(&'static str, usize)> {
    let mut defines: Vec<(&'static str, usize)> = layout::ALL_RECORDS
        .iter()
        .map(|record| (record.vecs_define, record.vecs()))
        .collect();
    defines.push(("VECS_PER_GRADIENT_DATA", layout::VECS_PER_GRADIENT_DATA));
    defines
}

fn constant_defines() -> String {
    let mut out = format!("#define WR_MAX_VERTEX_TEXTURE_WIDTH {MAX_VERTEX_TEXTURE_WIDTH}\n");
    for (name, value) in vecs_defines() {
        out.push_str(&format!("#define {name} {value}\n"));
    }
    out.push_str(&format!("#define CLIP_TASK_SENTINEL {CLIP_TASK_SENTINEL}\n"));
    out.push_str(&format!("#define GRADIENT_ENTRIES {GRADIENT_ENTRIES}\n"));
    out.push_str(&format!(
        "#define EXTEND_MODE_CLAMP {}\n#define EXTEND_MODE_REPEAT {}\n",
        ExtendMode::Clamp as u32,
        ExtendMode::Repeat as u32
    ));
    out
}

fn record_sampler(record: &RecordLayout) -> &'static str {
    match record.source {
        RecordSource::Table(slot) => slot.name(),
        RecordSource::ResourceCache => SamplerSlot::ResourceCache.name(),
    }
}

/// Texel offsets of every quad of a record, with the member expression it
/// fills.
fn record_members(record: &RecordLayout) -> Vec<(usize, String)> {
    let mut members = Vec::with_capacity(record.vecs());
    let mut offset = 0;
    for field in record.fields {
        match field.kind {
            FieldKind::Vec4 => {
                members.push((offset, field.name.to_owned()));
                offset += 1;
            }
            FieldKind::Mat4 | FieldKind::Vec4Array(_) => {
                for i in 0..field.kind.quads() {
                    members.push((offset, format!("{}[{i}]", field.name)));
                    offset += 1;
                }
            }
        }
    }
    members
}

/// GLSL declaration and fetch function for one record.
#[must_use]
pub fn glsl_record(record: &RecordLayout) -> String {
    let mut out = format!("struct {} {{\n", record.name);
    for field in record.fields {
        let decl = match field.kind {
            FieldKind::Vec4 => format!("    vec4 {};\n", field.name),
            FieldKind::Mat4 => format!("    mat4 {};\n", field.name),
            FieldKind::Vec4Array(n) => format!("    vec4 {}[{n}];\n", field.name),
        };
        out.push_str(&decl);
    }
    out.push_str("};\n\n");

    let uv = match record.source {
        RecordSource::Table(_) => format!("get_fetch_uv(index, {})", record.vecs_define),
        RecordSource::ResourceCache => "get_resource_cache_uv(index)".to_owned(),
    };
    let sampler = record_sampler(record);
    out.push_str(&format!(
        "{name} {fetch}(int index) {{\n    ivec2 uv = {uv};\n    {name} result;\n",
        name = record.name,
        fetch = record.fetch_fn,
    ));
    for (offset, member) in record_members(record) {
        out.push_str(&format!(
            "    result.{member} = texelFetch({sampler}, uv + ivec2({offset}, 0), 0);\n"
        ));
    }
    out.push_str("    return result;\n}\n\n");
    out
}

/// HLSL declaration and fetch function for one record.
///
/// Matrices are loaded one GLSL column per `float4x4` row, so they must be
/// applied as `mul(v, m)`.
#[must_use]
pub fn hlsl_record(record: &RecordLayout) -> String {
    let mut out = format!("struct {} {{\n", record.name);
    for field in record.fields {
        let decl = match field.kind {
            FieldKind::Vec4 => format!("    float4 {};\n", field.name),
            FieldKind::Mat4 => format!("    float4x4 {};\n", field.name),
            FieldKind::Vec4Array(n) => format!("    float4 {}[{n}];\n", field.name),
        };
        out.push_str(&decl);
    }
    out.push_str("};\n\n");

    let uv = match record.source {
        RecordSource::Table(_) => format!("get_fetch_uv(index, {})", record.vecs_define),
        RecordSource::ResourceCache => "get_resource_cache_uv(index)".to_owned(),
    };
    let sampler = record_sampler(record);
    out.push_str(&format!(
        "{name} {fetch}(int index) {{\n    int2 uv = {uv};\n    {name} result;\n",
        name = record.name,
        fetch = record.fetch_fn,
    ));
    for (offset, member) in record_members(record) {
        out.push_str(&format!(
            "    result.{member} = {sampler}.Load(int3(uv + int2({offset}, 0), 0));\n"
        ));
    }
    out.push_str("    return result;\n}\n\n");
    out
}

/// Sampler declarations, in texture unit order.
#[must_use]
pub fn glsl_samplers() -> String {
    SamplerSlot::ALL
        .iter()
        .map(|slot| {
            let ty = if slot.is_array() {
                "sampler2DArray"
            } else {
                "sampler2D"
            };
            format!("uniform {ty} {};\n", slot.name())
        })
        .collect()
}

fn glsl_fixed_fetchers() -> String {
    let mut out = String::new();
    for width in FETCH_WIDTHS {
        if width == 1 {
            out.push_str(
                "vec4 fetch_from_resource_cache_1(int address) {\n    \
                 ivec2 uv = get_resource_cache_uv(address);\n    \
                 return texelFetch(sResourceCache, uv, 0);\n}\n\n",
            );
            continue;
        }
        let reads: Vec<String> = (0..width)
            .map(|i| format!("        texelFetch(sResourceCache, uv + ivec2({i}, 0), 0)"))
            .collect();
        out.push_str(&format!(
            "vec4[{width}] fetch_from_resource_cache_{width}(int address) {{\n    \
             ivec2 uv = get_resource_cache_uv(address);\n    \
             return vec4[{width}](\n{}\n    );\n}}\n\n",
            reads.join(",\n")
        ));
    }
    out
}

/// The generated GLSL data-layout prelude: constants, addressing, fixed
/// fetchers, and every record.
#[must_use]
pub fn glsl_layout_prelude() -> String {
    let mut out = constant_defines();
    out.push_str(
        r"
ivec2 get_fetch_uv(int index, int vecs_per_item) {
    int items_per_row = WR_MAX_VERTEX_TEXTURE_WIDTH / vecs_per_item;
    int u = vecs_per_item * (index % items_per_row);
    int v = index / items_per_row;
    return ivec2(u, v);
}

ivec2 get_resource_cache_uv(int address) {
    return ivec2(address % WR_MAX_VERTEX_TEXTURE_WIDTH,
                 address / WR_MAX_VERTEX_TEXTURE_WIDTH);
}

",
    );
    out.push_str(&glsl_fixed_fetchers());
    for record in layout::ALL_RECORDS {
        out.push_str(&glsl_record(record));
    }
    out
}

/// The generated HLSL data-layout prelude.
#[must_use]
pub fn hlsl_layout_prelude() -> String {
    let mut out = constant_defines();
    for slot in SamplerSlot::ALL.iter().filter(|slot| slot.is_data_texture()) {
        out.push_str(&format!(
            "Texture2D<float4> {} : register(t{});\n",
            slot.name(),
            slot.unit()
        ));
    }
    out.push_str(
        r"
int2 get_fetch_uv(int index, int vecs_per_item) {
    int items_per_row = WR_MAX_VERTEX_TEXTURE_WIDTH / vecs_per_item;
    int u = vecs_per_item * (index % items_per_row);
    int v = index / items_per_row;
    return int2(u, v);
}

int2 get_resource_cache_uv(int address) {
    return int2(address % WR_MAX_VERTEX_TEXTURE_WIDTH,
                address / WR_MAX_VERTEX_TEXTURE_WIDTH);
}

",
    );
    for record in layout::ALL_RECORDS {
        out.push_str(&hlsl_record(record));
    }
    out
}

/// Data-layout prelude for the target selected by `features`.
#[must_use]
pub fn layout_prelude(features: ShaderFeatures) -> String {
    if features.contains(ShaderFeatures::DX11) {
        hlsl_layout_prelude()
    } else {
        glsl_layout_prelude()
    }
}

/// Uniforms and the stage-dependent `varying` keyword.
const SHARED_HEADER: &str = r"
#ifdef WR_VERTEX_SHADER
#define varying out
#else
#define varying in
#endif

uniform mat4 uTransform;
uniform float uDevicePixelRatio;

#ifdef WR_FEATURE_CLIP
varying vec3 vClipMaskUv;
flat varying vec4 vClipMaskUvBounds;
#endif
";

/// Instance decoding, primitive loading and vertex placement.
const PRIM_SHARED_VS: &str = r"
in vec3 aPosition;
in ivec4 aData0;
in ivec4 aData1;

struct RectWithSize {
    vec2 p0;
    vec2 size;
};

RectWithSize to_rect(vec4 v) {
    return RectWithSize(v.xy, v.zw);
}

vec2 clamp_rect(vec2 p, RectWithSize rect) {
    return clamp(p, rect.p0, rect.p0 + rect.size);
}

struct AlphaBatchTask {
    vec2 screen_space_origin;
    vec2 render_target_origin;
    vec2 size;
    float render_target_layer_index;
};

AlphaBatchTask fetch_alpha_batch_task(int index) {
    RenderTaskData data = fetch_render_task(index);
    AlphaBatchTask task;
    task.render_target_origin = data.data0.xy;
    task.size = data.data0.zw;
    task.screen_space_origin = data.data1.xy;
    task.render_target_layer_index = data.data1.z;
    return task;
}

struct ClipArea {
    vec4 task_bounds;
    vec4 screen_origin_target_index;
    vec4 inner_rect;
};

ClipArea fetch_clip_area(int index) {
    ClipArea area;
    if (index == CLIP_TASK_SENTINEL) {
        area.task_bounds = vec4(0.0);
        area.screen_origin_target_index = vec4(0.0);
        area.inner_rect = vec4(0.0);
    } else {
        RenderTaskData data = fetch_render_task(index);
        area.task_bounds = data.data0;
        area.screen_origin_target_index = data.data1;
        area.inner_rect = data.data2;
    }
    return area;
}

struct PrimitiveInstance {
    int prim_address;
    int render_task_index;
    int clip_task_index;
    int layer_index;
    int z;
    int user_data0;
    int user_data1;
    int user_data2;
};

PrimitiveInstance fetch_prim_instance() {
    PrimitiveInstance pi;
    pi.prim_address = aData0.x;
    pi.render_task_index = aData0.y;
    pi.clip_task_index = aData0.z;
    pi.layer_index = aData0.w;
    pi.z = aData1.x;
    pi.user_data0 = aData1.y;
    pi.user_data1 = aData1.z;
    pi.user_data2 = aData1.w;
    return pi;
}

struct Primitive {
    Layer layer;
    ClipArea clip_area;
    AlphaBatchTask task;
    RectWithSize local_rect;
    RectWithSize local_clip_rect;
    int specific_prim_address;
    int user_data0;
    int user_data1;
    int user_data2;
    float z;
};

Primitive load_primitive() {
    PrimitiveInstance pi = fetch_prim_instance();
    Primitive prim;
    prim.layer = fetch_layer(pi.layer_index);
    prim.clip_area = fetch_clip_area(pi.clip_task_index);
    prim.task = fetch_alpha_batch_task(pi.render_task_index);
    PrimitiveHeader header = fetch_prim_header(pi.prim_address);
    prim.local_rect = to_rect(header.local_rect);
    prim.local_clip_rect = to_rect(header.local_clip_rect);
    prim.specific_prim_address = pi.prim_address + VECS_PER_PRIM_HEADER;
    prim.user_data0 = pi.user_data0;
    prim.user_data1 = pi.user_data1;
    prim.user_data2 = pi.user_data2;
    prim.z = float(pi.z);
    return prim;
}

struct VertexInfo {
    vec2 local_pos;
    vec2 screen_pos;
};

vec2 compute_snap_offset(vec2 local_pos, Layer layer, RectWithSize snap_rect) {
    snap_rect.size = max(snap_rect.size, vec2(1.0 / uDevicePixelRatio));
    vec4 world_snap_p0 = layer.transform * vec4(snap_rect.p0, 0.0, 1.0);
    vec4 world_snap_p1 = layer.transform * vec4(snap_rect.p0 + snap_rect.size, 0.0, 1.0);
    vec4 world_snap = uDevicePixelRatio * vec4(world_snap_p0.xy, world_snap_p1.xy) /
                      vec4(world_snap_p0.ww, world_snap_p1.ww);
    vec4 snap_offsets = floor(world_snap + 0.5) - world_snap;
    vec2 normalized_snap_pos = (local_pos - snap_rect.p0) / snap_rect.size;
    return mix(snap_offsets.xy, snap_offsets.zw, normalized_snap_pos);
}

VertexInfo write_vertex(RectWithSize instance_rect,
                        RectWithSize local_clip_rect,
                        float z,
                        Layer layer,
                        AlphaBatchTask task,
                        RectWithSize snap_rect) {
    vec2 local_pos = instance_rect.p0 + instance_rect.size * aPosition.xy;
    vec2 clamped_local_pos = clamp_rect(clamp_rect(local_pos, local_clip_rect),
                                        to_rect(layer.local_clip_rect));
    vec2 snap_offset = compute_snap_offset(clamped_local_pos, layer, snap_rect);
    vec4 world_pos = layer.transform * vec4(clamped_local_pos, 0.0, 1.0);
    vec2 device_pos = world_pos.xy / world_pos.w * uDevicePixelRatio;
    vec2 final_pos = device_pos + snap_offset -
                     task.screen_space_origin +
                     task.render_target_origin;
    gl_Position = uTransform * vec4(final_pos, z, 1.0);
    return VertexInfo(clamped_local_pos, device_pos);
}

vec2 intersect_lines(vec2 p0, vec2 p1, vec2 p2, vec2 p3) {
    vec2 d0 = p0 - p1;
    vec2 d1 = p2 - p3;
    float s0 = p0.x * p1.y - p0.y * p1.x;
    float s1 = p2.x * p3.y - p2.y * p3.x;
    float d = d0.x * d1.y - d0.y * d1.x;
    float nx = s0 * d1.x - d0.x * s1;
    float ny = s0 * d1.y - d0.y * s1;
    return vec2(nx / d, ny / d);
}

bool ray_plane(vec3 normal, vec3 point, vec3 ray_origin, vec3 ray_dir, out float t) {
    float denom = dot(normal, ray_dir);
    if (abs(denom) > 1e-6) {
        vec3 d = point - ray_origin;
        t = dot(d, normal) / denom;
        return t >= 0.0;
    }
    return false;
}

vec4 untransform(vec2 ref, vec3 n, vec3 a, mat4 inv_transform) {
    vec3 p = vec3(ref, -10000.0);
    vec3 d = vec3(0.0, 0.0, 1.0);
    float t = 0.0;
    ray_plane(n, a, p, d, t);
    float z = p.z + d.z * t;
    return inv_transform * vec4(ref, z, 1.0);
}

vec4 get_layer_pos(vec2 pos, Layer layer) {
    vec4 ah = layer.transform * vec4(0.0, 0.0, 0.0, 1.0);
    vec3 a = ah.xyz / ah.w;
    vec3 n = transpose(mat3(layer.inv_transform)) * vec3(0.0, 0.0, 1.0);
    return untransform(pos, n, a, layer.inv_transform);
}

struct TransformVertexInfo {
    vec4 local_pos;
    vec2 screen_pos;
    vec4 clipped_local_rect;
};

vec2 transform_to_device(Layer layer, vec2 p) {
    vec4 t = layer.transform * vec4(p, 0.0, 1.0);
    return t.xy / t.w * uDevicePixelRatio;
}

TransformVertexInfo write_transform_vertex(RectWithSize local_rect,
                                           RectWithSize local_clip_rect,
                                           float z,
                                           Layer layer,
                                           AlphaBatchTask task) {
    RectWithSize layer_clip = to_rect(layer.local_clip_rect);
    vec2 clip_p0 = clamp_rect(local_clip_rect.p0, layer_clip);
    vec2 clip_p1 = clamp_rect(local_clip_rect.p0 + local_clip_rect.size, layer_clip);
    vec2 lp0 = clamp(local_rect.p0, clip_p0, clip_p1);
    vec2 lp1 = clamp(local_rect.p0 + local_rect.size, clip_p0, clip_p1);

    vec2 p0 = lp0;
    vec2 p1 = vec2(lp1.x, lp0.y);
    vec2 p2 = vec2(lp0.x, lp1.y);
    vec2 p3 = lp1;

    vec2 cur_local;
    vec2 prev_local;
    vec2 next_local;
    switch (gl_VertexID) {
        case 0: cur_local = p0; prev_local = p1; next_local = p2; break;
        case 1: cur_local = p1; prev_local = p3; next_local = p0; break;
        case 2: cur_local = p2; prev_local = p0; next_local = p3; break;
        default: cur_local = p3; prev_local = p2; next_local = p1; break;
    }

    vec2 cur = transform_to_device(layer, cur_local);
    vec2 prev = transform_to_device(layer, prev_local);
    vec2 next = transform_to_device(layer, next_local);

    vec2 dir_prev = normalize(cur - prev);
    vec2 dir_next = normalize(cur - next);
    vec2 norm_prev = vec2(-dir_prev.y, dir_prev.x);
    vec2 norm_next = vec2(dir_next.y, -dir_next.x);

    vec2 prev_offset = norm_prev * 2.0;
    vec2 next_offset = norm_next * 2.0;
    vec2 device_pos = intersect_lines(cur + prev_offset, prev + prev_offset,
                                      cur + next_offset, next + next_offset);

    vec4 layer_pos = get_layer_pos(device_pos / uDevicePixelRatio, layer);
    vec2 final_pos = device_pos - task.screen_space_origin + task.render_target_origin;
    gl_Position = uTransform * vec4(final_pos, z, 1.0);

    return TransformVertexInfo(layer_pos, device_pos, vec4(lp0, lp1));
}

#ifdef WR_FEATURE_CLIP
void write_clip(vec2 global_pos, ClipArea area) {
    vec2 texture_size = vec2(textureSize(sCacheA8, 0).xy);
    vec2 uv = global_pos + area.task_bounds.xy - area.screen_origin_target_index.xy;
    vClipMaskUvBounds = area.task_bounds / texture_size.xyxy;
    vClipMaskUv = vec3(uv / texture_size, area.screen_origin_target_index.z);
}
#endif
";

/// Fragment-side helpers: clip, transform coverage, dither, gradients.
const PRIM_SHARED_FS: &str = r"
out vec4 oFragColor;

#ifdef WR_FEATURE_CLIP
float do_clip() {
    if (any(greaterThanEqual(vClipMaskUvBounds.xy, vClipMaskUvBounds.zw))) {
        return 1.0;
    }
    bvec4 inside = lessThanEqual(vec4(vClipMaskUvBounds.xy, vClipMaskUv.xy),
                                 vec4(vClipMaskUv.xy, vClipMaskUvBounds.zw));
    return all(inside) ? textureLod(sCacheA8, vClipMaskUv, 0.0).r : 0.0;
}
#endif

float signed_distance_rect(vec2 pos, vec2 p0, vec2 p1) {
    vec2 d = max(p0 - pos, pos - p1);
    return length(max(vec2(0.0), d)) + min(0.0, max(d.x, d.y));
}

float init_transform_fs(vec2 local_pos, vec4 local_bounds) {
    float d = signed_distance_rect(local_pos, local_bounds.xy, local_bounds.zw);
    float afwidth = 0.5 * length(fwidth(local_pos));
    return 1.0 - smoothstep(-afwidth, afwidth, d);
}

#ifdef WR_FEATURE_DITHERING
vec4 dither(vec4 color) {
    const int matrix_mask = 7;
    ivec2 pos = ivec2(gl_FragCoord.xy) & ivec2(matrix_mask);
    float noise_normalized = (texelFetch(sDither, pos, 0).r * 255.0 + 0.5) / 64.0;
    float noise = (noise_normalized - 0.5) / 256.0;
    return color + vec4(noise, noise, noise, 0.0);
}
#else
vec4 dither(vec4 color) {
    return color;
}
#endif

vec4 sample_gradient(int address, float offset, float gradient_repeat) {
    float x = mix(offset, fract(offset), gradient_repeat);
    x = 1.0 + x * float(GRADIENT_ENTRIES);
    int lut_offset = 2 * int(clamp(floor(x), 0.0, float(GRADIENT_ENTRIES + 1)));
    vec4 texels[2] = fetch_from_resource_cache_2(address + lut_offset);
    return dither(mix(texels[0], texels[1], fract(x)));
}
";

const RECTANGLE_SRC: &str = r"
flat varying vec4 vColor;
#ifdef WR_FEATURE_TRANSFORM
varying vec4 vLocalPos;
flat varying vec4 vLocalBounds;
#endif

#ifdef WR_VERTEX_SHADER
void main(void) {
    Primitive prim = load_primitive();
    Rectangle rect = fetch_rectangle(prim.specific_prim_address);
    vColor = rect.color;
#ifdef WR_FEATURE_TRANSFORM
    TransformVertexInfo vi = write_transform_vertex(prim.local_rect,
                                                    prim.local_clip_rect,
                                                    prim.z,
                                                    prim.layer,
                                                    prim.task);
    vLocalPos = vi.local_pos;
    vLocalBounds = vi.clipped_local_rect;
#else
    VertexInfo vi = write_vertex(prim.local_rect,
                                 prim.local_clip_rect,
                                 prim.z,
                                 prim.layer,
                                 prim.task,
                                 prim.local_rect);
#endif
#ifdef WR_FEATURE_CLIP
    write_clip(vi.screen_pos, prim.clip_area);
#endif
}
#endif

#ifdef WR_FRAGMENT_SHADER
void main(void) {
    float alpha = 1.0;
#ifdef WR_FEATURE_TRANSFORM
    alpha = init_transform_fs(vLocalPos.xy / vLocalPos.w, vLocalBounds);
#endif
#ifdef WR_FEATURE_CLIP
    alpha = min(alpha, do_clip());
#endif
    oFragColor = vColor * alpha;
}
#endif
";

const ANGLE_GRADIENT_SRC: &str = r"
flat varying int vGradientAddress;
flat varying float vGradientRepeat;
flat varying vec2 vScaledDir;
flat varying vec2 vStartPoint;
flat varying vec2 vTileSize;
flat varying vec2 vTileRepeat;
varying vec2 vPos;

#ifdef WR_VERTEX_SHADER
void main(void) {
    Primitive prim = load_primitive();
    Gradient gradient = fetch_gradient(prim.specific_prim_address);

    VertexInfo vi = write_vertex(prim.local_rect,
                                 prim.local_clip_rect,
                                 prim.z,
                                 prim.layer,
                                 prim.task,
                                 prim.local_rect);

    vPos = vi.local_pos - prim.local_rect.p0;

    vec2 start_point = gradient.start_end_point.xy;
    vec2 end_point = gradient.start_end_point.zw;
    vec2 dir = end_point - start_point;
    vStartPoint = start_point;
    vScaledDir = dir / dot(dir, dir);

    vTileSize = gradient.tile_size_repeat.xy;
    vTileRepeat = gradient.tile_size_repeat.zw;

    vGradientAddress = prim.specific_prim_address + VECS_PER_GRADIENT;
    vGradientRepeat = float(int(gradient.extend_mode.x) == EXTEND_MODE_REPEAT);

#ifdef WR_FEATURE_CLIP
    write_clip(vi.screen_pos, prim.clip_area);
#endif
}
#endif

#ifdef WR_FRAGMENT_SHADER
void main(void) {
    vec2 pos = mod(vPos, vTileRepeat);
    if (pos.x >= vTileSize.x || pos.y >= vTileSize.y) {
        discard;
    }
    float offset = dot(pos - vStartPoint, vScaledDir);
    vec4 color = sample_gradient(vGradientAddress, offset, vGradientRepeat);
#ifdef WR_FEATURE_CLIP
    color *= do_clip();
#endif
    oFragColor = color;
}
#endif
";

/// The primitive programs this crate ships.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ProgramKind {
    /// Solid rectangle, optionally transformed and clipped.
    Rectangle,
    /// Linear gradient along an arbitrary angle.
    AngleGradient,
}

impl ProgramKind {
    /// Every program.
    pub const ALL: [Self; 2] = [Self::Rectangle, Self::AngleGradient];

    /// Program name, as used in logs.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Rectangle => "ps_rectangle",
            Self::AngleGradient => "ps_angle_gradient",
        }
    }

    fn body(self) -> &'static str {
        match self {
            Self::Rectangle => RECTANGLE_SRC,
            Self::AngleGradient => ANGLE_GRADIENT_SRC,
        }
    }
}

/// Vertex and fragment source of one program variant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShaderSource {
    /// Vertex stage.
    pub vertex: String,
    /// Fragment stage.
    pub fragment: String,
}

impl ShaderSource {
    /// Assemble `program` with `features` compiled in.
    ///
    /// # Errors
    ///
    /// Fails for conflicting features, and for [`ShaderFeatures::DX11`],
    /// whose programs are not provided.
    pub fn build(program: ProgramKind, features: ShaderFeatures) -> Result<Self> {
        let features = features.validate()?;
        if features.contains(ShaderFeatures::DX11) {
            return Err(Error::Unsupported(
                "HLSL program bodies; use hlsl_layout_prelude for the data layout",
            ));
        }
        let stage = |define: &str, prelude: &str| {
            let mut out = String::from(GLSL_VERSION);
            out.push_str(&features.prefix());
            out.push_str(&format!("#define {define}\n"));
            out.push_str(&glsl_samplers());
            out.push_str(SHARED_HEADER);
            out.push_str(&glsl_layout_prelude());
            out.push_str(prelude);
            out.push_str(program.body());
            out
        };
        Ok(Self {
            vertex: stage("WR_VERTEX_SHADER", PRIM_SHARED_VS),
            fragment: stage("WR_FRAGMENT_SHADER", PRIM_SHARED_FS),
        })
    }
}

/// Compile a shader program from vertex and fragment source strings.
///
/// The compiled shader objects are detached and deleted after successful
/// linking, so only the program handle needs to be cleaned up by the caller.
///
/// # Safety
///
/// Requires a valid, current OpenGL context.
///
/// # Errors
///
/// Returns the driver log if a stage fails to compile or the program fails
/// to link.
#[cfg(feature = "glow")]
pub unsafe fn compile_program(
    gl: &glow::Context,
    source: &ShaderSource,
) -> Result<glow::Program> {
    use glow::HasContext;

    let program = unsafe { gl.create_program() }?;

    let vs = unsafe { compile_shader(gl, glow::VERTEX_SHADER, "vertex", &source.vertex) }?;
    let fs = unsafe { compile_shader(gl, glow::FRAGMENT_SHADER, "fragment", &source.fragment) }?;

    unsafe {
        gl.attach_shader(program, vs);
        gl.attach_shader(program, fs);
        for (name, location) in ATTRIBUTES {
            gl.bind_attrib_location(program, location, name);
        }
        gl.link_program(program);

        if !gl.get_program_link_status(program) {
            let log = gl.get_program_info_log(program);
            gl.delete_program(program);
            gl.delete_shader(vs);
            gl.delete_shader(fs);
            return Err(Error::ProgramLink(log));
        }

        gl.detach_shader(program, vs);
        gl.detach_shader(program, fs);
        gl.delete_shader(vs);
        gl.delete_shader(fs);
    }

    Ok(program)
}

/// Compile a single shader stage (vertex or fragment) from source.
///
/// # Safety
///
/// Requires a valid, current OpenGL context.
#[cfg(feature = "glow")]
unsafe fn compile_shader(
    gl: &glow::Context,
    shader_type: u32,
    stage: &'static str,
    source: &str,
) -> Result<glow::Shader> {
    use glow::HasContext;

    unsafe {
        let shader = gl.create_shader(shader_type)?;
        gl.shader_source(shader, source);
        gl.compile_shader(shader);

        let log = gl.get_shader_info_log(shader);
        if !gl.get_shader_compile_status(shader) {
            gl.delete_shader(shader);
            return Err(Error::ShaderCompile { stage, log });
        }
        if !log.trim().is_empty() {
            log::warn!("{stage} shader compiled with warnings: {log}");
        }

        Ok(shader)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn constants_match_the_packer() {
        let prelude = glsl_layout_prelude();
        assert!(prelude.contains("#define WR_MAX_VERTEX_TEXTURE_WIDTH 1024\n"));
        for record in layout::ALL_RECORDS {
            let define = format!("#define {} {}\n", record.vecs_define, record.vecs());
            assert!(prelude.contains(&define), "missing {define}");
        }
        assert!(prelude.contains("#define VECS_PER_LAYER 9\n"));
        assert!(prelude.contains("#define VECS_PER_BORDER 8\n"));
        assert!(prelude.contains("#define CLIP_TASK_SENTINEL 2147483647\n"));
        assert!(prelude.contains("#define GRADIENT_ENTRIES 128\n"));
    }

    #[test]
    fn every_record_gets_a_struct_and_fetcher() {
        let glsl = glsl_layout_prelude();
        let hlsl = hlsl_layout_prelude();
        for record in layout::ALL_RECORDS {
            let header = format!("{} {}(int index)", record.name, record.fetch_fn);
            assert!(glsl.contains(&header), "{header}");
            assert!(hlsl.contains(&header), "{header}");
        }
        for width in FETCH_WIDTHS {
            assert!(glsl.contains(&format!("fetch_from_resource_cache_{width}(int address)")));
        }
    }

    #[test]
    fn extended_layer_reads_thirteen_texels() {
        let prelude = glsl_layout_prelude();
        let define = "#define VECS_PER_LAYER_WITH_SCREEN_VERTICES 13\n";
        assert_eq!(prelude.matches(define).count(), 1);
        let layer = glsl_record(&layout::LAYER_WITH_SCREEN_VERTICES);
        assert!(layer.contains("get_fetch_uv(index, VECS_PER_LAYER_WITH_SCREEN_VERTICES)"));
        assert!(layer.contains("vec4 screen_vertices[4];"));
        assert!(layer
            .contains("result.screen_vertices[3] = texelFetch(sLayers, uv + ivec2(12, 0), 0);"));
    }

    #[test]
    fn layer_fetch_reads_nine_consecutive_texels() {
        let layer = glsl_record(&layout::LAYER);
        assert!(layer.contains("get_fetch_uv(index, VECS_PER_LAYER)"));
        for line in [
            "result.transform[0] = texelFetch(sLayers, uv + ivec2(0, 0), 0);",
            "result.inv_transform[3] = texelFetch(sLayers, uv + ivec2(7, 0), 0);",
            "result.local_clip_rect = texelFetch(sLayers, uv + ivec2(8, 0), 0);",
        ] {
            assert!(layer.contains(line), "missing {line}");
        }

        let border = hlsl_record(&layout::BORDER);
        assert!(border.contains("float4 colors[4];"));
        assert!(
            border.contains("result.radii[1] = sResourceCache.Load(int3(uv + int2(7, 0), 0));")
        );
    }

    #[test]
    fn feature_defines_lead_both_stages() {
        let features = ShaderFeatures::CLIP | ShaderFeatures::TRANSFORM;
        let source = ShaderSource::build(ProgramKind::Rectangle, features).unwrap();
        for stage in [&source.vertex, &source.fragment] {
            assert!(stage.starts_with(
                "#version 140\n#define WR_FEATURE_TRANSFORM\n#define WR_FEATURE_CLIP\n"
            ));
            assert!(stage.contains("uniform sampler2DArray sCacheA8;"));
            assert!(stage.contains("uniform sampler2D sResourceCache;"));
        }
        assert!(source.vertex.contains("#define WR_VERTEX_SHADER\n"));
        assert!(source.fragment.contains("#define WR_FRAGMENT_SHADER\n"));
        assert!(source.vertex.contains("Primitive load_primitive()"));
        assert!(source.fragment.contains("float do_clip()"));
    }

    #[test]
    fn dx11_and_conflicts_are_rejected() {
        assert!(matches!(
            ShaderSource::build(ProgramKind::Rectangle, ShaderFeatures::DX11),
            Err(Error::Unsupported(_))
        ));
        assert!(matches!(
            ShaderSource::build(
                ProgramKind::AngleGradient,
                ShaderFeatures::NV12 | ShaderFeatures::INTERLEAVED_Y_CB_CR
            ),
            Err(Error::ConflictingFeatures(..))
        ));
        assert!(layout_prelude(ShaderFeatures::DX11)
            .contains("Texture2D<float4> sLayers : register(t6);"));
    }

    #[test]
    fn fragment_helpers_guard_degenerate_inputs() {
        let source = ShaderSource::build(ProgramKind::AngleGradient, ShaderFeatures::CLIP).unwrap();
        // Any zero-area mask bounds pass unclipped.
        assert!(source
            .fragment
            .contains("if (any(greaterThanEqual(vClipMaskUvBounds.xy, vClipMaskUvBounds.zw))) {"));
        // The table entry is clamped before the float to int conversion.
        assert!(source
            .fragment
            .contains("2 * int(clamp(floor(x), 0.0, float(GRADIENT_ENTRIES + 1)))"));
    }
}
