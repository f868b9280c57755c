//! Packs whole frames on the host and reads them back through the same
//! fetch, load and vertex paths the shaders use.

#![allow(clippy::unwrap_used)]

use gpu_prim_cache::{
    fetch::{self, fetch_3},
    geometry::{compute_snap_offset, write_primitive_vertex},
    gradient::{self, push_gradient, sample_gradient},
    layout::{resource_cache_uv, VECS_PER_LAYER},
    load_primitive,
    records::{ExtendMode, GradientPrimitive},
    ColorF, FrameUniforms, GpuCacheBuilder, GpuFrameBuilder, GpuRecord, GradientStop,
    LayerTransform, PackedLayer, PrimitiveGeometry, PrimitiveInstance, RectWithSize,
    RectanglePrimitive, RenderTaskData, RendererOptions, ShaderFeatures,
};
use lyon::math::{point, size};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn layer_and_render_task_share_one_cache() {
    init_logging();
    let mut cache = GpuCacheBuilder::new(4);
    let screen = RectWithSize::new(0.0, 0.0, 100.0, 100.0);
    let layer = cache.push(&PackedLayer::identity(screen)).unwrap();
    let task = cache
        .push(&RenderTaskData::alpha_batch(
            point(0.0, 0.0),
            size(100.0, 100.0),
            point(0.0, 0.0),
            0.0,
        ))
        .unwrap();
    assert_eq!(layer.as_int(), 0);
    assert_eq!(task.as_int(), 9);

    let cache = cache.finish();
    let quads = cache.fetch_row::<VECS_PER_LAYER>(resource_cache_uv(0));
    let decoded_layer = PackedLayer::read_gpu_blocks(&quads);
    assert_eq!(decoded_layer.transform, LayerTransform::identity());
    assert_eq!(decoded_layer.local_clip_rect, screen);

    let decoded_task = RenderTaskData::read_gpu_blocks(&fetch_3(&cache, task.as_int()));
    assert_eq!(
        decoded_task.target_rect(),
        RectWithSize {
            p0: point(0.0, 0.0),
            size: size(100.0, 100.0),
        }
    );
}

#[test]
fn rectangle_instance_lands_on_its_pixels() {
    init_logging();
    let options = RendererOptions::default().with_device_pixel_ratio(2.0);
    let mut frame = GpuFrameBuilder::new(&options);
    let screen = RectWithSize::new(0.0, 0.0, 400.0, 300.0);
    let layer = frame
        .layers
        .push(&PackedLayer::new(LayerTransform::translation(10.0, 20.0, 0.0), screen).unwrap())
        .unwrap();
    // The task covers screen pixels 100.. and is drawn at target pixel 0.
    let task = frame
        .render_tasks
        .push(&RenderTaskData::alpha_batch(
            point(0.0, 0.0),
            size(256.0, 256.0),
            point(100.0, 100.0),
            0.0,
        ))
        .unwrap();
    let prim = frame
        .resource_cache
        .push_primitive(
            &PrimitiveGeometry::unclipped(RectWithSize::new(50.0, 40.0, 30.0, 20.0)),
            &RectanglePrimitive {
                color: ColorF::new(1.0, 0.0, 0.0, 0.5).premultiplied(),
            },
        )
        .unwrap();
    let frame = frame.finish();

    let instance = PrimitiveInstance::new(prim.as_int(), task.as_int(), layer.as_int(), 3);
    let loaded = load_primitive(&frame, &instance);
    let payload = RectanglePrimitive::read_gpu_blocks(&[fetch::fetch_1(
        &frame.resource_cache,
        loaded.specific_prim_address,
    )]);
    assert_eq!(payload.color, ColorF::new(0.5, 0.0, 0.0, 0.5));

    let uniforms = FrameUniforms::ortho(256.0, 256.0, options.device_pixel_ratio);
    let corner = write_primitive_vertex(point(1.0, 1.0), &loaded, &uniforms);
    assert_eq!(corner.local_pos, point(80.0, 60.0));
    // (80 + 10, 60 + 20) * 2 = (180, 160) on screen.
    assert_eq!(corner.screen_pos, point(180.0, 160.0));
    assert_eq!(loaded.z, 3.0);
}

#[test]
fn integer_rect_needs_no_snapping() {
    let layer = PackedLayer::identity(RectWithSize::new(0.0, 0.0, 64.0, 64.0));
    let snap = RectWithSize::new(3.0, 4.0, 10.0, 12.0);
    for corner in [point(3.0, 4.0), point(13.0, 16.0), point(8.0, 10.0)] {
        let offset = compute_snap_offset(corner, &layer.transform, &snap, 1.0);
        assert_eq!(offset, lyon::math::vector(0.0, 0.0));
    }
}

#[test]
fn gradient_ends_match_the_stops() {
    init_logging();
    let mut cache = GpuCacheBuilder::new(8);
    let first = ColorF::new(1.0, 0.0, 0.0, 1.0);
    let last = ColorF::new(0.0, 0.0, 1.0, 1.0);
    let stops = [
        GradientStop {
            color: first,
            offset: 0.0,
        },
        GradientStop {
            color: ColorF::new(0.0, 1.0, 0.0, 1.0),
            offset: 0.5,
        },
        GradientStop {
            color: last,
            offset: 1.0,
        },
    ];
    let gradient = GradientPrimitive {
        start_point: point(0.0, 0.0),
        end_point: point(100.0, 0.0),
        tile_size: size(100.0, 10.0),
        tile_repeat: size(100.0, 10.0),
        extend_mode: ExtendMode::Clamp,
    };
    let address = push_gradient(
        &mut cache,
        &PrimitiveGeometry::unclipped(RectWithSize::new(0.0, 0.0, 100.0, 10.0)),
        &gradient,
        &stops,
        false,
    )
    .unwrap();
    let cache = cache.finish();
    let table = gradient::table_address(address.specific().as_int());

    assert_eq!(sample_gradient(&cache, table, 0.0, false), first);
    assert_eq!(sample_gradient(&cache, table, 1.0, false), last);
    assert_eq!(sample_gradient(&cache, table, 7.0, false), last);
    assert_eq!(sample_gradient(&cache, table, -3.0, false), first);

    for y in 0..8 {
        for x in 0..8 {
            let mid = sample_gradient(&cache, table, 0.25, false);
            let dithered = gradient::dither(mid, (x, y));
            assert!((dithered.r - mid.r).abs() <= 1.0 / 256.0);
            assert!((dithered.g - mid.g).abs() <= 1.0 / 256.0);
            assert_eq!(dithered.a, mid.a);
        }
    }
}

#[test]
fn options_drive_the_generated_programs() {
    let options = RendererOptions::default().with_features(ShaderFeatures::CLIP);
    let features = options.shader_features().unwrap();
    assert!(features.contains(ShaderFeatures::DITHERING));

    let source =
        gpu_prim_cache::ShaderSource::build(gpu_prim_cache::ProgramKind::AngleGradient, features)
            .unwrap();
    assert!(source.fragment.contains("#define WR_FEATURE_DITHERING\n"));
    assert!(source.vertex.contains("#define WR_FEATURE_CLIP\n"));
    assert!(!source.vertex.contains("#define WR_FEATURE_TRANSFORM\n"));

    let plain = RendererOptions {
        enable_dithering: false,
        ..RendererOptions::default()
    };
    assert!(!plain.shader_features().unwrap().contains(ShaderFeatures::DITHERING));
}
