use std::f32::consts::FRAC_PI_2;

use glam::{Vec2, Vec3};
use shading_lab::render::{GpuCall, RenderFlags};
use shading_lab::uniforms::sync;
use shading_lab::{
    DemoConfig, DemoVariant, FrameInput, FrameLoop, GraphicsDevice, LabError, OrbitCamera,
    OrbitInput, ParamValue, RecordingDevice, ScriptedOverlay, ShaderBinding,
};

fn start(variant: DemoVariant) -> (RecordingDevice, ScriptedOverlay, FrameLoop) {
    let mut device = RecordingDevice::new(1.0);
    let frames = FrameLoop::new(&mut device, DemoConfig::builtin(variant).unwrap()).unwrap();
    device.take_calls();
    (device, ScriptedOverlay::new(), frames)
}

#[test]
fn pitch_stays_inside_the_limit_for_any_drag_sequence() {
    let mut camera = OrbitCamera::default();
    let limit = FRAC_PI_2 - 0.1;
    let deltas = [300.0, -45.0, 1e4, -2e4, 17.5, 0.0, 9e3, -1.0];
    for dy in deltas {
        let pose = camera.update(&OrbitInput {
            drag_active: true,
            drag_delta: Vec2::new(3.0, dy),
            wheel_delta: 0.0,
        });
        assert!(pose.pitch >= -limit - 1e-6 && pose.pitch <= limit + 1e-6);
    }
}

#[test]
fn wheel_clamps_radius_to_both_ends() {
    let mut camera = OrbitCamera::default();
    let zoom = |wheel_delta| OrbitInput {
        wheel_delta,
        ..OrbitInput::default()
    };
    assert_eq!(camera.update(&zoom(50.0)).radius, 1.0);
    assert_eq!(camera.update(&zoom(-50.0)).radius, 10.0);
}

#[test]
fn roughness_is_clamped_at_the_store() {
    let mut params = DemoConfig::builtin(DemoVariant::Clearcoat)
        .unwrap()
        .material_parameters();
    assert_eq!(params.set("roughness", 1.7).unwrap(), ParamValue::Scalar(1.0));
    assert_eq!(params.set("roughness", -0.3).unwrap(), ParamValue::Scalar(0.0));
    assert!(matches!(
        params.set("sheen", 0.5),
        Err(LabError::UnknownParameter(name)) if name == "sheen"
    ));
}

#[test]
fn synchronizing_twice_repeats_the_same_writes() {
    let config = DemoConfig::builtin(DemoVariant::Clearcoat).unwrap();
    let mut device = RecordingDevice::default();
    let program = device
        .compile_program(&config.shader_source().unwrap())
        .unwrap();
    let params = config.material_parameters();
    let binding = ShaderBinding::resolve(&device, program, &params);
    let camera = OrbitCamera::default();

    let first_count = sync(&mut device, &binding, &params, camera.pose());
    let first = device.take_calls();
    let second_count = sync(&mut device, &binding, &params, camera.pose());
    let second = device.take_calls();
    assert_eq!(first_count, second_count);
    assert_eq!(first, second);
}

#[test]
fn backdrop_and_object_see_the_expected_state_flags() {
    let (mut device, mut overlay, mut frames) = start(DemoVariant::AmbientIbl);
    for _ in 0..2 {
        frames
            .tick(&mut device, &mut overlay, &FrameInput::default())
            .unwrap();
    }
    let flags: Vec<RenderFlags> = device
        .draws()
        .filter_map(|call| match call {
            GpuCall::Draw { flags, .. } => Some(*flags),
            _ => None,
        })
        .collect();
    let backdrop = RenderFlags {
        cull: false,
        depth_write: false,
    };
    assert_eq!(
        flags,
        [backdrop, RenderFlags::default(), backdrop, RenderFlags::default()]
    );
    assert_eq!(device.flags(), RenderFlags::default());
}

#[test]
fn drag_of_one_hundred_pixels_turns_yaw_by_one_radian() {
    let (mut device, mut overlay, mut frames) = start(DemoVariant::Clearcoat);
    let input = FrameInput {
        drag_active: true,
        pointer_delta: Vec2::new(100.0, 0.0),
        ..FrameInput::default()
    };
    frames.tick(&mut device, &mut overlay, &input).unwrap();
    let pose = frames.state().camera.pose();
    assert!((pose.yaw + 1.0).abs() < 1e-6);
    let expected = Vec3::new(2.5 * (-1.0f32).sin(), 0.0, 2.5 * (-1.0f32).cos());
    assert!(pose.position.abs_diff_eq(expected, 1e-5));
}

#[test]
fn metallic_slider_produces_one_write_on_the_next_frame() {
    let (mut device, mut overlay, mut frames) = start(DemoVariant::Clearcoat);
    overlay.drag_slider("metallic", 0.9);
    frames
        .tick(&mut device, &mut overlay, &FrameInput::default())
        .unwrap();
    overlay.drag_slider("metallic", 0.5);
    frames
        .tick(&mut device, &mut overlay, &FrameInput::default())
        .unwrap();
    device.take_calls();

    frames
        .tick(&mut device, &mut overlay, &FrameInput::default())
        .unwrap();
    let metallic: Vec<_> = device
        .writes()
        .filter(|(name, _)| *name == "metallicValue")
        .map(|(_, value)| value)
        .collect();
    assert_eq!(metallic, [ParamValue::Scalar(0.5)]);
    let program = frames.orchestrator().handles().object_program;
    assert_eq!(
        device.uniform_value(program, "metallicValue"),
        Some(ParamValue::Scalar(0.5))
    );
    assert_eq!(device.uniform_value(program, "sheenValue"), None);
}

#[test]
fn non_finite_input_never_escapes_the_clamps() {
    let mut params = DemoConfig::builtin(DemoVariant::Clearcoat)
        .unwrap()
        .material_parameters();
    assert!(matches!(
        params.set("roughness", f32::NAN),
        Err(LabError::NonFiniteValue(_))
    ));
    assert_eq!(params.get("roughness").unwrap(), ParamValue::Scalar(0.5));

    let mut camera = OrbitCamera::default();
    let pose = camera.update(&OrbitInput {
        drag_active: true,
        drag_delta: Vec2::new(0.0, f32::NAN),
        wheel_delta: f32::NAN,
    });
    assert_eq!(pose.pitch, 0.0);
    assert_eq!(pose.radius, 2.5);
    assert!(pose.position.is_finite());
}

#[test]
fn close_signal_ends_the_loop_only_after_the_frame_is_presented() {
    let (mut device, mut overlay, mut frames) = start(DemoVariant::SpecularPhong);
    let input = FrameInput {
        close_requested: true,
        ..FrameInput::default()
    };
    let outcome = frames.tick(&mut device, &mut overlay, &input).unwrap();
    assert!(outcome.exit);
    assert_eq!(device.presented_frames(), 1);
    assert_eq!(device.calls().last(), Some(&GpuCall::EndFrame));
}
