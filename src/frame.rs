use std::fmt;

use log::{debug, info};

use crate::camera::{OrbitCamera, OrbitInput};
use crate::demo::DemoConfig;
use crate::environment::EnvironmentMap;
use crate::error::LabError;
use crate::input::FrameInput;
use crate::material::MaterialParameters;
use crate::render::{shaders, GraphicsDevice, Overlay, RenderOrchestrator, SceneHandles};
use crate::uniforms::{self, ShaderBinding};

/// Everything that changes from one frame to the next.
#[derive(Debug, Clone)]
pub struct FrameState {
    pub camera: OrbitCamera,
    pub params: MaterialParameters,
    pub spin_angle: f32,
    pub frame_index: u64,
}

impl FrameState {
    pub fn new(config: &DemoConfig) -> Self {
        Self {
            camera: OrbitCamera::default(),
            params: config.material_parameters(),
            spin_angle: 0.0,
            frame_index: 0,
        }
    }
}

impl fmt::Display for FrameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pose = self.camera.pose();
        writeln!(
            f,
            "Camera: yaw={:.3} pitch={:.3} radius={:.3} position=({:.3}, {:.3}, {:.3})",
            pose.yaw, pose.pitch, pose.radius, pose.position.x, pose.position.y, pose.position.z
        )?;
        writeln!(f, "Parameters:")?;
        for (name, value) in self.params.iter() {
            writeln!(f, " - {name} = {value}")?;
        }
        Ok(())
    }
}

/// What the application should do after a tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameOutcome {
    pub exit: bool,
    pub toggle_fullscreen: bool,
    pub uniform_writes: usize,
}

pub struct FrameLoop {
    config: DemoConfig,
    binding: ShaderBinding,
    orchestrator: RenderOrchestrator,
    state: FrameState,
}

impl FrameLoop {
    /// Compiles both programs, uploads the meshes and resolves the uniform
    /// binding of the object program. Resolution happens only here.
    pub fn new<D: GraphicsDevice + ?Sized>(
        device: &mut D,
        config: DemoConfig,
    ) -> Result<Self, LabError> {
        let source = config
            .shader_source()
            .map_err(|err| LabError::ProgramCompilation {
                label: config.shader.clone(),
                reason: err.to_string(),
            })?;
        let object_program = device.compile_program(&source)?;
        let backdrop_program = device.compile_program(&shaders::BACKDROP)?;
        let object_mesh = device.upload_mesh(config.object.label(), &config.object.generate())?;
        let backdrop_mesh = device.upload_mesh("backdrop", &config.backdrop.generate())?;
        if let Some(path) = &config.environment {
            let map = EnvironmentMap::load(path).map_err(|err| LabError::EnvironmentLoad {
                label: path.display().to_string(),
                reason: format!("{err:#}"),
            })?;
            info!("environment {} ({}x{})", map.label, map.width, map.height);
            device.set_environment(&map)?;
        }

        let state = FrameState::new(&config);
        let binding = ShaderBinding::resolve(&*device, object_program, &state.params);
        let orchestrator = RenderOrchestrator::new(
            &config,
            SceneHandles {
                backdrop_mesh,
                backdrop_program,
                object_mesh,
                object_program,
            },
        );
        info!(
            "demo {} ready: {} parameters, {} sliders",
            config.name,
            state.params.len(),
            config.sliders().count()
        );
        Ok(Self {
            config,
            binding,
            orchestrator,
            state,
        })
    }

    pub fn config(&self) -> &DemoConfig {
        &self.config
    }

    pub fn binding(&self) -> &ShaderBinding {
        &self.binding
    }

    pub fn orchestrator(&self) -> &RenderOrchestrator {
        &self.orchestrator
    }

    pub fn state(&self) -> &FrameState {
        &self.state
    }

    /// Runs one frame.
    ///
    /// Uniforms are synchronized after the camera update and before the first
    /// draw, so a slider moved during this frame's overlay is sent on the next
    /// tick.
    pub fn tick<D, O>(
        &mut self,
        device: &mut D,
        overlay: &mut O,
        input: &FrameInput,
    ) -> Result<FrameOutcome, LabError>
    where
        D: GraphicsDevice + ?Sized,
        O: Overlay + ?Sized,
    {
        let state = &mut self.state;
        state.camera.update(&OrbitInput {
            drag_active: input.drag_active,
            drag_delta: input.pointer_delta,
            wheel_delta: input.wheel_delta,
        });
        state.spin_angle += self.config.spin_step;

        let uniform_writes = uniforms::sync(device, &self.binding, &state.params, state.camera.pose());

        let camera = state.camera.matrices(device.aspect_ratio());
        self.orchestrator.render_frame(
            device,
            overlay,
            &camera,
            state.spin_angle,
            &mut state.params,
        )?;
        state.frame_index += 1;

        let controls = &self.config.controls;
        let outcome = FrameOutcome {
            exit: input.close_requested || input.was_pressed(controls.quit),
            toggle_fullscreen: input.was_pressed(controls.fullscreen),
            uniform_writes,
        };
        if outcome.exit {
            debug!("exit requested after frame {}", state.frame_index);
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use glam::{Vec2, Vec3};

    use super::*;
    use crate::demo::DemoVariant;
    use crate::input::{KeyCode, NamedKey};
    use crate::material::ParamValue;
    use crate::render::{GpuCall, RecordingDevice, ScriptedOverlay};

    fn frame_loop(variant: DemoVariant) -> (RecordingDevice, ScriptedOverlay, FrameLoop) {
        let mut device = RecordingDevice::default();
        let config = DemoConfig::builtin(variant).unwrap();
        let frame_loop = FrameLoop::new(&mut device, config).unwrap();
        device.take_calls();
        (device, ScriptedOverlay::new(), frame_loop)
    }

    fn metallic_writes(calls: &[GpuCall]) -> Vec<ParamValue> {
        calls
            .iter()
            .filter_map(|call| match call {
                GpuCall::WriteUniform {
                    name: "metallicValue",
                    value,
                    ..
                } => Some(*value),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn drag_moves_camera_before_view_position_is_written() {
        let (mut device, mut overlay, mut frames) = frame_loop(DemoVariant::AmbientIbl);
        let input = FrameInput {
            drag_active: true,
            pointer_delta: Vec2::new(100.0, 0.0),
            ..FrameInput::default()
        };
        frames.tick(&mut device, &mut overlay, &input).unwrap();

        let expected = Vec3::new(2.5 * (-1.0f32).sin(), 0.0, 2.5 * (-1.0f32).cos());
        assert!(frames.state().camera.pose().position.abs_diff_eq(expected, 1e-5));
        let view_pos = device.writes().find(|(name, _)| *name == "viewPos");
        assert!(matches!(
            view_pos,
            Some((_, ParamValue::Vec3(position))) if position.abs_diff_eq(expected, 1e-5)
        ));
    }

    #[test]
    fn slider_change_reaches_shader_on_the_next_frame() {
        let (mut device, mut overlay, mut frames) = frame_loop(DemoVariant::AmbientIbl);
        let idle = FrameInput::default();

        overlay.drag_slider("metallic", 0.2);
        frames.tick(&mut device, &mut overlay, &idle).unwrap();
        let first = device.take_calls();
        assert_eq!(metallic_writes(&first), [ParamValue::Scalar(0.5)]);

        overlay.drag_slider("metallic", 0.5);
        frames.tick(&mut device, &mut overlay, &idle).unwrap();
        let second = device.take_calls();
        assert_eq!(metallic_writes(&second), [ParamValue::Scalar(0.2)]);

        frames.tick(&mut device, &mut overlay, &idle).unwrap();
        let third = device.take_calls();
        assert_eq!(metallic_writes(&third), [ParamValue::Scalar(0.5)]);

        let write = third
            .iter()
            .position(|call| matches!(call, GpuCall::WriteUniform { name: "metallicValue", .. }));
        let first_draw = third
            .iter()
            .position(|call| matches!(call, GpuCall::Draw { .. }));
        assert!(write < first_draw);
    }

    #[test]
    fn spin_advances_once_per_frame() {
        let (mut device, mut overlay, mut frames) = frame_loop(DemoVariant::AmbientSimple);
        for _ in 0..3 {
            frames
                .tick(&mut device, &mut overlay, &FrameInput::default())
                .unwrap();
        }
        assert!((frames.state().spin_angle - 0.03).abs() < 1e-6);
        assert_eq!(frames.state().frame_index, 3);
        assert_eq!(device.presented_frames(), 3);
    }

    #[test]
    fn quit_and_close_end_the_loop_after_presenting() {
        let (mut device, mut overlay, mut frames) = frame_loop(DemoVariant::SpecularPhong);
        let quit = FrameInput {
            pressed: vec![KeyCode::Named(NamedKey::Escape)],
            ..FrameInput::default()
        };
        let outcome = frames.tick(&mut device, &mut overlay, &quit).unwrap();
        assert!(outcome.exit);
        assert_eq!(device.presented_frames(), 1);

        let close = FrameInput {
            close_requested: true,
            ..FrameInput::default()
        };
        assert!(frames.tick(&mut device, &mut overlay, &close).unwrap().exit);

        let fullscreen = FrameInput {
            pressed: vec![KeyCode::Function(11)],
            ..FrameInput::default()
        };
        let outcome = frames.tick(&mut device, &mut overlay, &fullscreen).unwrap();
        assert!(outcome.toggle_fullscreen);
        assert!(!outcome.exit);
    }

    #[test]
    fn setup_uploads_both_meshes_under_their_labels() {
        let (device, _, frames) = frame_loop(DemoVariant::AmbientIbl);
        let handles = frames.orchestrator().handles();
        assert_eq!(device.mesh_label(handles.backdrop_mesh), Some("backdrop"));
        assert_eq!(device.mesh_label(handles.object_mesh), Some("sphere"));
    }

    #[test]
    fn environment_image_is_handed_to_the_device() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sky.png");
        image::RgbImage::new(16, 8).save(&path).unwrap();

        let mut config = DemoConfig::builtin(DemoVariant::Clearcoat).unwrap();
        config.environment = Some(path.clone());
        let mut device = RecordingDevice::default();
        FrameLoop::new(&mut device, config.clone()).unwrap();
        assert!(device.calls().contains(&GpuCall::SetEnvironment {
            label: path.display().to_string(),
            width: 16,
            height: 8,
        }));

        config.environment = Some(dir.path().join("missing.png"));
        let result = FrameLoop::new(&mut RecordingDevice::default(), config);
        assert!(matches!(result, Err(LabError::EnvironmentLoad { .. })));
    }

    #[test]
    fn failed_frame_is_not_counted() {
        let (mut device, mut overlay, mut frames) = frame_loop(DemoVariant::Clearcoat);
        device.fail_draws_after(1);
        let result = frames.tick(&mut device, &mut overlay, &FrameInput::default());
        assert!(matches!(result, Err(LabError::Draw(_))));
        assert_eq!(frames.state().frame_index, 0);
        assert_eq!(device.presented_frames(), 0);
    }
}
