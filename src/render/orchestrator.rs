use glam::{Mat4, Vec2, Vec4};
use log::{debug, error, trace};

use crate::camera::CameraMatrices;
use crate::demo::{DemoConfig, SliderPanel};
use crate::error::LabError;
use crate::material::MaterialParameters;

use super::device::{BackdropMode, GraphicsDevice, MeshHandle, ProgramHandle};
use super::overlay::{Overlay, SliderDescriptor};

const TITLE_POSITION: Vec2 = Vec2::new(10.0, 10.0);
const FONT_SIZE: f32 = 20.0;

/// Stages of one frame, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStage {
    BeginFrame,
    Clear,
    BackdropPass,
    ObjectPass,
    Overlay,
    EndFrame,
}

/// Device resources the orchestrator draws with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneHandles {
    pub backdrop_mesh: MeshHandle,
    pub backdrop_program: ProgramHandle,
    pub object_mesh: MeshHandle,
    pub object_program: ProgramHandle,
}

#[derive(Debug, Clone)]
pub struct RenderOrchestrator {
    handles: SceneHandles,
    background: Vec4,
    base_orientation: Mat4,
    title: String,
    panels: Vec<SliderPanel>,
    tint_parameter: String,
}

impl RenderOrchestrator {
    pub fn new(config: &DemoConfig, handles: SceneHandles) -> Self {
        Self {
            handles,
            background: config.background_color(),
            base_orientation: config.base_orientation(),
            title: config.title.clone(),
            panels: config.panels.clone(),
            tint_parameter: config.tint.clone(),
        }
    }

    pub fn handles(&self) -> SceneHandles {
        self.handles
    }

    /// Object transform for the given spin angle.
    pub fn object_transform(&self, spin_angle: f32) -> Mat4 {
        self.base_orientation * Mat4::from_rotation_z(spin_angle)
    }

    /// Runs every stage of one frame.
    ///
    /// Slider values returned by the overlay are stored in `params` and reach
    /// the shader on the next synchronization. A failure after `BeginFrame`
    /// aborts the frame so nothing partial is presented.
    pub fn render_frame<D, O>(
        &self,
        device: &mut D,
        overlay: &mut O,
        camera: &CameraMatrices,
        spin_angle: f32,
        params: &mut MaterialParameters,
    ) -> Result<(), LabError>
    where
        D: GraphicsDevice + ?Sized,
        O: Overlay + ?Sized,
    {
        enter(FrameStage::BeginFrame);
        device.begin_frame()?;

        match self.record(device, overlay, camera, spin_angle, params) {
            Ok(()) => {
                enter(FrameStage::EndFrame);
                device.end_frame()
            }
            Err(err) => {
                error!("frame aborted: {err}");
                device.abort_frame();
                Err(err)
            }
        }
    }

    fn record<D, O>(
        &self,
        device: &mut D,
        overlay: &mut O,
        camera: &CameraMatrices,
        spin_angle: f32,
        params: &mut MaterialParameters,
    ) -> Result<(), LabError>
    where
        D: GraphicsDevice + ?Sized,
        O: Overlay + ?Sized,
    {
        enter(FrameStage::Clear);
        device.clear(self.background);
        device.set_camera(camera);

        enter(FrameStage::BackdropPass);
        {
            let mut backdrop = BackdropMode::enter(device);
            backdrop.draw(
                self.handles.backdrop_mesh,
                Mat4::IDENTITY,
                self.handles.backdrop_program,
                Vec4::ONE,
            )?;
        }

        enter(FrameStage::ObjectPass);
        let tint = params
            .get(&self.tint_parameter)
            .ok()
            .and_then(|value| value.as_vec3())
            .map(|color| color.extend(1.0))
            .unwrap_or(Vec4::ONE);
        device.draw(
            self.handles.object_mesh,
            self.object_transform(spin_angle),
            self.handles.object_program,
            tint,
        )?;

        enter(FrameStage::Overlay);
        self.draw_overlay(overlay, params)
    }

    fn draw_overlay<O: Overlay + ?Sized>(
        &self,
        overlay: &mut O,
        params: &mut MaterialParameters,
    ) -> Result<(), LabError> {
        overlay.text(&self.title, TITLE_POSITION, FONT_SIZE);
        for panel in &self.panels {
            if let Some(title) = &panel.title {
                overlay.text(title, panel.title_position(), FONT_SIZE);
            }
            for placement in panel.placements() {
                let row = placement.row;
                let spec = params.spec(&row.param)?;
                let range = spec.range;
                let current = params
                    .get(&row.param)?
                    .as_scalar()
                    .ok_or_else(|| LabError::ValueKindMismatch {
                        name: row.param.clone(),
                        expected: "scalar",
                    })?;
                overlay.text(&row.label, placement.label_position, FONT_SIZE);
                let returned = overlay.slider(&SliderDescriptor {
                    id: &row.param,
                    label: &row.label,
                    bounds: placement.bounds,
                    value: current,
                    min: range.min,
                    max: range.max,
                    precision: row.precision,
                });
                let stored = params.set(&row.param, returned)?;
                if returned != current {
                    trace!("slider {} -> {:?}", row.param, stored);
                }
            }
        }
        Ok(())
    }
}

fn enter(stage: FrameStage) {
    debug!("frame stage {stage:?}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::OrbitCamera;
    use crate::demo::DemoVariant;
    use crate::material::ParamValue;
    use crate::mesh;
    use crate::render::{shaders, GpuCall, RecordingDevice, RenderFlags, ScriptedOverlay};

    fn setup(variant: DemoVariant) -> (RecordingDevice, RenderOrchestrator, MaterialParameters) {
        let config = DemoConfig::builtin(variant).unwrap();
        let mut device = RecordingDevice::default();
        let handles = SceneHandles {
            backdrop_program: device.compile_program(&shaders::BACKDROP).unwrap(),
            object_program: device
                .compile_program(&config.shader_source().unwrap())
                .unwrap(),
            backdrop_mesh: device.upload_mesh("backdrop", &mesh::cube(100.0)).unwrap(),
            object_mesh: device
                .upload_mesh("object", &config.object.generate())
                .unwrap(),
        };
        let params = config.material_parameters();
        (device, RenderOrchestrator::new(&config, handles), params)
    }

    fn camera() -> CameraMatrices {
        OrbitCamera::default().matrices(1.0)
    }

    fn draw_flags(device: &RecordingDevice) -> Vec<(MeshHandle, RenderFlags)> {
        device
            .draws()
            .filter_map(|call| match call {
                GpuCall::Draw { mesh, flags, .. } => Some((*mesh, *flags)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn backdrop_draws_without_cull_or_depth_write() {
        let (mut device, orchestrator, mut params) = setup(DemoVariant::Clearcoat);
        let mut overlay = ScriptedOverlay::new();
        orchestrator
            .render_frame(&mut device, &mut overlay, &camera(), 0.0, &mut params)
            .unwrap();

        let handles = orchestrator.handles();
        let draws = draw_flags(&device);
        assert_eq!(
            draws,
            [
                (
                    handles.backdrop_mesh,
                    RenderFlags {
                        cull: false,
                        depth_write: false
                    }
                ),
                (handles.object_mesh, RenderFlags::default()),
            ]
        );
        assert_eq!(device.calls().first(), Some(&GpuCall::BeginFrame));
        assert_eq!(device.calls().last(), Some(&GpuCall::EndFrame));
        assert_eq!(device.presented_frames(), 1);
    }

    #[test]
    fn object_uses_spin_and_material_color() {
        let (mut device, orchestrator, mut params) = setup(DemoVariant::SpecularPhong);
        let mut overlay = ScriptedOverlay::new();
        orchestrator
            .render_frame(&mut device, &mut overlay, &camera(), 0.25, &mut params)
            .unwrap();

        let expected = Mat4::from_rotation_x(90f32.to_radians()) * Mat4::from_rotation_z(0.25);
        let object = device.draws().last().cloned();
        match object {
            Some(GpuCall::Draw {
                transform, tint, ..
            }) => {
                assert!(transform.abs_diff_eq(expected, 1e-5));
                assert_eq!(tint, Vec4::new(0.5, 0.0, 0.0, 1.0));
            }
            other => panic!("unexpected call {other:?}"),
        }
    }

    #[test]
    fn failed_backdrop_draw_restores_flags_and_skips_present() {
        let (mut device, orchestrator, mut params) = setup(DemoVariant::Clearcoat);
        device.fail_draws_after(0);
        let mut overlay = ScriptedOverlay::new();
        let result =
            orchestrator.render_frame(&mut device, &mut overlay, &camera(), 0.0, &mut params);

        assert!(matches!(result, Err(LabError::Draw(_))));
        assert_eq!(device.flags(), RenderFlags::default());
        assert_eq!(device.calls().last(), Some(&GpuCall::AbortFrame));
        assert!(!device.calls().contains(&GpuCall::EndFrame));
        assert_eq!(device.presented_frames(), 0);
        assert!(overlay.sliders().is_empty());
    }

    #[test]
    fn surface_failure_is_reported_before_any_draw() {
        let (mut device, orchestrator, mut params) = setup(DemoVariant::AmbientSimple);
        device.fail_surface_acquisition();
        let mut overlay = ScriptedOverlay::new();
        let result =
            orchestrator.render_frame(&mut device, &mut overlay, &camera(), 0.0, &mut params);
        assert!(matches!(result, Err(LabError::SurfaceAcquisition(_))));
        assert!(device.calls().is_empty());
    }

    #[test]
    fn slider_values_are_clamped_into_the_store() {
        let (mut device, orchestrator, mut params) = setup(DemoVariant::Clearcoat);
        let mut overlay = ScriptedOverlay::new();
        overlay.drag_slider("ior", 7.0);
        overlay.drag_slider("metallic", 0.25);
        orchestrator
            .render_frame(&mut device, &mut overlay, &camera(), 0.0, &mut params)
            .unwrap();

        assert_eq!(params.get("ior").unwrap(), ParamValue::Scalar(3.5));
        assert_eq!(params.get("metallic").unwrap(), ParamValue::Scalar(0.25));
        let labels: Vec<_> = overlay.texts().iter().map(|(text, _)| text.as_str()).collect();
        assert_eq!(labels[1], "Main Layer");
        assert!(labels.contains(&"Clearcoat Layer"));
        assert_eq!(overlay.sliders().len(), 7);
    }
}
