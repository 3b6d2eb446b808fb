use log::{debug, trace, warn};

use crate::camera::CameraPose;
use crate::material::{MaterialParameters, ParamValue};
use crate::render::{GraphicsDevice, ProgramHandle, UniformLocation};

/// Uniform that receives the camera position.
pub const VIEW_POSITION_UNIFORM: &str = "viewPos";

/// Uniform locations of one program, resolved once after compilation.
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderBinding {
    program: ProgramHandle,
    parameters: Vec<(String, Option<UniformLocation>)>,
    view_position: Option<UniformLocation>,
}

impl ShaderBinding {
    pub fn resolve<D: GraphicsDevice + ?Sized>(
        device: &D,
        program: ProgramHandle,
        params: &MaterialParameters,
    ) -> Self {
        let parameters = params
            .specs()
            .iter()
            .map(|spec| {
                let location = device.resolve_uniform(program, &spec.uniform);
                match location {
                    Some(location) => debug!(
                        "bound {} to uniform {} (slot {})",
                        spec.name, spec.uniform, location.slot
                    ),
                    None => warn!(
                        "shader has no uniform {} for parameter {}; writes will be skipped",
                        spec.uniform, spec.name
                    ),
                }
                (spec.name.clone(), location)
            })
            .collect();
        let view_position = device.resolve_uniform(program, VIEW_POSITION_UNIFORM);
        if view_position.is_none() {
            debug!("shader does not read {VIEW_POSITION_UNIFORM}");
        }
        Self {
            program,
            parameters,
            view_position,
        }
    }

    pub fn program(&self) -> ProgramHandle {
        self.program
    }

    pub fn location(&self, name: &str) -> Option<UniformLocation> {
        self.parameters
            .iter()
            .find(|(param, _)| param == name)
            .and_then(|(_, location)| *location)
    }

    pub fn view_position(&self) -> Option<UniformLocation> {
        self.view_position
    }
}

/// Writes every bound parameter, then the camera position, to the program.
///
/// Must run after the camera update and slider input of the frame and before
/// its first draw. Unchanged values are written again every frame. Returns the
/// number of writes issued.
pub fn sync<D: GraphicsDevice + ?Sized>(
    device: &mut D,
    binding: &ShaderBinding,
    params: &MaterialParameters,
    camera: &CameraPose,
) -> usize {
    let mut writes = 0;
    params.for_each(|name, value| {
        if let Some(location) = binding.location(name) {
            device.write_uniform(location, value);
            writes += 1;
        } else {
            trace!("skipping unbound parameter {name}");
        }
    });
    if let Some(location) = binding.view_position {
        device.write_uniform(location, ParamValue::Vec3(camera.position));
        writes += 1;
    }
    writes
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::camera::OrbitCamera;
    use crate::material::{ParamRange, ParameterSpec};
    use crate::render::{GpuCall, RecordingDevice, ShaderSource, UniformDecl};

    const PHONG_LIKE: ShaderSource = ShaderSource {
        label: "test",
        vertex: "",
        fragment: "",
        uniforms: &[
            UniformDecl::vec3("viewPos"),
            UniformDecl::scalar("roughnessValue"),
            UniformDecl::scalar("metallicValue"),
        ],
    };

    fn params() -> MaterialParameters {
        MaterialParameters::new(vec![
            ParameterSpec::scalar("roughness", "roughnessValue", 0.5, ParamRange::UNIT),
            ParameterSpec::scalar("metallic", "metallicValue", 0.5, ParamRange::UNIT),
            ParameterSpec::scalar("alpha", "alphaValue", 1.0, ParamRange::UNIT),
        ])
    }

    #[test]
    fn missing_uniforms_are_skipped() {
        let mut device = RecordingDevice::default();
        let program = device.compile_program(&PHONG_LIKE).unwrap();
        let params = params();
        let binding = ShaderBinding::resolve(&device, program, &params);
        assert!(binding.location("alpha").is_none());

        let camera = OrbitCamera::default();
        let writes = sync(&mut device, &binding, &params, camera.pose());
        assert_eq!(writes, 3);
        let names: Vec<_> = device.writes().map(|(name, _)| name).collect();
        assert_eq!(names, ["roughnessValue", "metallicValue", "viewPos"]);
    }

    #[test]
    fn repeated_sync_is_idempotent() {
        let mut device = RecordingDevice::default();
        let program = device.compile_program(&PHONG_LIKE).unwrap();
        let params = params();
        let binding = ShaderBinding::resolve(&device, program, &params);
        let camera = OrbitCamera::default();

        sync(&mut device, &binding, &params, camera.pose());
        let first = device.take_calls();
        sync(&mut device, &binding, &params, camera.pose());
        let second = device.take_calls();
        assert_eq!(first, second);
        assert!(matches!(
            first.last(),
            Some(GpuCall::WriteUniform { value: ParamValue::Vec3(position), .. })
                if position.abs_diff_eq(Vec3::new(0.0, 0.0, 2.5), 1e-6)
        ));
    }
}
