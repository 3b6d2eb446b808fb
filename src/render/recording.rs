use glam::{Mat4, Vec4};
use log::trace;

use crate::camera::CameraMatrices;
use crate::environment::EnvironmentMap;
use crate::error::LabError;
use crate::material::ParamValue;
use crate::mesh::Mesh;

use super::device::{
    GraphicsDevice, MeshHandle, ProgramHandle, RenderFlags, ShaderSource, UniformLocation,
};

#[derive(Debug, Clone, PartialEq)]
pub enum GpuCall {
    SetEnvironment {
        label: String,
        width: u32,
        height: u32,
    },
    BeginFrame,
    Clear(Vec4),
    SetCamera(CameraMatrices),
    SetCull(bool),
    SetDepthWrite(bool),
    WriteUniform {
        location: UniformLocation,
        name: &'static str,
        value: ParamValue,
    },
    Draw {
        mesh: MeshHandle,
        program: ProgramHandle,
        transform: Mat4,
        tint: Vec4,
        flags: RenderFlags,
    },
    EndFrame,
    AbortFrame,
}

#[derive(Debug)]
struct RecordedProgram {
    source: ShaderSource,
    /// Last value written to each slot.
    slots: Vec<Option<ParamValue>>,
}

/// A [`GraphicsDevice`] without a GPU, used by the headless mode and tests.
#[derive(Debug)]
pub struct RecordingDevice {
    aspect: f32,
    flags: RenderFlags,
    programs: Vec<RecordedProgram>,
    meshes: Vec<(String, usize)>,
    calls: Vec<GpuCall>,
    in_frame: bool,
    presented_frames: u64,
    fail_surface: bool,
    fail_draws_after: Option<usize>,
}

impl Default for RecordingDevice {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl RecordingDevice {
    pub fn new(aspect: f32) -> Self {
        Self {
            aspect,
            flags: RenderFlags::default(),
            programs: Vec::new(),
            meshes: Vec::new(),
            calls: Vec::new(),
            in_frame: false,
            presented_frames: 0,
            fail_surface: false,
            fail_draws_after: None,
        }
    }

    pub fn calls(&self) -> &[GpuCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<GpuCall> {
        std::mem::take(&mut self.calls)
    }

    pub fn flags(&self) -> RenderFlags {
        self.flags
    }

    pub fn presented_frames(&self) -> u64 {
        self.presented_frames
    }

    pub fn mesh_label(&self, mesh: MeshHandle) -> Option<&str> {
        self.meshes.get(mesh.index()).map(|(label, _)| label.as_str())
    }

    /// Last value written to the named uniform of `program`.
    pub fn uniform_value(&self, program: ProgramHandle, name: &str) -> Option<ParamValue> {
        let recorded = self.programs.get(program.index())?;
        let slot = recorded.source.slot_of(name)?;
        recorded.slots[slot as usize]
    }

    /// Makes every following `begin_frame` fail.
    pub fn fail_surface_acquisition(&mut self) {
        self.fail_surface = true;
    }

    /// Lets `count` more draws succeed, then fails the rest.
    pub fn fail_draws_after(&mut self, count: usize) {
        self.fail_draws_after = Some(count);
    }

    pub fn writes(&self) -> impl Iterator<Item = (&'static str, ParamValue)> + '_ {
        self.calls.iter().filter_map(|call| match call {
            GpuCall::WriteUniform { name, value, .. } => Some((*name, *value)),
            _ => None,
        })
    }

    pub fn draws(&self) -> impl Iterator<Item = &GpuCall> + '_ {
        self.calls
            .iter()
            .filter(|call| matches!(call, GpuCall::Draw { .. }))
    }
}

impl GraphicsDevice for RecordingDevice {
    fn compile_program(&mut self, source: &ShaderSource) -> Result<ProgramHandle, LabError> {
        let handle = ProgramHandle::new(self.programs.len() as u32);
        self.programs.push(RecordedProgram {
            source: *source,
            slots: vec![None; source.uniforms.len()],
        });
        Ok(handle)
    }

    fn resolve_uniform(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation> {
        let recorded = self.programs.get(program.index())?;
        let slot = recorded.source.slot_of(name)?;
        Some(UniformLocation { program, slot })
    }

    fn write_uniform(&mut self, location: UniformLocation, value: ParamValue) {
        let Some(recorded) = self.programs.get_mut(location.program.index()) else {
            return;
        };
        let Some(decl) = recorded.source.uniforms.get(location.slot as usize) else {
            return;
        };
        trace!("uniform {} <- {:?}", decl.name, value);
        recorded.slots[location.slot as usize] = Some(value);
        self.calls.push(GpuCall::WriteUniform {
            location,
            name: decl.name,
            value,
        });
    }

    fn upload_mesh(&mut self, label: &str, mesh: &Mesh) -> Result<MeshHandle, LabError> {
        if mesh.indices.is_empty() {
            return Err(LabError::MeshUpload {
                label: label.to_string(),
                reason: "mesh has no triangles".into(),
            });
        }
        let handle = MeshHandle::new(self.meshes.len() as u32);
        self.meshes.push((label.to_string(), mesh.indices.len()));
        Ok(handle)
    }

    fn set_environment(&mut self, map: &EnvironmentMap) -> Result<(), LabError> {
        self.calls.push(GpuCall::SetEnvironment {
            label: map.label.clone(),
            width: map.width,
            height: map.height,
        });
        Ok(())
    }

    fn aspect_ratio(&self) -> f32 {
        self.aspect
    }

    fn begin_frame(&mut self) -> Result<(), LabError> {
        if self.fail_surface {
            return Err(LabError::SurfaceAcquisition("surface unavailable".into()));
        }
        self.in_frame = true;
        self.calls.push(GpuCall::BeginFrame);
        Ok(())
    }

    fn clear(&mut self, color: Vec4) {
        self.calls.push(GpuCall::Clear(color));
    }

    fn set_camera(&mut self, camera: &CameraMatrices) {
        self.calls.push(GpuCall::SetCamera(*camera));
    }

    fn set_cull_enabled(&mut self, enabled: bool) {
        self.flags.cull = enabled;
        self.calls.push(GpuCall::SetCull(enabled));
    }

    fn set_depth_write_enabled(&mut self, enabled: bool) {
        self.flags.depth_write = enabled;
        self.calls.push(GpuCall::SetDepthWrite(enabled));
    }

    fn draw(
        &mut self,
        mesh: MeshHandle,
        transform: Mat4,
        program: ProgramHandle,
        tint: Vec4,
    ) -> Result<(), LabError> {
        if !self.in_frame {
            return Err(LabError::Draw("draw outside of a frame".into()));
        }
        if let Some(remaining) = self.fail_draws_after.as_mut() {
            if *remaining == 0 {
                return Err(LabError::Draw("injected draw failure".into()));
            }
            *remaining -= 1;
        }
        if mesh.index() >= self.meshes.len() || program.index() >= self.programs.len() {
            return Err(LabError::Draw("unknown mesh or program handle".into()));
        }
        self.calls.push(GpuCall::Draw {
            mesh,
            program,
            transform,
            tint,
            flags: self.flags,
        });
        Ok(())
    }

    fn end_frame(&mut self) -> Result<(), LabError> {
        self.in_frame = false;
        self.presented_frames += 1;
        self.calls.push(GpuCall::EndFrame);
        Ok(())
    }

    fn abort_frame(&mut self) {
        self.in_frame = false;
        self.calls.push(GpuCall::AbortFrame);
    }
}
