use std::ops::{Deref, DerefMut};

use glam::{Mat4, Vec4};

use crate::camera::CameraMatrices;
use crate::environment::EnvironmentMap;
use crate::error::LabError;
use crate::material::{ParamKind, ParamValue};
use crate::mesh::Mesh;

/// Compiled shader program owned by a [`GraphicsDevice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramHandle(u32);

impl ProgramHandle {
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Resolved location of a named uniform inside one program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation {
    pub program: ProgramHandle,
    pub slot: u32,
}

/// Mesh resident on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshHandle(u32);

impl MeshHandle {
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Named uniform a program declares in its material block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformDecl {
    pub name: &'static str,
    pub kind: ParamKind,
}

impl UniformDecl {
    pub const fn scalar(name: &'static str) -> Self {
        Self {
            name,
            kind: ParamKind::Scalar,
        }
    }

    pub const fn vec3(name: &'static str) -> Self {
        Self {
            name,
            kind: ParamKind::Vec3,
        }
    }
}

/// Vertex/fragment source pair plus the uniforms the program exposes by name.
///
/// Every declared uniform occupies one `vec4<f32>` slot of the material block,
/// in declaration order; the slot index is the uniform location.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShaderSource {
    pub label: &'static str,
    pub vertex: &'static str,
    pub fragment: &'static str,
    pub uniforms: &'static [UniformDecl],
}

impl ShaderSource {
    pub fn slot_of(&self, name: &str) -> Option<u32> {
        self.uniforms
            .iter()
            .position(|decl| decl.name == name)
            .map(|slot| slot as u32)
    }
}

/// Pipeline state toggled around the backdrop pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderFlags {
    pub cull: bool,
    pub depth_write: bool,
}

impl Default for RenderFlags {
    fn default() -> Self {
        Self {
            cull: true,
            depth_write: true,
        }
    }
}

/// The GPU collaborator: program compilation, named uniforms, draw calls and
/// the cull/depth-write state flags.
pub trait GraphicsDevice {
    fn compile_program(&mut self, source: &ShaderSource) -> Result<ProgramHandle, LabError>;

    /// Returns `None` when the program does not declare `name`.
    fn resolve_uniform(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation>;

    fn write_uniform(&mut self, location: UniformLocation, value: ParamValue);

    fn upload_mesh(&mut self, label: &str, mesh: &Mesh) -> Result<MeshHandle, LabError>;

    /// Replaces the procedural sky with a panorama for every later draw.
    fn set_environment(&mut self, map: &EnvironmentMap) -> Result<(), LabError>;

    /// Width over height of the drawing surface.
    fn aspect_ratio(&self) -> f32;

    fn begin_frame(&mut self) -> Result<(), LabError>;

    fn clear(&mut self, color: Vec4);

    fn set_camera(&mut self, camera: &CameraMatrices);

    fn set_cull_enabled(&mut self, enabled: bool);

    fn set_depth_write_enabled(&mut self, enabled: bool);

    fn draw(
        &mut self,
        mesh: MeshHandle,
        transform: Mat4,
        program: ProgramHandle,
        tint: Vec4,
    ) -> Result<(), LabError>;

    /// Presents the frame.
    fn end_frame(&mut self) -> Result<(), LabError>;

    /// Drops everything recorded since `begin_frame` without presenting it.
    fn abort_frame(&mut self) {}
}

/// Backdrop rendering mode: culling and depth writes are off while the guard
/// lives and are switched back on when it drops, including on early return.
pub struct BackdropMode<'a, D: GraphicsDevice + ?Sized> {
    device: &'a mut D,
}

impl<'a, D: GraphicsDevice + ?Sized> BackdropMode<'a, D> {
    pub fn enter(device: &'a mut D) -> Self {
        device.set_cull_enabled(false);
        device.set_depth_write_enabled(false);
        Self { device }
    }
}

impl<D: GraphicsDevice + ?Sized> Deref for BackdropMode<'_, D> {
    type Target = D;

    fn deref(&self) -> &D {
        self.device
    }
}

impl<D: GraphicsDevice + ?Sized> DerefMut for BackdropMode<'_, D> {
    fn deref_mut(&mut self) -> &mut D {
        self.device
    }
}

impl<D: GraphicsDevice + ?Sized> Drop for BackdropMode<'_, D> {
    fn drop(&mut self) {
        self.device.set_cull_enabled(true);
        self.device.set_depth_write_enabled(true);
    }
}
