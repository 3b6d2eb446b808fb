use std::f32::consts::{PI, TAU};

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// GPU ready mesh data with interleaved vertices.
///
/// Vertices are laid out as `position.xyz` followed by `normal.xyz`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Mesh {
    pub vertices: Vec<f32>,
    pub indices: Vec<u32>,
}

impl Mesh {
    pub const FLOATS_PER_VERTEX: usize = 6;

    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / Self::FLOATS_PER_VERTEX
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn position(&self, index: usize) -> Vec3 {
        let base = index * Self::FLOATS_PER_VERTEX;
        Vec3::from_slice(&self.vertices[base..base + 3])
    }

    pub fn normal(&self, index: usize) -> Vec3 {
        let base = index * Self::FLOATS_PER_VERTEX + 3;
        Vec3::from_slice(&self.vertices[base..base + 3])
    }

    fn push_vertex(&mut self, position: Vec3, normal: Vec3) {
        self.vertices.extend_from_slice(&position.to_array());
        self.vertices.extend_from_slice(&normal.to_array());
    }
}

/// Procedural shapes a demo can preview.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MeshShape {
    Cube {
        size: f32,
    },
    /// Ring around the Z axis; `radius` is the tube thickness relative to `size`.
    Torus {
        radius: f32,
        size: f32,
        rings: u32,
        sides: u32,
    },
    Sphere {
        radius: f32,
        rings: u32,
        slices: u32,
    },
}

impl MeshShape {
    pub fn generate(&self) -> Mesh {
        match *self {
            Self::Cube { size } => cube(size),
            Self::Torus {
                radius,
                size,
                rings,
                sides,
            } => torus(radius, size, rings, sides),
            Self::Sphere {
                radius,
                rings,
                slices,
            } => sphere(radius, rings, slices),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Cube { .. } => "cube",
            Self::Torus { .. } => "torus",
            Self::Sphere { .. } => "sphere",
        }
    }
}

/// Axis aligned cube centred on the origin with outward normals.
pub fn cube(size: f32) -> Mesh {
    let half = size * 0.5;
    let faces = [
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),
        (Vec3::X, Vec3::NEG_Z, Vec3::Y),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
        (Vec3::Y, Vec3::X, Vec3::NEG_Z),
    ];
    let mut mesh = Mesh::default();
    for (normal, right, up) in faces {
        let base = mesh.vertex_count() as u32;
        for (u, v) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
            let position = (normal + right * u + up * v) * half;
            mesh.push_vertex(position, normal);
        }
        mesh.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    mesh
}

pub fn torus(radius: f32, size: f32, rings: u32, sides: u32) -> Mesh {
    let rings = rings.max(3);
    let sides = sides.max(3);
    let major = size * 0.5;
    let minor = radius.clamp(0.1, 1.0) * major;

    let mut mesh = Mesh::default();
    for ring in 0..=rings {
        let theta = ring as f32 / rings as f32 * TAU;
        let center_dir = Vec3::new(theta.cos(), theta.sin(), 0.0);
        for side in 0..=sides {
            let phi = side as f32 / sides as f32 * TAU;
            let normal = center_dir * phi.cos() - Vec3::Z * phi.sin();
            let position = center_dir * major + normal * minor;
            mesh.push_vertex(position, normal);
        }
    }
    push_grid_indices(&mut mesh, rings, sides);
    mesh
}

pub fn sphere(radius: f32, rings: u32, slices: u32) -> Mesh {
    let rings = rings.max(2);
    let slices = slices.max(3);

    let mut mesh = Mesh::default();
    for ring in 0..=rings {
        let polar = ring as f32 / rings as f32 * PI;
        for slice in 0..=slices {
            let azimuth = slice as f32 / slices as f32 * TAU;
            let normal = Vec3::new(
                polar.sin() * azimuth.cos(),
                polar.cos(),
                polar.sin() * azimuth.sin(),
            );
            mesh.push_vertex(normal * radius, normal);
        }
    }
    push_grid_indices(&mut mesh, rings, slices);
    mesh
}

/// Stitches a `(rows + 1) x (columns + 1)` vertex grid into counter-clockwise triangles.
fn push_grid_indices(mesh: &mut Mesh, rows: u32, columns: u32) {
    let stride = columns + 1;
    for row in 0..rows {
        for column in 0..columns {
            let a = row * stride + column;
            let b = a + stride;
            mesh.indices
                .extend_from_slice(&[a, a + 1, b, a + 1, b + 1, b]);
        }
    }
}
