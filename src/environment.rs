use std::f32::consts::PI;
use std::path::Path;

use anyhow::{bail, Context, Result};
use glam::{Vec2, Vec3};

/// Equirectangular panorama lighting the backdrop and the reflective shaders.
///
/// Pixels are RGBA8 in sRGB, rows top to bottom.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentMap {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl EnvironmentMap {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .with_context(|| format!("unable to read environment image {}", path.display()))?;
        Self::decode(&path.display().to_string(), &bytes)
    }

    pub fn decode(label: &str, bytes: &[u8]) -> Result<Self> {
        let image = image::load_from_memory(bytes).context("failed to decode environment image")?;
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        if width == 0 || height == 0 {
            bail!("environment image {label} is empty");
        }
        Ok(Self {
            label: label.to_string(),
            width,
            height,
            pixels: rgba.into_raw(),
        })
    }

    /// Texture coordinate of `direction` in the panorama; the same mapping
    /// the WGSL `panorama_uv` helper uses.
    pub fn direction_to_uv(direction: Vec3) -> Vec2 {
        let dir = direction.try_normalize().unwrap_or(Vec3::Y);
        Vec2::new(
            dir.z.atan2(dir.x) / (2.0 * PI) + 0.5,
            0.5 - dir.y.clamp(-1.0, 1.0).asin() / PI,
        )
    }
}
