use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use glam::{Mat4, Vec2, Vec3, Vec4};
use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};

use crate::input::{parse_input_name, ControlBindings, InputName};
use crate::material::{MaterialParameters, ParamKind, ParamRange, ParamValue, ParameterSpec};
use crate::mesh::MeshShape;
use crate::render::overlay::Rect;
use crate::render::{shaders, ShaderSource};

const ROW_HEIGHT: f32 = 30.0;
const SLIDER_HEIGHT: f32 = 20.0;

/// The built-in demos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DemoVariant {
    AmbientSimple,
    SpecularPhong,
    AmbientIbl,
    Clearcoat,
}

impl DemoVariant {
    pub const ALL: [Self; 4] = [
        Self::AmbientSimple,
        Self::SpecularPhong,
        Self::AmbientIbl,
        Self::Clearcoat,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::AmbientSimple => "ambient-simple",
            Self::SpecularPhong => "specular-phong",
            Self::AmbientIbl => "ambient-ibl",
            Self::Clearcoat => "clearcoat",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|variant| variant.name() == name)
    }

    fn xml(self) -> &'static str {
        match self {
            Self::AmbientSimple => include_str!("../demos/ambient_simple.xml"),
            Self::SpecularPhong => include_str!("../demos/specular_phong.xml"),
            Self::AmbientIbl => include_str!("../demos/ambient_ibl.xml"),
            Self::Clearcoat => include_str!("../demos/clearcoat.xml"),
        }
    }
}

/// One labelled slider bound to a scalar parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SliderRow {
    pub param: String,
    pub label: String,
    pub precision: usize,
}

/// A column of sliders with an optional header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SliderPanel {
    pub title: Option<String>,
    pub origin: Vec2,
    pub slider_offset: f32,
    pub slider_width: f32,
    pub rows: Vec<SliderRow>,
}

/// Screen placement of one slider row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SliderPlacement<'a> {
    pub row: &'a SliderRow,
    pub label_position: Vec2,
    pub bounds: Rect,
}

impl SliderPanel {
    pub fn title_position(&self) -> Vec2 {
        self.origin
    }

    /// Rows start one line below the header, or at the origin without one.
    pub fn placements(&self) -> impl Iterator<Item = SliderPlacement<'_>> + '_ {
        let first_row = if self.title.is_some() {
            self.origin.y + ROW_HEIGHT
        } else {
            self.origin.y
        };
        self.rows.iter().enumerate().map(move |(index, row)| {
            let y = first_row + index as f32 * ROW_HEIGHT;
            SliderPlacement {
                row,
                label_position: Vec2::new(self.origin.x, y),
                bounds: Rect::new(
                    self.origin.x + self.slider_offset,
                    y,
                    self.slider_width,
                    SLIDER_HEIGHT,
                ),
            }
        })
    }
}

/// Everything that distinguishes one preview from another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemoConfig {
    pub name: String,
    pub title: String,
    pub shader: String,
    pub object: MeshShape,
    pub backdrop: MeshShape,
    pub parameters: Vec<ParameterSpec>,
    pub panels: Vec<SliderPanel>,
    /// Fixed orientation in degrees (XYZ), applied after the spin.
    pub orientation: Vec3,
    /// Spin about the object's local Z axis per frame, in radians.
    pub spin_step: f32,
    pub background: Vec3,
    /// Parameter whose colour tints the object draw.
    pub tint: String,
    pub controls: ControlBindings,
    /// Panorama image; the procedural sky is used when absent.
    pub environment: Option<PathBuf>,
}

impl DemoConfig {
    pub fn builtin(variant: DemoVariant) -> Result<Self> {
        Self::from_xml(variant.xml())
            .with_context(|| format!("built-in demo {} is invalid", variant.name()))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let xml = std::fs::read_to_string(path)
            .with_context(|| format!("unable to read {}", path.display()))?;
        let mut config = Self::from_xml(&xml)
            .with_context(|| format!("invalid demo file {}", path.display()))?;
        if let (Some(environment), Some(dir)) = (config.environment.as_mut(), path.parent()) {
            if environment.is_relative() {
                *environment = dir.join(&*environment);
            }
        }
        Ok(config)
    }

    pub fn from_xml(xml: &str) -> Result<Self> {
        let document = Document::parse(xml).context("invalid demo XML")?;
        let root = document.root_element();
        if !root.has_tag_name("demo") {
            bail!("expected <demo> root element");
        }

        let name = root.attribute("name").unwrap_or("custom").to_string();
        let title = optional_text(&root, "title").unwrap_or_else(|| name.clone());
        let shader = required_text(&root, "shader")?;
        let object = match child(&root, "mesh") {
            Some(node) => parse_mesh(&node)?,
            None => bail!("<mesh> tag is missing"),
        };
        let backdrop = match child(&root, "backdrop") {
            Some(node) => parse_mesh(&node)?,
            None => MeshShape::Cube { size: 100.0 },
        };

        let parameters = root
            .children()
            .filter(|n| n.has_tag_name("parameter"))
            .map(|node| parse_parameter(&node))
            .collect::<Result<Vec<_>>>()?;
        let panels = root
            .children()
            .filter(|n| n.has_tag_name("panel"))
            .map(|node| parse_panel(&node))
            .collect::<Result<Vec<_>>>()?;

        let config = Self {
            name,
            title,
            shader,
            object,
            backdrop,
            parameters,
            panels,
            orientation: parse_vec3(optional_text(&root, "orientation"), Vec3::new(90.0, 0.0, 0.0))?,
            spin_step: parse_f32(optional_text(&root, "spin"), 0.01)?,
            background: parse_color(optional_text(&root, "background"), Vec3::splat(200.0 / 255.0))?,
            tint: optional_text(&root, "tint").unwrap_or_else(|| "objectColor".to_string()),
            controls: parse_controls(child(&root, "controls"))?,
            environment: child(&root, "environment")
                .map(|node| required_attribute(&node, "path").map(PathBuf::from))
                .transpose()?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn shader_source(&self) -> Result<ShaderSource> {
        shaders::program(&self.shader).ok_or_else(|| anyhow!("unknown shader {}", self.shader))
    }

    pub fn material_parameters(&self) -> MaterialParameters {
        MaterialParameters::new(self.parameters.clone())
    }

    pub fn base_orientation(&self) -> Mat4 {
        let radians = Vec3::new(
            self.orientation.x.to_radians(),
            self.orientation.y.to_radians(),
            self.orientation.z.to_radians(),
        );
        Mat4::from_rotation_z(radians.z)
            * Mat4::from_rotation_y(radians.y)
            * Mat4::from_rotation_x(radians.x)
    }

    pub fn background_color(&self) -> Vec4 {
        self.background.extend(1.0)
    }

    pub fn sliders(&self) -> impl Iterator<Item = &SliderRow> + '_ {
        self.panels.iter().flat_map(|panel| panel.rows.iter())
    }

    fn validate(&self) -> Result<()> {
        self.shader_source()?;
        let mut seen = HashSet::new();
        for spec in &self.parameters {
            if !seen.insert(spec.name.as_str()) {
                bail!("parameter {} is declared twice", spec.name);
            }
            if spec.range.min > spec.range.max {
                bail!("parameter {} has an empty range", spec.name);
            }
            if !spec.range.contains(spec.default) {
                bail!("default of {} lies outside its range", spec.name);
            }
        }
        for row in self.sliders() {
            let spec = self
                .parameters
                .iter()
                .find(|spec| spec.name == row.param)
                .ok_or_else(|| anyhow!("slider {} refers to an unknown parameter", row.label))?;
            if spec.kind() != ParamKind::Scalar {
                bail!("slider {} cannot edit vector parameter {}", row.label, spec.name);
            }
        }
        Ok(())
    }
}

fn child<'a, 'input>(node: &Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|child| child.has_tag_name(tag))
}

fn required_text(node: &Node<'_, '_>, tag: &str) -> Result<String> {
    optional_text(node, tag).ok_or_else(|| anyhow!("<{tag}> tag is missing"))
}

fn optional_text(node: &Node<'_, '_>, tag: &str) -> Option<String> {
    child(node, tag)
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(|text| text.to_string())
}

fn required_attribute<'a>(node: &Node<'a, '_>, name: &str) -> Result<&'a str> {
    node.attribute(name).ok_or_else(|| {
        anyhow!(
            "<{}> is missing the {name} attribute",
            node.tag_name().name()
        )
    })
}

fn attribute_f32(node: &Node<'_, '_>, name: &str, default: f32) -> Result<f32> {
    parse_f32(node.attribute(name).map(str::to_string), default)
        .with_context(|| format!("invalid {name} attribute"))
}

fn attribute_u32(node: &Node<'_, '_>, name: &str, default: u32) -> Result<u32> {
    match node.attribute(name) {
        Some(value) => value
            .trim()
            .parse::<u32>()
            .map_err(|err| anyhow!("invalid {name} attribute: {err}")),
        None => Ok(default),
    }
}

fn parse_mesh(node: &Node<'_, '_>) -> Result<MeshShape> {
    let kind = required_attribute(node, "kind")?;
    let shape = match kind {
        "cube" => MeshShape::Cube {
            size: attribute_f32(node, "size", 1.0)?,
        },
        "torus" => MeshShape::Torus {
            radius: attribute_f32(node, "radius", 0.4)?,
            size: attribute_f32(node, "size", 1.0)?,
            rings: attribute_u32(node, "rings", 24)?,
            sides: attribute_u32(node, "sides", 48)?,
        },
        "sphere" => MeshShape::Sphere {
            radius: attribute_f32(node, "radius", 0.4)?,
            rings: attribute_u32(node, "rings", 32)?,
            slices: attribute_u32(node, "slices", 32)?,
        },
        other => bail!("unknown mesh kind {other}"),
    };
    Ok(shape)
}

fn parse_parameter(node: &Node<'_, '_>) -> Result<ParameterSpec> {
    let name = required_attribute(node, "name")?;
    let uniform = node.attribute("uniform").unwrap_or(name);
    let range = ParamRange::new(
        attribute_f32(node, "min", 0.0)?,
        attribute_f32(node, "max", 1.0)?,
    );
    let default_text = required_attribute(node, "default")?.to_string();
    let default = match node.attribute("kind").unwrap_or("scalar") {
        "scalar" => ParamValue::Scalar(
            parse_f32(Some(default_text), 0.0)
                .with_context(|| format!("invalid default for {name}"))?,
        ),
        "vec3" => ParamValue::Vec3(
            parse_vec3(Some(default_text), Vec3::ZERO)
                .with_context(|| format!("invalid default for {name}"))?,
        ),
        other => bail!("parameter {name} has unknown kind {other}"),
    };
    Ok(ParameterSpec {
        name: name.to_string(),
        uniform: uniform.to_string(),
        default,
        range,
    })
}

fn parse_panel(node: &Node<'_, '_>) -> Result<SliderPanel> {
    let rows = node
        .children()
        .filter(|n| n.has_tag_name("slider"))
        .map(|slider| {
            let param = required_attribute(&slider, "param")?.to_string();
            let label = slider.attribute("label").unwrap_or(&param).to_string();
            let precision = attribute_u32(&slider, "precision", 2)? as usize;
            Ok(SliderRow {
                param,
                label,
                precision,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(SliderPanel {
        title: node.attribute("title").map(str::to_string),
        origin: Vec2::new(attribute_f32(node, "x", 10.0)?, attribute_f32(node, "y", 40.0)?),
        slider_offset: attribute_f32(node, "slider-offset", 120.0)?,
        slider_width: attribute_f32(node, "slider-width", 200.0)?,
        rows,
    })
}

fn parse_controls(node: Option<Node<'_, '_>>) -> Result<ControlBindings> {
    let mut controls = ControlBindings::default();
    let Some(node) = node else {
        return Ok(controls);
    };
    if let Some(name) = node.attribute("orbit") {
        match parse_input_name(name) {
            Some(InputName::Mouse(button)) => controls.orbit = button,
            _ => bail!("orbit must be a mouse button, got {name}"),
        }
    }
    if let Some(name) = node.attribute("fullscreen") {
        controls.fullscreen = parse_key(name)?;
    }
    if let Some(name) = node.attribute("quit") {
        controls.quit = parse_key(name)?;
    }
    Ok(controls)
}

fn parse_key(name: &str) -> Result<crate::input::KeyCode> {
    match parse_input_name(name) {
        Some(InputName::Key(key)) => Ok(key),
        _ => Err(anyhow!("{name} is not a keyboard key")),
    }
}

fn parse_vec3(value: Option<String>, default: Vec3) -> Result<Vec3> {
    let Some(value) = value else {
        return Ok(default);
    };
    let numbers = value
        .split_whitespace()
        .map(|component| component.parse::<f32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| anyhow!("failed to parse vector: {err}"))?;
    match numbers.as_slice() {
        [x, y, z] if [x, y, z].iter().all(|c| c.is_finite()) => Ok(Vec3::new(*x, *y, *z)),
        [_, _, _] => Err(anyhow!("vector {} has a non-finite component", value.trim())),
        _ => Err(anyhow!("vector needs three components, got {}", numbers.len())),
    }
}

/// Colours are written as 0-255 components.
fn parse_color(value: Option<String>, default: Vec3) -> Result<Vec3> {
    match value {
        Some(value) => parse_vec3(Some(value), default).map(|rgb| rgb / 255.0),
        None => Ok(default),
    }
}

fn parse_f32(value: Option<String>, default: f32) -> Result<f32> {
    match value {
        Some(value) => {
            let number = value
                .trim()
                .parse::<f32>()
                .map_err(|err| anyhow!("failed to parse float: {err}"))?;
            if !number.is_finite() {
                bail!("{} is not a finite number", value.trim());
            }
            Ok(number)
        }
        None => Ok(default),
    }
}
