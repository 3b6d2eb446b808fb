//! Interactive material preview harness.
//!
//! A single object is drawn in front of an environment backdrop while an
//! orbit camera and on-screen sliders drive the shading parameters. The
//! per-frame pipeline (camera update, uniform synchronization, two-pass
//! render, overlay) is independent of the GPU backend so it can be exercised
//! headless with [`render::RecordingDevice`].

pub mod app;
pub mod camera;
pub mod config;
pub mod demo;
pub mod environment;
pub mod error;
pub mod frame;
pub mod headless;
pub mod input;
pub mod material;
pub mod mesh;
pub mod render;
pub mod uniforms;

pub use camera::{CameraMatrices, CameraPose, OrbitCamera, OrbitInput, OrbitSettings};
pub use config::CliOptions;
pub use demo::{DemoConfig, DemoVariant, SliderPanel, SliderRow};
pub use environment::EnvironmentMap;
pub use error::LabError;
pub use frame::{FrameLoop, FrameOutcome, FrameState};
pub use headless::{run_headless, HeadlessOptions, HeadlessReport};
pub use input::{ControlBindings, FrameInput, InputState, KeyCode, MouseButton, NamedKey};
pub use material::{MaterialParameters, ParamKind, ParamRange, ParamValue, ParameterSpec};
pub use mesh::{Mesh, MeshShape};
pub use render::{GraphicsDevice, Overlay, RecordingDevice, ScriptedOverlay};
pub use uniforms::{ShaderBinding, VIEW_POSITION_UNIFORM};
