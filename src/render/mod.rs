pub mod device;
pub mod native;
pub mod orchestrator;
pub mod overlay;
pub mod recording;
pub mod shaders;

pub use device::{
    BackdropMode, GraphicsDevice, MeshHandle, ProgramHandle, RenderFlags, ShaderSource,
    UniformDecl, UniformLocation,
};
pub use native::{EguiOverlay, NativeDevice};
pub use orchestrator::{FrameStage, RenderOrchestrator, SceneHandles};
pub use overlay::{Overlay, Rect, ScriptedOverlay, SliderDescriptor, SliderRecord};
pub use recording::{GpuCall, RecordingDevice};
