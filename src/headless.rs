use glam::Vec2;
use log::info;

use crate::demo::DemoConfig;
use crate::error::LabError;
use crate::frame::{FrameLoop, FrameState};
use crate::input::FrameInput;
use crate::render::{GpuCall, RecordingDevice, ScriptedOverlay};

/// Scripted input for a headless run. Drag, wheel and slider values all apply
/// to the first frame.
#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessOptions {
    pub frames: u32,
    pub aspect: f32,
    pub drag: Option<Vec2>,
    pub wheel: f32,
    pub sets: Vec<(String, f32)>,
}

impl Default for HeadlessOptions {
    fn default() -> Self {
        Self {
            frames: 1,
            aspect: 1.0,
            drag: None,
            wheel: 0.0,
            sets: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameStats {
    pub uniform_writes: usize,
    pub draws: usize,
}

#[derive(Debug, Clone)]
pub struct HeadlessReport {
    pub demo: String,
    pub title: String,
    /// Label and size of the panorama, if one was loaded.
    pub environment: Option<(String, u32, u32)>,
    pub frames: Vec<FrameStats>,
    pub state: FrameState,
}

impl HeadlessReport {
    pub fn print(&self) {
        println!("Demo: {} ({})", self.demo, self.title);
        match &self.environment {
            Some((label, width, height)) => println!("Environment: {label} ({width}x{height})"),
            None => println!("Environment: procedural sky"),
        }
        println!("Rendered {} frame(s) headless", self.frames.len());
        for (index, stats) in self.frames.iter().enumerate() {
            println!(
                "Frame {}: {} uniform writes, {} draws",
                index + 1,
                stats.uniform_writes,
                stats.draws
            );
        }
        print!("{}", self.state);
    }
}

pub fn run_headless(config: DemoConfig, options: &HeadlessOptions) -> Result<HeadlessReport, LabError> {
    let mut device = RecordingDevice::new(options.aspect);
    let mut overlay = ScriptedOverlay::new();
    let demo = config.name.clone();
    let title = config.title.clone();
    let mut frame_loop = FrameLoop::new(&mut device, config)?;
    let environment = device.take_calls().into_iter().find_map(|call| match call {
        GpuCall::SetEnvironment {
            label,
            width,
            height,
        } => Some((label, width, height)),
        _ => None,
    });

    for (name, value) in &options.sets {
        overlay.drag_slider(name.clone(), *value);
    }

    let mut frames = Vec::with_capacity(options.frames as usize);
    for index in 0..options.frames {
        let input = if index == 0 {
            FrameInput {
                drag_active: options.drag.is_some(),
                pointer_delta: options.drag.unwrap_or(Vec2::ZERO),
                wheel_delta: options.wheel,
                ..FrameInput::default()
            }
        } else {
            FrameInput::default()
        };
        let outcome = frame_loop.tick(&mut device, &mut overlay, &input)?;
        let draws = device
            .take_calls()
            .iter()
            .filter(|call| matches!(call, GpuCall::Draw { .. }))
            .count();
        frames.push(FrameStats {
            uniform_writes: outcome.uniform_writes,
            draws,
        });
        if outcome.exit {
            break;
        }
    }
    info!("headless run finished after {} frame(s)", frames.len());

    Ok(HeadlessReport {
        demo,
        title,
        environment,
        frames,
        state: frame_loop.state().clone(),
    })
}
