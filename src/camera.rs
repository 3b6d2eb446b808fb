use std::f32::consts::FRAC_PI_2;

use glam::{Mat4, Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Tuning for [`OrbitCamera`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrbitSettings {
    pub yaw_sensitivity: f32,
    pub pitch_sensitivity: f32,
    pub zoom_sensitivity: f32,
    pub min_radius: f32,
    pub max_radius: f32,
    /// Distance kept between the pitch limit and the poles.
    pub pitch_margin: f32,
    pub fov_y_degrees: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for OrbitSettings {
    fn default() -> Self {
        Self {
            yaw_sensitivity: 0.01,
            pitch_sensitivity: 0.01,
            zoom_sensitivity: 0.2,
            min_radius: 1.0,
            max_radius: 10.0,
            pitch_margin: 0.1,
            fov_y_degrees: 45.0,
            near: 0.01,
            far: 1000.0,
        }
    }
}

impl OrbitSettings {
    pub fn pitch_limit(&self) -> f32 {
        FRAC_PI_2 - self.pitch_margin
    }
}

/// Camera pose derived from the orbit scalars.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraPose {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y: f32,
    pub yaw: f32,
    pub pitch: f32,
    pub radius: f32,
}

impl CameraPose {
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }
}

/// Per-frame input consumed by the orbit controller.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OrbitInput {
    pub drag_active: bool,
    pub drag_delta: Vec2,
    pub wheel_delta: f32,
}

/// View and projection handed to the graphics device for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraMatrices {
    pub view: Mat4,
    pub projection: Mat4,
    pub position: Vec3,
}

#[derive(Debug, Clone)]
pub struct OrbitCamera {
    settings: OrbitSettings,
    yaw: f32,
    pitch: f32,
    radius: f32,
    pose: CameraPose,
}

impl OrbitCamera {
    pub const DEFAULT_RADIUS: f32 = 2.5;

    pub fn new(settings: OrbitSettings) -> Self {
        Self::with_angles(settings, 0.0, 0.0, Self::DEFAULT_RADIUS)
    }

    /// Starts from explicit angles; pitch and radius are clamped like any update.
    pub fn with_angles(settings: OrbitSettings, yaw: f32, pitch: f32, radius: f32) -> Self {
        let limit = settings.pitch_limit();
        let pitch = pitch.clamp(-limit, limit);
        let radius = radius.clamp(settings.min_radius, settings.max_radius);
        let pose = spherical_pose(&settings, yaw, pitch, radius);
        Self {
            settings,
            yaw,
            pitch,
            radius,
            pose,
        }
    }

    pub fn settings(&self) -> &OrbitSettings {
        &self.settings
    }

    pub fn pose(&self) -> &CameraPose {
        &self.pose
    }

    /// Non-finite drag or wheel deltas are ignored.
    pub fn update(&mut self, input: &OrbitInput) -> CameraPose {
        if input.drag_active && input.drag_delta.is_finite() {
            self.yaw -= input.drag_delta.x * self.settings.yaw_sensitivity;
            self.pitch += input.drag_delta.y * self.settings.pitch_sensitivity;
            let limit = self.settings.pitch_limit();
            self.pitch = self.pitch.clamp(-limit, limit);
        }

        if input.wheel_delta.is_finite() {
            self.radius -= input.wheel_delta * self.settings.zoom_sensitivity;
            self.radius = self
                .radius
                .clamp(self.settings.min_radius, self.settings.max_radius);
        }

        self.pose = spherical_pose(&self.settings, self.yaw, self.pitch, self.radius);
        self.pose
    }

    pub fn matrices(&self, aspect: f32) -> CameraMatrices {
        let projection = Mat4::perspective_rh(
            self.pose.fov_y,
            aspect.max(0.01),
            self.settings.near,
            self.settings.far,
        );
        CameraMatrices {
            view: self.pose.view_matrix(),
            projection,
            position: self.pose.position,
        }
    }
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self::new(OrbitSettings::default())
    }
}

fn spherical_pose(settings: &OrbitSettings, yaw: f32, pitch: f32, radius: f32) -> CameraPose {
    let position = Vec3::new(
        radius * pitch.cos() * yaw.sin(),
        radius * pitch.sin(),
        radius * pitch.cos() * yaw.cos(),
    );
    CameraPose {
        position,
        target: Vec3::ZERO,
        up: Vec3::Y,
        fov_y: settings.fov_y_degrees.to_radians(),
        yaw,
        pitch,
        radius,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drag(dx: f32, dy: f32) -> OrbitInput {
        OrbitInput {
            drag_active: true,
            drag_delta: Vec2::new(dx, dy),
            wheel_delta: 0.0,
        }
    }

    fn wheel(delta: f32) -> OrbitInput {
        OrbitInput {
            wheel_delta: delta,
            ..OrbitInput::default()
        }
    }

    #[test]
    fn horizontal_drag_moves_yaw_against_pointer() {
        let mut camera = OrbitCamera::default();
        let pose = camera.update(&drag(100.0, 0.0));
        assert!((pose.yaw + 1.0).abs() < 1e-6);
        let expected = Vec3::new(2.5 * (-1.0f32).sin(), 0.0, 2.5 * (-1.0f32).cos());
        assert!(pose.position.abs_diff_eq(expected, 1e-5));
    }

    #[test]
    fn pitch_never_crosses_the_poles() {
        let mut camera = OrbitCamera::default();
        let limit = FRAC_PI_2 - 0.1;
        for dy in [500.0, 500.0, -3000.0, 42.0, -7.5, 10_000.0] {
            let pose = camera.update(&drag(0.0, dy));
            assert!(pose.pitch <= limit + 1e-6);
            assert!(pose.pitch >= -limit - 1e-6);
        }
    }

    #[test]
    fn wheel_clamps_radius() {
        let mut camera = OrbitCamera::default();
        assert_eq!(camera.update(&wheel(50.0)).radius, 1.0);
        assert_eq!(camera.update(&wheel(-50.0)).radius, 10.0);
        let pose = camera.update(&wheel(5.0));
        assert!((pose.radius - 9.0).abs() < 1e-5);
    }

    #[test]
    fn non_finite_deltas_leave_the_pose_alone() {
        let mut camera = OrbitCamera::default();
        camera.update(&drag(40.0, 30.0));
        let before = *camera.pose();
        for input in [
            drag(0.0, f32::NAN),
            drag(f32::INFINITY, 0.0),
            wheel(f32::NAN),
            wheel(f32::NEG_INFINITY),
        ] {
            let pose = camera.update(&input);
            assert_eq!(pose, before);
        }
        let pose = camera.update(&OrbitInput {
            drag_active: true,
            drag_delta: Vec2::new(f32::NAN, 1.0),
            wheel_delta: 5.0,
        });
        assert_eq!(pose.yaw, before.yaw);
        assert!((pose.radius - (before.radius - 1.0)).abs() < 1e-5);
    }

    #[test]
    fn drag_is_ignored_when_button_is_up() {
        let mut camera = OrbitCamera::default();
        let input = OrbitInput {
            drag_active: false,
            drag_delta: Vec2::new(250.0, -90.0),
            wheel_delta: 0.0,
        };
        let pose = camera.update(&input);
        assert_eq!(pose.yaw, 0.0);
        assert_eq!(pose.pitch, 0.0);
        assert!(pose.position.abs_diff_eq(Vec3::new(0.0, 0.0, 2.5), 1e-6));
    }

    #[test]
    fn position_is_a_pure_function_of_the_angles() {
        let mut camera = OrbitCamera::default();
        for _ in 0..1000 {
            camera.update(&drag(3.0, 0.0));
            camera.update(&drag(-3.0, 0.0));
        }
        let pose = camera.update(&OrbitInput::default());
        assert!(pose.position.abs_diff_eq(Vec3::new(0.0, 0.0, 2.5), 1e-3));
        assert_eq!(pose.target, Vec3::ZERO);
    }
}
