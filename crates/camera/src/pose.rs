use glam::{Mat4, Vec3};

/// Perspective camera looking from `position` at `target`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    pub position: Vec3,
    pub target: Vec3,
    /// Vertical field of view in degrees.
    pub fov_degrees: f32,
    pub aspect: f32,
    pub near_clip: f32,
    pub far_clip: f32,
}

impl Default for CameraPose {
    fn default() -> Self {
        Self::new(45.0, 16.0 / 9.0, 1.0, 1000.0, Vec3::new(0.0, 0.0, 10.0))
    }
}

impl CameraPose {
    /// Camera at `position` looking at the origin.
    pub fn new(fov_degrees: f32, aspect: f32, near_clip: f32, far_clip: f32, position: Vec3) -> Self {
        Self {
            position,
            target: Vec3::ZERO,
            fov_degrees,
            aspect,
            near_clip,
            far_clip,
        }
    }

    pub fn with_target(mut self, target: Vec3) -> Self {
        self.target = target;
        self
    }

    /// Update the aspect ratio. Non-finite or non-positive values are ignored.
    pub fn set_aspect(&mut self, aspect: f32) {
        if aspect.is_finite() && aspect > 0.0 {
            self.aspect = aspect;
        }
    }

    /// Distance between the camera and its target.
    pub fn distance(&self) -> f32 {
        (self.position - self.target).length()
    }

    /// Angle between the world up axis and the target-to-camera direction,
    /// in radians: 0 looks straight down, π/2 is level.
    pub fn polar_angle(&self) -> f32 {
        let offset = self.position - self.target;
        let len = offset.length();
        if len <= f32::EPSILON {
            return 0.0;
        }
        (offset.y / len).clamp(-1.0, 1.0).acos()
    }

    pub fn forward(&self) -> Vec3 {
        (self.target - self.position).try_normalize().unwrap_or(Vec3::NEG_Z)
    }

    pub fn right(&self) -> Vec3 {
        self.forward().cross(Vec3::Y).try_normalize().unwrap_or(Vec3::X)
    }

    pub fn up(&self) -> Vec3 {
        self.right().cross(self.forward())
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, Vec3::Y)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(
            self.fov_degrees.to_radians(),
            self.aspect,
            self.near_clip,
            self.far_clip,
        )
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pose_has_valid_matrices() {
        let pose = CameraPose::default();
        let vp = pose.view_projection();
        assert!(!vp.col(0).x.is_nan());
    }

    #[test]
    fn target_projects_to_screen_centre() {
        let pose = CameraPose::new(45.0, 1.5, 1.0, 1000.0, Vec3::new(4.0, 5.0, 11.0))
            .with_target(Vec3::new(0.0, 1.0, 0.0));
        let ndc = pose.view_projection().project_point3(pose.target);
        assert!(ndc.x.abs() < 1e-5 && ndc.y.abs() < 1e-5);
    }

    #[test]
    fn polar_angle_and_distance() {
        let above = CameraPose::new(45.0, 1.0, 0.1, 100.0, Vec3::new(0.0, 5.0, 0.0));
        assert!(above.polar_angle().abs() < 1e-6);
        assert!((above.distance() - 5.0).abs() < 1e-6);

        let level = CameraPose::new(45.0, 1.0, 0.1, 100.0, Vec3::new(3.0, 0.0, 0.0));
        assert!((level.polar_angle() - std::f32::consts::FRAC_PI_2).abs() < 1e-6);
    }

    #[test]
    fn invalid_aspect_is_ignored() {
        let mut pose = CameraPose::default();
        pose.set_aspect(0.0);
        pose.set_aspect(f32::NAN);
        assert_eq!(pose.aspect, 16.0 / 9.0);
        pose.set_aspect(2.0);
        assert_eq!(pose.aspect, 2.0);
    }

    #[test]
    fn basis_is_orthonormal() {
        let pose = CameraPose::default().with_target(Vec3::new(1.0, -2.0, 0.5));
        let (f, r, u) = (pose.forward(), pose.right(), pose.up());
        assert!(f.dot(r).abs() < 1e-5);
        assert!(f.dot(u).abs() < 1e-5);
        assert!((u.length() - 1.0).abs() < 1e-5);
    }
}
