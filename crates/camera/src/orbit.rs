use glam::Vec3;
use orbitview_input::CameraAction;
use serde::{Deserialize, Serialize};
use std::f32::consts::{PI, TAU};

use crate::pose::CameraPose;

/// Keeps the polar angle away from the poles, where the view basis degenerates.
const POLE_EPSILON: f32 = 1e-4;

/// Orbit constraints and tuning, fixed at startup.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerLimits {
    pub min_distance: f32,
    pub max_distance: f32,
    /// Polar angles are measured from +Y, in radians.
    pub min_polar_angle: f32,
    pub max_polar_angle: f32,
    pub damping_enabled: bool,
    pub pan_enabled: bool,
    pub auto_rotate: bool,
    /// Fraction of the pending motion applied per 60 Hz frame when damping.
    pub damping_factor: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub pan_speed: f32,
    /// Orbits per minute at 60 Hz divided by 30; 2.0 is one orbit every 30 s.
    pub auto_rotate_speed: f32,
}

impl Default for ControllerLimits {
    fn default() -> Self {
        Self {
            min_distance: 0.0,
            max_distance: f32::MAX,
            min_polar_angle: 0.0,
            max_polar_angle: PI,
            damping_enabled: false,
            pan_enabled: true,
            auto_rotate: false,
            damping_factor: 0.05,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            pan_speed: 1.0,
            auto_rotate_speed: 2.0,
        }
    }
}

impl ControllerLimits {
    /// Ordered, in-range copy: swapped bounds are put back in order and the
    /// polar range is kept inside (0, π).
    fn sanitized(mut self) -> Self {
        if self.min_distance > self.max_distance {
            std::mem::swap(&mut self.min_distance, &mut self.max_distance);
        }
        self.min_distance = self.min_distance.max(0.0);
        self.max_distance = self.max_distance.max(self.min_distance);
        if self.min_polar_angle > self.max_polar_angle {
            std::mem::swap(&mut self.min_polar_angle, &mut self.max_polar_angle);
        }
        self.min_polar_angle = self.min_polar_angle.clamp(POLE_EPSILON, PI - POLE_EPSILON);
        self.max_polar_angle = self.max_polar_angle.clamp(self.min_polar_angle, PI - POLE_EPSILON);
        self.damping_factor = self.damping_factor.clamp(0.0, 1.0);
        self
    }
}

/// Orbit controller bound to one camera.
///
/// Input is queued by [`apply`](Self::apply); the pose only moves in
/// [`tick`](Self::tick). Position is kept in spherical coordinates around the
/// target: `theta` is the azimuth (unrestricted), `phi` the polar angle.
#[derive(Debug, Clone)]
pub struct OrbitController {
    pose: CameraPose,
    limits: ControllerLimits,
    radius: f32,
    phi: f32,
    theta: f32,
    pending_theta: f32,
    pending_phi: f32,
    /// Natural log of the pending radius scale.
    pending_zoom: f32,
    pending_pan: Vec3,
}

impl OrbitController {
    /// Bind to `pose` and snap it inside the limits.
    pub fn new(pose: CameraPose, limits: ControllerLimits) -> Self {
        let offset = pose.position - pose.target;
        let radius = offset.length();
        let phi = if radius > f32::EPSILON {
            (offset.y / radius).clamp(-1.0, 1.0).acos()
        } else {
            0.0
        };
        let theta = offset.x.atan2(offset.z);

        let mut controller = Self {
            pose,
            limits: limits.sanitized(),
            radius,
            phi,
            theta,
            pending_theta: 0.0,
            pending_phi: 0.0,
            pending_zoom: 0.0,
            pending_pan: Vec3::ZERO,
        };
        controller.clamp_and_sync();
        controller
    }

    pub fn pose(&self) -> &CameraPose {
        &self.pose
    }

    pub fn limits(&self) -> &ControllerLimits {
        &self.limits
    }

    /// Resize hook: the only pose change allowed outside `tick`.
    pub fn set_aspect(&mut self, aspect: f32) {
        self.pose.set_aspect(aspect);
    }

    /// True while queued motion has not fully played out.
    pub fn is_settling(&self) -> bool {
        const EPS: f32 = 1e-5;
        self.pending_theta.abs() > EPS
            || self.pending_phi.abs() > EPS
            || self.pending_zoom.abs() > EPS
            || self.pending_pan.length_squared() > EPS * EPS
    }

    /// Queue an input action. `viewport_height` is in logical pixels and
    /// scales pointer deltas so a full-height drag is one full turn.
    pub fn apply(&mut self, action: &CameraAction, viewport_height: u32) {
        let height = viewport_height.max(1) as f32;
        match *action {
            CameraAction::Orbit(delta) => {
                self.pending_theta -= TAU * delta.x / height * self.limits.rotate_speed;
                self.pending_phi -= TAU * delta.y / height * self.limits.rotate_speed;
            }
            CameraAction::Zoom(notches) => {
                // One notch scales the distance by 1/0.95.
                self.pending_zoom -= notches * self.limits.zoom_speed * 0.95f32.ln();
            }
            CameraAction::Pan(delta) => {
                if !self.limits.pan_enabled {
                    return;
                }
                // World units per pixel at the target's depth.
                let half_fov = (self.pose.fov_degrees.to_radians() / 2.0).tan();
                let scale = 2.0 * self.radius * half_fov / height * self.limits.pan_speed;
                self.pending_pan +=
                    -self.pose.right() * delta.x * scale + self.pose.up() * delta.y * scale;
            }
        }
    }

    /// Advance one frame. Returns true if the pose changed.
    pub fn tick(&mut self, dt_seconds: f32) -> bool {
        let dt = if dt_seconds.is_finite() {
            dt_seconds.max(0.0)
        } else {
            0.0
        };
        let before = self.pose;

        if self.limits.auto_rotate {
            self.pending_theta -= TAU / 60.0 * self.limits.auto_rotate_speed * dt;
        }

        let step = if self.limits.damping_enabled {
            1.0 - (1.0 - self.limits.damping_factor).powf(dt * 60.0)
        } else {
            1.0
        };

        self.theta += self.pending_theta * step;
        self.phi += self.pending_phi * step;
        self.radius *= (self.pending_zoom * step).exp();
        self.pose.target += self.pending_pan * step;

        let keep = 1.0 - step;
        self.pending_theta *= keep;
        self.pending_phi *= keep;
        self.pending_zoom *= keep;
        self.pending_pan *= keep;

        if self.theta.abs() > PI {
            self.theta = wrap_angle(self.theta);
        }
        self.clamp_and_sync();

        let changed = self.pose != before;
        if changed {
            tracing::trace!(
                distance = self.radius,
                polar = self.phi,
                azimuth = self.theta,
                "camera moved"
            );
        }
        changed
    }

    fn clamp_and_sync(&mut self) {
        self.phi = self
            .phi
            .clamp(self.limits.min_polar_angle, self.limits.max_polar_angle);
        self.radius = self
            .radius
            .clamp(self.limits.min_distance, self.limits.max_distance);

        let sin_phi_radius = self.phi.sin() * self.radius;
        let offset = Vec3::new(
            sin_phi_radius * self.theta.sin(),
            self.phi.cos() * self.radius,
            sin_phi_radius * self.theta.cos(),
        );
        self.pose.position = self.pose.target + offset;
    }
}

/// Wrap to (-π, π] so the azimuth does not grow without bound.
fn wrap_angle(angle: f32) -> f32 {
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI { wrapped + TAU } else { wrapped }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    const TOL: f32 = 1e-3;

    fn viewer_limits() -> ControllerLimits {
        ControllerLimits {
            min_distance: 5.0,
            max_distance: 20.0,
            min_polar_angle: 0.5,
            max_polar_angle: 1.5,
            damping_enabled: true,
            pan_enabled: false,
            auto_rotate: false,
            ..ControllerLimits::default()
        }
    }

    fn viewer_pose() -> CameraPose {
        CameraPose::new(45.0, 16.0 / 9.0, 1.0, 1000.0, Vec3::new(4.0, 5.0, 11.0))
            .with_target(Vec3::new(0.0, 1.0, 0.0))
    }

    fn assert_within_limits(c: &OrbitController) {
        let l = c.limits();
        let d = c.pose().distance();
        let p = c.pose().polar_angle();
        assert!(d >= l.min_distance - TOL && d <= l.max_distance + TOL, "distance {d}");
        assert!(p >= l.min_polar_angle - TOL && p <= l.max_polar_angle + TOL, "polar {p}");
    }

    #[test]
    fn initial_pose_inside_limits_is_kept() {
        let c = OrbitController::new(viewer_pose(), viewer_limits());
        assert!((c.pose().position - Vec3::new(4.0, 5.0, 11.0)).length() < TOL);
        assert_within_limits(&c);
    }

    #[test]
    fn initial_pose_outside_limits_is_clamped() {
        let pose = CameraPose::new(45.0, 1.0, 1.0, 100.0, Vec3::new(0.0, 50.0, 1.0));
        let c = OrbitController::new(pose, viewer_limits());
        assert_within_limits(&c);
        assert!((c.pose().distance() - 20.0).abs() < TOL);
    }

    #[test]
    fn no_input_no_motion() {
        let mut c = OrbitController::new(viewer_pose(), viewer_limits());
        assert!(!c.tick(1.0 / 60.0));
    }

    #[test]
    fn apply_alone_does_not_move_camera() {
        let mut c = OrbitController::new(viewer_pose(), viewer_limits());
        let before = *c.pose();
        c.apply(&CameraAction::Orbit(Vec2::new(100.0, 0.0)), 720);
        assert_eq!(*c.pose(), before);
        assert!(c.tick(1.0 / 60.0));
        assert_ne!(*c.pose(), before);
    }

    #[test]
    fn damping_spreads_motion_over_ticks() {
        let mut damped = OrbitController::new(viewer_pose(), viewer_limits());
        let mut instant = OrbitController::new(
            viewer_pose(),
            ControllerLimits {
                damping_enabled: false,
                ..viewer_limits()
            },
        );
        let action = CameraAction::Orbit(Vec2::new(60.0, 0.0));
        damped.apply(&action, 720);
        instant.apply(&action, 720);

        instant.tick(1.0 / 60.0);
        assert!(!instant.is_settling());

        damped.tick(1.0 / 60.0);
        assert!(damped.is_settling());
        let first_gap = (damped.pose().position - instant.pose().position).length();
        assert!(first_gap > 0.1);

        for _ in 0..600 {
            damped.tick(1.0 / 60.0);
        }
        let final_gap = (damped.pose().position - instant.pose().position).length();
        assert!(final_gap < 1e-2, "gap {final_gap}");
    }

    #[test]
    fn damping_is_frame_rate_independent() {
        let mut at_60 = OrbitController::new(viewer_pose(), viewer_limits());
        let mut at_30 = OrbitController::new(viewer_pose(), viewer_limits());
        let action = CameraAction::Orbit(Vec2::new(-80.0, 0.0));
        at_60.apply(&action, 720);
        at_30.apply(&action, 720);
        for _ in 0..30 {
            at_60.tick(1.0 / 60.0);
        }
        for _ in 0..15 {
            at_30.tick(1.0 / 30.0);
        }
        assert!((at_60.pose().position - at_30.pose().position).length() < 1e-3);
    }

    #[test]
    fn zoom_is_clamped_to_distance_range() {
        let mut c = OrbitController::new(viewer_pose(), viewer_limits());
        c.apply(&CameraAction::Zoom(-500.0), 720);
        for _ in 0..300 {
            c.tick(1.0 / 60.0);
            assert_within_limits(&c);
        }
        assert!((c.pose().distance() - 5.0).abs() < TOL);

        c.apply(&CameraAction::Zoom(500.0), 720);
        for _ in 0..300 {
            c.tick(1.0 / 60.0);
        }
        assert!((c.pose().distance() - 20.0).abs() < TOL);
    }

    #[test]
    fn pan_is_ignored_when_disabled() {
        let mut c = OrbitController::new(viewer_pose(), viewer_limits());
        c.apply(&CameraAction::Pan(Vec2::new(300.0, 300.0)), 720);
        assert!(!c.is_settling());
        c.tick(1.0 / 60.0);
        assert_eq!(c.pose().target, Vec3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn pan_moves_target_when_enabled() {
        let mut c = OrbitController::new(
            viewer_pose(),
            ControllerLimits {
                pan_enabled: true,
                damping_enabled: false,
                ..viewer_limits()
            },
        );
        let distance = c.pose().distance();
        c.apply(&CameraAction::Pan(Vec2::new(100.0, 0.0)), 720);
        c.tick(1.0 / 60.0);
        assert_ne!(c.pose().target, Vec3::new(0.0, 1.0, 0.0));
        assert!((c.pose().distance() - distance).abs() < TOL);
    }

    #[test]
    fn auto_rotate_turns_without_input() {
        let mut c = OrbitController::new(
            viewer_pose(),
            ControllerLimits {
                auto_rotate: true,
                damping_enabled: false,
                ..viewer_limits()
            },
        );
        let before = c.pose().position;
        assert!(c.tick(0.5));
        assert_ne!(c.pose().position, before);
        assert!((c.pose().distance() - (before - c.pose().target).length()).abs() < TOL);
    }

    #[test]
    fn limits_hold_for_arbitrary_input_sequences() {
        // Deterministic pseudo-random walk over all action kinds.
        let mut state = 0x2545_f491_4f6c_dd1du64;
        let mut next = || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state % 2001) as f32 - 1000.0
        };

        for damping in [true, false] {
            let mut c = OrbitController::new(
                viewer_pose(),
                ControllerLimits {
                    damping_enabled: damping,
                    pan_enabled: true,
                    ..viewer_limits()
                },
            );
            for i in 0..2000 {
                let action = match i % 3 {
                    0 => CameraAction::Orbit(Vec2::new(next(), next())),
                    1 => CameraAction::Zoom(next() / 100.0),
                    _ => CameraAction::Pan(Vec2::new(next(), next())),
                };
                c.apply(&action, 720);
                c.tick((next().abs() / 1000.0) * 0.1);
                assert_within_limits(&c);
            }
        }
    }

    #[test]
    fn swapped_limits_are_reordered() {
        let c = OrbitController::new(
            viewer_pose(),
            ControllerLimits {
                min_distance: 20.0,
                max_distance: 5.0,
                ..viewer_limits()
            },
        );
        assert_eq!(c.limits().min_distance, 5.0);
        assert_eq!(c.limits().max_distance, 20.0);
    }

    #[test]
    fn resize_only_touches_aspect() {
        let mut c = OrbitController::new(viewer_pose(), viewer_limits());
        let before = *c.pose();
        c.set_aspect(1.0);
        assert_eq!(c.pose().aspect, 1.0);
        assert_eq!(c.pose().position, before.position);
    }

    #[test]
    fn wrap_angle_range() {
        for a in [-10.0f32, -PI, 0.0, PI, 3.5, 100.0] {
            let w = wrap_angle(a);
            assert!(w > -PI - 1e-6 && w <= PI + 1e-6);
            assert!(((w - a) / TAU - ((w - a) / TAU).round()).abs() < 1e-4);
        }
    }
}
