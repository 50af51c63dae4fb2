use orbitview_common::Color;
use serde::{Deserialize, Serialize};

/// The drawable surface: logical size, pixel density, clear color.
///
/// Dimensions are never zero; `resize` clamps them to at least one pixel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    width_px: u32,
    height_px: u32,
    pixel_ratio: f32,
    clear_color: Color,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::configure(1280, 720, 1.0, Color::BLACK)
    }
}

impl Viewport {
    pub fn configure(width: u32, height: u32, pixel_ratio: f32, clear_color: Color) -> Self {
        Self {
            width_px: width.max(1),
            height_px: height.max(1),
            pixel_ratio: sanitize_ratio(pixel_ratio),
            clear_color,
        }
    }

    /// Apply a new logical size. Returns `false` if nothing changed.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        let (width, height) = (width.max(1), height.max(1));
        if (width, height) == (self.width_px, self.height_px) {
            return false;
        }
        tracing::debug!(width, height, "viewport resized");
        self.width_px = width;
        self.height_px = height;
        true
    }

    /// Apply a new device pixel ratio. Returns `false` if nothing changed.
    pub fn set_pixel_ratio(&mut self, pixel_ratio: f32) -> bool {
        let pixel_ratio = sanitize_ratio(pixel_ratio);
        if pixel_ratio == self.pixel_ratio {
            return false;
        }
        self.pixel_ratio = pixel_ratio;
        true
    }

    pub fn width(&self) -> u32 {
        self.width_px
    }

    pub fn height(&self) -> u32 {
        self.height_px
    }

    pub fn pixel_ratio(&self) -> f32 {
        self.pixel_ratio
    }

    pub fn clear_color(&self) -> Color {
        self.clear_color
    }

    pub fn aspect(&self) -> f32 {
        self.width_px as f32 / self.height_px as f32
    }

    /// Size of the backing surface in physical pixels.
    pub fn surface_size(&self) -> (u32, u32) {
        let scale = |v: u32| ((v as f32 * self.pixel_ratio).round() as u32).max(1);
        (scale(self.width_px), scale(self.height_px))
    }
}

fn sanitize_ratio(ratio: f32) -> f32 {
    if ratio.is_finite() && ratio > 0.0 {
        ratio
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resize_clamps_to_one_pixel() {
        let mut vp = Viewport::default();
        assert!(vp.resize(0, 0));
        assert_eq!((vp.width(), vp.height()), (1, 1));
        assert_eq!(vp.aspect(), 1.0);

        assert!(vp.resize(800, 0));
        assert_eq!((vp.width(), vp.height()), (800, 1));
        assert_eq!(vp.aspect(), 800.0);
    }

    #[test]
    fn resize_is_idempotent() {
        let mut vp = Viewport::configure(640, 480, 1.0, Color::BLACK);
        assert!(!vp.resize(640, 480));
        assert!(vp.resize(1024, 768));
        assert!(!vp.resize(1024, 768));
        assert!((vp.aspect() - 4.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn surface_size_follows_pixel_ratio() {
        let mut vp = Viewport::configure(800, 600, 2.0, Color::BLACK);
        assert_eq!(vp.surface_size(), (1600, 1200));
        assert!(vp.set_pixel_ratio(1.5));
        assert_eq!(vp.surface_size(), (1200, 900));
        assert!(!vp.set_pixel_ratio(1.5));
        assert!(vp.set_pixel_ratio(f32::NAN));
        assert_eq!(vp.pixel_ratio(), 1.0);
    }

    #[test]
    fn configure_never_yields_zero() {
        let vp = Viewport::configure(0, 0, -3.0, Color::WHITE);
        assert_eq!((vp.width(), vp.height()), (1, 1));
        assert_eq!(vp.pixel_ratio(), 1.0);
        assert_eq!(vp.clear_color(), Color::WHITE);
    }
}
