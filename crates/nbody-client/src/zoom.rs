//! Zoom slider mapping and the camera pose it drives.

use serde::{Deserialize, Serialize};

/// Zoom at slider position 0.
pub const MIN_ZOOM: f64 = 5.0;

/// Zoom at slider position 100.
pub const MAX_ZOOM: f64 = 50.0;

/// Largest slider position.
pub const SLIDER_MAX: u8 = 100;

/// Vertical field of view of the scene camera, in degrees.
pub const CAMERA_FOV_DEG: f64 = 60.0;

/// Map a slider position to a zoom scalar in `[MIN_ZOOM, MAX_ZOOM]`.
///
/// Positions above [`SLIDER_MAX`] saturate.
pub fn to_zoom(slider: u8) -> f64 {
    let slider = slider.min(SLIDER_MAX) as f64;
    MIN_ZOOM + (slider / SLIDER_MAX as f64) * (MAX_ZOOM - MIN_ZOOM)
}

/// Zoom slider state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoomSetting {
    slider: u8,
}

impl Default for ZoomSetting {
    /// The slider position that reproduces a camera 5 units from the origin.
    fn default() -> Self {
        Self { slider: 0 }
    }
}

impl ZoomSetting {
    pub fn new(slider: u8) -> Self {
        Self { slider: slider.min(SLIDER_MAX) }
    }

    pub fn slider(&self) -> u8 {
        self.slider
    }

    pub fn zoom(&self) -> f64 {
        to_zoom(self.slider)
    }

    /// Zoom rounded for display.
    pub fn label(&self) -> String {
        format!("{:.1}", self.zoom())
    }
}

/// Camera placement for one render pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraPose {
    pub position: [f64; 3],
    pub target: [f64; 3],
    pub fov_deg: f64,
}

impl CameraPose {
    /// Camera on the +z axis at distance `zoom`, looking at the origin.
    pub fn for_zoom(zoom: f64) -> Self {
        Self {
            position: [0.0, 0.0, zoom],
            target: [0.0, 0.0, 0.0],
            fov_deg: CAMERA_FOV_DEG,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn end_points() {
        assert_eq!(to_zoom(0), 5.0);
        assert_eq!(to_zoom(100), 50.0);
        assert_eq!(to_zoom(50), 27.5);
    }

    #[test]
    fn slider_saturates() {
        assert_eq!(to_zoom(200), 50.0);
        assert_eq!(ZoomSetting::new(150).slider(), 100);
    }

    #[test]
    fn label_rounds_for_display() {
        assert_eq!(ZoomSetting::new(20).label(), "14.0");
        assert_eq!(ZoomSetting::new(100).label(), "50.0");
    }

    #[test]
    fn camera_follows_zoom() {
        let pose = CameraPose::for_zoom(ZoomSetting::new(100).zoom());
        assert_eq!(pose.position, [0.0, 0.0, 50.0]);
        assert_eq!(pose.target, [0.0, 0.0, 0.0]);
    }

    proptest! {
        #[test]
        fn zoom_in_range_and_monotonic(s in 0u8..100) {
            let z = to_zoom(s);
            prop_assert!((MIN_ZOOM..=MAX_ZOOM).contains(&z));
            prop_assert!(to_zoom(s + 1) >= z);
        }
    }
}
