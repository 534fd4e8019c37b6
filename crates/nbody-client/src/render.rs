//! Mapping from simulation snapshots to scene-space drawables.

use serde::{Deserialize, Serialize};

use crate::protocol::Body;
use crate::zoom::CameraPose;

/// Simulation units per scene unit.
pub const SCENE_SCALE: f64 = 1.0;

/// Scene radius per unit of mass.
pub const RADIUS_PER_MASS: f64 = 0.1;

/// Smallest radius that stays visible.
pub const MIN_RADIUS: f64 = 0.02;

/// RGBA, each channel in `[0, 1]`.
pub type Color = [f32; 4];

/// Default body color (blue).
pub const BODY_COLOR: Color = [0.0, 0.0, 1.0, 1.0];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RenderConfig {
    pub scale: f64,
    pub radius_per_mass: f64,
    pub min_radius: f64,
    pub color: Color,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            scale: SCENE_SCALE,
            radius_per_mass: RADIUS_PER_MASS,
            min_radius: MIN_RADIUS,
            color: BODY_COLOR,
        }
    }
}

/// One circle/sphere for the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Drawable {
    pub scene_x: f64,
    pub scene_y: f64,
    pub radius: f64,
    pub color: Color,
}

/// Everything a renderer needs for one pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub camera: CameraPose,
    pub drawables: Vec<Drawable>,
}

impl Frame {
    pub fn is_empty(&self) -> bool {
        self.drawables.is_empty()
    }
}

/// Stateless snapshot-to-scene mapper.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderMapper {
    config: RenderConfig,
}

impl RenderMapper {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    fn radius(&self, mass: f64) -> f64 {
        let radius = mass * self.config.radius_per_mass;
        if radius.is_finite() {
            radius.max(self.config.min_radius)
        } else {
            self.config.min_radius
        }
    }

    pub fn drawable(&self, body: &Body) -> Drawable {
        Drawable {
            scene_x: body.x / self.config.scale,
            scene_y: body.y / self.config.scale,
            radius: self.radius(body.mass),
            color: self.config.color,
        }
    }

    /// One drawable per body, in snapshot order.
    pub fn to_drawables(&self, snapshot: &[Body]) -> Vec<Drawable> {
        snapshot.iter().map(|body| self.drawable(body)).collect()
    }

    /// Drawables plus the camera pose for `zoom`.
    pub fn frame(&self, snapshot: &[Body], zoom: f64) -> Frame {
        Frame {
            camera: CameraPose::for_zoom(zoom),
            drawables: self.to_drawables(snapshot),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(x: f64, y: f64, mass: f64) -> Body {
        Body { x, y, vx: 0.0, vy: 0.0, mass }
    }

    #[test]
    fn preserves_order_and_count() {
        let mapper = RenderMapper::default();
        let snapshot = vec![body(1.0, 0.0, 1.0), body(2.0, 0.0, 1.0), body(3.0, 0.0, 1.0)];
        let drawables = mapper.to_drawables(&snapshot);

        assert_eq!(drawables.len(), 3);
        let xs: Vec<f64> = drawables.iter().map(|d| d.scene_x).collect();
        assert_eq!(xs, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn positions_are_divided_by_scale() {
        let mapper = RenderMapper::new(RenderConfig { scale: 100.0, ..Default::default() });
        let d = mapper.drawable(&body(250.0, -50.0, 1.0));
        assert_eq!(d.scene_x, 2.5);
        assert_eq!(d.scene_y, -0.5);
    }

    #[test]
    fn radius_is_proportional_to_mass() {
        let mapper = RenderMapper::default();
        assert_eq!(mapper.drawable(&body(0.0, 0.0, 2.0)).radius, 0.2);
        assert_eq!(mapper.drawable(&body(0.0, 0.0, 10.0)).radius, 1.0);
    }

    #[test]
    fn degenerate_mass_gets_min_radius() {
        let mapper = RenderMapper::default();
        assert_eq!(mapper.drawable(&body(0.0, 0.0, 0.0)).radius, MIN_RADIUS);
        assert_eq!(mapper.drawable(&body(0.0, 0.0, -4.0)).radius, MIN_RADIUS);
        assert_eq!(mapper.drawable(&body(0.0, 0.0, 1e-9)).radius, MIN_RADIUS);
        assert_eq!(mapper.drawable(&body(0.0, 0.0, f64::INFINITY)).radius, MIN_RADIUS);
    }

    #[test]
    fn empty_snapshot_maps_to_empty_frame() {
        let frame = RenderMapper::default().frame(&[], 5.0);
        assert!(frame.is_empty());
        assert_eq!(frame.camera.position, [0.0, 0.0, 5.0]);
    }

    #[test]
    fn calls_are_independent() {
        let mapper = RenderMapper::default();
        let a = mapper.to_drawables(&[body(1.0, 1.0, 1.0)]);
        let b = mapper.to_drawables(&[body(1.0, 1.0, 1.0)]);
        assert_eq!(a, b);
    }
}
