//! Simulation parameters and submission-time clamping.
//!
//! Inputs are kept as raw text while the user types (see [`ParameterForm`]) and
//! only clamped when a Start or Update is submitted.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default body count shown in a fresh form.
pub const DEFAULT_NUM_BODIES: &str = "5";

/// Default gravity shown in a fresh form (Newton's constant).
pub const DEFAULT_GRAVITY: &str = "6.674e-11";

/// Upper bounds applied at submission.
///
/// The gravity bound is a UI-level range, unrelated to physical units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClampBounds {
    /// Largest body count that can be submitted
    pub max_bodies: u32,
    /// Largest gravity value that can be submitted
    pub max_gravity: f64,
}

impl Default for ClampBounds {
    fn default() -> Self {
        Self {
            max_bodies: 1000,
            max_gravity: 1000.0,
        }
    }
}

/// Parameters carried by Start and Update commands.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationParameters {
    #[serde(rename = "numBodies")]
    pub num_bodies: u32,
    pub gravity: f64,
}

/// Unvalidated numeric input; `None` means absent, non-numeric or non-finite.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RawParameters {
    pub num_bodies: Option<f64>,
    pub gravity: Option<f64>,
}

impl RawParameters {
    pub fn new(num_bodies: f64, gravity: f64) -> Self {
        Self {
            num_bodies: Some(num_bodies),
            gravity: Some(gravity),
        }
    }

    /// Parse both fields from text the way a numeric input reads its value.
    pub fn parse(num_bodies: &str, gravity: &str) -> Self {
        Self {
            num_bodies: parse_number(num_bodies),
            gravity: parse_number(gravity),
        }
    }

    /// Clamp into submittable parameters.
    pub fn clamp(&self, bounds: &ClampBounds) -> SimulationParameters {
        let params = clamp(self.num_bodies, self.gravity, bounds);
        if self.num_bodies != Some(params.num_bodies as f64) || self.gravity != Some(params.gravity) {
            debug!(
                "clamped parameters {:?}/{:?} to {}/{}",
                self.num_bodies, self.gravity, params.num_bodies, params.gravity
            );
        }
        params
    }
}

fn parse_number(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Clamp a body count and gravity into `[0, max]`.
///
/// Absent, NaN or non-positive values become 0; values at or above the bound
/// become the bound. Body counts are truncated toward zero.
pub fn clamp(num_bodies: Option<f64>, gravity: Option<f64>, bounds: &ClampBounds) -> SimulationParameters {
    let max_bodies = bounds.max_bodies as f64;
    let num_bodies = match num_bodies {
        Some(n) if n.is_nan() || n <= 0.0 => 0,
        Some(n) if n >= max_bodies => bounds.max_bodies,
        Some(n) => n.trunc() as u32,
        None => 0,
    };

    let gravity = match gravity {
        Some(g) if g.is_nan() || g <= 0.0 => 0.0,
        Some(g) if g >= bounds.max_gravity => bounds.max_gravity,
        Some(g) => g,
        None => 0.0,
    };

    SimulationParameters { num_bodies, gravity }
}

/// Keystroke-time form state. Edits are stored verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterForm {
    pub num_bodies: String,
    pub gravity: String,
}

impl Default for ParameterForm {
    fn default() -> Self {
        Self {
            num_bodies: DEFAULT_NUM_BODIES.to_string(),
            gravity: DEFAULT_GRAVITY.to_string(),
        }
    }
}

impl ParameterForm {
    pub fn set_num_bodies(&mut self, text: impl Into<String>) {
        self.num_bodies = text.into();
    }

    pub fn set_gravity(&mut self, text: impl Into<String>) {
        self.gravity = text.into();
    }

    /// Current input as typed, parsed but not clamped.
    pub fn raw(&self) -> RawParameters {
        RawParameters::parse(&self.num_bodies, &self.gravity)
    }

    /// Parse and clamp for submission.
    pub fn submit(&self, bounds: &ClampBounds) -> SimulationParameters {
        self.raw().clamp(bounds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn bounds() -> ClampBounds {
        ClampBounds::default()
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let p = clamp(Some(1500.0), Some(-5.0), &bounds());
        assert_eq!(p, SimulationParameters { num_bodies: 1000, gravity: 0.0 });

        let p = clamp(Some(-3.0), Some(2000.0), &bounds());
        assert_eq!(p, SimulationParameters { num_bodies: 0, gravity: 1000.0 });
    }

    #[test]
    fn absent_and_nan_become_zero() {
        let p = clamp(None, None, &bounds());
        assert_eq!(p.num_bodies, 0);
        assert_eq!(p.gravity, 0.0);

        let p = clamp(Some(f64::NAN), Some(f64::NAN), &bounds());
        assert_eq!(p.num_bodies, 0);
        assert_eq!(p.gravity, 0.0);
    }

    #[test]
    fn fractional_body_count_truncates() {
        assert_eq!(clamp(Some(3.9), Some(1.0), &bounds()).num_bodies, 3);
    }

    #[test]
    fn gravity_inside_range_is_kept() {
        let p = clamp(Some(5.0), Some(6.674e-11), &bounds());
        assert_eq!(p.gravity, 6.674e-11);
    }

    #[test]
    fn custom_bounds() {
        let b = ClampBounds { max_bodies: 50, max_gravity: 2.5 };
        assert_eq!(clamp(Some(75.0), Some(3.0), &b), SimulationParameters { num_bodies: 50, gravity: 2.5 });
    }

    #[test]
    fn parse_handles_text_input() {
        let raw = RawParameters::parse(" 500 ", "2");
        assert_eq!(raw, RawParameters::new(500.0, 2.0));

        let raw = RawParameters::parse("", "abc");
        assert_eq!(raw, RawParameters::default());
    }

    #[test]
    fn non_finite_text_is_absent() {
        assert_eq!(RawParameters::parse("inf", "-infinity"), RawParameters::default());
        assert_eq!(RawParameters::parse("NaN", "1e400"), RawParameters::default());

        let mut form = ParameterForm::default();
        form.set_num_bodies("Infinity");
        assert_eq!(form.submit(&bounds()).num_bodies, 0);
    }

    #[test]
    fn form_stores_edits_unclamped() {
        let mut form = ParameterForm::default();
        assert_eq!(form.num_bodies, "5");

        form.set_num_bodies("5000");
        form.set_gravity("-1");
        assert_eq!(form.num_bodies, "5000");
        assert_eq!(form.raw().num_bodies, Some(5000.0));

        let submitted = form.submit(&bounds());
        assert_eq!(submitted, SimulationParameters { num_bodies: 1000, gravity: 0.0 });
    }

    proptest! {
        #[test]
        fn body_count_always_in_range(n in any::<i64>(), g in any::<f64>()) {
            let p = clamp(Some(n as f64), Some(g), &bounds());
            prop_assert!(p.num_bodies <= 1000);
            prop_assert!((0.0..=1000.0).contains(&p.gravity));
        }

        #[test]
        fn body_count_identity_inside_range(n in 1u32..1000) {
            let p = clamp(Some(n as f64), Some(1.0), &bounds());
            prop_assert_eq!(p.num_bodies, n);
        }
    }
}
