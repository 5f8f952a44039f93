//! Spring configuration
//!
//! Physical parameters shared by every segment of a spring's trajectory,
//! plus the termination policy (clamping and rest thresholds).
//! Supports preset configurations and custom spring parameters.

use crate::error::{Result, SpringError};
use serde::{Deserialize, Serialize};

/// Tolerance on the damping ratio under which a spring counts as critically damped
pub(crate) const CRITICAL_TOLERANCE: f64 = 1e-9;

/// Closed-form regime a spring is evaluated in
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Regime {
    /// Damping ratio below one: decaying oscillation
    Underdamped,
    /// Damping ratio of exactly one: fastest settle without oscillation
    CriticallyDamped,
    /// Damping ratio above one: slow exponential approach
    Overdamped,
    /// Zero stiffness or non-positive mass: no motion at all
    Degenerate,
}

/// Configuration for a spring animation
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpringConfig {
    pub stiffness: f64,
    pub damping: f64,
    pub mass: f64,
    /// When false, damping ratios above one are evaluated as critically damped
    pub allows_overdamping: bool,
    /// Stop the animation the moment it crosses its target
    pub clamp: bool,
    /// Speed (units per millisecond) under which the spring may rest
    pub rest_velocity_threshold: f64,
    /// Distance from the target under which the spring may rest
    pub rest_displacement_threshold: f64,
}

impl SpringConfig {
    /// Create a new spring configuration with default flags and thresholds
    pub fn new(stiffness: f64, damping: f64, mass: f64) -> Self {
        Self {
            stiffness,
            damping,
            mass,
            ..Self::default()
        }
    }

    /// A gentle, slow spring (good for page transitions)
    pub fn gentle() -> Self {
        Self::new(120.0, 14.0, 1.0)
    }

    /// A wobbly spring with overshoot (good for playful UI)
    pub fn wobbly() -> Self {
        Self::new(180.0, 12.0, 1.0)
    }

    /// A stiff, snappy spring (good for buttons)
    pub fn stiff() -> Self {
        Self::new(400.0, 30.0, 1.0)
    }

    /// A very stiff spring with minimal oscillation (good for quick responses)
    pub fn snappy() -> Self {
        Self::new(600.0, 40.0, 1.0)
    }

    /// A slow spring with no overshoot (critically damped)
    pub fn molasses() -> Self {
        Self::new(100.0, 20.0, 1.0)
    }

    pub fn with_clamp(mut self, clamp: bool) -> Self {
        self.clamp = clamp;
        self
    }

    pub fn with_overdamping(mut self, allows_overdamping: bool) -> Self {
        self.allows_overdamping = allows_overdamping;
        self
    }

    pub fn with_rest_thresholds(mut self, velocity: f64, displacement: f64) -> Self {
        self.rest_velocity_threshold = velocity;
        self.rest_displacement_threshold = displacement;
        self
    }

    /// Reject parameters that would make the physics undefined
    ///
    /// Zero stiffness is accepted: it is a recognised degenerate mode where
    /// the spring never moves.
    pub fn validate(&self) -> Result<()> {
        if !(self.mass > 0.0) || !self.mass.is_finite() {
            return Err(SpringError::NonPositiveMass(self.mass));
        }
        let non_negative = [
            ("stiffness", self.stiffness),
            ("damping", self.damping),
            ("rest_velocity_threshold", self.rest_velocity_threshold),
            ("rest_displacement_threshold", self.rest_displacement_threshold),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(SpringError::InvalidParameter { name, value });
            }
        }
        Ok(())
    }

    /// Calculate critical damping for this spring's stiffness and mass
    pub fn critical_damping(&self) -> f64 {
        2.0 * (self.stiffness * self.mass).sqrt()
    }

    /// Raw damping ratio, before the overdamping gate is applied
    ///
    /// Returns `None` for degenerate springs.
    pub fn damping_ratio(&self) -> Option<f64> {
        if self.is_degenerate() {
            return None;
        }
        Some(self.damping / self.critical_damping())
    }

    /// Damping ratio the solver actually uses
    pub fn effective_damping_ratio(&self) -> Option<f64> {
        self.damping_ratio().map(|zeta| {
            if zeta > 1.0 && !self.allows_overdamping {
                1.0
            } else {
                zeta
            }
        })
    }

    /// Regime the solver will evaluate this spring in
    pub fn regime(&self) -> Regime {
        match self.effective_damping_ratio() {
            None => Regime::Degenerate,
            Some(zeta) if (zeta - 1.0).abs() <= CRITICAL_TOLERANCE => Regime::CriticallyDamped,
            Some(zeta) if zeta < 1.0 => Regime::Underdamped,
            Some(_) => Regime::Overdamped,
        }
    }

    /// Check if the spring is underdamped (will oscillate)
    pub fn is_underdamped(&self) -> bool {
        self.regime() == Regime::Underdamped
    }

    /// No spring force or no inertia: nothing ever moves
    pub fn is_degenerate(&self) -> bool {
        self.stiffness == 0.0 || !(self.mass > 0.0)
    }
}

impl Default for SpringConfig {
    fn default() -> Self {
        Self {
            stiffness: 100.0,
            damping: 10.0,
            mass: 1.0,
            allows_overdamping: false,
            clamp: false,
            rest_velocity_threshold: 0.001,
            rest_displacement_threshold: 0.001,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spring_presets() {
        // Playful presets oscillate
        assert!(SpringConfig::wobbly().is_underdamped());
        assert!(SpringConfig::gentle().is_underdamped());
        assert!(SpringConfig::stiff().is_underdamped());

        assert_eq!(SpringConfig::molasses().regime(), Regime::CriticallyDamped);
    }

    #[test]
    fn test_overdamping_gate() {
        let heavy = SpringConfig::new(100.0, 60.0, 1.0);
        assert_eq!(heavy.damping_ratio(), Some(3.0));
        assert_eq!(heavy.regime(), Regime::CriticallyDamped);

        let allowed = heavy.with_overdamping(true);
        assert_eq!(allowed.regime(), Regime::Overdamped);
    }

    #[test]
    fn test_degenerate_configs() {
        assert_eq!(SpringConfig::new(0.0, 10.0, 1.0).regime(), Regime::Degenerate);
        assert_eq!(SpringConfig::new(0.0, 10.0, 1.0).damping_ratio(), None);
        assert!(SpringConfig::new(0.0, 10.0, 1.0).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_mass() {
        assert_eq!(
            SpringConfig::new(100.0, 10.0, 0.0).validate(),
            Err(SpringError::NonPositiveMass(0.0))
        );
        assert!(SpringConfig::new(100.0, 10.0, -1.0).validate().is_err());
        assert!(SpringConfig::new(100.0, 10.0, f64::NAN).validate().is_err());
    }

    #[test]
    fn test_validate_rejects_negative_parameters() {
        let err = SpringConfig::new(100.0, -1.0, 1.0).validate().unwrap_err();
        assert_eq!(
            err,
            SpringError::InvalidParameter {
                name: "damping",
                value: -1.0
            }
        );

        let err = SpringConfig::default()
            .with_rest_thresholds(f64::INFINITY, 0.001)
            .validate()
            .unwrap_err();
        assert!(matches!(
            err,
            SpringError::InvalidParameter {
                name: "rest_velocity_threshold",
                ..
            }
        ));
    }

    #[test]
    fn test_partial_config_from_toml() {
        let config: SpringConfig = toml::from_str(
            r#"
            stiffness = 180.0
            damping = 12.0
            clamp = true
            "#,
        )
        .unwrap();

        assert_eq!(config.stiffness, 180.0);
        assert_eq!(config.damping, 12.0);
        assert!(config.clamp);
        // Unspecified fields come from defaults
        assert_eq!(config.mass, 1.0);
        assert_eq!(config.rest_velocity_threshold, 0.001);
        assert!(!config.allows_overdamping);
    }
}
