//! Closed-form damped harmonic oscillator
//!
//! Each segment of a spring's trajectory is evaluated analytically from
//! its start conditions, so one large time step lands on exactly the same
//! state as many small ones. There is no step-wise integration anywhere.
//!
//! Time is in milliseconds and velocity in value units per millisecond,
//! both on input and on output.

use crate::spring::{Regime, SpringConfig};

/// Start conditions of one trajectory segment
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Segment {
    pub from: f64,
    pub to: f64,
    pub velocity: f64,
}

impl Segment {
    pub fn new(from: f64, to: f64, velocity: f64) -> Self {
        Self { from, to, velocity }
    }

    /// A segment that starts and ends at `value` with no motion
    pub fn at_rest(value: f64) -> Self {
        Self::new(value, value, 0.0)
    }

    /// Check whether this segment has anything to animate
    pub fn is_stationary(&self) -> bool {
        self.from == self.to && self.velocity == 0.0
    }
}

/// Position and velocity at one instant
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    pub value: f64,
    pub velocity: f64,
}

/// Evaluate a spring `elapsed_ms` into `segment`
///
/// Degenerate springs (zero stiffness or non-positive mass) stay at
/// `segment.from` with zero velocity.
pub fn solve(config: &SpringConfig, segment: &Segment, elapsed_ms: f64) -> Sample {
    let regime = config.regime();
    let zeta = match config.effective_damping_ratio() {
        Some(zeta) if regime != Regime::Degenerate => zeta,
        _ => {
            return Sample {
                value: segment.from,
                velocity: 0.0,
            }
        }
    };

    let t = elapsed_ms.max(0.0);
    let to = segment.to;
    // Displacement from the target at t = 0
    let x0 = to - segment.from;
    // Rate of approach toward the target
    let v0 = -segment.velocity;
    // Undamped angular frequency (rad/ms)
    let omega0 = (config.stiffness / config.mass).sqrt() / 1000.0;

    match regime {
        Regime::Underdamped => {
            let omega1 = omega0 * (1.0 - zeta * zeta).sqrt();
            let envelope = (-zeta * omega0 * t).exp();
            let (sin, cos) = (omega1 * t).sin_cos();
            let a = (v0 + zeta * omega0 * x0) / omega1;

            let offset = envelope * (a * sin + x0 * cos);
            Sample {
                value: to - offset,
                velocity: zeta * omega0 * offset - envelope * (a * omega1 * cos - x0 * omega1 * sin),
            }
        }
        Regime::CriticallyDamped => {
            let envelope = (-omega0 * t).exp();
            Sample {
                value: to - envelope * (x0 + (v0 + omega0 * x0) * t),
                velocity: envelope * (v0 * (t * omega0 - 1.0) + t * x0 * omega0 * omega0),
            }
        }
        Regime::Overdamped => {
            // Two real decay rates; both roots are negative so neither term can grow
            let omega2 = omega0 * (zeta * zeta - 1.0).sqrt();
            let slow = -zeta * omega0 + omega2;
            let fast = -zeta * omega0 - omega2;
            let d0 = -x0;
            let c_slow = (segment.velocity - fast * d0) / (2.0 * omega2);
            let c_fast = d0 - c_slow;

            let (e_slow, e_fast) = ((slow * t).exp(), (fast * t).exp());
            Sample {
                value: to + c_slow * e_slow + c_fast * e_fast,
                velocity: c_slow * slow * e_slow + c_fast * fast * e_fast,
            }
        }
        Regime::Degenerate => Sample {
            value: segment.from,
            velocity: 0.0,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn assert_close(actual: f64, expected: f64, tolerance: f64) {
        assert!(
            (actual - expected).abs() <= tolerance,
            "expected {expected}, got {actual}"
        );
    }

    /// Central-difference derivative of the solved position
    fn numeric_velocity(config: &SpringConfig, segment: &Segment, t: f64) -> f64 {
        let h = 1e-3;
        (solve(config, segment, t + h).value - solve(config, segment, t - h).value) / (2.0 * h)
    }

    #[test]
    fn test_starts_at_segment_start() {
        let segment = Segment::new(0.0, 100.0, 0.25);
        for config in [
            SpringConfig::wobbly(),
            SpringConfig::molasses(),
            SpringConfig::new(100.0, 60.0, 1.0).with_overdamping(true),
        ] {
            let sample = solve(&config, &segment, 0.0);
            assert_close(sample.value, 0.0, EPS);
            assert_close(sample.velocity, 0.25, EPS);
        }
    }

    #[test]
    fn test_velocity_is_derivative_of_value() {
        let segment = Segment::new(-20.0, 80.0, 0.1);
        for config in [
            SpringConfig::wobbly(),
            SpringConfig::molasses(),
            SpringConfig::new(100.0, 60.0, 2.0).with_overdamping(true),
        ] {
            for t in [16.0, 120.0, 480.0] {
                let analytic = solve(&config, &segment, t).velocity;
                assert_close(analytic, numeric_velocity(&config, &segment, t), 1e-5);
            }
        }
    }

    #[test]
    fn test_converges_to_target() {
        let segment = Segment::new(0.0, 100.0, 0.0);
        for config in [
            SpringConfig::gentle(),
            SpringConfig::stiff(),
            SpringConfig::molasses(),
            SpringConfig::new(100.0, 40.0, 1.0).with_overdamping(true),
        ] {
            let sample = solve(&config, &segment, 10_000.0);
            assert_close(sample.value, 100.0, 1e-3);
            assert_close(sample.velocity, 0.0, 1e-3);
        }
    }

    #[test]
    fn test_underdamped_overshoots() {
        let config = SpringConfig::wobbly();
        let segment = Segment::new(0.0, 10.0, 0.0);
        let peak = (0..200)
            .map(|frame| solve(&config, &segment, frame as f64 * 5.0).value)
            .fold(f64::MIN, f64::max);
        assert!(peak > 10.0);
    }

    #[test]
    fn test_overdamping_gate_matches_critical_closed_form() {
        let segment = Segment::new(0.0, 100.0, 0.0);
        // zeta = 2 without the gate
        let gated = SpringConfig::new(100.0, 40.0, 1.0);
        let critical = SpringConfig::new(100.0, 20.0, 1.0);
        let overdamped = gated.with_overdamping(true);

        let omega0: f64 = 10.0 / 1000.0;
        for t in [10.0, 100.0, 300.0] {
            let expected = 100.0 - (-omega0 * t).exp() * (100.0 + omega0 * 100.0 * t);
            assert_close(solve(&gated, &segment, t).value, expected, 1e-9);
            assert_eq!(solve(&gated, &segment, t), solve(&critical, &segment, t));
            assert!(solve(&overdamped, &segment, t).value < expected);
        }
    }

    #[test]
    fn test_heavily_overdamped_stays_finite() {
        // zeta = 10
        let config = SpringConfig::new(100.0, 200.0, 1.0).with_overdamping(true);
        let segment = Segment::new(0.0, 100.0, 0.0);

        let mut previous = 0.0;
        for t in [0.0, 1_000.0, 7_000.0, 20_000.0, 60_000.0, 1.0e6] {
            let sample = solve(&config, &segment, t);
            assert!(sample.value.is_finite() && sample.velocity.is_finite(), "t={t}");
            assert!(sample.value >= previous - EPS && sample.value <= 100.0 + EPS, "t={t}");
            previous = sample.value;
        }
        assert_close(solve(&config, &segment, 1.0e6).value, 100.0, EPS);
        assert_close(
            solve(&config, &segment, 5_000.0).velocity,
            numeric_velocity(&config, &segment, 5_000.0),
            1e-6,
        );
    }

    #[test]
    fn test_single_large_step_matches_exact_state() {
        let config = SpringConfig::gentle();
        let segment = Segment::new(0.0, 1.0, 0.0);
        // No accumulated error: the same t always yields the same state
        let a = solve(&config, &segment, 733.0);
        let b = solve(&config, &segment, 733.0);
        assert_eq!(a, b);
    }

    #[test]
    fn test_degenerate_spring_stays_put() {
        let segment = Segment::new(5.0, 50.0, 2.0);

        let no_stiffness = SpringConfig::new(0.0, 10.0, 1.0);
        let sample = solve(&no_stiffness, &segment, 1000.0);
        assert_eq!(sample, Sample { value: 5.0, velocity: 0.0 });

        let undamped_no_stiffness = SpringConfig::new(0.0, 0.0, 1.0);
        let sample = solve(&undamped_no_stiffness, &segment, 1000.0);
        assert!(sample.value.is_finite() && sample.velocity.is_finite());

        let massless = SpringConfig::new(100.0, 10.0, 0.0);
        assert_eq!(solve(&massless, &segment, 16.0).value, 5.0);
    }
}
