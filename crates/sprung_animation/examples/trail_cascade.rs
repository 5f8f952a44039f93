//! Trail Cascade Demo
//!
//! Drives a 7-slot trail on a simulated 60 Hz frame loop and logs each
//! slot's position every few frames.
//!
//! Run with: `RUST_LOG=debug cargo run -p sprung_animation --example trail_cascade`

use anyhow::Result;
use sprung_animation::{SpringConfig, Trail, TrailConfig};
use sprung_core::{Clock, ManualFrameLoop};
use std::rc::Rc;

const SLOTS: usize = 7;
const MAX_FRAMES: usize = 600;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let frames = Rc::new(ManualFrameLoop::new());
    let config = TrailConfig::new(SLOTS, 50.0).with_spring(SpringConfig::wobbly());
    let trail = Trail::new(frames.clone(), [("x", 0.0), ("opacity", 0.0)], config)?;

    trail.set([("x", 240.0), ("opacity", 1.0)])?;

    let mut frame = 0;
    while frame < MAX_FRAMES && frames.has_pending() {
        frames.step_frame();
        frame += 1;

        if frame % 6 == 0 {
            let xs: Vec<String> = trail
                .values()
                .iter()
                .map(|record| format!("{:7.2}", record["x"]))
                .collect();
            tracing::info!("{:7.1}ms  x = [{}]", frames.now_ms(), xs.join(" "));
        }
    }

    tracing::info!(
        "Trail settled after {} frames ({:.0}ms)",
        frame,
        frames.now_ms()
    );

    // Snap everything back for the next cascade
    trail.hard_set([("x", 0.0), ("opacity", 0.0)])?;
    tracing::info!("Reset: {:?}", trail.slot(0).map(|slot| slot.values()));

    Ok(())
}
