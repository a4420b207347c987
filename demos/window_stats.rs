//! Window statistics for a synthetic trajectory
//!
//! Builds a helix trajectory, windows it with several parameter sets and
//! prints how many samples each produces, plus the relative poses of the
//! first window.
//!
//! Usage:
//!   cargo run --example window_stats -- [frames]

use glam::{DMat3, DVec3};
use seqvo::data::pose::from_parts;
use seqvo::{DatasetIndex, Sequence, WindowParams};
use std::error::Error;
use std::path::PathBuf;
use tracing::info;

fn helix(id: &str, frames: usize) -> Result<Sequence, Box<dyn Error>> {
    let poses = (0..frames)
        .map(|i| {
            let yaw = 0.05 * i as f64;
            let position = DVec3::new(10.0 * yaw.cos(), 10.0 * yaw.sin(), 0.02 * i as f64);
            from_parts(DMat3::from_rotation_z(yaw), position)
        })
        .collect();
    let paths = (0..frames)
        .map(|i| PathBuf::from(format!("{id}/{i:06}.png")))
        .collect();
    Ok(Sequence::new(id, poses, paths)?)
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let frames: usize = match std::env::args().nth(1) {
        Some(arg) => arg.parse()?,
        None => 200,
    };
    let sequences = vec![helix("00", frames)?, helix("01", frames / 2)?];

    for (length, overlap, repeats) in [(2, 0, 1), (6, 1, 1), (6, 1, 3), (12, 4, 2)] {
        let params = WindowParams::new(length, overlap, repeats)?;
        let index = DatasetIndex::build(&sequences, params)?;
        info!(
            "length={} overlap={} repeats={} offsets={:?}: {} windows over {} frames",
            length,
            overlap,
            repeats,
            params.start_offsets(),
            index.len(),
            index.unique_image_paths().len()
        );
    }

    let index = DatasetIndex::build(&sequences, WindowParams::new(4, 1, 1)?)?;
    let first = index.get(0)?;
    for (k, pose) in first.relative_poses()?.iter().enumerate() {
        info!("{} -> {}: {:?}", k, k + 1, pose.to_array());
    }

    Ok(())
}
