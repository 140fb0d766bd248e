//! # Delve
//!
//! Headless encounter driver. Loads agent tuning, builds an arena from an
//! ASCII map, runs it for a fixed number of ticks, and logs what the agents
//! do.
//!
//! Usage: `delve [tuning.toml] [ticks]`

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

mod arena;

use anyhow::{Context, Result};
use arena::Arena;
use delve_common::Timestamp;
use delve_gameplay::AgentTuning;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Default tuning file.
const DEFAULT_TUNING: &str = "delve.toml";
/// Default number of ticks.
const DEFAULT_TICKS: u64 = 3_600;
/// Simulated time per tick.
const TICK: Duration = Duration::from_millis(16);
/// How long the player stays invisible mid-run.
const BREATHER: Duration = Duration::from_secs(3);
/// Seed for agent randomness.
const SEED: u64 = 0x00de_17e0;

const MAP: &str = "
    ####################
    #..........#.......#
    #..w.......#...a...#
    #..........#.......#
    #....####..........#
    #....#..#....P.....#
    #....#..#..........#
    #.r.....####..m....#
    #..................#
    #.......W..........#
    ####################
";

/// Main entry point.
fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("delve=info".parse()?))
        .init();

    info!("Delve starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut args = std::env::args().skip(1);
    let tuning_path = args.next().unwrap_or_else(|| DEFAULT_TUNING.to_string());
    let ticks = match args.next() {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("invalid tick count {raw:?}"))?,
        None => DEFAULT_TICKS,
    };

    let tuning = AgentTuning::load_or_default(&tuning_path);
    let mut arena = Arena::from_map(MAP, tuning, SEED).context("failed to build arena")?;
    // Give the player a breather halfway through.
    let half = halfway(ticks);
    arena.set_invisible_window(half, half + BREATHER);

    let summary = arena.run(ticks, TICK);

    info!(
        "Ran {} ticks: {} attacks, {} hits taken, {} hits dealt, {} kills",
        summary.ticks, summary.attacks, summary.hits_taken, summary.hits_dealt, summary.kills
    );
    if summary.player_defeated {
        info!("The player fell");
    } else {
        info!("The player survived with {} HP", arena.player().hp());
    }
    info!("Agents still standing: {}", arena.encounter().alive_count());
    info!("Delve shutdown complete");
    Ok(())
}

/// Simulated time halfway through a run of `ticks`.
fn halfway(ticks: u64) -> Timestamp {
    Timestamp::from_millis(ticks.saturating_mul(TICK.as_millis() as u64) / 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_halfway_point() {
        assert_eq!(halfway(DEFAULT_TICKS), Timestamp::from_millis(28_800));
        assert_eq!(halfway(0), Timestamp::ZERO);
    }

    #[test]
    fn test_halfway_saturates_on_huge_tick_counts() {
        assert_eq!(halfway(u64::MAX), Timestamp::from_millis(u64::MAX / 2));
        let start = halfway(u64::MAX);
        assert!(start + BREATHER > start);
    }
}
