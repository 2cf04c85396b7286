//! Replays a directory of frames to node processes over shared memory
//!
//! ```text
//! image_publisher _playback/image_dir:=data/frames _playback/initial_mask:=data/mask.png \
//!     ~output/image:=/cutie_node/input_image ~output/initial_mask:=/cutie_node/input_segmentation
//! ```
//!
//! Each frame waits for a subscriber on `~output/image`, in any process. The
//! initial mask is latched and replayed to late subscribers while this
//! process runs.

use anyhow::Context;
use tracking_ros::{init_logging, load_node_args, node_scheduler, run_scheduler, start_playback};

const DEFAULT_NODE_NAME: &str = "image_publisher";

fn main() -> anyhow::Result<()> {
    init_logging();

    let (args, params) = load_node_args(DEFAULT_NODE_NAME)?;
    let image_topic = args.resolve("~output/image");
    let mask_topic = args.resolve("~output/initial_mask");

    // No nodes; the scheduler only handles Ctrl+C until playback stops it
    let scheduler = node_scheduler(&args, &params)?;
    let playback = start_playback(&scheduler, &params, &image_topic, Some(&mask_topic))
        .context("Failed to set up playback")?
        .context("_playback/image_dir is required")?;

    run_scheduler(scheduler, Some(playback))
}
