//! Cutie video object segmentation node
//!
//! ```text
//! cutie_node _model_path:=models/cutie_step.onnx ~input_image:=/camera/rgb/image_raw
//! ```
//!
//! Waits for an initial mask on `~input_segmentation` and a frame on
//! `~input_image`, then publishes `~output/segmentation` and
//! `~output/segmentation_image` for every following frame.

use anyhow::Context;
use tracking_library::nodes::cutie_node::DEFAULT_NODE_NAME;
use tracking_library::nodes::CutieNode;
use tracking_ros::{
    add_recorder, init_logging, load_node_args, node_scheduler, run_scheduler, start_playback,
};

fn main() -> anyhow::Result<()> {
    init_logging();

    let (args, params) = load_node_args(DEFAULT_NODE_NAME)?;
    let node =
        CutieNode::from_params(&args, &params).context("Failed to create the tracking node")?;
    let topics = node.topics().clone();

    let mut scheduler = node_scheduler(&args, &params)?;
    let log_topics = params
        .get_bool("~log_topics", false)
        .context("Invalid ~log_topics")?;
    scheduler.add(Box::new(node), 0, Some(log_topics));

    add_recorder(
        &mut scheduler,
        &params,
        &[
            topics.output_segmentation.clone(),
            topics.output_visualization.clone(),
        ],
    )
    .context("Failed to set up recording")?;
    let playback = start_playback(
        &scheduler,
        &params,
        &topics.input_image,
        Some(&topics.input_segmentation),
    )
    .context("Failed to set up playback")?;

    run_scheduler(scheduler, playback)
}
