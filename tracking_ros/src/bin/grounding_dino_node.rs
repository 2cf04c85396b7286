//! Grounding DINO open-vocabulary detection node
//!
//! ```text
//! grounding_dino_node _model_path:=models/groundingdino_swint.onnx \
//!     _tokenizer_path:=models/bert-base-uncased/tokenizer.json _classes:="cup; bottle"
//! ```
//!
//! Publishes `~output/labels`, `~output/class`, `~output/rects` and
//! `~output/output_image` for every frame on `~input_image` while any of
//! them has a subscriber. New settings are accepted on `~set_parameters`.

use anyhow::Context;
use tracking_library::nodes::grounding_dino_node::DEFAULT_NODE_NAME;
use tracking_library::nodes::GroundingDinoNode;
use tracking_ros::{
    add_recorder, init_logging, load_node_args, node_scheduler, run_scheduler, start_playback,
};

fn main() -> anyhow::Result<()> {
    init_logging();

    let (args, params) = load_node_args(DEFAULT_NODE_NAME)?;
    let node = GroundingDinoNode::from_params(&args, &params)
        .context("Failed to create the detection node")?;
    let topics = node.topics().clone();

    let mut scheduler = node_scheduler(&args, &params)?;
    let log_topics = params
        .get_bool("~log_topics", false)
        .context("Invalid ~log_topics")?;
    scheduler.add(Box::new(node), 0, Some(log_topics));

    add_recorder(&mut scheduler, &params, &[topics.output_image.clone()])
        .context("Failed to set up recording")?;
    let playback = start_playback(&scheduler, &params, &topics.input_image, None)
        .context("Failed to set up playback")?;

    run_scheduler(scheduler, playback)
}
