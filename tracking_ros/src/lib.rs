//! # tracking_ros
//!
//! Process-level glue shared by the `cutie_node`, `grounding_dino_node` and
//! `image_publisher` binaries: logging setup, transport selection, scheduler
//! construction and the optional playback/recording helpers.

use anyhow::{Context, Result};
use std::thread::JoinHandle;
use tracking_core::error::TrackingResult;
use tracking_core::scheduling::DEFAULT_RATE_HZ;
use tracking_core::{set_transport, NodeArgs, ParamStore, Scheduler, Transport};
use tracking_library::nodes::{ImagePlayer, PlaybackConfig, ResultRecorderNode};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Default log filter when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Install the global `tracing` subscriber
///
/// The filter comes from `RUST_LOG` and defaults to [`DEFAULT_LOG_FILTER`].
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Transport used by the binaries when `~transport` is unset
pub const DEFAULT_TRANSPORT: &str = "shm";

/// Parse the command line, load the node's parameters and select the transport
pub fn load_node_args(default_name: &str) -> Result<(NodeArgs, ParamStore)> {
    let args = NodeArgs::from_env(default_name).context("Invalid command-line arguments")?;
    let params = ParamStore::init(&args).context("Failed to load parameters")?;
    match params.source() {
        Some(path) => {
            tracing::info!(node = args.node_name(), "Parameters loaded from {}", path.display())
        }
        None => tracing::info!(node = args.node_name(), "No parameter file found"),
    }

    let transport = read_transport(&params).context("Invalid transport")?;
    set_transport(transport);
    tracing::info!(node = args.node_name(), ?transport, "Topic transport selected");
    Ok((args, params))
}

/// `~transport`: `shm` to reach other processes, `local` for this process only
pub fn read_transport(params: &ParamStore) -> TrackingResult<Transport> {
    params
        .get_string("~transport", DEFAULT_TRANSPORT)?
        .parse()
}

/// Scheduler named after the node, ticking at `~rate` Hz
///
/// `~slow_tick_warning_ms` turns on warnings for ticks slower than that.
pub fn node_scheduler(args: &NodeArgs, params: &ParamStore) -> TrackingResult<Scheduler> {
    let mut scheduler = Scheduler::new()
        .with_name(args.node_name())
        .with_rate(params.get_f64("~rate", DEFAULT_RATE_HZ)?);
    if let Some(limit_ms) = params.get::<u64>("~slow_tick_warning_ms")? {
        scheduler = scheduler.with_slow_tick_warning(limit_ms);
    }
    Ok(scheduler)
}

/// Register a recorder for `topics` when `~record/output_dir` is set
pub fn add_recorder(
    scheduler: &mut Scheduler,
    params: &ParamStore,
    topics: &[String],
) -> TrackingResult<bool> {
    match ResultRecorderNode::from_params(params, topics)? {
        Some(recorder) => {
            scheduler.add(Box::new(recorder), 10, None);
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Start replaying `~playback/image_dir` when it is set
pub fn start_playback(
    scheduler: &Scheduler,
    params: &ParamStore,
    image_topic: &str,
    mask_topic: Option<&str>,
) -> TrackingResult<Option<JoinHandle<TrackingResult<usize>>>> {
    let Some(config) = PlaybackConfig::from_params(params)? else {
        return Ok(None);
    };
    let player = ImagePlayer::new(config, image_topic, mask_topic)?;
    Ok(Some(player.spawn(scheduler.stop_handle())))
}

/// Run until stopped, then collect the playback thread
pub fn run_scheduler(
    mut scheduler: Scheduler,
    playback: Option<JoinHandle<TrackingResult<usize>>>,
) -> Result<()> {
    let name = scheduler.get_name().to_string();
    scheduler
        .run()
        .with_context(|| format!("{} stopped with an error", name))?;

    if let Some(handle) = playback {
        scheduler.stop();
        match handle.join() {
            Ok(Ok(frames)) => tracing::info!(frames, "Playback thread finished"),
            Ok(Err(e)) => return Err(e).context("Playback failed"),
            Err(_) => anyhow::bail!("Playback thread panicked"),
        }
    }
    Ok(())
}
