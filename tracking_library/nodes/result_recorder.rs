use crate::messages::Image;
use crate::vision::{image_to_mask, image_to_rgb};
use image::{ImageBuffer, Luma};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracking_core::error::{TrackingError, TrackingResult};
use tracking_core::params::ParamStore;
use tracking_core::{Hub, Node, NodeInfo, NodeInfoExt, TopicMetadata};

/// File name for the `seq`-th image recorded from `topic`
///
/// `/cutie_node/output/segmentation`, 7 → `cutie_node_output_segmentation_000007.png`
pub fn record_file_name(topic: &str, seq: u64) -> String {
    let stem = topic.trim_start_matches('/').replace('/', "_");
    format!("{}_{:06}.png", stem, seq)
}

/// Encode an image message as PNG
///
/// Label maps are stored as 16-bit grayscale (labels clamped to `0..=65535`),
/// everything else as 8-bit RGB.
pub fn save_png(msg: &Image, path: &Path) -> TrackingResult<()> {
    let result = if msg.encoding.is_label_map() {
        let mask = image_to_mask(msg)?;
        let (height, width) = mask.dim();
        let pixels: Vec<u16> = mask
            .iter()
            .map(|&label| label.clamp(0, u16::MAX as i32) as u16)
            .collect();
        let gray: ImageBuffer<Luma<u16>, Vec<u16>> =
            ImageBuffer::from_raw(width as u32, height as u32, pixels).ok_or_else(|| {
                TrackingError::Image(format!("Cannot build a {}x{} label image", width, height))
            })?;
        gray.save(path)
    } else {
        image_to_rgb(msg)?.save(path)
    };
    result.map_err(|e| TrackingError::Image(format!("{}: {}", path.display(), e)))
}

/// Result Recorder Node - writes every image seen on a set of topics to disk
///
/// Files are named `<topic>_<seq>.png`, `seq` counting the images received
/// per topic.
pub struct ResultRecorderNode {
    name: String,
    output_dir: PathBuf,
    subscribers: Vec<Hub<Image>>,
    counters: HashMap<String, u64>,
}

impl ResultRecorderNode {
    pub fn new(
        name: &str,
        output_dir: impl Into<PathBuf>,
        topics: &[String],
    ) -> TrackingResult<Self> {
        let subscribers = topics
            .iter()
            .map(|topic| Hub::new_with_capacity(topic, 4))
            .collect::<TrackingResult<Vec<_>>>()?;
        Ok(Self {
            name: name.to_string(),
            output_dir: output_dir.into(),
            subscribers,
            counters: HashMap::new(),
        })
    }

    /// Recorder for `topics` when `~record/output_dir` is set
    pub fn from_params(params: &ParamStore, topics: &[String]) -> TrackingResult<Option<Self>> {
        let Some(output_dir) = params.get::<String>("~record/output_dir")? else {
            return Ok(None);
        };
        let name = format!("{}_recorder", params.node_name());
        Self::new(&name, output_dir, topics).map(Some)
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Images written so far, over all topics
    pub fn recorded(&self) -> u64 {
        self.counters.values().sum()
    }

    fn record(&mut self, topic: &str, msg: &Image) -> TrackingResult<PathBuf> {
        let seq = self.counters.get(topic).copied().unwrap_or(0);
        let path = self.output_dir.join(record_file_name(topic, seq));
        save_png(msg, &path)?;
        self.counters.insert(topic.to_string(), seq + 1);
        Ok(path)
    }
}

impl Node for ResultRecorderNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&mut self, ctx: &mut NodeInfo) -> TrackingResult<()> {
        std::fs::create_dir_all(&self.output_dir).map_err(|e| {
            TrackingError::Config(format!(
                "Cannot create record directory {}: {}",
                self.output_dir.display(),
                e
            ))
        })?;
        ctx.log_info(&format!(
            "Recording {} topics to {}",
            self.subscribers.len(),
            self.output_dir.display()
        ));
        Ok(())
    }

    fn tick(&mut self, mut ctx: Option<&mut NodeInfo>) {
        let mut received = Vec::new();
        for subscriber in &self.subscribers {
            while let Some(msg) = subscriber.recv(&mut ctx) {
                received.push((subscriber.get_topic_name().to_string(), msg));
            }
        }

        for (topic, msg) in received {
            match self.record(&topic, &msg) {
                Ok(path) => ctx.log_debug(&format!("Wrote {}", path.display())),
                Err(e) => ctx.fail_tick(&format!("Cannot record {}: {}", topic, e)),
            }
        }
    }

    fn shutdown(&mut self, ctx: &mut NodeInfo) -> TrackingResult<()> {
        ctx.log_info(&format!("Recorded {} images", self.recorded()));
        Ok(())
    }

    fn get_subscribers(&self) -> Vec<TopicMetadata> {
        self.subscribers
            .iter()
            .map(|hub| TopicMetadata::of::<Image>(hub.get_topic_name()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_file_name() {
        assert_eq!(
            record_file_name("/cutie_node/output/segmentation", 7),
            "cutie_node_output_segmentation_000007.png"
        );
    }
}
