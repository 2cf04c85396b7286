use crate::algorithms::{argmax_labels, foreground_boxes, one_hot_foreground};
use crate::messages::{Header, Image};
use crate::models::{CutieConfig, SegmentationPredictor};
use crate::vision::{
    image_to_chw_tensor, image_to_mask, image_to_rgb, mask_to_image, overlay_davis, rgb_to_image,
    BoxAnnotator, BoxLabel, LabelFont, DEFAULT_ALPHA,
};
use ndarray::Array2;
use tracking_core::error::{TrackingError, TrackingResult};
use tracking_core::names::NodeArgs;
use tracking_core::params::ParamStore;
use tracking_core::{wait_for_message, Hub, Node, NodeInfo, NodeInfoExt, TopicMetadata};

pub const DEFAULT_NODE_NAME: &str = "cutie_node";

/// Resolved topic names of the tracking node
#[derive(Debug, Clone, PartialEq)]
pub struct CutieTopics {
    pub input_image: String,
    pub input_segmentation: String,
    pub output_segmentation: String,
    pub output_visualization: String,
}

impl CutieTopics {
    pub fn resolve(args: &NodeArgs) -> Self {
        Self {
            input_image: args.resolve("~input_image"),
            input_segmentation: args.resolve("~input_segmentation"),
            output_segmentation: args.resolve("~output/segmentation"),
            output_visualization: args.resolve("~output/segmentation_image"),
        }
    }
}

/// Tracker lifecycle; there is no way back to `Uninitialized`
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerState {
    Uninitialized,
    Tracking {
        /// Labels of the seed mask, in channel order
        object_labels: Vec<i32>,
        /// Latest predicted label map
        mask: Array2<i32>,
    },
}

/// Cutie Node - video object segmentation seeded from one labelled mask
///
/// `init` blocks until a mask arrives on `~input_segmentation` and a frame on
/// `~input_image`, seeds the tracker with them, and only then subscribes to
/// the image stream. Every later frame is propagated and published as a
/// `32SC1` label map plus an overlay visualization.
pub struct CutieNode {
    name: String,
    config: CutieConfig,
    predictor: Box<dyn SegmentationPredictor>,
    topics: CutieTopics,

    image_subscriber: Option<Hub<Image>>,
    segmentation_publisher: Hub<Image>,
    visualization_publisher: Hub<Image>,

    annotator: BoxAnnotator,
    state: TrackerState,
    frames_tracked: u64,
}

impl CutieNode {
    /// Create a tracking node around an already loaded predictor
    pub fn new(
        args: &NodeArgs,
        config: CutieConfig,
        predictor: Box<dyn SegmentationPredictor>,
    ) -> TrackingResult<Self> {
        let topics = CutieTopics::resolve(args);
        let font = if config.with_bbox {
            LabelFont::resolve(config.font_path.as_deref())?
        } else {
            None
        };
        Ok(Self {
            name: args.node_name().to_string(),
            config,
            predictor,
            segmentation_publisher: Hub::publisher(&topics.output_segmentation)?,
            visualization_publisher: Hub::publisher(&topics.output_visualization)?,
            topics,
            image_subscriber: None,
            annotator: BoxAnnotator::new().with_font(font),
            state: TrackerState::Uninitialized,
            frames_tracked: 0,
        })
    }

    /// Read the configuration from `~` parameters and load the model
    pub fn from_params(args: &NodeArgs, params: &ParamStore) -> TrackingResult<Self> {
        let config = CutieConfig::from_params(params)?;
        let predictor = config.get_predictor()?;
        Self::new(args, config, predictor)
    }

    pub fn topics(&self) -> &CutieTopics {
        &self.topics
    }

    pub fn state(&self) -> &TrackerState {
        &self.state
    }

    /// Latest label map, once tracking
    pub fn mask(&self) -> Option<&Array2<i32>> {
        match &self.state {
            TrackerState::Tracking { mask, .. } => Some(mask),
            TrackerState::Uninitialized => None,
        }
    }

    pub fn frames_tracked(&self) -> u64 {
        self.frames_tracked
    }

    /// Seed the tracker from the initial mask and frame
    ///
    /// Waits for the mask first, then the frame. Without `init_timeout` both
    /// waits are unbounded.
    pub fn initialize(&mut self, ctx: &mut NodeInfo) -> TrackingResult<()> {
        ctx.log_info(&format!(
            "Waiting for the initial mask on {}",
            self.topics.input_segmentation
        ));
        let mask_msg: Image =
            wait_for_message(&self.topics.input_segmentation, self.config.init_timeout)?;
        ctx.log_info(&format!(
            "Waiting for the initial frame on {}",
            self.topics.input_image
        ));
        let image_msg: Image =
            wait_for_message(&self.topics.input_image, self.config.init_timeout)?;

        let seed_mask = image_to_mask(&mask_msg)?;
        let rgb = image_to_rgb(&image_msg)?;
        if seed_mask.dim() != (rgb.height() as usize, rgb.width() as usize) {
            return Err(TrackingError::InvalidInput(format!(
                "Initial mask is {}x{} but the frame is {}x{}",
                seed_mask.ncols(),
                seed_mask.nrows(),
                rgb.width(),
                rgb.height()
            )));
        }

        let (object_labels, planes) = one_hot_foreground(seed_mask.view());
        let prob = self
            .predictor
            .step(image_to_chw_tensor(&rgb).view(), Some(planes.view()))?;
        let tracked = self.predictor.num_objects();
        if tracked != object_labels.len() {
            return Err(TrackingError::Inference(format!(
                "Tracker holds {} objects after seeding with {}",
                tracked,
                object_labels.len()
            )));
        }
        let mask = argmax_labels(prob.view());

        ctx.log_info(&format!(
            "Tracker seeded with {} objects (labels {:?})",
            object_labels.len(),
            object_labels
        ));
        self.state = TrackerState::Tracking {
            object_labels,
            mask,
        };
        Ok(())
    }

    /// Track one frame, returning the label map and its visualization
    pub fn track(&mut self, msg: &Image) -> TrackingResult<(Image, Image)> {
        let num_objects = match &self.state {
            TrackerState::Tracking { object_labels, .. } => object_labels.len(),
            TrackerState::Uninitialized => {
                return Err(TrackingError::Internal(
                    "Frame received before the tracker was seeded".to_string(),
                ))
            }
        };

        let rgb = image_to_rgb(msg)?;
        let prob = self.predictor.step(image_to_chw_tensor(&rgb).view(), None)?;
        let (channels, height, width) = prob.dim();
        if channels != num_objects + 1 {
            return Err(TrackingError::Inference(format!(
                "Predictor returned {} channels for {} objects",
                channels, num_objects
            )));
        }
        if (height, width) != (rgb.height() as usize, rgb.width() as usize) {
            return Err(TrackingError::Inference(format!(
                "Predictor returned {}x{} probabilities for a {}x{} frame",
                width,
                height,
                rgb.width(),
                rgb.height()
            )));
        }

        let mask = argmax_labels(prob.view());
        let mut visualization = overlay_davis(&rgb, mask.view(), DEFAULT_ALPHA)?;
        if self.config.with_bbox {
            let labels = object_box_labels(&mask);
            visualization = self.annotator.annotate(&visualization, &labels);
        }

        let header = Header::derived_from(&msg.header);
        let segmentation = mask_to_image(&mask, header.clone());
        let visualization = rgb_to_image(&visualization, header);

        if let TrackerState::Tracking { mask: current, .. } = &mut self.state {
            *current = mask;
        }
        self.frames_tracked += 1;
        Ok((segmentation, visualization))
    }
}

/// One box per foreground label, annotated with its zero-based object index
pub fn object_box_labels(mask: &Array2<i32>) -> Vec<BoxLabel> {
    foreground_boxes(mask.view())
        .into_iter()
        .enumerate()
        .map(|(index, (_, bbox))| {
            BoxLabel::new(bbox, index, format!("ObjectID : {}", index))
        })
        .collect()
}

impl Node for CutieNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&mut self, ctx: &mut NodeInfo) -> TrackingResult<()> {
        self.initialize(ctx)?;
        self.image_subscriber = Some(Hub::new(&self.topics.input_image)?);
        ctx.log_info(&format!("Tracking frames from {}", self.topics.input_image));
        Ok(())
    }

    fn tick(&mut self, mut ctx: Option<&mut NodeInfo>) {
        let Some(subscriber) = &self.image_subscriber else {
            return;
        };
        let Some(frame) = subscriber.recv(&mut ctx) else {
            return;
        };

        match self.track(&frame) {
            Ok((segmentation, visualization)) => {
                self.segmentation_publisher.send(segmentation, &mut ctx);
                self.visualization_publisher.send(visualization, &mut ctx);
            }
            Err(e) => ctx.fail_tick(&format!(
                "Tracking failed on frame {}: {}",
                frame.header.seq, e
            )),
        }
    }

    fn shutdown(&mut self, ctx: &mut NodeInfo) -> TrackingResult<()> {
        self.image_subscriber = None;
        ctx.log_info(&format!("Tracked {} frames", self.frames_tracked));
        Ok(())
    }

    fn get_publishers(&self) -> Vec<TopicMetadata> {
        vec![
            TopicMetadata::of::<Image>(&self.topics.output_segmentation),
            TopicMetadata::of::<Image>(&self.topics.output_visualization),
        ]
    }

    fn get_subscribers(&self) -> Vec<TopicMetadata> {
        vec![
            TopicMetadata::of::<Image>(&self.topics.input_image),
            TopicMetadata::of::<Image>(&self.topics.input_segmentation),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_object_labels_follow_label_order() {
        let mask = array![
            [0, 1, 0, 3],
            [0, 1, 2, 3],
            [0, 0, 2, 0],
        ];
        let labels = object_box_labels(&mask);
        let texts: Vec<_> = labels.iter().filter_map(|l| l.text.as_deref()).collect();

        assert_eq!(texts, vec!["ObjectID : 0", "ObjectID : 1", "ObjectID : 2"]);
        assert_eq!(labels[1].color_index, 1);
    }

    #[test]
    fn test_background_only_has_no_labels() {
        assert!(object_box_labels(&Array2::zeros((4, 4))).is_empty());
    }

    #[test]
    fn test_topics_under_node_namespace() {
        let args = NodeArgs::new("tracker").with_remap("~input_image", "/camera/rgb");
        let topics = CutieTopics::resolve(&args);

        assert_eq!(topics.input_image, "/camera/rgb");
        assert_eq!(topics.input_segmentation, "/tracker/input_segmentation");
        assert_eq!(topics.output_segmentation, "/tracker/output/segmentation");
        assert_eq!(topics.output_visualization, "/tracker/output/segmentation_image");
    }
}
