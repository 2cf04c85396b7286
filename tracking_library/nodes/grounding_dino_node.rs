use crate::algorithms::nms::{suppress, Detection};
use crate::messages::{
    ClassificationResult, GroundingDinoReconfig, Header, Image, Label, LabelArray, Rect, RectArray,
};
use crate::models::{DetectionPredictor, DetectionSettings, GroundingDinoConfig};
use crate::vision::{image_to_rgb, rgb_to_image, BoxAnnotator, BoxLabel, LabelFont};
use tracking_core::error::{TrackingError, TrackingResult};
use tracking_core::names::NodeArgs;
use tracking_core::params::ParamStore;
use tracking_core::{Hub, Node, NodeInfo, NodeInfoExt, TopicMetadata};

pub const DEFAULT_NODE_NAME: &str = "grounding_dino_node";

/// Resolved topic names of the detection node
#[derive(Debug, Clone, PartialEq)]
pub struct GroundingDinoTopics {
    pub input_image: String,
    pub set_parameters: String,
    pub parameter_updates: String,
    pub labels: String,
    pub class: String,
    pub rects: String,
    pub output_image: String,
}

impl GroundingDinoTopics {
    pub fn resolve(args: &NodeArgs) -> Self {
        Self {
            input_image: args.resolve("~input_image"),
            set_parameters: args.resolve("~set_parameters"),
            parameter_updates: args.resolve("~parameter_updates"),
            labels: args.resolve("~output/labels"),
            class: args.resolve("~output/class"),
            rects: args.resolve("~output/rects"),
            output_image: args.resolve("~output/output_image"),
        }
    }
}

/// Everything published for one frame
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionFrame {
    pub labels: LabelArray,
    pub class: ClassificationResult,
    pub rects: RectArray,
    pub output_image: Image,
}

/// Grounding DINO Node - open-vocabulary object detection
///
/// Detects the configured class vocabulary in every frame, removes
/// overlapping boxes with class-agnostic NMS, and publishes labels, a
/// classification summary, boxes and an annotated image.
///
/// The input stream is only subscribed while one of the outputs has a
/// subscriber, unless `~always_subscribe` is set. Settings sent on
/// `~set_parameters` take effect from the next frame on and are echoed on the
/// latched `~parameter_updates` topic.
pub struct GroundingDinoNode {
    name: String,
    model_name: String,
    predictor: Box<dyn DetectionPredictor>,
    settings: DetectionSettings,
    always_subscribe: bool,
    topics: GroundingDinoTopics,

    image_subscriber: Option<Hub<Image>>,
    reconfig_subscriber: Hub<GroundingDinoReconfig>,
    updates_publisher: Hub<GroundingDinoReconfig>,
    labels_publisher: Hub<LabelArray>,
    class_publisher: Hub<ClassificationResult>,
    rects_publisher: Hub<RectArray>,
    image_publisher: Hub<Image>,

    annotator: BoxAnnotator,
    frames_processed: u64,
}

impl GroundingDinoNode {
    /// Create a detection node around an already loaded predictor
    pub fn new(
        args: &NodeArgs,
        config: &GroundingDinoConfig,
        predictor: Box<dyn DetectionPredictor>,
        always_subscribe: bool,
    ) -> TrackingResult<Self> {
        let topics = GroundingDinoTopics::resolve(args);
        Ok(Self {
            name: args.node_name().to_string(),
            model_name: config.model_name.clone(),
            predictor,
            settings: config.initial_settings.clone(),
            always_subscribe,
            image_subscriber: None,
            reconfig_subscriber: Hub::new(&topics.set_parameters)?,
            updates_publisher: Hub::publisher(&topics.parameter_updates)?.latched(),
            labels_publisher: Hub::publisher(&topics.labels)?,
            class_publisher: Hub::publisher(&topics.class)?,
            rects_publisher: Hub::publisher(&topics.rects)?,
            image_publisher: Hub::publisher(&topics.output_image)?,
            topics,
            annotator: BoxAnnotator::new().with_font(LabelFont::resolve(config.font_path.as_deref())?),
            frames_processed: 0,
        })
    }

    /// Read the configuration from `~` parameters and load the model
    pub fn from_params(args: &NodeArgs, params: &ParamStore) -> TrackingResult<Self> {
        let config = GroundingDinoConfig::from_params(params)?;
        let predictor = config.get_predictor()?;
        let always_subscribe = params.get_bool("~always_subscribe", false)?;
        Self::new(args, &config, predictor, always_subscribe)
    }

    pub fn topics(&self) -> &GroundingDinoTopics {
        &self.topics
    }

    pub fn settings(&self) -> &DetectionSettings {
        &self.settings
    }

    pub fn is_subscribed(&self) -> bool {
        self.image_subscriber.is_some()
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    /// Replace the active settings as a whole
    pub fn apply_reconfig(&mut self, msg: &GroundingDinoReconfig) -> &DetectionSettings {
        self.settings = self.settings.reconfigured(msg);
        &self.settings
    }

    fn has_downstream(&self) -> bool {
        self.labels_publisher.subscriber_count() > 0
            || self.class_publisher.subscriber_count() > 0
            || self.rects_publisher.subscriber_count() > 0
            || self.image_publisher.subscriber_count() > 0
    }

    /// Subscribe or unsubscribe the input stream to follow downstream demand
    fn update_connection(&mut self, ctx: &mut Option<&mut NodeInfo>) -> TrackingResult<()> {
        let wanted = self.always_subscribe || self.has_downstream();
        match (wanted, self.image_subscriber.is_some()) {
            (true, false) => {
                self.image_subscriber = Some(Hub::new(&self.topics.input_image)?);
                ctx.log_info(&format!("Subscribed to {}", self.topics.input_image));
            }
            (false, true) => {
                self.image_subscriber = None;
                ctx.log_info(&format!(
                    "No subscribers left, unsubscribed from {}",
                    self.topics.input_image
                ));
            }
            _ => {}
        }
        Ok(())
    }

    /// Detect, suppress and annotate one frame with the given settings
    pub fn detect(
        &mut self,
        msg: &Image,
        settings: &DetectionSettings,
    ) -> TrackingResult<DetectionFrame> {
        let rgb = image_to_rgb(msg)?;
        let classes = &settings.classes;

        let detections = if classes.is_empty() {
            Vec::new()
        } else {
            self.predictor.predict_with_classes(
                &rgb,
                classes,
                settings.box_threshold,
                settings.text_threshold,
            )?
        };
        if let Some(bad) = detections.iter().find(|d| d.class_id >= classes.len()) {
            return Err(TrackingError::Inference(format!(
                "Detection class id {} is outside {} classes",
                bad.class_id,
                classes.len()
            )));
        }
        let kept: Vec<Detection> = suppress(&detections, settings.nms_threshold);
        let class_ids: Vec<usize> = kept
            .iter()
            .map(|d| first_class_index(classes, d.class_id))
            .collect();

        let box_labels: Vec<BoxLabel> = kept
            .iter()
            .zip(&class_ids)
            .map(|(d, &class_id)| {
                let text = format!("{} {:.2}", classes[d.class_id], d.confidence);
                BoxLabel::new(d.bbox, class_id, text)
            })
            .collect();
        let annotated = self.annotator.annotate(&rgb, &box_labels);

        let header = Header::derived_from(&msg.header);
        let labels = LabelArray {
            header: header.clone(),
            labels: kept
                .iter()
                .enumerate()
                .map(|(i, d)| Label {
                    id: i as i32 + 1,
                    name: classes[d.class_id].clone(),
                })
                .collect(),
        };
        let class = ClassificationResult {
            header: labels.header.clone(),
            classifier: self.model_name.clone(),
            target_names: classes.clone(),
            labels: class_ids.iter().map(|&id| id as i32).collect(),
            label_names: kept.iter().map(|d| classes[d.class_id].clone()).collect(),
            label_proba: kept.iter().map(|d| d.confidence as f64).collect(),
        };
        let rects = RectArray {
            header: header.clone(),
            rects: kept
                .iter()
                .map(|d| Rect::from_xyxy(d.bbox.x1, d.bbox.y1, d.bbox.x2, d.bbox.y2))
                .collect(),
        };

        Ok(DetectionFrame {
            labels,
            class,
            rects,
            output_image: rgb_to_image(&annotated, header),
        })
    }

    fn publish(&self, frame: DetectionFrame, ctx: &mut Option<&mut NodeInfo>) {
        self.labels_publisher.send(frame.labels, ctx);
        self.class_publisher.send(frame.class, ctx);
        self.rects_publisher.send(frame.rects, ctx);
        self.image_publisher.send(frame.output_image, ctx);
    }
}

/// Index of the first class with the same name, so repeated prompts share an id
pub fn first_class_index(classes: &[String], class_id: usize) -> usize {
    classes
        .get(class_id)
        .and_then(|name| classes.iter().position(|c| c == name))
        .unwrap_or(class_id)
}

impl Node for GroundingDinoNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&mut self, ctx: &mut NodeInfo) -> TrackingResult<()> {
        ctx.log_info(&format!(
            "{} ready with classes {:?}",
            self.model_name, self.settings.classes
        ));
        self.updates_publisher
            .send(self.settings.to_reconfig(), &mut Some(ctx));
        Ok(())
    }

    fn tick(&mut self, mut ctx: Option<&mut NodeInfo>) {
        // Reconfiguration lands between frames
        while let Some(reconfig) = self.reconfig_subscriber.recv(&mut ctx) {
            let applied = self.apply_reconfig(&reconfig).to_reconfig();
            ctx.log_info(&format!(
                "Detection settings updated: classes={:?} box={:.2} text={:.2} nms={:.2}",
                self.settings.classes,
                self.settings.box_threshold,
                self.settings.text_threshold,
                self.settings.nms_threshold
            ));
            self.updates_publisher.send(applied, &mut ctx);
        }

        if let Err(e) = self.update_connection(&mut ctx) {
            ctx.fail_tick(&format!("Cannot subscribe to {}: {}", self.topics.input_image, e));
            return;
        }

        let Some(frame) = self
            .image_subscriber
            .as_ref()
            .and_then(|subscriber| subscriber.recv(&mut ctx))
        else {
            return;
        };

        let settings = self.settings.clone();
        match self.detect(&frame, &settings) {
            Ok(result) => {
                self.frames_processed += 1;
                self.publish(result, &mut ctx);
            }
            Err(e) => ctx.fail_tick(&format!(
                "Detection failed on frame {}: {}",
                frame.header.seq, e
            )),
        }
    }

    fn shutdown(&mut self, ctx: &mut NodeInfo) -> TrackingResult<()> {
        self.image_subscriber = None;
        ctx.log_info(&format!("Processed {} frames", self.frames_processed));
        Ok(())
    }

    fn get_publishers(&self) -> Vec<TopicMetadata> {
        vec![
            TopicMetadata::of::<LabelArray>(&self.topics.labels),
            TopicMetadata::of::<ClassificationResult>(&self.topics.class),
            TopicMetadata::of::<RectArray>(&self.topics.rects),
            TopicMetadata::of::<Image>(&self.topics.output_image),
            TopicMetadata::of::<GroundingDinoReconfig>(&self.topics.parameter_updates),
        ]
    }

    fn get_subscribers(&self) -> Vec<TopicMetadata> {
        vec![
            TopicMetadata::of::<Image>(&self.topics.input_image),
            TopicMetadata::of::<GroundingDinoReconfig>(&self.topics.set_parameters),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topics_under_node_namespace() {
        let args = NodeArgs::new("detector").with_remap("~input_image", "camera/image");
        let topics = GroundingDinoTopics::resolve(&args);

        assert_eq!(topics.input_image, "/camera/image");
        assert_eq!(topics.set_parameters, "/detector/set_parameters");
        assert_eq!(topics.labels, "/detector/output/labels");
        assert_eq!(topics.output_image, "/detector/output/output_image");
    }

    #[test]
    fn test_repeated_class_maps_to_first_index() {
        let classes = DetectionSettings::parse_classes("cup;bottle;cup");
        assert_eq!(first_class_index(&classes, 0), 0);
        assert_eq!(first_class_index(&classes, 1), 1);
        assert_eq!(first_class_index(&classes, 2), 0);
        assert_eq!(first_class_index(&classes, 7), 7);
    }
}
