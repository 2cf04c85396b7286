use crate::messages::{Header, Image, ImageEncoding};
use image::DynamicImage;
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;
use std::time::Duration;
use tracking_core::error::{TrackingError, TrackingResult};
use tracking_core::params::ParamStore;
use tracking_core::{Hub, StopHandle};

pub const DEFAULT_PLAYBACK_RATE_HZ: f64 = 10.0;
pub const DEFAULT_FRAME_ID: &str = "camera";

const FRAME_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "tiff"];
const SUBSCRIBER_POLL: Duration = Duration::from_millis(5);

/// Where and how fast to replay frames from disk
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackConfig {
    pub image_dir: PathBuf,
    pub rate_hz: f64,
    /// Grayscale label PNG sent once, latched, before the first frame
    pub initial_mask: Option<PathBuf>,
    pub frame_id: String,
    pub loop_playback: bool,
    /// Stop the scheduler once every frame was sent
    pub stop_when_done: bool,
}

impl PlaybackConfig {
    /// Read `~playback/*`; `None` when no image directory is configured
    pub fn from_params(params: &ParamStore) -> TrackingResult<Option<Self>> {
        let Some(image_dir) = params.get::<String>("~playback/image_dir")? else {
            return Ok(None);
        };
        let rate_hz = params.get_f64("~playback/rate", DEFAULT_PLAYBACK_RATE_HZ)?;
        if !(rate_hz > 0.0 && rate_hz.is_finite()) {
            return Err(TrackingError::Config(format!(
                "~playback/rate must be positive, got {}",
                rate_hz
            )));
        }

        Ok(Some(Self {
            image_dir: PathBuf::from(image_dir),
            rate_hz,
            initial_mask: params
                .get::<String>("~playback/initial_mask")?
                .map(PathBuf::from),
            frame_id: params.get_string("~playback/frame_id", DEFAULT_FRAME_ID)?,
            loop_playback: params.get_bool("~playback/loop", false)?,
            stop_when_done: params.get_bool("~playback/stop_when_done", true)?,
        }))
    }
}

/// Image files of a directory, sorted by file name
pub fn frame_paths(dir: &Path) -> TrackingResult<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_frame = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if path.is_file() && is_frame {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

fn open_image(path: &Path) -> TrackingResult<DynamicImage> {
    image::open(path).map_err(|e| TrackingError::Image(format!("{}: {}", path.display(), e)))
}

/// Load a color frame as an `rgb8` message
pub fn load_frame(path: &Path, header: Header) -> TrackingResult<Image> {
    let rgb = open_image(path)?.to_rgb8();
    let (width, height) = rgb.dimensions();
    Image::from_raw(header, width, height, ImageEncoding::Rgb8, rgb.into_raw())
}

/// Load a label PNG as a `32SC1` mask message
///
/// 8- and 16-bit grayscale files keep their values; anything else is
/// converted to 8-bit luma first.
pub fn load_mask(path: &Path, header: Header) -> TrackingResult<Image> {
    let (width, height, labels): (u32, u32, Vec<i32>) = match open_image(path)? {
        DynamicImage::ImageLuma16(gray) => (
            gray.width(),
            gray.height(),
            gray.into_raw().into_iter().map(i32::from).collect(),
        ),
        other => {
            let gray = other.to_luma8();
            (
                gray.width(),
                gray.height(),
                gray.into_raw().into_iter().map(i32::from).collect(),
            )
        }
    };
    let data = labels.iter().flat_map(|label| label.to_le_bytes()).collect();
    Image::from_raw(header, width, height, ImageEncoding::Type32SC1, data)
}

/// Replays a directory of frames onto a topic
///
/// Stands in for a camera driver when a node runs standalone. Each frame is
/// held back until the image topic has a subscriber, so frames are not lost
/// while a node is still initializing.
pub struct ImagePlayer {
    config: PlaybackConfig,
    image_publisher: Hub<Image>,
    mask_publisher: Option<Hub<Image>>,
}

impl ImagePlayer {
    /// `mask_topic` receives `initial_mask`, when one is configured
    pub fn new(
        config: PlaybackConfig,
        image_topic: &str,
        mask_topic: Option<&str>,
    ) -> TrackingResult<Self> {
        let mask_publisher = match (&config.initial_mask, mask_topic) {
            (Some(_), Some(topic)) => Some(Hub::publisher(topic)?.latched()),
            _ => None,
        };
        Ok(Self {
            image_publisher: Hub::publisher(image_topic)?,
            mask_publisher,
            config,
        })
    }

    fn wait_for_subscriber(&self, stop: &StopHandle) -> bool {
        while self.image_publisher.subscriber_count() == 0 {
            if !stop.is_running() {
                return false;
            }
            std::thread::sleep(SUBSCRIBER_POLL);
        }
        true
    }

    /// Publish every frame, returning how many were sent
    pub fn run(&self, stop: &StopHandle) -> TrackingResult<usize> {
        let paths = frame_paths(&self.config.image_dir)?;
        if paths.is_empty() {
            return Err(TrackingError::Config(format!(
                "No images found in {}",
                self.config.image_dir.display()
            )));
        }

        if let (Some(path), Some(publisher)) = (&self.config.initial_mask, &self.mask_publisher) {
            let mask = load_mask(path, Header::new(&self.config.frame_id))?;
            tracing::info!(
                topic = publisher.get_topic_name(),
                mask = %path.display(),
                "Initial mask published"
            );
            publisher.send(mask, &mut None);
        }

        tracing::info!(
            topic = self.image_publisher.get_topic_name(),
            frames = paths.len(),
            rate_hz = self.config.rate_hz,
            "Starting playback of {}",
            self.config.image_dir.display()
        );

        let period = Duration::from_secs_f64(1.0 / self.config.rate_hz);
        let mut sent = 0usize;
        'playback: loop {
            for (seq, path) in paths.iter().enumerate() {
                if !self.wait_for_subscriber(stop) {
                    break 'playback;
                }
                let mut header = Header::new(&self.config.frame_id);
                header.seq = seq as u32;
                self.image_publisher.send(load_frame(path, header)?, &mut None);
                sent += 1;
                std::thread::sleep(period);
            }
            if !self.config.loop_playback {
                break;
            }
        }

        tracing::info!(frames = sent, "Playback finished");
        Ok(sent)
    }

    /// Run on a background thread; stops the scheduler afterwards when configured to
    pub fn spawn(self, stop: StopHandle) -> JoinHandle<TrackingResult<usize>> {
        std::thread::spawn(move || {
            let result = self.run(&stop);
            if let Err(e) = &result {
                tracing::error!("Playback failed: {}", e);
            }
            if self.config.stop_when_done {
                // Leave the last frame time to be processed
                let grace = Duration::from_secs_f64(1.0 / self.config.rate_hz);
                std::thread::sleep(grace.max(Duration::from_millis(500)));
                stop.stop();
            }
            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage};

    #[test]
    fn test_frame_paths_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["0002.png", "0001.png", "notes.txt", "0003.JPG"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        let names: Vec<String> = frame_paths(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["0001.png", "0002.png", "0003.JPG"]);
    }

    #[test]
    fn test_load_frame_as_rgb8() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        RgbImage::from_pixel(3, 2, Rgb([10, 20, 30])).save(&path).unwrap();

        let msg = load_frame(&path, Header::new("cam")).unwrap();
        assert_eq!((msg.width, msg.height), (3, 2));
        assert_eq!(msg.encoding, ImageEncoding::Rgb8);
        assert_eq!(&msg.data[..3], &[10, 20, 30]);
    }

    #[test]
    fn test_load_mask_keeps_labels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mask.png");
        let mut gray = GrayImage::new(2, 1);
        gray.put_pixel(1, 0, Luma([3]));
        gray.save(&path).unwrap();

        let msg = load_mask(&path, Header::new("cam")).unwrap();
        assert_eq!(msg.encoding, ImageEncoding::Type32SC1);
        assert_eq!(msg.data, vec![0, 0, 0, 0, 3, 0, 0, 0]);
    }

    #[test]
    fn test_playback_disabled_without_dir() {
        let params = ParamStore::new("player_test_disabled");
        assert_eq!(PlaybackConfig::from_params(&params).unwrap(), None);
    }

    #[test]
    fn test_playback_rejects_zero_rate() {
        let params = ParamStore::new("player_test_rate");
        params.set("~playback/image_dir", "/tmp/frames").unwrap();
        params.set("~playback/rate", 0.0).unwrap();
        assert!(matches!(
            PlaybackConfig::from_params(&params),
            Err(TrackingError::Config(_))
        ));
    }
}
