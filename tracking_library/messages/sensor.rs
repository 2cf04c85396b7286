//! Raw image frames

use super::std_msgs::Header;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracking_core::core::LogSummary;
use tracking_core::error::{TrackingError, TrackingResult};

/// Pixel layout of an [`Image`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageEncoding {
    #[serde(rename = "rgb8")]
    Rgb8,
    #[serde(rename = "bgr8")]
    Bgr8,
    #[serde(rename = "rgba8")]
    Rgba8,
    #[serde(rename = "bgra8")]
    Bgra8,
    #[serde(rename = "mono8")]
    Mono8,
    #[serde(rename = "mono16")]
    Mono16,
    #[serde(rename = "8UC1")]
    Type8UC1,
    #[serde(rename = "16UC1")]
    Type16UC1,
    /// Signed 32-bit label map, used for segmentation masks
    #[serde(rename = "32SC1")]
    Type32SC1,
    #[serde(rename = "32FC1")]
    Type32FC1,
}

impl ImageEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageEncoding::Rgb8 => "rgb8",
            ImageEncoding::Bgr8 => "bgr8",
            ImageEncoding::Rgba8 => "rgba8",
            ImageEncoding::Bgra8 => "bgra8",
            ImageEncoding::Mono8 => "mono8",
            ImageEncoding::Mono16 => "mono16",
            ImageEncoding::Type8UC1 => "8UC1",
            ImageEncoding::Type16UC1 => "16UC1",
            ImageEncoding::Type32SC1 => "32SC1",
            ImageEncoding::Type32FC1 => "32FC1",
        }
    }

    pub fn channels(&self) -> u32 {
        match self {
            ImageEncoding::Rgb8 | ImageEncoding::Bgr8 => 3,
            ImageEncoding::Rgba8 | ImageEncoding::Bgra8 => 4,
            _ => 1,
        }
    }

    pub fn bytes_per_channel(&self) -> u32 {
        match self {
            ImageEncoding::Mono16 | ImageEncoding::Type16UC1 => 2,
            ImageEncoding::Type32SC1 | ImageEncoding::Type32FC1 => 4,
            _ => 1,
        }
    }

    pub fn bytes_per_pixel(&self) -> u32 {
        self.channels() * self.bytes_per_channel()
    }

    /// True for encodings that hold integer labels rather than color
    pub fn is_label_map(&self) -> bool {
        matches!(
            self,
            ImageEncoding::Type32SC1
                | ImageEncoding::Type16UC1
                | ImageEncoding::Mono16
                | ImageEncoding::Type8UC1
                | ImageEncoding::Mono8
        )
    }
}

impl fmt::Display for ImageEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageEncoding {
    type Err = TrackingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rgb8" => Ok(ImageEncoding::Rgb8),
            "bgr8" => Ok(ImageEncoding::Bgr8),
            "rgba8" => Ok(ImageEncoding::Rgba8),
            "bgra8" => Ok(ImageEncoding::Bgra8),
            "mono8" => Ok(ImageEncoding::Mono8),
            "mono16" => Ok(ImageEncoding::Mono16),
            "8UC1" => Ok(ImageEncoding::Type8UC1),
            "16UC1" => Ok(ImageEncoding::Type16UC1),
            "32SC1" => Ok(ImageEncoding::Type32SC1),
            "32FC1" => Ok(ImageEncoding::Type32FC1),
            other => Err(TrackingError::Image(format!("Unsupported encoding '{}'", other))),
        }
    }
}

/// Uncompressed image, row-major, little-endian
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub header: Header,
    pub height: u32,
    pub width: u32,
    pub encoding: ImageEncoding,
    pub is_bigendian: bool,
    /// Row length in bytes
    pub step: u32,
    pub data: Vec<u8>,
}

impl Image {
    /// Build an image, checking that `data` matches the geometry
    pub fn from_raw(
        header: Header,
        width: u32,
        height: u32,
        encoding: ImageEncoding,
        data: Vec<u8>,
    ) -> TrackingResult<Self> {
        let step = width * encoding.bytes_per_pixel();
        let expected = step as usize * height as usize;
        if data.len() != expected {
            return Err(TrackingError::Image(format!(
                "{}x{} {} image needs {} bytes, got {}",
                width,
                height,
                encoding,
                expected,
                data.len()
            )));
        }
        Ok(Self {
            header,
            height,
            width,
            encoding,
            is_bigendian: false,
            step,
            data,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Validate the buffer before decoding it
    pub fn check_layout(&self) -> TrackingResult<()> {
        if self.is_bigendian && self.encoding.bytes_per_channel() > 1 {
            return Err(TrackingError::Image(
                "Big-endian multi-byte images are not supported".to_string(),
            ));
        }
        let row = self.width * self.encoding.bytes_per_pixel();
        if self.step < row {
            return Err(TrackingError::Image(format!(
                "Row step {} is shorter than {} bytes",
                self.step, row
            )));
        }
        let needed = self.step as usize * self.height as usize;
        if self.data.len() < needed {
            return Err(TrackingError::Image(format!(
                "Image data has {} bytes, expected {}",
                self.data.len(),
                needed
            )));
        }
        Ok(())
    }

    /// Bytes of one row without padding
    pub fn row(&self, y: u32) -> &[u8] {
        let start = (y * self.step) as usize;
        let len = (self.width * self.encoding.bytes_per_pixel()) as usize;
        &self.data[start..start + len]
    }
}

impl LogSummary for Image {
    fn log_summary(&self) -> String {
        format!(
            "Image({}x{} {}, frame={}, seq={})",
            self.width, self.height, self.encoding, self.header.frame_id, self.header.seq
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_round_trip_names() {
        for name in ["rgb8", "bgr8", "mono8", "16UC1", "32SC1"] {
            let encoding: ImageEncoding = name.parse().unwrap();
            assert_eq!(encoding.as_str(), name);
        }
        assert!("yuv422".parse::<ImageEncoding>().is_err());
    }

    #[test]
    fn test_from_raw_checks_length() {
        let header = Header::new("cam");
        assert!(Image::from_raw(header.clone(), 2, 2, ImageEncoding::Rgb8, vec![0; 12]).is_ok());
        let err = Image::from_raw(header, 2, 2, ImageEncoding::Type32SC1, vec![0; 12]).unwrap_err();
        assert!(matches!(err, TrackingError::Image(_)));
    }

    #[test]
    fn test_row_skips_padding() {
        let mut image =
            Image::from_raw(Header::default(), 1, 2, ImageEncoding::Mono8, vec![1, 2]).unwrap();
        image.step = 2;
        image.data = vec![1, 9, 2, 9];
        assert!(image.check_layout().is_ok());
        assert_eq!(image.row(1), &[2]);
    }
}
