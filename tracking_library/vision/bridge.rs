//! Conversions between [`Image`] messages, `image` buffers and tensors

use crate::messages::{Header, Image, ImageEncoding};
use image::RgbImage;
use ndarray::{Array2, Array3};
use tracking_core::error::{TrackingError, TrackingResult};

/// Decode a color or grayscale frame into packed RGB
pub fn image_to_rgb(msg: &Image) -> TrackingResult<RgbImage> {
    msg.check_layout()?;
    let (width, height) = (msg.width, msg.height);
    let mut rgb = Vec::with_capacity((width * height * 3) as usize);

    for y in 0..height {
        let row = msg.row(y);
        match msg.encoding {
            ImageEncoding::Rgb8 => rgb.extend_from_slice(row),
            ImageEncoding::Bgr8 => {
                for px in row.chunks_exact(3) {
                    rgb.extend_from_slice(&[px[2], px[1], px[0]]);
                }
            }
            ImageEncoding::Rgba8 => {
                for px in row.chunks_exact(4) {
                    rgb.extend_from_slice(&px[..3]);
                }
            }
            ImageEncoding::Bgra8 => {
                for px in row.chunks_exact(4) {
                    rgb.extend_from_slice(&[px[2], px[1], px[0]]);
                }
            }
            ImageEncoding::Mono8 | ImageEncoding::Type8UC1 => {
                for &v in row {
                    rgb.extend_from_slice(&[v, v, v]);
                }
            }
            other => {
                return Err(TrackingError::Image(format!(
                    "Cannot convert {} to rgb8",
                    other
                )))
            }
        }
    }

    RgbImage::from_raw(width, height, rgb)
        .ok_or_else(|| TrackingError::Internal("RGB buffer size mismatch".to_string()))
}

/// Encode an RGB buffer as an `rgb8` message
pub fn rgb_to_image(rgb: &RgbImage, header: Header) -> Image {
    let (width, height) = rgb.dimensions();
    Image {
        header,
        height,
        width,
        encoding: ImageEncoding::Rgb8,
        is_bigendian: false,
        step: width * 3,
        data: rgb.as_raw().clone(),
    }
}

/// Decode an integer label image into a mask
///
/// Accepts `32SC1`, `16UC1`/`mono16` and `8UC1`/`mono8`.
pub fn image_to_mask(msg: &Image) -> TrackingResult<Array2<i32>> {
    msg.check_layout()?;
    let (width, height) = (msg.width as usize, msg.height as usize);
    let mut mask = Array2::<i32>::zeros((height, width));

    for y in 0..height {
        let row = msg.row(y as u32);
        match msg.encoding {
            ImageEncoding::Type32SC1 => {
                for (x, bytes) in row.chunks_exact(4).enumerate() {
                    mask[[y, x]] = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                }
            }
            ImageEncoding::Type16UC1 | ImageEncoding::Mono16 => {
                for (x, bytes) in row.chunks_exact(2).enumerate() {
                    mask[[y, x]] = u16::from_le_bytes([bytes[0], bytes[1]]) as i32;
                }
            }
            ImageEncoding::Type8UC1 | ImageEncoding::Mono8 => {
                for (x, &value) in row.iter().enumerate() {
                    mask[[y, x]] = value as i32;
                }
            }
            other => {
                return Err(TrackingError::Image(format!(
                    "Cannot read a label mask from {}",
                    other
                )))
            }
        }
    }
    Ok(mask)
}

/// Encode a mask as a `32SC1` message
pub fn mask_to_image(mask: &Array2<i32>, header: Header) -> Image {
    let (height, width) = mask.dim();
    let mut data = Vec::with_capacity(height * width * 4);
    for &value in mask.iter() {
        data.extend_from_slice(&value.to_le_bytes());
    }
    Image {
        header,
        height: height as u32,
        width: width as u32,
        encoding: ImageEncoding::Type32SC1,
        is_bigendian: false,
        step: width as u32 * 4,
        data,
    }
}

/// `[3, H, W]` float tensor with values scaled to `0.0..=1.0`
pub fn image_to_chw_tensor(rgb: &RgbImage) -> Array3<f32> {
    let (width, height) = rgb.dimensions();
    let mut tensor = Array3::<f32>::zeros((3, height as usize, width as usize));
    for (x, y, pixel) in rgb.enumerate_pixels() {
        for c in 0..3 {
            tensor[[c, y as usize, x as usize]] = pixel.0[c] as f32 / 255.0;
        }
    }
    tensor
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_bgr_is_swapped() {
        let msg = Image::from_raw(
            Header::new("cam"),
            2,
            1,
            ImageEncoding::Bgr8,
            vec![1, 2, 3, 4, 5, 6],
        )
        .unwrap();
        let rgb = image_to_rgb(&msg).unwrap();
        assert_eq!(rgb.as_raw(), &vec![3, 2, 1, 6, 5, 4]);
    }

    #[test]
    fn test_mono_expands() {
        let msg = Image::from_raw(Header::default(), 1, 1, ImageEncoding::Mono8, vec![9]).unwrap();
        assert_eq!(image_to_rgb(&msg).unwrap().as_raw(), &vec![9, 9, 9]);
    }

    #[test]
    fn test_label_encoding_rejected_for_color() {
        let msg =
            Image::from_raw(Header::default(), 1, 1, ImageEncoding::Type32SC1, vec![0; 4]).unwrap();
        assert!(matches!(image_to_rgb(&msg), Err(TrackingError::Image(_))));
    }

    #[test]
    fn test_mask_round_trip_keeps_negative_labels() {
        let mask = array![[0, -1], [2, 70000]];
        let msg = mask_to_image(&mask, Header::new("cam"));
        assert_eq!(msg.encoding, ImageEncoding::Type32SC1);
        assert_eq!(msg.step, 8);
        assert_eq!(image_to_mask(&msg).unwrap(), mask);
    }

    #[test]
    fn test_mask_from_16bit() {
        let msg = Image::from_raw(
            Header::default(),
            2,
            1,
            ImageEncoding::Type16UC1,
            vec![1, 0, 0, 1],
        )
        .unwrap();
        assert_eq!(image_to_mask(&msg).unwrap(), array![[1, 256]]);
    }

    #[test]
    fn test_chw_tensor_scaled() {
        let rgb = RgbImage::from_raw(1, 1, vec![255, 0, 51]).unwrap();
        let tensor = image_to_chw_tensor(&rgb);
        assert_eq!(tensor.dim(), (3, 1, 1));
        assert_relative_eq!(tensor[[0, 0, 0]], 1.0);
        assert_relative_eq!(tensor[[2, 0, 0]], 0.2);
    }
}
