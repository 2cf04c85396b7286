//! DAVIS/VOC color palette and mask overlays

use image::{Rgb, RgbImage};
use ndarray::ArrayView2;
use tracking_core::error::{TrackingError, TrackingResult};

/// Blend factor of the original pixel in [`overlay_davis`]
pub const DEFAULT_ALPHA: f32 = 0.5;

/// Palette color of a label (VOC bit-interleaved colormap, labels wrap at 256)
pub fn label_color(label: i32) -> Rgb<u8> {
    let mut id = label.rem_euclid(256) as u8;
    let (mut r, mut g, mut b) = (0u8, 0u8, 0u8);
    for shift in (0..8).rev() {
        r |= (id & 1) << shift;
        g |= ((id >> 1) & 1) << shift;
        b |= ((id >> 2) & 1) << shift;
        id >>= 3;
    }
    Rgb([r, g, b])
}

/// Paint the palette color of each foreground label over `image`
///
/// Foreground pixels become `alpha * pixel + (1 - alpha) * color`; object
/// outlines (one pixel outside each foreground region) are drawn black.
pub fn overlay_davis(image: &RgbImage, mask: ArrayView2<i32>, alpha: f32) -> TrackingResult<RgbImage> {
    let (height, width) = mask.dim();
    if (width as u32, height as u32) != image.dimensions() {
        return Err(TrackingError::InvalidInput(format!(
            "Mask is {}x{} but image is {}x{}",
            width,
            height,
            image.width(),
            image.height()
        )));
    }

    let mut overlay = image.clone();
    for ((y, x), &label) in mask.indexed_iter() {
        if label <= 0 {
            if touches_foreground(mask, y, x) {
                overlay.put_pixel(x as u32, y as u32, Rgb([0, 0, 0]));
            }
            continue;
        }
        let color = label_color(label);
        let pixel = overlay.get_pixel_mut(x as u32, y as u32);
        for c in 0..3 {
            let blended = alpha * pixel.0[c] as f32 + (1.0 - alpha) * color.0[c] as f32;
            pixel.0[c] = blended as u8;
        }
    }
    Ok(overlay)
}

// 3x3 neighbourhood test used for the outline
fn touches_foreground(mask: ArrayView2<i32>, y: usize, x: usize) -> bool {
    let (height, width) = mask.dim();
    let y0 = y.saturating_sub(1);
    let x0 = x.saturating_sub(1);
    let y1 = (y + 1).min(height - 1);
    let x1 = (x + 1).min(width - 1);
    for ny in y0..=y1 {
        for nx in x0..=x1 {
            if mask[[ny, nx]] > 0 {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    #[test]
    fn test_palette_first_entries() {
        assert_eq!(label_color(0), Rgb([0, 0, 0]));
        assert_eq!(label_color(1), Rgb([128, 0, 0]));
        assert_eq!(label_color(2), Rgb([0, 128, 0]));
        assert_eq!(label_color(3), Rgb([128, 128, 0]));
        assert_eq!(label_color(4), Rgb([0, 0, 128]));
        assert_eq!(label_color(256 + 1), label_color(1));
    }

    #[test]
    fn test_background_untouched() {
        let image = RgbImage::from_pixel(3, 3, Rgb([200, 100, 50]));
        let mask = Array2::<i32>::zeros((3, 3));
        let out = overlay_davis(&image, mask.view(), DEFAULT_ALPHA).unwrap();
        assert_eq!(out, image);
    }

    #[test]
    fn test_foreground_blended_and_outlined() {
        let image = RgbImage::from_pixel(3, 1, Rgb([100, 100, 100]));
        let mask = array![[1, 0, 0]];
        let out = overlay_davis(&image, mask.view(), 0.5).unwrap();
        assert_eq!(*out.get_pixel(0, 0), Rgb([114, 50, 50]));
        assert_eq!(*out.get_pixel(1, 0), Rgb([0, 0, 0]));
        assert_eq!(*out.get_pixel(2, 0), Rgb([100, 100, 100]));
    }

    #[test]
    fn test_size_mismatch() {
        let image = RgbImage::new(2, 2);
        let mask = Array2::<i32>::zeros((3, 2));
        assert!(overlay_davis(&image, mask.view(), 0.5).is_err());
    }
}
