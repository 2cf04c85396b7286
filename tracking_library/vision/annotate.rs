//! Box and label drawing for visualization images

use super::font::LabelFont;
use crate::algorithms::nms::BoundingBox;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use rusttype::Scale;

/// Default color cycle, indexed by class id or object index
pub const DEFAULT_PALETTE: [[u8; 3]; 16] = [
    [230, 25, 75],
    [60, 180, 75],
    [255, 225, 25],
    [0, 130, 200],
    [245, 130, 48],
    [145, 30, 180],
    [70, 240, 240],
    [240, 50, 230],
    [210, 245, 60],
    [250, 190, 190],
    [0, 128, 128],
    [230, 190, 255],
    [170, 110, 40],
    [255, 250, 200],
    [128, 0, 0],
    [170, 255, 195],
];

/// One box to draw
#[derive(Debug, Clone, PartialEq)]
pub struct BoxLabel {
    pub bbox: BoundingBox,
    /// Selects the palette color
    pub color_index: usize,
    pub text: Option<String>,
}

impl BoxLabel {
    pub fn new(bbox: BoundingBox, color_index: usize, text: impl Into<String>) -> Self {
        Self {
            bbox,
            color_index,
            text: Some(text.into()),
        }
    }
}

/// Draws outlined boxes with a filled label tab above their top-left corner
///
/// Labels need a font; without one only the boxes are drawn.
#[derive(Debug, Clone)]
pub struct BoxAnnotator {
    pub thickness: u32,
    /// Label text height in pixels
    pub text_height: f32,
    pub text_padding: u32,
    pub text_color: Rgb<u8>,
    pub font: Option<LabelFont>,
}

impl Default for BoxAnnotator {
    fn default() -> Self {
        Self {
            thickness: 2,
            text_height: 16.0,
            text_padding: 4,
            text_color: Rgb([0, 0, 0]),
            font: None,
        }
    }
}

impl BoxAnnotator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_font(mut self, font: Option<LabelFont>) -> Self {
        self.font = font;
        self
    }

    pub fn color(&self, index: usize) -> Rgb<u8> {
        Rgb(DEFAULT_PALETTE[index % DEFAULT_PALETTE.len()])
    }

    /// Draw every box, then every label, onto a copy of `scene`
    pub fn annotate(&self, scene: &RgbImage, labels: &[BoxLabel]) -> RgbImage {
        let mut canvas = scene.clone();
        for label in labels {
            self.draw_box(&mut canvas, &label.bbox, self.color(label.color_index));
        }
        if let Some(font) = &self.font {
            for label in labels {
                if let Some(text) = &label.text {
                    self.draw_label(&mut canvas, font, &label.bbox, text, self.color(label.color_index));
                }
            }
        }
        canvas
    }

    fn draw_box(&self, canvas: &mut RgbImage, bbox: &BoundingBox, color: Rgb<u8>) {
        let x = bbox.x1.round() as i32;
        let y = bbox.y1.round() as i32;
        let w = (bbox.x2.round() as i32 - x).max(0) as u32 + 1;
        let h = (bbox.y2.round() as i32 - y).max(0) as u32 + 1;

        // Concentric outlines grow the stroke inwards
        for i in 0..self.thickness {
            if w <= 2 * i || h <= 2 * i {
                break;
            }
            let rect = Rect::at(x + i as i32, y + i as i32).of_size(w - 2 * i, h - 2 * i);
            draw_hollow_rect_mut(canvas, rect, color);
        }
    }

    fn draw_label(
        &self,
        canvas: &mut RgbImage,
        font: &LabelFont,
        bbox: &BoundingBox,
        text: &str,
        color: Rgb<u8>,
    ) {
        let scale = Scale::uniform(self.text_height.max(1.0));
        let (text_w, _) = text_size(scale, font.font(), text);
        let tab_w = text_w.max(0) as u32 + 2 * self.text_padding;
        let tab_h = font.line_height(scale) + 2 * self.text_padding;

        let x = bbox.x1.round() as i32;
        // Tab sits above the box, or inside it when the box touches the top edge
        let mut y = bbox.y1.round() as i32 - tab_h as i32;
        if y < 0 {
            y = bbox.y1.round().max(0.0) as i32;
        }

        draw_filled_rect_mut(canvas, Rect::at(x, y).of_size(tab_w, tab_h), color);
        draw_text_mut(
            canvas,
            self.text_color,
            x + self.text_padding as i32,
            y + self.text_padding as i32,
            scale,
            font.font(),
            text,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn white(size: u32) -> RgbImage {
        RgbImage::from_pixel(size, size, Rgb([255, 255, 255]))
    }

    fn font_annotator() -> Option<BoxAnnotator> {
        LabelFont::system_default().map(|font| BoxAnnotator::new().with_font(Some(font)))
    }

    #[test]
    fn test_box_outline_drawn() {
        let annotator = BoxAnnotator::new();
        let out = annotator.annotate(
            &white(40),
            &[BoxLabel {
                bbox: BoundingBox::new(10.0, 10.0, 30.0, 30.0),
                color_index: 0,
                text: None,
            }],
        );

        let color = annotator.color(0);
        assert_eq!(*out.get_pixel(10, 20), color);
        assert_eq!(*out.get_pixel(11, 20), color);
        assert_eq!(*out.get_pixel(30, 20), color);
        assert_eq!(*out.get_pixel(20, 20), Rgb([255, 255, 255]));
        assert_eq!(*out.get_pixel(5, 5), Rgb([255, 255, 255]));
    }

    #[test]
    fn test_labels_skipped_without_font() {
        let annotator = BoxAnnotator::new();
        let out = annotator.annotate(
            &white(100),
            &[BoxLabel::new(BoundingBox::new(10.0, 50.0, 60.0, 90.0), 1, "cup 0.90")],
        );
        assert_eq!(*out.get_pixel(10, 49), Rgb([255, 255, 255]));
        assert_eq!(*out.get_pixel(10, 50), annotator.color(1));
    }

    #[test]
    fn test_label_tab_above_box() {
        let Some(annotator) = font_annotator() else {
            return;
        };
        let scene = white(100);
        let out = annotator.annotate(
            &scene,
            &[BoxLabel::new(BoundingBox::new(10.0, 50.0, 60.0, 90.0), 1, "cup 0.90")],
        );
        // Corner of the tab (padding area) carries the box color
        assert_eq!(*out.get_pixel(10, 50 - 1), annotator.color(1));
        // Scene itself is not modified
        assert_eq!(*scene.get_pixel(10, 49), Rgb([255, 255, 255]));
    }

    #[test]
    fn test_label_at_top_edge_stays_visible() {
        let Some(annotator) = font_annotator() else {
            return;
        };
        let out = annotator.annotate(
            &white(100),
            &[BoxLabel::new(BoundingBox::new(0.0, 0.0, 60.0, 60.0), 2, "ObjectID : 0")],
        );
        assert_eq!(*out.get_pixel(1, 1), annotator.color(2));
    }

    #[test]
    fn test_lowercase_and_uppercase_render_differently() {
        let Some(annotator) = font_annotator() else {
            return;
        };
        let bbox = BoundingBox::new(10.0, 60.0, 90.0, 90.0);
        let lower = annotator.annotate(&white(100), &[BoxLabel::new(bbox, 0, "cup")]);
        let upper = annotator.annotate(&white(100), &[BoxLabel::new(bbox, 0, "CUP")]);
        assert_ne!(lower, upper);

        // Text pixels are darker than the tab they sit on
        let tab = annotator.color(0);
        assert!(lower.pixels().any(|p| p.0[0] < tab.0[0] / 2 && p.0[1] < 20));
    }

    #[test]
    fn test_text_outside_canvas_is_clipped() {
        let Some(annotator) = font_annotator() else {
            return;
        };
        let out = annotator.annotate(
            &white(8),
            &[BoxLabel::new(BoundingBox::new(4.0, 4.0, 7.0, 7.0), 3, "a long label")],
        );
        assert_eq!(out.dimensions(), (8, 8));
    }
}
