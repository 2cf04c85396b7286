//! Label-map utilities
//!
//! A mask is a 2D `i32` label map where `0` is background. The tracker
//! consumes one-hot foreground planes and produces per-label probabilities,
//! which are turned back into a label map with [`argmax_labels`].

use super::nms::BoundingBox;
use ndarray::{Array2, Array3, ArrayView2, ArrayView3, Axis};
use std::collections::BTreeSet;

/// Sorted distinct labels of a mask (background included when present)
pub fn unique_labels(mask: ArrayView2<i32>) -> Vec<i32> {
    mask.iter()
        .copied()
        .collect::<BTreeSet<i32>>()
        .into_iter()
        .collect()
}

/// One-hot planes for every non-background label
///
/// Returns the foreground labels in ascending order and a `[k, H, W]` tensor
/// whose channel `i` is `1.0` where the mask equals `labels[i]`.
pub fn one_hot_foreground(mask: ArrayView2<i32>) -> (Vec<i32>, Array3<f32>) {
    let labels: Vec<i32> = unique_labels(mask).into_iter().filter(|&l| l != 0).collect();
    let (height, width) = mask.dim();

    let mut planes = Array3::<f32>::zeros((labels.len(), height, width));
    for ((y, x), &value) in mask.indexed_iter() {
        if value == 0 {
            continue;
        }
        if let Ok(channel) = labels.binary_search(&value) {
            planes[[channel, y, x]] = 1.0;
        }
    }
    (labels, planes)
}

/// Index of the largest channel per pixel; ties resolve to the lowest index
pub fn argmax_labels(prob: ArrayView3<f32>) -> Array2<i32> {
    let (channels, height, width) = prob.dim();
    let mut labels = Array2::<i32>::zeros((height, width));
    if channels == 0 {
        return labels;
    }

    let mut best = prob.index_axis(Axis(0), 0).to_owned();
    for channel in 1..channels {
        let plane = prob.index_axis(Axis(0), channel);
        ndarray::Zip::from(&mut labels)
            .and(&mut best)
            .and(&plane)
            .for_each(|label, best, &value| {
                if value > *best {
                    *best = value;
                    *label = channel as i32;
                }
            });
    }
    labels
}

/// Prepend a background channel to foreground probabilities
///
/// Background is the probability that no object covers the pixel,
/// `prod(1 - p_i)`; the `[k + 1, H, W]` result is normalized per pixel.
pub fn with_background(foreground: ArrayView3<f32>) -> Array3<f32> {
    let (k, height, width) = foreground.dim();
    let mut prob = Array3::<f32>::zeros((k + 1, height, width));

    for y in 0..height {
        for x in 0..width {
            let mut background = 1.0f32;
            for c in 0..k {
                let p = foreground[[c, y, x]].clamp(0.0, 1.0);
                background *= 1.0 - p;
                prob[[c + 1, y, x]] = p;
            }
            prob[[0, y, x]] = background;

            let total: f32 = (0..=k).map(|c| prob[[c, y, x]]).sum();
            if total > 0.0 {
                for c in 0..=k {
                    prob[[c, y, x]] /= total;
                }
            }
        }
    }
    prob
}

/// Tight box around the `true` pixels of a binary plane
///
/// Corners are inclusive pixel indices. Returns `None` for an empty plane.
pub fn mask_to_xyxy(plane: ArrayView2<bool>) -> Option<BoundingBox> {
    let mut bounds: Option<(usize, usize, usize, usize)> = None;
    for ((y, x), &set) in plane.indexed_iter() {
        if !set {
            continue;
        }
        bounds = Some(match bounds {
            None => (x, y, x, y),
            Some((x1, y1, x2, y2)) => (x1.min(x), y1.min(y), x2.max(x), y2.max(y)),
        });
    }
    bounds.map(|(x1, y1, x2, y2)| BoundingBox::new(x1 as f32, y1 as f32, x2 as f32, y2 as f32))
}

/// Boxes of every foreground label, in ascending label order
///
/// Empty when the mask holds a single label (nothing or everything tracked).
pub fn foreground_boxes(mask: ArrayView2<i32>) -> Vec<(i32, BoundingBox)> {
    let labels = unique_labels(mask);
    if labels.len() <= 1 {
        return Vec::new();
    }

    labels
        .into_iter()
        .filter(|&label| label != 0)
        .filter_map(|label| {
            let plane = mask.mapv(|value| value == label);
            mask_to_xyxy(plane.view()).map(|bbox| (label, bbox))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_unique_labels_sorted() {
        let mask = array![[3, 0, 3], [1, 0, 7]];
        assert_eq!(unique_labels(mask.view()), vec![0, 1, 3, 7]);
    }

    #[test]
    fn test_one_hot_counts_foreground_only() {
        let mask = array![[0, 2, 2], [5, 0, 2]];
        let (labels, planes) = one_hot_foreground(mask.view());

        assert_eq!(labels, vec![2, 5]);
        assert_eq!(planes.dim(), (2, 2, 3));
        assert_eq!(planes[[0, 0, 1]], 1.0);
        assert_eq!(planes[[1, 1, 0]], 1.0);
        assert_eq!(planes.sum(), 4.0);
    }

    #[test]
    fn test_one_hot_background_only() {
        let mask = Array2::<i32>::zeros((4, 4));
        let (labels, planes) = one_hot_foreground(mask.view());
        assert!(labels.is_empty());
        assert_eq!(planes.dim(), (0, 4, 4));
    }

    #[test]
    fn test_argmax_prefers_first_on_tie() {
        let prob = array![[[0.5, 0.1]], [[0.5, 0.2]], [[0.0, 0.7]]];
        let labels = argmax_labels(prob.view());
        assert_eq!(labels, array![[0, 2]]);
    }

    #[test]
    fn test_with_background_of_one_hot() {
        let mask = array![[0, 1, 2]];
        let (_, planes) = one_hot_foreground(mask.view());
        let prob = with_background(planes.view());

        assert_eq!(prob.dim(), (3, 1, 3));
        assert_eq!(argmax_labels(prob.view()), mask);
        for x in 0..3 {
            let total: f32 = (0..3).map(|c| prob[[c, 0, x]]).sum();
            assert!((total - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_mask_to_xyxy_inclusive() {
        let plane = array![
            [false, false, false, false],
            [false, true, false, false],
            [false, false, true, false],
        ];
        assert_eq!(
            mask_to_xyxy(plane.view()),
            Some(BoundingBox::new(1.0, 1.0, 2.0, 2.0))
        );
        assert_eq!(mask_to_xyxy(Array2::from_elem((2, 2), false).view()), None);
    }

    #[test]
    fn test_foreground_boxes_in_label_order() {
        let mask = array![
            [0, 3, 3, 0],
            [1, 0, 0, 2],
            [1, 0, 0, 2],
        ];
        let boxes = foreground_boxes(mask.view());
        let labels: Vec<i32> = boxes.iter().map(|(label, _)| *label).collect();
        assert_eq!(labels, vec![1, 2, 3]);
        assert_eq!(boxes[0].1, BoundingBox::new(0.0, 1.0, 0.0, 2.0));
        assert_eq!(boxes[2].1, BoundingBox::new(1.0, 0.0, 2.0, 0.0));
    }

    #[test]
    fn test_single_label_has_no_boxes() {
        let mask = Array2::<i32>::from_elem((3, 3), 1);
        assert!(foreground_boxes(mask.view()).is_empty());
    }
}
