//! Pre- and post-processing for Grounding DINO
//!
//! Everything here is model-independent so it can be tested without an
//! inference runtime: caption building, the phrase-level text masks the
//! model expects, image resize bounds, query selection and phrase-to-class
//! matching.

use ndarray::{Array2, ArrayView2};

/// Maximum caption length in tokens
pub const MAX_TEXT_LEN: usize = 256;

/// Token ids that close a phrase: `[CLS]`, `[SEP]`, `.` and `?` (BERT uncased)
pub const SPECIAL_TOKENS: [u32; 4] = [101, 102, 1012, 1029];

/// ImageNet normalization used by the backbone
pub const PIXEL_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const PIXEL_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Caption for a class list: `"cup . bottle."` style, lowercase
pub fn caption_from_classes(classes: &[String]) -> String {
    let caption = classes.join(". ").to_lowercase();
    let caption = caption.trim();
    if caption.ends_with('.') {
        caption.to_string()
    } else {
        format!("{}.", caption)
    }
}

/// Block-diagonal self-attention mask and per-phrase position ids
///
/// Tokens only attend within their own phrase (the span ending at the next
/// special token, inclusive) and positions restart at zero for each phrase.
/// Special tokens at either end attend only to themselves.
pub fn phrase_masks(input_ids: &[u32]) -> (Array2<bool>, Vec<i64>) {
    let len = input_ids.len();
    let mut attention = Array2::from_shape_fn((len, len), |(i, j)| i == j);
    let mut position_ids = vec![0i64; len];

    let mut previous = 0usize;
    for (col, id) in input_ids.iter().enumerate() {
        if !SPECIAL_TOKENS.contains(id) {
            continue;
        }
        if col == 0 || col == len - 1 {
            attention[[col, col]] = true;
            position_ids[col] = 0;
        } else {
            for i in previous + 1..=col {
                for j in previous + 1..=col {
                    attention[[i, j]] = true;
                }
                position_ids[i] = (i - previous - 1) as i64;
            }
        }
        previous = col;
    }
    (attention, position_ids)
}

/// Resized `(width, height)`: shorter side `size`, longer side at most `max_size`
pub fn resize_dims(width: u32, height: u32, size: u32, max_size: u32) -> (u32, u32) {
    let (w, h) = (width as f64, height as f64);
    let min_side = w.min(h);
    let max_side = w.max(h);
    let mut size = size as f64;
    if min_side <= 0.0 {
        return (width, height);
    }
    if max_side / min_side * size > max_size as f64 {
        size = (max_size as f64 * min_side / max_side).round();
    }

    if (w <= h && w == size) || (h <= w && h == size) {
        return (width, height);
    }
    if w < h {
        (size as u32, (size * h / w) as u32)
    } else {
        ((size * w / h) as u32, size as u32)
    }
}

/// Candidate query above the box threshold
#[derive(Debug, Clone, PartialEq)]
pub struct QueryHit {
    pub query: usize,
    pub score: f32,
    /// Token positions whose probability exceeds the text threshold
    pub tokens: Vec<usize>,
}

/// Select queries whose best token probability exceeds `box_threshold`
///
/// `probs` is `[queries, MAX_TEXT_LEN]` after the sigmoid; only the first
/// `num_tokens` columns correspond to caption tokens. The first and last
/// caption tokens (`[CLS]`, `[SEP]`) never contribute to a phrase.
pub fn select_queries(
    probs: ArrayView2<f32>,
    num_tokens: usize,
    box_threshold: f32,
    text_threshold: f32,
) -> Vec<QueryHit> {
    let num_tokens = num_tokens.min(probs.ncols());
    probs
        .outer_iter()
        .enumerate()
        .filter_map(|(query, row)| {
            let score = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            if score <= box_threshold {
                return None;
            }
            let tokens = (1..num_tokens.saturating_sub(1))
                .filter(|&t| row[t] > text_threshold)
                .collect();
            Some(QueryHit {
                query,
                score,
                tokens,
            })
        })
        .collect()
}

/// Index of the first class that occurs in `phrase` (case-insensitive)
pub fn class_for_phrase(phrase: &str, classes: &[String]) -> Option<usize> {
    let phrase = phrase.replace('.', "").to_lowercase();
    let phrase = phrase.trim();
    if phrase.is_empty() {
        return None;
    }
    classes
        .iter()
        .position(|class| phrase.contains(&class.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_caption() {
        let classes = vec!["Cup".to_string(), "bottle".to_string()];
        assert_eq!(caption_from_classes(&classes), "cup. bottle.");
        assert_eq!(caption_from_classes(&["mug.".to_string()]), "mug.");
    }

    #[test]
    fn test_phrase_masks() {
        // [CLS] cup . bottle . [SEP]
        let ids = [101, 2452, 1012, 5835, 1012, 102];
        let (attention, positions) = phrase_masks(&ids);

        assert_eq!(positions, vec![0, 0, 1, 0, 1, 0]);
        assert!(attention[[1, 2]] && attention[[2, 1]]);
        assert!(!attention[[1, 3]]);
        assert!(attention[[3, 4]]);
        assert!(attention[[0, 0]] && !attention[[0, 1]]);
        assert!(attention[[5, 5]] && !attention[[4, 5]]);
    }

    #[test]
    fn test_resize_short_side() {
        assert_eq!(resize_dims(640, 480, 800, 1333), (1066, 800));
        assert_eq!(resize_dims(480, 640, 800, 1333), (800, 1066));
    }

    #[test]
    fn test_resize_caps_long_side() {
        // 2000x500 at 800 would make the long side 3200
        assert_eq!(resize_dims(2000, 500, 800, 1333), (1332, 333));
    }

    #[test]
    fn test_resize_noop() {
        assert_eq!(resize_dims(1066, 800, 800, 1333), (1066, 800));
    }

    #[test]
    fn test_select_queries() {
        let probs = array![
            [0.1, 0.9, 0.2, 0.4, 0.0],
            [0.1, 0.2, 0.2, 0.1, 0.0],
            [0.5, 0.35, 0.3, 0.1, 0.0]
        ];
        let hits = select_queries(probs.view(), 4, 0.3, 0.25);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].query, 0);
        assert_eq!(hits[0].tokens, vec![1]);
        assert_eq!(hits[1].query, 2);
        assert_eq!(hits[1].score, 0.5);
        assert_eq!(hits[1].tokens, vec![1, 2]);
    }

    #[test]
    fn test_class_for_phrase() {
        let classes = vec!["cup".to_string(), "water bottle".to_string()];
        assert_eq!(class_for_phrase("cup", &classes), Some(0));
        assert_eq!(class_for_phrase("water bottle.", &classes), Some(1));
        assert_eq!(class_for_phrase("tea cup", &classes), Some(0));
        assert_eq!(class_for_phrase("bottle", &classes), None);
        assert_eq!(class_for_phrase("", &classes), None);
    }
}
