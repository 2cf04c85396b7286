//! TrueType font used for box labels

use once_cell::sync::Lazy;
use rusttype::{Font, Scale};
use std::path::{Path, PathBuf};
use tracking_core::error::{TrackingError, TrackingResult};

/// Fonts tried when no `~font_path` is configured
const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

static SYSTEM_FONT: Lazy<Option<LabelFont>> = Lazy::new(|| {
    SYSTEM_FONT_CANDIDATES
        .iter()
        .map(Path::new)
        .filter(|path| path.is_file())
        .find_map(|path| match LabelFont::from_file(path) {
            Ok(font) => Some(font),
            Err(e) => {
                tracing::debug!("Skipping system font: {}", e);
                None
            }
        })
});

/// Parsed font plus the file it came from
#[derive(Clone)]
pub struct LabelFont {
    font: Font<'static>,
    path: PathBuf,
}

impl std::fmt::Debug for LabelFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LabelFont").field("path", &self.path).finish()
    }
}

impl LabelFont {
    /// Load a `.ttf`/`.otf` file
    pub fn from_file(path: &Path) -> TrackingResult<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            TrackingError::Image(format!("Cannot read font {}: {}", path.display(), e))
        })?;
        let font = Font::try_from_vec(bytes).ok_or_else(|| {
            TrackingError::Image(format!("{} is not a TrueType font", path.display()))
        })?;
        Ok(Self {
            font,
            path: path.to_path_buf(),
        })
    }

    /// First usable font from the usual system locations
    pub fn system_default() -> Option<Self> {
        SYSTEM_FONT.clone()
    }

    /// Configured font, else the system default
    ///
    /// A configured font that cannot be loaded is a configuration error. When no
    /// font is found at all, labels are skipped and only boxes are drawn.
    pub fn resolve(configured: Option<&Path>) -> TrackingResult<Option<Self>> {
        if let Some(path) = configured {
            return Self::from_file(path)
                .map(Some)
                .map_err(|e| TrackingError::Config(e.to_string()));
        }

        let font = Self::system_default();
        match &font {
            Some(font) => tracing::debug!("Using label font {}", font.path.display()),
            None => tracing::warn!("No TrueType font found; set ~font_path to draw box labels"),
        }
        Ok(font)
    }

    pub fn font(&self) -> &Font<'static> {
        &self.font
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Height of one text line at `scale`, in pixels
    pub fn line_height(&self, scale: Scale) -> u32 {
        let metrics = self.font.v_metrics(scale);
        (metrics.ascent - metrics.descent).ceil().max(0.0) as u32
    }
}
