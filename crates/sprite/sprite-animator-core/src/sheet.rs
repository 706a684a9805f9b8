//! Sprite-sheet grid discovery.
//!
//! When `columns` is not configured the engine asks a [`SheetProbe`] for the
//! sheet's natural size once, then derives the grid from the frame size.

use std::collections::HashMap;

use futures::future::{self, FutureExt, LocalBoxFuture};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Natural pixel size of a sheet image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetSize {
    pub width: u32,
    pub height: u32,
}

/// Grid derived from a probed sheet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetGrid {
    pub columns: u32,
    pub total_frames: u32,
}

/// `columns = round(w / frame_w)`; unless supplied,
/// `total_frames = columns * round(h / frame_h)`.
pub fn resolve_grid(
    size: SheetSize,
    frame_width: f64,
    frame_height: f64,
    total_frames: Option<u32>,
) -> SheetGrid {
    let columns = (f64::from(size.width) / frame_width).round() as u32;
    let total_frames = total_frames.unwrap_or_else(|| {
        let rows = (f64::from(size.height) / frame_height).round() as u32;
        columns.saturating_mul(rows)
    });
    SheetGrid {
        columns,
        total_frames,
    }
}

static CSS_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"url\(\s*(?:"([^"]*)"|'([^']*)'|([^)"']*))\s*\)"#).expect("static regex")
});

/// Extract the image reference from a CSS `background-image` value.
/// Plain values without `url(...)` are returned trimmed; `none` and empty
/// values give `None`.
pub fn parse_background_url(css: &str) -> Option<String> {
    let css = css.trim();
    let url = match CSS_URL.captures(css) {
        Some(caps) => caps
            .get(1)
            .or_else(|| caps.get(2))
            .or_else(|| caps.get(3))
            .map(|m| m.as_str().trim().to_string())?,
        None => css.to_string(),
    };
    if url.is_empty() || url == "none" {
        None
    } else {
        Some(url)
    }
}

/// Single-shot asynchronous lookup of a sheet's natural size.
/// `None` means the image could not be loaded; the sprite then stays unresolved.
pub trait SheetProbe {
    fn probe<'a>(&'a self, url: &'a str) -> LocalBoxFuture<'a, Option<SheetSize>>;
}

/// Probe answering from a fixed table of known sizes.
#[derive(Clone, Debug, Default)]
pub struct KnownSizes {
    sizes: HashMap<String, SheetSize>,
}

impl KnownSizes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: impl Into<String>, width: u32, height: u32) -> Self {
        self.insert(url, width, height);
        self
    }

    pub fn insert(&mut self, url: impl Into<String>, width: u32, height: u32) {
        self.sizes.insert(url.into(), SheetSize { width, height });
    }
}

impl SheetProbe for KnownSizes {
    fn probe<'a>(&'a self, url: &'a str) -> LocalBoxFuture<'a, Option<SheetSize>> {
        future::ready(self.sizes.get(url).copied()).boxed_local()
    }
}

#[cfg(feature = "image-probe")]
pub use file_probe::FileProbe;

#[cfg(feature = "image-probe")]
mod file_probe {
    use std::path::{Path, PathBuf};

    use futures::future::{FutureExt, LocalBoxFuture};

    use super::{SheetProbe, SheetSize};

    /// Reads sheet dimensions from image headers on disk. Relative URLs are
    /// resolved against `root`; a `file://` prefix is accepted.
    #[derive(Clone, Debug)]
    pub struct FileProbe {
        root: PathBuf,
    }

    impl FileProbe {
        pub fn new(root: impl Into<PathBuf>) -> Self {
            Self { root: root.into() }
        }

        fn resolve(&self, url: &str) -> PathBuf {
            let path = Path::new(url.strip_prefix("file://").unwrap_or(url));
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                self.root.join(path)
            }
        }
    }

    impl SheetProbe for FileProbe {
        fn probe<'a>(&'a self, url: &'a str) -> LocalBoxFuture<'a, Option<SheetSize>> {
            async move {
                let path = self.resolve(url);
                match image::image_dimensions(&path) {
                    Ok((width, height)) => Some(SheetSize { width, height }),
                    Err(e) => {
                        log::warn!("sheet probe failed for {}: {e}", path.display());
                        None
                    }
                }
            }
            .boxed_local()
        }
    }
}
