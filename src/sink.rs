//! Where finished frames go.

use crate::composite::OutputImage;
use anyhow::{Context, Result};
use image::{ImageFormat, RgbaImage};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info};

pub trait FrameSink {
    /// Receives frame `index` (0-based) once all of its passes completed.
    fn present(&mut self, index: u64, image: &OutputImage) -> Result<()>;
}

/// Numbered PNG files, `frame-0000.png` onwards.
pub struct PngSequence {
    dir: PathBuf,
    written: u64,
}

impl PngSequence {
    pub fn create(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("could not create output directory {}", dir.display()))?;
        info!(dir = %dir.display(), "writing frames");
        Ok(Self { dir, written: 0 })
    }

    /// `render/<local timestamp>`, one fresh directory per run.
    pub fn default_dir() -> PathBuf {
        let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
        Path::new("render").join(stamp.to_string())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn frame_path(&self, index: u64) -> PathBuf {
        self.dir.join(format!("frame-{index:04}.png"))
    }
}

impl FrameSink for PngSequence {
    fn present(&mut self, index: u64, image: &OutputImage) -> Result<()> {
        let (w, h) = (image.width() as u32, image.height() as u32);
        let img = RgbaImage::from_raw(w, h, image.to_rgba_bytes())
            .context("frame buffer does not match its dimensions")?;
        let path = self.frame_path(index);
        img.save_with_format(&path, ImageFormat::Png)
            .with_context(|| format!("could not write {}", path.display()))?;
        self.written += 1;
        debug!(path = %path.display(), "frame saved");
        Ok(())
    }
}
