//! Layered compositing of every scale over the noise-derived base.

use crate::backend::{Backend, Kernel};
use crate::colour::{Pixel, Rgba};
use crate::config::Palette;
use crate::error::BackendError;
use crate::field::Grid;

/// The frame's result, row-major.
#[derive(Clone, Debug, PartialEq)]
pub struct OutputImage {
    width: usize,
    height: usize,
    pixels: Vec<Pixel>,
}

impl OutputImage {
    pub fn new<B: Backend>(backend: &B, width: usize, height: usize) -> Result<Self, BackendError> {
        Ok(Self {
            width,
            height,
            pixels: backend.allocate(width * height, Pixel::default())?,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixels(&self) -> &[Pixel] {
        &self.pixels
    }

    pub(crate) fn pixels_mut(&mut self) -> &mut [Pixel] {
        &mut self.pixels
    }

    pub(crate) fn swap_pixels(&mut self, other: &mut Vec<Pixel>) {
        std::mem::swap(&mut self.pixels, other);
    }

    pub fn pixel(&self, x: usize, y: usize) -> Pixel {
        self.pixels[y * self.width + x]
    }

    /// Packed `0xRRGGBBAA` per pixel.
    pub fn packed(&self) -> Vec<u32> {
        self.pixels.iter().map(|p| p.pack()).collect()
    }

    /// Interleaved RGBA bytes, as image encoders expect them.
    pub fn to_rgba_bytes(&self) -> Vec<u8> {
        self.pixels
            .iter()
            .flat_map(|p| [p.r, p.g, p.b, p.a])
            .collect()
    }
}

/// One scale as seen by the compositor.
#[derive(Clone, Copy, Debug)]
pub struct Layer<'a> {
    pub values: &'a [f32],
    pub colour: Rgba,
}

/// Colour of one pixel: base tint from the noise, then every layer whose
/// value is positive painted over it in order.
pub fn shade(
    palette: &Palette,
    noise: f32,
    layers: impl IntoIterator<Item = (f32, Rgba)>,
) -> Rgba {
    let mut acc = palette.base(noise);
    for (value, colour) in layers {
        if value > 0.0 {
            acc = colour.over(acc);
        }
    }
    acc
}

/// Composites into `out`, which must hold `width * height` pixels.
pub fn composite<B: Backend>(
    backend: &B,
    palette: &Palette,
    grid: &Grid,
    layers: &[Layer<'_>],
    out: &mut [Pixel],
) -> Result<(), BackendError> {
    let w = grid.width();
    let noise = grid.values();
    backend.run(Kernel::Composite, w, grid.height(), out, |x, y| {
        let i = y * w + x;
        shade(
            palette,
            noise[i],
            layers.iter().map(|l| (l.values[i], l.colour)),
        )
        .to_pixel()
    })
}

pub fn clear<B: Backend>(backend: &B, image: &mut OutputImage, colour: Rgba) -> Result<(), BackendError> {
    let (w, h) = (image.width, image.height);
    let px = colour.to_pixel();
    backend.run(Kernel::Clear, w, h, image.pixels_mut(), |_, _| px)
}
