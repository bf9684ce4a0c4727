//! k-fold rotational symmetry about the domain centre.

use crate::backend::{Backend, Kernel};
use crate::error::BackendError;
use crate::field::ScaleState;
use std::f64::consts::TAU;

/// Rotated coordinates closer than this to a lattice line are snapped onto it,
/// so quarter and half turns read cells exactly.
const SNAP_EPS: f32 = 1e-4;

#[derive(Clone, Debug)]
pub struct SymmetryFold {
    order: u32,
    /// `(cos, sin)` for each non-identity rotation.
    rotations: Vec<(f32, f32)>,
}

impl SymmetryFold {
    pub fn new(order: u32) -> Self {
        let order = order.max(1);
        let rotations = (1..order)
            .map(|j| {
                let theta = TAU * j as f64 / order as f64;
                (theta.cos() as f32, theta.sin() as f32)
            })
            .collect();
        Self { order, rotations }
    }

    pub fn order(&self) -> u32 {
        self.order
    }

    pub fn is_identity(&self) -> bool {
        self.order == 1
    }

    /// Writes the folded version of `src` into `dst`. For order 1 this is an
    /// exact copy.
    pub fn apply<B: Backend>(
        &self,
        backend: &B,
        width: usize,
        height: usize,
        src: &[f32],
        dst: &mut [f32],
    ) -> Result<(), BackendError> {
        if self.is_identity() {
            return backend.upload(Kernel::Fold, dst, src);
        }
        let cx = (width as f32 - 1.0) * 0.5;
        let cy = (height as f32 - 1.0) * 0.5;
        let inv = 1.0 / self.order as f32;
        backend.run(Kernel::Fold, width, height, dst, |x, y| {
            let dx = x as f32 - cx;
            let dy = y as f32 - cy;
            let mut sum = src[y * width + x];
            for &(c, s) in &self.rotations {
                let rx = cx + dx * c - dy * s;
                let ry = cy + dx * s + dy * c;
                sum += sample_bilinear(src, width, height, rx, ry);
            }
            sum * inv
        })
    }

    /// Folds the state's pending values, i.e. this frame's update result.
    /// The committed cells are not touched; the caller commits. Order 1 is
    /// a no-op.
    pub fn fold<B: Backend>(&self, backend: &B, state: &mut ScaleState) -> Result<(), BackendError> {
        if self.is_identity() {
            return Ok(());
        }
        let (w, h) = (state.width(), state.height());
        let (pending, scratch) = state.split_pending();
        self.apply(backend, w, h, pending, scratch)?;
        state.promote_scratch();
        Ok(())
    }
}

#[inline]
fn snap(v: f32) -> f32 {
    let r = v.round();
    if (v - r).abs() < SNAP_EPS {
        r
    } else {
        v
    }
}

/// Bilinear lookup with toroidal wrapping.
pub fn sample_bilinear(src: &[f32], width: usize, height: usize, x: f32, y: f32) -> f32 {
    let (x, y) = (snap(x), snap(y));
    let (x0, y0) = (x.floor(), y.floor());
    let (fx, fy) = (x - x0, y - y0);
    let (xi, yi) = (x0 as isize, y0 as isize);
    let at = |ix: isize, iy: isize| {
        let xx = ix.rem_euclid(width as isize) as usize;
        let yy = iy.rem_euclid(height as isize) as usize;
        src[yy * width + xx]
    };
    if fx == 0.0 && fy == 0.0 {
        return at(xi, yi);
    }
    let top = at(xi, yi) * (1.0 - fx) + at(xi + 1, yi) * fx;
    let bottom = at(xi, yi + 1) * (1.0 - fx) + at(xi + 1, yi + 1) * fx;
    top * (1.0 - fy) + bottom * fy
}
