//! Per-pixel scalar fields: the shared noise grid and the double-buffered
//! per-scale state.

use crate::backend::{Backend, Kernel};
use crate::error::BackendError;
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Uniform noise in [-1, 1), fixed after creation.
#[derive(Clone, Debug)]
pub struct Grid {
    width: usize,
    height: usize,
    noise: Vec<f32>,
}

impl Grid {
    pub fn new<B: Backend>(
        backend: &B,
        width: usize,
        height: usize,
        seed: u64,
    ) -> Result<Self, BackendError> {
        let mut noise = backend.allocate(width * height, 0.0f32)?;
        fill_noise(&mut noise, seed);
        Ok(Self {
            width,
            height,
            noise,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn values(&self) -> &[f32] {
        &self.noise
    }
}

/// One scale's cells, each in [-1, 1]. `cells` is the committed state.
/// A frame in flight builds its result in `next` (`spare` is scratch for
/// passes that read `next`), and `commit` swaps it in once the whole frame
/// has completed.
#[derive(Clone, Debug)]
pub struct ScaleState {
    width: usize,
    height: usize,
    cells: Vec<f32>,
    next: Vec<f32>,
    spare: Vec<f32>,
}

impl ScaleState {
    pub fn new<B: Backend>(backend: &B, width: usize, height: usize) -> Result<Self, BackendError> {
        let n = width * height;
        Ok(Self {
            width,
            height,
            cells: backend.allocate(n, 0.0f32)?,
            next: backend.allocate(n, 0.0f32)?,
            spare: backend.allocate(n, 0.0f32)?,
        })
    }

    /// Builds a state from row-major values, clamped into [-1, 1].
    pub fn from_values(width: usize, height: usize, values: Vec<f32>) -> Result<Self, BackendError> {
        if values.len() != width * height {
            return Err(BackendError::SizeMismatch {
                kernel: Kernel::Upload,
                expected: width * height,
                got: values.len(),
            });
        }
        let n = values.len();
        let mut state = Self {
            width,
            height,
            cells: values,
            next: vec![0.0; n],
            spare: vec![0.0; n],
        };
        state.clamp_all();
        Ok(state)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn values(&self) -> &[f32] {
        &self.cells
    }

    /// The in-flight result; meaningful between a pass and `commit`.
    pub fn pending(&self) -> &[f32] {
        &self.next
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.cells[y * self.width + x]
    }

    pub fn reseed(&mut self, seed: u64) {
        fill_noise(&mut self.cells, seed);
    }

    /// Frozen committed snapshot plus the pending buffer a pass writes into.
    pub fn split(&mut self) -> (&[f32], &mut [f32]) {
        (&self.cells, &mut self.next)
    }

    /// Pending buffer as input plus scratch to write into. Follow with
    /// `promote_scratch` once the pass succeeded.
    pub fn split_pending(&mut self) -> (&[f32], &mut [f32]) {
        (&self.next, &mut self.spare)
    }

    pub fn promote_scratch(&mut self) {
        std::mem::swap(&mut self.next, &mut self.spare);
    }

    pub(crate) fn cells_mut(&mut self) -> &mut [f32] {
        &mut self.cells
    }

    pub fn commit(&mut self) {
        std::mem::swap(&mut self.cells, &mut self.next);
    }

    pub(crate) fn clamp_all(&mut self) {
        for v in &mut self.cells {
            *v = v.clamp(-1.0, 1.0);
        }
    }
}

fn fill_noise(buf: &mut [f32], seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    for v in buf.iter_mut() {
        *v = rng.gen_range(-1.0..1.0);
    }
}

/// SplitMix64 step, used to derive independent per-scale seeds from the
/// run seed.
pub fn derive_seed(seed: u64, stream: u64) -> u64 {
    let mut z = seed.wrapping_add(stream.wrapping_add(1).wrapping_mul(0x9E3779B97F4A7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}
