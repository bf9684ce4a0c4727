//! Activator–inhibitor update.
//!
//! Both signals are full-area means over a lattice disk, wrapped
//! toroidally. Each disk is stored as one horizontal span per row offset, so
//! with per-row prefix sums of the frozen snapshot a mean costs O(radius)
//! per cell and does not depend on how the pass is scheduled.

use crate::backend::{Backend, Kernel};
use crate::config::ScaleConfig;
use crate::error::BackendError;
use crate::field::ScaleState;

/// Row-wise inclusive prefix sums of a field, `width + 1` entries per row.
#[derive(Clone, Debug)]
pub struct RowPrefix {
    width: usize,
    height: usize,
    sums: Vec<f64>,
}

impl RowPrefix {
    pub fn new<B: Backend>(backend: &B, width: usize, height: usize) -> Result<Self, BackendError> {
        Ok(Self {
            width,
            height,
            sums: backend.allocate(height * (width + 1), 0.0f64)?,
        })
    }

    pub fn rebuild<B: Backend>(&mut self, backend: &B, cells: &[f32]) -> Result<(), BackendError> {
        let w = self.width;
        if cells.len() != w * self.height {
            return Err(BackendError::SizeMismatch {
                kernel: Kernel::Update,
                expected: w * self.height,
                got: cells.len(),
            });
        }
        backend.run_rows(Kernel::Update, self.height, w + 1, &mut self.sums, |y, row| {
            let src = &cells[y * w..(y + 1) * w];
            let mut acc = 0.0f64;
            row[0] = 0.0;
            for (x, v) in src.iter().enumerate() {
                acc += *v as f64;
                row[x + 1] = acc;
            }
        })
    }

    /// Sum of `len` consecutive cells of `row` starting at column `start`,
    /// wrapping around the row as many times as needed.
    #[inline]
    pub fn span(&self, row: usize, start: isize, len: usize) -> f64 {
        let w = self.width;
        let p = &self.sums[row * (w + 1)..(row + 1) * (w + 1)];
        let total = p[w];
        let laps = len / w;
        let rem = len % w;
        let s = start.rem_euclid(w as isize) as usize;
        let part = if rem == 0 {
            0.0
        } else if s + rem <= w {
            p[s + rem] - p[s]
        } else {
            (total - p[s]) + p[s + rem - w]
        };
        laps as f64 * total + part
    }
}

/// The lattice points with `dx² + dy² <= r²`, one span per row offset.
#[derive(Clone, Debug, PartialEq)]
pub struct Disk {
    radius: f32,
    spans: Vec<(isize, usize)>,
    count: usize,
}

impl Disk {
    pub fn new(radius: f32) -> Self {
        let r = radius.max(0.0) as f64;
        let reach = r.floor() as isize;
        let r2 = r * r;
        let mut spans = Vec::with_capacity((2 * reach + 1) as usize);
        let mut count = 0;
        for dy in -reach..=reach {
            let half = (r2 - (dy * dy) as f64).max(0.0).sqrt().floor() as usize;
            spans.push((dy, half));
            count += 2 * half + 1;
        }
        Self {
            radius,
            spans,
            count,
        }
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Number of lattice cells covered.
    pub fn area(&self) -> usize {
        self.count
    }

    pub fn contains(&self, dx: isize, dy: isize) -> bool {
        self.spans
            .iter()
            .any(|&(sy, half)| sy == dy && dx.unsigned_abs() <= half)
    }

    #[inline]
    pub fn mean(&self, prefix: &RowPrefix, x: usize, y: usize) -> f32 {
        let h = prefix.height as isize;
        let mut sum = 0.0f64;
        for &(dy, half) in &self.spans {
            let row = (y as isize + dy).rem_euclid(h) as usize;
            sum += prefix.span(row, x as isize - half as isize, 2 * half + 1);
        }
        (sum / self.count as f64) as f32
    }
}

#[derive(Clone, Debug)]
pub struct Updater {
    activator: Disk,
    inhibitor: Disk,
    small_amount: f32,
}

impl Updater {
    pub fn new(config: &ScaleConfig) -> Self {
        Self {
            activator: Disk::new(config.activator_radius),
            inhibitor: Disk::new(config.inhibitor_radius),
            small_amount: config.small_amount,
        }
    }

    /// `(activator_signal, inhibitor_signal)` at one cell.
    pub fn signals(&self, prefix: &RowPrefix, x: usize, y: usize) -> (f32, f32) {
        (
            self.activator.mean(prefix, x, y),
            self.inhibitor.mean(prefix, x, y),
        )
    }

    #[inline]
    pub fn next_value(&self, old: f32, activator: f32, inhibitor: f32) -> f32 {
        let delta = if activator > inhibitor {
            self.small_amount
        } else {
            -self.small_amount
        };
        (old + delta).clamp(-1.0, 1.0)
    }

    /// Computes one step into the state's pending buffer. The caller commits.
    pub fn step<B: Backend>(
        &self,
        backend: &B,
        prefix: &mut RowPrefix,
        state: &mut ScaleState,
    ) -> Result<(), BackendError> {
        let (w, h) = (state.width(), state.height());
        let (cur, next) = state.split();
        prefix.rebuild(backend, cur)?;
        let prefix: &RowPrefix = prefix;
        backend.run(Kernel::Update, w, h, next, |x, y| {
            let (a, i) = self.signals(prefix, x, y);
            self.next_value(cur[y * w + x], a, i)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{RayonBackend, SerialBackend};
    use crate::colour::Rgba;
    use approx::assert_abs_diff_eq;

    fn config(a: f32, i: f32, step: f32) -> ScaleConfig {
        ScaleConfig::new(a, i, step, 1, Rgba::BLACK)
    }

    fn pseudo_field(w: usize, h: usize) -> Vec<f32> {
        (0..w * h)
            .map(|i| (((i * 7919) % 201) as f32 / 100.0) - 1.0)
            .collect()
    }

    fn brute_mean(field: &[f32], w: usize, h: usize, x: usize, y: usize, r: f32) -> f32 {
        let reach = r.floor() as isize;
        let mut sum = 0.0f64;
        let mut n = 0usize;
        for dy in -reach..=reach {
            for dx in -reach..=reach {
                if ((dx * dx + dy * dy) as f64) <= (r as f64) * (r as f64) {
                    let xx = (x as isize + dx).rem_euclid(w as isize) as usize;
                    let yy = (y as isize + dy).rem_euclid(h as isize) as usize;
                    sum += field[yy * w + xx] as f64;
                    n += 1;
                }
            }
        }
        (sum / n as f64) as f32
    }

    #[test]
    fn test_disk_areas() {
        assert_eq!(Disk::new(0.5).area(), 1);
        assert_eq!(Disk::new(1.0).area(), 5);
        assert_eq!(Disk::new(2.0).area(), 13);
        assert_eq!(Disk::new(3.0).area(), 29);
    }

    #[test]
    fn test_disk_is_rotation_symmetric() {
        for r in [1.0, 2.5, 4.0, 7.3] {
            let d = Disk::new(r);
            let reach = r.floor() as isize;
            for dy in -reach..=reach {
                for dx in -reach..=reach {
                    let inside = d.contains(dx, dy);
                    assert_eq!(inside, d.contains(-dy, dx), "r={r} ({dx},{dy})");
                    assert_eq!(inside, d.contains(-dx, -dy), "r={r} ({dx},{dy})");
                }
            }
        }
    }

    #[test]
    fn test_mean_matches_brute_force_with_wrapping() {
        let (w, h) = (7, 5);
        let field = pseudo_field(w, h);
        let mut prefix = RowPrefix::new(&SerialBackend, w, h).unwrap();
        prefix.rebuild(&SerialBackend, &field).unwrap();
        for r in [1.0, 2.0, 3.5, 9.0] {
            let disk = Disk::new(r);
            for y in 0..h {
                for x in 0..w {
                    let fast = disk.mean(&prefix, x, y);
                    let slow = brute_mean(&field, w, h, x, y, r);
                    assert_abs_diff_eq!(fast, slow, epsilon = 1e-5);
                }
            }
        }
    }

    #[test]
    fn test_uniform_field_decrements() {
        let mut state = ScaleState::from_values(4, 4, vec![0.5; 16]).unwrap();
        let mut prefix = RowPrefix::new(&SerialBackend, 4, 4).unwrap();
        let up = Updater::new(&config(1.0, 2.0, 0.1));
        up.step(&SerialBackend, &mut prefix, &mut state).unwrap();
        state.commit();
        for v in state.values() {
            assert_abs_diff_eq!(*v, 0.4, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_hot_spot_grows_and_background_clamps() {
        let (w, h) = (9, 9);
        let mut values = vec![-1.0; w * h];
        values[4 * w + 4] = 1.0;
        let mut state = ScaleState::from_values(w, h, values).unwrap();
        let mut prefix = RowPrefix::new(&SerialBackend, w, h).unwrap();
        let up = Updater::new(&config(1.0, 2.0, 0.25));
        up.step(&SerialBackend, &mut prefix, &mut state).unwrap();

        let (a, i) = up.signals(&prefix, 4, 4);
        assert_abs_diff_eq!(a, -0.6, epsilon = 1e-6);
        assert_abs_diff_eq!(i, -11.0 / 13.0, epsilon = 1e-6);

        state.commit();
        assert_eq!(state.get(4, 4), 1.0);
        assert_eq!(state.get(0, 0), -1.0);
    }

    #[test]
    fn test_values_stay_clamped() {
        let (w, h) = (16, 12);
        let mut state = ScaleState::from_values(w, h, pseudo_field(w, h)).unwrap();
        let mut prefix = RowPrefix::new(&SerialBackend, w, h).unwrap();
        let up = Updater::new(&config(2.0, 4.0, 0.3));
        for _ in 0..20 {
            up.step(&SerialBackend, &mut prefix, &mut state).unwrap();
            state.commit();
            assert!(state.values().iter().all(|v| (-1.0..=1.0).contains(v)));
        }
    }

    #[test]
    fn test_step_is_reproducible_across_backends() {
        let (w, h) = (24, 18);
        let up = Updater::new(&config(2.0, 5.0, 0.05));

        let mut a = ScaleState::from_values(w, h, pseudo_field(w, h)).unwrap();
        let mut pa = RowPrefix::new(&SerialBackend, w, h).unwrap();
        up.step(&SerialBackend, &mut pa, &mut a).unwrap();

        let mut b = ScaleState::from_values(w, h, pseudo_field(w, h)).unwrap();
        let rayon = RayonBackend::with_threads(4).unwrap();
        let mut pb = RowPrefix::new(&rayon, w, h).unwrap();
        up.step(&rayon, &mut pb, &mut b).unwrap();

        for y in 0..h {
            for x in 0..w {
                assert_eq!(up.signals(&pa, x, y), up.signals(&pb, x, y));
            }
        }
        a.commit();
        b.commit();
        assert_eq!(a.values(), b.values());
    }
}
