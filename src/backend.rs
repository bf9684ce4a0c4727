//! Compute backends: the parallel-execution service every pass is
//! dispatched through.
//!
//! A pass is a pure function from a domain position (plus frozen inputs it
//! captures) to one output element. The backend decides how the positions
//! are scheduled; it returns only once every element of the pass has been
//! written, which is the barrier between passes.

use crate::error::BackendError;
use rayon::prelude::*;
use std::fmt;
use std::mem::size_of;

/// Named operations the orchestrator dispatches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kernel {
    Clear,
    Update,
    Fold,
    Composite,
    Upload,
}

impl fmt::Display for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Kernel::Clear => "clear",
            Kernel::Update => "update",
            Kernel::Fold => "fold",
            Kernel::Composite => "composite",
            Kernel::Upload => "upload",
        };
        f.write_str(name)
    }
}

pub trait Backend {
    /// Runs `f(y, row)` once for every row of a `height x row_len` buffer.
    fn run_rows<T, F>(
        &self,
        kernel: Kernel,
        height: usize,
        row_len: usize,
        out: &mut [T],
        f: F,
    ) -> Result<(), BackendError>
    where
        T: Send,
        F: Fn(usize, &mut [T]) + Sync + Send;

    /// Runs `f(x, y)` for every position of the domain and stores the result
    /// at `y * width + x`.
    fn run<T, F>(
        &self,
        kernel: Kernel,
        width: usize,
        height: usize,
        out: &mut [T],
        f: F,
    ) -> Result<(), BackendError>
    where
        T: Send,
        F: Fn(usize, usize) -> T + Sync + Send,
    {
        self.run_rows(kernel, height, width, out, |y, row| {
            for (x, slot) in row.iter_mut().enumerate() {
                *slot = f(x, y);
            }
        })
    }

    fn allocate<T: Clone>(&self, len: usize, fill: T) -> Result<Vec<T>, BackendError> {
        let bytes = len.saturating_mul(size_of::<T>());
        let mut buf = Vec::new();
        buf.try_reserve_exact(len)
            .map_err(|_| BackendError::OutOfMemory { bytes })?;
        buf.resize(len, fill);
        Ok(buf)
    }

    fn upload<T: Copy>(&self, kernel: Kernel, dst: &mut [T], src: &[T]) -> Result<(), BackendError> {
        check_len(kernel, dst.len(), src.len())?;
        dst.copy_from_slice(src);
        Ok(())
    }

    fn readback<T: Copy>(&self, src: &[T]) -> Vec<T> {
        src.to_vec()
    }
}

fn check_len(kernel: Kernel, expected: usize, got: usize) -> Result<(), BackendError> {
    if expected != got {
        return Err(BackendError::SizeMismatch {
            kernel,
            expected,
            got,
        });
    }
    Ok(())
}

/// Single-threaded reference backend.
#[derive(Clone, Copy, Debug, Default)]
pub struct SerialBackend;

impl Backend for SerialBackend {
    fn run_rows<T, F>(
        &self,
        kernel: Kernel,
        height: usize,
        row_len: usize,
        out: &mut [T],
        f: F,
    ) -> Result<(), BackendError>
    where
        T: Send,
        F: Fn(usize, &mut [T]) + Sync + Send,
    {
        check_len(kernel, height * row_len, out.len())?;
        if row_len == 0 {
            return Ok(());
        }
        for (y, row) in out.chunks_mut(row_len).enumerate() {
            f(y, row);
        }
        Ok(())
    }
}

/// Data-parallel backend on a rayon pool, one task per row.
pub struct RayonBackend {
    pool: Option<rayon::ThreadPool>,
}

impl RayonBackend {
    /// Uses rayon's global pool.
    pub fn new() -> Self {
        Self { pool: None }
    }

    pub fn with_threads(threads: usize) -> Result<Self, BackendError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("turing-worker-{i}"))
            .build()
            .map_err(|e| BackendError::ThreadPool(e.to_string()))?;
        Ok(Self { pool: Some(pool) })
    }

    pub fn threads(&self) -> usize {
        match &self.pool {
            Some(pool) => pool.current_num_threads(),
            None => rayon::current_num_threads(),
        }
    }
}

impl Default for RayonBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for RayonBackend {
    fn run_rows<T, F>(
        &self,
        kernel: Kernel,
        height: usize,
        row_len: usize,
        out: &mut [T],
        f: F,
    ) -> Result<(), BackendError>
    where
        T: Send,
        F: Fn(usize, &mut [T]) + Sync + Send,
    {
        check_len(kernel, height * row_len, out.len())?;
        if row_len == 0 {
            return Ok(());
        }
        match &self.pool {
            Some(pool) => pool.install(|| par_rows(out, row_len, &f)),
            None => par_rows(out, row_len, &f),
        }
        Ok(())
    }
}

fn par_rows<T, F>(out: &mut [T], row_len: usize, f: &F)
where
    T: Send,
    F: Fn(usize, &mut [T]) + Sync,
{
    out.par_chunks_mut(row_len)
        .enumerate()
        .for_each(|(y, row)| f(y, row));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_writes_every_position() {
        let mut out = vec![0usize; 12];
        SerialBackend
            .run(Kernel::Clear, 4, 3, &mut out, |x, y| y * 10 + x)
            .unwrap();
        assert_eq!(out, vec![0, 1, 2, 3, 10, 11, 12, 13, 20, 21, 22, 23]);
    }

    #[test]
    fn test_rayon_matches_serial() {
        let f = |x: usize, y: usize| ((x * 31 + y * 17) % 7) as f32 * 0.5;
        let mut a = vec![0.0f32; 64 * 40];
        let mut b = vec![0.0f32; 64 * 40];
        SerialBackend.run(Kernel::Update, 64, 40, &mut a, f).unwrap();
        RayonBackend::with_threads(3)
            .unwrap()
            .run(Kernel::Update, 64, 40, &mut b, f)
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_size_mismatch_is_reported() {
        let mut out = vec![0u8; 5];
        let err = RayonBackend::new()
            .run(Kernel::Fold, 2, 3, &mut out, |_, _| 1u8)
            .unwrap_err();
        assert_eq!(
            err,
            BackendError::SizeMismatch {
                kernel: Kernel::Fold,
                expected: 6,
                got: 5
            }
        );
    }

    #[test]
    fn test_allocate_reports_exhaustion() {
        let err = SerialBackend.allocate(usize::MAX / 2, 0.0f32).unwrap_err();
        assert!(matches!(err, BackendError::OutOfMemory { .. }));
    }

    #[test]
    fn test_upload_and_readback() {
        let mut buf = SerialBackend.allocate(3, 0i32).unwrap();
        SerialBackend.upload(Kernel::Update, &mut buf, &[1, 2, 3]).unwrap();
        assert_eq!(SerialBackend.readback(&buf), vec![1, 2, 3]);
        assert!(SerialBackend.upload(Kernel::Update, &mut buf, &[1]).is_err());
    }
}
