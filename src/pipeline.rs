//! Frame orchestration: update every scale, fold every scale, composite.

use crate::backend::{Backend, Kernel};
use crate::colour::Pixel;
use crate::composite::{self, Layer, OutputImage};
use crate::config::{Palette, ScaleConfig, Settings};
use crate::error::{BackendError, PipelineError};
use crate::field::{derive_seed, Grid, ScaleState};
use crate::symmetry::SymmetryFold;
use crate::update::{RowPrefix, Updater};
use std::time::Instant;
use tracing::{debug, info};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Running,
}

struct Scale {
    config: ScaleConfig,
    updater: Updater,
    fold: SymmetryFold,
    state: ScaleState,
}

pub struct Pipeline<B: Backend> {
    backend: B,
    palette: Palette,
    seed: u64,
    grid: Grid,
    scales: Vec<Scale>,
    prefix: RowPrefix,
    output: OutputImage,
    staging: Vec<Pixel>,
    phase: Phase,
    frame: u64,
}

impl<B: Backend> Pipeline<B> {
    /// Validates the settings and allocates every buffer up front. Nothing
    /// is allocated per frame.
    pub fn new(settings: &Settings, backend: B) -> Result<Self, PipelineError> {
        settings.validate()?;
        let (w, h) = (settings.width, settings.height);

        let grid = Grid::new(&backend, w, h, settings.seed).map_err(PipelineError::Resource)?;
        let mut scales = Vec::with_capacity(settings.scales.len());
        for config in &settings.scales {
            scales.push(Scale {
                config: config.clone(),
                updater: Updater::new(config),
                fold: SymmetryFold::new(config.symmetry),
                state: ScaleState::new(&backend, w, h).map_err(PipelineError::Resource)?,
            });
        }
        let prefix = RowPrefix::new(&backend, w, h).map_err(PipelineError::Resource)?;
        let output = OutputImage::new(&backend, w, h).map_err(PipelineError::Resource)?;
        let staging = backend
            .allocate(w * h, Pixel::default())
            .map_err(PipelineError::Resource)?;

        info!(
            width = w,
            height = h,
            scales = scales.len(),
            seed = settings.seed,
            "pipeline ready"
        );

        Ok(Self {
            backend,
            palette: settings.palette.clone(),
            seed: settings.seed,
            grid,
            scales,
            prefix,
            output,
            staging,
            phase: Phase::Uninitialized,
            frame: 0,
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Number of frames completed so far; also the index of the next frame.
    pub fn frame_index(&self) -> u64 {
        self.frame
    }

    pub fn width(&self) -> usize {
        self.grid.width()
    }

    pub fn height(&self) -> usize {
        self.grid.height()
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn output(&self) -> &OutputImage {
        &self.output
    }

    pub fn scale_count(&self) -> usize {
        self.scales.len()
    }

    pub fn scale_config(&self, index: usize) -> Option<&ScaleConfig> {
        self.scales.get(index).map(|s| &s.config)
    }

    pub fn scale_state(&self, index: usize) -> Result<&ScaleState, PipelineError> {
        self.scales
            .get(index)
            .map(|s| &s.state)
            .ok_or(PipelineError::ScaleOutOfRange {
                index,
                count: self.scales.len(),
            })
    }

    /// Enters `Running`: clears the output to the background and seeds every
    /// scale with its own noise stream. Does nothing once running.
    pub fn start(&mut self) -> Result<(), PipelineError> {
        if self.phase == Phase::Running {
            return Ok(());
        }
        composite::clear(&self.backend, &mut self.output, self.palette.background).map_err(
            |source| PipelineError::FrameFailed {
                frame: self.frame,
                source,
            },
        )?;
        for (i, scale) in self.scales.iter_mut().enumerate() {
            scale.state.reseed(derive_seed(self.seed, i as u64));
        }
        self.phase = Phase::Running;
        debug!("output cleared, scales seeded");
        Ok(())
    }

    /// Replaces one scale's committed values, clamped into [-1, 1]. Values
    /// uploaded before `start` are overwritten by seeding.
    pub fn upload_scale(&mut self, index: usize, values: &[f32]) -> Result<(), PipelineError> {
        let count = self.scales.len();
        let scale = self
            .scales
            .get_mut(index)
            .ok_or(PipelineError::ScaleOutOfRange { index, count })?;
        self.backend
            .upload(Kernel::Upload, scale.state.cells_mut(), values)
            .map_err(PipelineError::Upload)?;
        scale.state.clamp_all();
        Ok(())
    }

    pub fn readback_scale(&self, index: usize) -> Result<Vec<f32>, PipelineError> {
        let state = self.scale_state(index)?;
        Ok(self.backend.readback(state.values()))
    }

    /// Runs one full frame. On failure the frame is dropped: the output
    /// still holds the last completed frame and no scale state has moved.
    pub fn step(&mut self) -> Result<&OutputImage, PipelineError> {
        self.start()?;
        let frame = self.frame;
        let started = Instant::now();
        let dropped = |source| PipelineError::FrameFailed { frame, source };

        self.update_pass().map_err(dropped)?;
        self.fold_pass().map_err(dropped)?;
        self.composite_pass().map_err(dropped)?;
        for scale in &mut self.scales {
            scale.state.commit();
        }

        self.frame += 1;
        debug!(
            frame,
            elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
            "frame complete"
        );
        Ok(&self.output)
    }

    // Passes only touch each scale's pending buffers and the staging image.
    // `step` commits everything once the last pass succeeded.

    fn update_pass(&mut self) -> Result<(), BackendError> {
        let started = Instant::now();
        for scale in &mut self.scales {
            scale
                .updater
                .step(&self.backend, &mut self.prefix, &mut scale.state)?;
        }
        debug!(elapsed_ms = started.elapsed().as_secs_f64() * 1000.0, "update pass");
        Ok(())
    }

    fn fold_pass(&mut self) -> Result<(), BackendError> {
        let started = Instant::now();
        for scale in self.scales.iter_mut().filter(|s| !s.fold.is_identity()) {
            scale.fold.fold(&self.backend, &mut scale.state)?;
        }
        debug!(elapsed_ms = started.elapsed().as_secs_f64() * 1000.0, "fold pass");
        Ok(())
    }

    fn composite_pass(&mut self) -> Result<(), BackendError> {
        let started = Instant::now();
        let layers: Vec<Layer<'_>> = self
            .scales
            .iter()
            .map(|s| Layer {
                values: s.state.pending(),
                colour: s.config.colour,
            })
            .collect();
        composite::composite(
            &self.backend,
            &self.palette,
            &self.grid,
            &layers,
            &mut self.staging,
        )?;
        self.output.swap_pixels(&mut self.staging);
        debug!(elapsed_ms = started.elapsed().as_secs_f64() * 1000.0, "composite pass");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SerialBackend;
    use crate::colour::Rgba;

    fn settings(w: usize, h: usize, scales: Vec<ScaleConfig>) -> Settings {
        Settings {
            width: w,
            height: h,
            seed: 11,
            palette: Palette::default(),
            scales,
        }
    }

    #[test]
    fn test_new_rejects_invalid_settings() {
        let s = settings(4, 4, vec![]);
        assert!(matches!(
            Pipeline::new(&s, SerialBackend),
            Err(PipelineError::Config(_))
        ));
    }

    #[test]
    fn test_start_transitions_once() {
        let s = settings(5, 3, vec![ScaleConfig::new(1.0, 2.0, 0.1, 1, Rgba::BLACK)]);
        let mut p = Pipeline::new(&s, SerialBackend).unwrap();
        assert_eq!(p.phase(), Phase::Uninitialized);
        p.start().unwrap();
        assert_eq!(p.phase(), Phase::Running);
        let seeded = p.readback_scale(0).unwrap();
        assert!(seeded.iter().all(|v| (-1.0..1.0).contains(v)));
        p.start().unwrap();
        assert_eq!(p.readback_scale(0).unwrap(), seeded);
    }

    #[test]
    fn test_scales_get_independent_noise() {
        let c = ScaleConfig::new(1.0, 2.0, 0.1, 1, Rgba::BLACK);
        let s = settings(6, 6, vec![c.clone(), c]);
        let mut p = Pipeline::new(&s, SerialBackend).unwrap();
        p.start().unwrap();
        let a = p.readback_scale(0).unwrap();
        let b = p.readback_scale(1).unwrap();
        assert_ne!(a, b);
        assert_ne!(a.as_slice(), p.grid().values());
    }

    #[test]
    fn test_upload_clamps_and_checks_size() {
        let s = settings(2, 2, vec![ScaleConfig::new(1.0, 2.0, 0.1, 1, Rgba::BLACK)]);
        let mut p = Pipeline::new(&s, SerialBackend).unwrap();
        p.start().unwrap();
        p.upload_scale(0, &[3.0, -3.0, 0.5, 0.0]).unwrap();
        assert_eq!(p.readback_scale(0).unwrap(), vec![1.0, -1.0, 0.5, 0.0]);
        let err = p.upload_scale(0, &[0.0]).unwrap_err();
        assert_eq!(
            err,
            PipelineError::Upload(BackendError::SizeMismatch {
                kernel: Kernel::Upload,
                expected: 4,
                got: 1
            })
        );
        assert!(err.to_string().contains("upload pass"));
        assert!(matches!(
            p.upload_scale(4, &[0.0; 4]),
            Err(PipelineError::ScaleOutOfRange { index: 4, count: 1 })
        ));
    }

    #[test]
    fn test_step_counts_frames() {
        let s = settings(8, 8, vec![ScaleConfig::new(1.0, 3.0, 0.05, 4, Rgba::BLACK)]);
        let mut p = Pipeline::new(&s, SerialBackend).unwrap();
        for _ in 0..3 {
            p.step().unwrap();
        }
        assert_eq!(p.frame_index(), 3);
        assert!(p
            .readback_scale(0)
            .unwrap()
            .iter()
            .all(|v| (-1.0..=1.0).contains(v)));
    }
}
