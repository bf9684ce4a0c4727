//! Multiscale Turing patterns.
//!
//! Several activator–inhibitor layers of very different radii evolve over
//! one toroidal domain. Each frame updates every layer, folds the layers
//! that ask for k-fold rotational symmetry, and composites them over a
//! noise-tinted base into an RGBA image.

pub mod backend;
pub mod colour;
pub mod composite;
pub mod config;
pub mod error;
pub mod field;
pub mod input;
pub mod logging;
pub mod pipeline;
pub mod render;
pub mod sink;
pub mod symmetry;
pub mod update;

pub use backend::{Backend, Kernel, RayonBackend, SerialBackend};
pub use colour::{Pixel, Rgba};
pub use composite::OutputImage;
pub use config::{Palette, ScaleConfig, Settings};
pub use error::{BackendError, ConfigError, PipelineError};
pub use field::{Grid, ScaleState};
pub use pipeline::{Phase, Pipeline};
pub use sink::{FrameSink, PngSequence};
