//! lustre-pipeline: Pure raster enhancement pipeline (sans-IO).
//!
//! Enhances an RGBA raster through:
//! resolution step -> bilateral denoise -> tone map -> saturation ->
//! unsharp mask, plus an optional fixed enhancement chain (denoise,
//! tiled local contrast, detail boost, color grading).
//!
//! Two modes share one parameterized pipeline: [`Mode::Preview`] works
//! on a downscaled copy with lighter coefficients, [`Mode::Final`]
//! upscales small sources, uses stronger coefficients and reports
//! progress milestones.
//!
//! This crate has **no I/O dependencies**: it operates on in-memory
//! rasters and byte slices. Reading and writing files lives in
//! `lustre-bench`.

pub mod bilateral;
pub mod blur;
pub mod cancel;
pub mod codec;
pub mod color;
pub mod diagnostics;
pub mod kernel;
pub mod local_contrast;
pub mod pipeline;
pub mod progress;
pub mod raster;
pub mod resample;
pub mod saturation;
pub mod sharpen;
pub mod tone;
pub mod types;

pub use cancel::CancelToken;
pub use codec::{decode, encode_jpeg, image_metadata};
pub use diagnostics::{Clock, NullClock, PipelineDiagnostics};
pub use pipeline::{ModeCoefficients, Plan, Stage, plan};
pub use progress::{NoProgress, ProgressSink};
pub use types::{
    Dimensions, FilterSettings, ImageMetadata, Mode, Output, OutputFormat, PipelineConfig,
    PipelineError, ProcessingResult, RgbaImage, Validation, raster_from_raw,
};

/// Enhance `image` with `settings` in the given `mode`.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidParameter`] for out-of-range settings
/// under [`Validation::Strict`], [`PipelineError::ContextUnavailable`] if
/// the configured thread pool cannot be built,
/// [`PipelineError::ResourceExhausted`] if a working buffer cannot be
/// allocated, or [`PipelineError::Encode`] if JPEG encoding fails.
pub fn process(
    image: RgbaImage,
    settings: &FilterSettings,
    mode: Mode,
    config: &PipelineConfig,
) -> Result<ProcessingResult, PipelineError> {
    process_with_progress(
        image,
        settings,
        mode,
        config,
        &mut NoProgress,
        &CancelToken::new(),
    )
}

/// Like [`process`], reporting progress to `progress` and stopping with
/// [`PipelineError::Cancelled`] once `cancel` is set.
///
/// # Errors
///
/// Same as [`process`], plus [`PipelineError::Cancelled`].
pub fn process_with_progress(
    image: RgbaImage,
    settings: &FilterSettings,
    mode: Mode,
    config: &PipelineConfig,
    progress: &mut dyn ProgressSink,
    cancel: &CancelToken,
) -> Result<ProcessingResult, PipelineError> {
    pipeline::run(image, settings, mode, config, progress, cancel, &NullClock)
        .map(|(result, _)| result)
}

/// Decode `bytes` and enhance the result.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] or [`PipelineError::ImageDecode`]
/// if `bytes` cannot be decoded, otherwise the same as [`process`].
pub fn process_bytes(
    bytes: &[u8],
    settings: &FilterSettings,
    mode: Mode,
    config: &PipelineConfig,
) -> Result<ProcessingResult, PipelineError> {
    process(decode(bytes)?, settings, mode, config)
}
