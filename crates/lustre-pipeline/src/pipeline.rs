//! Orchestration: turn settings into an ordered stage plan and run it.
//!
//! Both modes share one pipeline. [`plan`] resolves a mode's
//! [`ModeCoefficients`] against the user's [`FilterSettings`] into a
//! list of [`Stage`] descriptors; execution walks that list over a pair
//! of ping-pong buffers, so only two rasters (plus one float plane) are
//! alive at any time regardless of how many stages run.
//!
//! | Mode    | Resolution step            | Filter order                                  |
//! |---------|----------------------------|-----------------------------------------------|
//! | Preview | fit within 800 px          | denoise, tone, saturate, sharpen, enhance     |
//! | Final   | x2 (max 1500 px) if < 1 MP | denoise, enhance, tone, saturate, sharpen     |
//!
//! Final runs report progress at fixed milestones; preview runs only
//! report completion.

use tracing::{debug, info, info_span};

use crate::bilateral::{BilateralParams, bilateral_filter_into};
use crate::cancel::CancelToken;
use crate::codec::{JPEG_MIME, encode_jpeg};
use crate::color::enhance_color;
use crate::diagnostics::{
    Clock, PipelineDiagnostics, PipelineSummary, StageDiagnostics, StageMetrics, duration_ms,
};
use crate::local_contrast::{LocalContrastParams, enhance_local_contrast, tiles};
use crate::progress::{ProgressSink, ProgressTracker};
use crate::raster::Workspace;
use crate::resample::{fit_within, resample_into, scaled_dimensions};
use crate::saturation::{adjust_saturation, saturation_factor};
use crate::sharpen::{UnsharpParams, enhance_detail_into, unsharp_mask_into};
use crate::tone::{ToneParams, tone_map};
use crate::types::{
    Dimensions, FilterSettings, Mode, Output, OutputFormat, PipelineConfig, PipelineError,
    ProcessingResult, RgbaImage, Validation,
};

// ───────────────────────── Coefficients ──────────────────────────

/// `base + strength / 100 * span`, mapping a `0..=100` slider onto a
/// parameter range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Linear {
    /// Value at strength 0.
    pub base: f64,
    /// Added at strength 100.
    pub span: f64,
}

impl Linear {
    const fn new(base: f64, span: f64) -> Self {
        Self { base, span }
    }

    /// Evaluate at `strength`.
    #[must_use]
    pub fn at(self, strength: f64) -> f64 {
        (strength / 100.0).mul_add(self.span, self.base)
    }
}

/// How a mode changes resolution before filtering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolution {
    /// Downscale so the longest axis is at most `max_dimension`.
    FitWithin {
        /// Longest allowed axis.
        max_dimension: u32,
    },
    /// Upscale sources smaller than `area_limit` pixels by up to
    /// `factor`, keeping the longest axis at most `max_dimension`.
    Upscale {
        /// Preferred scale factor.
        factor: f64,
        /// Longest allowed axis after scaling.
        max_dimension: u32,
        /// Sources at or above this pixel count are left alone.
        area_limit: u64,
    },
}

/// Progress percentages reported after each stage of a final run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Milestones {
    /// After the resolution step, whether or not it changed anything.
    pub resolved: u8,
    /// After bilateral denoise.
    pub denoise: u8,
    /// After the enhancement chain.
    pub enhance_chain: u8,
    /// After tone mapping.
    pub tone_map: u8,
    /// After saturation.
    pub saturate: u8,
    /// After sharpening.
    pub sharpen: u8,
}

/// Every coefficient that differs between preview and final runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModeCoefficients {
    /// Unsharp gain from `sharpening`.
    pub sharpen_amount: Linear,
    /// Unsharp blur radius from `sharpening`.
    pub sharpen_radius: Linear,
    /// Unsharp residual threshold.
    pub sharpen_threshold: f64,
    /// Bilateral spatial sigma from `denoising`.
    pub denoise_spatial: Linear,
    /// Bilateral range sigma from `denoising`.
    pub denoise_intensity: Linear,
    /// Resolution step before filtering.
    pub resolution: Resolution,
    /// JPEG quality of encoded output.
    pub jpeg_quality: u8,
    /// Progress milestones, when the mode reports them.
    pub milestones: Option<Milestones>,
}

impl ModeCoefficients {
    /// Interactive preview.
    pub const PREVIEW: Self = Self {
        sharpen_amount: Linear::new(0.5, 2.0),
        sharpen_radius: Linear::new(1.0, 1.5),
        sharpen_threshold: 3.0,
        denoise_spatial: Linear::new(2.0, 3.0),
        denoise_intensity: Linear::new(15.0, 35.0),
        resolution: Resolution::FitWithin { max_dimension: 800 },
        jpeg_quality: 90,
        milestones: None,
    };

    /// Full quality.
    pub const FINAL: Self = Self {
        sharpen_amount: Linear::new(1.0, 3.0),
        sharpen_radius: Linear::new(1.2, 2.0),
        sharpen_threshold: 2.0,
        denoise_spatial: Linear::new(3.0, 4.0),
        denoise_intensity: Linear::new(20.0, 50.0),
        resolution: Resolution::Upscale {
            factor: 2.0,
            max_dimension: 1500,
            area_limit: 1_000_000,
        },
        jpeg_quality: 98,
        milestones: Some(Milestones {
            resolved: 10,
            denoise: 25,
            enhance_chain: 50,
            tone_map: 65,
            saturate: 80,
            sharpen: 95,
        }),
    };

    /// Coefficients for `mode`.
    #[must_use]
    pub const fn for_mode(mode: Mode) -> &'static Self {
        match mode {
            Mode::Preview => &Self::PREVIEW,
            Mode::Final => &Self::FINAL,
        }
    }

    /// Scale factor of the resolution step for a source of `dims`, or
    /// `None` when the image keeps its size.
    #[must_use]
    pub fn resolution_scale(&self, dims: Dimensions) -> Option<f64> {
        let longest = dims.max_dimension();
        if dims.area() == 0 {
            return None;
        }
        let scale = match self.resolution {
            Resolution::FitWithin { max_dimension } => {
                fit_within(dims.width, dims.height, max_dimension)
            }
            Resolution::Upscale {
                factor,
                max_dimension,
                area_limit,
            } => {
                if dims.area() >= area_limit {
                    return None;
                }
                factor.min(f64::from(max_dimension) / f64::from(longest))
            }
        };
        let (w, h) = scaled_dimensions(dims.width, dims.height, scale);
        let changes = match self.resolution {
            Resolution::FitWithin { .. } => scale < 1.0,
            Resolution::Upscale { .. } => scale > 1.0,
        };
        (changes && (w, h) != (dims.width, dims.height)).then_some(scale)
    }
}

// ───────────────────────── Plan ──────────────────────────

/// One resolved processing step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Stage {
    /// Bicubic resampling by `scale`.
    Resample {
        /// Uniform scale factor.
        scale: f64,
    },
    /// Bilateral denoise.
    Denoise(BilateralParams),
    /// Brightness/contrast curve.
    ToneMap(ToneParams),
    /// HSL saturation scaling.
    Saturate {
        /// Slider value in `-50..=50`.
        saturation: f64,
    },
    /// Unsharp mask.
    Sharpen(UnsharpParams),
    /// Fixed chain: bilateral (3, 25), local contrast, detail, color.
    EnhanceChain(LocalContrastParams),
}

impl Stage {
    /// Display name used in logs and diagnostics.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Resample { .. } => "Resample",
            Self::Denoise(_) => "Denoise",
            Self::ToneMap(_) => "Tone Map",
            Self::Saturate { .. } => "Saturate",
            Self::Sharpen(_) => "Sharpen",
            Self::EnhanceChain(_) => "Enhance Chain",
        }
    }
}

/// A stage and the progress value to report once it finishes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlannedStage {
    /// What to run.
    pub stage: Stage,
    /// Percentage reported after the stage, if any.
    pub milestone: Option<u8>,
}

/// The full ordered work list for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    /// Resolution step, run first. `None` when the size is kept.
    pub resample: Option<Stage>,
    /// Reported after the resolution step even when it was skipped.
    pub resolved_milestone: Option<u8>,
    /// Filters in execution order.
    pub filters: Vec<PlannedStage>,
    /// Encoder quality for [`OutputFormat::Jpeg`].
    pub jpeg_quality: u8,
}

/// Build the stage plan for `mode`.
///
/// `settings` are used as given; range handling happens before planning.
#[must_use]
pub fn plan(
    mode: Mode,
    settings: &FilterSettings,
    dims: Dimensions,
    local_contrast: LocalContrastParams,
) -> Plan {
    let k = ModeCoefficients::for_mode(mode);
    let milestone = |pick: fn(&Milestones) -> u8| k.milestones.as_ref().map(pick);

    let denoise = (settings.denoising > 0.0).then(|| PlannedStage {
        stage: Stage::Denoise(BilateralParams {
            spatial_sigma: k.denoise_spatial.at(settings.denoising),
            intensity_sigma: k.denoise_intensity.at(settings.denoising),
        }),
        milestone: milestone(|m| m.denoise),
    });
    let tone = ToneParams {
        brightness: settings.brightness,
        contrast: settings.contrast,
    };
    let tone = tone.is_active().then(|| PlannedStage {
        stage: Stage::ToneMap(tone),
        milestone: milestone(|m| m.tone_map),
    });
    let saturate = (settings.saturation != 0.0).then(|| PlannedStage {
        stage: Stage::Saturate {
            saturation: settings.saturation,
        },
        milestone: milestone(|m| m.saturate),
    });
    let sharpen = (settings.sharpening > 0.0).then(|| PlannedStage {
        stage: Stage::Sharpen(UnsharpParams {
            amount: k.sharpen_amount.at(settings.sharpening),
            radius: k.sharpen_radius.at(settings.sharpening),
            threshold: k.sharpen_threshold,
        }),
        milestone: milestone(|m| m.sharpen),
    });
    let enhance = settings.ai_enhance.then(|| PlannedStage {
        stage: Stage::EnhanceChain(local_contrast),
        milestone: milestone(|m| m.enhance_chain),
    });

    let ordered = match mode {
        Mode::Preview => [denoise, tone, saturate, sharpen, enhance],
        Mode::Final => [denoise, enhance, tone, saturate, sharpen],
    };

    Plan {
        resample: k
            .resolution_scale(dims)
            .map(|scale| Stage::Resample { scale }),
        resolved_milestone: milestone(|m| m.resolved),
        filters: ordered.into_iter().flatten().collect(),
        jpeg_quality: k.jpeg_quality,
    }
}

// ───────────────────────── Execution ──────────────────────────

/// Apply the configured range policy to `settings`.
fn resolve_settings(
    settings: &FilterSettings,
    validation: Validation,
) -> Result<FilterSettings, PipelineError> {
    match validation {
        Validation::Clamp => Ok(settings.clamped()),
        Validation::Strict => {
            settings.validate()?;
            Ok(*settings)
        }
    }
}

fn resolve_local_contrast(config: &PipelineConfig) -> Result<LocalContrastParams, PipelineError> {
    let clip_ok = config.local_contrast_clip.is_finite() && config.local_contrast_clip > 0.0;
    match config.validation {
        Validation::Strict if config.local_contrast_block == 0 => Err(
            PipelineError::InvalidParameter("local_contrast_block must be at least 1".to_owned()),
        ),
        Validation::Strict if !clip_ok => Err(PipelineError::InvalidParameter(format!(
            "local_contrast_clip must be finite and positive, got {}",
            config.local_contrast_clip,
        ))),
        _ => Ok(LocalContrastParams {
            block_size: config.local_contrast_block.max(1),
            clip_limit: if clip_ok {
                config.local_contrast_clip
            } else {
                PipelineConfig::DEFAULT_LOCAL_CONTRAST_CLIP
            },
        }),
    }
}

/// Validate, plan and execute one run, inside a dedicated thread pool
/// when `config.threads` is set.
pub(crate) fn run<C: Clock + Sync>(
    image: RgbaImage,
    settings: &FilterSettings,
    mode: Mode,
    config: &PipelineConfig,
    progress: &mut dyn ProgressSink,
    cancel: &CancelToken,
    clock: &C,
) -> Result<(ProcessingResult, PipelineDiagnostics), PipelineError> {
    let settings = resolve_settings(settings, config.validation)?;
    let local_contrast = resolve_local_contrast(config)?;
    let job = Job {
        mode,
        settings,
        local_contrast,
        output: config.output,
    };

    match config.threads {
        Some(threads) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|e| PipelineError::ContextUnavailable(e.to_string()))?;
            pool.install(|| job.execute(image, progress, cancel, clock))
        }
        None => job.execute(image, progress, cancel, clock),
    }
}

/// Resolved inputs of one run.
struct Job {
    mode: Mode,
    settings: FilterSettings,
    local_contrast: LocalContrastParams,
    output: OutputFormat,
}

impl Job {
    fn execute<C: Clock>(
        self,
        image: RgbaImage,
        progress: &mut dyn ProgressSink,
        cancel: &CancelToken,
        clock: &C,
    ) -> Result<(ProcessingResult, PipelineDiagnostics), PipelineError> {
        let started = clock.now();
        let source = Dimensions::of(&image);
        let span = info_span!(
            "enhance",
            mode = %self.mode,
            width = source.width,
            height = source.height,
        );
        let _guard = span.enter();

        let plan = plan(self.mode, &self.settings, source, self.local_contrast);
        debug!(?plan, "planned");

        let mut tracker = ProgressTracker::new(progress);
        let mut workspace = Workspace::new(image)?;
        let mut stages = Vec::with_capacity(plan.filters.len() + 2);

        if let Some(stage) = plan.resample {
            stages.push(run_stage(&stage, &mut workspace, cancel, clock)?);
        }
        if let Some(m) = plan.resolved_milestone {
            tracker.advance(m);
        }
        for planned in &plan.filters {
            stages.push(run_stage(&planned.stage, &mut workspace, cancel, clock)?);
            if let Some(m) = planned.milestone {
                tracker.advance(m);
            }
        }

        check_cancelled(cancel)?;
        let image = workspace.into_image();
        let dimensions = Dimensions::of(&image);
        let output = match self.output {
            OutputFormat::Jpeg => {
                let t = clock.now();
                let bytes = encode_jpeg(&image, plan.jpeg_quality)?;
                let metrics = StageMetrics::Encode {
                    mime_type: JPEG_MIME.to_owned(),
                    quality: plan.jpeg_quality,
                    output_bytes: bytes.len(),
                };
                stages.push(record("Encode", clock.elapsed(&t), metrics));
                Output::Encoded {
                    bytes,
                    mime_type: JPEG_MIME,
                }
            }
            OutputFormat::Raw => Output::Raw(image),
        };

        tracker.complete();
        let total_duration = clock.elapsed(&started);
        info!(
            width = dimensions.width,
            height = dimensions.height,
            filters = plan.filters.len(),
            total_ms = duration_ms(total_duration),
            "enhancement complete",
        );

        let diagnostics = PipelineDiagnostics {
            stages,
            total_duration,
            summary: PipelineSummary {
                mode: self.mode,
                source,
                output: dimensions,
                filters_applied: plan.filters.len(),
            },
        };
        let result = ProcessingResult {
            output,
            dimensions,
            mode: self.mode,
        };
        Ok((result, diagnostics))
    }
}

fn check_cancelled(cancel: &CancelToken) -> Result<(), PipelineError> {
    if cancel.is_cancelled() {
        debug!("cancelled");
        return Err(PipelineError::Cancelled);
    }
    Ok(())
}

fn record(name: &str, duration: std::time::Duration, metrics: StageMetrics) -> StageDiagnostics {
    debug!(
        stage = name,
        duration_ms = duration_ms(duration),
        ?metrics,
        "stage complete"
    );
    StageDiagnostics {
        name: name.to_owned(),
        duration,
        metrics,
    }
}

fn run_stage<C: Clock>(
    stage: &Stage,
    workspace: &mut Workspace,
    cancel: &CancelToken,
    clock: &C,
) -> Result<StageDiagnostics, PipelineError> {
    check_cancelled(cancel)?;
    let t = clock.now();
    let metrics = apply(stage, workspace)?;
    Ok(record(stage.name(), clock.elapsed(&t), metrics))
}

/// Run one stage over the workspace, leaving its result in front.
fn apply(stage: &Stage, ws: &mut Workspace) -> Result<StageMetrics, PipelineError> {
    match *stage {
        Stage::Resample { scale } => {
            let from = Dimensions::of(ws.front());
            let (width, height) = scaled_dimensions(from.width, from.height, scale);
            ws.resize_back(width, height)?;
            let (src, dst, _) = ws.split();
            resample_into(src, dst, scale);
            ws.swap();
            ws.match_back_to_front()?;
            Ok(StageMetrics::Resample {
                from,
                to: Dimensions { width, height },
                scale,
            })
        }
        Stage::Denoise(params) => {
            let (src, dst, _) = ws.split();
            bilateral_filter_into(src, dst, params);
            ws.swap();
            Ok(StageMetrics::Denoise {
                spatial_sigma: params.spatial_sigma,
                intensity_sigma: params.intensity_sigma,
                radius: params.radius(),
            })
        }
        Stage::ToneMap(params) => {
            tone_map(ws.front_mut(), params);
            Ok(StageMetrics::ToneMap {
                brightness: params.brightness,
                contrast: params.contrast,
            })
        }
        Stage::Saturate { saturation } => {
            adjust_saturation(ws.front_mut(), saturation);
            Ok(StageMetrics::Saturate {
                factor: saturation_factor(saturation),
            })
        }
        Stage::Sharpen(params) => {
            let (src, dst, scratch) = ws.split();
            unsharp_mask_into(src, dst, scratch, params)?;
            ws.swap();
            Ok(StageMetrics::Sharpen {
                amount: params.amount,
                radius: params.radius,
                threshold: params.threshold,
            })
        }
        Stage::EnhanceChain(local_contrast) => {
            let (src, dst, _) = ws.split();
            bilateral_filter_into(src, dst, BilateralParams::ENHANCE_CHAIN);
            ws.swap();

            enhance_local_contrast(ws.front_mut(), local_contrast);

            let (src, dst, scratch) = ws.split();
            enhance_detail_into(src, dst, scratch)?;
            ws.swap();

            enhance_color(ws.front_mut());

            let (w, h) = ws.front().dimensions();
            Ok(StageMetrics::EnhanceChain {
                block_size: local_contrast.block_size,
                clip_limit: local_contrast.clip_limit,
                tile_count: tiles(w, h, local_contrast.block_size).len(),
            })
        }
    }
}
