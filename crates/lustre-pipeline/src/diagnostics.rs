//! Pipeline diagnostics: timing and parameters for each executed stage.
//!
//! Every run collects diagnostics. [`crate::process`] uses [`NullClock`],
//! so its durations are all zero; callers that want real timings pass
//! their own [`Clock`] to [`process_with_diagnostics`]. The library never
//! reads the system time itself.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cancel::CancelToken;
use crate::progress::NoProgress;
use crate::types::{
    Dimensions, FilterSettings, Mode, PipelineConfig, PipelineError, ProcessingResult, RgbaImage,
};

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Source of monotonic timestamps.
pub trait Clock {
    /// Opaque point in time.
    type Instant;

    /// The current instant.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Clock that reports zero for every interval.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullClock;

impl Clock for NullClock {
    type Instant = ();

    fn now(&self) {}

    fn elapsed(&self, _since: &()) -> Duration {
        Duration::ZERO
    }
}

/// Diagnostics collected from a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Executed stages in order, ending with `Encode` for encoded output.
    pub stages: Vec<StageDiagnostics>,
    /// Total wall-clock duration of the run (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Run-level summary.
    pub summary: PipelineSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Display name of the stage.
    pub name: String,
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Resolved parameters and sizes for this stage.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Bicubic resampling.
    Resample {
        /// Size before resampling.
        from: Dimensions,
        /// Size after resampling.
        to: Dimensions,
        /// Scale factor applied to both axes.
        scale: f64,
    },
    /// Bilateral denoise.
    Denoise {
        /// Spatial sigma in pixels.
        spatial_sigma: f64,
        /// Range sigma in 8-bit levels.
        intensity_sigma: f64,
        /// Window half-width (also the unprocessed border band).
        radius: usize,
    },
    /// Brightness/contrast curve.
    ToneMap {
        /// Brightness slider value.
        brightness: f64,
        /// Contrast slider value.
        contrast: f64,
    },
    /// HSL saturation scaling.
    Saturate {
        /// Multiplier applied to HSL saturation.
        factor: f64,
    },
    /// Unsharp mask.
    Sharpen {
        /// Residual gain.
        amount: f64,
        /// Blur radius.
        radius: f64,
        /// Residual threshold.
        threshold: f64,
    },
    /// Fixed enhancement chain: denoise, local contrast, detail, color.
    EnhanceChain {
        /// Local contrast tile edge.
        block_size: u32,
        /// Local contrast clip limit.
        clip_limit: f64,
        /// Number of equalized tiles.
        tile_count: usize,
    },
    /// Output encoding.
    Encode {
        /// MIME type of the output.
        mime_type: String,
        /// Encoder quality setting.
        quality: u8,
        /// Size of the encoded output.
        output_bytes: usize,
    },
}

/// Run-level summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Mode of the run.
    pub mode: Mode,
    /// Size of the input raster.
    pub source: Dimensions,
    /// Size of the output raster.
    pub output: Dimensions,
    /// Number of filter stages that ran (resampling and encoding
    /// excluded).
    pub filters_applied: usize,
}

impl PipelineDiagnostics {
    /// Look up a stage by name.
    #[must_use]
    pub fn stage(&self, name: &str) -> Option<&StageDiagnostics> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Pipeline Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Mode: {}  |  Image: {}x{} -> {}x{}",
            self.summary.mode,
            self.summary.source.width,
            self.summary.source.height,
            self.summary.output.width,
            self.summary.output.height,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        for stage in &self.stages {
            let name = &stage.name;
            let ms = duration_ms(stage.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&stage.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!("Filters applied: {}", self.summary.filters_applied));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
pub(crate) fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Resample { from, to, scale } => format!(
            "{}x{} -> {}x{} (x{scale:.3})",
            from.width, from.height, to.width, to.height,
        ),
        StageMetrics::Denoise {
            spatial_sigma,
            intensity_sigma,
            radius,
        } => format!("sigma_s={spatial_sigma:.2} sigma_i={intensity_sigma:.2} r={radius}"),
        StageMetrics::ToneMap {
            brightness,
            contrast,
        } => format!("brightness={brightness:.1} contrast={contrast:.1}"),
        StageMetrics::Saturate { factor } => format!("factor={factor:.3}"),
        StageMetrics::Sharpen {
            amount,
            radius,
            threshold,
        } => format!("amount={amount:.2} radius={radius:.2} threshold={threshold:.1}"),
        StageMetrics::EnhanceChain {
            block_size,
            clip_limit,
            tile_count,
        } => format!("block={block_size} clip={clip_limit:.1} tiles={tile_count}"),
        StageMetrics::Encode {
            mime_type,
            quality,
            output_bytes,
        } => format!("{mime_type} q={quality} {output_bytes} bytes"),
    }
}

/// Run the pipeline and return its diagnostics alongside the result.
///
/// # Errors
///
/// Same as [`crate::process`].
pub fn process_with_diagnostics<C: Clock + Sync>(
    image: RgbaImage,
    settings: &FilterSettings,
    mode: Mode,
    config: &PipelineConfig,
    clock: &C,
) -> Result<(ProcessingResult, PipelineDiagnostics), PipelineError> {
    crate::pipeline::run(
        image,
        settings,
        mode,
        config,
        &mut NoProgress,
        &CancelToken::new(),
        clock,
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Clock that advances one millisecond per reading.
    struct TickClock(std::sync::atomic::AtomicU64);

    impl Clock for TickClock {
        type Instant = u64;

        fn now(&self) -> u64 {
            self.0.fetch_add(1, std::sync::atomic::Ordering::Relaxed)
        }

        fn elapsed(&self, since: &u64) -> Duration {
            Duration::from_millis(self.now() - since)
        }
    }

    fn sample() -> PipelineDiagnostics {
        let dims = Dimensions {
            width: 100,
            height: 50,
        };
        PipelineDiagnostics {
            stages: vec![
                StageDiagnostics {
                    name: "Denoise".to_owned(),
                    duration: Duration::from_millis(30),
                    metrics: StageMetrics::Denoise {
                        spatial_sigma: 2.0,
                        intensity_sigma: 15.0,
                        radius: 4,
                    },
                },
                StageDiagnostics {
                    name: "Encode".to_owned(),
                    duration: Duration::from_millis(10),
                    metrics: StageMetrics::Encode {
                        mime_type: "image/jpeg".to_owned(),
                        quality: 90,
                        output_bytes: 1234,
                    },
                },
            ],
            total_duration: Duration::from_millis(40),
            summary: PipelineSummary {
                mode: Mode::Preview,
                source: dims,
                output: dims,
                filters_applied: 1,
            },
        }
    }

    #[test]
    fn duration_ms_converts_correctly() {
        let ms = duration_ms(Duration::from_millis(1234));
        assert!((ms - 1234.0).abs() < 0.01);
    }

    #[test]
    fn null_clock_is_zero() {
        let clock = NullClock;
        let start = clock.now();
        assert_eq!(clock.elapsed(&start), Duration::ZERO);
    }

    #[test]
    fn report_lists_every_stage() {
        let report = sample().report();
        assert!(report.contains("Pipeline Diagnostics Report"));
        assert!(report.contains("Denoise"));
        assert!(report.contains("sigma_s=2.00"));
        assert!(report.contains("image/jpeg q=90"));
        assert!(report.contains("75.0%"));
    }

    #[test]
    fn durations_serialize_as_seconds() {
        let json = serde_json::to_value(sample()).unwrap();
        assert!((json["total_duration"].as_f64().unwrap() - 0.04).abs() < 1e-12);
        let back: PipelineDiagnostics = serde_json::from_value(json).unwrap();
        assert_eq!(back.stages.len(), 2);
        assert_eq!(back.stages[1].duration, Duration::from_millis(10));
    }

    #[test]
    fn negative_duration_is_rejected() {
        let mut json = serde_json::to_value(sample()).unwrap();
        json["total_duration"] = serde_json::json!(-1.0);
        assert!(serde_json::from_value::<PipelineDiagnostics>(json).is_err());
    }

    #[test]
    fn process_with_diagnostics_records_stages() {
        let image = RgbaImage::from_pixel(40, 30, image::Rgba([90, 120, 150, 255]));
        let settings = FilterSettings {
            denoising: 40.0,
            brightness: 10.0,
            sharpening: 30.0,
            ..FilterSettings::default()
        };
        let clock = TickClock(std::sync::atomic::AtomicU64::new(0));
        let (result, diag) = process_with_diagnostics(
            image,
            &settings,
            Mode::Preview,
            &PipelineConfig::default(),
            &clock,
        )
        .unwrap();
        let names: Vec<&str> = diag.stages.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["Denoise", "Tone Map", "Sharpen", "Encode"]);
        assert_eq!(diag.summary.filters_applied, 3);
        assert_eq!(diag.summary.output, result.dimensions);
        assert!(diag.stages.iter().all(|s| s.duration > Duration::ZERO));
        assert!(diag.total_duration >= Duration::from_millis(4));
        assert!(diag.stage("Tone Map").is_some());
    }
}
