//! Shared types for the lustre enhancement pipeline.

use serde::{Deserialize, Serialize};

/// Re-export `RgbaImage` so downstream crates can hand rasters to the
/// pipeline without depending on `image` directly.
///
/// The buffer is always `width * height * 4` bytes in R, G, B, A order.
pub use image::RgbaImage;

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Dimensions of an existing raster.
    #[must_use]
    pub fn of(image: &RgbaImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
        }
    }

    /// Total pixel count (`width * height`).
    #[must_use]
    pub const fn area(self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// The longer of the two axes.
    #[must_use]
    pub const fn max_dimension(self) -> u32 {
        if self.width > self.height {
            self.width
        } else {
            self.height
        }
    }
}

/// Build a raster from a raw RGBA buffer.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidParameter`] if `pixels.len()` is not
/// `width * height * 4`.
pub fn raster_from_raw(
    width: u32,
    height: u32,
    pixels: Vec<u8>,
) -> Result<RgbaImage, PipelineError> {
    let len = pixels.len();
    RgbaImage::from_raw(width, height, pixels).ok_or_else(|| {
        PipelineError::InvalidParameter(format!(
            "buffer of {len} bytes does not match a {width}x{height} RGBA raster",
        ))
    })
}

/// Which quality tier a run targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Mode {
    /// Interactive preview: downscaled, lighter coefficients.
    #[default]
    Preview,
    /// Full quality: optional upscale, stronger coefficients, progress
    /// milestones.
    Final,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Preview => f.write_str("preview"),
            Self::Final => f.write_str("final"),
        }
    }
}

/// User-facing enhancement settings.
///
/// Field ranges: `sharpening` and `denoising` in `0..=100`; `brightness`,
/// `contrast` and `saturation` in `-50..=50`. Values outside those ranges
/// are clamped by [`FilterSettings::clamped`] or rejected by
/// [`FilterSettings::validate`], depending on [`Validation`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FilterSettings {
    /// Unsharp mask strength.
    pub sharpening: f64,
    /// Bilateral denoise strength.
    pub denoising: f64,
    /// Brightness gamma shift.
    pub brightness: f64,
    /// S-curve contrast strength.
    pub contrast: f64,
    /// HSL saturation scale.
    pub saturation: f64,
    /// Run the fixed enhancement chain (denoise, local contrast, detail,
    /// color).
    pub ai_enhance: bool,
}

impl FilterSettings {
    /// Upper bound of `sharpening` and `denoising`.
    pub const MAX_STRENGTH: f64 = 100.0;
    /// Bound of `brightness`, `contrast` and `saturation` (symmetric).
    pub const MAX_ADJUSTMENT: f64 = 50.0;

    /// Settings with every value forced into its documented range.
    ///
    /// Non-finite values become 0.
    #[must_use]
    pub fn clamped(self) -> Self {
        let strength = |v: f64| finite_or_zero(v).clamp(0.0, Self::MAX_STRENGTH);
        let adjustment =
            |v: f64| finite_or_zero(v).clamp(-Self::MAX_ADJUSTMENT, Self::MAX_ADJUSTMENT);
        Self {
            sharpening: strength(self.sharpening),
            denoising: strength(self.denoising),
            brightness: adjustment(self.brightness),
            contrast: adjustment(self.contrast),
            saturation: adjustment(self.saturation),
            ai_enhance: self.ai_enhance,
        }
    }

    /// Reject settings outside their documented ranges.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidParameter`] naming the first
    /// offending field.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let fields = [
            ("sharpening", self.sharpening, 0.0, Self::MAX_STRENGTH),
            ("denoising", self.denoising, 0.0, Self::MAX_STRENGTH),
            (
                "brightness",
                self.brightness,
                -Self::MAX_ADJUSTMENT,
                Self::MAX_ADJUSTMENT,
            ),
            (
                "contrast",
                self.contrast,
                -Self::MAX_ADJUSTMENT,
                Self::MAX_ADJUSTMENT,
            ),
            (
                "saturation",
                self.saturation,
                -Self::MAX_ADJUSTMENT,
                Self::MAX_ADJUSTMENT,
            ),
        ];
        for (name, value, min, max) in fields {
            if !value.is_finite() || value < min || value > max {
                return Err(PipelineError::InvalidParameter(format!(
                    "{name}={value} is outside {min}..={max}",
                )));
            }
        }
        Ok(())
    }
}

const fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() { v } else { 0.0 }
}

/// How the orchestrator treats out-of-range [`FilterSettings`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Validation {
    /// Clamp each field into range and continue.
    #[default]
    Clamp,
    /// Fail with [`PipelineError::InvalidParameter`].
    Strict,
}

/// What form the finished image is returned in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    /// JPEG bytes at the mode's quality (alpha is dropped).
    #[default]
    Jpeg,
    /// The raw RGBA raster.
    Raw,
}

/// Ambient configuration for a pipeline run.
///
/// Unlike [`FilterSettings`], nothing here is a user-facing slider; these
/// control output form, validation policy and resource use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Output form of the finished image.
    pub output: OutputFormat,
    /// Out-of-range settings policy.
    pub validation: Validation,
    /// Run inside a dedicated thread pool of this size. `None` uses the
    /// global rayon pool.
    pub threads: Option<usize>,
    /// Tile edge length for local contrast equalization.
    pub local_contrast_block: u32,
    /// Histogram clip limit for local contrast equalization.
    pub local_contrast_clip: f64,
}

impl PipelineConfig {
    /// Default output form.
    pub const DEFAULT_OUTPUT: OutputFormat = OutputFormat::Jpeg;
    /// Default tile edge for local contrast.
    pub const DEFAULT_LOCAL_CONTRAST_BLOCK: u32 = 64;
    /// Default clip limit for local contrast.
    pub const DEFAULT_LOCAL_CONTRAST_CLIP: f64 = 3.0;
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output: Self::DEFAULT_OUTPUT,
            validation: Validation::default(),
            threads: None,
            local_contrast_block: Self::DEFAULT_LOCAL_CONTRAST_BLOCK,
            local_contrast_clip: Self::DEFAULT_LOCAL_CONTRAST_CLIP,
        }
    }
}

/// The finished image in the form requested by [`PipelineConfig::output`].
#[derive(Debug, Clone)]
pub enum Output {
    /// Encoded bytes.
    Encoded {
        /// The encoded file contents.
        bytes: Vec<u8>,
        /// MIME type of `bytes` (e.g. `image/jpeg`).
        mime_type: &'static str,
    },
    /// Raw RGBA raster.
    Raw(RgbaImage),
}

/// Result of one pipeline run.
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    /// The enhanced image.
    pub output: Output,
    /// Dimensions of the enhanced image (after any resampling).
    pub dimensions: Dimensions,
    /// Mode that produced the result.
    pub mode: Mode,
}

/// Metadata about a source image, answered without running the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageMetadata {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Size of the encoded source in bytes.
    pub byte_size: usize,
    /// MIME type guessed from the encoded contents.
    pub mime_type: String,
}

/// Errors that can occur during pipeline processing.
///
/// Uses custom `Serialize`/`Deserialize` because `image::ImageError`
/// does not implement serde traits. The `ImageDecode` variant is
/// serialized as its `Display` string.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// A required compute context (thread pool) could not be set up.
    #[error("compute context unavailable: {0}")]
    ContextUnavailable(String),

    /// A raster buffer could not be allocated.
    #[error("not enough memory for a {width}x{height} raster")]
    ResourceExhausted {
        /// Requested width in pixels.
        width: u32,
        /// Requested height in pixels.
        height: u32,
    },

    /// A parameter or buffer was outside its documented range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The output encoder rejected the image.
    #[error("failed to encode image: {0}")]
    Encode(String),

    /// The run was cancelled through its [`CancelToken`](crate::CancelToken).
    #[error("processing was cancelled")]
    Cancelled,
}

/// Serde-compatible proxy for `PipelineError`.
///
/// `image::ImageError` does not implement serde, so the `ImageDecode`
/// variant stores its `Display` string instead. A deserialized
/// `ImageDecode` comes back as [`PipelineError::InvalidParameter`]
/// carrying the original message.
#[derive(Serialize, Deserialize)]
enum PipelineErrorProxy {
    ImageDecode(String),
    EmptyInput,
    ContextUnavailable(String),
    ResourceExhausted { width: u32, height: u32 },
    InvalidParameter(String),
    Encode(String),
    Cancelled,
}

impl Serialize for PipelineError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let proxy = match self {
            Self::ImageDecode(e) => PipelineErrorProxy::ImageDecode(e.to_string()),
            Self::EmptyInput => PipelineErrorProxy::EmptyInput,
            Self::ContextUnavailable(s) => PipelineErrorProxy::ContextUnavailable(s.clone()),
            Self::ResourceExhausted { width, height } => PipelineErrorProxy::ResourceExhausted {
                width: *width,
                height: *height,
            },
            Self::InvalidParameter(s) => PipelineErrorProxy::InvalidParameter(s.clone()),
            Self::Encode(s) => PipelineErrorProxy::Encode(s.clone()),
            Self::Cancelled => PipelineErrorProxy::Cancelled,
        };
        proxy.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PipelineError {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let proxy = PipelineErrorProxy::deserialize(deserializer)?;
        Ok(match proxy {
            PipelineErrorProxy::ImageDecode(msg) => {
                Self::InvalidParameter(format!("image decode error: {msg}"))
            }
            PipelineErrorProxy::EmptyInput => Self::EmptyInput,
            PipelineErrorProxy::ContextUnavailable(s) => Self::ContextUnavailable(s),
            PipelineErrorProxy::ResourceExhausted { width, height } => {
                Self::ResourceExhausted { width, height }
            }
            PipelineErrorProxy::InvalidParameter(s) => Self::InvalidParameter(s),
            PipelineErrorProxy::Encode(s) => Self::Encode(s),
            PipelineErrorProxy::Cancelled => Self::Cancelled,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn raster_from_raw_accepts_exact_length() {
        let img = raster_from_raw(3, 2, vec![7; 3 * 2 * 4]).unwrap();
        assert_eq!(img.dimensions(), (3, 2));
    }

    #[test]
    fn raster_from_raw_rejects_short_buffer() {
        let result = raster_from_raw(3, 2, vec![0; 10]);
        assert!(matches!(result, Err(PipelineError::InvalidParameter(_))));
    }

    #[test]
    fn dimensions_helpers() {
        let d = Dimensions {
            width: 640,
            height: 1200,
        };
        assert_eq!(d.area(), 768_000);
        assert_eq!(d.max_dimension(), 1200);
    }

    #[test]
    fn clamped_forces_fields_into_range() {
        let settings = FilterSettings {
            sharpening: 150.0,
            denoising: -3.0,
            brightness: 80.0,
            contrast: -90.0,
            saturation: f64::NAN,
            ai_enhance: true,
        }
        .clamped();
        assert!((settings.sharpening - 100.0).abs() < f64::EPSILON);
        assert!(settings.denoising.abs() < f64::EPSILON);
        assert!((settings.brightness - 50.0).abs() < f64::EPSILON);
        assert!((settings.contrast + 50.0).abs() < f64::EPSILON);
        assert!(settings.saturation.abs() < f64::EPSILON);
        assert!(settings.ai_enhance);
    }

    #[test]
    fn validate_names_offending_field() {
        let settings = FilterSettings {
            contrast: 51.0,
            ..FilterSettings::default()
        };
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("contrast"), "got {err}");
        assert!(FilterSettings::default().validate().is_ok());
    }

    #[test]
    fn settings_deserialize_camel_case_with_defaults() {
        let settings: FilterSettings =
            serde_json::from_str(r#"{"brightness": 10, "aiEnhance": true}"#).unwrap();
        assert!((settings.brightness - 10.0).abs() < f64::EPSILON);
        assert!(settings.ai_enhance);
        assert!(settings.sharpening.abs() < f64::EPSILON);
    }

    #[test]
    fn pipeline_config_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.output, OutputFormat::Jpeg);
        assert_eq!(config.validation, Validation::Clamp);
        assert_eq!(config.threads, None);
        assert_eq!(config.local_contrast_block, 64);
        assert!((config.local_contrast_clip - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn pipeline_config_partial_json_fills_defaults() {
        let config: PipelineConfig = serde_json::from_str(r#"{"output": "Raw"}"#).unwrap();
        assert_eq!(config.output, OutputFormat::Raw);
        assert_eq!(config.local_contrast_block, 64);
    }

    #[test]
    fn error_display_messages() {
        assert_eq!(
            PipelineError::EmptyInput.to_string(),
            "input image data is empty"
        );
        assert_eq!(
            PipelineError::ResourceExhausted {
                width: 10,
                height: 20
            }
            .to_string(),
            "not enough memory for a 10x20 raster",
        );
        assert_eq!(
            PipelineError::Cancelled.to_string(),
            "processing was cancelled"
        );
    }

    #[test]
    fn pipeline_error_serde_round_trip() {
        let err = PipelineError::ResourceExhausted {
            width: 4,
            height: 5,
        };
        let json = serde_json::to_string(&err).unwrap();
        let back: PipelineError = serde_json::from_str(&json).unwrap();
        assert!(matches!(
            back,
            PipelineError::ResourceExhausted {
                width: 4,
                height: 5
            }
        ));
    }

    #[test]
    fn image_decode_error_deserializes_with_message() {
        let err = crate::decode(&[0xFF, 0x00]).unwrap_err();
        let json = serde_json::to_string(&err).unwrap();
        let back: PipelineError = serde_json::from_str(&json).unwrap();
        assert!(
            matches!(back, PipelineError::InvalidParameter(ref s) if s.starts_with("image decode error")),
        );
    }
}
