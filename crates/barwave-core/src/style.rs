//! Waveform style configuration
//!
//! [`StyleConfig`] is the complete, validated set of rendering parameters.
//! [`StylePatch`] is its partial form: every field optional, used for
//! construction overrides, `set_style` calls and YAML style files.
//!
//! Merge precedence is always: patch fields > current fields > defaults.
//! The only nested structure, the progress line, is merged field by field so
//! a partial override never erases unspecified line settings.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Deserializer, Serialize};

use crate::types::{Color, LinePattern, Position};

// =============================================================================
// Defaults
// =============================================================================

/// Default track (unplayed) bar color
pub const DEFAULT_BACKGROUND_COLOR: Color = Color::from_rgb(0.8, 0.8, 0.8);

/// Default played-region bar color (#2196F3)
pub const DEFAULT_PROGRESS_COLOR: Color = Color::from_rgb(0.129, 0.588, 0.953);

/// Default progress line color
pub const DEFAULT_LINE_COLOR: Color = Color::from_rgb(1.0, 0.2, 0.2);

pub const DEFAULT_BAR_WIDTH: f32 = 2.0;
pub const DEFAULT_GAP: f32 = 1.0;

// =============================================================================
// Progress line
// =============================================================================

/// Style of the vertical progress indicator line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressLineStyle {
    pub color: Color,
    /// Fraction of the canvas height covered by the line (0.0 to 1.0)
    pub height_fraction: f32,
    /// Vertical anchor, independent of the bar anchor
    pub position: Position,
    pub style: LinePattern,
    pub width: f32,
}

impl Default for ProgressLineStyle {
    fn default() -> Self {
        Self {
            color: DEFAULT_LINE_COLOR,
            height_fraction: 1.0,
            position: Position::Center,
            style: LinePattern::Solid,
            width: 2.0,
        }
    }
}

impl ProgressLineStyle {
    /// Apply a partial line override
    pub fn merged(&self, patch: &ProgressLinePatch) -> Self {
        Self {
            color: patch.color.unwrap_or(self.color),
            height_fraction: patch
                .height_fraction
                .map(|v| sanitize_unit(v, self.height_fraction))
                .unwrap_or(self.height_fraction),
            position: patch.position.unwrap_or(self.position),
            style: patch.style.unwrap_or(self.style),
            width: patch
                .width
                .map(|v| sanitize_extent(v, self.width))
                .unwrap_or(self.width),
        }
    }
}

/// Partial progress line override
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressLinePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height_fraction: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<LinePattern>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f32>,
}

// =============================================================================
// Style configuration
// =============================================================================

/// Complete rendering parameters for a waveform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleConfig {
    /// Vertical scale applied to every peak (0.0 to 1.0)
    pub amplitude: f32,
    /// Fill color of the unplayed track bars
    pub background_color: Color,
    /// Fill color of the played region
    pub progress_color: Color,
    pub bar_width: f32,
    pub gap: f32,
    pub border_width: f32,
    pub border_radius: f32,
    pub border_color: Color,
    /// Vertical anchor for bars
    pub position: Position,
    /// Lower bound for the device pixel ratio used to size the backing store
    pub min_pixel_ratio: f32,
    /// Image smoothing on the drawing surface
    pub smoothing: bool,
    /// Playhead position (0.0 to 1.0)
    pub progress: f32,
    /// Progress indicator line, `None` disables it
    pub progress_line: Option<ProgressLineStyle>,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            amplitude: 1.0,
            background_color: DEFAULT_BACKGROUND_COLOR,
            progress_color: DEFAULT_PROGRESS_COLOR,
            bar_width: DEFAULT_BAR_WIDTH,
            gap: DEFAULT_GAP,
            border_width: 0.0,
            border_radius: 0.0,
            border_color: Color::BLACK,
            position: Position::Bottom,
            min_pixel_ratio: 1.0,
            smoothing: true,
            progress: 0.0,
            progress_line: Some(ProgressLineStyle::default()),
        }
    }
}

impl StyleConfig {
    /// Build a style from defaults plus an optional patch
    pub fn from_patch(patch: Option<&StylePatch>) -> Self {
        match patch {
            Some(patch) => Self::default().merged(patch),
            None => Self::default(),
        }
    }

    /// Apply a partial override, returning the new style
    ///
    /// Non-finite numbers are ignored (the current value is kept), negative
    /// extents are clamped to zero, `amplitude` is clamped to 0.0..=1.0 and
    /// `progress` is clamped with [`clamp_progress`].
    pub fn merged(&self, patch: &StylePatch) -> Self {
        let progress_line = match &patch.progress_line {
            None => self.progress_line.clone(),
            Some(None) => None,
            Some(Some(line)) => Some(self.progress_line.clone().unwrap_or_default().merged(line)),
        };

        Self {
            amplitude: patch
                .amplitude
                .map(|v| sanitize_unit(v, self.amplitude))
                .unwrap_or(self.amplitude),
            background_color: patch.background_color.unwrap_or(self.background_color),
            progress_color: patch.progress_color.unwrap_or(self.progress_color),
            bar_width: merge_extent(patch.bar_width, self.bar_width),
            gap: merge_extent(patch.gap, self.gap),
            border_width: merge_extent(patch.border_width, self.border_width),
            border_radius: merge_extent(patch.border_radius, self.border_radius),
            border_color: patch.border_color.unwrap_or(self.border_color),
            position: patch.position.unwrap_or(self.position),
            min_pixel_ratio: merge_extent(patch.min_pixel_ratio, self.min_pixel_ratio),
            smoothing: patch.smoothing.unwrap_or(self.smoothing),
            progress: patch.progress.map(clamp_progress).unwrap_or(self.progress),
            progress_line,
        }
    }

    /// Hash of the fields that change bar geometry
    ///
    /// Colors, progress, smoothing and the progress line are excluded: they
    /// change what is painted, never where.
    pub fn layout_fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.amplitude.to_bits().hash(&mut hasher);
        self.bar_width.to_bits().hash(&mut hasher);
        self.border_width.to_bits().hash(&mut hasher);
        self.gap.to_bits().hash(&mut hasher);
        self.position.hash(&mut hasher);
        self.border_radius.to_bits().hash(&mut hasher);
        hasher.finish()
    }

    /// Whether `other` differs in any layout-affecting field
    pub fn layout_differs(&self, other: &StyleConfig) -> bool {
        self.amplitude != other.amplitude
            || self.bar_width != other.bar_width
            || self.border_width != other.border_width
            || self.gap != other.gap
            || self.position != other.position
            || self.border_radius != other.border_radius
    }

    /// Distance between the left edges of consecutive bars
    pub fn bar_pitch(&self) -> f32 {
        self.bar_width + 2.0 * self.border_width + self.gap
    }
}

/// Partial style override
///
/// `progress_line` is tri-state: absent keeps the current line, `Some(None)`
/// (YAML `progress_line: null`) disables it, `Some(Some(..))` merges.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StylePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amplitude: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_color: Option<Color>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_color: Option<Color>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bar_width: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gap: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border_width: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border_radius: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border_color: Option<Color>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_pixel_ratio: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smoothing: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<f32>,
    #[serde(
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub progress_line: Option<Option<ProgressLinePatch>>,
}

impl StylePatch {
    /// Whether applying this patch can change bar geometry
    pub fn touches_layout(&self) -> bool {
        self.amplitude.is_some()
            || self.bar_width.is_some()
            || self.border_width.is_some()
            || self.gap.is_some()
            || self.position.is_some()
            || self.border_radius.is_some()
    }
}

/// Clamp a progress value to 0.0..=1.0
///
/// NaN is passed through unchanged; callers see NaN rather than a silently
/// substituted position.
#[inline]
pub fn clamp_progress(value: f32) -> f32 {
    value.clamp(0.0, 1.0)
}

fn merge_extent(value: Option<f32>, current: f32) -> f32 {
    value.map(|v| sanitize_extent(v, current)).unwrap_or(current)
}

/// Finite, non-negative; non-finite input keeps `fallback`
fn sanitize_extent(value: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        fallback
    }
}

/// Finite, 0.0..=1.0; non-finite input keeps `fallback`
fn sanitize_unit(value: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        fallback
    }
}

/// Distinguish a missing field from an explicit `null`
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
