//! Bar geometry derivation and caching
//!
//! Turning peaks + style + canvas size into per-bar rectangles is the
//! expensive part of a render. [`GeometryCache`] keeps the last result and
//! hands the same `Rc<GeometryEntry>` back for as long as nothing that
//! affects layout has changed, so callers can memoize on `Rc::ptr_eq`.
//!
//! A rebuild is triggered by a change in any of:
//! - logical canvas width or height
//! - the style's layout fingerprint (amplitude, bar width, border width,
//!   gap, position, border radius)
//! - the peaks fingerprint (see [`PeakFingerprint`])
//!
//! The compiled [`BarPath`] is a finer-grained sub-cache: it is dropped with
//! the geometry, rebuilt when the requested radius or rounded-rect
//! capability differs from the one it was compiled for, and
//! [`GeometryCache::invalidate`] can drop it alone.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use barwave_core::peaks::sample_peak;
use barwave_core::{Rect, StyleConfig};

// =============================================================================
// Geometry entry
// =============================================================================

/// Pixel geometry of one bar, in logical pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarGeometry {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Magnitude of the peak this bar was sampled from
    pub peak: f32,
}

impl BarGeometry {
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}

/// Derived geometry for one (size, style, peaks) combination
///
/// Treat as read-only; entries are shared between the cache and renderers.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryEntry {
    /// Logical canvas width at build time
    pub width: f32,
    /// Logical canvas height at build time
    pub height: f32,
    pub total_bars: usize,
    pub bars: Vec<BarGeometry>,
    /// Distance between the left edges of consecutive bars
    pub bar_pitch: f32,
    pub style_fingerprint: u64,
    pub peaks_fingerprint: u64,
}

impl GeometryEntry {
    /// Compute geometry for a logical canvas size
    pub fn build(
        width: f32,
        height: f32,
        peaks: &[f32],
        style: &StyleConfig,
        peaks_fingerprint: u64,
    ) -> Self {
        let bar_pitch = style.bar_pitch();
        let available = width - 2.0 * style.border_width;

        let fitted = if bar_pitch > 0.0 {
            (available / bar_pitch).floor()
        } else {
            0.0
        };
        // Non-positive or NaN counts fall back to a single bar
        let total_bars = if fitted >= 1.0 { fitted as usize } else { 1 };

        let bars = (0..total_bars)
            .map(|i| {
                let peak = sample_peak(peaks, i, total_bars);
                let bar_height = peak * height * style.amplitude;
                BarGeometry {
                    x: style.border_width + i as f32 * bar_pitch,
                    y: style.position.offset(height, bar_height),
                    width: style.bar_width,
                    height: bar_height,
                    peak,
                }
            })
            .collect();

        Self {
            width,
            height,
            total_bars,
            bars,
            bar_pitch,
            style_fingerprint: style.layout_fingerprint(),
            peaks_fingerprint,
        }
    }

    fn matches(&self, width: f32, height: f32, style_fp: u64, peaks_fp: u64) -> bool {
        self.width == width
            && self.height == height
            && self.style_fingerprint == style_fp
            && self.peaks_fingerprint == peaks_fp
    }
}

// =============================================================================
// Compiled path
// =============================================================================

/// One closed shape of a compiled path
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathShape {
    Rect(Rect),
    RoundRect { rect: Rect, radius: f32 },
}

impl PathShape {
    pub fn rect(&self) -> Rect {
        match self {
            PathShape::Rect(rect) | PathShape::RoundRect { rect, .. } => *rect,
        }
    }
}

/// All bar outlines compiled into a single path object
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BarPath {
    shapes: Vec<PathShape>,
}

impl BarPath {
    /// Compile the bars of `entry`
    ///
    /// Rounded shapes are emitted only when `radius > 0` and the target
    /// supports rounded rectangles; otherwise every bar is a plain rect.
    pub fn from_geometry(entry: &GeometryEntry, radius: f32, supports_round_rect: bool) -> Self {
        let rounded = radius > 0.0 && supports_round_rect;
        let shapes = entry
            .bars
            .iter()
            .map(|bar| {
                if rounded {
                    PathShape::RoundRect {
                        rect: bar.rect(),
                        radius,
                    }
                } else {
                    PathShape::Rect(bar.rect())
                }
            })
            .collect();
        Self { shapes }
    }

    pub fn shapes(&self) -> &[PathShape] {
        &self.shapes
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    pub fn is_rounded(&self) -> bool {
        self.shapes
            .iter()
            .any(|s| matches!(s, PathShape::RoundRect { .. }))
    }
}

// =============================================================================
// Peak fingerprinting
// =============================================================================

/// How peak content is summarized for cache invalidation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PeakFingerprint {
    /// Length plus first and last values. O(1), but two sequences that
    /// share length and endpoints and differ only in the middle collide.
    #[default]
    Edges,
    /// Length plus `n` evenly spaced samples (endpoints included)
    Strided(usize),
}

impl PeakFingerprint {
    pub fn compute(&self, peaks: &[f32]) -> u64 {
        let mut hasher = DefaultHasher::new();
        peaks.len().hash(&mut hasher);

        if let (Some(first), Some(last)) = (peaks.first(), peaks.last()) {
            first.to_bits().hash(&mut hasher);
            last.to_bits().hash(&mut hasher);

            if let PeakFingerprint::Strided(samples) = *self {
                let samples = samples.clamp(2, peaks.len().max(2));
                let span = peaks.len() - 1;
                for i in 0..samples {
                    let idx = i * span / (samples - 1);
                    peaks[idx].to_bits().hash(&mut hasher);
                }
            }
        }

        hasher.finish()
    }
}

// =============================================================================
// Cache
// =============================================================================

/// Compiled path plus the parameters it was compiled for
#[derive(Debug)]
struct CachedPath {
    path: Rc<BarPath>,
    border_radius: f32,
    supports_round_rect: bool,
}

/// Memoized bar geometry plus its compiled path
#[derive(Debug, Default)]
pub struct GeometryCache {
    entry: Option<Rc<GeometryEntry>>,
    path: Option<CachedPath>,
    fingerprint: PeakFingerprint,
    rebuilds: u64,
}

impl GeometryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache using a specific peak fingerprint strategy
    pub fn with_fingerprint(fingerprint: PeakFingerprint) -> Self {
        Self {
            fingerprint,
            ..Self::default()
        }
    }

    /// Geometry for a canvas of `canvas_width` x `canvas_height` device pixels
    ///
    /// Returns the cached entry (same `Rc`) when nothing layout-relevant
    /// changed, otherwise rebuilds and drops the compiled path.
    pub fn get(
        &mut self,
        canvas_width: u32,
        canvas_height: u32,
        device_pixel_ratio: f32,
        peaks: &[f32],
        style: &StyleConfig,
    ) -> Rc<GeometryEntry> {
        let ratio = if device_pixel_ratio > 0.0 { device_pixel_ratio } else { 1.0 };
        let width = canvas_width as f32 / ratio;
        let height = canvas_height as f32 / ratio;

        let style_fp = style.layout_fingerprint();
        let peaks_fp = self.fingerprint.compute(peaks);

        if let Some(entry) = &self.entry {
            if entry.matches(width, height, style_fp, peaks_fp) {
                return Rc::clone(entry);
            }
        }

        let entry = Rc::new(GeometryEntry::build(width, height, peaks, style, peaks_fp));
        self.rebuilds += 1;
        log::debug!(
            "Geometry rebuilt: {} bars for {}x{} (pitch {})",
            entry.total_bars,
            width,
            height,
            entry.bar_pitch
        );

        self.path = None;
        self.entry = Some(Rc::clone(&entry));
        entry
    }

    /// Compiled path for `entry`, built on first use
    ///
    /// Cached only when `entry` is the cache's current entry; a stale entry
    /// gets a freshly built, uncached path. A cached path compiled for a
    /// different radius or capability is replaced.
    pub fn create_static_path(
        &mut self,
        entry: &Rc<GeometryEntry>,
        border_radius: f32,
        supports_round_rect: bool,
    ) -> Rc<BarPath> {
        let is_current = self
            .entry
            .as_ref()
            .map_or(false, |current| Rc::ptr_eq(current, entry));

        if is_current {
            if let Some(cached) = &self.path {
                if cached.border_radius == border_radius && cached.supports_round_rect == supports_round_rect {
                    return Rc::clone(&cached.path);
                }
                log::debug!("Compiled path parameters changed, recompiling");
            }
        }

        let path = Rc::new(BarPath::from_geometry(entry, border_radius, supports_round_rect));
        if is_current {
            self.path = Some(CachedPath {
                path: Rc::clone(&path),
                border_radius,
                supports_round_rect,
            });
        }
        path
    }

    /// Drop only the compiled path, keeping geometry
    pub fn invalidate(&mut self) {
        self.path = None;
    }

    /// Drop everything
    pub fn clear(&mut self) {
        self.entry = None;
        self.path = None;
    }

    pub fn entry(&self) -> Option<&Rc<GeometryEntry>> {
        self.entry.as_ref()
    }

    pub fn has_path(&self) -> bool {
        self.path.is_some()
    }

    /// Number of geometry rebuilds since creation
    pub fn rebuild_count(&self) -> u64 {
        self.rebuilds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use barwave_core::{Position, StylePatch};

    fn style(patch: StylePatch) -> StyleConfig {
        StyleConfig::default().merged(&patch)
    }

    fn bar_style() -> StyleConfig {
        style(StylePatch {
            bar_width: Some(2.0),
            border_width: Some(1.0),
            gap: Some(1.0),
            ..Default::default()
        })
    }

    #[test]
    fn test_bar_count_formula() {
        let mut cache = GeometryCache::new();
        let style = bar_style();

        // pitch = 2 + 2*1 + 1 = 5, available = 800 - 2 = 798, floor(798/5) = 159
        let entry = cache.get(800, 100, 1.0, &[0.5, 0.2, 0.9], &style);
        assert_eq!(entry.bar_pitch, 5.0);
        assert_eq!(entry.total_bars, 159);
        assert_eq!(entry.bars.len(), 159);

        let single = GeometryCache::new().get(800, 100, 1.0, &[0.7], &style);
        assert_eq!(single.total_bars, 159);
        assert!(single.bars.iter().all(|b| b.peak == 0.7));
    }

    #[test]
    fn test_logical_size_uses_pixel_ratio() {
        let mut cache = GeometryCache::new();
        let entry = cache.get(1600, 200, 2.0, &[1.0], &bar_style());
        assert_eq!(entry.width, 800.0);
        assert_eq!(entry.height, 100.0);
        assert_eq!(entry.total_bars, 159);
    }

    #[test]
    fn test_anchor_geometry() {
        let peaks = [0.5];
        let cases = [
            (Position::Bottom, 1.0, 50.0, 50.0),
            (Position::Top, 1.0, 50.0, 0.0),
            (Position::Center, 1.0, 50.0, 25.0),
            (Position::Center, 0.8, 40.0, 30.0),
        ];

        for (position, amplitude, height, y) in cases {
            let s = style(StylePatch {
                position: Some(position),
                amplitude: Some(amplitude),
                ..Default::default()
            });
            let entry = GeometryCache::new().get(100, 100, 1.0, &peaks, &s);
            let bar = entry.bars[0];
            assert!((bar.height - height).abs() < 1e-4, "{:?} height {}", position, bar.height);
            assert!((bar.y - y).abs() < 1e-4, "{:?} y {}", position, bar.y);
        }
    }

    #[test]
    fn test_cache_reuse_and_rebuild() {
        let mut cache = GeometryCache::new();
        let style = bar_style();
        let peaks = vec![0.1, 0.5, 0.3];

        let first = cache.get(800, 100, 1.0, &peaks, &style);
        let second = cache.get(800, 100, 1.0, &peaks, &style);
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(cache.rebuild_count(), 1);

        let wider = cache.get(900, 100, 1.0, &peaks, &style);
        assert!(!Rc::ptr_eq(&first, &wider));
        assert_eq!(wider.width, 900.0);
        assert_eq!(cache.rebuild_count(), 2);
    }

    #[test]
    fn test_paint_only_style_changes_reuse_geometry() {
        let mut cache = GeometryCache::new();
        let base = bar_style();
        let peaks = [0.4, 0.8];

        let first = cache.get(400, 80, 1.0, &peaks, &base);
        let recolored = base.merged(&StylePatch {
            progress: Some(0.5),
            progress_color: Some(barwave_core::Color::WHITE),
            smoothing: Some(false),
            ..Default::default()
        });
        let second = cache.get(400, 80, 1.0, &peaks, &recolored);
        assert!(Rc::ptr_eq(&first, &second));

        let regapped = base.merged(&StylePatch {
            gap: Some(3.0),
            ..Default::default()
        });
        let third = cache.get(400, 80, 1.0, &peaks, &regapped);
        assert!(!Rc::ptr_eq(&first, &third));
    }

    #[test]
    fn test_edge_fingerprint_misses_middle_change() {
        let mut cache = GeometryCache::new();
        let style = bar_style();

        let a = cache.get(100, 100, 1.0, &[0.1, 0.2, 0.9], &style);
        let b = cache.get(100, 100, 1.0, &[0.1, 0.7, 0.9], &style);
        assert!(Rc::ptr_eq(&a, &b), "edges-only fingerprint reuses the entry");

        let mut strict = GeometryCache::with_fingerprint(PeakFingerprint::Strided(16));
        let a = strict.get(100, 100, 1.0, &[0.1, 0.2, 0.9], &style);
        let b = strict.get(100, 100, 1.0, &[0.1, 0.7, 0.9], &style);
        assert!(!Rc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_degenerate_inputs() {
        let mut cache = GeometryCache::new();
        let style = bar_style();

        // Bar count depends on width only; missing peaks sample as silence
        let empty = cache.get(800, 100, 1.0, &[], &style);
        assert_eq!(empty.total_bars, 159);
        assert!(empty.bars.iter().all(|b| b.peak == 0.0 && b.height == 0.0));

        let zero = cache.get(0, 0, 1.0, &[0.5], &style);
        assert_eq!(zero.total_bars, 1);
    }

    #[test]
    fn test_negative_peaks_use_magnitude() {
        let entry = GeometryCache::new().get(100, 100, 1.0, &[-0.5], &StyleConfig::default());
        assert_eq!(entry.bars[0].peak, 0.5);
        assert_eq!(entry.bars[0].height, 50.0);
    }

    #[test]
    fn test_static_path_follows_capability() {
        let mut cache = GeometryCache::new();
        let rounded = style(StylePatch {
            border_radius: Some(2.0),
            ..Default::default()
        });
        let entry = cache.get(100, 50, 1.0, &[0.5], &rounded);

        let first = cache.create_static_path(&entry, 2.0, true);
        assert!(first.is_rounded());

        let plain = cache.create_static_path(&entry, 2.0, false);
        assert!(!plain.is_rounded());
        assert!(Rc::ptr_eq(&plain, &cache.create_static_path(&entry, 2.0, false)));

        let again = cache.create_static_path(&entry, 2.0, true);
        assert!(again.is_rounded());
        assert!(!Rc::ptr_eq(&first, &again));
    }

    #[test]
    fn test_static_path_lifecycle() {
        let mut cache = GeometryCache::new();
        let rounded = style(StylePatch {
            border_radius: Some(2.0),
            ..Default::default()
        });
        let entry = cache.get(100, 50, 1.0, &[0.5], &rounded);

        let path = cache.create_static_path(&entry, 2.0, true);
        assert!(path.is_rounded());
        assert_eq!(path.len(), entry.total_bars);
        assert!(Rc::ptr_eq(&path, &cache.create_static_path(&entry, 2.0, true)));

        cache.invalidate();
        assert!(!cache.has_path());
        assert!(cache.entry().is_some(), "invalidate keeps geometry");

        let plain = cache.create_static_path(&entry, 2.0, false);
        assert!(!plain.is_rounded());

        cache.clear();
        assert!(cache.entry().is_none());
        assert!(!cache.has_path());
    }
}
