//! Render engine: paints cached geometry onto a drawing surface
//!
//! One render pass, in order:
//!
//! 1. `before_render` hook
//! 2. custom renderer, if installed; returning `Ok(true)` ("handled") skips
//!    the default track drawing and resumes at step 6
//! 3. clear to the geometry's logical size, apply the smoothing flag
//! 4. track layer in the background color
//! 5. `after_background` hook
//! 6. progress layer, clipped to the played region, then `after_progress`
//! 7. progress line
//! 8. `after_complete` hook
//!
//! Bars are painted either from the compiled [`BarPath`] (one fill, one
//! stroke) or, in fallback mode, by building every bar into a fresh path.
//! Fallback is used iff `border_radius > 0` and there is no compiled path or
//! the surface cannot draw rounded rects.
//!
//! The engine performs no recovery: any error from a hook, the custom
//! renderer or a surface primitive is returned unchanged.

use std::rc::Rc;

use barwave_core::{Color, LineCap, Point, Rect, Result, StrokeStyle, StyleConfig};

use super::geometry::{BarPath, GeometryEntry};
use super::surface::DrawingSurface;

/// Data handed to render hooks
#[derive(Debug, Clone, Copy)]
pub struct HookContext<'a> {
    pub geometry: &'a GeometryEntry,
    pub style: &'a StyleConfig,
    /// Progress being rendered (0.0 to 1.0)
    pub progress: f32,
}

/// Lifecycle callback invoked at a fixed point of the render pass
pub type RenderHook = Rc<dyn Fn(&mut dyn DrawingSurface, &HookContext<'_>) -> Result<()>>;

/// Independently optional lifecycle callbacks
///
/// Also serves as the partial form for [`merge`](Self::merge): fields left
/// `None` keep the current hook.
#[derive(Clone, Default)]
pub struct RenderHooks {
    pub before_render: Option<RenderHook>,
    pub after_background: Option<RenderHook>,
    pub after_progress: Option<RenderHook>,
    pub after_complete: Option<RenderHook>,
}

impl RenderHooks {
    /// Overlay the hooks set in `patch`
    pub fn merge(&mut self, patch: RenderHooks) {
        if patch.before_render.is_some() {
            self.before_render = patch.before_render;
        }
        if patch.after_background.is_some() {
            self.after_background = patch.after_background;
        }
        if patch.after_progress.is_some() {
            self.after_progress = patch.after_progress;
        }
        if patch.after_complete.is_some() {
            self.after_complete = patch.after_complete;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.before_render.is_none()
            && self.after_background.is_none()
            && self.after_progress.is_none()
            && self.after_complete.is_none()
    }
}

impl std::fmt::Debug for RenderHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderHooks")
            .field("before_render", &self.before_render.is_some())
            .field("after_background", &self.after_background.is_some())
            .field("after_progress", &self.after_progress.is_some())
            .field("after_complete", &self.after_complete.is_some())
            .finish()
    }
}

/// Full replacement for the default drawing
pub trait CustomRenderer {
    /// Draw the waveform; return `Ok(true)` when the default drawing should
    /// be skipped
    fn render(
        &self,
        surface: &mut dyn DrawingSurface,
        geometry: &GeometryEntry,
        style: &StyleConfig,
        path: Option<&Rc<BarPath>>,
    ) -> Result<bool>;
}

impl<F> CustomRenderer for F
where
    F: Fn(&mut dyn DrawingSurface, &GeometryEntry, &StyleConfig, Option<&Rc<BarPath>>) -> Result<bool>,
{
    fn render(
        &self,
        surface: &mut dyn DrawingSurface,
        geometry: &GeometryEntry,
        style: &StyleConfig,
        path: Option<&Rc<BarPath>>,
    ) -> Result<bool> {
        self(surface, geometry, style, path)
    }
}

/// Paints geometry with the configured hooks and custom renderer
///
/// Cloning is cheap (shared hooks), which lets the orchestrator snapshot the
/// engine before a render and release its own state.
#[derive(Clone, Default)]
pub struct RenderEngine {
    hooks: RenderHooks,
    custom: Option<Rc<dyn CustomRenderer>>,
}

impl RenderEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hooks(&self) -> &RenderHooks {
        &self.hooks
    }

    pub fn set_hooks(&mut self, patch: RenderHooks) {
        self.hooks.merge(patch);
    }

    pub fn clear_hooks(&mut self) {
        self.hooks = RenderHooks::default();
    }

    pub fn set_custom_renderer(&mut self, renderer: Option<Rc<dyn CustomRenderer>>) {
        self.custom = renderer;
    }

    pub fn has_custom_renderer(&self) -> bool {
        self.custom.is_some()
    }

    /// Run one render pass
    pub fn render(
        &self,
        surface: &mut dyn DrawingSurface,
        geometry: &GeometryEntry,
        style: &StyleConfig,
        path: Option<&Rc<BarPath>>,
    ) -> Result<()> {
        let ctx = HookContext {
            geometry,
            style,
            progress: style.progress,
        };

        if let Some(hook) = &self.hooks.before_render {
            hook(surface, &ctx)?;
        }

        let handled = match &self.custom {
            Some(renderer) => renderer.render(surface, geometry, style, path)?,
            None => false,
        };

        if !handled {
            surface.clear_rect(Rect::from_size(geometry.width, geometry.height))?;
            surface.set_smoothing(style.smoothing)?;

            draw_bars(surface, geometry, style, path, style.background_color)?;

            if let Some(hook) = &self.hooks.after_background {
                hook(surface, &ctx)?;
            }
        }

        if style.progress > 0.0 {
            draw_progress(surface, geometry, style, path)?;
            if let Some(hook) = &self.hooks.after_progress {
                hook(surface, &ctx)?;
            }
        }

        draw_progress_line(surface, geometry, style)?;

        if let Some(hook) = &self.hooks.after_complete {
            hook(surface, &ctx)?;
        }

        Ok(())
    }
}

impl std::fmt::Debug for RenderEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderEngine")
            .field("hooks", &self.hooks)
            .field("custom", &self.custom.is_some())
            .finish()
    }
}

/// Whether bars must be drawn one by one instead of from the compiled path
#[inline]
pub fn use_fallback(style: &StyleConfig, path: Option<&Rc<BarPath>>, supports_round_rect: bool) -> bool {
    style.border_radius > 0.0 && (path.is_none() || !supports_round_rect)
}

fn border_stroke(style: &StyleConfig) -> Option<StrokeStyle> {
    (style.border_width > 0.0).then(|| StrokeStyle::solid(style.border_color, style.border_width))
}

fn draw_bars(
    surface: &mut dyn DrawingSurface,
    geometry: &GeometryEntry,
    style: &StyleConfig,
    path: Option<&Rc<BarPath>>,
    color: Color,
) -> Result<()> {
    let supports_round_rect = surface.supports_round_rect();

    match path {
        Some(path) if !use_fallback(style, Some(path), supports_round_rect) => {
            surface.fill_path(path, color)?;
            if let Some(stroke) = border_stroke(style) {
                surface.stroke_path(path, &stroke)?;
            }
        }
        _ => {
            let rounded = style.border_radius > 0.0 && supports_round_rect;
            surface.begin_path()?;
            for bar in &geometry.bars {
                if rounded {
                    surface.round_rect(bar.rect(), style.border_radius)?;
                } else {
                    surface.rect(bar.rect())?;
                }
            }
            surface.fill(color)?;
            if let Some(stroke) = border_stroke(style) {
                surface.stroke(&stroke)?;
            }
        }
    }

    Ok(())
}

fn draw_progress(
    surface: &mut dyn DrawingSurface,
    geometry: &GeometryEntry,
    style: &StyleConfig,
    path: Option<&Rc<BarPath>>,
) -> Result<()> {
    surface.save()?;
    surface.begin_path()?;
    surface.rect(Rect::from_size(geometry.width * style.progress, geometry.height))?;
    surface.clip()?;
    draw_bars(surface, geometry, style, path, style.progress_color)?;
    surface.restore()?;
    Ok(())
}

fn draw_progress_line(
    surface: &mut dyn DrawingSurface,
    geometry: &GeometryEntry,
    style: &StyleConfig,
) -> Result<()> {
    let line = match &style.progress_line {
        Some(line) if style.progress > 0.0 => line,
        _ => return Ok(()),
    };

    let x = geometry.width * style.progress;
    let extent = geometry.height * line.height_fraction;
    let top = line.position.offset(geometry.height, extent);

    surface.begin_path()?;
    surface.move_to(Point::new(x, top))?;
    surface.line_to(Point::new(x, top + extent))?;
    surface.stroke(
        &StrokeStyle::solid(line.color, line.width)
            .with_cap(LineCap::Round)
            .with_dash(line.style.dash()),
    )?;
    Ok(())
}
