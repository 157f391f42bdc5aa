//! iced canvas integration
//!
//! The waveform renders into a [`DisplayList`](super::surface::DisplayList)
//! owned by a [`RetainedHost`]; [`WaveformCanvas`] replays that list onto an
//! iced [`Frame`] every draw, keeps the host's client rectangle in sync with
//! the canvas bounds, and turns clicks and taps into seek messages.

use iced::widget::canvas::{self, path, Event, Frame, Geometry, LineCap, LineDash, Path, Program, Stroke};
use iced::{border, mouse, touch, Point, Rectangle, Size, Theme, Vector};

use barwave_core::types::{self, LineCap as BarLineCap};
use barwave_core::StrokeStyle;

use super::geometry::{BarPath, PathShape};
use super::host::RetainedHost;
use super::input::{seek_progress, PointerEvent};
use super::orchestrator::Waveform;
use super::surface::DrawCommand;

// =============================================================================
// Conversions
// =============================================================================

pub fn to_iced_color(color: types::Color) -> iced::Color {
    iced::Color::from_rgba(color.r, color.g, color.b, color.a)
}

fn to_iced_cap(cap: BarLineCap) -> LineCap {
    match cap {
        BarLineCap::Butt => LineCap::Butt,
        BarLineCap::Round => LineCap::Round,
        BarLineCap::Square => LineCap::Square,
    }
}

fn to_iced_stroke(style: &StrokeStyle) -> Stroke<'_> {
    Stroke {
        line_dash: LineDash {
            segments: &style.dash,
            offset: 0,
        },
        ..Stroke::default()
            .with_color(to_iced_color(style.color))
            .with_width(style.width)
            .with_line_cap(to_iced_cap(style.cap))
    }
}

// =============================================================================
// Replay
// =============================================================================

/// Sub-path recorded between `BeginPath` and the next fill or stroke
#[derive(Debug, Clone, Copy, PartialEq)]
enum Segment {
    Shape(PathShape),
    MoveTo(types::Point),
    LineTo(types::Point),
}

/// Draw a recorded picture onto an iced frame
///
/// Clear and smoothing commands are no-ops here: every iced draw starts from
/// an empty frame.
pub fn replay(commands: &[DrawCommand], frame: &mut Frame) {
    replay_range(commands, frame, Vector::ZERO);
}

fn replay_range(commands: &[DrawCommand], frame: &mut Frame, origin: Vector) {
    let mut current: Vec<Segment> = Vec::new();
    let mut i = 0;

    while i < commands.len() {
        match &commands[i] {
            DrawCommand::Save => {
                let end = matching_restore(commands, i);
                replay_range(&commands[i + 1..end], frame, origin);
                i = end + 1;
                continue;
            }
            DrawCommand::Clip => {
                if let Some(region) = clip_bounds(&current) {
                    let rest = &commands[i + 1..];
                    let local = Rectangle::new(
                        Point::new(region.x - origin.x, region.y - origin.y),
                        Size::new(region.width, region.height),
                    );
                    frame.with_clip(local, |clipped| {
                        replay_range(rest, clipped, Vector::new(region.x, region.y));
                    });
                    return;
                }
            }
            DrawCommand::Restore | DrawCommand::SetSmoothing(_) | DrawCommand::ClearRect(_) => {}
            DrawCommand::BeginPath => current.clear(),
            DrawCommand::Rect(rect) => current.push(Segment::Shape(PathShape::Rect(*rect))),
            DrawCommand::RoundRect { rect, radius } => current.push(Segment::Shape(PathShape::RoundRect {
                rect: *rect,
                radius: *radius,
            })),
            DrawCommand::MoveTo(point) => current.push(Segment::MoveTo(*point)),
            DrawCommand::LineTo(point) => current.push(Segment::LineTo(*point)),
            DrawCommand::Fill(color) => {
                frame.fill(&build_path(&current, origin), to_iced_color(*color));
            }
            DrawCommand::Stroke(style) => {
                frame.stroke(&build_path(&current, origin), to_iced_stroke(style));
            }
            DrawCommand::FillPath { path, color } => {
                frame.fill(&compiled_path(path, origin), to_iced_color(*color));
            }
            DrawCommand::StrokePath { path, style } => {
                frame.stroke(&compiled_path(path, origin), to_iced_stroke(style));
            }
        }
        i += 1;
    }
}

/// Index of the `Restore` closing the `Save` at `save_idx`, or the list end
fn matching_restore(commands: &[DrawCommand], save_idx: usize) -> usize {
    let mut depth = 0usize;
    for (idx, command) in commands.iter().enumerate().skip(save_idx) {
        match command {
            DrawCommand::Save => depth += 1,
            DrawCommand::Restore => {
                depth -= 1;
                if depth == 0 {
                    return idx;
                }
            }
            _ => {}
        }
    }
    commands.len()
}

/// Bounding box of the shapes in the current path
fn clip_bounds(segments: &[Segment]) -> Option<types::Rect> {
    segments
        .iter()
        .filter_map(|segment| match segment {
            Segment::Shape(shape) => Some(shape.rect()),
            _ => None,
        })
        .reduce(|a, b| {
            let x = a.x.min(b.x);
            let y = a.y.min(b.y);
            types::Rect::new(x, y, a.right().max(b.right()) - x, a.bottom().max(b.bottom()) - y)
        })
}

fn build_path(segments: &[Segment], origin: Vector) -> Path {
    Path::new(|builder| {
        for segment in segments {
            match segment {
                Segment::Shape(shape) => add_shape(builder, shape, origin),
                Segment::MoveTo(p) => builder.move_to(Point::new(p.x - origin.x, p.y - origin.y)),
                Segment::LineTo(p) => builder.line_to(Point::new(p.x - origin.x, p.y - origin.y)),
            }
        }
    })
}

fn compiled_path(path: &BarPath, origin: Vector) -> Path {
    Path::new(|builder| {
        for shape in path.shapes() {
            add_shape(builder, shape, origin);
        }
    })
}

fn add_shape(builder: &mut path::Builder, shape: &PathShape, origin: Vector) {
    match *shape {
        PathShape::Rect(rect) => builder.rectangle(
            Point::new(rect.x - origin.x, rect.y - origin.y),
            Size::new(rect.width, rect.height),
        ),
        PathShape::RoundRect { rect, radius } => {
            let r = radius.min(rect.width / 2.0).min(rect.height / 2.0).max(0.0);
            builder.rounded_rectangle(
                Point::new(rect.x - origin.x, rect.y - origin.y),
                Size::new(rect.width, rect.height),
                border::Radius::from(r),
            );
        }
    }
}

// =============================================================================
// Canvas Program
// =============================================================================

/// Canvas program drawing a waveform with click-to-seek
///
/// `on_seek` is called with the normalized position (0.0 to 1.0); the
/// waveform's own `seek` listeners fire as well.
pub struct WaveformCanvas<'a, Message, F>
where
    F: Fn(f32) -> Message,
{
    pub waveform: &'a Waveform,
    pub host: &'a RetainedHost,
    pub on_seek: F,
}

impl<'a, Message, F> WaveformCanvas<'a, Message, F>
where
    F: Fn(f32) -> Message,
{
    /// Mirror the canvas bounds into the host, reporting size changes
    fn sync_bounds(&self, bounds: Rectangle) {
        let rect = types::Rect::new(bounds.x, bounds.y, bounds.width, bounds.height);
        if self.host.set_client_rect(rect) {
            self.waveform.notify_resize();
        }
    }

    fn seek(&self, position: Point, bounds: Rectangle, touch: bool) -> Option<canvas::Action<Message>> {
        self.sync_bounds(bounds);
        let event = if touch {
            PointerEvent::touch(position.x, position.y)
        } else {
            PointerEvent::click(position.x, position.y)
        };
        self.waveform.handle_pointer(&event);

        let progress = seek_progress(position.x, bounds.x, bounds.width);
        Some(canvas::Action::publish((self.on_seek)(progress)))
    }
}

impl<'a, Message, F> Program<Message> for WaveformCanvas<'a, Message, F>
where
    Message: Clone,
    F: Fn(f32) -> Message,
{
    type State = ();

    fn update(
        &self,
        _state: &mut Self::State,
        event: &Event,
        bounds: Rectangle,
        cursor: mouse::Cursor,
    ) -> Option<canvas::Action<Message>> {
        match event {
            Event::Mouse(mouse::Event::ButtonPressed(mouse::Button::Left)) => {
                cursor.position_in(bounds)?;
                let position = cursor.position()?;
                self.seek(position, bounds, false)
            }
            Event::Touch(touch::Event::FingerPressed { position, .. }) if bounds.contains(*position) => {
                self.seek(*position, bounds, true)
            }
            _ => None,
        }
    }

    fn mouse_interaction(
        &self,
        _state: &Self::State,
        bounds: Rectangle,
        cursor: mouse::Cursor,
    ) -> mouse::Interaction {
        if cursor.is_over(bounds) {
            mouse::Interaction::Pointer
        } else {
            mouse::Interaction::default()
        }
    }

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &iced::Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<Geometry> {
        self.sync_bounds(bounds);

        let mut frame = Frame::new(renderer, bounds.size());
        replay(&self.host.snapshot(), &mut frame);
        vec![frame.into_geometry()]
    }
}
