//! Waveform view functions
//!
//! Plain functions that take a waveform and its host by reference plus a
//! seek callback, returning an `Element`.
//!
//! ## Usage
//!
//! ```ignore
//! fn view(&self) -> Element<Message> {
//!     let waveform = waveform_canvas(&self.waveform, &self.host, 96.0, Message::Seek);
//!     column![waveform, /* other widgets */].into()
//! }
//! ```
//!
//! The waveform only re-renders when its frame scheduler runs, so drive the
//! `ManualScheduler` from a frame subscription:
//!
//! ```ignore
//! fn subscription(&self) -> Subscription<Message> {
//!     iced::window::frames().map(Message::Frame)
//! }
//!
//! // in update()
//! Message::Frame(now) => { self.scheduler.tick(now); }
//! ```

use iced::widget::Canvas;
use iced::{Element, Length};

use super::canvas::WaveformCanvas;
use super::host::RetainedHost;
use super::orchestrator::Waveform;

/// Create a waveform element with click-to-seek
///
/// # Arguments
///
/// * `waveform` - The waveform rendering into `host`
/// * `host` - The retained host whose display list is drawn
/// * `height` - Fixed canvas height in logical pixels
/// * `on_seek` - Called with the normalized position (0.0 to 1.0) on click or tap
pub fn waveform_canvas<'a, Message>(
    waveform: &'a Waveform,
    host: &'a RetainedHost,
    height: f32,
    on_seek: impl Fn(f32) -> Message + 'a,
) -> Element<'a, Message>
where
    Message: Clone + 'a,
{
    Canvas::new(WaveformCanvas {
        waveform,
        host,
        on_seek,
    })
    .width(Length::Fill)
    .height(Length::Fixed(height))
    .into()
}
