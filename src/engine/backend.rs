use std::sync::Arc;

use tokio::sync::oneshot;
use url::Url;

use crate::input::{MouseButton, MouseEvent, Rect};

/// Process-global engine settings, applied once at startup.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub cache_path: Option<String>,
    pub root_cache_path: Option<String>,
}

/// Per-browser creation settings.
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    pub browser_id: i32,
    pub headless: bool,
    pub dpi: f64,
}

/// Settings for printing the current page to a PDF file.
#[derive(Debug, Clone, Default)]
pub struct PdfPrintSettings {
    pub print_background: bool,
    pub paper_width: Option<i32>,
    pub paper_height: Option<i32>,
}

/// The engine process a message originates from or is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessId {
    Browser,
    Renderer,
}

/// One message crossing the browser/render process boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessMessage {
    pub name: String,
    pub payload: serde_json::Value,
}

/// How the script/render process died.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationStatus {
    Abnormal,
    Killed,
    Crashed,
    OutOfMemory,
}

impl TerminationStatus {
    /// Numeric code as surfaced on the event stream.
    pub fn code(self) -> i32 {
        match self {
            TerminationStatus::Abnormal => 0,
            TerminationStatus::Killed => 1,
            TerminationStatus::Crashed => 2,
            TerminationStatus::OutOfMemory => 3,
        }
    }
}

/// Which frame a navigation callback refers to. Popup-originated callbacks
/// are filtered out by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSource {
    pub is_popup: bool,
    pub is_main: bool,
}

impl FrameSource {
    pub fn main() -> Self {
        Self {
            is_popup: false,
            is_main: true,
        }
    }

    pub fn sub() -> Self {
        Self {
            is_popup: false,
            is_main: false,
        }
    }

    pub fn popup() -> Self {
        Self {
            is_popup: true,
            is_main: true,
        }
    }
}

/// Entry point into the engine. Both methods must be called on the engine UI
/// thread (see [`crate::ui::UiThread`]).
pub trait EngineBackend: Send + Sync {
    /// Start the engine. Called at most once per process.
    fn start(&self, config: &EngineConfig) -> anyhow::Result<()>;

    /// Create a browser asynchronously. The engine confirms through
    /// [`LifecycleSink::on_after_created`], handing the client its
    /// [`BrowserHost`].
    fn create_browser(&self, config: BrowserConfig, client: Arc<dyn EngineClient>)
        -> anyhow::Result<()>;
}

/// Handle to one live engine browser. All calls originate on the engine UI
/// thread.
pub trait BrowserHost: Send + Sync {
    // ** Navigation
    fn load_url(&self, url: &Url);
    fn go_back(&self);
    fn go_forward(&self);
    fn reload(&self);
    fn stop_load(&self);

    // ** Focus / view
    fn set_focus(&self, focus: bool);
    fn was_resized(&self);
    fn notify_screen_info_changed(&self);
    fn invalidate(&self);
    fn set_zoom_level(&self, level: f64);
    fn zoom_level(&self) -> f64;
    fn open_dev_tools(&self);

    // ** Input injection
    fn send_mouse_click(&self, event: MouseEvent, button: MouseButton, up: bool, click_count: u32);
    fn send_mouse_move(&self, event: MouseEvent, leave: bool);
    fn send_mouse_wheel(&self, event: MouseEvent, delta_x: i32, delta_y: i32);
    fn drag_target_drag_over(&self, event: MouseEvent);
    fn drag_target_drop(&self, event: MouseEvent);
    fn drag_source_system_drag_ended(&self);

    // ** IME
    fn ime_set_composition(&self, text: &str);
    fn ime_commit_text(&self, text: &str);
    fn ime_finish_composing_text(&self);
    fn ime_cancel_composition(&self);

    // ** Cross-process / output
    fn send_process_message(&self, target: ProcessId, message: ProcessMessage);
    fn print_to_pdf(&self, path: &str, settings: PdfPrintSettings, done: oneshot::Sender<bool>);

    /// Begin the engine's asynchronous close sequence. Confirmation arrives
    /// via [`LifecycleSink::on_close_confirmed`].
    fn close(&self, force: bool);
}

/// Paint output from the engine's off-screen renderer.
pub trait PaintSink: Send + Sync {
    /// One full BGRA frame. The buffer is only valid for the duration of the
    /// call.
    fn on_paint(&self, buffer: &[u8], width: u32, height: u32);
}

/// Navigation and page-state callbacks.
pub trait NavigationSink: Send + Sync {
    fn on_title_changed(&self, source: FrameSource, title: &str);
    fn on_address_changed(&self, source: FrameSource, url: &str);
    fn on_loading_state_changed(
        &self,
        source: FrameSource,
        is_loading: bool,
        can_go_back: bool,
        can_go_forward: bool,
    );
    fn on_loading_progress_changed(&self, source: FrameSource, progress: f64);
    fn on_load_start(&self, source: FrameSource, url: &str);
    fn on_load_end(&self, source: FrameSource, http_status: i32);
    fn on_load_error(
        &self,
        source: FrameSource,
        error_code: i32,
        error_text: &str,
        failed_url: &str,
    );
    fn on_scroll_offset_changed(&self, x: f64, y: f64);
}

/// View geometry the engine queries, plus cursor/IME callbacks.
pub trait ViewSink: Send + Sync {
    /// Device-pixel dimensions of the view, each at least 1.
    fn view_rect(&self) -> (u32, u32);
    fn device_scale_factor(&self) -> f64;
    fn on_cursor_changed(&self, cursor: i32);
    /// Bounds of the first composition character, in view coordinates.
    fn on_ime_composition_range_changed(&self, bounds: Rect);
}

/// Engine-initiated drag and drop.
pub trait DragSink: Send + Sync {
    /// Returns true when the bridge takes over the drag.
    fn on_start_dragging(&self, event: MouseEvent) -> bool;
}

/// Browser lifecycle and cross-process messages.
pub trait LifecycleSink: Send + Sync {
    /// The engine finished creating the browser.
    fn on_after_created(&self, host: Arc<dyn BrowserHost>);

    /// The engine confirmed the close sequence; the session is now dead.
    fn on_close_confirmed(&self);

    fn on_render_process_terminated(&self, status: TerminationStatus);

    /// A message arrived from another engine process. Returns true when
    /// consumed.
    fn on_process_message(&self, source: ProcessId, message: ProcessMessage) -> bool;

    /// A script-originated query. `persistent` queries are not supported and
    /// are left unhandled. Returns true when a handler took the query.
    fn on_query(
        &self,
        query_id: i64,
        request: &str,
        persistent: bool,
        responder: crate::router::QueryResponder,
    ) -> bool;
}

/// Everything the engine adapter needs from the bridge, composed from the
/// narrow sinks so each concern stays independently testable.
pub trait EngineClient:
    PaintSink + NavigationSink + ViewSink + DragSink + LifecycleSink
{
}

impl<T> EngineClient for T where
    T: PaintSink + NavigationSink + ViewSink + DragSink + LifecycleSink
{
}
