//! The session core: owns the frame bridge, router, channel bridge and event
//! emitter for one engine browser, and implements the engine's callback sinks.
//!
//! Lock discipline: the session mutex is never held across a call into the
//! engine host or the registry. Engine adapters may call back into the
//! session synchronously, so holding it would re-enter the same mutex.

use std::sync::{Arc, Mutex, Weak};

use serde_json::Value;
use tokio::sync::oneshot;
use url::Url;
use uuid::Uuid;

use crate::channel::{AsyncChannelBridge, EVALUATE_JS_RESPONSE};
use crate::engine::{
    BrowserHost, DragSink, FrameSource, LifecycleSink, NavigationSink, PaintSink,
    PdfPrintSettings, ProcessId, ProcessMessage, TerminationStatus, ViewSink,
};
use crate::errors::CommandError;
use crate::events::{EventEmitter, SessionEvent};
use crate::frame::FrameBufferBridge;
use crate::input::{logical_to_device, EventFlags, MouseButton, MouseEvent, Rect};
use crate::registry::SessionRegistry;
use crate::router::{MessageRouter, QueryResponder};
use crate::session::{SessionId, SessionState};

/// Engine error code for an aborted load (user-cancelled navigation or a
/// download taking over). Expected outcome, not surfaced as an error.
const ERR_ABORTED: i32 = -3;

struct SessionInner {
    state: SessionState,
    host: Option<Arc<dyn BrowserHost>>,
    focused: bool,
    dpi: f64,
    /// Device-pixel view size, `floor(logical * dpi)` of the last `setSize`.
    device: (u32, u32),
    offset: (i32, i32),
    dragging: bool,
    can_go_back: bool,
    can_go_forward: bool,
    last_ime_bounds: Option<Rect>,
}

/// One live engine browser as seen by the host.
pub struct BrowserSession {
    id: SessionId,
    emitter: Arc<EventEmitter>,
    frame: FrameBufferBridge,
    router: MessageRouter,
    channel: AsyncChannelBridge,
    registry: Weak<SessionRegistry>,
    inner: Mutex<SessionInner>,
}

impl BrowserSession {
    pub fn new(id: SessionId, dpi: f64, registry: &Arc<SessionRegistry>) -> Arc<Self> {
        let emitter = Arc::new(EventEmitter::new());
        Arc::new(Self {
            id,
            channel: AsyncChannelBridge::new(emitter.clone()),
            emitter,
            frame: FrameBufferBridge::new(),
            router: MessageRouter::new(),
            registry: Arc::downgrade(registry),
            inner: Mutex::new(SessionInner {
                state: SessionState::Created,
                host: None,
                focused: false,
                dpi,
                device: (0, 0),
                offset: (0, 0),
                dragging: false,
                can_go_back: false,
                can_go_forward: false,
                last_ime_bounds: None,
            }),
        })
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().unwrap().state
    }

    pub fn events(&self) -> &EventEmitter {
        &self.emitter
    }

    pub fn router(&self) -> &MessageRouter {
        &self.router
    }

    pub fn frame(&self) -> &FrameBufferBridge {
        &self.frame
    }

    pub fn is_focused(&self) -> bool {
        self.inner.lock().unwrap().focused
    }

    /// Viewport origin in device pixels, as set by the last `setSize`. Hosts
    /// use it to map view coordinates onto the screen.
    pub fn viewport_offset(&self) -> (i32, i32) {
        self.inner.lock().unwrap().offset
    }

    /// The engine host handle, available once the session is `Active`.
    pub(crate) fn live_host(&self) -> Result<Arc<dyn BrowserHost>, CommandError> {
        let inner = self.inner.lock().unwrap();
        match (inner.state, &inner.host) {
            (SessionState::Active, Some(host)) => Ok(host.clone()),
            _ => Err(CommandError::NotReady),
        }
    }

    fn is_live(&self) -> bool {
        self.inner.lock().unwrap().state == SessionState::Active
    }

    // ****************************************
    // ** Navigation

    pub fn load_url(&self, url: &str) -> Result<(), CommandError> {
        let host = self.live_host()?;
        let url = Url::parse(url)
            .map_err(|_| CommandError::InvalidArguments("url must be an absolute URL"))?;
        host.load_url(&url);
        Ok(())
    }

    /// Navigate back, gated by the engine-reported history state.
    pub fn go_back(&self) -> Result<(), CommandError> {
        let host = self.live_host()?;
        if self.inner.lock().unwrap().can_go_back {
            host.go_back();
        }
        Ok(())
    }

    pub fn go_forward(&self) -> Result<(), CommandError> {
        let host = self.live_host()?;
        if self.inner.lock().unwrap().can_go_forward {
            host.go_forward();
        }
        Ok(())
    }

    pub fn can_go_back(&self) -> bool {
        self.inner.lock().unwrap().can_go_back
    }

    pub fn can_go_forward(&self) -> bool {
        self.inner.lock().unwrap().can_go_forward
    }

    pub fn reload(&self) -> Result<(), CommandError> {
        self.live_host()?.reload();
        Ok(())
    }

    pub fn stop_load(&self) -> Result<(), CommandError> {
        self.live_host()?.stop_load();
        Ok(())
    }

    pub fn open_dev_tools(&self) -> Result<(), CommandError> {
        self.live_host()?.open_dev_tools();
        Ok(())
    }

    // ****************************************
    // ** Focus

    /// Take process-wide focus. The registry unfocuses the previous holder.
    pub fn focus(&self) -> Result<(), CommandError> {
        let host = self.live_host()?;
        self.inner.lock().unwrap().focused = true;
        host.set_focus(true);
        if let Some(registry) = self.registry.upgrade() {
            registry.set_focused(self.id);
        }
        Ok(())
    }

    pub fn unfocus(&self) -> Result<(), CommandError> {
        let host = self.live_host()?;
        self.inner.lock().unwrap().focused = false;
        host.set_focus(false);
        if let Some(registry) = self.registry.upgrade() {
            registry.clear_focused(self.id);
        }
        Ok(())
    }

    /// Lose focus to another session. Called by the registry, which has
    /// already moved the focused id; only local state and the engine are
    /// updated here.
    pub(crate) fn drop_focus(&self) {
        let host = {
            let mut inner = self.inner.lock().unwrap();
            inner.focused = false;
            inner.host.clone()
        };
        if let Some(host) = host {
            host.set_focus(false);
        }
    }

    // ****************************************
    // ** View geometry

    /// Apply a new logical size, dpi and viewport offset. The engine is told
    /// about screen-info changes only when the dpi actually changed, and
    /// about resizes only when the device-pixel size actually changed.
    pub fn set_size(
        &self,
        dpi: f64,
        width: f64,
        height: f64,
        offset_x: f64,
        offset_y: f64,
    ) -> Result<(), CommandError> {
        let host = self.live_host()?;
        let device = (
            logical_to_device(width, dpi),
            logical_to_device(height, dpi),
        );
        let (dpi_changed, size_changed) = {
            let mut inner = self.inner.lock().unwrap();
            let dpi_changed = (inner.dpi - dpi).abs() > f64::EPSILON;
            let size_changed = device != inner.device;
            inner.dpi = dpi;
            inner.device = device;
            inner.offset = (offset_x.floor() as i32, offset_y.floor() as i32);
            (dpi_changed, size_changed)
        };

        if dpi_changed {
            host.notify_screen_info_changed();
        }
        if size_changed {
            self.frame.resize(device.0, device.1);
            host.was_resized();
        }
        Ok(())
    }

    pub fn invalidate(&self) -> Result<(), CommandError> {
        self.live_host()?.invalidate();
        Ok(())
    }

    pub fn set_zoom_level(&self, level: f64) -> Result<(), CommandError> {
        self.live_host()?.set_zoom_level(level);
        Ok(())
    }

    pub fn zoom_level(&self) -> Result<f64, CommandError> {
        Ok(self.live_host()?.zoom_level())
    }

    // ****************************************
    // ** Pointer input

    /// Left-button press or release. A release received while an engine drag
    /// is in progress resolves the drag (drop + end), never a click.
    pub fn cursor_click(&self, x: i32, y: i32, up: bool) -> Result<(), CommandError> {
        let host = self.live_host()?;
        let event = MouseEvent::at(x, y).with_modifiers(EventFlags::LEFT_MOUSE_BUTTON);

        if up {
            let was_dragging = std::mem::take(&mut self.inner.lock().unwrap().dragging);
            if was_dragging {
                host.drag_target_drop(event);
                host.drag_source_system_drag_ended();
                return Ok(());
            }
            host.send_mouse_click(event, MouseButton::Left, true, 1);
        } else {
            // Engine focus follows pointer-down.
            self.focus()?;
            host.send_mouse_click(event, MouseButton::Left, false, 1);
        }
        Ok(())
    }

    pub fn cursor_move(&self, x: i32, y: i32) -> Result<(), CommandError> {
        self.live_host()?
            .send_mouse_move(MouseEvent::at(x, y), false);
        Ok(())
    }

    /// Pointer move with the left button held. While an engine drag is in
    /// progress this feeds the drag target instead.
    pub fn cursor_drag(&self, x: i32, y: i32) -> Result<(), CommandError> {
        let host = self.live_host()?;
        let event = MouseEvent::at(x, y).with_modifiers(EventFlags::LEFT_MOUSE_BUTTON);
        if self.inner.lock().unwrap().dragging {
            host.drag_target_drag_over(event);
        } else {
            host.send_mouse_move(event, false);
        }
        Ok(())
    }

    pub fn set_scroll_delta(
        &self,
        x: i32,
        y: i32,
        delta_x: i32,
        delta_y: i32,
    ) -> Result<(), CommandError> {
        self.live_host()?
            .send_mouse_wheel(MouseEvent::at(x, y), delta_x, delta_y);
        Ok(())
    }

    // ****************************************
    // ** IME

    pub fn ime_set_composition(&self, text: &str) -> Result<(), CommandError> {
        self.live_host()?.ime_set_composition(text);
        Ok(())
    }

    pub fn ime_commit_text(&self, text: &str) -> Result<(), CommandError> {
        self.live_host()?.ime_commit_text(text);
        Ok(())
    }

    pub fn ime_finish_composing_text(&self) -> Result<(), CommandError> {
        self.live_host()?.ime_finish_composing_text();
        Ok(())
    }

    pub fn ime_cancel_composition(&self) -> Result<(), CommandError> {
        self.live_host()?.ime_cancel_composition();
        Ok(())
    }

    // ****************************************
    // ** Scripting / output

    /// Dispatch a script evaluation; the result arrives on the event stream
    /// tagged with the returned correlation id.
    pub fn evaluate_javascript(&self, payload: Value) -> Result<Uuid, CommandError> {
        let host = self.live_host()?;
        Ok(self.channel.execute(host.as_ref(), payload))
    }

    /// Print the current page to a PDF file. The receiver resolves with the
    /// engine's success flag once printing finishes.
    pub fn print_to_pdf(
        &self,
        path: &str,
        settings: PdfPrintSettings,
    ) -> Result<oneshot::Receiver<bool>, CommandError> {
        let host = self.live_host()?;
        let (tx, rx) = oneshot::channel();
        host.print_to_pdf(path, settings, tx);
        Ok(rx)
    }

    // ****************************************
    // ** Teardown

    /// Begin teardown: release focus and the texture, silence the router,
    /// fail outstanding script evaluations and ask the engine to close. The
    /// session reaches `Closed` once the engine confirms.
    pub fn dispose(&self) {
        let host = {
            let mut inner = self.inner.lock().unwrap();
            if matches!(inner.state, SessionState::Closing | SessionState::Closed) {
                return;
            }
            inner.focused = false;
            inner.state = SessionState::Closing;
            inner.host.clone()
        };

        if let Some(registry) = self.registry.upgrade() {
            registry.clear_focused(self.id);
        }
        self.frame.detach();
        self.router.clear_handler();
        let failed = self.channel.fail_all("session disposed");
        if failed > 0 {
            log::debug!("session {}: failed {} pending evaluations on dispose", self.id, failed);
        }

        match host {
            Some(host) => host.close(false),
            // Disposed before the engine ever confirmed creation.
            None => self.finish_close(),
        }
    }

    fn finish_close(&self) {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.state = SessionState::Closed;
            inner.host = None;
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
        log::debug!("session {} closed", self.id);
    }
}

impl PaintSink for BrowserSession {
    fn on_paint(&self, buffer: &[u8], width: u32, height: u32) {
        if !self.is_live() {
            return;
        }
        self.frame.on_frame(buffer, width, height);
    }
}

impl NavigationSink for BrowserSession {
    fn on_title_changed(&self, source: FrameSource, title: &str) {
        if source.is_popup || !self.is_live() {
            return;
        }
        self.emitter.emit(SessionEvent::TitleChanged(title.to_string()));
    }

    fn on_address_changed(&self, source: FrameSource, url: &str) {
        if source.is_popup || !source.is_main || !self.is_live() {
            return;
        }
        self.emitter.emit(SessionEvent::UrlChanged(url.to_string()));
    }

    fn on_loading_state_changed(
        &self,
        source: FrameSource,
        is_loading: bool,
        can_go_back: bool,
        can_go_forward: bool,
    ) {
        if source.is_popup || !self.is_live() {
            return;
        }
        {
            let mut inner = self.inner.lock().unwrap();
            inner.can_go_back = can_go_back;
            inner.can_go_forward = can_go_forward;
        }
        self.emitter.emit(SessionEvent::LoadingStateChanged(is_loading));
    }

    fn on_loading_progress_changed(&self, source: FrameSource, progress: f64) {
        if source.is_popup || !self.is_live() {
            return;
        }
        self.emitter.emit(SessionEvent::LoadingProgressChanged(progress));
    }

    fn on_load_start(&self, source: FrameSource, url: &str) {
        if source.is_popup || !source.is_main || !self.is_live() {
            return;
        }
        self.emitter.emit(SessionEvent::LoadStart(url.to_string()));
    }

    fn on_load_end(&self, source: FrameSource, http_status: i32) {
        if source.is_popup || !source.is_main || !self.is_live() {
            return;
        }
        self.emitter.emit(SessionEvent::LoadEnd(http_status));
    }

    fn on_load_error(
        &self,
        source: FrameSource,
        error_code: i32,
        error_text: &str,
        failed_url: &str,
    ) {
        if source.is_popup || !source.is_main || !self.is_live() {
            return;
        }
        if error_code == ERR_ABORTED {
            // Expected for cancelled navigations and downloads.
            log::debug!("session {}: aborted load of {}", self.id, failed_url);
            return;
        }
        self.emitter.emit(SessionEvent::LoadError {
            error_code,
            error_text: error_text.to_string(),
            failed_url: failed_url.to_string(),
        });
    }

    fn on_scroll_offset_changed(&self, x: f64, y: f64) {
        if !self.is_live() {
            return;
        }
        self.emitter.emit(SessionEvent::ScrollOffsetChanged { x, y });
    }
}

impl ViewSink for BrowserSession {
    fn view_rect(&self) -> (u32, u32) {
        let device = self.inner.lock().unwrap().device;
        (device.0.max(1), device.1.max(1))
    }

    fn device_scale_factor(&self) -> f64 {
        self.inner.lock().unwrap().dpi
    }

    fn on_cursor_changed(&self, cursor: i32) {
        if !self.is_live() {
            return;
        }
        self.emitter.emit(SessionEvent::CursorChanged(cursor));
    }

    fn on_ime_composition_range_changed(&self, bounds: Rect) {
        if !self.is_live() {
            return;
        }
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.last_ime_bounds == Some(bounds) {
                return;
            }
            inner.last_ime_bounds = Some(bounds);
        }
        // The host positions its candidate window under the composition.
        self.emitter.emit(SessionEvent::ImeCompositionPositionChanged {
            x: bounds.x,
            y: bounds.y + bounds.height,
        });
    }
}

impl DragSink for BrowserSession {
    fn on_start_dragging(&self, _event: MouseEvent) -> bool {
        if !self.is_live() {
            return false;
        }
        self.inner.lock().unwrap().dragging = true;
        true
    }
}

impl LifecycleSink for BrowserSession {
    fn on_after_created(&self, host: Arc<dyn BrowserHost>) {
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.state != SessionState::Created {
                log::warn!(
                    "session {}: after-created callback in state {:?}, ignoring",
                    self.id,
                    inner.state
                );
                return;
            }
            inner.state = SessionState::Active;
            inner.host = Some(host);
        }
        self.emitter.emit(SessionEvent::BrowserCreated);
    }

    fn on_close_confirmed(&self) {
        if self.state() == SessionState::Closed {
            return;
        }
        // Engine-initiated closes skip dispose; run the same teardown.
        self.frame.detach();
        self.router.clear_handler();
        self.channel.fail_all("session closed");
        self.finish_close();
    }

    fn on_render_process_terminated(&self, status: TerminationStatus) {
        if !self.is_live() {
            return;
        }
        let failed = self.channel.fail_all("render process terminated");
        log::warn!(
            "session {}: render process terminated ({:?}), failed {} pending evaluations",
            self.id,
            status,
            failed
        );
        self.emitter.emit(SessionEvent::RenderProcessTerminated {
            status: status.code(),
        });
    }

    fn on_process_message(&self, _source: ProcessId, message: ProcessMessage) -> bool {
        if !self.is_live() {
            return false;
        }
        if message.name == EVALUATE_JS_RESPONSE {
            self.channel.on_response(&message.payload);
            return true;
        }
        false
    }

    fn on_query(
        &self,
        _query_id: i64,
        request: &str,
        persistent: bool,
        responder: QueryResponder,
    ) -> bool {
        if persistent {
            log::warn!("session {}: persistent queries are not supported", self.id);
            return false;
        }
        if !self.is_live() {
            return false;
        }
        self.router.on_query(request, responder)
    }
}
