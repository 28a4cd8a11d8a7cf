use std::sync::{Arc, Mutex, Weak};

use tokio::sync::oneshot;
use url::Url;

use crate::engine::backend::{
    BrowserConfig, BrowserHost, EngineBackend, EngineClient, EngineConfig, FrameSource,
    PdfPrintSettings, ProcessId, ProcessMessage, TerminationStatus,
};
use crate::input::{MouseButton, MouseEvent};

/// Loopback engine that confirms every operation immediately, without any
/// real rendering or networking. Used by tests and the headless demo.
pub struct NullEngine;

impl NullEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NullEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBackend for NullEngine {
    fn start(&self, _config: &EngineConfig) -> anyhow::Result<()> {
        Ok(())
    }

    fn create_browser(
        &self,
        _config: BrowserConfig,
        client: Arc<dyn EngineClient>,
    ) -> anyhow::Result<()> {
        let host = Arc::new(NullBrowserHost::new(Arc::downgrade(&client)));
        client.on_after_created(host);
        Ok(())
    }
}

struct NullState {
    history: Vec<Url>,
    index: usize,
    zoom: f64,
}

/// Browser host backing [`NullEngine`]. Navigation emits the full callback
/// sequence synchronously; paints fill the view with a solid color.
pub struct NullBrowserHost {
    client: Weak<dyn EngineClient>,
    state: Mutex<NullState>,
}

impl NullBrowserHost {
    fn new(client: Weak<dyn EngineClient>) -> Self {
        Self {
            client,
            state: Mutex::new(NullState {
                history: Vec::new(),
                index: 0,
                zoom: 0.0,
            }),
        }
    }

    fn client(&self) -> Option<Arc<dyn EngineClient>> {
        self.client.upgrade()
    }

    /// Replay the callback sequence a navigation produces. `(can_go_back,
    /// can_go_forward)` reflect the history position reached.
    fn emit_navigation(&self, url: Url) {
        let Some(client) = self.client() else { return };

        let (can_go_back, can_go_forward) = {
            let state = self.state.lock().unwrap();
            (state.index > 0, state.index + 1 < state.history.len())
        };

        client.on_loading_state_changed(FrameSource::main(), true, can_go_back, can_go_forward);
        client.on_load_start(FrameSource::main(), url.as_str());
        client.on_title_changed(FrameSource::main(), url.as_str());
        client.on_address_changed(FrameSource::main(), url.as_str());
        client.on_loading_progress_changed(FrameSource::main(), 1.0);
        client.on_load_end(FrameSource::main(), 200);
        client.on_loading_state_changed(FrameSource::main(), false, can_go_back, can_go_forward);
    }

    fn paint(&self) {
        let Some(client) = self.client() else { return };
        let (width, height) = client.view_rect();
        // Opaque mid-gray in BGRA.
        let frame = vec![0x80u8; width as usize * height as usize * 4];
        client.on_paint(&frame, width, height);
    }

    fn current_url(&self) -> Option<Url> {
        let state = self.state.lock().unwrap();
        state.history.get(state.index).cloned()
    }

    /// Simulate an abnormal render process exit (test hook).
    pub fn terminate_render_process(&self, status: TerminationStatus) {
        if let Some(client) = self.client() {
            client.on_render_process_terminated(status);
        }
    }
}

impl BrowserHost for NullBrowserHost {
    fn load_url(&self, url: &Url) {
        {
            let mut state = self.state.lock().unwrap();
            let cut = if state.history.is_empty() {
                0
            } else {
                state.index + 1
            };
            state.history.truncate(cut);
            state.history.push(url.clone());
            state.index = state.history.len() - 1;
        }
        self.emit_navigation(url.clone());
    }

    fn go_back(&self) {
        let url = {
            let mut state = self.state.lock().unwrap();
            if state.index == 0 {
                return;
            }
            state.index -= 1;
            state.history[state.index].clone()
        };
        self.emit_navigation(url);
    }

    fn go_forward(&self) {
        let url = {
            let mut state = self.state.lock().unwrap();
            if state.index + 1 >= state.history.len() {
                return;
            }
            state.index += 1;
            state.history[state.index].clone()
        };
        self.emit_navigation(url);
    }

    fn reload(&self) {
        if let Some(url) = self.current_url() {
            self.emit_navigation(url);
        }
    }

    fn stop_load(&self) {
        if let Some(client) = self.client() {
            let (can_go_back, can_go_forward) = {
                let state = self.state.lock().unwrap();
                (state.index > 0, state.index + 1 < state.history.len())
            };
            client.on_loading_state_changed(
                FrameSource::main(),
                false,
                can_go_back,
                can_go_forward,
            );
        }
    }

    fn set_focus(&self, _focus: bool) {}

    fn was_resized(&self) {
        self.paint();
    }

    fn notify_screen_info_changed(&self) {}

    fn invalidate(&self) {
        self.paint();
    }

    fn set_zoom_level(&self, level: f64) {
        self.state.lock().unwrap().zoom = level;
    }

    fn zoom_level(&self) -> f64 {
        self.state.lock().unwrap().zoom
    }

    fn open_dev_tools(&self) {}

    fn send_mouse_click(
        &self,
        _event: MouseEvent,
        _button: MouseButton,
        _up: bool,
        _click_count: u32,
    ) {
    }

    fn send_mouse_move(&self, _event: MouseEvent, _leave: bool) {}

    fn send_mouse_wheel(&self, _event: MouseEvent, _delta_x: i32, _delta_y: i32) {}

    fn drag_target_drag_over(&self, _event: MouseEvent) {}

    fn drag_target_drop(&self, _event: MouseEvent) {}

    fn drag_source_system_drag_ended(&self) {}

    fn ime_set_composition(&self, _text: &str) {}

    fn ime_commit_text(&self, _text: &str) {}

    fn ime_finish_composing_text(&self) {}

    fn ime_cancel_composition(&self) {}

    fn send_process_message(&self, target: ProcessId, message: ProcessMessage) {
        if target != ProcessId::Renderer {
            return;
        }
        // The fake render process answers script evaluations by echoing the
        // payload back as the result.
        if message.name == crate::channel::EVALUATE_JS {
            if let Some(client) = self.client() {
                let response = ProcessMessage {
                    name: crate::channel::EVALUATE_JS_RESPONSE.to_string(),
                    payload: serde_json::json!({
                        "id": message.payload.get("id").cloned().unwrap_or_default(),
                        "result": message.payload.get("payload").cloned().unwrap_or_default(),
                    }),
                };
                client.on_process_message(ProcessId::Renderer, response);
            }
        }
    }

    fn print_to_pdf(&self, _path: &str, _settings: PdfPrintSettings, done: oneshot::Sender<bool>) {
        let _ = done.send(true);
    }

    fn close(&self, _force: bool) {
        if let Some(client) = self.client() {
            client.on_close_confirmed();
        }
    }
}
