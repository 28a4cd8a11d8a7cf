//! Per-session command surface: string method names and JSON arguments, as
//! the host framework delivers them, dispatched onto [`BrowserSession`].

use serde_json::{json, Value};
use tokio::sync::oneshot;

use crate::engine::PdfPrintSettings;
use crate::errors::CommandError;
use crate::session::BrowserSession;

/// Response of one dispatched command.
pub enum CommandOutput {
    /// Synchronous response value (`Value::Null` for void commands).
    Value(Value),
    /// Completion the engine delivers later (`printToPDF`). The dispatcher
    /// awaits it off the engine UI thread.
    PendingBool(oneshot::Receiver<bool>),
}

impl CommandOutput {
    fn done() -> Self {
        CommandOutput::Value(Value::Null)
    }
}

impl BrowserSession {
    /// Dispatch one host command. Unknown names yield
    /// [`CommandError::NotImplemented`]; missing arguments an error naming
    /// the field. No command failure terminates the session.
    pub fn handle_command(
        &self,
        method: &str,
        args: &Value,
    ) -> Result<CommandOutput, CommandError> {
        match method {
            "loadUrl" => {
                let url = args.as_str().ok_or(CommandError::MissingArgument("url"))?;
                self.load_url(url)?;
                Ok(CommandOutput::done())
            }
            "setSize" => {
                let [dpi, width, height, offset_x, offset_y] = float_list(args)?;
                self.set_size(dpi, width, height, offset_x, offset_y)?;
                Ok(CommandOutput::done())
            }
            "cursorClickDown" => {
                let (x, y) = point(args)?;
                self.cursor_click(x, y, false)?;
                Ok(CommandOutput::done())
            }
            "cursorClickUp" => {
                let (x, y) = point(args)?;
                self.cursor_click(x, y, true)?;
                Ok(CommandOutput::done())
            }
            "cursorMove" => {
                let (x, y) = point(args)?;
                self.cursor_move(x, y)?;
                Ok(CommandOutput::done())
            }
            "cursorDragging" => {
                let (x, y) = point(args)?;
                self.cursor_drag(x, y)?;
                Ok(CommandOutput::done())
            }
            "setScrollDelta" => {
                let [x, y, delta_x, delta_y] = int_list(args)?;
                self.set_scroll_delta(x, y, delta_x, delta_y)?;
                Ok(CommandOutput::done())
            }
            "setZoomLevel" => {
                let level = args
                    .as_f64()
                    .ok_or(CommandError::MissingArgument("level"))?;
                self.set_zoom_level(level)?;
                Ok(CommandOutput::done())
            }
            "getZoomLevel" => Ok(CommandOutput::Value(json!(self.zoom_level()?))),
            "focus" => {
                self.focus()?;
                Ok(CommandOutput::done())
            }
            "unfocus" => {
                self.unfocus()?;
                Ok(CommandOutput::done())
            }
            "goBack" => {
                self.go_back()?;
                Ok(CommandOutput::done())
            }
            "goForward" => {
                self.go_forward()?;
                Ok(CommandOutput::done())
            }
            "canGoBack" => {
                self.live_host()?;
                Ok(CommandOutput::Value(json!(self.can_go_back())))
            }
            "canGoForward" => {
                self.live_host()?;
                Ok(CommandOutput::Value(json!(self.can_go_forward())))
            }
            "reload" => {
                self.reload()?;
                Ok(CommandOutput::done())
            }
            "stopLoad" => {
                self.stop_load()?;
                Ok(CommandOutput::done())
            }
            "openDevTools" => {
                self.open_dev_tools()?;
                Ok(CommandOutput::done())
            }
            "evaluateJavaScript" => {
                if args.is_null() {
                    return Err(CommandError::MissingArgument("payload"));
                }
                let id = self.evaluate_javascript(args.clone())?;
                Ok(CommandOutput::Value(json!(id)))
            }
            "printToPDF" => {
                let path = args
                    .get("path")
                    .and_then(Value::as_str)
                    .ok_or(CommandError::MissingArgument("path"))?;
                let settings = PdfPrintSettings {
                    print_background: args
                        .get("backgroundsEnabled")
                        .and_then(Value::as_bool)
                        .unwrap_or(false),
                    paper_width: args
                        .get("pageWidth")
                        .and_then(Value::as_i64)
                        .map(|v| v as i32),
                    paper_height: args
                        .get("pageHeight")
                        .and_then(Value::as_i64)
                        .map(|v| v as i32),
                };
                Ok(CommandOutput::PendingBool(self.print_to_pdf(path, settings)?))
            }
            "attachView" => {
                self.live_host()?;
                Ok(CommandOutput::Value(json!(self.frame().attach())))
            }
            "deattachView" => {
                self.live_host()?;
                self.frame().detach();
                Ok(CommandOutput::done())
            }
            "invalidate" => {
                self.invalidate()?;
                Ok(CommandOutput::done())
            }
            "dispose" => {
                self.dispose();
                Ok(CommandOutput::done())
            }
            _ => Err(CommandError::NotImplemented),
        }
    }
}

fn float_list<const N: usize>(args: &Value) -> Result<[f64; N], CommandError> {
    let list = args
        .as_array()
        .ok_or(CommandError::InvalidArguments("expected a list of numbers"))?;
    if list.len() < N {
        return Err(CommandError::InvalidArguments("too few arguments"));
    }
    let mut out = [0.0; N];
    for (slot, value) in out.iter_mut().zip(list) {
        *slot = value
            .as_f64()
            .ok_or(CommandError::InvalidArguments("expected a number"))?;
    }
    Ok(out)
}

fn int_list<const N: usize>(args: &Value) -> Result<[i32; N], CommandError> {
    let list = args
        .as_array()
        .ok_or(CommandError::InvalidArguments("expected a list of integers"))?;
    if list.len() < N {
        return Err(CommandError::InvalidArguments("too few arguments"));
    }
    let mut out = [0i32; N];
    for (slot, value) in out.iter_mut().zip(list) {
        *slot = value
            .as_i64()
            .ok_or(CommandError::InvalidArguments("expected an integer"))?
            as i32;
    }
    Ok(out)
}

fn point(args: &Value) -> Result<(i32, i32), CommandError> {
    let [x, y] = int_list(args)?;
    Ok((x, y))
}
