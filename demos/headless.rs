use serde_json::json;
use std::sync::Arc;

use webview_bridge::engine::null::NullEngine;
use webview_bridge::events::SessionEvent;
use webview_bridge::{SessionId, WebviewPlugin};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    // The loopback engine stands in for a real browser engine: it confirms
    // every operation immediately and paints solid frames.
    let plugin = WebviewPlugin::new(Arc::new(NullEngine::new()));

    // Start the engine once; later calls are no-ops.
    plugin
        .handle_global_command("startCEF", &json!({ "cachePath": "/tmp/webview-cache" }))
        .await?;

    // Create a windowed browser. The returned texture id is what a host
    // compositor would register; the handle exists before the engine
    // confirms creation.
    let texture = plugin
        .handle_global_command("createBrowser", &json!({ "browserID": 1, "dpi": 2.0 }))
        .await?;
    println!("browser 1 renders into texture {}", texture);

    let id = SessionId(1);
    let session = plugin.session(id).expect("session was just created");

    // Attach the event stream before navigating, otherwise early events are
    // dropped rather than buffered.
    let mut events = session.events().attach();

    // 800x600 logical pixels at 2.0 dpi: the engine paints 1600x1200.
    plugin
        .handle_browser_command(id, "setSize", &json!([2.0, 800.0, 600.0, 0.0, 0.0]))
        .await?;
    plugin
        .handle_browser_command(id, "loadUrl", &json!("https://example.com/"))
        .await?;

    // Script evaluation completes later, on the event stream.
    let correlation = plugin
        .handle_browser_command(id, "evaluateJavaScript", &json!("document.title"))
        .await?;
    println!("evaluation dispatched as {}", correlation);

    while let Ok(event) = events.try_recv() {
        match event {
            SessionEvent::JavaScriptResult { id, result, error } => {
                println!("script {} -> result={:?} error={:?}", id, result, error)
            }
            other => println!("event: {:?}", other),
        }
    }

    let _ = session.frame().with_frame(|frame| {
        println!(
            "latest frame: {}x{} ({} bytes, generation {})",
            frame.width,
            frame.height,
            frame.pixels.len(),
            frame.generation
        );
    });

    plugin.handle_browser_command(id, "dispose", &json!(null)).await?;
    plugin.shutdown().await;
    Ok(())
}
