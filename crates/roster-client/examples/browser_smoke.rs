/// Smoke-test for `BrowserRenderer`.
///
/// Launches a headless Chromium, opens <https://example.com>, scrolls it,
/// and verifies the rendered HTML contains the expected `<h1>`.
///
/// Run with:
///   cargo run --example browser_smoke --features browser
use roster_client::BrowserRenderer;
use roster_core::traits::{RenderedPage, Renderer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    println!("Launching headless browser…");
    let renderer = BrowserRenderer::new().await?;

    let url = "https://example.com".parse()?;
    println!("Opening {url} …");
    let page = renderer.open(&url).await?;

    let height = page.scroll_to_bottom().await?;
    let html = page.content().await?;
    let png = page.screenshot().await?;
    page.close().await?;

    assert!(
        html.contains("<h1>Example Domain</h1>"),
        "Expected <h1> not found in rendered HTML"
    );
    assert!(height > 0, "Document reported zero height");
    assert!(png.starts_with(b"\x89PNG"), "Screenshot is not a PNG");

    println!(
        "OK: {} bytes of HTML, height {height}px, {} byte screenshot",
        html.len(),
        png.len()
    );
    Ok(())
}
