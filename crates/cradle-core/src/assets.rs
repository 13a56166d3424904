//! HTML bundled into the binary: the inline welcome page shown when no
//! content directory is configured, and the starter template written by
//! `cradle new`.

use anyhow::{anyhow, Result};
use rust_embed::Embed;

#[derive(Embed)]
#[folder = "assets"]
struct Assets;

/// Inline fallback shown when no content directory is configured. Defines
/// no `init` hook, so it lands on the default view.
pub fn welcome_html() -> Result<String> {
    asset("welcome.html")
}

/// Starter document wired to the `init()` entry point.
pub fn template_html() -> Result<String> {
    asset("template.html")
}

fn asset(name: &str) -> Result<String> {
    let file = Assets::get(name).ok_or_else(|| anyhow!("asset missing from binary: {name}"))?;
    Ok(String::from_utf8_lossy(&file.data).into_owned())
}
