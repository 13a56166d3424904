//! Trait boundaries to the embedded browser engine and the window chrome.
//! The shell core never talks to an engine directly; a GUI layer implements
//! these over whatever webview it embeds.

use anyhow::Result;
use async_trait::async_trait;
use cradle_schema::{NavigationEvent, ScriptOutcome};
use tokio::sync::mpsc;

#[async_trait]
pub trait RenderHost: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<()>;

    async fn load_inline(&self, html: &str) -> Result<()>;

    /// Evaluates script in the loaded page. Implementations map their
    /// engine's "symbol is not defined" failure onto
    /// `ScriptOutcome::NotDefined`; the `Err` variant is reserved for
    /// host-level faults (engine gone, frame destroyed).
    async fn evaluate_script(&self, code: &str) -> Result<ScriptOutcome>;

    /// Current document title of the loaded page.
    async fn title(&self) -> Result<String>;

    /// Persistent navigation-completion stream. Fires for every navigation,
    /// main frame or not, for as long as the receiver is held. One-shot
    /// semantics are layered on top by the load coordinator's generation
    /// check.
    async fn subscribe_navigation(&self) -> mpsc::Receiver<NavigationEvent>;
}

/// Applies presentation decisions. Implementations marshal onto their UI
/// thread and must preserve the order calls were issued in.
#[async_trait]
pub trait WindowPresenter: Send + Sync {
    async fn apply_title(&self, title: &str);

    async fn apply_resizable(&self, resizable: bool);

    /// Used only for the default-view fallback.
    async fn apply_size(&self, width: u32, height: u32);
}
