//! Decides where content comes from, arms a one-shot completion await per
//! navigation, probes the loaded page for its entry point, and falls back
//! to the default view when the page defines none.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use cradle_bus::BusPublisher;
use cradle_schema::{ProbeOutcome, ScriptOutcome, ShellEvent, ViewDecision};
use cradle_server::{ContentServer, ServerConfig, DEFAULT_ADDR};
use tokio::sync::RwLock;
use url::Url;

use crate::assets;
use crate::host::{RenderHost, WindowPresenter};
use crate::settings::SettingsStore;

/// Fixed probe invoked against every loaded page.
pub const ENTRY_POINT_PROBE: &str = "init();";

/// Default view applied when the page defines no entry point.
pub const DEFAULT_TITLE: &str = "Cradle (Untitled)";
pub const DEFAULT_WIDTH: u32 = 800;
pub const DEFAULT_HEIGHT: u32 = 450;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// A newer load/reload was issued before this navigation completed.
    #[error("navigation superseded by a newer load")]
    Superseded,
    /// The page's entry point raised a genuine runtime error.
    #[error("content script error: {0}")]
    Content(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentSource {
    LocalDirectory,
    InlineWelcome,
}

/// One navigation attempt. The generation tag makes completion awaits from
/// superseded attempts inert.
#[derive(Debug, Clone)]
pub struct LoadTicket {
    generation: u64,
    pub source: ContentSource,
    pub resizable: bool,
}

pub struct LoadCoordinator<H, P> {
    host: Arc<H>,
    presenter: Arc<P>,
    server: Arc<ContentServer>,
    settings: Arc<RwLock<SettingsStore>>,
    events: BusPublisher,
    generation: AtomicU64,
    server_addr: SocketAddr,
}

impl<H: RenderHost, P: WindowPresenter> LoadCoordinator<H, P> {
    pub fn new(
        host: Arc<H>,
        presenter: Arc<P>,
        server: Arc<ContentServer>,
        settings: Arc<RwLock<SettingsStore>>,
        events: BusPublisher,
    ) -> Self {
        Self {
            host,
            presenter,
            server,
            settings,
            events,
            generation: AtomicU64::new(0),
            // Constant literal, parse cannot fail.
            server_addr: DEFAULT_ADDR.parse().unwrap(),
        }
    }

    /// Overrides the content server bind address (port 0 for tests).
    pub fn with_server_addr(mut self, addr: SocketAddr) -> Self {
        self.server_addr = addr;
        self
    }

    /// Issues a navigation for the currently configured source. With a root
    /// directory configured the content server is ensured running over that
    /// root (a changed root restarts it, since server config is an immutable
    /// per-run snapshot) and the render host navigates to
    /// `base_url + entry_file`; without one the inline welcome page is
    /// loaded at a fixed window size.
    pub async fn load_content(&self) -> Result<LoadTicket> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let (root_dir, entry_file) = {
            let settings = self.settings.read().await;
            (settings.root_dir(), settings.entry_file_name().to_string())
        };

        match root_dir {
            Some(root) => {
                let desired = tokio::fs::canonicalize(&root)
                    .await
                    .with_context(|| format!("content root not accessible: {}", root.display()))?;
                if self
                    .server
                    .current_root()
                    .await
                    .is_some_and(|current| current != desired)
                {
                    tracing::info!(root = %desired.display(), "content root changed, restarting server");
                    self.server.stop().await?;
                }
                self.server
                    .start(ServerConfig::new(&root).with_addr(self.server_addr))
                    .await?;
                let base = self
                    .server
                    .base_url()
                    .await
                    .context("content server has no bound address")?;
                let target = Url::parse(&base)?.join(&entry_file)?;
                tracing::info!(url = %target, "navigating to local content");
                self.host.navigate(target.as_str()).await?;
                self.presenter.apply_resizable(true).await;
                Ok(LoadTicket {
                    generation,
                    source: ContentSource::LocalDirectory,
                    resizable: true,
                })
            }
            None => {
                tracing::info!("no content directory configured, loading welcome page");
                self.host.load_inline(&assets::welcome_html()?).await?;
                self.presenter.apply_resizable(false).await;
                Ok(LoadTicket {
                    generation,
                    source: ContentSource::InlineWelcome,
                    resizable: false,
                })
            }
        }
    }

    /// Waits for the navigation issued with `ticket` to finish, then probes
    /// the page and emits the resulting view decision. Fires at most once
    /// per ticket; a ticket superseded by a newer load returns
    /// `LoadError::Superseded` without probing, which is how repeated
    /// reloads avoid accumulating duplicate probe/title executions.
    pub async fn await_completion(&self, ticket: LoadTicket) -> Result<ViewDecision> {
        let mut rx = self.host.subscribe_navigation().await;
        loop {
            let Some(event) = rx.recv().await else {
                anyhow::bail!("render host closed its navigation stream");
            };
            if event.is_main_frame {
                break;
            }
        }
        drop(rx);

        if ticket.generation != self.generation.load(Ordering::SeqCst) {
            tracing::debug!(
                generation = ticket.generation,
                "ignoring completion of superseded navigation"
            );
            return Err(LoadError::Superseded.into());
        }

        match self.probe_entry_point().await? {
            ProbeOutcome::EntryPointFound { title } => {
                self.presenter.apply_title(&title).await;
                Ok(ViewDecision {
                    title,
                    resizable: ticket.resizable,
                })
            }
            ProbeOutcome::EntryPointMissing => {
                self.presenter.apply_size(DEFAULT_WIDTH, DEFAULT_HEIGHT).await;
                self.presenter.apply_title(DEFAULT_TITLE).await;
                Ok(ViewDecision {
                    title: DEFAULT_TITLE.to_string(),
                    resizable: ticket.resizable,
                })
            }
            ProbeOutcome::ScriptError(message) => {
                tracing::warn!(%message, "entry-point probe failed");
                let _ = self
                    .events
                    .publish(ShellEvent::content_error(&message))
                    .await;
                Err(LoadError::Content(message).into())
            }
        }
    }

    /// Re-issues navigation against the current source under a fresh
    /// generation, leaving any in-flight completion await from the previous
    /// attempt inert. Settings are re-read, and a changed root restarts the
    /// content server over the new directory.
    pub async fn reload(&self) -> Result<LoadTicket> {
        self.load_content().await
    }

    async fn probe_entry_point(&self) -> Result<ProbeOutcome> {
        match self.host.evaluate_script(ENTRY_POINT_PROBE).await? {
            ScriptOutcome::Value(_) => {
                let title = self.host.title().await?;
                Ok(ProbeOutcome::EntryPointFound { title })
            }
            ScriptOutcome::NotDefined => Ok(ProbeOutcome::EntryPointMissing),
            ScriptOutcome::Error(message) => Ok(ProbeOutcome::ScriptError(message)),
        }
    }
}
