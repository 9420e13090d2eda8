// src/app.rs

use std::{net::SocketAddr, path::Path, sync::Arc, time::Duration};

use anyhow::{Result, anyhow};
use launcher_plugin::{OutboxReceiver, outbox};
use tokio::{sync::broadcast, task::JoinHandle};
use tracing::{error, info, warn};

use crate::{
    config::HostSettings,
    host::PluginHost,
    router::Router,
    server::UiServer,
    session::Session,
};

/// Wires host, router, session and UI server together.
pub struct App {
    host: Arc<PluginHost>,
    session: Option<Session>,
    outbox_rx: Option<OutboxReceiver>,
    shutdown_tx: Option<broadcast::Sender<()>>,
    server_task: Option<JoinHandle<Result<()>>>,
}

impl App {
    pub fn new(settings: &HostSettings) -> Self {
        let (tx, rx) = outbox();
        let host = PluginHost::new(tx);
        let router = Arc::new(Router::new(host.clone(), settings.plugin_timeout()));
        Self {
            host,
            session: Some(Session::spawn(router)),
            outbox_rx: Some(rx),
            shutdown_tx: None,
            server_task: None,
        }
    }

    pub fn host(&self) -> Arc<PluginHost> {
        self.host.clone()
    }

    /// Add every manifest in `settings.plugins`, resolved against `root`.
    /// Failures are already logged and toasted, so they only count here.
    pub fn load_plugins(&self, root: &Path, settings: &HostSettings) -> usize {
        let mut loaded = 0;
        for manifest in &settings.plugins {
            let path = if manifest.is_absolute() { manifest.clone() } else { root.join(manifest) };
            match self.host.add_plugin(&path) {
                Ok(()) => loaded += 1,
                Err(e) => warn!(path = %path.display(), error = %e, "skipping plugin"),
            }
        }
        loaded
    }

    /// Bind the UI socket and start serving. Returns the bound address.
    pub async fn start(&mut self, addr: &str) -> Result<SocketAddr> {
        let session = self
            .session
            .as_ref()
            .ok_or_else(|| anyhow!("app already shut down"))?;
        let outbox_rx = self
            .outbox_rx
            .take()
            .ok_or_else(|| anyhow!("app already started"))?;

        let server = UiServer::bind(addr, session.handle()).await?;
        let local = server.local_addr()?;
        self.shutdown_tx = Some(server.shutdown_handle());
        self.server_task = Some(tokio::spawn(server.serve(outbox_rx)));

        info!(%local, plugins = self.host.get_plugins().len(), "launcher host started");
        Ok(local)
    }

    pub async fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.server_task.take() {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(error = %e, "UI server failed"),
                Err(e) => error!(error = %e, "UI server task panicked"),
            }
        }
        if let Some(session) = self.session.take() {
            // a half-open handshake can keep a session handle alive
            if tokio::time::timeout(Duration::from_secs(5), session.close()).await.is_err() {
                warn!("session did not drain in time");
            }
        }
        info!("launcher host stopped");
    }
}
