// src/session.rs

use std::sync::Arc;

use launcher_plugin::Envelope;
use tokio::{
    sync::mpsc::{UnboundedSender, unbounded_channel},
    task::JoinHandle,
};
use tracing::{debug, error};

use crate::router::Router;

/// Single consumer in front of the router: one envelope is fully handled,
/// reply sent, before the next one starts.
pub struct Session {
    handle: SessionHandle,
    worker: JoinHandle<()>,
}

/// Cheap, cloneable way to feed a [`Session`].
#[derive(Clone, Debug)]
pub struct SessionHandle {
    tx: UnboundedSender<Envelope>,
}

impl Session {
    pub fn spawn(router: Arc<Router>) -> Self {
        let (tx, mut rx) = unbounded_channel::<Envelope>();
        let worker = tokio::spawn(async move {
            while let Some(env) = rx.recv().await {
                router.dispatch(env).await;
            }
            debug!("session queue closed");
        });
        Self { handle: SessionHandle { tx }, worker }
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Stop accepting input, finish what is queued, then return.
    ///
    /// Envelopes sent through handles still alive elsewhere keep the worker
    /// running until those handles are dropped too.
    pub async fn close(self) {
        drop(self.handle);
        if let Err(e) = self.worker.await {
            error!(error = %e, "session worker ended abnormally");
        }
    }
}

impl SessionHandle {
    pub fn submit(&self, env: Envelope) -> bool {
        if self.tx.send(env).is_err() {
            debug!("session closed, envelope dropped");
            return false;
        }
        true
    }

    /// Decode a raw frame and queue it. Malformed input is logged and dropped.
    pub fn submit_text(&self, raw: &str) -> bool {
        match Envelope::from_json(raw) {
            Ok(env) => self.submit(env),
            Err(e) => {
                error!(error = %e, "dropping malformed envelope");
                false
            }
        }
    }
}
