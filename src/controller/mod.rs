// SPDX-License-Identifier: MIT
//! Daemon lifecycle: load state, launch the loops and the HTTP surface,
//! wait for a signal, join everything, persist.
//!
//! The final save happens strictly after every loop has exited, so nothing
//! can write to the state store behind the snapshot's back.

pub mod loops;

use std::sync::Arc;

use anyhow::{Context as _, Result};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::rest;
use crate::AppContext;

pub struct Controller;

impl Controller {
    /// Run until a shutdown signal arrives. Blocks the caller for the whole
    /// daemon lifetime.
    pub async fn run(ctx: Arc<AppContext>) -> Result<()> {
        let state = ctx.state_store.load().await.context("loading state")?;
        ctx.restore_state(state).await;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let server = tokio::spawn(rest::serve(ctx.clone(), {
            let mut rx = shutdown_rx.clone();
            async move {
                let _ = rx.changed().await;
            }
        }));

        let loop_handles = vec![
            tokio::spawn(loops::run_reconcile_loop(ctx.clone(), shutdown_rx.clone())),
            tokio::spawn(loops::run_webhook_registration_loop(
                ctx.clone(),
                shutdown_rx.clone(),
            )),
            tokio::spawn(loops::run_retry_loop(ctx.clone(), shutdown_rx.clone())),
            tokio::spawn(loops::run_group_sync_loop(ctx.clone(), shutdown_rx)),
        ];

        wait_for_signal().await;
        info!("shutdown signal received — stopping loops");
        let _ = shutdown_tx.send(true);

        for handle in loop_handles {
            if let Err(e) = handle.await {
                warn!(err = %e, "loop task panicked");
            }
        }
        match server.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(err = %e, "http server error"),
            Err(e) => warn!(err = %e, "http server task panicked"),
        }

        ctx.persist_state().await.context("final state save")?;
        info!("final state persisted");
        Ok(())
    }
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(_) => {
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.ok();
    }
}
