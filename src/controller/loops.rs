//! The four background loops.
//!
//! Each loop is an interval ticker racing a shutdown signal. Loop bodies
//! never bubble an error out — a failed pass is logged, counted, and waited
//! out until the next tick. Only the controller decides anything beyond
//! "retry, wait, or log and continue".

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context as _, Result};
use chrono::Utc;
use tokio::sync::watch;
use tokio::time::{interval, interval_at, Duration};
use tracing::{debug, info, warn};

use crate::gitea::GiteaError;
use crate::metrics::{SyncStatus, SyncType};
use crate::resolver;
use crate::AppContext;

// ─── Full reconcile ──────────────────────────────────────────────────────────

pub async fn run_reconcile_loop(ctx: Arc<AppContext>, mut shutdown: watch::Receiver<bool>) {
    let warmup = Duration::from_secs(ctx.config.sync.reconcile_warmup_secs);
    let period = Duration::from_secs(ctx.config.sync.reconcile_interval_secs);
    let mut ticker = interval_at(tokio::time::Instant::now() + warmup, period);

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {
                ctx.metrics.inc(SyncType::Reconcile, SyncStatus::Received);
                let started = Instant::now();
                let outcome = full_reconcile_pass(&ctx).await;
                ctx.metrics.observe_duration(SyncType::Reconcile, started.elapsed());

                match outcome {
                    Ok(failed_users) => {
                        let status = if failed_users == 0 {
                            SyncStatus::Success
                        } else {
                            SyncStatus::Partial
                        };
                        ctx.metrics.inc(SyncType::Reconcile, status);
                        // Per-user failures don't block the timestamp; only a
                        // pass that never reached both systems does.
                        let now = Utc::now();
                        ctx.record_reconcile_success(now).await;
                        if let Err(e) = ctx.persist_state().await {
                            warn!(err = %e, "persisting state after reconcile failed");
                        }
                        info!(failed_users, "full reconcile pass finished");
                    }
                    Err(e) => {
                        ctx.metrics.inc(SyncType::Reconcile, SyncStatus::Error);
                        warn!(err = %e, "full reconcile pass aborted");
                    }
                }
            }
        }
    }
    info!("reconcile loop stopped");
}

/// One full pass: principals first, then per-user repository mirroring, so a
/// user created in this pass already exists before anything references it.
/// Returns the number of users that failed individually.
async fn full_reconcile_pass(ctx: &AppContext) -> Result<usize> {
    let users = ctx
        .directory
        .list_users()
        .await
        .context("listing directory users")?;
    info!(users = users.len(), "full reconcile pass started");

    let mut failed = 0usize;
    for user in &users {
        if let Err(e) = ctx.user_sync.ensure_user(&user.uid, user.mail.as_deref()).await {
            warn!(uid = %user.uid, err = %e, "user materialization failed");
            failed += 1;
        }
    }

    for user in &users {
        ctx.metrics.inc(SyncType::UserSync, SyncStatus::Received);
        let started = Instant::now();
        let result = ctx.user_sync.mirror_user_repos(&user.uid).await;
        ctx.metrics.observe_duration(SyncType::UserSync, started.elapsed());
        match result {
            Ok(count) => {
                ctx.metrics.inc(SyncType::UserSync, SyncStatus::Success);
                debug!(uid = %user.uid, repos = count, "user repositories mirrored");
            }
            Err(e) => {
                ctx.metrics.inc(SyncType::UserSync, SyncStatus::Error);
                warn!(uid = %user.uid, err = %e, "user repository mirror failed");
                failed += 1;
            }
        }
    }

    Ok(failed)
}

// ─── Webhook self-registration ───────────────────────────────────────────────

pub async fn run_webhook_registration_loop(
    ctx: Arc<AppContext>,
    mut shutdown: watch::Receiver<bool>,
) {
    if ctx.config.webhook.public_url.is_empty() {
        info!("webhook self-registration disabled — no public url configured");
        return;
    }
    let mut ticker = interval(Duration::from_secs(ctx.config.sync.webhook_check_interval_secs));

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {
                match ensure_webhook(&ctx).await {
                    Ok(true) => info!(url = %ctx.config.webhook.public_url, "org webhook registered"),
                    Ok(false) => debug!("org webhook present"),
                    Err(e) => warn!(err = %e, "webhook registration check failed"),
                }
            }
        }
    }
    info!("webhook registration loop stopped");
}

/// Create the org hook pointing at us unless one already exists for the
/// exact target URL. Returns `true` when a hook was created.
async fn ensure_webhook(ctx: &AppContext) -> Result<bool, GiteaError> {
    let org = &ctx.config.gitea.org;
    let url = &ctx.config.webhook.public_url;
    let hooks = ctx.gitea.list_org_hooks(org).await?;
    if hooks.iter().any(|h| h.config.url == *url) {
        return Ok(false);
    }
    ctx.gitea
        .create_org_hook(org, url, &ctx.config.webhook.secret)
        .await?;
    Ok(true)
}

// ─── Retry drain ─────────────────────────────────────────────────────────────

pub async fn run_retry_loop(ctx: Arc<AppContext>, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = interval(Duration::from_secs(ctx.config.sync.retry_tick_secs));

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {
                let ready = ctx.retry_queue.drain_ready(Utc::now()).await;
                if ready.is_empty() {
                    continue;
                }
                for item in ready {
                    ctx.metrics.inc(SyncType::Retry, SyncStatus::Received);
                    let started = Instant::now();
                    let result = ctx.user_sync.mirror_user_repos(&item.uid).await;
                    ctx.metrics.observe_duration(SyncType::Retry, started.elapsed());
                    match result {
                        Ok(count) => {
                            ctx.metrics.inc(SyncType::Retry, SyncStatus::Success);
                            info!(uid = %item.uid, attempts = item.attempts, repos = count, "retry succeeded");
                        }
                        Err(e) => {
                            ctx.metrics.inc(SyncType::Retry, SyncStatus::Error);
                            warn!(uid = %item.uid, attempts = item.attempts, err = %e, "retry failed");
                            ctx.retry_queue.reenqueue(&item.uid, item.attempts + 1).await;
                        }
                    }
                }
                if let Err(e) = ctx.persist_state().await {
                    warn!(err = %e, "persisting state after retry drain failed");
                }
            }
        }
    }
    info!("retry loop stopped");
}

// ─── Group / department sync ─────────────────────────────────────────────────

pub async fn run_group_sync_loop(ctx: Arc<AppContext>, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = interval(Duration::from_secs(ctx.config.sync.group_sync_interval_secs));

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {
                if let Err(e) = group_sync_pass(&ctx).await {
                    warn!(err = %e, "group sync pass aborted");
                }
            }
        }
    }
    info!("group sync loop stopped");
}

/// Sync every department and group that has at least one repository
/// assigned. Departments and plain groups resolve directly; groups in the
/// collab registry resolve through their base department, correcting the
/// directory-side member cache on the way.
async fn group_sync_pass(ctx: &AppContext) -> Result<()> {
    let departments = ctx
        .directory
        .list_departments()
        .await
        .context("listing departments")?;
    let groups = ctx.directory.list_groups().await.context("listing groups")?;

    for dept in departments.iter().filter(|d| !d.repositories.is_empty()) {
        let resolved = resolver::resolve_department(dept);
        sync_one_team(ctx, &dept.name, &resolved).await;
    }

    for group in groups.iter().filter(|g| !g.repositories.is_empty()) {
        if let Some(meta) = ctx.collab.get(&group.name).await {
            let dept = match ctx.directory.get_department(&meta.base_department).await {
                Ok(d) => d,
                Err(e) => {
                    warn!(
                        group = %group.name,
                        base = %meta.base_department,
                        err = %e,
                        "base department unavailable — skipping collab group"
                    );
                    ctx.metrics.inc(SyncType::GroupSync, SyncStatus::Error);
                    continue;
                }
            };
            let res = resolver::resolve_collab(&meta, &dept, group);
            // Directory-side correction first, so both systems converge in
            // the same pass.
            for uid in &res.to_add {
                if let Err(e) = ctx.directory.add_user_to_group(&group.name, uid).await {
                    warn!(group = %group.name, uid = %uid, err = %e, "collab member add failed");
                }
            }
            for uid in &res.to_remove {
                if let Err(e) = ctx.directory.remove_user_from_group(&group.name, uid).await {
                    warn!(group = %group.name, uid = %uid, err = %e, "collab member remove failed");
                }
            }
            sync_one_team(ctx, &group.name, &res.membership).await;
        } else {
            let resolved = resolver::resolve_group(group);
            sync_one_team(ctx, &group.name, &resolved).await;
        }
    }

    Ok(())
}

async fn sync_one_team(ctx: &AppContext, name: &str, resolved: &resolver::ResolvedMembership) {
    ctx.metrics.inc(SyncType::GroupSync, SyncStatus::Received);
    let started = Instant::now();
    let outcome = ctx
        .teams
        .sync_team(
            &ctx.config.gitea.org,
            name,
            &ctx.config.sync.team_permission,
            resolved,
        )
        .await;
    ctx.metrics.observe_duration(SyncType::GroupSync, started.elapsed());

    match outcome {
        Ok(result) if result.is_partial() => {
            ctx.metrics.inc(SyncType::GroupSync, SyncStatus::Partial);
            warn!(
                team = %result.team.name,
                members_added = result.members_added,
                members_failed = result.members_failed,
                repos_added = result.repositories_added,
                repos_failed = result.repositories_failed,
                errors = result.errors.len(),
                "team sync finished with errors"
            );
        }
        Ok(result) => {
            ctx.metrics.inc(SyncType::GroupSync, SyncStatus::Success);
            debug!(
                team = %result.team.name,
                members_added = result.members_added,
                repos_added = result.repositories_added,
                "team sync finished"
            );
        }
        Err(e) => {
            ctx.metrics.inc(SyncType::GroupSync, SyncStatus::Error);
            warn!(team = name, err = %e, "team sync aborted");
        }
    }
}
