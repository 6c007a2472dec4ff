//! Subcommand handlers

use crate::config::AppConfig;
use anyhow::{bail, Context as _, Result};
use omega_model::AppState;
use omega_session::{AccessRoute, Session, SessionGate, SessionStore};
use omega_store::{
    ConnectivityProbe, ConnectivityStatus, DisabledRemoteStore, FileBackend, FixedProbe,
    HttpProbe, HttpRemoteStore, KeyValueBackend, LocalCache, LocalEntry, MemoryRemoteStore,
    RemoteStore,
};
use omega_sync::{StateSyncEngine, SyncIndicator, SyncSnapshot};
use std::sync::Arc;
use tracing::{info, warn};

/// Wiring shared by every subcommand
pub(crate) struct Context {
    config: AppConfig,
    backend: Arc<dyn KeyValueBackend>,
    remote: Arc<dyn RemoteStore>,
    probe: Arc<dyn ConnectivityProbe>,
}

impl Context {
    /// Pick stores from the config
    ///
    /// `memory_remote` stands in an in-process remote when no endpoint is
    /// configured, which keeps the full sync path usable offline.
    pub(crate) fn new(config: AppConfig, memory_remote: bool) -> Result<Self> {
        let backend: Arc<dyn KeyValueBackend> = Arc::new(FileBackend::new(&config.data_dir));

        let (remote, probe): (Arc<dyn RemoteStore>, Arc<dyn ConnectivityProbe>) =
            if config.remote.is_configured() {
                let store = HttpRemoteStore::new(config.remote.clone())
                    .context("failed to build remote client")?;
                let probe = HttpProbe::new(config.remote.clone())
                    .context("failed to build connectivity probe")?;
                (Arc::new(store), Arc::new(probe))
            } else if memory_remote {
                info!("using in-process remote");
                (
                    Arc::new(MemoryRemoteStore::new()),
                    Arc::new(FixedProbe(ConnectivityStatus::Connected)),
                )
            } else {
                warn!("no remote endpoint configured; working local-only");
                let probe = HttpProbe::new(config.remote.clone())
                    .context("failed to build connectivity probe")?;
                (Arc::new(DisabledRemoteStore), Arc::new(probe))
            };

        Ok(Self {
            config,
            backend,
            remote,
            probe,
        })
    }

    async fn engine(&self) -> StateSyncEngine {
        StateSyncEngine::start(
            self.config.sync.clone(),
            LocalCache::app_state(Arc::clone(&self.backend)),
            LocalEntry::sync_meta(Arc::clone(&self.backend)),
            Arc::clone(&self.remote),
            Arc::clone(&self.probe),
            &self.config.seed,
        )
        .await
    }

    fn gate(&self) -> SessionGate {
        SessionGate::new(self.config.credentials.clone()).with_remote(Arc::clone(&self.remote))
    }

    fn sessions(&self) -> SessionStore {
        SessionStore::new(Arc::clone(&self.backend))
    }
}

fn print_status(snapshot: &SyncSnapshot) {
    println!("sync:         {:?} ({:?})", snapshot.indicator(), snapshot.state);
    println!("connectivity: {}", snapshot.connectivity);
    if let Some(revision) = snapshot.remote_revision {
        println!("revision:     {revision}");
    }
    if let Some(at) = snapshot.last_synced_at {
        println!("last synced:  {}", at.to_rfc3339());
    }
    if let Some(conflict) = &snapshot.conflict {
        println!(
            "conflict:     {:?} (base {:?}, found {:?})",
            conflict.outcome, conflict.base, conflict.found
        );
    }
    if snapshot.indicator() != SyncIndicator::Synced {
        println!("hint:         {}", snapshot.guidance());
    }
    if let Some(error) = &snapshot.last_error {
        println!("last error:   {error}");
    }
    if let Some(error) = &snapshot.local_cache_error {
        println!("local cache:  {error}");
    }
}

fn print_summary(state: &AppState) {
    let active = state.team.iter().filter(|u| u.is_active).count();
    println!(
        "team:         {} members ({active} active), {} roles",
        state.team.len(),
        state.available_roles.len()
    );
    println!("months:       {}", state.db.len());
}

/// `omega probe`
pub(crate) async fn probe(ctx: &Context) -> Result<()> {
    let report = ctx.probe.probe().await;
    println!("{}", report.status);
    if let Some(message) = &report.message {
        println!("{message}");
    }
    println!("{}", report.status.guidance());
    Ok(())
}

/// `omega pull`
pub(crate) async fn pull(ctx: &Context) -> Result<()> {
    let engine = ctx.engine().await;
    print_summary(&engine.state());
    print_status(&engine.snapshot());
    engine.shutdown().await;
    Ok(())
}

/// `omega push`
pub(crate) async fn push(ctx: &Context) -> Result<()> {
    let engine = ctx.engine().await;
    let result = engine.flush_now().await;
    print_status(&engine.snapshot());
    engine.shutdown().await;
    result.context("push failed")
}

/// `omega team`
pub(crate) async fn team(ctx: &Context) -> Result<()> {
    let engine = ctx.engine().await;
    engine.read(|state| {
        for user in &state.team {
            println!(
                "{:<24} {:<32} {:<16} {}",
                user.name,
                user.email,
                user.role,
                if user.is_active { "active" } else { "inactive" }
            );
        }
    });
    engine.shutdown().await;
    Ok(())
}

/// Arguments of `omega login`
#[derive(Debug, Clone, Default)]
pub(crate) struct LoginArgs {
    pub(crate) email: String,
    pub(crate) password: Option<String>,
    pub(crate) confirm: Option<String>,
    pub(crate) reset: bool,
}

/// `omega login`
pub(crate) async fn login(ctx: &Context, args: LoginArgs) -> Result<()> {
    let engine = ctx.engine().await;
    let result = login_with(ctx, &engine, args).await;
    engine.shutdown().await;

    let session = result?;
    ctx.sessions().save(&session);
    if let Some(error) = ctx.sessions().last_error() {
        warn!(error = %error, "session not persisted");
    }
    println!("signed in as {} <{}> ({})", session.name, session.email, session.role);
    Ok(())
}

async fn login_with(ctx: &Context, engine: &StateSyncEngine, args: LoginArgs) -> Result<Session> {
    let gate = ctx.gate();
    let team = engine.read(|s| s.team.clone());
    let identity = if args.reset {
        gate.begin_reset(&team, &args.email).await
    } else {
        gate.resolve_identity(&team, &args.email).await
    }
    .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    let Some(password) = args.password else {
        bail!("--password is required");
    };

    match identity.route {
        AccessRoute::Authenticate => gate
            .authenticate(&identity.user, &password)
            .map_err(|e| anyhow::anyhow!(e.user_message())),
        AccessRoute::Bootstrap | AccessRoute::Reset => {
            let confirm = args.confirm.unwrap_or_else(|| password.clone());
            let (updated, session) = gate
                .bootstrap_password(&identity.user, &password, &confirm)
                .map_err(|e| anyhow::anyhow!(e.user_message()))?;
            engine
                .try_update(|state| {
                    if state.user(&updated.id).is_some() {
                        state.replace_user(updated)
                    } else {
                        // member only known to the shared roster
                        state.team.push(updated);
                        Ok(())
                    }
                })
                .context("failed to store credential")?;
            if let Err(e) = engine.flush_now().await {
                warn!(error = %e, "credential saved locally; push will be retried");
            }
            Ok(session)
        }
    }
}

/// `omega logout`
pub(crate) fn logout(ctx: &Context) {
    let sessions = ctx.sessions();
    match sessions.load() {
        Some(session) => {
            sessions.clear();
            println!("signed out {}", session.email);
        }
        None => println!("not signed in"),
    }
}

/// `omega whoami`
pub(crate) async fn whoami(ctx: &Context) -> Result<()> {
    let sessions = ctx.sessions();
    let Some(session) = sessions.load() else {
        println!("not signed in");
        return Ok(());
    };

    let engine = ctx.engine().await;
    let team = engine.read(|s| s.team.clone());
    engine.shutdown().await;

    if let Err(e) = ctx.gate().revalidate(&session, &team) {
        sessions.clear();
        bail!(e.user_message());
    }
    println!(
        "{} <{}> ({}) since {}",
        session.name,
        session.email,
        session.role,
        session.started_at.to_rfc3339()
    );
    Ok(())
}
