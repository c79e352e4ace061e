//! The tunnel session state machine.
//!
//! `Disconnected -> Connecting -> Connected -> Disconnected`. One controller
//! owns the one session; observers read snapshots or subscribe to the status
//! stream and never mutate anything directly.

use std::sync::{
    Arc, Mutex, MutexGuard,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard, broadcast};
use tracing::{debug, info, warn};

use crate::{
    error::{ConfigurationError, Error, ExecutionError, Result, SessionError, SystemError},
    executor::CommandExecutor,
    lifecycle::ShutdownHook,
    platform::Platform,
    profile::TunnelProfile,
    resolver::{CommandResolver, TunnelLocation},
    settings::{ConnectionSettings, SettingsPatch},
    tunnel::{ConnectionState, TunnelSession, VpnStatus},
    wireguard::{render_config, validate_config, write_config},
};

const STATUS_CHANNEL_CAPACITY: usize = 64;

/// Exclusive right to run a tunnel command. Sets the published busy flag
/// while held.
struct BusyGuard<'a> {
    flag: &'a AtomicBool,
    _permit: AsyncMutexGuard<'a, ()>,
}

impl<'a> BusyGuard<'a> {
    /// Fails with [`SessionError::Busy`] when another call holds the guard.
    fn acquire(operation: &'a AsyncMutex<()>, flag: &'a AtomicBool) -> Result<Self> {
        let permit = operation.try_lock().map_err(|_| SessionError::Busy)?;
        Ok(Self::hold(permit, flag))
    }

    /// Waits for the call in flight, if any, to finish.
    async fn wait(operation: &'a AsyncMutex<()>, flag: &'a AtomicBool) -> Self {
        let permit = operation.lock().await;
        Self::hold(permit, flag)
    }

    fn hold(permit: AsyncMutexGuard<'a, ()>, flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        BusyGuard {
            flag,
            _permit: permit,
        }
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

pub struct SessionController {
    executor: Arc<dyn CommandExecutor>,
    resolver: CommandResolver,
    platform: Platform,
    tunnel: TunnelLocation,
    profile: Mutex<Option<TunnelProfile>>,
    settings: Mutex<ConnectionSettings>,
    session: Mutex<TunnelSession>,
    operation: AsyncMutex<()>,
    busy: AtomicBool,
    status_sender: broadcast::Sender<VpnStatus>,
}

impl SessionController {
    pub fn new(
        executor: Arc<dyn CommandExecutor>,
        resolver: CommandResolver,
        platform: Platform,
        tunnel: TunnelLocation,
    ) -> Self {
        let (status_sender, _) = broadcast::channel(STATUS_CHANNEL_CAPACITY);
        SessionController {
            executor,
            resolver,
            platform,
            tunnel,
            profile: Mutex::new(None),
            settings: Mutex::new(ConnectionSettings::default()),
            session: Mutex::new(TunnelSession::default()),
            operation: AsyncMutex::new(()),
            busy: AtomicBool::new(false),
            status_sender,
        }
    }

    pub fn with_profile(self, profile: TunnelProfile) -> Self {
        if let Ok(mut current) = self.profile.lock() {
            *current = Some(profile);
        }
        self
    }

    pub fn with_settings(self, settings: ConnectionSettings) -> Self {
        if let Ok(mut current) = self.settings.lock() {
            *current = settings;
        }
        self
    }

    pub fn tunnel(&self) -> &TunnelLocation {
        &self.tunnel
    }

    pub fn status(&self) -> VpnStatus {
        let session = match self.session.lock() {
            Ok(session) => session.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        self.snapshot(&session)
    }

    /// Status changes in the order they happened. Late subscribers should
    /// call [`SessionController::status`] first.
    pub fn subscribe(&self) -> broadcast::Receiver<VpnStatus> {
        self.status_sender.subscribe()
    }

    pub fn settings(&self) -> Result<ConnectionSettings> {
        Ok(self.lock_settings()?.clone())
    }

    /// Merges `patch` into the current settings. Takes effect on the next
    /// connect.
    pub fn update_settings(&self, patch: &SettingsPatch) -> Result<ConnectionSettings> {
        let mut settings = self.lock_settings()?;
        let updated = settings.apply(patch)?;
        *settings = updated.clone();
        info!(
            mtu = updated.mtu,
            dns_mode = %updated.dns_mode,
            "connection settings updated"
        );
        Ok(updated)
    }

    pub fn profile(&self) -> Result<Option<TunnelProfile>> {
        Ok(self.lock_profile()?.clone())
    }

    pub fn select_profile(&self, profile: TunnelProfile) -> Result<()> {
        info!(profile = %profile.id, "profile selected");
        *self.lock_profile()? = Some(profile);
        Ok(())
    }

    /// Brings the tunnel up.
    ///
    /// Returns `Ok(Disconnected)` when the user declined the elevation
    /// prompt.
    pub async fn connect(&self) -> Result<ConnectionState> {
        let profile = self
            .lock_profile()?
            .clone()
            .ok_or(ConfigurationError::NoProfileSelected)?;

        let busy = BusyGuard::acquire(&self.operation, &self.busy)?;
        {
            let mut session = self.lock_session()?;
            if session.status.is_connected() {
                return Err(SessionError::AlreadyConnected.into());
            }
            session.status = ConnectionState::Connecting;
            session.last_error = None;
            self.publish(&session);
        }

        info!(profile = %profile.id, tunnel = %self.tunnel.name, "connecting");
        let outcome = self.bring_up(&profile).await;

        let (state, visible_error, result) = match outcome {
            Ok(()) => {
                info!(tunnel = %self.tunnel.name, "connected");
                (ConnectionState::Connected, None, Ok(ConnectionState::Connected))
            }
            Err(Error::Execution(ExecutionError::Denied { .. })) => {
                info!("elevation declined, staying disconnected");
                (
                    ConnectionState::Disconnected,
                    None,
                    Ok(ConnectionState::Disconnected),
                )
            }
            Err(error) if error.is_user_visible() => {
                warn!(%error, "connect failed");
                (
                    ConnectionState::Disconnected,
                    Some(format!("connection failed: {error}")),
                    Err(error),
                )
            }
            Err(error) => {
                warn!(%error, "connect failed");
                (ConnectionState::Disconnected, None, Err(error))
            }
        };

        self.finish(busy, state, visible_error)?;
        result
    }

    /// Brings the tunnel down. A failing `down` is logged and otherwise
    /// ignored; the session always ends up disconnected.
    pub async fn disconnect(&self) -> Result<ConnectionState> {
        let busy = BusyGuard::acquire(&self.operation, &self.busy)?;

        info!(tunnel = %self.tunnel.name, "disconnecting");
        match self.resolver.resolve(&self.platform, &self.tunnel) {
            Ok(commands) => {
                if let Err(error) = self.executor.run(&commands.down).await {
                    warn!(%error, "tunnel down failed, assuming it is already down");
                }
            }
            Err(error) => warn!(%error, "cannot resolve tunnel down command"),
        }

        self.finish(busy, ConnectionState::Disconnected, None)?;
        Ok(ConnectionState::Disconnected)
    }

    /// Connects when disconnected, disconnects otherwise.
    pub async fn toggle(&self) -> Result<ConnectionState> {
        match self.status().connection_state {
            ConnectionState::Disconnected => self.connect().await,
            ConnectionState::Connecting | ConnectionState::Connected => self.disconnect().await,
        }
    }

    /// Makes one best-effort attempt to bring a live tunnel down before the
    /// process exits.
    ///
    /// A connect still waiting on the elevation prompt is allowed to finish
    /// first, so its `up` cannot land after the `down`. The guard is kept
    /// until the final state is recorded. Callers bound the wait.
    pub async fn shutdown(&self) -> Result<()> {
        let busy = match BusyGuard::acquire(&self.operation, &self.busy) {
            Ok(busy) => busy,
            Err(_) => {
                info!("waiting for the tunnel command in flight before exit");
                BusyGuard::wait(&self.operation, &self.busy).await
            }
        };

        if self.lock_session()?.status == ConnectionState::Disconnected {
            debug!("no tunnel to tear down on exit");
            return Ok(());
        }

        info!(tunnel = %self.tunnel.name, "bringing tunnel down before exit");
        match self.resolver.resolve(&self.platform, &self.tunnel) {
            Ok(commands) => {
                if let Err(error) = self.executor.run(&commands.down).await {
                    warn!(%error, "tunnel down on exit failed");
                }
            }
            Err(error) => warn!(%error, "cannot resolve tunnel down command on exit"),
        }

        self.finish(busy, ConnectionState::Disconnected, None)
    }

    async fn bring_up(&self, profile: &TunnelProfile) -> Result<()> {
        let settings = self.settings()?;
        let rendered = render_config(&profile.config_template, &settings);
        validate_config(&rendered)?;
        write_config(&self.tunnel.config_path, &rendered).await?;

        let commands = self.resolver.resolve(&self.platform, &self.tunnel)?;
        match self.executor.run(&commands.up).await {
            Ok(_) => Ok(()),
            Err(ExecutionError::AlreadyExists { output }) => {
                warn!(%output, "tunnel already exists, tearing it down and retrying once");
                if let Err(error) = self.executor.run(&commands.down).await {
                    debug!(%error, "cleanup before retry failed");
                }
                match self.executor.run(&commands.up).await {
                    Ok(_) => Ok(()),
                    Err(denied @ ExecutionError::Denied { .. }) => Err(denied.into()),
                    Err(error) => Err(ExecutionError::Failed {
                        command: commands.up.to_string(),
                        output: error.output().to_string(),
                    }
                    .into()),
                }
            }
            Err(error) => Err(error.into()),
        }
    }

    /// Records the final state of a call, clears the busy flag and publishes,
    /// all under the session lock so observers never see them out of order.
    fn finish(
        &self,
        busy: BusyGuard<'_>,
        state: ConnectionState,
        last_error: Option<String>,
    ) -> Result<()> {
        let mut session = self.lock_session()?;
        session.status = state;
        session.last_error = last_error;
        drop(busy);
        self.publish(&session);
        Ok(())
    }

    fn publish(&self, session: &TunnelSession) {
        let status = self.snapshot(session);
        debug!(state = ?status.connection_state, "publishing status");
        // No receivers is fine.
        let _ = self.status_sender.send(status);
    }

    fn snapshot(&self, session: &TunnelSession) -> VpnStatus {
        VpnStatus {
            connection_state: session.status,
            is_busy: self.busy.load(Ordering::SeqCst),
            last_error_message: session.last_error.clone(),
        }
    }

    fn lock_session(&self) -> Result<MutexGuard<'_, TunnelSession>> {
        self.session
            .lock()
            .map_err(|_| SystemError::MutexPoisoned("session".to_string()).into())
    }

    fn lock_settings(&self) -> Result<MutexGuard<'_, ConnectionSettings>> {
        self.settings
            .lock()
            .map_err(|_| SystemError::MutexPoisoned("settings".to_string()).into())
    }

    fn lock_profile(&self) -> Result<MutexGuard<'_, Option<TunnelProfile>>> {
        self.profile
            .lock()
            .map_err(|_| SystemError::MutexPoisoned("profile".to_string()).into())
    }
}

#[async_trait]
impl ShutdownHook for SessionController {
    async fn on_shutdown(&self) {
        if let Err(error) = self.shutdown().await {
            warn!(%error, "tunnel cleanup on exit failed");
        }
    }
}
