use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::error::{Result, SystemError};

pub const DEFAULT_HOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Work that has to finish before the process may exit.
#[async_trait]
pub trait ShutdownHook: Send + Sync {
    async fn on_shutdown(&self);
}

/// Owns the "are we quitting" decision for the whole application and runs
/// the registered hooks exactly once.
pub struct AppLifecycle {
    quitting: AtomicBool,
    hooks: Mutex<Vec<Arc<dyn ShutdownHook>>>,
    hook_timeout: Duration,
}

impl AppLifecycle {
    pub fn new(hook_timeout: Duration) -> Self {
        AppLifecycle {
            quitting: AtomicBool::new(false),
            hooks: Mutex::new(Vec::new()),
            hook_timeout,
        }
    }

    pub fn register(&self, hook: Arc<dyn ShutdownHook>) -> Result<()> {
        self.hooks
            .lock()
            .map_err(|_| SystemError::MutexPoisoned("lifecycle hooks".to_string()))?
            .push(hook);
        Ok(())
    }

    pub fn is_quitting(&self) -> bool {
        self.quitting.load(Ordering::SeqCst)
    }

    /// Runs every hook, each bounded by the hook timeout. Returns `false`
    /// without doing anything if an exit is already under way.
    pub async fn request_exit(&self) -> bool {
        if self.quitting.swap(true, Ordering::SeqCst) {
            return false;
        }

        let hooks = match self.hooks.lock() {
            Ok(mut hooks) => std::mem::take(&mut *hooks),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };

        info!(hooks = hooks.len(), "running shutdown hooks");
        for hook in hooks {
            if timeout(self.hook_timeout, hook.on_shutdown()).await.is_err() {
                warn!(
                    seconds = self.hook_timeout.as_secs(),
                    "shutdown hook timed out, exiting anyway"
                );
            }
        }
        true
    }
}

impl Default for AppLifecycle {
    fn default() -> Self {
        Self::new(DEFAULT_HOOK_TIMEOUT)
    }
}
