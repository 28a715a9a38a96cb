//! Component registry, supervisor and the shared poll timer.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::error::{Result, SyncError};
use crate::importer::Importer;
use crate::remote::RemoteCacheSweeper;

pub const IMPORTER: &str = "importer";
pub const REMOTE_CACHE: &str = "remote_cache";

/// What a running component receives from the supervisor.
pub struct ComponentContext {
    pub cancel: CancellationToken,
    pub config: watch::Receiver<Arc<AppConfig>>,
}

/// A long-running loop owned by the [`Supervisor`].
#[async_trait]
pub trait Component: Send {
    fn id(&self) -> &'static str;

    /// Runs until `ctx.cancel` fires. Per-cycle failures are logged by the
    /// component itself; an `Err` here means the component gave up.
    async fn run(self: Box<Self>, ctx: ComponentContext) -> Result<()>;
}

pub type ComponentFactory = fn(&AppConfig, DbPool) -> Result<Option<Box<dyn Component>>>;

fn build_importer(config: &AppConfig, pool: DbPool) -> Result<Option<Box<dyn Component>>> {
    if !config.importer.enabled {
        return Ok(None);
    }
    Ok(Some(Box::new(Importer::new(pool))))
}

fn build_remote_cache(config: &AppConfig, pool: DbPool) -> Result<Option<Box<dyn Component>>> {
    if !config.remote.enabled {
        return Ok(None);
    }
    Ok(Some(Box::new(RemoteCacheSweeper::new(pool, &config.remote)?)))
}

static REGISTRY: Lazy<BTreeMap<&'static str, ComponentFactory>> = Lazy::new(|| {
    let mut registry: BTreeMap<&'static str, ComponentFactory> = BTreeMap::new();
    registry.insert(IMPORTER, build_importer);
    registry.insert(REMOTE_CACHE, build_remote_cache);
    registry
});

/// Ids of the components `config` enables, in registry order.
pub fn enabled_components(config: &AppConfig) -> Vec<&'static str> {
    REGISTRY
        .keys()
        .copied()
        .filter(|id| match *id {
            IMPORTER => config.importer.enabled,
            REMOTE_CACHE => config.remote.enabled,
            _ => false,
        })
        .collect()
}

struct Running {
    id: &'static str,
    cancel: CancellationToken,
    handle: JoinHandle<Result<()>>,
}

/// Starts, stops and reconfigures the registered components.
pub struct Supervisor {
    pool: DbPool,
    root: CancellationToken,
    config: watch::Sender<Arc<AppConfig>>,
    running: Vec<Running>,
}

impl Supervisor {
    pub fn new(pool: DbPool, config: AppConfig, root: CancellationToken) -> Self {
        let (config, _) = watch::channel(Arc::new(config));
        Self {
            pool,
            root,
            config,
            running: Vec::new(),
        }
    }

    pub fn active(&self) -> Vec<&'static str> {
        self.running.iter().map(|running| running.id).collect()
    }

    /// Builds every enabled component and spawns it on its own task.
    pub fn start(&mut self) -> Result<()> {
        if !self.running.is_empty() {
            return Err(SyncError::Config("supervisor already started".into()));
        }

        let config = self.config.borrow().clone();
        let mut built = Vec::new();
        for (id, factory) in REGISTRY.iter() {
            if let Some(component) = factory(&config, self.pool.clone())? {
                built.push((*id, component));
            }
        }

        for (id, component) in built {
            let cancel = self.root.child_token();
            let ctx = ComponentContext {
                cancel: cancel.clone(),
                config: self.config.subscribe(),
            };
            let handle = tokio::spawn(async move { component.run(ctx).await });
            info!(component = id, "component started");
            self.running.push(Running { id, cancel, handle });
        }

        if self.running.is_empty() {
            warn!("no components enabled");
        }
        Ok(())
    }

    /// Cancels every component and waits for it to finish its current cycle.
    pub async fn stop(&mut self) {
        for running in &self.running {
            running.cancel.cancel();
        }
        for running in self.running.drain(..) {
            match running.handle.await {
                Ok(Ok(())) => info!(component = running.id, "component stopped"),
                Ok(Err(err)) => error!(component = running.id, error = %err, "component failed"),
                Err(err) => error!(component = running.id, error = %err, "component task panicked"),
            }
        }
    }

    /// Publishes `config` to the running components. The set of components
    /// is rebuilt only when it would change.
    pub async fn reload(&mut self, config: AppConfig) -> Result<()> {
        config.validate()?;

        let wanted = enabled_components(&config);
        let same_set = wanted == self.active();
        self.config.send_replace(Arc::new(config));

        if same_set {
            info!(components = ?wanted, "configuration reloaded in place");
            return Ok(());
        }

        info!(components = ?wanted, "component set changed; restarting");
        self.stop().await;
        self.start()
    }
}

/// A periodic timer whose period can follow configuration changes.
///
/// The first tick completes immediately. Changing the period restarts the
/// schedule so the next tick lands one new period from now.
pub struct PollTimer {
    period: Duration,
    interval: Interval,
}

impl PollTimer {
    pub fn new(period: Duration) -> Self {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { period, interval }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Returns `true` when the schedule was reset.
    pub fn set_period(&mut self, period: Duration) -> bool {
        if period == self.period {
            return false;
        }
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.interval = interval;
        self.period = period;
        true
    }

    pub async fn tick(&mut self) {
        self.interval.tick().await;
    }
}
