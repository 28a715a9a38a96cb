//! Remote storefront catalog: HTTP client, local mirror and the sweeper loop.

pub mod cache;
pub mod client;
pub mod model;
pub mod sweeper;

use async_trait::async_trait;
use tracing::{error, info};

use crate::config::RemoteConfig;
use crate::db::DbPool;
use crate::error::{Result, SyncError};
use crate::runtime::{Component, ComponentContext, PollTimer, REMOTE_CACHE};

pub use client::CatalogClient;
pub use model::RemoteProduct;
pub use sweeper::{prime, sweep_once, SweepReport};

/// Periodic incremental sweeper, optionally priming the mirror once at start.
pub struct RemoteCacheSweeper {
    pool: DbPool,
    remote: RemoteConfig,
    client: CatalogClient,
}

impl RemoteCacheSweeper {
    pub fn new(pool: DbPool, remote: &RemoteConfig) -> Result<Self> {
        remote.validate()?;
        Ok(Self {
            pool,
            remote: remote.clone(),
            client: CatalogClient::new(remote)?,
        })
    }

    fn refresh(&mut self, remote: &RemoteConfig) {
        if &self.remote == remote {
            return;
        }
        match CatalogClient::new(remote) {
            Ok(client) => {
                self.client = client;
                self.remote = remote.clone();
                info!("remote client rebuilt from new configuration");
            }
            Err(err) => error!(error = %err, "keeping previous remote client"),
        }
    }
}

#[async_trait]
impl Component for RemoteCacheSweeper {
    fn id(&self) -> &'static str {
        REMOTE_CACHE
    }

    async fn run(mut self: Box<Self>, mut ctx: ComponentContext) -> Result<()> {
        if self.remote.prime_on_start {
            match prime(&self.pool, &self.client, &ctx.cancel).await {
                Ok(_) | Err(SyncError::Cancelled) => {}
                Err(err) => error!(error = %err, "remote cache prime failed"),
            }
        }

        let mut timer: Option<PollTimer> = None;
        loop {
            if ctx.cancel.is_cancelled() {
                break;
            }

            let config = ctx.config.borrow_and_update().clone();
            self.refresh(&config.remote);

            let Some(period) = self.remote.sweep_interval() else {
                if timer.take().is_some() {
                    info!("remote cache sweeper paused (interval <= 0)");
                }
                tokio::select! {
                    _ = ctx.cancel.cancelled() => break,
                    changed = ctx.config.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
                continue;
            };

            let timer = timer.get_or_insert_with(|| PollTimer::new(period));
            timer.set_period(period);
            tokio::select! {
                _ = ctx.cancel.cancelled() => break,
                _ = timer.tick() => {}
            }

            match sweep_once(&self.pool, &self.client, self.remote.lookback(), &ctx.cancel).await {
                Ok(_) => {}
                Err(SyncError::Cancelled) => break,
                Err(err) => error!(error = %err, "remote cache sweep failed; retrying next tick"),
            }
        }

        info!("remote cache sweeper stopped");
        Ok(())
    }
}
