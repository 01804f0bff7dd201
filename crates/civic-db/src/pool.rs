//! Connection pool setup and health snapshots.

use std::str::FromStr;
use std::time::{Duration, Instant};

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{debug, info, warn};

use civic_core::{Error, Result};

/// Pool sizing and timeouts.
///
/// Every field can be overridden from the environment, see [`PoolConfig::from_env`].
#[derive(Debug, Clone, PartialEq)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    /// How long a request waits for a free connection.
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    /// `None` keeps connections until they fail.
    pub max_lifetime: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            max_lifetime: Some(Duration::from_secs(1800)),
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

impl PoolConfig {
    /// Read the `DATABASE_*` pool variables, keeping defaults for anything
    /// unset or unparseable.
    ///
    /// `DATABASE_MAX_LIFETIME=0` disables connection recycling.
    pub fn from_env() -> Self {
        let base = Self::default();
        let max_lifetime = match env_parse::<u64>("DATABASE_MAX_LIFETIME") {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => base.max_lifetime,
        };
        Self {
            max_connections: env_parse("DATABASE_MAX_CONNECTIONS").unwrap_or(base.max_connections),
            min_connections: env_parse("DATABASE_MIN_CONNECTIONS").unwrap_or(base.min_connections),
            acquire_timeout: env_parse("DATABASE_CONNECT_TIMEOUT")
                .map(Duration::from_secs)
                .unwrap_or(base.acquire_timeout),
            idle_timeout: env_parse("DATABASE_IDLE_TIMEOUT")
                .map(Duration::from_secs)
                .unwrap_or(base.idle_timeout),
            max_lifetime,
        }
    }

    fn options(&self) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections.min(self.max_connections))
            .acquire_timeout(self.acquire_timeout)
            .idle_timeout(self.idle_timeout)
            .max_lifetime(self.max_lifetime)
    }
}

/// Open a PostgreSQL pool.
pub async fn create_pool(database_url: &str, config: PoolConfig) -> Result<PgPool> {
    let start = Instant::now();
    let pool = config
        .options()
        .connect(database_url)
        .await
        .map_err(Error::Database)?;

    info!(
        subsystem = "db",
        component = "pool",
        op = "connect",
        max_connections = config.max_connections,
        pool_size = pool.size(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Database pool ready"
    );
    Ok(pool)
}

/// Point-in-time pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub size: u32,
    pub idle: usize,
}

impl PoolStats {
    pub fn of(pool: &PgPool) -> Self {
        Self {
            size: pool.size(),
            idle: pool.num_idle(),
        }
    }

    /// Every open connection is checked out.
    pub fn is_saturated(&self) -> bool {
        self.size > 0 && self.idle == 0
    }

    pub fn log(&self) {
        debug!(
            subsystem = "db",
            component = "pool",
            op = "stats",
            pool_size = self.size,
            pool_idle = self.idle,
            "Pool stats"
        );
        if self.is_saturated() {
            warn!(
                subsystem = "db",
                component = "pool",
                pool_size = self.size,
                "Connection pool has no idle connections"
            );
        }
    }
}
