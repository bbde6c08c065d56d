use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

use crate::error::ConfigurationError;
use crate::models::database::DatabaseSpec;
use crate::models::deployment::{DeploymentStrategy, RollbackTrigger, TrafficShifting};
use crate::models::listener::LoadBalancerSpec;
use crate::models::service::ServiceSpec;

/// Top-level topology loaded from `topology.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct TopologyConfig {
    #[serde(default)]
    pub strategy: DeploymentStrategy,
    /// Source range allowed to reach non-exposed test listeners.
    #[serde(default = "default_vpc_cidr")]
    pub vpc_cidr: String,
    #[serde(default = "default_load_balancers")]
    pub load_balancers: Vec<LoadBalancerSpec>,
    pub services: Vec<ServiceSpec>,
    pub database: Option<DatabaseSpec>,
    #[serde(default)]
    pub deployment: DeploymentSettings,
}

fn default_vpc_cidr() -> String {
    "10.0.0.0/16".to_string()
}

fn default_load_balancers() -> Vec<LoadBalancerSpec> {
    vec![LoadBalancerSpec {
        name: crate::models::service::default_load_balancer(),
        internet_facing: true,
        port: 80,
        protocol: Default::default(),
    }]
}

/// Applied to every blue/green deployment group.
#[derive(Debug, Clone, Deserialize)]
pub struct DeploymentSettings {
    #[serde(default = "RollbackTrigger::all")]
    pub rollback_triggers: BTreeSet<RollbackTrigger>,
    #[serde(default = "default_termination_wait_minutes")]
    pub termination_wait_minutes: u64,
    #[serde(default)]
    pub traffic_shifting: TrafficShifting,
}

impl Default for DeploymentSettings {
    fn default() -> Self {
        Self {
            rollback_triggers: RollbackTrigger::all(),
            termination_wait_minutes: default_termination_wait_minutes(),
            traffic_shifting: TrafficShifting::AllAtOnce,
        }
    }
}

fn default_termination_wait_minutes() -> u64 {
    5
}

/// Longest wait before the replaced side is terminated (two days).
pub const MAX_TERMINATION_WAIT_MINUTES: u64 = 2880;

impl DeploymentSettings {
    pub fn termination_wait_secs(&self) -> Result<u64, ConfigurationError> {
        self.termination_wait_minutes
            .checked_mul(60)
            .filter(|_| self.termination_wait_minutes <= MAX_TERMINATION_WAIT_MINUTES)
            .ok_or_else(|| {
                ConfigurationError::invalid(
                    "deployment.termination_wait_minutes",
                    format!(
                        "{} minutes exceeds the maximum of {MAX_TERMINATION_WAIT_MINUTES}",
                        self.termination_wait_minutes
                    ),
                )
            })
    }
}

impl TopologyConfig {
    /// Load a topology from a TOML file. Unlike service settings there is
    /// no usable default topology, so a missing file is an error.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading topology from {}", path.display()))?;
        let config = Self::from_toml(&contents)
            .with_context(|| format!("parsing topology from {}", path.display()))?;
        tracing::info!(
            "loaded topology from {} ({} services, strategy={})",
            path.display(),
            config.services.len(),
            config.strategy
        );
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(contents)?)
    }
}

pub const UNSET: &str = "unset";
pub const DEFAULT_PORT: u16 = 4000;

/// Connection parameters the placeholder backend reports. Values are echoed
/// verbatim, never parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseInfo {
    pub host: String,
    pub port: String,
    pub name: String,
    pub user: String,
}

/// Placeholder backend settings, captured once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponderConfig {
    pub port: u16,
    pub database: DatabaseInfo,
}

impl ResponderConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; missing database keys become `"unset"`.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = match lookup("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .with_context(|| format!("PORT must be a TCP port, got `{raw}`"))?,
            None => DEFAULT_PORT,
        };
        let read = |key: &str| lookup(key).unwrap_or_else(|| UNSET.to_string());
        Ok(Self {
            port,
            database: DatabaseInfo {
                host: read("DB_HOST"),
                port: read("DB_PORT"),
                name: read("DB_NAME"),
                user: read("DB_USERNAME"),
            },
        })
    }
}
