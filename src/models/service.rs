use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use crate::error::ConfigurationError;
use crate::models::listener::Protocol;

pub const MIN_PORT: u32 = 1;
pub const MAX_PORT: u32 = 65535;

static ENV_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// One containerised service (frontend or backend) as the operator declares it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceSpec {
    pub name: String,
    /// Container port; also the target group port.
    pub port: u32,
    pub health_check: HealthCheck,
    #[serde(default)]
    pub environment: BTreeMap<String, EnvValue>,
    #[serde(default = "default_desired_count")]
    pub desired_count: u32,
    #[serde(default = "default_cpu")]
    pub cpu: u32,
    #[serde(default = "default_memory_mib")]
    pub memory_mib: u32,
    /// Task that owns this container. Containers in one task share a network
    /// namespace, so their ports must not collide.
    #[serde(default)]
    pub security_boundary: Option<String>,
    #[serde(default)]
    pub route: RouteSpec,
    /// Required for blue-green; ignored for rolling deployments.
    #[serde(default)]
    pub test_listener: Option<TestListenerSpec>,
}

fn default_desired_count() -> u32 {
    1
}

fn default_cpu() -> u32 {
    512
}

fn default_memory_mib() -> u32 {
    1024
}

impl ServiceSpec {
    pub fn boundary(&self) -> &str {
        self.security_boundary.as_deref().unwrap_or(&self.name)
    }

    /// Checks that only depend on this service. `prefix` is the field path of
    /// the service, e.g. `services[1]`.
    pub fn validate(&self, prefix: &str) -> Result<(), ConfigurationError> {
        if self.name.trim().is_empty() {
            return Err(ConfigurationError::invalid(
                format!("{prefix}.name"),
                "service name cannot be empty",
            ));
        }
        validate_port(&format!("{prefix}.port"), self.port)?;
        self.health_check
            .validate(&format!("{prefix}.health_check"))?;
        if self.desired_count == 0 {
            return Err(ConfigurationError::invalid(
                format!("{prefix}.desired_count"),
                "desired count must be at least 1",
            ));
        }
        if self.cpu == 0 || self.memory_mib == 0 {
            return Err(ConfigurationError::invalid(
                format!("{prefix}.cpu"),
                "cpu and memory_mib must be greater than zero",
            ));
        }
        for (name, value) in &self.environment {
            let field = format!("{prefix}.environment.{name}");
            if !is_env_name(name) {
                return Err(ConfigurationError::invalid(
                    field,
                    "environment variable names must match [A-Za-z_][A-Za-z0-9_]*",
                ));
            }
            value.validate(&field)?;
        }
        if let Some(test) = &self.test_listener {
            validate_port(&format!("{prefix}.test_listener.port"), test.port)?;
        }
        Ok(())
    }
}

pub fn validate_port(field: &str, port: u32) -> Result<(), ConfigurationError> {
    if !(MIN_PORT..=MAX_PORT).contains(&port) {
        return Err(ConfigurationError::InvalidPort {
            field: field.to_string(),
            port,
        });
    }
    Ok(())
}

fn is_env_name(name: &str) -> bool {
    ENV_NAME.is_match(name)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheck {
    pub path: String,
    /// No default: the accepted codes differ between stacks (200-399 vs
    /// 200-499), so every service states its own.
    pub healthy_status: StatusRange,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u32,
    #[serde(default)]
    pub protocol: Protocol,
}

fn default_interval_secs() -> u32 {
    30
}

impl HealthCheck {
    pub fn validate(&self, prefix: &str) -> Result<(), ConfigurationError> {
        if !self.path.starts_with('/') {
            return Err(ConfigurationError::invalid(
                format!("{prefix}.path"),
                format!("health check path `{}` must start with `/`", self.path),
            ));
        }
        if self.interval_secs == 0 {
            return Err(ConfigurationError::invalid(
                format!("{prefix}.interval_secs"),
                "interval must be greater than zero",
            ));
        }
        self.healthy_status
            .validate(&format!("{prefix}.healthy_status"))
    }
}

/// Inclusive range of HTTP status codes a health check accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRange {
    pub low: u16,
    pub high: u16,
}

impl StatusRange {
    pub const MIN: u16 = 100;
    pub const MAX: u16 = 599;

    pub fn new(low: u16, high: u16) -> Self {
        Self { low, high }
    }

    pub fn contains(&self, status: u16) -> bool {
        (self.low..=self.high).contains(&status)
    }

    pub fn validate(&self, field: &str) -> Result<(), ConfigurationError> {
        let in_bounds = |code: u16| (Self::MIN..=Self::MAX).contains(&code);
        if !in_bounds(self.low) || !in_bounds(self.high) || self.low > self.high {
            return Err(ConfigurationError::InvalidStatusRange {
                field: field.to_string(),
                low: self.low,
                high: self.high,
            });
        }
        Ok(())
    }
}

/// Rendered the way load balancers spell matchers, e.g. `200-399`.
impl fmt::Display for StatusRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.low == self.high {
            write!(f, "{}", self.low)
        } else {
            write!(f, "{}-{}", self.low, self.high)
        }
    }
}

/// Value injected into a container's environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvValue {
    Literal(String),
    /// A field of a JSON secret held by the secret store.
    Secret { name: String, field: String },
    /// An attribute only known once the provisioning engine has created the
    /// resource, such as a database endpoint hostname.
    Output { resource: String, attribute: String },
}

impl EnvValue {
    pub fn is_secret(&self) -> bool {
        matches!(self, Self::Secret { .. })
    }

    fn validate(&self, field: &str) -> Result<(), ConfigurationError> {
        match self {
            Self::Literal(_) => Ok(()),
            Self::Secret { name, field: key } if name.is_empty() || key.is_empty() => Err(
                ConfigurationError::invalid(field, "secret reference needs a name and a field"),
            ),
            Self::Output {
                resource,
                attribute,
            } if resource.is_empty() || attribute.is_empty() => Err(ConfigurationError::invalid(
                field,
                "output reference needs a resource and an attribute",
            )),
            _ => Ok(()),
        }
    }
}

/// Where a service sits on its load balancer's production listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteSpec {
    #[serde(default = "default_load_balancer")]
    pub load_balancer: String,
    /// ALB-style wildcards. Empty means this service is the listener default.
    #[serde(default)]
    pub path_patterns: Vec<String>,
    #[serde(default)]
    pub priority: Option<u32>,
}

pub(crate) fn default_load_balancer() -> String {
    "public".to_string()
}

impl Default for RouteSpec {
    fn default() -> Self {
        Self {
            load_balancer: default_load_balancer(),
            path_patterns: Vec::new(),
            priority: None,
        }
    }
}

/// Listener the deployment engine points at green before cutover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestListenerSpec {
    pub port: u32,
    #[serde(default)]
    pub protocol: Protocol,
    #[serde(default)]
    pub exposed: bool,
}
