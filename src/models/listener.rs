use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Http,
    Https,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Http => write!(f, "HTTP"),
            Protocol::Https => write!(f, "HTTPS"),
        }
    }
}

/// An application load balancer and its production listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBalancerSpec {
    pub name: String,
    #[serde(default = "default_true")]
    pub internet_facing: bool,
    #[serde(default = "default_listener_port")]
    pub port: u32,
    #[serde(default)]
    pub protocol: Protocol,
}

fn default_true() -> bool {
    true
}

fn default_listener_port() -> u32 {
    80
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListenerRole {
    Production,
    Test,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerSpec {
    pub load_balancer: String,
    pub port: u32,
    pub protocol: Protocol,
    /// Reachable from the internet rather than only from inside the VPC.
    pub exposed: bool,
    pub role: ListenerRole,
}

impl ListenerSpec {
    /// `<load balancer>:<port>`, unique per topology.
    pub fn id(&self) -> String {
        listener_id(&self.load_balancer, self.port)
    }
}

pub fn listener_id(load_balancer: &str, port: u32) -> String {
    format!("{load_balancer}:{port}")
}
