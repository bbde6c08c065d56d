use serde::{Deserialize, Serialize};

/// Traffic source admitted by an ingress rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Peer {
    AnyIpv4,
    Cidr(String),
    Group(String),
}

/// TCP ingress on `port` into security group `group`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressRule {
    pub group: String,
    pub source: Peer,
    pub port: u32,
    pub description: String,
}
