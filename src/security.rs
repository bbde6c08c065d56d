use crate::models::database::DatabaseSpec;
use crate::models::listener::{ListenerRole, ListenerSpec, LoadBalancerSpec};
use crate::models::security::{IngressRule, Peer};
use crate::models::service::ServiceSpec;

pub fn load_balancer_group(name: &str) -> String {
    format!("{name}-lb-sg")
}

pub fn service_group(name: &str) -> String {
    format!("{name}-service-sg")
}

pub const DATABASE_GROUP: &str = "database-sg";

/// Derive the ingress rules implied by the listener layout. Everything not
/// listed here is denied.
pub fn derive_ingress(
    load_balancers: &[LoadBalancerSpec],
    listeners: &[ListenerSpec],
    services: &[ServiceSpec],
    database: Option<&DatabaseSpec>,
    vpc_cidr: &str,
) -> Vec<IngressRule> {
    let mut rules = Vec::new();

    for listener in listeners {
        let (source, description) = if listener.exposed {
            (
                Peer::AnyIpv4,
                format!("Allow {} traffic from the internet", listener.protocol),
            )
        } else {
            let what = match listener.role {
                ListenerRole::Test => "test",
                ListenerRole::Production => "internal",
            };
            (
                Peer::Cidr(vpc_cidr.to_string()),
                format!("Allow {what} traffic from inside the VPC"),
            )
        };
        rules.push(IngressRule {
            group: load_balancer_group(&listener.load_balancer),
            source,
            port: listener.port,
            description,
        });
    }

    for service in services {
        let Some(lb) = load_balancers
            .iter()
            .find(|lb| lb.name == service.route.load_balancer)
        else {
            continue;
        };
        rules.push(IngressRule {
            group: service_group(&service.name),
            source: Peer::Group(load_balancer_group(&lb.name)),
            port: service.port,
            description: format!("Allow {} to reach the {} containers", lb.name, service.name),
        });
    }

    if let Some(db) = database {
        for client in &db.clients {
            rules.push(IngressRule {
                group: DATABASE_GROUP.to_string(),
                source: Peer::Group(service_group(client)),
                port: db.port,
                description: format!("Allow {client} containers to connect to {}", db.engine),
            });
        }
    }

    rules
}
