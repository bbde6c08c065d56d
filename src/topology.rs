//! Builds the load balancer / target group / deployment layout for a set of
//! services and checks it before anything is handed to the provisioning
//! engine.
//!
//! Layout:
//!   - every load balancer gets one production listener on its own port;
//!   - every service gets a routing rule on its load balancer's production
//!     listener, either the default rule or a prioritised path rule;
//!   - rolling: one target group per service (`<service>-tg`);
//!   - blue-green: `<service>-blue` behind the production rule,
//!     `<service>-green` behind a dedicated, non-exposed test listener, and a
//!     [`DeploymentPlan`] tying the two together.

use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::config::{MAX_TERMINATION_WAIT_MINUTES, TopologyConfig};
use crate::error::ConfigurationError;
use crate::models::database::DatabaseSpec;
use crate::models::deployment::{
    DeploymentPlan, DeploymentStrategy, TargetGroup, TargetGroupPair,
};
use crate::models::listener::{ListenerRole, ListenerSpec, LoadBalancerSpec, listener_id};
use crate::models::routing::{MAX_PRIORITY, MIN_PRIORITY, RoutingRule};
use crate::models::security::IngressRule;
use crate::models::service::{ServiceSpec, validate_port};
use crate::routing::RouteTable;
use crate::security;

/// The resolved resource plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Topology {
    pub strategy: DeploymentStrategy,
    pub vpc_cidr: String,
    pub load_balancers: Vec<LoadBalancerSpec>,
    pub services: Vec<ServiceSpec>,
    pub database: Option<DatabaseSpec>,
    pub listeners: Vec<ListenerSpec>,
    pub target_groups: Vec<TargetGroup>,
    pub rules: Vec<RoutingRule>,
    pub pairs: Vec<TargetGroupPair>,
    pub deployments: Vec<DeploymentPlan>,
    pub ingress: Vec<IngressRule>,
}

/// Build and validate a topology. Nothing is returned unless the whole
/// plan is valid.
pub fn build(config: &TopologyConfig) -> Result<Topology, ConfigurationError> {
    let strategy = config.strategy;
    tracing::debug!(
        "building {strategy} topology for {} services on {} load balancers",
        config.services.len(),
        config.load_balancers.len()
    );

    let termination_wait_secs = config.deployment.termination_wait_secs()?;

    let mut listeners: Vec<ListenerSpec> = config
        .load_balancers
        .iter()
        .map(|lb| ListenerSpec {
            load_balancer: lb.name.clone(),
            port: lb.port,
            protocol: lb.protocol,
            exposed: lb.internet_facing,
            role: ListenerRole::Production,
        })
        .collect();
    let mut target_groups = Vec::new();
    let mut rules = Vec::new();
    let mut pairs = Vec::new();
    let mut deployments = Vec::new();

    for (i, svc) in config.services.iter().enumerate() {
        let prefix = format!("services[{i}]");
        let lb = config
            .load_balancers
            .iter()
            .find(|lb| lb.name == svc.route.load_balancer)
            .ok_or_else(|| ConfigurationError::UnknownReference {
                field: format!("{prefix}.route.load_balancer"),
                kind: "load balancer",
                name: svc.route.load_balancer.clone(),
            })?;
        let prod_listener = listener_id(&lb.name, lb.port);

        let serving = match strategy {
            DeploymentStrategy::Rolling => format!("{}-tg", svc.name),
            DeploymentStrategy::BlueGreen => format!("{}-blue", svc.name),
        };
        target_groups.push(target_group(svc, &serving));
        rules.push(RoutingRule {
            listener: prod_listener.clone(),
            target_group: serving.clone(),
            path_patterns: svc.route.path_patterns.clone(),
            priority: svc.route.priority,
        });

        if strategy == DeploymentStrategy::Rolling {
            if svc.test_listener.is_some() {
                tracing::debug!("{}: test listener ignored for rolling deployments", svc.name);
            }
            continue;
        }

        let test = svc
            .test_listener
            .as_ref()
            .ok_or_else(|| ConfigurationError::MissingTestListener {
                field: format!("{prefix}.test_listener"),
            })?;
        let green = format!("{}-green", svc.name);
        target_groups.push(target_group(svc, &green));

        let test_listener = ListenerSpec {
            load_balancer: lb.name.clone(),
            port: test.port,
            protocol: test.protocol,
            exposed: test.exposed,
            role: ListenerRole::Test,
        };
        let test_id = test_listener.id();
        listeners.push(test_listener);
        rules.push(RoutingRule::default_rule(test_id.clone(), green.clone()));

        let pair = TargetGroupPair {
            service: svc.name.clone(),
            blue: serving,
            green,
        };
        deployments.push(DeploymentPlan {
            service: svc.name.clone(),
            pair: pair.clone(),
            prod_listener,
            test_listener: test_id,
            rollback_triggers: config.deployment.rollback_triggers.clone(),
            traffic_shifting: config.deployment.traffic_shifting,
            termination_wait_secs,
        });
        pairs.push(pair);
    }

    let ingress = security::derive_ingress(
        &config.load_balancers,
        &listeners,
        &config.services,
        config.database.as_ref(),
        &config.vpc_cidr,
    );

    let topology = Topology {
        strategy,
        vpc_cidr: config.vpc_cidr.clone(),
        load_balancers: config.load_balancers.clone(),
        services: config.services.clone(),
        database: config.database.clone(),
        listeners,
        target_groups,
        rules,
        pairs,
        deployments,
        ingress,
    };

    if let Err(e) = topology.validate() {
        tracing::warn!("topology rejected: {e}");
        return Err(e);
    }
    tracing::debug!(
        "topology ok: {} listeners, {} target groups, {} rules, {} deployment plans",
        topology.listeners.len(),
        topology.target_groups.len(),
        topology.rules.len(),
        topology.deployments.len()
    );
    Ok(topology)
}

fn target_group(svc: &ServiceSpec, name: &str) -> TargetGroup {
    TargetGroup {
        name: name.to_string(),
        service: svc.name.clone(),
        port: svc.port,
        protocol: svc.health_check.protocol,
        health_check: svc.health_check.clone(),
    }
}

impl Topology {
    /// Check every invariant of the plan. Running it on a built topology
    /// always succeeds, so it can be re-run on deserialized or edited plans.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.validate_load_balancers()?;
        self.validate_services()?;
        self.validate_database()?;
        self.validate_listeners()?;
        self.validate_target_groups()?;
        self.validate_rules()?;
        if self.strategy == DeploymentStrategy::BlueGreen {
            self.validate_blue_green()?;
        }
        Ok(())
    }

    pub fn listener(&self, id: &str) -> Option<&ListenerSpec> {
        self.listeners.iter().find(|l| l.id() == id)
    }

    pub fn target_group(&self, name: &str) -> Option<&TargetGroup> {
        self.target_groups.iter().find(|tg| tg.name == name)
    }

    pub fn plan_for(&self, service: &str) -> Option<&DeploymentPlan> {
        self.deployments.iter().find(|d| d.service == service)
    }

    /// Compile the routing rules once for request-time lookups.
    pub fn route_table(&self) -> Result<RouteTable<'_>, ConfigurationError> {
        RouteTable::compile(&self.rules)
    }

    fn service_index(&self, name: &str) -> Option<usize> {
        self.services.iter().position(|s| s.name == name)
    }

    fn validate_load_balancers(&self) -> Result<(), ConfigurationError> {
        let mut names = HashSet::new();
        for (i, lb) in self.load_balancers.iter().enumerate() {
            if !names.insert(lb.name.as_str()) {
                return Err(ConfigurationError::DuplicateName {
                    field: format!("load_balancers[{i}].name"),
                    kind: "load balancer",
                    name: lb.name.clone(),
                });
            }
            validate_port(&format!("load_balancers[{i}].port"), lb.port)?;
        }
        Ok(())
    }

    fn validate_services(&self) -> Result<(), ConfigurationError> {
        let mut names = HashSet::new();
        let mut ports: HashMap<(&str, u32), &str> = HashMap::new();
        for (i, svc) in self.services.iter().enumerate() {
            let prefix = format!("services[{i}]");
            svc.validate(&prefix)?;
            if !names.insert(svc.name.as_str()) {
                return Err(ConfigurationError::DuplicateName {
                    field: format!("{prefix}.name"),
                    kind: "service",
                    name: svc.name.clone(),
                });
            }
            if let Some(other) = ports.insert((svc.boundary(), svc.port), &svc.name) {
                return Err(ConfigurationError::DuplicatePort {
                    field: format!("{prefix}.port"),
                    port: svc.port,
                    boundary: svc.boundary().to_string(),
                    other: other.to_string(),
                });
            }
            if !self
                .load_balancers
                .iter()
                .any(|lb| lb.name == svc.route.load_balancer)
            {
                return Err(ConfigurationError::UnknownReference {
                    field: format!("{prefix}.route.load_balancer"),
                    kind: "load balancer",
                    name: svc.route.load_balancer.clone(),
                });
            }
        }
        Ok(())
    }

    fn validate_database(&self) -> Result<(), ConfigurationError> {
        let Some(db) = &self.database else {
            return Ok(());
        };
        db.validate()?;
        for (i, client) in db.clients.iter().enumerate() {
            if self.service_index(client).is_none() {
                return Err(ConfigurationError::UnknownReference {
                    field: format!("database.clients[{i}]"),
                    kind: "service",
                    name: client.clone(),
                });
            }
        }
        Ok(())
    }

    fn validate_listeners(&self) -> Result<(), ConfigurationError> {
        let mut seen = HashSet::new();
        for (i, listener) in self.listeners.iter().enumerate() {
            let prefix = format!("listeners[{i}]");
            validate_port(&format!("{prefix}.port"), listener.port)?;
            if !self
                .load_balancers
                .iter()
                .any(|lb| lb.name == listener.load_balancer)
            {
                return Err(ConfigurationError::UnknownReference {
                    field: format!("{prefix}.load_balancer"),
                    kind: "load balancer",
                    name: listener.load_balancer.clone(),
                });
            }
            if !seen.insert((listener.load_balancer.as_str(), listener.port)) {
                return Err(ConfigurationError::DuplicateListener {
                    field: format!("{prefix}.port"),
                    load_balancer: listener.load_balancer.clone(),
                    port: listener.port,
                });
            }
        }
        Ok(())
    }

    fn validate_target_groups(&self) -> Result<(), ConfigurationError> {
        let mut names = HashSet::new();
        for (i, tg) in self.target_groups.iter().enumerate() {
            let prefix = format!("target_groups[{i}]");
            if !names.insert(tg.name.as_str()) {
                return Err(ConfigurationError::DuplicateName {
                    field: format!("{prefix}.name"),
                    kind: "target group",
                    name: tg.name.clone(),
                });
            }
            let svc = self
                .services
                .iter()
                .find(|s| s.name == tg.service)
                .ok_or_else(|| ConfigurationError::UnknownReference {
                    field: format!("{prefix}.service"),
                    kind: "service",
                    name: tg.service.clone(),
                })?;
            if tg.port != svc.port {
                return Err(ConfigurationError::invalid(
                    format!("{prefix}.port"),
                    format!("target group port {} differs from container port {}", tg.port, svc.port),
                ));
            }
            tg.health_check
                .validate(&format!("{prefix}.health_check"))?;
        }
        Ok(())
    }

    fn validate_rules(&self) -> Result<(), ConfigurationError> {
        let mut priorities = HashSet::new();
        let mut defaults: HashMap<&str, usize> = HashMap::new();

        for (i, rule) in self.rules.iter().enumerate() {
            let prefix = format!("rules[{i}]");
            if self.listener(&rule.listener).is_none() {
                return Err(ConfigurationError::UnknownReference {
                    field: format!("{prefix}.listener"),
                    kind: "listener",
                    name: rule.listener.clone(),
                });
            }
            if self.target_group(&rule.target_group).is_none() {
                return Err(ConfigurationError::UnknownReference {
                    field: format!("{prefix}.target_group"),
                    kind: "target group",
                    name: rule.target_group.clone(),
                });
            }

            if rule.is_default() {
                if rule.priority.is_some() {
                    return Err(ConfigurationError::invalid(
                        format!("{prefix}.priority"),
                        "the default rule is evaluated last and takes no priority",
                    ));
                }
                *defaults.entry(rule.listener.as_str()).or_default() += 1;
                continue;
            }

            let priority = rule.priority.ok_or_else(|| ConfigurationError::MissingPriority {
                field: format!("{prefix}.priority"),
            })?;
            if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&priority) {
                return Err(ConfigurationError::InvalidPriority {
                    field: format!("{prefix}.priority"),
                    priority,
                });
            }
            if !priorities.insert((rule.listener.as_str(), priority)) {
                return Err(ConfigurationError::DuplicatePriority {
                    field: format!("{prefix}.priority"),
                    listener: rule.listener.clone(),
                    priority,
                });
            }
        }
        self.route_table()?;

        for listener in &self.listeners {
            let id = listener.id();
            match defaults.get(id.as_str()).copied().unwrap_or(0) {
                0 => {
                    return Err(ConfigurationError::MissingDefaultRule {
                        field: format!("listeners[{id}].rules"),
                        listener: id,
                    });
                }
                1 => {}
                _ => {
                    return Err(ConfigurationError::MultipleDefaultRules {
                        field: format!("listeners[{id}].rules"),
                        listener: id,
                    });
                }
            }
        }
        Ok(())
    }

    fn validate_blue_green(&self) -> Result<(), ConfigurationError> {
        let mut test_listeners = HashSet::new();

        for (i, svc) in self.services.iter().enumerate() {
            let prefix = format!("services[{i}]");

            let pairs: Vec<(usize, &TargetGroupPair)> = self
                .pairs
                .iter()
                .enumerate()
                .filter(|(_, p)| p.service == svc.name)
                .collect();
            let [(j, pair)] = pairs.as_slice() else {
                return Err(ConfigurationError::TargetGroupPairCount {
                    field: format!("{prefix}.target_groups"),
                    service: svc.name.clone(),
                    found: pairs.len(),
                });
            };
            self.validate_pair(*j, pair)?;

            let plan = self
                .plan_for(&svc.name)
                .ok_or_else(|| ConfigurationError::MissingDeploymentPlan {
                    field: format!("{prefix}.deployment"),
                    service: svc.name.clone(),
                })?;
            if plan.pair != **pair {
                return Err(ConfigurationError::invalid(
                    format!("{prefix}.deployment.pair"),
                    "deployment plan targets a different target group pair",
                ));
            }
            if plan.termination_wait_secs > MAX_TERMINATION_WAIT_MINUTES * 60 {
                return Err(ConfigurationError::invalid(
                    format!("{prefix}.deployment.termination_wait_secs"),
                    format!("termination wait of {}s is too long", plan.termination_wait_secs),
                ));
            }

            let test = self.listener(&plan.test_listener).ok_or_else(|| {
                ConfigurationError::MissingTestListener {
                    field: format!("{prefix}.test_listener"),
                }
            })?;
            if test.exposed {
                return Err(ConfigurationError::ExposedTestListener {
                    field: format!("{prefix}.test_listener.exposed"),
                });
            }
            if !test_listeners.insert(plan.test_listener.as_str()) {
                return Err(ConfigurationError::invalid(
                    format!("{prefix}.test_listener.port"),
                    format!("test listener `{}` is shared with another service", plan.test_listener),
                ));
            }

            let prod = self.listener(&plan.prod_listener).ok_or_else(|| {
                ConfigurationError::UnknownReference {
                    field: format!("{prefix}.route.load_balancer"),
                    kind: "listener",
                    name: plan.prod_listener.clone(),
                }
            })?;
            if !prod.exposed {
                let lb = self
                    .load_balancers
                    .iter()
                    .position(|lb| lb.name == prod.load_balancer)
                    .map(|k| format!("load_balancers[{k}].internet_facing"))
                    .unwrap_or_else(|| format!("{prefix}.route.load_balancer"));
                return Err(ConfigurationError::UnexposedProdListener { field: lb });
            }

            let routes_to = |listener: &str, tg: &str| {
                self.rules
                    .iter()
                    .any(|r| r.listener == listener && r.target_group == tg)
            };
            if !routes_to(&plan.prod_listener, &pair.blue) {
                return Err(ConfigurationError::invalid(
                    format!("{prefix}.route"),
                    format!("production listener `{}` does not route to `{}`", plan.prod_listener, pair.blue),
                ));
            }
            if !routes_to(&plan.test_listener, &pair.green) {
                return Err(ConfigurationError::invalid(
                    format!("{prefix}.test_listener"),
                    format!("test listener `{}` does not route to `{}`", plan.test_listener, pair.green),
                ));
            }
        }
        Ok(())
    }

    fn validate_pair(&self, index: usize, pair: &TargetGroupPair) -> Result<(), ConfigurationError> {
        let prefix = format!("pairs[{index}]");
        if pair.blue == pair.green {
            return Err(ConfigurationError::IdenticalTargetGroups {
                field: format!("{prefix}.green"),
                target_group: pair.green.clone(),
            });
        }
        let lookup = |name: &str, side: &str| {
            self.target_group(name)
                .ok_or_else(|| ConfigurationError::UnknownReference {
                    field: format!("{prefix}.{side}"),
                    kind: "target group",
                    name: name.to_string(),
                })
        };
        let blue = lookup(&pair.blue, "blue")?;
        let green = lookup(&pair.green, "green")?;
        if blue.service != pair.service
            || green.service != pair.service
            || blue.port != green.port
            || blue.health_check != green.health_check
        {
            return Err(ConfigurationError::TargetGroupMismatch { field: prefix });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::deployment::RollbackTrigger;

    const ORIGINAL_LAYOUT: &str = r#"
        strategy = "rolling"

        [[load_balancers]]
        name = "public"

        [[services]]
        name = "frontend"
        port = 3000
        health_check = { path = "/", healthy_status = { low = 200, high = 399 } }
        environment = { API_BASE_URL = { output = { resource = "public", attribute = "dns_name" } } }

        [[services]]
        name = "backend"
        port = 4000
        health_check = { path = "/", healthy_status = { low = 200, high = 399 } }
        route = { path_patterns = ["/api*", "/api/*"], priority = 10 }

        [services.environment]
        DB_NAME = { literal = "ecommerce" }
        DB_USERNAME = { secret = { name = "ecommerce/mysql", field = "username" } }

        [database]
        name = "ecommerce"
        credentials_secret = "ecommerce/mysql"
        clients = ["backend"]
    "#;

    const BLUE_GREEN_BACKEND: &str = r#"
        strategy = "blue-green"

        [[services]]
        name = "backend"
        port = 4000
        health_check = { path = "/health", healthy_status = { low = 200, high = 399 } }
        test_listener = { port = 9000 }
    "#;

    fn config(toml: &str) -> TopologyConfig {
        TopologyConfig::from_toml(toml).unwrap()
    }

    #[test]
    fn blue_green_backend_scenario() {
        let topology = build(&config(BLUE_GREEN_BACKEND)).unwrap();

        assert_eq!(topology.pairs.len(), 1);
        let pair = &topology.pairs[0];
        assert_eq!(pair.blue, "backend-blue");
        assert_eq!(pair.green, "backend-green");

        let prod: Vec<_> = topology
            .listeners
            .iter()
            .filter(|l| l.role == ListenerRole::Production)
            .collect();
        let test: Vec<_> = topology
            .listeners
            .iter()
            .filter(|l| l.role == ListenerRole::Test)
            .collect();
        assert_eq!(prod.len(), 1);
        assert!(prod[0].exposed);
        assert_eq!(test.len(), 1);
        assert!(!test[0].exposed);
        assert_eq!(test[0].port, 9000);

        let plan = topology.plan_for("backend").unwrap();
        assert!(plan.rolls_back_on(RollbackTrigger::OnFailedDeployment));
        assert!(plan.rolls_back_on(RollbackTrigger::OnStoppedDeployment));
        assert_eq!(plan.termination_wait_secs, 300);
        assert_eq!(plan.prod_listener, "public:80");
        assert_eq!(plan.test_listener, "public:9000");

        let routes = topology.route_table().unwrap();
        assert_eq!(
            routes.resolve("public:80", "/health").map(|r| r.target_group.as_str()),
            Some("backend-blue")
        );
        assert_eq!(
            routes.resolve("public:9000", "/health").map(|r| r.target_group.as_str()),
            Some("backend-green")
        );
    }

    #[test]
    fn original_layout_multiplexes_one_listener() {
        let topology = build(&config(ORIGINAL_LAYOUT)).unwrap();
        assert_eq!(topology.listeners.len(), 1);
        assert!(topology.pairs.is_empty());
        assert!(topology.deployments.is_empty());

        let routes = topology.route_table().unwrap();
        let served = |path| routes.resolve("public:80", path).map(|r| r.target_group.clone());
        assert_eq!(served("/api").as_deref(), Some("backend-tg"));
        assert_eq!(served("/api/products").as_deref(), Some("backend-tg"));
        assert_eq!(served("/").as_deref(), Some("frontend-tg"));
        assert_eq!(served("/checkout").as_deref(), Some("frontend-tg"));

        assert!(
            topology
                .ingress
                .iter()
                .any(|r| r.group == security::DATABASE_GROUP && r.port == 3306)
        );
    }

    #[test]
    fn shipped_topology_builds() {
        let topology = build(&config(include_str!("../topology.toml"))).unwrap();
        assert_eq!(topology.pairs.len(), 2);
        assert_eq!(topology.listeners.len(), 3);
        assert_eq!(topology.deployments.len(), 2);
        let routes = topology.route_table().unwrap();
        assert_eq!(
            routes.resolve("public:80", "/api/cart").map(|r| r.target_group.as_str()),
            Some("backend-blue")
        );
        assert_eq!(
            routes.resolve("public:9000", "/api/cart").map(|r| r.target_group.as_str()),
            Some("frontend-green")
        );
        assert_eq!(
            routes.resolve("public:9001", "/api/cart").map(|r| r.target_group.as_str()),
            Some("backend-green")
        );
    }

    #[test]
    fn validation_is_idempotent() {
        for toml in [ORIGINAL_LAYOUT, BLUE_GREEN_BACKEND] {
            let cfg = config(toml);
            let topology = build(&cfg).unwrap();
            assert_eq!(topology.validate(), Ok(()));
            assert_eq!(topology.validate(), Ok(()));
            assert_eq!(build(&cfg).unwrap(), topology);
        }
    }

    #[test]
    fn port_outside_range_is_rejected() {
        for port in [0, 65536, 70000] {
            let mut cfg = config(BLUE_GREEN_BACKEND);
            cfg.services[0].port = port;
            let err = build(&cfg).unwrap_err();
            assert!(matches!(err, ConfigurationError::InvalidPort { .. }));
            assert_eq!(err.field(), "services[0].port");
        }
    }

    #[test]
    fn exposed_test_listener_is_rejected() {
        let mut cfg = config(BLUE_GREEN_BACKEND);
        if let Some(test) = cfg.services[0].test_listener.as_mut() {
            test.exposed = true;
        }
        let err = build(&cfg).unwrap_err();
        assert!(matches!(err, ConfigurationError::ExposedTestListener { .. }));
        assert_eq!(err.field(), "services[0].test_listener.exposed");

        let mut topology = build(&config(BLUE_GREEN_BACKEND)).unwrap();
        for listener in &mut topology.listeners {
            if listener.role == ListenerRole::Test {
                listener.exposed = true;
            }
        }
        assert!(matches!(
            topology.validate(),
            Err(ConfigurationError::ExposedTestListener { .. })
        ));
    }

    #[test]
    fn blue_green_requires_test_listener() {
        let mut cfg = config(BLUE_GREEN_BACKEND);
        cfg.services[0].test_listener = None;
        let err = build(&cfg).unwrap_err();
        assert_eq!(err.field(), "services[0].test_listener");
    }

    #[test]
    fn blue_green_requires_exposed_production_listener() {
        let mut cfg = config(BLUE_GREEN_BACKEND);
        cfg.load_balancers[0].internet_facing = false;
        let err = build(&cfg).unwrap_err();
        assert!(matches!(err, ConfigurationError::UnexposedProdListener { .. }));
        assert_eq!(err.field(), "load_balancers[0].internet_facing");
    }

    #[test]
    fn duplicate_priority_on_one_listener_is_rejected() {
        let mut cfg = config(ORIGINAL_LAYOUT);
        let mut extra = cfg.services[1].clone();
        extra.name = "search".into();
        extra.port = 5000;
        extra.route.path_patterns = vec!["/search*".into()];
        cfg.services.push(extra);
        let err = build(&cfg).unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::DuplicatePriority { priority: 10, .. }
        ));
        assert_eq!(err.field(), "rules[2].priority");
    }

    #[test]
    fn default_rule_must_exist() {
        let mut cfg = config(ORIGINAL_LAYOUT);
        cfg.services[0].route.path_patterns = vec!["/shop*".into()];
        cfg.services[0].route.priority = Some(20);
        let err = build(&cfg).unwrap_err();
        assert!(matches!(err, ConfigurationError::MissingDefaultRule { .. }));
        assert_eq!(err.field(), "listeners[public:80].rules");
    }

    #[test]
    fn only_one_default_rule_per_listener() {
        let mut cfg = config(ORIGINAL_LAYOUT);
        cfg.services[1].route.path_patterns.clear();
        cfg.services[1].route.priority = None;
        assert!(matches!(
            build(&cfg),
            Err(ConfigurationError::MultipleDefaultRules { .. })
        ));
    }

    #[test]
    fn path_rule_needs_priority() {
        let mut cfg = config(ORIGINAL_LAYOUT);
        cfg.services[1].route.priority = None;
        let err = build(&cfg).unwrap_err();
        assert!(matches!(err, ConfigurationError::MissingPriority { .. }));

        cfg.services[1].route.priority = Some(0);
        assert!(matches!(
            build(&cfg),
            Err(ConfigurationError::InvalidPriority { priority: 0, .. })
        ));
    }

    #[test]
    fn malformed_path_pattern_is_rejected() {
        let mut cfg = config(ORIGINAL_LAYOUT);
        cfg.services[1].route.path_patterns.push("/api /v2".into());
        let err = build(&cfg).unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidPathPattern { .. }));
        assert_eq!(err.field(), "rules[1].path_patterns");
    }

    #[test]
    fn default_route_takes_no_priority() {
        let mut cfg = config(ORIGINAL_LAYOUT);
        cfg.services[0].route.priority = Some(1);
        let err = build(&cfg).unwrap_err();
        assert_eq!(err.field(), "rules[0].priority");
    }

    #[test]
    fn ports_collide_only_inside_a_security_boundary() {
        let mut cfg = config(ORIGINAL_LAYOUT);
        cfg.services[1].port = 3000;
        assert!(build(&cfg).is_ok());

        cfg.services[0].security_boundary = Some("web".into());
        cfg.services[1].security_boundary = Some("web".into());
        let err = build(&cfg).unwrap_err();
        assert!(matches!(err, ConfigurationError::DuplicatePort { port: 3000, .. }));
        assert_eq!(err.field(), "services[1].port");
    }

    #[test]
    fn malformed_status_range_is_rejected() {
        let mut cfg = config(BLUE_GREEN_BACKEND);
        cfg.services[0].health_check.healthy_status.low = 500;
        cfg.services[0].health_check.healthy_status.high = 200;
        let err = build(&cfg).unwrap_err();
        assert_eq!(err.field(), "services[0].health_check.healthy_status");
    }

    #[test]
    fn test_listener_cannot_reuse_production_port() {
        let mut cfg = config(BLUE_GREEN_BACKEND);
        if let Some(test) = cfg.services[0].test_listener.as_mut() {
            test.port = 80;
        }
        assert!(matches!(
            build(&cfg),
            Err(ConfigurationError::DuplicateListener { port: 80, .. })
        ));
    }

    #[test]
    fn unknown_load_balancer_is_named() {
        let mut cfg = config(BLUE_GREEN_BACKEND);
        cfg.services[0].route.load_balancer = "internal".into();
        let err = build(&cfg).unwrap_err();
        assert_eq!(err.field(), "services[0].route.load_balancer");
    }

    #[test]
    fn identical_blue_and_green_are_rejected() {
        let mut topology = build(&config(BLUE_GREEN_BACKEND)).unwrap();
        topology.pairs[0].green = topology.pairs[0].blue.clone();
        assert!(matches!(
            topology.validate(),
            Err(ConfigurationError::IdenticalTargetGroups { .. })
        ));
    }

    #[test]
    fn duplicate_priority_in_edited_plan_is_rejected() {
        let mut topology = build(&config(ORIGINAL_LAYOUT)).unwrap();
        let mut copy = topology.rules[1].clone();
        copy.path_patterns = vec!["/other*".into()];
        topology.rules.push(copy);
        assert!(matches!(
            topology.validate(),
            Err(ConfigurationError::DuplicatePriority { .. })
        ));
    }

    #[test]
    fn oversized_termination_wait_is_rejected() {
        let toml = format!(
            "{BLUE_GREEN_BACKEND}\n[deployment]\ntermination_wait_minutes = 9223372036854775807\n"
        );
        let err = build(&config(&toml)).unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidValue { .. }));
        assert_eq!(err.field(), "deployment.termination_wait_minutes");

        let mut cfg = config(BLUE_GREEN_BACKEND);
        cfg.deployment.termination_wait_minutes = MAX_TERMINATION_WAIT_MINUTES + 1;
        assert_eq!(
            build(&cfg).unwrap_err().field(),
            "deployment.termination_wait_minutes"
        );

        cfg.deployment.termination_wait_minutes = MAX_TERMINATION_WAIT_MINUTES;
        let topology = build(&cfg).unwrap();
        assert_eq!(topology.deployments[0].termination_wait_secs, 172_800);
    }

    #[test]
    fn oversized_termination_wait_in_edited_plan_is_rejected() {
        let mut topology = build(&config(BLUE_GREEN_BACKEND)).unwrap();
        topology.deployments[0].termination_wait_secs = u64::MAX;
        let err = topology.validate().unwrap_err();
        assert_eq!(err.field(), "services[0].deployment.termination_wait_secs");
    }

    #[test]
    fn database_clients_must_be_services() {
        let mut cfg = config(ORIGINAL_LAYOUT);
        if let Some(db) = cfg.database.as_mut() {
            db.clients.push("worker".into());
        }
        let err = build(&cfg).unwrap_err();
        assert_eq!(err.field(), "database.clients[1]");
    }
}
