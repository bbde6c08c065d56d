use anyhow::Context;
use tracing_subscriber::EnvFilter;

use storefront_infra::config::TopologyConfig;
use storefront_infra::engine::{self, DryRunEngine};
use storefront_infra::topology;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    // stdout carries the plan, logs go to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("storefront_infra=info")
        }))
        .init();

    let config_path =
        std::env::var("TOPOLOGY_CONFIG").unwrap_or_else(|_| "./topology.toml".to_string());
    let config = TopologyConfig::load(&config_path)?;

    let plan = topology::build(&config)
        .with_context(|| format!("invalid topology in {config_path}"))?;
    println!("{}", serde_json::to_string_pretty(&plan)?);

    let submit = std::env::var("TOPOLOGY_SUBMIT").unwrap_or_default();
    match submit.as_str() {
        "" => {}
        "dry-run" => {
            for deployment in &plan.deployments {
                let report = engine::run_deployment(&DryRunEngine, deployment).await?;
                tracing::info!(
                    "deployment {} for {}: {:?}, prod on {}",
                    report.id,
                    report.service,
                    report.phase,
                    report.prod
                );
            }
        }
        other => anyhow::bail!("TOPOLOGY_SUBMIT must be `dry-run` or unset, got `{other}`"),
    }

    Ok(())
}
