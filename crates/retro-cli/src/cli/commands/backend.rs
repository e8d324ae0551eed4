//! Handlers for commands that only talk to the agent backend.

use anyhow::{Context, Result};
use retro_core::api::AgentClient;
use retro_core::config::Config;

pub async fn agents(config: &Config) -> Result<()> {
    let client = AgentClient::from_config(config)?;
    let agents = client.agents().await.context("list agents")?;
    for agent in agents {
        if agent == config.default_agent {
            println!("{agent} (default)");
        } else {
            println!("{agent}");
        }
    }
    Ok(())
}

pub async fn health(config: &Config) -> Result<()> {
    let client = AgentClient::from_config(config)?;
    let health = client
        .health()
        .await
        .with_context(|| format!("reach backend at {}", client.base_url()))?;
    println!("{}: {}", client.base_url(), health.status);
    Ok(())
}
