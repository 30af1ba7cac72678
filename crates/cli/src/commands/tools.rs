//! `relayline tools`: list the reasoning agent's tool catalog.

use anyhow::anyhow;
use relayline_agent::AgentCatalog;
use relayline_config::AppConfig;

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    let catalog = AgentCatalog::builtin();
    let agent = catalog
        .get(&config.reasoning.agent_id)
        .ok_or_else(|| anyhow!("Unknown reasoning agent '{}'", config.reasoning.agent_id))?;

    println!("{} ({})", agent.name, agent.id);
    println!();
    for tool in agent.tools.descriptors() {
        println!("  {:<18} {}", tool.name, tool.description);
        println!("  {:<18} parameters: {}", "", tool.parameters);
    }
    Ok(())
}
