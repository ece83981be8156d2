//! JSON seed files for the daemon
//!
//! Business hour records flow through the engine's save path so seeds are
//! validated like any other write. Agent identities go straight into the
//! agent store; the daemon shell plays the external user-management role
//! here.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::engine::BusinessHours;
use crate::model::{Agent, BusinessHour};
use crate::store::MemoryAgentStore;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedFile {
    #[serde(default)]
    pub business_hours: Vec<BusinessHour>,
    #[serde(default)]
    pub agents: Vec<Agent>,
}

pub fn load_file(path: &str) -> Result<SeedFile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read seed file {path:?}"))?;
    parse(&raw).with_context(|| format!("failed to parse seed file {path:?}"))
}

pub fn parse(raw: &str) -> Result<SeedFile> {
    Ok(serde_json::from_str(raw)?)
}

/// Returns `(business hours, agents)` loaded.
pub async fn apply(
    seed: &SeedFile,
    engine: &dyn BusinessHours,
    agents: &MemoryAgentStore,
) -> Result<(usize, usize)> {
    for record in &seed.business_hours {
        engine
            .save_business_hour(record.clone())
            .await
            .with_context(|| format!("rejected business hour {}", record.id))?;
    }
    for agent in &seed.agents {
        agents.upsert_agent(agent.clone())?;
    }
    Ok((seed.business_hours.len(), seed.agents.len()))
}
