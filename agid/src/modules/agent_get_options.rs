use anyhow::{anyhow, Result};
use async_trait::async_trait;
use fastagi::FastAgi;
use lyra_db::objects;
use tokio_postgres::Transaction;

use crate::dialplan_variables as dv;
use crate::handler::AgiHandler;

/// Looks an agent up by number (or by id with a `*` prefix) and exposes
/// its login options to the dialplan. A missing agent is reported to the
/// caller, not treated as a failure.
pub struct AgentGetOptions;

#[async_trait]
impl AgiHandler for AgentGetOptions {
    async fn execute(
        &self,
        agi: &mut FastAgi,
        tx: &Transaction<'_>,
        args: &[String],
    ) -> Result<()> {
        agi.set_variable(dv::AGENT_EXISTS, "0").await?;

        let (tenant_uuid, number) = match (args.first(), args.get(1)) {
            (Some(tenant_uuid), Some(number)) => (tenant_uuid, number),
            _ => {
                agi.verbose("missing tenant or agent number").await?;
                return Ok(());
            }
        };

        let agent = match number.strip_prefix('*') {
            Some(id) => {
                let id = id.parse().map_err(|_| anyhow!("invalid agent id {:?}", id))?;
                objects::agent_by_id(tx, id).await
            }
            None => objects::agent_by_number(tx, number).await,
        };
        let agent = match agent {
            Ok(agent) => agent,
            Err(e) => {
                agi.verbose(&e.to_string()).await?;
                return Ok(());
            }
        };
        if &agent.tenant_uuid != tenant_uuid {
            return Ok(());
        }

        agi.set_variable(dv::AGENT_EXISTS, "1").await?;
        agi.set_variable(dv::AGENT_PASSWD, agent.passwd.as_deref().unwrap_or(""))
            .await?;
        agi.set_variable(dv::AGENT_ID, &agent.id.to_string()).await?;
        agi.set_variable(dv::AGENT_NUM, &agent.number).await?;

        if let Some(language) = agent.language.as_deref().filter(|language| !language.is_empty()) {
            agi.set_variable("CHANNEL(language)", language).await?;
        }
        Ok(())
    }
}
