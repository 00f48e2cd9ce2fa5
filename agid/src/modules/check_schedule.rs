use anyhow::{anyhow, Result};
use async_trait::async_trait;
use fastagi::FastAgi;
use lyra_db::objects::ScheduleDataMapper;
use schedule::ScheduleState;
use tokio_postgres::Transaction;

use crate::dialplan_variables as dv;
use crate::handler::AgiHandler;

/// Decides whether the current path is inside its business hours and,
/// when closed, exposes the resolved forwarding action to the dialplan.
pub struct CheckSchedule;

#[async_trait]
impl AgiHandler for CheckSchedule {
    async fn execute(
        &self,
        agi: &mut FastAgi,
        tx: &Transaction<'_>,
        _args: &[String],
    ) -> Result<()> {
        let path = agi.get_variable(dv::PATH).await?;
        let path_id = agi.get_variable(dv::PATH_ID).await?;

        if path.is_empty() {
            return Ok(());
        }
        let path_id: i32 = path_id
            .parse()
            .map_err(|_| anyhow!("invalid path id {:?}", path_id))?;

        let schedule = ScheduleDataMapper::get_from_path(tx, &path, path_id).await?;
        match schedule.compute_state_for_now() {
            ScheduleState::Opened => {
                agi.set_variable(dv::SCHEDULE_STATUS, "opened").await?;
            }
            ScheduleState::Closed(action) => {
                agi.set_variable(dv::SCHEDULE_STATUS, "closed").await?;
                agi.set_variable(dv::FWD_SCHEDULE_OUT_ACTION, &action.action).await?;
                agi.set_variable(dv::FWD_SCHEDULE_OUT_ACTIONARG1, &action.actionarg1)
                    .await?;
                if let Some(actionarg2) = &action.actionarg2 {
                    agi.set_variable(dv::FWD_SCHEDULE_OUT_ACTIONARG2, actionarg2)
                        .await?;
                }
            }
        }

        // erase the path so the next schedule check starts clean
        agi.set_variable(dv::PATH, "").await?;
        Ok(())
    }
}
