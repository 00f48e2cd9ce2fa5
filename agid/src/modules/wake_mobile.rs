use anyhow::Result;
use async_trait::async_trait;
use fastagi::FastAgi;
use tokio_postgres::Transaction;

use crate::dialplan_variables as dv;
use crate::handler::AgiHandler;

/// Fires the push-wake event for a mobile callee when the channel is
/// waiting for the mobile app to register.
pub struct WakeMobile;

#[async_trait]
impl AgiHandler for WakeMobile {
    async fn execute(
        &self,
        agi: &mut FastAgi,
        _tx: &Transaction<'_>,
        args: &[String],
    ) -> Result<()> {
        let user_uuid = args.first().cloned().unwrap_or_default();
        let should_wake_mobile = agi.get_variable(dv::WAIT_FOR_MOBILE).await?;
        if should_wake_mobile.is_empty() {
            return Ok(());
        }

        let video_enabled = agi.get_variable(dv::VIDEO_ENABLED).await?;
        let geolocation = agi.get_variable("PJSIP_HEADER(read,Geolocation)").await?;

        agi.appexec(
            "UserEvent",
            &format!(
                "Pushmobile,LYRA_DST_UUID: {},LYRA_VIDEO_ENABLED: {},Geolocation: {}",
                user_uuid, video_enabled, geolocation
            ),
        )
        .await?;
        Ok(())
    }
}
