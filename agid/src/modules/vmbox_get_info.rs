use anyhow::Result;
use async_trait::async_trait;
use fastagi::{dp_break, FastAgi};
use lyra_db::objects;
use tokio_postgres::Transaction;
use tracing::error;

use crate::dialplan_variables as dv;
use crate::handler::AgiHandler;

/// Resolves the voicemail box the caller is about to enter, either from a
/// dialed mailbox number or from the box id set earlier in the dialplan.
pub struct VmboxGetInfo;

#[async_trait]
impl AgiHandler for VmboxGetInfo {
    async fn execute(
        &self,
        agi: &mut FastAgi,
        tx: &Transaction<'_>,
        args: &[String],
    ) -> Result<()> {
        let mut caller_language = None;

        let vmbox = match args.first().filter(|mailbox| !mailbox.is_empty()) {
            Some(mailbox) => {
                let userid = agi.get_variable(dv::USERID).await?;
                if let Ok(user_id) = userid.parse::<i32>() {
                    caller_language = objects::user_language(tx, user_id).await?;
                }
                let context = agi.get_variable(dv::BASE_CONTEXT).await?;
                if context.is_empty() {
                    return Err(dp_break("could not get the context of the caller"));
                }
                match objects::voicemail_box_by_mailbox(tx, mailbox, &context).await {
                    Ok(vmbox) => vmbox,
                    Err(e) => {
                        error!("error while retrieving vmbox from number and context: {:?}", e);
                        return Err(dp_break(e.to_string()));
                    }
                }
            }
            None => {
                let vmbox_id = agi.get_variable(dv::VMBOX_ID).await?;
                let vmbox_id: i32 = match vmbox_id.parse() {
                    Ok(id) => id,
                    Err(_) => {
                        return Err(dp_break(format!("invalid voicemail box id {:?}", vmbox_id)))
                    }
                };
                match objects::voicemail_box_by_id(tx, vmbox_id).await {
                    Ok(vmbox) => vmbox,
                    Err(e) => {
                        error!("error while retrieving vmbox from id: {:?}", e);
                        return Err(dp_break(e.to_string()));
                    }
                }
            }
        };

        let vmmain_options = if vmbox.skipcheckpass { "s" } else { "" };
        let mailbox_language = caller_language
            .or_else(|| vmbox.language.clone())
            .unwrap_or_default();

        agi.set_variable(dv::VMMAIN_OPTIONS, vmmain_options).await?;
        agi.set_variable(dv::MAILBOX, &vmbox.mailbox).await?;
        agi.set_variable(dv::MAILBOX_CONTEXT, &vmbox.context).await?;
        agi.set_variable(dv::MAILBOX_LANGUAGE, &mailbox_language).await?;
        Ok(())
    }
}
