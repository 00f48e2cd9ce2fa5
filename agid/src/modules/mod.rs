//! Feature handlers served by the daemon, one module per network script.

pub mod agent_get_options;
pub mod check_schedule;
pub mod vmbox_get_info;
pub mod wake_mobile;

use std::sync::Arc;

use anyhow::Result;

use crate::handler::HandlerRegistry;

/// One-shot startup registration of every feature handler.
pub fn register_all(registry: &mut HandlerRegistry) -> Result<()> {
    registry.register("agent_get_options", Arc::new(agent_get_options::AgentGetOptions))?;
    registry.register("check_schedule", Arc::new(check_schedule::CheckSchedule))?;
    registry.register("vmbox_get_info", Arc::new(vmbox_get_info::VmboxGetInfo))?;
    registry.register("wake_mobile", Arc::new(wake_mobile::WakeMobile))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_every_module_once() {
        let mut registry = HandlerRegistry::new();
        register_all(&mut registry).unwrap();
        assert!(registry.get("check_schedule").is_some());
        assert!(registry.get("vmbox_get_info").is_some());
        // running it twice would mean double registration somewhere
        assert!(register_all(&mut registry).is_err());
    }
}
