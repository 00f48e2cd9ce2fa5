//! Channel variable names shared with the dialplan.

pub const AGENT_EXISTS: &str = "LYRA_AGENTEXISTS";
pub const AGENT_ID: &str = "LYRA_AGENTID";
pub const AGENT_NUM: &str = "LYRA_AGENTNUM";
pub const AGENT_PASSWD: &str = "LYRA_AGENTPASSWD";
pub const BASE_CONTEXT: &str = "LYRA_BASE_CONTEXT";
pub const FWD_SCHEDULE_OUT_ACTION: &str = "LYRA_FWD_SCHEDULE_OUT_ACTION";
pub const FWD_SCHEDULE_OUT_ACTIONARG1: &str = "LYRA_FWD_SCHEDULE_OUT_ACTIONARG1";
pub const FWD_SCHEDULE_OUT_ACTIONARG2: &str = "LYRA_FWD_SCHEDULE_OUT_ACTIONARG2";
pub const MAILBOX: &str = "LYRA_MAILBOX";
pub const MAILBOX_CONTEXT: &str = "LYRA_MAILBOX_CONTEXT";
pub const MAILBOX_LANGUAGE: &str = "LYRA_MAILBOX_LANGUAGE";
pub const PATH: &str = "LYRA_PATH";
pub const PATH_ID: &str = "LYRA_PATH_ID";
pub const SCHEDULE_STATUS: &str = "LYRA_SCHEDULE_STATUS";
pub const USERID: &str = "LYRA_USERID";
pub const VIDEO_ENABLED: &str = "LYRA_VIDEO_ENABLED";
pub const VMBOX_ID: &str = "LYRA_VMBOXID";
pub const VMMAIN_OPTIONS: &str = "LYRA_VMMAIN_OPTIONS";
pub const WAIT_FOR_MOBILE: &str = "LYRA_WAIT_FOR_MOBILE";
