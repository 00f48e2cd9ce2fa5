use tokio_postgres::Row;

#[derive(Debug, Clone)]
pub struct ScheduleRow {
    pub timezone: Option<String>,
    pub fallback_action: String,
    pub fallback_actionid: Option<String>,
    pub fallback_actionargs: Option<String>,
}

impl From<Row> for ScheduleRow {
    fn from(row: Row) -> Self {
        Self {
            timezone: row.get("timezone"),
            fallback_action: row.get("fallback_action"),
            fallback_actionid: row.get("fallback_actionid"),
            fallback_actionargs: row.get("fallback_actionargs"),
        }
    }
}

/// One period row. `mode` is either "opened" or "closed"; the action
/// columns are only set on closed periods.
#[derive(Debug, Clone)]
pub struct ScheduleTimeRow {
    pub mode: String,
    pub hours: Option<String>,
    pub weekdays: Option<String>,
    pub monthdays: Option<String>,
    pub months: Option<String>,
    pub action: Option<String>,
    pub actionid: Option<String>,
    pub actionargs: Option<String>,
}

impl From<Row> for ScheduleTimeRow {
    fn from(row: Row) -> Self {
        Self {
            mode: row.get("mode"),
            hours: row.get("hours"),
            weekdays: row.get("weekdays"),
            monthdays: row.get("monthdays"),
            months: row.get("months"),
            action: row.get("action"),
            actionid: row.get("actionid"),
            actionargs: row.get("actionargs"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct VoicemailBox {
    pub id: i32,
    pub mailbox: String,
    pub context: String,
    pub language: Option<String>,
    pub skipcheckpass: bool,
}

impl From<Row> for VoicemailBox {
    fn from(row: Row) -> Self {
        Self {
            id: row.get("id"),
            mailbox: row.get("mailbox"),
            context: row.get("context"),
            language: row.get("language"),
            skipcheckpass: row.get::<_, i32>("skipcheckpass") != 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Agent {
    pub id: i32,
    pub tenant_uuid: String,
    pub number: String,
    pub passwd: Option<String>,
    pub language: Option<String>,
}

impl From<Row> for Agent {
    fn from(row: Row) -> Self {
        Self {
            id: row.get("id"),
            tenant_uuid: row.get("tenant_uuid"),
            number: row.get("number"),
            passwd: row.get("passwd"),
            language: row.get("language"),
        }
    }
}
