use anyhow::{anyhow, Result};
use schedule::{
    Checker, DaysChecker, HoursChecker, MonthsChecker, Schedule, ScheduleAction,
    SchedulePeriod, TimedSchedule, WeekdaysChecker,
};
use tokio_postgres::Transaction;

use crate::models::{Agent, ScheduleRow, ScheduleTimeRow, VoicemailBox};

const DEFAULT_TIMEZONE: &str = "UTC";

pub struct ScheduleDataMapper;

impl ScheduleDataMapper {
    /// Loads the schedule attached to a path (user, group, queue or
    /// incoming call route). Paths without a schedule, or with a disabled
    /// one, are always opened.
    pub async fn get_from_path(
        tx: &Transaction<'_>,
        path: &str,
        path_id: i32,
    ) -> Result<Schedule> {
        let row = tx
            .query_opt(
                "SELECT schedule_id FROM schedule_path \
                 WHERE path = $1 AND pathid = $2",
                &[&path, &path_id],
            )
            .await?;
        let Some(row) = row else {
            return Ok(Schedule::AlwaysOpened);
        };
        let schedule_id: i32 = row.get("schedule_id");

        let row = tx
            .query_opt(
                "SELECT timezone, fallback_action, fallback_actionid, fallback_actionargs \
                 FROM schedule WHERE id = $1 AND commented = 0",
                &[&schedule_id],
            )
            .await?;
        let Some(row) = row else {
            return Ok(Schedule::AlwaysOpened);
        };
        let schedule_row = ScheduleRow::from(row);

        // the row order is the authored period order, it decides which
        // closed period wins
        let periods = tx
            .query(
                "SELECT mode, hours, weekdays, monthdays, months, action, actionid, actionargs \
                 FROM schedule_time WHERE schedule_id = $1 ORDER BY id",
                &[&schedule_id],
            )
            .await?
            .into_iter()
            .map(ScheduleTimeRow::from)
            .collect();

        build_schedule(schedule_row, periods)
    }
}

/// Assembles a schedule from its configuration rows. Pure, so period
/// parsing and ordering are checked without a database.
pub fn build_schedule(schedule: ScheduleRow, times: Vec<ScheduleTimeRow>) -> Result<Schedule> {
    let timezone = schedule
        .timezone
        .as_deref()
        .filter(|timezone| !timezone.is_empty())
        .unwrap_or(DEFAULT_TIMEZONE);
    let default_action = ScheduleAction::new(
        &schedule.fallback_action,
        schedule.fallback_actionid.as_deref().unwrap_or(""),
        schedule.fallback_actionargs.as_deref(),
    );

    let mut opened_periods = Vec::new();
    let mut closed_periods = Vec::new();
    for time in times {
        let ScheduleTimeRow {
            mode,
            hours,
            weekdays,
            monthdays,
            months,
            action,
            actionid,
            actionargs,
        } = time;

        let mut checkers = Vec::new();
        if let Some(hours) = none_if_empty(hours) {
            checkers.push(Checker::Hours(HoursChecker::new_from_value(&hours)?));
        }
        if let Some(weekdays) = none_if_empty(weekdays) {
            checkers.push(Checker::Weekdays(WeekdaysChecker::new_from_value(&weekdays)?));
        }
        if let Some(monthdays) = none_if_empty(monthdays) {
            checkers.push(Checker::Days(DaysChecker::new_from_value(&monthdays)?));
        }
        if let Some(months) = none_if_empty(months) {
            checkers.push(Checker::Months(MonthsChecker::new_from_value(&months)?));
        }

        match mode.as_str() {
            "opened" => opened_periods.push(SchedulePeriod::new(checkers, None)),
            "closed" => {
                let action = action.map(|action| {
                    ScheduleAction::new(
                        &action,
                        actionid.as_deref().unwrap_or(""),
                        actionargs.as_deref(),
                    )
                });
                closed_periods.push(SchedulePeriod::new(checkers, action));
            }
            mode => return Err(anyhow!("unknown schedule period mode {:?}", mode)),
        }
    }

    Ok(Schedule::Timed(TimedSchedule::new(
        opened_periods,
        closed_periods,
        default_action,
        timezone,
    )?))
}

fn none_if_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.is_empty())
}

pub async fn voicemail_box_by_id(tx: &Transaction<'_>, id: i32) -> Result<VoicemailBox> {
    let row = tx
        .query_opt(
            "SELECT id, mailbox, context, language, skipcheckpass \
             FROM voicemail WHERE id = $1 AND commented = 0",
            &[&id],
        )
        .await?;
    row.map(VoicemailBox::from)
        .ok_or_else(|| anyhow!("no voicemail box with id {}", id))
}

pub async fn voicemail_box_by_mailbox(
    tx: &Transaction<'_>,
    mailbox: &str,
    context: &str,
) -> Result<VoicemailBox> {
    let row = tx
        .query_opt(
            "SELECT id, mailbox, context, language, skipcheckpass \
             FROM voicemail WHERE mailbox = $1 AND context = $2 AND commented = 0",
            &[&mailbox, &context],
        )
        .await?;
    row.map(VoicemailBox::from)
        .ok_or_else(|| anyhow!("no voicemail box {:?} in context {:?}", mailbox, context))
}

pub async fn agent_by_id(tx: &Transaction<'_>, id: i32) -> Result<Agent> {
    let row = tx
        .query_opt(
            "SELECT id, tenant_uuid::text AS tenant_uuid, number, passwd, language \
             FROM agentfeatures WHERE id = $1",
            &[&id],
        )
        .await?;
    row.map(Agent::from)
        .ok_or_else(|| anyhow!("no agent with id {}", id))
}

pub async fn agent_by_number(tx: &Transaction<'_>, number: &str) -> Result<Agent> {
    let row = tx
        .query_opt(
            "SELECT id, tenant_uuid::text AS tenant_uuid, number, passwd, language \
             FROM agentfeatures WHERE number = $1",
            &[&number],
        )
        .await?;
    row.map(Agent::from)
        .ok_or_else(|| anyhow!("no agent with number {:?}", number))
}

pub async fn user_language(tx: &Transaction<'_>, user_id: i32) -> Result<Option<String>> {
    let row = tx
        .query_opt(
            "SELECT language FROM userfeatures WHERE id = $1",
            &[&user_id],
        )
        .await?;
    Ok(row.and_then(|row| row.get("language")))
}
