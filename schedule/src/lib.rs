//! Business-hours evaluation for call paths.
//!
//! A [`Schedule`] holds ordered closed and opened periods. Closed periods
//! take precedence and are evaluated in the order they were authored, so
//! the first matching closed period decides the forwarding action.

use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, Timelike, Utc};
use chrono_tz::Tz;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("invalid hours value {0:?}")]
    InvalidHours(String),

    #[error("end time before start time in {0:?}")]
    EndBeforeStart(String),

    #[error("invalid token {1:?} in {0:?}")]
    InvalidSet(String, String),

    #[error("unknown timezone {0:?}")]
    UnknownTimezone(String),
}

/// What to do with a call when its path is closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleAction {
    pub action: String,
    pub actionarg1: String,
    pub actionarg2: Option<String>,
}

impl ScheduleAction {
    pub fn new(action: &str, actionarg1: &str, actionarg2: Option<&str>) -> Self {
        Self {
            action: action.to_string(),
            actionarg1: actionarg1.to_string(),
            actionarg2: actionarg2.map(|arg| arg.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScheduleState {
    Opened,
    Closed(ScheduleAction),
}

/// Inclusive "HH:MM-HH:MM" window compared as (hour, minute) tuples.
/// Overnight ranges are not supported, the end has to be on or after
/// the start within the same day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoursChecker {
    start: (u32, u32),
    end: (u32, u32),
}

impl HoursChecker {
    pub fn new_from_value(value: &str) -> Result<Self, ScheduleError> {
        let (start, end) = value
            .split_once('-')
            .ok_or_else(|| ScheduleError::InvalidHours(value.to_string()))?;
        let start = parse_time(start)
            .ok_or_else(|| ScheduleError::InvalidHours(value.to_string()))?;
        let end = parse_time(end)
            .ok_or_else(|| ScheduleError::InvalidHours(value.to_string()))?;
        if start > end {
            return Err(ScheduleError::EndBeforeStart(value.to_string()));
        }
        Ok(Self { start, end })
    }

    pub fn is_in(&self, tested: &DateTime<Tz>) -> bool {
        let tested = (tested.hour(), tested.minute());
        self.start <= tested && tested <= self.end
    }
}

fn parse_time(value: &str) -> Option<(u32, u32)> {
    let (hour, minute) = value.split_once(':')?;
    if hour.len() != 2 || minute.len() != 2 {
        return None;
    }
    let hour: u32 = hour.parse().ok()?;
    let minute: u32 = minute.parse().ok()?;
    if hour > 23 || minute > 59 {
        return None;
    }
    Some((hour, minute))
}

/// Comma-separated integers and inclusive "a-b" ranges, e.g. "1,3-5".
#[derive(Debug, Clone)]
struct NumberSet {
    accepted: BTreeSet<u32>,
}

impl NumberSet {
    fn new_from_value(value: &str) -> Result<Self, ScheduleError> {
        let mut accepted = BTreeSet::new();
        for token in value.split(',') {
            match token.split_once('-') {
                Some((low, high)) => {
                    let low = parse_number(value, low)?;
                    let high = parse_number(value, high)?;
                    accepted.extend(low..=high);
                }
                None => {
                    accepted.insert(parse_number(value, token)?);
                }
            }
        }
        Ok(Self { accepted })
    }

    fn contains(&self, value: u32) -> bool {
        self.accepted.contains(&value)
    }
}

fn parse_number(set: &str, token: &str) -> Result<u32, ScheduleError> {
    token
        .trim()
        .parse()
        .map_err(|_| ScheduleError::InvalidSet(set.to_string(), token.to_string()))
}

/// ISO weekday numbers, 1 is Monday and 7 is Sunday.
#[derive(Debug, Clone)]
pub struct WeekdaysChecker(NumberSet);

impl WeekdaysChecker {
    pub fn new_from_value(value: &str) -> Result<Self, ScheduleError> {
        Ok(Self(NumberSet::new_from_value(value)?))
    }

    pub fn is_in(&self, tested: &DateTime<Tz>) -> bool {
        self.0.contains(tested.weekday().number_from_monday())
    }
}

#[derive(Debug, Clone)]
pub struct DaysChecker(NumberSet);

impl DaysChecker {
    pub fn new_from_value(value: &str) -> Result<Self, ScheduleError> {
        Ok(Self(NumberSet::new_from_value(value)?))
    }

    pub fn is_in(&self, tested: &DateTime<Tz>) -> bool {
        self.0.contains(tested.day())
    }
}

#[derive(Debug, Clone)]
pub struct MonthsChecker(NumberSet);

impl MonthsChecker {
    pub fn new_from_value(value: &str) -> Result<Self, ScheduleError> {
        Ok(Self(NumberSet::new_from_value(value)?))
    }

    pub fn is_in(&self, tested: &DateTime<Tz>) -> bool {
        self.0.contains(tested.month())
    }
}

#[derive(Debug, Clone)]
pub enum Checker {
    Hours(HoursChecker),
    Weekdays(WeekdaysChecker),
    Days(DaysChecker),
    Months(MonthsChecker),
}

impl Checker {
    pub fn is_in(&self, tested: &DateTime<Tz>) -> bool {
        match self {
            Checker::Hours(checker) => checker.is_in(tested),
            Checker::Weekdays(checker) => checker.is_in(tested),
            Checker::Days(checker) => checker.is_in(tested),
            Checker::Months(checker) => checker.is_in(tested),
        }
    }
}

/// A conjunction of checkers. A period with no checkers always matches.
#[derive(Debug, Clone)]
pub struct SchedulePeriod {
    checkers: Vec<Checker>,
    action: Option<ScheduleAction>,
}

impl SchedulePeriod {
    pub fn new(checkers: Vec<Checker>, action: Option<ScheduleAction>) -> Self {
        Self { checkers, action }
    }

    pub fn is_in(&self, tested: &DateTime<Tz>) -> bool {
        self.checkers.iter().all(|checker| checker.is_in(tested))
    }

    pub fn action(&self) -> Option<&ScheduleAction> {
        self.action.as_ref()
    }
}

#[derive(Debug, Clone)]
pub struct TimedSchedule {
    opened_periods: Vec<SchedulePeriod>,
    closed_periods: Vec<SchedulePeriod>,
    default_action: ScheduleAction,
    timezone: Tz,
}

impl TimedSchedule {
    pub fn new(
        opened_periods: Vec<SchedulePeriod>,
        closed_periods: Vec<SchedulePeriod>,
        default_action: ScheduleAction,
        timezone_name: &str,
    ) -> Result<Self, ScheduleError> {
        let timezone = timezone_name
            .parse::<Tz>()
            .map_err(|_| ScheduleError::UnknownTimezone(timezone_name.to_string()))?;
        Ok(Self {
            opened_periods,
            closed_periods,
            default_action,
            timezone,
        })
    }

    pub fn compute_state(&self, tested: &DateTime<Tz>) -> ScheduleState {
        for period in &self.closed_periods {
            if period.is_in(tested) {
                let action = period
                    .action()
                    .cloned()
                    .unwrap_or_else(|| self.default_action.clone());
                return ScheduleState::Closed(action);
            }
        }
        for period in &self.opened_periods {
            if period.is_in(tested) {
                return ScheduleState::Opened;
            }
        }
        ScheduleState::Closed(self.default_action.clone())
    }
}

#[derive(Debug, Clone)]
pub enum Schedule {
    /// No periods configured at all, the path is reachable at any time.
    AlwaysOpened,
    Timed(TimedSchedule),
}

impl Schedule {
    pub fn compute_state(&self, tested: &DateTime<Tz>) -> ScheduleState {
        match self {
            Schedule::AlwaysOpened => ScheduleState::Opened,
            Schedule::Timed(schedule) => schedule.compute_state(tested),
        }
    }

    pub fn compute_state_for_now(&self) -> ScheduleState {
        match self {
            Schedule::AlwaysOpened => ScheduleState::Opened,
            Schedule::Timed(schedule) => {
                let now = Utc::now().with_timezone(&schedule.timezone);
                schedule.compute_state(&now)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::Europe::London;

    fn at(hour: u32, minute: u32) -> DateTime<Tz> {
        // 2024-05-06 is a Monday
        London.with_ymd_and_hms(2024, 5, 6, hour, minute, 0).unwrap()
    }

    fn on_day(year: i32, month: u32, day: u32) -> DateTime<Tz> {
        London.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap()
    }

    fn action(name: &str) -> ScheduleAction {
        ScheduleAction::new(name, "1001", None)
    }

    #[test]
    fn hours_checker_boundaries_are_inclusive() {
        let checker = HoursChecker::new_from_value("09:00-17:00").unwrap();
        assert!(checker.is_in(&at(9, 0)));
        assert!(checker.is_in(&at(17, 0)));
        assert!(checker.is_in(&at(12, 30)));
        assert!(!checker.is_in(&at(8, 59)));
        assert!(!checker.is_in(&at(17, 1)));
    }

    #[test]
    fn hours_checker_rejects_invalid_values() {
        assert!(HoursChecker::new_from_value("25:00-26:00").is_err());
        assert!(HoursChecker::new_from_value("10:00-09:00").is_err());
        assert!(HoursChecker::new_from_value("09:60-10:00").is_err());
        assert!(HoursChecker::new_from_value("9:00-17:00").is_err());
        assert!(HoursChecker::new_from_value("09:00").is_err());
        assert!(HoursChecker::new_from_value("garbage").is_err());
    }

    #[test]
    fn weekdays_checker_expands_ranges() {
        let checker = WeekdaysChecker::new_from_value("1-5").unwrap();
        // 2024-05-06 is a Monday, 2024-05-10 a Friday
        assert!(checker.is_in(&on_day(2024, 5, 6)));
        assert!(checker.is_in(&on_day(2024, 5, 10)));
        assert!(!checker.is_in(&on_day(2024, 5, 11)));
        assert!(!checker.is_in(&on_day(2024, 5, 12)));
    }

    #[test]
    fn days_and_months_checkers_accept_sets_and_ranges() {
        let days = DaysChecker::new_from_value("1,15-17").unwrap();
        assert!(days.is_in(&on_day(2024, 5, 1)));
        assert!(days.is_in(&on_day(2024, 5, 16)));
        assert!(!days.is_in(&on_day(2024, 5, 2)));

        let months = MonthsChecker::new_from_value("12,6-8").unwrap();
        assert!(months.is_in(&on_day(2024, 7, 3)));
        assert!(months.is_in(&on_day(2024, 12, 3)));
        assert!(!months.is_in(&on_day(2024, 5, 3)));
    }

    #[test]
    fn set_checker_rejects_garbage_tokens() {
        assert!(WeekdaysChecker::new_from_value("1,x").is_err());
        assert!(DaysChecker::new_from_value("").is_err());
    }

    #[test]
    fn period_with_no_checkers_always_matches() {
        let period = SchedulePeriod::new(Vec::new(), None);
        assert!(period.is_in(&at(3, 33)));
    }

    #[test]
    fn period_is_a_conjunction_of_its_checkers() {
        let period = SchedulePeriod::new(
            vec![
                Checker::Hours(HoursChecker::new_from_value("09:00-17:00").unwrap()),
                Checker::Weekdays(WeekdaysChecker::new_from_value("1-5").unwrap()),
            ],
            None,
        );
        assert!(period.is_in(&at(10, 0)));
        // Saturday, inside hours
        assert!(!period.is_in(&London.with_ymd_and_hms(2024, 5, 11, 10, 0, 0).unwrap()));
        // Monday, outside hours
        assert!(!period.is_in(&at(18, 0)));
    }

    #[test]
    fn first_declared_closed_period_wins() {
        let first = SchedulePeriod::new(
            vec![Checker::Hours(HoursChecker::new_from_value("09:00-12:00").unwrap())],
            Some(action("first")),
        );
        let second = SchedulePeriod::new(
            vec![Checker::Hours(HoursChecker::new_from_value("09:00-17:00").unwrap())],
            Some(action("second")),
        );
        let schedule =
            TimedSchedule::new(Vec::new(), vec![first, second], action("default"), "Europe/London")
                .unwrap();

        match schedule.compute_state(&at(10, 0)) {
            ScheduleState::Closed(selected) => assert_eq!("first", selected.action),
            state => panic!("expected closed state, got {:?}", state),
        }
        match schedule.compute_state(&at(14, 0)) {
            ScheduleState::Closed(selected) => assert_eq!("second", selected.action),
            state => panic!("expected closed state, got {:?}", state),
        }
    }

    #[test]
    fn closed_periods_take_precedence_over_opened() {
        let opened = SchedulePeriod::new(
            vec![Checker::Hours(HoursChecker::new_from_value("08:00-18:00").unwrap())],
            None,
        );
        let closed = SchedulePeriod::new(
            vec![Checker::Hours(HoursChecker::new_from_value("12:00-13:00").unwrap())],
            Some(action("lunch")),
        );
        let schedule =
            TimedSchedule::new(vec![opened], vec![closed], action("default"), "Europe/London")
                .unwrap();

        assert_eq!(ScheduleState::Opened, schedule.compute_state(&at(10, 0)));
        match schedule.compute_state(&at(12, 30)) {
            ScheduleState::Closed(selected) => assert_eq!("lunch", selected.action),
            state => panic!("expected closed state, got {:?}", state),
        }
    }

    #[test]
    fn no_matching_period_returns_the_default_action() {
        let opened = SchedulePeriod::new(
            vec![Checker::Hours(HoursChecker::new_from_value("09:00-17:00").unwrap())],
            None,
        );
        let schedule =
            TimedSchedule::new(vec![opened], Vec::new(), action("voicemail"), "Europe/London")
                .unwrap();

        match schedule.compute_state(&at(20, 0)) {
            ScheduleState::Closed(selected) => assert_eq!("voicemail", selected.action),
            state => panic!("expected closed state, got {:?}", state),
        }
    }

    #[test]
    fn always_opened_ignores_the_timestamp() {
        let schedule = Schedule::AlwaysOpened;
        assert_eq!(ScheduleState::Opened, schedule.compute_state(&at(3, 0)));
        assert_eq!(ScheduleState::Opened, schedule.compute_state(&at(23, 59)));
        assert_eq!(ScheduleState::Opened, schedule.compute_state_for_now());
    }

    #[test]
    fn unknown_timezone_is_rejected_at_construction() {
        let result = TimedSchedule::new(
            Vec::new(),
            Vec::new(),
            action("default"),
            "Mars/Olympus_Mons",
        );
        assert!(matches!(result, Err(ScheduleError::UnknownTimezone(_))));
    }
}
