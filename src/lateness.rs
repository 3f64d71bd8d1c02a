use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;
use strum_macros::{AsRefStr, Display, EnumString};

/// Lateness of 30 minutes or more escalates the warning to the second tier.
pub const SECOND_TIER_THRESHOLD_MINUTES: u32 = 30;

pub const WARNING_CATEGORY: &str = "CAUTION";

/// What the person was late for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatenessContext {
    Arrival,
    OutingReturn,
    SleepReturn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, AsRefStr, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    LateWarning,
    LateReminder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WarningTier {
    One = 1,
    Two = 2,
}

impl WarningTier {
    pub fn count(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarningDraft {
    pub category: &'static str,
    pub reason: String,
    pub tier: WarningTier,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationDraft {
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
}

/// The rows a lateness evaluation asks the caller to append.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Consequence {
    pub warning: Option<WarningDraft>,
    pub notification: Option<NotificationDraft>,
}

impl Consequence {
    pub fn is_empty(&self) -> bool {
        self.warning.is_none() && self.notification.is_none()
    }
}

/// Whole minutes `actual` lies after `expected`, truncated, never negative.
pub fn minutes_late(expected: NaiveDateTime, actual: NaiveDateTime) -> u32 {
    if actual <= expected {
        return 0;
    }

    let minutes = (actual - expected).num_minutes();
    u32::try_from(minutes).unwrap_or(u32::MAX)
}

/// Joins a stored `HH:MM` schedule to a calendar date.
pub fn scheduled_at(date: NaiveDate, schedule: &str) -> Option<NaiveDateTime> {
    parse_schedule(schedule).map(|time| date.and_time(time))
}

/// Accepts `HH:MM` and `HH:MM:SS`.
pub fn parse_schedule(schedule: &str) -> Option<NaiveTime> {
    let schedule = schedule.trim();
    NaiveTime::parse_from_str(schedule, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(schedule, "%H:%M:%S"))
        .ok()
}

/// Decides which warning and notification a lateness of `minutes_late`
/// produces in `context`.
pub fn evaluate(context: LatenessContext, minutes_late: u32) -> Consequence {
    if minutes_late == 0 {
        return Consequence::default();
    }

    let (subject, title) = match context {
        LatenessContext::Arrival => ("Late arrival", "Late arrival caution issued"),
        LatenessContext::OutingReturn => ("Late return from outing", "Late return from outing"),
        LatenessContext::SleepReturn => {
            return Consequence {
                warning: None,
                notification: Some(NotificationDraft {
                    title: "Late return from sleep".to_string(),
                    message: format!("Returned from sleep {} minutes late.", minutes_late),
                    kind: NotificationKind::LateReminder,
                }),
            };
        }
    };

    let (tier, reason) = if minutes_late >= SECOND_TIER_THRESHOLD_MINUTES {
        (
            WarningTier::Two,
            format!(
                "{} by {} minutes ({} minutes or more)",
                subject, minutes_late, SECOND_TIER_THRESHOLD_MINUTES
            ),
        )
    } else {
        (WarningTier::One, format!("{} by {} minutes", subject, minutes_late))
    };

    let message = format!("{}: {} caution(s) issued.", reason, tier.count());

    Consequence {
        warning: Some(WarningDraft {
            category: WARNING_CATEGORY,
            reason,
            tier,
        }),
        notification: Some(NotificationDraft {
            title: title.to_string(),
            message,
            kind: NotificationKind::LateWarning,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 10)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn early_or_exact_is_never_late() {
        assert_eq!(minutes_late(at(9, 0, 0), at(8, 30, 0)), 0);
        assert_eq!(minutes_late(at(9, 0, 0), at(9, 0, 0)), 0);
        assert!(evaluate(LatenessContext::Arrival, 0).is_empty());
    }

    #[test]
    fn partial_minutes_are_truncated() {
        assert_eq!(minutes_late(at(9, 0, 0), at(9, 0, 59)), 0);
        assert_eq!(minutes_late(at(9, 0, 0), at(9, 1, 0)), 1);
        assert_eq!(minutes_late(at(9, 0, 0), at(9, 29, 59)), 29);
    }

    #[test]
    fn lateness_spans_midnight() {
        let expected = at(23, 50, 0);
        let actual = NaiveDate::from_ymd_opt(2025, 3, 11)
            .unwrap()
            .and_hms_opt(0, 5, 0)
            .unwrap();
        assert_eq!(minutes_late(expected, actual), 15);
    }

    #[test]
    fn arrival_under_threshold_is_first_tier() {
        let consequence = evaluate(LatenessContext::Arrival, 29);
        let warning = consequence.warning.expect("warning");
        assert_eq!(warning.tier, WarningTier::One);
        assert_eq!(warning.category, "CAUTION");
        assert!(warning.reason.contains("29"));

        let notification = consequence.notification.expect("notification");
        assert_eq!(notification.kind, NotificationKind::LateWarning);
        assert!(notification.message.contains("1 caution"));
    }

    #[test]
    fn arrival_at_threshold_is_second_tier() {
        let consequence = evaluate(LatenessContext::Arrival, 30);
        let warning = consequence.warning.expect("warning");
        assert_eq!(warning.tier.count(), 2);
        assert!(warning.reason.contains("30 minutes or more"));
        assert!(consequence.notification.is_some());
    }

    #[test]
    fn scheduled_nine_checked_in_nine_forty_five() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let expected = scheduled_at(date, "09:00").unwrap();
        let late = minutes_late(expected, at(9, 45, 0));
        assert_eq!(late, 45);

        let warning = evaluate(LatenessContext::Arrival, late).warning.unwrap();
        assert_eq!(warning.tier, WarningTier::Two);
    }

    #[test]
    fn outing_return_follows_arrival_tiers() {
        for minutes in [1, 15, 29, 30, 90] {
            let arrival = evaluate(LatenessContext::Arrival, minutes);
            let outing = evaluate(LatenessContext::OutingReturn, minutes);
            assert_eq!(
                arrival.warning.map(|w| w.tier),
                outing.warning.as_ref().map(|w| w.tier)
            );
            assert!(outing.warning.unwrap().reason.starts_with("Late return from outing"));
        }
    }

    #[test]
    fn sleep_return_only_reminds() {
        let expected = at(14, 0, 0);
        let late = minutes_late(expected, at(14, 10, 0));
        assert_eq!(late, 10);

        for minutes in [late, 45, 600] {
            let consequence = evaluate(LatenessContext::SleepReturn, minutes);
            assert!(consequence.warning.is_none());
            let notification = consequence.notification.expect("reminder");
            assert_eq!(notification.kind, NotificationKind::LateReminder);
        }
        assert!(evaluate(LatenessContext::SleepReturn, 0).is_empty());
    }

    #[test]
    fn schedule_parsing() {
        assert_eq!(parse_schedule("09:05"), NaiveTime::from_hms_opt(9, 5, 0));
        assert_eq!(parse_schedule(" 18:00:30 "), NaiveTime::from_hms_opt(18, 0, 30));
        assert_eq!(parse_schedule("9am"), None);
        assert_eq!(parse_schedule("25:00"), None);
    }

    #[test]
    fn notification_kind_strings() {
        assert_eq!(NotificationKind::LateWarning.as_ref(), "LATE_WARNING");
        assert_eq!(NotificationKind::LateReminder.to_string(), "LATE_REMINDER");
    }
}
