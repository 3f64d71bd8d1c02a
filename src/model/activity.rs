use strum_macros::{AsRefStr, Display};

use crate::model::break_request::BreakKind;

/// Audit log entry kinds written to `activities.kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityKind {
    CheckIn,
    CheckOut,
    OutingRequest,
    SleepRequest,
    BreakReturn,
    FocusStart,
    FocusStop,
    Login,
    Logout,
    Signup,
}

impl ActivityKind {
    pub fn break_request(kind: BreakKind) -> Self {
        match kind {
            BreakKind::Outing => ActivityKind::OutingRequest,
            BreakKind::Sleep => ActivityKind::SleepRequest,
        }
    }
}
