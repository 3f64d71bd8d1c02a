pub mod activity;
pub mod attendance;
pub mod break_request;
pub mod focus_session;
pub mod notification;
pub mod role;
pub mod student;
pub mod warning;
