pub mod attendance;
pub mod breaks;
pub mod discipline;
pub mod focus;
pub mod students;
