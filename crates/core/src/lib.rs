#![forbid(unsafe_code)]

pub mod eligibility;
pub mod model;
pub mod time;
pub mod timer;

pub use time::Clock;
pub use timer::{QuizTimer, TimerEvent, TimerState};
