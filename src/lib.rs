//! Weekly class-slot scheduling.
//!
//! Given students who each want a number of weekly sessions drawn from a
//! set of acceptable slots, and a per-slot capacity, computes a
//! conflict-free timetable that honours as many requested sessions as
//! possible. See [`engine::schedule`] for the entry point.

pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod model;
pub mod normalize;
pub mod solver;
pub mod validate;

pub use config::{CapacityRule, SchedulerConfig, SolverMode, TieBreak, WeekGrid, WeightPolicy};
pub use data::{
    Assignment, RawStudentRecord, ScheduleResult, SchedulingInput, Slot, SlotUniverse,
    StudentRequest, Weekday,
};
pub use engine::{schedule, schedule_input, schedule_raw};
pub use error::{InputError, RosterErrors, SchedulerError};
