//! Scheduling domain module.

mod due_action;

pub use due_action::{
    ActionArgs, ActionStatus, DueAction, NewQueuedAction, QueuedAction, ScheduleOutcome,
};
