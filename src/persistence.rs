//! Saves store state after every mutation.
//!
//! The stores know nothing about storage. This module hydrates them from the
//! [`Database`] at start-up and subscribes a saver that writes the new
//! snapshot whenever a store publishes a change.

use log::{error, info};
use std::rc::Rc;

use crate::clock::Clock;
use crate::database::{Database, DatabaseError};
use crate::habit_store::{HabitState, HabitStore};
use crate::observer::SubscriptionId;
use crate::task_store::{TaskState, TaskStore};

pub const TASK_STORAGE_KEY: &str = "grid-task-storage";
pub const TASK_STORAGE_VERSION: u32 = 1;

pub const HABIT_STORAGE_KEY: &str = "grid-habit-storage";
pub const HABIT_STORAGE_VERSION: u32 = 2;

/// Task store holding the last saved state, or an empty one
pub fn load_task_store(db: &Database, clock: Box<dyn Clock>) -> Result<TaskStore, DatabaseError> {
    let state: TaskState = db
        .load(TASK_STORAGE_KEY, TASK_STORAGE_VERSION)?
        .unwrap_or_default();
    info!(
        "event=hydrate store=tasks active={} archived={}",
        state.tasks.len(),
        state.archived_tasks.len()
    );
    Ok(TaskStore::with_state(state, clock))
}

/// Habit store holding the last saved state, or an empty one
pub fn load_habit_store(db: &Database, clock: Box<dyn Clock>) -> Result<HabitStore, DatabaseError> {
    let state: HabitState = db
        .load(HABIT_STORAGE_KEY, HABIT_STORAGE_VERSION)?
        .unwrap_or_default();
    info!("event=hydrate store=habits count={}", state.habits.len());
    Ok(HabitStore::with_state(state, clock))
}

/// Write every published task snapshot to `db`.
///
/// Save failures are logged; they never reach the store or its caller.
pub fn attach_task_store(store: &mut TaskStore, db: Rc<Database>) -> SubscriptionId {
    store.subscribe(move |state, event| {
        if let Err(e) = db.save(TASK_STORAGE_KEY, TASK_STORAGE_VERSION, state) {
            error!(
                "event=persist_failed store=tasks trigger={} error={}",
                event.name(),
                e
            );
        }
    })
}

pub fn attach_habit_store(store: &mut HabitStore, db: Rc<Database>) -> SubscriptionId {
    store.subscribe(move |state, event| {
        if let Err(e) = db.save(HABIT_STORAGE_KEY, HABIT_STORAGE_VERSION, state) {
            error!(
                "event=persist_failed store=habits trigger={} error={}",
                event.name(),
                e
            );
        }
    })
}
