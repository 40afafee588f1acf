//! Change notification for the stores.
//!
//! Every observable mutation of a store produces a [`StoreEvent`]. The store
//! hands that event, together with its new snapshot, to each subscriber in
//! subscription order before the mutating call returns.

use serde::{Deserialize, Serialize};

use crate::models::Quadrant;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StoreEvent {
    TaskCreated { id: String },
    TaskMoved { id: String, from: Quadrant, to: Quadrant },
    TaskToggled { id: String, done: bool },
    TaskDeleted { id: String },
    TaskUpdated { id: String },
    TasksArchived { ids: Vec<String> },
    TaskRestored { id: String },
    TasksReplaced { active: usize, archived: usize },
    HabitCreated { id: String },
    HabitLogged { id: String, streak: u32 },
    HabitRemoved { id: String },
    HabitsReplaced { count: usize },
}

impl StoreEvent {
    /// Stable name used in log lines
    pub fn name(&self) -> &'static str {
        match self {
            StoreEvent::TaskCreated { .. } => "task_created",
            StoreEvent::TaskMoved { .. } => "task_moved",
            StoreEvent::TaskToggled { .. } => "task_toggled",
            StoreEvent::TaskDeleted { .. } => "task_deleted",
            StoreEvent::TaskUpdated { .. } => "task_updated",
            StoreEvent::TasksArchived { .. } => "tasks_archived",
            StoreEvent::TaskRestored { .. } => "task_restored",
            StoreEvent::TasksReplaced { .. } => "tasks_replaced",
            StoreEvent::HabitCreated { .. } => "habit_created",
            StoreEvent::HabitLogged { .. } => "habit_logged",
            StoreEvent::HabitRemoved { .. } => "habit_removed",
            StoreEvent::HabitsReplaced { .. } => "habits_replaced",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback<S> = Box<dyn FnMut(&S, &StoreEvent)>;

/// Ordered list of callbacks interested in snapshots of type `S`
pub struct Subscribers<S> {
    next_id: u64,
    callbacks: Vec<(SubscriptionId, Callback<S>)>,
}

impl<S> Default for Subscribers<S> {
    fn default() -> Self {
        Self {
            next_id: 0,
            callbacks: Vec::new(),
        }
    }
}

impl<S> Subscribers<S> {
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&S, &StoreEvent) + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.callbacks.push((id, Box::new(callback)));
        id
    }

    /// Returns false when `id` was not subscribed
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.callbacks.len();
        self.callbacks.retain(|(existing, _)| *existing != id);
        self.callbacks.len() != before
    }

    pub fn notify(&mut self, snapshot: &S, event: &StoreEvent) {
        for (_, callback) in self.callbacks.iter_mut() {
            callback(snapshot, event);
        }
    }
}

impl<S> std::fmt::Debug for Subscribers<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscribers")
            .field("count", &self.callbacks.len())
            .finish()
    }
}
