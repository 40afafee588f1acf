use chrono::NaiveDate;
use log::debug;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::clock::Clock;
use crate::models::{Habit, HabitStatus};
use crate::observer::{StoreEvent, SubscriptionId, Subscribers};
use crate::streak::{self, HabitActivity};

/// Point-in-time view of the habit store, persisted as `{ habits }`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HabitState {
    #[serde(default)]
    pub habits: Arc<Vec<Habit>>,
}

impl HabitState {
    pub fn new(habits: Vec<Habit>) -> Self {
        Self {
            habits: Arc::new(habits),
        }
    }
}

pub struct HabitStore {
    state: HabitState,
    clock: Box<dyn Clock>,
    subscribers: Subscribers<HabitState>,
}

impl HabitStore {
    pub fn new(clock: Box<dyn Clock>) -> Self {
        Self::with_state(HabitState::default(), clock)
    }

    pub fn with_state(state: HabitState, clock: Box<dyn Clock>) -> Self {
        Self {
            state,
            clock,
            subscribers: Subscribers::default(),
        }
    }

    pub fn snapshot(&self) -> HabitState {
        self.state.clone()
    }

    pub fn habits(&self) -> &[Habit] {
        &self.state.habits
    }

    pub fn get(&self, id: &str) -> Option<&Habit> {
        self.state.habits.iter().find(|habit| habit.id == id)
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&HabitState, &StoreEvent) + 'static,
    {
        self.subscribers.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    /// Start tracking a habit. `interval_minutes == 0` means once per day.
    pub fn create(&mut self, title: &str, interval_minutes: u32) -> Option<String> {
        if title.trim().is_empty() {
            debug!("event=habit_create_skipped reason=blank_title");
            return None;
        }

        let habit = Habit::new(title.to_string(), interval_minutes, self.clock.now());
        let id = habit.id.clone();

        let mut habits = Vec::with_capacity(self.state.habits.len() + 1);
        habits.extend(self.state.habits.iter().cloned());
        habits.push(habit);
        self.state.habits = Arc::new(habits);

        self.publish(StoreEvent::HabitCreated { id: id.clone() });
        Some(id)
    }

    /// Record a repetition now and refresh the cached streak.
    ///
    /// Returns the new streak, or `None` when no habit has this id.
    pub fn log(&mut self, id: &str) -> Option<u32> {
        self.get(id)?;

        let now = self.clock.now();
        let mut new_streak = 0;
        let habits = self
            .state
            .habits
            .iter()
            .map(|habit| {
                if habit.id != id {
                    return habit.clone();
                }
                let mut habit = habit.clone();
                habit.logs.push(now);
                habit.streak =
                    streak::compute_streak(&habit.logs, habit.interval_minutes, now, self.clock.as_ref());
                new_streak = habit.streak;
                habit
            })
            .collect();
        self.state.habits = Arc::new(habits);

        self.publish(StoreEvent::HabitLogged {
            id: id.to_string(),
            streak: new_streak,
        });
        Some(new_streak)
    }

    /// Drop a habit together with its history
    pub fn remove(&mut self, id: &str) -> bool {
        if self.get(id).is_none() {
            return false;
        }
        let habits = self
            .state
            .habits
            .iter()
            .filter(|habit| habit.id != id)
            .cloned()
            .collect();
        self.state.habits = Arc::new(habits);
        self.publish(StoreEvent::HabitRemoved { id: id.to_string() });
        true
    }

    /// Readiness of `habit` at the clock's current time
    pub fn status(&self, habit: &Habit) -> HabitStatus {
        streak::habit_status(habit, self.clock.now(), self.clock.as_ref())
    }

    /// Log counts for the last `days` local days
    pub fn activity(&self, habit: &Habit, days: u32) -> HabitActivity {
        let today: NaiveDate = self.clock.today();
        streak::habit_activity(habit, today, days, self.clock.as_ref())
    }

    /// Swap in a whole new habit set (backup import)
    pub fn replace_all(&mut self, habits: Vec<Habit>) {
        self.state = HabitState::new(habits);
        self.publish(StoreEvent::HabitsReplaced {
            count: self.state.habits.len(),
        });
    }

    fn publish(&mut self, event: StoreEvent) {
        debug!(
            "event={} store=habits count={}",
            event.name(),
            self.state.habits.len()
        );
        self.subscribers.notify(&self.state, &event);
    }
}

impl std::fmt::Debug for HabitStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HabitStore")
            .field("state", &self.state)
            .field("subscribers", &self.subscribers)
            .finish()
    }
}
