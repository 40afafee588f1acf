//! Task board state: the active working set and the archive.
//!
//! # Invariants
//! - `completed_at` is present iff a task is done, after every operation.
//! - A task id appears in at most one of `tasks` / `archived_tasks`.
//! - Collections are never edited in place. Each observable mutation installs
//!   a new collection and notifies subscribers once; a call that changes
//!   nothing keeps the current collections and stays silent.

use chrono::NaiveDate;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

use crate::clock::Clock;
use crate::models::{Quadrant, Task, TaskPatch, TaskStatus};
use crate::observer::{StoreEvent, SubscriptionId, Subscribers};

const MS_PER_HOUR: i64 = 3_600_000;

/// Point-in-time view of the task store, persisted as `{ tasks, archivedTasks }`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskState {
    #[serde(default)]
    pub tasks: Arc<Vec<Task>>,
    #[serde(default)]
    pub archived_tasks: Arc<Vec<Task>>,
}

impl TaskState {
    pub fn new(tasks: Vec<Task>, archived_tasks: Vec<Task>) -> Self {
        Self {
            tasks: Arc::new(tasks),
            archived_tasks: Arc::new(archived_tasks),
        }
    }
}

pub struct TaskStore {
    state: TaskState,
    clock: Box<dyn Clock>,
    subscribers: Subscribers<TaskState>,
}

impl TaskStore {
    pub fn new(clock: Box<dyn Clock>) -> Self {
        Self::with_state(TaskState::default(), clock)
    }

    /// Build a store around previously saved state
    pub fn with_state(state: TaskState, clock: Box<dyn Clock>) -> Self {
        Self {
            state,
            clock,
            subscribers: Subscribers::default(),
        }
    }

    pub fn snapshot(&self) -> TaskState {
        self.state.clone()
    }

    pub fn tasks(&self) -> &[Task] {
        &self.state.tasks
    }

    pub fn archived_tasks(&self) -> &[Task] {
        &self.state.archived_tasks
    }

    /// Active task by id
    pub fn get(&self, id: &str) -> Option<&Task> {
        self.state.tasks.iter().find(|task| task.id == id)
    }

    pub fn get_archived(&self, id: &str) -> Option<&Task> {
        self.state.archived_tasks.iter().find(|task| task.id == id)
    }

    /// Active tasks placed in `quadrant`, in collection order
    pub fn in_quadrant(&self, quadrant: Quadrant) -> impl Iterator<Item = &Task> {
        self.state
            .tasks
            .iter()
            .filter(move |task| task.quadrant == quadrant)
    }

    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&TaskState, &StoreEvent) + 'static,
    {
        self.subscribers.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    /// Append a new todo task. Blank titles are ignored and return `None`.
    pub fn create(
        &mut self,
        title: &str,
        tags: Vec<String>,
        due_date: Option<NaiveDate>,
        quadrant: Quadrant,
    ) -> Option<String> {
        if title.trim().is_empty() {
            debug!("event=task_create_skipped reason=blank_title");
            return None;
        }

        let mut task = Task::new(title.to_string(), self.clock.now());
        task.tags = tags;
        task.due_date = due_date;
        task.quadrant = quadrant;
        let id = task.id.clone();

        let mut tasks = Vec::with_capacity(self.state.tasks.len() + 1);
        tasks.extend(self.state.tasks.iter().cloned());
        tasks.push(task);
        self.state.tasks = Arc::new(tasks);

        self.publish(StoreEvent::TaskCreated { id: id.clone() });
        Some(id)
    }

    /// Place a task in another quadrant. Returns true when something changed.
    pub fn move_to(&mut self, id: &str, target: Quadrant) -> bool {
        let Some(from) = self.get(id).map(|task| task.quadrant) else {
            return false;
        };
        if from == target {
            return false;
        }

        self.replace_active(id, |task| task.quadrant = target);
        self.publish(StoreEvent::TaskMoved {
            id: id.to_string(),
            from,
            to: target,
        });
        true
    }

    /// Flip a task between todo and done
    pub fn toggle(&mut self, id: &str) -> bool {
        let Some(done) = self.get(id).map(Task::is_done) else {
            return false;
        };

        let now = self.clock.now();
        let next = if done { TaskStatus::Todo } else { TaskStatus::Done };
        self.replace_active(id, |task| task.set_status(next, now));
        self.publish(StoreEvent::TaskToggled {
            id: id.to_string(),
            done: !done,
        });
        true
    }

    /// Remove a task from both collections. Deleting a missing id is a no-op.
    pub fn delete(&mut self, id: &str) -> bool {
        let in_active = self.get(id).is_some();
        let in_archive = self.get_archived(id).is_some();
        if !in_active && !in_archive {
            return false;
        }

        if in_active {
            self.state.tasks = Arc::new(without(&self.state.tasks, id));
        }
        if in_archive {
            self.state.archived_tasks = Arc::new(without(&self.state.archived_tasks, id));
        }
        self.publish(StoreEvent::TaskDeleted { id: id.to_string() });
        true
    }

    /// Merge `patch` into an active task.
    ///
    /// A blank title in the patch is ignored. A status change keeps
    /// `completed_at` consistent exactly as [`TaskStore::toggle`] does.
    pub fn update(&mut self, id: &str, patch: TaskPatch) -> bool {
        let Some(current) = self.get(id) else {
            return false;
        };

        let mut updated = current.clone();
        if let Some(title) = patch.title {
            if !title.trim().is_empty() {
                updated.title = title;
            }
        }
        if let Some(tags) = patch.tags {
            updated.tags = tags;
        }
        if let Some(due_date) = patch.due_date {
            updated.due_date = due_date;
        }
        if let Some(quadrant) = patch.quadrant {
            updated.quadrant = quadrant;
        }
        if let Some(status) = patch.status {
            updated.set_status(status, self.clock.now());
        }

        if &updated == current {
            return false;
        }

        self.replace_active(id, move |task| *task = updated);
        self.publish(StoreEvent::TaskUpdated { id: id.to_string() });
        true
    }

    /// Move done tasks completed more than `hours_delay` hours ago into the
    /// archive. A negative delay means never. Returns how many were moved.
    pub fn run_auto_archive(&mut self, hours_delay: i64) -> usize {
        if hours_delay < 0 {
            return 0;
        }

        let now = self.clock.now();
        let delay_ms = hours_delay.saturating_mul(MS_PER_HOUR);
        let eligible = |task: &Task| {
            task.is_done()
                && task
                    .completed_at
                    .is_some_and(|done_at| (now - done_at).num_milliseconds() > delay_ms)
        };

        if !self.state.tasks.iter().any(eligible) {
            return 0;
        }

        let (to_archive, active): (Vec<Task>, Vec<Task>) =
            self.state.tasks.iter().cloned().partition(|task| eligible(task));

        let ids: Vec<String> = to_archive.iter().map(|task| task.id.clone()).collect();
        let mut archived = Vec::with_capacity(self.state.archived_tasks.len() + to_archive.len());
        archived.extend(self.state.archived_tasks.iter().cloned());
        archived.extend(to_archive);

        self.state = TaskState::new(active, archived);
        info!(
            "event=auto_archive count={} delay_hours={}",
            ids.len(),
            hours_delay
        );
        let count = ids.len();
        self.publish(StoreEvent::TasksArchived { ids });
        count
    }

    /// Bring an archived task back to the active set as todo
    pub fn restore(&mut self, id: &str) -> bool {
        let Some(mut task) = self.get_archived(id).cloned() else {
            return false;
        };
        task.status = TaskStatus::Todo;
        task.completed_at = None;

        let mut tasks = Vec::with_capacity(self.state.tasks.len() + 1);
        tasks.extend(self.state.tasks.iter().cloned());
        tasks.push(task);

        self.state = TaskState::new(tasks, without(&self.state.archived_tasks, id));
        self.publish(StoreEvent::TaskRestored { id: id.to_string() });
        true
    }

    /// Swap in a whole new task set (backup import).
    ///
    /// `archived` of `None` keeps the current archive, minus any task whose
    /// id is now active again.
    pub fn replace_all(&mut self, tasks: Vec<Task>, archived: Option<Vec<Task>>) {
        let archived_tasks = match archived {
            Some(archived) => Arc::new(archived),
            None => {
                let active: HashSet<&str> = tasks.iter().map(|task| task.id.as_str()).collect();
                if self
                    .state
                    .archived_tasks
                    .iter()
                    .any(|task| active.contains(task.id.as_str()))
                {
                    Arc::new(
                        self.state
                            .archived_tasks
                            .iter()
                            .filter(|task| !active.contains(task.id.as_str()))
                            .cloned()
                            .collect(),
                    )
                } else {
                    Arc::clone(&self.state.archived_tasks)
                }
            }
        };
        self.state = TaskState {
            tasks: Arc::new(tasks),
            archived_tasks,
        };
        self.publish(StoreEvent::TasksReplaced {
            active: self.state.tasks.len(),
            archived: self.state.archived_tasks.len(),
        });
    }

    fn replace_active<F>(&mut self, id: &str, edit: F)
    where
        F: FnOnce(&mut Task),
    {
        let mut edit = Some(edit);
        let tasks = self
            .state
            .tasks
            .iter()
            .map(|task| {
                let mut task = task.clone();
                if task.id == id {
                    if let Some(edit) = edit.take() {
                        edit(&mut task);
                    }
                }
                task
            })
            .collect();
        self.state.tasks = Arc::new(tasks);
    }

    fn publish(&mut self, event: StoreEvent) {
        debug!(
            "event={} store=tasks active={} archived={}",
            event.name(),
            self.state.tasks.len(),
            self.state.archived_tasks.len()
        );
        self.subscribers.notify(&self.state, &event);
    }
}

impl std::fmt::Debug for TaskStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskStore")
            .field("state", &self.state)
            .field("subscribers", &self.subscribers)
            .finish()
    }
}

fn without(tasks: &[Task], id: &str) -> Vec<Task> {
    tasks.iter().filter(|task| task.id != id).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 2, 9, 0, 0).unwrap()
    }

    fn store() -> (TaskStore, ManualClock) {
        let clock = ManualClock::new(start());
        (TaskStore::new(Box::new(clock.clone())), clock)
    }

    fn add(store: &mut TaskStore, title: &str) -> String {
        store
            .create(title, Vec::new(), None, Quadrant::Inbox)
            .expect("title is not blank")
    }

    fn assert_consistent(store: &TaskStore) {
        for task in store.tasks().iter().chain(store.archived_tasks()) {
            assert!(task.completion_consistent(), "inconsistent task {task:?}");
        }
    }

    #[test]
    fn create_appends_todo_task_with_defaults() {
        let (mut store, _) = store();
        let id = store
            .create("Ship report", vec!["work".to_string()], None, Quadrant::Q2)
            .unwrap();

        let task = store.get(&id).unwrap();
        assert_eq!(task.status, TaskStatus::Todo);
        assert_eq!(task.quadrant, Quadrant::Q2);
        assert_eq!(task.created_at, start());
        assert_eq!(task.tags, vec!["work".to_string()]);
        assert!(task.completed_at.is_none());
    }

    #[test]
    fn create_ignores_blank_titles() {
        let (mut store, _) = store();
        assert!(store.create("   ", Vec::new(), None, Quadrant::Inbox).is_none());
        assert!(store.tasks().is_empty());
    }

    #[test]
    fn move_changes_quadrant_without_reordering() {
        let (mut store, _) = store();
        let a = add(&mut store, "a");
        let b = add(&mut store, "b");
        let c = add(&mut store, "c");

        assert!(store.move_to(&b, Quadrant::Q1));
        let order: Vec<&str> = store.tasks().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(order, vec![a.as_str(), b.as_str(), c.as_str()]);
        assert_eq!(store.in_quadrant(Quadrant::Q1).count(), 1);
        assert_eq!(store.in_quadrant(Quadrant::Inbox).count(), 2);
    }

    #[test]
    fn move_to_same_quadrant_or_missing_id_is_silent() {
        let (mut store, _) = store();
        let id = add(&mut store, "a");
        let calls = Rc::new(RefCell::new(0));
        {
            let calls = Rc::clone(&calls);
            store.subscribe(move |_, _| *calls.borrow_mut() += 1);
        }
        let before = store.snapshot();

        assert!(!store.move_to(&id, Quadrant::Inbox));
        assert!(!store.move_to("missing", Quadrant::Q1));
        assert!(!store.toggle("missing"));
        assert!(!store.update("missing", TaskPatch::default()));
        assert!(!store.restore("missing"));

        assert_eq!(*calls.borrow(), 0);
        assert!(Arc::ptr_eq(&before.tasks, &store.snapshot().tasks));
    }

    #[test]
    fn toggle_sets_and_clears_completed_at() {
        let (mut store, clock) = store();
        let id = add(&mut store, "a");

        clock.advance(Duration::minutes(5));
        store.toggle(&id);
        assert_eq!(store.get(&id).unwrap().status, TaskStatus::Done);
        assert_eq!(store.get(&id).unwrap().completed_at, Some(clock.now()));
        assert_consistent(&store);

        store.toggle(&id);
        assert_eq!(store.get(&id).unwrap().status, TaskStatus::Todo);
        assert!(store.get(&id).unwrap().completed_at.is_none());
        assert_consistent(&store);
    }

    #[test]
    fn delete_removes_from_both_collections_and_is_idempotent() {
        let (mut store, clock) = store();
        let active = add(&mut store, "active");
        let archived = add(&mut store, "archived");
        store.toggle(&archived);
        clock.advance(Duration::hours(2));
        store.run_auto_archive(1);
        assert_eq!(store.archived_tasks().len(), 1);

        assert!(store.delete(&active));
        assert!(store.delete(&archived));
        assert!(!store.delete(&archived));
        assert!(store.tasks().is_empty());
        assert!(store.archived_tasks().is_empty());
    }

    #[test]
    fn update_merges_fields_and_keeps_invariant() {
        let (mut store, _) = store();
        let id = add(&mut store, "draft");
        let due = NaiveDate::from_ymd_opt(2024, 4, 30);

        let changed = store.update(
            &id,
            TaskPatch {
                title: Some("final".to_string()),
                due_date: Some(due),
                status: Some(TaskStatus::Done),
                ..TaskPatch::default()
            },
        );
        assert!(changed);
        let task = store.get(&id).unwrap();
        assert_eq!(task.title, "final");
        assert_eq!(task.due_date, due);
        assert!(task.completed_at.is_some());
        assert_consistent(&store);

        let unchanged = store.update(
            &id,
            TaskPatch {
                title: Some("  ".to_string()),
                ..TaskPatch::default()
            },
        );
        assert!(!unchanged);
        assert_eq!(store.get(&id).unwrap().title, "final");
    }

    #[test]
    fn auto_archive_respects_delay_and_never() {
        let (mut store, clock) = store();
        let id = add(&mut store, "a");
        store.toggle(&id);

        clock.advance(Duration::hours(23));
        assert_eq!(store.run_auto_archive(24), 0);
        assert_eq!(store.run_auto_archive(-1), 0);

        clock.advance(Duration::hours(2));
        assert_eq!(store.run_auto_archive(-1), 0);
        assert_eq!(store.run_auto_archive(24), 1);
        assert!(store.get(&id).is_none());
        assert_eq!(store.get_archived(&id).unwrap().status, TaskStatus::Done);
    }

    #[test]
    fn auto_archive_is_idempotent() {
        let (mut store, clock) = store();
        let done = add(&mut store, "done");
        add(&mut store, "open");
        store.toggle(&done);
        clock.advance(Duration::hours(1));

        store.run_auto_archive(0);
        let first = store.snapshot();
        let events = Rc::new(RefCell::new(Vec::new()));
        {
            let events = Rc::clone(&events);
            store.subscribe(move |_, event| events.borrow_mut().push(event.clone()));
        }

        assert_eq!(store.run_auto_archive(0), 0);
        let second = store.snapshot();
        assert_eq!(first, second);
        assert!(Arc::ptr_eq(&first.tasks, &second.tasks));
        assert!(Arc::ptr_eq(&first.archived_tasks, &second.archived_tasks));
        assert!(events.borrow().is_empty());
    }

    #[test]
    fn restored_task_needs_fresh_completion_before_rearchiving() {
        let (mut store, clock) = store();
        let id = add(&mut store, "a");
        store.toggle(&id);
        clock.advance(Duration::hours(30));
        store.run_auto_archive(24);

        assert!(store.restore(&id));
        let task = store.get(&id).unwrap();
        assert_eq!(task.status, TaskStatus::Todo);
        assert!(task.completed_at.is_none());

        assert_eq!(store.run_auto_archive(0), 0);
        assert!(store.get(&id).is_some());
    }

    #[test]
    fn snapshots_are_not_affected_by_later_mutations() {
        let (mut store, _) = store();
        let id = add(&mut store, "a");
        let before = store.snapshot();
        store.toggle(&id);
        assert_eq!(before.tasks[0].status, TaskStatus::Todo);
        assert_eq!(store.tasks()[0].status, TaskStatus::Done);
    }

    #[test]
    fn replace_all_keeps_archive_when_not_given() {
        let (mut store, clock) = store();
        let id = add(&mut store, "a");
        store.toggle(&id);
        clock.advance(Duration::hours(1));
        store.run_auto_archive(0);

        let imported = Task::new("imported".to_string(), clock.now());
        store.replace_all(vec![imported], None);
        assert_eq!(store.tasks().len(), 1);
        assert_eq!(store.archived_tasks().len(), 1);

        store.replace_all(Vec::new(), Some(Vec::new()));
        assert!(store.archived_tasks().is_empty());
    }

    #[test]
    fn replace_all_drops_archived_copy_of_reimported_task() {
        let (mut store, clock) = store();
        let id = add(&mut store, "a");
        let exported = store.tasks().to_vec();

        store.toggle(&id);
        clock.advance(Duration::hours(30));
        assert_eq!(store.run_auto_archive(24), 1);

        store.replace_all(exported, None);
        assert!(store.get(&id).is_some());
        assert!(store.get_archived(&id).is_none());

        assert!(!store.restore(&id));
        let copies = store.tasks().iter().filter(|task| task.id == id).count();
        assert_eq!(copies, 1);
        assert_consistent(&store);
    }
}
