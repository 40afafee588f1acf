pub mod backup;
pub mod cli;
pub mod clock;
pub mod config;
pub mod database;
pub mod habit_store;
pub mod logging;
pub mod models;
pub mod observer;
pub mod persistence;
pub mod streak;
pub mod task_store;
pub mod utils;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use database::Database;
pub use habit_store::{HabitState, HabitStore};
pub use models::{Habit, HabitStatus, Quadrant, Task, TaskPatch, TaskStatus};
pub use task_store::{TaskState, TaskStore};
pub use utils::Profile;
