use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quadrant {
    Q1,
    Q2,
    Q3,
    Q4,
    #[default]
    Inbox,
}

impl Quadrant {
    pub const ALL: [Quadrant; 5] = [
        Quadrant::Inbox,
        Quadrant::Q1,
        Quadrant::Q2,
        Quadrant::Q3,
        Quadrant::Q4,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Quadrant::Q1 => "q1",
            Quadrant::Q2 => "q2",
            Quadrant::Q3 => "q3",
            Quadrant::Q4 => "q4",
            Quadrant::Inbox => "inbox",
        }
    }

    /// Board heading for the quadrant (Eisenhower action)
    pub fn label(&self) -> &'static str {
        match self {
            Quadrant::Q1 => "Do (urgent, important)",
            Quadrant::Q2 => "Schedule (important)",
            Quadrant::Q3 => "Delegate (urgent)",
            Quadrant::Q4 => "Eliminate",
            Quadrant::Inbox => "Inbox",
        }
    }
}

impl fmt::Display for Quadrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Quadrant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "q1" => Ok(Quadrant::Q1),
            "q2" => Ok(Quadrant::Q2),
            "q3" => Ok(Quadrant::Q3),
            "q4" => Ok(Quadrant::Q4),
            "inbox" => Ok(Quadrant::Inbox),
            other => Err(format!(
                "unknown quadrant `{other}`; expected q1|q2|q3|q4|inbox"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Todo,
    Done,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    pub status: TaskStatus,
    pub quadrant: Quadrant,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_milliseconds_option"
    )]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>, // ISO 8601: YYYY-MM-DD
}

impl Task {
    pub fn new(title: String, created_at: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title,
            status: TaskStatus::Todo,
            quadrant: Quadrant::Inbox,
            created_at,
            completed_at: None,
            tags: Vec::new(),
            due_date: None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.status == TaskStatus::Done
    }

    /// `completed_at` is present exactly when the task is done
    pub fn completion_consistent(&self) -> bool {
        self.is_done() == self.completed_at.is_some()
    }

    /// Set status while keeping `completed_at` in step with it
    pub(crate) fn set_status(&mut self, status: TaskStatus, now: DateTime<Utc>) {
        if self.status == status {
            return;
        }
        self.status = status;
        self.completed_at = match status {
            TaskStatus::Done => Some(now),
            TaskStatus::Todo => None,
        };
    }
}

/// Partial update for a task. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub tags: Option<Vec<String>>,
    /// `Some(None)` clears the due date
    pub due_date: Option<Option<NaiveDate>>,
    pub quadrant: Option<Quadrant>,
    pub status: Option<TaskStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Habit {
    pub id: String,
    pub title: String,
    /// 0 = once per calendar day, otherwise minimum minutes between logs
    pub interval_minutes: u32,
    #[serde(default, with = "timestamp_list")]
    pub logs: Vec<DateTime<Utc>>,
    #[serde(default)]
    pub streak: u32,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl Habit {
    pub fn new(title: String, interval_minutes: u32, created_at: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title,
            interval_minutes,
            logs: Vec::new(),
            streak: 0,
            created_at,
        }
    }

    pub fn is_daily(&self) -> bool {
        self.interval_minutes == 0
    }

    pub fn last_log(&self) -> Option<DateTime<Utc>> {
        self.logs.last().copied()
    }
}

/// Derived readiness of a habit at a given instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HabitStatus {
    Ready,
    Completed,
    Cooldown { minutes_remaining: i64 },
}

impl fmt::Display for HabitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HabitStatus::Ready => f.write_str("ready"),
            HabitStatus::Completed => f.write_str("completed"),
            HabitStatus::Cooldown { minutes_remaining } => {
                write!(f, "cooldown ({minutes_remaining}m left)")
            }
        }
    }
}

/// Log timestamps travel as epoch milliseconds
mod timestamp_list {
    use chrono::{DateTime, Utc};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(logs: &[DateTime<Utc>], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(logs.iter().map(|ts| ts.timestamp_millis()))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Vec::<i64>::deserialize(deserializer)?;
        millis
            .into_iter()
            .map(|ms| {
                DateTime::from_timestamp_millis(ms)
                    .ok_or_else(|| D::Error::custom(format!("timestamp out of range: {ms}")))
            })
            .collect()
    }
}
