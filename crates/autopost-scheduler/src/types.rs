//! Scheduler types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::SchedulerError;

/// A daily local-time-of-day slot (wall-clock HH:MM).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SlotTime {
    hour: u8,
    minute: u8,
}

impl SlotTime {
    /// Create a slot time, validating the range.
    pub fn new(hour: u8, minute: u8) -> Result<Self, SchedulerError> {
        if hour > 23 || minute > 59 {
            return Err(SchedulerError::InvalidSlotTime(format!(
                "{hour:02}:{minute:02} is out of range"
            )));
        }
        Ok(Self { hour, minute })
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }
}

impl FromStr for SlotTime {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (h, m) = s
            .split_once(':')
            .ok_or_else(|| SchedulerError::InvalidSlotTime(format!("'{s}', expected HH:MM")))?;
        let hour = h
            .parse::<u8>()
            .map_err(|_| SchedulerError::InvalidSlotTime(format!("'{s}', expected HH:MM")))?;
        let minute = m
            .parse::<u8>()
            .map_err(|_| SchedulerError::InvalidSlotTime(format!("'{s}', expected HH:MM")))?;
        Self::new(hour, minute)
    }
}

impl fmt::Display for SlotTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl TryFrom<String> for SlotTime {
    type Error = SchedulerError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<SlotTime> for String {
    fn from(slot: SlotTime) -> Self {
        slot.to_string()
    }
}

/// Content-kind affinity of a job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Pick whichever pool has content (coin flip when both do).
    #[default]
    Any,
    /// Only publish from the image pool.
    Image,
    /// Only publish from the video pool.
    Video,
}

/// A configured daily publishing slot. Immutable after load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Stable identifier, also the key in the persisted state file.
    pub id: String,
    /// Local wall-clock fire time.
    #[serde(rename = "time")]
    pub slot: SlotTime,
    /// Which content pool this job draws from.
    #[serde(default)]
    pub kind: JobKind,
}

/// The static, ordered set of configured jobs.
///
/// Validated at construction: ids must be unique and non-empty, and no
/// two jobs may share a slot time (simultaneous posts are a fatal
/// configuration error, not a runtime race to tolerate).
#[derive(Debug, Clone)]
pub struct JobTable {
    jobs: Vec<Job>,
}

impl JobTable {
    /// Build a table from an ordered list of jobs, validating invariants.
    pub fn new(jobs: Vec<Job>) -> Result<Self, SchedulerError> {
        if jobs.is_empty() {
            return Err(SchedulerError::EmptyJobTable);
        }

        for (i, job) in jobs.iter().enumerate() {
            if job.id.is_empty() {
                return Err(SchedulerError::InvalidJobTable(
                    "job with empty id".to_string(),
                ));
            }
            for earlier in &jobs[..i] {
                if earlier.id == job.id {
                    return Err(SchedulerError::DuplicateJobId(job.id.clone()));
                }
                if earlier.slot == job.slot {
                    return Err(SchedulerError::DuplicateSlot {
                        slot: job.slot.to_string(),
                        first: earlier.id.clone(),
                        second: job.id.clone(),
                    });
                }
            }
        }

        Ok(Self { jobs })
    }

    /// Parse a table from its JSON representation:
    /// `[{"id": "slot_1", "time": "09:30", "kind": "any"}, ...]`.
    pub fn from_json(s: &str) -> Result<Self, SchedulerError> {
        let jobs: Vec<Job> = serde_json::from_str(s)
            .map_err(|e| SchedulerError::InvalidJobTable(e.to_string()))?;
        Self::new(jobs)
    }

    /// The built-in three daily slots used when no jobs file is given.
    pub fn default_slots() -> Self {
        let jobs = [("slot_1", 9, 30), ("slot_2", 15, 0), ("slot_3", 20, 0)]
            .into_iter()
            .map(|(id, hour, minute)| Job {
                id: id.to_string(),
                slot: SlotTime { hour, minute },
                kind: JobKind::Any,
            })
            .collect();
        // Static table with distinct times, cannot fail validation
        Self { jobs }
    }

    /// Jobs in configuration order.
    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Whether the table contains a job with the given id.
    pub fn contains(&self, id: &str) -> bool {
        self.jobs.iter().any(|j| j.id == id)
    }
}
