use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies one submitted job. 128-bit random (UUID v4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// The all-zero id carried by the idle task (spec §6: "jobId = all-zero").
    pub const NIL: JobId = JobId(Uuid::nil());

    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Identifies one task within a job. Non-zero; zero is the idle-task sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(i32);

impl TaskId {
    /// The reserved idle-task sentinel.
    pub const IDLE: TaskId = TaskId(0);

    pub fn new(value: i32) -> Option<Self> {
        if value == 0 { None } else { Some(Self(value)) }
    }

    pub fn get(&self) -> i32 {
        self.0
    }

    pub fn is_idle(&self) -> bool {
        self.0 == 0
    }

    /// Draw a non-zero random id, retrying against `taken` until a free one
    /// is found. Expected O(1) while outstanding tasks stay far below 2^31.
    pub fn random_unused(mut taken: impl FnMut(TaskId) -> bool) -> TaskId {
        let mut rng = rand::thread_rng();
        loop {
            let candidate: i32 = rng.gen();
            let Some(id) = Self::new(candidate) else {
                continue;
            };
            if !taken(id) {
                return id;
            }
        }
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn task_id_rejects_zero() {
        assert!(TaskId::new(0).is_none());
        assert!(TaskId::new(1).is_some());
        assert!(TaskId::new(-1).is_some());
    }

    #[test]
    fn job_id_nil_is_distinguished() {
        assert!(JobId::NIL.is_nil());
        assert!(!JobId::new().is_nil());
    }

    #[test]
    fn random_unused_never_collides() {
        let mut taken = HashSet::new();
        for _ in 0..1000 {
            let id = TaskId::random_unused(|id| taken.contains(&id));
            assert!(taken.insert(id), "duplicate task id generated");
        }
    }
}
