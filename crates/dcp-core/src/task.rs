use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::ids::{JobId, TaskId};

/// One unit of work handed from the scheduler to a worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDescription {
    pub job_id: JobId,
    pub task_id: TaskId,
    #[serde(with = "serde_bytes_arc")]
    pub payload: Arc<[u8]>,
}

impl TaskDescription {
    pub fn new(job_id: JobId, task_id: TaskId, payload: impl Into<Arc<[u8]>>) -> Self {
        Self {
            job_id,
            task_id,
            payload: payload.into(),
        }
    }

    /// The sentinel instructing a worker to sleep `idle_seconds` and poll
    /// again (spec §4.3, §6: `{jobId = nil, taskId = 0, payload = varint seconds}`).
    pub fn idle(idle_seconds: u64) -> Self {
        Self {
            job_id: JobId::NIL,
            task_id: TaskId::IDLE,
            payload: idle_seconds.to_be_bytes().to_vec().into(),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.task_id.is_idle()
    }

    /// Decode the idle payload produced by [`TaskDescription::idle`].
    pub fn idle_seconds(&self) -> Option<u64> {
        if !self.is_idle() {
            return None;
        }
        let bytes: [u8; 8] = self.payload.as_ref().try_into().ok()?;
        Some(u64::from_be_bytes(bytes))
    }
}

mod serde_bytes_arc {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Arc<[u8]>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_bytes(bytes.as_ref())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Arc<[u8]>, D::Error> {
        let v: Vec<u8> = Vec::deserialize(d)?;
        Ok(v.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_task_roundtrips_seconds() {
        let t = TaskDescription::idle(42);
        assert!(t.is_idle());
        assert_eq!(t.idle_seconds(), Some(42));
        assert!(t.job_id.is_nil());
    }
}
