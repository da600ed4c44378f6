use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use dcp_core::{CoreResult, JobId, TaskId};

use crate::finalize::{saved_job_path, saved_task_path, write_atomic};
use crate::job::ScheduledJob;

/// On-disk shape of `<outputDir>/saved/<jobId>` (spec §6's optional resume
/// layout): enough to reconstruct an equivalent `Job` instance through the
/// same class loader and fast-forward it with `Job::restore_state`.
#[derive(Debug, Serialize, Deserialize)]
pub struct JobCheckpoint {
    pub job_id: JobId,
    pub description: String,
    pub priority: u32,
    pub class_name: String,
    pub submitted_bytes: Vec<u8>,
    pub job_state: Vec<u8>,
}

/// Write a job's current checkpoint, called after submission and after every
/// accepted result so a coordinator restart loses at most the in-flight
/// tasks since the last checkpoint, not the whole job.
pub fn write_checkpoint(output_dir: &std::path::Path, job: &ScheduledJob) -> CoreResult<()> {
    let (Some(class_name), Some(submitted_bytes)) =
        (job.submitted_class_name.clone(), job.submitted_bytes.clone())
    else {
        return Ok(());
    };
    let Some(instance) = job.job.as_ref() else {
        return Ok(());
    };

    let mut job_state = Vec::new();
    instance.save_state(&mut job_state)?;

    let checkpoint = JobCheckpoint {
        job_id: job.id,
        description: job.description.clone(),
        priority: job.priority,
        class_name,
        submitted_bytes: submitted_bytes.to_vec(),
        job_state,
    };
    let bytes = serde_json::to_vec(&checkpoint).map_err(|err| dcp_core::CoreError::JobExecutionFailed {
        job_id: job.id,
        message: format!("serialize checkpoint: {err}"),
    })?;
    write_atomic(&saved_job_path(output_dir, job.id), &bytes).map_err(|err| dcp_core::CoreError::JobExecutionFailed {
        job_id: job.id,
        message: format!("write checkpoint: {err}"),
    })
}

/// Delete a job's checkpoint once it is no longer resumable (finalized or
/// cancelled), so a later restart does not try to resume a dead job.
pub fn remove_checkpoint(output_dir: &std::path::Path, job_id: JobId) {
    let _ = std::fs::remove_file(saved_job_path(output_dir, job_id));
}

/// List every checkpoint currently on disk under `<outputDir>/saved/`,
/// skipping unreadable or malformed entries (a partially-written checkpoint
/// from a crash mid-write is just dropped, not fatal to startup).
pub fn list_checkpoints(output_dir: &std::path::Path) -> Vec<JobCheckpoint> {
    let dir = output_dir.join("saved");
    let Ok(entries) = std::fs::read_dir(&dir) else {
        return Vec::new();
    };
    entries
        .filter_map(Result::ok)
        .filter_map(|entry| std::fs::read(entry.path()).ok())
        .filter_map(|bytes| serde_json::from_slice::<JobCheckpoint>(&bytes).ok())
        .collect()
}

/// Mirror a job's currently outstanding (handed-to-a-worker, not yet
/// accepted) task payloads under `<outputDir>/tasks/<jobId>/<taskId>` (spec
/// §6's `tasks/<jobId>/<taskId>` layout), so a resumed job can re-offer them
/// to a worker immediately instead of waiting on `produce_next_task` to
/// reissue equivalent work. Replaces the whole directory each call since the
/// outstanding set only ever shrinks (a result accepted) or grows by one (a
/// refill) between checkpoints.
pub fn write_task_checkpoints(
    output_dir: &std::path::Path,
    job_id: JobId,
    outstanding: &HashMap<TaskId, Arc<[u8]>>,
) -> CoreResult<()> {
    let dir = output_dir.join("tasks").join(job_id.to_string());
    let _ = std::fs::remove_dir_all(&dir);
    for (task_id, payload) in outstanding {
        write_atomic(&saved_task_path(output_dir, job_id, task_id.get()), payload).map_err(|err| {
            dcp_core::CoreError::JobExecutionFailed {
                job_id,
                message: format!("write task checkpoint: {err}"),
            }
        })?;
    }
    Ok(())
}

/// Delete a job's persisted outstanding-task payloads once it is no longer
/// resumable (finalized or cancelled).
pub fn remove_task_checkpoints(output_dir: &std::path::Path, job_id: JobId) {
    let _ = std::fs::remove_dir_all(output_dir.join("tasks").join(job_id.to_string()));
}

/// List every outstanding task payload persisted for `job_id`, skipping
/// entries whose file name isn't a valid non-zero task id.
pub fn list_task_checkpoints(output_dir: &std::path::Path, job_id: JobId) -> Vec<(TaskId, Vec<u8>)> {
    let dir = output_dir.join("tasks").join(job_id.to_string());
    let Ok(entries) = std::fs::read_dir(&dir) else {
        return Vec::new();
    };
    entries
        .filter_map(Result::ok)
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            let task_id = TaskId::new(name.parse().ok()?)?;
            let bytes = std::fs::read(entry.path()).ok()?;
            Some((task_id, bytes))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::ScheduledJob;
    use dcp_core::Job as JobTrait;
    use std::sync::Arc;

    struct DummyJob;
    impl JobTrait for DummyJob {
        fn initialize(&mut self, _working_dir: &std::path::Path) -> CoreResult<()> {
            Ok(())
        }
        fn produce_next_task(&mut self) -> CoreResult<Option<Vec<u8>>> {
            Ok(None)
        }
        fn accept_results(&mut self, _task_payload: &[u8], _result: &[u8]) -> CoreResult<f64> {
            Ok(1.0)
        }
        fn is_complete(&self) -> bool {
            true
        }
        fn finish(&mut self) -> CoreResult<()> {
            Ok(())
        }
        fn task_executor_bytes(&self) -> CoreResult<Vec<u8>> {
            Ok(Vec::new())
        }
        fn save_state(&self, sink: &mut dyn std::io::Write) -> CoreResult<()> {
            sink.write_all(b"dummy-state").unwrap();
            Ok(())
        }
    }

    #[test]
    fn write_then_list_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let job_id = JobId::new();
        let registry = dcp_registry::Registry::new(Arc::new(dcp_registry::InMemoryStore::new()));
        let snapshot = registry.new_child_snapshot();
        let mut job = ScheduledJob::new(job_id, "d".into(), snapshot, tmp.path().into(), 20);
        job.submitted_class_name = Some("counter".into());
        job.submitted_bytes = Some(Arc::from(b"{}".to_vec()));
        job.job = Some(Box::new(DummyJob));

        write_checkpoint(tmp.path(), &job).unwrap();
        let checkpoints = list_checkpoints(tmp.path());
        assert_eq!(checkpoints.len(), 1);
        assert_eq!(checkpoints[0].job_id, job_id);
        assert_eq!(checkpoints[0].class_name, "counter");
        assert_eq!(checkpoints[0].job_state, b"dummy-state");

        remove_checkpoint(tmp.path(), job_id);
        assert!(list_checkpoints(tmp.path()).is_empty());
    }

    #[test]
    fn task_checkpoints_round_trip_and_shrink() {
        let tmp = tempfile::tempdir().unwrap();
        let job_id = JobId::new();
        let mut outstanding = HashMap::new();
        outstanding.insert(TaskId::new(1).unwrap(), Arc::from(b"a".to_vec()));
        outstanding.insert(TaskId::new(2).unwrap(), Arc::from(b"b".to_vec()));

        write_task_checkpoints(tmp.path(), job_id, &outstanding).unwrap();
        let mut persisted = list_task_checkpoints(tmp.path(), job_id);
        persisted.sort_by_key(|(id, _)| id.get());
        assert_eq!(persisted, vec![
            (TaskId::new(1).unwrap(), b"a".to_vec()),
            (TaskId::new(2).unwrap(), b"b".to_vec()),
        ]);

        outstanding.remove(&TaskId::new(1).unwrap());
        write_task_checkpoints(tmp.path(), job_id, &outstanding).unwrap();
        let persisted = list_task_checkpoints(tmp.path(), job_id);
        assert_eq!(persisted, vec![(TaskId::new(2).unwrap(), b"b".to_vec())]);

        remove_task_checkpoints(tmp.path(), job_id);
        assert!(list_task_checkpoints(tmp.path(), job_id).is_empty());
    }
}
