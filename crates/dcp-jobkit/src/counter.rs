use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use dcp_core::{CoreError, CoreResult, Job, JobId, ProgressSink, TaskDescription, TaskExecutor};

use crate::descriptor::JobDescriptor;
use crate::factory::JobFactory;

/// Parameters for the reference "counter job" used throughout spec §8's
/// end-to-end scenarios: emits `count` tasks labelled `0..count-1`, each
/// task's result is `task_id + increment`, and the job sums every result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CounterParams {
    pub count: u32,
    #[serde(default = "CounterParams::default_increment")]
    pub increment: u64,
}

impl CounterParams {
    fn default_increment() -> u64 {
        1
    }
}

/// Helper-class override format for class `"H"` (spec §8 scenario 4): a
/// job submitted with a per-job override of `H` picks up its `increment`
/// at submission time instead of the default of 1.
#[derive(Debug, Deserialize)]
struct HelperOverride {
    increment: u64,
}

pub struct CounterJob {
    job_id: JobId,
    next_task: u32,
    count: u32,
    increment: u64,
    sum: u64,
    accepted: u32,
    working_dir: PathBuf,
}

impl CounterJob {
    fn new(job_id: JobId, count: u32, increment: u64) -> Self {
        Self {
            job_id,
            next_task: 0,
            count,
            increment,
            sum: 0,
            accepted: 0,
            working_dir: PathBuf::new(),
        }
    }
}

impl Job for CounterJob {
    fn initialize(&mut self, working_dir: &Path) -> CoreResult<()> {
        self.working_dir = working_dir.to_path_buf();
        Ok(())
    }

    fn produce_next_task(&mut self) -> CoreResult<Option<Vec<u8>>> {
        if self.next_task >= self.count {
            return Ok(None);
        }
        let payload = (self.next_task as u64).to_be_bytes().to_vec();
        self.next_task += 1;
        Ok(Some(payload))
    }

    fn accept_results(&mut self, _task_payload: &[u8], result: &[u8]) -> CoreResult<f64> {
        let bytes: [u8; 8] = result.try_into().map_err(|_| CoreError::JobExecutionFailed {
            job_id: self.job_id,
            message: "counter result must be 8 bytes".to_string(),
        })?;
        self.sum += u64::from_be_bytes(bytes);
        self.accepted += 1;
        Ok(self.accepted as f64 / self.count.max(1) as f64)
    }

    fn is_complete(&self) -> bool {
        self.accepted >= self.count
    }

    fn finish(&mut self) -> CoreResult<()> {
        let path = self.working_dir.join("output.txt");
        std::fs::write(&path, format!("{}\n", self.sum)).map_err(|err| CoreError::JobExecutionFailed {
            job_id: self.job_id,
            message: format!("write output.txt: {err}"),
        })
    }

    fn task_executor_bytes(&self) -> CoreResult<Vec<u8>> {
        let params = CounterParams {
            count: self.count,
            increment: self.increment,
        };
        Ok(JobDescriptor::new("counter", serde_json::to_value(params).unwrap()).to_bytes())
    }

    fn save_state(&self, sink: &mut dyn std::io::Write) -> CoreResult<()> {
        let state = CounterState {
            next_task: self.next_task,
            sum: self.sum,
            accepted: self.accepted,
        };
        serde_json::to_writer(sink, &state).map_err(|err| CoreError::JobExecutionFailed {
            job_id: self.job_id,
            message: format!("save counter state: {err}"),
        })
    }

    fn restore_state(&mut self, source: &mut dyn std::io::Read) -> CoreResult<()> {
        let state: CounterState = serde_json::from_reader(source).map_err(|err| CoreError::JobExecutionFailed {
            job_id: self.job_id,
            message: format!("restore counter state: {err}"),
        })?;
        self.next_task = state.next_task;
        self.sum = state.sum;
        self.accepted = state.accepted;
        Ok(())
    }
}

/// Mid-flight progress checkpointed by [`Job::save_state`]/restored by
/// [`Job::restore_state`]: everything needed to resume a counter job besides
/// its original parameters (which are recovered from the resubmitted
/// descriptor bytes, not from this state).
#[derive(Debug, Serialize, Deserialize)]
struct CounterState {
    next_task: u32,
    sum: u64,
    accepted: u32,
}

pub struct CounterExecutor {
    increment: u64,
}

impl TaskExecutor for CounterExecutor {
    fn execute(&self, task: &TaskDescription, sink: &dyn ProgressSink) -> CoreResult<Vec<u8>> {
        let bytes: [u8; 8] = task
            .payload
            .as_ref()
            .try_into()
            .map_err(|_| CoreError::JobExecutionFailed {
                job_id: task.job_id,
                message: "counter task payload must be 8 bytes".to_string(),
            })?;
        let n = u64::from_be_bytes(bytes);
        sink.report_progress(1.0);
        Ok((n + self.increment).to_be_bytes().to_vec())
    }
}

pub struct CounterFactory;

impl JobFactory for CounterFactory {
    fn name(&self) -> &'static str {
        "counter"
    }

    fn create_job(&self, job_id: JobId, params: &serde_json::Value, helper: Option<&[u8]>) -> CoreResult<Box<dyn Job>> {
        let params: CounterParams = serde_json::from_value(params.clone()).map_err(|err| {
            CoreError::JobExecutionFailed {
                job_id,
                message: format!("invalid counter params: {err}"),
            }
        })?;
        let increment = match helper {
            Some(bytes) => serde_json::from_slice::<HelperOverride>(bytes)
                .map(|h| h.increment)
                .unwrap_or(params.increment),
            None => params.increment,
        };
        Ok(Box::new(CounterJob::new(job_id, params.count, increment)))
    }

    fn create_executor(&self, params: &serde_json::Value) -> CoreResult<Arc<dyn TaskExecutor>> {
        let params: CounterParams = serde_json::from_value(params.clone()).map_err(|err| {
            CoreError::JobExecutionFailed {
                job_id: JobId::NIL,
                message: format!("invalid counter params: {err}"),
            }
        })?;
        Ok(Arc::new(CounterExecutor {
            increment: params.increment,
        }))
    }
}
