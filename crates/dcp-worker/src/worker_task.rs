use std::sync::Arc;
use std::time::Duration;

use dcp_core::CoreError;

use crate::api::WorkerEvent;
use crate::context::WorkerContext;
use crate::sink::WorkerCancelSink;

/// One worker slot's loop (spec §4.5 "Worker loop", steps 1-7). Runs until
/// `ctx.should_stop()`.
pub async fn run(worker_idx: usize, ctx: Arc<WorkerContext>) {
    let mut idle_for: Option<Duration> = None;

    while !ctx.should_stop() {
        // (1) Wait for idling to end, if the previous round went idle.
        if let Some(duration) = idle_for.take() {
            let ctx_for_tick = ctx.clone();
            ctx.idle
                .wait_ticking(worker_idx, duration, move |elapsed| {
                    ctx_for_tick.emit(WorkerEvent::Idle { worker_idx, elapsed });
                })
                .await;
        }

        // (2) requestTask, through the reconnect adapter.
        let task = match ctx
            .reconnect
            .call(|| ctx.transport.request_task())
            .await
        {
            Ok(task) => task,
            Err(_) => continue, // DELEGATION_FAILED or similar: retry the loop.
        };

        // (3) Idle sentinel: remember to wait next round, then retry.
        if task.is_idle() {
            idle_for = Some(Duration::from_secs(
                task.idle_seconds().unwrap_or(ctx.config.finished_task_polling.as_secs()),
            ));
            continue;
        }

        // The requestTask above returned real work: if this worker had been
        // idling, wake any sibling still waiting on the designated poller
        // instead of making it sit out its own full idle interval (spec
        // §4.5: "If the designated poller ... has real work, it broadcasts").
        ctx.idle.broadcast_work_available();

        // (4) Record in the active set; fetch the executor (cache miss:
        // through the class-loader strategy); execute.
        let cancel_sink = Arc::new(WorkerCancelSink::new());
        ctx.active.insert(task.job_id, task.task_id, cancel_sink.clone()).await;
        ctx.emit(WorkerEvent::TaskStarted {
            worker_idx,
            job_id: task.job_id,
            task_id: task.task_id,
        });

        let outcome = run_one_task(&ctx, &task, &cancel_sink).await;

        ctx.active.remove(task.job_id, task.task_id).await;

        match outcome {
            Ok(result) => {
                // (5) Suppress submission if locally cancelled.
                if cancel_sink.is_cancel_pending() {
                    ctx.emit(WorkerEvent::TaskCancelled {
                        worker_idx,
                        job_id: task.job_id,
                        task_id: task.task_id,
                    });
                } else {
                    let _ = ctx
                        .reconnect
                        .call(|| ctx.transport.submit_task_results(task.job_id, task.task_id, result.clone()))
                        .await;
                    ctx.emit(WorkerEvent::TaskCompleted {
                        worker_idx,
                        job_id: task.job_id,
                        task_id: task.task_id,
                    });
                }
            }
            Err(message) => {
                // (6) On any exception, report it; the task is not
                // automatically resubmitted (spec §7).
                let _ = ctx
                    .reconnect
                    .call(|| ctx.transport.report_exception(task.job_id, task.task_id, message.clone()))
                    .await;
                ctx.emit(WorkerEvent::TaskFailed {
                    worker_idx,
                    job_id: task.job_id,
                    task_id: task.task_id,
                    message,
                });
            }
        }
        // (7) Re-enter the worker slot queue: falls out of this iteration.
    }
}

async fn run_one_task(
    ctx: &WorkerContext,
    task: &dcp_core::TaskDescription,
    cancel_sink: &Arc<WorkerCancelSink>,
) -> Result<Vec<u8>, String> {
    let executor = ctx
        .executor_cache
        .get_or_load(task.job_id, ctx.transport.as_ref(), ctx.executor_loader.as_ref())
        .await
        .map_err(|err| err.to_string())?;

    let executor = executor.clone();
    let task = task.clone();
    let sink = cancel_sink.clone();
    tokio::task::spawn_blocking(move || executor.execute(&task, sink.as_ref()))
        .await
        .map_err(|err| format!("executor task panicked: {err}"))?
        .map_err(|err: CoreError| err.to_string())
}
