//! Pluggable in-memory task scheduler (spec component C2).
//!
//! All five operations are linearizable behind a single mutex with short
//! critical sections, per spec §4.2/§9 ("prefer a single lock ... avoid
//! fine-grained lock hierarchies").

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use dcp_core::{JobId, TaskDescription, TaskId};
use rand::Rng;

/// One job's worth of queued tasks plus its scheduling priority.
struct JobQueue {
    priority: u32,
    tasks: VecDeque<TaskDescription>,
}

/// The reference "priority-serial" policy from spec §4.2: jobs are picked
/// with probability proportional to priority among jobs that have at least
/// one task; within a job, tasks come out FIFO.
pub struct Scheduler {
    state: Mutex<HashMap<JobId, JobQueue>>,
    default_priority: u32,
}

impl Scheduler {
    pub fn new(default_priority: u32) -> Self {
        Self {
            state: Mutex::new(HashMap::new()),
            default_priority: default_priority.max(1),
        }
    }

    pub fn add(&self, task: TaskDescription) {
        let mut state = self.state.lock().unwrap();
        let queue = state.entry(task.job_id).or_insert_with(|| JobQueue {
            priority: self.default_priority,
            tasks: VecDeque::new(),
        });
        queue.tasks.push_back(task);
    }

    pub fn remove(&self, job_id: JobId, task_id: TaskId) -> Option<TaskDescription> {
        let mut state = self.state.lock().unwrap();
        let queue = state.get_mut(&job_id)?;
        let pos = queue.tasks.iter().position(|t| t.task_id == task_id)?;
        queue.tasks.remove(pos)
    }

    pub fn contains(&self, job_id: JobId, task_id: TaskId) -> bool {
        let state = self.state.lock().unwrap();
        state
            .get(&job_id)
            .is_some_and(|q| q.tasks.iter().any(|t| t.task_id == task_id))
    }

    /// Pick one task, weighted by job priority among jobs with at least one
    /// task. Returns `None` if every job's queue is empty.
    pub fn pick_next(&self) -> Option<TaskDescription> {
        let mut state = self.state.lock().unwrap();

        let total_weight: u64 = state
            .values()
            .filter(|q| !q.tasks.is_empty())
            .map(|q| q.priority as u64)
            .sum();
        if total_weight == 0 {
            return None;
        }

        let mut draw = rand::thread_rng().gen_range(0..total_weight);
        // HashMap iteration order is arbitrary per-call but that's fine: the
        // weighting, not the iteration order, determines selection
        // probability, and ties within a job are broken by FIFO order.
        for queue in state.values_mut() {
            if queue.tasks.is_empty() {
                continue;
            }
            let weight = queue.priority as u64;
            if draw < weight {
                return queue.tasks.pop_front();
            }
            draw -= weight;
        }
        None
    }

    pub fn set_priority(&self, job_id: JobId, priority: u32) {
        let mut state = self.state.lock().unwrap();
        state
            .entry(job_id)
            .or_insert_with(|| JobQueue {
                priority: self.default_priority,
                tasks: VecDeque::new(),
            })
            .priority = priority.max(1);
    }

    pub fn remove_job(&self, job_id: JobId) {
        self.state.lock().unwrap().remove(&job_id);
    }

    pub fn len_for(&self, job_id: JobId) -> usize {
        self.state
            .lock()
            .unwrap()
            .get(&job_id)
            .map(|q| q.tasks.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn task(job: JobId, id: i32) -> TaskDescription {
        TaskDescription::new(job, TaskId::new(id).unwrap(), Vec::<u8>::new())
    }

    #[test]
    fn fifo_within_one_job() {
        let s = Scheduler::new(20);
        let job = JobId::new();
        s.add(task(job, 1));
        s.add(task(job, 2));
        s.add(task(job, 3));

        assert_eq!(s.pick_next().unwrap().task_id, TaskId::new(1).unwrap());
        assert_eq!(s.pick_next().unwrap().task_id, TaskId::new(2).unwrap());
        assert_eq!(s.pick_next().unwrap().task_id, TaskId::new(3).unwrap());
        assert!(s.pick_next().is_none());
    }

    #[test]
    fn contains_and_remove() {
        let s = Scheduler::new(20);
        let job = JobId::new();
        let id = TaskId::new(5).unwrap();
        s.add(task(job, 5));
        assert!(s.contains(job, id));
        assert!(s.remove(job, id).is_some());
        assert!(!s.contains(job, id));
        assert!(s.remove(job, id).is_none());
    }

    #[test]
    fn remove_job_drops_all_its_tasks() {
        let s = Scheduler::new(20);
        let job = JobId::new();
        s.add(task(job, 1));
        s.add(task(job, 2));
        s.remove_job(job);
        assert_eq!(s.pick_next(), None);
    }

    #[test]
    fn empty_scheduler_returns_none() {
        let s = Scheduler::new(20);
        assert!(s.pick_next().is_none());
    }

    #[test]
    fn higher_priority_job_starves_lower_only_while_it_has_work() {
        let s = Scheduler::new(20);
        let hi = JobId::new();
        let lo = JobId::new();
        s.set_priority(hi, 1_000_000);
        s.set_priority(lo, 1);
        s.add(task(hi, 1));
        s.add(task(lo, 1));

        // overwhelmingly likely (but not guaranteed) to pick hi first;
        // what's guaranteed is both eventually drain.
        let first = s.pick_next().unwrap();
        let second = s.pick_next().unwrap();
        let mut jobs = [first.job_id, second.job_id];
        jobs.sort();
        let mut expected = [hi, lo];
        expected.sort();
        assert_eq!(jobs, expected);
    }

    #[test]
    fn concurrent_task_id_generation_never_collides() {
        let s = Arc::new(Scheduler::new(20));
        let job = JobId::new();
        for i in 1..=200 {
            s.add(task(job, i));
        }
        let mut handles = Vec::new();
        for _ in 0..8 {
            let s = s.clone();
            handles.push(thread::spawn(move || {
                let mut seen = Vec::new();
                while let Some(t) = s.pick_next() {
                    seen.push(t.task_id);
                }
                seen
            }));
        }
        let mut all = Vec::new();
        for h in handles {
            all.extend(h.join().unwrap());
        }
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 200);
    }
}
