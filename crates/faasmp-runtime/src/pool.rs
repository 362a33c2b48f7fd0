//! Worker pool for single-host teams
//!
//! Each module owns one pool; a local fork submits one task per team member
//! and blocks on the returned futures in submission order. Workers are
//! plain OS threads draining a multi-consumer queue, so a team of N can run
//! on fewer workers when the host is smaller than the team.

use crossbeam_channel::{Receiver, Sender};
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::thread::JoinHandle;

type Job = Box<dyn FnOnce() -> i64 + Send + 'static>;

struct Submission {
    job: Job,
    result: mpsc::Sender<i64>,
}

/// Completion handle for one submitted task.
pub struct TaskFuture {
    result: mpsc::Receiver<i64>,
}

impl TaskFuture {
    /// Block until the task finishes and return its exit code.
    ///
    /// A task that never reports (pool torn down underneath it) counts as
    /// failed.
    pub fn wait(self) -> i64 {
        match self.result.recv() {
            Ok(code) => code,
            Err(_) => {
                tracing::error!("team pool dropped a task before it reported an exit code");
                1
            }
        }
    }
}

/// Fixed-size pool of host threads dedicated to one module's teams.
pub struct TeamPool {
    queue: Option<Sender<Submission>>,
    workers: Vec<JoinHandle<()>>,
}

impl TeamPool {
    /// Spawn a pool of `size` workers (floored at one).
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        let (queue, jobs) = crossbeam_channel::unbounded::<Submission>();

        let workers = (0..size)
            .map(|index| {
                let jobs = jobs.clone();
                std::thread::Builder::new()
                    .name(format!("omp-worker-{index}"))
                    .spawn(move || worker_loop(jobs))
                    .expect("failed to spawn omp worker thread")
            })
            .collect();

        Self {
            queue: Some(queue),
            workers,
        }
    }

    /// Number of worker threads.
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Queue a task and hand back its completion future.
    pub fn submit(&self, job: impl FnOnce() -> i64 + Send + 'static) -> TaskFuture {
        let (tx, rx) = mpsc::channel();
        let submission = Submission {
            job: Box::new(job),
            result: tx,
        };
        if let Some(queue) = &self.queue {
            if queue.send(submission).is_err() {
                tracing::error!("team pool queue closed; task dropped");
            }
        }
        TaskFuture { result: rx }
    }
}

impl Drop for TeamPool {
    fn drop(&mut self) {
        // Closing the channel lets workers drain outstanding jobs and exit.
        self.queue.take();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                tracing::error!("omp worker exited with a panic");
            }
        }
    }
}

fn worker_loop(jobs: Receiver<Submission>) {
    while let Ok(submission) = jobs.recv() {
        let code = match panic::catch_unwind(AssertUnwindSafe(submission.job)) {
            Ok(code) => code,
            Err(_) => {
                tracing::error!("team task panicked; reporting exit code 1");
                1
            }
        };
        // The submitter may have stopped waiting; that is its choice.
        let _ = submission.result.send(code);
    }
}
