//! Worker pool fanning out tests or trials.
use crate::SpawnDiscipline;
use anyhow::{anyhow, Result};
use crossbeam_channel::unbounded;
use log::{debug, info};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

/// Number of workers given an optional fixed number of cores.
///
/// `fixed_cores` is used only if it does not exceed the available cores.
pub fn effective_workers(fixed_cores: Option<usize>, available: usize) -> usize {
    match fixed_cores {
        Some(n) if n <= available => n,
        _ => available,
    }
}

/// Number of cores available to the process.
pub fn available_cores() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// A pool of worker threads.
///
/// Each worker owns the state built by the `init` closure of
/// [`WorkerPool::map_with_init`], typically its own environment, world model and
/// planning agent, and never shares it with other workers. Jobs and results go
/// through channels; results are returned in the order of the inputs.
///
/// With [`SpawnDiscipline::Serialized`], workers are initialised one at a time
/// behind a guard, which is also handed out by [`WorkerPool::env_guard`] for
/// environments built by the jobs.
pub struct WorkerPool {
    workers: usize,
    spawn: SpawnDiscipline,
    guard_init_env: Arc<Mutex<()>>,
}

impl WorkerPool {
    /// Constructs a pool with at most `workers` threads.
    pub fn new(workers: usize, spawn: SpawnDiscipline) -> Self {
        Self {
            workers: workers.max(1),
            spawn,
            guard_init_env: Arc::new(Mutex::new(())),
        }
    }

    /// The guard serializing environment construction, if the pool serializes it.
    pub fn env_guard(&self) -> Option<Arc<Mutex<()>>> {
        match self.spawn {
            SpawnDiscipline::Serialized => Some(self.guard_init_env.clone()),
            SpawnDiscipline::Concurrent => None,
        }
    }

    /// Number of worker threads.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Applies `f` to every input on the workers of the pool.
    ///
    /// Blocks until all dispatched jobs are finished. If a job fails, no further
    /// job is started and the error of the failed job with the smallest input
    /// index is returned. A panic in a worker is propagated.
    pub fn map_with_init<T, R, W, I, F>(&self, inputs: Vec<T>, init: I, f: F) -> Result<Vec<R>>
    where
        T: Send,
        R: Send,
        I: Fn(usize) -> Result<W> + Sync,
        F: Fn(&mut W, T) -> Result<R> + Sync,
    {
        let n_jobs = inputs.len();
        if n_jobs == 0 {
            return Ok(vec![]);
        }
        let n_workers = self.workers.min(n_jobs);
        info!("Dispatches {} jobs to {} workers", n_jobs, n_workers);

        let (job_s, job_r) = unbounded::<(usize, T)>();
        for job in inputs.into_iter().enumerate() {
            job_s
                .send(job)
                .map_err(|_| anyhow!("Job queue closed before dispatch"))?;
        }
        drop(job_s);

        let (result_s, result_r) = unbounded::<(usize, Result<R>)>();
        let stop = AtomicBool::new(false);
        let guard_init: &Mutex<()> = &self.guard_init_env;

        std::thread::scope(|scope| {
            for id in 0..n_workers {
                let job_r = job_r.clone();
                let result_s = result_s.clone();
                let init = &init;
                let f = &f;
                let stop = &stop;
                let spawn = self.spawn;

                scope.spawn(move || {
                    let worker = match spawn {
                        SpawnDiscipline::Serialized => {
                            let _guard = guard_init.lock().unwrap_or_else(|e| e.into_inner());
                            init(id)
                        }
                        SpawnDiscipline::Concurrent => init(id),
                    };
                    let mut worker = match worker {
                        Ok(worker) => worker,
                        Err(e) => {
                            stop.store(true, Ordering::SeqCst);
                            if let Ok((ix, _)) = job_r.recv() {
                                let _ = result_s.send((ix, Err(e)));
                            }
                            return;
                        }
                    };

                    while let Ok((ix, job)) = job_r.recv() {
                        if stop.load(Ordering::SeqCst) {
                            break;
                        }
                        debug!("Worker {} starts job {}", id, ix);
                        let result = f(&mut worker, job);
                        if result.is_err() {
                            stop.store(true, Ordering::SeqCst);
                        }
                        if result_s.send((ix, result)).is_err() {
                            break;
                        }
                    }
                });
            }
        });
        drop(result_s);

        let mut slots: Vec<Option<R>> = (0..n_jobs).map(|_| None).collect();
        let mut first_error: Option<(usize, anyhow::Error)> = None;
        for (ix, result) in result_r.iter() {
            match result {
                Ok(r) => slots[ix] = Some(r),
                Err(e) => match &first_error {
                    Some((first_ix, _)) if *first_ix < ix => {}
                    _ => first_error = Some((ix, e)),
                },
            }
        }

        if let Some((_, e)) = first_error {
            return Err(e);
        }
        slots
            .into_iter()
            .enumerate()
            .map(|(ix, slot)| slot.ok_or_else(|| anyhow!("No result for job {}", ix)))
            .collect()
    }
}
