//! The render worker pool.
//!
//! Workers are spawned when the thread count is configured and live until
//! the pool is dropped. Each render call packages the per-thread work
//! (the thread's channels with their voice partitions, its device thread
//! states and scratch) and sends one job per worker; receiving the
//! completions is the finish barrier. Dropping the job senders is the
//! stop signal: workers observe the closed channel and exit.
//!
//! If spawning fails partway, the already-created workers are shut down
//! the same way and the player stays in single-thread mode.

use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender, bounded};

use crate::device_states::DeviceThreadState;
use crate::error::PlayerError;
use crate::voice_exec::{
    ChannelPackage, RenderStats, ThreadParams, VoiceBatchCtx, process_channel_fg,
    process_claimed_bg,
};

/// One render call's work for one thread.
#[derive(Debug)]
pub struct WorkerJob {
    /// Worker thread id.
    pub thread_id: usize,
    /// The channels this thread owns, with their pool partitions.
    pub packages: Vec<(usize, ChannelPackage)>,
    /// The thread's device states.
    pub dstates: Vec<DeviceThreadState>,
    /// The thread's rendering resources.
    pub params: ThreadParams,
    /// Shared pass context.
    pub ctx: VoiceBatchCtx,
}

/// A completed job with everything handed back.
#[derive(Debug)]
pub struct WorkerDone {
    /// Worker thread id.
    pub thread_id: usize,
    /// The channels, to be restored to the player.
    pub packages: Vec<(usize, ChannelPackage)>,
    /// The thread's device states.
    pub dstates: Vec<DeviceThreadState>,
    /// The thread's rendering resources.
    pub params: ThreadParams,
    /// Voice statistics gathered by this thread.
    pub stats: RenderStats,
}

/// Runs one job to completion.
pub fn run_job(mut job: WorkerJob) -> WorkerDone {
    let mut stats = RenderStats::default();

    for (_, pkg) in &mut job.packages {
        process_channel_fg(pkg, &job.ctx, &mut job.params, &mut job.dstates, &mut stats);
    }

    process_claimed_bg(&job.ctx, &mut job.params, &mut job.dstates, &mut stats);

    WorkerDone {
        thread_id: job.thread_id,
        packages: job.packages,
        dstates: job.dstates,
        params: job.params,
        stats,
    }
}

/// Long-lived render workers.
#[derive(Debug)]
pub struct WorkerPool {
    job_txs: Vec<Sender<WorkerJob>>,
    done_rx: Receiver<WorkerDone>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `count` workers.
    ///
    /// # Errors
    ///
    /// Returns [`PlayerError::ThreadSetup`] if any spawn fails; workers
    /// spawned before the failure are joined before returning.
    pub fn spawn(count: usize) -> Result<Self, PlayerError> {
        let (done_tx, done_rx) = bounded::<WorkerDone>(count);

        let mut job_txs = Vec::with_capacity(count);
        let mut handles = Vec::with_capacity(count);

        for thread_id in 0..count {
            let (job_tx, job_rx) = bounded::<WorkerJob>(1);
            let done_tx = done_tx.clone();

            let spawned = std::thread::Builder::new()
                .name(format!("compas-render-{thread_id}"))
                .spawn(move || {
                    while let Ok(job) = job_rx.recv() {
                        let done = run_job(job);
                        if done_tx.send(done).is_err() {
                            break;
                        }
                    }
                });

            match spawned {
                Ok(handle) => {
                    job_txs.push(job_tx);
                    handles.push(handle);
                }
                Err(err) => {
                    tracing::warn!(
                        thread_id,
                        error = %err,
                        "render worker spawn failed, rolling back"
                    );
                    drop(job_txs);
                    for handle in handles {
                        let _ = handle.join();
                    }
                    return Err(PlayerError::ThreadSetup(err.to_string()));
                }
            }
        }

        tracing::debug!(count, "render workers started");
        Ok(Self {
            job_txs,
            done_rx,
            handles,
        })
    }

    /// Number of workers.
    pub fn worker_count(&self) -> usize {
        self.job_txs.len()
    }

    /// Runs one job per worker and collects the completions.
    pub fn dispatch(&self, jobs: Vec<WorkerJob>) -> Vec<WorkerDone> {
        let expected = jobs.len();
        debug_assert!(expected <= self.job_txs.len());

        for job in jobs {
            let tx = &self.job_txs[job.thread_id];
            tx.send(job).expect("render worker gone");
        }

        let mut dones = Vec::with_capacity(expected);
        for _ in 0..expected {
            dones.push(self.done_rx.recv().expect("render worker gone"));
        }
        dones
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.job_txs.clear();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}
