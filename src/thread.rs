// Copyright 2022 Matthew Ingwersen.
//
// Licensed under the Apache License, Version 2.0 (the "License"); you
// may not use this file except in compliance with the License. You may
// obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or
// implied. See the License for the specific language governing
// permissions and limitations under the License.

//! Thread groups and bounded thread pools.
//!
//! The resolver runs background address lookups on a [`ThreadPool`]
//! with a fixed number of workers. Submission never blocks: when every
//! worker is busy, [`ThreadPool::try_submit`] refuses the task and the
//! caller carries on without it.

use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::mem::drop;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use log::{error, info};
use slab::Slab;

////////////////////////////////////////////////////////////////////////
// THREAD GROUPS                                                      //
////////////////////////////////////////////////////////////////////////

/// A group of respawnable worker threads managed together.
///
/// Threads are started in a `ThreadGroup` through the [`ThreadPool`]s
/// it owns (see [`ThreadGroup::start_pool`]). A worker thread that
/// panics is logged and restarted, with a short delay between
/// successive restarts so that a crash loop cannot use excessive CPU
/// time.
///
/// [`ThreadGroup::shut_down`] shuts down the group and all its pools.
/// Once shutdown has begun, no new threads are started and exiting
/// workers are not restarted. [`ThreadGroup::await_shutdown`] waits for
/// every thread to exit.
pub struct ThreadGroup {
    records: Mutex<GroupRecords>,

    /// Notified when shutdown is initiated and when it completes. Used
    /// with the `records` mutex.
    shutdown_wakeup: Condvar,
}

#[derive(Default)]
struct GroupRecords {
    thread_count: usize,
    pools: Slab<Arc<ThreadPool>>,
    shutting_down: bool,
}

impl ThreadGroup {
    /// Creates a new thread group.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            records: Mutex::new(GroupRecords::default()),
            shutdown_wakeup: Condvar::new(),
        })
    }

    /// Shuts down the `ThreadGroup`, including its [`ThreadPool`]s.
    /// This does not wait for running tasks to finish.
    pub fn shut_down(&self) {
        let mut records = self.records.lock().unwrap();
        records.shutting_down = true;
        for pool in records.pools.drain() {
            pool.shut_down_without_removing();
        }
        self.shutdown_wakeup.notify_all();
    }

    /// Waits until shutdown has been initiated and every thread in the
    /// group has exited. Calling this from a thread of the group
    /// deadlocks.
    pub fn await_shutdown(&self) {
        let records = self.records.lock().unwrap();
        let _guard = self
            .shutdown_wakeup
            .wait_while(records, |r| !r.shutting_down || r.thread_count > 0)
            .unwrap();
    }
}

/// The minimum time between successive starts of a worker thread.
const THREAD_RESPAWN_DELAY: Duration = Duration::from_secs(1);

/// Owned by a worker thread. When dropped (because the thread exited or
/// panicked), it updates the group's records and, unless the group is
/// shutting down, starts a replacement thread.
struct RespawnableHandle<F>
where
    F: Fn() + Send + Sync + 'static,
{
    group: Arc<ThreadGroup>,
    parent: ThreadId,
    task: Arc<F>,
    last_start: Instant,
}

fn start_respawnable<F>(
    group: Arc<ThreadGroup>,
    records: &mut MutexGuard<GroupRecords>,
    name: String,
    task: Arc<F>,
) -> io::Result<()>
where
    F: Fn() + Send + Sync + 'static,
{
    records.thread_count += 1;
    let handle = RespawnableHandle {
        group,
        parent: thread::current().id(),
        task,
        last_start: Instant::now(),
    };
    let result = thread::Builder::new().name(name).spawn(move || {
        (handle.task)();
        drop(handle);
    });
    if result.is_err() {
        records.thread_count -= 1;
    }
    result.and(Ok(()))
}

impl<F> Drop for RespawnableHandle<F>
where
    F: Fn() + Send + Sync + 'static,
{
    fn drop(&mut self) {
        let current_thread = thread::current();
        let thread_name = current_thread.name().unwrap_or("anonymous");

        // Dropped in the parent: the OS thread never started, and
        // start_respawnable (which holds the records mutex) cleans up.
        if current_thread.id() == self.parent {
            return;
        }

        if thread::panicking() {
            error!("Worker thread {} panicked", thread_name);
        }

        let mut records = self.group.records.lock().unwrap();
        if !records.shutting_down {
            if !thread::panicking() {
                error!("Worker thread {} exited prematurely", thread_name);
            }

            // The wait releases the records mutex, and is cut short if
            // shutdown begins.
            let since_last_start = Instant::now().duration_since(self.last_start);
            if since_last_start < THREAD_RESPAWN_DELAY {
                let wait_for = THREAD_RESPAWN_DELAY - since_last_start;
                info!(
                    "Respawn of thread {} throttled: delayed by {} ms",
                    thread_name,
                    wait_for.as_millis()
                );
                records = self
                    .group
                    .shutdown_wakeup
                    .wait_timeout(records, wait_for)
                    .unwrap()
                    .0;
            }

            if !records.shutting_down {
                let result = start_respawnable(
                    self.group.clone(),
                    &mut records,
                    thread_name.to_owned(),
                    self.task.clone(),
                );
                if let Err(e) = result {
                    error!("Respawn of thread {} failed: {}", thread_name, e);
                }
            }
        }
        end_thread(&mut records, &self.group.shutdown_wakeup);
    }
}

fn end_thread(records: &mut MutexGuard<GroupRecords>, shutdown_wakeup: &Condvar) {
    records.thread_count -= 1;
    if records.shutting_down && records.thread_count == 0 {
        shutdown_wakeup.notify_all();
    }
}

////////////////////////////////////////////////////////////////////////
// THREAD POOLS                                                       //
////////////////////////////////////////////////////////////////////////

/// A thread pool with a fixed number of worker threads and no backlog.
///
/// Each submitted task occupies one worker from submission until it
/// finishes (or panics). A submission that would need more workers than
/// the pool has is refused with [`Error::Busy`], so at most
/// [`ThreadPool::capacity`] tasks are ever in flight.
///
/// A `ThreadPool` is shut down with its parent [`ThreadGroup`], or on
/// its own through [`ThreadPool::shut_down`]. Tasks already submitted
/// still run; new submissions are refused.
pub struct ThreadPool {
    group: Arc<ThreadGroup>,
    key: usize,
    records: Mutex<PoolRecords>,

    /// Notified when a task is queued or shutdown begins. Used with the
    /// `records` mutex.
    task_wakeup: Condvar,
}

struct PoolRecords {
    queue: VecDeque<Box<dyn FnOnce() + Send + 'static>>,
    workers: usize,
    busy: usize,
    shutting_down: bool,
}

impl ThreadGroup {
    /// Starts a new [`ThreadPool`] with `workers` worker threads.
    pub fn start_pool(self: &Arc<Self>, name: &str, workers: usize) -> Result<Arc<ThreadPool>, Error> {
        let mut records = self.records.lock().unwrap();
        if records.shutting_down {
            return Err(Error::ShuttingDown);
        }

        let entry = records.pools.vacant_entry();
        let pool = Arc::new(ThreadPool {
            group: self.clone(),
            key: entry.key(),
            records: Mutex::new(PoolRecords {
                queue: VecDeque::with_capacity(workers),
                workers,
                busy: 0,
                shutting_down: false,
            }),
            task_wakeup: Condvar::new(),
        });
        entry.insert(pool.clone());

        let result = start_pool_workers(self, &mut records, &pool, name);
        if result.is_err() {
            // Stops any workers that did start.
            pool.shut_down_without_removing();
            records.pools.remove(pool.key);
        }
        result.map_err(Into::into).and(Ok(pool))
    }
}

impl ThreadPool {
    /// Submits a task if a worker is free to run it. Otherwise the task
    /// is dropped and [`Error::Busy`] is returned.
    pub fn try_submit<F>(&self, task: F) -> Result<(), Error>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut records = self.records.lock().unwrap();
        if records.shutting_down {
            Err(Error::ShuttingDown)
        } else if records.busy >= records.workers {
            Err(Error::Busy)
        } else {
            records.busy += 1;
            records.queue.push_back(Box::new(task));
            self.task_wakeup.notify_one();
            Ok(())
        }
    }

    /// Returns the number of tasks that can run at once.
    pub fn capacity(&self) -> usize {
        self.records.lock().unwrap().workers
    }

    /// Returns the number of submitted tasks that have not finished.
    pub fn busy(&self) -> usize {
        self.records.lock().unwrap().busy
    }

    /// Shuts down the `ThreadPool` (but not its parent
    /// [`ThreadGroup`]).
    pub fn shut_down(&self) {
        let mut group_records = self.group.records.lock().unwrap();
        group_records.pools.remove(self.key);
        drop(group_records);
        self.shut_down_without_removing();
    }

    /// Shuts down the `ThreadPool` without removing it from its
    /// group's records, for callers already holding the group's
    /// records mutex.
    fn shut_down_without_removing(&self) {
        let mut records = self.records.lock().unwrap();
        records.shutting_down = true;
        self.task_wakeup.notify_all();
    }

    /// Returns whether the `ThreadPool` has been shut down, either
    /// directly or through its [`ThreadGroup`].
    pub fn is_shutting_down(&self) -> bool {
        self.records.lock().unwrap().shutting_down
    }
}

/// Starts the worker threads of a [`ThreadPool`]. On failure, some
/// workers may still be running.
fn start_pool_workers(
    group: &Arc<ThreadGroup>,
    group_records: &mut MutexGuard<GroupRecords>,
    pool: &Arc<ThreadPool>,
    base_name: &str,
) -> io::Result<()> {
    let workers = pool.records.lock().unwrap().workers;
    for i in 0..workers {
        let pool = pool.clone();
        let name = format!("{} worker {}", base_name, i);
        let task = move || pool_worker_loop(&pool);
        start_respawnable(group.clone(), group_records, name, Arc::new(task))?;
    }
    Ok(())
}

/// Releases a pool worker's slot when its task ends, even by panic.
struct BusyGuard<'a>(&'a ThreadPool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.records.lock().unwrap().busy -= 1;
    }
}

fn pool_worker_loop(pool: &ThreadPool) {
    loop {
        let mut records = pool.records.lock().unwrap();
        let task = loop {
            if let Some(task) = records.queue.pop_front() {
                break task;
            } else if records.shutting_down {
                return;
            }
            records = pool.task_wakeup.wait(records).unwrap();
        };
        drop(records);
        let _guard = BusyGuard(pool);
        task();
    }
}

////////////////////////////////////////////////////////////////////////
// ERRORS                                                             //
////////////////////////////////////////////////////////////////////////

/// An error type for [`ThreadGroup`] and [`ThreadPool`] operations.
#[derive(Debug)]
pub enum Error {
    /// An OS-level error occurred during the creation of a thread.
    Io(io::Error),

    /// Every worker of the [`ThreadPool`] is occupied.
    Busy,

    /// The [`ThreadGroup`] or [`ThreadPool`] is shutting down.
    ShuttingDown,
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Io(err) => fmt::Display::fmt(err, f),
            Self::Busy => f.write_str("all pool workers are busy"),
            Self::ShuttingDown => f.write_str("thread group or pool is shutting down"),
        }
    }
}

impl std::error::Error for Error {}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
