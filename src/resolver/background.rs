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

//! Background resolution of name server addresses.
//!
//! When the resolver meets a name server whose address it does not
//! know, it hands the host name to an [`AddressResolver`] and moves on
//! to other servers. The lookup runs on a bounded [`ThreadPool`]; at
//! most one lookup per host name and class is pending at a time, and
//! lookups that would exceed the pool's capacity are simply not made.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use log::{debug, error};

use crate::class::Class;
use crate::name::Name;
use crate::thread::{self, ThreadGroup, ThreadPool};

type Key = (Name, Class);

/// A deduplicating scheduler of background address lookups.
pub struct AddressResolver {
    group: Arc<ThreadGroup>,
    pool: Option<Arc<ThreadPool>>,
    pending: Arc<Mutex<Pending>>,
}

/// Lookups that have been submitted but not started (`queued`), and
/// lookups in progress (`running`).
#[derive(Default)]
struct Pending {
    queued: HashSet<Key>,
    running: HashSet<Key>,
}

impl AddressResolver {
    /// Creates an `AddressResolver` that runs at most `max_tasks`
    /// lookups at once. If the worker threads cannot be started, the
    /// error is logged and every lookup is refused.
    pub fn new(max_tasks: usize) -> Self {
        let group = ThreadGroup::new();
        let pool = match group.start_pool("address resolution", max_tasks) {
            Ok(pool) => Some(pool),
            Err(e) => {
                error!("Failed to start background address resolution: {}", e);
                None
            }
        };
        Self {
            group,
            pool,
            pending: Arc::new(Mutex::new(Pending::default())),
        }
    }

    /// Schedules `lookup` to find the address of `host` in `class`.
    /// Returns `false` without running `lookup` if a lookup for the same
    /// host and class is already pending, or if the pool is at
    /// capacity.
    pub fn schedule<F>(&self, host: Name, class: Class, lookup: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let Some(pool) = &self.pool else {
            return false;
        };
        if pool.is_shutting_down() {
            debug!("not looking up the address of {} during shutdown", host);
            return false;
        }
        let key = (host, class);
        let mut pending = self.pending.lock().unwrap();
        if pending.queued.contains(&key) || pending.running.contains(&key) {
            debug!("address lookup for {} is already pending", key.0);
            return false;
        }
        pending.queued.insert(key.clone());
        drop(pending);

        let task_pending = self.pending.clone();
        let task_key = key.clone();
        let result = pool.try_submit(move || {
            {
                let mut pending = task_pending.lock().unwrap();
                pending.queued.remove(&task_key);
                pending.running.insert(task_key.clone());
            }
            let _done = DoneGuard {
                pending: task_pending,
                key: task_key,
            };
            lookup();
        });

        match result {
            Ok(()) => {
                debug!("scheduled background address lookup for {}", key.0);
                true
            }
            Err(e) => {
                if !matches!(e, thread::Error::Busy) {
                    error!("Failed to schedule address lookup for {}: {}", key.0, e);
                } else {
                    debug!(
                        "all {} workers are busy; not looking up the address of {}",
                        pool.capacity(),
                        key.0
                    );
                }
                self.pending.lock().unwrap().queued.remove(&key);
                false
            }
        }
    }

    /// Returns whether a lookup for `host` in `class` is pending.
    pub fn is_pending(&self, host: &Name, class: Class) -> bool {
        let key = (host.clone(), class);
        let pending = self.pending.lock().unwrap();
        pending.queued.contains(&key) || pending.running.contains(&key)
    }
}

impl Drop for AddressResolver {
    fn drop(&mut self) {
        self.group.shut_down();
    }
}

/// Removes a finished lookup from the running set, even if it panicked.
struct DoneGuard {
    pending: Arc<Mutex<Pending>>,
    key: Key,
}

impl Drop for DoneGuard {
    fn drop(&mut self) {
        self.pending.lock().unwrap().running.remove(&self.key);
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::thread::sleep;
    use std::time::Duration;

    use super::*;

    fn host(name: &str) -> Name {
        name.parse().unwrap()
    }

    fn wait_until_idle(resolver: &AddressResolver, name: &Name) {
        let pool = resolver.pool.as_ref().unwrap();
        while resolver.is_pending(name, Class::IN) || pool.busy() > 0 {
            sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn duplicate_lookups_are_refused() {
        let resolver = AddressResolver::new(2);
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let (ran_tx, ran_rx) = mpsc::channel();
        assert!(resolver.schedule(host("ns1.example."), Class::IN, move || {
            release_rx.recv().unwrap();
            ran_tx.send(()).unwrap();
        }));
        assert!(resolver.is_pending(&host("ns1.example."), Class::IN));
        assert!(!resolver.schedule(host("NS1.example."), Class::IN, || ()));

        // The same host in another class is a different lookup.
        assert!(resolver.schedule(host("ns1.example."), Class::CH, || ()));

        release_tx.send(()).unwrap();
        ran_rx.recv().unwrap();
        wait_until_idle(&resolver, &host("ns1.example."));
        assert!(!resolver.is_pending(&host("ns1.example."), Class::CH));
        assert!(resolver.schedule(host("ns1.example."), Class::IN, || ()));
    }

    #[test]
    fn lookups_beyond_capacity_are_refused() {
        let resolver = AddressResolver::new(1);
        let (release_tx, release_rx) = mpsc::channel::<()>();
        assert!(resolver.schedule(host("ns1.example."), Class::IN, move || {
            release_rx.recv().unwrap();
        }));
        assert!(!resolver.schedule(host("ns2.example."), Class::IN, || ()));
        assert!(!resolver.is_pending(&host("ns2.example."), Class::IN));
        release_tx.send(()).unwrap();
        wait_until_idle(&resolver, &host("ns1.example."));
    }

    #[test]
    fn zero_capacity_refuses_everything() {
        let resolver = AddressResolver::new(0);
        assert!(!resolver.schedule(host("ns1.example."), Class::IN, || ()));
    }

    #[test]
    fn lookups_after_shutdown_are_refused() {
        let resolver = AddressResolver::new(1);
        resolver.group.shut_down();
        assert!(!resolver.schedule(host("ns1.example."), Class::IN, || {
            panic!("lookup ran after shutdown")
        }));
        assert!(!resolver.is_pending(&host("ns1.example."), Class::IN));
    }
}
