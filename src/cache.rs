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

//! A TTL-based cache of resource records.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::SystemTime;

use log::trace;

use crate::message::Question;
use crate::name::Name;
use crate::rr::{Record, Ttl};

/// A thread-safe store of resource records keyed by owner name.
///
/// Records expire once their TTL has elapsed. Expired records are
/// evicted lazily, when their owner name is next looked up. Records
/// with a zero TTL, and records whose owner contains an asterisk, are
/// never stored.
///
/// The `*_at` variants of the methods take the current time as an
/// argument; the others use [`SystemTime::now`].
#[derive(Default)]
pub struct ResolverCache {
    entries: Mutex<HashMap<Name, Vec<CacheEntry>>>,
}

#[derive(Debug)]
struct CacheEntry {
    record: Record,
    expiry: SystemTime,
}

impl ResolverCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the unexpired records answering `question`. The TTLs of
    /// the returned records count down from the TTLs they were stored
    /// with.
    pub fn get(&self, question: &Question) -> Vec<Record> {
        self.get_at(question, SystemTime::now())
    }

    pub fn get_at(&self, question: &Question, now: SystemTime) -> Vec<Record> {
        let mut entries = self.entries.lock().unwrap();
        let Some(owned) = entries.get_mut(&question.qname) else {
            return Vec::new();
        };

        owned.retain(|e| e.expiry > now);
        let records: Vec<Record> = owned
            .iter()
            .filter(|e| {
                question.qtype.matches(e.record.rr_type())
                    && question.qclass.matches(e.record.class())
            })
            .map(|e| {
                let remaining = e.expiry.duration_since(now).unwrap_or_default();
                e.record.with_ttl(Ttl::from_remaining(remaining))
            })
            .collect();
        if owned.is_empty() {
            entries.remove(&question.qname);
        }
        records
    }

    /// Stores a record, replacing any entry with the same owner, class,
    /// type, and RDATA. Returns whether the record was stored.
    pub fn put(&self, record: Record) -> bool {
        self.put_at(record, SystemTime::now())
    }

    pub fn put_at(&self, record: Record, now: SystemTime) -> bool {
        if record.ttl().is_zero() || record.owner().contains_asterisk() {
            return false;
        }
        trace!("caching {}", record);
        let expiry = now + record.ttl().as_duration();
        let mut entries = self.entries.lock().unwrap();
        let owned = entries.entry(record.owner().clone()).or_default();
        match owned.iter_mut().find(|e| e.record.same_data_as(&record)) {
            Some(existing) => *existing = CacheEntry { record, expiry },
            None => owned.push(CacheEntry { record, expiry }),
        }
        true
    }

    /// Removes every record from the cache.
    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
