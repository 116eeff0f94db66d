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

//! The server list ("SLIST") of RFC 1034 § 5.3.2.
//!
//! A [`ServerList`] remembers, for each zone the resolver has heard
//! of, the name servers believed to serve it, ranked by how quickly
//! they have answered. Servers themselves live in an append-only table
//! shared by all zones, so that a server that serves many zones is
//! known (and gets its address filled in) only once.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::Mutex;
use std::time::Duration;

use log::debug;

use crate::name::Name;

////////////////////////////////////////////////////////////////////////
// SERVERS                                                            //
////////////////////////////////////////////////////////////////////////

/// A name server: a host name, its address if known, and a port.
///
/// Two servers are the same server if both have addresses and these
/// match along with the ports. If either address is unknown, the host
/// names and ports are compared instead.
#[derive(Clone, Debug)]
pub struct Server {
    name: Name,
    ip: Option<IpAddr>,
    port: u16,
}

impl Server {
    pub fn new(name: Name, ip: Option<IpAddr>, port: u16) -> Self {
        Self { name, ip, port }
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn ip(&self) -> Option<IpAddr> {
        self.ip
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns the socket address to send queries to, or `None` if the
    /// server's address is not known yet.
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        self.ip.map(|ip| SocketAddr::new(ip, self.port))
    }
}

impl PartialEq for Server {
    fn eq(&self, other: &Self) -> bool {
        if self.port != other.port {
            return false;
        }
        match (self.ip, other.ip) {
            (Some(ours), Some(theirs)) => ours == theirs,
            _ => self.name == other.name,
        }
    }
}

impl fmt::Display for Server {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.ip {
            Some(ip) => write!(f, "{} ({})", self.name, SocketAddr::new(ip, self.port)),
            None => write!(f, "{} (address unknown, port {})", self.name, self.port),
        }
    }
}

/// Identifies a server within a [`ServerList`].
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ServerId(usize);

////////////////////////////////////////////////////////////////////////
// RESPONSE TIMES                                                     //
////////////////////////////////////////////////////////////////////////

/// How a server has responded for a zone.
///
/// The variants are ordered from most to least preferred. Untested
/// servers come first so that every server gets tried, and the failure
/// sentinels rank below any real measurement.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum ResponseTime {
    Unknown,
    Measured(Duration),
    Timeout,
    ServerFailure,
    NetworkFailure,
}

impl fmt::Display for ResponseTime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Unknown => f.write_str("untested"),
            Self::Measured(rtt) => write!(f, "{} ms", rtt.as_millis()),
            Self::Timeout => f.write_str("timed out"),
            Self::ServerFailure => f.write_str("server failure"),
            Self::NetworkFailure => f.write_str("network failure"),
        }
    }
}

////////////////////////////////////////////////////////////////////////
// SERVER LIST                                                        //
////////////////////////////////////////////////////////////////////////

/// A thread-safe, per-zone ranked registry of name servers.
///
/// Zone names compare case-insensitively, since [`Name`] does.
#[derive(Default)]
pub struct ServerList {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    servers: Vec<Server>,
    zones: HashMap<Name, Vec<Entry>>,
}

#[derive(Clone, Copy, Debug)]
struct Entry {
    id: ServerId,
    response_time: ResponseTime,
}

impl ServerList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a server in the server table and returns its
    /// [`ServerId`]. If the same server (see [`Server`]) is already
    /// known, its existing ID is returned instead, and its address is
    /// filled in if it was unknown before.
    pub fn add_server(&self, name: Name, ip: Option<IpAddr>, port: u16) -> ServerId {
        let candidate = Server::new(name, ip, port);
        let mut inner = self.inner.lock().unwrap();
        if let Some(index) = inner.servers.iter().position(|s| *s == candidate) {
            let existing = &mut inner.servers[index];
            if existing.ip.is_none() && candidate.ip.is_some() {
                existing.ip = candidate.ip;
            }
            ServerId(index)
        } else {
            inner.servers.push(candidate);
            ServerId(inner.servers.len() - 1)
        }
    }

    /// Returns a snapshot of the server with the given ID.
    pub fn server(&self, id: ServerId) -> Option<Server> {
        self.inner.lock().unwrap().servers.get(id.0).cloned()
    }

    /// Returns the servers known for `zone`, best first.
    pub fn servers(&self, zone: &Name) -> Vec<(ServerId, Server, ResponseTime)> {
        let inner = self.inner.lock().unwrap();
        inner
            .zones
            .get(zone)
            .map(|entries| {
                entries
                    .iter()
                    .map(|e| (e.id, inner.servers[e.id.0].clone(), e.response_time))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Records a response time (or failure) for a server in a zone.
    /// Any previous entry for the server in the zone is replaced, and
    /// the new entry is placed before the first entry with a strictly
    /// worse response time, so that ties keep their arrival order.
    pub fn update_entry(&self, zone: &Name, id: ServerId, response_time: ResponseTime) {
        let mut inner = self.inner.lock().unwrap();
        let entries = inner.zones.entry(zone.clone()).or_default();
        entries.retain(|e| e.id != id);
        let index = entries
            .iter()
            .position(|e| e.response_time > response_time)
            .unwrap_or(entries.len());
        entries.insert(index, Entry { id, response_time });
    }

    /// Adds a server to a zone as untested, unless it is already listed
    /// there (in which case its ranking is kept).
    pub fn add_to_zone(&self, zone: &Name, id: ServerId) {
        let mut inner = self.inner.lock().unwrap();
        let entries = inner.zones.entry(zone.clone()).or_default();
        if !entries.iter().any(|e| e.id == id) {
            let index = entries
                .iter()
                .position(|e| e.response_time > ResponseTime::Unknown)
                .unwrap_or(entries.len());
            entries.insert(
                index,
                Entry {
                    id,
                    response_time: ResponseTime::Unknown,
                },
            );
        }
    }

    /// Returns the best-ranked server for `zone` that is not in
    /// `exclude`.
    pub fn best_guess(&self, zone: &Name, exclude: &HashSet<ServerId>) -> Option<(ServerId, Server)> {
        let inner = self.inner.lock().unwrap();
        inner
            .zones
            .get(zone)?
            .iter()
            .find(|e| !exclude.contains(&e.id))
            .map(|e| (e.id, inner.servers[e.id.0].clone()))
    }

    /// Removes a server from a zone. The server stays in the server
    /// table. Returns whether an entry was removed.
    pub fn drop_server(&self, zone: &Name, id: ServerId) -> bool {
        let mut inner = self.inner.lock().unwrap();
        match inner.zones.get_mut(zone) {
            Some(entries) => {
                let before = entries.len();
                entries.retain(|e| e.id != id);
                entries.len() != before
            }
            None => false,
        }
    }

    pub fn has_server(&self, zone: &Name, id: ServerId) -> bool {
        self.response_time(zone, id).is_some()
    }

    pub fn response_time(&self, zone: &Name, id: ServerId) -> Option<ResponseTime> {
        let inner = self.inner.lock().unwrap();
        inner
            .zones
            .get(zone)?
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.response_time)
    }

    /// Returns the address of the first server named `hostname` whose
    /// address is known.
    pub fn address_of(&self, hostname: &Name) -> Option<IpAddr> {
        let inner = self.inner.lock().unwrap();
        inner
            .servers
            .iter()
            .filter(|s| s.name == *hostname)
            .find_map(|s| s.ip)
    }

    /// Fills in the address of the first server named `hostname` whose
    /// address is still unknown. Returns whether such a server was
    /// found.
    pub fn set_server_ip(&self, hostname: &Name, ip: IpAddr) -> bool {
        let mut inner = self.inner.lock().unwrap();
        match inner
            .servers
            .iter_mut()
            .find(|s| s.ip.is_none() && s.name == *hostname)
        {
            Some(server) => {
                debug!("learned address {} for server {}", ip, hostname);
                server.ip = Some(ip);
                true
            }
            None => false,
        }
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
