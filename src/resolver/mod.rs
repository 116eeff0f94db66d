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

//! The iterative resolver.
//!
//! A [`Resolver`] answers questions by walking the delegation
//! hierarchy, starting from the servers registered with
//! [`Resolver::add_initial_server`] (or the root servers, through
//! [`Resolver::add_root_hints`]). What it learns is kept in a
//! [`ServerList`] and a [`ResolverCache`], which may be shared between
//! resolvers.

use std::net::{IpAddr, SocketAddr, ToSocketAddrs};
use std::sync::Arc;

use log::{debug, info, warn};

pub mod analysis;
mod background;
mod config;
mod error;
mod hints;
mod lookup;
#[cfg(test)]
mod testing;
mod zone;

pub use analysis::{analyze_answer, AnalysisReport, Delegation};
pub use config::ResolverConfig;
pub use error::{Error, ProtocolError};
pub use hints::ROOT_SERVERS;

use crate::cache::ResolverCache;
use crate::class::Class;
use crate::message::{Qclass, Qtype};
use crate::name::Name;
use crate::net::{Transport, DNS_PORT};
use crate::rr::{Record, Type};
use crate::slist::{ServerId, ServerList};
use background::AddressResolver;

/// The most CNAME records followed for one question.
pub const MAX_ALIAS_HOPS: usize = 8;

////////////////////////////////////////////////////////////////////////
// RESOLVER                                                           //
////////////////////////////////////////////////////////////////////////

/// A handle to an iterative resolver.
///
/// Cloning a `Resolver` is cheap; the clones share all state. When the
/// last clone is dropped, the background address resolution workers
/// shut down.
#[derive(Clone)]
pub struct Resolver {
    shared: Arc<Shared>,
}

struct Shared {
    config: ResolverConfig,
    transport: Arc<dyn Transport>,
    slist: Arc<ServerList>,
    cache: Arc<ResolverCache>,
    background: AddressResolver,
}

impl Resolver {
    /// Creates a resolver with its own, empty server list and cache.
    pub fn new(config: ResolverConfig, transport: Arc<dyn Transport>) -> Self {
        Self::with_shared_state(
            config,
            transport,
            Arc::new(ServerList::new()),
            Arc::new(ResolverCache::new()),
        )
    }

    /// Creates a resolver that uses the given server list and cache.
    pub fn with_shared_state(
        config: ResolverConfig,
        transport: Arc<dyn Transport>,
        slist: Arc<ServerList>,
        cache: Arc<ResolverCache>,
    ) -> Self {
        let background = AddressResolver::new(config.max_background_tasks);
        Self {
            shared: Arc::new(Shared {
                config,
                transport,
                slist,
                cache,
                background,
            }),
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.shared.config
    }

    pub fn slist(&self) -> &Arc<ServerList> {
        &self.shared.slist
    }

    pub fn cache(&self) -> &Arc<ResolverCache> {
        &self.shared.cache
    }

    /// Registers a server for `zone`.
    ///
    /// If `ip` is not given, `hostname` may itself be an IP address.
    /// Otherwise an address already known for the host is used, and
    /// failing that, the operating system's resolver is consulted once.
    /// A server whose address remains unknown is still registered; its
    /// address is looked up in the background when it is first needed.
    ///
    /// Registering a host for a zone with an explicit address that
    /// differs from the one it already has there is a
    /// [`Error::Configuration`].
    pub fn add_initial_server(
        &self,
        hostname: &str,
        ip: Option<IpAddr>,
        port: u16,
        zone: &str,
    ) -> Result<ServerId, Error> {
        let name = parse_name(hostname, "server name")?;
        let zone = parse_name(zone, "zone name")?;
        if let Some(explicit) = ip {
            let conflict = self
                .shared
                .slist
                .servers(&zone)
                .into_iter()
                .filter_map(|(_, server, _)| {
                    (*server.name() == name && server.port() == port)
                        .then(|| server.ip())
                        .flatten()
                })
                .find(|known| *known != explicit);
            if let Some(known) = conflict {
                return Err(Error::Configuration(format!(
                    "server {name} is configured for {zone} at both {known} and {explicit}"
                )));
            }
        }
        let ip = ip
            .or_else(|| hostname.parse().ok())
            .or_else(|| self.shared.slist.address_of(&name))
            .or_else(|| system_address(hostname, port));
        if ip.is_none() {
            warn!("Address of initial server {} is unknown", name);
        }

        let id = self.shared.slist.add_server(name, ip, port);
        self.shared.slist.add_to_zone(&zone, id);
        debug!("registered initial server {} for {}", describe_server(self, id), zone);
        Ok(id)
    }

    /// Registers the IANA root servers for the root zone.
    pub fn add_root_hints(&self) {
        let root = Name::root();
        for (name, ip) in ROOT_SERVERS.iter() {
            let id = self.shared.slist.add_server(name.clone(), Some(*ip), DNS_PORT);
            self.shared.slist.add_to_zone(&root, id);
        }
    }

    /// Looks up the records of every combination of the given types
    /// and classes at `name`. Empty `types` and `classes` default to A
    /// and IN.
    ///
    /// An error for any of the combinations ends the lookup.
    pub fn lookup(
        &self,
        name: &Name,
        types: &[Qtype],
        classes: &[Qclass],
    ) -> Result<Vec<Record>, Error> {
        let default_types = [Qtype::from(Type::A)];
        let default_classes = [Qclass::from(Class::IN)];
        let types = if types.is_empty() { &default_types[..] } else { types };
        let classes = if classes.is_empty() {
            &default_classes[..]
        } else {
            classes
        };
        if let Some(qtype) = types.iter().find(|t| **t == Qtype::AXFR || **t == Qtype::IXFR) {
            return Err(Error::Configuration(format!(
                "{qtype} is a zone transfer; use list_zone"
            )));
        }

        let mut records = Vec::new();
        for qclass in classes {
            for qtype in types {
                let question = crate::message::Question::new(name.clone(), *qtype, *qclass);
                info!("resolving {}", question);
                records.extend(self.resolve(question)?);
            }
        }
        Ok(records)
    }
}

fn parse_name(text: &str, what: &str) -> Result<Name, Error> {
    text.parse()
        .map_err(|e| Error::Configuration(format!("invalid {what} {text:?}: {e}")))
}

/// Asks the operating system for an address of `hostname`, preferring
/// IPv4.
fn system_address(hostname: &str, port: u16) -> Option<IpAddr> {
    let host = hostname.trim_end_matches('.');
    match (host, port).to_socket_addrs() {
        Ok(addrs) => {
            let addrs: Vec<SocketAddr> = addrs.collect();
            addrs
                .iter()
                .find(|a| a.is_ipv4())
                .or_else(|| addrs.first())
                .map(SocketAddr::ip)
        }
        Err(e) => {
            debug!("system lookup of {} failed: {}", host, e);
            None
        }
    }
}

fn describe_server(resolver: &Resolver, id: ServerId) -> String {
    match resolver.shared.slist.server(id) {
        Some(server) => server.to_string(),
        None => format!("{id:?}"),
    }
}

////////////////////////////////////////////////////////////////////////
// TYPE AND CLASS NAMES                                               //
////////////////////////////////////////////////////////////////////////

/// Parses type mnemonics (`A`, `MX`, `TYPE65`, `ANY`, ...).
pub fn parse_types<S: AsRef<str>>(names: &[S]) -> Result<Vec<Qtype>, Error> {
    names
        .iter()
        .map(|name| {
            let name = name.as_ref();
            name.parse()
                .map_err(|e| Error::Configuration(format!("bad type {name:?}: {e}")))
        })
        .collect()
}

/// Parses class mnemonics (`IN`, `CH`, `CLASS9`, `ANY`, ...).
pub fn parse_classes<S: AsRef<str>>(names: &[S]) -> Result<Vec<Qclass>, Error> {
    names
        .iter()
        .map(|name| {
            let name = name.as_ref();
            name.parse()
                .map_err(|e| Error::Configuration(format!("bad class {name:?}: {e}")))
        })
        .collect()
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::testing::*;
    use super::*;

    #[test]
    fn type_and_class_names_parse() {
        assert_eq!(
            parse_types(&["a", "MX", "TYPE65", "any"]).unwrap(),
            vec![
                Qtype::from(Type::A),
                Qtype::from(Type::MX),
                Qtype::from(65),
                Qtype::ANY
            ]
        );
        assert_eq!(
            parse_classes(&["IN", "ch", "*"]).unwrap(),
            vec![Qclass::from(Class::IN), Qclass::from(Class::CH), Qclass::ANY]
        );
        assert!(matches!(parse_types(&["BOGUS"]), Err(Error::Configuration(_))));
        assert!(matches!(parse_classes(&["XX"]), Err(Error::Configuration(_))));
    }

    #[test]
    fn initial_servers_are_registered() {
        let transport = ScriptedTransport::new(|_| Err(crate::net::Error::TimedOut));
        let resolver = test_resolver(transport.clone());
        let ip = IpAddr::from(Ipv4Addr::new(192, 0, 2, 1));
        let id = resolver
            .add_initial_server("ns1.example.", Some(ip), 5353, "example.")
            .unwrap();
        let zone: Name = "example.".parse().unwrap();
        assert!(resolver.slist().has_server(&zone, id));
        assert_eq!(
            resolver.slist().server(id).unwrap().socket_addr(),
            Some(SocketAddr::new(ip, 5353))
        );

        // A bare address works as a host name.
        let by_ip = resolver
            .add_initial_server("192.0.2.2", None, 53, "example.")
            .unwrap();
        assert!(resolver.slist().server(by_ip).unwrap().ip().is_some());

        // The known address is reused.
        let again = resolver
            .add_initial_server("ns1.example.", None, 5353, "other.example.")
            .unwrap();
        assert_eq!(again, id);
        assert!(transport.exchanges().is_empty());
    }

    #[test]
    fn bad_initial_servers_are_rejected() {
        let resolver = test_resolver(ScriptedTransport::new(|_| Err(crate::net::Error::TimedOut)));
        assert!(matches!(
            resolver.add_initial_server("", None, 53, "example."),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            resolver.add_initial_server("ns1.example.", None, 53, "a..b"),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn conflicting_initial_servers_are_rejected() {
        let resolver = test_resolver(ScriptedTransport::new(|_| Err(crate::net::Error::TimedOut)));
        let first = IpAddr::from(Ipv4Addr::new(192, 0, 2, 1));
        let second = IpAddr::from(Ipv4Addr::new(192, 0, 2, 2));
        let id = resolver
            .add_initial_server("ns1.example.", Some(first), 53, "example.")
            .unwrap();
        assert!(matches!(
            resolver.add_initial_server("NS1.example.", Some(second), 53, "example."),
            Err(Error::Configuration(_))
        ));
        assert_eq!(resolver.slist().servers(&"example.".parse().unwrap()).len(), 1);

        // Repeating the same registration is fine, as is another port
        // or another zone.
        assert_eq!(
            resolver
                .add_initial_server("ns1.example.", Some(first), 53, "example.")
                .unwrap(),
            id
        );
        assert!(resolver
            .add_initial_server("ns1.example.", Some(second), 5353, "example.")
            .is_ok());
        assert!(resolver
            .add_initial_server("ns1.example.", Some(second), 53, "other.example.")
            .is_ok());
    }

    #[test]
    fn root_hints_populate_root_zone() {
        let resolver = test_resolver(ScriptedTransport::new(|_| Err(crate::net::Error::TimedOut)));
        resolver.add_root_hints();
        assert_eq!(resolver.slist().servers(&Name::root()).len(), 13);
    }

    #[test]
    fn zone_transfers_are_not_lookups() {
        let transport = ScriptedTransport::new(|_| Err(crate::net::Error::TimedOut));
        let resolver = test_resolver(transport.clone());
        assert!(matches!(
            resolver.lookup(&"example.".parse().unwrap(), &[Qtype::AXFR], &[]),
            Err(Error::Configuration(_))
        ));
        assert!(transport.exchanges().is_empty());
    }
}
