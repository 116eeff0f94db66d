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

//! Resolution of a single question.
//!
//! A question is resolved in rounds. In each round, the resolver starts
//! at the closest zone it might know servers for (the question's name,
//! less any leading `_` labels) and asks the best-ranked servers of
//! that zone one after another. Zones with no servers left to ask are
//! abandoned for their parent. Referrals move the search down to the
//! delegated zone, and aliases restart it for the canonical name. Each
//! round doubles the exchange timeout of the last.

use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, warn};

use super::analysis::{analyze_answer, AnalysisReport};
use super::{Error, Resolver, MAX_ALIAS_HOPS};
use crate::class::Class;
use crate::message::{Message, Qclass, Qtype, Question, Rcode};
use crate::name::Name;
use crate::net::{self, DNS_PORT};
use crate::rr::{Record, Type};
use crate::slist::{ResponseTime, Server, ServerId};

impl Resolver {
    /// Resolves one question.
    ///
    /// If no server can answer, [`Error::Unavailable`] is returned,
    /// just as when a zone cannot be transferred.
    pub(super) fn resolve(&self, mut question: Question) -> Result<Vec<Record>, Error> {
        let shared = &*self.shared;
        let config = &shared.config;
        let background_class = if question.qclass == Qclass::ANY {
            Class::IN
        } else {
            Class::from(question.qclass)
        };
        let mut alias_hops = 0;

        'question: loop {
            if question.is_concrete() {
                let cached = shared.cache.get(&question);
                if !cached.is_empty() {
                    debug!("answered {} from the cache", question);
                    return Ok(cached);
                }
            }

            let start_zone = question.qname.without_underscore_labels();
            let id = rand::random();
            let query = Message::query(id, config.recursion_desired, question.clone()).encode()?;

            // Servers that replied, keyed by the zone they were asked
            // as a server of.
            let mut visited: HashSet<(Name, ServerId)> = HashSet::new();

            for round in 0..config.timeout_retries {
                let timeout = config.timeout_for_round(round);
                let mut work_zone = start_zone.clone();
                let mut tried: HashSet<ServerId> = HashSet::new();
                debug!("round {} for {} (timeout {:?})", round + 1, question, timeout);

                loop {
                    let exclude: HashSet<ServerId> = visited
                        .iter()
                        .filter(|(zone, _)| *zone == work_zone)
                        .map(|(_, id)| *id)
                        .chain(tried.iter().copied())
                        .collect();
                    let Some((server_id, server)) = shared.slist.best_guess(&work_zone, &exclude) else {
                        match work_zone.parent() {
                            Some(parent) => {
                                work_zone = parent;
                                tried.clear();
                                continue;
                            }
                            None => break,
                        }
                    };
                    tried.insert(server_id);

                    let Some(addr) = server.socket_addr() else {
                        self.schedule_address_lookup(server.name().clone(), background_class);
                        shared
                            .slist
                            .update_entry(&work_zone, server_id, ResponseTime::NetworkFailure);
                        continue;
                    };

                    let Some((response, elapsed)) =
                        self.query_server(&work_zone, server_id, &server, addr, &query, timeout)
                    else {
                        continue;
                    };
                    visited.insert((work_zone.clone(), server_id));

                    if response.header.id != id {
                        warn!(
                            "Dropping {} from {}: response ID {} does not match query ID {}",
                            server, work_zone, response.header.id, id
                        );
                        shared.slist.drop_server(&work_zone, server_id);
                        continue;
                    }

                    match response.header.rcode {
                        Rcode::NoError => (),
                        Rcode::NxDomain if response.header.aa => {
                            shared.slist.update_entry(
                                &work_zone,
                                server_id,
                                ResponseTime::Measured(elapsed),
                            );
                            debug!("{} reports that {} does not exist", server, question.qname);
                            return Err(Error::NotFound(question.qname));
                        }
                        rcode => {
                            debug!("{} answered {} with {}", server, question, rcode);
                            shared
                                .slist
                                .update_entry(&work_zone, server_id, ResponseTime::ServerFailure);
                            continue;
                        }
                    }
                    shared
                        .slist
                        .update_entry(&work_zone, server_id, ResponseTime::Measured(elapsed));

                    // A response that is still truncated but has no
                    // authority or additional records lost part of its
                    // answer section.
                    if response.header.tc
                        && response.authorities.is_empty()
                        && response.additionals.is_empty()
                    {
                        debug!("answer from {} is truncated; not using it", server);
                        continue;
                    }

                    let report = match analyze_answer(&question, &response, id) {
                        Ok(report) => report,
                        Err(e) => {
                            warn!("Dropping {} from {}: {}", server, work_zone, e);
                            shared.slist.drop_server(&work_zone, server_id);
                            continue;
                        }
                    };
                    self.learn_delegations(&report, background_class);

                    // Truncated data must not be cached (RFC 1123
                    // § 6.1.3.2).
                    if !report.truncated {
                        for record in report.records.iter().chain(&report.extras) {
                            shared.cache.put(record.clone());
                        }
                    }

                    if report.complete_answer
                        && (response.header.aa || !config.authoritative_only)
                    {
                        return Ok(report.records);
                    }

                    if report.alias_received {
                        if let Some(new_name) = report.new_name.clone() {
                            alias_hops += 1;
                            if alias_hops > MAX_ALIAS_HOPS {
                                return Err(Error::Unavailable(format!(
                                    "more than {MAX_ALIAS_HOPS} aliases for {}",
                                    question.qname
                                )));
                            }
                            debug!("{} is an alias for {}", question.qname, new_name);
                            question = question.with_qname(new_name);
                            continue 'question;
                        }
                    }

                    if report.delegation_arrived {
                        let zones = report.delegated_zones();
                        if let Some(zone) = closer_zone(&question.qname, &work_zone, &zones) {
                            debug!("following delegation from {} to {}", work_zone, zone);
                            work_zone = zone;
                        }
                    }
                }
            }

            return Err(Error::Unavailable(format!("no server could answer {question}")));
        }
    }

    /// Exchanges `query` with a server, retrying over TCP if a UDP
    /// response is truncated. Failures are recorded in the server list
    /// and yield `None`.
    fn query_server(
        &self,
        zone: &Name,
        server_id: ServerId,
        server: &Server,
        addr: SocketAddr,
        query: &[u8],
        timeout: Option<Duration>,
    ) -> Option<(Message, Duration)> {
        let shared = &*self.shared;
        let start = Instant::now();
        let result = if shared.config.force_tcp {
            shared.transport.exchange_tcp(addr, query, timeout)
        } else {
            shared.transport.exchange_udp(addr, query, timeout)
        };

        let octets = match result {
            Ok(octets) => octets,
            Err(net::Error::TimedOut) => {
                debug!("{} timed out", server);
                shared.slist.update_entry(zone, server_id, ResponseTime::Timeout);
                return None;
            }
            Err(e) => {
                debug!("exchange with {} failed: {}", server, e);
                shared
                    .slist
                    .update_entry(zone, server_id, ResponseTime::NetworkFailure);
                return None;
            }
        };
        let elapsed = start.elapsed();

        let mut response = match Message::decode(&octets) {
            Ok(response) => response,
            Err(e) => {
                warn!("Dropping {} from {}: malformed response: {}", server, zone, e);
                shared.slist.drop_server(zone, server_id);
                return None;
            }
        };

        if response.header.tc && !shared.config.force_tcp {
            debug!("response from {} is truncated; retrying over TCP", server);
            match shared.transport.exchange_tcp(addr, query, timeout) {
                Ok(octets) => match Message::decode(&octets) {
                    Ok(full) => response = full,
                    Err(e) => debug!("malformed TCP response from {}: {}", server, e),
                },
                Err(e) => debug!("TCP retry with {} failed: {}", server, e),
            }
        }
        Some((response, elapsed))
    }

    /// Adds the servers named in the delegations of `report` to the
    /// server list, and looks up the addresses of those that came
    /// without glue.
    fn learn_delegations(&self, report: &AnalysisReport, class: Class) {
        let slist = &self.shared.slist;
        for delegation in &report.delegations {
            for address in &delegation.addresses {
                let ip = IpAddr::V4(*address);
                let id = slist.add_server(delegation.server.clone(), Some(ip), DNS_PORT);
                slist.add_to_zone(&delegation.zone, id);
            }
        }
        for delegation in report.delegations.iter().filter(|d| d.addresses.is_empty()) {
            let id = slist.add_server(delegation.server.clone(), None, DNS_PORT);
            slist.add_to_zone(&delegation.zone, id);
        }
        for host in report.unresolved_servers() {
            if slist.address_of(host).is_none() {
                self.schedule_address_lookup(host.clone(), class);
            }
        }
    }

    /// Starts a background lookup of the address of `host`. When it
    /// succeeds, the address is filled into the server list.
    fn schedule_address_lookup(&self, host: Name, class: Class) {
        let slist = self.shared.slist.clone();
        let on_resolved = move |host: &Name, ip: IpAddr| {
            slist.set_server_ip(host, ip);
        };

        // The task must not keep the resolver alive.
        let weak = Arc::downgrade(&self.shared);
        let task_host = host.clone();
        self.shared.background.schedule(host, class, move || {
            let Some(shared) = weak.upgrade() else {
                return;
            };
            let resolver = Resolver { shared };
            let result =
                resolver.lookup(&task_host, &[Qtype::from(Type::A)], &[Qclass::from(class)]);
            match result {
                Ok(records) => match records.iter().find_map(|r| r.rdata().ipv4_addr()) {
                    Some(ip) => on_resolved(&task_host, IpAddr::V4(ip)),
                    None => debug!("no address found for {}", task_host),
                },
                Err(e) => debug!("background lookup of {} failed: {}", task_host, e),
            }
        });
    }
}

/// Picks the delegated zone that encloses `qname` most closely, if it
/// is closer than `work_zone`.
fn closer_zone(qname: &Name, work_zone: &Name, zones: &[&Name]) -> Option<Name> {
    let current = qname.common_suffix_len(work_zone);
    zones
        .iter()
        .filter(|zone| qname.eq_or_subdomain_of(zone))
        .max_by_key(|zone| qname.common_suffix_len(zone))
        .filter(|zone| qname.common_suffix_len(zone) > current)
        .map(|zone| (*zone).clone())
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread::sleep;

    use super::super::testing::*;
    use super::*;

    fn name(text: &str) -> Name {
        text.parse().unwrap()
    }

    fn a_lookup(resolver: &Resolver, host: &str) -> Result<Vec<Record>, Error> {
        resolver.lookup(&name(host), &[Qtype::from(Type::A)], &[Qclass::from(Class::IN)])
    }

    fn add_server(resolver: &Resolver, last_octet: u8, zone: &str) -> ServerId {
        let addr = server_addr(last_octet);
        resolver
            .add_initial_server(&format!("ns{last_octet}.test."), Some(addr.ip()), 53, zone)
            .unwrap()
    }

    #[test]
    fn closer_zone_works() {
        let qname = name("www.example.com.");
        let example = name("example.com.");
        let sibling = name("other.example.com.");
        assert_eq!(closer_zone(&qname, &Name::root(), &[&example, &sibling]), Some(example.clone()));
        assert_eq!(closer_zone(&qname, &example, &[&example]), None);
        assert_eq!(closer_zone(&qname, &name("com."), &[&sibling]), None);
    }

    #[test]
    fn answer_is_returned_and_cached() {
        let transport = ScriptedTransport::new(|exchange| {
            let mut response = reply_to(&exchange.query);
            response.header.aa = true;
            response.answers.push(a_record("example.com.", 300, [93, 184, 216, 34]));
            Ok(response)
        });
        let resolver = test_resolver(transport.clone());
        add_server(&resolver, 1, "example.com.");

        let expected = vec![a_record("example.com.", 300, [93, 184, 216, 34])];
        assert_eq!(a_lookup(&resolver, "example.com.").unwrap(), expected);
        assert_eq!(resolver.cache().get(&a_question("example.com.")), expected);

        // The second lookup is answered from the cache.
        assert_eq!(a_lookup(&resolver, "example.com.").unwrap(), expected);
        assert_eq!(transport.exchanges().len(), 1);
        let query = &transport.exchanges()[0].query;
        assert!(query.header.rd);
        assert_eq!(query.questions, vec![a_question("example.com.")]);
    }

    #[test]
    fn authoritative_name_error_is_not_found() {
        let transport = ScriptedTransport::new(|exchange| {
            let mut response = reply_to(&exchange.query);
            response.header.aa = true;
            response.header.rcode = Rcode::NxDomain;
            Ok(response)
        });
        let resolver = test_resolver(transport);
        add_server(&resolver, 1, "example.");
        assert_eq!(
            a_lookup(&resolver, "nonexistent.example."),
            Err(Error::NotFound(name("nonexistent.example.")))
        );
    }

    #[test]
    fn non_authoritative_name_error_is_distrusted() {
        let transport = ScriptedTransport::new(|exchange| {
            let mut response = reply_to(&exchange.query);
            if exchange.server == server_addr(1) {
                response.header.rcode = Rcode::NxDomain;
            } else {
                response.header.aa = true;
                response.answers.push(a_record("www.example.", 300, [192, 0, 2, 80]));
            }
            Ok(response)
        });
        let resolver = test_resolver(transport);
        let liar = add_server(&resolver, 1, "example.");
        add_server(&resolver, 2, "example.");
        assert_eq!(a_lookup(&resolver, "www.example.").unwrap().len(), 1);
        assert_eq!(
            resolver.slist().response_time(&name("example."), liar),
            Some(ResponseTime::ServerFailure)
        );
    }

    #[test]
    fn aliases_are_followed() {
        let transport = ScriptedTransport::new(|exchange| {
            let question = &exchange.query.questions[0];
            let mut response = reply_to(&exchange.query);
            response.header.aa = true;
            if question.qname == name("www.example.com.") {
                response.answers.push(cname_record("www.example.com.", "example.com."));
            } else {
                response.answers.push(a_record("example.com.", 300, [93, 184, 216, 34]));
            }
            Ok(response)
        });
        let resolver = test_resolver(transport.clone());
        add_server(&resolver, 1, "example.com.");

        assert_eq!(
            a_lookup(&resolver, "www.example.com.").unwrap(),
            vec![a_record("example.com.", 300, [93, 184, 216, 34])]
        );
        let qnames: Vec<Name> = transport
            .exchanges()
            .into_iter()
            .map(|e| e.query.questions[0].qname.clone())
            .collect();
        assert_eq!(qnames, vec![name("www.example.com."), name("example.com.")]);
    }

    #[test]
    fn alias_loops_end() {
        let transport = ScriptedTransport::new(|exchange| {
            let question = &exchange.query.questions[0];
            let mut response = reply_to(&exchange.query);
            response.header.aa = true;
            let (owner, target) = if question.qname == name("a.example.") {
                ("a.example.", "b.example.")
            } else {
                ("b.example.", "a.example.")
            };
            response.answers.push(cname_record(owner, target));
            Ok(response)
        });
        let resolver = test_resolver(transport.clone());
        add_server(&resolver, 1, "example.");
        assert!(matches!(
            a_lookup(&resolver, "a.example."),
            Err(Error::Unavailable(_))
        ));
        assert_eq!(transport.exchanges().len(), MAX_ALIAS_HOPS + 1);
    }

    #[test]
    fn timeouts_move_on_to_the_next_server() {
        let transport = ScriptedTransport::new(|exchange| {
            if exchange.server == server_addr(3) {
                let mut response = reply_to(&exchange.query);
                response.header.aa = true;
                response.answers.push(a_record("example.com.", 300, [93, 184, 216, 34]));
                Ok(response)
            } else {
                Err(net::Error::TimedOut)
            }
        });
        let resolver = test_resolver(transport.clone());
        let ids: Vec<_> = (1..=3).map(|i| add_server(&resolver, i, "example.com.")).collect();

        assert_eq!(a_lookup(&resolver, "example.com.").unwrap().len(), 1);
        let zone = name("example.com.");
        let slist = resolver.slist();
        assert_eq!(slist.response_time(&zone, ids[0]), Some(ResponseTime::Timeout));
        assert_eq!(slist.response_time(&zone, ids[1]), Some(ResponseTime::Timeout));
        assert!(matches!(
            slist.response_time(&zone, ids[2]),
            Some(ResponseTime::Measured(_))
        ));
        assert_eq!(slist.best_guess(&zone, &HashSet::new()).unwrap().0, ids[2]);

        let servers: Vec<_> = transport.exchanges().into_iter().map(|e| e.server).collect();
        assert_eq!(servers, vec![server_addr(1), server_addr(2), server_addr(3)]);
    }

    #[test]
    fn timeouts_double_between_rounds() {
        let transport = ScriptedTransport::new(|_| Err(net::Error::TimedOut));
        let resolver = test_resolver(transport.clone());
        add_server(&resolver, 1, "example.");
        assert!(matches!(
            a_lookup(&resolver, "example."),
            Err(Error::Unavailable(_))
        ));
        let timeouts: Vec<_> = transport.exchanges().into_iter().map(|e| e.timeout).collect();
        assert_eq!(
            timeouts,
            vec![
                Some(Duration::from_millis(100)),
                Some(Duration::from_millis(200))
            ]
        );
    }

    #[test]
    fn truncated_answer_is_retried_over_tcp() {
        let transport = ScriptedTransport::new(|exchange| {
            let mut response = reply_to(&exchange.query);
            response.header.aa = true;
            response.answers.push(a_record("example.com.", 300, [93, 184, 216, 34]));
            if exchange.protocol == Protocol::Udp {
                response.header.tc = true;
            }
            Ok(response)
        });
        let resolver = test_resolver(transport.clone());
        add_server(&resolver, 1, "example.com.");
        assert_eq!(a_lookup(&resolver, "example.com.").unwrap().len(), 1);
        let protocols: Vec<_> = transport.exchanges().into_iter().map(|e| e.protocol).collect();
        assert_eq!(protocols, vec![Protocol::Udp, Protocol::Tcp]);
        assert_eq!(resolver.cache().get(&a_question("example.com.")).len(), 1);
    }

    #[test]
    fn truncated_answer_is_not_cached_when_tcp_fails() {
        let transport = ScriptedTransport::new(|exchange| match exchange.protocol {
            Protocol::Udp => {
                let mut response = reply_to(&exchange.query);
                response.header.tc = true;
                response.answers.push(a_record("example.com.", 300, [93, 184, 216, 34]));
                Ok(response)
            }
            Protocol::Tcp => Err(net::Error::TimedOut),
        });
        let resolver = test_resolver(transport.clone());
        add_server(&resolver, 1, "example.com.");
        assert!(matches!(
            a_lookup(&resolver, "example.com."),
            Err(Error::Unavailable(_))
        ));
        let protocols: Vec<_> = transport.exchanges().into_iter().map(|e| e.protocol).collect();
        assert_eq!(protocols, vec![Protocol::Udp, Protocol::Tcp]);
        assert!(resolver.cache().get(&a_question("example.com.")).is_empty());
    }

    #[test]
    fn referrals_are_followed() {
        let transport = ScriptedTransport::new(|exchange| {
            let mut response = reply_to(&exchange.query);
            if exchange.server == server_addr(1) {
                response.authorities.push(ns_record("example.com.", "ns.example.com."));
                response.additionals.push(a_record("ns.example.com.", 3600, [192, 0, 2, 2]));
            } else {
                response.header.aa = true;
                response.answers.push(a_record("www.example.com.", 300, [192, 0, 2, 80]));
            }
            Ok(response)
        });
        let resolver = test_resolver(transport.clone());
        add_server(&resolver, 1, ".");

        assert_eq!(a_lookup(&resolver, "www.example.com.").unwrap().len(), 1);
        let servers: Vec<_> = transport.exchanges().into_iter().map(|e| e.server).collect();
        assert_eq!(servers, vec![server_addr(1), server_addr(2)]);
        assert_eq!(resolver.slist().servers(&name("example.com.")).len(), 1);
    }

    #[test]
    fn underscore_labels_are_skipped_for_the_work_zone() {
        let transport = ScriptedTransport::new(|exchange| {
            let mut response = reply_to(&exchange.query);
            response.header.aa = true;
            Ok(response)
        });
        let resolver = test_resolver(transport.clone());
        add_server(&resolver, 1, "_tcp.example.");
        add_server(&resolver, 2, "example.");
        let srv = Qtype::from(Type::SRV);
        assert!(resolver
            .lookup(&name("_ldap._tcp.example."), &[srv], &[])
            .unwrap()
            .is_empty());
        assert_eq!(transport.exchanges()[0].server, server_addr(2));
    }

    #[test]
    fn referral_glue_for_the_question_is_not_an_answer() {
        let transport = ScriptedTransport::new(|exchange| {
            let mut response = reply_to(&exchange.query);
            if exchange.server == server_addr(1) {
                response.authorities.push(ns_record("example.com.", "ns1.example.com."));
                response.additionals.push(a_record("ns1.example.com.", 3600, [192, 0, 2, 2]));
            } else {
                response.header.aa = true;
                response.answers.push(a_record("ns1.example.com.", 300, [192, 0, 2, 53]));
            }
            Ok(response)
        });
        let resolver = test_resolver(transport.clone());
        add_server(&resolver, 1, "com.");

        assert_eq!(
            a_lookup(&resolver, "ns1.example.com.").unwrap(),
            vec![a_record("ns1.example.com.", 300, [192, 0, 2, 53])]
        );
        let servers: Vec<_> = transport.exchanges().into_iter().map(|e| e.server).collect();
        assert_eq!(servers, vec![server_addr(1), server_addr(2)]);
    }

    #[test]
    fn unknown_server_addresses_are_resolved_in_the_background() {
        // The address of ns.example.net. is withheld until the first
        // lookup has given up.
        let first_lookup_done = Arc::new(AtomicBool::new(false));
        let gate = first_lookup_done.clone();
        let transport = ScriptedTransport::new(move |exchange| {
            let question = &exchange.query.questions[0];
            let mut response = reply_to(&exchange.query);
            if question.qname == name("ns.example.net.") {
                while !gate.load(Ordering::SeqCst) {
                    sleep(Duration::from_millis(5));
                }
                response.header.aa = true;
                response.answers.push(a_record("ns.example.net.", 3600, [192, 0, 2, 2]));
            } else if exchange.server == server_addr(1) {
                response.authorities.push(ns_record("example.com.", "ns.example.net."));
            } else {
                response.header.aa = true;
                response.answers.push(a_record("www.example.com.", 300, [192, 0, 2, 80]));
            }
            Ok(response)
        });
        let resolver = test_resolver(transport);
        add_server(&resolver, 1, ".");
        assert!(matches!(
            a_lookup(&resolver, "www.example.com."),
            Err(Error::Unavailable(_))
        ));
        first_lookup_done.store(true, Ordering::SeqCst);

        let host = name("ns.example.net.");
        let deadline = Instant::now() + Duration::from_secs(10);
        while resolver.slist().address_of(&host).is_none() {
            assert!(Instant::now() < deadline, "address was never resolved");
            sleep(Duration::from_millis(5));
        }
        assert_eq!(
            a_lookup(&resolver, "www.example.com.").unwrap(),
            vec![a_record("www.example.com.", 300, [192, 0, 2, 80])]
        );
    }
}
