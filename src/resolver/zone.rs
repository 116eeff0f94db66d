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

//! Zone listing through AXFR.

use std::net::{IpAddr, SocketAddr};

use log::{debug, info, warn};

use super::{Error, Resolver};
use crate::class::Class;
use crate::message::{Message, Qclass, Qtype, Question, Rcode};
use crate::name::Name;
use crate::net::DNS_PORT;
use crate::rr::{Record, Type};

impl Resolver {
    /// Lists the records of `zone` by asking its name servers for a
    /// zone transfer over TCP.
    ///
    /// If the first label of `zone` starts with `_` (as in
    /// `_tcp.example.com.`), the parent zone is transferred and only
    /// records whose second label is that label are returned.
    ///
    /// Only transfers that fit in a single message are supported. A
    /// transfer whose answer does not both begin and end with the
    /// zone's SOA record is incomplete, and the next server is tried.
    /// The closing SOA record is not returned.
    pub fn list_zone(&self, zone: &Name) -> Result<Vec<Record>, Error> {
        let (zone, filter) = split_protocol_label(zone);
        let addrs = self.transfer_candidates(&zone)?;

        let id = rand::random();
        let question = Question::new(zone.clone(), Qtype::AXFR, Class::IN);
        let query = Message::query(id, false, question).encode()?;
        let config = &self.shared.config;
        let timeout = config.timeout_for_round(config.timeout_retries.saturating_sub(1));

        for addr in addrs {
            info!("requesting a transfer of {} from {}", zone, addr);
            let octets = match self.shared.transport.exchange_tcp(addr, &query, timeout) {
                Ok(octets) => octets,
                Err(e) => {
                    debug!("transfer from {} failed: {}", addr, e);
                    continue;
                }
            };
            let response = match Message::decode(&octets) {
                Ok(response) => response,
                Err(e) => {
                    debug!("malformed transfer from {}: {}", addr, e);
                    continue;
                }
            };
            if response.header.id != id {
                debug!("transfer from {} has the wrong ID", addr);
                continue;
            }
            if response.header.rcode != Rcode::NoError {
                debug!("{} refused a transfer of {}: {}", addr, zone, response.header.rcode);
                continue;
            }

            let mut answers = response.answers;
            if !is_complete_transfer(&zone, &answers) {
                warn!("Transfer of {} from {} is incomplete; ignoring it", zone, addr);
                continue;
            }
            answers.pop();

            for record in &answers {
                self.shared.cache.put(record.clone());
            }
            let records = match filter {
                Some(label) => answers
                    .into_iter()
                    .filter(|record| second_label_is(record.owner(), &label))
                    .collect(),
                None => answers,
            };
            return Ok(records);
        }

        Err(Error::Unavailable(format!(
            "no server for {zone} allowed a zone transfer"
        )))
    }

    /// Returns the addresses of the servers that might transfer `zone`:
    /// those already registered for it, then those named by its NS
    /// records.
    fn transfer_candidates(&self, zone: &Name) -> Result<Vec<SocketAddr>, Error> {
        let ns_records = self.lookup(
            zone,
            &[Qtype::from(Type::NS)],
            &[Qclass::from(Class::IN)],
        )?;

        let mut addrs: Vec<SocketAddr> = self
            .shared
            .slist
            .servers(zone)
            .into_iter()
            .filter_map(|(_, server, _)| server.socket_addr())
            .collect();

        for host in ns_records.iter().filter_map(|r| r.rdata().target_name()) {
            match self.lookup(host, &[Qtype::from(Type::A)], &[Qclass::from(Class::IN)]) {
                Ok(records) => {
                    for ip in records.iter().filter_map(|r| r.rdata().ipv4_addr()) {
                        let addr = SocketAddr::new(IpAddr::V4(ip), DNS_PORT);
                        if !addrs.contains(&addr) {
                            addrs.push(addr);
                        }
                    }
                }
                Err(e) => debug!("could not find the address of {}: {}", host, e),
            }
        }
        Ok(addrs)
    }
}

/// Checks that `answers` is bracketed by SOA records for `zone`, as
/// a whole AXFR answer is (RFC 5936 § 2.2).
fn is_complete_transfer(zone: &Name, answers: &[Record]) -> bool {
    let is_zone_soa = |record: &Record| record.rr_type() == Type::SOA && record.owner() == zone;
    match (answers.first(), answers.last()) {
        (Some(first), Some(last)) => answers.len() >= 2 && is_zone_soa(first) && is_zone_soa(last),
        _ => false,
    }
}

/// Splits a leading `_` label off `zone`, returning the parent and the
/// label.
fn split_protocol_label(zone: &Name) -> (Name, Option<String>) {
    let label = zone.first_label();
    match zone.parent() {
        Some(parent) if label.starts_with(b"_") => {
            (parent, Some(String::from_utf8_lossy(label).into_owned()))
        }
        _ => (zone.clone(), None),
    }
}

fn second_label_is(owner: &Name, label: &str) -> bool {
    owner
        .labels()
        .nth(1)
        .map_or(false, |l| l.eq_ignore_ascii_case(label.as_bytes()))
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
