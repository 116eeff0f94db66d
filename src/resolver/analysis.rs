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

//! Interpretation of responses.
//!
//! [`analyze_answer`] sorts the records of a response into those that
//! answer the question and those that are merely worth caching, and
//! notes any aliases and delegations the response carries. It has no
//! side effects; the resolver acts on the returned [`AnalysisReport`].

use std::net::Ipv4Addr;

use super::error::ProtocolError;
use super::MAX_ALIAS_HOPS;
use crate::message::{Message, Qtype, Question, Rcode};
use crate::name::Name;
use crate::rr::{Rdata, Record, Type};

/// What a response says about a question.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AnalysisReport {
    /// The response answers the question completely.
    pub complete_answer: bool,

    /// The response is a name error (NXDOMAIN).
    pub name_error: bool,

    /// The authority section delegates to other servers.
    pub delegation_arrived: bool,

    /// The question's name is an alias; see `new_name`.
    pub alias_received: bool,

    /// The TC bit was set.
    pub truncated: bool,

    /// The records answering the question.
    pub records: Vec<Record>,

    /// The delegations found in the authority section.
    pub delegations: Vec<Delegation>,

    /// The canonical name at the end of the alias chain, if any.
    pub new_name: Option<Name>,

    /// Other records worth caching.
    pub extras: Vec<Record>,
}

/// An NS record from the authority section of a response, together
/// with any glue addresses found for its target.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Delegation {
    pub zone: Name,
    pub server: Name,
    pub addresses: Vec<Ipv4Addr>,
}

impl AnalysisReport {
    /// Returns the zones delegated to, without duplicates.
    pub fn delegated_zones(&self) -> Vec<&Name> {
        let mut zones: Vec<&Name> = Vec::new();
        for delegation in &self.delegations {
            if !zones.contains(&&delegation.zone) {
                zones.push(&delegation.zone);
            }
        }
        zones
    }

    /// Returns the name servers from the authority section that came
    /// without glue addresses.
    pub fn unresolved_servers(&self) -> impl Iterator<Item = &Name> {
        self.delegations
            .iter()
            .filter(|d| d.addresses.is_empty())
            .map(|d| &d.server)
    }
}

/// Analyzes `response`, received for a query with ID `expected_id`
/// asking `question`.
pub fn analyze_answer(
    question: &Question,
    response: &Message,
    expected_id: u16,
) -> Result<AnalysisReport, ProtocolError> {
    if response.header.id != expected_id {
        return Err(ProtocolError::IdMismatch {
            expected: expected_id,
            received: response.header.id,
        });
    }

    let mut report = AnalysisReport {
        truncated: response.header.tc,
        ..Default::default()
    };
    if response.header.rcode == Rcode::NxDomain {
        report.name_error = true;
        return Ok(report);
    }

    let chain = alias_chain(question, response);
    let in_chain = |record: &Record| {
        chain.contains(record.owner()) && question.qclass.matches(record.class())
    };

    for record in &response.answers {
        if in_chain(record) && question.qtype.matches(record.rr_type()) {
            if question.qtype != Qtype::ANY || record.rr_type() != Type::CNAME {
                report.complete_answer = true;
            }
            report.records.push(record.clone());
        } else {
            report.extras.push(record.clone());
        }
    }

    let canonical = chain.last().unwrap_or(&question.qname);
    if chain.len() > 1 {
        report.alias_received = true;
        report.new_name = Some(canonical.clone());
    }

    // Additional records answer the question only for the target of an
    // alias. Anything else there, including glue for the question's own
    // name in a referral, is merely cached.
    for record in &response.additionals {
        if report.alias_received
            && !report.complete_answer
            && record.owner() == canonical
            && question.qclass.matches(record.class())
            && question.qtype.matches(record.rr_type())
        {
            report.records.push(record.clone());
        } else {
            report.extras.push(record.clone());
        }
    }
    if !report.records.is_empty() && report.records.iter().any(|r| r.rr_type() != Type::CNAME) {
        report.complete_answer = true;
    }

    // An authoritative response with nothing for us is a (negative)
    // answer all the same, unless it points elsewhere through an alias.
    if response.header.aa && !report.alias_received {
        report.complete_answer = true;
    }

    for record in &response.authorities {
        if let Rdata::Ns(server) = record.rdata() {
            let addresses = response
                .additionals
                .iter()
                .filter(|r| r.owner() == server)
                .filter_map(|r| r.rdata().ipv4_addr())
                .collect();
            report.delegations.push(Delegation {
                zone: record.owner().clone(),
                server: server.clone(),
                addresses,
            });
        }
        report.extras.push(record.clone());
    }
    report.delegation_arrived = !report.delegations.is_empty();

    reconcile_ttls(&mut report);
    Ok(report)
}

/// Follows CNAME records in the answer section, starting from the
/// question's name. The chain is never followed when the question asks
/// for CNAME records themselves.
fn alias_chain(question: &Question, response: &Message) -> Vec<Name> {
    let mut chain = vec![question.qname.clone()];
    if question.qtype == Qtype::from(Type::CNAME) {
        return chain;
    }
    while chain.len() <= MAX_ALIAS_HOPS {
        let last = &chain[chain.len() - 1];
        let next = response.answers.iter().find_map(|r| match r.rdata() {
            Rdata::Cname(target) if r.owner() == last && question.qclass.matches(r.class()) => {
                Some(target.clone())
            }
            _ => None,
        });
        match next {
            Some(target) if !chain.contains(&target) => chain.push(target),
            _ => break,
        }
    }
    chain
}

/// Gives every record of an RRset the lowest TTL seen for that RRset
/// among the answer and extra records (RFC 2181 § 5.2).
fn reconcile_ttls(report: &mut AnalysisReport) {
    let all: Vec<Record> = report
        .records
        .iter()
        .chain(report.extras.iter())
        .cloned()
        .collect();
    let reconcile = |record: &Record| {
        let min_ttl = all
            .iter()
            .filter(|other| other.same_rrset_as(record))
            .map(Record::ttl)
            .min()
            .unwrap_or_else(|| record.ttl());
        record.with_ttl(min_ttl)
    };
    report.records = report.records.iter().map(reconcile).collect();
    report.extras = report.extras.iter().map(reconcile).collect();
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use crate::cache::ResolverCache;
    use crate::rr::Ttl;

    #[test]
    fn simple_answer_is_complete() {
        let question = a_question("example.com.");
        let mut response = response_to(&question, 7);
        response.answers.push(a_record("example.com.", 300, [93, 184, 216, 34]));

        let report = analyze_answer(&question, &response, 7).unwrap();
        assert!(report.complete_answer);
        assert!(!report.alias_received);
        assert_eq!(report.records, vec![a_record("example.com.", 300, [93, 184, 216, 34])]);

        let cache = ResolverCache::new();
        for record in report.records.iter().chain(&report.extras) {
            cache.put(record.clone());
        }
        assert_eq!(cache.get(&question), report.records);
    }

    #[test]
    fn id_mismatch_is_rejected() {
        let question = a_question("example.com.");
        let response = response_to(&question, 7);
        assert_eq!(
            analyze_answer(&question, &response, 8),
            Err(ProtocolError::IdMismatch {
                expected: 8,
                received: 7
            })
        );
    }

    #[test]
    fn name_error_short_circuits() {
        let question = a_question("nonexistent.example.");
        let mut response = response_to(&question, 1);
        response.header.rcode = Rcode::NxDomain;
        response.answers.push(a_record("nonexistent.example.", 300, [192, 0, 2, 1]));
        let report = analyze_answer(&question, &response, 1).unwrap();
        assert!(report.name_error);
        assert!(report.records.is_empty());
    }

    #[test]
    fn alias_without_target_records() {
        let question = a_question("www.example.com.");
        let mut response = response_to(&question, 1);
        response.answers.push(cname_record("www.example.com.", "example.com."));

        let report = analyze_answer(&question, &response, 1).unwrap();
        assert!(report.alias_received);
        assert!(!report.complete_answer);
        assert_eq!(report.new_name, Some("example.com.".parse().unwrap()));
        assert!(report.records.is_empty());
        assert_eq!(report.extras, vec![cname_record("www.example.com.", "example.com.")]);
    }

    #[test]
    fn alias_resolved_inline() {
        let question = a_question("www.example.com.");
        let mut response = response_to(&question, 1);
        response.answers.push(cname_record("www.example.com.", "web.example.net."));
        response.answers.push(cname_record("web.example.net.", "example.org."));
        response.additionals.push(a_record("example.org.", 60, [192, 0, 2, 80]));

        let report = analyze_answer(&question, &response, 1).unwrap();
        assert!(report.alias_received);
        assert!(report.complete_answer);
        assert_eq!(report.new_name, Some("example.org.".parse().unwrap()));
        assert_eq!(report.records, vec![a_record("example.org.", 60, [192, 0, 2, 80])]);
    }

    #[test]
    fn any_query_accepts_everything_at_the_name() {
        let question = Question::new("example.com.".parse().unwrap(), Qtype::ANY, crate::class::Class::IN);
        let mut response = response_to(&question, 1);
        response.answers.push(a_record("example.com.", 300, [192, 0, 2, 1]));
        response.answers.push(ns_record("example.com.", "ns1.example.com."));
        response.answers.push(a_record("other.example.", 300, [192, 0, 2, 2]));

        let report = analyze_answer(&question, &response, 1).unwrap();
        assert!(report.complete_answer);
        assert_eq!(report.records.len(), 2);
        assert_eq!(report.extras, vec![a_record("other.example.", 300, [192, 0, 2, 2])]);
    }

    #[test]
    fn authoritative_nodata_is_complete() {
        let question = a_question("example.com.");
        let mut response = response_to(&question, 1);
        response.header.aa = true;
        response.answers.push(a_record("unrelated.example.", 300, [192, 0, 2, 1]));
        let report = analyze_answer(&question, &response, 1).unwrap();
        assert!(report.complete_answer);
        assert!(report.records.is_empty());
        assert_eq!(report.extras.len(), 1);
    }

    #[test]
    fn referral_is_recorded() {
        let question = a_question("www.example.com.");
        let mut response = response_to(&question, 1);
        response.authorities.push(ns_record("example.com.", "ns1.example.com."));
        response.authorities.push(ns_record("example.com.", "ns.example.net."));
        response.additionals.push(a_record("ns1.example.com.", 3600, [192, 0, 2, 53]));

        let report = analyze_answer(&question, &response, 1).unwrap();
        assert!(!report.complete_answer);
        assert!(report.delegation_arrived);
        assert_eq!(report.delegated_zones(), vec![&"example.com.".parse::<Name>().unwrap()]);
        assert_eq!(report.delegations[0].addresses, vec![Ipv4Addr::new(192, 0, 2, 53)]);
        let unresolved: Vec<_> = report.unresolved_servers().collect();
        assert_eq!(unresolved, vec![&"ns.example.net.".parse::<Name>().unwrap()]);
        assert_eq!(report.extras.len(), 3);
    }

    #[test]
    fn referral_glue_for_the_question_is_not_an_answer() {
        let question = a_question("ns1.example.com.");
        let mut response = response_to(&question, 1);
        response.authorities.push(ns_record("example.com.", "ns1.example.com."));
        response.additionals.push(a_record("ns1.example.com.", 3600, [192, 0, 2, 2]));

        let report = analyze_answer(&question, &response, 1).unwrap();
        assert!(!report.complete_answer);
        assert!(report.records.is_empty());
        assert!(report.delegation_arrived);
        assert_eq!(report.delegations[0].addresses, vec![Ipv4Addr::new(192, 0, 2, 2)]);
        assert!(report
            .extras
            .contains(&a_record("ns1.example.com.", 3600, [192, 0, 2, 2])));
    }

    #[test]
    fn compressed_response_is_analyzed() {
        // A response to "example.com. A IN" whose answer owner is a
        // pointer to the question name at offset 12.
        let octets = b"\x12\x34\x81\x80\x00\x01\x00\x01\x00\x00\x00\x00\
                       \x07example\x03com\x00\x00\x01\x00\x01\
                       \xc0\x0c\x00\x01\x00\x01\x00\x00\x01\x2c\x00\x04\
                       \x5d\xb8\xd8\x22";
        let response = Message::decode(octets).unwrap();
        assert_eq!(response.answers[0].owner(), &"example.com.".parse::<Name>().unwrap());

        let report = analyze_answer(&a_question("example.com."), &response, 0x1234).unwrap();
        assert!(report.complete_answer);
        assert_eq!(report.records, vec![a_record("example.com.", 300, [93, 184, 216, 34])]);
    }

    #[test]
    fn rrset_ttls_are_reconciled() {
        let question = a_question("example.com.");
        let mut response = response_to(&question, 1);
        response.answers.push(a_record("example.com.", 300, [192, 0, 2, 1]));
        response.answers.push(a_record("example.com.", 100, [192, 0, 2, 2]));
        response.additionals.push(a_record("example.com.", 50, [192, 0, 2, 3]));

        let report = analyze_answer(&question, &response, 1).unwrap();
        assert!(report.records.iter().all(|r| r.ttl() == Ttl::from(50)));
        assert_eq!(report.records.len(), 2);
        assert_eq!(report.extras[0].ttl(), Ttl::from(50));
    }

    #[test]
    fn rrset_ttls_reconcile_to_minimum_of_pair() {
        let question = a_question("example.com.");
        let mut response = response_to(&question, 1);
        response.answers.push(a_record("example.com.", 300, [192, 0, 2, 1]));
        response.answers.push(a_record("example.com.", 100, [192, 0, 2, 2]));

        let report = analyze_answer(&question, &response, 1).unwrap();
        let ttls: Vec<_> = report.records.iter().map(Record::ttl).collect();
        assert_eq!(ttls, vec![Ttl::from(100), Ttl::from(100)]);
    }
}
