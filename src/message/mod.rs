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

//! Implementation of reading and writing of DNS messages.

use crate::rr::Record;

mod constants;
mod opcode;
mod question;
mod rcode;
pub mod reader;
pub mod writer;
pub use constants::MAX_UDP_PAYLOAD;
pub use opcode::Opcode;
pub use question::{Qclass, Qtype, Question};
pub use rcode::Rcode;
pub use reader::Reader;
pub use writer::Writer;

use constants::*;

////////////////////////////////////////////////////////////////////////
// HEADER                                                             //
////////////////////////////////////////////////////////////////////////

/// The fixed part of a DNS message header. The section counts are not
/// included, since they are derived from the sections themselves.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Header {
    pub id: u16,
    pub qr: bool,
    pub opcode: Opcode,
    pub aa: bool,
    pub tc: bool,
    pub rd: bool,
    pub ra: bool,
    pub rcode: Rcode,
}

impl Header {
    /// Returns the header for a standard query.
    pub fn query(id: u16, rd: bool) -> Self {
        Self {
            id,
            qr: false,
            opcode: Opcode::Query,
            aa: false,
            tc: false,
            rd,
            ra: false,
            rcode: Rcode::NoError,
        }
    }

    /// Packs the flags into the second header word.
    fn flags_word(&self) -> u16 {
        let mut flags = ((self.opcode.bits() as u16) << OPCODE_SHIFT) & OPCODE_MASK;
        flags |= self.rcode.bits() as u16 & RCODE_MASK;
        for (set, mask) in [
            (self.qr, QR_MASK),
            (self.aa, AA_MASK),
            (self.tc, TC_MASK),
            (self.rd, RD_MASK),
            (self.ra, RA_MASK),
        ] {
            if set {
                flags |= mask;
            }
        }
        flags
    }
}

////////////////////////////////////////////////////////////////////////
// MESSAGES                                                           //
////////////////////////////////////////////////////////////////////////

/// A complete DNS message.
///
/// When a `Message` is encoded, the section counts are taken from the
/// lengths of the four sections, so they can never disagree.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Message {
    pub header: Header,
    pub questions: Vec<Question>,
    pub answers: Vec<Record>,
    pub authorities: Vec<Record>,
    pub additionals: Vec<Record>,
}

impl Message {
    /// Creates a standard query with a single question.
    pub fn query(id: u16, rd: bool, question: Question) -> Self {
        Self {
            header: Header::query(id, rd),
            questions: vec![question],
            answers: Vec::new(),
            authorities: Vec::new(),
            additionals: Vec::new(),
        }
    }

    /// Serializes the message.
    pub fn encode(&self) -> Result<Vec<u8>, writer::Error> {
        let mut writer = Writer::new(&self.header);
        for question in self.questions.iter() {
            writer.add_question(question)?;
        }
        for record in self.answers.iter() {
            writer.add_answer_record(record)?;
        }
        for record in self.authorities.iter() {
            writer.add_authority_record(record)?;
        }
        for record in self.additionals.iter() {
            writer.add_additional_record(record)?;
        }
        Ok(writer.finish())
    }

    /// Decodes a message. Either the whole message is read
    /// successfully, or an error naming the offending field is
    /// returned. Data after the last record is ignored.
    pub fn decode(octets: &[u8]) -> Result<Self, reader::Error> {
        let mut reader = Reader::try_from(octets)?;
        let header = reader.header();
        let counts = [
            reader.qdcount(),
            reader.ancount(),
            reader.nscount(),
            reader.arcount(),
        ];

        let questions = (0..counts[0])
            .map(|_| reader.read_question())
            .collect::<Result<_, _>>()?;
        let mut sections = [Vec::new(), Vec::new(), Vec::new()];
        for (section, count) in sections.iter_mut().zip(&counts[1..]) {
            for _ in 0..*count {
                section.push(reader.read_record()?);
            }
        }
        let [answers, authorities, additionals] = sections;

        Ok(Self {
            header,
            questions,
            answers,
            authorities,
            additionals,
        })
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;
    use crate::class::Class;
    use crate::rr::{Rdata, Ttl, Type};

    #[test]
    fn query_encodes_and_decodes() {
        let question = Question::new("example.com.".parse().unwrap(), Type::A, Class::IN);
        let query = Message::query(0x1234, true, question.clone());
        let octets = query.encode().unwrap();
        assert_eq!(&octets[..4], b"\x12\x34\x01\x00");

        let decoded = Message::decode(&octets).unwrap();
        assert_eq!(decoded.header.id, 0x1234);
        assert!(decoded.header.rd);
        assert!(!decoded.header.qr);
        assert_eq!(decoded.questions, vec![question]);
        assert_eq!(decoded, query);
    }

    #[test]
    fn header_flags_round_trip() {
        let header = Header {
            id: 0xbeef,
            qr: true,
            opcode: Opcode::Notify,
            aa: true,
            tc: true,
            rd: false,
            ra: true,
            rcode: Rcode::Refused,
        };
        assert_eq!(header.flags_word(), 0x8000 | (4 << 11) | 0x0400 | 0x0200 | 0x0080 | 5);
        let message = Message {
            header,
            questions: Vec::new(),
            answers: Vec::new(),
            authorities: Vec::new(),
            additionals: Vec::new(),
        };
        let decoded = Message::decode(&message.encode().unwrap()).unwrap();
        assert_eq!(decoded.header, header);
    }

    #[test]
    fn response_with_all_sections_round_trips() {
        let owner: crate::name::Name = "example.com.".parse().unwrap();
        let ns_name: crate::name::Name = "ns1.example.com.".parse().unwrap();
        let mut response = Message::query(7, false, Question::new(owner.clone(), Type::NS, Class::IN));
        response.header.qr = true;
        response.header.aa = true;
        response.answers.push(Record::new(
            owner.clone(),
            Class::IN,
            Ttl::from(86400),
            Rdata::Ns(ns_name.clone()),
        ));
        response.authorities.push(Record::new(
            owner.clone(),
            Class::IN,
            Ttl::from(3600),
            Rdata::Soa {
                mname: ns_name.clone(),
                rname: "hostmaster.example.com.".parse().unwrap(),
                serial: 1,
                refresh: 2,
                retry: 3,
                expire: 4,
                minimum: 5,
            },
        ));
        response.additionals.push(Record::new(
            ns_name,
            Class::IN,
            Ttl::from(86400),
            Rdata::A(Ipv4Addr::new(192, 0, 2, 53)),
        ));

        let octets = response.encode().unwrap();
        assert_eq!(&octets[4..12], b"\x00\x01\x00\x01\x00\x01\x00\x01");
        assert_eq!(Message::decode(&octets), Ok(response.clone()));
        assert_eq!(Message::decode(&octets).unwrap().encode().unwrap(), octets);
    }

    #[test]
    fn decode_fails_on_truncated_records() {
        let question = Question::new("example.com.".parse().unwrap(), Type::A, Class::IN);
        let mut response = Message::query(1, false, question);
        response.answers.push(Record::new(
            "example.com.".parse().unwrap(),
            Class::IN,
            Ttl::from(300),
            Rdata::A(Ipv4Addr::new(93, 184, 216, 34)),
        ));
        let octets = response.encode().unwrap();
        let truncated = &octets[..octets.len() - 1];
        assert_eq!(
            Message::decode(truncated),
            Err(reader::Error::InvalidRdata(
                Type::A,
                crate::rr::rdata::ReadRdataError::UnexpectedEom
            ))
        );
    }
}
