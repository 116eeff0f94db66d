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

//! Implementation of the [`Reader`] type to read on-the-wire DNS
//! messages.

use std::fmt;

use super::constants::*;
use super::{Header, Opcode, Question, Rcode};
use crate::class::Class;
use crate::name::{self, Name};
use crate::rr::rdata::{Rdata, ReadRdataError};
use crate::rr::{Record, Ttl, Type};

////////////////////////////////////////////////////////////////////////
// READER                                                             //
////////////////////////////////////////////////////////////////////////

/// A "frame" around a buffer containing a DNS message that enables
/// reading the message data.
///
/// A `Reader` is constructed using its [`TryFrom`] implementation. Any
/// underlying buffer for a reader must contain at least a full DNS
/// message header of 12 octets; otherwise the construction will fail.
///
/// Since header information is in a fixed position, it can be read
/// at any time through [`Reader::header`] and the count methods. For
/// reading questions and records, the [`Reader::read_question`] and
/// [`Reader::read_record`] methods are provided. These read using a
/// cursor, which is initially set to the first octet after the DNS
/// header. They must be called sequentially to read any questions, and
/// then any records, in the order they appear in the message.
#[derive(Eq, PartialEq)]
pub struct Reader<'a> {
    octets: &'a [u8],
    cursor: usize,
}

impl<'a> Reader<'a> {
    /// Reads the network-byte-order 16-bit header word at `start`. The
    /// constructor guarantees that the whole header is present.
    fn header_word(&self, start: usize) -> u16 {
        u16::from_be_bytes([self.octets[start], self.octets[start + 1]])
    }

    /// Decodes the fixed part of the header.
    pub fn header(&self) -> Header {
        let flags = self.header_word(FLAGS_START);
        Header {
            id: self.header_word(ID_START),
            qr: flags & QR_MASK != 0,
            opcode: Opcode::from_bits(((flags & OPCODE_MASK) >> OPCODE_SHIFT) as u8),
            aa: flags & AA_MASK != 0,
            tc: flags & TC_MASK != 0,
            rd: flags & RD_MASK != 0,
            ra: flags & RA_MASK != 0,
            rcode: Rcode::from_bits((flags & RCODE_MASK) as u8),
        }
    }

    /// Returns the number of questions in the message.
    pub fn qdcount(&self) -> u16 {
        self.header_word(QDCOUNT_START)
    }

    /// Returns the number of answers in the message.
    pub fn ancount(&self) -> u16 {
        self.header_word(ANCOUNT_START)
    }

    /// Returns the number of authority records in the message.
    pub fn nscount(&self) -> u16 {
        self.header_word(NSCOUNT_START)
    }

    /// Returns the number of additional records in the message.
    pub fn arcount(&self) -> u16 {
        self.header_word(ARCOUNT_START)
    }

    /// Reads a [`Question`] starting at the current cursor.
    ///
    /// This method is atomic, in that the cursor is not changed on
    /// failure.
    pub fn read_question(&mut self) -> Result<Question> {
        let (qname, qname_len) = Name::try_from_compressed(self.octets, self.cursor)
            .map_err(|err| Error::InvalidName(Field::Qname, err))?;
        let qname_end = self.cursor + qname_len;
        let qtype = read_u16(self.octets, qname_end, Field::Qtype)?.into();
        let qclass = read_u16(self.octets, qname_end + 2, Field::Qclass)?.into();
        self.cursor = qname_end + 4;
        Ok(Question {
            qname,
            qtype,
            qclass,
        })
    }

    /// Reads a resource record at the current cursor.
    ///
    /// This method is atomic, in that the cursor is not changed on
    /// failure.
    pub fn read_record(&mut self) -> Result<Record> {
        let (owner, owner_len) = Name::try_from_compressed(self.octets, self.cursor)
            .map_err(|err| Error::InvalidName(Field::Owner, err))?;
        let owner_end = self.cursor + owner_len;
        let rr_type = Type::from(read_u16(self.octets, owner_end, Field::Type)?);
        let class = Class::from(read_u16(self.octets, owner_end + 2, Field::Class)?);
        let ttl = Ttl::from(read_u32(self.octets, owner_end + 4, Field::Ttl)?);
        let rdlength = read_u16(self.octets, owner_end + 8, Field::Rdlength)?;
        let rdata_start = owner_end + 10;
        let rdata = Rdata::read(class, rr_type, self.octets, rdata_start, rdlength)
            .map_err(|err| Error::InvalidRdata(rr_type, err))?;
        self.cursor = rdata_start + rdlength as usize;
        Ok(Record::new(owner, class, ttl, rdata))
    }

    /// Returns whether the `Reader`'s cursor has reached the end of the
    /// message.
    pub fn at_eom(&self) -> bool {
        self.cursor >= self.octets.len()
    }
}

impl<'a> TryFrom<&'a [u8]> for Reader<'a> {
    type Error = Error;

    fn try_from(octets: &'a [u8]) -> Result<Self> {
        if octets.len() >= HEADER_SIZE {
            Ok(Self {
                octets,
                cursor: HEADER_SIZE,
            })
        } else {
            Err(Error::HeaderTooShort)
        }
    }
}

impl fmt::Debug for Reader<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Reader")
            .field("header", &self.header())
            .field("qdcount", &self.qdcount())
            .field("ancount", &self.ancount())
            .field("nscount", &self.nscount())
            .field("arcount", &self.arcount())
            .field("cursor", &self.cursor)
            .finish()
    }
}

////////////////////////////////////////////////////////////////////////
// HELPERS FOR READING MULTI-BYTE INTEGERS                            //
////////////////////////////////////////////////////////////////////////

/// Reads a network-byte-order `u16` for `field` at `start`.
fn read_u16(octets: &[u8], start: usize, field: Field) -> Result<u16> {
    match octets.get(start..start + 2) {
        Some(&[a, b]) => Ok(u16::from_be_bytes([a, b])),
        _ => Err(Error::UnexpectedEomIn(field)),
    }
}

/// Reads a network-byte-order `u32` for `field` at `start`.
fn read_u32(octets: &[u8], start: usize, field: Field) -> Result<u32> {
    match octets.get(start..start + 4) {
        Some(&[a, b, c, d]) => Ok(u32::from_be_bytes([a, b, c, d])),
        _ => Err(Error::UnexpectedEomIn(field)),
    }
}

////////////////////////////////////////////////////////////////////////
// ERRORS                                                             //
////////////////////////////////////////////////////////////////////////

/// The field of a question or record in which a read failed.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Field {
    Qname,
    Qtype,
    Qclass,
    Owner,
    Type,
    Class,
    Ttl,
    Rdlength,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Self::Qname => "QNAME",
            Self::Qtype => "QTYPE",
            Self::Qclass => "QCLASS",
            Self::Owner => "owner",
            Self::Type => "TYPE",
            Self::Class => "CLASS",
            Self::Ttl => "TTL",
            Self::Rdlength => "RDLENGTH",
        })
    }
}

/// An error signaling that a message, question, or resource record
/// could not be read.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Error {
    HeaderTooShort,
    UnexpectedEomIn(Field),
    InvalidName(Field, name::Error),
    InvalidRdata(Type, ReadRdataError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::HeaderTooShort => f.write_str("header too short"),
            Self::UnexpectedEomIn(field) => write!(f, "unexpected end of message in {field}"),
            Self::InvalidName(field, err) => write!(f, "invalid {field}: {err}"),
            Self::InvalidRdata(rr_type, err) => write!(f, "invalid {rr_type} RDATA: {err}"),
        }
    }
}

impl std::error::Error for Error {}

/// The type returned by fallible [`Reader`] methods.
pub type Result<T> = std::result::Result<T, Error>;

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
