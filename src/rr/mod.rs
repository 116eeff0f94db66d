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

//! Data structures and routines for handling DNS resource records.

use std::fmt;

use crate::class::Class;
use crate::name::Name;

pub mod rdata;
mod rr_type;
mod ttl;
pub use rdata::{CharacterString, Rdata};
pub use rr_type::Type;
pub use ttl::Ttl;

////////////////////////////////////////////////////////////////////////
// RECORDS                                                            //
////////////////////////////////////////////////////////////////////////

/// A single resource record.
///
/// Records are immutable values. The RR type is carried by the
/// [`Rdata`], so a record can never disagree with its own data. The
/// one transformation the resolver needs, lowering the TTL of an RRset
/// to its minimum, is done with [`Record::with_ttl`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Record {
    owner: Name,
    class: Class,
    ttl: Ttl,
    rdata: Rdata,
}

impl Record {
    /// Creates a new record.
    pub fn new(owner: Name, class: Class, ttl: Ttl, rdata: Rdata) -> Self {
        Self {
            owner,
            class,
            ttl,
            rdata,
        }
    }

    pub fn owner(&self) -> &Name {
        &self.owner
    }

    pub fn rr_type(&self) -> Type {
        self.rdata.rr_type()
    }

    pub fn class(&self) -> Class {
        self.class
    }

    pub fn ttl(&self) -> Ttl {
        self.ttl
    }

    pub fn rdata(&self) -> &Rdata {
        &self.rdata
    }

    /// Returns a copy of this record with a different TTL.
    pub fn with_ttl(&self, ttl: Ttl) -> Self {
        Self {
            ttl,
            ..self.clone()
        }
    }

    /// Returns whether this record and `other` belong to the same RRset,
    /// i.e. have the same owner, class, and type.
    pub fn same_rrset_as(&self, other: &Record) -> bool {
        self.owner == other.owner
            && self.class == other.class
            && self.rr_type() == other.rr_type()
    }

    /// Returns whether this record and `other` are the same record,
    /// ignoring the TTL.
    pub fn same_data_as(&self, other: &Record) -> bool {
        self.same_rrset_as(other) && self.rdata == other.rdata
    }
}

/// Displays the record in zone-file presentation format.
impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {}",
            self.owner,
            self.ttl,
            self.class,
            self.rr_type(),
            self.rdata
        )
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;

    fn a_record(ttl: u32, address: [u8; 4]) -> Record {
        Record::new(
            "Example.COM.".parse().unwrap(),
            Class::IN,
            Ttl::from(ttl),
            Rdata::A(Ipv4Addr::from(address)),
        )
    }

    #[test]
    fn record_displays_in_presentation_format() {
        assert_eq!(
            a_record(300, [93, 184, 216, 34]).to_string(),
            "Example.COM. 300 IN A 93.184.216.34"
        );
    }

    #[test]
    fn with_ttl_only_changes_ttl() {
        let record = a_record(300, [192, 0, 2, 1]);
        let lowered = record.with_ttl(Ttl::from(100));
        assert_eq!(lowered.ttl(), Ttl::from(100));
        assert!(lowered.same_data_as(&record));
        assert_ne!(lowered, record);
    }

    #[test]
    fn rrset_membership_ignores_rdata_and_ttl() {
        let first = a_record(300, [192, 0, 2, 1]);
        let second = a_record(100, [192, 0, 2, 2]);
        assert!(first.same_rrset_as(&second));
        assert!(!first.same_data_as(&second));
    }
}
