// Copyright 2021 Matthew Ingwersen.
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

//! Implementation of the [`Class`] type for DNS classes.

use std::fmt;
use std::str::FromStr;

use crate::message::Qclass;
use crate::util::{parse_generic_mnemonic, Caseless};

/// Represents a class in the DNS.
///
/// A class is a 16-bit value on the wire. The only class a resolver
/// meets in practice is [`IN`](Class::IN); the others are kept so that
/// their records display with their mnemonics.
#[derive(Clone, Copy, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct Class(u16);

impl Class {
    pub const IN: Self = Self(1);
    pub const CH: Self = Self(3);
    pub const HS: Self = Self(4);
}

/// Mnemonics of the classes we know by name.
const MNEMONICS: [(Class, &str); 3] = [(Class::IN, "IN"), (Class::CH, "CH"), (Class::HS, "HS")];

impl Class {
    fn mnemonic(self) -> Option<&'static str> {
        MNEMONICS
            .iter()
            .find(|(class, _)| *class == self)
            .map(|(_, mnemonic)| *mnemonic)
    }
}

impl From<u16> for Class {
    fn from(value: u16) -> Self {
        Class(value)
    }
}

impl From<Class> for u16 {
    fn from(class: Class) -> Self {
        class.0
    }
}

impl From<Qclass> for Class {
    fn from(qclass: Qclass) -> Self {
        Self(qclass.into())
    }
}

impl FromStr for Class {
    type Err = &'static str;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        if let Some((class, _)) = MNEMONICS
            .iter()
            .find(|(_, mnemonic)| Caseless(mnemonic) == Caseless(text))
        {
            return Ok(*class);
        }
        match parse_generic_mnemonic(text, "CLASS") {
            Some(Ok(value)) => Ok(Self(value)),
            Some(Err(_)) => Err("class value is not a valid unsigned 16-bit integer"),
            None => Err("unknown class"),
        }
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.mnemonic() {
            Some(mnemonic) => f.write_str(mnemonic),
            None => write!(f, "CLASS{}", self.0), // RFC 3597 § 5
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Class;

    #[test]
    fn displays_according_to_rfc3597() {
        // CLASS65280 is from the private use range, so it should always
        // be unknown.
        assert_eq!(Class::from(0xff00).to_string(), "CLASS65280");
        assert_eq!(Class::IN.to_string(), "IN");
    }

    #[test]
    fn parses_mnemonics_and_rfc3597_forms() {
        assert_eq!("in".parse::<Class>(), Ok(Class::IN));
        assert_eq!("CLASS1".parse::<Class>(), Ok(Class::IN));
        assert_eq!("CLASS65280".parse::<Class>().map(u16::from), Ok(65280));
        assert!("CLASS65536".parse::<Class>().is_err());
        assert!("CHAOS".parse::<Class>().is_err());
    }
}
