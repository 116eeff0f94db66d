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

//! Implementation of the [`Question`] type and associated
//! [`Qtype`] and [`Qclass`] types.

use std::fmt;
use std::str::FromStr;

use crate::class::Class;
use crate::name::Name;
use crate::rr::Type;
use crate::util::Caseless;

////////////////////////////////////////////////////////////////////////
// QUESTIONS                                                          //
////////////////////////////////////////////////////////////////////////

/// A DNS question.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Question {
    pub qname: Name,
    pub qtype: Qtype,
    pub qclass: Qclass,
}

impl Question {
    pub fn new(qname: Name, qtype: impl Into<Qtype>, qclass: impl Into<Qclass>) -> Self {
        Self {
            qname,
            qtype: qtype.into(),
            qclass: qclass.into(),
        }
    }

    /// Returns whether neither the QTYPE nor the QCLASS is a wildcard.
    /// Only such questions can be answered from the cache.
    pub fn is_concrete(&self) -> bool {
        self.qtype != Qtype::ANY && self.qclass != Qclass::ANY
    }

    /// Returns a copy of this question asking about another name.
    pub fn with_qname(&self, qname: Name) -> Self {
        Self {
            qname,
            ..self.clone()
        }
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {} {}", self.qname, self.qclass, self.qtype)
    }
}

////////////////////////////////////////////////////////////////////////
// QTYPE                                                              //
////////////////////////////////////////////////////////////////////////

/// The QTYPE of a [`Question`]: either an RR type or one of the
/// question-only values such as [`Qtype::AXFR`] and [`Qtype::ANY`].
#[derive(Copy, Clone, Eq, Hash, PartialEq)]
pub struct Qtype(u16);

impl Qtype {
    // RFC 1995
    pub const IXFR: Self = Self(251);

    // RFC 1035
    pub const AXFR: Self = Self(252);
    pub const MAILB: Self = Self(253);
    pub const MAILA: Self = Self(254);
    pub const ANY: Self = Self(255);

    /// Returns whether a record of type `rr_type` answers this QTYPE.
    pub fn matches(self, rr_type: Type) -> bool {
        self == Self::ANY || self == Self::from(rr_type)
    }
}

impl From<u16> for Qtype {
    fn from(raw: u16) -> Self {
        Self(raw)
    }
}

impl From<Qtype> for u16 {
    fn from(qtype: Qtype) -> Self {
        qtype.0
    }
}

impl From<Type> for Qtype {
    fn from(rr_type: Type) -> Self {
        Self(rr_type.into())
    }
}

impl fmt::Display for Qtype {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::IXFR => f.write_str("IXFR"),
            Self::AXFR => f.write_str("AXFR"),
            Self::MAILB => f.write_str("MAILB"),
            Self::MAILA => f.write_str("MAILA"),
            Self::ANY => f.write_str("ANY"),
            _ => fmt::Display::fmt(&Type::from(*self), f),
        }
    }
}

impl fmt::Debug for Qtype {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl FromStr for Qtype {
    type Err = &'static str;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        const QUESTION_ONLY: [(Qtype, &str); 6] = [
            (Qtype::IXFR, "IXFR"),
            (Qtype::AXFR, "AXFR"),
            (Qtype::MAILB, "MAILB"),
            (Qtype::MAILA, "MAILA"),
            (Qtype::ANY, "ANY"),
            (Qtype::ANY, "*"),
        ];
        match QUESTION_ONLY
            .iter()
            .find(|(_, mnemonic)| Caseless(mnemonic) == Caseless(text))
        {
            Some((qtype, _)) => Ok(*qtype),
            None => Type::from_str(text).map(Into::into),
        }
    }
}

////////////////////////////////////////////////////////////////////////
// QCLASS                                                             //
////////////////////////////////////////////////////////////////////////

/// The QCLASS of a [`Question`]: either a class or the wildcard
/// [`Qclass::ANY`].
#[derive(Copy, Clone, Eq, Hash, PartialEq)]
pub struct Qclass(u16);

impl Qclass {
    // RFC 1035
    pub const ANY: Self = Self(255);

    /// Returns whether a record of class `class` answers this QCLASS.
    pub fn matches(self, class: Class) -> bool {
        self == Self::ANY || self == Self::from(class)
    }
}

impl From<u16> for Qclass {
    fn from(raw: u16) -> Self {
        Self(raw)
    }
}

impl From<Qclass> for u16 {
    fn from(qclass: Qclass) -> Self {
        qclass.0
    }
}

impl From<Class> for Qclass {
    fn from(class: Class) -> Self {
        Self(class.into())
    }
}

impl fmt::Display for Qclass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::ANY => f.write_str("ANY"),
            _ => fmt::Display::fmt(&Class::from(*self), f),
        }
    }
}

impl fmt::Debug for Qclass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl FromStr for Qclass {
    type Err = &'static str;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        if Caseless(text) == Caseless("ANY") || text == "*" {
            Ok(Self::ANY)
        } else {
            Class::from_str(text).map(Into::into)
        }
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcards_match_everything() {
        assert!(Qtype::ANY.matches(Type::MX));
        assert!(Qtype::from(Type::MX).matches(Type::MX));
        assert!(!Qtype::from(Type::MX).matches(Type::A));
        assert!(Qclass::ANY.matches(Class::CH));
        assert!(!Qclass::from(Class::IN).matches(Class::CH));
    }

    #[test]
    fn qtype_and_qclass_parse() {
        assert_eq!("axfr".parse::<Qtype>(), Ok(Qtype::AXFR));
        assert_eq!("*".parse::<Qtype>(), Ok(Qtype::ANY));
        assert_eq!("SRV".parse::<Qtype>(), Ok(Qtype::from(Type::SRV)));
        assert_eq!("ANY".parse::<Qclass>(), Ok(Qclass::ANY));
        assert_eq!("IN".parse::<Qclass>(), Ok(Qclass::from(Class::IN)));
        assert!("NOPE".parse::<Qclass>().is_err());
    }

    #[test]
    fn concrete_questions_have_no_wildcards() {
        let qname: Name = "example.com.".parse().unwrap();
        assert!(Question::new(qname.clone(), Type::A, Class::IN).is_concrete());
        assert!(!Question::new(qname.clone(), Qtype::ANY, Class::IN).is_concrete());
        assert!(!Question::new(qname, Type::A, Qclass::ANY).is_concrete());
    }
}
