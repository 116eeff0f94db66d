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

//! Implementation of the [`Rdata`] type and DNS RDATA processing.

use std::fmt::{self, Write};
use std::net::Ipv4Addr;
use std::ops::Deref;

use super::Type;
use crate::name::{self, Name};
use crate::util::write_hex;

mod read;
mod write;

////////////////////////////////////////////////////////////////////////
// RDATA TYPE                                                         //
////////////////////////////////////////////////////////////////////////

/// The decoded resource data of a record.
///
/// The RDATA of the types that a resolver has to understand (those of
/// [RFC 1035] plus SRV) is decoded into structured variants. Names
/// embedded in RDATA are decompressed when a message is read, so an
/// `Rdata` never depends on the message it came from. Any other type,
/// including AAAA, is carried as opaque octets in
/// [`Rdata::Unknown`].
///
/// Equality follows [RFC 3597 § 6]: embedded domain names of the types
/// that predate it are compared case-insensitively (this falls out of
/// [`Name`]'s own equality), while unknown RDATA is compared bitwise.
///
/// [RFC 1035]: https://datatracker.ietf.org/doc/html/rfc1035
/// [RFC 3597 § 6]: https://datatracker.ietf.org/doc/html/rfc3597#section-6
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Rdata {
    A(Ipv4Addr),
    Ns(Name),
    Cname(Name),
    Ptr(Name),
    Soa {
        mname: Name,
        rname: Name,
        serial: u32,
        refresh: u32,
        retry: u32,
        expire: u32,
        minimum: u32,
    },
    Mx {
        preference: u16,
        exchange: Name,
    },
    Hinfo {
        cpu: CharacterString,
        os: CharacterString,
    },
    Txt(Vec<CharacterString>),
    Srv {
        priority: u16,
        weight: u16,
        port: u16,
        target: Name,
    },
    Unknown {
        rr_type: Type,
        octets: Box<[u8]>,
    },
}

impl Rdata {
    /// Returns the RR type of this RDATA.
    pub fn rr_type(&self) -> Type {
        match self {
            Self::A(_) => Type::A,
            Self::Ns(_) => Type::NS,
            Self::Cname(_) => Type::CNAME,
            Self::Ptr(_) => Type::PTR,
            Self::Soa { .. } => Type::SOA,
            Self::Mx { .. } => Type::MX,
            Self::Hinfo { .. } => Type::HINFO,
            Self::Txt(_) => Type::TXT,
            Self::Srv { .. } => Type::SRV,
            Self::Unknown { rr_type, .. } => *rr_type,
        }
    }

    /// Returns the name that NS, CNAME, and PTR RDATA points to.
    pub fn target_name(&self) -> Option<&Name> {
        match self {
            Self::Ns(name) | Self::Cname(name) | Self::Ptr(name) => Some(name),
            _ => None,
        }
    }

    /// Returns the address of A RDATA.
    pub fn ipv4_addr(&self) -> Option<Ipv4Addr> {
        match self {
            Self::A(address) => Some(*address),
            _ => None,
        }
    }
}

impl fmt::Display for Rdata {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::A(address) => fmt::Display::fmt(address, f),
            Self::Ns(name) | Self::Cname(name) | Self::Ptr(name) => fmt::Display::fmt(name, f),
            Self::Soa {
                mname,
                rname,
                serial,
                refresh,
                retry,
                expire,
                minimum,
            } => write!(
                f,
                "{mname} {rname} {serial} {refresh} {retry} {expire} {minimum}"
            ),
            Self::Mx {
                preference,
                exchange,
            } => write!(f, "{preference} {exchange}"),
            Self::Hinfo { cpu, os } => write!(f, "{cpu} {os}"),
            Self::Txt(strings) => {
                let mut first = true;
                for string in strings {
                    if !first {
                        f.write_char(' ')?;
                    }
                    fmt::Display::fmt(string, f)?;
                    first = false;
                }
                Ok(())
            }
            Self::Srv {
                priority,
                weight,
                port,
                target,
            } => write!(f, "{priority} {weight} {port} {target}"),
            Self::Unknown { octets, .. } => {
                // RFC 3597 § 5 generic RDATA format.
                write!(f, "\\# {}", octets.len())?;
                if !octets.is_empty() {
                    f.write_char(' ')?;
                    write_hex(octets, f)?;
                }
                Ok(())
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////
// CHARACTER STRINGS                                                  //
////////////////////////////////////////////////////////////////////////

/// A type for [RFC 1035 § 3.3] `<character-string>`s, which are at
/// most 255 octets long since they are prefixed by a single length
/// octet on the wire.
///
/// [RFC 1035 § 3.3]: https://datatracker.ietf.org/doc/html/rfc1035#section-3.3
#[derive(Clone, Eq, Hash, PartialEq)]
pub struct CharacterString {
    octets: Box<[u8]>,
}

impl CharacterString {
    pub const MAX_LEN: usize = 255;

    /// Returns the octets of the string.
    pub fn octets(&self) -> &[u8] {
        &self.octets
    }
}

impl TryFrom<&[u8]> for CharacterString {
    type Error = CharacterStringTooLongError;

    fn try_from(octets: &[u8]) -> Result<Self, Self::Error> {
        if octets.len() > Self::MAX_LEN {
            Err(CharacterStringTooLongError)
        } else {
            Ok(Self {
                octets: octets.into(),
            })
        }
    }
}

impl TryFrom<&str> for CharacterString {
    type Error = CharacterStringTooLongError;

    fn try_from(text: &str) -> Result<Self, Self::Error> {
        text.as_bytes().try_into()
    }
}

impl Deref for CharacterString {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.octets
    }
}

/// Displays the string in quotes, escaping as in RFC 1035 § 5.1.
impl fmt::Display for CharacterString {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_char('"')?;
        for octet in self.octets.iter() {
            match *octet {
                b'"' => f.write_str("\\\"")?,
                b'\\' => f.write_str("\\\\")?,
                b' ' => f.write_char(' ')?,
                o if o.is_ascii_graphic() => f.write_char(o as char)?,
                o => write!(f, "\\{o:03}")?,
            }
        }
        f.write_char('"')
    }
}

impl fmt::Debug for CharacterString {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

////////////////////////////////////////////////////////////////////////
// ERRORS                                                             //
////////////////////////////////////////////////////////////////////////

/// An error signaling that a string is too long to be a
/// [`CharacterString`].
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct CharacterStringTooLongError;

impl fmt::Display for CharacterStringTooLongError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("<character-string> is longer than 255 octets")
    }
}

impl std::error::Error for CharacterStringTooLongError {}

/// An error signaling that RDATA could not be read from a message.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ReadRdataError {
    /// An embedded domain name was invalid.
    InvalidName(name::Error),

    /// The message ended before RDLENGTH octets of RDATA.
    UnexpectedEom,

    /// The RDATA fields did not fill exactly RDLENGTH octets.
    LengthMismatch,
}

impl fmt::Display for ReadRdataError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::InvalidName(err) => write!(f, "invalid embedded domain name: {err}"),
            Self::UnexpectedEom => f.write_str("unexpected end of message in RDATA"),
            Self::LengthMismatch => f.write_str("RDATA is inconsistent with RDLENGTH"),
        }
    }
}

impl std::error::Error for ReadRdataError {}

impl From<name::Error> for ReadRdataError {
    fn from(err: name::Error) -> Self {
        Self::InvalidName(err)
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    fn name(text: &str) -> Name {
        text.parse().unwrap()
    }

    #[test]
    fn character_string_rejects_long_strings() {
        assert!(CharacterString::try_from(&[0; 255][..]).is_ok());
        assert_eq!(
            CharacterString::try_from(&[0; 256][..]),
            Err(CharacterStringTooLongError)
        );
    }

    #[test]
    fn rdata_displays_in_presentation_format() {
        let soa = Rdata::Soa {
            mname: name("ns.example.com."),
            rname: name("hostmaster.example.com."),
            serial: 2022010701,
            refresh: 7200,
            retry: 3600,
            expire: 1209600,
            minimum: 3600,
        };
        assert_eq!(
            soa.to_string(),
            "ns.example.com. hostmaster.example.com. 2022010701 7200 3600 1209600 3600"
        );

        let mx = Rdata::Mx {
            preference: 10,
            exchange: name("mail.example.com."),
        };
        assert_eq!(mx.to_string(), "10 mail.example.com.");

        let txt = Rdata::Txt(vec![
            "v=spf1 -all".try_into().unwrap(),
            "say \"hi\"".try_into().unwrap(),
        ]);
        assert_eq!(txt.to_string(), "\"v=spf1 -all\" \"say \\\"hi\\\"\"");

        let unknown = Rdata::Unknown {
            rr_type: Type::AAAA,
            octets: b"\x20\x01\x0d\xb8".as_slice().into(),
        };
        assert_eq!(unknown.to_string(), "\\# 4 20010db8");
        assert_eq!(unknown.rr_type(), Type::AAAA);
    }

    #[test]
    fn rdata_compares_names_case_insensitively() {
        assert_eq!(
            Rdata::Ns(name("NS1.example.com.")),
            Rdata::Ns(name("ns1.EXAMPLE.com."))
        );
        assert_ne!(
            Rdata::Ns(name("ns1.example.com.")),
            Rdata::Cname(name("ns1.example.com."))
        );
    }
}
