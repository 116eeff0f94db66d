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

//! Decoding of RDATA from DNS messages.

use std::net::Ipv4Addr;

use super::{CharacterString, Rdata, ReadRdataError};
use crate::class::Class;
use crate::name::Name;
use crate::rr::Type;

type Result<T> = std::result::Result<T, ReadRdataError>;

impl Rdata {
    /// Reads RDATA of type `rr_type` in class `class` and of length
    /// `rdlength`, starting from `&message[cursor]`.
    ///
    /// The whole message must be passed, since embedded domain names
    /// of the RFC 1035 types may be compressed and pointers refer to
    /// offsets in the message. Per [RFC 3597 § 4], SRV targets are
    /// decompressed as well for compatibility with older software.
    ///
    /// If the remaining part of the message is shorter than
    /// `rdlength`, this fails with [`ReadRdataError::UnexpectedEom`]
    /// rather than panicking, so it's okay to call this without
    /// validating `rdlength` first. If the fields of a known type do
    /// not fill exactly `rdlength` octets, this fails with
    /// [`ReadRdataError::LengthMismatch`].
    ///
    /// [RFC 3597 § 4]: https://datatracker.ietf.org/doc/html/rfc3597#section-4
    pub fn read(
        class: Class,
        rr_type: Type,
        message: &[u8],
        cursor: usize,
        rdlength: u16,
    ) -> Result<Self> {
        let end = cursor + rdlength as usize;
        if end > message.len() {
            return Err(ReadRdataError::UnexpectedEom);
        }

        // Everything after the RDATA is cut off, so that a field can
        // never be read from beyond RDLENGTH. Pointers still reach the
        // earlier parts of the message.
        let mut fields = Fields {
            message: &message[..end],
            cursor,
        };
        let rdata = match rr_type {
            Type::A if class == Class::IN => {
                let octets = fields.octets(4)?;
                Self::A(Ipv4Addr::new(octets[0], octets[1], octets[2], octets[3]))
            }
            Type::NS => Self::Ns(fields.name()?),
            Type::CNAME => Self::Cname(fields.name()?),
            Type::PTR => Self::Ptr(fields.name()?),
            Type::SOA => Self::Soa {
                mname: fields.name()?,
                rname: fields.name()?,
                serial: fields.u32()?,
                refresh: fields.u32()?,
                retry: fields.u32()?,
                expire: fields.u32()?,
                minimum: fields.u32()?,
            },
            Type::MX => Self::Mx {
                preference: fields.u16()?,
                exchange: fields.name()?,
            },
            Type::HINFO => Self::Hinfo {
                cpu: fields.character_string()?,
                os: fields.character_string()?,
            },
            Type::TXT => {
                // TXT RDATA holds one or more <character-string>s.
                let mut strings = vec![fields.character_string()?];
                while !fields.at_end() {
                    strings.push(fields.character_string()?);
                }
                Self::Txt(strings)
            }
            Type::SRV if class == Class::IN => Self::Srv {
                priority: fields.u16()?,
                weight: fields.u16()?,
                port: fields.u16()?,
                target: fields.name()?,
            },
            _ => Self::Unknown {
                rr_type,
                octets: fields.octets(rdlength as usize)?.into(),
            },
        };

        if fields.at_end() {
            Ok(rdata)
        } else {
            Err(ReadRdataError::LengthMismatch)
        }
    }
}

/// A cursor over the fields of RDATA within a message that has been
/// cut off at the end of the RDATA.
struct Fields<'a> {
    message: &'a [u8],
    cursor: usize,
}

impl<'a> Fields<'a> {
    fn at_end(&self) -> bool {
        self.cursor >= self.message.len()
    }

    fn octets(&mut self, len: usize) -> Result<&'a [u8]> {
        let octets = self
            .message
            .get(self.cursor..self.cursor + len)
            .ok_or(ReadRdataError::LengthMismatch)?;
        self.cursor += len;
        Ok(octets)
    }

    fn u16(&mut self) -> Result<u16> {
        let octets = self.octets(2)?;
        Ok(u16::from_be_bytes([octets[0], octets[1]]))
    }

    fn u32(&mut self) -> Result<u32> {
        let octets = self.octets(4)?;
        Ok(u32::from_be_bytes([octets[0], octets[1], octets[2], octets[3]]))
    }

    fn name(&mut self) -> Result<Name> {
        let (name, len) = Name::try_from_compressed(self.message, self.cursor)?;
        self.cursor += len;
        Ok(name)
    }

    fn character_string(&mut self) -> Result<CharacterString> {
        let len = self.octets(1)?[0] as usize;
        Ok(CharacterString {
            octets: self.octets(len)?.into(),
        })
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
