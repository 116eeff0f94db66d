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

//! Serialization of RDATA.

use super::{CharacterString, Rdata};

impl Rdata {
    /// Appends the on-the-wire form of the RDATA to `buf`. Embedded
    /// names are never compressed. The caller is responsible for the
    /// RDLENGTH field and for checking that the result fits in it.
    pub fn serialize(&self, buf: &mut Vec<u8>) {
        match self {
            Self::A(address) => buf.extend_from_slice(&address.octets()),
            Self::Ns(name) | Self::Cname(name) | Self::Ptr(name) => {
                buf.extend_from_slice(name.wire_repr())
            }
            Self::Soa {
                mname,
                rname,
                serial,
                refresh,
                retry,
                expire,
                minimum,
            } => {
                buf.extend_from_slice(mname.wire_repr());
                buf.extend_from_slice(rname.wire_repr());
                for field in [serial, refresh, retry, expire, minimum] {
                    buf.extend_from_slice(&field.to_be_bytes());
                }
            }
            Self::Mx {
                preference,
                exchange,
            } => {
                buf.extend_from_slice(&preference.to_be_bytes());
                buf.extend_from_slice(exchange.wire_repr());
            }
            Self::Hinfo { cpu, os } => {
                serialize_character_string(cpu, buf);
                serialize_character_string(os, buf);
            }
            Self::Txt(strings) => {
                for string in strings {
                    serialize_character_string(string, buf);
                }
            }
            Self::Srv {
                priority,
                weight,
                port,
                target,
            } => {
                for field in [priority, weight, port] {
                    buf.extend_from_slice(&field.to_be_bytes());
                }
                buf.extend_from_slice(target.wire_repr());
            }
            Self::Unknown { octets, .. } => buf.extend_from_slice(octets),
        }
    }
}

fn serialize_character_string(string: &CharacterString, buf: &mut Vec<u8>) {
    buf.push(string.len() as u8);
    buf.extend_from_slice(string);
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;
    use crate::class::Class;
    use crate::rr::Type;

    /// Serializes `rdata` and reads it back.
    fn reread(rdata: &Rdata) -> Rdata {
        let mut buf = Vec::new();
        rdata.serialize(&mut buf);
        Rdata::read(Class::IN, rdata.rr_type(), &buf, 0, buf.len() as u16).unwrap()
    }

    #[test]
    fn serialize_works_for_srv() {
        let srv = Rdata::Srv {
            priority: 1,
            weight: 2,
            port: 389,
            target: "ldap.example.com.".parse().unwrap(),
        };
        let mut buf = Vec::new();
        srv.serialize(&mut buf);
        assert_eq!(buf, b"\x00\x01\x00\x02\x01\x85\x04ldap\x07example\x03com\x00");
        assert_eq!(reread(&srv), srv);
    }

    #[test]
    fn serialized_rdata_reads_back() {
        let rdatas = [
            Rdata::A(Ipv4Addr::new(93, 184, 216, 34)),
            Rdata::Ns("ns1.example.com.".parse().unwrap()),
            Rdata::Cname("example.com.".parse().unwrap()),
            Rdata::Ptr("host.example.com.".parse().unwrap()),
            Rdata::Soa {
                mname: "ns1.example.com.".parse().unwrap(),
                rname: "hostmaster.example.com.".parse().unwrap(),
                serial: 2022010101,
                refresh: 7200,
                retry: 3600,
                expire: 1209600,
                minimum: 300,
            },
            Rdata::Mx {
                preference: 10,
                exchange: "mail.example.com.".parse().unwrap(),
            },
            Rdata::Hinfo {
                cpu: "PDP-11".try_into().unwrap(),
                os: "UNIX".try_into().unwrap(),
            },
            Rdata::Txt(vec!["a".try_into().unwrap(), "b c".try_into().unwrap()]),
            Rdata::Unknown {
                rr_type: Type::from(0xff00),
                octets: Box::default(),
            },
        ];
        for rdata in rdatas.iter() {
            assert_eq!(&reread(rdata), rdata);
        }
    }

    #[test]
    fn wire_rdata_serializes_back_to_the_same_octets() {
        let cases: [(Type, &[u8]); 4] = [
            (Type::NS, b"\x03ns1\x07example\x03com\x00"),
            (Type::PTR, b"\x04host\x07example\x03com\x00"),
            (Type::MX, b"\x00\x0a\x04mail\x07example\x03com\x00"),
            (
                Type::SOA,
                b"\x03ns1\x07example\x03com\x00\x0ahostmaster\xc0\x04\
                  \x78\x85\x6c\xf5\x00\x00\x1c\x20\x00\x00\x0e\x10\
                  \x00\x12\x75\x00\x00\x00\x01\x2c",
            ),
        ];
        for (rr_type, octets) in cases.iter().take(3) {
            let rdata = Rdata::read(Class::IN, *rr_type, octets, 0, octets.len() as u16).unwrap();
            assert_eq!(rdata.rr_type(), *rr_type);
            let mut buf = Vec::new();
            rdata.serialize(&mut buf);
            assert_eq!(&buf, octets);
        }

        // The SOA RNAME is compressed on the wire, so it comes back
        // longer by the octets the pointer stood for.
        let (rr_type, octets) = cases[3];
        let rdata = Rdata::read(Class::IN, rr_type, octets, 0, octets.len() as u16).unwrap();
        let mut buf = Vec::new();
        rdata.serialize(&mut buf);
        assert_eq!(
            buf,
            b"\x03ns1\x07example\x03com\x00\x0ahostmaster\x07example\x03com\x00\
              \x78\x85\x6c\xf5\x00\x00\x1c\x20\x00\x00\x0e\x10\
              \x00\x12\x75\x00\x00\x00\x01\x2c"
        );
        let reread = Rdata::read(Class::IN, rr_type, &buf, 0, buf.len() as u16).unwrap();
        assert_eq!(reread, rdata);
        let mut again = Vec::new();
        reread.serialize(&mut again);
        assert_eq!(again, buf);
    }
}
