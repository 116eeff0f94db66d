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

//! Implements command-line argument parsing.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::anyhow;
use clap::{Args as ClapArgs, Parser, Subcommand};

use delver::name::Name;
use delver::net::DNS_PORT;

/// Parses the command line arguments.
pub fn parse() -> Args {
    Args::parse()
}

/// The Delver iterative DNS resolver
#[derive(Debug, Parser)]
#[clap(author, version)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Look up the records at a domain name
    Lookup(LookupArgs),

    /// List the records of a zone through a zone transfer
    ListZone(ListZoneArgs),
}

#[derive(Debug, Parser)]
pub struct LookupArgs {
    /// The domain name to look up
    #[clap(value_name = "NAME")]
    pub name: Name,

    /// Set the record types to look up
    #[clap(
        short = 't',
        long = "type",
        value_delimiter = ',',
        value_name = "TYPE"
    )]
    pub types: Vec<String>,

    /// Set the classes to look up
    #[clap(
        short = 'c',
        long = "class",
        value_delimiter = ',',
        value_name = "CLASS"
    )]
    pub classes: Vec<String>,

    #[clap(flatten)]
    pub resolver: ResolverArgs,
}

#[derive(Debug, Parser)]
pub struct ListZoneArgs {
    /// The zone to list (a leading `_` label filters the parent zone)
    #[clap(value_name = "ZONE")]
    pub zone: Name,

    #[clap(flatten)]
    pub resolver: ResolverArgs,
}

/// Options shared by all commands.
#[derive(Debug, ClapArgs)]
pub struct ResolverArgs {
    /// Set the configuration file to use
    #[clap(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Add an initial name server
    #[clap(
        short = 's',
        long = "server",
        value_name = "HOST[@IP][:PORT][=ZONE]"
    )]
    pub servers: Vec<ServerSpec>,

    /// Set the timeout of the first round of queries in milliseconds
    #[clap(long, value_name = "MS")]
    pub timeout: Option<u64>,

    /// Set the number of rounds of queries
    #[clap(long, value_name = "N")]
    pub retries: Option<u32>,

    /// Accept only authoritative answers
    #[clap(long)]
    pub authoritative_only: bool,

    /// Send every query over TCP
    #[clap(long)]
    pub tcp: bool,
}

/// An initial name server given on the command line with `--server`.
/// This is parsed with its [`FromStr`] implementation from the form
/// `HOST[@IP][:PORT][=ZONE]`, for instance:
///
/// * `192.0.2.1`
/// * `ns1.example.com@192.0.2.1:5353=example.com.`
/// * `ns1.example.com@[2001:db8::1]:53`
///
/// The zone defaults to the root.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ServerSpec {
    pub host: String,
    pub ip: Option<IpAddr>,
    pub port: u16,
    pub zone: String,
}

impl FromStr for ServerSpec {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (rest, zone) = match s.split_once('=') {
            Some((rest, zone)) if !zone.is_empty() => (rest, zone.to_owned()),
            Some(_) => return Err(anyhow!("the zone after '=' is empty")),
            None => (s, String::from(".")),
        };

        let (host, ip, port) = if let Some((host, address)) = rest.split_once('@') {
            if let Ok(addr) = address.parse::<SocketAddr>() {
                (host, Some(addr.ip()), addr.port())
            } else {
                let ip = address
                    .trim_start_matches('[')
                    .trim_end_matches(']')
                    .parse()
                    .map_err(|e| anyhow!("invalid server address {:?}: {}", address, e))?;
                (host, Some(ip), DNS_PORT)
            }
        } else if rest.parse::<IpAddr>().is_ok() {
            (rest, None, DNS_PORT)
        } else if let Some((host, port)) = rest.rsplit_once(':') {
            let port = port
                .parse()
                .map_err(|e| anyhow!("invalid port {:?}: {}", port, e))?;
            (host.trim_start_matches('[').trim_end_matches(']'), None, port)
        } else {
            (rest, None, DNS_PORT)
        };

        if host.is_empty() {
            return Err(anyhow!("the server host is empty"));
        }
        Ok(Self {
            host: host.to_owned(),
            ip,
            port,
            zone,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_spec_from_str_accepts_all_forms() {
        let spec: ServerSpec = "ns1.example.com@192.0.2.1:5353=example.com."
            .parse()
            .unwrap();
        assert_eq!(
            spec,
            ServerSpec {
                host: "ns1.example.com".into(),
                ip: Some("192.0.2.1".parse().unwrap()),
                port: 5353,
                zone: "example.com.".into(),
            }
        );

        let spec: ServerSpec = "192.0.2.1".parse().unwrap();
        assert_eq!((spec.ip, spec.port, spec.zone.as_str()), (None, 53, "."));

        let spec: ServerSpec = "ns1.example.com@[2001:db8::1]:54".parse().unwrap();
        assert_eq!(spec.ip, Some("2001:db8::1".parse().unwrap()));
        assert_eq!(spec.port, 54);

        let spec: ServerSpec = "ns1.example.com@2001:db8::1".parse().unwrap();
        assert_eq!((spec.ip.is_some(), spec.port), (true, 53));

        let spec: ServerSpec = "localhost:5353".parse().unwrap();
        assert_eq!((spec.host.as_str(), spec.port), ("localhost", 5353));

        let spec: ServerSpec = "[2001:db8::1]:5353".parse().unwrap();
        assert_eq!((spec.host.as_str(), spec.port), ("2001:db8::1", 5353));
    }

    #[test]
    fn server_spec_from_str_rejects_garbage() {
        assert!("=example.".parse::<ServerSpec>().is_err());
        assert!("ns1.example.=".parse::<ServerSpec>().is_err());
        assert!("ns1.example.@not-an-ip".parse::<ServerSpec>().is_err());
        assert!("ns1.example.:http".parse::<ServerSpec>().is_err());
    }
}
