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

//! Implements the configuration file.

use std::fmt::{self, Write};
use std::fs;
use std::net::IpAddr;
use std::path::Path;

use anyhow::{Context, Result};
use log::Level::Debug;
use log::{debug, log_enabled};
use paste::paste;
use serde::{de, Deserialize};

use delver::message::{Qclass, Qtype};
use delver::name::Name;
use delver::net::DNS_PORT;
use delver::resolver::ResolverConfig;

use crate::args::ResolverArgs;

////////////////////////////////////////////////////////////////////////
// CONFIGURATION LOADING                                              //
////////////////////////////////////////////////////////////////////////

/// Loads the configuration from the file given by `path`.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config> {
    let raw_config = fs::read(path.as_ref()).context("failed to read the configuration file")?;
    let config: Config =
        toml::from_slice(&raw_config).context("failed to parse the configuration file")?;
    Ok(config)
}

/// Loads the configuration named by `--config`, if any, and applies
/// the other command line options over it.
pub fn load(args: &ResolverArgs) -> Result<Config> {
    let mut config = match args.config {
        Some(ref path) => load_from_path(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => Config::default(),
    };

    if let Some(timeout) = args.timeout {
        config.resolver.initial_timeout_ms = timeout;
    }
    if let Some(retries) = args.retries {
        config.resolver.timeout_retries = retries;
    }
    config.resolver.authoritative_only |= args.authoritative_only;
    config.resolver.force_tcp |= args.tcp;
    config.servers.extend(args.servers.iter().map(|spec| ServerConfig {
        host: spec.host.clone(),
        ip: spec.ip,
        port: spec.port,
        zone: spec.zone.clone(),
    }));

    log_config_summary(&config);
    Ok(config)
}

/// Summarizes the configuration in the log, if the debug log level is
/// enabled.
fn log_config_summary(config: &Config) {
    if !log_enabled!(Debug) {
        return;
    }

    let resolver = &config.resolver;
    let mut message = format!(
        "Configuration loaded:\n\
         Timeout:            {} ms, {} rounds\n\
         Authoritative only: {}\n\
         Force TCP:          {}\n\
         Servers:            ",
        resolver.initial_timeout_ms,
        resolver.timeout_retries,
        resolver.authoritative_only,
        resolver.force_tcp,
    );
    if config.servers.is_empty() {
        message.push_str("root hints");
    } else {
        write!(message, "{}", config.servers.len()).unwrap();
        for server in &config.servers {
            write!(message, "\n  {} for {}", server.host, server.zone).unwrap();
        }
    }
    debug!("{}", message);
}

////////////////////////////////////////////////////////////////////////
// CONFIGURATION FILE STRUCTURE                                       //
////////////////////////////////////////////////////////////////////////

/// The complete configuration file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub resolver: ResolverSection,
    #[serde(default)]
    pub lookup: LookupSection,
    #[serde(default)]
    pub servers: Vec<ServerConfig>,
}

////////////////////////////////////////////////////////////////////////
// CONFIGURATION SECTION: RESOLVER                                    //
////////////////////////////////////////////////////////////////////////

/// Resolver configuration. This mirrors [`ResolverConfig`] and can be
/// converted into one; its purpose is to make the configuration
/// deserializable and to provide defaults.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResolverSection {
    #[serde(default = "default_initial_timeout_ms")]
    pub initial_timeout_ms: u64,
    #[serde(default = "default_timeout_retries")]
    pub timeout_retries: u32,
    #[serde(default)]
    pub authoritative_only: bool,
    #[serde(default = "default_recursion_desired")]
    pub recursion_desired: bool,
    #[serde(default = "default_max_background_tasks")]
    pub max_background_tasks: usize,
    #[serde(default)]
    pub force_tcp: bool,
}

fn default_initial_timeout_ms() -> u64 {
    ResolverConfig::default().initial_timeout_ms
}

fn default_timeout_retries() -> u32 {
    ResolverConfig::default().timeout_retries
}

fn default_recursion_desired() -> bool {
    ResolverConfig::default().recursion_desired
}

fn default_max_background_tasks() -> usize {
    ResolverConfig::default().max_background_tasks
}

impl Default for ResolverSection {
    fn default() -> Self {
        Self {
            initial_timeout_ms: default_initial_timeout_ms(),
            timeout_retries: default_timeout_retries(),
            authoritative_only: false,
            recursion_desired: default_recursion_desired(),
            max_background_tasks: default_max_background_tasks(),
            force_tcp: false,
        }
    }
}

impl From<&ResolverSection> for ResolverConfig {
    fn from(section: &ResolverSection) -> Self {
        Self {
            initial_timeout_ms: section.initial_timeout_ms,
            timeout_retries: section.timeout_retries,
            authoritative_only: section.authoritative_only,
            recursion_desired: section.recursion_desired,
            max_background_tasks: section.max_background_tasks,
            force_tcp: section.force_tcp,
        }
    }
}

////////////////////////////////////////////////////////////////////////
// CONFIGURATION SECTION: LOOKUP DEFAULTS                             //
////////////////////////////////////////////////////////////////////////

/// The types and classes looked up when none are given on the command
/// line.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LookupSection {
    #[serde(default)]
    pub types: Vec<ConfigQtype>,
    #[serde(default)]
    pub classes: Vec<ConfigQclass>,
}

////////////////////////////////////////////////////////////////////////
// CONFIGURATION SECTION: SERVERS                                     //
////////////////////////////////////////////////////////////////////////

/// An initial name server.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub ip: Option<IpAddr>,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_zone", deserialize_with = "deserialize_zone")]
    pub zone: String,
}

fn default_port() -> u16 {
    DNS_PORT
}

fn default_zone() -> String {
    String::from(".")
}

/// Checks that a server's zone is a valid name when the file is read.
fn deserialize_zone<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: de::Deserializer<'de>,
{
    ConfigName::deserialize(deserializer).map(|name| name.0.to_string())
}

////////////////////////////////////////////////////////////////////////
// WRAPPERS OVER DELVER TYPES FOR SERDE                               //
////////////////////////////////////////////////////////////////////////

/// Generates a deserializable `ConfigX` structure wrapping an `X` type
/// from [`delver`], using its [`FromStr`](std::str::FromStr)
/// implementation.
macro_rules! make_serde_wrapper {
    ($wrapper:ident, $over:ty, $description:literal) => {
        /// A macro-generated deserializable wrapper over a [`delver`]
        /// type.
        #[derive(Clone, Debug)]
        pub struct $wrapper(pub $over);

        impl<'de> Deserialize<'de> for $wrapper {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: de::Deserializer<'de>,
            {
                deserializer.deserialize_str(paste! { [<$wrapper Visitor>] })
            }
        }

        paste! {
            /// A macro-generated [`Visitor`](de::Visitor).
            #[derive(Debug)]
            struct [<$wrapper Visitor>];
        }

        impl<'de> de::Visitor<'de> for paste! { [<$wrapper Visitor>] } {
            type Value = $wrapper;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str($description)
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                value
                    .parse()
                    .map($wrapper)
                    .map_err(|e| E::custom(format!("invalid {}: {}", $description, e)))
            }
        }
    };
}

make_serde_wrapper!(ConfigName, Name, "domain name");
make_serde_wrapper!(ConfigQtype, Qtype, "record type");
make_serde_wrapper!(ConfigQclass, Qclass, "DNS class");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_config_parses() {
        let config: Config = toml::from_str(
            r#"
            [resolver]
            initial_timeout_ms = 250
            force_tcp = true

            [lookup]
            types = ["A", "AAAA"]
            classes = ["IN"]

            [[servers]]
            host = "ns1.example.com"
            ip = "192.0.2.1"
            zone = "example.com."

            [[servers]]
            host = "192.0.2.2"
            port = 5353
            "#,
        )
        .unwrap();

        let resolver = ResolverConfig::from(&config.resolver);
        assert_eq!(resolver.initial_timeout_ms, 250);
        assert!(resolver.force_tcp);
        assert_eq!(resolver.timeout_retries, ResolverConfig::default().timeout_retries);
        assert_eq!(config.lookup.types.len(), 2);
        assert_eq!(config.servers.len(), 2);
        assert_eq!(config.servers[0].port, 53);
        assert_eq!(config.servers[0].zone, "example.com.");
        assert_eq!(config.servers[1].zone, ".");
        assert_eq!(config.servers[1].port, 5353);
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(ResolverConfig::from(&config.resolver), ResolverConfig::default());
        assert!(config.servers.is_empty());
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(toml::from_str::<Config>("[lookup]\ntypes = [\"BOGUS\"]").is_err());
        assert!(toml::from_str::<Config>("[[servers]]\nhost = \"a\"\nzone = \"a..b\"").is_err());
        assert!(toml::from_str::<Config>("[resolver]\nunknown = 1").is_err());
    }
}
