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

//! Implements the `lookup` and `list-zone` commands.

use std::fmt::Write;
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use env_logger::Env;
use log::{error, info};

use delver::net::StdTransport;
use delver::resolver::{self, Resolver, ResolverConfig};
use delver::rr::Record;

use crate::args::{Command, ListZoneArgs, LookupArgs};
use crate::config::{self, Config};

/// Runs a command, exiting the process with failure if it fails.
pub fn run(command: Command) {
    env_logger::init_from_env(Env::new().default_filter_or("warn"));

    let result = match command {
        Command::Lookup(args) => run_lookup(args),
        Command::ListZone(args) => run_list_zone(args),
    };
    if let Err(e) = result {
        let mut message = String::from("Failed:");
        for (i, cause) in e.chain().enumerate() {
            write!(message, "\n[{}] {}", i + 1, cause).unwrap();
        }
        error!("{}", message);
        process::exit(1);
    }
}

fn run_lookup(args: LookupArgs) -> Result<()> {
    let config = config::load(&args.resolver).context("failed to load the configuration")?;
    let mut types = resolver::parse_types(&args.types)?;
    if types.is_empty() {
        types = config.lookup.types.iter().map(|t| t.0).collect();
    }
    let mut classes = resolver::parse_classes(&args.classes)?;
    if classes.is_empty() {
        classes = config.lookup.classes.iter().map(|c| c.0).collect();
    }

    let resolver = make_resolver(&config)?;
    let records = resolver
        .lookup(&args.name, &types, &classes)
        .with_context(|| format!("failed to look up {}", args.name))?;
    print_records(&records);
    Ok(())
}

fn run_list_zone(args: ListZoneArgs) -> Result<()> {
    let config = config::load(&args.resolver).context("failed to load the configuration")?;
    let resolver = make_resolver(&config)?;
    let records = resolver
        .list_zone(&args.zone)
        .with_context(|| format!("failed to list {}", args.zone))?;
    print_records(&records);
    Ok(())
}

/// Creates a resolver and registers the configured initial servers, or
/// the root servers if there are none.
fn make_resolver(config: &Config) -> Result<Resolver> {
    let resolver = Resolver::new(
        ResolverConfig::from(&config.resolver),
        Arc::new(StdTransport::new()),
    );
    if config.servers.is_empty() {
        info!("No servers configured; starting from the root servers.");
        resolver.add_root_hints();
    }
    for server in &config.servers {
        resolver
            .add_initial_server(&server.host, server.ip, server.port, &server.zone)
            .with_context(|| format!("failed to add server {}", server.host))?;
    }
    Ok(resolver)
}

fn print_records(records: &[Record]) {
    for record in records {
        println!("{}", record);
    }
}
