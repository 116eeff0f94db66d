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

//! Delver is an iterative DNS resolver.
//!
//! Starting from a set of initial (usually root) servers, a
//! [`Resolver`](resolver::Resolver) walks the delegation hierarchy
//! down to the servers that are authoritative for a name, caching what
//! it learns along the way in a [`ResolverCache`](cache::ResolverCache)
//! and ranking the servers it talks to by response time in a
//! [`ServerList`](slist::ServerList). The building blocks are usable on
//! their own:
//!
//! * [`name`], [`rr`], [`class`], and [`message`] implement the DNS
//!   data model and the RFC 1035 wire format;
//! * [`net`] exchanges single messages with servers over UDP and TCP;
//! * [`slist`] and [`cache`] hold the resolver's shared state; and
//! * [`thread`] provides the bounded worker pool used for background
//!   address resolution.

pub mod cache;
pub mod class;
pub mod message;
pub mod name;
pub mod net;
pub mod resolver;
pub mod rr;
pub mod slist;
pub mod thread;
mod util;
