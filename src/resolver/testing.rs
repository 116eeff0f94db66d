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

//! Test support: a [`Transport`] whose servers are played by a closure,
//! and builders for the records and messages they send.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{Resolver, ResolverConfig};
use crate::class::Class;
use crate::message::{Message, Question};
use crate::net::{self, Transport};
use crate::rr::{Rdata, Record, Ttl, Type};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Protocol {
    Udp,
    Tcp,
}

/// One exchange made through a [`ScriptedTransport`].
#[derive(Clone, Debug)]
pub struct Exchange {
    pub protocol: Protocol,
    pub server: SocketAddr,
    pub query: Message,
    pub timeout: Option<Duration>,
}

type Script = dyn Fn(&Exchange) -> Result<Message, net::Error> + Send + Sync;

/// A [`Transport`] that answers every exchange by calling a script,
/// and logs the exchanges made.
pub struct ScriptedTransport {
    script: Box<Script>,
    log: Mutex<Vec<Exchange>>,
}

impl ScriptedTransport {
    pub fn new<F>(script: F) -> Arc<Self>
    where
        F: Fn(&Exchange) -> Result<Message, net::Error> + Send + Sync + 'static,
    {
        Arc::new(Self {
            script: Box::new(script),
            log: Mutex::new(Vec::new()),
        })
    }

    pub fn exchanges(&self) -> Vec<Exchange> {
        self.log.lock().unwrap().clone()
    }

    fn exchange(
        &self,
        protocol: Protocol,
        server: SocketAddr,
        query: &[u8],
        timeout: Option<Duration>,
    ) -> Result<Vec<u8>, net::Error> {
        let exchange = Exchange {
            protocol,
            server,
            query: Message::decode(query).unwrap(),
            timeout,
        };
        self.log.lock().unwrap().push(exchange.clone());
        let response = (self.script)(&exchange)?;
        Ok(response.encode().unwrap())
    }
}

impl Transport for ScriptedTransport {
    fn exchange_udp(
        &self,
        server: SocketAddr,
        query: &[u8],
        timeout: Option<Duration>,
    ) -> Result<Vec<u8>, net::Error> {
        self.exchange(Protocol::Udp, server, query, timeout)
    }

    fn exchange_tcp(
        &self,
        server: SocketAddr,
        query: &[u8],
        timeout: Option<Duration>,
    ) -> Result<Vec<u8>, net::Error> {
        self.exchange(Protocol::Tcp, server, query, timeout)
    }
}

/// Returns a resolver with short timeouts using `transport`.
pub fn test_resolver(transport: Arc<ScriptedTransport>) -> Resolver {
    let config = ResolverConfig {
        initial_timeout_ms: 100,
        timeout_retries: 2,
        max_background_tasks: 2,
        ..Default::default()
    };
    Resolver::new(config, transport)
}

pub fn server_addr(last_octet: u8) -> SocketAddr {
    SocketAddr::new(Ipv4Addr::new(192, 0, 2, last_octet).into(), 53)
}

pub fn a_question(name: &str) -> Question {
    Question::new(name.parse().unwrap(), Type::A, Class::IN)
}

/// Returns an empty NOERROR response with the given ID.
pub fn response_to(question: &Question, id: u16) -> Message {
    let mut response = Message::query(id, true, question.clone());
    response.header.qr = true;
    response
}

/// Returns an empty NOERROR response to `query`.
pub fn reply_to(query: &Message) -> Message {
    response_to(&query.questions[0], query.header.id)
}

pub fn a_record(owner: &str, ttl: u32, address: [u8; 4]) -> Record {
    Record::new(
        owner.parse().unwrap(),
        Class::IN,
        Ttl::from(ttl),
        Rdata::A(address.into()),
    )
}

pub fn cname_record(owner: &str, target: &str) -> Record {
    Record::new(
        owner.parse().unwrap(),
        Class::IN,
        Ttl::from(300),
        Rdata::Cname(target.parse().unwrap()),
    )
}

pub fn ns_record(owner: &str, target: &str) -> Record {
    Record::new(
        owner.parse().unwrap(),
        Class::IN,
        Ttl::from(3600),
        Rdata::Ns(target.parse().unwrap()),
    )
}
