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

//! Exchanging single DNS messages with servers.
//!
//! The [`Transport`] trait is the resolver's only access to the
//! network: one request out, one response in, bounded by a timeout.
//! It performs no retries of its own and touches no resolver state.
//! [`StdTransport`] implements it with blocking standard-library
//! sockets.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

mod blocking;
pub use blocking::StdTransport;

/// The default DNS port.
pub const DNS_PORT: u16 = 53;

/// Exchanges a single DNS message with a server.
///
/// A `timeout` of [`None`] waits indefinitely. Implementations open a
/// fresh socket for each exchange and release it before returning,
/// whatever the outcome.
pub trait Transport: Send + Sync {
    /// Sends `query` in one UDP datagram and returns the payload of
    /// the first datagram received back from `server`.
    fn exchange_udp(
        &self,
        server: SocketAddr,
        query: &[u8],
        timeout: Option<Duration>,
    ) -> Result<Vec<u8>, Error>;

    /// Sends `query` over a new TCP connection, framed by a two-octet
    /// length prefix, and returns the single framed response.
    fn exchange_tcp(
        &self,
        server: SocketAddr,
        query: &[u8],
        timeout: Option<Duration>,
    ) -> Result<Vec<u8>, Error>;
}

////////////////////////////////////////////////////////////////////////
// ERRORS                                                             //
////////////////////////////////////////////////////////////////////////

/// An error from a [`Transport`] exchange. A timeout is kept distinct
/// from other I/O failures, since the resolver ranks servers that time
/// out differently from servers that are unreachable.
#[derive(Debug)]
pub enum Error {
    /// No response arrived before the timeout expired.
    TimedOut,

    /// An I/O error occurred.
    Io(io::Error),

    /// The exchange violated the framing rules (e.g. a TCP connection
    /// closed before the announced number of octets arrived).
    Protocol(&'static str),
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => Self::TimedOut,
            _ => Self::Io(err),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::TimedOut => f.write_str("timed out"),
            Self::Io(err) => write!(f, "I/O error: {err}"),
            Self::Protocol(description) => write!(f, "protocol error: {description}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}
