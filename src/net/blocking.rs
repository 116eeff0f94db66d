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

//! Implementation of the blocking [`Transport`].

use std::io::{self, Read, Write};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, TcpStream, UdpSocket};
use std::time::{Duration, Instant};

use log::trace;

use super::{Error, Transport};

/// A [`Transport`] built on the standard library's blocking sockets.
#[derive(Clone, Copy, Debug, Default)]
pub struct StdTransport;

impl StdTransport {
    pub fn new() -> Self {
        Self
    }
}

impl Transport for StdTransport {
    fn exchange_udp(
        &self,
        server: SocketAddr,
        query: &[u8],
        timeout: Option<Duration>,
    ) -> Result<Vec<u8>, Error> {
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        let local: SocketAddr = if server.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };

        // A connected socket only receives datagrams from the server,
        // so anything sent to our port by another host is dropped.
        let socket = UdpSocket::bind(local)?;
        socket.connect(server)?;
        retry_if_interrupted(|| socket.send(query))?;
        trace!("sent {} octets over UDP to {}", query.len(), server);

        let mut buf = vec![0; u16::MAX as usize];
        loop {
            socket.set_read_timeout(remaining(deadline)?)?;
            match socket.recv(&mut buf) {
                Ok(len) => {
                    buf.truncate(len);
                    return Ok(buf);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn exchange_tcp(
        &self,
        server: SocketAddr,
        query: &[u8],
        timeout: Option<Duration>,
    ) -> Result<Vec<u8>, Error> {
        let query_len = u16::try_from(query.len()).or(Err(Error::Protocol("query too long")))?;
        let deadline = timeout.map(|timeout| Instant::now() + timeout);

        let mut stream = match remaining(deadline)? {
            Some(timeout) => TcpStream::connect_timeout(&server, timeout)?,
            None => TcpStream::connect(server)?,
        };
        stream.set_write_timeout(remaining(deadline)?)?;
        let mut framed = Vec::with_capacity(query.len() + 2);
        framed.extend_from_slice(&query_len.to_be_bytes());
        framed.extend_from_slice(query);
        stream.write_all(&framed)?;
        trace!("sent {} octets over TCP to {}", query.len(), server);

        let mut len_buf = [0; 2];
        read_framed(&mut stream, &mut len_buf, deadline)?;
        let mut response = vec![0; u16::from_be_bytes(len_buf) as usize];
        read_framed(&mut stream, &mut response, deadline)?;
        Ok(response)
    }
}

/// Fills `buf` from `stream`, treating an early end of stream as a
/// framing error.
fn read_framed(
    stream: &mut TcpStream,
    buf: &mut [u8],
    deadline: Option<Instant>,
) -> Result<(), Error> {
    stream.set_read_timeout(remaining(deadline)?)?;
    match stream.read_exact(buf) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(Error::Protocol(
            "connection closed before the full response arrived",
        )),
        Err(e) => Err(e.into()),
    }
}

/// Computes the time left until `deadline` in the form expected by the
/// socket timeout setters: [`None`] for no deadline. A deadline that
/// has already passed is a timeout.
fn remaining(deadline: Option<Instant>) -> Result<Option<Duration>, Error> {
    match deadline {
        None => Ok(None),
        Some(deadline) => match deadline.checked_duration_since(Instant::now()) {
            Some(left) if !left.is_zero() => Ok(Some(left)),
            _ => Err(Error::TimedOut),
        },
    }
}

/// Executes `f`, retrying the operation if it is interrupted.
fn retry_if_interrupted<F, R>(mut f: F) -> io::Result<R>
where
    F: FnMut() -> io::Result<R>,
{
    loop {
        match f() {
            Ok(r) => return Ok(r),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
