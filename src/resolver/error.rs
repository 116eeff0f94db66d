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

//! Resolver error types.

use std::fmt;

use crate::message::{reader, writer};
use crate::name::{self, Name};

/// The ways in which a resolver operation can fail.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Error {
    /// An authoritative server reported that the name does not exist.
    NotFound(Name),

    /// No server could provide an answer.
    Unavailable(String),

    /// A message could not be built, or a response was malformed.
    Protocol(ProtocolError),

    /// The request or the resolver's setup is invalid. These errors are
    /// reported before any network activity.
    Configuration(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::NotFound(name) => write!(f, "{name} does not exist"),
            Self::Unavailable(reason) => write!(f, "service unavailable: {reason}"),
            Self::Protocol(err) => write!(f, "protocol error: {err}"),
            Self::Configuration(reason) => write!(f, "configuration error: {reason}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Protocol(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ProtocolError> for Error {
    fn from(err: ProtocolError) -> Self {
        Self::Protocol(err)
    }
}

impl From<reader::Error> for Error {
    fn from(err: reader::Error) -> Self {
        Self::Protocol(ProtocolError::Decode(err))
    }
}

impl From<writer::Error> for Error {
    fn from(err: writer::Error) -> Self {
        Self::Protocol(ProtocolError::Encode(err))
    }
}

/// A violation of the DNS protocol.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProtocolError {
    /// A received message could not be decoded.
    Decode(reader::Error),

    /// A message could not be encoded.
    Encode(writer::Error),

    /// A response's ID does not match the query's.
    IdMismatch { expected: u16, received: u16 },

    /// A domain name is invalid.
    InvalidName(name::Error),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Decode(err) => write!(f, "malformed message: {err}"),
            Self::Encode(err) => write!(f, "could not encode message: {err}"),
            Self::IdMismatch { expected, received } => {
                write!(f, "response ID {received} does not match query ID {expected}")
            }
            Self::InvalidName(err) => write!(f, "invalid name: {err}"),
        }
    }
}

impl std::error::Error for ProtocolError {}
