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

//! Provides the [`Ttl`] structure for DNS RR TTLs.

use std::fmt;
use std::time::Duration;

/// The time to live (TTL) of a DNS record.
///
/// [RFC 2181 § 8] settled the contradictory definitions in [RFC 1035]
/// (see [erratum 2130]): TTLs are unsigned integers between 0 and
/// 2³¹ - 1, and a wire value with the most significant bit set is
/// interpreted as zero. `Ttl::from(u32)` applies that rule, so every
/// `Ttl` in existence is in range. A zero TTL means the record must not
/// be cached.
///
/// [Erratum 2130]: https://www.rfc-editor.org/errata/eid2130
/// [RFC 1035]: https://datatracker.ietf.org/doc/html/rfc1035
/// [RFC 2181 § 8]: https://datatracker.ietf.org/doc/html/rfc2181#section-8
#[derive(Clone, Copy, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct Ttl(u32);

impl Ttl {
    pub const ZERO: Ttl = Ttl(0);

    /// Returns whether this is a zero TTL.
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Returns the TTL as a [`Duration`].
    pub fn as_duration(self) -> Duration {
        Duration::from_secs(self.0.into())
    }

    /// Converts the remaining lifetime of a cached record back into a
    /// TTL, rounding up so that a record with any time left is not
    /// reported as uncacheable.
    pub fn from_remaining(remaining: Duration) -> Self {
        let mut secs = remaining.as_secs();
        if remaining.subsec_nanos() > 0 {
            secs += 1;
        }
        Self::from(u32::try_from(secs).unwrap_or(u32::MAX))
    }
}

impl From<u32> for Ttl {
    fn from(raw: u32) -> Self {
        if raw > i32::MAX as u32 {
            Self(0)
        } else {
            Self(raw)
        }
    }
}

impl From<Ttl> for u32 {
    fn from(ttl: Ttl) -> Self {
        ttl.0
    }
}

impl fmt::Debug for Ttl {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for Ttl {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_ttls_are_not_modified() {
        let i32_max = i32::MAX as u32;
        assert_eq!(u32::from(Ttl::from(0)), 0);
        assert_eq!(u32::from(Ttl::from(23)), 23);
        assert_eq!(u32::from(Ttl::from(i32_max)), i32_max);
    }

    #[test]
    fn large_ttls_become_zero() {
        assert!(Ttl::from(i32::MAX as u32 + 1).is_zero());
        assert!(Ttl::from(u32::MAX).is_zero());
    }

    #[test]
    fn from_remaining_rounds_up() {
        assert_eq!(Ttl::from_remaining(Duration::from_millis(1)), Ttl::from(1));
        assert_eq!(Ttl::from_remaining(Duration::from_secs(300)), Ttl::from(300));
        assert_eq!(Ttl::from_remaining(Duration::ZERO), Ttl::ZERO);
    }
}
