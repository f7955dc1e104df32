//! Data structures for the prefix table

use crate::constants::{DEFAULT_CAPACITY, MAX_PREFIX_LEN};
use crate::errors::Error;
use crate::helpers::{canonical, covers, u32_to_ipv4};
use crossbeam_epoch::Atomic;
use ipnet::Ipv4Net;
use std::cmp::Reverse;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::sync::Mutex;

/// One IPv4 CIDR block, always in canonical form (host bits zeroed).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Prefix {
    base: u32,
    len: u8,
}

impl Prefix {
    /// Build a prefix, masking `base` down to its top `len` bits.
    pub fn new(base: u32, len: u8) -> Result<Self, Error> {
        if len > MAX_PREFIX_LEN {
            return Err(Error::InvalidMask);
        }
        Ok(Self {
            base: canonical(base, len),
            len,
        })
    }

    #[inline]
    pub fn base(&self) -> u32 {
        self.base
    }

    #[inline]
    pub fn prefix_len(&self) -> u8 {
        self.len
    }

    #[inline]
    pub fn contains(&self, addr: u32) -> bool {
        covers(self.base, self.len, addr)
    }

    /// Order used by the table: most specific first, then by base.
    #[inline]
    pub(crate) fn sort_key(&self) -> (Reverse<u8>, u32) {
        (Reverse(self.len), self.base)
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", u32_to_ipv4(self.base), self.len)
    }
}

impl FromStr for Prefix {
    type Err = Error;

    /// Accepts `"a.b.c.d/len"` or a bare address (taken as `/32`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(net) = s.parse::<Ipv4Net>() {
            Ok(Prefix::from(net))
        } else if let Ok(ip) = s.parse::<Ipv4Addr>() {
            Prefix::new(u32::from(ip), MAX_PREFIX_LEN)
        } else {
            Err(Error::InvalidPrefix)
        }
    }
}

impl From<Ipv4Net> for Prefix {
    fn from(net: Ipv4Net) -> Self {
        let net = net.trunc();
        Self {
            base: u32::from(net.network()),
            len: net.prefix_len(),
        }
    }
}

impl From<Prefix> for Ipv4Net {
    fn from(p: Prefix) -> Self {
        // len <= 32 holds for every constructed prefix
        Ipv4Net::new(u32_to_ipv4(p.base), p.len).unwrap_or_default()
    }
}

/// Construction-time settings for a [`PrefixTable`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TableConfig {
    /// Maximum number of stored prefixes, `1..=64`.
    pub capacity: usize,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
        }
    }
}

/// Immutable entry set published to readers.
pub(crate) type Snapshot = Vec<Prefix>;

/// PrefixTable struct (core handle)
///
/// Readers pin an epoch and scan the current snapshot without locking.
/// Writers serialise on `writer`, build a new snapshot and swap it in;
/// the old one is reclaimed once no reader can still observe it.
pub struct PrefixTable {
    pub(crate) snapshot: Atomic<Snapshot>,
    pub(crate) writer: Mutex<()>,
    pub(crate) capacity: usize,
}
