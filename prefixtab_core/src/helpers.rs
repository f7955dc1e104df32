//! Helper functions for prefix table operations

use crate::constants::MAX_PREFIX_LEN;
use crate::errors::Error;
use std::net::Ipv4Addr;

#[inline]
pub fn mask(prefix_len: u8) -> u32 {
    if prefix_len == 0 {
        0
    } else if prefix_len >= 32 {
        !0u32
    } else {
        !(!0u32 >> prefix_len)
    }
}

// Canonicalise a base: zero host bits beyond `plen`.
#[inline(always)]
pub fn canonical(base: u32, plen: u8) -> u32 {
    base & mask(plen)
}

/// True when the top `plen` bits of `addr` and `base` agree.
#[inline(always)]
pub fn covers(base: u32, plen: u8, addr: u32) -> bool {
    (base ^ addr) & mask(plen) == 0
}

pub fn validate_len(plen: i64) -> Result<u8, Error> {
    match u8::try_from(plen) {
        Ok(p) if p <= MAX_PREFIX_LEN => Ok(p),
        _ => Err(Error::InvalidMask),
    }
}

pub fn validate_base(base: i64) -> Result<u32, Error> {
    u32::try_from(base).map_err(|_| Error::InvalidBase)
}

/// `"a.b.c.d"` → `(a<<24)|(b<<16)|(c<<8)|d`.
pub fn ipv4_to_u32(s: &str) -> Result<u32, Error> {
    s.trim()
        .parse::<Ipv4Addr>()
        .map(u32::from)
        .map_err(|_| Error::InvalidBase)
}

#[inline]
pub fn u32_to_ipv4(addr: u32) -> Ipv4Addr {
    Ipv4Addr::from(addr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_edges() {
        assert_eq!(mask(0), 0);
        assert_eq!(mask(1), 0x8000_0000);
        assert_eq!(mask(16), 0xFFFF_0000);
        assert_eq!(mask(32), 0xFFFF_FFFF);
    }

    #[test]
    fn canonical_drops_host_bits() {
        assert_eq!(canonical(0x0A14_0105, 16), 0x0A14_0000);
        assert_eq!(canonical(0x0A14_0105, 32), 0x0A14_0105);
        assert_eq!(canonical(0xFFFF_FFFF, 0), 0);
    }

    #[test]
    fn covers_respects_length() {
        assert!(covers(0x0A14_0000, 16, 0x0A14_FFFF));
        assert!(!covers(0x0A14_0000, 16, 0x0A15_0000));
        assert!(covers(0x0A14_0000, 0, 0xDEAD_BEEF));
        assert!(covers(0x0A14_0001, 32, 0x0A14_0001));
        assert!(!covers(0x0A14_0001, 32, 0x0A14_0002));
    }

    #[test]
    fn dotted_quad_conversion() {
        assert_eq!(ipv4_to_u32("10.20.0.0").unwrap(), 0x0A14_0000);
        assert_eq!(ipv4_to_u32("255.255.255.255").unwrap(), u32::MAX);
        assert_eq!(ipv4_to_u32("10.20.300.0"), Err(Error::InvalidBase));
        assert_eq!(u32_to_ipv4(0x0A14_0105).to_string(), "10.20.1.5");
    }

    #[test]
    fn raw_validation() {
        assert_eq!(validate_len(0), Ok(0));
        assert_eq!(validate_len(32), Ok(32));
        assert_eq!(validate_len(33), Err(Error::InvalidMask));
        assert_eq!(validate_len(-1), Err(Error::InvalidMask));
        assert_eq!(validate_base(0), Ok(0));
        assert_eq!(validate_base(u32::MAX as i64), Ok(u32::MAX));
        assert_eq!(validate_base(-1), Err(Error::InvalidBase));
        assert_eq!(validate_base(1 << 32), Err(Error::InvalidBase));
    }
}
