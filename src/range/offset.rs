//! Address arithmetic in a single 128-bit space
//!
//! IPv4 addresses are widened to their IPv4-mapped IPv6 form so both
//! families share one numeric space. Values inside the mapped block are
//! rendered back as IPv4.

use crate::error::{Error, Result};
use ipnet::IpNet;
use std::net::{IpAddr, Ipv6Addr};

/// Position of `addr` in the 128-bit address space
pub fn to_integer(addr: IpAddr) -> u128 {
    match addr {
        IpAddr::V4(v4) => u128::from(v4.to_ipv6_mapped()),
        IpAddr::V6(v6) => u128::from(v6),
    }
}

/// Address at position `value` in the 128-bit address space
pub fn from_integer(value: u128) -> IpAddr {
    let v6 = Ipv6Addr::from(value);
    match v6.to_ipv4_mapped() {
        Some(v4) => IpAddr::V4(v4),
        None => IpAddr::V6(v6),
    }
}

/// Address `offset` positions after `base`
///
/// There is no modular reduction: pushing an IPv4-derived base past the
/// end of the mapped block yields an IPv6 address. `None` only when the
/// sum leaves the address space entirely.
pub fn from_offset(base: u128, offset: usize) -> Option<IpAddr> {
    base.checked_add(offset as u128).map(from_integer)
}

/// Distance from `base` to `addr`, or `None` if `addr` lies below `base`
pub fn offset_of(base: u128, addr: IpAddr) -> Option<u128> {
    to_integer(addr).checked_sub(base)
}

/// Whether `addr` lies between the network and broadcast addresses of `net`, inclusive
pub fn contains(net: &IpNet, addr: IpAddr) -> bool {
    let value = to_integer(addr);
    to_integer(net.network()) <= value && value <= to_integer(net.broadcast())
}

/// Address `index` positions after the network address of `subnet`
///
/// Fails with `SubnetTooSmall` when the result falls outside `subnet`.
pub fn indexed_ip(subnet: &IpNet, index: usize) -> Result<IpAddr> {
    from_offset(to_integer(subnet.network()), index)
        .filter(|ip| contains(subnet, *ip))
        .ok_or_else(|| Error::SubnetTooSmall {
            index,
            subnet: subnet.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_v4_widening() {
        assert_eq!(to_integer(ip("0.0.0.1")), 0xffff_0000_0001);
        assert_eq!(to_integer(ip("10.0.0.1")), to_integer(ip("::ffff:10.0.0.1")));
        assert_eq!(from_integer(to_integer(ip("192.168.1.9"))), ip("192.168.1.9"));
    }

    #[test]
    fn test_v6_round_trip() {
        let addr = ip("2001:db8::42");
        assert_eq!(from_integer(to_integer(addr)), addr);
    }

    #[test]
    fn test_from_offset() {
        let base = to_integer(ip("10.0.0.1"));
        assert_eq!(from_offset(base, 0), Some(ip("10.0.0.1")));
        assert_eq!(from_offset(base, 254), Some(ip("10.0.0.255")));
        assert_eq!(from_offset(base, 255), Some(ip("10.0.1.0")));
    }

    #[test]
    fn test_from_offset_past_v4_space() {
        let base = to_integer(IpAddr::V4(Ipv4Addr::BROADCAST));
        // One past 255.255.255.255 leaves the mapped block
        assert_eq!(from_offset(base, 1), Some(ip("::1:0:0:0")));
        assert!(from_offset(u128::MAX, 1).is_none());
        assert_eq!(from_offset(u128::MAX, 0), Some(ip("ffff:ffff:ffff:ffff:ffff:ffff:ffff:ffff")));
    }

    #[test]
    fn test_offset_of() {
        let base = to_integer(ip("10.0.0.1"));
        assert_eq!(offset_of(base, ip("10.0.0.1")), Some(0));
        assert_eq!(offset_of(base, ip("10.0.0.200")), Some(199));
        assert_eq!(offset_of(base, ip("10.0.0.0")), None);
    }

    #[test]
    fn test_contains() {
        let net: IpNet = "10.0.0.0/24".parse().unwrap();
        assert!(contains(&net, ip("10.0.0.0")));
        assert!(contains(&net, ip("10.0.0.255")));
        assert!(contains(&net, ip("::ffff:10.0.0.7")));
        assert!(!contains(&net, ip("10.0.1.0")));
        assert!(!contains(&net, ip("2001:db8::1")));
    }

    #[test]
    fn test_indexed_ip() {
        let net: IpNet = "192.168.1.0/24".parse().unwrap();
        assert_eq!(indexed_ip(&net, 1).unwrap(), ip("192.168.1.1"));
        assert_eq!(indexed_ip(&net, 255).unwrap(), ip("192.168.1.255"));
        assert!(matches!(
            indexed_ip(&net, 256),
            Err(Error::SubnetTooSmall { index: 256, .. })
        ));

        let net: IpNet = "2001:db8::/64".parse().unwrap();
        assert_eq!(indexed_ip(&net, 1).unwrap(), ip("2001:db8::1"));
        assert_eq!(indexed_ip(&net, 0xffff).unwrap(), ip("2001:db8::ffff"));
    }

    #[test]
    fn test_indexed_ip_error_message() {
        let net: IpNet = "10.0.0.0/30".parse().unwrap();
        let err = indexed_ip(&net, 4).unwrap_err();
        assert!(err.to_string().contains("subnet too small"));
        assert!(err.to_string().contains("10.0.0.0/30"));
    }
}
