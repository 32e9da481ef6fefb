//! Range size policy

use ipnet::IpNet;

/// Host bits above which an IPv6 range is capped
const IPV6_MAX_HOST_BITS: u8 = 16;

/// Number of raw host offsets tracked for `subnet`
///
/// The caller still excludes the network and broadcast addresses.
pub fn range_size(subnet: &IpNet) -> u64 {
    size_for_prefix(subnet.prefix_len(), subnet.max_prefix_len())
}

/// Raw host offsets for a `prefix_len` network in a `bits`-wide family
///
/// Networks with one host bit or fewer have no room for a host once the
/// network and broadcast addresses are excluded. IPv6 ranges are capped
/// at 65536 since the allocation bitmap holds one bit per offset.
pub fn size_for_prefix(prefix_len: u8, bits: u8) -> u64 {
    let host_bits = bits.saturating_sub(prefix_len);
    if host_bits <= 1 {
        return 0;
    }

    if bits == 128 && host_bits >= IPV6_MAX_HOST_BITS {
        1 << IPV6_MAX_HOST_BITS
    } else {
        1 << host_bits
    }
}
