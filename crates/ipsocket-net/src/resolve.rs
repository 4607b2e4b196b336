//! IPv4 address resolution for `open(address, port)`.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, ToSocketAddrs};

use crate::error::{NetworkError, Result};

/// Resolve a dotted IPv4 literal or host name to an IPv4 endpoint.
///
/// Literals are parsed without touching the resolver. Host names use the
/// system resolver and the first IPv4 result wins; a name with only IPv6
/// addresses is an error.
pub fn resolve_ipv4(address: &str, port: u16) -> Result<SocketAddr> {
    let address = address.trim();
    if let Ok(ip) = address.parse::<Ipv4Addr>() {
        return Ok(SocketAddr::V4(SocketAddrV4::new(ip, port)));
    }

    (address, port)
        .to_socket_addrs()
        .map_err(|_| NetworkError::AddressResolution(address.to_string()))?
        .find(SocketAddr::is_ipv4)
        .ok_or_else(|| NetworkError::AddressResolution(address.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal() {
        let addr = resolve_ipv4("192.168.1.10", 5000).unwrap();
        assert_eq!(addr, "192.168.1.10:5000".parse().unwrap());
    }

    #[test]
    fn test_localhost() {
        let addr = resolve_ipv4("localhost", 80).unwrap();
        assert!(addr.is_ipv4());
        assert_eq!(addr.port(), 80);
    }

    #[test]
    fn test_ipv6_literal_rejected() {
        assert!(matches!(
            resolve_ipv4("::1", 80),
            Err(NetworkError::AddressResolution(_))
        ));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(
            resolve_ipv4("not a host name", 80),
            Err(NetworkError::AddressResolution(_))
        ));
    }
}
