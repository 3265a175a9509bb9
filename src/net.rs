//! Discovery of the addresses the server is reachable on.

use std::net::{Ipv4Addr, SocketAddrV4};

use nix::ifaddrs::getifaddrs;

use crate::auth::Credential;
use crate::error::SecureServeResult;

/// All non loopback IPv4 addresses of the host's network interfaces.
pub fn lan_ipv4_addresses() -> SecureServeResult<Vec<Ipv4Addr>> {
    let mut addresses = Vec::new();
    for interface in getifaddrs()? {
        let ip = match interface.address.as_ref().and_then(|a| a.as_sockaddr_in()) {
            Some(sin) => *SocketAddrV4::from(*sin).ip(),
            None => continue,
        };
        if !ip.is_loopback() && !addresses.contains(&ip) {
            addresses.push(ip);
        }
    }
    Ok(addresses)
}

/// The line printed for the operator for every address the server is reachable on.
pub fn connection_line(address: Ipv4Addr, port: u16, credential: &Credential) -> String {
    format!(
        "https://{}:{} (Username: {}, Password: {})",
        address,
        port,
        credential.username(),
        credential.password()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_loopback_addresses() {
        let addresses = lan_ipv4_addresses().unwrap();
        assert!(addresses.iter().all(|ip| !ip.is_loopback()));
    }

    #[test]
    fn line_format() {
        let cred = Credential::new("user", "applebananacherry");
        assert_eq!(
            connection_line(Ipv4Addr::new(192, 168, 1, 20), 8081, &cred),
            "https://192.168.1.20:8081 (Username: user, Password: applebananacherry)"
        );
    }
}
