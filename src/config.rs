//! Fixed settings and the immutable server configuration.

use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::auth::Credential;
use crate::error::{SecureServeError, SecureServeResult};

/// Port of the https listener
pub const DEFAULT_PORT: u16 = 8081;

/// The server listens on all IPv4 interfaces
pub const DEFAULT_BIND_ADDRESS: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

/// The only username accepted by the server
pub const USERNAME: &str = "user";

/// Realm sent along with the Basic authentication challenge
pub const REALM: &str = "Restricted";

/// Word list used for the password generation
pub const DEFAULT_WORD_LIST: &str = "/usr/share/dict/words";

/// Directory below the home directory, which holds certificate and key
pub const CERT_DIR: &str = ".local/share/secureserve";

/// Returns `<home>/.local/share/secureserve`.
pub fn default_cert_dir() -> SecureServeResult<PathBuf> {
    let home = dirs::home_dir().ok_or(SecureServeError::HomeDirUnknown)?;
    Ok(home.join(CERT_DIR))
}

/// Everything a running server needs. Built once and shared read only.
pub struct ServerConfig {
    root: PathBuf,
    bind_address: IpAddr,
    port: u16,
    tls: Arc<rustls::ServerConfig>,
    credential: Credential,
}

impl ServerConfig {
    pub(crate) fn new(
        root: PathBuf,
        bind_address: IpAddr,
        port: u16,
        tls: Arc<rustls::ServerConfig>,
        credential: Credential,
    ) -> Self {
        ServerConfig {
            root,
            bind_address,
            port,
            tls,
            credential,
        }
    }

    /// The served directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Address the listener binds to in [crate::SecureServer::run]
    pub fn bind_address(&self) -> IpAddr {
        self.bind_address
    }

    /// Port the listener binds to in [crate::SecureServer::run]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// TLS configuration with the loaded certificate
    pub fn tls(&self) -> Arc<rustls::ServerConfig> {
        self.tls.clone()
    }

    /// The single accepted credential
    pub fn credential(&self) -> &Credential {
        &self.credential
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("root", &self.root)
            .field("bind_address", &self.bind_address)
            .field("port", &self.port)
            .field("credential", &self.credential)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cert_dir_is_below_home() {
        let dir = default_cert_dir().unwrap();
        assert!(dir.ends_with(".local/share/secureserve"));
        assert_eq!(dir.parent().unwrap().file_name().unwrap(), "share");
    }
}
