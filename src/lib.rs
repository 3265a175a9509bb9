//!
//! Shares a local directory via HTTPS.
//!
//! The [SecureServer] exposes the content of a directory read only via HTTPS. All requests
//! have to carry the single [Credential] of the server, which is checked with the 'Basic'
//! method as defined by [RFC7617](https://tools.ietf.org/html/rfc7617). The TLS certificate
//! is self signed and created by [ensure_certificate] on the first start. Later starts reuse
//! it, as long as certificate and private key are both present.
//!
//! The password is generated by [generate_password] from three random words of a word list
//! and only lives as long as the process.
//!
//! # Example
//!
//! ```no_run
//! # use std::path::Path;
//! # use secureserve::{ensure_certificate, generate_password, Credential, SecureServeResult, SecureServer};
//! #
//! # #[tokio::main]
//! # async fn main() -> SecureServeResult<()> {
//! let password = generate_password(Path::new("/usr/share/dict/words"))?;
//! // Creates "server.crt" and "server.key" in the directory, if one of them is missing.
//! let paths = ensure_certificate(Path::new("/tmp/secureserve"))?;
//!
//! let server = SecureServer::builder(".")
//!     .load_certificates(&paths.cert)
//!     .load_private_key(&paths.key)
//!     .set_credential(Credential::new("user", password))
//!     .build()?;
//!
//! // Serves on port 8081 until Ctrl-C is pressed.
//! server
//!     .run(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await
//! # }
//! ```
//!
//! Since the certificate is self signed, clients have to accept it explicitly, i.e. with
//! `curl --insecure -u user:<password> https://<address>:8081/`.

#![warn(missing_docs)]

pub mod auth;
pub mod cert;
pub mod config;
mod error;
pub mod files;
pub mod net;
pub mod password;
mod server;
pub mod tls;

pub use auth::Credential;
pub use cert::{ensure_certificate, CertificateKeyPair, CertificatePaths};
pub use config::ServerConfig;
pub use error::{AuthError, SecureServeError, SecureServeResult};
pub use password::{generate_password, WordList};
pub use server::{SecureServer, SecureServerBuilder};
