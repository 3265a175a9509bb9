use core::task::{Context, Poll};
use std::convert::Infallible;
use std::future::Future;
use std::io::Error;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_stream::stream;
use futures_util::stream::{FuturesUnordered, Stream, StreamExt};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server};
use tokio::net::TcpListener;
use tokio::net::TcpStream;
use tokio_rustls::server::TlsStream;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, error, info, warn};

use crate::auth::{self, Credential};
use crate::config::{ServerConfig, DEFAULT_BIND_ADDRESS, DEFAULT_PORT};
use crate::error::{SecureServeError, SecureServeResult};
use crate::files::{self, StaticFiles};
use crate::net;
use crate::tls;

/// A https server, which exposes a directory to clients knowing the credential
pub struct SecureServer {
    config: Arc<ServerConfig>,
    files: StaticFiles,
}

/// Helper structure for building [SecureServer] structs
pub struct SecureServerBuilder {
    root: PathBuf,
    bind_address: IpAddr,
    port: u16,
    certs: Option<PathBuf>,
    private_key: Option<PathBuf>,
    credential: Option<Credential>,
}

impl SecureServer {
    /// Starts a builder of a [SecureServer] which serves the directory `root`.
    pub fn builder(root: impl Into<PathBuf>) -> SecureServerBuilder {
        SecureServerBuilder::new(root)
    }

    /// The configuration the server was built with
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Binds the configured address, prints the connection URLs and serves until `shutdown`
    /// completes.
    pub async fn run<F>(self, shutdown: F) -> SecureServeResult<()>
    where
        F: Future<Output = ()>,
    {
        let addr = SocketAddr::new(self.config.bind_address(), self.config.port());
        let tcp = TcpListener::bind(addr).await?;
        self.announce()?;
        self.serve(tcp, shutdown).await
    }

    fn announce(&self) -> SecureServeResult<()> {
        for address in net::lan_ipv4_addresses()? {
            println!(
                "{}",
                net::connection_line(address, self.config.port(), self.config.credential())
            );
        }
        Ok(())
    }

    /// Serves https requests on an already bound listener until `shutdown` completes.
    ///
    /// Requests, which are in flight when `shutdown` completes, are answered before this
    /// method returns.
    pub async fn serve<F>(self, tcp: TcpListener, shutdown: F) -> SecureServeResult<()>
    where
        F: Future<Output = ()>,
    {
        let local_addr = tcp.local_addr()?;
        let tls_acceptor = TlsAcceptor::from(self.config.tls());

        // Handshakes are driven next to the accept call, so a client which never finishes its
        // handshake does not stall other connections.
        let incoming_tls_stream = stream! {
            let mut handshakes = FuturesUnordered::new();
            loop {
                let accepted = tokio::select! {
                    res = tcp.accept() => {
                        match res {
                            Ok((socket, peer)) => {
                                handshakes.push(handshake(tls_acceptor.clone(), socket, peer));
                            }
                            Err(e) => {
                                warn!("Failed to accept connection: {}", e);
                                tokio::time::sleep(Duration::from_millis(100)).await;
                            }
                        }
                        None
                    }
                    Some(res) = handshakes.next(), if !handshakes.is_empty() => res,
                };
                if let Some(stream) = accepted {
                    yield Ok::<_, Error>(stream);
                }
            }
        };

        let server = Arc::new(self);
        let service_factory = make_service_fn(move |conn: &TlsStream<TcpStream>| {
            let server = server.clone();
            let remote = conn
                .get_ref()
                .0
                .peer_addr()
                .map(|addr| addr.to_string())
                .unwrap_or_else(|_| String::from("-"));
            async move {
                Ok::<_, Infallible>(service_fn(move |request| {
                    server.clone().handle(remote.clone(), request)
                }))
            }
        });

        let server = Server::builder(HyperAcceptor {
            acceptor: Box::pin(incoming_tls_stream),
        })
        .serve(service_factory);

        info!("Starting to serve on https://{}.", local_addr);

        server.with_graceful_shutdown(shutdown).await?;

        info!("Server on https://{} stopped.", local_addr);
        Ok(())
    }

    async fn handle(
        self: Arc<Self>,
        remote: String,
        request: Request<Body>,
    ) -> Result<Response<Body>, Infallible> {
        let method = request.method().clone();
        let path = request.uri().path().to_string();

        let response = match self.config.credential().verify(request.headers()) {
            Err(e) => {
                debug!("Rejected request from {}: {}", remote, e);
                auth::challenge()
            }
            Ok(()) => {
                let files = self.files.clone();
                let (m, p, h) = (method.clone(), path.clone(), request.headers().clone());
                match tokio::task::spawn_blocking(move || files.respond(&m, &p, &h)).await {
                    Ok(response) => response,
                    Err(e) => {
                        error!("File task for {} panicked: {}", path, e);
                        files::internal_error()
                    }
                }
            }
        };

        info!(
            "{} \"{} {}\" {}",
            remote,
            method,
            path,
            response.status().as_u16()
        );
        Ok(response)
    }
}

async fn handshake(
    acceptor: TlsAcceptor,
    socket: TcpStream,
    peer: SocketAddr,
) -> Option<TlsStream<TcpStream>> {
    match acceptor.accept(socket).await {
        Ok(stream) => Some(stream),
        Err(e) => {
            debug!("TLS handshake with {} failed: {}", peer, e);
            None
        }
    }
}

impl SecureServerBuilder {
    /// Creates a new builder for a [SecureServer].
    ///
    /// Listens on port [DEFAULT_PORT] of all interfaces unless configured otherwise.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        SecureServerBuilder {
            root: root.into(),
            bind_address: DEFAULT_BIND_ADDRESS,
            port: DEFAULT_PORT,
            certs: None,
            private_key: None,
            credential: None,
        }
    }

    /// Sets the port on which the server will listen.
    pub fn set_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the address on which the server will listen.
    pub fn set_bind_address(mut self, address: IpAddr) -> Self {
        self.bind_address = address;
        self
    }

    /// Loads the certificate from a file.
    ///
    /// The argument 'certs' is the path to the PEM file containing the certificate.
    pub fn load_certificates(mut self, certs: impl Into<PathBuf>) -> Self {
        self.certs = Some(certs.into());
        self
    }

    /// Loads a private key from file.
    ///
    /// The argument 'private_key' is the path to the PEM file containing the private key.
    pub fn load_private_key(mut self, private_key: impl Into<PathBuf>) -> Self {
        self.private_key = Some(private_key.into());
        self
    }

    /// Sets the only credential accepted by the server.
    pub fn set_credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    /// Loads the TLS material and creates the server.
    ///
    /// # Errors
    ///
    /// Fails if certificate, private key or credential were not set or if the TLS material
    /// can not be loaded.
    pub fn build(self) -> SecureServeResult<SecureServer> {
        let certs = self
            .certs
            .ok_or(SecureServeError::MissingSetting("Certificate file"))?;
        let private_key = self
            .private_key
            .ok_or(SecureServeError::MissingSetting("Private key file"))?;
        let credential = self
            .credential
            .ok_or(SecureServeError::MissingSetting("Credential"))?;

        let tls = tls::server_config(&certs, &private_key)?;
        let files = StaticFiles::new(&self.root);
        let config = ServerConfig::new(self.root, self.bind_address, self.port, tls, credential);
        Ok(SecureServer {
            config: Arc::new(config),
            files,
        })
    }
}

struct HyperAcceptor {
    acceptor: Pin<Box<dyn Stream<Item = Result<TlsStream<TcpStream>, Error>> + Send>>,
}

impl hyper::server::accept::Accept for HyperAcceptor {
    type Conn = TlsStream<TcpStream>;
    type Error = Error;

    fn poll_accept(
        mut self: Pin<&mut Self>,
        cx: &mut Context,
    ) -> Poll<Option<Result<Self::Conn, Self::Error>>> {
        Pin::new(&mut self.acceptor).poll_next(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_requires_settings() {
        let res = SecureServer::builder(".")
            .set_credential(Credential::new("user", "pass"))
            .build();
        assert!(matches!(
            res,
            Err(SecureServeError::MissingSetting("Certificate file"))
        ));

        let res = SecureServer::builder(".")
            .load_certificates("server.crt")
            .load_private_key("server.key")
            .build();
        assert!(matches!(res, Err(SecureServeError::MissingSetting("Credential"))));
    }

    #[test]
    fn builder_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let paths = crate::cert::ensure_certificate(dir.path()).unwrap();
        let server = SecureServer::builder(dir.path())
            .load_certificates(&paths.cert)
            .load_private_key(&paths.key)
            .set_credential(Credential::new("user", "pass"))
            .build()
            .unwrap();
        assert_eq!(server.config().port(), 8081);
        assert!(server.config().bind_address().is_unspecified());
        assert_eq!(server.config().root(), dir.path());
    }
}
