use std::path::PathBuf;
use thiserror::Error;

/// Result type of all fallible secureserve operations
pub type SecureServeResult<T> = std::result::Result<T, SecureServeError>;

/// Errors which abort the startup or the run of the server
#[derive(Error, Debug)]
pub enum SecureServeError {
    /// The home directory of the current user could not be determined
    #[error("Could not determine the home directory of the current user")]
    HomeDirUnknown,

    /// The word list for the password generation could not be read
    #[error("Failed to read word list `{path}`: {source}")]
    WordList {
        /// Path of the word list
        path: PathBuf,
        /// The underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// The word list does not contain a single usable word
    #[error("Word list `{path}` does not contain any words")]
    EmptyWordList {
        /// Path of the word list
        path: PathBuf,
    },

    /// The operating system random number generator failed
    #[error("Failed to generate random number: {0}")]
    Random(#[from] rand::Error),

    /// Generation of the RSA key failed
    #[error("Failed to generate private key: {0}")]
    KeyGeneration(#[from] rsa::Error),

    /// The private key could not be encoded as PEM
    #[error("Failed to encode private key: {message}")]
    KeyEncoding {
        /// Description of the encoding failure
        message: String,
    },

    /// Creation of the self signed certificate failed
    #[error("Failed to create certificate: {0}")]
    Certificate(#[from] rcgen::Error),

    /// A file could not be read, written or renamed
    #[error("File operation on `{path}` failed: {source}")]
    File {
        /// The affected file
        path: PathBuf,
        /// The underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Certificate or private key could not be loaded for the TLS listener
    #[error("Failed to load TLS material from `{path}`: {message}")]
    TlsMaterial {
        /// The affected file
        path: PathBuf,
        /// Description of the failure
        message: String,
    },

    /// rustls rejected the configuration
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// The network interfaces could not be enumerated
    #[error("Error getting network interfaces: {0}")]
    Interfaces(#[from] nix::Error),

    /// The server builder is missing a setting
    #[error("{0} was not set")]
    MissingSetting(&'static str),

    /// Generic IO error, i.e. binding the listener
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The http server terminated with an error
    #[error("Server error: {0}")]
    Server(#[from] hyper::Error),
}

/// Reasons why a request did not pass the authentication gate
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AuthError {
    /// The request has no `Authorization` header
    #[error("No credentials provided")]
    Missing,

    /// The `Authorization` header uses a scheme other than `Basic`
    #[error("Authentication scheme is not supported")]
    UnsupportedScheme,

    /// The `Authorization` header could not be decoded
    #[error("Malformed credentials")]
    Malformed,

    /// Username or password do not match
    #[error("Invalid username or password")]
    Mismatch,
}
