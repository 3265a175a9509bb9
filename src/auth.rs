//! HTTP Basic authentication as defined by [RFC7617](https://tools.ietf.org/html/rfc7617).

use hyper::header::{AUTHORIZATION, CONTENT_TYPE, WWW_AUTHENTICATE};
use hyper::{Body, HeaderMap, Response, StatusCode};
use subtle::ConstantTimeEq;

use crate::config::REALM;
use crate::error::AuthError;

/// The username and password accepted by the server.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    username: String,
    password: String,
}

impl Credential {
    /// Creates a credential from a username and a password.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credential {
            username: username.into(),
            password: password.into(),
        }
    }

    /// The username
    pub fn username(&self) -> &str {
        &self.username
    }

    /// The password
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Compares username and password in constant time.
    pub fn matches(&self, username: &str, password: &str) -> bool {
        let user_ok = self.username.as_bytes().ct_eq(username.as_bytes());
        let pass_ok = self.password.as_bytes().ct_eq(password.as_bytes());
        (user_ok & pass_ok).into()
    }

    /// Checks the `Authorization` header of a request against this credential.
    pub fn verify(&self, headers: &HeaderMap) -> Result<(), AuthError> {
        let (username, password) = basic_credentials(headers)?;
        if self.matches(&username, &password) {
            Ok(())
        } else {
            Err(AuthError::Mismatch)
        }
    }
}

// never leak the password into logs
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Extracts username and password from a `Basic` authorization header.
pub fn basic_credentials(headers: &HeaderMap) -> Result<(String, String), AuthError> {
    let auth = headers.get(AUTHORIZATION).ok_or(AuthError::Missing)?;
    let auth = auth.to_str().map_err(|_| AuthError::Malformed)?;

    let prefix = "Basic ";
    match auth.get(..prefix.len()) {
        Some(scheme) if scheme.eq_ignore_ascii_case(prefix) => {}
        _ => return Err(AuthError::UnsupportedScheme),
    }

    let decoded = base64::decode(auth[prefix.len()..].trim()).map_err(|_| AuthError::Malformed)?;
    let decoded = String::from_utf8(decoded).map_err(|_| AuthError::Malformed)?;
    let (username, password) = decoded.split_once(':').ok_or(AuthError::Malformed)?;
    Ok((username.to_string(), password.to_string()))
}

/// The 401 response which asks the client for Basic credentials.
pub fn challenge() -> Response<Body> {
    let mut response = Response::new(Body::from("Unauthorized.\n"));
    *response.status_mut() = StatusCode::UNAUTHORIZED;
    let challenge = format!("Basic realm=\"{}\"", REALM);
    if let Ok(value) = challenge.parse() {
        response.headers_mut().insert(WWW_AUTHENTICATE, value);
    }
    response.headers_mut().insert(
        CONTENT_TYPE,
        hyper::header::HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::HeaderValue;

    fn headers(auth: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(auth).unwrap());
        headers
    }

    fn basic(user_pass: &str) -> HeaderMap {
        headers(&format!("Basic {}", base64::encode(user_pass)))
    }

    #[test]
    fn missing_header() {
        let cred = Credential::new("user", "pass");
        assert_eq!(cred.verify(&HeaderMap::new()), Err(AuthError::Missing));
    }

    #[test]
    fn wrong_scheme() {
        let cred = Credential::new("user", "pass");
        assert_eq!(
            cred.verify(&headers("Bearer abcdef")),
            Err(AuthError::UnsupportedScheme)
        );
        assert_eq!(cred.verify(&headers("Bas")), Err(AuthError::UnsupportedScheme));
    }

    #[test]
    fn malformed_payload() {
        let cred = Credential::new("user", "pass");
        assert_eq!(cred.verify(&headers("Basic %%%")), Err(AuthError::Malformed));
        // no colon separating user and password
        assert_eq!(
            cred.verify(&headers(&format!("Basic {}", base64::encode("userpass")))),
            Err(AuthError::Malformed)
        );
    }

    #[test]
    fn matching_credentials() {
        let cred = Credential::new("user", "pass");
        assert_eq!(cred.verify(&basic("user:pass")), Ok(()));
        // scheme is case insensitive
        assert_eq!(
            cred.verify(&headers(&format!("basic {}", base64::encode("user:pass")))),
            Ok(())
        );
    }

    #[test]
    fn mismatching_credentials() {
        let cred = Credential::new("user", "pass");
        assert_eq!(cred.verify(&basic("user:wrong")), Err(AuthError::Mismatch));
        assert_eq!(cred.verify(&basic("admin:pass")), Err(AuthError::Mismatch));
        assert_eq!(cred.verify(&basic("user:")), Err(AuthError::Mismatch));
        assert_eq!(cred.verify(&basic("user:passpass")), Err(AuthError::Mismatch));
    }

    #[test]
    fn password_with_colon() {
        let cred = Credential::new("user", "a:b:c");
        assert_eq!(cred.verify(&basic("user:a:b:c")), Ok(()));
    }

    #[test]
    fn challenge_names_realm() {
        let response = challenge();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers()[WWW_AUTHENTICATE],
            "Basic realm=\"Restricted\""
        );
    }

    #[test]
    fn debug_hides_password() {
        let cred = Credential::new("user", "supersecret");
        assert!(!format!("{:?}", cred).contains("supersecret"));
    }
}
