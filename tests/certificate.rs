//! Lifecycle of the certificate directory.

use std::fs;
use std::path::Path;

use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPrivateKey};
use secureserve::cert::{CERT_FILE_NAME, KEY_FILE_NAME};
use secureserve::{ensure_certificate, CertificatePaths};
use x509_parser::extensions::GeneralName;
use x509_parser::pem::parse_x509_pem;
use x509_parser::public_key::PublicKey;

fn read_pair(paths: &CertificatePaths) -> (Vec<u8>, Vec<u8>) {
    (fs::read(&paths.cert).unwrap(), fs::read(&paths.key).unwrap())
}

/// Checks all properties the server relies on.
fn assert_valid_pair(paths: &CertificatePaths) {
    let (cert_pem, key_pem) = read_pair(paths);

    let (_, pem) = parse_x509_pem(&cert_pem).unwrap();
    assert_eq!(pem.label, "CERTIFICATE");
    let cert = pem.parse_x509().unwrap();

    // self signed
    assert_eq!(cert.issuer().as_raw(), cert.subject().as_raw());
    cert.verify_signature(None).unwrap();
    assert_eq!(cert.subject().to_string(), "CN=localhost");

    // public key of the certificate belongs to the private key
    let key = RsaPrivateKey::from_pkcs1_pem(std::str::from_utf8(&key_pem).unwrap()).unwrap();
    assert_eq!(key.size() * 8, 2048);
    match cert.public_key().parsed().unwrap() {
        PublicKey::RSA(public) => {
            assert_eq!(BigUint::from_bytes_be(public.modulus), *key.n());
            assert_eq!(BigUint::from_bytes_be(public.exponent), *key.e());
        }
        _ => panic!("certificate does not contain a RSA key"),
    }

    // one year validity
    let validity = cert.validity();
    let days = (validity.not_after.timestamp() - validity.not_before.timestamp()) / 86400;
    assert_eq!(days, 365);

    assert!(cert.serial.bits() <= 128);

    let san = cert.subject_alternative_name().unwrap().unwrap();
    assert!(matches!(
        san.value.general_names.as_slice(),
        [GeneralName::DNSName("localhost")]
    ));

    let key_usage = cert.key_usage().unwrap().unwrap();
    assert!(key_usage.value.digital_signature());
    assert!(key_usage.value.key_encipherment());
    assert!(!key_usage.value.key_cert_sign());

    let ext_key_usage = cert.extended_key_usage().unwrap().unwrap();
    assert!(ext_key_usage.value.server_auth);

    let basic_constraints = cert.basic_constraints().unwrap().unwrap();
    assert!(!basic_constraints.value.ca);
}

fn assert_pair_in(dir: &Path, paths: &CertificatePaths) {
    assert_eq!(paths.cert, dir.join(CERT_FILE_NAME));
    assert_eq!(paths.key, dir.join(KEY_FILE_NAME));
}

#[test]
fn creates_pair_in_empty_directory() {
    let dir = tempfile::tempdir().unwrap();
    let cert_dir = dir.path().join("share").join("secureserve");

    let paths = ensure_certificate(&cert_dir).unwrap();

    assert_pair_in(&cert_dir, &paths);
    assert_valid_pair(&paths);
}

#[test]
fn reuses_intact_pair() {
    let dir = tempfile::tempdir().unwrap();
    let first = ensure_certificate(dir.path()).unwrap();
    let before = read_pair(&first);

    let second = ensure_certificate(dir.path()).unwrap();

    assert_eq!(first, second);
    assert_eq!(before, read_pair(&second));
}

#[test]
fn missing_key_replaces_both() {
    let dir = tempfile::tempdir().unwrap();
    let paths = ensure_certificate(dir.path()).unwrap();
    let (old_cert, old_key) = read_pair(&paths);

    fs::remove_file(&paths.key).unwrap();
    let paths = ensure_certificate(dir.path()).unwrap();

    let (new_cert, new_key) = read_pair(&paths);
    assert_ne!(old_cert, new_cert);
    assert_ne!(old_key, new_key);
    assert_valid_pair(&paths);
}

#[test]
fn missing_certificate_replaces_both() {
    let dir = tempfile::tempdir().unwrap();
    let paths = ensure_certificate(dir.path()).unwrap();
    let (_, old_key) = read_pair(&paths);

    fs::remove_file(&paths.cert).unwrap();
    let paths = ensure_certificate(dir.path()).unwrap();

    let (_, new_key) = read_pair(&paths);
    assert_ne!(old_key, new_key);
    assert_valid_pair(&paths);
}

#[test]
fn leaves_no_temporary_files() {
    let dir = tempfile::tempdir().unwrap();
    ensure_certificate(dir.path()).unwrap();

    let mut names: Vec<String> = fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec![CERT_FILE_NAME, KEY_FILE_NAME]);
}
