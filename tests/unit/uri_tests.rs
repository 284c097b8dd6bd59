//! Unit tests for listener address parsing.

use std::path::PathBuf;

use wyoming_handle_external::transport::ServerUri;
use wyoming_handle_external::AppError;

#[test]
fn stdio_uri_parses() {
    let uri: ServerUri = "stdio://".parse().unwrap();

    assert_eq!(uri, ServerUri::Stdio);
    assert!(!uri.is_multi_connection());
}

#[test]
fn unix_uri_parses_absolute_path() {
    let uri: ServerUri = "unix:///tmp/handle.sock".parse().unwrap();

    assert_eq!(
        uri,
        ServerUri::Unix {
            path: PathBuf::from("/tmp/handle.sock")
        }
    );
    assert!(uri.is_multi_connection());
}

#[test]
fn unix_uri_parses_relative_path() {
    let uri: ServerUri = "unix://handle.sock".parse().unwrap();

    assert_eq!(
        uri,
        ServerUri::Unix {
            path: PathBuf::from("handle.sock")
        }
    );
}

#[test]
fn tcp_uri_parses() {
    let uri: ServerUri = "tcp://0.0.0.0:10500".parse().unwrap();

    assert_eq!(
        uri,
        ServerUri::Tcp {
            host: "0.0.0.0".into(),
            port: 10500
        }
    );
}

#[test]
fn tcp_uri_accepts_bracketed_ipv6_host() {
    let uri: ServerUri = "tcp://[::1]:10500".parse().unwrap();

    assert_eq!(
        uri,
        ServerUri::Tcp {
            host: "::1".into(),
            port: 10500
        }
    );
    assert_eq!(uri.to_string(), "tcp://[::1]:10500");
}

#[test]
fn display_uses_canonical_form() {
    for raw in ["stdio://", "unix:///tmp/handle.sock", "tcp://localhost:10500"] {
        let uri: ServerUri = raw.parse().unwrap();
        assert_eq!(uri.to_string(), raw);
    }
}

#[test]
fn invalid_uris_are_config_errors() {
    for raw in [
        "",
        "http://localhost:80",
        "unix://",
        "tcp://localhost",
        "tcp://:10500",
        "tcp://localhost:port",
        "tcp://localhost:70000",
        "stdio://extra",
    ] {
        let result = raw.parse::<ServerUri>();
        assert!(
            matches!(result, Err(AppError::Config(_))),
            "'{raw}' must be rejected"
        );
    }
}
