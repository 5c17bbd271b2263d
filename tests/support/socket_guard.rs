//! Skips wiremock tests where a localhost socket cannot be bound.

use std::net::TcpListener;
use std::panic::Location;

use wiremock::MockServer;

const REQUIRE_ENV: &str = "DIGEST_REQUIRE_SOCKET_TESTS";

#[must_use]
pub fn socket_tests_required() -> bool {
    std::env::var(REQUIRE_ENV)
        .ok()
        .is_some_and(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
}

#[track_caller]
#[must_use]
pub fn should_skip_socket_bound_test() -> bool {
    if TcpListener::bind("127.0.0.1:0").is_ok() {
        return false;
    }

    let location = Location::caller();
    let message = format!(
        "[socket-bound-test] cannot bind localhost socket at {}:{}; mock oracle cannot run here",
        location.file(),
        location.line()
    );
    if socket_tests_required() {
        panic!("{message}. Set {REQUIRE_ENV}=0 to allow skipping.");
    }

    eprintln!("{message}. Skipping test. Set {REQUIRE_ENV}=1 to fail instead.");
    true
}

/// Starts a mock oracle server, or `None` when sockets are unavailable.
#[track_caller]
pub fn start_mock_server_or_skip() -> impl std::future::Future<Output = Option<MockServer>> {
    let skip = should_skip_socket_bound_test();
    async move {
        if skip {
            None
        } else {
            Some(MockServer::start().await)
        }
    }
}
