//! Client-versus-daemon tests over real loopback HTTP.

use crate::*;

use libpep::{ClientError, PepClient, PepConfig};
use pep_core::profile::PosixMapping;

fn config_for(endpoints: Vec<String>) -> PepConfig {
    PepConfig {
        endpoints,
        connect_timeout_secs: 1,
        request_timeout_secs: 5,
    }
}

#[tokio::test]
async fn authorize_round_trip_against_mock_daemon() {
    let (daemon, endpoint) = spawn_mock_pepd(permit_uidgid_response()).await.unwrap();
    let client = PepClient::new(&config_for(vec![endpoint])).unwrap();

    let request = submit_request();
    let response = client.authorize(&request).await.unwrap();

    // the mock unmarshalled our query and echoed it back verbatim
    assert_eq!(response.request.as_ref(), Some(&request));
    assert_eq!(response.results[0].decision, Decision::Permit);
    let mapping = PosixMapping::from_result(&response.results[0]).unwrap();
    assert_eq!(mapping.uid.as_deref(), Some("1001"));
    assert_eq!(mapping.gid.as_deref(), Some("2001"));

    daemon.await.unwrap();
}

#[tokio::test]
async fn failover_skips_unreachable_endpoint() {
    let (daemon, live) = spawn_mock_pepd(permit_uidgid_response()).await.unwrap();
    // nothing listens on the first endpoint; the client must move on
    let dead = "http://127.0.0.1:1/authz".to_string();
    let client = PepClient::new(&config_for(vec![dead, live])).unwrap();

    let response = client.authorize(&submit_request()).await.unwrap();
    assert_eq!(response.results[0].decision, Decision::Permit);

    daemon.await.unwrap();
}

#[tokio::test]
async fn http_error_from_a_reachable_daemon_is_final() {
    let (daemon, erroring) = spawn_mock_error(500).await.unwrap();
    let (_spare_daemon, spare) = spawn_mock_pepd(permit_uidgid_response()).await.unwrap();
    let client = PepClient::new(&config_for(vec![erroring, spare])).unwrap();

    // the first daemon answered: no failover to the second
    match client.authorize(&submit_request()).await {
        Err(ClientError::BadStatus { code: 500, .. }) => {}
        other => panic!("expected BadStatus, got {:?}", other.err()),
    }

    daemon.await.unwrap();
}

#[tokio::test]
async fn all_endpoints_down_reports_the_attempt_count() {
    let client = PepClient::new(&config_for(vec![
        "http://127.0.0.1:1/authz".to_string(),
        "http://127.0.0.1:2/authz".to_string(),
    ]))
    .unwrap();

    match client.authorize(&submit_request()).await {
        Err(ClientError::AllEndpointsFailed { tried: 2, .. }) => {}
        other => panic!("expected AllEndpointsFailed, got {:?}", other.err()),
    }
}
