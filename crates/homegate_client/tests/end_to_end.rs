//! Client against a real server on a loopback port.

use homegate_client::{ClientConfig, HomegateClient, PushState, RetryConfig};
use homegate_protocol::DeviceState;
use homegate_testkit::prelude::*;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(5);

fn client_for(server: &TestServer) -> HomegateClient {
    let config = ClientConfig::new(&server.origin())
        .unwrap()
        .with_reconnect(
            RetryConfig::new(u32::MAX)
                .with_initial_delay(Duration::from_millis(10))
                .with_max_delay(Duration::from_millis(100)),
        );
    HomegateClient::new(config).unwrap()
}

async fn wait_for_state(client: &HomegateClient, wanted: PushState) {
    let mut states = client.push().watch_state();
    tokio::time::timeout(WAIT, states.wait_for(|s| *s == wanted))
        .await
        .expect("push state not reached")
        .unwrap();
}

#[tokio::test]
async fn push_stays_idle_until_login() {
    let server = TestServer::start(sample_gateway()).await;
    let client = client_for(&server);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(client.push().state(), PushState::Idle);
    assert_eq!(client.push().connect_attempts(), 0);

    let err = client.controller().refresh_devices().await.unwrap_err();
    assert!(err.is_unauthenticated());
}

#[tokio::test]
async fn wrong_password_is_rejected() {
    let server = TestServer::start(sample_gateway()).await;
    let client = client_for(&server);

    let err = client.controller().login("letmein").await.unwrap_err();
    assert!(err.is_unauthenticated());
    assert!(!client.controller().session().is_logged_in());
}

#[tokio::test]
async fn optimistic_edit_and_push_converge() {
    let server = TestServer::start(sample_gateway()).await;
    let client = client_for(&server);
    let controller = client.controller();

    controller.login(TEST_PASSWORD).await.unwrap();
    assert!(controller.is_logged_in().await.unwrap());
    wait_for_state(&client, PushState::Connected).await;

    let devices = controller.refresh_devices().await.unwrap();
    assert_eq!(devices.len(), sample_fleet().len());
    assert_eq!(client.store().light_level("lamp"), 50);
    assert_eq!(
        client.store().current_color("strip"),
        homegate_client::calculate_device_color(Some(210.0), Some(0.8), None)
    );

    // Our own edit.
    let device = controller.set_color("lamp", 0.0, 1.0).await.unwrap();
    assert_eq!(device.state.hue, Some(0.0));
    assert_eq!(
        client.store().current_color("lamp").map(|c| c.to_hex()),
        Some("#ff0000".to_string())
    );

    // Someone else's edit, delivered only by push.
    let mut events = client.push().subscribe_events();
    server
        .gateway
        .simulate_external_change("plug", &DeviceState::new().with_on(true))
        .unwrap();
    loop {
        let event = tokio::time::timeout(WAIT, events.recv()).await.unwrap().unwrap();
        if event.device_id() == "plug" {
            break;
        }
    }
    assert!(client.store().is_on("plug"));
}

#[tokio::test]
async fn logout_closes_push_channel() {
    let server = TestServer::start(sample_gateway()).await;
    let client = client_for(&server);

    client.controller().login(TEST_PASSWORD).await.unwrap();
    wait_for_state(&client, PushState::Connected).await;

    client.controller().logout();
    wait_for_state(&client, PushState::Idle).await;

    assert!(!client.controller().is_logged_in().await.unwrap());
    assert!(client.store().device_ids().is_empty());
}

#[tokio::test]
async fn unsupported_edit_is_reverted() {
    let server = TestServer::start(sample_gateway()).await;
    let client = client_for(&server);
    let controller = client.controller();
    controller.login(TEST_PASSWORD).await.unwrap();
    controller.refresh_devices().await.unwrap();

    let err = controller.set_color("plug", 120.0, 1.0).await.unwrap_err();

    assert!(!err.is_retryable());
    assert_eq!(client.store().current_color("plug"), None);
}
