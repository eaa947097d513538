#![allow(clippy::unwrap_used)]
// Integration tests for `Bridge` and `ChargerAccessory` against a wiremock
// charger cloud.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::sync::{broadcast, oneshot};
use url::Url;
use wiremock::matchers::{body_string, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use evbridge_core::{
    AccessoryHost, Bridge, BridgeConfig, BroadcastHost, CharacteristicEvent, CharacteristicUpdate,
    Command, CommandResult, ContactState, CoreError, DeviceSnapshot, LockState, PollOutcome,
    RevertState,
};

// ── Helpers ─────────────────────────────────────────────────────────

struct Harness {
    server: MockServer,
    bridge: Bridge,
    events: broadcast::Receiver<CharacteristicEvent>,
}

fn config(server: &MockServer) -> BridgeConfig {
    let mut config = BridgeConfig::new(
        Url::parse(&server.uri()).unwrap(),
        "driver@example.com",
        "hunter2".to_string().into(),
    );
    config.poll_interval = Duration::ZERO;
    config.revert_delay = Duration::from_millis(50);
    config
}

async fn mount_cloud(server: &MockServer, is_paused: bool, alive: bool) {
    mount_account(server).await;
    mount_session(server, is_paused, alive).await;
}

async fn mount_account(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "access_token": "tok-1", "expires_in": 3600 })),
        )
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/mini/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "address": "A1",
            "isDisabled": 0,
            "chargerModel": "Mini",
            "hubAddress": "H1"
        }])))
        .mount(server)
        .await;
}

async fn mount_session(server: &MockServer, is_paused: bool, alive: bool) {
    Mock::given(method("GET"))
        .and(path("/api/session"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "isPaused": is_paused, "isOverridden": false, "kwh": 3.2 })),
        )
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/session/alive"))
        .respond_with(ResponseTemplate::new(200).set_body_string(alive.to_string()))
        .mount(server)
        .await;
}

async fn started(is_paused: bool, alive: bool) -> Harness {
    let server = MockServer::start().await;
    mount_cloud(&server, is_paused, alive).await;

    let host = BroadcastHost::default();
    let events = host.subscribe();
    let bridge = Bridge::new(config(&server), Arc::new(host)).unwrap();
    bridge.start().await.unwrap();

    Harness {
        server,
        bridge,
        events,
    }
}

fn drain(events: &mut broadcast::Receiver<CharacteristicEvent>) -> Vec<CharacteristicUpdate> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        assert_eq!(event.address, "A1");
        out.push(event.update);
    }
    out
}

async fn requests_to(server: &MockServer, wanted: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == wanted)
        .count()
}

// ── Reconciliation ──────────────────────────────────────────────────

#[tokio::test]
async fn test_start_reconciles_all_axes() {
    let mut h = started(true, true).await;

    // Device pass first (no session known yet), then the session pass.
    // The target is re-emitted on every pass; unchanged values are not.
    assert_eq!(
        drain(&mut h.events),
        vec![
            CharacteristicUpdate::LockCurrent(LockState::Unsecured),
            CharacteristicUpdate::LockTarget(LockState::Unsecured),
            CharacteristicUpdate::PowerOn(false),
            CharacteristicUpdate::Contact(ContactState::NotDetected),
            CharacteristicUpdate::LockTarget(LockState::Unsecured),
            CharacteristicUpdate::Contact(ContactState::Detected),
        ]
    );

    let accessory = h.bridge.accessory("A1").unwrap();
    let state = accessory.state();
    assert_eq!(state.lock_current, Some(LockState::Unsecured));
    assert_eq!(state.power_on, Some(false));
    assert_eq!(state.contact, Some(ContactState::Detected));
    assert_eq!(
        accessory.session().session.as_ref().unwrap().telemetry["kwh"],
        json!(3.2)
    );
}

#[tokio::test]
async fn test_unchanged_poll_emits_only_forced_target() {
    let mut h = started(true, true).await;
    drain(&mut h.events);

    let outcome = h.bridge.poll_now().await.unwrap();

    assert_eq!(outcome, PollOutcome::Polled { accessories: 1 });
    assert_eq!(
        drain(&mut h.events),
        vec![CharacteristicUpdate::LockTarget(LockState::Unsecured)]
    );
    assert!(h.bridge.last_poll().borrow().is_some());
}

#[tokio::test]
async fn test_session_fetch_failure_leaves_state_stale() {
    let mut h = started(false, true).await;
    drain(&mut h.events);

    h.server.reset().await;
    Mock::given(method("GET"))
        .and(path("/api/session"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&h.server)
        .await;

    let accessory = h.bridge.accessory("A1").unwrap();
    let err = accessory.check_session().await.unwrap_err();

    assert!(matches!(err, CoreError::Api { status: Some(500), .. }));
    assert!(drain(&mut h.events).is_empty());
    assert_eq!(accessory.state().power_on, Some(true));
    assert!(accessory.session().alive);
}

// ── Power axis ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_resume_is_optimistic_and_calls_unpause() {
    let mut h = started(true, true).await;
    drain(&mut h.events);

    Mock::given(method("POST"))
        .and(path("/api/session/unpause"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&h.server)
        .await;

    let result = h
        .bridge
        .execute(Command::SetPower {
            address: "A1".into(),
            on: true,
        })
        .await
        .unwrap();

    assert_eq!(
        result,
        CommandResult::Power {
            address: "A1".into(),
            on: true
        }
    );
    assert_eq!(drain(&mut h.events), vec![CharacteristicUpdate::PowerOn(true)]);
    let accessory = h.bridge.accessory("A1").unwrap();
    assert!(accessory.session().power_on());
}

#[tokio::test]
async fn test_resume_failure_is_not_rolled_back() {
    let mut h = started(true, true).await;
    drain(&mut h.events);

    Mock::given(method("POST"))
        .and(path("/api/session/unpause"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&h.server)
        .await;

    let accessory = h.bridge.accessory("A1").unwrap();
    let err = accessory.set_power_on(true).await.unwrap_err();

    assert!(matches!(err, CoreError::Api { status: Some(503), .. }));
    assert_eq!(drain(&mut h.events), vec![CharacteristicUpdate::PowerOn(true)]);
    assert_eq!(accessory.state().power_on, Some(true));
}

#[tokio::test]
async fn test_power_without_vehicle_reverts_and_skips_api() {
    let mut h = started(true, false).await;
    drain(&mut h.events);

    Mock::given(method("POST"))
        .and(path("/api/session/unpause"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/session/Pause"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&h.server)
        .await;

    let accessory = h.bridge.accessory("A1").unwrap();
    let err = accessory.set_power_on(true).await.unwrap_err();
    assert!(matches!(err, CoreError::Rejected { .. }));
    assert!(drain(&mut h.events).is_empty());

    tokio::time::sleep(Duration::from_millis(250)).await;

    // Forced even though the last reported value was already off.
    assert_eq!(drain(&mut h.events), vec![CharacteristicUpdate::PowerOn(false)]);
    assert_eq!(accessory.revert_state(), RevertState::PendingRevert);

    // The host echoes the forced value back; exactly one echo is swallowed.
    accessory.set_power_on(false).await.unwrap();
    assert_eq!(accessory.revert_state(), RevertState::Idle);
    assert!(drain(&mut h.events).is_empty());
}

#[tokio::test]
async fn test_repeated_rejections_revert_once() {
    let mut h = started(true, false).await;
    drain(&mut h.events);

    let accessory = h.bridge.accessory("A1").unwrap();
    assert!(accessory.set_power_on(true).await.is_err());
    assert!(accessory.set_power_on(true).await.is_err());

    tokio::time::sleep(Duration::from_millis(250)).await;

    assert_eq!(drain(&mut h.events), vec![CharacteristicUpdate::PowerOn(false)]);
}

// ── Lock axis ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_lock_success_updates_current() {
    let mut h = started(true, true).await;
    drain(&mut h.events);

    Mock::given(method("POST"))
        .and(path("/api/mini/disable"))
        .and(body_string("id=A1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&h.server)
        .await;

    h.bridge
        .execute(Command::SetLock {
            address: "A1".into(),
            locked: true,
        })
        .await
        .unwrap();

    assert_eq!(
        drain(&mut h.events),
        vec![
            CharacteristicUpdate::LockTarget(LockState::Secured),
            CharacteristicUpdate::LockCurrent(LockState::Secured),
        ]
    );
    let accessory = h.bridge.accessory("A1").unwrap();
    assert_eq!(accessory.device().is_disabled, 1);
}

#[tokio::test]
async fn test_lock_failure_reports_unknown() {
    let mut h = started(true, true).await;
    drain(&mut h.events);

    Mock::given(method("POST"))
        .and(path("/api/mini/disable"))
        .respond_with(ResponseTemplate::new(500).set_body_string("hub offline"))
        .expect(1)
        .mount(&h.server)
        .await;

    let accessory = h.bridge.accessory("A1").unwrap();
    let err = accessory
        .set_lock_target(LockState::Secured)
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::Api { status: Some(500), .. }));
    assert_eq!(
        drain(&mut h.events),
        vec![
            CharacteristicUpdate::LockTarget(LockState::Secured),
            CharacteristicUpdate::LockCurrent(LockState::Unknown),
        ]
    );
    assert_eq!(accessory.device().is_disabled, 0);
}

#[tokio::test]
async fn test_lock_to_current_state_is_noop() {
    let mut h = started(true, true).await;
    drain(&mut h.events);

    Mock::given(method("POST"))
        .and(path("/api/mini/enable"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&h.server)
        .await;

    let accessory = h.bridge.accessory("A1").unwrap();
    accessory.set_lock_target(LockState::Unsecured).await.unwrap();

    assert!(drain(&mut h.events).is_empty());
}

#[tokio::test]
async fn test_unknown_lock_target_is_rejected() {
    let h = started(true, true).await;
    let accessory = h.bridge.accessory("A1").unwrap();

    let err = accessory.set_lock_target(LockState::Unknown).await.unwrap_err();

    assert!(matches!(err, CoreError::ValidationFailed { .. }));
}

// ── Queue interplay ─────────────────────────────────────────────────

#[tokio::test]
async fn test_poll_skipped_while_queue_busy() {
    let h = started(true, true).await;
    let before = requests_to(&h.server, "/api/session").await;

    let (release_tx, release_rx) = oneshot::channel::<()>();
    let blocker = h
        .bridge
        .queue()
        .submit(async move {
            let _ = release_rx.await;
        })
        .unwrap();

    assert_eq!(h.bridge.poll_now().await.unwrap(), PollOutcome::Skipped);
    assert_eq!(requests_to(&h.server, "/api/session").await, before);

    release_tx.send(()).unwrap();
    blocker.wait().await.unwrap();

    assert_eq!(
        h.bridge.poll_now().await.unwrap(),
        PollOutcome::Polled { accessories: 1 }
    );
    assert_eq!(requests_to(&h.server, "/api/session").await, before + 1);
}

#[tokio::test]
async fn test_commands_reach_api_in_submission_order() {
    let h = started(true, true).await;

    for (endpoint, status) in [
        ("/api/mini/disable", 200),
        ("/api/session/unpause", 200),
        ("/api/mini/enable", 200),
    ] {
        Mock::given(method("POST"))
            .and(path(endpoint))
            .respond_with(ResponseTemplate::new(status).set_delay(Duration::from_millis(20)))
            .mount(&h.server)
            .await;
    }

    let accessory = h.bridge.accessory("A1").unwrap();
    let lock = accessory.clone();
    let power = accessory.clone();
    let unlock = accessory.clone();

    let first = tokio::spawn(async move { lock.set_lock_target(LockState::Secured).await });
    tokio::time::sleep(Duration::from_millis(5)).await;
    let second = tokio::spawn(async move { power.set_power_on(true).await });
    tokio::time::sleep(Duration::from_millis(5)).await;
    let third = tokio::spawn(async move { unlock.set_lock_target(LockState::Unsecured).await });

    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();
    third.await.unwrap().unwrap();

    let order: Vec<String> = h
        .server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.method.as_str() == "POST" && r.url.path() != "/token")
        .map(|r| r.url.path().to_owned())
        .collect();
    assert_eq!(
        order,
        vec!["/api/mini/disable", "/api/session/unpause", "/api/mini/enable"]
    );
}

// ── Discovery ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_device_list_adds_and_removes_accessories() {
    let mut h = started(true, true).await;
    drain(&mut h.events);

    let count = h
        .bridge
        .apply_device_snapshots(vec![DeviceSnapshot::new("B2", 1)])
        .await
        .unwrap();

    assert_eq!(count, 1);
    assert!(h.bridge.accessory("A1").is_none());
    let added = h.bridge.accessory("B2").unwrap();
    assert_eq!(added.state().lock_current, Some(LockState::Secured));
}

#[tokio::test]
async fn test_unknown_charger_command_fails() {
    let h = started(true, true).await;

    let err = h
        .bridge
        .execute(Command::SetLock {
            address: "ZZ".into(),
            locked: true,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::ChargerNotFound { .. }));
}

#[tokio::test]
async fn test_charger_status_unreachable() {
    let h = started(true, true).await;

    Mock::given(method("GET"))
        .and(path("/api/mini/status"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "hubStatus": "200 OK", "chargerStatus": "404" })),
        )
        .mount(&h.server)
        .await;

    let err = h.bridge.charger_status("A1").await.unwrap_err();

    assert!(matches!(err, CoreError::Connectivity { ref charger, .. } if charger == "404"));
}

#[tokio::test]
async fn test_shutdown_closes_queue() {
    let h = started(true, true).await;
    h.bridge.shutdown().await;

    let err = h.bridge.refresh_devices().await.unwrap_err();
    assert!(matches!(err, CoreError::QueueClosed));
}

// ── Host delivery order ─────────────────────────────────────────────

/// Host whose delivery of `PowerOn(true)` stalls.
#[derive(Default)]
struct SlowHost(std::sync::Mutex<Vec<CharacteristicUpdate>>);

impl SlowHost {
    fn last_power(&self) -> Option<bool> {
        self.0.lock().unwrap().iter().rev().find_map(|u| match u {
            CharacteristicUpdate::PowerOn(on) => Some(*on),
            _ => None,
        })
    }
}

impl AccessoryHost for SlowHost {
    fn characteristic_changed(&self, _address: &str, update: CharacteristicUpdate) {
        if update == CharacteristicUpdate::PowerOn(true) {
            std::thread::sleep(Duration::from_millis(300));
        }
        self.0.lock().unwrap().push(update);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_slow_host_ends_on_recorded_power() {
    let server = MockServer::start().await;
    mount_account(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/session"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "isPaused": true, "isOverridden": false }))
                .set_delay(Duration::from_millis(100)),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/session/alive"))
        .respond_with(ResponseTemplate::new(200).set_body_string("true"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/session/unpause"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let host = Arc::new(SlowHost::default());
    let bridge =
        Bridge::new(config(&server), Arc::clone(&host) as Arc<dyn AccessoryHost>).unwrap();
    bridge.start().await.unwrap();
    let accessory = bridge.accessory("A1").unwrap();

    // The optimistic emit lands while a session check (still paused) is
    // in flight, and its delivery outlasts that check.
    let in_flight = accessory.submit_session_check().unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    let request = {
        let accessory = accessory.clone();
        tokio::spawn(async move { accessory.set_power_on(true).await })
    };
    in_flight.wait().await.unwrap().unwrap();
    request.await.unwrap().unwrap();

    accessory.check_session().await.unwrap();

    assert_eq!(accessory.state().power_on, Some(false));
    assert_eq!(host.last_power(), accessory.state().power_on);
}
