//! Latency smoke test for the credential check and boundary round trip.

use std::time::Instant;

use serde_json::json;
use viewer_lock_core::{Configuration, invoke};
use viewer_lock_host::{Host, WindowControl};
use viewer_lock_ui::ViewerClient;

struct HeadlessWindow;

impl WindowControl for HeadlessWindow {
    fn request_close(&mut self) {}
}

#[test]
fn boundary_round_trip_smoke_prints_latency() {
    let whitelist: Vec<String> = (0..1_000).map(|index| format!("user-{index}")).collect();
    let config = Configuration::new("bench-secret", 30, 3, whitelist);
    let mut host = Host::new(config, "bench-user");
    host.create_window(|_| Ok(HeadlessWindow))
        .expect("headless window should be created");
    let shared = host.into_shared();
    let bridge = shared.bridge().expect("bridge should be created");

    let start = Instant::now();
    let mut allowed = 0usize;

    for index in 0..10_000 {
        let request = json!({
            "op": "verifyCredentials",
            "args": [format!(" user-{} ", index % 2_000), "wrong"],
        });
        let response = invoke(&bridge, &request).expect("verifyCredentials should encode");
        if response["allowed"] == json!(true) {
            allowed += 1;
        }
    }

    let elapsed_ms = start.elapsed().as_millis();
    println!("benchmark_verify_elapsed_ms={elapsed_ms}");
    println!("benchmark_verify_allowed={allowed}");

    assert_eq!(allowed, 5_000);
    // Lightweight guardrail; strict latency targets are machine-specific.
    assert!(elapsed_ms < 5_000, "verification loop should stay bounded");
}

#[test]
fn countdown_smoke_prints_latency() {
    let config = Configuration::new("bench-secret", 100_000, 3, Vec::<String>::new());
    let mut host = Host::new(config, "bench-user");
    host.create_window(|_| Ok(HeadlessWindow))
        .expect("headless window should be created");
    let shared = host.into_shared();
    let mut client = ViewerClient::new(shared.bridge().expect("bridge should be created"));

    let start = Instant::now();
    client.start();
    for _ in 0..100_000 {
        client.tick();
        let _ = client.view();
    }

    let elapsed_ms = start.elapsed().as_millis();
    println!("benchmark_countdown_elapsed_ms={elapsed_ms}");

    assert!(client.state().is_unlocked());
    assert!(elapsed_ms < 5_000, "countdown loop should stay bounded");
}
