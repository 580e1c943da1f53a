//! Checks boundary payloads against the frozen JSON schemas in `contracts/`.

use jsonschema::JSONSchema;
use serde_json::{Value, json};
use viewer_lock_core::{Configuration, invoke};
use viewer_lock_host::{ClientBridge, Host, WindowControl};

struct HeadlessWindow;

impl WindowControl for HeadlessWindow {
    fn request_close(&mut self) {}
}

fn contract_path(relative: &str) -> String {
    format!("{}/../../contracts/{relative}", env!("CARGO_MANIFEST_DIR"))
}

fn load_json(relative: &str) -> Value {
    let raw = std::fs::read_to_string(contract_path(relative)).expect("json file should be readable");
    serde_json::from_str(&raw).expect("json file should be valid")
}

fn validator(schema: &str) -> JSONSchema {
    JSONSchema::compile(&load_json(schema)).expect("schema should compile")
}

fn live_bridge() -> ClientBridge<HeadlessWindow> {
    let config = Configuration::new("secret42", 45, 2, ["alice", "bob"]);
    let mut host = Host::new(config, "contract-user");
    host.create_window(|_| Ok(HeadlessWindow))
        .expect("headless window should be created");
    host.into_shared().bridge().expect("bridge should be created")
}

#[test]
fn contract_validation_request_fixture_matches_schema() {
    let schema = validator("boundary-request.schema.json");
    assert!(schema.is_valid(&load_json("fixtures/boundary-request.valid.json")));
    assert!(!schema.is_valid(&json!({ "op": "readPassword" })));
}

#[test]
fn contract_validation_response_fixtures_match_schemas() {
    assert!(
        validator("get-config-response.schema.json")
            .is_valid(&load_json("fixtures/get-config-response.valid.json")),
        "getConfig fixture should validate"
    );
    assert!(
        validator("verify-credentials-response.schema.json")
            .is_valid(&load_json("fixtures/verify-credentials-response.valid.json")),
        "verifyCredentials fixture should validate"
    );
}

#[test]
fn contract_validation_config_schema_rejects_secret_fields() {
    let schema = validator("get-config-response.schema.json");
    assert!(!schema.is_valid(&load_json("fixtures/get-config-response.invalid.json")));
}

#[test]
fn contract_validation_live_get_config_matches_schema_and_hides_secrets() {
    let bridge = live_bridge();
    let response = invoke(&bridge, &json!({ "op": "getConfig" })).expect("getConfig should encode");

    assert!(validator("get-config-response.schema.json").is_valid(&response));
    assert_eq!(response, json!({ "durationSeconds": 45, "asciiSeconds": 2 }));
    let encoded = response.to_string();
    assert!(!encoded.contains("secret42"));
    assert!(!encoded.contains("alice"));
}

#[test]
fn contract_validation_live_verify_credentials_matches_schema() {
    let bridge = live_bridge();
    let schema = validator("verify-credentials-response.schema.json");

    for args in [
        json!([" bob ", ""]),
        json!(["mallory", "secret42"]),
        json!(["mallory", "guess"]),
        json!([7, null]),
    ] {
        let request = json!({ "op": "verifyCredentials", "args": args });
        let response = invoke(&bridge, &request).expect("verifyCredentials should encode");
        assert!(schema.is_valid(&response), "response {response} should validate");
    }
}

#[test]
fn contract_validation_live_unlock_matches_schema() {
    let bridge = live_bridge();
    let response = invoke(&bridge, &json!({ "op": "unlock", "args": ["password"] }))
        .expect("unlock should encode");
    assert!(validator("unlock-response.schema.json").is_valid(&response));
}
