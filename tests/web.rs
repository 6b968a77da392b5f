// Facade tests that need a JS host: error paths build real `JsValue`s.
// Run with `wasm-pack test --node`.

#![cfg(target_arch = "wasm32")]

use gesture_core::Engine;
use wasm_bindgen_test::*;

const REGION: &str = r#"{"rect":{"x":0.1,"y":0.1,"width":0.2,"height":0.2}}"#;

#[wasm_bindgen_test]
fn rejects_bad_config() {
    let err = Engine::new("{not json").err().unwrap();
    assert!(err.as_string().unwrap().starts_with("Invalid configuration"));

    let inverted = r#"{"stabilizer":{"pinch_on_threshold":0.2,"pinch_off_threshold":0.4}}"#;
    assert!(Engine::new(inverted).is_err());
}

#[wasm_bindgen_test]
fn rejects_malformed_packet() {
    let engine = Engine::new("{}").unwrap();
    let err = engine.push_sample("{\"pointer_position\":", 10).unwrap_err();
    assert!(err.as_string().unwrap().starts_with("Invalid sample payload"));
}

#[wasm_bindgen_test]
fn registry_errors_name_the_target() {
    let mut engine = Engine::new("{}").unwrap();
    engine.add_dwell_target(5, REGION, 0).unwrap();
    let dup = engine.add_pinch_target(5, REGION).unwrap_err();
    assert_eq!(dup.as_string().unwrap(), "Target 5 is already registered");

    let unknown = engine.remove_target(9).unwrap_err();
    assert_eq!(unknown.as_string().unwrap(), "Unknown target 9");
    assert!(engine.set_region(5, "[]").is_err());
}

#[wasm_bindgen_test]
fn tick_returns_frame_json() {
    let mut engine = Engine::new("{}").unwrap();
    engine
        .push_sample(r#"{"hand_detected":true,"pointer_position":{"x":0.2,"y":0.3}}"#, 1_000)
        .unwrap();
    let json = engine.tick(1_000, 0.016).unwrap();
    assert!(json.contains("\"cursor\""));
    assert!(json.contains("\"selections\":[]"));
}
