//! Integration tests for the `/ads/{ad_id}/mixer` resource.

mod common;

use axum::http::StatusCode;
use axum::Router;
use common::{body_json, get, post, post_json};
use serde_json::{json, Value};

const BASE: &str = "/api/v1/ads/autumn";

/// Create and activate a version, returning its id.
async fn activate(app: &Router, stream: &str, payload: Value) -> String {
    let response = post_json(
        app.clone(),
        &format!("{BASE}/{stream}/versions"),
        json!({ "payload": payload }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let id = body_json(response).await["data"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = post(app.clone(), &format!("{BASE}/{stream}/versions/{id}/activate")).await;
    assert_eq!(response.status(), StatusCode::OK);
    id
}

fn voices(durations: &[Option<f64>]) -> Value {
    let lines: Vec<Value> = durations
        .iter()
        .enumerate()
        .map(|(i, d)| {
            json!({
                "voice_id": "el-7",
                "voice_name": "Noah",
                "text": format!("Line {i}"),
                "generated_url": format!("https://cdn/v{i}.mp3"),
                "duration": d,
            })
        })
        .collect();
    json!({ "stream": "voices", "content": { "lines": lines } })
}

fn track<'a>(state: &'a Value, id: &str) -> &'a Value {
    state["calculated_tracks"]
        .as_array()
        .unwrap()
        .iter()
        .find(|t| t["id"] == id)
        .unwrap_or_else(|| panic!("track {id} missing"))
}

#[tokio::test]
async fn mixer_is_404_before_first_build() {
    let app = common::build_test_app();
    let response = get(app, &format!("{BASE}/mixer")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn voices_sequence_and_music_is_truncated() {
    let app = common::build_test_app();
    let voice_id = activate(&app, "voices", voices(&[Some(4.0), Some(5.0)])).await;
    let music_id = activate(
        &app,
        "music",
        json!({
            "stream": "music",
            "content": {
                "provider": "mubert",
                "prompt": "crisp autumn folk",
                "generated_url": "https://cdn/m.mp3",
                "duration": 30.0,
            },
        }),
    )
    .await;

    let state = body_json(get(app, &format!("{BASE}/mixer")).await).await["data"].clone();

    let second = track(&state, &format!("voice-{voice_id}-1"));
    assert_eq!(second["actual_start_time"], 4.0);

    let music = track(&state, &format!("music-{music_id}"));
    assert_eq!(music["actual_start_time"], 0.0);
    assert_eq!(music["actual_duration"], 12.0);
    assert_eq!(music["label"], "Mubert - crisp autumn folk");
    assert_eq!(music["volume"], 0.25);

    assert_eq!(state["total_duration"], 12.0);
    assert_eq!(state["volumes"], json!({}));
}

#[tokio::test]
async fn sfx_start_anchor_plays_at_zero() {
    let app = common::build_test_app();
    activate(&app, "voices", voices(&[Some(3.0), Some(3.0)])).await;
    let sfx_id = activate(
        &app,
        "sfx",
        json!({
            "stream": "sfx",
            "content": {
                "effects": [
                    { "description": "door chime", "generated_url": "https://cdn/fx0.mp3", "play_after": "start" },
                    { "description": "applause", "generated_url": "https://cdn/fx1.mp3", "play_after": "voice-1", "duration": 2.0 },
                ],
            },
        }),
    )
    .await;

    let state = body_json(get(app, &format!("{BASE}/mixer")).await).await["data"].clone();

    let chime = track(&state, &format!("sfx-{sfx_id}-0"));
    assert_eq!(chime["actual_start_time"], 0.0);
    assert_eq!(chime["actual_duration"], 5.0);

    let applause = track(&state, &format!("sfx-{sfx_id}-1"));
    assert_eq!(applause["actual_start_time"], 6.0);
    assert_eq!(state["total_duration"], 8.0);
}

#[tokio::test]
async fn rebuild_endpoint_is_idempotent() {
    let app = common::build_test_app();
    activate(&app, "voices", voices(&[Some(2.5)])).await;

    let mut first = body_json(post(app.clone(), &format!("{BASE}/mixer/rebuild")).await).await;
    let mut second = body_json(post(app, &format!("{BASE}/mixer/rebuild")).await).await;
    first["data"]["last_calculated"] = json!(0);
    second["data"]["last_calculated"] = json!(0);

    assert_eq!(first, second);
    assert_eq!(first["data"]["total_duration"], 3.0);
}

#[tokio::test]
async fn reported_durations_refine_the_timeline() {
    let app = common::build_test_app();
    let voice_id = activate(&app, "voices", voices(&[None, None])).await;

    // Without measurements each line falls back to 3 s.
    let cold = body_json(get(app.clone(), &format!("{BASE}/mixer")).await).await["data"].clone();
    assert_eq!(cold["total_duration"], 6.0);

    let first = format!("voice-{voice_id}-0");
    let mut durations = serde_json::Map::new();
    durations.insert(first.clone(), json!(4.5));
    let response = post_json(
        app,
        &format!("{BASE}/mixer/durations"),
        json!({ "durations": durations }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let warm = body_json(response).await["data"].clone();
    assert_eq!(track(&warm, &first)["actual_duration"], 4.5);
    assert_eq!(track(&warm, &format!("voice-{voice_id}-1"))["actual_start_time"], 4.5);
    assert_eq!(warm["total_duration"], 8.0);
}

#[tokio::test]
async fn invalid_reported_duration_is_400() {
    let app = common::build_test_app();
    let response = post_json(
        app,
        &format!("{BASE}/mixer/durations"),
        json!({ "durations": { "voice-x-0": -2.0 } }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "MALFORMED_INPUT");
}
