use httpmock::prelude::*;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

use vibetrans::{Catalog, Gemini, QueueConfig, RequestQueue, Translator};

const ENDPOINT: &str = "/v1beta/models/gemini-2.0-flash:generateContent";

fn reply(text: &str) -> Value {
    json!({
        "candidates": [{"content": {"parts": [{"text": text}]}}],
        "usageMetadata": {"promptTokenCount": 8, "candidatesTokenCount": 2, "totalTokenCount": 10}
    })
}

async fn gemini_replying(status: u16, body: Value) -> MockServer {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path(ENDPOINT);
            then.status(status).json_body(body);
        })
        .await;
    server
}

async fn spawn_app(gemini: &MockServer) -> String {
    let provider = Gemini::new("test-key")
        .with_base_url(gemini.url("/v1beta"))
        .with_retry(1, Duration::ZERO);
    let queue = QueueConfig {
        retry_attempts: 1,
        retry_delay: Duration::ZERO,
        ..QueueConfig::default()
    };
    spawn_with(provider, queue).await
}

async fn spawn_with(provider: Gemini, queue: QueueConfig) -> String {
    let translator = Translator::new(provider, Arc::new(RequestQueue::new(queue)));
    let app = vibetrans::server::app(Catalog::builtin().unwrap(), translator);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn post_json(url: &str, body: Value) -> (u16, Value) {
    let response = reqwest::Client::new()
        .post(url)
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = response.status().as_u16();
    (status, response.json().await.unwrap())
}

#[tokio::test]
async fn health_catalog_and_cors() {
    let gemini = gemini_replying(200, reply("unused")).await;
    let base = spawn_app(&gemini).await;
    let client = reqwest::Client::new();

    let health: Value = client
        .get(format!("{}/health", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health, json!({"status": "ok"}));

    let list: Value = client
        .get(format!("{}/api/translators", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list["count"], 15);

    let tool: Value = client
        .get(format!("{}/api/chinese-to-english-translator", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(tool["status"], "healthy");
    assert_eq!(tool["message"], "Chinese-English Translator API is running");
    assert_eq!(tool["directions"], json!(["zh-to-en", "en-to-zh"]));
    assert_eq!(tool["methods"], json!(["GET", "POST", "OPTIONS"]));

    let preflight = client
        .request(reqwest::Method::OPTIONS, format!("{}/api/chinese-english-translator", base))
        .send()
        .await
        .unwrap();
    assert_eq!(preflight.status().as_u16(), 204);
    assert_eq!(
        preflight.headers()["access-control-allow-origin"],
        "*"
    );

    let missing = client
        .get(format!("{}/api/klingon-translator", base))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status().as_u16(), 404);
    let body: Value = missing.json().await.unwrap();
    assert_eq!(body["error"], "Translator not found: klingon-translator");
}

#[tokio::test]
async fn translates_with_auto_detection() {
    let gemini = gemini_replying(200, reply("The weather is nice today")).await;
    let base = spawn_app(&gemini).await;

    let (status, body) = post_json(
        &format!("{}/api/chinese-english-translator", base),
        json!({"text": "你好，今天天气很好", "inputType": "text"}),
    )
    .await;

    assert_eq!(status, 200);
    assert_eq!(body["translated"], "The weather is nice today");
    assert_eq!(body["original"], "你好，今天天气很好");
    assert_eq!(body["mode"], "general");
    assert_eq!(body["modeName"], "General");
    assert_eq!(body["direction"], "zh-to-en");
    assert_eq!(body["inputType"], "text");
    assert_eq!(body["message"], "Translation successful");
    assert_eq!(body["detectedInputLanguage"], "chinese");
    assert_eq!(body["autoDetected"], true);
    assert_eq!(body["languageInfo"]["direction"], "Chinese → English");
    assert_eq!(
        body["languageInfo"]["explanation"],
        "Auto-detected Chinese input, translated to English"
    );
}

#[tokio::test]
async fn detect_only_and_ciphers_stay_local() {
    let gemini = MockServer::start_async().await;
    let upstream = gemini
        .mock_async(|when, then| {
            when.method(POST).path(ENDPOINT);
            then.status(200).json_body(reply("unused"));
        })
        .await;
    let base = spawn_app(&gemini).await;

    let (status, body) = post_json(
        &format!("{}/api/chinese-english-translator", base),
        json!({"text": "Hello, how are you today?", "detectOnly": true}),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["detectedDirection"], "en-to-zh");
    assert_eq!(body["detectedInputLanguage"], "english");
    assert_eq!(body["languageInfo"]["confidence"], 100);
    assert!(body.get("translated").is_none());

    let (status, body) = post_json(
        &format!("{}/api/al-bhed-translator", base),
        json!({"text": "This is a test sentence", "direction": "en-to-albhed"}),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["translated"], "Drec ec y dacd cahdahla");

    upstream.assert_hits_async(0).await;
}

#[tokio::test]
async fn validation_errors_are_400() {
    let gemini = gemini_replying(200, reply("unused")).await;
    let base = spawn_app(&gemini).await;
    let url = format!("{}/api/chinese-english-translator", base);

    let (status, body) = post_json(&url, json!({"inputType": "text"})).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "No text provided");

    let (status, body) = post_json(&url, json!({"text": "hi", "mode": "pirate"})).await;
    assert_eq!(status, 400);
    assert_eq!(
        body["error"],
        "Invalid mode. Available modes: general, idioms, legal, literary, technical"
    );

    let (status, body) = post_json(
        &url,
        json!({"inputType": "image", "imageData": "aGVsbG8=", "imageMimeType": "image/tiff"}),
    )
    .await;
    assert_eq!(status, 400);
    assert!(body["error"].as_str().unwrap().starts_with("Unsupported image type."));

    let (status, _) = post_json(&url, json!({"text": "hi", "direction": "fr-to-en"})).await;
    assert_eq!(status, 400);

    let (status, body) = post_json(&url, json!({"text": "hi", "inputType": "video"})).await;
    assert_eq!(status, 400);
    assert_eq!(
        body["error"],
        "Invalid input type: video. Expected text, image or audio"
    );
}

#[tokio::test]
async fn quota_exhaustion_maps_to_429() {
    let gemini = gemini_replying(
        429,
        json!({"error": {"code": 429, "message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED"}}),
    )
    .await;
    let base = spawn_app(&gemini).await;

    let (status, body) = post_json(
        &format!("{}/api/esperanto-translator", base),
        json!({"text": "Saluton", "direction": "toEnglish"}),
    )
    .await;
    assert_eq!(status, 429);
    assert_eq!(body["error"], "API quota exceeded. Please try again later.");

    let stats: Value = reqwest::get(format!("{}/api/queue", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["totalFailed"], 1);
    assert_eq!(stats["concurrency"], 5);
}

#[tokio::test]
async fn quota_outlasting_backoff_still_maps_to_429() {
    let gemini = MockServer::start_async().await;
    let upstream = gemini
        .mock_async(|when, then| {
            when.method(POST).path(ENDPOINT);
            then.status(429).json_body(json!({
                "error": {"code": 429, "message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED"}
            }));
        })
        .await;
    let queue = QueueConfig {
        retry_attempts: 3,
        retry_delay: Duration::from_millis(50),
        timeout: Duration::from_millis(1500),
        ..QueueConfig::default()
    };
    let provider = Gemini::new("test-key")
        .with_base_url(gemini.url("/v1beta"))
        .with_retry(5, Duration::from_millis(100))
        .with_backoff_budget(queue.backoff_budget());
    let base = spawn_with(provider, queue).await;

    let (status, body) = post_json(
        &format!("{}/api/esperanto-translator", base),
        json!({"text": "Saluton", "direction": "eo-to-en"}),
    )
    .await;
    assert_eq!(status, 429);
    assert_eq!(body["error"], "API quota exceeded. Please try again later.");
    assert!(upstream.hits_async().await >= 2);
}

#[tokio::test]
async fn batch_keeps_input_order() {
    let gemini = gemini_replying(200, reply("Saluton")).await;
    let base = spawn_app(&gemini).await;

    let (status, body) = post_json(
        &format!("{}/api/esperanto-translator/batch", base),
        json!({"texts": ["Hello", "", "Good morning"], "direction": "en-to-eo"}),
    )
    .await;

    assert_eq!(status, 200);
    assert_eq!(body["succeeded"], 2);
    assert_eq!(body["failed"], 1);
    let results = body["results"].as_array().unwrap();
    assert_eq!(results[0]["original"], "Hello");
    assert_eq!(results[0]["translated"], "Saluton");
    assert_eq!(results[1]["error"], "No text provided");
    assert_eq!(results[2]["original"], "Good morning");
    assert_eq!(results[2]["direction"], "en-to-eo");

    let (status, body) = post_json(
        &format!("{}/api/esperanto-translator/batch", base),
        json!({"texts": ["Hello"], "mode": "", "direction": "en-to-eo"}),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["succeeded"], 1);
}

#[tokio::test]
async fn upload_infers_image_input() {
    let gemini = gemini_replying(
        200,
        reply("[EXTRACTED TEXT]\n菜单\n\n[TRANSLATION]\nMenu\n\n[CONTEXT]\nA restaurant sign."),
    )
    .await;
    let base = spawn_app(&gemini).await;

    let mut png = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    png.extend_from_slice(&[0; 16]);
    let form = reqwest::multipart::Form::new()
        .part(
            "file",
            reqwest::multipart::Part::bytes(png).file_name("menu.png"),
        )
        .text("direction", "zh-to-en");
    let response = reqwest::Client::new()
        .post(format!("{}/api/chinese-english-translator/upload", base))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["inputType"], "image");
    assert_eq!(body["translated"], "Menu");
    assert_eq!(body["extractedText"], "菜单");

    let form = reqwest::multipart::Form::new().part(
        "file",
        reqwest::multipart::Part::bytes(b"plain text".to_vec()).file_name("notes.txt"),
    );
    let response = reqwest::Client::new()
        .post(format!("{}/api/chinese-english-translator/upload", base))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
}
