use call_outcome_rater::call::CallRecord;
use call_outcome_rater::classify::llm::{BatchItem, LlmClassifier};
use call_outcome_rater::classify::taxonomy::Classification;
use call_outcome_rater::features::{ExtractorConfig, Features};
use call_outcome_rater::fetch::BasicClient;
use call_outcome_rater::fetch::auth::ApiKey;
use call_outcome_rater::llm::{ChatModel, LlmError, OpenAiChatClient};
use chrono::{TimeZone, Utc};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> OpenAiChatClient<ApiKey<BasicClient>> {
    let http = ApiKey::bearer(BasicClient::new(), "sk-test").unwrap();
    OpenAiChatClient::new(http, format!("{}/v1/", server.uri()), "gpt-4o-mini")
}

fn completion(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "choices": [
            {"index": 0, "message": {"role": "assistant", "content": content}, "finish_reason": "stop"}
        ]
    })
}

#[tokio::test]
async fn test_complete_returns_first_choice() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("Authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "response_format": {"type": "json_object"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("{\"calls\": []}")))
        .expect(1)
        .mount(&server)
        .await;

    let reply = client(&server).complete("system", "user").await.unwrap();
    assert_eq!(reply, "{\"calls\": []}");
}

#[tokio::test]
async fn test_status_codes_map_to_errors() {
    let server = MockServer::start().await;
    let chat = client(&server);

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    assert!(matches!(
        chat.complete("s", "u").await,
        Err(LlmError::AuthFailed(_))
    ));

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    assert!(matches!(
        chat.complete("s", "u").await,
        Err(LlmError::RateLimited(_))
    ));

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    assert!(matches!(
        chat.complete("s", "u").await,
        Err(LlmError::RequestFailed(_))
    ));
}

#[tokio::test]
async fn test_response_without_content_is_invalid() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    assert!(matches!(
        client(&server).complete("s", "u").await,
        Err(LlmError::InvalidResponse(_))
    ));
}

#[tokio::test]
async fn test_classifier_over_http() {
    let server = MockServer::start().await;
    let content = json!({
        "calls": [
            {"callId": "a", "category": "booking-abandoned"},
            {"callId": "b", "category": "transferred", "transferReason": "billing"}
        ]
    })
    .to_string();
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(&content)))
        .mount(&server)
        .await;

    let calls: Vec<CallRecord> = ["a", "b", "c"]
        .iter()
        .map(|id| CallRecord {
            id: id.to_string(),
            created_at: Utc.with_ymd_and_hms(2025, 3, 4, 10, 0, 0).unwrap(),
            duration_seconds: Some(60.0),
            ended_reason: Some("assistant-ended-call".into()),
            ..Default::default()
        })
        .collect();
    let features: Vec<Features> = calls
        .iter()
        .map(|c| Features::from_call(c, &ExtractorConfig::default()))
        .collect();
    let batch: Vec<BatchItem<'_>> = calls
        .iter()
        .zip(&features)
        .map(|(call, features)| BatchItem { call, features })
        .collect();

    let classifier = LlmClassifier::new(client(&server));
    let out = classifier.classify_batch(&batch).await;

    assert!(!out.request_failed);
    assert_eq!(out.degraded, 1);
    assert_eq!(out.results[0], Classification::BookingAbandoned);
    assert_eq!(out.results[1].transfer_reason(), Some("billing"));
    assert_eq!(out.results[2], Classification::Unknown);
}

#[tokio::test]
async fn test_classifier_degrades_when_endpoint_is_down() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let call = CallRecord {
        id: "a".into(),
        created_at: Utc.with_ymd_and_hms(2025, 3, 4, 10, 0, 0).unwrap(),
        ..Default::default()
    };
    let features = Features::from_call(&call, &ExtractorConfig::default());
    let classifier = LlmClassifier::new(client(&server));
    let out = classifier
        .classify_batch(&[BatchItem {
            call: &call,
            features: &features,
        }])
        .await;

    assert!(out.request_failed);
    assert_eq!(out.results, vec![Classification::Unknown]);
}
