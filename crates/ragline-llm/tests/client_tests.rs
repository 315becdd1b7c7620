use std::time::Duration;

use httpmock::prelude::*;
use ragline_core::config::GenerationSettings;
use ragline_core::error::GenerationError;
use ragline_core::traits::Generator;
use ragline_llm::ChatCompletionsGenerator;
use serde_json::json;

fn settings(server: &MockServer) -> GenerationSettings {
    GenerationSettings { endpoint: server.base_url(), model: "test-model".into(), timeout_secs: 2, ..GenerationSettings::default() }
}

#[test]
fn returns_first_choice_content() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path("/chat/completions").header("authorization", "Bearer secret");
        then.status(200).json_body(json!({
            "choices": [{"message": {"role": "assistant", "content": "  Bonjour.  "}}]
        }));
    });

    let generator = ChatCompletionsGenerator::new(&settings(&server), "secret").unwrap();
    assert_eq!(generator.generate("Salut").unwrap(), "Bonjour.");
    mock.assert();
}

#[test]
fn http_errors_keep_status() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/chat/completions");
        then.status(429).body("rate limited");
    });

    let generator = ChatCompletionsGenerator::new(&settings(&server), "k").unwrap();
    match generator.generate("q") {
        Err(GenerationError::Status { status, message }) => {
            assert_eq!(status, 429);
            assert_eq!(message, "rate limited");
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn empty_choices_are_an_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/chat/completions");
        then.status(200).json_body(json!({"choices": []}));
    });

    let generator = ChatCompletionsGenerator::new(&settings(&server), "k").unwrap();
    assert!(matches!(generator.generate("q"), Err(GenerationError::EmptyResponse)));
}

#[test]
fn slow_backend_times_out() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/chat/completions");
        then.status(200).delay(Duration::from_secs(3)).json_body(json!({"choices": []}));
    });

    let s = GenerationSettings { timeout_secs: 1, ..settings(&server) };
    let generator = ChatCompletionsGenerator::new(&s, "k").unwrap();
    assert!(matches!(generator.generate("q"), Err(GenerationError::Timeout(_))));
}

#[test]
fn missing_api_key_is_a_config_error() {
    let s = GenerationSettings { api_key: None, api_key_env: "RAGLINE_TEST_UNSET_KEY".into(), ..GenerationSettings::default() };
    assert!(matches!(ChatCompletionsGenerator::from_settings(&s), Err(GenerationError::Config(_))));

    let s = GenerationSettings { api_key: Some("inline".into()), ..s };
    assert_eq!(ChatCompletionsGenerator::from_settings(&s).unwrap().model(), "llama-3.3-70b-versatile");
}
