use clovarelay::prompt;
use clovarelay::providers::clova;
use clovarelay::store;
use clovarelay::{ClovaConfig, ConversationStore, Error};
use clovarelay::{MemoryStore, Message, Role};

fn test_config() -> ClovaConfig
{   ClovaConfig::new(
      "test-key".to_string()
    , "test-primary-val".to_string()
    , "test-bot-token".to_string()
    )
}

/// Config pointed at a port nothing listens on, so transport
/// failures surface without touching the network
fn unreachable_config() -> ClovaConfig
{   let mut config = test_config();
    config.api_host = "127.0.0.1:9".to_string();
    config
}

// ===== Prompt Flattening =====

#[test]
fn test_flatten_preserves_order()
{   let messages = vec![
      Message::user("first")
    , Message::assistant("second")
    , Message::user("third")
    ];

    let flat = prompt::flatten_messages(&messages);
    assert_eq!(
      flat,
      "질문: first\n답변: second\n질문: third\n"
    );
}

#[test]
fn test_flatten_skips_system_messages()
{   let messages = vec![
      Message
      {   role: Role::System
        , content: "be helpful".to_string()
      }
    , Message::user("hello")
    ];

    let flat = prompt::flatten_messages(&messages);
    assert_eq!(flat, "질문: hello\n");
}

#[test]
fn test_build_prompt_starts_with_preamble()
{   let messages = vec![Message::user("hi")];
    let text = prompt::build_prompt(&messages);
    assert!(text.starts_with(prompt::MAIN_PROMPT));
    assert!(text.ends_with("질문: hi\n"));
}

// ===== Echo and Marker Stripping =====

#[test]
fn test_strip_prompt_echo()
{   let stripped = prompt::strip_prompt_echo(
      "질문: hi\n답변: hello",
      "질문: hi\n"
    );
    assert_eq!(stripped, "답변: hello");
}

#[test]
fn test_strip_prompt_echo_noop_without_prefix()
{   // Stripping is idempotent: no prefix, no change
    let stripped = prompt::strip_prompt_echo(
      "답변: hello",
      "질문: hi\n"
    );
    assert_eq!(stripped, "답변: hello");

    let again = prompt::strip_prompt_echo(
      stripped,
      "질문: hi\n"
    );
    assert_eq!(again, stripped);
}

#[test]
fn test_strip_answer_marker()
{   assert_eq!(
      prompt::strip_answer_marker("답변: hello"),
      "hello"
    );
    assert_eq!(
      prompt::strip_answer_marker("hello"),
      "hello"
    );
}

// ===== Answer Extraction =====

#[test]
fn test_extract_first_answer_round_trip()
{   let result = prompt::extract_first_answer(
      "답변: X\n질문: Y"
    );
    assert_eq!(result, Ok("X".to_string()));
}

#[test]
fn test_extract_without_markers_passes_through()
{   let result = prompt::extract_first_answer("hello");
    assert_eq!(result, Ok("hello".to_string()));
}

#[test]
fn test_extract_trailing_question_marker()
{   // No answer marker, but the model has started a next turn
    let result = prompt::extract_first_answer(
      "foo\n질문: bar"
    );
    assert_eq!(result, Ok("foo".to_string()));
}

#[test]
fn test_extract_trims_whitespace()
{   let result = prompt::extract_first_answer(
      "답변:   spaced out  \n"
    );
    assert_eq!(result, Ok("spaced out".to_string()));
}

#[test]
fn test_extract_empty_input_is_invalid()
{   let result = prompt::extract_first_answer("");
    match result
    {   Err(Error::InvalidInput(_)) => {}
      , other => panic!("Expected InvalidInput, got {:?}", other)
    }
}

// ===== Completion Parameters =====

#[test]
fn test_completion_params_defaults()
{   let params = clova::CompletionParams::default();
    assert_eq!(params.max_tokens, 512);
    assert_eq!(params.temperature, 0.5);
    assert_eq!(params.top_k, 0);
    assert_eq!(params.top_p, 0.8);
    assert_eq!(params.repeat_penalty, 5.0);
    assert_eq!(params.start, "");
    assert_eq!(params.restart, "");
    assert!(params.stop_before.is_empty());
    assert!(params.include_tokens);
    assert!(params.include_ai_filters);
    assert!(!params.include_probs);
}

// ===== Response Body Mapping =====

#[test]
fn test_response_body_remote_rejection()
{   let body = r#"{
      "status": {"code": "42900", "message": "rate limited"}
    }"#;

    let result = clova::process_response_body(body, "prompt");
    assert_eq!(
      result,
      Err(Error::ApiError("rate limited".to_string()))
    );
}

#[test]
fn test_response_body_success_with_echo()
{   let messages = vec![Message::user("Hi")];
    let prompt_text = prompt::build_prompt(&messages);
    let text = format!("{}답변: Hello there\n", prompt_text);
    let body = serde_json::json!({
      "status": {"code": "20000", "message": "OK"},
      "result": {"text": text}
    }).to_string();

    let result
      = clova::process_response_body(&body, &prompt_text);
    assert_eq!(
      result,
      Ok(Message::assistant("Hello there"))
    );
}

#[test]
fn test_response_body_success_with_continuation()
{   // Model keeps going past the first turn; the trailing
    // question it invents is cut off
    let body = serde_json::json!({
      "status": {"code": "20000", "message": "OK"},
      "result": {
        "text": "답변: four\n질문: and 3+3?\n"
      }
    }).to_string();

    let result = clova::process_response_body(&body, "unused");
    assert_eq!(result, Ok(Message::assistant("four")));
}

#[test]
fn test_response_body_non_json()
{   let result
      = clova::process_response_body("<html>503</html>", "p");
    match result
    {   Err(Error::ParseError(_)) => {}
      , other => panic!("Expected ParseError, got {:?}", other)
    }
}

#[test]
fn test_response_body_success_without_result()
{   let body = r#"{
      "status": {"code": "20000", "message": "OK"}
    }"#;

    let result = clova::process_response_body(body, "p");
    match result
    {   Err(Error::ParseError(_)) => {}
      , other => panic!("Expected ParseError, got {:?}", other)
    }
}

// ===== Configuration =====

#[test]
fn test_config_completions_url()
{   let config = test_config();
    assert_eq!(
      config.completions_url(),
      "https://clovastudio.apigw.ntruss.com\
       /testapp/v1/completions/LK-D2"
    );
}

#[test]
fn test_config_from_env_requires_credentials()
{   // Only meaningful when the variable is absent; skip when the
    // environment carries real credentials
    if std::env::var("CLOVA_API_KEY").is_ok()
    {   println!("Skipping: CLOVA_API_KEY is set");
        return;
    }

    match ClovaConfig::from_env()
    {   Err(Error::MissingCredential(var)) => {
          assert_eq!(var, "CLOVA_API_KEY");
        }
      , other => panic!(
          "Expected MissingCredential, got {:?}", other
        )
    }
}

// ===== Conversation Store =====

#[test]
fn test_memory_store_round_trip()
{   let mut store = MemoryStore::new();
    assert!(store.get_messages(1).is_empty());

    store.put_message_list(1, vec![Message::user("a")]);
    store.put_message_list(1, vec![
      Message::assistant("b")
    , Message::user("c")
    ]);

    let messages = store.get_messages(1);
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0].content, "a");
    assert_eq!(messages[2].content, "c");

    // Per-user isolation
    assert!(store.get_messages(2).is_empty());
}

#[test]
fn test_memory_store_clear()
{   let mut store = MemoryStore::new();
    store.put_message_list(7, vec![Message::user("hi")]);
    store.clear_messages(7);
    assert!(store.get_messages(7).is_empty());
}

#[test]
fn test_window_keeps_newest()
{   let messages: Vec<Message> = (0..10)
      .map(|i| Message::user(format!("m{}", i)))
      .collect();

    let kept = store::window(messages.clone(), 4);
    assert_eq!(kept.len(), 4);
    assert_eq!(kept[0].content, "m6");
    assert_eq!(kept[3].content, "m9");

    let all = store::window(messages, 100);
    assert_eq!(all.len(), 10);
}

// ===== Relay Backend =====

#[tokio::test]
async fn test_backend_initialization()
{   let backend
      = clovarelay::relay::RelayBackend::new(test_config());
    println!("Backend created successfully");

    let result = backend.shutdown().await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_backend_new_chat_confirms()
{   let backend
      = clovarelay::relay::RelayBackend::new(test_config());

    let mut rx = backend.new_chat(42).await.unwrap();
    match rx.recv().await
    {   Some(Ok(text)) => {
          assert_eq!(text, "Let's do New Chat!");
        }
      , other => panic!("Unexpected reply: {:?}", other)
    }

    let _ = backend.shutdown().await;
}

#[tokio::test]
async fn test_backend_transport_error_is_apologetic()
{   // Unreachable endpoint: the reply must still arrive, as an
    // apology carrying the error detail, with nothing panicking
    let backend = clovarelay::relay::RelayBackend::new(
      unreachable_config()
    );

    let mut rx = backend
      .user_message(1, "Hi".to_string())
      .await
      .unwrap();

    match tokio::time::timeout(
      std::time::Duration::from_secs(30),
      rx.recv()
    ).await
    {   Ok(Some(Ok(text))) => {
          assert!(
            text.starts_with("Sorry, there is an error."),
            "Unexpected reply text: {}", text
          );
        }
      , Ok(other) => panic!("Unexpected reply: {:?}", other)
      , Err(_) => panic!("Timeout waiting for relay reply")
    }

    let _ = backend.shutdown().await;
}

#[tokio::test]
async fn test_backend_failed_turn_leaves_history_empty()
{   // A failed completion appends nothing, so a later /newchat
    // style reset still behaves and the loop keeps serving
    let backend = clovarelay::relay::RelayBackend::new(
      unreachable_config()
    );

    let mut rx = backend
      .user_message(5, "first".to_string())
      .await
      .unwrap();
    let _ = rx.recv().await;

    // Loop is still alive after the failure
    let mut rx = backend.new_chat(5).await.unwrap();
    assert!(matches!(rx.recv().await, Some(Ok(_))));

    let _ = backend.shutdown().await;
}

// ===== Live API (requires credentials) =====

#[tokio::test]
#[ignore]
async fn test_live_completion()
{   let config = match ClovaConfig::from_env()
    {   Ok(c) => c
      , Err(e) => {
          println!("Skipping: {}", e);
          return;
        }
    };

    let client
      = clovarelay::providers::clova::ClovaClient::new(config);
    let (reply_tx, mut reply_rx)
      = tokio::sync::mpsc::unbounded_channel();

    client
      .complete(
        vec![Message::user("오늘 날씨가 어때?")],
        clova::CompletionParams::default(),
        reply_tx
      )
      .await
      .unwrap();

    match tokio::time::timeout(
      std::time::Duration::from_secs(15),
      reply_rx.recv()
    ).await
    {   Ok(Some(Ok(answer))) => {
          println!("Response: {}", answer.content);
          assert_eq!(answer.role, Role::Assistant);
          assert!(!answer.content.is_empty());
        }
      , Ok(Some(Err(e))) => {
          println!("API Error: {}", e);
        }
      , Ok(None) => {
          println!("Channel closed");
        }
      , Err(_) => {
          println!("Timeout waiting for response");
        }
    }

    let _ = client.shutdown().await;
}
