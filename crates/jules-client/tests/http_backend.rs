use futures::StreamExt;
use jules_client::HttpBackend;
use jules_session::{
    BackendError, ChatBackend, ChatReply, ChatRequest, ChatSession, MessageId, ReplyFrame,
    SessionOptions, SubmitOutcome, UploadFile,
};
use mockito::Matcher;
use serde_json::json;
use std::sync::Arc;
use tokio_test::assert_ok;

fn request(parent: Option<&str>) -> ChatRequest {
    ChatRequest {
        prompt: "Bonjour".to_string(),
        session_id: "session-test".to_string(),
        parent_message_id: parent.map(MessageId::from),
    }
}

async fn collect_frames(reply: ChatReply) -> Vec<ReplyFrame> {
    let ChatReply::Streamed(mut frames) = reply else {
        panic!("expected a streamed reply, got {:?}", reply);
    };
    let mut collected = Vec::new();
    while let Some(frame) = frames.next().await {
        collected.push(frame.unwrap());
    }
    collected
}

#[tokio::test]
async fn test_chat_request_body() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/chat")
        .match_header("content-type", "application/json")
        .match_body(Matcher::Json(json!({
            "prompt": "Bonjour",
            "session_id": "session-test",
            "parent_message_id": "m1"
        })))
        .with_status(200)
        .with_header("content-type", "text/plain; charset=utf-8")
        .with_body("Salut")
        .create_async()
        .await;

    let backend = HttpBackend::new(server.url(), None).unwrap();
    let reply = backend.send_chat(&request(Some("m1"))).await.unwrap();
    assert_eq!(collect_frames(reply).await, vec![ReplyFrame::text("Salut")]);

    mock.assert_async().await;
}

#[tokio::test]
async fn test_chat_sentinel_body() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/api/chat")
        .with_status(200)
        .with_header("content-type", "text/plain")
        .with_body("__IDS__::u1::m1")
        .create_async()
        .await;

    let backend = HttpBackend::new(server.url(), None).unwrap();
    let reply = backend.send_chat(&request(None)).await.unwrap();
    assert_eq!(
        collect_frames(reply).await,
        vec![ReplyFrame::identity("u1", "m1")]
    );
}

#[tokio::test]
async fn test_chat_buffered_json() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/api/chat")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"reply":"Paris","session_id":"session-test"}"#)
        .create_async()
        .await;

    let backend = HttpBackend::new(server.url(), None).unwrap();
    match backend.send_chat(&request(None)).await.unwrap() {
        ChatReply::Buffered(reply) => {
            assert_eq!(reply.reply, "Paris");
            assert_eq!(reply.session_id, "session-test");
        }
        other => panic!("expected buffered reply, got {:?}", other),
    }
}

#[tokio::test]
async fn test_chat_malformed_json_is_decode_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/api/chat")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("{not json")
        .create_async()
        .await;

    let backend = HttpBackend::new(server.url(), None).unwrap();
    let err = backend.send_chat(&request(None)).await.unwrap_err();
    assert!(matches!(err, BackendError::Decode(_)));
    assert!(err.responded());
}

#[tokio::test]
async fn test_chat_status_with_detail() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/api/chat")
        .with_status(500)
        .with_header("content-type", "application/json")
        .with_body(r#"{"detail":"boom"}"#)
        .create_async()
        .await;

    let backend = HttpBackend::new(server.url(), None).unwrap();
    let err = backend.send_chat(&request(None)).await.unwrap_err();
    assert_eq!(err, BackendError::status(500, "boom"));
    assert!(err.responded());
}

#[tokio::test]
async fn test_chat_status_without_detail() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/api/chat")
        .with_status(503)
        .create_async()
        .await;

    let backend = HttpBackend::new(server.url(), None).unwrap();
    let err = backend.send_chat(&request(None)).await.unwrap_err();
    assert_eq!(err, BackendError::status(503, "Service Unavailable"));
}

#[tokio::test]
async fn test_connection_refused_is_transport_error() {
    // Nothing listens on port 1
    let backend = HttpBackend::new("http://127.0.0.1:1", None).unwrap();
    let err = backend.send_chat(&request(None)).await.unwrap_err();
    assert!(matches!(err, BackendError::Transport(_)));
    assert!(!err.responded());
}

#[tokio::test]
async fn test_upload_multipart() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/upload")
        .match_header(
            "content-type",
            Matcher::Regex("^multipart/form-data; boundary=.+".to_string()),
        )
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex(r#"name="file"; filename="notes.txt""#.to_string()),
            Matcher::Regex("Content-Type: text/plain".to_string()),
            Matcher::Regex("contenu du fichier".to_string()),
        ]))
        .with_status(200)
        .with_body(r#"{"status":"ok"}"#)
        .create_async()
        .await;

    let backend = HttpBackend::new(server.url(), None).unwrap();
    let file = UploadFile::new("notes.txt", "text/plain", b"contenu du fichier".to_vec());
    assert_ok!(backend.upload(&file).await);

    mock.assert_async().await;
}

#[tokio::test]
async fn test_upload_failure_detail() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/api/upload")
        .with_status(413)
        .with_header("content-type", "application/json")
        .with_body(r#"{"detail":"Fichier trop volumineux"}"#)
        .create_async()
        .await;

    let backend = HttpBackend::new(server.url(), None).unwrap();
    let file = UploadFile::new("doc.pdf", "application/pdf", vec![0u8; 16]);
    assert_eq!(
        backend.upload(&file).await,
        Err(BackendError::status(413, "Fichier trop volumineux"))
    );
}

#[tokio::test]
async fn test_health_check() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/")
        .with_status(200)
        .with_body(r#"{"message":"Jules API"}"#)
        .create_async()
        .await;

    let backend = HttpBackend::new(server.url(), None).unwrap();
    assert_ok!(backend.health_check().await);
}

#[tokio::test]
async fn test_session_over_http() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/api/chat")
        .with_status(200)
        .with_header("content-type", "text/plain")
        .with_body("Réponse en un seul morceau")
        .create_async()
        .await;

    let backend = HttpBackend::new(server.url(), None).unwrap();
    let session = ChatSession::new(Arc::new(backend), SessionOptions::default());

    let outcome = session.submit("Question").await;
    assert!(matches!(outcome, SubmitOutcome::Completed { .. }));
    assert_eq!(
        session.last_message().unwrap().parts,
        "Réponse en un seul morceau"
    );
}
