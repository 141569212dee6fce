//! Twilio REST client against a local fake of the Twilio API.

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::routing::post;
use axum::Router;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use callbridge_voice::{BridgeError, CallControl, Messaging, TwilioClient, TwilioConfig};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
struct Recorded {
    path: String,
    authorization: Option<String>,
    form: HashMap<String, String>,
}

#[derive(Clone)]
struct FakeTwilio {
    status: StatusCode,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

async fn record(
    State(fake): State<FakeTwilio>,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, &'static str) {
    let form = url::form_urlencoded::parse(body.as_bytes())
        .into_owned()
        .collect();
    fake.requests.lock().unwrap().push(Recorded {
        path: uri.path().to_string(),
        authorization: headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        form,
    });
    (fake.status, r#"{"sid":"SM1"}"#)
}

async fn start(status: StatusCode) -> (TwilioClient, FakeTwilio) {
    let fake = FakeTwilio {
        status,
        requests: Arc::default(),
    };
    let app = Router::new()
        .route("/{*rest}", post(record))
        .with_state(fake.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });

    let client = TwilioClient::new(TwilioConfig {
        api_base: format!("http://{addr}/"),
        account_sid: "AC123".to_string(),
        auth_token: "secret".to_string(),
        sms_from: "+81500000000".to_string(),
        public_base_url: "https://calls.example.test/base".to_string(),
        ..TwilioConfig::default()
    })
    .expect("client");
    (client, fake)
}

fn expected_auth() -> String {
    format!("Basic {}", STANDARD.encode("AC123:secret"))
}

#[tokio::test]
async fn redirect_points_the_live_call_at_the_handoff_twiml() {
    let (client, fake) = start(StatusCode::OK).await;

    client.redirect("CA42", "+81355550000").await.expect("redirect");

    let requests = fake.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.path, "/2010-04-01/Accounts/AC123/Calls/CA42.json");
    assert_eq!(request.authorization.as_deref(), Some(expected_auth().as_str()));
    assert_eq!(
        request.form.get("Url").map(String::as_str),
        Some("https://calls.example.test/twilio/bridge_twiml?number=%2B81355550000")
    );
    assert_eq!(request.form.get("Method").map(String::as_str), Some("POST"));
}

#[tokio::test]
async fn message_is_sent_from_the_configured_number() {
    let (client, fake) = start(StatusCode::CREATED).await;

    client
        .send_message("+81311112222", "Clinic info: map")
        .await
        .expect("send");

    let requests = fake.requests.lock().unwrap();
    let request = &requests[0];
    assert_eq!(request.path, "/2010-04-01/Accounts/AC123/Messages.json");
    assert_eq!(request.form.get("From").map(String::as_str), Some("+81500000000"));
    assert_eq!(request.form.get("To").map(String::as_str), Some("+81311112222"));
    assert_eq!(
        request.form.get("Body").map(String::as_str),
        Some("Clinic info: map")
    );
}

#[tokio::test]
async fn error_status_becomes_a_collaborator_error() {
    let (client, fake) = start(StatusCode::BAD_REQUEST).await;

    let err = client
        .redirect("CA42", "+81355550000")
        .await
        .expect_err("must fail");
    match err {
        BridgeError::Collaborator(message) => assert!(message.contains("400"), "{message}"),
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(fake.requests.lock().unwrap().len(), 1);
}
