// Tests for the fuzzing engine against a mock target

use formprobe_core::{Category, FuzzOptions, Payload, Vulnerability, default_payloads, execute_fuzz};
use formprobe_scanner::{Field, Form, Method};
use std::time::Duration;
use wiremock::matchers::{body_string, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn text_field(name: &str) -> Field {
    Field {
        tag: "input".to_string(),
        field_type: "text".to_string(),
        name: name.to_string(),
    }
}

// ============================================================================
// Classification through real responses
// ============================================================================

#[tokio::test]
async fn test_sql_error_on_login_post_is_reported() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/login"))
        .and(body_string("user=%27+OR+%271%27%3D%271"))
        .respond_with(
            ResponseTemplate::new(500).set_body_string("You have an error in your SQL syntax"),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Invalid credentials"))
        .mount(&server)
        .await;

    let action = format!("{}/login", server.uri());
    let forms = vec![Form::new(action.clone(), Method::Post, vec![text_field("user")])];
    let payloads = default_payloads();
    let total = payloads.len();

    let outcome = execute_fuzz(FuzzOptions::new(forms, payloads)).await.unwrap();

    assert_eq!(outcome.attempts.len(), total);
    assert_eq!(
        outcome.vulnerabilities,
        vec![Vulnerability {
            category: Category::Sqli,
            payload: "' OR '1'='1".to_string(),
            form_action: action.clone(),
            status: 500,
        }]
    );

    let hit = outcome
        .attempts
        .iter()
        .find(|a| a.payload == "' OR '1'='1")
        .unwrap();
    assert_eq!(hit.outcome, "sql injection found");
    assert_eq!(hit.status, Some(500));
    assert!(
        outcome
            .attempts
            .iter()
            .filter(|a| a.payload != "' OR '1'='1")
            .all(|a| a.outcome == "no vulnerability")
    );
}

#[tokio::test]
async fn test_get_form_sends_query_and_detects_reflection() {
    let server = MockServer::start().await;
    let payload = "<script>alert('XSS')</script>";

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", payload))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(format!("<p>Results for {}</p>", payload)),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<p>No results</p>"))
        .mount(&server)
        .await;

    let action = format!("{}/search", server.uri());
    let forms = vec![Form::new(action.clone(), Method::Get, vec![text_field("q")])];
    let payloads = vec![
        Payload::new(payload, Category::Xss),
        Payload::new("<svg/onload=alert('XSS')>", Category::Xss),
    ];

    let outcome = execute_fuzz(FuzzOptions::new(forms, payloads)).await.unwrap();

    assert_eq!(outcome.attempts.len(), 2);
    assert_eq!(outcome.vulnerabilities.len(), 1);
    assert_eq!(outcome.vulnerabilities[0].category, Category::Xss);
    assert_eq!(outcome.vulnerabilities[0].payload, payload);
    assert_eq!(outcome.vulnerabilities[0].form_action, action);
}

#[tokio::test]
async fn test_non_injectable_fields_get_placeholder() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/subscribe"))
        .and(body_string("email=admin%27+--&consent=test"))
        .respond_with(ResponseTemplate::new(200).set_body_string("thanks"))
        .expect(1)
        .mount(&server)
        .await;

    let forms = vec![Form::new(
        format!("{}/subscribe", server.uri()),
        Method::Post,
        vec![
            Field {
                tag: "input".to_string(),
                field_type: "email".to_string(),
                name: "email".to_string(),
            },
            Field {
                tag: "input".to_string(),
                field_type: "checkbox".to_string(),
                name: "consent".to_string(),
            },
        ],
    )];

    let outcome = execute_fuzz(FuzzOptions::new(
        forms,
        vec![Payload::new("admin' --", Category::Sqli)],
    ))
    .await
    .unwrap();

    assert_eq!(outcome.attempts[0].outcome, "no vulnerability");
}

// ============================================================================
// Failure handling and scheduling
// ============================================================================

#[tokio::test]
async fn test_unreachable_target_still_yields_every_attempt() {
    let forms = vec![
        Form::new("http://127.0.0.1:9/a".to_string(), Method::Post, vec![text_field("x")]),
        Form::new("http://127.0.0.1:9/b".to_string(), Method::Get, vec![text_field("y")]),
    ];
    let payloads = default_payloads();
    let expected = forms.len() * payloads.len();

    let outcome = execute_fuzz(
        FuzzOptions::new(forms, payloads).with_timeout(Duration::from_secs(2)),
    )
    .await
    .unwrap();

    assert_eq!(outcome.attempts.len(), expected);
    assert!(outcome.vulnerabilities.is_empty());
    assert!(
        outcome
            .attempts
            .iter()
            .all(|a| a.outcome.starts_with("request failed: ") && a.status.is_none())
    );
}

#[tokio::test]
async fn test_in_flight_requests_never_exceed_concurrency() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("ok")
                .set_delay(Duration::from_millis(50)),
        )
        .mount(&server)
        .await;

    let forms: Vec<Form> = (0..4)
        .map(|i| {
            Form::new(
                format!("{}/form{}", server.uri(), i),
                Method::Post,
                vec![text_field("v")],
            )
        })
        .collect();
    let payloads = default_payloads();
    let expected = forms.len() * payloads.len();

    let outcome = execute_fuzz(FuzzOptions::new(forms, payloads).with_concurrency(3))
        .await
        .unwrap();

    assert_eq!(outcome.attempts.len(), expected);
    assert!(outcome.peak_in_flight >= 1);
    assert!(outcome.peak_in_flight <= 3, "peak was {}", outcome.peak_in_flight);
}

#[tokio::test]
async fn test_duplicate_forms_are_each_fuzzed() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(4)
        .mount(&server)
        .await;

    let form = Form::new(
        format!("{}/login", server.uri()),
        Method::Post,
        vec![text_field("user")],
    );
    let payloads = vec![
        Payload::new("' OR '1'='1", Category::Sqli),
        Payload::new("<svg/onload=alert('XSS')>", Category::Xss),
    ];

    let outcome = execute_fuzz(FuzzOptions::new(vec![form.clone(), form], payloads))
        .await
        .unwrap();

    assert_eq!(outcome.attempts.len(), 4);
}
