use std::time::Duration;
use url::Url;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{header, method, path, query_param},
};
use wx_influx_forwarder::sender::{
    ClientConfig, Credentials, DatabaseProvisioner, HttpClient, ProvisionError,
};

fn client(server: &MockServer, credentials: Option<Credentials>) -> HttpClient {
    let mut config = ClientConfig::new(Url::parse(&server.uri()).unwrap(), "weewx");
    config.credentials = credentials;
    HttpClient::new(config).unwrap()
}

#[tokio::test]
async fn test_create_database_with_admin_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .and(query_param("q", "CREATE DATABASE \"weewx\""))
        // admin:secret
        .and(header("authorization", "Basic YWRtaW46c2VjcmV0"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(r#"{"results":[{"statement_id":0}]}"#),
        )
        .expect(1)
        .mount(&server)
        .await;

    let provisioner = DatabaseProvisioner::new(
        client(&server, Some(Credentials::new("writer", "pw"))),
        Some(Credentials::new("admin", "secret")),
        Duration::from_secs(2),
    );
    provisioner.ensure_database().await.unwrap();
}

#[tokio::test]
async fn test_falls_back_to_write_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query"))
        // writer:pw
        .and(header("authorization", "Basic d3JpdGVyOnB3"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"results":[{}]}"#))
        .expect(1)
        .mount(&server)
        .await;

    let provisioner = DatabaseProvisioner::new(
        client(&server, Some(Credentials::new("writer", "pw"))),
        None,
        Duration::from_secs(2),
    );
    assert_eq!(provisioner.credentials().unwrap().username, "writer");
    provisioner.ensure_database().await.unwrap();
}

#[tokio::test]
async fn test_already_exists_is_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"results":[{"statement_id":0,"error":"database already exists"}]}"#,
        ))
        .mount(&server)
        .await;

    let provisioner = DatabaseProvisioner::new(client(&server, None), None, Duration::from_secs(2));
    assert!(provisioner.ensure_database().await.is_ok());
}

#[tokio::test]
async fn test_unauthorized_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(
            ResponseTemplate::new(403)
                .set_body_string(r#"{"error":"requires admin privilege"}"#),
        )
        .mount(&server)
        .await;

    let provisioner = DatabaseProvisioner::new(client(&server, None), None, Duration::from_secs(2));
    let err = provisioner.ensure_database().await.unwrap_err();
    assert_eq!(
        err,
        ProvisionError::Rejected {
            status: 403,
            message: "requires admin privilege".to_string(),
        }
    );
}

#[tokio::test]
async fn test_statement_error_in_ok_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"results":[{"statement_id":0,"error":"invalid database name"}]}"#,
        ))
        .mount(&server)
        .await;

    let provisioner = DatabaseProvisioner::new(client(&server, None), None, Duration::from_secs(2));
    assert!(matches!(
        provisioner.ensure_database().await,
        Err(ProvisionError::Query(_))
    ));
}

#[tokio::test]
async fn test_slow_server_hits_provision_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let timeout = Duration::from_millis(200);
    let provisioner = DatabaseProvisioner::new(client(&server, None), None, timeout);

    let started = std::time::Instant::now();
    let result = provisioner.ensure_database().await;
    assert_eq!(result, Err(ProvisionError::Timeout(timeout)));
    assert!(started.elapsed() < Duration::from_secs(2));
}
