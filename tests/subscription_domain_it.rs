mod common;

// crates.io
use httpmock::prelude::*;
// self
use bearer_relay::{
	_preludet::*,
	config::{DomainConfigBuilder, RefreshEndpoint},
	error::RenewalError,
	token::TokenSecret,
};
use common::{client, domain};

#[tokio::test]
async fn rejected_requests_replay_after_one_renewal() {
	let server = MockServer::start_async().await;
	let revoked = jwt_expiring_in(Duration::hours(1), "revoked");
	let renewed = jwt_expiring_in(Duration::hours(1), "renewed");
	let (client, listener) = client(domain(DomainConfigBuilder::subscription(), &server));
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/auth/refresh")
				.json_body(serde_json::json!({ "refresh_token": "refresh-1" }));
			then.status(200)
				.delay(std::time::Duration::from_millis(100))
				.json_body(serde_json::json!({ "access_token": renewed }));
		})
		.await;
	let rejected = server
		.mock_async(|when, then| {
			when.method(GET).path("/plans").header("authorization", format!("Bearer {revoked}"));
			then.status(401);
		})
		.await;
	let accepted = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/plans")
				.header("authorization", format!("Bearer {renewed}"))
				.header_missing("refresh");
			then.status(200).json_body(serde_json::json!({ "plans": ["basic"] }));
		})
		.await;

	client.sign_in(revoked.clone(), "refresh-1");

	let results = tokio::join!(client.get("plans"), client.get("plans"), client.get("plans"));

	for result in [results.0, results.1, results.2] {
		assert!(result.expect("Every replay should succeed.").is_success());
	}

	refresh.assert_calls_async(1).await;
	rejected.assert_calls_async(3).await;
	accepted.assert_calls_async(3).await;

	let tokens = client.tokens();

	assert_eq!(tokens.access_token.as_ref().map(TokenSecret::expose), Some(renewed.as_str()));
	assert_eq!(tokens.refresh_token.as_ref().map(TokenSecret::expose), Some("refresh-1"));
	assert_eq!(listener.count(), 0);
	assert_eq!(client.manager().queued_replays(), 0);
}

#[tokio::test]
async fn renewal_failure_rejects_queued_requests() {
	let server = MockServer::start_async().await;
	let (client, listener) = client(domain(DomainConfigBuilder::subscription(), &server));
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh");
			then.status(401).delay(std::time::Duration::from_millis(100)).body("expired");
		})
		.await;
	let plans = server
		.mock_async(|when, then| {
			when.method(GET).path("/plans");
			then.status(401);
		})
		.await;

	client.sign_in(jwt_expiring_in(Duration::hours(1), "user"), "refresh-1");

	let results = tokio::join!(client.get("plans"), client.get("plans"), client.get("plans"));
	let expected = RenewalError::Rejected { status: 401, body_preview: "expired".into() };

	for result in [results.0, results.1, results.2] {
		let err = result.expect_err("Queued requests should fail with the renewal error.");

		assert_eq!(err.as_renewal(), Some(&expected));
	}

	refresh.assert_calls_async(1).await;
	plans.assert_calls_async(3).await;
	assert!(client.tokens().is_empty());
	assert_eq!(listener.count(), 1);
}

#[tokio::test]
async fn guest_rejection_is_not_replayed() {
	let server = MockServer::start_async().await;
	let (client, listener) = client(domain(DomainConfigBuilder::subscription(), &server));
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh");
			then.status(500);
		})
		.await;

	server
		.mock_async(|when, then| {
			when.method(GET).path("/plans");
			then.status(401);
		})
		.await;

	let err = client.get("plans").await.expect_err("A guest 401 is terminal.");

	assert!(matches!(err, Error::Unauthorized { status: 401 }));
	refresh.assert_calls_async(0).await;
	assert_eq!(listener.count(), 0);
}

#[tokio::test]
async fn custom_token_field_is_sent_to_refresh_endpoint() {
	let server = MockServer::start_async().await;
	let renewed = jwt_expiring_in(Duration::hours(1), "user");
	let config = DomainConfigBuilder::subscription()
		.base_url(Url::parse(&server.url("/")).expect("Mock base URL should parse."))
		.refresh_endpoint(
			RefreshEndpoint::new(
				Url::parse(&server.url("/token/refresh")).expect("Mock refresh URL should parse."),
			)
			.with_token_field("refreshToken"),
		)
		.build()
		.expect("Subscription config should build.");
	let (client, _) = client(config);
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/token/refresh")
				.json_body(serde_json::json!({ "refreshToken": "refresh-1" }));
			then.status(200).json_body(serde_json::json!({
				"access_token": renewed,
				"refresh_token": "refresh-2",
			}));
		})
		.await;

	server
		.mock_async(|when, then| {
			when.method(GET).path("/plans");
			then.status(200);
		})
		.await;

	client.sign_in(jwt_expiring_in(Duration::seconds(2), "user"), "refresh-1");
	client.get("plans").await.expect("Pre-flight renewal should succeed.");

	refresh.assert_calls_async(1).await;
	assert_eq!(
		client.tokens().refresh_token.as_ref().map(TokenSecret::expose),
		Some("refresh-2")
	);
}
