//! Demonstrates two independent token domains sharing one storage backend: the primary API
//! renews opaque tokens before each request, while the subscription service replays a
//! rejected call after renewal.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use time::Duration;
use url::Url;
// self
use bearer_relay::{
	client::AuthenticatedClient,
	config::{DomainConfigBuilder, RefreshEndpoint},
	notify::RenewalFailed,
	store::MemoryStorage,
	token::TokenUpdate,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let storage = Arc::new(MemoryStorage::default());
	let listener = Arc::new(|event: &RenewalFailed| {
		println!("Domain `{}` signed out: {:?}.", event.domain, event.cause);
	});
	let primary_refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/auth/refresh");
			then.status(200).json_body(serde_json::json!({
				"access_token": "primary-access-2",
				"refresh_token": "primary-refresh-2",
				"expires_in": 900,
			}));
		})
		.await;
	let bookings = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/api/bookings")
				.header("authorization", "Bearer primary-access-2")
				.header("refresh", "Bearer primary-refresh-2");
			then.status(200).json_body(serde_json::json!([{ "id": 42 }]));
		})
		.await;
	let subscription_refresh = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/subscriptions/token/refresh")
				.json_body(serde_json::json!({ "refreshToken": "sub-refresh" }));
			then.status(200).json_body(serde_json::json!({
				"access_token": "sub-access-2",
				"expires_in": 900,
			}));
		})
		.await;

	server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/subscriptions/plans")
				.header("authorization", "Bearer sub-access-1");
			then.status(401);
		})
		.await;

	let plans = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/subscriptions/plans")
				.header("authorization", "Bearer sub-access-2");
			then.status(200).json_body(serde_json::json!({ "plans": ["basic", "pro"] }));
		})
		.await;
	let primary = AuthenticatedClient::new(
		DomainConfigBuilder::primary()
			.base_url(Url::parse(&server.url("/api/"))?)
			.refresh_endpoint(RefreshEndpoint::new(Url::parse(&server.url("/api/auth/refresh"))?))
			.build()?,
		storage.clone(),
		listener.clone(),
	)?;
	let subscription = AuthenticatedClient::new(
		DomainConfigBuilder::subscription()
			.base_url(Url::parse(&server.url("/subscriptions/"))?)
			.refresh_endpoint(
				RefreshEndpoint::new(Url::parse(&server.url("/subscriptions/token/refresh"))?)
					.with_token_field("refreshToken"),
			)
			.build()?,
		storage.clone(),
		listener,
	)?;
	let _primary_scheduler = primary.spawn_scheduler();
	let _subscription_scheduler = subscription.spawn_scheduler();

	// Opaque tokens without a lifetime hint are renewed before their first use.
	primary.sign_in("primary-access-1", "primary-refresh-1");
	// This one looks valid for 15 minutes, but the server has already revoked it.
	subscription.manager().store().apply(
		TokenUpdate::access("sub-access-1")
			.with_refresh("sub-refresh")
			.with_expires_in(Duration::minutes(15)),
	);

	let response = primary.get("bookings").await?;

	println!("Primary bookings: {}.", response.body_preview(80));

	let response = subscription.get("plans").await?;

	println!("Subscription plans: {}.", response.body_preview(80));
	primary.manager().store().flush().await;
	subscription.manager().store().flush().await;

	println!("Shared storage now holds {} entries.", storage.snapshot().len());

	primary_refresh.assert_async().await;
	bookings.assert_async().await;
	subscription_refresh.assert_async().await;
	plans.assert_async().await;

	Ok(())
}
