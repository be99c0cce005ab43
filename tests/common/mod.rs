#![allow(dead_code)]

// crates.io
use httpmock::MockServer;
// self
use bearer_relay::{
	_preludet::*,
	client::AuthenticatedClient,
	config::{DomainConfig, DomainConfigBuilder, RefreshEndpoint},
	store::{KeyValueStore, MemoryStorage},
	transport::ReqwestTransport,
};

pub type Client = AuthenticatedClient<ReqwestTransport>;

pub fn domain(builder: DomainConfigBuilder, server: &MockServer) -> DomainConfig {
	builder
		.base_url(Url::parse(&server.url("/")).expect("Mock base URL should parse."))
		.refresh_endpoint(RefreshEndpoint::new(
			Url::parse(&server.url("/auth/refresh")).expect("Mock refresh URL should parse."),
		))
		.build()
		.expect("Domain config should build against the mock server.")
}

pub fn client_with_storage(
	config: DomainConfig,
	storage: Arc<dyn KeyValueStore>,
) -> (Client, RecordingListener) {
	let listener = RecordingListener::default();
	let client = AuthenticatedClient::new(config, storage, Arc::new(listener.clone()))
		.expect("Reqwest-backed client should build.");

	(client, listener)
}

pub fn client(config: DomainConfig) -> (Client, RecordingListener) {
	client_with_storage(config, Arc::new(MemoryStorage::default()))
}
