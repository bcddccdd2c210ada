use std::time::Duration;

/// Builds the single pooled client shared by every outbound call the
/// gateway makes: chained-OAuth code exchange, refresh, and the MCP
/// forwarder. One client, built once — mirrors `CouchDbClient::new`'s
/// "build a `Client` once, clone the struct, never the connection pool".
pub fn build() -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()
        .expect("reqwest client with no custom TLS config should always build")
}
