//! HTTP [`ModuleClient`] over reqwest.
//!
//! Resolves the instance URL through [`Discovery`] and relays the call
//! verbatim.  Non-2xx answers are responses; only failing to get an answer
//! is a [`TransportError`].

use super::discovery::Discovery;
use async_trait::async_trait;
use okapi_kernel::{
    GatewayError, GatewayResult, Headers, HttpMethod, ModuleCall, ModuleClient, ModuleResponse,
    TransportError,
};
use reqwest::{Client, Method};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

pub struct HttpModuleClient {
    client: Client,
    discovery: Arc<Discovery>,
    timeout: Duration,
}

impl HttpModuleClient {
    pub fn new(discovery: Arc<Discovery>, timeout: Duration) -> GatewayResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            discovery,
            timeout,
        })
    }
}

fn method(m: HttpMethod) -> Method {
    match m {
        HttpMethod::Get => Method::GET,
        HttpMethod::Head => Method::HEAD,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
        HttpMethod::Options => Method::OPTIONS,
        _ => Method::GET,
    }
}

#[async_trait]
impl ModuleClient for HttpModuleClient {
    #[instrument(skip(self, call), fields(module = %call.module_id, uri = %call.uri))]
    async fn call(&self, call: ModuleCall) -> Result<ModuleResponse, TransportError> {
        let base = self
            .discovery
            .url_for(&call.module_id)
            .ok_or(TransportError::NoInstance)?;
        let url = format!("{base}{}", call.uri);
        debug!(url = %url, "forwarding to module");

        let mut builder = self.client.request(method(call.method), &url);
        for (name, value) in &call.headers {
            if name == "host" || name == "content-length" {
                continue;
            }
            builder = builder.header(name, value);
        }
        if !call.body.is_empty() {
            builder = builder.body(call.body);
        }

        let upstream = builder.send().await.map_err(|e| self.transport_error(e))?;
        let status = upstream.status().as_u16();
        let mut headers = Headers::new();
        for (name, value) in upstream.headers() {
            if let Ok(v) = value.to_str() {
                headers.insert(name.as_str().to_string(), v.to_string());
            }
        }
        let body = upstream.bytes().await.map_err(|e| self.transport_error(e))?;

        Ok(ModuleResponse {
            status,
            headers,
            body: body.to_vec(),
        })
    }
}

impl HttpModuleClient {
    fn transport_error(&self, err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout(u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX))
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else {
            TransportError::Other(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use okapi_kernel::{ModuleId, ProxyType};

    #[tokio::test]
    async fn unknown_instance_is_reported() {
        let client = HttpModuleClient::new(Arc::new(Discovery::new()), Duration::from_secs(1)).unwrap();
        let call = ModuleCall {
            module_id: ModuleId::parse("ghost-1.0.0").unwrap(),
            proxy_type: ProxyType::RequestResponse,
            method: HttpMethod::Get,
            uri: "/ghost".into(),
            headers: Headers::new(),
            body: Vec::new(),
        };
        assert_eq!(client.call(call).await.unwrap_err(), TransportError::NoInstance);
    }

    #[test]
    fn methods_map_one_to_one() {
        assert_eq!(method(HttpMethod::Patch), Method::PATCH);
        assert_eq!(method(HttpMethod::Options), Method::OPTIONS);
    }
}
