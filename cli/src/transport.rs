//! Executes core `HttpRequest`s with ureq.
//!
//! ureq is blocking, so each request runs on tokio's blocking pool and the
//! shell's single-threaded runtime stays responsive.

use todo_client_core::{HttpMethod, HttpRequest, HttpResponse, Transport, TransportError};

#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        // Status codes are data for the core parser, not transport errors.
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UreqTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let agent = self.agent.clone();
        tokio::task::spawn_blocking(move || execute_blocking(&agent, request))
            .await
            .map_err(|e| TransportError(e.to_string()))?
    }
}

fn with_headers<B>(
    mut builder: ureq::RequestBuilder<B>,
    headers: &[(String, String)],
) -> ureq::RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

fn execute_blocking(agent: &ureq::Agent, request: HttpRequest) -> Result<HttpResponse, TransportError> {
    let body = request.body.unwrap_or_default();
    let result = match request.method {
        HttpMethod::Get => with_headers(agent.get(&request.path), &request.headers).call(),
        HttpMethod::Delete => with_headers(agent.delete(&request.path), &request.headers).call(),
        HttpMethod::Post => {
            with_headers(agent.post(&request.path), &request.headers).send(body.as_bytes())
        }
        HttpMethod::Put => with_headers(agent.put(&request.path), &request.headers).send(body.as_bytes()),
    };
    let mut response = result.map_err(|e| TransportError(e.to_string()))?;

    let status = response.status().as_u16();
    let headers = response
        .headers()
        .iter()
        .filter_map(|(name, value)| Some((name.as_str().to_string(), value.to_str().ok()?.to_string())))
        .collect();
    let body = response
        .body_mut()
        .read_to_string()
        .map_err(|e| TransportError(e.to_string()))?;

    Ok(HttpResponse { status, headers, body })
}
