//! Scripted transport for exercising the gateway without a network

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use serde_json::Value;
use std::time::Duration;

use super::transport::{HttpRequest, HttpResponse, Transport, TransportError};

struct Route {
    method: Method,
    path: String,
    reply: Result<HttpResponse, TransportError>,
    delay: Duration,
}

/// Answers requests from a table of routes matched on method and URL suffix
///
/// The most recently added matching route wins, so tests can override an
/// earlier reply. Unmatched requests fail as connection errors.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, method: Method, path: &str, status: u16, body: Value) -> &Self {
        self.respond_full(method, path, status, body, &[], Duration::ZERO)
    }

    pub fn respond_with_header(
        &self,
        method: Method,
        path: &str,
        status: u16,
        body: Value,
        header: (&str, &str),
    ) -> &Self {
        self.respond_full(method, path, status, body, &[header], Duration::ZERO)
    }

    pub fn respond_after(
        &self,
        method: Method,
        path: &str,
        delay: Duration,
        status: u16,
        body: Value,
    ) -> &Self {
        self.respond_full(method, path, status, body, &[], delay)
    }

    pub fn fail(&self, method: Method, path: &str, error: TransportError) -> &Self {
        self.routes.lock().push(Route {
            method,
            path: path.to_string(),
            reply: Err(error),
            delay: Duration::ZERO,
        });
        self
    }

    fn respond_full(
        &self,
        method: Method,
        path: &str,
        status: u16,
        body: Value,
        headers: &[(&str, &str)],
        delay: Duration,
    ) -> &Self {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            map.insert(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        self.routes.lock().push(Route {
            method,
            path: path.to_string(),
            reply: Ok(HttpResponse {
                status,
                headers: map,
                body,
            }),
            delay,
        });
        self
    }

    /// Every request that reached the transport, in arrival order
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    pub fn calls_to(&self, method: Method, path: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.method == method && r.url.ends_with(&format!("/{path}")))
            .count()
    }

    pub fn last_request(&self) -> HttpRequest {
        self.requests
            .lock()
            .last()
            .cloned()
            .expect("no request was dispatched")
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().push(request.clone());

        let matched = {
            let routes = self.routes.lock();
            routes
                .iter()
                .rev()
                .find(|route| {
                    route.method == request.method
                        && request.url.ends_with(&format!("/{}", route.path))
                })
                .map(|route| (route.reply.clone(), route.delay))
        };

        match matched {
            Some((reply, delay)) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                reply
            },
            None => Err(TransportError::Connect(format!(
                "no scripted route for {} {}",
                request.method, request.url
            ))),
        }
    }
}
