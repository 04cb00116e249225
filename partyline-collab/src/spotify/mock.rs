use std::{collections::VecDeque, sync::Arc};

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Method;

use super::{HttpRequest, HttpResponse, HttpTransport, TransportError};

type Scripted = Result<HttpResponse, TransportError>;

/// A transport that answers with scripted responses and records every request
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<Vec<(Method, String, VecDeque<Scripted>)>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queues a response for the next request matching the method and url suffix
    pub fn on(&self, method: Method, suffix: &str, status: u16, body: &str) {
        self.script(
            method,
            suffix,
            Ok(HttpResponse {
                status,
                body: body.to_string(),
            }),
        )
    }

    /// Queues a connection failure for the next request matching the method and url suffix
    pub fn fail(&self, method: Method, suffix: &str, message: &str) {
        self.script(method, suffix, Err(TransportError(message.to_string())))
    }

    fn script(&self, method: Method, suffix: &str, response: Scripted) {
        let mut routes = self.routes.lock();

        match routes
            .iter_mut()
            .find(|(m, s, _)| *m == method && s == suffix)
        {
            Some((_, _, queue)) => queue.push_back(response),
            None => routes.push((method, suffix.to_string(), VecDeque::from([response]))),
        }
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    /// Counts the requests sent with the method to a url ending with the suffix
    pub fn count(&self, method: Method, suffix: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.method == method && r.url.ends_with(suffix))
            .count()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().push(request.clone());

        let mut routes = self.routes.lock();
        let scripted = routes
            .iter_mut()
            .find(|(m, s, queue)| {
                *m == request.method && request.url.ends_with(s.as_str()) && !queue.is_empty()
            })
            .and_then(|(_, _, queue)| queue.pop_front());

        scripted.unwrap_or_else(|| {
            Err(TransportError(format!(
                "no scripted response for {} {}",
                request.method, request.url
            )))
        })
    }
}
