//! Scripted in-memory transport for unit tests.

use std::sync::Mutex;

use crate::http::{HttpRequest, HttpResponse, Transport, TransportError};

type Responder = Box<dyn Fn(&HttpRequest) -> Result<HttpResponse, String> + Send + Sync>;

/// Answers every request through a closure and records what was sent.
pub(crate) struct ScriptedTransport {
    responder: Responder,
    sent: Mutex<Vec<HttpRequest>>,
    slow: Option<(String, usize)>,
}

impl ScriptedTransport {
    pub(crate) fn new(
        responder: impl Fn(&HttpRequest) -> Result<HttpResponse, String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            responder: Box::new(responder),
            sent: Mutex::new(Vec::new()),
            slow: None,
        }
    }

    /// Requests whose path ends with `suffix` yield `yields` times before
    /// they are answered; everything else yields once.
    pub(crate) fn slow(mut self, suffix: &str, yields: usize) -> Self {
        self.slow = Some((suffix.to_string(), yields));
        self
    }

    pub(crate) fn sent(&self) -> Vec<HttpRequest> {
        self.sent.lock().unwrap().clone()
    }

    /// Requests whose URL path ends with `suffix`.
    pub(crate) fn count(&self, suffix: &str) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|r| path_ends_with(r, suffix))
            .count()
    }
}

fn path_ends_with(request: &HttpRequest, suffix: &str) -> bool {
    request.url.split('?').next().unwrap_or_default().ends_with(suffix)
}

impl Transport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        // Give concurrently polled callers a chance to interleave.
        let yields = match &self.slow {
            Some((suffix, yields)) if path_ends_with(&request, suffix) => *yields,
            _ => 1,
        };
        for _ in 0..yields {
            tokio::task::yield_now().await;
        }
        self.sent.lock().unwrap().push(request.clone());
        (self.responder)(&request).map_err(TransportError::from)
    }
}
