// src/test_support.rs
//
// In-memory transport for service and resolver tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::ReconError;
use crate::resolver::{ApiResponse, RequestDescriptor, Transport};

#[derive(Debug, Clone)]
pub enum Reply {
    Json(Value),
    Empty,
    Status(u16, Value),
}

impl Reply {
    fn into_result(self) -> Result<ApiResponse, ReconError> {
        match self {
            Reply::Json(value) => Ok(ApiResponse::Json(value)),
            Reply::Empty => Ok(ApiResponse::Empty),
            Reply::Status(status, body) => Err(ReconError::Api {
                status,
                message: body
                    .get("detail")
                    .and_then(Value::as_str)
                    .unwrap_or("scripted failure")
                    .to_string(),
                body,
            }),
        }
    }
}

/// Replies keyed by `"METHOD /path?query"` (exact) or `"METHOD /path"`. Each key
/// holds a queue; the last reply repeats. Unscripted requests get a 404.
#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<RequestDescriptor>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(self, key: &str, reply: Reply) -> Self {
        if let Ok(mut routes) = self.routes.lock() {
            routes.entry(key.to_string()).or_default().push_back(reply);
        }
        self
    }

    pub fn calls(&self) -> Vec<RequestDescriptor> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn described_calls(&self) -> Vec<String> {
        self.calls().iter().map(RequestDescriptor::describe).collect()
    }

    fn next_reply(&self, request: &RequestDescriptor) -> Reply {
        let mut routes = match self.routes.lock() {
            Ok(routes) => routes,
            Err(_) => return Reply::Status(500, json!({"detail": "poisoned"})),
        };
        let keys = [
            request.describe(),
            format!("{} {}", request.method, request.path),
        ];
        for key in keys {
            if let Some(queue) = routes.get_mut(&key) {
                if queue.len() > 1 {
                    if let Some(reply) = queue.pop_front() {
                        return reply;
                    }
                }
                if let Some(reply) = queue.front() {
                    return reply.clone();
                }
            }
        }
        Reply::Status(404, json!({"detail": "Not Found"}))
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &RequestDescriptor) -> Result<ApiResponse, ReconError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(request.clone());
        }
        self.next_reply(request).into_result()
    }
}
