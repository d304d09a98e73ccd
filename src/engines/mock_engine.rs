// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use std::collections::HashMap;
use parking_lot::Mutex;

use crate::engines::traits::{EngineError, FetchRequest, FetchResponse, HttpEngine};

enum Scripted {
    Response(FetchResponse),
    Failure,
}

/// 按URL返回预设响应的测试引擎
#[derive(Default)]
pub struct MockEngine {
    responses: Mutex<HashMap<String, Scripted>>,
    calls: Mutex<Vec<String>>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn redirect(self, url: &str, location: &str) -> Self {
        self.insert(
            url,
            Scripted::Response(FetchResponse {
                status_code: 302,
                content: String::new(),
                redirect_target: Some(location.to_string()),
            }),
        )
    }

    pub fn page(self, url: &str, body: &str) -> Self {
        self.insert(
            url,
            Scripted::Response(FetchResponse {
                status_code: 200,
                content: body.to_string(),
                redirect_target: None,
            }),
        )
    }

    pub fn failure(self, url: &str) -> Self {
        self.insert(url, Scripted::Failure)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn insert(self, url: &str, scripted: Scripted) -> Self {
        self.responses.lock().insert(url.to_string(), scripted);
        self
    }
}

#[async_trait]
impl HttpEngine for MockEngine {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, EngineError> {
        self.calls.lock().push(request.url.clone());
        match self.responses.lock().get(&request.url) {
            Some(Scripted::Response(response)) => Ok(response.clone()),
            Some(Scripted::Failure) => Err(EngineError::Other("connection refused".to_string())),
            None => Ok(FetchResponse {
                status_code: 200,
                content: String::new(),
                redirect_target: None,
            }),
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
