#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use mito_core::api::ApiClient;
use mito_core::config::{AppConfig, Environment};
use mito_core::connectivity::Connectivity;
use mito_core::http::{
    ApiRequest, ApiResponse, HttpMethod, RequestBody, RequestExecutor, RetryPolicy, Transport,
    TransportError,
};
use mito_core::outbox::ActionLog;
use mito_core::storage::MemoryStorage;

pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Everything a test needs to drive the client against one transport.
pub struct Harness {
    pub storage: MemoryStorage,
    pub connectivity: Connectivity,
    pub action_log: ActionLog,
    pub executor: RequestExecutor,
    pub api: ApiClient,
}

impl Harness {
    pub fn new(base_url: &str, transport: Arc<dyn Transport>, online: bool) -> Self {
        let config = AppConfig::for_environment(Environment::Testing)
            .with_api_base_url(base_url)
            .expect("valid base url");
        let storage = MemoryStorage::new();
        let connectivity = Connectivity::new(online);
        let action_log = ActionLog::new(Arc::new(storage.clone()));
        let executor = RequestExecutor::new(
            transport,
            RetryPolicy::from_config(&config),
            connectivity.clone(),
            action_log.clone(),
        );
        let api = ApiClient::new(config, executor.clone());
        Self {
            storage,
            connectivity,
            action_log,
            executor,
            api,
        }
    }
}

/// A tiny in-process stand-in for the comments API that can be switched
/// unreachable.
#[derive(Default)]
pub struct CommentBackend {
    reachable: AtomicBool,
    comments: Mutex<Vec<Value>>,
    seen_tokens: Mutex<Vec<Option<String>>>,
}

impl CommentBackend {
    pub fn new(reachable: bool) -> Arc<Self> {
        Arc::new(Self {
            reachable: AtomicBool::new(reachable),
            ..Self::default()
        })
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn seen_tokens(&self) -> Vec<Option<String>> {
        self.seen_tokens.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for CommentBackend {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        if !self.reachable.load(Ordering::SeqCst) {
            return Err(TransportError::new("network unreachable"));
        }
        self.seen_tokens
            .lock()
            .unwrap()
            .push(request.headers.get("Authorization").cloned());

        let path = request
            .url
            .split_once("/api")
            .map_or("", |(_, path)| path)
            .to_string();
        let mut comments = self.comments.lock().unwrap();
        match (request.method, path.as_str()) {
            (HttpMethod::Post, "/comments") => {
                let Some(RequestBody::Json { content }) = &request.body else {
                    return Ok(ApiResponse::new(400, r#"{"error":"missing body"}"#));
                };
                let mut comment: Value = serde_json::from_str(content).unwrap();
                comment["id"] = json!(comments.len() + 1);
                comments.push(comment.clone());
                Ok(ApiResponse::new(201, comment.to_string()))
            }
            (HttpMethod::Get, path) if path.starts_with("/comments/task/") => {
                let task_id = path.trim_start_matches("/comments/task/");
                let matching: Vec<Value> = comments
                    .iter()
                    .filter(|comment| comment["taskId"] == json!(task_id))
                    .cloned()
                    .collect();
                Ok(ApiResponse::new(200, Value::Array(matching).to_string()))
            }
            _ => Ok(ApiResponse::new(404, r#"{"message":"Not found"}"#)),
        }
    }
}
