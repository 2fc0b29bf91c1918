//! Shared test utilities and fixtures
//!
//! A scripted [`XcodeBuildClient`] and a server running over `tokio::io::duplex` pipes.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::task::JoinHandle;
use xcode_bsp_engine::{
    BuildGraphService, FileSettings, RefreshTrigger, SchemeBuildSettings, SettingsForIndex,
    XcodeBuildClient, XcodeBuildError, XcodeList,
};
use xcode_bsp_rpc::{FrameDecoder, MessageWriter};
use xcode_bsp_server::{MethodRegistry, ServerContext, ServerOptions, serve};
use xcode_bsp_store::{ArgumentStore, InMemoryArgumentStore};

pub const PROJECT: &str = "p";

pub fn args(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| (*s).to_string()).collect()
}

pub fn swift_file(arguments: &[&str]) -> FileSettings {
    FileSettings {
        swift_ast_command_arguments: Some(args(arguments)),
        ..FileSettings::default()
    }
}

/// `xcodebuild` stand-in answering from in-memory fixtures.
#[derive(Default)]
pub struct FixtureProject {
    schemes: Vec<String>,
    settings: Mutex<HashMap<String, SettingsForIndex>>,
    warmups: Mutex<Vec<String>>,
    uncached_delay: Option<Duration>,
    uncached_loads: AtomicUsize,
}

impl FixtureProject {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `file` with `settings` to `target` of `scheme`.
    pub fn with_file(mut self, scheme: &str, target: &str, file: &str, settings: FileSettings) -> Self {
        if !self.schemes.iter().any(|s| s == scheme) {
            self.schemes.push(scheme.to_string());
        }
        self.settings
            .lock()
            .unwrap()
            .entry(scheme.to_string())
            .or_default()
            .entry(target.to_string())
            .or_insert_with(BTreeMap::new)
            .insert(file.to_string(), settings);
        self
    }

    /// Make uncached `settingsForIndex` calls take `delay`, like a real `xcodebuild` run.
    pub fn with_uncached_delay(mut self, delay: Duration) -> Self {
        self.uncached_delay = Some(delay);
        self
    }

    /// Uncached `settingsForIndex` calls that have completed.
    pub fn uncached_loads(&self) -> usize {
        self.uncached_loads.load(Ordering::SeqCst)
    }

    pub fn warmups(&self) -> Vec<String> {
        self.warmups.lock().unwrap().clone()
    }
}

impl XcodeBuildClient for FixtureProject {
    fn list(&self, _check_cache: bool) -> Result<XcodeList, XcodeBuildError> {
        Ok(serde_json::from_value(json!({
            "project": {"name": PROJECT, "schemes": self.schemes, "targets": []}
        }))
        .unwrap())
    }

    fn settings_for_index(
        &self,
        scheme: &str,
        check_cache: bool,
    ) -> Result<SettingsForIndex, XcodeBuildError> {
        if !check_cache {
            if let Some(delay) = self.uncached_delay {
                std::thread::sleep(delay);
            }
            self.uncached_loads.fetch_add(1, Ordering::SeqCst);
        }
        Ok(self
            .settings
            .lock()
            .unwrap()
            .get(scheme)
            .cloned()
            .unwrap_or_default())
    }

    fn settings_for_scheme(
        &self,
        _scheme: &str,
        _check_cache: bool,
    ) -> Result<Vec<SchemeBuildSettings>, XcodeBuildError> {
        Ok(Vec::new())
    }

    fn warmup_build(&self, scheme: &str) -> Result<(), XcodeBuildError> {
        self.warmups.lock().unwrap().push(scheme.to_string());
        Ok(())
    }
}

/// Records refresh reasons instead of refreshing.
#[derive(Default)]
pub struct RecordingTrigger {
    reasons: Mutex<Vec<String>>,
}

impl RecordingTrigger {
    pub fn reasons(&self) -> Vec<String> {
        self.reasons.lock().unwrap().clone()
    }
}

impl RefreshTrigger for RecordingTrigger {
    fn request_refresh(&self, reason: &str) {
        self.reasons.lock().unwrap().push(reason.to_string());
    }
}

pub struct TestServer {
    input: DuplexStream,
    output: DuplexStream,
    decoder: FrameDecoder,
    /// Notifications received while waiting for responses.
    pub notifications: Vec<Value>,
    pub handle: JoinHandle<anyhow::Result<i32>>,
}

pub struct ServerBuilder {
    project: Arc<FixtureProject>,
    store: Arc<dyn ArgumentStore>,
    trigger: Option<Arc<RecordingTrigger>>,
    cache_dir: std::path::PathBuf,
}

impl ServerBuilder {
    pub fn new(project: FixtureProject) -> Self {
        Self {
            project: Arc::new(project),
            store: Arc::new(InMemoryArgumentStore::new()),
            trigger: None,
            cache_dir: std::path::PathBuf::from("/cache"),
        }
    }

    pub fn project(&self) -> Arc<FixtureProject> {
        Arc::clone(&self.project)
    }

    pub fn store(mut self, store: Arc<dyn ArgumentStore>) -> Self {
        self.store = store;
        self
    }

    pub fn trigger(mut self, trigger: Arc<RecordingTrigger>) -> Self {
        self.trigger = Some(trigger);
        self
    }

    pub fn start(self) -> TestServer {
        let (input, server_input) = tokio::io::duplex(256 * 1024);
        let (server_output, output) = tokio::io::duplex(256 * 1024);

        let client: Arc<dyn XcodeBuildClient> = self.project;
        let graph = Arc::new(BuildGraphService::new(client, PROJECT, Vec::new()));
        let mut ctx = ServerContext::new(
            graph,
            self.store,
            Arc::new(MessageWriter::new(server_output)),
            ServerOptions {
                cache_dir: self.cache_dir,
                source_kit_options_changed: false,
            },
        )
        .unwrap();
        if let Some(trigger) = self.trigger {
            ctx = ctx.with_refresh_trigger(trigger);
        }

        let registry = Arc::new(MethodRegistry::standard().unwrap());
        let handle = tokio::spawn(serve(server_input, Arc::new(ctx), registry));
        TestServer {
            input,
            output,
            decoder: FrameDecoder::new(),
            notifications: Vec::new(),
            handle,
        }
    }
}

impl TestServer {
    async fn write(&mut self, message: Value) {
        self.write_all(&[message]).await;
    }

    /// Frame every message and send them in a single write.
    pub async fn write_all(&mut self, messages: &[Value]) {
        let mut frames = String::new();
        for message in messages {
            let body = message.to_string();
            frames.push_str(&format!("Content-Length: {}\r\n\r\n{body}", body.len()));
        }
        self.input.write_all(frames.as_bytes()).await.unwrap();
    }

    async fn next_message(&mut self) -> Value {
        loop {
            if let Some(body) = self.decoder.next_frame().unwrap() {
                return serde_json::from_slice(&body).unwrap();
            }
            let mut chunk = [0u8; 8192];
            let read = self.output.read(&mut chunk).await.unwrap();
            assert!(read > 0, "server closed its output");
            self.decoder.extend(&chunk[..read]);
        }
    }

    /// Send a request and wait for its response, collecting notifications on the way.
    pub async fn request(&mut self, id: i64, method: &str, params: Value) -> Value {
        self.write(json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params}))
            .await;
        self.response(id).await
    }

    /// Wait for the response to `id`, collecting notifications on the way.
    pub async fn response(&mut self, id: i64) -> Value {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let message = self.next_message().await;
                if message.get("id") == Some(&json!(id)) {
                    return message;
                }
                self.notifications.push(message);
            }
        })
        .await
        .expect("response should arrive")
    }

    pub async fn notify(&mut self, method: &str, params: Value) {
        self.write(json!({"jsonrpc": "2.0", "method": method, "params": params}))
            .await;
    }

    /// Send `build/exit` and wait for the server's exit code.
    pub async fn exit(mut self) -> i32 {
        self.notify("build/exit", Value::Null).await;
        tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("server should exit")
            .unwrap()
            .unwrap()
    }
}
