//! Shared worker fixture for integration tests

#![allow(dead_code)]

use std::io::Read;
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use serde_json::Value as JsonValue;
use sync_actions::runtime::context::is_execution_context;
use sync_actions::runtime::{Message, Value};
use sync_actions::{ActionError, ActionSet, ContextRegistry, LaunchConfig, Method, SyncWorker};
use tempfile::TempDir;

pub const PING: Method<(), String> = Method::new("ping");
pub const INCR: Method<(i64,), i64> = Method::new("incr");
pub const MAGIC: Method<(i64,), i64> = Method::new("magic");
pub const SUM: Method<(Vec<i64>,), i64> = Method::new("sum");
pub const ECHO_JSON: Method<(JsonValue,), JsonValue> = Method::new("echoJson");

/// Per-context state of the fixture worker.
#[derive(Default)]
pub struct WorkerState {
    calls: AtomicI64,
}

pub fn actions() -> ActionSet<WorkerState> {
    ActionSet::builder(|_module| Ok(WorkerState::default()))
        .method(PING, |_, ()| Ok("pong!?".to_string()))
        .method(INCR, |_, (n,)| Ok(n + 1))
        .method(MAGIC, |state, (n,)| {
            Ok(n + state.calls.fetch_add(1, Ordering::SeqCst) + 1)
        })
        .method(SUM, |_, (items,)| Ok(items.iter().sum::<i64>()))
        .method(ECHO_JSON, |_, (value,)| Ok(value))
        .action("errorSample", |_, _| Err(ActionError::new("errorSample")))
        .action("myErrorTest", |_, _| {
            Err(ActionError::named("MyError", "myErrorTest").with_property("prop1", "foo"))
        })
        .action("readFile", |_, args| {
            let mut file = args
                .into_iter()
                .next()
                .and_then(Value::into_file)
                .ok_or_else(|| ActionError::new("readFile expects a file"))?;
            let mut bytes = Vec::new();
            file.read_to_end(&mut bytes)?;
            Ok(Value::Buffer(bytes))
        })
        .action("reverse", |_, args| {
            let mut bytes = args
                .into_iter()
                .next()
                .and_then(Value::into_buffer)
                .ok_or_else(|| ActionError::new("reverse expects a buffer"))?;
            bytes.reverse();
            Ok(Value::Buffer(bytes))
        })
        .action("greetPort", |_, args| {
            let port = args
                .into_iter()
                .next()
                .and_then(Value::into_port)
                .ok_or_else(|| ActionError::new("greetPort expects a port"))?;
            port.post_message(Message::new(b"hello from context".to_vec()))
                .map_err(|err| ActionError::new(err.to_string()))?;
            Ok(Value::null())
        })
        .action("echo", |_, args| {
            Ok(args.into_iter().next().unwrap_or_else(Value::null))
        })
        .action("whereAmI", |_, _| Ok(Value::from(is_execution_context())))
        .action("explode", |_, _| panic!("kaboom"))
        .action_async("delayedPing", |_, _| async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(Value::from("pong (later)"))
        })
        .action_async("sleepForever", |_, _| async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Value::null())
        })
        .build()
}

/// Source file the fixture worker is defined from.
pub fn source() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/common/mod.rs")
}

/// Enabled configuration writing prepared modules into `temp`.
pub fn config(temp: &TempDir) -> LaunchConfig {
    LaunchConfig {
        disabled: false,
        temp_dir: Some(temp.path().to_path_buf()),
    }
}

pub fn worker(registry: &ContextRegistry, temp: &TempDir) -> SyncWorker<WorkerState> {
    SyncWorker::define(source(), actions(), registry).with_config(config(temp))
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
