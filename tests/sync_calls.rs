//! Blocking calls through a single execution context
//!
//! Covers typed and untyped calls, failure marshaling, transferable values,
//! async handlers, and serialisation of concurrent callers.

mod common;

use std::fs::{self, File};
use std::sync::Arc;
use std::thread;

use common::{ECHO_JSON, INCR, MAGIC, PING, SUM};
use serde_json::json;
use sync_actions::runtime::context::is_execution_context;
use sync_actions::runtime::{FailureKind, MessageChannel};
use sync_actions::{ActionError, ActionSet, CallError, Client, ContextRegistry, SyncWorker, Value};
use tempfile::TempDir;

fn launch(registry: &ContextRegistry, temp: &TempDir) -> Client {
    common::init_tracing();
    common::worker(registry, temp)
        .launch()
        .expect("launch")
        .client
        .expect("client")
}

#[test]
fn test_sync_actions() {
    let temp = TempDir::new().unwrap();
    let registry = ContextRegistry::new();
    let client = launch(&registry, &temp);

    assert_eq!(client.invoke(&PING, ()).unwrap(), "pong!?");
    assert_eq!(client.invoke(&INCR, (3,)).unwrap(), 4);
    assert_eq!(client.invoke(&MAGIC, (0,)).unwrap(), 1);
    assert_eq!(client.invoke(&MAGIC, (1,)).unwrap(), 3);
    assert_eq!(client.invoke(&MAGIC, (2,)).unwrap(), 5);

    registry.terminate_all();
}

#[test]
fn test_untyped_call() {
    let temp = TempDir::new().unwrap();
    let registry = ContextRegistry::new();
    let client = launch(&registry, &temp);

    let value = client.call("incr", vec![Value::from(41i64)]).unwrap();
    assert_eq!(value.as_data(), Some(&json!(42)));

    let value = client
        .call("echo", vec![Value::from(json!({"nested": [1, "two", null]}))])
        .unwrap();
    assert_eq!(value.as_data(), Some(&json!({"nested": [1, "two", null]})));

    registry.terminate_all();
}

#[test]
fn test_error_message_is_raised() {
    let temp = TempDir::new().unwrap();
    let registry = ContextRegistry::new();
    let client = launch(&registry, &temp);

    let err = client.call("errorSample", vec![]).unwrap_err();
    assert_eq!(err.to_string(), "errorSample");
    assert_eq!(err.as_action().unwrap().kind(), FailureKind::Opaque);

    registry.terminate_all();
}

#[test]
fn test_custom_error_fields_survive() {
    let temp = TempDir::new().unwrap();
    let registry = ContextRegistry::new();
    let client = launch(&registry, &temp);

    match client.call("myErrorTest", vec![]) {
        Err(CallError::Action(failure)) => {
            assert_eq!(failure.name(), "MyError");
            assert_eq!(failure.message(), "myErrorTest");
            assert_eq!(failure.property("prop1"), Some(&json!("foo")));
        }
        other => panic!("expected an action failure, got {other:?}"),
    }

    registry.terminate_all();
}

#[test]
fn test_unknown_method_does_not_stall() {
    let temp = TempDir::new().unwrap();
    let registry = ContextRegistry::new();
    let client = launch(&registry, &temp);

    let err = client.call("noSuchAction", vec![]).unwrap_err();
    let failure = err.as_action().expect("action failure");
    assert_eq!(failure.kind(), FailureKind::UnknownAction);
    assert_eq!(failure.message(), "actions.noSuchAction is not a function");

    // The protocol is still in step.
    assert_eq!(client.invoke(&PING, ()).unwrap(), "pong!?");

    registry.terminate_all();
}

#[test]
fn test_invalid_typed_arguments() {
    let temp = TempDir::new().unwrap();
    let registry = ContextRegistry::new();
    let client = launch(&registry, &temp);

    let err = client.call("incr", vec![Value::from("three")]).unwrap_err();
    assert_eq!(
        err.as_action().unwrap().kind(),
        FailureKind::InvalidArguments
    );

    registry.terminate_all();
}

#[test]
fn test_single_typed_argument_is_passed_as_is() {
    let temp = TempDir::new().unwrap();
    let registry = ContextRegistry::new();
    let client = launch(&registry, &temp);

    assert_eq!(client.invoke(&SUM, (vec![],)).unwrap(), 0);
    assert_eq!(client.invoke(&SUM, (vec![1, 2, 3],)).unwrap(), 6);
    assert_eq!(client.invoke(&ECHO_JSON, (json!(5),)).unwrap(), json!(5));
    assert_eq!(client.invoke(&ECHO_JSON, (json!([5]),)).unwrap(), json!([5]));

    let err = client.call("sum", vec![]).unwrap_err();
    assert_eq!(
        err.as_action().unwrap().kind(),
        FailureKind::InvalidArguments
    );

    registry.terminate_all();
}

#[test]
fn test_file_handle_read() {
    let temp = TempDir::new().unwrap();
    let registry = ContextRegistry::new();
    let client = launch(&registry, &temp);

    let path = temp.path().join("sample.txt");
    fs::write(&path, "I could read a file.").unwrap();
    let file = File::open(&path).unwrap();

    let bytes = client
        .call("readFile", vec![Value::from(file)])
        .unwrap()
        .into_buffer()
        .expect("buffer result");
    assert_eq!(String::from_utf8(bytes).unwrap(), "I could read a file.");

    registry.terminate_all();
}

#[test]
fn test_buffer_is_moved_both_ways() {
    let temp = TempDir::new().unwrap();
    let registry = ContextRegistry::new();
    let client = launch(&registry, &temp);

    let value = client
        .call("reverse", vec![Value::from(b"Hello".to_vec())])
        .unwrap();
    assert_eq!(value.as_buffer(), Some(&b"olleH"[..]));

    registry.terminate_all();
}

#[test]
fn test_port_is_transferred() {
    let temp = TempDir::new().unwrap();
    let registry = ContextRegistry::new();
    let client = launch(&registry, &temp);

    let (mut local, remote) = MessageChannel::new();
    client.call("greetPort", vec![Value::from(remote)]).unwrap();

    let message = local.receive_message().expect("greeting delivered");
    assert_eq!(message.body, b"hello from context");

    registry.terminate_all();
}

#[test]
fn test_async_handler_looks_synchronous() {
    let temp = TempDir::new().unwrap();
    let registry = ContextRegistry::new();
    let client = launch(&registry, &temp);

    let value = client.call("delayedPing", vec![]).unwrap();
    assert_eq!(value.as_data(), Some(&json!("pong (later)")));

    registry.terminate_all();
}

#[test]
fn test_panicking_handler_is_reported() {
    let temp = TempDir::new().unwrap();
    let registry = ContextRegistry::new();
    let client = launch(&registry, &temp);

    let err = client.call("explode", vec![]).unwrap_err();
    let failure = err.as_action().expect("action failure");
    assert_eq!(failure.kind(), FailureKind::Panicked);
    assert_eq!(failure.message(), "kaboom");

    assert_eq!(client.invoke(&INCR, (1,)).unwrap(), 2);

    registry.terminate_all();
}

#[test]
fn test_handlers_run_in_the_context() {
    let temp = TempDir::new().unwrap();
    let registry = ContextRegistry::new();
    let client = launch(&registry, &temp);

    assert!(!is_execution_context());
    let value = client.call("whereAmI", vec![]).unwrap();
    assert_eq!(value.as_data(), Some(&json!(true)));

    registry.terminate_all();
}

#[test]
fn test_launch_inside_context_is_inert() {
    let temp = TempDir::new().unwrap();
    let registry = ContextRegistry::new();

    let inner = Arc::new(common::worker(&registry, &temp));
    let actions = ActionSet::stateless()
        .action("launchNested", move |_, _| {
            let launched = inner
                .launch()
                .map_err(|err| ActionError::new(err.to_string()))?;
            Ok(Value::from(launched.is_inert()))
        })
        .build();
    let outer = SyncWorker::define(common::source(), actions, &registry)
        .with_config(common::config(&temp));

    let client = outer.launch().unwrap().client.unwrap();
    let value = client.call("launchNested", vec![]).unwrap();

    assert_eq!(value.as_data(), Some(&json!(true)));
    assert_eq!(registry.len(), 1);

    registry.terminate_all();
}

#[test]
fn test_shared_client_is_serialised() {
    let temp = TempDir::new().unwrap();
    let registry = ContextRegistry::new();
    let client = launch(&registry, &temp);

    let callers: Vec<_> = (0..4)
        .map(|_| {
            let client = client.clone();
            thread::spawn(move || {
                (0..10)
                    .map(|_| client.invoke(&MAGIC, (0,)).unwrap())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut seen: Vec<i64> = callers
        .into_iter()
        .flat_map(|caller| caller.join().unwrap())
        .collect();
    seen.sort_unstable();

    assert_eq!(seen, (1..=40).collect::<Vec<_>>());

    registry.terminate_all();
}
