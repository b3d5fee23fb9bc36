//! Action sets: the fixed mapping of method names to handlers
//!
//! An [`ActionSet`] is defined once and shared by every context launched
//! from the same definition. Each context runs the set's initializer on
//! start and gets its own state instance, so contexts never share handler
//! state unless the handlers reach for something process-wide themselves.
//!
//! Handlers can be registered by name with untyped [`Value`] arguments, or
//! through a [`Method`] descriptor whose argument tuple and result type are
//! checked at compile time on both sides of the boundary.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use super::error::ActionError;
use super::module::WorkerModule;
use super::value::Value;

/// Future returned by every registered handler.
pub type ActionFuture = BoxFuture<'static, Result<Value, ActionError>>;

pub(crate) type Handler<S> = Arc<dyn Fn(Arc<S>, Vec<Value>) -> ActionFuture + Send + Sync>;

type Initializer<S> = Arc<dyn Fn(&WorkerModule) -> Result<S, ActionError> + Send + Sync>;

/// Typed descriptor for one action.
///
/// `A` is the argument tuple (`()` for none, `(i64,)` for one argument) and
/// `R` the result type. Each tuple element is one positional argument on the
/// wire, so `(Vec<i64>,)` takes a single list argument.
pub struct Method<A, R> {
    name: &'static str,
    _marker: PhantomData<fn(A) -> R>,
}

impl<A, R> Method<A, R> {
    /// Declare a method by name.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    /// The method name used on the wire.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<A, R> Clone for Method<A, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<A, R> Copy for Method<A, R> {}

impl<A, R> fmt::Debug for Method<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Method").field(&self.name).finish()
    }
}

/// Argument tuple of a typed [`Method`], one element per positional argument.
pub trait Args: Sized + Send + 'static {
    /// Number of positional arguments.
    const ARITY: usize;

    /// Lower into positional values.
    fn encode(&self) -> Result<Vec<Value>, serde_json::Error>;

    /// Raise from exactly [`ARITY`](Self::ARITY) positional values.
    fn decode(items: Vec<JsonValue>) -> Result<Self, serde_json::Error>;
}

macro_rules! impl_args {
    ($arity:expr; $($name:ident),*) => {
        impl<$($name),*> Args for ($($name,)*)
        where
            $($name: Serialize + DeserializeOwned + Send + 'static),*
        {
            const ARITY: usize = $arity;

            #[allow(non_snake_case)]
            fn encode(&self) -> Result<Vec<Value>, serde_json::Error> {
                let ($($name,)*) = self;
                Ok(vec![$(Value::Data(serde_json::to_value($name)?)),*])
            }

            #[allow(unused_mut, unused_variables)]
            fn decode(items: Vec<JsonValue>) -> Result<Self, serde_json::Error> {
                let mut items = items.into_iter();
                Ok(($(serde_json::from_value::<$name>(items.next().unwrap_or(JsonValue::Null))?,)*))
            }
        }
    };
}

impl_args!(0;);
impl_args!(1; A1);
impl_args!(2; A1, A2);
impl_args!(3; A1, A2, A3);
impl_args!(4; A1, A2, A3, A4);
impl_args!(5; A1, A2, A3, A4, A5);
impl_args!(6; A1, A2, A3, A4, A5, A6);
impl_args!(7; A1, A2, A3, A4, A5, A6, A7);
impl_args!(8; A1, A2, A3, A4, A5, A6, A7, A8);

/// Raise positional values into a typed argument tuple.
pub(crate) fn decode_args<A: Args>(method: &str, args: Vec<Value>) -> Result<A, ActionError> {
    if args.len() != A::ARITY {
        return Err(ActionError::invalid_arguments(
            method,
            format!("expected {} arguments, got {}", A::ARITY, args.len()),
        ));
    }
    let items = args
        .into_iter()
        .map(|arg| {
            arg.into_json()
                .ok_or_else(|| ActionError::invalid_arguments(method, "transferable argument"))
        })
        .collect::<Result<Vec<_>, _>>()?;
    A::decode(items).map_err(|err| ActionError::invalid_arguments(method, err))
}

/// The set of actions a context serves.
pub struct ActionSet<S> {
    init: Initializer<S>,
    handlers: Arc<HashMap<String, Handler<S>>>,
}

impl<S> Clone for ActionSet<S> {
    fn clone(&self) -> Self {
        Self {
            init: self.init.clone(),
            handlers: self.handlers.clone(),
        }
    }
}

impl ActionSet<()> {
    /// Start building a set whose handlers need no per-context state.
    pub fn stateless() -> ActionSetBuilder<()> {
        ActionSet::builder(|_module| Ok(()))
    }
}

impl<S: Send + Sync + 'static> ActionSet<S> {
    /// Start building a set around a per-context state initializer.
    ///
    /// The initializer runs inside each new context before it serves any
    /// call. If it fails, the context reports a startup failure.
    pub fn builder<F>(init: F) -> ActionSetBuilder<S>
    where
        F: Fn(&WorkerModule) -> Result<S, ActionError> + Send + Sync + 'static,
    {
        ActionSetBuilder {
            init: Arc::new(init),
            handlers: HashMap::new(),
        }
    }

    /// Whether a method is registered.
    pub fn contains(&self, method: &str) -> bool {
        self.handlers.contains_key(method)
    }

    /// Registered method names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub(crate) fn initialize(&self, module: &WorkerModule) -> Result<S, ActionError> {
        (self.init)(module)
    }

    pub(crate) fn handler(&self, method: &str) -> Option<&Handler<S>> {
        self.handlers.get(method)
    }
}

impl<S> fmt::Debug for ActionSet<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.handlers.keys().collect();
        names.sort_unstable();
        f.debug_struct("ActionSet").field("actions", &names).finish()
    }
}

/// Builder for an [`ActionSet`].
pub struct ActionSetBuilder<S> {
    init: Initializer<S>,
    handlers: HashMap<String, Handler<S>>,
}

impl<S: Send + Sync + 'static> ActionSetBuilder<S> {
    /// Register a synchronous handler.
    pub fn action<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&S, Vec<Value>) -> Result<Value, ActionError> + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        let wrapped: Handler<S> = Arc::new(move |state: Arc<S>, args: Vec<Value>| -> ActionFuture {
            let handler = handler.clone();
            async move { handler(&state, args) }.boxed()
        });
        self.handlers.insert(name.into(), wrapped);
        self
    }

    /// Register an asynchronous handler.
    pub fn action_async<F, Fut>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Arc<S>, Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ActionError>> + Send + 'static,
    {
        let wrapped: Handler<S> =
            Arc::new(move |state: Arc<S>, args: Vec<Value>| -> ActionFuture {
                handler(state, args).boxed()
            });
        self.handlers.insert(name.into(), wrapped);
        self
    }

    /// Register a synchronous handler for a typed method.
    pub fn method<A, R, F>(self, method: Method<A, R>, handler: F) -> Self
    where
        A: Args,
        R: Serialize + 'static,
        F: Fn(&S, A) -> Result<R, ActionError> + Send + Sync + 'static,
    {
        let name = method.name();
        self.action(name, move |state, args| {
            let args = decode_args::<A>(name, args)?;
            let result = handler(state, args)?;
            Ok(Value::Data(serde_json::to_value(result)?))
        })
    }

    /// Register an asynchronous handler for a typed method.
    pub fn method_async<A, R, F, Fut>(self, method: Method<A, R>, handler: F) -> Self
    where
        A: Args,
        R: Serialize + 'static,
        F: Fn(Arc<S>, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, ActionError>> + Send + 'static,
    {
        let name = method.name();
        let handler = Arc::new(handler);
        self.action_async(name, move |state, args| {
            let handler = handler.clone();
            async move {
                let args = decode_args::<A>(name, args)?;
                let result = handler(state, args).await?;
                Ok::<_, ActionError>(Value::Data(serde_json::to_value(result)?))
            }
        })
    }

    /// Finish the set.
    pub fn build(self) -> ActionSet<S> {
        ActionSet {
            init: self.init,
            handlers: Arc::new(self.handlers),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::error::FailureKind;
    use serde_json::json;

    const INCR: Method<(i64,), i64> = Method::new("incr");
    const PING: Method<(), String> = Method::new("ping");

    #[test]
    fn test_builder_registers_names() {
        let actions = ActionSet::stateless()
            .method(PING, |_, ()| Ok("pong".to_string()))
            .method(INCR, |_, (n,)| Ok(n + 1))
            .action("raw", |_, _| Ok(Value::null()))
            .build();

        assert_eq!(actions.names(), vec!["incr", "ping", "raw"]);
        assert!(actions.contains("incr"));
        assert!(!actions.contains("missing"));
    }

    #[test]
    fn test_encode_args_one_value_per_element() {
        assert!(().encode().unwrap().is_empty());

        let args = (3i64, "x".to_string()).encode().unwrap();
        assert_eq!(args.len(), 2);
        assert_eq!(args[0].as_data(), Some(&json!(3)));
        assert_eq!(args[1].as_data(), Some(&json!("x")));

        let args = (Vec::<i64>::new(),).encode().unwrap();
        assert_eq!(args.len(), 1);
        assert_eq!(args[0].as_data(), Some(&json!([])));
    }

    #[test]
    fn test_decode_args_by_position() {
        let (n,): (i64,) = decode_args("incr", vec![Value::from(4i64)]).unwrap();
        assert_eq!(n, 4);

        let (): () = decode_args("ping", Vec::new()).unwrap();

        let (items,): (Vec<i64>,) = decode_args("sum", vec![Value::from(json!([]))]).unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn test_single_json_argument_is_not_wrapped() {
        let (value,): (JsonValue,) = decode_args("echo", vec![Value::from(5i64)]).unwrap();
        assert_eq!(value, json!(5));

        let (value,): (JsonValue,) = decode_args("echo", vec![Value::from(json!([5]))]).unwrap();
        assert_eq!(value, json!([5]));
    }

    #[test]
    fn test_decode_args_checks_arity() {
        let err = decode_args::<(i64,)>("incr", Vec::new()).unwrap_err();
        assert_eq!(err.kind(), FailureKind::InvalidArguments);
        assert_eq!(err.message(), "invalid arguments for incr: expected 1 arguments, got 0");

        let err = decode_args::<()>("ping", vec![Value::null()]).unwrap_err();
        assert_eq!(err.kind(), FailureKind::InvalidArguments);
    }

    #[test]
    fn test_decode_args_rejects_wrong_type() {
        let err = decode_args::<(i64,)>("incr", vec![Value::from("four")]).unwrap_err();
        assert_eq!(err.kind(), FailureKind::InvalidArguments);
        assert_eq!(err.property("method"), Some(&json!("incr")));
    }
}
