//! Method invocation and around-interception.
//!
//! A [`MethodTarget`] pairs a callable with its [`InterfaceToCall`]
//! description. Each call travels as a [`MethodInvocation`] through the
//! ordered [`AroundInterceptor`]s; every interceptor decides whether to
//! [`proceed`](MethodInvocation::proceed), and may change the arguments
//! before or the result after doing so.
//!
//! # Example
//!
//! ```rust,ignore
//! let audit = AroundFn::new(|invocation: MethodInvocation| async move {
//!     tracing::info!(target = %invocation.interface(), "calling");
//!     invocation.proceed().await
//! });
//! ```

use crate::{
    error::{BoxError, InvocationError, MessagingError},
    message::Message,
    payload::Payload,
    types::TypeDescriptor,
};
use futures::future::BoxFuture;
use std::{fmt, future::Future, sync::Arc};

/// A named, typed parameter of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceParameter {
    name: String,
    type_descriptor: TypeDescriptor,
}

impl InterfaceParameter {
    /// Create a parameter.
    pub fn new(name: impl Into<String>, type_descriptor: TypeDescriptor) -> Self {
        Self {
            name: name.into(),
            type_descriptor,
        }
    }

    /// The parameter name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared type.
    pub fn type_descriptor(&self) -> &TypeDescriptor {
        &self.type_descriptor
    }
}

/// Describes an operation: owner, name, parameters and return type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceToCall {
    interface_name: String,
    method_name: String,
    parameters: Vec<InterfaceParameter>,
    return_type: TypeDescriptor,
}

impl InterfaceToCall {
    /// Describe `interface_name::method_name`, taking nothing and returning
    /// anything.
    pub fn new(interface_name: impl Into<String>, method_name: impl Into<String>) -> Self {
        Self {
            interface_name: interface_name.into(),
            method_name: method_name.into(),
            parameters: Vec::new(),
            return_type: TypeDescriptor::ANYTHING,
        }
    }

    /// Append a parameter.
    pub fn with_parameter(mut self, name: impl Into<String>, type_descriptor: TypeDescriptor) -> Self {
        self.parameters.push(InterfaceParameter::new(name, type_descriptor));
        self
    }

    /// Set the return type.
    pub fn returning(mut self, return_type: TypeDescriptor) -> Self {
        self.return_type = return_type;
        self
    }

    /// The owning interface.
    pub fn interface_name(&self) -> &str {
        &self.interface_name
    }

    /// The operation name.
    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    /// Declared parameters in order.
    pub fn parameters(&self) -> &[InterfaceParameter] {
        &self.parameters
    }

    /// Position of the named parameter.
    pub fn parameter_index(&self, name: &str) -> Option<usize> {
        self.parameters.iter().position(|p| p.name == name)
    }

    /// The return type.
    pub fn return_type(&self) -> &TypeDescriptor {
        &self.return_type
    }

    /// Whether the operation returns nothing.
    pub fn is_void(&self) -> bool {
        self.return_type.is_void()
    }
}

impl fmt::Display for InterfaceToCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.interface_name, self.method_name)
    }
}

/// Outcome of calling a target: an optional result value or a fault.
pub type TargetResult = Result<Option<Payload>, BoxError>;

type TargetFn = dyn Fn(Vec<Payload>) -> BoxFuture<'static, TargetResult> + Send + Sync;

/// A callable operation together with its description.
#[derive(Clone)]
pub struct MethodTarget {
    interface: InterfaceToCall,
    call: Arc<TargetFn>,
}

impl MethodTarget {
    /// Wrap an async callable.
    pub fn new<F, Fut>(interface: InterfaceToCall, f: F) -> Self
    where
        F: Fn(Vec<Payload>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TargetResult> + Send + 'static,
    {
        Self {
            interface,
            call: Arc::new(move |arguments| -> BoxFuture<'static, TargetResult> {
                Box::pin(f(arguments))
            }),
        }
    }

    /// Wrap a synchronous callable.
    pub fn sync<F>(interface: InterfaceToCall, f: F) -> Self
    where
        F: Fn(Vec<Payload>) -> TargetResult + Send + Sync + 'static,
    {
        Self {
            interface,
            call: Arc::new(move |arguments| -> BoxFuture<'static, TargetResult> {
                Box::pin(futures::future::ready(f(arguments)))
            }),
        }
    }

    /// The operation description.
    pub fn interface(&self) -> &InterfaceToCall {
        &self.interface
    }

    /// Call the operation directly, bypassing interceptors.
    pub fn call(&self, arguments: Vec<Payload>) -> BoxFuture<'static, TargetResult> {
        (self.call)(arguments)
    }
}

impl fmt::Debug for MethodTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodTarget")
            .field("interface", &self.interface)
            .finish_non_exhaustive()
    }
}

/// One in-flight call travelling through the around-interceptor chain.
pub struct MethodInvocation {
    target: MethodTarget,
    arguments: Vec<Payload>,
    message: Message,
    interceptors: Arc<[Arc<dyn DynAroundInterceptor>]>,
    next: usize,
}

impl MethodInvocation {
    /// Start an invocation of `target` with resolved `arguments`.
    pub fn new(
        target: MethodTarget,
        arguments: Vec<Payload>,
        message: Message,
        interceptors: Arc<[Arc<dyn DynAroundInterceptor>]>,
    ) -> Self {
        Self {
            target,
            arguments,
            message,
            interceptors,
            next: 0,
        }
    }

    /// The operation being called.
    pub fn interface(&self) -> &InterfaceToCall {
        self.target.interface()
    }

    /// The resolved arguments, in parameter order.
    pub fn arguments(&self) -> &[Payload] {
        &self.arguments
    }

    /// The argument bound to the named parameter.
    pub fn argument(&self, name: &str) -> Option<&Payload> {
        self.interface()
            .parameter_index(name)
            .and_then(|index| self.arguments.get(index))
    }

    /// Replace the argument bound to the named parameter; returns whether the
    /// parameter exists.
    pub fn replace_argument(&mut self, name: &str, value: Payload) -> bool {
        match self.interface().parameter_index(name) {
            Some(index) if index < self.arguments.len() => {
                self.arguments[index] = value;
                true
            }
            _ => false,
        }
    }

    /// The message that triggered the call.
    pub fn message(&self) -> &Message {
        &self.message
    }

    /// Run the rest of the chain, ending in the target.
    pub fn proceed(mut self) -> BoxFuture<'static, Result<Option<Payload>, MessagingError>> {
        Box::pin(async move {
            match self.interceptors.get(self.next).cloned() {
                Some(interceptor) => {
                    self.next += 1;
                    interceptor.around_dyn(self).await
                }
                None => {
                    let interface = self.target.interface().to_string();
                    self.target
                        .call(self.arguments)
                        .await
                        .map_err(|source| InvocationError::new(interface, source).into())
                }
            }
        })
    }
}

impl fmt::Debug for MethodInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodInvocation")
            .field("interface", self.interface())
            .field("arguments", &self.arguments)
            .field("message_id", &self.message.id())
            .finish_non_exhaustive()
    }
}

/// Wraps a method invocation.
///
/// Interceptors run in registration order. Not calling
/// [`MethodInvocation::proceed`] short-circuits the rest of the chain.
#[diagnostic::on_unimplemented(
    message = "`{Self}` does not implement `AroundInterceptor`",
    label = "missing `AroundInterceptor` implementation",
    note = "Around interceptors receive the `MethodInvocation` and decide whether to `proceed`."
)]
pub trait AroundInterceptor: Send + Sync + 'static {
    /// Intercept one call.
    fn around(
        &self,
        invocation: MethodInvocation,
    ) -> impl Future<Output = Result<Option<Payload>, MessagingError>> + Send;
}

/// Dynamic object-safe version of [`AroundInterceptor`].
pub trait DynAroundInterceptor: Send + Sync + 'static {
    /// Intercept one call (dynamic dispatch version).
    fn around_dyn(
        &self,
        invocation: MethodInvocation,
    ) -> BoxFuture<'_, Result<Option<Payload>, MessagingError>>;
}

impl<T: AroundInterceptor> DynAroundInterceptor for T {
    fn around_dyn(
        &self,
        invocation: MethodInvocation,
    ) -> BoxFuture<'_, Result<Option<Payload>, MessagingError>> {
        Box::pin(self.around(invocation))
    }
}

/// An around-interceptor backed by an async closure.
pub struct AroundFn<F> {
    f: F,
}

impl<F> AroundFn<F> {
    /// Wrap a closure.
    pub const fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F, Fut> AroundInterceptor for AroundFn<F>
where
    F: Fn(MethodInvocation) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Option<Payload>, MessagingError>> + Send,
{
    async fn around(&self, invocation: MethodInvocation) -> Result<Option<Payload>, MessagingError> {
        (self.f)(invocation).await
    }
}
