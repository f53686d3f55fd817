//! Model instances and declarative model types.

use std::borrow::Cow;
use std::sync::Arc;

use crate::context::Context;
use crate::driver::{self, Artifact, Driver};
use crate::error::{Error, Result};
use crate::stack::ComponentStack;
use crate::value::{Record, Value};

/// Values bound to the components of one shared stack.
#[derive(Debug, Clone)]
pub struct Model {
    stack: Arc<ComponentStack>,
    values: Record,
}

impl Model {
    pub fn new(stack: Arc<ComponentStack>) -> Self {
        Self {
            stack,
            values: Record::new(),
        }
    }

    /// Wraps an already populated record.
    pub fn from_record(stack: Arc<ComponentStack>, values: Record) -> Self {
        Self { stack, values }
    }

    pub fn stack(&self) -> &Arc<ComponentStack> {
        &self.stack
    }

    /// Raw bound state, including accessor backing entries.
    pub fn values(&self) -> &Record {
        &self.values
    }

    pub fn into_record(self) -> Record {
        self.values
    }

    /// Binds `value` to the component `name`.
    ///
    /// Accessor components store through their setter; constants accept only
    /// their own value.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let component = self.stack.get(name).ok_or_else(|| Error::UnknownComponent {
            stack: self.stack.name().to_owned(),
            component: name.to_owned(),
        })?;
        let value = value.into();
        if let Some(expected) = component.constant_value() {
            if &value != expected {
                return Err(Error::type_mismatch(format!("constant {expected:?}"), value.kind_name()).within(name));
            }
        }
        component.write(&mut self.values, value);
        Ok(())
    }

    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Result<Self> {
        self.set(name, value)?;
        Ok(self)
    }

    /// The value bound to `name`, read through its binding.
    pub fn get(&self, name: &str) -> Option<Cow<'_, Value>> {
        self.stack.get(name)?.read(&self.values)
    }

    pub fn dump(&self, driver: &dyn Driver, ctx: &Context) -> Result<Artifact> {
        let bound = self.stack.bind_values(&self.values, ctx)?;
        tracing::debug!(
            target: "stackcast::model",
            stack = %self.stack.name(),
            driver = driver.name(),
            version = ctx.version(),
            components = bound.len(),
            "dump"
        );
        driver.encode(&bound, ctx)
    }

    /// [`Model::dump`] through a driver of the process-wide registry.
    pub fn dump_with(&self, driver: &str, ctx: &Context) -> Result<Artifact> {
        self.dump(driver::get_driver(driver)?.as_ref(), ctx)
    }

    pub fn load(
        stack: Arc<ComponentStack>,
        driver: &dyn Driver,
        artifact: &Artifact,
        ctx: &Context,
    ) -> Result<Self> {
        let active = stack.filter(ctx)?;
        tracing::debug!(
            target: "stackcast::model",
            stack = %stack.name(),
            driver = driver.name(),
            version = ctx.version(),
            components = active.len(),
            "load"
        );
        let values = driver.decode(&active, artifact, ctx)?;
        if values.len() != active.len() {
            return Err(Error::malformed(
                0,
                format!(
                    "driver `{}` returned {} values for {} components",
                    driver.name(),
                    values.len(),
                    active.len()
                ),
            ));
        }
        let record = stack.rehydrate(&active, values);
        Ok(Self::from_record(stack, record))
    }

    pub fn load_with(
        stack: Arc<ComponentStack>,
        driver: &str,
        artifact: &Artifact,
        ctx: &Context,
    ) -> Result<Self> {
        Self::load(stack, driver::get_driver(driver)?.as_ref(), artifact, ctx)
    }

    /// Structural equality over the components active under `ctx`, each
    /// compared by the value it would be dumped with.
    pub fn equals_at(&self, other: &Model, ctx: &Context) -> bool {
        self.stack.name() == other.stack.name()
            && self.stack.records_equal(&self.values, &other.values, ctx)
    }
}

/// Equality at the latest version.
impl PartialEq for Model {
    fn eq(&self, other: &Self) -> bool {
        self.equals_at(other, &Context::latest())
    }
}

/// A type whose stack is built once, on first use.
///
/// Usually implemented through [`model!`](crate::model!).
pub trait ModelType {
    fn stack() -> Arc<ComponentStack>;

    fn instance() -> Model {
        Model::new(Self::stack())
    }

    fn load(driver: &dyn Driver, artifact: &Artifact, ctx: &Context) -> Result<Model> {
        Model::load(Self::stack(), driver, artifact, ctx)
    }
}

/// Declares a [`ModelType`] from fields listed in serialization order.
///
/// ```
/// use stackcast::{model, BinaryDriver, Context, ModelType, Serializer};
///
/// model! {
///     pub struct Point {
///         x: Serializer::int16(),
///         y: Serializer::int16(),
///         label: Serializer::string() => { added_in(2), with_default("") },
///     }
/// }
///
/// let p = Point::instance().with("x", 1).unwrap().with("y", -1).unwrap();
/// let bytes = p.dump(&BinaryDriver::default(), &Context::at(1)).unwrap();
/// assert_eq!(bytes.as_bytes(), Some(&[0, 1, 0xff, 0xff][..]));
/// ```
///
/// Each field takes a payload (a `Serializer` or a stack) and optionally a
/// list of [`Component`](crate::Component) builder calls.
///
/// # Panics
///
/// `stack()` panics on first use if the declaration is invalid (duplicate
/// field names or an inverted version window).
#[macro_export]
macro_rules! model {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $field:ident : $payload:expr $(=> { $($call:ident ( $($arg:expr),* $(,)? )),* $(,)? })?
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default)]
        $vis struct $name;

        impl $crate::ModelType for $name {
            fn stack() -> ::std::sync::Arc<$crate::ComponentStack> {
                static STACK: ::std::sync::OnceLock<::std::sync::Arc<$crate::ComponentStack>> =
                    ::std::sync::OnceLock::new();
                STACK
                    .get_or_init(|| {
                        let builder = $crate::ComponentStack::builder(stringify!($name))
                            $(
                                .push(
                                    $crate::Component::new(stringify!($field), $payload)
                                        $($( .$call($($arg),*) )*)?
                                )
                            )*;
                        match builder.build() {
                            Ok(stack) => ::std::sync::Arc::new(stack),
                            Err(e) => panic!("invalid model `{}`: {}", stringify!($name), e),
                        }
                    })
                    .clone()
            }
        }
    };
}
