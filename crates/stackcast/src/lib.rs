//! Versioned component-stack serialization.
//!
//! # Overview
//!
//! - [`Serializer`] - leaf type descriptor (integers, floats, strings,
//!   optionals, arrays, nested models).
//! - [`ComponentStack`] - ordered, versioned, filterable set of named
//!   [`Component`]s; the schema of a model.
//! - [`Model`] - values bound to a shared stack; `dump`/`load` through a
//!   [`Driver`].
//! - [`Context`] - immutable per-call parameters, at least a `version`.
//! - [`BinaryDriver`], [`JsonDriver`] - built-in drivers, looked up by name
//!   through [`get_driver`].
//!
//! # Example
//!
//! ```
//! use stackcast::{model, BinaryDriver, Context, ModelType, Serializer};
//!
//! model! {
//!     struct Foo {
//!         bar: Serializer::string(),
//!         baz: Serializer::int32(),
//!         biz: Serializer::int8(),
//!         ext: Serializer::int32() => { added_in(2), with_default(20) },
//!     }
//! }
//!
//! let foo = Foo::instance()
//!     .with("bar", "bar").unwrap()
//!     .with("baz", 1).unwrap()
//!     .with("biz", 2).unwrap()
//!     .with("ext", 3).unwrap();
//!
//! let driver = BinaryDriver::default();
//! let v1 = foo.dump(&driver, &Context::at(1)).unwrap();
//! assert_eq!(v1.as_bytes(), Some(&b"\x03bar\x00\x00\x00\x01\x02"[..]));
//!
//! let old = Foo::load(&driver, &v1, &Context::at(1)).unwrap();
//! assert_eq!(old.get("ext").unwrap().as_i64(), Some(20));
//! ```

mod component;
mod config;
mod constraint;
mod context;
mod error;
mod model;
mod serializer;
mod stack;
mod value;

pub mod driver;

pub use component::{Accessor, Binding, Component, Payload, VersionWindow};
pub use config::{BinaryOptions, ByteOrder, JsonOptions, LengthPrefix, RegistryConfig};
pub use constraint::{Constraint, ConstraintPolicy};
pub use context::{Context, LATEST};
pub use driver::{
    get_driver, Artifact, ArtifactKind, BinaryDriver, Driver, DriverRegistry, JsonDriver,
};
pub use error::{Error, Result};
pub use model::{Model, ModelType};
pub use serializer::{FloatWidth, IntWidth, Kind, Serializer};
pub use stack::{
    ComponentFilter, ComponentSchema, ComponentStack, Exclude, StackBuilder, StackSchema, Toggle,
};
pub use value::{Record, Value};
