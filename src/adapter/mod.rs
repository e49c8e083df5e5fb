//! The contract boundary to the compiler under test.
//!
//! The harness only ever talks to a [`SystemUnderTest`] handle, constructed
//! once per run and passed in explicitly. Every capability is asynchronous
//! and the harness awaits each call to completion before issuing the next.
//!
//! Compilers that complete synchronously implement
//! [`BlockingSystemUnderTest`] instead and are wrapped in [`Blocking`], which
//! moves each call onto tokio's blocking pool so a per-case timeout can still
//! fire while a call is stuck.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::configuration::Configuration;
use crate::AdapterError;

pub mod process;

/// Marker that precedes an embedded base64 source map in rendered css.
pub const INLINE_SOURCEMAP_MARKER: &str = "sourceMappingURL=data:application/json;base64,";

/// A source map as emitted by the compiler, kept field-for-field so it can be
/// compared structurally against a golden `.map` document.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceMapDocument(Map<String, Value>);

impl SourceMapDocument {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// True when `sourcesContent` is present and holds at least one entry.
    pub fn has_sources_content(&self) -> bool {
        self.get("sourcesContent")
            .and_then(Value::as_array)
            .is_some_and(|content| !content.is_empty())
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

impl TryFrom<Value> for SourceMapDocument {
    type Error = AdapterError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(fields) => Ok(Self(fields)),
            other => Err(AdapterError::Protocol(format!(
                "source map must be a JSON object, got {other}"
            ))),
        }
    }
}

/// Rendered css together with its source map.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileOutput {
    pub css: String,
    pub map: SourceMapDocument,
}

/// The capabilities the harness drives.
#[async_trait]
pub trait SystemUnderTest: Send + Sync {
    /// Renders `source` to css, honoring every option in `config`.
    async fn compile(&self, source: &str, config: &Configuration) -> Result<String, AdapterError>;

    /// Translates css back into preprocessor syntax.
    async fn convert(&self, css: &str) -> Result<String, AdapterError>;

    /// Transitive import closure of `source`, in discovery order.
    async fn dependencies(
        &self,
        source: &str,
        config: &Configuration,
    ) -> Result<Vec<PathBuf>, AdapterError>;

    /// Like [`compile`](Self::compile), also producing a source map. When the
    /// sourcemap options are inline, the css embeds the encoded map.
    async fn compile_with_sourcemap(
        &self,
        source: &str,
        config: &Configuration,
    ) -> Result<CompileOutput, AdapterError>;
}

/// Synchronous form of [`SystemUnderTest`], adapted by [`Blocking`].
pub trait BlockingSystemUnderTest: Send + Sync + 'static {
    fn compile(&self, source: &str, config: &Configuration) -> Result<String, AdapterError>;

    fn convert(&self, css: &str) -> Result<String, AdapterError>;

    fn dependencies(
        &self,
        source: &str,
        config: &Configuration,
    ) -> Result<Vec<PathBuf>, AdapterError>;

    fn compile_with_sourcemap(
        &self,
        source: &str,
        config: &Configuration,
    ) -> Result<CompileOutput, AdapterError>;
}

/// Runs a [`BlockingSystemUnderTest`] behind the async contract.
#[derive(Debug)]
pub struct Blocking<T>(Arc<T>);

impl<T: BlockingSystemUnderTest> Blocking<T> {
    pub fn new(inner: T) -> Self {
        Self(Arc::new(inner))
    }

    pub fn inner(&self) -> &T {
        &self.0
    }
}

async fn run_blocking<R, F>(call: F) -> Result<R, AdapterError>
where
    R: Send + 'static,
    F: FnOnce() -> Result<R, AdapterError> + Send + 'static,
{
    tokio::task::spawn_blocking(call)
        .await
        .map_err(|e| AdapterError::Aborted(e.to_string()))?
}

#[async_trait]
impl<T: BlockingSystemUnderTest> SystemUnderTest for Blocking<T> {
    async fn compile(&self, source: &str, config: &Configuration) -> Result<String, AdapterError> {
        let (inner, source, config) = (Arc::clone(&self.0), source.to_owned(), config.clone());
        run_blocking(move || inner.compile(&source, &config)).await
    }

    async fn convert(&self, css: &str) -> Result<String, AdapterError> {
        let (inner, css) = (Arc::clone(&self.0), css.to_owned());
        run_blocking(move || inner.convert(&css)).await
    }

    async fn dependencies(
        &self,
        source: &str,
        config: &Configuration,
    ) -> Result<Vec<PathBuf>, AdapterError> {
        let (inner, source, config) = (Arc::clone(&self.0), source.to_owned(), config.clone());
        run_blocking(move || inner.dependencies(&source, &config)).await
    }

    async fn compile_with_sourcemap(
        &self,
        source: &str,
        config: &Configuration,
    ) -> Result<CompileOutput, AdapterError> {
        let (inner, source, config) = (Arc::clone(&self.0), source.to_owned(), config.clone());
        run_blocking(move || inner.compile_with_sourcemap(&source, &config)).await
    }
}
