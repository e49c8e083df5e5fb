//! Per-case compiler configuration and the injection vocabulary.
//!
//! A [`Configuration`] is built by the config deriver (fixture suites) or by
//! scenario call sites, then handed read-only to the system under test.
//! Injected values are expressed as [`Node`]s, the small value vocabulary the
//! harness and an adapter agree on.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Reserved variable name bound to the url function.
pub const URL_FUNCTION: &str = "url";

// =============================================================================
// VALUE VOCABULARY
// =============================================================================

/// A value injected into, or returned from, a compilation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Node {
    Null,
    Boolean { value: bool },
    Unit { value: f64, unit: Option<String> },
    Ident { name: String },
    /// Quoted string; renders with single quotes.
    String { value: String },
    /// Emitted verbatim.
    Literal { value: String },
    /// Space-separated sequence.
    Expression { nodes: Vec<Node> },
    /// Keyed mapping reachable by member and index access.
    Object { entries: Vec<(String, Node)> },
}

impl Node {
    pub fn unit(value: f64) -> Self {
        Node::Unit { value, unit: None }
    }

    pub fn ident(name: impl Into<String>) -> Self {
        Node::Ident { name: name.into() }
    }

    pub fn string(value: impl Into<String>) -> Self {
        Node::String {
            value: value.into(),
        }
    }

    pub fn literal(value: impl Into<String>) -> Self {
        Node::Literal {
            value: value.into(),
        }
    }

    /// Member lookup on an object node.
    pub fn get(&self, key: &str) -> Option<&Node> {
        let Node::Object { entries } = self else {
            return None;
        };
        entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Positional lookup on an expression node.
    pub fn index(&self, index: usize) -> Option<&Node> {
        let Node::Expression { nodes } = self else {
            return None;
        };
        nodes.get(index)
    }

    /// Converts JSON preserving structure: objects stay objects, arrays
    /// become expressions.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Node::Null,
            Value::Bool(b) => Node::Boolean { value: *b },
            Value::Number(n) => Node::unit(n.as_f64().unwrap_or_default()),
            Value::String(s) => Node::string(s.clone()),
            Value::Array(items) => Node::Expression {
                nodes: items.iter().map(Node::from_json).collect(),
            },
            Value::Object(map) => Node::Object {
                entries: map
                    .iter()
                    .map(|(k, v)| (k.clone(), Node::from_json(v)))
                    .collect(),
            },
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Null => write!(f, "null"),
            Node::Boolean { value } => write!(f, "{value}"),
            Node::Unit { value, unit } => {
                if value.fract() == 0.0 && value.abs() < 1e15 {
                    write!(f, "{}", *value as i64)?;
                } else {
                    write!(f, "{value}")?;
                }
                if let Some(unit) = unit {
                    write!(f, "{unit}")?;
                }
                Ok(())
            }
            Node::Ident { name } => write!(f, "{name}"),
            Node::String { value } => write!(f, "'{value}'"),
            Node::Literal { value } => write!(f, "{value}"),
            Node::Expression { nodes } => {
                for (i, node) in nodes.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{node}")?;
                }
                Ok(())
            }
            Node::Object { entries } => {
                write!(f, "{{")?;
                for (i, (key, node)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{key}:{node}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

// =============================================================================
// VARIABLE DEFINITIONS
// =============================================================================

/// A variable definition. Object-shaped values must pick a mode explicitly;
/// the shape of the value never decides it.
#[derive(Debug, Clone, PartialEq)]
pub enum Definition {
    Value(Node),
    /// Namespaced mapping, reachable as `name.key` and `name.key[0]`.
    Hash(Vec<(String, Node)>),
    /// Positional list of flattened key/value pairs.
    List(Vec<Node>),
}

impl Definition {
    /// Projects a JSON object as a hash.
    pub fn hash(object: &Map<String, Value>) -> Self {
        Definition::Hash(
            object
                .iter()
                .map(|(k, v)| (k.clone(), Node::from_json(v)))
                .collect(),
        )
    }

    /// Flattens a JSON object into `key value key value ...`. Nested objects
    /// are inlined in place, so `{baz: {foo: {quz: "quz"}}}` becomes
    /// `baz foo quz 'quz'`.
    pub fn list(object: &Map<String, Value>) -> Self {
        let mut nodes = Vec::new();
        flatten_into(object, &mut nodes);
        Definition::List(nodes)
    }

    /// The node an adapter binds to the variable name.
    pub fn to_node(&self) -> Node {
        match self {
            Definition::Value(node) => node.clone(),
            Definition::Hash(entries) => Node::Object {
                entries: entries.clone(),
            },
            Definition::List(nodes) => Node::Expression {
                nodes: nodes.clone(),
            },
        }
    }
}

fn flatten_into(object: &Map<String, Value>, out: &mut Vec<Node>) {
    for (key, value) in object {
        out.push(Node::ident(key.clone()));
        match value {
            Value::Object(nested) => flatten_into(nested, out),
            leaf => out.push(Node::from_json(leaf)),
        }
    }
}

impl From<Node> for Definition {
    fn from(node: Node) -> Self {
        Definition::Value(node)
    }
}

/// Plain strings are literals, matching how option globals are rendered.
impl From<&str> for Definition {
    fn from(value: &str) -> Self {
        Definition::Value(Node::literal(value))
    }
}

// =============================================================================
// FUNCTIONS AND PLUGINS
// =============================================================================

/// Functions the system under test provides itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Builtin {
    /// Embeds referenced images as data URIs.
    Url,
    /// Rewrites relative url() references against the importing file.
    UrlResolver,
}

type NativeFn = dyn Fn(&[Node]) -> Result<Node, String> + Send + Sync;

/// A host function callable from the stylesheet.
#[derive(Clone)]
pub struct NativeFunction(Arc<NativeFn>);

impl NativeFunction {
    pub fn new(f: impl Fn(&[Node]) -> Result<Node, String> + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn call(&self, args: &[Node]) -> Result<Node, String> {
        (self.0)(args)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NativeFunction(..)")
    }
}

/// Identity comparison: two handles are equal when they share the closure.
impl PartialEq for NativeFunction {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.0), Arc::as_ptr(&other.0))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Function {
    Builtin(Builtin),
    Native(NativeFunction),
}

impl Function {
    pub fn native(f: impl Fn(&[Node]) -> Result<Node, String> + Send + Sync + 'static) -> Self {
        Function::Native(NativeFunction::new(f))
    }
}

/// The in-progress compilation a plugin configures.
pub trait CompilationContext {
    fn define(&mut self, name: &str, definition: Definition);
    fn define_function(&mut self, name: &str, function: Function);
    fn include(&mut self, path: &Path);
}

type PluginFn = dyn Fn(&mut dyn CompilationContext) + Send + Sync;

/// Side-effecting setup run against the compilation before it proceeds.
#[derive(Clone)]
pub struct Plugin(Arc<PluginFn>);

impl Plugin {
    pub fn new(f: impl Fn(&mut dyn CompilationContext) + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// A plugin that defines a single variable.
    pub fn define(name: impl Into<String>, definition: impl Into<Definition>) -> Self {
        let name = name.into();
        let definition = definition.into();
        Self::new(move |ctx| ctx.define(&name, definition.clone()))
    }

    pub fn apply(&self, ctx: &mut dyn CompilationContext) {
        (self.0)(ctx)
    }
}

impl fmt::Debug for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Plugin(..)")
    }
}

impl PartialEq for Plugin {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.0), Arc::as_ptr(&other.0))
    }
}

/// One plugin or an ordered sequence of them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PluginSet(Vec<Plugin>);

impl PluginSet {
    pub fn iter(&self) -> impl Iterator<Item = &Plugin> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl From<Plugin> for PluginSet {
    fn from(plugin: Plugin) -> Self {
        PluginSet(vec![plugin])
    }
}

impl From<Vec<Plugin>> for PluginSet {
    fn from(plugins: Vec<Plugin>) -> Self {
        PluginSet(plugins)
    }
}

// =============================================================================
// CONFIGURATION
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMapOptions {
    pub inline: bool,
    pub source_root: String,
    pub base_path: String,
}

/// Options for a single compile call. Defaults are all off and empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Configuration {
    pub compress: bool,
    pub include_css: bool,
    pub prefix: Option<String>,
    pub hoist_atrules: bool,
    pub resolve_url: bool,
    pub sourcemap: Option<SourceMapOptions>,
    /// Path of the entry file, used for relative imports and map sources.
    pub filename: Option<PathBuf>,
    /// Import search paths.
    pub include_paths: Vec<PathBuf>,
    pub globals: BTreeMap<String, Definition>,
    pub functions: BTreeMap<String, Function>,
    pub plugins: PluginSet,
}

impl Configuration {
    pub fn compressed() -> Self {
        Self {
            compress: true,
            ..Self::default()
        }
    }

    pub fn with_global(mut self, name: impl Into<String>, definition: impl Into<Definition>) -> Self {
        self.globals.insert(name.into(), definition.into());
        self
    }

    pub fn with_function(mut self, name: impl Into<String>, function: Function) -> Self {
        self.functions.insert(name.into(), function);
        self
    }

    pub fn with_plugins(mut self, plugins: impl Into<PluginSet>) -> Self {
        self.plugins = plugins.into();
        self
    }

    pub fn with_include_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.include_paths.push(path.into());
        self
    }

    /// Returns a copy with every plugin run against it, in order. The copy
    /// carries no plugins, so applying twice is harmless; `self` is untouched.
    pub fn with_plugins_applied(&self) -> Configuration {
        let mut applied = self.clone();
        let plugins = std::mem::take(&mut applied.plugins);
        for plugin in plugins.iter() {
            plugin.apply(&mut applied);
        }
        applied
    }
}

impl CompilationContext for Configuration {
    fn define(&mut self, name: &str, definition: Definition) {
        self.globals.insert(name.to_string(), definition);
    }

    fn define_function(&mut self, name: &str, function: Function) {
        self.functions.insert(name.to_string(), function);
    }

    fn include(&mut self, path: &Path) {
        self.include_paths.push(path.to_path_buf());
    }
}

#[cfg(test)]
mod configuration_tests {
    use serde_json::json;

    use super::*;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn hash_mode_keeps_nested_structure() {
        let def = Definition::hash(&object(json!({
            "bar": [{ "foo": 1 }],
            "baz": { "foo": { "quz": "quz" } }
        })));
        let node = def.to_node();
        let quz = node.get("baz").and_then(|n| n.get("foo")).and_then(|n| n.get("quz"));
        assert_eq!(quz, Some(&Node::string("quz")));
        let foo = node.get("bar").and_then(|n| n.index(0)).and_then(|n| n.get("foo"));
        assert_eq!(foo.map(|n| n.to_string()), Some("1".to_string()));
    }

    #[test]
    fn list_mode_flattens_keys_and_inlines_nested_objects() {
        let def = Definition::list(&object(json!({ "baz": { "foo": { "quz": "quz" } } })));
        assert_eq!(def.to_node().to_string(), "baz foo quz 'quz'");
    }

    #[test]
    fn plain_strings_define_literals() {
        assert_eq!(Definition::from("baz"), Definition::Value(Node::literal("baz")));
    }

    #[test]
    fn plugins_apply_in_order_on_a_copy() {
        let config = Configuration::compressed().with_plugins(vec![
            Plugin::define("bar", "baz"),
            Plugin::define("bar", "fred"),
        ]);
        let applied = config.with_plugins_applied();
        assert_eq!(applied.globals.get("bar"), Some(&Definition::from("fred")));
        assert!(applied.plugins.is_empty());
        assert!(config.globals.is_empty());
        assert_eq!(config.plugins.len(), 2);
    }

    #[test]
    fn single_plugin_converts_to_a_set() {
        let set = PluginSet::from(Plugin::define("qux", "fred"));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn function_handles_compare_by_identity() {
        let f = Function::native(|_| Ok(Node::ident("foobar")));
        let g = Function::native(|_| Ok(Node::ident("foobar")));
        assert_eq!(f, f.clone());
        assert_ne!(f, g);
    }

    #[test]
    fn units_render_without_trailing_zero() {
        assert_eq!(Node::unit(7.0).to_string(), "7");
        assert_eq!(Node::unit(1.5).to_string(), "1.5");
    }
}
