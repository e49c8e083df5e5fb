//! Shared helpers for integration tests: an in-memory compiler double and
//! fixture-tree builders.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::{json, Value};
use stylus_conformance::adapter::{
    BlockingSystemUnderTest, CompileOutput, SourceMapDocument, INLINE_SOURCEMAP_MARKER,
};
use stylus_conformance::configuration::{Configuration, Function, Node};
use stylus_conformance::normalize::normalize;
use stylus_conformance::AdapterError;

/// One call seen by [`ScriptedCompiler`].
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub op: &'static str,
    pub source: String,
    pub config: Option<Configuration>,
}

/// A compiler double.
///
/// Sources registered with [`ScriptedCompiler::render`] return canned output.
/// Anything else of the form `sel { prop: expr; ... }` is evaluated against
/// the configuration's globals, functions and plugins and printed
/// compressed. `@import "name"` reads `name.styl` from the include paths and
/// compiles its content. A source containing `@error` fails to compile.
#[derive(Debug, Default)]
pub struct ScriptedCompiler {
    canned: HashMap<String, String>,
    deps: HashMap<String, Vec<PathBuf>>,
    maps: HashMap<String, Value>,
    leaky_cache: bool,
    seen: Mutex<HashSet<String>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(mut self, source: &str, output: &str) -> Self {
        self.canned.insert(normalize(source), output.to_string());
        self
    }

    pub fn deps(mut self, source: &str, deps: &[&str]) -> Self {
        self.deps
            .insert(normalize(source), deps.iter().map(PathBuf::from).collect());
        self
    }

    pub fn sourcemap(mut self, source: &str, map: Value) -> Self {
        self.maps.insert(normalize(source), map);
        self
    }

    /// Models an import cache that hands out nodes mutated by an earlier
    /// compile: any content compiled a second time comes back altered.
    pub fn leaky(mut self) -> Self {
        self.leaky_cache = true;
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn compiled_sources(&self) -> Vec<String> {
        self.calls().into_iter().map(|call| call.source).collect()
    }

    fn record(&self, op: &'static str, source: &str, config: Option<&Configuration>) {
        self.calls.lock().unwrap().push(RecordedCall {
            op,
            source: source.to_string(),
            config: config.cloned(),
        });
    }

    fn render_source(&self, source: &str, config: &Configuration) -> Result<String, AdapterError> {
        if let Some(message) = source.split("@error").nth(1) {
            return Err(AdapterError::Compile(message.trim().to_string()));
        }
        let key = normalize(source);
        let css = match self.canned.get(&key) {
            Some(css) => css.clone(),
            None => {
                if let Some(rest) = key.strip_prefix("@import") {
                    let name = rest.trim().trim_matches('"');
                    let path = config
                        .include_paths
                        .iter()
                        .map(|dir| dir.join(format!("{name}.styl")))
                        .find(|path| path.is_file())
                        .ok_or_else(|| {
                            AdapterError::Compile(format!("failed to locate @import file {name}"))
                        })?;
                    let content = fs::read_to_string(&path)?;
                    return self.render_source(&content, config);
                }
                evaluate_stylesheet(&key, config)?
            }
        };
        let repeated = !self.seen.lock().unwrap().insert(key);
        if self.leaky_cache && repeated {
            return Ok(format!("{css}body{{color:#f00}}"));
        }
        Ok(css)
    }
}

impl BlockingSystemUnderTest for ScriptedCompiler {
    fn compile(&self, source: &str, config: &Configuration) -> Result<String, AdapterError> {
        self.record("compile", source, Some(config));
        self.render_source(source, config)
    }

    fn convert(&self, css: &str) -> Result<String, AdapterError> {
        self.record("convert", css, None);
        self.canned
            .get(&normalize(css))
            .cloned()
            .ok_or_else(|| AdapterError::Compile("cannot convert".into()))
    }

    fn dependencies(&self, source: &str, config: &Configuration) -> Result<Vec<PathBuf>, AdapterError> {
        self.record("deps", source, Some(config));
        Ok(self.deps.get(&normalize(source)).cloned().unwrap_or_default())
    }

    fn compile_with_sourcemap(
        &self,
        source: &str,
        config: &Configuration,
    ) -> Result<CompileOutput, AdapterError> {
        self.record("sourcemap", source, Some(config));
        let mut css = self.render_source(source, config)?;
        let inline = config.sourcemap.as_ref().is_some_and(|options| options.inline);
        let map = if inline {
            css.push_str(&format!("\n/*# {INLINE_SOURCEMAP_MARKER}eyJ2ZXJzaW9uIjozfQ== */"));
            json!({ "version": 3, "sourcesContent": [source] })
        } else {
            self.maps
                .get(&normalize(source))
                .cloned()
                .unwrap_or_else(|| json!({ "version": 3 }))
        };
        Ok(CompileOutput {
            css,
            map: SourceMapDocument::try_from(map)?,
        })
    }
}

/// Prints `sel { a: x; b: y }` as `sel{a:x;b:y}` with each value evaluated.
fn evaluate_stylesheet(source: &str, config: &Configuration) -> Result<String, AdapterError> {
    let config = config.with_plugins_applied();
    let (selector, rest) = source
        .split_once('{')
        .ok_or_else(|| AdapterError::Compile(format!("expected a block: {source}")))?;
    let body = rest
        .rsplit_once('}')
        .map(|(body, _)| body)
        .ok_or_else(|| AdapterError::Compile("unclosed block".into()))?;

    let mut declarations = Vec::new();
    for declaration in body.split(';').map(str::trim).filter(|d| !d.is_empty()) {
        let (property, value) = declaration
            .split_once(':')
            .ok_or_else(|| AdapterError::Compile(format!("bad declaration: {declaration}")))?;
        let value = evaluate(value.trim(), &config)?;
        declarations.push(format!("{}:{value}", property.trim()));
    }
    Ok(format!("{}{{{}}}", selector.trim(), declarations.join(";")))
}

fn evaluate(expr: &str, config: &Configuration) -> Result<String, AdapterError> {
    if let Some((name, args)) = expr.strip_suffix(')').and_then(|e| e.split_once('(')) {
        let args = args
            .split(',')
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(|a| {
                a.parse::<f64>()
                    .map(Node::unit)
                    .map_err(|_| AdapterError::Compile(format!("bad argument {a}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        return match config.functions.get(name.trim()) {
            Some(Function::Native(function)) => function
                .call(&args)
                .map(|node| node.to_string())
                .map_err(AdapterError::Compile),
            Some(Function::Builtin(builtin)) => Ok(format!("{builtin:?}")),
            None => Ok(expr.to_string()),
        };
    }

    let root_end = expr.find(['.', '[']).unwrap_or(expr.len());
    let Some(definition) = config.globals.get(&expr[..root_end]) else {
        return Ok(expr.to_string());
    };
    let mut node = definition.to_node();
    let mut rest = &expr[root_end..];
    while !rest.is_empty() {
        let next = if let Some(tail) = rest.strip_prefix('.') {
            let end = tail.find(['.', '[']).unwrap_or(tail.len());
            let member = node.get(&tail[..end]).cloned();
            rest = &tail[end..];
            member
        } else if let Some(tail) = rest.strip_prefix('[') {
            let (index, after) = tail
                .split_once(']')
                .ok_or_else(|| AdapterError::Compile("unclosed index".into()))?;
            rest = after;
            index.parse().ok().and_then(|i| node.index(i).cloned())
        } else {
            return Err(AdapterError::Compile(format!("bad member access in {expr}")));
        };
        node = next.unwrap_or(Node::Null);
    }
    Ok(node.to_string())
}

/// Writes `content` to `root/relative`, creating parent directories.
pub fn write_fixture(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

pub const CLONE_FRAGMENT: &str = "body\n  background linear-gradient(from bottom, red, blue)\n";
pub const CLONE_CSS: &str = "body{background:linear-gradient(from bottom,#f00,#00f)}";
pub const CLONE2_FRAGMENT: &str = "@import 'clone'\nbody\n  color blue\n";
pub const CLONE2_CSS: &str =
    "body{color:#f00}body{color:#00f}body{color:#00f}body{color:#00f}body{color:#008000}";

/// Writes the import fixtures used by the cloning scenarios.
pub fn write_import_fixtures(import_dir: &Path) {
    fs::create_dir_all(import_dir).unwrap();
    fs::write(import_dir.join("clone.styl"), CLONE_FRAGMENT).unwrap();
    fs::write(import_dir.join("clone2.styl"), CLONE2_FRAGMENT).unwrap();
}

/// A compiler that knows the import fixtures' expected output.
pub fn compiler_with_import_fixtures() -> ScriptedCompiler {
    ScriptedCompiler::new()
        .render(CLONE_FRAGMENT, CLONE_CSS)
        .render(CLONE2_FRAGMENT, CLONE2_CSS)
}
