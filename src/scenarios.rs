//! Direct contract checks that golden files cannot express.
//!
//! Each scenario feeds literal input through the adapter and compares the
//! compressed output with a known string. The import scenarios compile a
//! fragment directly and then through `@import` on the same handle, so an
//! import cache that hands out shared, mutated nodes shows up as a
//! difference between the two renders.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::adapter::SystemUnderTest;
use crate::compare::compare_text;
use crate::configuration::{Configuration, Definition, Function, Node, Plugin};
use crate::discovery::{Case, CaseKind};
use crate::normalize::{read_fixture, read_fixture_raw};
use crate::suite::{CaseExecutor, CaseOutcome, SuiteRunner};
use crate::{err_msg, HarnessError};

const CLONE_CSS: &str = "body{background:linear-gradient(from bottom,#f00,#00f)}";
const CLONE2_CSS: &str =
    "body{color:#f00}body{color:#00f}body{color:#00f}body{color:#00f}body{color:#008000}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    ObjectAsHash,
    ObjectAsList,
    Globals,
    Functions,
    Plugins,
    ImportCloning,
    ImportCloningRepeated,
}

impl Scenario {
    pub const ALL: [Scenario; 7] = [
        Scenario::ObjectAsHash,
        Scenario::ObjectAsList,
        Scenario::Globals,
        Scenario::Functions,
        Scenario::Plugins,
        Scenario::ImportCloning,
        Scenario::ImportCloningRepeated,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Scenario::ObjectAsHash => "define-a-variable-with-object-as-hash",
            Scenario::ObjectAsList => "define-a-variable-with-object-as-list",
            Scenario::Globals => "use-variable-from-options-object",
            Scenario::Functions => "use-functions-from-options-object",
            Scenario::Plugins => "use-plugins-from-options-object",
            Scenario::ImportCloning => "import-cloning-with-cache",
            Scenario::ImportCloningRepeated => "import-cloning-with-cache-2",
        }
    }

    pub fn from_id(id: &str) -> Option<Scenario> {
        Self::ALL.into_iter().find(|s| s.id() == id)
    }
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn add(args: &[Node]) -> Result<Node, String> {
    match args {
        [Node::Unit { value: a, unit }, Node::Unit { value: b, .. }] => Ok(Node::Unit {
            value: a + b,
            unit: unit.clone(),
        }),
        _ => Err(format!("add() expects two units, got {args:?}")),
    }
}

fn something(_args: &[Node]) -> Result<Node, String> {
    Ok(Node::ident("foobar"))
}

/// Runs the fixed scenario list against one system under test.
pub struct ScenarioSuite {
    sut: Arc<dyn SystemUnderTest>,
    import_dir: PathBuf,
}

impl ScenarioSuite {
    /// `import_dir` holds `clone.styl` and `clone2.styl`.
    pub fn new(sut: Arc<dyn SystemUnderTest>, import_dir: impl Into<PathBuf>) -> Self {
        Self {
            sut,
            import_dir: import_dir.into(),
        }
    }

    /// One case per scenario. Only the import scenarios reference files.
    pub fn cases(&self) -> Vec<Case> {
        Scenario::ALL
            .into_iter()
            .map(|scenario| {
                let source = match scenario {
                    Scenario::ImportCloning => self.import_dir.join("clone.styl"),
                    Scenario::ImportCloningRepeated => self.import_dir.join("clone2.styl"),
                    _ => PathBuf::new(),
                };
                Case::new(scenario.id(), source, PathBuf::new(), CaseKind::Render)
            })
            .collect()
    }

    /// Registers the scenarios as a suite named `name`.
    pub fn register(self, runner: &mut SuiteRunner, name: &str) {
        let cases = self.cases();
        runner.register(name, cases, Arc::new(self), std::iter::empty::<&str>());
    }

    pub async fn run_scenario(&self, scenario: Scenario) -> Result<CaseOutcome, HarnessError> {
        match scenario {
            Scenario::ObjectAsHash => {
                let config = Configuration::compressed().with_global(
                    "test-obj",
                    Definition::hash(&object(json!({
                        "bar": [{ "foo": 1 }],
                        "baz": { "foo": { "quz": "quz" } }
                    }))),
                );
                self.expect(
                    "body { foo: test-obj.baz.foo.quz; bar: test-obj.bar[0].foo  }",
                    &config,
                    "body{foo:'quz';bar:1}",
                )
                .await
            }
            Scenario::ObjectAsList => {
                let config = Configuration::compressed().with_global(
                    "test-obj",
                    Definition::list(&object(json!({ "baz": { "foo": { "quz": "quz" } } }))),
                );
                self.expect("body { foo: test-obj  }", &config, "body{foo:baz foo quz 'quz'}")
                    .await
            }
            Scenario::Globals => {
                let config = Configuration::compressed().with_global("bar", "baz");
                self.expect("body { foo: bar  }", &config, "body{foo:baz}").await
            }
            Scenario::Functions => {
                let config = Configuration::compressed()
                    .with_function("add", Function::native(add))
                    .with_function("something", Function::native(something));
                self.expect(
                    "body { foo: add(4, 3); bar: something() }",
                    &config,
                    "body{foo:7;bar:foobar}",
                )
                .await
            }
            Scenario::Plugins => {
                let single = Configuration::compressed()
                    .with_plugins(Plugin::define("bar", Node::literal("baz")));
                if let Err(mismatch) = self.expect("body { foo: bar  }", &single, "body{foo:baz}").await? {
                    return Ok(Err(mismatch));
                }
                let sequence = Configuration::compressed().with_plugins(vec![
                    Plugin::define("bar", Node::literal("baz")),
                    Plugin::define("qux", Node::literal("fred")),
                ]);
                self.expect("body { foo: bar; foo: qux  }", &sequence, "body{foo:baz;foo:fred}")
                    .await
            }
            Scenario::ImportCloning => {
                let fragment = read_fixture(&self.import_dir.join("clone.styl"))?;
                self.expect_import_isolation(&fragment, "clone", CLONE_CSS).await
            }
            Scenario::ImportCloningRepeated => {
                let fragment = read_fixture_raw(&self.import_dir.join("clone2.styl"))?;
                self.expect_import_isolation(&fragment, "clone2", CLONE2_CSS).await
            }
        }
    }

    async fn expect(
        &self,
        source: &str,
        config: &Configuration,
        expected: &str,
    ) -> Result<CaseOutcome, HarnessError> {
        let css = self.sut.compile(source, config).await?;
        Ok(compare_text(&css, expected))
    }

    /// Direct compile and `@import` compile must both equal `expected`.
    async fn expect_import_isolation(
        &self,
        fragment: &str,
        import_name: &str,
        expected: &str,
    ) -> Result<CaseOutcome, HarnessError> {
        let direct = Configuration::compressed();
        if let Err(mismatch) = self.expect(fragment, &direct, expected).await? {
            return Ok(Err(mismatch));
        }
        let imported = Configuration::compressed().with_include_path(&self.import_dir);
        self.expect(&format!("@import \"{import_name}\""), &imported, expected)
            .await
    }
}

#[async_trait]
impl CaseExecutor for ScenarioSuite {
    async fn execute(&self, case: &Case) -> Result<CaseOutcome, HarnessError> {
        let scenario = Scenario::from_id(&case.id)
            .ok_or_else(|| err_msg!(Internal, "unknown scenario '{}'", case.id))?;
        self.run_scenario(scenario).await
    }
}

#[cfg(test)]
mod scenario_tests {
    use super::*;

    #[test]
    fn ids_round_trip_and_are_unique() {
        for scenario in Scenario::ALL {
            assert_eq!(Scenario::from_id(scenario.id()), Some(scenario));
        }
        let mut ids: Vec<_> = Scenario::ALL.iter().map(Scenario::id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), Scenario::ALL.len());
    }

    #[test]
    fn add_sums_units() {
        assert_eq!(add(&[Node::unit(4.0), Node::unit(3.0)]), Ok(Node::unit(7.0)));
        assert!(add(&[Node::unit(4.0)]).is_err());
        assert_eq!(something(&[]).map(|n| n.to_string()), Ok("foobar".to_string()));
    }
}
