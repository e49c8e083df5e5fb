// Sequential suite execution: ignore lists, error isolation, timeouts.

mod common;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use common::{write_fixture, ScriptedCompiler};
use stylus_conformance::adapter::{Blocking, CompileOutput, SystemUnderTest};
use stylus_conformance::configuration::Configuration;
use stylus_conformance::discovery::{Case, CaseKind};
use stylus_conformance::fixtures::{register_fixture_suite, standard_runner, FixtureLayout};
use stylus_conformance::report::FailureDetail;
use stylus_conformance::settings::SuiteSelector;
use stylus_conformance::suite::{CaseExecutor, CaseOutcome, SuiteRunner};
use stylus_conformance::{AdapterError, ErrorKind, HarnessError};
use tempfile::tempdir;

/// Records the order in which cases are executed.
#[derive(Default)]
struct OrderRecorder {
    seen: Mutex<Vec<String>>,
}

#[async_trait]
impl CaseExecutor for OrderRecorder {
    async fn execute(&self, case: &Case) -> Result<CaseOutcome, HarnessError> {
        self.seen.lock().unwrap().push(case.id.clone());
        Ok(Ok(()))
    }
}

fn case(id: &str) -> Case {
    Case::new(id, PathBuf::new(), PathBuf::new(), CaseKind::Render)
}

#[tokio::test]
async fn suites_and_cases_run_in_registration_order() {
    let recorder = Arc::new(OrderRecorder::default());
    let mut runner = SuiteRunner::new();
    runner.register("first", vec![case("b"), case("a")], recorder.clone(), Vec::<String>::new());
    runner.register("second", vec![case("c")], recorder.clone(), Vec::<String>::new());

    let report = runner.run().await;
    assert_eq!(*recorder.seen.lock().unwrap(), vec!["b", "a", "c"]);
    let names: Vec<_> = report.suites.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["first", "second"]);
    assert_eq!(report.summary().passed, 3);
}

#[tokio::test]
async fn ignored_cases_never_reach_the_compiler() {
    let dir = tempdir().unwrap();
    write_fixture(dir.path(), "cases/index.styl", "index { a: b }");
    write_fixture(dir.path(), "cases/index.css", "");
    write_fixture(dir.path(), "cases/regression.1112.styl", "skip { a: b }");
    write_fixture(dir.path(), "cases/regression.1112.css", "");
    write_fixture(dir.path(), "cases/basic.styl", "a { color: red }");
    write_fixture(dir.path(), "cases/basic.css", "a{color:red}");
    let layout = FixtureLayout::new(dir.path());

    let compiler = Arc::new(Blocking::new(ScriptedCompiler::new()));
    let mut runner = SuiteRunner::new();
    register_fixture_suite(
        &mut runner,
        SuiteSelector::Integration,
        &layout,
        compiler.clone(),
        &["regression 1112".to_string()],
    )
    .unwrap();

    let report = runner.run().await;
    let suite = report.suite("integration").unwrap();
    assert_eq!(suite.ignored, vec!["index", "regression.1112"]);
    assert_eq!(suite.results.len(), 1);
    assert!(suite.results[0].passed);
    assert_eq!(compiler.inner().compiled_sources(), vec!["a { color: red }"]);
}

#[tokio::test]
async fn a_failing_case_is_recorded_and_the_suite_continues() {
    let dir = tempdir().unwrap();
    write_fixture(dir.path(), "cases/a-broken.styl", "@error unexpected }");
    write_fixture(dir.path(), "cases/a-broken.css", "");
    write_fixture(dir.path(), "cases/b-missing-golden.styl", "a { b: c }");
    write_fixture(dir.path(), "cases/c-ok.styl", "a { b: c }");
    write_fixture(dir.path(), "cases/c-ok.css", "a{b:c}\n");
    let layout = FixtureLayout::new(dir.path());

    let compiler = Arc::new(Blocking::new(ScriptedCompiler::new()));
    let runner = standard_runner(&layout, compiler, &[SuiteSelector::Integration]).unwrap();
    let report = runner.run().await;
    let suite = report.suite("integration").unwrap();

    assert_eq!(suite.results.len(), 3);
    match &suite.result("a-broken").unwrap().diff {
        Some(FailureDetail::Error { kind, message }) => {
            assert_eq!(*kind, ErrorKind::Compile);
            assert!(message.contains("unexpected }"), "{message}");
        }
        other => panic!("expected a compile error, got {other:?}"),
    }
    match &suite.result("b-missing-golden").unwrap().diff {
        Some(FailureDetail::Error { kind, .. }) => assert_eq!(*kind, ErrorKind::Fixture),
        other => panic!("expected a fixture error, got {other:?}"),
    }
    assert!(suite.result("c-ok").unwrap().passed);
    assert!(report.has_failures());
}

/// Never answers within any reasonable budget.
struct Hanging;

#[async_trait]
impl SystemUnderTest for Hanging {
    async fn compile(&self, _: &str, _: &Configuration) -> Result<String, AdapterError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(String::new())
    }

    async fn convert(&self, _: &str) -> Result<String, AdapterError> {
        Ok(String::new())
    }

    async fn dependencies(&self, _: &str, _: &Configuration) -> Result<Vec<PathBuf>, AdapterError> {
        Ok(Vec::new())
    }

    async fn compile_with_sourcemap(
        &self,
        _: &str,
        _: &Configuration,
    ) -> Result<CompileOutput, AdapterError> {
        Err(AdapterError::Unsupported("sourcemaps".into()))
    }
}

#[tokio::test]
async fn a_hung_case_times_out_and_is_recorded() {
    let dir = tempdir().unwrap();
    write_fixture(dir.path(), "cases/slow.styl", "a { b: c }");
    write_fixture(dir.path(), "cases/slow.css", "a{b:c}");
    let layout = FixtureLayout::new(dir.path());

    let runner = standard_runner(&layout, Arc::new(Hanging), &[SuiteSelector::Integration])
        .unwrap()
        .with_case_timeout(Some(Duration::from_millis(50)));
    let report = runner.run().await;

    let result = report.suite("integration").unwrap().result("slow").unwrap();
    assert!(!result.passed);
    match &result.diff {
        Some(FailureDetail::Error { kind, .. }) => assert_eq!(*kind, ErrorKind::Timeout),
        other => panic!("expected a timeout, got {other:?}"),
    }
}

/// Panics on the case named `boom`.
struct Panicky;

#[async_trait]
impl CaseExecutor for Panicky {
    async fn execute(&self, case: &Case) -> Result<CaseOutcome, HarnessError> {
        if case.id == "boom" {
            panic!("executor blew up");
        }
        Ok(Ok(()))
    }
}

#[tokio::test]
async fn a_panicking_case_is_recorded_as_internal_and_the_run_continues() {
    let mut runner = SuiteRunner::new();
    runner.register("panics", vec![case("boom"), case("fine")], Arc::new(Panicky), Vec::<String>::new());
    runner.register("after", vec![case("later")], Arc::new(Panicky), Vec::<String>::new());

    let report = runner.run().await;
    let suite = report.suite("panics").unwrap();
    match &suite.result("boom").unwrap().diff {
        Some(FailureDetail::Error { kind, .. }) => assert_eq!(*kind, ErrorKind::Internal),
        other => panic!("expected an internal error, got {other:?}"),
    }
    assert!(suite.result("fine").unwrap().passed);
    assert!(report.suite("after").unwrap().result("later").unwrap().passed);
}

/// Finishes well after the case budget and notes that it did.
struct Overrunning {
    finished: Arc<Mutex<bool>>,
}

#[async_trait]
impl CaseExecutor for Overrunning {
    async fn execute(&self, _: &Case) -> Result<CaseOutcome, HarnessError> {
        tokio::time::sleep(Duration::from_millis(200)).await;
        *self.finished.lock().unwrap() = true;
        Ok(Ok(()))
    }
}

#[tokio::test]
async fn a_timed_out_case_stops_running() {
    let finished = Arc::new(Mutex::new(false));
    let mut runner = SuiteRunner::new().with_case_timeout(Some(Duration::from_millis(20)));
    runner.register(
        "slow",
        vec![case("overrun")],
        Arc::new(Overrunning {
            finished: finished.clone(),
        }),
        Vec::<String>::new(),
    );

    let report = runner.run().await;
    assert!(report.has_failures());
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(!*finished.lock().unwrap());
}
