/*!
Weft unit testing library

This is a crate for writing unit tests for code that renders Weft templates.
It is used by the integration tests of the Weft engine itself,
    so those tests are good examples of what this crate can do.

## Test types

The crate offers a few different types of tests.

### Render tests

Run using [`run_render_test`].

These tests verify that a template renders to a specific output.
For example, a render test can verify that
```text
#set($x = 1 + 2)$x
```
renders to `3`.
The test fails if the render produces any diagnostics;
    templates that are expected to produce diagnostics are tested with diagnostic tests instead.

### Diagnostic tests

Run using [`run_diagnostic_test`].

These tests verify that a template renders to a specific output
    and that rendering produced at least one diagnostic.
This is how the graceful degradation of undefined references,
    division by zero and similar problems is tested.

### Failure tests

Run using [`run_failure_test`].

These tests verify that a template fails to compile or fails to render.

### Concurrency tests

Run using [`run_concurrency_test`].

These tests render one compiled template from many threads at once,
    each with its own binding of `$x`, and verify that every thread sees
    exactly what a sequential render with the same binding produces.

## The test suite macro

All of the test types can be run using the run functions described above.
However the preferred way to write a suite of unit tests is to use the [`test_suite`] macro.
This macro removes a bunch of boilerplate and makes it easy to add new test cases.
*/

use std::sync::Arc;

use weft::engine::MemoryResourceLoader;
use weft::render::diagnostics::RecordingDiagnostics;
use weft::*;

/// Option passed to a test runner.
pub enum TestOption<'a> {
    /// The engine configuration is the result of invoking the provided static function.
    ///
    /// Overrides previous `Config` options.
    Config(fn() -> Config),

    /// The context of the render is the result of invoking the provided static function.
    ///
    /// Overrides previous `Context` or `ContextDyn` options.
    Context(fn() -> MapContext),

    /// The context of the render is the result of invoking the provided closure.
    ///
    /// Overrides previous `Context` or `ContextDyn` options.
    ContextDyn(Box<dyn Fn() -> MapContext + 'a>),

    /// Resources available to `#include` and `#parse`, as (name, source) pairs.
    ///
    /// Adds to previous `Resources` options.
    Resources(&'a [(&'a str, &'a str)]),

    /// The provided static function is invoked on the engine builder before the engine is built.
    /// This can be used to register event handlers or a custom introspector.
    ///
    /// Overrides previous `CustomEngine` options.
    CustomEngine(fn(EngineBuilder) -> EngineBuilder),
}

struct ResolvedOptions<'a> {
    config: fn() -> Config,
    context: &'a dyn Fn() -> MapContext,
    resources: Vec<(&'a str, &'a str)>,
    custom_engine: fn(EngineBuilder) -> EngineBuilder,
}

impl<'a> ResolvedOptions<'a> {
    fn new(options: &'a [TestOption<'a>]) -> Self {
        let mut resolved = Self {
            config: Config::default,
            context: &MapContext::new,
            resources: vec![],
            custom_engine: |builder| builder,
        };
        for option in options {
            match option {
                TestOption::Config(f) => resolved.config = *f,
                TestOption::Context(f) => resolved.context = f,
                TestOption::ContextDyn(f) => resolved.context = f,
                TestOption::Resources(r) => resolved.resources.extend(r.iter().copied()),
                TestOption::CustomEngine(f) => resolved.custom_engine = *f,
            }
        }
        resolved
    }

    fn engine(&self, diagnostics: Arc<RecordingDiagnostics>) -> Engine {
        let mut loader = MemoryResourceLoader::new();
        for (name, source) in &self.resources {
            loader.insert(*name, *source);
        }
        let builder = Engine::builder()
            .config((self.config)())
            .resource_loader(loader)
            .diagnostics(diagnostics);
        (self.custom_engine)(builder).build()
    }
}

/// Compile and render a template, returning the output and the diagnostics.
fn render(input: &str, options: &ResolvedOptions) -> (Result<String, Error>, Vec<String>) {
    let diagnostics = Arc::new(RecordingDiagnostics::default());
    let engine = options.engine(diagnostics.clone());
    let mut ctx = (options.context)();
    let result = engine.evaluate("testing.wft", input, &mut ctx);
    (result, diagnostics.messages())
}

fn check_output(input: &str, expected: &str, result: Result<String, Error>) {
    let output = match result {
        Ok(output) => output,
        Err(err) => {
            println!("{err}");
            panic!("Render test failed: the template did not render");
        }
    };
    if output != expected {
        println!("Render output is different:");
        println!("------[input]------");
        println!("'{input}'");
        println!("------[expected]---");
        println!("'{expected}'");
        println!("------[actual]-----");
        println!("'{output}'");
        println!("-------------------");
        panic!("Render test failed");
    }
}

/// Run a render test.
///
/// The test passes if the input renders to the expected output without diagnostics.
pub fn run_render_test(input: &str, expected: &str, options: &[TestOption]) {
    let options = ResolvedOptions::new(options);
    let (result, diagnostics) = render(input, &options);
    check_output(input, expected, result);
    if !diagnostics.is_empty() {
        for diagnostic in &diagnostics {
            println!("{diagnostic}");
        }
        panic!(
            "did not expect diagnostics but had {} diagnostics",
            diagnostics.len()
        );
    }
}

/// Run a diagnostic test.
///
/// The test passes if the input renders to the expected output and at least one
///     diagnostic was reported.
pub fn run_diagnostic_test(input: &str, expected: &str, options: &[TestOption]) {
    let options = ResolvedOptions::new(options);
    let (result, diagnostics) = render(input, &options);
    check_output(input, expected, result);
    if diagnostics.is_empty() {
        panic!("expected diagnostics but didn't have any");
    }
}

/// Run a failure test.
///
/// The test passes if the input fails to compile or to render.
pub fn run_failure_test(input: &str, options: &[TestOption]) {
    let options = ResolvedOptions::new(options);
    let (result, _) = render(input, &options);
    if let Ok(output) = result {
        println!("Render succeeded:");
        println!("{output}");
        panic!("Failure test did not pass: render successful");
    }
}

/// Run a concurrency test.
///
/// The input is compiled once and rendered from `num_threads` threads at the same time.
/// Thread `i` binds `$x` to the integer `i` on top of the configured context and
///     renders several times.
/// The test passes if every render produces the output of a sequential render
///     with the same binding.
pub fn run_concurrency_test(input: &str, num_threads: usize, options: &[TestOption]) {
    let options = ResolvedOptions::new(options);
    let diagnostics = Arc::new(RecordingDiagnostics::default());
    let engine = options.engine(diagnostics);
    let template = match engine.compile("testing.wft", input) {
        Ok(template) => template,
        Err(err) => {
            println!("{err}");
            panic!("Concurrency test failed: the template did not compile");
        }
    };
    let context = |i: usize| {
        let mut ctx = (options.context)();
        ctx.put("x", Value::from(i));
        ctx
    };
    let expected: Vec<String> = (0..num_threads)
        .map(|i| {
            engine
                .render_to_string(&template, &mut context(i))
                .unwrap_or_else(|err| panic!("sequential render failed:\n{err}"))
        })
        .collect();
    let contexts: Vec<MapContext> = (0..num_threads).map(context).collect();
    let outputs: Vec<Vec<String>> = std::thread::scope(|scope| {
        let handles: Vec<_> = contexts
            .into_iter()
            .map(|mut ctx| {
                let engine = &engine;
                let template = &template;
                scope.spawn(move || {
                    (0..8)
                        .map(|_| {
                            engine
                                .render_to_string(template, &mut ctx)
                                .unwrap_or_else(|err| panic!("concurrent render failed:\n{err}"))
                        })
                        .collect::<Vec<String>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect()
    });
    for (i, (outputs, expected)) in outputs.iter().zip(expected.iter()).enumerate() {
        for output in outputs {
            if output != expected {
                println!("Thread {i} rendered '{output}' but expected '{expected}'");
                panic!("Concurrency test failed");
            }
        }
    }
}

/// Macro to generate a suite of unit tests
///
/// The general use of this macros looks like this:
/// ```
/// # use weft_testing::*;
/// test_suite![
///     options(TestOption::Context(|| weft::MapContext::new().with("name", "World"))),
///     render_tests(
///         (case_1, "Hello $name", "Hello World"),
///     ),
///     diagnostic_tests(
///         (case_2, "$missing", "$missing"),
///     ),
///     failure_tests(
///         (case_3, "#if($name)"),
///     ),
///     concurrency_tests(
///         (case_4, "$x-$name", 8),
///     ),
/// ];
/// ```
///
/// The arguments to the macro are:
///
/// - `options(option_1, option_2, ..., option_n)`: options to pass to the test runner.
///     This is a list of values of type [TestOption].
///     The options can be omitted, in which case no options are passed.
///
/// - `render_tests(cases...)`: a list of render test cases.
///     Each case is of the form (case name, input, expected output).
///     The data here is fed into the [run_render_test] test runner.
///
/// - `diagnostic_tests(cases...)`: a list of diagnostic test cases.
///     Each case is of the form (case name, input, expected output).
///     The data here is fed into the [run_diagnostic_test] test runner.
///
/// - `failure_tests(cases...)`: a list of failure test cases.
///     Each case is of the form (case name, input).
///     The data here is fed into the [run_failure_test] test runner.
///
/// - `concurrency_tests(cases...)`: a list of concurrency test cases.
///     Each case is of the form (case name, input, number of threads).
///     The data here is fed into the [run_concurrency_test] test runner.
///
/// Only one `options()` argument may be provided, and if provided it must be in the first position.
/// Zero or more of the other arguments may be provided, and in any order.
#[macro_export]
macro_rules! test_suite {
    ( options $options: tt, render_tests ( $( ($name: ident, $input: expr, $expected: expr $(,)? ) ),* $(,)? ) $(,)? ) => (
        $(
            #[test]
            fn $name() {
                let input = $input;
                let expected = $expected;
                let options = vec! $options;
                weft_testing::run_render_test(&input, &expected, &options);
            }
        )*
    );
    ( options $options: tt, render_tests $test_body: tt $(,)? ) => (
        compile_error!("Invalid test cases for render_tests: must be a list of tuples (name, input, expected)");
    );
    ( options $options: tt, diagnostic_tests ( $( ($name: ident, $input: expr, $expected: expr $(,)? ) ),* $(,)? ) $(,)? ) => (
        $(
            #[test]
            fn $name() {
                let input = $input;
                let expected = $expected;
                let options = vec! $options;
                weft_testing::run_diagnostic_test(&input, &expected, &options);
            }
        )*
    );
    ( options $options: tt, failure_tests ( $( ($name: ident, $input: expr $(,)? ) ),* $(,)? ) $(,)? ) => (
        $(
            #[test]
            fn $name() {
                let input = $input;
                let options = vec! $options;
                weft_testing::run_failure_test(&input, &options);
            }
        )*
    );
    ( options $options: tt, concurrency_tests ( $( ($name: ident, $input: expr, $num_threads: expr $(,)? ) ),* $(,)? ) $(,)? ) => (
        $(
            #[test]
            fn $name() {
                let input = $input;
                let options = vec! $options;
                weft_testing::run_concurrency_test(&input, $num_threads, &options);
            }
        )*
    );
    ( options $options: tt, $test_kind: ident $test_cases: tt $(,)? ) => (
        compile_error!("Invalid keyword: test_suite! only accepts the following keywords: `options`, `render_tests`, `diagnostic_tests`, `failure_tests`, `concurrency_tests`");
    );
    ( options $options: tt, $( $test_kind: ident $test_cases: tt ),+ $(,)? ) => (
        $(
            weft_testing::test_suite![options $options, $test_kind $test_cases,];
        )+
    );
    ( $( $test_kind: ident $test_cases: tt ),+ $(,)? ) => (
        weft_testing::test_suite![options (), $( $test_kind $test_cases, )+ ];
    );
}
