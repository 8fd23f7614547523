use std::{
    fs,
    io::Cursor,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use loam::{
    coverage::SpanId,
    runtime::{
        BootstrapPrecedence, Runtime, RuntimeBuilder,
        collaborator::{CompileError, Compiler, Evaluator, ExecutionError, Scope, SourceText},
        forms::{FormCompiler, FormEvaluator, FormProgram},
        loader::{LoadError, ModuleState},
        module_id::ModuleId,
        value::Value,
    },
};

fn temp_root(label: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let mut root = std::env::temp_dir();
    root.push(format!("loam_module_loading_tests_{}_{}", label, nanos));
    fs::create_dir_all(&root).expect("create temp root");
    root
}

fn write_file(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dirs");
    }
    fs::write(path, contents).expect("write file");
}

fn write_module(repo: &Path, module: &str, contents: &str) {
    let relative = format!("{}.loam", module.trim_start_matches('/'));
    write_file(&repo.join("src").join(relative), contents);
}

fn id(path: &str) -> ModuleId {
    ModuleId::parse(path).unwrap()
}

/// Counts compiles, so tests can tell how many times a body ran.
struct CountingCompiler {
    compiles: Arc<AtomicUsize>,
}

impl Compiler for CountingCompiler {
    type Program = FormProgram;

    fn compile(&self, source: &SourceText<'_>) -> Result<FormProgram, CompileError> {
        self.compiles.fetch_add(1, Ordering::SeqCst);
        FormCompiler.compile(source)
    }

    fn spans(&self, program: &FormProgram) -> Vec<SpanId> {
        FormCompiler.spans(program)
    }
}

/// Sleeps before running any module under `/slow`.
struct SlowEvaluator {
    delay: Duration,
}

impl Evaluator<FormProgram> for SlowEvaluator {
    fn execute(
        &self,
        program: &FormProgram,
        scope: &mut Scope<'_>,
    ) -> Result<Vec<Value>, ExecutionError> {
        if scope.unit().starts_with("/slow") {
            thread::sleep(self.delay);
        }
        FormEvaluator.execute(program, scope)
    }
}

fn counting_runtime(repo: &Path, delay: Duration) -> (Arc<Runtime>, Arc<AtomicUsize>) {
    let compiles = Arc::new(AtomicUsize::new(0));
    let runtime = RuntimeBuilder::new(
        CountingCompiler {
            compiles: Arc::clone(&compiles),
        },
        SlowEvaluator { delay },
    )
    .add_repository_directory(repo)
    .build()
    .unwrap();
    (Arc::new(runtime), compiles)
}

#[test]
fn first_repository_in_the_chain_wins() {
    let root = temp_root("precedence");
    let a = root.join("a");
    let b = root.join("b");
    write_module(&a, "/greet", "[\"define\", \"greet\", 1]\n");
    write_module(&b, "/greet", "[\"define\", \"greet\", 2]\n");

    let runtime = Runtime::builder()
        .add_repository_directory(&b)
        .add_repository_directory(&a)
        .build()
        .unwrap();
    let module = runtime.load_path("greet").unwrap();
    assert_eq!(module.get("greet"), Some(&Value::Int(2)));
    assert!(module.source_name().ends_with("greet.loam"));

    let reversed = Runtime::builder()
        .add_repository_directory(&a)
        .add_repository_directory(&b)
        .build()
        .unwrap();
    assert_eq!(
        reversed.load_path("greet").unwrap().get("greet"),
        Some(&Value::Int(1))
    );
}

#[test]
fn requires_import_only_provided_names() {
    let root = temp_root("provide");
    write_module(
        &root,
        "/lib/math",
        "[\"define\", \"half\", 21]\n[\"define\", \"hidden\", 0]\n[\"provide\", \"half\"]\n",
    );
    write_module(
        &root,
        "/app/main",
        "[\"require\", \"/lib/math\"]\n[\"define\", \"answer\", [\"+\", [\"ref\", \"half\"], [\"ref\", \"half\"]]]\n",
    );

    let runtime = Runtime::builder()
        .add_repository_directory(&root)
        .build()
        .unwrap();
    let main = runtime.load_path("/app/main").unwrap();
    assert_eq!(main.get("answer"), Some(&Value::Int(42)));
    assert_eq!(main.dependencies(), [id("/lib/math")]);
    assert!(main.get("hidden").is_none());

    let math = runtime.lookup(&id("/lib/math")).expect("loaded as a dependency");
    assert_eq!(math.exports().len(), 1);
}

#[test]
fn failures_name_the_module_and_the_cause() {
    let root = temp_root("failures");
    write_module(&root, "/broken/syntax", "[\"bogus\", 1]\n");
    write_module(&root, "/broken/raise", "[\"define\", \"a\", 1]\n[\"raise\", \"kaboom\"]\n");
    write_module(&root, "/broken/user", "[\"require\", \"/broken/raise\"]\n");

    let runtime = Runtime::builder()
        .add_repository_directory(&root)
        .build()
        .unwrap();

    let err = runtime.load_path("/missing").unwrap_err();
    assert!(matches!(err, LoadError::NotFound { .. }));
    assert_eq!(err.code().code, "E100");
    assert!(err.to_string().contains("`/missing`"));
    assert!(err.to_string().contains("embedded:bootstrap"));

    let err = runtime.load_path("/broken/syntax").unwrap_err();
    assert_eq!(err.code().code, "E200");
    assert_eq!(
        err.to_string(),
        "`/broken/syntax` failed to compile at 1:1: unknown operator `bogus`."
    );

    let err = runtime.load_path("/broken/raise").unwrap_err();
    assert_eq!(err.code().code, "E300");
    assert_eq!(
        err.to_string(),
        "`/broken/raise` raised an error at 2:1: kaboom."
    );

    let err = runtime.load_path("/broken/user").unwrap_err();
    assert_eq!(err.code().code, "E300");
    assert_eq!(
        err.to_string(),
        "`/broken/user` could not load a required module: \
         `/broken/raise` raised an error at 2:1: kaboom."
    );

    let err = runtime.load_path("dum/my").unwrap_err();
    assert_eq!(err.code().code, "E101");
}

#[test]
fn failed_loads_are_cached_not_retried() {
    let root = temp_root("no_retry");
    write_module(&root, "/flaky", "[\"raise\", \"first attempt\"]\n");
    let (runtime, compiles) = counting_runtime(&root, Duration::ZERO);

    let first = runtime.load_path("/flaky").unwrap_err();
    write_module(&root, "/flaky", "[\"define\", \"ok\", true]\n");
    let second = runtime.load_path("/flaky").unwrap_err();

    assert_eq!(first.to_string(), second.to_string());
    assert_eq!(compiles.load(Ordering::SeqCst), 1);
    assert!(matches!(runtime.state(&id("/flaky")), ModuleState::Failed(_)));
}

#[test]
fn cyclic_requires_are_reported() {
    let root = temp_root("cycle");
    write_module(&root, "/a", "[\"require\", \"/b\"]\n");
    write_module(&root, "/b", "[\"require\", \"/a\"]\n");

    let runtime = Runtime::builder()
        .add_repository_directory(&root)
        .build()
        .unwrap();
    let err = runtime.load_path("/a").unwrap_err();
    assert!(err.is_cycle());
    assert_eq!(err.code().code, "E400");
    assert_eq!(err.to_string(), "Cyclic module dependency: /a -> /b -> /a.");

    let again = runtime.load_path("/b").unwrap_err();
    assert!(again.is_cycle());
}

#[test]
fn concurrent_loads_share_one_instance() {
    let root = temp_root("concurrent");
    write_module(&root, "/slow/shared", "[\"define\", \"n\", 7]\n");
    let (runtime, compiles) = counting_runtime(&root, Duration::from_millis(50));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let runtime = Arc::clone(&runtime);
            thread::spawn(move || runtime.load_path("/slow/shared").unwrap())
        })
        .collect();
    let modules: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();

    assert_eq!(compiles.load(Ordering::SeqCst), 1);
    assert!(modules.iter().all(|module| Arc::ptr_eq(module, &modules[0])));
    assert_eq!(modules[0].get("n"), Some(&Value::Int(7)));
}

#[test]
fn cross_thread_cycles_fail_instead_of_deadlocking() {
    let root = temp_root("cross_thread_cycle");
    write_module(&root, "/slow/left", "[\"require\", \"/slow/right\"]\n");
    write_module(&root, "/slow/right", "[\"require\", \"/slow/left\"]\n");
    let (runtime, _) = counting_runtime(&root, Duration::from_millis(100));

    let left = {
        let runtime = Arc::clone(&runtime);
        thread::spawn(move || runtime.load_path("/slow/left"))
    };
    let right = {
        let runtime = Arc::clone(&runtime);
        thread::spawn(move || runtime.load_path("/slow/right"))
    };
    let left = left.join().unwrap();
    let right = right.join().unwrap();

    assert!(left.unwrap_err().is_cycle());
    assert!(right.unwrap_err().is_cycle());
}

#[test]
fn abandoned_waits_do_not_cancel_the_load() {
    let root = temp_root("timeout");
    write_module(&root, "/slow/report", "[\"define\", \"done\", true]\n");
    let (runtime, compiles) = counting_runtime(&root, Duration::from_millis(300));

    let err = runtime
        .load_within(&id("/slow/report"), Duration::from_millis(20))
        .unwrap_err();
    assert!(matches!(err, LoadError::TimedOut { .. }));
    assert_eq!(err.code().code, "E301");

    let module = runtime.load_path("/slow/report").unwrap();
    assert_eq!(module.get("done"), Some(&Value::Bool(true)));
    assert_eq!(compiles.load(Ordering::SeqCst), 1);
}

#[test]
fn archive_repositories_serve_bundled_modules() {
    let root = temp_root("archive");
    let archive = root.join("bundle.tar");
    let mut builder = tar::Builder::new(Vec::new());
    for (name, body) in [
        (
            "manifest.json",
            "{\"version\": 1, \"root\": \"/\", \"modules\": [\"/pkg/util\"]}",
        ),
        ("src/pkg/util.loam", "[\"define\", \"packed\", \"yes\"]\n"),
    ] {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Regular);
        header.set_size(body.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, name, Cursor::new(body.as_bytes()))
            .unwrap();
    }
    fs::write(&archive, builder.into_inner().unwrap()).unwrap();

    let runtime = Runtime::builder().add_archive(&archive).build().unwrap();
    let module = runtime.load_path("/pkg/util").unwrap();
    assert_eq!(module.get("packed"), Some(&Value::string("yes")));
    assert!(module.source_name().contains("bundle.tar!/src/pkg/util.loam"));

    let modules = runtime.collect_modules(&|path| path.is_within(&id("/pkg"))).unwrap();
    assert_eq!(modules, [id("/pkg/util")]);
}

#[test]
fn bootstrap_first_protects_core_modules() {
    let root = temp_root("bootstrap_first");
    write_module(&root, "/loam/base", "[\"define\", \"one\", 2]\n");

    let runtime = Runtime::builder()
        .add_repository_directory(&root)
        .bootstrap_precedence(BootstrapPrecedence::Highest)
        .build()
        .unwrap();
    assert_eq!(
        runtime.load_path("/loam/base").unwrap().get("one"),
        Some(&Value::Int(1))
    );
}
