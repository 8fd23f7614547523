use std::{
    fs,
    path::{Path, PathBuf},
    process::{Command, Output},
    time::{SystemTime, UNIX_EPOCH},
};

fn temp_root(label: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let mut root = std::env::temp_dir();
    root.push(format!("loam_cli_{}_{}", label, nanos));
    fs::create_dir_all(&root).expect("create temp root");
    root
}

fn write_file(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dirs");
    }
    fs::write(path, contents).expect("write file");
}

fn run_loam(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_loam"))
        .args(args)
        .env("NO_COLOR", "1")
        .env_remove("LOAM_REPOSITORY_PATH")
        .env_remove("LOAM_COVERAGE_DATA_DIR")
        .output()
        .unwrap_or_else(|e| panic!("failed to run loam with args {:?}: {e}", args))
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

#[test]
fn load_prints_provided_bindings() {
    let root = temp_root("load_module");
    let a = root.join("a");
    let b = root.join("b");
    write_file(&a.join("src/greet.loam"), "[\"define\", \"greet\", 1]\n");
    write_file(&b.join("src/greet.loam"), "[\"define\", \"greet\", 2]\n");

    let output = run_loam(&[
        "--repo",
        b.to_str().unwrap(),
        "--repo",
        a.to_str().unwrap(),
        "load",
        "greet",
    ]);
    assert!(output.status.success(), "stderr:\n{}", stderr(&output));
    assert_eq!(stdout(&output), "{\"greet\":2}\n");
}

#[test]
fn load_runs_scripts() {
    let root = temp_root("load_script");
    let script = root.join("main.loam");
    write_file(
        &script,
        "[\"require\", \"/loam/list\"]\n[\"ref\", \"digit_count\"]\n[\"list\", [\"ref\", \"one\"], \"two\"]\n",
    );

    let output = run_loam(&["load", script.to_str().unwrap()]);
    assert!(output.status.success(), "stderr:\n{}", stderr(&output));
    assert_eq!(stdout(&output), "10\n[1,\"two\"]\n");
}

#[test]
fn failures_exit_with_a_coded_diagnostic() {
    let output = run_loam(&["load", "/no/such/module"]);
    assert_eq!(output.status.code(), Some(1));
    let text = stderr(&output);
    assert!(text.contains("error[E100]: MODULE NOT FOUND"), "stderr:\n{text}");
    assert!(text.contains("`/no/such/module`"));

    let output = run_loam(&["--repo", "/definitely/not/here", "modules"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("error[E600]"));
}

#[test]
fn modules_lists_the_whole_chain() {
    let root = temp_root("modules");
    write_file(&root.join("src/app/main.loam"), "1\n");

    let output = run_loam(&["--repo", root.to_str().unwrap(), "modules"]);
    assert!(output.status.success(), "stderr:\n{}", stderr(&output));
    assert_eq!(
        stdout(&output),
        "/app/main\n/loam/base\n/loam/kernel\n/loam/list\n"
    );
}

#[test]
fn coverage_round_trip_through_the_cli() {
    let root = temp_root("coverage");
    let repo = root.join("repo");
    let data = root.join("data");
    let out = root.join("report");
    write_file(&repo.join("src/app.loam"), "[\"define\", \"a\", 1]\n");

    for _ in 0..2 {
        let output = run_loam(&[
            "--repo",
            repo.to_str().unwrap(),
            "--coverage-data",
            data.to_str().unwrap(),
            "load",
            "/app",
        ]);
        assert!(output.status.success(), "stderr:\n{}", stderr(&output));
    }

    let output = run_loam(&[
        "report-coverage",
        data.to_str().unwrap(),
        out.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "stderr:\n{}", stderr(&output));
    let text = stdout(&output);
    assert!(text.starts_with("Coverage from 2 data file(s)"), "stdout:\n{text}");
    assert!(text.contains("FULL  /app"));
    assert!(out.join("index.html").is_file());

    let json: serde_json::Value =
        serde_json::from_slice(&fs::read(out.join("coverage.json")).unwrap()).unwrap();
    assert_eq!(json["units"][0]["spans"][0]["hits"], 2);
}
