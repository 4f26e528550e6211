use serde_json::Value;
use std::ffi::OsStr;
use std::fs;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

struct TempDirGuard {
    path: PathBuf,
}

impl TempDirGuard {
    fn new(prefix: &str) -> Self {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        let path = std::env::temp_dir().join(format!(
            "tremor-cli-{prefix}-{}-{unique}",
            std::process::id()
        ));
        fs::create_dir_all(&path).expect("temp dir should be created");
        Self { path }
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempDirGuard {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

const SCENARIO: &str = r#"
[[crust.layers]]
thickness = 1.5
vp = 4.0
vs = 2.3
rho = 2.5

[[crust.layers]]
thickness = 0.0
vp = 6.0
vs = 3.5
rho = 2.7

[[sources]]
position = [0.0, 0.0, 1.0]
angles = [0.0, 90.0, 0.0]

[[sources]]
position = [0.01, 0.0, 1.05]
angles = [0.0, 90.0, 0.0]

[[sources]]
position = [5.0, 5.0, 3.0]
angles = [45.0, 30.0, 90.0]
tt = 0.5

[[stations]]
position = [1.0, 0.0, 0.0]
name = "A"

[[stations]]
position = [2.0, 0.0, 0.0]
name = "B"

[solver]
nfft = 128

[window]
tmax = 8.0

[lookup]
progress_every = 0
"#;

const FAR_STATION: &str = r#"
[[stations]]
position = [9.0, 0.0, 0.0]
"#;

fn write_scenario(dir: &Path, name: &str, extra: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("{SCENARIO}{extra}")).expect("scenario should be written");
    path
}

fn tremor() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_tremor"));
    command.env("RUST_LOG", "warn");
    command
}

fn run_tremor<I, S>(args: I) -> Output
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    tremor()
        .args(args)
        .output()
        .expect("tremor command should execute")
}

fn assert_success(output: &Output) {
    if !output.status.success() {
        panic!(
            "command failed with status {:?}\nstdout:\n{}\nstderr:\n{}",
            output.status.code(),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr),
        );
    }
}

fn assert_failure(output: &Output) {
    if output.status.success() {
        panic!(
            "command unexpectedly succeeded\nstdout:\n{}\nstderr:\n{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr),
        );
    }
}

fn parse_json_stdout(output: &Output) -> Value {
    serde_json::from_slice::<Value>(&output.stdout).unwrap_or_else(|e| {
        panic!(
            "stdout should be json: {e}\nstdout:\n{}",
            String::from_utf8_lossy(&output.stdout)
        )
    })
}

fn read_stations(path: &Path) -> Vec<Value> {
    fs::read_to_string(path)
        .expect("station output should exist")
        .lines()
        .map(|line| serde_json::from_str(line).expect("station line should be json"))
        .collect()
}

fn samples(station: &Value, component: &str) -> Vec<f64> {
    station[component]
        .as_array()
        .expect("component should be an array")
        .iter()
        .map(|v| v.as_f64().expect("sample should be a number"))
        .collect()
}

fn assert_same_stations(left: &[Value], right: &[Value]) {
    assert_eq!(left.len(), right.len());
    for (a, b) in left.iter().zip(right) {
        assert_eq!(a["index"], b["index"]);
        assert_eq!(a["nt"], b["nt"]);
        for component in ["z", "e", "n"] {
            for (u, v) in samples(a, component).iter().zip(samples(b, component)) {
                assert!((u - v).abs() <= 1e-12, "{component}: {u} vs {v}");
            }
        }
    }
}

fn path_arg(path: &Path) -> String {
    path.display().to_string()
}

#[test]
fn pipeline_builds_database_and_runs_against_it() {
    let tmp = TempDirGuard::new("pipeline");
    let scenario = path_arg(&write_scenario(tmp.path(), "tremor.toml", ""));
    let db = path_arg(&tmp.path().join("greens_db"));

    let output = run_tremor([
        "pairs", "--scenario", &scenario, "--database", &db, "--procs", "3", "--json",
    ]);
    assert_success(&output);
    let pairs = parse_json_stdout(&output);
    assert_eq!(pairs["report"]["pairs"], 6);
    assert_eq!(pairs["report"]["canonical"], 4);
    assert!(tmp.path().join("greens_db/pairs.json").exists());

    let output = run_tremor([
        "database", "--scenario", &scenario, "--database", &db, "--procs", "3", "--json",
    ]);
    assert_success(&output);
    assert_eq!(parse_json_stdout(&output)["report"]["entries"], 4);

    let fast_out = tmp.path().join("fast.jsonl");
    let output = run_tremor([
        "run-fast",
        "--scenario",
        &scenario,
        "--database",
        &db,
        "--output",
        &path_arg(&fast_out),
        "--procs",
        "3",
        "--send-mode",
        "buffered",
        "--json",
    ]);
    assert_success(&output);
    let report = parse_json_stdout(&output);
    assert_eq!(report["report"]["mode"], "fast");
    assert_eq!(report["report"]["skipped"], 0);
    let fast = read_stations(&fast_out);
    assert_eq!(fast.len(), 2);
    assert_eq!(fast[0]["name"], "A");
    assert_eq!(fast[0]["nt"], 160);
    assert_eq!(fast[0]["contributions"], 3);

    let faster_out = tmp.path().join("faster.jsonl");
    let output = run_tremor([
        "run-faster",
        "--scenario",
        &scenario,
        "--database",
        &db,
        "--output",
        &path_arg(&faster_out),
        "--procs",
        "2",
        "--lookup",
        "first",
    ]);
    assert_success(&output);
    let mut faster = read_stations(&faster_out);
    faster.sort_by_key(|s| s["index"].as_u64());
    assert_same_stations(&fast, &faster);

    let output = run_tremor(["check", "--scenario", &scenario, "--database", &db, "--json"]);
    assert_success(&output);
    let check = parse_json_stdout(&output);
    assert_eq!(check["covered"], true);
}

#[test]
fn check_exits_non_zero_for_pairs_outside_the_database() {
    let tmp = TempDirGuard::new("check");
    let scenario = path_arg(&write_scenario(tmp.path(), "tremor.toml", ""));
    let extended = path_arg(&write_scenario(tmp.path(), "extended.toml", FAR_STATION));
    let db = path_arg(&tmp.path().join("greens_db"));

    assert_success(&run_tremor(["pairs", "--scenario", &scenario, "--database", &db]));

    let output = run_tremor([
        "check", "--scenario", &extended, "--database", &db, "--procs", "2", "--json",
    ]);
    assert_failure(&output);
    let check = parse_json_stdout(&output);
    assert_eq!(check["covered"], false);
    let uncovered: Vec<u64> = check["report"]["uncovered"]
        .as_array()
        .expect("uncovered should be an array")
        .iter()
        .map(|p| p["index"].as_u64().expect("index"))
        .collect();
    assert_eq!(uncovered, vec![6, 7]);
}

#[test]
fn database_refuses_a_scenario_that_does_not_match_its_pairs() {
    let tmp = TempDirGuard::new("digest");
    let scenario = path_arg(&write_scenario(tmp.path(), "tremor.toml", ""));
    let extended = path_arg(&write_scenario(tmp.path(), "extended.toml", FAR_STATION));
    let db = path_arg(&tmp.path().join("greens_db"));

    assert_success(&run_tremor(["pairs", "--scenario", &scenario, "--database", &db]));
    let output = run_tremor(["database", "--scenario", &extended, "--database", &db]);
    assert_failure(&output);
    assert!(String::from_utf8_lossy(&output.stderr).contains("error:"));
}

#[test]
fn tcp_ranks_match_an_in_process_run() {
    let tmp = TempDirGuard::new("tcp");
    let scenario = path_arg(&write_scenario(tmp.path(), "tremor.toml", ""));

    let local_out = tmp.path().join("local.jsonl");
    assert_success(&run_tremor([
        "run",
        "--scenario",
        &scenario,
        "--output",
        &path_arg(&local_out),
    ]));

    let port = TcpListener::bind("127.0.0.1:0")
        .and_then(|l| l.local_addr())
        .expect("free port should be available")
        .port();
    let coordinator = format!("127.0.0.1:{port}");
    let tcp_out = tmp.path().join("tcp.jsonl");
    let tcp_out_arg = path_arg(&tcp_out);
    let spawn = |rank: usize| {
        tremor()
            .args([
                "run",
                "--scenario",
                &scenario,
                "--output",
                &tcp_out_arg,
                "--rank",
                &rank.to_string(),
                "--nprocs",
                "3",
                "--coordinator",
                &coordinator,
            ])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("rank should start")
    };
    let ranks: Vec<_> = (0..3).map(spawn).collect();
    for child in ranks {
        let output = child.wait_with_output().expect("rank should exit");
        assert_success(&output);
    }

    assert_same_stations(&read_stations(&local_out), &read_stations(&tcp_out));
}

#[test]
fn unknown_send_mode_is_rejected() {
    let tmp = TempDirGuard::new("send-mode");
    let scenario = path_arg(&write_scenario(tmp.path(), "tremor.toml", ""));
    let output = run_tremor([
        "run",
        "--scenario",
        &scenario,
        "--output",
        &path_arg(&tmp.path().join("out.jsonl")),
        "--send-mode",
        "eager",
    ]);
    assert_failure(&output);
}
