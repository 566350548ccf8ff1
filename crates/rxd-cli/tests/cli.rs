//! Integration tests driving the `rxd` binary end to end

use assert_cmd::Command;
use predicates::prelude::*;

const FOXES: &str = r#"
reactions = ["R -> 2 R", "R + F -> 2 F", "F -> D"]
unchanging = ["D"]

[rates]
k1 = 0.7
k2 = 0.005
k3 = 0.4

[initial]
R = 120.0
F = 40.0
"#;

fn write_system(dir: &tempfile::TempDir) -> std::path::PathBuf {
    let path = dir.path().join("foxes.toml");
    std::fs::write(&path, FOXES).expect("write system file");
    path
}

fn rxd() -> Command {
    Command::cargo_bin("rxd").expect("binary builds")
}

#[test]
fn inspect_summarizes_the_system() {
    let dir = tempfile::tempdir().expect("tempdir");
    let system = write_system(&dir);

    rxd()
        .arg("inspect")
        .arg(&system)
        .assert()
        .success()
        .stdout(predicate::str::contains("3 species, 3 reaction edges"))
        .stdout(predicate::str::contains("unchanging: D"));
}

#[test]
fn inspect_json_lists_edges() {
    let dir = tempfile::tempdir().expect("tempdir");
    let system = write_system(&dir);

    rxd()
        .arg("inspect")
        .arg(&system)
        .arg("--json")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"rate\": \"k2\""))
        .stdout(predicate::str::contains("R + F -> 2 F"));
}

#[test]
fn render_spim_model_to_stdout() {
    let dir = tempfile::tempdir().expect("tempdir");
    let system = write_system(&dir);

    rxd()
        .arg("render")
        .arg(&system)
        .args(["--format", "spim", "--end", "10", "--samples", "100"])
        .assert()
        .success()
        .stdout(predicate::str::contains("directive sample"))
        .stdout(predicate::str::contains("directive plot R(); F()"))
        .stdout(predicate::str::contains("let R() ="));
}

#[test]
fn render_psc_model_binds_every_rate() {
    let dir = tempfile::tempdir().expect("tempdir");
    let system = write_system(&dir);

    rxd()
        .arg("render")
        .arg(&system)
        .args(["--format", "psc"])
        .assert()
        .success()
        .stdout(predicate::str::contains("k1 = "))
        .stdout(predicate::str::contains("k2 = "))
        .stdout(predicate::str::contains("k3 = "));
}

#[test]
fn run_ode_exports_tsv() {
    let dir = tempfile::tempdir().expect("tempdir");
    let system = write_system(&dir);
    let out = dir.path().join("trajectory.tsv");

    rxd()
        .arg("run")
        .arg(&system)
        .args(["--backend", "ode", "--end", "10", "--delta", "0.1"])
        .arg("--output")
        .arg(&out)
        .assert()
        .success();

    let text = std::fs::read_to_string(&out).expect("trajectory written");
    assert!(text.starts_with("t\ty0\ty1\n"));
    assert!(text.lines().count() > 50);
}

#[test]
fn run_embedded_with_seed_is_reproducible() {
    let dir = tempfile::tempdir().expect("tempdir");
    let system = write_system(&dir);
    let first = dir.path().join("a.tsv");
    let second = dir.path().join("b.tsv");

    for out in [&first, &second] {
        rxd()
            .arg("run")
            .arg(&system)
            .args(["--backend", "embedded", "--end", "5", "--seed", "99"])
            .arg("--output")
            .arg(out)
            .assert()
            .success();
    }

    let a = std::fs::read_to_string(&first).expect("first run written");
    let b = std::fs::read_to_string(&second).expect("second run written");
    assert_eq!(a, b);
}

#[test]
fn spim_backend_requires_interpreter_path() {
    let dir = tempfile::tempdir().expect("tempdir");
    let system = write_system(&dir);

    rxd()
        .arg("run")
        .arg(&system)
        .args(["--backend", "spim"])
        .env_remove("RXD_SPIM")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--spim"));
}

#[test]
fn unknown_method_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let system = write_system(&dir);

    rxd()
        .arg("run")
        .arg(&system)
        .args(["--backend", "ode", "--method", "euler-backward"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown ode method"));
}

#[test]
fn missing_system_file_fails_cleanly() {
    rxd()
        .arg("inspect")
        .arg("/nonexistent/system.toml")
        .assert()
        .failure();
}
