use assert_cmd::Command;
use assert_fs::prelude::*;
use assert_fs::TempDir;
use predicates::prelude::*;

fn dynjava(dir: &TempDir) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("dynjava"));
    cmd.current_dir(dir.path()).env_remove("DYNJAVA_CONFIG").env_remove("RUST_LOG");
    cmd
}

#[test]
fn help_mentions_both_commands() {
    let temp = TempDir::new().unwrap();
    dynjava(&temp)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("check").and(predicate::str::contains("repl")));
}

#[test]
fn check_accepts_a_small_project() {
    let temp = TempDir::new().unwrap();
    temp.child("src/demo/Counter.java")
        .write_str(
            r#"package demo;

public class Counter {
    private int count;
    public void inc() { count++; }
    public int get() { return count; }
}
"#,
        )
        .unwrap();
    temp.child("src/demo/Main.java")
        .write_str(
            r#"package demo;

public class Main {
    public static void main(String[] args) {
        Counter c = new Counter();
        c.inc();
        System.out.println(c.get());
    }
}
"#,
        )
        .unwrap();

    dynjava(&temp)
        .arg("check")
        .arg("src")
        .assert()
        .success()
        .stdout(predicate::str::contains("Completed checking successfully"));
}

#[test]
fn check_reports_errors_with_file_and_position() {
    let temp = TempDir::new().unwrap();
    temp.child("Bad.java")
        .write_str("public class Bad {\n    int f() {\n        return missing;\n    }\n}\n")
        .unwrap();

    dynjava(&temp)
        .arg("check")
        .arg("Bad.java")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Bad.java:3:").and(predicate::str::contains("[undefined.name]")));
}

#[test]
fn parse_failures_do_not_stop_the_batch() {
    let temp = TempDir::new().unwrap();
    temp.child("a/Broken.java").write_str("public class Broken {\n").unwrap();
    temp.child("a/Wrong.java")
        .write_str("public class Wrong { boolean b = 1; }\n")
        .unwrap();

    let output = dynjava(&temp).arg("check").arg("a").arg("--json").output().unwrap();
    assert_eq!(output.status.code(), Some(1));

    let v: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(v["summary"]["files"].as_u64().unwrap(), 2);
    let keys: Vec<&str> = v["diagnostics"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["key"].as_str().unwrap())
        .collect();
    assert!(keys.contains(&"syntax.error"), "{keys:?}");
    assert!(keys.contains(&"assignment.types"), "{keys:?}");
}

#[test]
fn repl_prints_values_and_keeps_bindings() {
    let temp = TempDir::new().unwrap();
    dynjava(&temp)
        .arg("repl")
        .write_stdin("int x = 2;\nx * 21\n\"a\" + \"b\"\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("42").and(predicate::str::contains("\"ab\"")));
}

#[test]
fn repl_buffers_unfinished_entries() {
    let temp = TempDir::new().unwrap();
    dynjava(&temp)
        .arg("repl")
        .write_stdin("int next(int n) {\n  return n + 1;\n}\nnext(41)\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("42"));
}

#[test]
fn repl_survives_guest_exceptions() {
    let temp = TempDir::new().unwrap();
    dynjava(&temp)
        .arg("repl")
        .write_stdin("Integer.parseInt(\"nope\")\n1 + 1\n")
        .assert()
        .success()
        .stderr(predicate::str::contains("Uncaught exception java.lang.NumberFormatException"))
        .stdout(predicate::str::contains("2"));
}

#[test]
fn repl_reads_options_from_the_config_file() {
    let temp = TempDir::new().unwrap();
    temp.child("dynjava.toml")
        .write_str("[options]\nrequire_variable_type = true\n")
        .unwrap();
    dynjava(&temp)
        .arg("repl")
        .write_stdin("y = 3;\n")
        .assert()
        .success()
        .stderr(predicate::str::contains("[undefined.name]"));
}

fn nested_return(depth: usize) -> String {
    format!(
        "public class Deep {{\n    int f() {{\n        return {}1{};\n    }}\n}}\n",
        "(".repeat(depth),
        ")".repeat(depth)
    )
}

#[test]
fn check_handles_deeply_nested_sources() {
    let temp = TempDir::new().unwrap();
    temp.child("ok/Deep.java").write_str(&nested_return(400)).unwrap();
    temp.child("deep/Deep.java").write_str(&nested_return(20_000)).unwrap();

    dynjava(&temp)
        .arg("check")
        .arg("ok")
        .assert()
        .success()
        .stdout(predicate::str::contains("Completed checking successfully"));

    dynjava(&temp)
        .arg("check")
        .arg("deep")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Deep.java:3:").and(predicate::str::contains("[syntax.error]")));
}

#[test]
fn repl_rejects_deep_nesting_and_keeps_going() {
    let temp = TempDir::new().unwrap();
    let entry = format!("int x = {}1{};\n1 + 1\n", "(".repeat(20_000), ")".repeat(20_000));
    dynjava(&temp)
        .arg("repl")
        .write_stdin(entry)
        .assert()
        .success()
        .stderr(predicate::str::contains("[syntax.error]"))
        .stdout(predicate::str::contains("2"));
}
