use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{json, Value};

struct TestProject {
    root: PathBuf,
    snapshot: PathBuf,
}

impl TestProject {
    fn new(prefix: &str, file_name: &str, contents: &str) -> Self {
        let root = unique_temp_dir(prefix);
        fs::create_dir_all(&root).expect("create project dir");
        let snapshot = root.join(file_name);
        fs::write(&snapshot, contents).expect("write snapshot");
        Self { root, snapshot }
    }

    fn with_json(prefix: &str, value: Value) -> Self {
        Self::new(
            prefix,
            "graph.json",
            &serde_json::to_string_pretty(&value).expect("encode snapshot"),
        )
    }

    fn run(&self, args: &[&str]) -> Output {
        Command::new(sysgraph_bin())
            .current_dir(&self.root)
            .env_remove("SYSGRAPH_CONFIG")
            .env_remove("SYSGRAPH_SNAPSHOT")
            .env_remove("SYSGRAPH_FORMAT")
            .env_remove("RUST_LOG")
            .arg("--snapshot")
            .arg(&self.snapshot)
            .args(args)
            .output()
            .expect("run sysgraph")
    }

    fn run_ok(&self, args: &[&str]) -> Output {
        let output = self.run(args);
        assert_success(&output, args);
        output
    }

    fn read_json(&self) -> Value {
        read_json(&self.snapshot)
    }
}

impl Drop for TestProject {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.root);
    }
}

fn assert_success(output: &Output, args: &[&str]) {
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    assert!(
        output.status.success(),
        "sysgraph {} failed\nstdout:\n{stdout}\nstderr:\n{stderr}",
        args.join(" ")
    );
}

fn read_json(path: &Path) -> Value {
    let contents = fs::read_to_string(path).expect("read snapshot");
    serde_json::from_str(&contents).expect("parse snapshot")
}

fn sysgraph_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_sysgraph"))
}

fn unique_temp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_nanos();
    let pid = std::process::id();
    std::env::temp_dir().join(format!("sysgraph-{prefix}-{pid}-{nanos}"))
}

fn pair() -> Value {
    json!({
        "nodes": [{"id": "a", "label": "Alpha"}, {"id": "b"}, {"id": "c"}],
        "edges": [{"source": "a", "target": "b"}]
    })
}

#[test]
fn link_persists_new_edge_with_type() {
    let project = TestProject::with_json("link-ok", pair());
    project.run_ok(&["link", "c", "a", "--type", "feeds", "--yes"]);

    let snapshot = project.read_json();
    assert_eq!(
        snapshot["edges"],
        json!([
            {"source": "a", "target": "b", "type": "requires"},
            {"source": "c", "target": "a", "type": "feeds"}
        ])
    );
    assert_eq!(snapshot["nodes"][0]["label"], json!("Alpha"));
}

#[test]
fn link_keeps_unrelated_dangling_edges() {
    let project = TestProject::with_json(
        "link-dangling",
        json!({
            "nodes": [{"id": "api"}, {"id": "db"}, {"id": "web"}],
            "edges": [
                {"source": "api", "target": "db"},
                {"source": "api", "target": "billing"}
            ]
        }),
    );
    let output = project.run_ok(&["link", "web", "db", "--yes"]);
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    assert!(stderr.contains("unknown node"), "expected a dangling warning:\n{stderr}");

    assert_eq!(
        project.read_json()["edges"],
        json!([
            {"source": "api", "target": "db", "type": "requires"},
            {"source": "web", "target": "db", "type": "requires"},
            {"source": "api", "target": "billing", "type": "requires"}
        ])
    );
}

#[test]
fn removing_a_node_drops_its_dangling_edges_only() {
    let project = TestProject::with_json(
        "remove-dangling",
        json!({
            "nodes": [{"id": "api"}, {"id": "web"}],
            "edges": [
                {"source": "api", "target": "billing"},
                {"source": "web", "target": "cache"}
            ]
        }),
    );
    project.run_ok(&["remove", "web", "--yes"]);
    assert_eq!(
        project.read_json()["edges"],
        json!([{"source": "api", "target": "billing", "type": "requires"}])
    );
}

#[test]
fn link_that_closes_a_cycle_is_rejected_and_file_untouched() {
    let project = TestProject::with_json("link-cycle", pair());
    let before = fs::read_to_string(&project.snapshot).expect("read snapshot");

    let output = project.run(&["link", "b", "a", "--yes"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    assert!(
        stderr.contains("cannot add b -> a: it would close the cycle a -> b -> a"),
        "unexpected stderr:\n{stderr}"
    );

    let after = fs::read_to_string(&project.snapshot).expect("read snapshot");
    assert_eq!(before, after);
}

#[test]
fn self_link_is_rejected() {
    let project = TestProject::with_json("link-self", pair());
    let output = project.run(&["link", "c", "c", "--yes"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    assert!(
        stderr.contains("a node cannot depend on itself"),
        "unexpected stderr:\n{stderr}"
    );
}

#[test]
fn link_to_unknown_node_is_rejected() {
    let project = TestProject::with_json("link-unknown", pair());
    let output = project.run(&["link", "a", "ghost", "--yes"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    assert!(stderr.contains("unknown node ghost"), "unexpected stderr:\n{stderr}");
}

#[test]
fn unlink_and_remove_update_snapshot() {
    let project = TestProject::with_json(
        "unlink-remove",
        json!({
            "nodes": [{"id": "a"}, {"id": "b"}, {"id": "c"}],
            "edges": [
                {"source": "a", "target": "b"},
                {"source": "b", "target": "c"},
                {"source": "a", "target": "c"}
            ]
        }),
    );

    project.run_ok(&["unlink", "a", "c", "--yes"]);
    assert_eq!(project.read_json()["edges"].as_array().map(Vec::len), Some(2));

    project.run_ok(&["remove", "b", "--yes"]);
    let snapshot = project.read_json();
    assert_eq!(snapshot["nodes"], json!([{"id": "a", "label": ""}, {"id": "c", "label": ""}]));
    assert_eq!(snapshot["edges"], json!([]));
}

#[test]
fn removing_missing_things_is_a_no_op() {
    let project = TestProject::with_json("remove-missing", pair());
    let before = fs::read_to_string(&project.snapshot).expect("read snapshot");
    project.run_ok(&["remove", "ghost", "--yes"]);
    project.run_ok(&["unlink", "b", "a", "--yes"]);
    let after = fs::read_to_string(&project.snapshot).expect("read snapshot");
    assert_eq!(before, after);
}

#[test]
fn yaml_snapshot_is_written_back_as_yaml() {
    let project = TestProject::new(
        "link-yaml",
        "graph.yaml",
        "nodes:\n  - id: api\n  - id: db\nedges: []\n",
    );
    project.run_ok(&["link", "api", "db", "--yes"]);

    let contents = fs::read_to_string(&project.snapshot).expect("read yaml");
    let snapshot: serde_yaml::Value = serde_yaml::from_str(&contents).expect("parse yaml");
    assert_eq!(snapshot["edges"][0]["source"].as_str(), Some("api"));
    assert_eq!(snapshot["edges"][0]["target"].as_str(), Some("db"));

    let order = project.run_ok(&["order", "--json"]);
    let order: Value = serde_json::from_slice(&order.stdout).expect("parse order");
    assert_eq!(order, json!(["db", "api"]));
}
