// CLI integration tests: pre-flight validation, config layering, and export/import runs.
mod common;

use std::path::Path;
use std::process::{Command, Output};

use common::{KEY, PASSWORD, StubProduct, StubShop};
use serde_json::{Value, json};

const ENV_VARS: [&str; 5] = [
    "POWEREDITOR_KEY",
    "POWEREDITOR_PASSWORD",
    "POWEREDITOR_STORE",
    "POWEREDITOR_NAMESPACE",
    "POWEREDITOR_API_VERSION",
];

/// Runs the binary in `dir` with no inherited `POWEREDITOR_*` settings.
fn cmd(dir: &Path) -> Command {
    let exe = env!("CARGO_BIN_EXE_powereditor");
    let mut command = Command::new(exe);
    command.current_dir(dir).env("RUST_LOG", "warn");
    for name in ENV_VARS {
        command.env_remove(name);
    }
    command
}

fn stdout_json(output: &Output) -> Value {
    let text = String::from_utf8_lossy(&output.stdout);
    let line = text.lines().next().expect("json line");
    serde_json::from_str(line).expect("valid json")
}

/// JSON lines on stderr with the given top-level key; tracing text lines are ignored.
fn stderr_json(output: &Output, key: &str) -> Vec<Value> {
    String::from_utf8_lossy(&output.stderr)
        .lines()
        .filter_map(|line| serde_json::from_str::<Value>(line).ok())
        .filter_map(|value| value.get(key).cloned())
        .collect()
}

fn shop() -> StubShop {
    StubShop::start(vec![
        StubProduct::new(1, 7, "roller").with_metafield(
            "power-editor",
            "specs",
            json!("Size<!--|col|-->45cm"),
        ),
        StubProduct::new(2, 7, "plain"),
        StubProduct::new(5, 9, "locked").rejecting_updates(),
    ])
}

#[test]
fn missing_credentials_and_id_are_reported_together() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = cmd(temp.path())
        .args(["collection", "export"])
        .output()
        .expect("run");

    assert_eq!(output.status.code(), Some(2));
    assert!(output.stdout.is_empty());
    let errors = stderr_json(&output, "error");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["kind"], "Usage");
    assert_eq!(
        errors[0]["message"],
        "\n - api key is required\n - api password is required\n - store domain is required\n - a collection ID is required as an argument"
    );
}

#[test]
fn invalid_primary_key_and_unreadable_file_fail_preflight() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = cmd(temp.path())
        .args(["-k", "k", "-p", "p", "-s", "shop.example"])
        .args(["import", "nope.json", "--primary-key", "sku"])
        .output()
        .expect("run");

    assert_eq!(output.status.code(), Some(2));
    let errors = stderr_json(&output, "error");
    let message = errors[0]["message"].as_str().expect("message");
    assert!(message.contains(" - primary key 'sku' is not valid"));
    assert!(message.contains(" - Can't access file."));
    assert!(message.contains("nope.json"));
}

#[test]
fn import_without_file_names_the_missing_argument() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = cmd(temp.path())
        .args(["-k", "k", "-p", "p", "-s", "shop.example", "import"])
        .output()
        .expect("run");

    assert_eq!(output.status.code(), Some(2));
    let errors = stderr_json(&output, "error");
    assert_eq!(
        errors[0]["message"],
        "path to data file required as an argument"
    );
}

#[test]
fn unknown_subcommand_is_a_usage_error() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = cmd(temp.path()).arg("frobnicate").output().expect("run");

    assert_eq!(output.status.code(), Some(2));
    let errors = stderr_json(&output, "error");
    assert_eq!(errors[0]["kind"], "Usage");
    assert!(
        errors[0]["hint"]
            .as_str()
            .is_some_and(|hint| hint.contains("powereditor"))
    );
}

#[test]
fn export_with_flags_writes_bundle_and_summary() {
    let shop = shop();
    let temp = tempfile::tempdir().expect("tempdir");
    let output = cmd(temp.path())
        .args(["-k", KEY, "-p", PASSWORD, "-s", shop.base_url.as_str()])
        .args(["collection", "export", "7", "-o", "roller.json"])
        .output()
        .expect("run");

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let summary = stdout_json(&output);
    assert_eq!(summary["collection"], 7);
    assert_eq!(summary["exported"], 1);
    assert_eq!(summary["scanned"], 2);
    assert_eq!(summary["output"], "roller.json");

    let text = std::fs::read_to_string(temp.path().join("roller.json")).expect("export file");
    let bundle: Value = serde_json::from_str(&text).expect("bundle json");
    assert_eq!(bundle["products"][0]["handle"], "roller");
    assert_eq!(bundle["products"][0]["fields"][0]["key"], "specs");
    assert_eq!(
        bundle["products"][0]["fields"][0]["data"],
        json!({"0": {"0": "Size", "1": "45cm"}})
    );
}

#[test]
fn config_file_section_supplies_credentials() {
    let shop = shop();
    let temp = tempfile::tempdir().expect("tempdir");
    std::fs::write(
        temp.path().join("config.yml"),
        format!(
            "key: {KEY}\npassword: wrong\nexport:\n  password: {PASSWORD}\n  store: {}\n",
            shop.base_url
        ),
    )
    .expect("config");

    let output = cmd(temp.path())
        .args(["collection", "export", "7", "--include-product-info"])
        .output()
        .expect("run");

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(stdout_json(&output)["exported"], 2);
    let text = std::fs::read_to_string(temp.path().join("output.json")).expect("export file");
    let bundle: Value = serde_json::from_str(&text).expect("bundle json");
    assert_eq!(bundle["products"][1]["handle"], "plain");
    assert_eq!(bundle["products"][1]["title"], "Product 2");
}

#[test]
fn environment_supplies_credentials() {
    let shop = shop();
    let temp = tempfile::tempdir().expect("tempdir");
    let output = cmd(temp.path())
        .env("POWEREDITOR_KEY", KEY)
        .env("POWEREDITOR_PASSWORD", PASSWORD)
        .env("POWEREDITOR_STORE", &shop.base_url)
        .args(["collection", "export", "7"])
        .output()
        .expect("run");

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(temp.path().join("output.json").exists());
}

#[test]
fn import_reports_skips_and_failures_without_aborting() {
    let shop = shop();
    let temp = tempfile::tempdir().expect("tempdir");
    let bundle = json!({
        "products": [
            {"id": 1, "handle": "roller", "fields": [
                {"id": 100, "key": "specs", "data": {"0": {"0": "Size", "1": "50cm"}}}
            ]},
            {"handle": "orphan"},
            {"id": 5, "handle": "locked", "title": "Locked"}
        ]
    });
    std::fs::write(temp.path().join("dump.json"), bundle.to_string()).expect("bundle");

    let output = cmd(temp.path())
        .args(["-k", KEY, "-p", PASSWORD, "-s", shop.base_url.as_str()])
        .args(["import", "dump.json"])
        .output()
        .expect("run");

    assert_eq!(output.status.code(), Some(0));
    let summary = stdout_json(&output);
    assert_eq!(summary, json!({"updated": 1, "skipped": 1, "failed": 1}));

    let notices = stderr_json(&output, "notice");
    assert_eq!(notices.len(), 2);
    assert_eq!(notices[0]["kind"], "skip");
    assert_eq!(notices[0]["product"], "orphan");
    assert_eq!(notices[0]["details"]["error_kind"], "NotFound");
    assert_eq!(notices[1]["kind"], "update_failed");
    assert_eq!(notices[1]["details"]["product_id"], 5);

    let updates = shop.updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(
        updates[0]["product"]["metafields"][0]["value"],
        "Size<!--|col|-->50cm"
    );
}

#[test]
fn completion_script_names_the_binary() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = cmd(temp.path())
        .args(["completion", "bash"])
        .output()
        .expect("run");

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("powereditor"));
}
