use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn ssh_hand(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("ssh-hand").unwrap();
    cmd.env("SSH_HAND_HOME", home.path())
        .env_remove("SSH_HAND_PROFILE")
        .env_remove("RUST_LOG");
    cmd
}

fn add(home: &TempDir, name: &str, target: &str, category: &str, key: &str) {
    ssh_hand(home)
        .args([
            "add",
            "--name",
            name,
            "--target",
            target,
            "--category",
            category,
            "--key",
            key,
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("Added session: {name}")));
}

fn list_json(home: &TempDir) -> Vec<serde_json::Value> {
    let output = ssh_hand(home).args(["list", "--json"]).output().unwrap();
    assert!(output.status.success());
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn add_then_connect_prints_plain_ssh() {
    let home = TempDir::new().unwrap();
    add(&home, "db1", "user@10.0.0.5", "infra", "none");

    let sessions = list_json(&home);
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0]["friendlyname"], "db1");
    assert_eq!(sessions[0]["ssh_key_path"], "none");

    ssh_hand(&home)
        .args(["connect", "db1", "--print"])
        .assert()
        .success()
        .stdout("ssh user@10.0.0.5\n");
}

#[test]
fn scp_uses_global_key() {
    let home = TempDir::new().unwrap();
    let file = home.path().join("f.txt");
    std::fs::write(&file, "payload").unwrap();

    ssh_hand(&home)
        .args(["settings", "set", "--ssh-key", "/home/u/.ssh/id_rsa"])
        .assert()
        .success();
    add(&home, "db1", "user@10.0.0.5", "infra", "global");

    let expected = format!(
        "scp -i /home/u/.ssh/id_rsa {} user@10.0.0.5:~/\n",
        file.display()
    );
    ssh_hand(&home)
        .args(["scp", "db1", file.to_str().unwrap(), "--print"])
        .assert()
        .success()
        .stdout(predicate::str::diff(expected));
}

#[test]
fn connect_with_remote_command_and_x11() {
    let home = TempDir::new().unwrap();
    ssh_hand(&home)
        .args(["settings", "set", "--x11"])
        .assert()
        .success();
    add(&home, "box", "me@box:2222", "lab", "/keys/box");

    ssh_hand(&home)
        .args(["connect", "box", "--cmd", "uptime", "--print"])
        .assert()
        .success()
        .stdout("ssh -i /keys/box -X me@box:2222 'uptime'\n");
}

#[test]
fn add_collects_missing_fields_from_stdin() {
    let home = TempDir::new().unwrap();
    ssh_hand(&home)
        .arg("add")
        .write_stdin("web\nroot@web\nprod\n\n")
        .assert()
        .success();

    let sessions = list_json(&home);
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0]["connection_string"], "root@web");
    assert_eq!(sessions[0]["category"], "prod");
    assert_eq!(sessions[0]["ssh_key_path"], "none");
}

#[test]
fn cancelled_add_writes_nothing() {
    let home = TempDir::new().unwrap();
    ssh_hand(&home)
        .args(["add", "--name", "web", "--target", "root@web"])
        .write_stdin("")
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    assert!(list_json(&home).is_empty());
}

#[test]
fn add_rejects_missing_category_and_duplicates() {
    let home = TempDir::new().unwrap();
    ssh_hand(&home)
        .args(["add", "-n", "web", "-t", "root@web", "-g", " ", "-k", "none"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("are required"));
    assert!(list_json(&home).is_empty());

    add(&home, "web", "root@web", "prod", "none");
    ssh_hand(&home)
        .args(["add", "-n", "WEB", "-t", "root@web2", "-g", "prod", "-k", "none"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
    assert_eq!(list_json(&home).len(), 1);
}

#[test]
fn edit_and_remove() {
    let home = TempDir::new().unwrap();
    add(&home, "web", "root@web", "prod", "none");

    ssh_hand(&home)
        .args(["edit", "web", "--name", "web-01", "--target", "admin@web"])
        .assert()
        .success();

    let sessions = list_json(&home);
    assert_eq!(sessions[0]["friendlyname"], "web-01");
    assert_eq!(sessions[0]["connection_string"], "admin@web");
    assert_eq!(sessions[0]["category"], "prod");

    ssh_hand(&home)
        .args(["remove", "web-01"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed session: web-01"));
    assert!(list_json(&home).is_empty());

    ssh_hand(&home)
        .args(["remove", "web-01"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Session not found"));
}

#[test]
fn list_groups_by_category_and_filters() {
    let home = TempDir::new().unwrap();
    add(&home, "zeta", "a@z", "cat1", "none");
    add(&home, "alpha", "a@a", "cat1", "none");
    add(&home, "x", "a@x", "cat2", "none");

    let output = ssh_hand(&home).arg("list").output().unwrap();
    let stdout = String::from_utf8(output.stdout).unwrap();
    let alpha = stdout.find("alpha").unwrap();
    let zeta = stdout.find("zeta").unwrap();
    let cat2 = stdout.find("cat2").unwrap();
    assert!(alpha < zeta && zeta < cat2);

    ssh_hand(&home)
        .args(["list", "--search", "ALP"])
        .assert()
        .success()
        .stdout(predicate::str::contains("alpha").and(predicate::str::contains("zeta").not()));
}

#[test]
fn legacy_store_without_ids_still_loads() {
    let home = TempDir::new().unwrap();
    let dir = home.path().join("profiles").join("default");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join("sessions.json"),
        r#"[{"friendlyname": "old", "connection_string": "u@old", "category": "legacy", "ssh_key_path": "use global key"}]"#,
    )
    .unwrap();
    std::fs::write(dir.join("recent_sessions.json"), "not json").unwrap();

    let sessions = list_json(&home);
    assert_eq!(sessions[0]["ssh_key_path"], "global");
    assert_eq!(sessions[0]["id"].as_str().unwrap().len(), 12);

    ssh_hand(&home)
        .args(["recent"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No recent sessions"));
}

#[test]
fn unknown_session_fails() {
    let home = TempDir::new().unwrap();
    ssh_hand(&home)
        .args(["connect", "ghost", "--print"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Session not found: ghost"));
}

#[test]
fn profiles_are_isolated() {
    let home = TempDir::new().unwrap();
    ssh_hand(&home)
        .args(["profile", "create", "work"])
        .assert()
        .success();
    ssh_hand(&home)
        .args(["-p", "work", "add", "-n", "vpn", "-t", "me@vpn", "-g", "net", "-k", "none"])
        .assert()
        .success();

    assert!(list_json(&home).is_empty());
    ssh_hand(&home)
        .args(["profile", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("work"));
    ssh_hand(&home)
        .args(["profile", "delete", "default"])
        .assert()
        .failure();
}
