//! `zsync` binary exit codes and fatal-error reporting.
//!
//! GREEN when:
//! - a missing or unusable config exits 1 with `error: ...` on stderr;
//! - a missing `--config-file` is a fatal usage error (exit 1, not clap's 2);
//! - an unreachable directory exits 1 without a single call to Zabbix;
//! - stdout stays empty when the run aborts.

use std::io::Write;

use assert_cmd::Command;
use httpmock::prelude::*;
use predicates::prelude::*;

fn zsync() -> Command {
    let mut cmd = Command::cargo_bin("zsync").unwrap();
    cmd.env("RUST_LOG", "warn");
    cmd
}

fn write_config(yaml: &str) -> tempfile::NamedTempFile {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    f.write_all(yaml.as_bytes()).unwrap();
    f
}

#[test]
fn help_exits_zero() {
    zsync()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--config-file"));
}

#[test]
fn missing_config_flag_is_fatal() {
    zsync()
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--config-file"));
}

#[test]
fn absent_config_file_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("config.yaml");

    zsync()
        .arg("-c")
        .arg(&missing)
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("error: configuration error: config file not found"));
}

#[test]
fn unset_password_env_is_fatal() {
    let cfg = write_config(
        r#"
ldap:
  url: ldap://127.0.0.1:1
  bind:
    dn: uid=reader
    password_env: ZSYNC_TEST_SURELY_UNSET_VAR
  base_dn: cn=ops
  filter: "cn=*"
zabbix:
  url: http://127.0.0.1:1
  user: zabbix_sync
  password: p
  usrgrpid: 7
"#,
    );

    zsync()
        .env_remove("ZSYNC_TEST_SURELY_UNSET_VAR")
        .arg("--config-file")
        .arg(cfg.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("ZSYNC_TEST_SURELY_UNSET_VAR"));
}

#[test]
fn unreachable_directory_never_touches_zabbix() {
    let server = MockServer::start();
    let any_call = server.mock(|when, then| {
        when.method(POST).path("/api_jsonrpc.php");
        then.status(200)
            .json_body(serde_json::json!({"jsonrpc": "2.0", "result": "tok", "id": 1}));
    });

    let cfg = write_config(&format!(
        r#"
ldap:
  url: ldap://127.0.0.1:1
  bind:
    dn: uid=reader
    password: r
  base_dn: cn=ops
  filter: "cn=*"
  timeout_secs: 2
zabbix:
  url: {}
  user: zabbix_sync
  password: p
  usrgrpid: 7
"#,
        server.base_url()
    ));

    zsync()
        .arg("-c")
        .arg(cfg.path())
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("error: directory unavailable"));

    any_call.assert_hits(0);
}
