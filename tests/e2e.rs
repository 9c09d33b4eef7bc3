use assert_cmd::prelude::*;
use lsareport::credential::{Credential, DpapiCredential, KerberosCredential, PasswordCredential};
use lsareport::error::{ErrorDetail, PackageError};
use lsareport::kerberos::{CachedCredential, KerberosTicket, TicketType};
use lsareport::session::{ExtractionResult, LogonSession};
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::tempdir;

fn write_result(path: &Path, result: &ExtractionResult) {
    fs::write(path, serde_json::to_string(result).unwrap()).unwrap();
}

fn dpapi_result() -> ExtractionResult {
    let mut r = ExtractionResult::default();
    r.orphaned_creds.push(Credential::Dpapi(DpapiCredential {
        luid: 0,
        key_guid: "G1".into(),
        masterkey: "AA".into(),
        sha1_masterkey: "BB".into(),
    }));
    r
}

fn session_result() -> ExtractionResult {
    let mut r = ExtractionResult::default();
    r.logon_sessions.insert(
        0x3e7,
        LogonSession {
            authentication_id: 0x3e7,
            username: "alice".into(),
            domainname: "CORP".into(),
            credentials: vec![
                Credential::Wdigest(PasswordCredential {
                    username: "alice".into(),
                    domainname: "CORP".into(),
                    password: Some("Winter2025".into()),
                }),
                Credential::Kerberos(KerberosCredential {
                    username: "alice".into(),
                    domainname: "CORP".into(),
                    password: None,
                    tickets: vec![KerberosTicket {
                        ticket_type: TicketType::Tgt,
                        service_name: vec!["krbtgt".into(), "CORP".into()],
                        service_realm: "CORP".into(),
                        client_name: vec!["alice".into()],
                        client_realm: "CORP".into(),
                        kirbi: vec![0x76, 0x01],
                        ..Default::default()
                    }],
                }),
            ],
            ..Default::default()
        },
    );
    r.kerberos_ccache.credentials.push(CachedCredential::default());
    r.errors.push(PackageError::new(
        "tspkg",
        ErrorDetail::new("ParseError", "unexpected\nlayout"),
    ));
    r
}

#[test]
fn grep_single_source_prints_header_and_row() {
    let tmp = tempdir().unwrap();
    let input = tmp.path().join("lsass.json");
    write_result(&input, &dpapi_result());

    let mut cmd = Command::cargo_bin("lsareport").unwrap();
    cmd.arg(&input).arg("--grep");
    cmd.assert().success().stdout(predicate::eq(
        "credType:domain:username:NT:LM:SHA1:masterkey:sha1_masterkey:key_guid:plaintext\r\ndpapi::::::AA:BB:G1:\r\n",
    ));
}

#[test]
fn directory_mode_isolates_failed_sources() {
    let tmp = tempdir().unwrap();
    let good = tmp.path().join("good.json");
    let bad = tmp.path().join("bad.json");
    write_result(&good, &session_result());
    fs::write(&bad, "{ truncated").unwrap();

    let mut cmd = Command::cargo_bin("lsareport").unwrap();
    cmd.arg(tmp.path()).arg("-d").arg("-g");
    cmd.assert()
        .success()
        .stdout(predicate::str::starts_with("filename:credType:"))
        .stdout(predicate::str::contains("good.json:wdigest:CORP:alice:::::::Winter2025"))
        .stdout(predicate::str::contains("bad.json").not());

    let mut cmd = Command::cargo_bin("lsareport").unwrap();
    cmd.arg(tmp.path()).arg("-d");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("== LogonSession =="))
        .stdout(predicate::str::contains("==== Parsing errors:"))
        .stdout(predicate::str::contains("bad.json"));
}

#[test]
fn halt_on_error_exits_non_zero() {
    let tmp = tempdir().unwrap();
    let input = tmp.path().join("lsass.json");
    write_result(&input, &session_result());
    let mut cmd = Command::cargo_bin("lsareport").unwrap();
    cmd.arg(&input).arg("-e");
    cmd.assert().failure().code(3);
}

#[test]
fn missing_input_causes_non_zero_exit() {
    let tmp = tempdir().unwrap();
    let mut cmd = Command::cargo_bin("lsareport").unwrap();
    cmd.arg(tmp.path().join("missing.json"));
    cmd.assert().failure().code(2);
}

#[test]
fn json_to_outfile_and_ticket_export() {
    let tmp = tempdir().unwrap();
    let input = tmp.path().join("lsass.json");
    let outfile = tmp.path().join("report.json");
    let kdir = tmp.path().join("tickets");
    write_result(&input, &session_result());

    let mut cmd = Command::cargo_bin("lsareport").unwrap();
    cmd.arg(&input)
        .arg("--json")
        .arg("-o")
        .arg(&outfile)
        .arg("-k")
        .arg(&kdir);
    cmd.assert().success().stdout(predicate::str::is_empty());

    let doc: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&outfile).unwrap()).unwrap();
    let key = input.display().to_string();
    assert_eq!(doc[&key]["logon_sessions"]["999"]["username"], "alice");
    assert!(!fs::read_to_string(&outfile).unwrap().contains("unexpected\nlayout"));

    let names: Vec<String> = fs::read_dir(&kdir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(names.len(), 2);
    assert!(names.iter().any(|n| n.starts_with("lsass.json_") && n.ends_with(".ccache")));
    assert!(names.iter().any(|n| n.starts_with("TGT_alice@CORP_") && n.ends_with(".kirbi")));
}

#[test]
fn json_short_batch_is_keyed_by_source() {
    let tmp = tempdir().unwrap();
    write_result(&tmp.path().join("a.json"), &dpapi_result());
    write_result(&tmp.path().join("b.json"), &ExtractionResult::default());

    let out = Command::cargo_bin("lsareport")
        .unwrap()
        .arg(tmp.path())
        .arg("-d")
        .arg("--json-short")
        .arg("--parallel")
        .output()
        .unwrap();
    assert!(out.status.success());
    let doc: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    let map = doc.as_object().unwrap();
    assert_eq!(map.len(), 2);
    let a = map
        .iter()
        .find(|(k, _)| k.ends_with("a.json"))
        .map(|(_, v)| v)
        .unwrap();
    assert_eq!(a[0]["masterkey"], "AA");
}
