#[path = "../src/backup.rs"]
mod backup;

use serde_json::json;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn write_sqlite(path: &Path, value: i64) -> Vec<u8> {
    let conn = rusqlite::Connection::open(path).expect("open sqlite");
    conn.execute_batch("CREATE TABLE t (x INTEGER)")
        .expect("create table");
    conn.execute("INSERT INTO t (x) VALUES (?1)", [value])
        .expect("insert row");
    drop(conn);
    std::fs::read(path).expect("read sqlite bytes")
}

#[test]
fn zip_export_and_import_roundtrip() {
    let workspace = temp_dir("studentd-backup-src");
    let workspace2 = temp_dir("studentd-backup-dst");
    let out_dir = temp_dir("studentd-backup-out");

    let bytes = write_sqlite(&workspace.join("studentd.sqlite3"), 1);

    let snapshot = json!({
        "students": [{ "id": "s1", "name": "Ann", "academicRecords": [] }],
        "academicReports": []
    });
    let bundle_path = out_dir.join("workspace.studentd.zip");
    let export = backup::export_workspace_bundle(&workspace, &bundle_path, &snapshot)
        .expect("export bundle");
    assert_eq!(export.bundle_format, backup::BUNDLE_FORMAT_V1);
    assert_eq!(export.entry_count, 3);
    assert_eq!(export.db_sha256.len(), 64);

    let f = File::open(&bundle_path).expect("open bundle");
    let mut archive = zip::ZipArchive::new(f).expect("open zip archive");
    let mut manifest = String::new();
    archive
        .by_name("manifest.json")
        .expect("manifest entry")
        .read_to_string(&mut manifest)
        .expect("read manifest");
    assert!(manifest.contains(backup::BUNDLE_FORMAT_V1));
    assert!(manifest.contains(&export.db_sha256));
    let mut snap_text = String::new();
    archive
        .by_name("data/snapshot.json")
        .expect("snapshot entry")
        .read_to_string(&mut snap_text)
        .expect("read snapshot");
    let snap: serde_json::Value = serde_json::from_str(&snap_text).expect("snapshot json");
    assert_eq!(snap, snapshot);

    let import = backup::import_workspace_bundle(&bundle_path, &workspace2).expect("import bundle");
    assert_eq!(import.bundle_format_detected, backup::BUNDLE_FORMAT_V1);

    let restored = std::fs::read(workspace2.join("studentd.sqlite3")).expect("read restored db");
    assert_eq!(restored, bytes);

    let _ = std::fs::remove_dir_all(workspace);
    let _ = std::fs::remove_dir_all(workspace2);
    let _ = std::fs::remove_dir_all(out_dir);
}

#[test]
fn tampered_database_entry_is_rejected() {
    let workspace = temp_dir("studentd-backup-tamper-dst");
    let out_dir = temp_dir("studentd-backup-tamper");

    let bundle_path = out_dir.join("tampered.zip");
    {
        let f = File::create(&bundle_path).expect("create bundle");
        let mut zip = zip::ZipWriter::new(f);
        let opts = zip::write::FileOptions::default();
        zip.start_file("manifest.json", opts).expect("start manifest");
        zip.write_all(
            json!({ "format": backup::BUNDLE_FORMAT_V1, "dbSha256": "00" })
                .to_string()
                .as_bytes(),
        )
        .expect("write manifest");
        zip.start_file("db/studentd.sqlite3", opts).expect("start db");
        zip.write_all(b"payload").expect("write db");
        zip.finish().expect("finish");
    }

    let err = backup::import_workspace_bundle(&bundle_path, &workspace)
        .expect_err("checksum mismatch");
    assert!(err.to_string().contains("checksum mismatch"));
    assert!(!workspace.join("studentd.sqlite3").exists());

    let _ = std::fs::remove_dir_all(workspace);
    let _ = std::fs::remove_dir_all(out_dir);
}

#[test]
fn bundle_with_non_sqlite_database_entry_is_rejected() {
    let workspace = temp_dir("studentd-backup-junk-dst");
    let out_dir = temp_dir("studentd-backup-junk");

    let payload = b"not a database";
    let digest: String = Sha256::digest(payload)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect();
    let bundle_path = out_dir.join("junk.zip");
    {
        let f = File::create(&bundle_path).expect("create bundle");
        let mut zip = zip::ZipWriter::new(f);
        let opts = zip::write::FileOptions::default();
        zip.start_file("manifest.json", opts).expect("start manifest");
        zip.write_all(
            json!({ "format": backup::BUNDLE_FORMAT_V1, "dbSha256": digest })
                .to_string()
                .as_bytes(),
        )
        .expect("write manifest");
        zip.start_file("db/studentd.sqlite3", opts).expect("start db");
        zip.write_all(payload).expect("write db");
        zip.finish().expect("finish");
    }

    let err = backup::import_workspace_bundle(&bundle_path, &workspace)
        .expect_err("non-sqlite entry");
    assert!(err.to_string().contains("not a sqlite database"));
    assert!(!workspace.join("studentd.sqlite3").exists());

    let _ = std::fs::remove_dir_all(workspace);
    let _ = std::fs::remove_dir_all(out_dir);
}

#[test]
fn raw_sqlite_import_is_supported() {
    let out_dir = temp_dir("studentd-backup-raw");
    let workspace = temp_dir("studentd-backup-raw-dst");

    let raw_file = out_dir.join("old.sqlite3");
    let bytes = write_sqlite(&raw_file, 7);
    write_sqlite(&workspace.join("studentd.sqlite3"), 1);

    let import = backup::import_workspace_bundle(&raw_file, &workspace).expect("import raw sqlite");
    assert_eq!(import.bundle_format_detected, backup::LEGACY_SQLITE_FORMAT);

    let restored = std::fs::read(workspace.join("studentd.sqlite3")).expect("read restored sqlite");
    assert_eq!(restored, bytes);
    assert!(!workspace.join("studentd.sqlite3.importing").exists());

    let _ = std::fs::remove_dir_all(out_dir);
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn non_sqlite_file_is_rejected_and_database_kept() {
    let out_dir = temp_dir("studentd-backup-stray");
    let workspace = temp_dir("studentd-backup-stray-dst");

    let existing = write_sqlite(&workspace.join("studentd.sqlite3"), 1);
    let stray = out_dir.join("snapshot.json");
    std::fs::write(&stray, r#"{"students":[]}"#).expect("write stray file");

    let err = backup::import_workspace_bundle(&stray, &workspace).expect_err("stray file");
    assert!(err.to_string().contains("not a zip bundle or sqlite database"));

    let kept = std::fs::read(workspace.join("studentd.sqlite3")).expect("read kept db");
    assert_eq!(kept, existing);

    let _ = std::fs::remove_dir_all(out_dir);
    let _ = std::fs::remove_dir_all(workspace);
}
