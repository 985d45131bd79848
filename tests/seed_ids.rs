//! Seed id file reading against real files on disk.

use std::io::Write;

use itempack::domain::Role;
use itempack::ingest::read_ids;
use itempack::progress::ProgressLog;
use tempfile::TempDir;

fn log() -> ProgressLog {
    ProgressLog::from_writer(Box::new(Vec::new())).unwrap()
}

fn write_file(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    path
}

#[test]
fn flat_list_file() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "ids.txt", "12345\nItem-187-678\nstim-200-999\n");

    let ids = read_ids(&path, 200, &mut log()).unwrap();
    assert_eq!(ids.len(), 3);
    assert_eq!(ids[0].id, 12345);
    assert_eq!(ids[0].bank_key, 200);
    assert_eq!(ids[1].bank_key, 187);
    assert_eq!(ids[2].role, Role::Stim);
}

#[test]
fn csv_file_with_headers() {
    let dir = TempDir::new().unwrap();
    let path = write_file(
        &dir,
        "ids.csv",
        "Subject,ItemId,BankKey\nELA,12345,187\nMath,Item-200-678,\nELA,\"999\",200\n",
    );

    let ids = read_ids(&path, 200, &mut log()).unwrap();
    assert_eq!(ids.len(), 3);
    assert_eq!(ids[0].bank_key, 187);
    assert_eq!(ids[1].id, 678);
    assert_eq!(ids[2].id, 999);
}

#[test]
fn bad_rows_skipped_with_degraded_log() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "ids.csv", "ItemId\n12345\nnot-an-id\n678\n");

    let mut log = log();
    let ids = read_ids(&path, 200, &mut log).unwrap();
    assert_eq!(ids.len(), 2);
    assert_eq!(log.error_count(), 1);
}

#[test]
fn missing_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nope.csv");
    assert!(read_ids(&path, 200, &mut log()).is_err());
}
