//! Commit/rollback visibility across independent handles on one file.

use lexkv::{Kind, KvError, LocalKv, OpenOptions, Value};
use std::time::Duration;
use tempfile::TempDir;

fn open_pair(name: &str) -> (LocalKv, LocalKv) {
    let writer = LocalKv::open(name, Kind::Text, Kind::Text).expect("open writer");
    let reader = LocalKv::open(name, Kind::Text, Kind::Text).expect("open reader");
    (writer, reader)
}

#[test]
fn batched_write_is_invisible_until_commit() {
    let tmp = TempDir::new().expect("tempdir");
    let path = tmp.path().join("batch.db");
    let name = path.to_str().expect("utf8 path");
    let (mut writer, reader) = open_pair(name);

    writer.put("pending", "value", false).expect("batched put");
    assert!(writer.batch_open());
    assert!(
        !reader.contains("pending").expect("contains"),
        "second handle must not observe an uncommitted write"
    );

    writer.commit().expect("commit");
    assert_eq!(
        reader.get("pending").expect("visible after commit"),
        Value::from("value")
    );
}

#[test]
fn rolled_back_write_is_permanently_unobservable() {
    let tmp = TempDir::new().expect("tempdir");
    let path = tmp.path().join("rollback.db");
    let name = path.to_str().expect("utf8 path");
    let (mut writer, reader) = open_pair(name);

    writer.put("ghost", "value", false).expect("batched put");
    writer.rollback().expect("rollback");

    assert!(!writer.contains("ghost").expect("writer view"));
    assert!(!reader.contains("ghost").expect("reader view"));
}

#[test]
fn close_rolls_back_an_open_batch() {
    let tmp = TempDir::new().expect("tempdir");
    let path = tmp.path().join("close.db");
    let name = path.to_str().expect("utf8 path");

    let mut writer = LocalKv::open(name, Kind::Text, Kind::Text).expect("open");
    writer.put("committed", "yes", true).expect("durable put");
    writer.put("buffered", "no", false).expect("batched put");
    writer.close().expect("close");

    let kv = LocalKv::open(name, Kind::Text, Kind::Text).expect("reopen");
    assert_eq!(kv.get("committed").expect("get"), Value::from("yes"));
    assert!(
        !kv.contains("buffered").expect("contains"),
        "close must discard the open batch, not persist it"
    );
}

#[test]
fn drop_without_close_also_discards_the_open_batch() {
    let tmp = TempDir::new().expect("tempdir");
    let path = tmp.path().join("drop.db");
    let name = path.to_str().expect("utf8 path");

    {
        let mut writer = LocalKv::open(name, Kind::Text, Kind::Text).expect("open");
        writer.put("buffered", "no", false).expect("batched put");
    }

    let kv = LocalKv::open(name, Kind::Text, Kind::Text).expect("reopen");
    assert!(!kv.contains("buffered").expect("contains"));
}

#[test]
fn commit_true_put_flushes_the_whole_open_batch() {
    let tmp = TempDir::new().expect("tempdir");
    let path = tmp.path().join("flush.db");
    let name = path.to_str().expect("utf8 path");
    let (mut writer, reader) = open_pair(name);

    writer.put("a", "1", false).expect("batched");
    writer.put("b", "2", false).expect("batched");
    writer.put("c", "3", true).expect("committing put");

    assert!(!writer.batch_open());
    for key in ["a", "b", "c"] {
        assert!(
            reader.contains(key).expect("contains"),
            "'{key}' must be visible after the committing put"
        );
    }
}

#[test]
fn second_writer_times_out_while_a_batch_holds_the_lock() {
    let tmp = TempDir::new().expect("tempdir");
    let path = tmp.path().join("contend.db");
    let name = path.to_str().expect("utf8 path");

    let mut holder = LocalKv::open(name, Kind::Text, Kind::Text).expect("open holder");
    holder.put("held", "x", false).expect("open batch");

    let opts = OpenOptions {
        busy_timeout: Duration::from_millis(100),
        ..OpenOptions::default()
    };
    let mut contender =
        LocalKv::open_with(name, Kind::Text, Kind::Text, &opts).expect("open contender");
    let err = contender
        .put("other", "y", true)
        .expect_err("write must time out while the batch is open");
    assert!(matches!(err, KvError::LockTimeout(_)), "{err}");

    holder.commit().expect("release");
    contender
        .put("other", "y", true)
        .expect("write succeeds after the batch commits");
}
