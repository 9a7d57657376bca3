use anyhow::Result;
use flowscan::search::{search, search_with};
use flowscan::{DecodeMode, Record, SearchQuery};
use std::collections::BTreeMap;
use std::fs;
use std::num::NonZeroUsize;
use std::path::Path;
use tempfile::tempdir;

const FLOW_A: &str = "1|1|acct1|inst1|10.0.0.1|10.0.0.2|6|5|100|1000|2000|ACCEPT|OK|80|443";
const FLOW_B: &str = r#"{"srcaddr":"10.0.0.9","dstaddr":"10.0.0.2","action":"REJECT","starttime":"1500","endtime":"2500"}"#;

// Helper function to create test files
fn create_test_files(dir: impl AsRef<Path>, files: &[(&str, &str)]) -> Result<()> {
    for (name, content) in files {
        let path = dir.as_ref().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
    }
    Ok(())
}

fn query(criteria: &[(&str, &str)]) -> SearchQuery {
    SearchQuery {
        criteria: criteria
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<BTreeMap<_, _>>(),
        ..Default::default()
    }
}

fn flow_line(serial: usize, src: &str, dst: &str, action: &str, start: i64, end: i64) -> String {
    format!(
        "{}|2|123456789012|eni-abc|{}|{}|6|10|840|{}|{}|{}|OK|49152|443",
        serial, src, dst, start, end, action
    )
}

#[test]
fn test_mixed_formats_end_to_end() -> Result<()> {
    let dir = tempdir()?;
    create_test_files(&dir, &[("a.log", FLOW_A), ("b.log", FLOW_B)])?;

    let output = search(dir.path(), &query(&[("dstaddr", "10.0.0.2")]));
    let records = output.sorted();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].source_file(), Some("a.log"));
    assert_eq!(records[0].get("action"), Some("ACCEPT"));
    assert_eq!(records[1].source_file(), Some("b.log"));
    assert_eq!(records[1].get("action"), Some("REJECT"));
    assert_eq!(output.files_scanned, 2);
    assert_eq!(output.files_with_matches, 2);
    Ok(())
}

#[test]
fn test_time_window_across_formats() -> Result<()> {
    let dir = tempdir()?;
    create_test_files(&dir, &[("a.log", FLOW_A), ("b.log", FLOW_B)])?;

    // a.log covers [1000, 2000], b.log covers [1500, 2500]
    let mut q = query(&[]);
    q.starttime = Some(2001);
    let output = search(dir.path(), &q);
    assert_eq!(output.total_matches(), 1);
    assert_eq!(output.records[0].source_file(), Some("b.log"));

    q.starttime = None;
    q.endtime = Some(1499);
    let output = search(dir.path(), &q);
    assert_eq!(output.total_matches(), 1);
    assert_eq!(output.records[0].source_file(), Some("a.log"));

    q.starttime = Some(3000);
    q.endtime = Some(4000);
    assert_eq!(search(dir.path(), &q).total_matches(), 0);
    Ok(())
}

#[test]
fn test_per_file_cap() -> Result<()> {
    let dir = tempdir()?;
    let content = (0..3)
        .map(|i| flow_line(i, "10.0.0.1", "10.0.0.2", "ACCEPT", 100, 200))
        .collect::<Vec<_>>()
        .join("\n");
    create_test_files(
        &dir,
        &[("capped.log", content.as_str()), ("other.log", content.as_str())],
    )?;

    let mut q = query(&[("action", "ACCEPT")]);
    q.max_results_per_file = Some(2);
    let output = search(dir.path(), &q);

    assert_eq!(output.total_matches(), 4);
    for name in ["capped.log", "other.log"] {
        let from_file: Vec<&Record> = output
            .records
            .iter()
            .filter(|r| r.source_file() == Some(name))
            .collect();
        assert_eq!(from_file.len(), 2);
        // File order is preserved
        assert_eq!(from_file[0].get("serialno"), Some("0"));
        assert_eq!(from_file[1].get("serialno"), Some("1"));
    }
    Ok(())
}

#[test]
fn test_corrupt_file_does_not_abort() -> Result<()> {
    let dir = tempdir()?;
    fs::write(
        dir.path().join("corrupt.bin"),
        [0xff_u8, 0xfe, 0x00, 0x9c, 0x80, b'\n', 0xc3, 0x28, b'|', 0xa0, 0xa1],
    )?;
    create_test_files(
        &dir,
        &[(
            "valid.log",
            flow_line(7, "10.0.0.1", "10.0.0.2", "REJECT", 100, 200).as_str(),
        )],
    )?;

    let output = search(dir.path(), &query(&[("action", "REJECT")]));
    assert_eq!(output.total_matches(), 1);
    assert_eq!(output.records[0].source_file(), Some("valid.log"));
    assert_eq!(output.files_failed, 0);
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_symlinks_are_resolved_or_skipped() -> Result<()> {
    use std::os::unix::fs::symlink;

    let dir = tempdir()?;
    create_test_files(
        &dir,
        &[(
            "valid.log",
            flow_line(1, "10.0.0.1", "10.0.0.2", "REJECT", 100, 200).as_str(),
        )],
    )?;
    // A link to a file is scanned under the link's own name
    symlink(dir.path().join("valid.log"), dir.path().join("alias.log"))?;
    // A dangling link is not a regular file
    symlink(dir.path().join("missing.log"), dir.path().join("dangling.log"))?;
    // A symlink to a directory is neither followed nor scanned
    fs::create_dir(dir.path().join("real-dir"))?;
    symlink(dir.path().join("real-dir"), dir.path().join("dir-link"))?;

    let output = search(dir.path(), &query(&[("action", "REJECT")]));
    let records = output.sorted();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].source_file(), Some("alias.log"));
    assert_eq!(records[1].source_file(), Some("valid.log"));
    assert_eq!(output.files_scanned, 2);
    assert_eq!(output.files_failed, 0);
    Ok(())
}

#[test]
fn test_nested_directories_and_many_files() -> Result<()> {
    let dir = tempdir()?;
    for i in 0..40 {
        let mut lines = Vec::new();
        for j in 0..25 {
            let action = if j % 5 == 0 { "REJECT" } else { "ACCEPT" };
            lines.push(flow_line(j, &format!("10.1.{}.{}", i, j), "10.0.0.2", action, 0, 10));
        }
        let name = format!("day-{}/flows-{}.log", i % 4, i);
        create_test_files(&dir, &[(name.as_str(), lines.join("\n").as_str())])?;
    }

    let mut q = query(&[("action", "REJECT")]);
    q.workers = NonZeroUsize::new(3).unwrap();
    let output = search(dir.path(), &q);

    assert_eq!(output.files_scanned, 40);
    assert_eq!(output.files_with_matches, 40);
    assert_eq!(output.total_matches(), 40 * 5);
    assert!(output
        .records
        .iter()
        .all(|r| r.get("action") == Some("REJECT")));
    Ok(())
}

#[test]
fn test_worker_count_does_not_change_results() -> Result<()> {
    let dir = tempdir()?;
    for i in 0..12 {
        let content = (0..10)
            .map(|j| flow_line(j, "10.0.0.1", &format!("10.0.{}.{}", i, j % 3), "ACCEPT", 0, 10))
            .collect::<Vec<_>>()
            .join("\n");
        create_test_files(&dir, &[(format!("f{}.log", i).as_str(), content.as_str())])?;
    }

    let mut q = query(&[("srcaddr", "10.0.0.1")]);
    q.workers = NonZeroUsize::new(1).unwrap();
    let single = search(dir.path(), &q).sorted();
    q.workers = NonZeroUsize::new(8).unwrap();
    let many = search(dir.path(), &q).sorted();

    assert_eq!(single.len(), 120);
    assert_eq!(single, many);
    Ok(())
}

#[test]
fn test_non_records_are_ignored() -> Result<()> {
    let dir = tempdir()?;
    create_test_files(
        &dir,
        &[(
            "noise.log",
            "\n\
             # exported flow logs\n\
             {}\n\
             [\"not\", \"an\", \"object\"]\n\
             a|b|c\n\
             {\"action\":\"ACCEPT\"}\n",
        )],
    )?;

    let output = search(dir.path(), &query(&[]));
    assert_eq!(output.total_matches(), 1);
    assert_eq!(output.records[0].get("action"), Some("ACCEPT"));
    Ok(())
}

#[test]
fn test_decode_modes_affect_values() -> Result<()> {
    let dir = tempdir()?;
    fs::write(
        dir.path().join("latin1.log"),
        b"{\"action\":\"ACCEPT\",\"note\":\"caf\xe9\"}\n",
    )?;

    let q = query(&[("action", "ACCEPT")]);
    let ignored = search_with(dir.path(), &q, DecodeMode::Ignore);
    assert_eq!(ignored.records[0].get("note"), Some("caf"));

    let lossy = search_with(dir.path(), &q, DecodeMode::Lossy);
    assert_eq!(lossy.records[0].get("note"), Some("caf\u{FFFD}"));
    Ok(())
}

#[test]
fn test_query_from_json_drives_search() -> Result<()> {
    let dir = tempdir()?;
    create_test_files(&dir, &[("a.log", FLOW_A), ("b.log", FLOW_B)])?;

    let q = SearchQuery::from_json(r#"{"criteria":{"dstport":443},"workers":2}"#)?;
    let output = search(dir.path(), &q);
    assert_eq!(output.total_matches(), 1);
    assert_eq!(output.records[0].source_file(), Some("a.log"));

    let report = output.report(10);
    assert_eq!(report.count, 1);
    assert_eq!(
        report.results[0].summary,
        "10.0.0.1 → 10.0.0.2 | Action: ACCEPT | Log Status: OK"
    );
    Ok(())
}
