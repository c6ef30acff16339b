use anyhow::Result;
use catsplit::{
    ErrorKind, JobStatus, MalformedPolicy, RowSource, Runner, Separator, SplitConfig, SplitError,
    split_file,
};
use std::fs;
use std::io;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const WITH_SHORT_ROW: &str = "id,region,value\n1,EU,10\n2,US\n3,EU,30\n4,US,40,extra\n";

fn config(out: &std::path::Path) -> SplitConfig {
    let mut cfg = SplitConfig::new("region", out);
    cfg.input_separator = Separator::Byte(b',');
    cfg.output_separator = Separator::Byte(b',');
    cfg
}

#[test]
fn row_source_reports_width_mismatches_and_keeps_going() -> Result<()> {
    let tmp = TempDir::new()?;
    let input = tmp.path().join("in.csv");
    fs::write(&input, WITH_SHORT_ROW)?;

    let pass = RowSource::new(&input, Separator::Byte(b',')).open()?;
    assert_eq!(
        pass.header(),
        Some(&["id".to_string(), "region".to_string(), "value".to_string()][..])
    );
    let items: Vec<_> = pass.collect();
    assert_eq!(items.len(), 4);
    assert!(items[0].is_ok());
    match &items[1] {
        Err(SplitError::MalformedRecord { line, .. }) => assert_eq!(*line, 3),
        other => panic!("expected malformed record, got {other:?}"),
    }
    assert!(items[2].is_ok());
    assert!(matches!(items[3], Err(SplitError::MalformedRecord { .. })));
    Ok(())
}

#[test]
fn skip_policy_drops_bad_rows_and_counts_them() -> Result<()> {
    let tmp = TempDir::new()?;
    let input = tmp.path().join("in.csv");
    fs::write(&input, WITH_SHORT_ROW)?;
    let out = tmp.path().join("out");

    let summary = split_file(&input, &config(&out))?;

    assert_eq!(summary.rows_skipped, 2);
    assert_eq!(summary.rows_read, 4);
    assert_eq!(summary.rows_per_category["EU"], 2);
    assert!(!summary.rows_per_category.contains_key("US"));
    assert_eq!(fs::read_to_string(out.join("EU/in.csv"))?, "id,value\n1,10\n3,30\n");
    // A category seen only on malformed rows never gets a file.
    assert!(!out.join("US").exists());
    Ok(())
}

#[test]
fn abort_policy_fails_before_writing_anything() -> Result<()> {
    let tmp = TempDir::new()?;
    let input = tmp.path().join("in.csv");
    fs::write(&input, WITH_SHORT_ROW)?;
    let out = tmp.path().join("out");
    let mut cfg = config(&out);
    cfg.malformed_policy = MalformedPolicy::Abort;

    let err = split_file(&input, &cfg).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedRecord);
    assert!(!out.exists());
    Ok(())
}

#[test]
fn run_reports_skipped_rows_per_file() -> Result<()> {
    let tmp = TempDir::new()?;
    let input = tmp.path().join("in.csv");
    fs::write(&input, WITH_SHORT_ROW)?;
    let out = tmp.path().join("out");

    let stats = Runner::new(config(&out))?.run(std::slice::from_ref(&input));

    let entry = stats.get(&input).expect("entry for input");
    assert_eq!(entry.status, JobStatus::Ok);
    assert_eq!(entry.rows_skipped, 2);
    assert_eq!(entry.rows_written(), 2);
    Ok(())
}

#[test]
fn multi_char_separator_rows_are_checked_too() -> Result<()> {
    let tmp = TempDir::new()?;
    let input = tmp.path().join("in.txt");
    fs::write(&input, "a<>b<>c\n1<>x<>2\n3<>y\n\n4<>x<>5\n")?;
    let out = tmp.path().join("out");
    let mut cfg = SplitConfig::new("b", &out);
    cfg.input_separator = "<>".parse()?;
    cfg.output_separator = Separator::Byte(b',');

    let summary = split_file(&input, &cfg)?;

    assert_eq!(summary.rows_skipped, 1);
    assert_eq!(fs::read_to_string(out.join("x/in.csv"))?, "a,c\n1,2\n4,5\n");
    Ok(())
}

/// In-memory log sink for a test subscriber.
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("log buffer poisoned").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl LogBuffer {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().expect("log buffer poisoned")).into_owned()
    }
}

#[test]
fn skipped_rows_are_warned_with_job_fields() -> Result<()> {
    let tmp = TempDir::new()?;
    let input = tmp.path().join("in.csv");
    fs::write(&input, WITH_SHORT_ROW)?;
    let out = tmp.path().join("out");
    let mut cfg = config(&out);
    cfg.parallel_routing = false;

    let logs = LogBuffer::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    let summary = tracing::subscriber::with_default(subscriber, || split_file(&input, &cfg))?;

    let text = logs.contents();
    let warnings: Vec<&str> = text
        .lines()
        .filter(|l| l.contains("WARN") && l.contains("skipping malformed record"))
        .collect();
    assert_eq!(warnings.len(), 2, "log was:\n{text}");
    assert_eq!(summary.rows_skipped, 2);
    assert!(warnings.iter().all(|l| l.contains("job_id=job-0000")));
    assert!(warnings[0].contains("line=3"));
    assert!(warnings[1].contains("line=5"));
    assert!(warnings[0].contains("expected 3 fields, found 2"));
    // Sink events come from the writer pool and inherit the job's fields.
    let opened: Vec<&str> = text.lines().filter(|l| l.contains("opened sink")).collect();
    assert_eq!(opened.len(), 1);
    assert!(opened[0].contains("job_id=job-0000"));
    assert!(opened[0].contains("in.csv"));
    Ok(())
}
