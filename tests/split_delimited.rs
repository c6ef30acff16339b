use anyhow::Result;
use catsplit::{JobStatus, Runner, Separator, SplitConfig, split_file};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn comma_config(out: &Path) -> SplitConfig {
    let mut cfg = SplitConfig::new("region", out);
    cfg.input_separator = Separator::Byte(b',');
    cfg.output_separator = Separator::Byte(b',');
    cfg
}

fn write_input(dir: &Path, name: &str, body: &str) -> Result<PathBuf> {
    let path = dir.join(name);
    fs::write(&path, body)?;
    Ok(path)
}

/// All files under `root`, relative path → contents.
fn snapshot_tree(root: &Path) -> Result<BTreeMap<PathBuf, Vec<u8>>> {
    let mut out = BTreeMap::new();
    if !root.exists() {
        return Ok(out);
    }
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_dir() {
                stack.push(path);
            } else {
                out.insert(path.strip_prefix(root)?.to_path_buf(), fs::read(&path)?);
            }
        }
    }
    Ok(out)
}

#[test]
fn splits_by_region_and_drops_the_column() -> Result<()> {
    let tmp = TempDir::new()?;
    let input = write_input(
        tmp.path(),
        "data.csv",
        "id,region,value\n1,EU,10\n2,US,20\n3,EU,30\n",
    )?;
    let out = tmp.path().join("out");

    let summary = split_file(&input, &comma_config(&out))?;

    assert_eq!(summary.categories_found, 2);
    assert_eq!(summary.rows_per_category["EU"], 2);
    assert_eq!(summary.rows_per_category["US"], 1);
    assert_eq!(fs::read_to_string(out.join("EU/data.csv"))?, "id,value\n1,10\n3,30\n");
    assert_eq!(fs::read_to_string(out.join("US/data.csv"))?, "id,value\n2,20\n");
    Ok(())
}

#[test]
fn keep_column_retains_original_values() -> Result<()> {
    let tmp = TempDir::new()?;
    let input = write_input(
        tmp.path(),
        "data.csv",
        "id,region,value\n1,EU,10\n2,US,20\n3,EU,30\n",
    )?;
    let out = tmp.path().join("out");
    let mut cfg = comma_config(&out);
    cfg.keep_category_column = true;

    split_file(&input, &cfg)?;

    assert_eq!(
        fs::read_to_string(out.join("EU/data.csv"))?,
        "id,region,value\n1,EU,10\n3,EU,30\n"
    );
    assert_eq!(
        fs::read_to_string(out.join("US/data.csv"))?,
        "id,region,value\n2,US,20\n"
    );
    Ok(())
}

#[test]
fn pipe_defaults_and_output_separator_conversion() -> Result<()> {
    let tmp = TempDir::new()?;
    let input = write_input(tmp.path(), "sales.txt", "a|cat|b\nx|k1|y\nz|k2|w\n")?;
    let out = tmp.path().join("out");
    let mut cfg = SplitConfig::new("cat", &out);
    cfg.output_separator = Separator::Byte(b'\t');
    cfg.output_extension = Some("tsv".into());

    split_file(&input, &cfg)?;

    assert_eq!(fs::read_to_string(out.join("k1/sales.tsv"))?, "a\tb\nx\ty\n");
    assert_eq!(fs::read_to_string(out.join("k2/sales.tsv"))?, "a\tb\nz\tw\n");
    Ok(())
}

#[test]
fn multi_character_separators() -> Result<()> {
    let tmp = TempDir::new()?;
    let input = write_input(
        tmp.path(),
        "multi.dat",
        "id||kind||note\r\n1||a||x,y\r\n2||b||z\r\n3||a||\r\n",
    )?;
    let out = tmp.path().join("out");
    let mut cfg = SplitConfig::new("kind", &out);
    cfg.input_separator = "||".parse()?;
    cfg.output_separator = "::".parse()?;

    let summary = split_file(&input, &cfg)?;

    assert_eq!(summary.rows_per_category["a"], 2);
    assert_eq!(fs::read_to_string(out.join("a/multi.csv"))?, "id::note\n1::x,y\n3::\n");
    assert_eq!(fs::read_to_string(out.join("b/multi.csv"))?, "id::note\n2::z\n");
    Ok(())
}

#[test]
fn quoted_fields_survive_the_round_trip() -> Result<()> {
    let tmp = TempDir::new()?;
    let input = write_input(
        tmp.path(),
        "quotes.csv",
        "id,region,comment\n1,EU,\"hello, world\"\n2,EU,\"line\nbreak\"\n3,\"U,S\",plain\n",
    )?;
    let out = tmp.path().join("out");

    let summary = split_file(&input, &comma_config(&out))?;

    assert_eq!(summary.rows_per_category["EU"], 2);
    assert_eq!(summary.rows_per_category["U,S"], 1);

    let mut rdr = csv::ReaderBuilder::new().from_path(out.join("EU/quotes.csv"))?;
    let rows: Vec<Vec<String>> = rdr
        .records()
        .map(|r| r.map(|r| r.iter().map(str::to_owned).collect()))
        .collect::<Result<_, _>>()?;
    assert_eq!(
        rows,
        vec![
            vec!["1".to_string(), "hello, world".to_string()],
            vec!["2".to_string(), "line\nbreak".to_string()],
        ]
    );
    assert!(out.join("U,S/quotes.csv").is_file());
    Ok(())
}

#[test]
fn empty_category_value_is_its_own_bucket() -> Result<()> {
    let tmp = TempDir::new()?;
    let input = write_input(tmp.path(), "gaps.csv", "id,region\n1,EU\n2,\n3,\n")?;
    let out = tmp.path().join("out");

    let summary = split_file(&input, &comma_config(&out))?;

    assert_eq!(summary.categories_found, 2);
    assert_eq!(summary.rows_per_category[""], 2);
    assert_eq!(fs::read_to_string(out.join("%/gaps.csv"))?, "id\n2\n3\n");
    Ok(())
}

#[test]
fn hostile_category_values_stay_inside_the_output_tree() -> Result<()> {
    let tmp = TempDir::new()?;
    let input = write_input(
        tmp.path(),
        "evil.csv",
        "id,region\n1,../escape\n2,..\n3,a/b\n",
    )?;
    let out = tmp.path().join("out");

    split_file(&input, &comma_config(&out))?;

    assert!(out.join("..%2Fescape/evil.csv").is_file());
    assert!(out.join("%2E%2E/evil.csv").is_file());
    assert!(out.join("a%2Fb/evil.csv").is_file());
    assert!(!tmp.path().join("escape").exists());
    Ok(())
}

#[test]
fn header_only_input_produces_nothing() -> Result<()> {
    let tmp = TempDir::new()?;
    let header_only = write_input(tmp.path(), "header.csv", "id,region,value\n")?;
    let zero_bytes = write_input(tmp.path(), "zero.csv", "")?;
    let out = tmp.path().join("out");

    let runner = Runner::new(comma_config(&out))?;
    let stats = runner.run(&[header_only, zero_bytes]);

    for entry in &stats.per_file {
        assert_eq!(entry.status, JobStatus::Ok);
        assert_eq!(entry.categories_found, 0);
        assert!(entry.rows_per_category.is_empty());
    }
    assert!(snapshot_tree(&out)?.is_empty());
    Ok(())
}

#[test]
fn every_row_lands_in_exactly_one_file() -> Result<()> {
    let tmp = TempDir::new()?;
    let mut body = String::from("id,region,value\n");
    for i in 0..5_000 {
        body.push_str(&format!("{i},r{},{}\n", i % 37, i * 3));
    }
    let input = write_input(tmp.path(), "big.csv", &body)?;
    let out = tmp.path().join("out");
    let mut cfg = comma_config(&out);
    cfg.routing_chunk_rows = 128;

    let summary = split_file(&input, &cfg)?;
    assert_eq!(summary.categories_found, 37);
    assert_eq!(summary.rows_per_category.values().sum::<u64>(), 5_000);

    let mut seen = vec![0u8; 5_000];
    for (rel, bytes) in snapshot_tree(&out)? {
        let category = rel.parent().and_then(Path::to_str).unwrap_or_default().to_string();
        let text = String::from_utf8(bytes)?;
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("id,value"));
        let mut last_id = None;
        for line in lines {
            let (id, value) = line.split_once(',').unwrap_or_default();
            let id: usize = id.parse()?;
            assert_eq!(format!("r{}", id % 37), category);
            assert_eq!(value, (id * 3).to_string());
            // Input order is preserved within a category.
            assert!(last_id.is_none_or(|prev| prev < id));
            last_id = Some(id);
            seen[id] += 1;
        }
    }
    assert!(seen.iter().all(|&n| n == 1));
    Ok(())
}

#[test]
fn repeated_runs_are_byte_identical() -> Result<()> {
    let tmp = TempDir::new()?;
    let mut body = String::from("id,region,value\n");
    for i in 0..2_000 {
        body.push_str(&format!("{i},c{},\"v {i}\"\n", i % 11));
    }
    let input = write_input(tmp.path(), "data.csv", &body)?;
    let out = tmp.path().join("out");
    let mut cfg = comma_config(&out);
    cfg.routing_chunk_rows = 97;

    split_file(&input, &cfg)?;
    let first = snapshot_tree(&out)?;
    fs::remove_dir_all(&out)?;
    split_file(&input, &cfg)?;
    let second = snapshot_tree(&out)?;

    assert_eq!(first.len(), 11);
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn parallel_and_sequential_routing_agree() -> Result<()> {
    let tmp = TempDir::new()?;
    let mut body = String::from("id,region\n");
    for i in 0..3_000 {
        body.push_str(&format!("{i},g{}\n", (i * 7) % 23));
    }
    let input = write_input(tmp.path(), "data.csv", &body)?;

    let seq_out = tmp.path().join("seq");
    let mut seq = comma_config(&seq_out);
    seq.parallel_routing = false;
    seq.routing_chunk_rows = 64;
    split_file(&input, &seq)?;

    let par_out = tmp.path().join("par");
    let mut par = comma_config(&par_out);
    par.parallel_routing = true;
    par.routing_chunk_rows = 64;
    split_file(&input, &par)?;

    assert_eq!(snapshot_tree(&seq_out)?, snapshot_tree(&par_out)?);
    Ok(())
}

#[test]
fn rerun_without_clearing_truncates_previous_output() -> Result<()> {
    let tmp = TempDir::new()?;
    let input = write_input(tmp.path(), "data.csv", "id,region\n1,EU\n2,EU\n")?;
    let out = tmp.path().join("out");
    let cfg = comma_config(&out);

    split_file(&input, &cfg)?;
    split_file(&input, &cfg)?;

    assert_eq!(fs::read_to_string(out.join("EU/data.csv"))?, "id\n1\n2\n");
    Ok(())
}
