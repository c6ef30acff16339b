#![cfg(feature = "io-xlsx")]

use anyhow::{Context, Result};
use calamine::{Reader, Xlsx, open_workbook};
use catsplit::{OutputFormat, Separator, SplitConfig, split_file};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Cells of the first worksheet, as displayed text.
fn read_sheet(path: &Path) -> Result<Vec<Vec<String>>> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let range = workbook
        .worksheet_range_at(0)
        .context("workbook has no worksheet")??;
    Ok(range
        .rows()
        .map(|row| row.iter().map(ToString::to_string).collect())
        .collect())
}

#[test]
fn spreadsheet_sinks_are_written_per_category() -> Result<()> {
    let tmp = TempDir::new()?;
    let input = tmp.path().join("data.csv");
    fs::write(&input, "id,region,value\n1,EU,10\n2,US,20\n3,EU,30\n")?;
    let out = tmp.path().join("out");
    let mut cfg = SplitConfig::new("region", &out);
    cfg.input_separator = Separator::Byte(b',');
    cfg.output_format = OutputFormat::Spreadsheet;

    let summary = split_file(&input, &cfg)?;

    assert_eq!(summary.output_files.len(), 2);
    for category in ["EU", "US"] {
        let bytes = fs::read(out.join(category).join("data.xlsx"))?;
        // xlsx is a zip container.
        assert!(bytes.starts_with(b"PK\x03\x04"));
    }
    assert_eq!(
        read_sheet(&out.join("EU/data.xlsx"))?,
        vec![
            vec!["id".to_string(), "value".to_string()],
            vec!["1".to_string(), "10".to_string()],
            vec!["3".to_string(), "30".to_string()],
        ]
    );
    assert_eq!(
        read_sheet(&out.join("US/data.xlsx"))?,
        vec![
            vec!["id".to_string(), "value".to_string()],
            vec!["2".to_string(), "20".to_string()],
        ]
    );
    Ok(())
}

#[test]
fn spreadsheet_output_is_reproducible() -> Result<()> {
    let tmp = TempDir::new()?;
    let input = tmp.path().join("data.csv");
    fs::write(&input, "id,region\n1,EU\n2,EU\n")?;
    let mut cfg = SplitConfig::new("region", tmp.path().join("a"));
    cfg.input_separator = Separator::Byte(b',');
    cfg.output_format = OutputFormat::Spreadsheet;

    split_file(&input, &cfg)?;
    cfg.output_directory = tmp.path().join("b");
    split_file(&input, &cfg)?;

    assert_eq!(
        read_sheet(&tmp.path().join("a/EU/data.xlsx"))?,
        vec![vec!["id".to_string()], vec!["1".to_string()], vec!["2".to_string()]]
    );
    assert_eq!(
        fs::read(tmp.path().join("a/EU/data.xlsx"))?,
        fs::read(tmp.path().join("b/EU/data.xlsx"))?
    );
    Ok(())
}
