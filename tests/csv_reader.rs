use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use strata::csv::{
    csv_data_types, get_col_names, get_col_pos, get_file_info, guess_format, parse, parse_no_header,
    CsvFormat, CsvReader, CsvStat, DataType, VariableColumnPolicy,
};
use strata::Error;
use tempfile::TempDir;

fn write_file(dir: &TempDir, name: &str, contents: &str) -> anyhow::Result<PathBuf> {
    let path = dir.path().join(name);
    std::fs::write(&path, contents)?;
    Ok(path)
}

fn values(rows: &[strata::csv::CsvRow]) -> Vec<Vec<String>> {
    rows.iter().map(|r| r.to_vec()).collect()
}

/// Write `records` with the `csv` crate so quoting follows a reference writer.
fn write_reference_csv(
    path: &Path,
    header: &[&str],
    records: &[Vec<String>],
) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(header)?;
    for record in records {
        writer.write_record(record)?;
    }
    writer.flush()?;
    Ok(())
}

fn read_reference_csv(path: &Path) -> anyhow::Result<Vec<Vec<String>>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut out = Vec::new();
    for record in reader.records() {
        out.push(record?.iter().map(str::to_string).collect());
    }
    Ok(out)
}

fn tricky_records(n: usize) -> Vec<Vec<String>> {
    (0..n)
        .map(|i| {
            vec![
                i.to_string(),
                format!("name {i}, with comma"),
                format!("said \"hello {i}\""),
                if i % 7 == 0 { "multi\nline".to_string() } else { format!("{}.5", i * 3) },
                String::new(),
            ]
        })
        .collect()
}

#[test]
fn basic_rows_and_names() -> anyhow::Result<()> {
    let reader = CsvReader::from_reader(Cursor::new("a,b,c\n1,2,3\n4,5,6"), CsvFormat::new())?;
    assert_eq!(reader.col_names(), ["a", "b", "c"]);

    let rows = parse("a,b,c\n1,2,3\n4,5,6", CsvFormat::new())?;
    assert_eq!(values(&rows), vec![vec!["1", "2", "3"], vec!["4", "5", "6"]]);
    Ok(())
}

#[test]
fn escaped_quotes_are_collapsed() -> anyhow::Result<()> {
    let rows = parse("quote\n\"He said \"\"hi\"\"\"\n", CsvFormat::new())?;
    assert_eq!(rows[0].field("quote")?.as_str(), "He said \"hi\"");
    assert_eq!(rows[0].get(0).map(|f| f.as_bytes().len()), Some(16));
    Ok(())
}

#[test]
fn crlf_line_endings() -> anyhow::Result<()> {
    let rows = parse("a,b\r\n1,2\r\n3,4\r\n", CsvFormat::new())?;
    assert_eq!(values(&rows), vec![vec!["1", "2"], vec!["3", "4"]]);
    Ok(())
}

#[test]
fn variable_column_policies() -> anyhow::Result<()> {
    let input = "a,b,c\n1,2\n3,4,5\n6,7,8,9\n";

    let ignored = parse(input, CsvFormat::new())?;
    assert_eq!(values(&ignored), vec![vec!["3", "4", "5"]]);

    let kept = parse(input, CsvFormat::new().variable_columns(VariableColumnPolicy::Keep))?;
    assert_eq!(kept.iter().map(|r| r.len()).collect::<Vec<_>>(), vec![2, 3, 4]);

    let mut reader = CsvReader::from_reader(
        Cursor::new(input),
        CsvFormat::new().variable_columns(VariableColumnPolicy::Throw),
    )?;
    let err = reader.read_row().unwrap_err();
    assert!(matches!(err, Error::RowLength { expected: 3, actual: 2, .. }));
    assert!(err.to_string().starts_with("Line too short"), "{err}");
    assert_eq!(
        reader.read_row()?.map(|r| r.to_vec()),
        Some(vec!["3".into(), "4".into(), "5".into()])
    );
    let err = reader.read_row().unwrap_err();
    assert!(err.to_string().starts_with("Line too long"), "{err}");
    assert!(reader.read_row()?.is_none());
    Ok(())
}

#[test]
fn iteration_after_exhaustion_is_empty() -> anyhow::Result<()> {
    let mut reader = CsvReader::from_reader(Cursor::new("a,b\n1,2\n3,4\n"), CsvFormat::new())?;
    assert_eq!(reader.by_ref().count(), 2);
    assert_eq!(reader.by_ref().count(), 0);
    assert!(reader.read_row()?.is_none());
    assert!(reader.eof());
    assert_eq!(reader.n_rows(), 2);
    Ok(())
}

#[test]
fn named_and_positional_access_agree() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("people.csv");
    write_reference_csv(&path, &["id", "name", "quote", "value", "empty"], &tricky_records(50))?;

    let mut reader = CsvReader::from_path(&path, CsvFormat::new())?;
    let names = reader.col_names();
    for row in reader.by_ref() {
        let row = row?;
        for (i, name) in names.iter().enumerate() {
            assert_eq!(row.get(i).map(|f| f.as_str()), Some(row.field(name)?.as_str()));
        }
    }
    assert_eq!(reader.n_rows(), 50);
    assert_eq!(reader.index_of("quote"), Some(2));
    assert_eq!(reader.index_of("missing"), None);
    Ok(())
}

#[test]
fn multi_chunk_parsing_matches_reference_reader() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("big.csv");
    let records = tricky_records(3000);
    write_reference_csv(&path, &["id", "name", "quote", "value", "empty"], &records)?;
    let expected = read_reference_csv(&path)?;
    assert_eq!(expected, records);

    for chunk in [64, 1000, 1 << 20] {
        let mut reader = CsvReader::from_path_with_chunk(&path, CsvFormat::new(), chunk)?;
        let rows = reader.by_ref().collect::<strata::Result<Vec<_>>>()?;
        assert_eq!(values(&rows), expected, "mmap chunk size {chunk}");

        let file = std::fs::File::open(&path)?;
        let mut reader = CsvReader::from_reader_with_chunk(file, CsvFormat::new(), chunk)?;
        let rows = reader.by_ref().collect::<strata::Result<Vec<_>>>()?;
        assert_eq!(values(&rows), expected, "stream chunk size {chunk}");
    }
    Ok(())
}

#[test]
fn rows_longer_than_a_chunk() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let long = "x".repeat(500);
    let path = write_file(&dir, "long.csv", &format!("a,b\n{long},1\n{long},2\n"))?;

    let reader = CsvReader::from_path_with_chunk(&path, CsvFormat::new(), 16)?;
    assert_eq!(reader.col_names(), ["a", "b"]);
    let rows = reader.collect::<strata::Result<Vec<_>>>()?;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].field("a")?.as_str(), long);
    Ok(())
}

#[test]
fn guesses_delimiter_and_header() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let pipes = write_file(&dir, "pipes.csv", "x|y|z\n1|2|3\n4|5|6\n")?;
    let reader = CsvReader::from_path(&pipes, CsvFormat::guess_csv())?;
    assert_eq!(reader.format().delim()?, b'|');
    assert_eq!(reader.col_names(), ["x", "y", "z"]);

    let preamble = write_file(
        &dir,
        "preamble.csv",
        "report title\ngenerated today\na,b,c\n1,2,3\n4,5,6\n",
    )?;
    let guess = guess_format(&preamble, &[b',', b'|', b'\t', b';'])?;
    assert_eq!((guess.delim, guess.header_row), (b',', 2));

    let mut reader = CsvReader::from_path(&preamble, CsvFormat::guess_csv())?;
    assert_eq!(reader.col_names(), ["a", "b", "c"]);
    assert_eq!(reader.by_ref().count(), 2);

    let tabs = "k\tv\na\t1\nb\t2\n";
    let reader = CsvReader::from_reader(Cursor::new(tabs), CsvFormat::guess_csv())?;
    assert_eq!(reader.format().delim()?, b'\t');
    assert_eq!(reader.collect::<strata::Result<Vec<_>>>()?.len(), 2);
    Ok(())
}

#[test]
fn header_row_and_explicit_names() -> anyhow::Result<()> {
    let rows = parse("junk\na,b\n1,2\n", CsvFormat::new().header_row(1))?;
    assert_eq!(rows[0].field("b")?.as_str(), "2");

    let rows = parse("1,2\n3,4\n", CsvFormat::new().column_names(["left", "right"]))?;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].field("left")?.as_str(), "3");

    let rows = parse_no_header("1,2\n3,4,5\n")?;
    assert_eq!(rows.iter().map(|r| r.len()).collect::<Vec<_>>(), vec![2, 3]);
    assert!(matches!(rows[0].field("a"), Err(Error::ColumnNotFound(_))));
    Ok(())
}

#[test]
fn byte_order_mark_is_detected() -> anyhow::Result<()> {
    let reader = CsvReader::from_reader(Cursor::new("\u{feff}a,b\n1,2\n"), CsvFormat::new())?;
    assert!(reader.utf8_bom());
    assert_eq!(reader.col_names(), ["a", "b"]);

    let reader = CsvReader::from_reader(Cursor::new("a,b\n1,2\n"), CsvFormat::new())?;
    assert!(!reader.utf8_bom());
    Ok(())
}

#[test]
fn header_row_beyond_the_first_chunk() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let input = "t1\nt2\na,b\n1,2\n3,4\n";
    let path = write_file(&dir, "titled.csv", input)?;

    let readers = [
        CsvReader::from_reader_with_chunk(Cursor::new(input), CsvFormat::new().header_row(2), 4)?,
        CsvReader::from_path_with_chunk(&path, CsvFormat::new().header_row(2), 4)?,
    ];
    for mut reader in readers {
        assert_eq!(reader.col_names(), ["a", "b"]);
        let rows = reader.by_ref().collect::<Result<Vec<_>, _>>()?;
        assert_eq!(values(&rows), vec![vec!["1", "2"], vec!["3", "4"]]);
        assert_eq!(reader.n_rows(), 2);
    }
    Ok(())
}

#[test]
fn byte_order_mark_with_small_chunks() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let input = "\u{feff}name,value\n1,2\n";
    let path = write_file(&dir, "bom.csv", input)?;

    let readers = [
        CsvReader::from_reader_with_chunk(Cursor::new(input), CsvFormat::new(), 4)?,
        CsvReader::from_path_with_chunk(&path, CsvFormat::new(), 4)?,
    ];
    for mut reader in readers {
        assert!(reader.utf8_bom());
        assert_eq!(reader.col_names(), ["name", "value"]);
        assert_eq!(reader.index_of("name"), Some(0));
        let rows = reader.by_ref().collect::<Result<Vec<_>, _>>()?;
        assert_eq!(values(&rows), vec![vec!["1", "2"]]);
    }
    Ok(())
}

#[test]
fn trimming_and_custom_quote() -> anyhow::Result<()> {
    let format = CsvFormat::new().delimiter(b';')?.quote(b'\'')?.trim(b" ")?;
    let rows = parse(" a ; b \n 'x;y' ; 2 \n", format)?;
    assert_eq!(values(&rows), vec![vec!["x;y", "2"]]);
    Ok(())
}

#[test]
fn field_conversions() -> anyhow::Result<()> {
    let rows = parse("i,f,s,b,n\n 42 ,2.5e1,abc,TRUE,\n", CsvFormat::new())?;
    let row = &rows[0];
    assert_eq!(row.field("i")?.as_i64(), Some(42));
    assert_eq!(row.field("f")?.as_f64(), Some(25.0));
    assert!(row.field("f")?.is_float());
    assert_eq!(row.field("s")?.as_f64(), None);
    assert!(row.field("s")?.is_str());
    assert_eq!(row.field("b")?.as_bool(), Some(true));
    assert!(row.field("n")?.is_null());
    assert_eq!(row.field("i")?.data_type(), DataType::Int8);
    Ok(())
}

#[test]
fn rows_export_json() -> anyhow::Result<()> {
    let rows = parse("name,age,score\n\"Bob \"\"B\"\"\",30,1.5\n", CsvFormat::new())?;
    let row = &rows[0];
    assert_eq!(row.to_json(&[])?, r#"{"name":"Bob \"B\"","age":30,"score":1.5}"#);
    assert_eq!(row.to_json(&["age"])?, r#"{"age":30}"#);
    assert_eq!(row.to_json_array(&[])?, r#"["Bob \"B\"",30,1.5]"#);

    let parsed: serde_json::Value = serde_json::from_str(&row.to_json(&[])?)?;
    assert_eq!(parsed["age"], 30);
    assert!(row.to_json(&["nope"]).is_err());
    Ok(())
}

#[test]
fn statistics_per_column() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = write_file(&dir, "stats.csv", "x,y\n1,10\n2,20\n3,30\n4,foo\n")?;
    let stat = CsvStat::from_path(&path, CsvFormat::new())?;

    assert_eq!(stat.col_names(), ["x", "y"]);
    assert_eq!(stat.n_rows(), 4);
    let mean = stat.mean();
    let variance = stat.variance();
    assert!((mean[0] - 2.5).abs() < 1e-12);
    assert!((variance[0] - 5.0 / 3.0).abs() < 1e-12);
    assert!((mean[1] - 20.0).abs() < 1e-12);
    assert_eq!(stat.mins(), vec![1.0, 10.0]);
    assert_eq!(stat.maxes(), vec![4.0, 30.0]);

    let counts = stat.counts();
    assert_eq!(counts[1].get("foo"), Some(&1));
    let dtypes = stat.dtypes();
    assert_eq!(dtypes[1].get(&DataType::Int8), Some(&3));
    assert_eq!(dtypes[1].get(&DataType::String), Some(&1));
    Ok(())
}

#[test]
fn statistics_span_several_blocks() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let mut contents = String::from("n\n");
    for i in 1..=12_000 {
        contents.push_str(&format!("{i}\n"));
    }
    let path = write_file(&dir, "many.csv", &contents)?;
    let stat = CsvStat::from_path(&path, CsvFormat::new())?;
    assert!((stat.mean()[0] - 6000.5).abs() < 1e-9);
    assert_eq!(stat.maxes()[0], 12_000.0);
    // Distinct values stop being counted once the column is clearly unique.
    assert!(stat.counts()[0].len() < 12_000);
    Ok(())
}

#[test]
fn column_data_types() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = write_file(&dir, "types.csv", "id,price,name,big\n1,2.5,a,300\n2,3.5,b,70000\n")?;
    let types = csv_data_types(&path)?;
    let expected: HashMap<String, DataType> = [
        ("id", DataType::Int8),
        ("price", DataType::Double),
        ("name", DataType::String),
        ("big", DataType::Int32),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();
    assert_eq!(types, expected);
    Ok(())
}

#[test]
fn file_helpers() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = write_file(&dir, "semi.csv", "a;b;c\n1;2;3\n4;5;6\n7;8;9\n")?;

    let info = get_file_info(&path)?;
    assert_eq!(info.delim, ';');
    assert_eq!(info.n_rows, 3);
    assert_eq!(info.n_cols, 3);
    assert_eq!(info.col_names, ["a", "b", "c"]);
    let json = serde_json::to_string(&info)?;
    assert!(json.contains("\"n_rows\":3"));

    assert_eq!(get_col_names(&path, CsvFormat::guess_csv())?, ["a", "b", "c"]);
    assert_eq!(get_col_pos(&path, "c", CsvFormat::guess_csv())?, Some(2));
    assert_eq!(get_col_pos(&path, "z", CsvFormat::guess_csv())?, None);
    Ok(())
}

#[test]
fn empty_input() -> anyhow::Result<()> {
    let mut reader = CsvReader::from_reader(Cursor::new(""), CsvFormat::new())?;
    assert!(reader.col_names().is_empty());
    assert!(reader.read_row()?.is_none());
    assert!(reader.is_empty());

    let dir = TempDir::new()?;
    let path = write_file(&dir, "empty.csv", "")?;
    let mut reader = CsvReader::from_path(&path, CsvFormat::new())?;
    assert!(reader.read_row()?.is_none());
    Ok(())
}

#[test]
fn missing_file_is_an_io_error() {
    let err = CsvReader::from_path("/definitely/not/here.csv", CsvFormat::new()).unwrap_err();
    assert!(matches!(err, Error::Io { .. }));
}
