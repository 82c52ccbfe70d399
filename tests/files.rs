use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use strata::files::{
    localfs, open_with_retry, temp_file_name, BufferedReader, BufferedWriter, Endian,
    FileEventListener, FileHandle, FileHook, MmapReadFile, MmapSource, OpenOptions, RandomRead,
    RandomReadFile, RandomWrite, RandomWriteFile, ReadlineFile, SequentialRead, SequentialReadFile,
    SequentialWrite, SequentialWriteFile, TempFile, DEFAULT_CACHE_SIZE, DEFAULT_PREFIX,
};
use strata::Error;
use tempfile::TempDir;

#[test]
fn sequential_write_then_read() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("seq.txt");

    let mut out = SequentialWriteFile::open(&path)?;
    out.write(b"hello ")?;
    out.write(b"world")?;
    out.flush()?;
    assert_eq!(out.size()?, 11);
    out.close()?;

    let mut input = SequentialReadFile::open(&path)?;
    let mut head = [0u8; 5];
    assert_eq!(input.read(&mut head)?, 5);
    assert_eq!(&head, b"hello");
    input.skip(1)?;
    assert_eq!(input.position(), 6);

    let mut rest = Vec::new();
    input.read_to_vec(&mut rest, None)?;
    assert_eq!(rest, b"world");
    assert!(input.is_eof()?);

    input.close()?;
    assert!(matches!(input.read(&mut head), Err(Error::NotOpen(_))));
    Ok(())
}

#[test]
fn reopen_appends_or_truncates() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("log.txt");

    let mut out = SequentialWriteFile::truncate_open(&path)?;
    out.write(b"first\n")?;
    out.reopen(false)?;
    out.write(b"second\n")?;
    out.flush()?;
    assert_eq!(localfs::read_file_to_string(&path)?, "first\nsecond\n");

    out.reopen(true)?;
    out.write(b"third\n")?;
    out.close()?;
    assert_eq!(localfs::read_file_to_string(&path)?, "third\n");

    let mut out = SequentialWriteFile::open(&path)?;
    out.write(b"fourth\n")?;
    out.truncate(6)?;
    out.write(b"!")?;
    out.close()?;
    assert_eq!(localfs::read_file_to_string(&path)?, "third\n!");
    Ok(())
}

#[test]
fn random_write_and_read() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("random.bin");

    let mut out = RandomWriteFile::open(&path)?;
    out.write_at(0, b"0123456789", false)?;
    out.write_at(4, b"ab", false)?;
    out.flush()?;
    assert_eq!(out.size()?, 10);
    out.write_at(2, b"XY", true)?;
    assert_eq!(out.size()?, 4);
    out.close()?;

    let input = RandomReadFile::open(&path)?;
    let mut buf = [0u8; 3];
    assert_eq!(input.read_at(1, &mut buf)?, 3);
    assert_eq!(&buf, b"1XY");

    let mut all = Vec::new();
    assert_eq!(input.read_at_to_vec(0, &mut all, None)?, 4);
    assert_eq!(all, b"01XY");

    let mut tail = Vec::new();
    assert_eq!(input.read_at_to_vec(3, &mut tail, Some(100))?, 1);
    assert_eq!(input.read_at(10, &mut buf)?, 0);
    Ok(())
}

#[test]
fn mmap_reads_slices_and_cursor() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("mapped.txt");
    localfs::write_file(&path, b"abcdefghij", true)?;

    let mut file = MmapReadFile::open(&path)?;
    assert_eq!(file.as_bytes(), b"abcdefghij");
    assert_eq!(file.slice(3, 4), b"defg");
    assert_eq!(file.slice(8, 100), b"ij");
    assert!(file.slice(50, 1).is_empty());

    file.advance(7);
    assert_eq!(file.remaining(), b"hij");
    let mut buf = [0u8; 8];
    assert_eq!(SequentialRead::read(&mut file, &mut buf)?, 3);
    assert!(file.is_eof()?);

    let mut pread = [0u8; 2];
    assert_eq!(file.read_at(0, &mut pread)?, 2);
    assert_eq!(&pread, b"ab");

    file.close()?;
    assert!(file.as_bytes().is_empty());
    assert!(matches!(file.size(), Err(Error::NotOpen(_))));
    Ok(())
}

#[test]
fn mmap_handles_empty_files_and_windows() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let empty = dir.path().join("empty");
    localfs::write_file(&empty, b"", true)?;
    let file = MmapReadFile::open(&empty)?;
    assert!(file.as_bytes().is_empty());
    assert!(file.remaining().is_empty());

    let path = dir.path().join("windows.txt");
    localfs::write_file(&path, b"0123456789", true)?;
    let source = MmapSource::open(&path)?;
    assert_eq!(source.len(), 10);
    assert!(!source.is_empty());
    assert_eq!(&*source.window(2, 3)?, b"234");
    assert_eq!(&*source.window(8, 10)?, b"89");
    assert!(source.window(20, 4)?.is_empty());
    Ok(())
}

#[test]
fn listener_hooks_fire_in_order() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("hooked.txt");
    let events = Arc::new(Mutex::new(Vec::new()));

    let hook = |name: &'static str| {
        let events = Arc::clone(&events);
        Some(Arc::new(move |_: &std::path::Path| events.lock().unwrap().push(name)) as FileHook)
    };
    let listener = FileEventListener {
        before_open: hook("before_open"),
        after_open: hook("after_open"),
        before_close: hook("before_close"),
        after_close: hook("after_close"),
    };

    let mut out =
        SequentialWriteFile::open_with(&path, OpenOptions::append_write_default(), listener)?;
    out.write(b"x")?;
    out.close()?;
    // A second close is a no-op.
    out.close()?;

    assert_eq!(
        *events.lock().unwrap(),
        ["before_open", "after_open", "before_close", "after_close"]
    );
    Ok(())
}

#[test]
fn open_retries_then_reports_io_error() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let missing = dir.path().join("missing.txt");
    let options = OpenOptions {
        tries: 3,
        interval_ms: 1,
        ..OpenOptions::read_default()
    };
    let err = open_with_retry(&missing, &options).unwrap_err();
    assert!(matches!(err, Error::Io { .. }), "{err}");
    assert!(err.to_string().contains("missing.txt"));

    let opened = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&opened);
    let listener = FileEventListener {
        after_open: Some(Arc::new(move |_: &std::path::Path| {
            counter.fetch_add(1, Ordering::SeqCst);
        }) as FileHook),
        ..FileEventListener::default()
    };
    assert!(SequentialReadFile::open_with(&missing, &options, listener).is_err());
    assert_eq!(opened.load(Ordering::SeqCst), 0);
    Ok(())
}

#[test]
fn create_dir_if_missing_builds_parents() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let nested = dir.path().join("a/b/c.txt");
    let options = OpenOptions {
        create_dir_if_missing: true,
        ..OpenOptions::truncate_write_default()
    };
    let mut out = SequentialWriteFile::open_with(&nested, options, FileEventListener::default())?;
    out.write(b"deep")?;
    out.close()?;
    assert_eq!(localfs::read_file(&nested)?, b"deep");
    Ok(())
}

#[test]
fn temp_files_are_named_and_removed() -> anyhow::Result<()> {
    let dir = TempDir::new()?;

    let name = temp_file_name("spill_", Some("bin"), 8)?;
    assert!(name.starts_with("spill_"));
    assert!(name.ends_with(".bin"));
    assert_eq!(name.len(), "spill_".len() + 8 + ".bin".len());
    assert!(name["spill_".len().."spill_".len() + 8].chars().all(|c| c.is_ascii_alphanumeric()));

    let mut scratch = TempFile::create_in(dir.path(), "run_", None, 6)?;
    let path = scratch.path().to_path_buf();
    assert!(path.file_name().is_some_and(|n| n.to_string_lossy().starts_with("run_")));
    scratch.write(b"partial")?;
    scratch.flush()?;
    assert_eq!(scratch.size()?, 7);
    drop(scratch);
    assert!(!path.exists());

    let mut closed = TempFile::create_in(dir.path(), DEFAULT_PREFIX, Some("tmp"), 4)?;
    let closed_path = closed.path().to_path_buf();
    closed.close()?;
    assert!(!closed_path.exists());
    assert!(matches!(closed.write(b"late"), Err(Error::NotOpen(_))));

    let mut kept = TempFile::create_in(dir.path(), "keep_", None, 6)?;
    kept.write(b"survives")?;
    let kept_path = kept.keep()?;
    assert_eq!(localfs::read_file(&kept_path)?, b"survives");
    Ok(())
}

#[test]
fn buffered_typed_round_trip() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("typed.bin");

    let mut out = BufferedWriter::with_cache_size(SequentialWriteFile::truncate_open(&path)?, 16);
    for endian in [Endian::Little, Endian::Big] {
        out.write_u8(0xab)?;
        out.write_i8(-5)?;
        out.write_bool(true)?;
        out.write_u16(0x1234, endian)?;
        out.write_i32(-123_456, endian)?;
        out.write_u64(u64::MAX - 1, endian)?;
        out.write_f32(1.5, endian)?;
        out.write_f64(-0.25, endian)?;
    }
    out.write(b"tail")?;
    assert_eq!(out.size(), 2 * (1 + 1 + 1 + 2 + 4 + 8 + 4 + 8) + 4);
    out.finalize()?;
    out.finalize()?;
    assert!(matches!(out.write_u8(1), Err(Error::InvalidArgument(_))));
    drop(out);

    let bytes = localfs::read_file(&path)?;
    assert_eq!(&bytes[3..5], &[0x34, 0x12]);
    assert_eq!(&bytes[32..34], &[0x12, 0x34]);

    let mut input = BufferedReader::new(SequentialReadFile::open(&path)?);
    input.set_cache_size(8);
    assert_eq!(input.cache_size(), DEFAULT_CACHE_SIZE);
    for endian in [Endian::Little, Endian::Big] {
        assert_eq!(input.read_u8()?, 0xab);
        assert_eq!(input.read_i8()?, -5);
        assert!(input.read_bool()?);
        assert_eq!(input.read_u16(endian)?, 0x1234);
        assert_eq!(input.read_i32(endian)?, -123_456);
        assert_eq!(input.read_u64(endian)?, u64::MAX - 1);
        assert_eq!(input.read_f32(endian)?, 1.5);
        assert_eq!(input.read_f64(endian)?, -0.25);
    }
    assert!(!input.reach_end()?);
    assert_eq!(&input.read(10)?[..], b"tail");
    assert!(input.reach_end()?);
    Ok(())
}

#[test]
fn buffered_reader_reports_short_data() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("short.bin");
    localfs::write_file(&path, &[1, 2, 3], true)?;

    let mut input = BufferedReader::new(SequentialReadFile::open(&path)?);
    let err = input.read_u32(Endian::Little).unwrap_err();
    assert!(matches!(err, Error::DataLoss(_)), "{err}");

    // The failed read consumed nothing.
    let mut out = Vec::new();
    assert_eq!(input.read_into(&mut out, 2)?, 2);
    assert_eq!(out, [1, 2]);

    let mut buf = [0u8; 4];
    assert!(matches!(input.read_exact(&mut buf), Err(Error::DataLoss(_))));
    let mut one = [0u8; 1];
    input.read_exact(&mut one)?;
    assert_eq!(one, [3]);
    assert!(input.reach_end()?);
    Ok(())
}

#[test]
fn readline_strips_terminators() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("lines.txt");
    localfs::write_file(&path, b"alpha\r\nbeta\n\ngamma", true)?;

    let mut lines = ReadlineFile::open(&path)?;
    let mut seen = Vec::new();
    while let Some(line) = lines.readline()? {
        seen.push(line);
    }
    assert_eq!(seen, ["alpha", "beta", "", "gamma"]);
    assert_eq!(lines.lines(), 4);
    assert_eq!(lines.path(), path.as_path());

    lines.close();
    assert!(matches!(lines.readline(), Err(Error::NotOpen(_))));
    Ok(())
}

#[test]
fn localfs_helpers() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let root = dir.path();

    localfs::write_file(root.join("data/a.csv"), b"a,b\n", true)?;
    localfs::append_file(root.join("data/a.csv"), b"1,2\n")?;
    localfs::write_file(root.join("data/b.csv"), b"x\n", true)?;
    localfs::create_directories(root.join("data/nested/deeper"))?;
    localfs::write_file(root.join("data/nested/c.txt"), b"c", true)?;

    assert_eq!(localfs::read_file_to_string(root.join("data/a.csv"))?, "a,b\n1,2\n");
    assert_eq!(localfs::file_size(root.join("data/a.csv"))?, 8);
    assert!(localfs::last_modified_time(root.join("data/a.csv")).is_ok());

    let names: Vec<_> = localfs::list_files(root.join("data"), false)?;
    assert_eq!(names, [std::path::PathBuf::from("a.csv"), "b.csv".into()]);
    let full = localfs::list_files(root.join("data"), true)?;
    assert_eq!(full[0], root.join("data/a.csv"));
    assert_eq!(
        localfs::list_directories(root.join("data"), false)?,
        [std::path::PathBuf::from("nested")]
    );

    localfs::file_resize(root.join("data/b.csv"), 1)?;
    assert_eq!(localfs::read_file(root.join("data/b.csv"))?, b"x");

    localfs::copy_directory(root.join("data"), root.join("flat"), false)?;
    assert!(localfs::exists(root.join("flat/a.csv")));
    assert!(!localfs::exists(root.join("flat/nested")));
    localfs::copy_directory(root.join("data"), root.join("deep"), true)?;
    assert_eq!(localfs::read_file(root.join("deep/nested/c.txt"))?, b"c");
    assert!(localfs::exists(root.join("deep/nested/deeper")));

    localfs::rename(root.join("flat/a.csv"), root.join("flat/renamed.csv"))?;
    assert_eq!(localfs::copy_file(root.join("flat/renamed.csv"), root.join("copy.csv"))?, 8);

    localfs::remove(root.join("copy.csv"))?;
    assert!(!localfs::remove_if_exists(root.join("copy.csv"))?);
    assert!(localfs::remove(root.join("copy.csv")).is_err());
    assert!(localfs::remove_all_if_exists(root.join("deep"))?);
    assert!(!localfs::exists(root.join("deep")));
    localfs::remove_all(root.join("flat"))?;
    assert!(!localfs::remove_all_if_exists(root.join("flat"))?);

    localfs::create_directory(root.join("single"))?;
    assert!(localfs::create_directory(root.join("missing/single")).is_err());
    assert!(localfs::temp_directory_path().is_dir());
    Ok(())
}

#[cfg(feature = "glob")]
#[test]
fn glob_matches_files_only() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let root = dir.path();
    localfs::write_file(root.join("one.csv"), b"1", true)?;
    localfs::write_file(root.join("two.csv"), b"2", true)?;
    localfs::write_file(root.join("three.txt"), b"3", true)?;
    localfs::create_directory(root.join("dir.csv"))?;

    let pattern = format!("{}/*.csv", root.display());
    assert_eq!(localfs::glob(&pattern)?, [root.join("one.csv"), root.join("two.csv")]);
    assert!(matches!(localfs::glob("[unclosed"), Err(Error::InvalidArgument(_))));
    Ok(())
}
