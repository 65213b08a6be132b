use super::{skip, BenchContext, BenchRegistry};
use anyhow::Context;
use envbench_harness::{Outcome, RegistryError};
use std::fs::{self, File};
use std::hint::black_box;
use std::io;
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

const FILE_NAME: &str = "test.txt";
const ARCHIVE_NAME: &str = "test.zip";

pub(super) fn register(registry: &mut BenchRegistry) -> Result<(), RegistryError> {
    registry.register_fn("io", "file_read", file_read)?;
    registry.register_fn("io", "file_write", file_write)?;
    registry.register_fn("io", "file_zip", file_zip)?;
    registry.register_fn("io", "file_unzip", file_unzip)
}

fn file_read(ctx: &mut BenchContext<'_>) -> anyhow::Result<Outcome> {
    let dir = match ctx.resources().scratch_dir() {
        Ok(dir) => dir,
        Err(unavailable) => return Ok(skip(&unavailable)),
    };
    let file = dir.path().join(FILE_NAME);
    fs::write(&file, "test").context("Cannot write scratch file")?;

    let count = ctx.scaled(1000);
    for _ in 0..count {
        black_box(fs::read_to_string(&file).context("Cannot read scratch file")?);
    }
    Ok(Outcome::Completed(count))
}

fn file_write(ctx: &mut BenchContext<'_>) -> anyhow::Result<Outcome> {
    let dir = match ctx.resources().scratch_dir() {
        Ok(dir) => dir,
        Err(unavailable) => return Ok(skip(&unavailable)),
    };
    let file = dir.path().join(FILE_NAME);

    let count = ctx.scaled(1000);
    for i in 0..count {
        fs::write(&file, format!("test {i}")).context("Cannot write scratch file")?;
    }
    Ok(Outcome::Completed(count))
}

fn file_zip(ctx: &mut BenchContext<'_>) -> anyhow::Result<Outcome> {
    let dir = match ctx.resources().scratch_dir() {
        Ok(dir) => dir,
        Err(unavailable) => return Ok(skip(&unavailable)),
    };
    let file = dir.path().join(FILE_NAME);
    let archive = dir.path().join(ARCHIVE_NAME);
    fs::write(&file, "test").context("Cannot write scratch file")?;

    let count = ctx.scaled(1000);
    for _ in 0..count {
        write_archive(&archive, &file)?;
    }
    Ok(Outcome::Completed(count))
}

fn file_unzip(ctx: &mut BenchContext<'_>) -> anyhow::Result<Outcome> {
    let dir = match ctx.resources().scratch_dir() {
        Ok(dir) => dir,
        Err(unavailable) => return Ok(skip(&unavailable)),
    };
    let file = dir.path().join(FILE_NAME);
    let archive = dir.path().join(ARCHIVE_NAME);
    let target = dir.path().join("extracted");
    fs::write(&file, "test").context("Cannot write scratch file")?;
    write_archive(&archive, &file)?;

    let count = ctx.scaled(1000);
    for _ in 0..count {
        let source = File::open(&archive).context("Cannot open zip file")?;
        ZipArchive::new(source)
            .context("Invalid .zip file")?
            .extract(&target)
            .context("Cannot extract zip file")?;
    }
    Ok(Outcome::Completed(count))
}

/// Creates (or replaces) `archive` with `file` as its only entry.
fn write_archive(archive: &Path, file: &Path) -> anyhow::Result<()> {
    let mut zip = ZipWriter::new(File::create(archive).context("Cannot create zip file")?);
    zip.start_file(FILE_NAME, SimpleFileOptions::default())?;
    io::copy(
        &mut File::open(file).context("Cannot open scratch file")?,
        &mut zip,
    )?;
    zip.finish()?;
    Ok(())
}
