use super::{skip, BenchContext, BenchRegistry};
use crate::database::{ScratchDatabase, SqlValue};
use envbench_harness::{Outcome, RegistryError};
use std::hint::black_box;

const JSON_DOCUMENT: &str = r#"{"id": 1, "name": "test", "tags": ["a", "b", "c"]}"#;
const AES_PLAINTEXT: &str = "aaaaaaaaaaaaaaaa";

pub(super) fn register(registry: &mut BenchRegistry) -> Result<(), RegistryError> {
    registry.register_fn("db", "ping", ping)?;
    registry.register_fn("db", "select_version", select_version)?;
    registry.register_fn("db", "select_all", select_all)?;
    registry.register_fn("db", "select_cursor", select_cursor)?;
    registry.register_fn("db", "seq_insert", seq_insert)?;
    registry.register_fn("db", "bulk_insert", bulk_insert)?;
    registry.register_fn("db", "update", update)?;
    registry.register_fn("db", "update_with_index", update_with_index)?;
    registry.register_fn("db", "transaction_insert", transaction_insert)?;
    registry.register_fn("db", "aes_encrypt", aes_encrypt)?;
    registry.register_fn("db", "aes_decrypt", aes_decrypt)?;
    registry.register_fn("db", "json_extract", json_extract)?;
    registry.register_fn("db", "indexes", indexes)?;
    registry.register_fn("db", "delete", delete)
}

/// Returns the scratch database, or [None] if the case has to be skipped.
fn database<'run>(ctx: &BenchContext<'run>) -> Option<&'run ScratchDatabase> {
    match ctx.resources().database() {
        Ok(database) => Some(database),
        Err(unavailable) => {
            skip(&unavailable);
            None
        }
    }
}

/// Returns the scratch database if its backend has the AES functions.
fn aes_database<'run>(ctx: &BenchContext<'run>) -> Option<&'run ScratchDatabase> {
    let db = database(ctx)?;
    if db.dialect().supports_aes() {
        Some(db)
    } else {
        tracing::debug!(backend = db.dialect().name(), "No AES functions, skipping");
        None
    }
}

fn ping(ctx: &mut BenchContext<'_>) -> anyhow::Result<Outcome> {
    let Some(db) = database(ctx) else {
        return Ok(Outcome::Skipped);
    };
    db.ping()?;
    Ok(Outcome::Completed(1))
}

fn select_version(ctx: &mut BenchContext<'_>) -> anyhow::Result<Outcome> {
    let Some(db) = database(ctx) else {
        return Ok(Outcome::Skipped);
    };
    let count = ctx.scaled(1000);
    let query = db.dialect().version_query();

    let start = ctx.now();
    for _ in 0..count {
        black_box(db.query_scalar::<String>(query, &[])?);
    }
    ctx.record_rate("q/s", count, start);
    Ok(Outcome::Completed(count))
}

fn select_all(ctx: &mut BenchContext<'_>) -> anyhow::Result<Outcome> {
    let Some(db) = database(ctx) else {
        return Ok(Outcome::Skipped);
    };
    let count = ctx.scaled(1000);
    let query = format!("SELECT * FROM {}", db.quoted_table());

    let start = ctx.now();
    for _ in 0..count {
        black_box(db.fetch_rows(&query)?);
    }
    ctx.record_rate("q/s", count, start);
    Ok(Outcome::Completed(count))
}

fn select_cursor(ctx: &mut BenchContext<'_>) -> anyhow::Result<Outcome> {
    let Some(db) = database(ctx) else {
        return Ok(Outcome::Skipped);
    };
    let count = ctx.scaled(1000);
    let query = format!("SELECT * FROM {}", db.quoted_table());

    for _ in 0..count {
        db.scan_rows(&query)?;
    }
    Ok(Outcome::Completed(count))
}

fn seq_insert(ctx: &mut BenchContext<'_>) -> anyhow::Result<Outcome> {
    let Some(db) = database(ctx) else {
        return Ok(Outcome::Skipped);
    };
    let count = ctx.scaled(1000);
    let insert = format!("INSERT INTO {} (name) VALUES ('test')", db.quoted_table());

    let start = ctx.now();
    for _ in 0..count {
        db.execute(&insert, &[])?;
    }
    ctx.record_rate("q/s", count, start);
    Ok(Outcome::Completed(count))
}

fn bulk_insert(ctx: &mut BenchContext<'_>) -> anyhow::Result<Outcome> {
    let Some(db) = database(ctx) else {
        return Ok(Outcome::Skipped);
    };
    let count = ctx.scaled(100_000);
    let insert = format!("INSERT INTO {} (name) VALUES (?)", db.quoted_table());

    db.execute_in_transaction(
        &insert,
        (0..count).map(|i| vec![SqlValue::Text(format!("test{i}"))]),
    )?;
    Ok(Outcome::Completed(count))
}

/// Updates the rows with the ids `0..count` one by one.
fn update_rows(db: &ScratchDatabase, count: u64) -> anyhow::Result<()> {
    let update = format!("UPDATE {} SET name = 'test' WHERE id = ?", db.quoted_table());
    for i in 0..count {
        db.execute(&update, &[SqlValue::Int(i64::try_from(i)?)])?;
    }
    Ok(())
}

fn update(ctx: &mut BenchContext<'_>) -> anyhow::Result<Outcome> {
    let Some(db) = database(ctx) else {
        return Ok(Outcome::Skipped);
    };
    let count = ctx.scaled(1000);

    let start = ctx.now();
    update_rows(db, count)?;
    ctx.record_rate("q/s", count, start);
    Ok(Outcome::Completed(count))
}

fn update_with_index(ctx: &mut BenchContext<'_>) -> anyhow::Result<Outcome> {
    let Some(db) = database(ctx) else {
        return Ok(Outcome::Skipped);
    };
    let count = ctx.scaled(1000);
    let _index = db.create_index("envbench_idx_id", "id")?;

    let start = ctx.now();
    update_rows(db, count)?;
    ctx.record_rate("q/s", count, start);
    Ok(Outcome::Completed(count))
}

fn transaction_insert(ctx: &mut BenchContext<'_>) -> anyhow::Result<Outcome> {
    let Some(db) = database(ctx) else {
        return Ok(Outcome::Skipped);
    };
    let count = ctx.scaled(1000);
    let insert = format!("INSERT INTO {} (name) VALUES ('test')", db.quoted_table());

    let start = ctx.now();
    for _ in 0..count {
        db.execute_in_transaction(&insert, [Vec::new()])?;
    }
    ctx.record_rate("t/s", count, start);
    Ok(Outcome::Completed(count))
}

fn aes_encrypt(ctx: &mut BenchContext<'_>) -> anyhow::Result<Outcome> {
    let Some(db) = aes_database(ctx) else {
        return Ok(Outcome::Skipped);
    };
    let count = ctx.scaled(1000);
    let plaintext = [SqlValue::Text(AES_PLAINTEXT.to_owned())];

    let start = ctx.now();
    for _ in 0..count {
        black_box(db.query_scalar::<Vec<u8>>("SELECT AES_ENCRYPT(?, 'key')", &plaintext)?);
    }
    ctx.record_rate("q/s", count, start);
    Ok(Outcome::Completed(count))
}

fn aes_decrypt(ctx: &mut BenchContext<'_>) -> anyhow::Result<Outcome> {
    let Some(db) = aes_database(ctx) else {
        return Ok(Outcome::Skipped);
    };
    let count = ctx.scaled(1000);
    let ciphertext = db
        .query_scalar::<Vec<u8>>(
            "SELECT AES_ENCRYPT(?, 'key')",
            &[SqlValue::Text(AES_PLAINTEXT.to_owned())],
        )?
        .unwrap_or_default();
    let ciphertext = [SqlValue::Bytes(ciphertext)];

    let start = ctx.now();
    for _ in 0..count {
        black_box(db.query_scalar::<Vec<u8>>("SELECT AES_DECRYPT(?, 'key')", &ciphertext)?);
    }
    ctx.record_rate("q/s", count, start);
    Ok(Outcome::Completed(count))
}

fn json_extract(ctx: &mut BenchContext<'_>) -> anyhow::Result<Outcome> {
    let Some(db) = database(ctx) else {
        return Ok(Outcome::Skipped);
    };
    let count = ctx.scaled(1000);
    let query = db.dialect().json_name_query();
    let document = [SqlValue::Text(JSON_DOCUMENT.to_owned())];

    let start = ctx.now();
    for _ in 0..count {
        black_box(db.query_scalar::<String>(query, &document)?);
    }
    ctx.record_rate("q/s", count, start);
    Ok(Outcome::Completed(count))
}

fn indexes(ctx: &mut BenchContext<'_>) -> anyhow::Result<Outcome> {
    let Some(db) = database(ctx) else {
        return Ok(Outcome::Skipped);
    };
    drop(db.create_index("envbench_idx_name", "name")?);
    Ok(Outcome::Completed(1))
}

fn delete(ctx: &mut BenchContext<'_>) -> anyhow::Result<Outcome> {
    let Some(db) = database(ctx) else {
        return Ok(Outcome::Skipped);
    };
    let count = ctx.scaled(1000);
    let delete = format!("DELETE FROM {} WHERE id = ?", db.quoted_table());

    let start = ctx.now();
    for i in 0..count {
        db.execute(&delete, &[SqlValue::Int(i64::try_from(i)?)])?;
    }
    ctx.record_rate("q/s", count, start);
    Ok(Outcome::Completed(count))
}
