//! Change-detection fingerprints
//!
//! A rolling `h * 31 + unit` hash over database bytes and query text.
//! Not cryptographic and not collision-proof: it only decides whether a
//! save can skip its network write.

use crate::Result;
use crate::storage::Database;

/// Fingerprint of a byte buffer
pub fn of_bytes(buffer: &[u8]) -> i32 {
    buffer
        .iter()
        .fold(0i32, |hash, &byte| hash.wrapping_mul(31).wrapping_add(byte as i32))
}

/// Fingerprint of a string, computed over its UTF-16 code units
pub fn of_str(text: &str) -> i32 {
    text.encode_utf16()
        .fold(0i32, |hash, unit| hash.wrapping_mul(31).wrapping_add(unit as i32))
}

/// Combine a database and a query fingerprint.
///
/// `db & query` when non-zero, otherwise whichever operand is non-zero,
/// otherwise 0.
pub fn combine(db_hash: i32, query_hash: i32) -> i32 {
    let both = db_hash & query_hash;
    if both != 0 {
        both
    } else if db_hash != 0 {
        db_hash
    } else {
        query_hash
    }
}

/// Fingerprint of a live database.
///
/// A database without tables hashes to 0 without being exported, since
/// SQLite cannot produce an image of zero-length storage.
pub fn of_database(db: &Database) -> Result<i32> {
    if db.table_names()?.is_empty() {
        return Ok(0);
    }
    Ok(of_bytes(&db.export_bytes()?))
}
