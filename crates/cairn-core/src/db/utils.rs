//! Row decoding helpers, the write clock and path handling.

use std::{
    path::{Component, Path, PathBuf},
    str::FromStr,
    sync::atomic::{AtomicI64, Ordering},
};

use jiff::Timestamp;
use rusqlite::{types::Type, Row};
use sha2::{Digest, Sha256};

use crate::error::CairnError;

static LAST_MICROS: AtomicI64 = AtomicI64::new(0);

/// Current time in microseconds since the epoch, strictly increasing within
/// the process so that "most recently updated" orderings are total.
pub(crate) fn now_micros() -> i64 {
    let now = Timestamp::now().as_microsecond();
    let mut last = LAST_MICROS.load(Ordering::Relaxed);
    loop {
        let next = now.max(last + 1);
        match LAST_MICROS.compare_exchange_weak(last, next, Ordering::SeqCst, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(observed) => last = observed,
        }
    }
}

/// Convert stored microseconds back into a timestamp.
pub(crate) fn micros_to_timestamp(micros: i64) -> Timestamp {
    Timestamp::from_microsecond(micros).unwrap_or(Timestamp::UNIX_EPOCH)
}

/// Read a microsecond column as a [`Timestamp`].
pub(crate) fn timestamp_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Timestamp> {
    let micros: i64 = row.get(idx)?;
    Timestamp::from_microsecond(micros)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, Box::new(e)))
}

/// Read a text column holding one of the closed enumerations.
pub(crate) fn enum_at<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = CairnError>,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Read a text column holding JSON.
pub(crate) fn json_at<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: serde::de::DeserializeOwned,
{
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Read an INTEGER rowid column as `u64`.
pub(crate) fn id_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    Ok(row.get::<_, i64>(idx)? as u64)
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

/// Normalizes a path by resolving "." and ".." components without requiring
/// the path to exist
pub fn normalize_path(path: &Path) -> PathBuf {
    path.components()
        .fold(PathBuf::new(), |mut acc, component| match component {
            Component::CurDir => acc,
            Component::ParentDir => {
                acc.pop();
                acc
            }
            _ => {
                acc.push(component);
                acc
            }
        })
}

/// Render a relative path with forward slashes regardless of platform.
pub fn to_slash_path(path: &Path) -> String {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_micros_is_strictly_increasing() {
        let mut last = now_micros();
        for _ in 0..1000 {
            let next = now_micros();
            assert!(next > last);
            last = next;
        }
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path(Path::new("src/lib/./../util.ts")),
            PathBuf::from("src/util.ts")
        );
        assert_eq!(to_slash_path(Path::new("src/a/b.ts")), "src/a/b.ts");
    }

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
