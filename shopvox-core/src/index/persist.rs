//! On-disk form of a [`CatalogueIndex`].
//!
//! Two artifacts are written side by side:
//! - the vector index, `bincode`-encoded
//! - the record store, a JSON array of normalized records in index order
//!
//! Both are written to a temporary sibling first and renamed into place. The
//! index artifact records a SHA-256 digest of the record store it was saved
//! with, so a record store from another build is refused on load.

use super::{CatalogueIndex, FlatL2Index, IndexError, RecordStore, Result};
use crate::catalogue::CatalogueRecord;
use bincode::Options;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

const FORMAT_VERSION: u32 = 2;

/// Largest index artifact accepted on load (2^16 records of 4096 floats).
const MAX_INDEX_BYTES: u64 = 1 << 30;

#[derive(Debug, Serialize, Deserialize)]
struct IndexFile {
    format_version: u32,
    dimension: usize,
    records_digest: Vec<u8>,
    vectors: Vec<f32>,
}

fn codec() -> impl Options {
    bincode::options()
        .with_fixint_encoding()
        .allow_trailing_bytes()
        .with_limit(MAX_INDEX_BYTES)
}

fn digest(records: &[u8]) -> Vec<u8> {
    Sha256::digest(records).to_vec()
}

/// Writes the index artifact and the record store.
pub async fn save(
    index: &CatalogueIndex,
    index_path: impl AsRef<Path>,
    records_path: impl AsRef<Path>,
) -> Result<()> {
    let records = serde_json::to_vec_pretty(index.records().records())?;
    let file = IndexFile {
        format_version: FORMAT_VERSION,
        dimension: index.dimension().unwrap_or(0),
        records_digest: digest(&records),
        vectors: index.vectors().raw_data().to_vec(),
    };
    let encoded = codec().serialize(&file)?;

    // Records first: an index artifact never refers to records that were not
    // written yet.
    write_atomic(records_path.as_ref(), &records).await?;
    write_atomic(index_path.as_ref(), &encoded).await?;

    info!(
        records = index.len(),
        dimension = file.dimension,
        index = %index_path.as_ref().display(),
        "Persisted catalogue index"
    );
    Ok(())
}

/// Loads a previously saved index and record store.
pub async fn load(index_path: impl AsRef<Path>, records_path: impl AsRef<Path>) -> Result<CatalogueIndex> {
    let file = read_index_file(index_path.as_ref()).await?;
    let bytes = fs::read(records_path.as_ref()).await?;
    if digest(&bytes) != file.records_digest {
        return Err(IndexError::Corrupt(
            "record store does not belong to this index".to_string(),
        ));
    }
    let records: Vec<CatalogueRecord> = serde_json::from_slice(&bytes)?;

    if file.dimension == 0 {
        if !file.vectors.is_empty() || !records.is_empty() {
            return Err(IndexError::Corrupt("zero dimension with stored data".to_string()));
        }
        return Ok(CatalogueIndex::new());
    }
    if file.vectors.len() != file.dimension * records.len() {
        return Err(IndexError::Corrupt(format!(
            "{} floats cannot hold {} records of dimension {}",
            file.vectors.len(),
            records.len(),
            file.dimension
        )));
    }

    let vectors = FlatL2Index::from_parts(Some(file.dimension), file.vectors);
    let index = CatalogueIndex::from_parts(vectors, RecordStore::from_records(records))?;
    debug!(records = index.len(), dimension = file.dimension, "Loaded catalogue index");
    Ok(index)
}

/// The dimension of the index stored at `index_path`, or `None` if there is
/// no index there.
pub async fn persisted_dimension(index_path: impl AsRef<Path>) -> Result<Option<usize>> {
    let path = index_path.as_ref();
    if !fs::try_exists(path).await? {
        return Ok(None);
    }
    let file = read_index_file(path).await?;
    Ok((file.dimension > 0).then_some(file.dimension))
}

/// Deletes both artifacts, ignoring ones that do not exist.
pub async fn remove(index_path: impl AsRef<Path>, records_path: impl AsRef<Path>) -> Result<()> {
    for path in [index_path.as_ref(), records_path.as_ref()] {
        match fs::remove_file(path).await {
            Ok(()) => debug!(path = %path.display(), "Removed index artifact"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

async fn read_index_file(path: &Path) -> Result<IndexFile> {
    let bytes = fs::read(path).await?;
    let file: IndexFile = codec().deserialize(&bytes)?;
    if file.format_version != FORMAT_VERSION {
        return Err(IndexError::Corrupt(format!(
            "unsupported index format version {}",
            file.format_version
        )));
    }
    Ok(file)
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    let tmp = temp_path(path);
    fs::write(&tmp, bytes).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
