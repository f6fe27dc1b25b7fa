//! JSONL (JSON Lines) storage.
//!
//! JSONL is the durable form of the store: each collection is one file under
//! `normalized/`, one JSON object per line. Metric files are append-only
//! except when pruning rewrites them.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use super::{StorageConfig, StorageError};
use crate::models::Metric;

/// Files making up the normalized store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Timestamps,
    Players,
    Metric(Metric),
    Leaderboard,
}

impl Collection {
    pub fn filename(&self) -> &'static str {
        match self {
            Collection::Timestamps => "timestamps.jsonl",
            Collection::Players => "players.jsonl",
            Collection::Leaderboard => "leaderboard.jsonl",
            Collection::Metric(Metric::Elo) => "elo.jsonl",
            Collection::Metric(Metric::WinLoss) => "win_loss.jsonl",
            Collection::Metric(Metric::RegionalPlacement) => "regional_placement.jsonl",
            Collection::Metric(Metric::GlobalPlacement) => "global_placement.jsonl",
            Collection::Metric(Metric::CharacterUsage) => "character_usage.jsonl",
        }
    }

    pub fn path(&self, config: &StorageConfig) -> PathBuf {
        config.normalized_dir().join(self.filename())
    }
}

/// JSONL file writer.
pub struct JsonlWriter<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T: Serialize> JsonlWriter<T> {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _marker: PhantomData,
        }
    }

    pub fn for_collection(config: &StorageConfig, collection: Collection) -> Self {
        Self::new(collection.path(config))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_dir(&self) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    /// Append entities to the end of the file in one write.
    pub fn append_batch<'a, I>(&self, entities: I) -> Result<usize, StorageError>
    where
        I: IntoIterator<Item = &'a T>,
        T: 'a,
    {
        let mut lines = String::new();
        let mut count = 0;
        for entity in entities {
            lines.push_str(&serde_json::to_string(entity)?);
            lines.push('\n');
            count += 1;
        }
        if count == 0 {
            return Ok(0);
        }

        self.ensure_dir()?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(lines.as_bytes())?;
        writer.flush()?;

        debug!("Appended {} entities to {:?}", count, self.path);
        Ok(count)
    }

    /// Replace the file with `entities`.
    ///
    /// Writes a sibling temp file and renames it over the original so a
    /// crash mid-write leaves the previous contents intact.
    pub fn write_all<'a, I>(&self, entities: I) -> Result<usize, StorageError>
    where
        I: IntoIterator<Item = &'a T>,
        T: 'a,
    {
        self.ensure_dir()?;

        let tmp = self.path.with_extension("jsonl.tmp");
        let mut writer = BufWriter::new(File::create(&tmp)?);
        let mut count = 0;
        for entity in entities {
            let json = serde_json::to_string(entity)?;
            writeln!(writer, "{}", json)?;
            count += 1;
        }
        writer.flush()?;
        drop(writer);
        fs::rename(&tmp, &self.path)?;

        debug!("Wrote {} entities to {:?}", count, self.path);
        Ok(count)
    }
}

/// JSONL file reader.
pub struct JsonlReader<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T: DeserializeOwned> JsonlReader<T> {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _marker: PhantomData,
        }
    }

    pub fn for_collection(config: &StorageConfig, collection: Collection) -> Self {
        Self::new(collection.path(config))
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Read every entity. A missing file reads as empty; malformed lines are
    /// logged and skipped.
    pub fn read_all(&self) -> Result<Vec<T>, StorageError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(File::open(&self.path)?);
        let mut entities = Vec::new();

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str(&line) {
                Ok(entity) => entities.push(entity),
                Err(e) => {
                    warn!("Failed to parse line {} in {:?}: {}", idx + 1, self.path, e);
                }
            }
        }

        debug!("Read {} entities from {:?}", entities.len(), self.path);
        Ok(entities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use tempfile::TempDir;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct Row {
        id: u32,
        name: String,
    }

    fn row(id: u32, name: &str) -> Row {
        Row {
            id,
            name: name.to_string(),
        }
    }

    #[test]
    fn test_write_all_and_read_back() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("rows.jsonl");

        let writer: JsonlWriter<Row> = JsonlWriter::new(path.clone());
        let rows = vec![row(1, "a"), row(2, "b")];
        assert_eq!(writer.write_all(&rows).unwrap(), 2);

        let reader: JsonlReader<Row> = JsonlReader::new(path);
        assert_eq!(reader.read_all().unwrap(), rows);
    }

    #[test]
    fn test_append_batch_accumulates() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested/dir/append.jsonl");

        let writer: JsonlWriter<Row> = JsonlWriter::new(path.clone());
        writer.append_batch(&[row(1, "a")]).unwrap();
        writer.append_batch(&[row(2, "b"), row(3, "c")]).unwrap();

        let read = JsonlReader::<Row>::new(path).read_all().unwrap();
        assert_eq!(read.len(), 3);
        assert_eq!(read[2].name, "c");
    }

    #[test]
    fn test_append_batch_empty_creates_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("empty.jsonl");

        let writer: JsonlWriter<Row> = JsonlWriter::new(path.clone());
        assert_eq!(writer.append_batch(&[]).unwrap(), 0);
        assert!(!path.exists());
    }

    #[test]
    fn test_write_all_overwrites_and_leaves_no_temp() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("overwrite.jsonl");

        let writer: JsonlWriter<Row> = JsonlWriter::new(path.clone());
        writer.write_all(&[row(1, "old")]).unwrap();
        writer.write_all(&[row(2, "new"), row(3, "newer")]).unwrap();

        let read = JsonlReader::<Row>::new(path.clone()).read_all().unwrap();
        assert_eq!(read, vec![row(2, "new"), row(3, "newer")]);
        assert!(!path.with_extension("jsonl.tmp").exists());
    }

    #[test]
    fn test_read_missing_file_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let reader: JsonlReader<Row> = JsonlReader::new(temp_dir.path().join("nope.jsonl"));
        assert!(!reader.exists());
        assert!(reader.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_read_all_skips_bad_lines() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.jsonl");
        std::fs::write(
            &path,
            "{\"id\":1,\"name\":\"good\"}\nnot-json\n\n{\"id\":2,\"name\":\"also\"}\n",
        )
        .unwrap();

        let read = JsonlReader::<Row>::new(path).read_all().unwrap();
        assert_eq!(read, vec![row(1, "good"), row(2, "also")]);
    }

    #[test]
    fn test_collection_paths() {
        let config = StorageConfig::new(PathBuf::from("/data"));
        assert_eq!(
            Collection::Timestamps.path(&config),
            PathBuf::from("/data/normalized/timestamps.jsonl")
        );
        assert_eq!(
            Collection::Metric(Metric::WinLoss).filename(),
            "win_loss.jsonl"
        );
        assert_eq!(
            JsonlWriter::<Row>::for_collection(&config, Collection::Leaderboard).path(),
            Path::new("/data/normalized/leaderboard.jsonl")
        );
    }
}
