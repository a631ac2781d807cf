use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use flate2::read::GzDecoder;

/// Read-only view of a repository archive: an ordered list of member names
/// and byte access by name. The analyzers never touch the filesystem or the
/// archive format directly.
pub trait Archive {
    /// Every member the archive lists, directories included, in archive order.
    fn member_names(&self) -> &[String];

    /// Bytes of a member, or `None` when the member is absent, is not a
    /// regular file, or could not be read. Callers skip `None` members.
    fn read_member(&self, name: &str) -> Option<&[u8]>;
}

/// A gzip-compressed tar archive loaded fully into memory on open.
///
/// Repository source archives are small enough that one pass up front beats
/// re-scanning the stream for every member lookup. A member whose contents
/// cannot be read is kept in the name list but yields no bytes.
pub struct TarGzArchive {
    names: Vec<String>,
    data: HashMap<String, Vec<u8>>,
}

impl TarGzArchive {
    pub fn open(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("failed to open archive '{}'", path.display()))?;
        let decoder = GzDecoder::new(std::io::BufReader::new(file));
        let mut tar = tar::Archive::new(decoder);

        let mut names = Vec::new();
        let mut data = HashMap::new();
        for entry in tar
            .entries()
            .with_context(|| format!("failed to enumerate archive '{}'", path.display()))?
        {
            let mut entry = entry
                .with_context(|| format!("corrupt entry in archive '{}'", path.display()))?;
            let name = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
            names.push(name.clone());

            if !entry.header().entry_type().is_file() {
                continue;
            }
            let mut bytes = Vec::new();
            match entry.read_to_end(&mut bytes) {
                Ok(_) => {
                    data.insert(name, bytes);
                }
                Err(e) => {
                    eprintln!("Warning: failed to read member '{name}': {e}");
                }
            }
        }

        Ok(Self { names, data })
    }
}

impl Archive for TarGzArchive {
    fn member_names(&self) -> &[String] {
        &self.names
    }

    fn read_member(&self, name: &str) -> Option<&[u8]> {
        self.data.get(name).map(Vec::as_slice)
    }
}

/// An archive held in memory, for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryArchive {
    names: Vec<String>,
    data: HashMap<String, Vec<u8>>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a readable member.
    pub fn push(&mut self, name: &str, bytes: impl Into<Vec<u8>>) {
        self.names.push(name.to_string());
        self.data.insert(name.to_string(), bytes.into());
    }

    /// Add a member that is listed but cannot be read (a directory or a
    /// broken entry).
    pub fn push_unreadable(&mut self, name: &str) {
        self.names.push(name.to_string());
    }
}

impl Archive for MemoryArchive {
    fn member_names(&self) -> &[String] {
        &self.names
    }

    fn read_member(&self, name: &str) -> Option<&[u8]> {
        self.data.get(name).map(Vec::as_slice)
    }
}
