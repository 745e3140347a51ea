//! In-memory inspection of packaged charts (`.tgz`).

use crate::error::ArchiveError;
use flate2::read::GzDecoder;
use regex::Regex;
use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use std::sync::OnceLock;
use tar::Archive;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

static KEY_VALUE_PATTERN: OnceLock<Regex> = OnceLock::new();

fn key_value_pattern() -> &'static Regex {
    KEY_VALUE_PATTERN.get_or_init(|| {
        Regex::new(r"(?i)(repository|image|tag|version):[ ?](\S+)")
            .expect("valid key/value pattern")
    })
}

pub fn is_gzip(data: &[u8]) -> bool {
    data.len() >= 2 && data[..2] == GZIP_MAGIC
}

/// Unpack a gzip-compressed tar archive into `member path -> content`.
///
/// Only regular files are returned; directories, links and other special
/// entries are skipped.
pub fn extract_tgz(data: &[u8]) -> Result<BTreeMap<String, Vec<u8>>, ArchiveError> {
    if !is_gzip(data) {
        return Err(ArchiveError::InvalidGzip(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "missing gzip header",
        )));
    }

    let mut tar_bytes = Vec::new();
    GzDecoder::new(data)
        .read_to_end(&mut tar_bytes)
        .map_err(ArchiveError::InvalidGzip)?;

    let mut archive = Archive::new(Cursor::new(tar_bytes));
    let mut files = BTreeMap::new();

    for entry in archive.entries().map_err(ArchiveError::InvalidTar)? {
        let mut entry = entry.map_err(ArchiveError::InvalidTar)?;
        if !entry.header().entry_type().is_file() {
            continue;
        }

        let path = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
        let declared = entry.size();

        // The header size is untrusted, so the buffer grows with the bytes actually read
        let mut content = Vec::new();
        entry
            .read_to_end(&mut content)
            .map_err(|source| ArchiveError::CorruptMember {
                path: path.clone(),
                source,
            })?;

        if content.len() as u64 != declared {
            return Err(ArchiveError::CorruptMember {
                source: std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("header declares {} bytes, read {}", declared, content.len()),
                ),
                path,
            });
        }
        files.insert(path, content);
    }

    tracing::debug!(files = files.len(), "Extracted chart archive");
    Ok(files)
}

/// Image and tag candidates found in chart files, in order of appearance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Candidates {
    pub images: Vec<String>,
    pub tags: Vec<String>,
}

impl Candidates {
    pub fn extend(&mut self, other: Candidates) {
        self.images.extend(other.images);
        self.tags.extend(other.tags);
    }
}

/// Scan `key: value` pairs for image-like (`repository`, `image`) and
/// tag-like (`tag`, `version`) keys. Non UTF-8 content yields nothing.
///
/// Image values must start with a letter, which drops template expressions
/// such as `{{ .Values.image }}` and quoted or empty artifacts.
pub fn scan_image_tags(content: &[u8]) -> Candidates {
    let mut candidates = Candidates::default();
    let Ok(text) = std::str::from_utf8(content) else {
        return candidates;
    };

    for caps in key_value_pattern().captures_iter(text) {
        let key = caps[1].to_ascii_lowercase();
        let value = &caps[2];
        match key.as_str() {
            "repository" | "image" => {
                if value.chars().next().is_some_and(char::is_alphabetic) {
                    candidates.images.push(value.to_string());
                }
            }
            _ => candidates.tags.push(value.to_string()),
        }
    }

    candidates
}
