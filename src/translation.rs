use std::borrow::Cow;
use std::fs;
use std::io::Read;
use std::path::Path;

use csv::ReaderBuilder;
use hashbrown::HashMap;

use crate::errors::{EditorError, Result};
use crate::fsutil;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// English tag to Japanese label, loaded from `english,japanese` lines.
#[derive(Debug, Clone, Default)]
pub struct TranslationDictionary {
    pairs: HashMap<String, String>,
}

impl TranslationDictionary {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(EditorError::MissingResource(path.to_path_buf()));
        }
        let file = fs::File::open(path)?;
        let dictionary = Self::from_reader(file)?;
        log::info!(
            "Loaded {} translations from {}",
            dictionary.len(),
            path.display()
        );
        Ok(dictionary)
    }

    /// Quotes carry no meaning here: a line is split on plain commas and
    /// anything after the second field is ignored. Invalid UTF-8 is replaced
    /// rather than rejected, so one bad line only spoils itself.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .quoting(false)
            .comment(Some(b'#'))
            .from_reader(reader);

        let mut pairs = HashMap::new();
        for result in rdr.byte_records() {
            let record = result?;
            if record.len() < 2 {
                continue;
            }
            let en = String::from_utf8_lossy(&record[0]);
            let jp = String::from_utf8_lossy(&record[1]);
            if matches!(en, Cow::Owned(_)) || matches!(jp, Cow::Owned(_)) {
                log::warn!(
                    "Translation line {} is not valid UTF-8",
                    record.position().map_or(0, |pos| pos.line())
                );
            }
            let en = en.trim_start_matches('\u{feff}').trim();
            // first occurrence wins
            pairs
                .entry(en.to_string())
                .or_insert_with(|| jp.trim().to_string());
        }

        Ok(Self { pairs })
    }

    pub fn lookup(&self, tag: &str) -> Option<&str> {
        self.pairs.get(tag).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// English keys matching `input`, exact match first, then prefix matches,
    /// then everything else that contains it.
    pub fn suggest(&self, input: &str, limit: usize) -> Vec<String> {
        let input = input.trim();
        if input.is_empty() {
            return Vec::new();
        }

        // Spaces are typed where tags use underscores.
        let search = input.replace(' ', "_").to_lowercase();

        let mut matches: Vec<(&String, String)> = self
            .pairs
            .keys()
            .map(|key| (key, key.to_lowercase()))
            .filter(|(_, lower)| lower.contains(&search))
            .collect();

        matches.sort_by(|(a, a_lower), (b, b_lower)| {
            let a_exact = *a_lower == search;
            let b_exact = *b_lower == search;
            let a_starts = a_lower.starts_with(&search);
            let b_starts = b_lower.starts_with(&search);

            b_exact
                .cmp(&a_exact)
                .then(b_starts.cmp(&a_starts))
                .then_with(|| a.cmp(b))
        });

        matches
            .into_iter()
            .take(limit)
            .map(|(key, _)| key.clone())
            .collect()
    }
}

/// Insert or replace the translation for `en` in the CSV at `path`.
///
/// The first data line whose key matches case-insensitively is rewritten,
/// otherwise a line is appended. Comments, blank lines and other entries are
/// kept verbatim.
pub fn upsert(path: &Path, en: &str, jp: &str) -> Result<()> {
    let entry = format!("{},{}", en, jp);

    if !path.exists() {
        fsutil::write_atomic(path, format!("{}\n", entry).as_bytes())?;
        log::info!("Created {} with '{}'", path.display(), entry);
        return Ok(());
    }

    let raw = fs::read(path)?;
    let (bom, body) = match raw.strip_prefix(UTF8_BOM) {
        Some(rest) => (true, rest),
        None => (false, raw.as_slice()),
    };
    // Lines stay as bytes so entries that are not valid UTF-8 are written back untouched.
    let mut lines: Vec<Cow<[u8]>> = body
        .split(|&b| b == b'\n')
        .map(|line| Cow::Borrowed(line.strip_suffix(b"\r").unwrap_or(line)))
        .collect();
    if lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }

    let wanted = en.to_lowercase();
    let existing = lines.iter().position(|line| {
        let line = String::from_utf8_lossy(line);
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return false;
        }
        let mut parts = line.split(',');
        match (parts.next(), parts.next()) {
            (Some(key), Some(_)) => key.trim().to_lowercase() == wanted,
            _ => false,
        }
    });

    match existing {
        Some(idx) => {
            log::info!(
                "Replacing translation line {}: '{}' -> '{}'",
                idx + 1,
                String::from_utf8_lossy(&lines[idx]),
                entry
            );
            lines[idx] = Cow::Owned(entry.into_bytes());
        }
        None => {
            log::info!("Appending translation '{}'", entry);
            lines.push(Cow::Owned(entry.into_bytes()));
        }
    }

    let mut out = Vec::with_capacity(raw.len() + en.len() + jp.len() + 2);
    if bom {
        out.extend_from_slice(UTF8_BOM);
    }
    for line in &lines {
        out.extend_from_slice(line);
        out.push(b'\n');
    }
    fsutil::write_atomic(path, &out)
}
