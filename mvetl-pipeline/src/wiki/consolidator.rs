// Field Consolidator - raw encyclopedia records to canonical records
//
// Steps per record, in order: alt-title folding, field-name merge, identifier
// extraction. Then across records: deduplication by imdb_id (first wins) and
// sparse-column pruning.

use super::{ImdbId, RawRecord, RawValue};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::{debug, info};

/// Field names folded into the nested `alt_titles` mapping
pub const ALT_TITLE_KEYS: [&str; 20] = [
    "Also known as",
    "Arabic",
    "Cantonese",
    "Chinese",
    "French",
    "Hangul",
    "Hebrew",
    "Hepburn",
    "Japanese",
    "Literally",
    "Mandarin",
    "McCune-Reischauer",
    "Original title",
    "Polish",
    "Revised Romanization",
    "Romanized",
    "Russian",
    "Simplified",
    "Traditional",
    "Yiddish",
];

/// Key holding the folded alternate titles
pub const ALT_TITLES: &str = "alt_titles";

/// Field-name merges, applied in order (old name, new name)
///
/// Order matters: "Released" becomes "Release Date" before "Release Date"
/// becomes "Release date".
pub const RENAMES: [(&str, &str); 19] = [
    ("Adaptation by", "Writer(s)"),
    ("Country of origin", "Country"),
    ("Directed by", "Director"),
    ("Distributed by", "Distributor"),
    ("Edited by", "Editor(s)"),
    ("Length", "Running time"),
    ("Original release", "Release date"),
    ("Music by", "Composer(s)"),
    ("Produced by", "Producer(s)"),
    ("Producer", "Producer(s)"),
    ("Productioncompanies ", "Production company(s)"),
    ("Productioncompany ", "Production company(s)"),
    ("Released", "Release Date"),
    ("Release Date", "Release date"),
    ("Screen story by", "Writer(s)"),
    ("Screenplay by", "Writer(s)"),
    ("Story by", "Writer(s)"),
    ("Theme music composer", "Composer(s)"),
    ("Written by", "Writer(s)"),
];

/// A column is pruned when at least this many tenths of its values are null
pub const SPARSE_NULL_TENTHS: usize = 9;

static IMDB_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"tt[0-9]{7}").expect("imdb id regex"));

/// Consolidated record with its external key
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalWikiRecord {
    pub imdb_id: ImdbId,
    pub fields: RawRecord,
}

/// Canonical records plus the columns that survived pruning
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WikiTable {
    /// Surviving field names, sorted
    pub columns: Vec<String>,
    pub rows: Vec<CanonicalWikiRecord>,
}

impl WikiTable {
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Back to raw records (the key stays available through `imdb_link`)
    pub fn into_records(self) -> Vec<RawRecord> {
        self.rows.into_iter().map(|row| row.fields).collect()
    }
}

/// Counters reported when the stage completes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsolidationStats {
    pub input_records: usize,
    /// Records whose imdb_link carries no identifier
    pub without_id: usize,
    pub duplicates: usize,
    /// Values dropped because the rename target was already present
    pub discarded_renames: usize,
    pub pruned_columns: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsolidatedWiki {
    pub table: WikiTable,
    pub stats: ConsolidationStats,
}

/// Genre filter: films have a director, an IMDb link and no episode count
pub fn is_film(record: &RawRecord) -> bool {
    (record.contains_key("Director") || record.contains_key("Directed by"))
        && record.contains_key("imdb_link")
        && !record.contains_key("No. of episodes")
}

/// Keep only film records
pub fn filter_films(records: Vec<RawRecord>) -> Vec<RawRecord> {
    let total = records.len();
    let films: Vec<RawRecord> = records.into_iter().filter(is_film).collect();
    info!(
        films = films.len(),
        excluded = total - films.len(),
        "Filtered wiki records to films"
    );
    films
}

/// Move known alternate-title fields into the nested `alt_titles` mapping
///
/// A record that already carries `alt_titles` keeps its existing entries.
pub fn fold_alt_titles(record: &mut RawRecord) {
    let mut folded = BTreeMap::new();
    for key in ALT_TITLE_KEYS {
        if let Some(value) = record.remove(key) {
            folded.insert(key.to_string(), value);
        }
    }

    if folded.is_empty() {
        return;
    }

    match record.get_mut(ALT_TITLES) {
        Some(RawValue::Map(existing)) => {
            for (key, value) in folded {
                existing.entry(key).or_insert(value);
            }
        }
        _ => {
            record.insert(ALT_TITLES.to_string(), RawValue::Map(folded));
        }
    }
}

/// Apply the rename table; returns how many values were discarded
///
/// When the target name is already present the source key is removed and
/// its value dropped.
pub fn merge_field_names(record: &mut RawRecord) -> usize {
    let mut discarded = 0;
    for (old, new) in RENAMES {
        let Some(value) = record.remove(old) else {
            continue;
        };
        if record.contains_key(new) {
            debug!(from = old, to = new, "Rename target present, discarding value");
            discarded += 1;
        } else {
            record.insert(new.to_string(), value);
        }
    }
    discarded
}

/// Extract `tt` + 7 digits from the record's `imdb_link`
pub fn extract_imdb_id(record: &RawRecord) -> Option<ImdbId> {
    let link = record.get("imdb_link")?.joined_text()?;
    IMDB_ID.find(&link).and_then(|m| ImdbId::parse(m.as_str()))
}

/// Consolidate film records into canonical records
///
/// Running this on already consolidated records changes nothing.
pub fn consolidate(records: Vec<RawRecord>) -> ConsolidatedWiki {
    let mut stats = ConsolidationStats {
        input_records: records.len(),
        ..Default::default()
    };

    let mut seen = HashSet::new();
    let mut rows = Vec::with_capacity(records.len());

    for mut record in records {
        fold_alt_titles(&mut record);
        stats.discarded_renames += merge_field_names(&mut record);

        let Some(imdb_id) = extract_imdb_id(&record) else {
            stats.without_id += 1;
            continue;
        };

        if !seen.insert(imdb_id.clone()) {
            debug!(imdb_id = %imdb_id, "Dropping duplicate wiki record");
            stats.duplicates += 1;
            continue;
        }

        rows.push(CanonicalWikiRecord {
            imdb_id,
            fields: record,
        });
    }

    let (columns, pruned) = prune_sparse_columns(&mut rows);
    stats.pruned_columns = pruned;

    info!(
        records = rows.len(),
        columns = columns.len(),
        without_id = stats.without_id,
        duplicates = stats.duplicates,
        discarded_renames = stats.discarded_renames,
        pruned = stats.pruned_columns.len(),
        "Consolidated wiki records"
    );

    ConsolidatedWiki {
        table: WikiTable { columns, rows },
        stats,
    }
}

/// Drop every column that is null in at least 90% of the rows
///
/// Returns (kept columns, pruned columns), both sorted.
fn prune_sparse_columns(rows: &mut [CanonicalWikiRecord]) -> (Vec<String>, Vec<String>) {
    let mut present: BTreeMap<String, usize> = BTreeMap::new();
    for row in rows.iter() {
        for key in row.fields.keys() {
            *present.entry(key.clone()).or_default() += 1;
        }
    }

    let total = rows.len();
    let mut kept = Vec::new();
    let mut pruned = BTreeSet::new();
    for (column, count) in present {
        let nulls = total - count;
        if nulls * 10 >= total * SPARSE_NULL_TENTHS {
            pruned.insert(column);
        } else {
            kept.push(column);
        }
    }

    if !pruned.is_empty() {
        for row in rows.iter_mut() {
            row.fields.retain(|key, _| !pruned.contains(key));
        }
        debug!(columns = ?pruned, "Pruned sparse wiki columns");
    }

    (kept, pruned.into_iter().collect())
}
