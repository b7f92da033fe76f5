use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::Path;

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use super::{CatalogEntry, CatalogError, EpisodeKey};

/// The catalog of one lane: entries keyed by (round, episode).
///
/// Serialized as a single JSON object whose keys are `series:RR:EE` in
/// numeric order and whose values are one-element arrays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogFragment {
    series_id: String,
    entries: BTreeMap<EpisodeKey, CatalogEntry>,
}

impl CatalogFragment {
    pub fn new(series_id: impl Into<String>) -> Self {
        Self {
            series_id: series_id.into(),
            entries: BTreeMap::new(),
        }
    }

    pub fn series_id(&self) -> &str {
        &self.series_id
    }

    /// Insert unless the key is taken. Returns whether the entry was added.
    pub fn insert(&mut self, key: EpisodeKey, entry: CatalogEntry) -> bool {
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, entry);
        true
    }

    pub fn get(&self, key: &EpisodeKey) -> Option<&CatalogEntry> {
        self.entries.get(key)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&EpisodeKey, &CatalogEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn rounds(&self) -> BTreeSet<u8> {
        self.entries.keys().map(|k| k.round).collect()
    }

    /// Drop every round except the newest `keep`. Returns entries removed.
    pub fn retain_newest_rounds(&mut self, keep: usize) -> usize {
        let kept: BTreeSet<u8> = self.rounds().into_iter().rev().take(keep).collect();
        let before = self.entries.len();
        self.entries.retain(|key, _| kept.contains(&key.round));
        before - self.entries.len()
    }

    pub fn to_json(&self) -> Result<String, CatalogError> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }

    /// Parse a fragment. Keys must all name the same series.
    pub fn from_json(text: &str) -> Result<Self, CatalogError> {
        let raw: HashMap<String, Vec<CatalogEntry>> = serde_json::from_str(text)?;
        let mut series_id: Option<String> = None;
        let mut entries = BTreeMap::new();

        for (raw_key, values) in raw {
            let (series, key) = EpisodeKey::parse(&raw_key)?;
            match &series_id {
                Some(existing) if *existing != series => {
                    return Err(CatalogError::InvalidKey(raw_key));
                }
                Some(_) => {}
                None => series_id = Some(series),
            }
            let entry = values
                .into_iter()
                .next()
                .ok_or_else(|| CatalogError::EmptyEntry(raw_key.clone()))?;
            entries.insert(key, entry);
        }

        Ok(Self {
            series_id: series_id.unwrap_or_default(),
            entries,
        })
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let text = fs::read_to_string(path).map_err(|e| CatalogError::io(path, e))?;
        Self::from_json(&text)
    }
}

impl Serialize for CatalogFragment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, entry) in &self.entries {
            map.serialize_entry(&key.format(&self.series_id), std::slice::from_ref(entry))?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(title: &str, idx: usize) -> CatalogEntry {
        CatalogEntry {
            title: title.to_string(),
            thumbnail: "https://img.example/t.png".to_string(),
            info_hash: "abc123".to_string(),
            file_idx: idx,
            filename: format!("{title}.mkv"),
        }
    }

    #[test]
    fn test_keys_serialize_in_numeric_order() {
        let mut fragment = CatalogFragment::new("s1");
        fragment.insert(EpisodeKey::new(10, 1), entry("c", 2));
        fragment.insert(EpisodeKey::new(2, 10), entry("b", 1));
        fragment.insert(EpisodeKey::new(2, 9), entry("a", 0));

        let json = fragment.to_json().unwrap();
        let a = json.find("\"s1:02:09\"").unwrap();
        let b = json.find("\"s1:02:10\"").unwrap();
        let c = json.find("\"s1:10:01\"").unwrap();
        assert!(a < b && b < c);
        assert!(json.ends_with("}\n"));

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["s1:02:09"][0]["fileIdx"], 0);
        assert_eq!(value["s1:02:09"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_parse_back() {
        let mut fragment = CatalogFragment::new("s1");
        fragment.insert(EpisodeKey::new(7, 1), entry("Race", 0));
        fragment.insert(EpisodeKey::new(7, 2), entry("Quali", 1));
        let parsed = CatalogFragment::from_json(&fragment.to_json().unwrap()).unwrap();
        assert_eq!(parsed, fragment);
    }

    #[test]
    fn test_insert_keeps_first() {
        let mut fragment = CatalogFragment::new("s1");
        assert!(fragment.insert(EpisodeKey::new(1, 1), entry("first", 0)));
        assert!(!fragment.insert(EpisodeKey::new(1, 1), entry("second", 1)));
        assert_eq!(fragment.get(&EpisodeKey::new(1, 1)).unwrap().title, "first");
    }

    #[test]
    fn test_retain_newest_rounds() {
        let mut fragment = CatalogFragment::new("s1");
        for round in [0, 3, 5, 7] {
            fragment.insert(EpisodeKey::new(round, 1), entry("x", round as usize));
        }
        fragment.insert(EpisodeKey::new(7, 2), entry("y", 9));
        assert_eq!(fragment.retain_newest_rounds(2), 2);
        assert_eq!(fragment.rounds().into_iter().collect::<Vec<_>>(), vec![5, 7]);
    }

    #[test]
    fn test_rejects_mixed_series_and_empty_values() {
        assert!(matches!(
            CatalogFragment::from_json(r#"{"a:01:01": [], "a:01:02": []}"#),
            Err(CatalogError::EmptyEntry(_))
        ));
        let mixed = r#"{
            "a:01:01": [{"title": "x", "thumbnail": "", "infoHash": "h", "fileIdx": 0}],
            "b:01:02": [{"title": "y", "thumbnail": "", "infoHash": "h", "fileIdx": 1}]
        }"#;
        assert!(matches!(
            CatalogFragment::from_json(mixed),
            Err(CatalogError::InvalidKey(_))
        ));
        assert!(CatalogFragment::from_json("{}").unwrap().is_empty());
    }
}
