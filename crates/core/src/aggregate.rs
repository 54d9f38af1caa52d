use std::collections::HashMap;

use crate::isbn::Identifier;

/// Identifier → contributing file names.
///
/// Identifiers keep the order in which they were first seen, and each source
/// list keeps the order in which files were recorded. A file is recorded at
/// most once per identifier.
#[derive(Debug, Default, Clone)]
pub struct ExtractionResult {
    entries: Vec<(Identifier, Vec<String>)>,
    index: HashMap<Identifier, usize>,
}

impl ExtractionResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Note that `file_name` contained `identifier`. Returns `false` when the
    /// pair was already recorded.
    pub fn record(&mut self, identifier: Identifier, file_name: &str) -> bool {
        match self.index.get(&identifier) {
            Some(&i) => {
                let sources = &mut self.entries[i].1;
                if sources.iter().any(|f| f == file_name) {
                    return false;
                }
                sources.push(file_name.to_string());
                true
            }
            None => {
                self.index.insert(identifier.clone(), self.entries.len());
                self.entries.push((identifier, vec![file_name.to_string()]));
                true
            }
        }
    }

    /// Record every identifier found in one file.
    pub fn record_all<I>(&mut self, identifiers: I, file_name: &str)
    where
        I: IntoIterator<Item = Identifier>,
    {
        for id in identifiers {
            self.record(id, file_name);
        }
    }

    pub fn sources(&self, identifier: &Identifier) -> Option<&[String]> {
        self.index.get(identifier).map(|&i| self.entries[i].1.as_slice())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Identifier, &[String])> {
        self.entries.iter().map(|(id, files)| (id, files.as_slice()))
    }
}

impl IntoIterator for ExtractionResult {
    type Item = (Identifier, Vec<String>);
    type IntoIter = std::vec::IntoIter<(Identifier, Vec<String>)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> Identifier {
        Identifier::parse(s).unwrap()
    }

    #[test]
    fn same_identifier_in_two_files_is_one_entry() {
        let mut agg = ExtractionResult::new();
        agg.record(id("9780596520687"), "front.jpg");
        agg.record(id("9780596520687"), "back.jpg");

        assert_eq!(agg.len(), 1);
        assert_eq!(
            agg.sources(&id("9780596520687")).unwrap(),
            &["front.jpg".to_string(), "back.jpg".to_string()]
        );
    }

    #[test]
    fn recording_twice_is_idempotent() {
        let mut agg = ExtractionResult::new();
        assert!(agg.record(id("0596007973"), "a.png"));
        assert!(!agg.record(id("0596007973"), "a.png"));
        assert_eq!(agg.sources(&id("0596007973")).unwrap().len(), 1);
    }

    #[test]
    fn identifiers_iterate_in_first_seen_order() {
        let mut agg = ExtractionResult::new();
        agg.record_all([id("0134034287"), id("9780134685991")], "one.png");
        agg.record(id("0596007973"), "two.png");
        agg.record(id("0134034287"), "two.png");

        let order: Vec<&str> = agg.iter().map(|(i, _)| i.as_str()).collect();
        assert_eq!(order, vec!["0134034287", "9780134685991", "0596007973"]);
    }

    #[test]
    fn every_entry_has_a_source() {
        let mut agg = ExtractionResult::new();
        agg.record(id("0134034287"), "x.png");
        agg.record(id("9780596520687"), "y.png");
        assert!(agg.iter().all(|(_, files)| !files.is_empty()));
    }

    #[test]
    fn unknown_identifier_has_no_sources() {
        let agg = ExtractionResult::new();
        assert!(agg.is_empty());
        assert!(agg.sources(&id("0134034287")).is_none());
    }
}
