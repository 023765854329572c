// School catalog: static reference data loaded from CSV.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to read school catalog {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in school catalog {path}: {source}")]
    Csv { path: String, source: csv::Error },

    #[error("duplicate school name in catalog: {name}")]
    DuplicateSchool { name: String },

    #[error("school catalog is empty")]
    Empty,
}

/// One school in the catalog. Identity = name (unique).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct School {
    pub name: String,
    pub conference: String,
    pub primary_color: String,
    pub secondary_color: String,
}

/// Immutable catalog of all schools eligible for the season.
///
/// Loaded once at season setup from a CSV with columns
/// `name,conference,primary_color,secondary_color` (~134 rows) and never
/// mutated afterwards.
#[derive(Debug, Clone)]
pub struct SchoolRegistry {
    schools: Vec<School>,
    by_name: HashMap<String, usize>,
}

impl SchoolRegistry {
    /// Build a registry from an in-memory school list, rejecting duplicates.
    pub fn from_schools(schools: Vec<School>) -> Result<Self, RegistryError> {
        if schools.is_empty() {
            return Err(RegistryError::Empty);
        }
        let mut by_name = HashMap::with_capacity(schools.len());
        for (idx, school) in schools.iter().enumerate() {
            if by_name.insert(school.name.clone(), idx).is_some() {
                return Err(RegistryError::DuplicateSchool {
                    name: school.name.clone(),
                });
            }
        }
        Ok(SchoolRegistry { schools, by_name })
    }

    /// Load the catalog from a CSV reader.
    pub fn from_csv_reader<R: Read>(reader: R, path: &str) -> Result<Self, RegistryError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut schools = Vec::new();
        for record in csv_reader.deserialize::<School>() {
            let school = record.map_err(|e| RegistryError::Csv {
                path: path.to_string(),
                source: e,
            })?;
            schools.push(school);
        }
        Self::from_schools(schools)
    }

    /// Load the catalog from a CSV file on disk.
    pub fn from_csv_path(path: &Path) -> Result<Self, RegistryError> {
        let display = path.display().to_string();
        let file = std::fs::File::open(path).map_err(|e| RegistryError::Io {
            path: display.clone(),
            source: e,
        })?;
        Self::from_csv_reader(file, &display)
    }

    /// Look up a school by name.
    pub fn lookup(&self, name: &str) -> Option<&School> {
        self.by_name.get(name).map(|&idx| &self.schools[idx])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.schools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schools.is_empty()
    }

    /// All school names in catalog order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.schools.iter().map(|s| s.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &School> {
        self.schools.iter()
    }

    /// All schools belonging to the given conference.
    pub fn conference_members(&self, conference: &str) -> Vec<&School> {
        self.schools
            .iter()
            .filter(|s| s.conference == conference)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_csv() -> &'static str {
        "name,conference,primary_color,secondary_color\n\
         Michigan,Big Ten,#00274C,#FFCB05\n\
         Ohio State,Big Ten,#BB0000,#666666\n\
         Alabama,SEC,#9E1B32,#828A8F\n\
         Georgia,SEC,#BA0C2F,#000000\n"
    }

    #[test]
    fn loads_schools_from_csv() {
        let registry = SchoolRegistry::from_csv_reader(sample_csv().as_bytes(), "test.csv")
            .expect("should parse");
        assert_eq!(registry.len(), 4);

        let michigan = registry.lookup("Michigan").expect("Michigan present");
        assert_eq!(michigan.conference, "Big Ten");
        assert_eq!(michigan.primary_color, "#00274C");
        assert_eq!(michigan.secondary_color, "#FFCB05");
    }

    #[test]
    fn lookup_misses_return_none() {
        let registry =
            SchoolRegistry::from_csv_reader(sample_csv().as_bytes(), "test.csv").unwrap();
        assert!(registry.lookup("Slippery Rock").is_none());
        assert!(!registry.contains("Slippery Rock"));
    }

    #[test]
    fn duplicate_names_rejected() {
        let csv = "name,conference,primary_color,secondary_color\n\
                   Michigan,Big Ten,#00274C,#FFCB05\n\
                   Michigan,MAC,#000000,#FFFFFF\n";
        let err = SchoolRegistry::from_csv_reader(csv.as_bytes(), "dup.csv").unwrap_err();
        match err {
            RegistryError::DuplicateSchool { name } => assert_eq!(name, "Michigan"),
            other => panic!("expected DuplicateSchool, got: {other}"),
        }
    }

    #[test]
    fn empty_catalog_rejected() {
        let csv = "name,conference,primary_color,secondary_color\n";
        let err = SchoolRegistry::from_csv_reader(csv.as_bytes(), "empty.csv").unwrap_err();
        assert!(matches!(err, RegistryError::Empty));
    }

    #[test]
    fn conference_members_filters() {
        let registry =
            SchoolRegistry::from_csv_reader(sample_csv().as_bytes(), "test.csv").unwrap();
        let sec = registry.conference_members("SEC");
        assert_eq!(sec.len(), 2);
        assert!(sec.iter().any(|s| s.name == "Alabama"));
        assert!(sec.iter().any(|s| s.name == "Georgia"));
    }

    #[test]
    fn names_preserve_catalog_order() {
        let registry =
            SchoolRegistry::from_csv_reader(sample_csv().as_bytes(), "test.csv").unwrap();
        let names: Vec<&str> = registry.names().collect();
        assert_eq!(names, vec!["Michigan", "Ohio State", "Alabama", "Georgia"]);
    }

    #[test]
    fn whitespace_trimmed() {
        let csv = "name,conference,primary_color,secondary_color\n\
                   Texas , Big 12 , #BF5700 , #FFFFFF\n";
        let registry = SchoolRegistry::from_csv_reader(csv.as_bytes(), "ws.csv").unwrap();
        let texas = registry.lookup("Texas").expect("trimmed name");
        assert_eq!(texas.conference, "Big 12");
    }
}
