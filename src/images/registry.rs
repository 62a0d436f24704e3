//! Image path registry
//!
//! Maps each record type to the collection it is stored in and the
//! descriptors of every field that holds image references. The registry is
//! built once at startup and shared read-only behind an `Arc`.
//!
//! Record types that are not registered simply have no image paths, so
//! cleanup for them is a no-op rather than an error.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info};

use crate::images::path::FieldPath;
use crate::types::{CuratorError, Result};

/// Built-in table: (record type, collection, image paths)
const BUILTIN_RECORDS: &[(&str, &str, &[&str])] = &[
    (
        "HomePageData",
        "homepagedatas",
        &[
            "hero.backgroundImage",
            "hero.image",
            "clientLogos[]",
            "whyChooseUs.points[].icon",
            "industries[].image",
            "testimonials[].avatar",
        ],
    ),
    ("AboutUs", "aboutus", &["banner.image", "team[].photo", "gallery[]"]),
    (
        "Service",
        "services",
        &[
            "cover_image",
            "icon",
            "benefits[].icon",
            "process[].image",
            "technologies[].logo",
        ],
    ),
    (
        "HirePage",
        "hirepages",
        &["cover_image", "hero.image", "skills[].icon", "developers[].photo"],
    ),
    (
        "Blog",
        "blogs",
        &[
            "cover_image",
            "author.avatar",
            "sections[].image",
            "sections[].gallery[]",
        ],
    ),
    ("BlogCategory", "blogcategories", &["icon"]),
    ("Career", "careers", &["banner.image", "perks[].icon", "gallery[]"]),
    ("JobOpening", "jobopenings", &["cover_image"]),
    (
        "Training",
        "trainings",
        &["cover_image", "modules[].image", "mentors[].photo"],
    ),
    ("TrainingPage", "trainingpages", &["banner.image", "highlights[].icon"]),
    (
        "CaseStudy",
        "casestudies",
        &["cover_image", "gallery[]", "results[].image"],
    ),
    ("Portfolio", "portfolios", &["thumbnail", "images[]"]),
    ("Testimonial", "testimonials", &["avatar", "companyLogo"]),
    ("TeamMember", "teammembers", &["photo"]),
    ("Client", "clients", &["logo"]),
    ("Industry", "industries", &["icon", "cover_image"]),
    ("Technology", "technologies", &["logo"]),
    ("Partner", "partners", &["logo"]),
    ("Award", "awards", &["image"]),
    ("Certification", "certifications", &["badge"]),
    ("Event", "events", &["cover_image", "gallery[]"]),
    ("Gallery", "galleries", &["images[]"]),
    (
        "LifeAtCompany",
        "lifeatcompanies",
        &["banner.image", "gallery[]", "culture[].image"],
    ),
    ("ContactPage", "contactpages", &["banner.image", "offices[].image"]),
    ("Header", "headers", &["logo", "menu[].icon"]),
    ("Footer", "footers", &["logo", "socialLinks[].icon"]),
    ("PrivacyPolicy", "privacypolicies", &["banner.image"]),
    ("TermsPage", "termspages", &["banner.image"]),
    (
        "HireDeveloperPage",
        "hiredeveloperpages",
        &["hero.image", "whyHire[].icon", "process[].image"],
    ),
    ("SeoMetadata", "seo_metadata", &["cover_image"]),
];

/// Image configuration for one record type
#[derive(Debug, Clone)]
pub struct RecordImages {
    pub collection: String,
    pub paths: Vec<FieldPath>,
}

/// Read-only lookup from record type to its image paths
#[derive(Debug, Clone, Default)]
pub struct ImageRegistry {
    records: HashMap<String, RecordImages>,
}

/// Entry shape of the JSON override file
#[derive(Debug, Deserialize)]
struct OverrideEntry {
    #[serde(default)]
    collection: Option<String>,
    paths: Vec<String>,
}

impl ImageRegistry {
    /// Registry with no record types
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry populated from the built-in table
    pub fn builtin() -> Result<Self> {
        let mut registry = Self::empty();
        for (record_type, collection, paths) in BUILTIN_RECORDS {
            registry.register(record_type, collection, paths.iter().copied())?;
        }
        Ok(registry)
    }

    /// Built-in table, optionally overlaid with entries from a JSON file
    pub fn load(overrides: Option<&Path>) -> Result<Self> {
        let mut registry = Self::builtin()?;
        if let Some(path) = overrides {
            registry.apply_overrides_file(path)?;
        }
        info!(
            record_types = registry.records.len(),
            "Image path registry loaded"
        );
        Ok(registry)
    }

    /// Add or replace a record type. Every path is validated up front.
    pub fn register<'a, I>(&mut self, record_type: &str, collection: &str, paths: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let paths = paths
            .into_iter()
            .map(|raw| {
                FieldPath::parse(raw).map_err(|e| {
                    CuratorError::Config(format!("record type '{}': {}", record_type, e))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        self.records.insert(
            record_type.to_string(),
            RecordImages {
                collection: collection.to_string(),
                paths,
            },
        );
        Ok(())
    }

    /// Overlay entries from a JSON object keyed by record type:
    ///
    /// ```json
    /// { "Blog": { "collection": "blogs", "paths": ["cover_image", "sections[].image"] } }
    /// ```
    ///
    /// `collection` may be omitted when overriding an existing record type.
    pub fn apply_overrides_file(&mut self, path: &Path) -> Result<()> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CuratorError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        self.apply_overrides_json(&raw)
    }

    pub fn apply_overrides_json(&mut self, raw: &str) -> Result<()> {
        let entries: BTreeMap<String, OverrideEntry> = serde_json::from_str(raw)?;

        for (record_type, entry) in entries {
            let collection = match entry.collection {
                Some(c) => c,
                None => self
                    .collection(&record_type)
                    .map(str::to_string)
                    .ok_or_else(|| {
                        CuratorError::Config(format!(
                            "record type '{}' is new and needs a collection",
                            record_type
                        ))
                    })?,
            };
            debug!(record_type = %record_type, paths = entry.paths.len(), "Overriding image paths");
            self.register(&record_type, &collection, entry.paths.iter().map(String::as_str))?;
        }
        Ok(())
    }

    /// Image paths for a record type; empty when the type is unknown
    pub fn paths(&self, record_type: &str) -> &[FieldPath] {
        self.records
            .get(record_type)
            .map(|r| r.paths.as_slice())
            .unwrap_or(&[])
    }

    pub fn collection(&self, record_type: &str) -> Option<&str> {
        self.records.get(record_type).map(|r| r.collection.as_str())
    }

    pub fn contains(&self, record_type: &str) -> bool {
        self.records.contains_key(record_type)
    }

    /// Registered record types in name order
    pub fn record_types(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.records.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_builtin_table_parses() {
        let registry = ImageRegistry::builtin().unwrap();
        assert_eq!(registry.len(), BUILTIN_RECORDS.len());
        assert_eq!(registry.collection("Service"), Some("services"));
        assert!(registry
            .paths("Blog")
            .iter()
            .any(|p| p.as_str() == "sections[].gallery[]"));
    }

    #[test]
    fn test_unknown_type_is_empty() {
        let registry = ImageRegistry::builtin().unwrap();
        assert!(registry.paths("NoSuchRecord").is_empty());
        assert!(registry.collection("NoSuchRecord").is_none());
    }

    #[test]
    fn test_register_rejects_bad_path() {
        let mut registry = ImageRegistry::empty();
        let err = registry
            .register("Broken", "brokens", ["cover_image", "points[].image", "a..b"])
            .unwrap_err();
        assert!(err.to_string().contains("Broken"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_overrides_replace_and_add() {
        let mut registry = ImageRegistry::builtin().unwrap();
        registry
            .apply_overrides_json(
                r#"{
                    "Service": { "paths": ["cover_image"] },
                    "Webinar": { "collection": "webinars", "paths": ["speakers[].photo"] }
                }"#,
            )
            .unwrap();

        assert_eq!(registry.paths("Service").len(), 1);
        assert_eq!(registry.collection("Service"), Some("services"));
        assert_eq!(registry.collection("Webinar"), Some("webinars"));
        assert!(registry.record_types().contains(&"Webinar"));
    }

    #[test]
    fn test_overrides_new_type_needs_collection() {
        let mut registry = ImageRegistry::empty();
        let result = registry.apply_overrides_json(r#"{ "Webinar": { "paths": ["cover_image"] } }"#);
        assert!(matches!(result, Err(CuratorError::Config(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "Blog": {{ "paths": ["cover_image"] }} }}"#).unwrap();

        let registry = ImageRegistry::load(Some(file.path())).unwrap();
        assert_eq!(registry.paths("Blog").len(), 1);
        assert!(registry.contains("HomePageData"));
    }
}
