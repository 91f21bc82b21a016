//! Target-service suitability lookup

use std::collections::HashSet;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use mediagate_core::TargetService;

const MIB: u64 = 1024 * 1024;

/// Named downstream services and their output bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetCatalog {
    entries: Vec<TargetService>,
}

impl TargetCatalog {
    pub fn builtin() -> Self {
        Self {
            entries: vec![
                TargetService::new(
                    "square-social",
                    1080,
                    1080,
                    8 * MIB,
                    "Square social media posts",
                ),
                TargetService::new("chat", 1024, 1024, 10 * MIB, "Chat and messaging attachments"),
                TargetService::new("web", 1200, 800, 15 * MIB, "Web page content images"),
                TargetService::new("mobile", 750, 1334, 5 * MIB, "Portrait mobile screens"),
                TargetService::new("email", 800, 600, 5 * MIB, "Inline email images"),
                TargetService::new("video-thumbnail", 1280, 720, 20 * MIB, "Video thumbnails"),
                TargetService::new("social-card", 1200, 630, 8 * MIB, "Link preview cards"),
                TargetService::new("print", 1920, 1080, 10 * MIB, "Print and presentation"),
            ],
        }
    }

    /// Parse a JSON array of target services. Names must be unique and non-empty.
    pub fn from_json(json: &str) -> Result<Self> {
        let entries: Vec<TargetService> =
            serde_json::from_str(json).context("Failed to parse target catalogue JSON")?;

        let mut seen = HashSet::new();
        for entry in &entries {
            if entry.name.trim().is_empty() {
                return Err(anyhow!("Target service with an empty name"));
            }
            if !seen.insert(entry.name.as_str()) {
                return Err(anyhow!("Duplicate target service '{}'", entry.name));
            }
        }

        Ok(Self { entries })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read target catalogue from {}", path.display()))?;
        let catalog = Self::from_json(&json)?;
        tracing::info!(
            path = %path.display(),
            entries = catalog.entries.len(),
            "Loaded target catalogue"
        );
        Ok(catalog)
    }

    pub fn entries(&self) -> &[TargetService] {
        &self.entries
    }

    /// Services whose width, height and size bounds all admit the output.
    pub fn suitable_for(&self, size_bytes: u64, width: u32, height: u32) -> Vec<&TargetService> {
        self.entries
            .iter()
            .filter(|t| t.accepts(size_bytes, width, height))
            .collect()
    }
}

impl Default for TargetCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(targets: Vec<&TargetService>) -> Vec<&str> {
        targets.into_iter().map(|t| t.name.as_str()).collect()
    }

    #[test]
    fn test_small_output_fits_everything() {
        let catalog = TargetCatalog::builtin();
        assert_eq!(catalog.entries().len(), 8);
        assert_eq!(catalog.suitable_for(2 * MIB, 600, 400).len(), 8);
    }

    #[test]
    fn test_any_smaller_bound_excludes() {
        let catalog = TargetCatalog::builtin();
        let fits = names(catalog.suitable_for(2 * MIB, 1000, 700));
        assert_eq!(
            fits,
            vec!["square-social", "chat", "web", "video-thumbnail", "print"]
        );

        let fits = names(catalog.suitable_for(6 * MIB, 600, 400));
        assert!(!fits.contains(&"mobile"));
        assert!(!fits.contains(&"email"));
        assert_eq!(fits.len(), 6);
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let catalog = TargetCatalog::builtin();
        let fits = names(catalog.suitable_for(5 * MIB, 800, 600));
        assert!(fits.contains(&"email"));
        assert!(names(catalog.suitable_for(20 * MIB + 1, 10, 10)).is_empty());
    }

    #[test]
    fn test_from_json() {
        let json = r#"[
            {"name": "kiosk", "max_width": 640, "max_height": 480, "max_size_bytes": 1048576},
            {"name": "banner", "max_width": 1500, "max_height": 300, "max_size_bytes": 2097152,
             "description": "Site banner"}
        ]"#;
        let catalog = TargetCatalog::from_json(json).unwrap();
        assert_eq!(catalog.entries().len(), 2);
        assert_eq!(catalog.entries()[0].description, "");
        assert_eq!(names(catalog.suitable_for(1000, 600, 200)), vec!["kiosk", "banner"]);
    }

    #[test]
    fn test_from_json_rejects_duplicates_and_garbage() {
        let dup = r#"[
            {"name": "a", "max_width": 1, "max_height": 1, "max_size_bytes": 1},
            {"name": "a", "max_width": 2, "max_height": 2, "max_size_bytes": 2}
        ]"#;
        assert!(TargetCatalog::from_json(dup).is_err());
        let blank = r#"[{"name": " ", "max_width": 1, "max_height": 1, "max_size_bytes": 1}]"#;
        assert!(TargetCatalog::from_json(blank).is_err());
        assert!(TargetCatalog::from_json("{").is_err());
    }

    #[test]
    fn test_from_path_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("targets.json");
        let json = serde_json::to_string(TargetCatalog::builtin().entries()).unwrap();
        std::fs::write(&path, json).unwrap();
        assert_eq!(TargetCatalog::from_path(&path).unwrap(), TargetCatalog::builtin());
    }
}
