use serde::{Deserialize, Serialize};

/// A downstream service with output size constraints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetService {
    pub name: String,
    pub max_width: u32,
    pub max_height: u32,
    pub max_size_bytes: u64,
    #[serde(default)]
    pub description: String,
}

impl TargetService {
    pub fn new(
        name: &str,
        max_width: u32,
        max_height: u32,
        max_size_bytes: u64,
        description: &str,
    ) -> Self {
        Self {
            name: name.to_string(),
            max_width,
            max_height,
            max_size_bytes,
            description: description.to_string(),
        }
    }

    /// True when the output fits every bound of this service.
    pub fn accepts(&self, size_bytes: u64, width: u32, height: u32) -> bool {
        size_bytes <= self.max_size_bytes && width <= self.max_width && height <= self.max_height
    }
}
