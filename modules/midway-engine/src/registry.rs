//! Registry persistence — a JSON object keyed by place name.
//!
//! Loading is forgiving: a missing, unreadable, or malformed file means
//! an empty registry (a corrupt file must never block a harvest), but
//! entries that parse with out-of-range coordinates are rejected
//! individually rather than silently carried along.

use std::path::Path;

use anyhow::Result;
use tracing::{info, warn};

use midway_common::{MidwayError, Registry};

/// Load the registry from disk.
pub fn load(path: &Path) -> Registry {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), "No registry file, starting empty");
            return Registry::new();
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read registry, starting empty");
            return Registry::new();
        }
    };

    let mut registry: Registry = match serde_json::from_str(&raw) {
        Ok(registry) => registry,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Malformed registry file, starting empty");
            return Registry::new();
        }
    };

    let invalid: Vec<String> = registry
        .iter()
        .filter(|(_, place)| {
            place
                .coordinate
                .map(|coordinate| !coordinate.is_valid())
                .unwrap_or(false)
        })
        .map(|(name, _)| name.clone())
        .collect();
    for name in invalid {
        warn!(name = name.as_str(), "Rejecting entry with out-of-range coordinate");
        registry.remove(&name);
    }

    info!(path = %path.display(), places = registry.len(), "Registry loaded");
    registry
}

/// Persist the registry. Errors are surfaced; callers decide whether a
/// failed save is fatal.
pub fn save(path: &Path, registry: &Registry) -> Result<()> {
    let json = serde_json::to_string_pretty(registry)
        .map_err(|e| MidwayError::Persistence(format!("serialize registry: {e}")))?;
    std::fs::write(path, json)
        .map_err(|e| MidwayError::Persistence(format!("write {}: {e}", path.display())))?;
    Ok(())
}
