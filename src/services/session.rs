//! Registered user name, persisted in a plain text file.

use crate::types::validate_user_name;
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, warn};

/// Read the stored user name. Missing, empty or invalid files yield `None`.
pub fn load_user_name(path: &Path) -> Option<String> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            debug!("No user file at {}: {}", path.display(), e);
            return None;
        }
    };

    let name = content.trim();
    match validate_user_name(name) {
        Ok(()) => Some(name.to_string()),
        Err(reason) => {
            warn!("Ignoring user file {}: {}", path.display(), reason);
            None
        }
    }
}

pub fn save_user_name(path: &Path, user_name: &str) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, user_name)?;
    debug!("Saved user name to {}", path.display());
    Ok(())
}
