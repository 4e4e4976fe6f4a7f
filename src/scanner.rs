use anyhow::Result;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Collect every `.class` file below `dir`, sorted for stable output.
pub fn scan_directory(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();

        if !path.is_file() || !is_class_file(path) {
            continue;
        }

        // Module and package descriptors are not serializable types
        let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if file_name == "module-info.class" || file_name == "package-info.class" {
            continue;
        }

        files.push(path.to_path_buf());
    }

    files.sort();
    Ok(files)
}

pub fn scan_directories(dirs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut all_files = Vec::new();

    for dir in dirs {
        let files = scan_directory(dir)?;
        all_files.extend(files);
    }

    Ok(all_files)
}

/// Expand a glob pattern, keeping only `.class` files.
pub fn expand_glob(pattern: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in glob::glob(pattern)? {
        match entry {
            Ok(path) if path.is_file() && is_class_file(&path) => files.push(path),
            Ok(_) => {}
            Err(e) => tracing::warn!("Skipping unreadable glob match: {}", e),
        }
    }
    files.sort();
    Ok(files)
}

pub fn is_class_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext == "class")
        .unwrap_or(false)
}
