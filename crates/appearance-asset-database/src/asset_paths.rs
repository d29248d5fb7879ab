use std::path::{Path, PathBuf};

pub const META_EXTENSION: &str = "meta";

const INVALID_FILE_NAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Location of the metadata sidecar belonging to `asset_path`, e.g. `Glass.material.meta`.
pub fn meta_path(asset_path: &Path) -> PathBuf {
    let mut file_name = asset_path.file_name().unwrap_or_default().to_os_string();
    file_name.push(".");
    file_name.push(META_EXTENSION);
    asset_path.with_file_name(file_name)
}

/// Expresses `path` relative to `assets_root` using forward slashes.
/// Paths outside of the root are returned unchanged.
pub fn resolve_relative_path(path: &Path, assets_root: &Path) -> String {
    let relative = match path.strip_prefix(assets_root) {
        Ok(relative) => relative.to_path_buf(),
        Err(_) => {
            let canonical_path = path.canonicalize().ok();
            let canonical_root = assets_root.canonicalize().ok();
            match (canonical_path, canonical_root) {
                (Some(path), Some(root)) if path.starts_with(&root) => {
                    path.strip_prefix(&root).map(Path::to_path_buf).unwrap_or(path)
                }
                _ => {
                    log::warn!(
                        "{} is not located inside the assets root {}.",
                        path.display(),
                        assets_root.display()
                    );
                    return path.to_string_lossy().replace('\\', "/");
                }
            }
        }
    };

    relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Replaces characters that are not allowed in file names on common filesystems.
pub fn sanitize_file_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| {
            if INVALID_FILE_NAME_CHARS.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();

    sanitized.trim().trim_end_matches('.').to_owned()
}

/// First free path of the form `{stem}.{extension}`, `{stem}_1.{extension}`, `{stem}_2.{extension}`...
pub fn unique_file_path(dir: &Path, stem: &str, extension: &str) -> PathBuf {
    let candidate = dir.join(format!("{}.{}", stem, extension));
    if !candidate.exists() {
        return candidate;
    }

    let mut suffix = 1u32;
    loop {
        let candidate = dir.join(format!("{}_{}.{}", stem, suffix, extension));
        if !candidate.exists() {
            return candidate;
        }
        suffix += 1;
    }
}
