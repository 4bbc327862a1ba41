//! Mapping between local paths and object names.
//!
//! Object names always use `/` separators and never contain `.` or `..`
//! segments; local paths are derived from them under a chosen root.

use anyhow::{bail, Result};
use std::path::{Component, Path, PathBuf};

/// Strip leading `/`, `./` and any run of `../` from a piped name.
///
/// `"../../a/b"` becomes `"a/b"`, `"/etc/x"` becomes `"etc/x"`.
pub fn normalize_object_name(raw: &str) -> String {
    let mut name = raw;
    loop {
        if let Some(rest) = name.strip_prefix("../") {
            name = rest;
        } else if let Some(rest) = name.strip_prefix("./") {
            name = rest;
        } else if let Some(rest) = name.strip_prefix('/') {
            name = rest;
        } else {
            break;
        }
    }
    name.to_string()
}

/// Object name for a path relative to the enumeration root, with an optional prefix.
///
/// Returns `None` if any component is not valid UTF-8 or is not a plain name.
pub fn object_name_for(prefix: Option<&str>, relative: &Path) -> Option<String> {
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if parts.is_empty() {
        return None;
    }
    let joined = parts.join("/");
    Some(match prefix {
        Some(p) => format!("{p}{joined}"),
        None => joined,
    })
}

/// Local path for an object name under `root`, removing `strip_prefix` first
/// when the name carries it.
pub fn local_path_for(root: &Path, name: &str, strip_prefix: Option<&str>) -> Result<PathBuf> {
    let relative = match strip_prefix {
        Some(p) if !p.is_empty() => name.strip_prefix(p).unwrap_or(name),
        _ => name,
    };
    let mut out = root.to_path_buf();
    let mut pushed = false;
    for segment in relative.split('/') {
        match segment {
            "" => continue,
            "." | ".." => bail!("refusing unsafe object name {name:?}"),
            s => {
                out.push(s);
                pushed = true;
            }
        }
    }
    if !pushed {
        bail!("object name {name:?} does not map to a file");
    }
    Ok(out)
}

/// True if the name is a folder marker (ends in `/`) rather than an object with data.
pub fn is_folder_marker(name: &str) -> bool {
    name.ends_with('/')
}

/// True when `name` falls under any of `prefixes`; an empty prefix list matches everything.
pub fn matches_prefixes(name: &str, prefixes: &[String]) -> bool {
    prefixes.is_empty() || prefixes.iter().any(|p| name.starts_with(p.as_str()))
}
