//! Path normalization and matching.
//!
//! Three distinct concerns live here:
//! - repairing incoming wire paths (artifact suffix strip, platform form),
//! - platform-normalizing local paths before comparison or host calls,
//! - the handshake project-path match rule.
//!
//! The artifact-suffix strip repairs occasional host bugs that append
//! `.git`/`.tmp`/`.bak`/`.swp` to a real path. It applies ONLY to incoming
//! `EditorState.filePath` values, never to paths read from the host.

/// Platform form used by one IDE family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathStyle {
    /// Forward slashes, leading `/`, no drive letter.
    Posix,
    /// Backslashes, lower-case drive letter.
    Windows,
}

const ARTIFACT_SUFFIXES: [&str; 4] = [".git", ".tmp", ".bak", ".swp"];

/// Strip one trailing artifact suffix, if present.
fn strip_artifact_suffix(path: &str) -> &str {
    for suffix in ARTIFACT_SUFFIXES {
        if let Some(stripped) = path.strip_suffix(suffix) {
            if !stripped.is_empty() {
                return stripped;
            }
        }
    }
    path
}

/// Normalize a path received on the wire for the local platform.
pub fn normalize_incoming(path: &str, style: PathStyle) -> String {
    normalize_platform(strip_artifact_suffix(path), style)
}

/// Normalize a local path to its platform form (no artifact strip).
pub fn normalize_platform(path: &str, style: PathStyle) -> String {
    match style {
        PathStyle::Posix => {
            let mut p = path.replace('\\', "/");
            // Drive letters have no meaning on a POSIX host.
            if p.len() >= 2 && p.as_bytes()[1] == b':' && p.as_bytes()[0].is_ascii_alphabetic() {
                p.drain(..2);
            }
            if !p.starts_with('/') {
                p.insert(0, '/');
            }
            collapse_slashes(&p)
        }
        PathStyle::Windows => {
            let mut p = path.replace('/', "\\");
            if p.len() >= 2 && p.as_bytes()[1] == b':' && p.as_bytes()[0].is_ascii_alphabetic() {
                let drive = p.as_bytes()[0].to_ascii_lowercase() as char;
                p.replace_range(..1, &drive.to_string());
            }
            p
        }
    }
}

fn collapse_slashes(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut prev_slash = false;
    for c in path.chars() {
        if c == '/' {
            if !prev_slash {
                out.push(c);
            }
            prev_slash = true;
        } else {
            out.push(c);
            prev_slash = false;
        }
    }
    out
}

/// Whether a path refers to a real local file, as opposed to a virtual
/// document (`output:`, `git:`, `untitled:` and friends).
pub fn is_local_file_path(path: &str) -> bool {
    if path.is_empty() {
        return false;
    }
    match path.find(':') {
        None => true,
        Some(idx) => {
            let scheme = &path[..idx];
            // A single letter before ':' is a Windows drive, not a scheme.
            scheme.len() == 1 && scheme.as_bytes()[0].is_ascii_alphabetic()
                || scheme.eq_ignore_ascii_case("file")
        }
    }
}

/// Handshake project-path match: case-insensitive, separator-insensitive,
/// and satisfied when either normalized path is a prefix of the other
/// (multi-root workspaces list a parent of the other side's root).
pub fn project_paths_match(a: &str, b: &str) -> bool {
    let na = normalize_for_match(a);
    let nb = normalize_for_match(b);
    if na.is_empty() || nb.is_empty() {
        return false;
    }
    na.starts_with(&nb) || nb.starts_with(&na)
}

fn normalize_for_match(path: &str) -> String {
    path.replace('\\', "/").to_lowercase().trim_end_matches('/').to_string()
}
