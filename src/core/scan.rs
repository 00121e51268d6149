//! core::scan
//!
//! Directory walk feeding the [`TreeBuilder`].
//!
//! The walk is top-down and visits `<project>/<root label>` and every
//! directory beneath it, handing each directory's path (relative to the
//! project, slash-delimited), subdirectory names and file names to
//! [`TreeBuilder::add_node`]. Entries are visited in file-name order so the
//! resulting tree does not depend on the platform's directory order.
//!
//! Symlinks are followed, both by the walk and when classifying a
//! directory's entries; a link cycle is reported as [`ScanError::Walk`].

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

use super::naming::NamingConvention;
use super::tree::{InheritanceTree, TreeBuilder, TreeError};

/// Errors from scanning the project directory.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("image tree root '{0}' is not a directory")]
    MissingRoot(PathBuf),

    #[error("failed to walk '{path}': {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("failed to read directory '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("path is not valid UTF-8: {0}")]
    NonUtf8(PathBuf),

    #[error("'{0}' is outside the project directory")]
    OutsideProject(PathBuf),

    #[error(transparent)]
    Tree(#[from] TreeError),
}

/// Walk `<project_dir>/<root label>` and build the inheritance tree.
///
/// # Errors
///
/// Returns `ScanError::MissingRoot` if the root directory does not exist,
/// and `ScanError::Tree` if any directory violates the layout convention
/// (notably a malformed provisioner file name).
pub fn scan_tree(
    project_dir: &Path,
    naming: &NamingConvention,
) -> Result<InheritanceTree, ScanError> {
    let root_dir = project_dir.join(&naming.root_label);
    if !root_dir.is_dir() {
        return Err(ScanError::MissingRoot(root_dir));
    }

    let mut builder = TreeBuilder::new(naming.clone());
    let walker = WalkDir::new(&root_dir)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry
                .file_name()
                .to_str()
                .map_or(true, |name| !naming.is_ignored(name))
        });

    for entry in walker {
        let entry = entry.map_err(|source| ScanError::Walk {
            path: root_dir.clone(),
            source,
        })?;
        if !entry.file_type().is_dir() {
            continue;
        }

        let path = relative_label_path(project_dir, entry.path())?;
        let (dirs, files) = list_dir(entry.path())?;
        debug!(path = %path, dirs = dirs.len(), files = files.len(), "scanned directory");
        builder.add_node(&path, &dirs, &files)?;
    }

    Ok(builder.finish())
}

/// `<project>/ami/base` -> `"ami/base"`.
fn relative_label_path(project_dir: &Path, path: &Path) -> Result<String, ScanError> {
    let relative = path
        .strip_prefix(project_dir)
        .map_err(|_| ScanError::OutsideProject(path.to_path_buf()))?;

    relative
        .components()
        .map(|component| {
            component
                .as_os_str()
                .to_str()
                .ok_or_else(|| ScanError::NonUtf8(path.to_path_buf()))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(|labels| labels.join("/"))
}

/// Split a directory's entries into sorted subdirectory and file names.
fn list_dir(dir: &Path) -> Result<(Vec<String>, Vec<String>), ScanError> {
    let io_error = |source| ScanError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut dirs = Vec::new();
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_error)? {
        let entry = entry.map_err(io_error)?;
        let name = entry
            .file_name()
            .into_string()
            .map_err(|_| ScanError::NonUtf8(entry.path()))?;
        // Follows links, matching the walker.
        if entry.path().is_dir() {
            dirs.push(name);
        } else {
            files.push(name);
        }
    }
    dirs.sort();
    files.sort();
    Ok((dirs, files))
}
