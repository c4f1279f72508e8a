// This module finishes a build: one last run of the clean script (which removes the
// generator's scratch files but keeps lib/), a recursive copy of the build directory's lib/
// into <install>/lib, and the sanity check. The sanity check looks at the filesystem only,
// never at the in-process variant results, because the build scripts run as separate
// processes and the libraries they leave behind are what counts. One static library is
// expected per requested representation, named libsmm_<letter><transpose>.a.

//! Installation and sanity checking.

use crate::core::{BuildError, BuildResult, CommandRunner};
use crate::planner::{Representation, TransposeFlavor};
use crate::runner::BuildLayout;
use std::fs;
use std::path::{Path, PathBuf};

/// Library file name for one representation, e.g. `libsmm_dnn.a`.
pub fn artifact_name(representation: Representation, flavor: TransposeFlavor) -> String {
    format!("libsmm_{}.a", representation.tag(flavor))
}

/// Paths, relative to the install root, that a complete install contains.
pub fn expected_artifacts(representations: &[Representation], flavor: TransposeFlavor) -> Vec<String> {
    let mut paths: Vec<String> = Vec::new();
    for &repr in representations {
        let path = format!("lib/{}", artifact_name(repr, flavor));
        if !paths.contains(&path) {
            paths.push(path);
        }
    }
    paths
}

/// Clean the build directory and copy its `lib/` to `destination_root/lib`.
pub fn install(
    layout: &BuildLayout,
    runner: &mut dyn CommandRunner,
    destination_root: &Path,
) -> BuildResult<()> {
    layout.clean(runner);

    let source = layout.output_lib_dir();
    if !source.is_dir() {
        return Err(BuildError::Install {
            reason: format!("build produced no library directory at {}", source.display()),
        });
    }

    let target = destination_root.join("lib");
    let copied = copy_tree(&source, &target).map_err(|e| BuildError::Install {
        reason: format!(
            "copying {} to {} failed: {}",
            source.display(),
            target.display(),
            e
        ),
    })?;

    log::info!("Installed {} file(s) into {}", copied, target.display());
    Ok(())
}

/// Check that every expected library exists under `destination_root`.
pub fn verify(
    destination_root: &Path,
    representations: &[Representation],
    flavor: TransposeFlavor,
) -> BuildResult<()> {
    let missing = missing_artifacts(destination_root, representations, flavor);
    if missing.is_empty() {
        log::info!("Sanity check passed for {}", destination_root.display());
        Ok(())
    } else {
        Err(BuildError::Verification { missing })
    }
}

/// Expected artifacts that are not regular files under `destination_root`.
pub fn missing_artifacts(
    destination_root: &Path,
    representations: &[Representation],
    flavor: TransposeFlavor,
) -> Vec<String> {
    expected_artifacts(representations, flavor)
        .into_iter()
        .filter(|rel| !destination_root.join(rel).is_file())
        .collect()
}

/// Recursively copy `src` into `dst`, creating `dst`. Returns the number of files copied.
fn copy_tree(src: &Path, dst: &Path) -> BuildResult<usize> {
    fs::create_dir_all(dst).map_err(|e| BuildError::io(dst, e))?;

    let mut copied = 0;
    let entries = fs::read_dir(src).map_err(|e| BuildError::io(src, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| BuildError::io(src, e))?;
        let from = entry.path();
        let to: PathBuf = dst.join(entry.file_name());
        // Follows symlinks, so a linked directory is copied as a directory.
        let metadata = fs::metadata(&from).map_err(|e| BuildError::io(&from, e))?;

        if metadata.is_dir() {
            copied += copy_tree(&from, &to)?;
        } else {
            fs::copy(&from, &to).map_err(|e| BuildError::io(&from, e))?;
            copied += 1;
        }
    }
    Ok(copied)
}
