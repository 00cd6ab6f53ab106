//! # poppler-locate
//!
//! Find the [poppler](https://poppler.freedesktop.org/) `pdftoppm` binary so
//! callers can rasterise PDFs without asking users to fiddle with `PATH`.
//!
//! ## Search order
//!
//! 1. An explicit override: either the binary itself or the directory that
//!    contains it (the layout of a `POPPLER_PATH` setting).
//! 2. Common platform install locations (Homebrew, MacPorts, distro packages,
//!    the Windows release zips and scoop/conda layouts).
//! 3. Every directory of the supplied executable search path.
//!
//! The first existing, executable candidate wins. The crate never reads the
//! process environment on its own: callers pass the override and the search
//! path in, which keeps the lookup deterministic under test.
//!
//! ```rust,no_run
//! use poppler_locate::{locate_pdftoppm, probe_version};
//!
//! let path_var = std::env::var_os("PATH");
//! let bin = locate_pdftoppm(None, path_var.as_deref()).expect("pdftoppm unavailable");
//! println!("{} ({})", bin.display(), probe_version(&bin).unwrap_or_default());
//! ```

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;

// ── Public constants ─────────────────────────────────────────────────────────

/// File name of the rasterizer on the current platform.
#[cfg(windows)]
pub const PDFTOPPM: &str = "pdftoppm.exe";
/// File name of the rasterizer on the current platform.
#[cfg(not(windows))]
pub const PDFTOPPM: &str = "pdftoppm";

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors returned by poppler-locate operations.
#[derive(Error, Debug)]
pub enum LocateError {
    /// No candidate location held an executable `pdftoppm`.
    #[error(
        "pdftoppm not found (searched {} locations).\n\
Install poppler (apt install poppler-utils / brew install poppler /\n\
https://github.com/oschwartz10612/poppler-windows/releases) or point\n\
POPPLER_PATH at the directory containing pdftoppm.",
        .searched.len()
    )]
    NotFound { searched: Vec<PathBuf> },

    /// The binary exists but could not be executed.
    #[error("Failed to run '{path}': {reason}")]
    Probe { path: PathBuf, reason: String },
}

// ── Platform install locations ───────────────────────────────────────────────

/// Directories where poppler is commonly installed on this platform.
///
/// Returned in priority order; entries need not exist.
pub fn platform_dirs() -> Vec<PathBuf> {
    let mut dirs_out: Vec<PathBuf> = Vec::new();

    match std::env::consts::OS {
        "windows" => {
            for d in [
                r"C:\Program Files\poppler-25.07.0\Library\bin",
                r"C:\Program Files\poppler\Library\bin",
                r"C:\Program Files\poppler\bin",
                r"C:\poppler\Library\bin",
                r"C:\Program Files (x86)\poppler\Library\bin",
            ] {
                dirs_out.push(PathBuf::from(d));
            }
            if let Some(home) = dirs::home_dir() {
                dirs_out.push(home.join(r"scoop\apps\poppler\current\Library\bin"));
                dirs_out.push(home.join(r"miniconda3\Library\bin"));
                dirs_out.push(home.join(r"anaconda3\Library\bin"));
            }
        }
        "macos" => {
            for d in ["/opt/homebrew/bin", "/usr/local/bin", "/opt/local/bin"] {
                dirs_out.push(PathBuf::from(d));
            }
        }
        _ => {
            for d in ["/usr/bin", "/usr/local/bin", "/snap/bin"] {
                dirs_out.push(PathBuf::from(d));
            }
            if let Some(home) = dirs::home_dir() {
                dirs_out.push(home.join(".local/bin"));
            }
        }
    }

    dirs_out
}

// ── Public API ───────────────────────────────────────────────────────────────

/// Locate `pdftoppm` using the standard search order.
///
/// `override_path` may name the binary itself or its directory. `path_var`
/// is the raw executable search path (the value of `PATH`), if any.
pub fn locate_pdftoppm(
    override_path: Option<&Path>,
    path_var: Option<&OsStr>,
) -> Result<PathBuf, LocateError> {
    locate_in(override_path, &platform_dirs(), path_var)
}

/// Locate `pdftoppm` against an explicit list of platform directories.
///
/// Exposed separately from [`locate_pdftoppm`] so the search order can be
/// exercised without depending on the host's real install layout.
pub fn locate_in(
    override_path: Option<&Path>,
    platform: &[PathBuf],
    path_var: Option<&OsStr>,
) -> Result<PathBuf, LocateError> {
    let mut searched = Vec::new();

    // 1. Explicit override.
    if let Some(p) = override_path {
        let candidate = if p.is_dir() { p.join(PDFTOPPM) } else { p.to_path_buf() };
        if is_executable(&candidate) {
            return Ok(candidate);
        }
        // A stale override falls through to the remaining locations.
        searched.push(candidate);
    }

    // 2. Platform install locations.
    for dir in platform {
        let candidate = dir.join(PDFTOPPM);
        if is_executable(&candidate) {
            return Ok(candidate);
        }
        searched.push(candidate);
    }

    // 3. Executable search path.
    if let Some(var) = path_var {
        for dir in std::env::split_paths(var) {
            if dir.as_os_str().is_empty() {
                continue;
            }
            let candidate = dir.join(PDFTOPPM);
            if is_executable(&candidate) {
                return Ok(candidate);
            }
            searched.push(candidate);
        }
    }

    Err(LocateError::NotFound { searched })
}

/// Run `pdftoppm -v` and return the first line of its banner.
///
/// poppler prints the version to stderr; some older builds exit non-zero
/// for `-v`, so only a failure to spawn counts as an error.
pub fn probe_version(bin: &Path) -> Result<String, LocateError> {
    let output = Command::new(bin)
        .arg("-v")
        .output()
        .map_err(|e| LocateError::Probe {
            path: bin.to_path_buf(),
            reason: e.to_string(),
        })?;

    let banner = if output.stderr.is_empty() {
        String::from_utf8_lossy(&output.stdout).into_owned()
    } else {
        String::from_utf8_lossy(&output.stderr).into_owned()
    };

    Ok(banner.lines().next().unwrap_or("").trim().to_string())
}

// ── Internal helpers ─────────────────────────────────────────────────────────

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
