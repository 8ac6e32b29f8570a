//! Binding to the pdfium shared library.
//!
//! pdfium ships as a prebuilt dynamic library (libpdfium.so / .dylib /
//! pdfium.dll). Lookup order:
//!
//! 1. `PDFIUM_LIB_PATH`: a library file, or a directory containing one.
//! 2. The current working directory.
//! 3. The system library search path.
//!
//! The first location that binds is remembered for the rest of the process so
//! later documents skip the probing.

use crate::error::Pdf2PngError;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::debug;

/// Environment variable naming an explicit pdfium library.
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// Where the library was found the first time a bind succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Location {
    File(PathBuf),
    System,
}

static RESOLVED: OnceLock<Location> = OnceLock::new();

/// Bind to pdfium, returning a ready-to-use [`Pdfium`] instance.
///
/// Must be called on the thread that will use the instance; the render stage
/// calls it from inside `spawn_blocking`.
pub fn bind() -> Result<Pdfium, Pdf2PngError> {
    if let Some(location) = RESOLVED.get() {
        return bind_location(location).map(Pdfium::new);
    }

    let mut failures = Vec::new();
    for location in candidates() {
        match bind_location(&location) {
            Ok(bindings) => {
                debug!("Bound pdfium: {:?}", location);
                let _ = RESOLVED.set(location);
                return Ok(Pdfium::new(bindings));
            }
            Err(e) => failures.push(format!("{location:?}: {e}")),
        }
    }

    Err(Pdf2PngError::PdfiumBindingFailed(failures.join("; ")))
}

/// Returns `true` when a pdfium library can be bound.
pub fn is_available() -> bool {
    bind().is_ok()
}

fn bind_location(location: &Location) -> Result<Box<dyn PdfiumLibraryBindings>, Pdf2PngError> {
    let result = match location {
        Location::File(path) => Pdfium::bind_to_library(path),
        Location::System => Pdfium::bind_to_system_library(),
    };
    result.map_err(|e| Pdf2PngError::PdfiumBindingFailed(e.to_string()))
}

fn candidates() -> Vec<Location> {
    let mut out = Vec::with_capacity(3);
    if let Ok(env_path) = std::env::var(PDFIUM_LIB_PATH_ENV) {
        if !env_path.trim().is_empty() {
            out.push(Location::File(library_file(Path::new(env_path.trim()))));
        }
    }
    out.push(Location::File(library_file(Path::new("./"))));
    out.push(Location::System);
    out
}

/// Accept either a library file or a directory that contains one.
fn library_file(path: &Path) -> PathBuf {
    if path.is_dir() {
        Pdfium::pdfium_platform_library_name_at_path(path)
    } else {
        path.to_path_buf()
    }
}
