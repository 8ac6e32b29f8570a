//! OCR via the tesseract command-line tool.
//!
//! Tesseract is driven as an external process (`tesseract <img> stdout -l
//! <lang> --psm <n>`) rather than linked, so a missing binary only disables
//! OCR instead of breaking the build. Calls run on `tokio::process` with a
//! per-page timeout; the child is killed if the timeout fires.

use crate::config::OcrConfig;
use crate::error::PageError;
use std::ffi::OsString;
use std::io::Write;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// A configured tesseract invocation.
#[derive(Debug, Clone)]
pub struct OcrEngine {
    config: OcrConfig,
}

impl OcrEngine {
    pub fn new(config: OcrConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OcrConfig {
        &self.config
    }

    /// Command-line arguments for recognising `image_path` to stdout.
    pub fn build_args(&self, image_path: &Path) -> Vec<OsString> {
        vec![
            image_path.as_os_str().to_owned(),
            "stdout".into(),
            "-l".into(),
            self.config.language.clone().into(),
            "--psm".into(),
            self.config.psm.to_string().into(),
        ]
    }

    /// Recognise the text of one page from its PNG bytes.
    ///
    /// The returned text is raw tesseract output; callers run it through
    /// [`crate::pipeline::text::clean_text`].
    pub async fn recognize_png(&self, png: &[u8], page_num: usize) -> Result<String, PageError> {
        let fail = |detail: String| PageError::OcrFailed {
            page: page_num,
            detail,
        };
        let start = Instant::now();

        let mut tmp = tempfile::Builder::new()
            .prefix("pdf2png-ocr-")
            .suffix(".png")
            .tempfile()
            .map_err(|e| fail(format!("temp file: {e}")))?;
        tmp.write_all(png)
            .and_then(|_| tmp.flush())
            .map_err(|e| fail(format!("temp file write: {e}")))?;

        let mut cmd = Command::new(&self.config.binary);
        cmd.args(self.build_args(tmp.path()))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(
            "Running {} on page {} (lang={}, psm={})",
            self.config.binary, page_num, self.config.language, self.config.psm
        );

        let timeout = Duration::from_secs(self.config.timeout_secs.max(1));
        let output = match tokio::time::timeout(timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(fail(format!("could not run '{}': {e}", self.config.binary))),
            Err(_) => return Err(fail(format!("timed out after {}s", timeout.as_secs()))),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(fail(format!(
                "tesseract exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!(
            "OCR page {} → {} chars in {}ms",
            page_num,
            text.len(),
            start.elapsed().as_millis()
        );
        Ok(text)
    }
}

/// How long `tesseract --version` may take before OCR is considered unavailable.
pub const VERSION_TIMEOUT: Duration = Duration::from_secs(10);

/// Run `<binary> --version` and return the reported version, if any.
pub async fn detect_version(binary: &str) -> Option<String> {
    detect_version_within(binary, VERSION_TIMEOUT).await
}

/// [`detect_version`] with an explicit deadline. A binary that hangs is
/// killed and treated as missing.
pub async fn detect_version_within(binary: &str, timeout: Duration) -> Option<String> {
    let mut cmd = Command::new(binary);
    cmd.arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(output) => output,
        Err(_) => {
            warn!(
                "'{} --version' did not answer within {}ms; OCR disabled",
                binary,
                timeout.as_millis()
            );
            return None;
        }
    };

    match output {
        Ok(out) if out.status.success() => {
            // Older releases print the banner on stderr.
            let stdout = String::from_utf8_lossy(&out.stdout);
            let stderr = String::from_utf8_lossy(&out.stderr);
            let version = parse_version(&stdout).or_else(|| parse_version(&stderr));
            if let Some(ref v) = version {
                info!("Found tesseract {}", v);
            }
            version
        }
        Ok(out) => {
            warn!("'{} --version' exited with {}", binary, out.status);
            None
        }
        Err(e) => {
            warn!("tesseract not available ('{}'): {}", binary, e);
            None
        }
    }
}

/// Extract the version from the first line of `tesseract --version`.
fn parse_version(banner: &str) -> Option<String> {
    let first = banner.lines().next()?.trim();
    let version = first.strip_prefix("tesseract")?.trim();
    let version = version.strip_prefix('v').unwrap_or(version);
    if version.is_empty() {
        None
    } else {
        Some(version.to_string())
    }
}

/// Write an executable shell script standing in for tesseract.
#[cfg(all(test, unix))]
pub(crate) fn fake_tesseract(dir: &Path, body: &str) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("tesseract");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}
