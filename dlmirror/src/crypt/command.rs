//! External decrypter process (`honoka2`, `libhonoka`, `HonokaMiku`).

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;

use super::DecryptProvider;
use crate::error::{MirrorError, MirrorResult};

/// Executables tried on `PATH`, in order. All accept the same options.
pub const DECRYPTER_EXECUTABLES: [&str; 3] = ["honoka2", "libhonoka", "HonokaMiku"];

/// Runs `<exe> -b <basename> - -`, streaming the data through stdin and
/// stdout.
#[derive(Debug, Clone)]
pub struct CommandDecrypter {
    executable: Option<PathBuf>,
}

impl CommandDecrypter {
    /// Look for a known decrypter on `PATH`.
    pub fn discover() -> Self {
        let executable = DECRYPTER_EXECUTABLES
            .iter()
            .find_map(|name| which::which(name).ok());
        if let Some(path) = &executable {
            tracing::debug!(path = %path.display(), "Found decrypter executable");
        }
        Self { executable }
    }

    pub fn with_executable(executable: Option<PathBuf>) -> Self {
        Self { executable }
    }
}

impl DecryptProvider for CommandDecrypter {
    fn name(&self) -> &str {
        "libhonoka"
    }

    fn available(&self) -> bool {
        self.executable.is_some()
    }

    fn decrypt(&self, basename: &str, data: &[u8]) -> MirrorResult<Vec<u8>> {
        let failed = |reason: String| MirrorError::Decrypt {
            name: basename.to_string(),
            reason,
        };
        let executable = self
            .executable
            .as_ref()
            .ok_or_else(|| failed("no decrypter executable".to_string()))?;

        let mut child = Command::new(executable)
            .args(["-b", basename, "-", "-"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| failed(format!("failed to start {}: {}", executable.display(), e)))?;

        // Feed stdin from another thread so a full stdout pipe cannot
        // deadlock the child.
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| failed("stdin not captured".to_string()))?;
        let input = data.to_vec();
        let writer = thread::spawn(move || stdin.write_all(&input));

        let output = child
            .wait_with_output()
            .map_err(|e| failed(e.to_string()))?;
        let written = writer
            .join()
            .map_err(|_| failed("stdin writer panicked".to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(failed(format!(
                "decrypter exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        written.map_err(|e| failed(format!("failed to write input: {}", e)))?;
        Ok(output.stdout)
    }
}
