//! Diagnostic target resolution
//!
//! Maps the `collect` command's `--pid` / `--diagnostic-port` arguments to
//! the socket path of the runtime's diagnostic channel. Fails fast, before
//! any session resource is acquired.

use std::path::PathBuf;

use crate::domain::TargetError;

/// Resolve the diagnostic socket to attach to.
///
/// Exactly one of `pid` and `port` must be supplied. A pid maps to the
/// runtime's default socket location under the system temp directory.
///
/// # Errors
///
/// [`TargetError`] when neither or both are given, or the port string is
/// unusable.
pub fn resolve_diagnostic_socket(
    pid: Option<i32>,
    port: Option<&str>,
) -> Result<PathBuf, TargetError> {
    match (pid, port) {
        (None, None) => Err(TargetError::Missing),
        (Some(_), Some(_)) => Err(TargetError::Ambiguous),
        (Some(pid), None) => {
            if pid <= 0 {
                return Err(TargetError::InvalidPort {
                    path: pid.to_string(),
                    reason: "process id must be positive".to_string(),
                });
            }
            Ok(std::env::temp_dir().join(format!("dotnet-diagnostic-{pid}")))
        }
        (None, Some(port)) => {
            let trimmed = port.trim();
            if trimmed.is_empty() {
                return Err(TargetError::InvalidPort {
                    path: port.to_string(),
                    reason: "empty path".to_string(),
                });
            }
            Ok(PathBuf::from(trimmed))
        }
    }
}
