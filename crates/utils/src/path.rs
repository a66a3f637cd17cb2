use std::fmt::Display;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

/// Helper to format a path for display, quoting it in a shell-compatible
/// form if it contains whitespace or other special characters.
#[derive(Debug)]
pub struct PathQuotedDisplay<'a> {
    path: &'a Path,
}

impl<'a> PathQuotedDisplay<'a> {
    /// Create a display wrapper for anything path-like.
    pub fn new<P: AsRef<Path> + ?Sized>(path: &'a P) -> Self {
        Self {
            path: path.as_ref(),
        }
    }
}

impl Display for PathQuotedDisplay<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Ok(s) = std::str::from_utf8(self.path.as_os_str().as_bytes()) {
            if let Ok(quoted) = shlex::try_quote(s) {
                return f.write_str(&quoted);
            }
        }
        write!(f, "{:?}", self.path)
    }
}
