//! Clipboard pickup for tokens handed off by the token-request page.
//!
//! Platform integration:
//! - Native clipboard via arboard where available
//! - Linux: `xclip` or `xsel`
//! - macOS: `pbpaste`

use arboard::Clipboard;
use std::process::Command;

use super::Credential;
use crate::error::{ExploreError, Result};

/// Clipboard backend used for reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipboardBackend {
    /// Native clipboard via arboard.
    Arboard,
    /// Linux: xclip command.
    Xclip,
    /// Linux: xsel command.
    Xsel,
    /// macOS: pbpaste command.
    Pbpaste,
}

/// Backends to try, most preferred first.
fn candidate_backends() -> Vec<ClipboardBackend> {
    let mut backends = vec![ClipboardBackend::Arboard];
    if cfg!(target_os = "linux") {
        backends.push(ClipboardBackend::Xclip);
        backends.push(ClipboardBackend::Xsel);
    }
    if cfg!(target_os = "macos") {
        backends.push(ClipboardBackend::Pbpaste);
    }
    backends
}

/// Reads the clipboard text with the first backend that works.
pub fn paste() -> Result<String> {
    let mut last_error = None;
    for backend in candidate_backends() {
        match paste_with(backend) {
            Ok(text) => return Ok(text),
            Err(e) => {
                tracing::debug!("Clipboard backend {:?} failed: {}", backend, e);
                last_error = Some(e);
            }
        }
    }
    Err(last_error.unwrap_or_else(|| ExploreError::auth("No clipboard backend available")))
}

/// Reads a credential from the clipboard.
pub fn credential_from_clipboard() -> Result<Credential> {
    token_from_text(&paste()?)
}

/// Trims pasted text into a credential; blank text is an error.
fn token_from_text(text: &str) -> Result<Credential> {
    let token = text.trim();
    if token.is_empty() {
        return Err(ExploreError::auth("The clipboard does not contain a token"));
    }
    Ok(Credential::new(token))
}

fn paste_with(backend: ClipboardBackend) -> Result<String> {
    match backend {
        ClipboardBackend::Arboard => Clipboard::new()
            .and_then(|mut clipboard| clipboard.get_text())
            .map_err(|e| ExploreError::auth(format!("Failed to read clipboard: {e}"))),
        ClipboardBackend::Xclip => run_paste_command("xclip", &["-selection", "clipboard", "-o"]),
        ClipboardBackend::Xsel => run_paste_command("xsel", &["--clipboard", "--output"]),
        ClipboardBackend::Pbpaste => run_paste_command("pbpaste", &[]),
    }
}

fn run_paste_command(program: &str, args: &[&str]) -> Result<String> {
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| ExploreError::auth(format!("Failed to run {program}: {e}")))?;

    if output.status.success() {
        String::from_utf8(output.stdout)
            .map_err(|e| ExploreError::auth(format!("Invalid UTF-8 from {program}: {e}")))
    } else {
        Err(ExploreError::auth(format!("{program} returned error")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arboard_is_tried_first() {
        assert_eq!(candidate_backends()[0], ClipboardBackend::Arboard);
    }

    #[test]
    fn test_pasted_text_is_trimmed() {
        assert_eq!(token_from_text("  tok\n").unwrap().expose(), "tok");
        assert!(token_from_text(" \n").is_err());
    }

    #[test]
    fn test_missing_command_is_an_auth_error() {
        let err = run_paste_command("duck-explore-no-such-binary", &[]).unwrap_err();
        assert_eq!(err.category(), "Authentication Error");
    }
}
