//! Installed-browser discovery
//!
//! A filesystem lookup over an ordered, platform-specific list of Chromium-family
//! executables. The first path that exists wins.

use std::path::{Path, PathBuf};

/// Environment variable that overrides the candidate list
pub const BROWSER_ENV_VAR: &str = "CHROME_EXECUTABLE";

/// Candidate executable paths for this platform, in preference order
pub fn candidate_paths() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    #[cfg(target_os = "windows")]
    {
        let pf = std::env::var("PROGRAMFILES").unwrap_or_else(|_| r"C:\Program Files".to_string());
        let pf86 = std::env::var("PROGRAMFILES(X86)")
            .unwrap_or_else(|_| r"C:\Program Files (x86)".to_string());
        let local = std::env::var("LOCALAPPDATA").unwrap_or_default();

        candidates.push(Path::new(&pf).join(r"Google\Chrome\Application\chrome.exe"));
        candidates.push(Path::new(&pf86).join(r"Google\Chrome\Application\chrome.exe"));
        if !local.is_empty() {
            candidates.push(Path::new(&local).join(r"Google\Chrome\Application\chrome.exe"));
        }
        candidates.push(Path::new(&pf).join(r"Microsoft\Edge\Application\msedge.exe"));
        candidates.push(Path::new(&pf86).join(r"Microsoft\Edge\Application\msedge.exe"));
    }

    #[cfg(target_os = "macos")]
    {
        for p in [
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
        ] {
            candidates.push(PathBuf::from(p));
        }
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        for p in [
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/chromium-browser",
            "/usr/bin/chromium",
            "/usr/bin/microsoft-edge",
        ] {
            candidates.push(PathBuf::from(p));
        }
    }

    candidates
}

/// First existing path among `candidates`
pub fn first_existing<I, P>(candidates: I) -> Option<PathBuf>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    candidates
        .into_iter()
        .map(|p| p.as_ref().to_path_buf())
        .find(|p| p.is_file())
}

/// Locate a browser executable.
///
/// Order: explicit `preferred` path, then `CHROME_EXECUTABLE`, then the
/// platform candidate list.
pub fn find_browser(preferred: Option<&Path>) -> Option<PathBuf> {
    let mut ordered: Vec<PathBuf> = Vec::new();
    if let Some(p) = preferred {
        ordered.push(p.to_path_buf());
    }
    if let Ok(p) = std::env::var(BROWSER_ENV_VAR) {
        if !p.is_empty() {
            ordered.push(PathBuf::from(p));
        }
    }
    ordered.extend(candidate_paths());
    first_existing(ordered)
}
