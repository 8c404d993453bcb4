//! Platform detection
//!
//! The platform key selects which instruction a step uses: `darwin` on
//! macOS, the os-release `ID` on Linux (`fedora`, `ubuntu`, ...).

const OS_RELEASE: &str = "/etc/os-release";

/// Detect the platform key for this machine
pub fn detect() -> String {
    match std::env::consts::OS {
        "macos" => "darwin".to_string(),
        "linux" => std::fs::read_to_string(OS_RELEASE)
            .ok()
            .and_then(|content| os_release_id(&content))
            .unwrap_or_else(|| {
                log::debug!("no ID in {OS_RELEASE}, using generic linux");
                "linux".to_string()
            }),
        other => other.to_string(),
    }
}

/// Extract the `ID=` value from os-release content
fn os_release_id(content: &str) -> Option<String> {
    content
        .lines()
        .filter_map(|line| line.trim().strip_prefix("ID="))
        .map(|value| value.trim().trim_matches(|c| c == '"' || c == '\'').to_string())
        .find(|id| !id.is_empty())
}
