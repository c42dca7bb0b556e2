use anyhow::Result;
use regex::Regex;
use std::path::Path;
use tokio::fs;

/// Asynchronously ensures that a directory exists, creating it if it does not.
/// This function is idempotent.
pub async fn ensure_directory_exists<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    if !path.exists() {
        if let Err(e) = fs::create_dir_all(path).await {
            eprintln!("Failed to create directory at {:?}: {}", path, e);
            return Err(e.into());
        }
        eprintln!("Created directory at: {:?}", path);
    }
    Ok(())
}

/// Extracts a MAC-style address from a platform device identifier and
/// normalizes it to uppercase `AA:BB:CC:DD:EE:FF` form.
///
/// Platform identifiers differ wildly (a bare MAC, a path-like string with
/// the MAC embedded, an opaque GUID on macOS); the last MAC-looking run in
/// the string wins. Returns `None` when no MAC is present, in which case the
/// raw identifier has to be used as-is.
pub fn normalize_address(device_id_str: &str) -> Option<String> {
    let re = Regex::new(r"([0-9A-Fa-f]{2}[:-]){5}([0-9A-Fa-f]{2})").ok()?;
    re.find_iter(device_id_str)
        .last()
        .map(|m| m.as_str().to_uppercase().replace('-', ":"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_mac_is_uppercased() {
        assert_eq!(
            normalize_address("e8:6f:38:a2:00:1b").as_deref(),
            Some("E8:6F:38:A2:00:1B")
        );
    }

    #[test]
    fn embedded_mac_is_extracted() {
        assert_eq!(
            normalize_address("/org/bluez/hci0/dev_E8_6F_38_A2_00_1B with E8-6F-38-A2-00-1B").as_deref(),
            Some("E8:6F:38:A2:00:1B")
        );
    }

    #[test]
    fn dashes_are_rewritten_to_colons() {
        assert_eq!(
            normalize_address("e8-6f-38-a2-00-1b").as_deref(),
            Some("E8:6F:38:A2:00:1B")
        );
    }

    #[test]
    fn opaque_identifiers_yield_none() {
        assert_eq!(normalize_address("6BD3C3F5-3AC1-4A5B-BB4B"), None);
    }
}
