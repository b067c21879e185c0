//! Host name lookup.

use std::process::Command;

/// Runs `hostname` with the given arguments and returns its trimmed output.
fn run_hostname(args: &[&str]) -> Option<String> {
    Command::new("hostname")
        .args(args)
        .output()
        .ok()
        .and_then(|out| {
            if out.status.success() {
                String::from_utf8(out.stdout)
                    .ok()
                    .map(|s| s.trim().to_string())
            } else {
                None
            }
        })
        .filter(|s| !s.is_empty())
}

/// Returns the short host name, or an empty string if it cannot be found.
pub fn hostname() -> String {
    run_hostname(&[])
        .or_else(|| {
            std::fs::read_to_string("/proc/sys/kernel/hostname")
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
        .unwrap_or_default()
}

/// Returns the fully-qualified host name, falling back to [`hostname`].
pub fn fqdn() -> String {
    run_hostname(&["-f"]).unwrap_or_else(hostname)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hostname_has_no_whitespace() {
        let name = hostname();
        assert_eq!(name, name.trim());
        assert!(!name.contains('\n'));
    }

    #[test]
    fn test_fqdn_is_never_empty_when_hostname_is_known() {
        if !hostname().is_empty() {
            assert!(!fqdn().is_empty());
        }
    }
}
