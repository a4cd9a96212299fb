//! Troubleshooting hints for connection failures and failed remote commands.
//!
//! Remote output has already been streamed by the time a command fails, so
//! the hints here are derived from the exit status and error text only and
//! never repeat that output.

/// Builds a connection error message with troubleshooting suggestions.
pub fn diagnose_connection_error(
    error: &str,
    host: &str,
    port: u16,
    ssh_key: Option<&str>,
) -> String {
    let error_lower = error.to_lowercase();
    let mut suggestions = Vec::new();

    if error_lower.contains("connection refused")
        || error_lower.contains("timed out")
        || error_lower.contains("no route to host")
        || error_lower.contains("failed to resolve")
    {
        suggestions.push(format!("• Verify the host '{}' is reachable", host));
        suggestions.push(format!(
            "• Check if SSH is running on port {} (try: ssh -p {} {})",
            port, port, host
        ));
        suggestions.push("• Verify your network connection and firewall settings".to_string());
    }

    if error_lower.contains("authentication")
        || error_lower.contains("permission denied")
        || error_lower.contains("publickey")
    {
        suggestions.push("• Verify your SSH key has correct permissions (chmod 600)".to_string());

        match ssh_key {
            Some(key) => {
                suggestions.push(format!("• Check that the SSH key exists: {}", key));
                suggestions.push(format!(
                    "• Verify the public key is in ~/.ssh/authorized_keys on {}",
                    host
                ));
            }
            None => {
                suggestions.push("• Try specifying an SSH key or password in the configuration".to_string());
                suggestions.push("• Verify your SSH agent is running (ssh-add -l)".to_string());
            }
        }
    }

    if error_lower.contains("handshake") {
        suggestions.push("• The server closed the connection during key exchange".to_string());
        suggestions.push(format!(
            "• Check that port {} on {} speaks SSH",
            port, host
        ));
    }

    if suggestions.is_empty() {
        suggestions.push("• Verify the remote host is accessible".to_string());
        suggestions.push(format!(
            "• Test the connection manually: ssh -p {} {}",
            port, host
        ));
    }

    format!(
        "{}\n\nTroubleshooting suggestions:\n{}",
        error,
        suggestions.join("\n")
    )
}

/// Returns a hint for well-known shell exit statuses of `program`.
pub fn diagnose_exit_status(exit_code: i32, program: &str, host: &str) -> Option<String> {
    match exit_code {
        126 => Some(format!(
            "'{}' is not executable on {}; check its permissions",
            program, host
        )),
        127 => Some(format!(
            "'{}' was not found on {}; check the interpreter path or activate its environment \
             with a pre-execution hook",
            program, host
        )),
        130 => Some("the remote command was interrupted (SIGINT)".to_string()),
        137 => Some(format!(
            "the remote command was killed (SIGKILL), possibly out of memory on {}",
            host
        )),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnose_connection_refused() {
        let diagnosis = diagnose_connection_error(
            "Failed to connect to example.com: connection refused",
            "example.com",
            22,
            None,
        );

        assert!(diagnosis.starts_with("Failed to connect to example.com"));
        assert!(diagnosis.contains("Verify the host 'example.com' is reachable"));
        assert!(diagnosis.contains("SSH is running on port 22"));
    }

    #[test]
    fn test_diagnose_authentication_failure() {
        let diagnosis = diagnose_connection_error(
            "SSH authentication failed for user alice",
            "example.com",
            22,
            Some("~/.ssh/id_rsa"),
        );

        assert!(diagnosis.contains("SSH key has correct permissions"));
        assert!(diagnosis.contains("~/.ssh/id_rsa"));
        assert!(diagnosis.contains("authorized_keys"));
    }

    #[test]
    fn test_diagnose_generic_error() {
        let diagnosis = diagnose_connection_error("weird", "example.com", 2222, None);
        assert!(diagnosis.contains("remote host is accessible"));
        assert!(diagnosis.contains("ssh -p 2222 example.com"));
    }

    #[test]
    fn test_diagnose_exit_status() {
        let hint = diagnose_exit_status(127, "python3", "box").unwrap();
        assert!(hint.contains("'python3' was not found on box"));

        let hint = diagnose_exit_status(126, "/opt/py", "box").unwrap();
        assert!(hint.contains("not executable"));

        assert!(diagnose_exit_status(1, "python", "box").is_none());
    }
}
