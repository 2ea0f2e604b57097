const SUDO_PREFIX: &str = "sudo ";

/// Rewrites a command starting with `sudo ` so sudo reads the password from stdin.
///
/// Commands without the prefix, or calls without a password, are returned as is.
pub fn wrap_sudo(command: &str, password: Option<&str>) -> String {
    let trimmed = command.trim_start();
    match (trimmed.strip_prefix(SUDO_PREFIX), password) {
        (Some(rest), Some(password)) => {
            let escaped = password.replace('\'', "'\"'\"'");
            format!("echo '{escaped}' | sudo -S {}", rest.trim_start())
        }
        _ => command.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::wrap_sudo;
    use test_case::test_case;

    #[test_case("sudo systemctl stop pg", Some("pw"), "echo 'pw' | sudo -S systemctl stop pg"; "plain password")]
    #[test_case("  sudo -u postgres psql", Some("pw"), "echo 'pw' | sudo -S -u postgres psql"; "leading whitespace")]
    #[test_case("sudo ls", Some("it's"), "echo 'it'\"'\"'s' | sudo -S ls"; "single quote escaped")]
    #[test_case("sudo ls", None, "sudo ls"; "no password keeps command")]
    #[test_case("ls /tmp", Some("pw"), "ls /tmp"; "no sudo prefix")]
    #[test_case("sudoers-check", Some("pw"), "sudoers-check"; "prefix must be a word")]
    fn wraps_sudo_commands(command: &str, password: Option<&str>, expected: &str) {
        assert_eq!(wrap_sudo(command, password), expected);
    }
}
