//! `Basic user password...` credential splitting.

/// Username and password handed to the transport for Basic encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    pub username: String,
    pub password: String,
}

/// Splits `Basic <user> <password words...>` arguments.
///
/// The password is every remaining argument joined with a space. When the
/// first argument itself holds a colon, everything after the first colon
/// starts the password (so passwords may contain colons), followed by the
/// remaining arguments.
pub fn split_credentials(user: &str, rest: &[&str]) -> BasicCredentials {
    match user.split_once(':') {
        Some((username, password_head)) => {
            let mut parts = vec![password_head];
            parts.extend_from_slice(rest);
            BasicCredentials {
                username: username.to_string(),
                password: parts.join(" "),
            }
        }
        None => BasicCredentials {
            username: user.to_string(),
            password: rest.join(" "),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_user_and_password() {
        let creds = split_credentials("alice", &["secret"]);
        assert_eq!(creds.username, "alice");
        assert_eq!(creds.password, "secret");
    }

    #[test]
    fn test_password_with_spaces() {
        let creds = split_credentials("alice", &["correct", "horse", "battery"]);
        assert_eq!(creds.password, "correct horse battery");
    }

    #[test]
    fn test_colon_in_user_starts_password() {
        let creds = split_credentials("alice:pw:with:colons", &["extra"]);
        assert_eq!(creds.username, "alice");
        assert_eq!(creds.password, "pw:with:colons extra");
    }

    #[test]
    fn test_trailing_colon_gives_leading_space() {
        let creds = split_credentials("alice:", &["pw"]);
        assert_eq!(creds.username, "alice");
        assert_eq!(creds.password, " pw");
    }
}
