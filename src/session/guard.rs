use crate::models::Session;

pub const SIGN_IN_PATH: &str = "/signin";
pub const CHECKING_MESSAGE: &str = "Checking your session";

/// What a protected surface should show for the current session state.
#[derive(Debug, PartialEq)]
pub enum GuardOutcome<'a> {
    /// Session verification has not finished yet.
    Checking,
    /// No session: send the user to sign in, remembering where they came from.
    Redirect { to: &'static str, from: String },
    Allow(&'a Session),
}

pub fn guard<'a>(session: Option<&'a Session>, loading: bool, from: &str) -> GuardOutcome<'a> {
    if loading {
        return GuardOutcome::Checking;
    }
    match session.filter(|s| s.is_valid()) {
        Some(session) => GuardOutcome::Allow(session),
        None => GuardOutcome::Redirect {
            to: SIGN_IN_PATH,
            from: from.to_string(),
        },
    }
}

impl GuardOutcome<'_> {
    /// Redirect target carrying the origin as a query parameter.
    pub fn redirect_location(&self) -> Option<String> {
        match self {
            Self::Redirect { to, from } => {
                let mut url = format!("{}?from=", to);
                for b in from.bytes() {
                    match b {
                        b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                            url.push(b as char)
                        }
                        _ => url.push_str(&format!("%{:02X}", b)),
                    }
                }
                Some(url)
            }
            _ => None,
        }
    }
}
