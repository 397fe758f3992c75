//! Command tokens and the per-state command sets

use std::str::FromStr;

/// A request a client can issue between messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    SignUp,
    SignIn,
    SignOut,
    Casual,
    Competitive,
    Profile,
    Leaderboard,
    Help,
}

/// Commands accepted before authentication
pub const PRE_AUTH_COMMANDS: &[Command] = &[Command::SignUp, Command::SignIn];

/// Commands accepted after authentication
pub const POST_AUTH_COMMANDS: &[Command] = &[
    Command::Profile,
    Command::Leaderboard,
    Command::Casual,
    Command::Competitive,
    Command::SignOut,
];

impl Command {
    /// Wire token of the command
    pub fn token(&self) -> &'static str {
        match self {
            Command::SignUp => "SIGN UP",
            Command::SignIn => "SIGN IN",
            Command::SignOut => "SIGN OUT",
            Command::Casual => "CASUAL",
            Command::Competitive => "COMPETITIVE",
            Command::Profile => "PROFILE",
            Command::Leaderboard => "LEADERBOARD",
            Command::Help => "HELP",
        }
    }

    /// Whether the command may be issued in the given authentication state
    pub fn allowed(&self, authenticated: bool) -> bool {
        match self {
            Command::Help => true,
            _ if authenticated => POST_AUTH_COMMANDS.contains(self),
            _ => PRE_AUTH_COMMANDS.contains(self),
        }
    }

    /// Tokens a client may send in the given state, as listed by HELP
    pub fn available(authenticated: bool) -> Vec<&'static str> {
        let commands = if authenticated {
            POST_AUTH_COMMANDS
        } else {
            PRE_AUTH_COMMANDS
        };
        commands
            .iter()
            .chain(std::iter::once(&Command::Help))
            .map(Command::token)
            .collect()
    }
}

/// Error returned for a token that names no command
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown command: {0}")]
pub struct UnknownCommand(pub String);

impl FromStr for Command {
    type Err = UnknownCommand;

    /// Tokens are case-insensitive; surrounding whitespace is ignored
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "SIGN UP" => Ok(Command::SignUp),
            "SIGN IN" => Ok(Command::SignIn),
            "SIGN OUT" => Ok(Command::SignOut),
            "CASUAL" => Ok(Command::Casual),
            "COMPETITIVE" => Ok(Command::Competitive),
            "PROFILE" => Ok(Command::Profile),
            "LEADERBOARD" => Ok(Command::Leaderboard),
            "HELP" => Ok(Command::Help),
            _ => Err(UnknownCommand(s.trim().to_string())),
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.token())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("sign up".parse::<Command>().unwrap(), Command::SignUp);
        assert_eq!("Sign In\r".parse::<Command>().unwrap(), Command::SignIn);
        assert_eq!("  competitive ".parse::<Command>().unwrap(), Command::Competitive);
        assert_eq!("LEADERBOARD".parse::<Command>().unwrap(), Command::Leaderboard);
        assert!("SIGNUP".parse::<Command>().is_err());
        assert!("".parse::<Command>().is_err());
    }

    #[test]
    fn test_token_round_trip() {
        for command in PRE_AUTH_COMMANDS.iter().chain(POST_AUTH_COMMANDS) {
            assert_eq!(command.token().parse::<Command>().unwrap(), *command);
        }
    }

    #[test]
    fn test_command_sets_are_disjoint() {
        for command in PRE_AUTH_COMMANDS {
            assert!(command.allowed(false));
            assert!(!command.allowed(true));
        }
        for command in POST_AUTH_COMMANDS {
            assert!(command.allowed(true));
            assert!(!command.allowed(false));
        }
        assert!(Command::Help.allowed(true));
        assert!(Command::Help.allowed(false));
    }

    #[test]
    fn test_available_lists_help() {
        assert_eq!(Command::available(false), vec!["SIGN UP", "SIGN IN", "HELP"]);
        let post = Command::available(true);
        assert!(post.contains(&"COMPETITIVE"));
        assert!(post.contains(&"HELP"));
        assert!(!post.contains(&"SIGN UP"));
    }
}
