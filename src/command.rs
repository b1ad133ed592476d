//! Parsing of local input lines into [`ClientCommand`]s.
//!
//! Lines starting with a reserved verb (`/auth`, `/join`, `/rename`, `/help`)
//! must carry exactly the expected number of arguments; anything else with a
//! leading `/` is sent as ordinary chat text.

/// Usage text shown for `/help`.
pub const HELP_TEXT: &str = "\
Chat usage:
/auth {Username} {Secret} {DisplayName} - Authenticate with the server.
/join {ChannelID} - Join the channel with the given ID.
/rename {DisplayName} - Change the name shown to other users.
/help - Print this message.
Any other line is sent to the current channel.";

/// One parsed line of local input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    Auth {
        username: String,
        secret: String,
        display_name: String,
    },
    Join {
        channel_id: String,
    },
    Rename {
        display_name: String,
    },
    Send {
        text: String,
    },
    Help,
    Malformed {
        reason: String,
    },
}

impl ClientCommand {
    /// Parse one line. Returns `None` for a blank line.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return None;
        }
        if line.contains('\0') {
            return Some(malformed("input contains a NUL byte"));
        }

        let mut words = line.split_whitespace();
        let verb = words.next().unwrap_or_default();
        let args: Vec<&str> = words.collect();

        let cmd = match verb {
            "/auth" => match args.as_slice() {
                [username, secret, display_name] => ClientCommand::Auth {
                    username: username.to_string(),
                    secret: secret.to_string(),
                    display_name: display_name.to_string(),
                },
                _ => malformed("Invalid /auth command. Format: /auth Username Secret DisplayName"),
            },
            "/join" => match args.as_slice() {
                [channel_id] => ClientCommand::Join {
                    channel_id: channel_id.to_string(),
                },
                _ => malformed("Invalid /join command. Format: /join ChannelID"),
            },
            "/rename" => match args.as_slice() {
                [display_name] => ClientCommand::Rename {
                    display_name: display_name.to_string(),
                },
                _ => malformed("Invalid /rename command. Format: /rename DisplayName"),
            },
            "/help" => match args.as_slice() {
                [] => ClientCommand::Help,
                _ => malformed("Invalid /help command. Format: /help"),
            },
            _ => ClientCommand::Send {
                text: line.to_string(),
            },
        };
        Some(cmd)
    }
}

fn malformed(reason: &str) -> ClientCommand {
    ClientCommand::Malformed {
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_takes_username_secret_display_name_in_order() {
        assert_eq!(
            ClientCommand::parse("/auth xlogin00 s3cr3t Alice"),
            Some(ClientCommand::Auth {
                username: "xlogin00".into(),
                secret: "s3cr3t".into(),
                display_name: "Alice".into(),
            })
        );
    }

    #[test]
    fn reserved_verbs_with_wrong_arity_are_malformed() {
        for line in [
            "/auth a b",
            "/auth a b c d",
            "/join",
            "/join a b",
            "/rename",
            "/rename a b",
            "/help me",
        ] {
            assert!(
                matches!(ClientCommand::parse(line), Some(ClientCommand::Malformed { .. })),
                "{line:?} should be malformed"
            );
        }
    }

    #[test]
    fn unknown_slash_verb_is_chat_text() {
        assert_eq!(
            ClientCommand::parse("/shrug whatever"),
            Some(ClientCommand::Send {
                text: "/shrug whatever".into()
            })
        );
    }

    #[test]
    fn plain_text_keeps_inner_spacing() {
        assert_eq!(
            ClientCommand::parse("hello   world\n"),
            Some(ClientCommand::Send {
                text: "hello   world".into()
            })
        );
    }

    #[test]
    fn blank_lines_are_ignored() {
        assert_eq!(ClientCommand::parse(""), None);
        assert_eq!(ClientCommand::parse("   \r\n"), None);
    }

    #[test]
    fn join_rename_help() {
        assert_eq!(
            ClientCommand::parse("/join general"),
            Some(ClientCommand::Join {
                channel_id: "general".into()
            })
        );
        assert_eq!(
            ClientCommand::parse("/rename Bob"),
            Some(ClientCommand::Rename {
                display_name: "Bob".into()
            })
        );
        assert_eq!(ClientCommand::parse("/help"), Some(ClientCommand::Help));
    }

    #[test]
    fn nul_byte_is_malformed() {
        assert!(matches!(
            ClientCommand::parse("hi\0there"),
            Some(ClientCommand::Malformed { .. })
        ));
    }
}
