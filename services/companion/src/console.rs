//! Console line parsing.

use roomie_core::UserAction;
use secrecy::SecretString;

pub const HELP: &str = "\
commands:
  /login <user> <password>    sign in
  /signup <user> <password>   create an account
  /logout                     forget this session
  /stop                       interrupt roomie
  /clear                      wipe conversation history
  /history [n]                show the last n exchanges (20)
  /moods [hours]              show recorded moods (24)
  /mood                       ask for the current mood
  /listen [on|off]            restart listening, or toggle auto-listen
  /quit                       exit
  ~<words>                    dictate as if spoken
  ~roomie <command>           spoken command, e.g. \"~roomie stop listening\"
anything else is sent as a message";

const DEFAULT_HISTORY_LIMIT: u32 = 20;
const DEFAULT_EMOTION_HOURS: u32 = 24;

#[derive(Debug)]
pub enum ConsoleInput {
    Action(UserAction),
    /// Text for the recognizer, as if it had been spoken.
    Dictation(String),
    Help,
    Quit,
    /// A malformed command, with what to tell the user.
    Invalid(String),
}

pub fn parse_line(line: &str) -> Option<ConsoleInput> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if let Some(dictated) = line.strip_prefix('~') {
        return Some(ConsoleInput::Dictation(dictated.trim().to_string()));
    }
    let Some(command) = line.strip_prefix('/') else {
        return Some(ConsoleInput::Action(UserAction::Submit(line.to_string())));
    };

    let mut words = command.split_whitespace();
    let name = words.next().unwrap_or_default();
    let args: Vec<&str> = words.collect();

    let input = match (name, args.as_slice()) {
        ("login", [username, password]) => ConsoleInput::Action(UserAction::Login {
            username: username.to_string(),
            password: SecretString::from(password.to_string()),
        }),
        ("signup", [username, password]) => ConsoleInput::Action(UserAction::Signup {
            username: username.to_string(),
            password: SecretString::from(password.to_string()),
        }),
        ("login" | "signup", _) => {
            ConsoleInput::Invalid(format!("usage: /{} <user> <password>", name))
        }
        ("logout", []) => ConsoleInput::Action(UserAction::Logout),
        ("stop", []) => ConsoleInput::Action(UserAction::Stop),
        ("clear", []) => ConsoleInput::Action(UserAction::ClearHistory),
        ("history", rest) => match parse_count(rest, DEFAULT_HISTORY_LIMIT) {
            Some(limit) => ConsoleInput::Action(UserAction::RequestHistory { limit }),
            None => ConsoleInput::Invalid("usage: /history [n]".to_string()),
        },
        ("moods", rest) => match parse_count(rest, DEFAULT_EMOTION_HOURS) {
            Some(hours) => ConsoleInput::Action(UserAction::RequestEmotionHistory { hours }),
            None => ConsoleInput::Invalid("usage: /moods [hours]".to_string()),
        },
        ("mood", []) => ConsoleInput::Action(UserAction::RequestMood),
        ("listen", []) => ConsoleInput::Action(UserAction::StartListening),
        ("listen", ["on"]) => ConsoleInput::Action(UserAction::SetAutoListen(true)),
        ("listen", ["off"]) => ConsoleInput::Action(UserAction::SetAutoListen(false)),
        ("listen", _) => ConsoleInput::Invalid("usage: /listen [on|off]".to_string()),
        ("help", _) => ConsoleInput::Help,
        ("quit" | "exit", _) => ConsoleInput::Quit,
        _ => ConsoleInput::Invalid(format!("unknown command /{}, try /help", name)),
    };
    Some(input)
}

fn parse_count(args: &[&str], default: u32) -> Option<u32> {
    match args {
        [] => Some(default),
        [n] => n.parse().ok().filter(|n| *n > 0),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_plain_text_is_a_message() {
        match parse_line("  how are you?  ") {
            Some(ConsoleInput::Action(UserAction::Submit(text))) => assert_eq!(text, "how are you?"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(parse_line("   ").is_none());
    }

    #[test]
    fn test_dictation() {
        assert!(matches!(
            parse_line("~ good morning"),
            Some(ConsoleInput::Dictation(text)) if text == "good morning"
        ));
        assert!(matches!(
            parse_line("~"),
            Some(ConsoleInput::Dictation(text)) if text.is_empty()
        ));
    }

    #[test]
    fn test_login() {
        match parse_line("/login ada hunter2") {
            Some(ConsoleInput::Action(UserAction::Login { username, password })) => {
                assert_eq!(username, "ada");
                assert_eq!(password.expose_secret(), "hunter2");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            parse_line("/signup ada"),
            Some(ConsoleInput::Invalid(_))
        ));
    }

    #[test]
    fn test_counts() {
        assert!(matches!(
            parse_line("/history"),
            Some(ConsoleInput::Action(UserAction::RequestHistory { limit: 20 }))
        ));
        assert!(matches!(
            parse_line("/history 5"),
            Some(ConsoleInput::Action(UserAction::RequestHistory { limit: 5 }))
        ));
        assert!(matches!(
            parse_line("/moods 48"),
            Some(ConsoleInput::Action(UserAction::RequestEmotionHistory { hours: 48 }))
        ));
        assert!(matches!(
            parse_line("/history lots"),
            Some(ConsoleInput::Invalid(_))
        ));
    }

    #[test]
    fn test_listen_and_unknown() {
        assert!(matches!(
            parse_line("/listen"),
            Some(ConsoleInput::Action(UserAction::StartListening))
        ));
        assert!(matches!(
            parse_line("/listen off"),
            Some(ConsoleInput::Action(UserAction::SetAutoListen(false)))
        ));
        assert!(matches!(parse_line("/quit"), Some(ConsoleInput::Quit)));
        assert!(matches!(
            parse_line("/dance"),
            Some(ConsoleInput::Invalid(message)) if message.contains("/dance")
        ));
    }
}
