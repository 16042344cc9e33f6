use crate::api::DEFAULT_API_BASE_URL;
use clap::{
    builder::{
        styling::{AnsiColor, Effects, Styles},
        ValueParser,
    },
    Arg, ArgAction, ArgGroup, ColorChoice, Command,
};

pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        if let Ok(parsed) = level.parse::<u8>() {
            if parsed <= 5 {
                return Ok(parsed);
            }
        }

        match level.to_lowercase().as_str() {
            "error" => Ok(0),
            "warn" => Ok(1),
            "info" => Ok(2),
            "debug" => Ok(3),
            "trace" => Ok(4),
            _ => Err("invalid log level".to_string()),
        }
    })
}

fn password_arg(id: &'static str, long: &'static str, help: &'static str) -> Arg {
    Arg::new(id)
        .long(long)
        .help(help)
        .hide_env_values(true)
        .required(true)
}

fn link_arg() -> Arg {
    Arg::new("link")
        .help("Unique link identifier")
        .required(true)
}

fn message_id_arg() -> Arg {
    Arg::new("id")
        .help("Message id")
        .required(true)
        .value_parser(clap::value_parser!(u64))
}

fn account_commands() -> Vec<Command> {
    vec![
        Command::new("login")
            .about("Sign in and store the session tokens")
            .arg(
                Arg::new("user")
                    .short('u')
                    .long("user")
                    .help("Email or username")
                    .env("MURMUR_USER")
                    .required(true),
            )
            .arg(password_arg("password", "password", "Account password").env("MURMUR_PASSWORD")),
        Command::new("register")
            .about("Create an account and sign in")
            .arg(Arg::new("username").long("username").required(true))
            .arg(Arg::new("email").long("email").required(true))
            .arg(password_arg("password", "password", "Account password").env("MURMUR_PASSWORD"))
            .arg(Arg::new("first-name").long("first-name"))
            .arg(Arg::new("last-name").long("last-name"))
            .arg(
                Arg::new("birth-date")
                    .long("birth-date")
                    .help("Birth date, YYYY-MM-DD"),
            )
            .arg(Arg::new("gender").long("gender")),
        Command::new("logout").about("Sign out of every session"),
        Command::new("whoami").about("Show the signed-in user"),
        Command::new("profile")
            .about("Manage the profile")
            .subcommand_required(true)
            .subcommand(
                Command::new("update")
                    .about("Update profile fields")
                    .arg(
                        Arg::new("set")
                            .long("set")
                            .help("Field assignment, e.g. --set first_name=Ada")
                            .value_name("FIELD=VALUE")
                            .action(ArgAction::Append)
                            .required(true),
                    ),
            ),
        Command::new("password")
            .about("Change or reset the password")
            .subcommand_required(true)
            .subcommand(
                Command::new("change")
                    .about("Change the password of the signed-in user")
                    .arg(password_arg("old", "old", "Current password"))
                    .arg(password_arg("new", "new", "New password")),
            )
            .subcommand(
                Command::new("reset")
                    .about("Email a password reset link")
                    .arg(Arg::new("email").required(true)),
            )
            .subcommand(
                Command::new("confirm")
                    .about("Complete a password reset")
                    .arg(Arg::new("uid").long("uid").required(true))
                    .arg(password_arg("token", "token", "Reset token from the email"))
                    .arg(password_arg("new", "new", "New password")),
            ),
        Command::new("account")
            .about("Manage the account")
            .subcommand_required(true)
            .subcommand(
                Command::new("delete")
                    .about("Permanently delete the account")
                    .arg(
                        password_arg("password", "password", "Account password")
                            .env("MURMUR_PASSWORD"),
                    ),
            ),
        Command::new("sessions").about("List active sessions"),
    ]
}

fn link_command() -> Command {
    Command::new("link")
        .about("Manage the shareable link")
        .subcommand_required(true)
        .subcommand(
            Command::new("activate")
                .about("Open the link for a number of hours")
                .arg(
                    Arg::new("hours")
                        .help("Activation duration in hours")
                        .default_value("24")
                        .value_parser(clap::value_parser!(u32).range(1..)),
                ),
        )
        .subcommand(Command::new("deactivate").about("Close the link"))
        .subcommand(
            Command::new("status")
                .about("Check whether a link accepts messages")
                .arg(link_arg()),
        )
}

fn messages_command() -> Command {
    Command::new("messages")
        .about("Read the inbox")
        .subcommand_required(true)
        .subcommand(
            Command::new("list")
                .about("List received messages")
                .arg(
                    Arg::new("page")
                        .long("page")
                        .default_value("1")
                        .value_parser(clap::value_parser!(u32).range(1..)),
                )
                .arg(
                    Arg::new("read")
                        .long("read")
                        .help("Only read messages")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("unread")
                        .long("unread")
                        .help("Only unread messages")
                        .action(ArgAction::SetTrue),
                )
                .group(ArgGroup::new("filter").args(["read", "unread"])),
        )
        .subcommand(
            Command::new("show")
                .about("Show one message")
                .arg(message_id_arg()),
        )
        .subcommand(
            Command::new("read")
                .about("Mark a message as read")
                .arg(message_id_arg()),
        )
        .subcommand(
            Command::new("delete")
                .about("Delete a message")
                .arg(message_id_arg()),
        )
        .subcommand(Command::new("read-all").about("Mark every message as read"))
        .subcommand(Command::new("unread").about("Count unread messages"))
}

pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    Command::new("murmur")
        .about("Anonymous messages through a shareable link")
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .subcommand_required(true)
        .arg(
            Arg::new("api-url")
                .long("api-url")
                .help("Base URL of the messaging API")
                .default_value(DEFAULT_API_BASE_URL)
                .env("MURMUR_API_URL")
                .global(true),
        )
        .arg(
            Arg::new("token-file")
                .long("token-file")
                .help("Where session tokens are stored")
                .env("MURMUR_TOKEN_FILE")
                .global(true)
                .value_parser(clap::value_parser!(std::path::PathBuf)),
        )
        .arg(
            Arg::new("verbosity")
                .short('v')
                .long("verbose")
                .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
                .env("MURMUR_LOG_LEVEL")
                .global(true)
                .action(ArgAction::Count)
                .value_parser(validator_log_level()),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .help("Log output format")
                .env("MURMUR_LOG_FORMAT")
                .global(true)
                .default_value("text")
                .value_parser(["text", "json"]),
        )
        .subcommands(account_commands())
        .subcommand(link_command())
        .subcommand(messages_command())
        .subcommand(
            Command::new("send")
                .about("Send an anonymous message")
                .arg(link_arg())
                .arg(Arg::new("content").help("Message text").required(true)),
        )
        .subcommand(Command::new("stats").about("Show inbox statistics"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new() {
        let command = new();

        assert_eq!(command.get_name(), "murmur");
        assert_eq!(
            command.get_about().unwrap().to_string(),
            "Anonymous messages through a shareable link"
        );
        assert_eq!(
            command.get_version().unwrap().to_string(),
            env!("CARGO_PKG_VERSION")
        );
    }

    #[test]
    fn test_command_debug_assert() {
        new().debug_assert();
    }

    #[test]
    fn test_default_api_url() {
        temp_env::with_vars([("MURMUR_API_URL", None::<String>)], || {
            let matches = new().get_matches_from(vec!["murmur", "whoami"]);
            assert_eq!(
                matches.get_one::<String>("api-url").map(String::as_str),
                Some(DEFAULT_API_BASE_URL)
            );
        });
    }

    #[test]
    fn test_check_env() {
        temp_env::with_vars(
            [
                ("MURMUR_API_URL", Some("https://api.murmur.test/api")),
                ("MURMUR_TOKEN_FILE", Some("/tmp/murmur-tokens.json")),
                ("MURMUR_LOG_LEVEL", Some("info")),
                ("MURMUR_USER", Some("alice")),
                ("MURMUR_PASSWORD", Some("secret")),
            ],
            || {
                let matches = new().get_matches_from(vec!["murmur", "login"]);
                assert_eq!(
                    matches.get_one::<String>("api-url").map(String::as_str),
                    Some("https://api.murmur.test/api")
                );
                assert_eq!(
                    matches
                        .get_one::<std::path::PathBuf>("token-file")
                        .map(|p| p.to_string_lossy().to_string()),
                    Some("/tmp/murmur-tokens.json".to_string())
                );
                assert_eq!(matches.get_one::<u8>("verbosity").copied(), Some(2));

                let (name, login) = matches.subcommand().unwrap();
                assert_eq!(name, "login");
                assert_eq!(
                    login.get_one::<String>("user").map(String::as_str),
                    Some("alice")
                );
            },
        );
    }

    #[test]
    fn test_check_log_level_env() {
        let levels = vec!["error", "warn", "info", "debug", "trace"];
        for (index, &level) in levels.iter().enumerate() {
            temp_env::with_vars([("MURMUR_LOG_LEVEL", Some(level))], || {
                let matches = new().get_matches_from(vec!["murmur", "stats"]);
                assert_eq!(
                    matches.get_one::<u8>("verbosity").copied(),
                    Some(index as u8)
                );
            });
        }
    }

    #[test]
    fn test_check_log_level_verbosity() {
        for index in 0..5 {
            temp_env::with_vars([("MURMUR_LOG_LEVEL", None::<String>)], || {
                let mut args = vec!["murmur".to_string()];
                if index > 0 {
                    args.push(format!("-{}", "v".repeat(index)));
                }
                args.push("stats".to_string());

                let matches = new().get_matches_from(args);
                assert_eq!(
                    matches.get_one::<u8>("verbosity").copied(),
                    Some(index as u8)
                );
            });
        }
    }

    #[test]
    fn test_log_format() {
        temp_env::with_vars([("MURMUR_LOG_FORMAT", None::<&str>)], || {
            let matches = new().get_matches_from(vec!["murmur", "stats"]);
            assert_eq!(
                matches.get_one::<String>("log-format").map(String::as_str),
                Some("text")
            );

            let result =
                new().try_get_matches_from(vec!["murmur", "--log-format", "xml", "stats"]);
            assert!(result.is_err());
        });

        temp_env::with_vars([("MURMUR_LOG_FORMAT", Some("json"))], || {
            let matches = new().get_matches_from(vec!["murmur", "stats"]);
            assert_eq!(
                matches.get_one::<String>("log-format").map(String::as_str),
                Some("json")
            );
        });
    }

    #[test]
    fn test_read_and_unread_conflict() {
        let result =
            new().try_get_matches_from(vec!["murmur", "messages", "list", "--read", "--unread"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_link_activate_rejects_zero_hours() {
        let result = new().try_get_matches_from(vec!["murmur", "link", "activate", "0"]);
        assert!(result.is_err());
    }
}
