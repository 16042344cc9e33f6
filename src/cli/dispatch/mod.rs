use crate::{
    cli::{actions::Action, globals::GlobalArgs},
    services::types::{ChangePasswordRequest, PasswordResetConfirm, RegisterRequest},
};
use anyhow::{anyhow, bail, Context, Result};
use clap::ArgMatches;
use secrecy::SecretString;
use serde_json::{Map, Value};
use std::path::PathBuf;

/// Walks down to the innermost subcommand; global args are propagated there.
fn leaf(matches: &ArgMatches) -> (Vec<&str>, &ArgMatches) {
    let mut names = Vec::new();
    let mut current = matches;
    while let Some((name, sub_m)) = current.subcommand() {
        names.push(name);
        current = sub_m;
    }
    (names, current)
}

fn string(matches: &ArgMatches, id: &str) -> Result<String> {
    matches
        .get_one::<String>(id)
        .cloned()
        .ok_or_else(|| anyhow!("missing required argument: {id}"))
}

fn secret(matches: &ArgMatches, id: &str) -> Result<SecretString> {
    string(matches, id).map(SecretString::from)
}

fn optional(matches: &ArgMatches, id: &str) -> Option<String> {
    matches.get_one::<String>(id).cloned()
}

fn message_id(matches: &ArgMatches) -> Result<u64> {
    matches
        .get_one::<u64>("id")
        .copied()
        .context("missing required argument: id")
}

/// Parses `FIELD=VALUE` pairs. Values that parse as JSON keep their type, so
/// `--set link_duration_hours=12` sends a number.
pub fn profile_fields<'a, I>(assignments: I) -> Result<Map<String, Value>>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut fields = Map::new();
    for assignment in assignments {
        let Some((field, raw)) = assignment.split_once('=') else {
            bail!("invalid assignment {assignment:?}, expected FIELD=VALUE");
        };
        let field = field.trim();
        if field.is_empty() {
            bail!("invalid assignment {assignment:?}, field name is empty");
        }
        let value =
            serde_json::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        fields.insert(field.to_string(), value);
    }
    Ok(fields)
}

/// Verbosity count, taken from wherever `-v` was given on the command line.
pub fn verbosity(matches: &ArgMatches) -> u8 {
    let (_, sub_m) = leaf(matches);
    sub_m
        .get_one::<u8>("verbosity")
        .or_else(|| matches.get_one::<u8>("verbosity"))
        .copied()
        .unwrap_or(0)
}

/// Whether logs should be emitted as JSON lines.
pub fn json_logs(matches: &ArgMatches) -> bool {
    let (_, sub_m) = leaf(matches);
    sub_m
        .get_one::<String>("log-format")
        .or_else(|| matches.get_one::<String>("log-format"))
        .is_some_and(|format| format == "json")
}

pub fn globals(matches: &ArgMatches) -> GlobalArgs {
    let (_, sub_m) = leaf(matches);
    let api_url = sub_m
        .get_one::<String>("api-url")
        .or_else(|| matches.get_one::<String>("api-url"))
        .cloned();

    let mut globals = api_url.map_or_else(GlobalArgs::default, GlobalArgs::new);
    if let Some(path) = sub_m
        .get_one::<PathBuf>("token-file")
        .or_else(|| matches.get_one::<PathBuf>("token-file"))
    {
        globals.set_token_file(path.clone());
    }
    globals
}

pub fn handler(matches: &ArgMatches) -> Result<(Action, GlobalArgs)> {
    let (names, m) = leaf(matches);

    let action = match names.as_slice() {
        ["login"] => Action::Login {
            user: string(m, "user")?,
            password: secret(m, "password")?,
        },
        ["register"] => {
            let password = string(m, "password")?;
            Action::Register(Box::new(RegisterRequest {
                username: string(m, "username")?,
                email: string(m, "email")?,
                password_confirm: SecretString::from(password.clone()),
                password: SecretString::from(password),
                first_name: optional(m, "first-name"),
                last_name: optional(m, "last-name"),
                birth_date: optional(m, "birth-date"),
                gender: optional(m, "gender"),
            }))
        }
        ["logout"] => Action::Logout,
        ["whoami"] => Action::Whoami,
        ["profile", "update"] => Action::UpdateProfile {
            fields: profile_fields(m.get_many::<String>("set").into_iter().flatten())?,
        },
        ["password", "change"] => {
            let new_password = string(m, "new")?;
            Action::ChangePassword(ChangePasswordRequest {
                old_password: secret(m, "old")?,
                new_password_confirm: SecretString::from(new_password.clone()),
                new_password: SecretString::from(new_password),
            })
        }
        ["password", "reset"] => Action::RequestPasswordReset {
            email: string(m, "email")?,
        },
        ["password", "confirm"] => {
            let new_password = string(m, "new")?;
            Action::ConfirmPasswordReset(PasswordResetConfirm {
                uid: string(m, "uid")?,
                token: secret(m, "token")?,
                new_password_confirm: SecretString::from(new_password.clone()),
                new_password: SecretString::from(new_password),
            })
        }
        ["account", "delete"] => Action::DeleteAccount {
            password: secret(m, "password")?,
        },
        ["sessions"] => Action::Sessions,
        ["link", "activate"] => Action::ActivateLink {
            hours: m.get_one::<u32>("hours").copied().unwrap_or(24),
        },
        ["link", "deactivate"] => Action::DeactivateLink,
        ["link", "status"] => Action::LinkStatus {
            link: string(m, "link")?,
        },
        ["messages", "list"] => Action::ListMessages {
            page: m.get_one::<u32>("page").copied().unwrap_or(1),
            read: if m.get_flag("read") {
                Some(true)
            } else if m.get_flag("unread") {
                Some(false)
            } else {
                None
            },
        },
        ["messages", "show"] => Action::ShowMessage { id: message_id(m)? },
        ["messages", "read"] => Action::MarkRead { id: message_id(m)? },
        ["messages", "delete"] => Action::DeleteMessage { id: message_id(m)? },
        ["messages", "read-all"] => Action::MarkAllRead,
        ["messages", "unread"] => Action::UnreadCount,
        ["send"] => Action::SendMessage {
            link: string(m, "link")?,
            content: string(m, "content")?,
        },
        ["stats"] => Action::Stats,
        _ => bail!("unknown command: {}", names.join(" ")),
    };

    Ok((action, globals(matches)))
}
