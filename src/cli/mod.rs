//! Command-line front end: argument parsing and output formatting.

pub mod outputformatter;

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};

use crate::config::ClientConfig;
use crate::identity::Role;
use crate::search::SearchScope;
use crate::services::ComplaintStatus;

pub fn usage(program: &str) -> String {
    format!(
        "Usage:\n  {program} [--api <url>] [--session-file <path>] [--json] <command> [args]\n\nCommands:\n  login <email> <password>                          log in and remember the session\n  register --name <n> --email <e> --password <p> --role <citizen|officer|admin> [--ward <w>]\n  logout                                            forget the stored session\n  whoami                                            show the current user\n  route <path>                                      show where a navigation to <path> ends up\n  search <query...> [--ward <w> | --all]            semantic search over complaints and announcements\n  dashboard                                         role-specific dashboard data\n  summary                                           summary statistics (officer/admin)\n  announcements [--ward <w>]                        latest announcements\n  complaint submit --category <c> --description <d> [--ward <w>]\n  complaint status <id> <pending|in_progress|resolved|rejected>\n  complaint similar <id>\n  report submit <json>\n  help                                              show this help\n\nEnvironment:\n  CIVICDESK_API_URL, CIVICDESK_SESSION_FILE, CIVICDESK_SEARCH_LIMIT,\n  CIVICDESK_SEARCH_TIMEOUT_MS, CIVICDESK_ANNOUNCEMENT_LIMIT, RUST_LOG\n\nExamples:\n  {program} login asha@example.com secret\n  {program} search water leak near the market\n  {program} --json search \"broken street lights\" --all\n  {program} complaint status 42 in_progress"
    )
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Login { email: String, password: String },
    Register { name: String, email: String, password: String, role: Role, ward: Option<String> },
    Logout,
    WhoAmI,
    Route { path: String },
    /// `scope: None` means "derive from the logged-in user".
    Search { query: String, scope: Option<SearchScope> },
    Dashboard,
    Summary,
    Announcements { ward: Option<String> },
    SubmitComplaint { category: String, description: String, ward: Option<String> },
    UpdateStatus { id: i64, status: ComplaintStatus },
    Similar { id: i64 },
    SubmitReport { body: serde_json::Value },
    Help,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub api: Option<String>,
    pub session_file: Option<PathBuf>,
    pub json: bool,
    pub command: Command,
}

impl Invocation {
    /// Apply command-line overrides on top of the environment configuration.
    pub fn apply(&self, mut cfg: ClientConfig) -> ClientConfig {
        if let Some(a) = &self.api { cfg.api_url = a.clone(); }
        if let Some(p) = &self.session_file { cfg.session_file = p.clone(); }
        cfg
    }
}

pub fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<Invocation> {
    let mut api = None;
    let mut session_file = None;
    let mut json = false;
    let mut rest: Vec<String> = Vec::new();
    let mut it = args.into_iter();
    while let Some(a) = it.next() {
        match a.as_str() {
            "--api" => api = Some(it.next().ok_or_else(|| anyhow!("--api needs a value"))?),
            "--session-file" => session_file = Some(PathBuf::from(it.next().ok_or_else(|| anyhow!("--session-file needs a value"))?)),
            "--json" => json = true,
            "-h" | "--help" => rest.push("help".into()),
            _ => rest.push(a),
        }
    }
    let command = parse_command(rest)?;
    Ok(Invocation { api, session_file, json, command })
}

// Pulls `--flag value` pairs out of `args`, leaving positionals in order.
fn take_flags(args: Vec<String>, known: &[&str]) -> Result<(Vec<String>, Vec<(String, String)>)> {
    let mut pos = Vec::new();
    let mut flags = Vec::new();
    let mut it = args.into_iter();
    while let Some(a) = it.next() {
        if known.contains(&a.as_str()) {
            if a == "--all" {
                flags.push((a, String::new()));
                continue;
            }
            let v = it.next().ok_or_else(|| anyhow!("{} needs a value", a))?;
            flags.push((a, v));
        } else if a.starts_with("--") {
            return Err(anyhow!("unknown option {}", a));
        } else {
            pos.push(a);
        }
    }
    Ok((pos, flags))
}

fn flag(flags: &[(String, String)], name: &str) -> Option<String> {
    flags.iter().rev().find(|(k, _)| k == name).map(|(_, v)| v.clone())
}

fn required(flags: &[(String, String)], name: &str) -> Result<String> {
    flag(flags, name).ok_or_else(|| anyhow!("missing required {}", name))
}

fn parse_id(raw: Option<&String>) -> Result<i64> {
    let raw = raw.ok_or_else(|| anyhow!("missing complaint id"))?;
    raw.parse::<i64>().with_context(|| format!("invalid complaint id '{}'", raw))
}

fn parse_command(mut args: Vec<String>) -> Result<Command> {
    if args.is_empty() {
        return Ok(Command::Help);
    }
    let head = args.remove(0);
    match head.as_str() {
        "help" => Ok(Command::Help),
        "login" => {
            let (pos, _) = take_flags(args, &[])?;
            match pos.as_slice() {
                [email, password] => Ok(Command::Login { email: email.clone(), password: password.clone() }),
                _ => Err(anyhow!("usage: login <email> <password>")),
            }
        }
        "register" => {
            let (_, flags) = take_flags(args, &["--name", "--email", "--password", "--role", "--ward"])?;
            let role: Role = required(&flags, "--role")?.parse().map_err(|e: String| anyhow!(e))?;
            let ward = flag(&flags, "--ward");
            if role.is_ward_bound() && ward.is_none() {
                return Err(anyhow!("--ward is required for {} accounts", role));
            }
            Ok(Command::Register {
                name: required(&flags, "--name")?,
                email: required(&flags, "--email")?,
                password: required(&flags, "--password")?,
                role,
                ward,
            })
        }
        "logout" => Ok(Command::Logout),
        "whoami" => Ok(Command::WhoAmI),
        "route" => {
            let path = args.first().cloned().ok_or_else(|| anyhow!("usage: route <path>"))?;
            Ok(Command::Route { path })
        }
        "search" => {
            let (pos, flags) = take_flags(args, &["--ward", "--all"])?;
            let query = pos.join(" ");
            if query.trim().is_empty() {
                return Err(anyhow!("usage: search <query...>"));
            }
            let scope = if flags.iter().any(|(k, _)| k == "--all") {
                Some(SearchScope::Unscoped)
            } else {
                flag(&flags, "--ward").map(SearchScope::Ward)
            };
            Ok(Command::Search { query, scope })
        }
        "dashboard" => Ok(Command::Dashboard),
        "summary" => Ok(Command::Summary),
        "announcements" => {
            let (_, flags) = take_flags(args, &["--ward"])?;
            Ok(Command::Announcements { ward: flag(&flags, "--ward") })
        }
        "complaint" => {
            if args.is_empty() {
                return Err(anyhow!("usage: complaint <submit|status|similar> ..."));
            }
            let sub = args.remove(0);
            match sub.as_str() {
                "submit" => {
                    let (_, flags) = take_flags(args, &["--category", "--description", "--ward"])?;
                    Ok(Command::SubmitComplaint {
                        category: required(&flags, "--category")?,
                        description: required(&flags, "--description")?,
                        ward: flag(&flags, "--ward"),
                    })
                }
                "status" => {
                    let id = parse_id(args.first())?;
                    let status = args
                        .get(1)
                        .ok_or_else(|| anyhow!("missing status"))?
                        .parse::<ComplaintStatus>()
                        .map_err(|e| anyhow!(e))?;
                    Ok(Command::UpdateStatus { id, status })
                }
                "similar" => Ok(Command::Similar { id: parse_id(args.first())? }),
                other => Err(anyhow!("unknown complaint command '{}'", other)),
            }
        }
        "report" => match args.first().map(String::as_str) {
            Some("submit") => {
                let raw = args.get(1).ok_or_else(|| anyhow!("usage: report submit <json>"))?;
                let body = serde_json::from_str(raw).context("report body must be JSON")?;
                Ok(Command::SubmitReport { body })
            }
            _ => Err(anyhow!("usage: report submit <json>")),
        },
        other => Err(anyhow!("unknown command '{}'", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(s: &str) -> Vec<String> { s.split_whitespace().map(String::from).collect() }

    #[test]
    fn globals_and_login() {
        let inv = parse_args(argv("--api http://x:1 --json login a@b.c pw")).unwrap();
        assert_eq!(inv.api.as_deref(), Some("http://x:1"));
        assert!(inv.json);
        assert_eq!(inv.command, Command::Login { email: "a@b.c".into(), password: "pw".into() });
        assert!(parse_args(argv("login only-email")).is_err());
    }

    #[test]
    fn search_scopes() {
        let inv = parse_args(argv("search water leak --ward Ward-3")).unwrap();
        assert_eq!(inv.command, Command::Search { query: "water leak".into(), scope: Some(SearchScope::Ward("Ward-3".into())) });
        let inv = parse_args(argv("search lights --all")).unwrap();
        assert_eq!(inv.command, Command::Search { query: "lights".into(), scope: Some(SearchScope::Unscoped) });
        let inv = parse_args(argv("search lights")).unwrap();
        assert_eq!(inv.command, Command::Search { query: "lights".into(), scope: None });
        assert!(parse_args(argv("search")).is_err());
    }

    #[test]
    fn complaint_subcommands() {
        assert_eq!(
            parse_args(argv("complaint status 42 in_progress")).unwrap().command,
            Command::UpdateStatus { id: 42, status: ComplaintStatus::InProgress }
        );
        assert_eq!(parse_args(argv("complaint similar 9")).unwrap().command, Command::Similar { id: 9 });
        assert!(parse_args(argv("complaint status x resolved")).is_err());
        assert!(parse_args(argv("complaint status 1 closed")).is_err());
    }

    #[test]
    fn register_requires_ward_for_citizens() {
        let err = parse_args(argv("register --name A --email a@x --password p --role citizen")).unwrap_err();
        assert!(err.to_string().contains("--ward"));
        let ok = parse_args(argv("register --name A --email a@x --password p --role admin")).unwrap();
        assert!(matches!(ok.command, Command::Register { role: Role::Admin, ward: None, .. }));
    }

    #[test]
    fn no_args_is_help() {
        assert_eq!(parse_args(Vec::<String>::new()).unwrap().command, Command::Help);
        assert_eq!(parse_args(argv("--help")).unwrap().command, Command::Help);
    }
}
