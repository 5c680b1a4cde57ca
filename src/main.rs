use std::env;

use anyhow::{Context, Result};
use tracing::{debug, info};
use tracing_subscriber::{fmt, EnvFilter};

use civicdesk::cli::outputformatter::{print_announcements, print_complaints, print_json, print_search_results};
use civicdesk::cli::{parse_args, usage, Command, Invocation};
use civicdesk::config::ClientConfig;
use civicdesk::services::{LoginRequest, NewComplaint, RegisterRequest};
use civicdesk::CivicClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so command output stays pipeable
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let mut argv = env::args();
    let program = argv.next().unwrap_or_else(|| "civicdesk".to_string());
    let inv = match parse_args(argv) {
        Ok(inv) => inv,
        Err(e) => {
            eprintln!("{}\n", e);
            eprintln!("{}", usage(&program));
            std::process::exit(2);
        }
    };
    if inv.command == Command::Help {
        println!("{}", usage(&program));
        return Ok(());
    }

    let cfg = inv.apply(ClientConfig::from_env());
    debug!(target: "civicdesk", "api={} session_file={:?}", cfg.api_url, cfg.session_file);
    let client = CivicClient::connect(cfg).context("failed to initialize client")?;
    run(&client, &inv).await
}

fn emit<T: serde::Serialize>(json: bool, val: &T, table: impl FnOnce()) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(val)?);
    } else {
        table();
    }
    Ok(())
}

async fn run(client: &CivicClient, inv: &Invocation) -> Result<()> {
    let json = inv.json;
    match &inv.command {
        Command::Help => {}
        Command::Login { email, password } => {
            let user = client
                .session()
                .login(&LoginRequest { email: email.clone(), password: password.clone() })
                .await?;
            let nav = client.navigate(civicdesk::identity::ROOT_PATH);
            info!(target: "civicdesk", "landing page {}", nav.path);
            println!("logged in as {} ({}) -> {}", user.name, user.role, nav.path);
        }
        Command::Register { name, email, password, role, ward } => {
            let req = RegisterRequest {
                name: name.clone(),
                email: email.clone(),
                password: password.clone(),
                ward: ward.clone(),
                role: *role,
            };
            let resp = client.session().register(&req).await?;
            match resp.user_id {
                Some(id) => println!("registered user {} ({})", id, resp.message),
                None => println!("{}", resp.message),
            }
        }
        Command::Logout => {
            client.session().logout()?;
            println!("logged out");
        }
        Command::WhoAmI => match client.session().current_user() {
            Some(u) => emit(json, &u, || {
                let ward = u.ward.clone().unwrap_or_else(|| "-".into());
                println!("{} <{}> role={} ward={} id={}", u.name, u.email, u.role, ward, u.id);
            })?,
            None => println!("not logged in"),
        },
        Command::Route { path } => {
            let nav = client.navigate(path);
            if nav.redirects > 0 {
                println!("{} -> {} ({} redirect(s), {:?})", nav.requested, nav.path, nav.redirects, nav.decision);
            } else {
                println!("{} ({:?})", nav.path, nav.decision);
            }
        }
        Command::Search { query, scope } => {
            let outcome = match scope {
                Some(s) => client.search_scoped(query, s).await,
                None => client.search(query).await,
            };
            for e in &outcome.degraded {
                eprintln!("warning: {}", e);
            }
            emit(json, &outcome.results, || print_search_results(&outcome.results))?;
        }
        Command::Dashboard => {
            let v = client.dashboard().await?;
            emit(json, &v, || print_json(&v))?;
        }
        Command::Summary => {
            let v = client.summary().await?;
            emit(json, &v, || print_json(&v))?;
        }
        Command::Announcements { ward } => {
            let items = client.announcements(ward.as_deref()).await?;
            if json {
                let v: Vec<serde_json::Value> = items
                    .iter()
                    .map(|a| serde_json::json!({"id": a.id, "ward": a.ward, "title": a.title, "message": a.message, "date": a.date}))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&v)?);
            } else {
                print_announcements(&items);
            }
        }
        Command::SubmitComplaint { category, description, ward } => {
            let own = client.session().current_user().and_then(|u| u.ward);
            let ward = ward.clone().or(own).context("no ward given and the current user has none")?;
            let resp = client
                .submit_complaint(&NewComplaint { ward, category: category.clone(), description: description.clone() })
                .await?;
            emit(json, &resp, || {
                println!("complaint {} submitted. {}", resp.complaint_id, resp.message);
                if !resp.similar_complaints.is_empty() {
                    println!("similar complaints:");
                    print_complaints(&resp.similar_complaints);
                }
            })?;
        }
        Command::UpdateStatus { id, status } => {
            let v = client.update_status(*id, *status).await?;
            emit(json, &v, || println!("complaint {} is now {}", id, status))?;
        }
        Command::Similar { id } => {
            let s = client.similar_issues(*id).await?;
            emit(json, &s, || print_complaints(&s.similar_issues))?;
        }
        Command::SubmitReport { body } => {
            let v = client.submit_report(body).await?;
            emit(json, &v, || print_json(&v))?;
        }
    }
    Ok(())
}
