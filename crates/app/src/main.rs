//! The Context File: aggregate context from GitHub, Slack, websites and
//! databases, then write one combined, filtered artifact to a local folder.

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use zeroize::Zeroizing;

use providers::bridge::{GithubStart, MessageOutcome, RedirectOutcome};
use providers::listener::RedirectListener;
use shared::backend_api::RepoInfo;
use shared::message::{github_connected_from_query, SlackRedirect};
use shared::settings::AppSettings;

mod animation;
mod flow;
mod session;

use session::ContextSession;

/// How long the `callback` command waits for the browser redirect.
const CALLBACK_TIMEOUT: Duration = Duration::from_secs(300);

/// Documentation sites suggested when `site` is called without a URL.
const COMMON_WEBSITES: &[&str] = &[
    "platform.openai.com/docs",
    "docs.python.org/3/",
    "react.dev/learn",
    "nodejs.org/docs",
    "developer.mozilla.org/en-US/",
    "docs.github.com",
    "tailwindcss.com/docs",
    "nextjs.org/docs",
];

const HELP: &str = "\
Commands:
  folder <path>        grant a folder for saved context (no path: revoke)
  github               connect GitHub, or list repositories when connected
  repo <n>             extract repository <n> from the last listing
  token <tok> <user> [repo]   legacy extraction with a personal access token
  slack                open Slack authorization in the browser
  callback             wait for the browser to finish an authorization
  site <url>           extract a website
  firebase <project>   extract a Firebase project (key asked on next line)
  supabase <url>       extract a Supabase project (key asked on next line)
  enhance <prompt>     enhance the prompt against the collected context
  prompt               show the current prompt value
  download             filter everything and save the context file
  list                 show collected context items
  clear                discard collected context items
  quit";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let settings = AppSettings::from_env();
    tracing::info!(api = %settings.api_base_url, "starting session");
    let mut session = ContextSession::new(settings)?;
    let mut repos: Vec<RepoInfo> = Vec::new();

    println!("The Context File: get the context you need from Slack, GitHub, databases, and any API.");
    println!("{}", HELP);

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;
        let mut parts = line.split_whitespace();
        let command = parts.next().unwrap_or("");
        let rest: Vec<&str> = parts.collect();

        match command {
            "" => {}
            "help" => println!("{}", HELP),
            "folder" => {
                let selection = rest.first().map(PathBuf::from);
                match session.choose_folder(selection.as_deref()) {
                    Ok(Some(name)) => println!("Saving context into \"{}\".", name),
                    Ok(None) => println!("No folder granted; downloads will be used."),
                    Err(e) => println!("{}", e),
                }
            }
            "github" => match session.start_github().await {
                Ok(GithubStart::ReposLoaded(list)) => {
                    repos = list;
                    print_repos(&repos);
                }
                Ok(GithubStart::AuthorizationOpened) => {
                    println!("Authorize in the browser, then run `callback`.");
                }
                Err(e) => println!("{}", e),
            },
            "repo" => {
                let selected = rest
                    .first()
                    .and_then(|n| n.parse::<usize>().ok())
                    .and_then(|n| repos.get(n.saturating_sub(1)).cloned());
                match selected {
                    Some(repo) => match session.select_repository(&repo).await {
                        Ok(name) => println!("Extracted {}.", name),
                        Err(e) => println!("{}", e),
                    },
                    None => println!("Pick a repository number from the last `github` listing."),
                }
            }
            "token" => {
                let token = Zeroizing::new(rest.first().unwrap_or(&"").to_string());
                let username = rest.get(1).copied().unwrap_or("");
                let repo = rest.get(2).copied();
                match session.extract_github_token(token, username, repo).await {
                    Ok(name) => println!("Extracted {}.", name),
                    Err(e) => println!("{}", e),
                }
            }
            "slack" => match session.start_slack() {
                Ok(()) => println!("Authorize in the browser, then run `callback`."),
                Err(e) => println!("{}", e),
            },
            "callback" => match wait_for_callback().await {
                Ok(query) => handle_callback(&mut session, &query).await,
                Err(e) => println!("{}", e),
            },
            "site" => {
                if rest.is_empty() {
                    println!("Enter a website URL, for example:");
                    for site in COMMON_WEBSITES {
                        println!("  site {}", site);
                    }
                } else {
                    match session.extract_website(&rest.join(" ")).await {
                        Ok(name) => println!("Extracted {}.", name),
                        Err(e) => println!("{}", e),
                    }
                }
            }
            "firebase" => {
                let project_id = rest.first().copied().unwrap_or("");
                println!("Paste the service account key (one line):");
                let key = Zeroizing::new(read_line(&mut lines)?);
                match session.extract_firebase(project_id, key).await {
                    Ok(name) => println!("Extracted {}.", name),
                    Err(e) => {
                        println!("{}", e);
                        if let Some(hint) = firestore_hint(&e.to_string(), project_id) {
                            println!("{}", hint);
                        }
                    }
                }
            }
            "supabase" => {
                let project_url = rest.first().copied().unwrap_or("");
                println!("Paste the service role key (one line):");
                let key = Zeroizing::new(read_line(&mut lines)?);
                match session.extract_supabase(project_url, key).await {
                    Ok(name) => println!("Extracted {}.", name),
                    Err(e) => println!("{}", e),
                }
            }
            "enhance" => match session.enhance(&rest.join(" ")).await {
                Ok(_) => println!("Prompt enhanced:\n{}", session.prompt()),
                Err(e) => println!("{}", e),
            },
            "prompt" => println!("{}", session.prompt()),
            "download" => match session.download_all().await {
                Ok(Some(path)) => println!("Context saved to {}.", path.display()),
                Ok(None) => println!("Nothing collected yet."),
                Err(e) => println!("{}", e),
            },
            "list" => {
                let labels = session.item_labels();
                if labels.is_empty() {
                    println!("No context collected yet.");
                }
                for (index, (kind, name)) in labels.iter().enumerate() {
                    println!("{}. {} - {}", index + 1, kind.display_name(), name);
                }
            }
            "clear" => {
                session.clear_items();
                println!("Context cleared.");
            }
            "quit" | "exit" => break,
            other => println!("Unknown command \"{}\"; try `help`.", other),
        }

        // Results forwarded from authorization windows arrive between
        // commands; drain them one per turn.
        for outcome in session.pump_messages().await {
            match outcome {
                Ok(MessageOutcome::Appended { kind, name }) => {
                    println!("Added {} context from {}.", kind.display_name(), name)
                }
                Ok(MessageOutcome::ReposLoaded(list)) => {
                    repos = list;
                    print_repos(&repos);
                }
                Err(e) => println!("{}", e),
            }
        }
    }

    Ok(())
}

/// Run the loopback listener off the async runtime until the browser is
/// redirected back to us.
async fn wait_for_callback() -> Result<String> {
    println!("Waiting for the browser to come back (5 min timeout)...");
    let query = tokio::task::spawn_blocking(|| {
        let listener = RedirectListener::bind()?;
        listener.wait_for_redirect(CALLBACK_TIMEOUT)
    })
    .await??;
    Ok(query)
}

async fn handle_callback(session: &mut ContextSession, query: &str) {
    if SlackRedirect::from_query(query).is_some() {
        session.deliver_redirect(query);
        match session.process_redirect().await {
            RedirectOutcome::Appended { name } => println!("Added Slack context from {}.", name),
            RedirectOutcome::ForwardedToOpener { name } => {
                println!("Forwarded Slack context from {}.", name)
            }
            RedirectOutcome::Failed { message, .. } => println!("{}", message),
            RedirectOutcome::Ignored => {}
        }
    } else if let Some(message) = github_connected_from_query(query) {
        // Delivered through the same validated channel a popup would use.
        session.bus_sender().post(message);
    } else {
        println!("The callback carried no recognizable result.");
    }
}

fn read_line(lines: &mut impl Iterator<Item = std::io::Result<String>>) -> Result<String> {
    Ok(lines.next().transpose()?.unwrap_or_default())
}

/// Walk the user through enabling Firestore when the backend reports the
/// API as disabled for their project.
fn firestore_hint(message: &str, project_id: &str) -> Option<String> {
    let disabled = message.contains("Cloud Firestore API has not been used")
        || message.contains("SERVICE_DISABLED")
        || message.contains("firestore.googleapis.com");
    if !disabled {
        return None;
    }
    Some(format!(
        "Your Firebase project needs the Cloud Firestore API enabled:\n\
         1. Firebase Console -> your project -> Firestore Database\n\
         2. Create a database (any location and mode)\n\
         3. Wait 2-3 minutes and try again\n\
         Or visit: https://console.developers.google.com/apis/api/firestore.googleapis.com/overview?project={}",
        project_id
    ))
}

fn print_repos(repos: &[RepoInfo]) {
    if repos.is_empty() {
        println!("No repositories found.");
        return;
    }
    println!("Select a repository with `repo <n>`:");
    for (index, repo) in repos.iter().enumerate() {
        let visibility = if repo.private { " (private)" } else { "" };
        println!("{}. {}{}", index + 1, repo.full_name, visibility);
    }
}
