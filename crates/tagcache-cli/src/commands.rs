//! Command parsing and dispatch.
//!
//! Each command mirrors a chat command: a scope stands in for the server
//! the command was issued from and a member id for the caller.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use tagcache_core::api::ApiClient;
use tagcache_core::cache::{EntityStore, StateFiles, StoreError};
use tagcache_core::config::Config;
use tagcache_core::models::tag::normalize;
use tagcache_core::models::{MemberId, ScopeId, Tag};
use tagcache_core::refresh::RefreshScheduler;
use tagcache_core::utils::format_age_verbose;

use crate::render::{render_fetch, render_summary};

pub const USAGE: &str = "\
Usage: tagcache <command> [args]

Commands:
  add <scope> <tag>...            Track tags in a scope
  remove <scope> <tag>...         Stop tracking tags in a scope
  list <scope>                    List tracked tags with cache age
  refresh <scope> [tag]           Refresh one tag or every tag in a scope
  show <tag>                      Fetch a tag, falling back to cached data
  age <tag>                       Show how old the cached data for a tag is
  link <scope> <member> <tag>     Link a member to a tag
  unlink <scope> <member>         Remove a member's link
  whois <scope> <member>          Show the tag linked to a member
  profile <scope> <member>        Show the profile linked to a member
  reset <scope>                   Forget everything stored for a scope
  watch                           Refresh every scope periodically until Ctrl+C
  config show                     Print the effective configuration
  config set <field> <value>      Change a setting (api-url, token, kind,
                                  timeout, interval, data-dir, log-dir)
  help                            Show this message";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add { scope: ScopeId, tags: Vec<String> },
    Remove { scope: ScopeId, tags: Vec<String> },
    List { scope: ScopeId },
    Refresh { scope: ScopeId, tag: Option<String> },
    Show { tag: String },
    Age { tag: String },
    Link { scope: ScopeId, member: MemberId, tag: String },
    Unlink { scope: ScopeId, member: MemberId },
    Whois { scope: ScopeId, member: MemberId },
    Profile { scope: ScopeId, member: MemberId },
    Reset { scope: ScopeId },
    Watch,
    ConfigShow,
    ConfigSet { field: String, value: String },
    Help,
}

fn scope_arg(args: &[String], index: usize) -> Result<ScopeId> {
    let raw = args.get(index).context("Missing <scope> argument")?;
    raw.parse()
        .with_context(|| format!("Invalid scope '{}': expected a numeric id", raw))
}

fn member_arg(args: &[String], index: usize) -> Result<MemberId> {
    let raw = args.get(index).context("Missing <member> argument")?;
    raw.parse()
        .with_context(|| format!("Invalid member '{}': expected a numeric id", raw))
}

fn string_arg(args: &[String], index: usize, name: &str) -> Result<String> {
    args.get(index)
        .cloned()
        .with_context(|| format!("Missing <{}> argument", name))
}

fn rest_args(args: &[String], from: usize) -> Result<Vec<String>> {
    let rest: Vec<String> = args.iter().skip(from).cloned().collect();
    if rest.is_empty() {
        bail!("Expected at least one <tag>");
    }
    Ok(rest)
}

impl Command {
    /// Parse arguments, excluding the program name.
    pub fn parse(args: &[String]) -> Result<Self> {
        let Some(name) = args.first() else {
            return Ok(Command::Help);
        };
        let command = match name.as_str() {
            "add" => Command::Add {
                scope: scope_arg(args, 1)?,
                tags: rest_args(args, 2)?,
            },
            "remove" | "rm" => Command::Remove {
                scope: scope_arg(args, 1)?,
                tags: rest_args(args, 2)?,
            },
            "list" | "ls" => Command::List {
                scope: scope_arg(args, 1)?,
            },
            "refresh" => Command::Refresh {
                scope: scope_arg(args, 1)?,
                tag: args.get(2).cloned(),
            },
            "show" => Command::Show {
                tag: string_arg(args, 1, "tag")?,
            },
            "age" => Command::Age {
                tag: string_arg(args, 1, "tag")?,
            },
            "link" => Command::Link {
                scope: scope_arg(args, 1)?,
                member: member_arg(args, 2)?,
                tag: string_arg(args, 3, "tag")?,
            },
            "unlink" => Command::Unlink {
                scope: scope_arg(args, 1)?,
                member: member_arg(args, 2)?,
            },
            "whois" => Command::Whois {
                scope: scope_arg(args, 1)?,
                member: member_arg(args, 2)?,
            },
            "profile" => Command::Profile {
                scope: scope_arg(args, 1)?,
                member: member_arg(args, 2)?,
            },
            "reset" => Command::Reset {
                scope: scope_arg(args, 1)?,
            },
            "watch" => Command::Watch,
            "config" => match args.get(1).map(String::as_str) {
                None | Some("show") => Command::ConfigShow,
                Some("set") => Command::ConfigSet {
                    field: string_arg(args, 2, "field")?,
                    value: string_arg(args, 3, "value")?,
                },
                Some(other) => bail!("Unknown config action '{}'", other),
            },
            "help" | "--help" | "-h" => Command::Help,
            other => bail!("Unknown command '{}'", other),
        };
        Ok(command)
    }
}

async fn open_store(config: &Config) -> Result<EntityStore> {
    let mut client = ApiClient::new(&config.api_base_url)?;
    if let Some(ref token) = config.api_token {
        client = client.with_token(token.as_str());
    }
    let files = StateFiles::new(config.data_dir()?);
    let store = EntityStore::open(client, files, config.request_timeout()).await?;
    Ok(store)
}

/// Run a parsed command against the configured store.
pub async fn run(command: Command, config: Config) -> Result<()> {
    match command {
        Command::Help => println!("{}", USAGE),
        Command::ConfigShow => println!("{}", serde_json::to_string_pretty(&config)?),
        Command::ConfigSet { field, value } => {
            // Persist only what is in the file, not environment overrides.
            let mut stored = Config::load()?;
            stored.set(&field, &value)?;
            stored.save()?;
            println!("Updated {}.", field);
        }
        command => {
            let store = open_store(&config).await?;
            run_with_store(command, &config, store).await?;
        }
    }
    Ok(())
}

async fn run_with_store(command: Command, config: &Config, store: EntityStore) -> Result<()> {
    let kind = config.profile_kind;
    match command {
        Command::Add { scope, tags } => {
            for raw in tags {
                match store.register(scope, &raw).await {
                    Ok(tag) => println!("Added {}.", tag.hashed()),
                    Err(e @ StoreError::Persistence(_)) => return Err(e.into()),
                    Err(e) => println!("{}", e),
                }
            }
        }
        Command::Remove { scope, tags } => {
            for raw in tags {
                match store.unregister(scope, &raw).await {
                    Ok(()) => println!("Removed #{}.", normalize(&raw)),
                    Err(e @ StoreError::Persistence(_)) => return Err(e.into()),
                    Err(e) => println!("{}", e),
                }
            }
        }
        Command::List { scope } => {
            let tags = store.registered(scope).await;
            if tags.is_empty() {
                println!("No tags tracked in scope {}.", scope);
            }
            for tag in tags {
                let age = match store.cache_age(&tag).await {
                    Some(age) => format!("updated {}", format_age_verbose(age)),
                    None => "never fetched".to_string(),
                };
                println!("{:<12} {}", tag.hashed(), age);
            }
        }
        Command::Refresh { scope, tag: Some(raw) } => {
            let result = store.refresh_key(scope, &raw).await;
            if let Err(StoreError::Persistence(e)) = result {
                return Err(e.into());
            }
            let member = match Tag::parse(&raw) {
                Ok(tag) => store.tag_member(scope, &tag).await,
                Err(_) => None,
            };
            println!("{}", render_fetch(&result, kind, member));
        }
        Command::Refresh { scope, tag: None } => {
            let summary = store.refresh_all(scope).await;
            println!("{}", render_summary(&summary));
        }
        Command::Show { tag } => {
            let tag = match Tag::parse(&tag) {
                Ok(tag) => tag,
                Err(e) => {
                    println!("{}", e);
                    return Ok(());
                }
            };
            let result = store.fetch(&tag, config.request_timeout()).await;
            println!("{}", render_fetch(&result, kind, None));
        }
        Command::Age { tag } => {
            let tag = Tag::parse(&tag)?;
            match store.cache_age(&tag).await {
                Some(age) => println!("{} was updated {}.", tag.hashed(), format_age_verbose(age)),
                None => println!("No cached data for {}.", tag.hashed()),
            }
        }
        Command::Link { scope, member, tag } => match store.link_member(scope, member, &tag).await {
            Ok(tag) => println!("Linked {} to {}.", member, tag.hashed()),
            Err(e @ StoreError::Persistence(_)) => return Err(e.into()),
            Err(e) => println!("{}", e),
        },
        Command::Unlink { scope, member } => match store.unlink_member(scope, member).await? {
            Some(tag) => println!("Unlinked {} from {}.", member, tag.hashed()),
            None => println!("{} has no linked tag.", member),
        },
        Command::Whois { scope, member } => match store.member_tag(scope, member).await {
            Some(tag) => println!("{}", tag.hashed()),
            None => println!("{} has no linked tag.", member),
        },
        Command::Profile { scope, member } => match store.member_tag(scope, member).await {
            Some(tag) => {
                let result = store.fetch(&tag, config.request_timeout()).await;
                println!("{}", render_fetch(&result, kind, Some(member)));
            }
            None => println!("{} has no linked tag.", member),
        },
        Command::Reset { scope } => {
            store.reset_scope(scope).await?;
            println!("Scope {} reset.", scope);
        }
        Command::Watch => watch(Arc::new(store), config).await?,
        Command::Help | Command::ConfigShow | Command::ConfigSet { .. } => {}
    }
    Ok(())
}

async fn watch(store: Arc<EntityStore>, config: &Config) -> Result<()> {
    let interval = config.refresh_interval();
    info!(interval_secs = interval.as_secs(), "Starting periodic refresh");
    println!(
        "Refreshing every {} seconds. Press Ctrl+C to stop.",
        interval.as_secs()
    );

    let scheduler = RefreshScheduler::start(store, interval, async {});
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl+C");
    }
    scheduler.shutdown().await;
    println!("Stopped.");
    Ok(())
}
