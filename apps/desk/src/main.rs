use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    config::expand_base_urls, load_settings, ApiClient, ClientEvent, DropPlacement, NoticeLevel,
    OpportunityApi, ReorderOutcome, SavedList, SessionStore, Settings, SwipeController,
};
use shared::{
    domain::OpportunityId,
    protocol::{NewOpportunity, ProfileUpdate, PublicStats},
};
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

mod swipe_session;

#[derive(Parser, Debug)]
#[command(name = "desk", about = "Producer-Producer job feed in the terminal")]
struct Cli {
    /// API base URLs, comma separated; `local` and `prod` expand to the
    /// known hosts.
    #[arg(long)]
    api: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Email a sign-in code and link.
    Login { email: String },
    /// Finish signing in with the emailed code or link token.
    Verify {
        #[arg(long)]
        email: Option<String>,
        #[arg(long, requires = "email", conflicts_with = "token")]
        code: Option<String>,
        #[arg(long)]
        token: Option<String>,
    },
    Logout,
    Whoami,
    /// Shows or edits the profile.
    Profile {
        #[arg(long)]
        name: Option<String>,
    },
    /// Lists the working list without deciding anything.
    Feed {
        /// Use the personalized feed when signed in.
        #[arg(long)]
        for_me: bool,
        #[arg(long)]
        company: Option<String>,
    },
    /// Companies in the feed by number of listings.
    Companies {
        /// Shows only this company's listings.
        #[arg(long)]
        select: Option<String>,
        #[arg(long)]
        for_me: bool,
    },
    /// Interactive swipe session.
    Swipe {
        #[arg(long)]
        for_me: bool,
    },
    Saved,
    /// Moves a saved job before or after another one.
    Move {
        id: i64,
        #[arg(long, conflicts_with = "after")]
        before: Option<i64>,
        #[arg(long)]
        after: Option<i64>,
    },
    /// Marks a saved job as applied.
    Applied { id: i64 },
    Config {
        #[arg(long)]
        digest_enabled: Option<bool>,
        #[arg(long)]
        digest_threshold: Option<i64>,
    },
    Stats {
        #[arg(long)]
        admin: bool,
    },
    AddJob {
        #[arg(long)]
        url: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        company: String,
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let mut settings = load_settings().context("failed to load settings")?;
    if let Some(raw) = &cli.api {
        let urls = expand_base_urls(raw);
        if urls.is_empty() {
            bail!("--api did not contain any base URL");
        }
        settings.api.base_urls = urls;
    }
    let store = settings.resolved_session_path().map(SessionStore::new);
    let api = ApiClient::new(&settings.api, store)?;

    run(cli.command, api, &settings).await
}

async fn run(command: Command, api: Arc<ApiClient>, settings: &Settings) -> Result<()> {
    match command {
        Command::Login { email } => {
            api.request_magic_link(&email).await?;
            println!("Check your inbox, then run `desk verify --email {email} --code <code>`.");
        }
        Command::Verify { email, code, token } => {
            let user = match (token, email, code) {
                (Some(token), _, _) => api.verify_magic_link(&token).await?,
                (None, Some(email), Some(code)) => api.verify_code(&email, &code).await?,
                _ => bail!("pass either --token or both --email and --code"),
            };
            println!("Signed in as {}", user.display_name());
        }
        Command::Logout => {
            api.logout().await;
            println!("Signed out.");
        }
        Command::Whoami => {
            if !api.is_authenticated().await {
                println!("Not signed in.");
            } else {
                let user = api.me().await?;
                println!("{} <{}>", user.display_name(), user.email);
            }
        }
        Command::Profile { name } => {
            require_sign_in(&api).await?;
            let user = if name.is_some() {
                let user = api.update_profile(&ProfileUpdate { name }).await?;
                println!("Profile saved.");
                user
            } else {
                api.profile().await?
            };
            println!("{} <{}>", user.display_name(), user.email);
        }
        Command::Feed { for_me, company } => {
            let mut controller = feed_controller(&api, settings, for_me);
            if let Some(company) = &company {
                controller.toggle_company(company);
            }
            controller.load().await?;
            print_feed(&controller);
        }
        Command::Companies { select, for_me } => {
            let mut controller = feed_controller(&api, settings, for_me);
            if let Some(company) = &select {
                controller.toggle_company(company);
            }
            controller.load().await?;
            print_companies(&controller);
            if controller.company_filter().is_some() {
                print_feed(&controller);
            }
        }
        Command::Swipe { for_me } => {
            let mut settings = settings.clone();
            settings.feed.personalized |= for_me;
            swipe_session::run(api, &settings).await?
        }
        Command::Saved => {
            require_sign_in(&api).await?;
            let list = saved_list(&api, settings);
            list.load().await?;
            print_saved(&list).await;
        }
        Command::Move { id, before, after } => {
            require_sign_in(&api).await?;
            let (target, placement) = match (before, after) {
                (Some(target), None) => (target, DropPlacement::Before),
                (None, Some(target)) => (target, DropPlacement::After),
                _ => bail!("pass exactly one of --before or --after"),
            };
            let list = saved_list(&api, settings);
            let mut events = api.subscribe_events();
            list.load().await?;
            let outcome = list
                .move_item(OpportunityId(id), OpportunityId(target), placement)
                .await?;
            match outcome {
                ReorderOutcome::Saved(_) => println!("Order saved."),
                ReorderOutcome::Unchanged => println!("Nothing to move."),
                ReorderOutcome::Skipped => println!("Another reorder is still saving."),
                ReorderOutcome::Reloaded => {
                    print_notices(&mut events);
                    println!("Order not saved; showing the stored order.");
                }
            }
            print_saved(&list).await;
        }
        Command::Applied { id } => {
            require_sign_in(&api).await?;
            let list = saved_list(&api, settings);
            list.load().await?;
            list.mark_applied(OpportunityId(id)).await?;
            println!("Marked {id} as applied.");
        }
        Command::Config {
            digest_enabled,
            digest_threshold,
        } => {
            require_sign_in(&api).await?;
            let mut config = api.user_config().await?;
            if digest_enabled.is_some() || digest_threshold.is_some() {
                if let Some(enabled) = digest_enabled {
                    config.digest_enabled = enabled;
                }
                if let Some(threshold) = digest_threshold {
                    config.digest_threshold = threshold;
                }
                config = api.update_user_config(&config).await?;
                println!("Settings saved.");
            }
            println!("digest_enabled   = {}", config.digest_enabled);
            println!("digest_threshold = {}", config.digest_threshold);
        }
        Command::Stats { admin } => {
            if admin {
                require_sign_in(&api).await?;
                let stats = api.admin_stats().await?;
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_stats(&api.public_stats().await?);
            }
        }
        Command::AddJob {
            url,
            title,
            company,
            location,
            notes,
        } => {
            require_sign_in(&api).await?;
            let created = api
                .add_opportunity(&NewOpportunity {
                    url,
                    title,
                    company_name: company,
                    location,
                    notes,
                })
                .await?;
            println!("Added {} (id {}); it will be scored shortly.", created.title, created.id);
        }
    }
    Ok(())
}

fn feed_controller(api: &Arc<ApiClient>, settings: &Settings, for_me: bool) -> SwipeController {
    let mut feed = settings.feed.clone();
    feed.personalized |= for_me;
    SwipeController::new(api.clone(), feed, api.event_sender())
}

fn print_feed(controller: &SwipeController) {
    if controller.deck().is_empty() {
        println!("You're all caught up.");
    }
    for item in controller.deck().items() {
        println!(
            "{:>5}  {:<8} {} @ {}",
            item.id.0,
            item.score.map(|s| format!("{s:.1}")).unwrap_or_default(),
            item.title,
            item.company_label()
        );
    }
}

fn print_companies(controller: &SwipeController) {
    let companies = controller.companies();
    if companies.is_empty() {
        println!("Company insights will appear once the feed has listings.");
        return;
    }
    let total: usize = companies.iter().map(|row| row.count).sum();
    match controller.company_filter() {
        Some(selected) => println!(
            "{} companies · {total} matching roles · Filter: {selected}",
            companies.len()
        ),
        None => println!("{} companies · {total} matching roles", companies.len()),
    }
    for row in companies {
        let marker = if controller.company_filter() == Some(row.company.as_str()) {
            '*'
        } else {
            ' '
        };
        println!("{marker} {:<30} {}", row.company, row.count);
    }
}

async fn require_sign_in(api: &ApiClient) -> Result<()> {
    if !api.is_authenticated().await {
        bail!("not signed in; run `desk login <email>` first");
    }
    Ok(())
}

fn saved_list(api: &Arc<ApiClient>, settings: &Settings) -> SavedList {
    SavedList::new(api.clone(), settings.feed.saved_limit, api.event_sender())
}

async fn print_saved(list: &SavedList) {
    let items = list.items().await;
    if items.is_empty() {
        println!("No saved jobs yet.");
    }
    for (index, item) in items.iter().enumerate() {
        println!("{:>3}. [{}] {}", index + 1, item.opportunity_id, item.title());
    }
    let applied = list.applied_ids().await;
    if !applied.is_empty() {
        println!("{} applied.", applied.len());
    }
}

/// Prints queued notices; returns `true` when the session was invalidated.
pub(crate) fn print_notices(events: &mut broadcast::Receiver<ClientEvent>) -> bool {
    let mut invalidated = false;
    while let Ok(event) = events.try_recv() {
        match event {
            ClientEvent::Notice(notice) => match notice.level {
                NoticeLevel::Info => println!("{}", notice.message),
                NoticeLevel::Error => eprintln!("error: {}", notice.message),
            },
            ClientEvent::SessionInvalidated => {
                eprintln!("Your session expired; sign in again.");
                invalidated = true;
            }
            ClientEvent::AuthChanged { .. } => {}
        }
    }
    invalidated
}

fn print_stats(stats: &PublicStats) {
    let count = |value: Option<u64>| value.map(|v| v.to_string()).unwrap_or_else(|| "-".into());
    let pct = |value: Option<f64>| value.map(|v| format!("{v:.0}%")).unwrap_or_else(|| "-".into());
    println!(
        "opportunities: {} total, {} active",
        count(stats.total_opportunities),
        count(stats.active_opportunities)
    );
    println!(
        "added: {} in 24h, {} in 7d",
        count(stats.opportunities_added_24h),
        count(stats.opportunities_added_7d)
    );
    println!(
        "companies: {} total, {} active",
        count(stats.total_companies),
        count(stats.active_companies)
    );
    println!(
        "remote: {}  with salary: {}",
        pct(stats.remote_percentage),
        pct(stats.has_salary_percentage)
    );
    if let Some((passed, failed, pending)) = stats
        .filter_status_counts
        .as_ref()
        .and_then(|counts| counts.percentages())
    {
        println!("filters: {passed:.0}% passed, {failed:.0}% failed, {pending:.0}% pending");
    }
    for company in stats.top_companies_by_listings.iter().take(5) {
        println!("  {:<30} {}", company.company_name, company.count);
    }
}
