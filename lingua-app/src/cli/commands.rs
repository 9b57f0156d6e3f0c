use crate::api::routes::AppState;
use crate::api::server as api_server;
use crate::cli::opts::*;
use crate::retry::retry_on_conflict;

use anyhow::{anyhow, Context, Result};
use lingua_core::{
    stats::{status_counts, summarize_reviews},
    workflow::{
        create_card, due_cards, record_daily_activity, submit_review, user_statistics, user_streak,
    },
    Clock, Repository, SystemClock,
};
use lingua_json::paths::{default_sqlite_file, StorePaths};
use lingua_json::JsonStore;
use lingua_sqlite::SqliteRepo;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

pub async fn run_cli(args: Cli) -> Result<()> {
    let repo = open_repo(&args.store, args.json_path.clone(), args.db_path.clone()).await?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let ctx = Ctx {
        repo,
        clock,
        user: args.user.clone(),
        max_attempts: args.max_attempts,
    };

    match args.cmd {
        Command::Card(cmd) => card_cmd(&ctx, cmd).await,
        Command::Due => due_cmd(&ctx).await,
        Command::Review { card_id, grade } => review_cmd(&ctx, &card_id, &grade).await,
        Command::Activity(cmd) => activity_cmd(&ctx, cmd).await,
        Command::Streak => {
            let s = user_streak(&*ctx.repo, ctx.clock.as_ref(), &ctx.user).await?;
            let today = if s.has_activity_today { "yes" } else { "no" };
            println!("streak={}\ttoday={}", s.current_streak, today);
            Ok(())
        }
        Command::Progress { language } => progress_cmd(&ctx, language).await,
        Command::Stats => stats_cmd(&ctx).await,
        Command::Export(cmd) => export_cmd(&ctx, cmd).await,
        Command::Api(api) => {
            let addr: std::net::SocketAddr = api.addr.parse()?;
            let state = AppState {
                repo: ctx.repo,
                clock: ctx.clock,
                max_attempts: ctx.max_attempts,
            };
            api_server::run(state, addr).await
        }
    }
}

struct Ctx {
    repo: Arc<dyn Repository>,
    clock: Arc<dyn Clock>,
    user: String,
    max_attempts: u32,
}

pub async fn open_repo(
    store: &StoreKind,
    json_path: Option<PathBuf>,
    db_path: Option<PathBuf>,
) -> Result<Arc<dyn Repository>> {
    match store {
        StoreKind::Json => {
            let s = match json_path {
                Some(p) => {
                    let paths = StorePaths::for_file(p);
                    JsonStore::open_with(paths.file, paths.backups, 10).await?
                }
                None => JsonStore::open_default().await?,
            };
            Ok(Arc::new(s))
        }
        StoreKind::Sqlite => {
            let p = db_path.unwrap_or_else(default_sqlite_file);
            if let Some(parent) = p.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
            let s = SqliteRepo::open_file(&p).await?;
            Ok(Arc::new(s))
        }
    }
}

async fn card_cmd(ctx: &Ctx, cmd: CardCmd) -> Result<()> {
    match cmd {
        CardCmd::Add { vocabulary_id } => {
            let c = create_card(&*ctx.repo, ctx.clock.as_ref(), &ctx.user, &vocabulary_id).await?;
            println!("{}", c.id);
        }
        CardCmd::List => {
            let mut cards = ctx.repo.list_cards(&ctx.user).await?;
            cards.sort_by_key(|c| c.created_at);
            for c in cards {
                let last = c
                    .last_review()
                    .map(|e| e.grade.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{}\t{}\t{}\tease={:.2}\tinterval={}\tnext={}\tlast={}",
                    c.id,
                    c.vocabulary_id,
                    c.status,
                    c.ease_factor,
                    c.interval_days,
                    c.next_review_at.format("%Y-%m-%d %H:%M"),
                    last
                );
            }
        }
        CardCmd::Rm { card_id } => {
            let id = parse_uuid(&card_id)?;
            ctx.repo.delete_card(&ctx.user, id).await?;
            println!("ok");
        }
    }
    Ok(())
}

async fn due_cmd(ctx: &Ctx) -> Result<()> {
    let due: Vec<_> = due_cards(&*ctx.repo, ctx.clock.as_ref(), &ctx.user)
        .await?
        .collect();
    if due.is_empty() {
        println!("no cards due");
        return Ok(());
    }
    for c in due {
        println!(
            "{}\t{}\t{}\tdue={}",
            c.id,
            c.vocabulary_id,
            c.status,
            c.next_review_at.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}

async fn review_cmd(ctx: &Ctx, card_id: &str, grade: &str) -> Result<()> {
    let id = parse_uuid(card_id)?;
    let card = retry_on_conflict(ctx.max_attempts, || {
        submit_review(&*ctx.repo, ctx.clock.as_ref(), &ctx.user, id, grade)
    })
    .await?;
    println!(
        "{} -> next due in {} day(s), ease {:.2}",
        card.status, card.interval_days, card.ease_factor
    );
    Ok(())
}

async fn activity_cmd(ctx: &Ctx, cmd: ActivityCmd) -> Result<()> {
    let ledger = retry_on_conflict(ctx.max_attempts, || {
        record_daily_activity(
            &*ctx.repo,
            ctx.clock.as_ref(),
            &ctx.user,
            &cmd.language,
            cmd.minutes,
        )
    })
    .await?;
    println!(
        "{}\tstreak={}\ttime={}m",
        ledger.language, ledger.streak_days, ledger.total_time_spent
    );
    Ok(())
}

async fn progress_cmd(ctx: &Ctx, language: Option<String>) -> Result<()> {
    let ledgers = match language {
        Some(lang) => vec![ctx.repo.get_ledger(&ctx.user, lang.trim()).await?],
        None => ctx.repo.list_ledgers(&ctx.user).await?,
    };
    for l in ledgers {
        let last = l
            .last_activity
            .map(|t| t.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{}\tstreak={}\tlast={}\ttime={}m\tlearned={}\tmastered={}",
            l.language,
            l.streak_days,
            last,
            l.total_time_spent,
            l.vocabulary_learned,
            l.vocabulary_mastered
        );
    }
    Ok(())
}

#[derive(serde::Serialize)]
struct StatsReport {
    progress: lingua_core::LearningStatistics,
    cards: lingua_core::StatusCounts,
    reviews: lingua_core::ReviewSummary,
}

async fn stats_cmd(ctx: &Ctx) -> Result<()> {
    let progress = user_statistics(&*ctx.repo, &ctx.user).await?;
    let cards = ctx.repo.list_cards(&ctx.user).await?;
    let report = StatsReport {
        progress,
        cards: status_counts(&cards),
        reviews: summarize_reviews(&cards),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[derive(serde::Serialize)]
struct ExportBundle {
    version: u32,
    user_id: String,
    cards: Vec<lingua_core::ReviewCard>,
    progress: Vec<lingua_core::ActivityLedger>,
}

async fn export_cmd(ctx: &Ctx, cmd: ExportCmd) -> Result<()> {
    let mut cards = ctx.repo.list_cards(&ctx.user).await?;
    cards.sort_by_key(|c| c.created_at);
    match cmd {
        ExportCmd::Json { path } => {
            let bundle = ExportBundle {
                version: 1,
                user_id: ctx.user.clone(),
                cards,
                progress: ctx.repo.list_ledgers(&ctx.user).await?,
            };
            let s = serde_json::to_string_pretty(&bundle)?;
            std::fs::write(&path, s).with_context(|| format!("writing {}", path.display()))?;
            println!("wrote {}", path.display());
        }
        ExportCmd::Csv { path } => {
            let mut wtr = csv::Writer::from_path(&path)?;
            wtr.write_record([
                "id",
                "vocabulary_id",
                "status",
                "ease_factor",
                "interval_days",
                "next_review_at",
                "reviews",
            ])?;
            for c in cards {
                wtr.write_record([
                    c.id.to_string(),
                    c.vocabulary_id,
                    c.status.to_string(),
                    format!("{:.2}", c.ease_factor),
                    c.interval_days.to_string(),
                    c.next_review_at.to_rfc3339(),
                    c.review_history.len().to_string(),
                ])?;
            }
            wtr.flush()?;
            println!("wrote {}", path.display());
        }
    }
    Ok(())
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|_| anyhow!("invalid card id: {s}"))
}
