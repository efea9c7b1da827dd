//! # LessonBell: class schedule assistant for one admin
//!
//! Usage:
//!   lessonbell init                                  # Write a default config
//!   lessonbell run --autostart                       # Bot + lesson notifications
//!   lessonbell timetable set 2026-10-19 --standard   # Bell times of a day
//!   lessonbell lesson add 2026-10-19 1 "Math"        # Schedule a lesson
//!   lessonbell lesson default mon numerator 1 "Math" # Weekly default schedule
//!   lessonbell lesson fill-default 2026-10-19        # Copy defaults into a day
//!   lessonbell show today                            # Lessons of a day

mod bot;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate, Weekday};
use clap::{Parser, Subcommand};
use lessonbell_channels::{TelegramChannel, TelegramConfig};
use lessonbell_core::config::LessonBellConfig;
use lessonbell_core::traits::{Channel, ScheduleStore};
use lessonbell_core::types::{
    LessonId, Period, PeriodSlot, TIME_FORMAT, TimeTable, WeekParity, parse_date, parse_time,
};
use lessonbell_scheduler::{AckHandler, LessonTracker, SystemClock, TrackerSettings};
use lessonbell_security::CorrelationSigner;
use lessonbell_store::SqliteStore;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::bot::Bot;

#[derive(Parser)]
#[command(
    name = "lessonbell",
    version,
    about = "🔔 LessonBell: lesson notifications and attendance over Telegram"
)]
struct Cli {
    /// Path to TOML configuration file (default ~/.lessonbell/config.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a default config file if none exists.
    Init,

    /// Run the Telegram bot and the lesson tracker.
    Run {
        /// Start lesson notifications right away instead of waiting for /timer.
        #[arg(long)]
        autostart: bool,
    },

    /// Manage per-day bell times.
    Timetable {
        #[command(subcommand)]
        action: TimetableAction,
    },

    /// Manage lessons.
    Lesson {
        #[command(subcommand)]
        action: LessonAction,
    },

    /// Manage practice periods.
    Practice {
        #[command(subcommand)]
        action: PracticeAction,
    },

    /// Show the lessons of a day.
    Show {
        /// YYYY-MM-DD, "today" or "tomorrow"
        #[arg(default_value = "today")]
        date: String,
    },
}

#[derive(Subcommand)]
enum TimetableAction {
    /// Set the time-table of a day, replacing any previous one.
    Set {
        date: String,
        /// Use the standard bell schedule as the base.
        #[arg(long)]
        standard: bool,
        /// Period times as N=HH:MM-HH:MM, repeatable.
        #[arg(short, long = "period", value_name = "N=HH:MM-HH:MM")]
        periods: Vec<String>,
    },
    /// Print the time-table of a day.
    Show { date: String },
}

#[derive(Subcommand)]
enum LessonAction {
    /// Add a lesson to a period of a day.
    Add {
        date: String,
        period: u8,
        name: String,
        #[arg(long)]
        note: Option<String>,
    },
    /// Remove a lesson by id.
    Remove { id: i64 },
    /// Set the weekly default lesson of a weekday, week and period.
    Default {
        /// mon, tue, ... sun
        weekday: Weekday,
        /// numerator or denominator
        week: WeekParity,
        period: u8,
        name: String,
    },
    /// Copy the weekly defaults into a day, keeping lessons already set.
    FillDefault { date: String },
}

#[derive(Subcommand)]
enum PracticeAction {
    /// Begin a practice block.
    Start {
        date: String,
        /// Daily start, HH:MM
        from: String,
        /// Daily end, HH:MM
        to: String,
    },
    /// Close the practice that started on START_DATE.
    End { start_date: String, end_date: String },
    /// List practices.
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "lessonbell=debug,lessonbell_scheduler=debug,lessonbell_store=debug,lessonbell_channels=debug"
    } else {
        "lessonbell=info,lessonbell_scheduler=info,lessonbell_store=info,lessonbell_channels=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config_path = match &cli.config {
        Some(path) => PathBuf::from(shellexpand::tilde(path).to_string()),
        None => LessonBellConfig::default_path(),
    };

    if let Command::Init = cli.command {
        return init_config(&config_path);
    }

    let config = if config_path.exists() {
        LessonBellConfig::load_from(&config_path)?
    } else {
        LessonBellConfig::default()
    };
    let config = config.with_env_overrides();

    let store_path = config.store.expanded_path();
    let store = Arc::new(
        SqliteStore::open(&store_path)
            .with_context(|| format!("opening schedule store {}", store_path.display()))?,
    );

    match cli.command {
        Command::Init => Ok(()),
        Command::Run { autostart } => run(config, store, autostart).await,
        Command::Timetable { action } => timetable(&store, action).await,
        Command::Lesson { action } => lesson(&store, action),
        Command::Practice { action } => practice(&store, action),
        Command::Show { date } => show(&store, parse_day(&date)?).await,
    }
}

fn init_config(path: &std::path::Path) -> Result<()> {
    if path.exists() {
        println!("⚠️  Config already exists at {}", path.display());
        return Ok(());
    }
    LessonBellConfig::default().save_to(path)?;
    println!("✅ Config written to {}", path.display());
    println!("   Set telegram.bot_token, telegram.admin_chat_id and security.secret_key.");
    Ok(())
}

async fn run(config: LessonBellConfig, store: Arc<SqliteStore>, autostart: bool) -> Result<()> {
    config.validate_for_run()?;

    let telegram = TelegramChannel::new(TelegramConfig::from(&config.telegram));
    let me = telegram.get_me().await.context("connecting to Telegram")?;
    info!(
        "🤖 Telegram bot: @{} ({})",
        me.username.as_deref().unwrap_or("unknown"),
        me.first_name
    );

    let channel: Arc<dyn Channel> = Arc::new(telegram.clone());
    let signer = CorrelationSigner::new(config.security.secret_key.as_bytes())?;
    let tracker = LessonTracker::new(
        store.clone(),
        channel.clone(),
        signer.clone(),
        Arc::new(SystemClock),
        TrackerSettings::from_config(&config),
    );
    let bot = Bot::new(
        config.telegram.admin_chat_id,
        channel,
        tracker.clone(),
        AckHandler::new(store, signer),
    );

    if autostart {
        tracker.start().await;
    }

    let updates = telegram.start_polling();
    tokio::select! {
        _ = bot.run(updates) => info!("Update stream closed"),
        _ = tokio::signal::ctrl_c() => info!("Shutting down"),
    }
    tracker.stop().await;
    Ok(())
}

async fn timetable(store: &SqliteStore, action: TimetableAction) -> Result<()> {
    match action {
        TimetableAction::Set {
            date,
            standard,
            periods,
        } => {
            let date = parse_day(&date)?;
            let mut table = if standard {
                TimeTable::standard(date)
            } else {
                TimeTable::new(date)
            };
            for spec in &periods {
                let (period, slot) = parse_period_slot(spec)?;
                table.set_slot(period, slot);
            }
            if table.slots().next().is_none() {
                bail!("time-table has no periods; pass --standard or --period");
            }
            store.set_timetable(&table)?;
            print_timetable(&table);
        }
        TimetableAction::Show { date } => {
            let date = parse_day(&date)?;
            match store.timetable_for_date(date).await? {
                Some(table) => print_timetable(&table),
                None => println!("No time-table for {date}"),
            }
        }
    }
    Ok(())
}

fn lesson(store: &SqliteStore, action: LessonAction) -> Result<()> {
    match action {
        LessonAction::Add {
            date,
            period,
            name,
            note,
        } => {
            let date = parse_day(&date)?;
            let id = store.add_lesson(date, Period::new(period)?, &name, note.as_deref())?;
            println!("✅ Lesson #{id} added: {date}, period {period}, {name}");
        }
        LessonAction::Remove { id } => {
            if store.remove_lesson(LessonId(id))? {
                println!("🗑️  Lesson #{id} removed");
            } else {
                bail!("no lesson with id {id}");
            }
        }
        LessonAction::Default {
            weekday,
            week,
            period,
            name,
        } => {
            store.set_default_lesson(weekday, week, Period::new(period)?, &name)?;
            println!("✅ Default lesson set: {weekday} ({week} week), period {period}, {name}");
        }
        LessonAction::FillDefault { date } => {
            let date = parse_day(&date)?;
            let added = store.fill_default_lessons(date)?;
            if added.is_empty() {
                println!("No default lessons to add on {date} ({} week)", WeekParity::of(date));
            } else {
                println!("✅ {} default lesson(s) added on {date}", added.len());
            }
        }
    }
    Ok(())
}

fn practice(store: &SqliteStore, action: PracticeAction) -> Result<()> {
    match action {
        PracticeAction::Start { date, from, to } => {
            let date = parse_day(&date)?;
            let id = store.start_practice(date, parse_time(&from)?, parse_time(&to)?)?;
            println!("✅ Practice #{id} started on {date} ({from}-{to})");
        }
        PracticeAction::End {
            start_date,
            end_date,
        } => {
            let start = parse_day(&start_date)?;
            let end = parse_day(&end_date)?;
            if !store.end_practice(start, end)? {
                bail!("no practice starts on {start}");
            }
            println!("✅ Practice of {start} ended on {end}");
        }
        PracticeAction::List => {
            let practices = store.practices()?;
            if practices.is_empty() {
                println!("No practices");
            }
            for p in practices {
                let state = if p.active { "ongoing" } else { "finished" };
                let end = p.end_date.map(|d| d.to_string()).unwrap_or_else(|| "…".into());
                println!(
                    "#{:<3} {} → {}  {}-{}  {state}",
                    p.id,
                    p.start_date,
                    end,
                    p.time_from.format(TIME_FORMAT),
                    p.time_to.format(TIME_FORMAT)
                );
            }
        }
    }
    Ok(())
}

async fn show(store: &SqliteStore, date: NaiveDate) -> Result<()> {
    if let Some(practice) = store.current_practice(date)? {
        println!(
            "🏭 Practice day ({}-{})",
            practice.time_from.format(TIME_FORMAT),
            practice.time_to.format(TIME_FORMAT)
        );
    }

    let lessons = store.lessons_for_date(date).await?;
    if lessons.is_empty() {
        let rows = store.lessons_on(date)?;
        if rows.is_empty() {
            println!("No lessons on {date}");
        } else {
            println!("{} lesson(s) on {date} but no time-table; set one first", rows.len());
        }
        return Ok(());
    }

    println!("📚 Lessons on {date} ({} week):", WeekParity::of(date));
    for l in lessons {
        let mark = if l.attended { "✅" } else { "  " };
        println!(
            "{mark} #{:<4} {}. {}-{}  {}{}",
            l.id,
            l.period,
            l.start.format(TIME_FORMAT),
            l.end.format(TIME_FORMAT),
            l.name,
            l.note.map(|n| format!("  ({n})")).unwrap_or_default()
        );
    }
    Ok(())
}

fn print_timetable(table: &TimeTable) {
    println!("🕗 Time-table for {}:", table.date);
    for (period, slot) in table.slots() {
        println!(
            "   {period}. {}-{}",
            slot.start.format(TIME_FORMAT),
            slot.end.format(TIME_FORMAT)
        );
    }
}

/// `YYYY-MM-DD`, `today` or `tomorrow`.
fn parse_day(value: &str) -> Result<NaiveDate> {
    let today = Local::now().date_naive();
    Ok(match value {
        "today" => today,
        "tomorrow" => today.succ_opt().context("date out of range")?,
        other => parse_date(other)?,
    })
}

/// `N=HH:MM-HH:MM`.
fn parse_period_slot(spec: &str) -> Result<(Period, PeriodSlot)> {
    let (period, times) = spec
        .split_once('=')
        .with_context(|| format!("expected N=HH:MM-HH:MM, got '{spec}'"))?;
    let (start, end) = times
        .split_once('-')
        .with_context(|| format!("expected HH:MM-HH:MM, got '{times}'"))?;
    let period: u8 = period
        .trim()
        .parse()
        .with_context(|| format!("bad period '{period}'"))?;
    Ok((Period::new(period)?, PeriodSlot::parse(start.trim(), end.trim())?))
}
