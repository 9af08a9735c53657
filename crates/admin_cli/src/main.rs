use std::{error::Error, io::Write};

use clap::{Args, Parser, Subcommand, ValueEnum};
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    style::Print,
    terminal,
    terminal::ClearType,
};
use engine::{Engine, LedgerEntryType, MoneyCents};
use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection};

#[derive(Parser, Debug)]
#[command(name = "market_admin")]
#[command(about = "Admin utilities for the marketplace (admins, payments, ledger audits)")]
struct Cli {
    /// Database connection string (also read from `DATABASE_URL`).
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite:./market.db?mode=rwc"
    )]
    database_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a verified admin account; the password is prompted.
    CreateAdmin(CreateAdminArgs),
    /// Credit or debit an account ledger.
    RecordPayment(RecordPaymentArgs),
    /// Replay a ledger and compare it with the stored running balances.
    AuditLedger(AccountArgs),
    Balance(AccountArgs),
}

#[derive(Args, Debug)]
struct CreateAdminArgs {
    #[arg(long)]
    email: String,
    #[arg(long)]
    first_name: String,
    #[arg(long)]
    last_name: String,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EntryKind {
    Credit,
    Debit,
}

#[derive(Args, Debug)]
struct RecordPaymentArgs {
    #[arg(long)]
    email: String,
    #[arg(long, value_enum)]
    kind: EntryKind,
    /// Amount such as `12.50`.
    #[arg(long)]
    amount: MoneyCents,
    #[arg(long)]
    description: String,
}

#[derive(Args, Debug)]
struct AccountArgs {
    #[arg(long)]
    email: String,
}

struct RawModeGuard;

impl RawModeGuard {
    fn enter() -> Result<Self, Box<dyn Error + Send + Sync>> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

fn prompt_password(prompt: &str) -> Result<String, Box<dyn Error + Send + Sync>> {
    let _raw = RawModeGuard::enter()?;

    let mut out = std::io::stderr();
    execute!(
        out,
        cursor::MoveToColumn(0),
        terminal::Clear(ClearType::CurrentLine),
        Print(prompt)
    )?;
    out.flush()?;

    let mut buf = String::new();
    loop {
        let Event::Key(KeyEvent {
            code, modifiers, ..
        }) = event::read()?
        else {
            continue;
        };

        match code {
            KeyCode::Enter => {
                execute!(out, Print("\r\n"))?;
                out.flush()?;
                break;
            }
            KeyCode::Backspace => {
                if buf.pop().is_some() {
                    execute!(out, cursor::MoveLeft(1), Print(" "), cursor::MoveLeft(1))?;
                    out.flush()?;
                }
            }
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
                execute!(out, Print("\r\n"))?;
                out.flush()?;
                return Err("interrupted".into());
            }
            KeyCode::Char(ch) if !modifiers.contains(KeyModifiers::CONTROL) => {
                buf.push(ch);
                execute!(out, Print("*"))?;
                out.flush()?;
            }
            _ => {}
        }
    }

    Ok(buf)
}

fn prompt_password_twice() -> Result<String, Box<dyn Error + Send + Sync>> {
    let mut out = std::io::stderr();
    for _ in 0..3 {
        let p1 = prompt_password("Password: ")?;
        if p1.is_empty() {
            execute!(
                out,
                cursor::MoveToColumn(0),
                terminal::Clear(ClearType::CurrentLine),
                Print("Password must not be empty.\r\n")
            )?;
            continue;
        }

        let p2 = prompt_password("Confirm password: ")?;
        if p1 == p2 {
            return Ok(p1);
        }

        execute!(
            out,
            cursor::MoveToColumn(0),
            terminal::Clear(ClearType::CurrentLine),
            Print("Passwords do not match. Try again.\r\n")
        )?;
    }

    Err("too many attempts".into())
}

async fn connect_db(
    database_url: &str,
) -> Result<DatabaseConnection, Box<dyn Error + Send + Sync>> {
    let db = Database::connect(database_url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();

    let db = connect_db(&cli.database_url).await?;
    let engine = Engine::builder().database(db).build().await?;

    match cli.command {
        Command::CreateAdmin(args) => {
            let password = prompt_password_twice()?;
            let admin = engine
                .create_admin(&args.email, &password, &args.first_name, &args.last_name)
                .await?;
            println!("created admin: {} (id {})", admin.email, admin.id);
        }
        Command::RecordPayment(args) => {
            let entry_type = match args.kind {
                EntryKind::Credit => LedgerEntryType::Credit,
                EntryKind::Debit => LedgerEntryType::Debit,
            };
            let outcome = engine
                .record_payment(
                    &args.email,
                    entry_type,
                    args.amount.cents(),
                    &args.description,
                )
                .await?;
            println!(
                "recorded entry {}: balance {}",
                outcome.value.sequence,
                MoneyCents::new(outcome.value.available_balance_minor)
            );
            if let Some(warning) = outcome.warning {
                eprintln!("warning: {warning}");
            }
        }
        Command::AuditLedger(args) => {
            let account = engine.account_by_email(&args.email).await?;
            let audit = engine.audit_ledger(account.id).await?;
            println!(
                "{} entries, replayed {}, stored {}",
                audit.entries,
                MoneyCents::new(audit.replayed_balance_minor),
                MoneyCents::new(audit.stored_balance_minor)
            );
            if let Some(entry_id) = audit.first_mismatch {
                eprintln!("running balance diverges at entry {entry_id}");
                std::process::exit(1);
            }
        }
        Command::Balance(args) => {
            let account = engine.account_by_email(&args.email).await?;
            let balance = engine.balance(account.id).await?;
            println!("{}: {balance}", account.email);
        }
    }

    Ok(())
}
