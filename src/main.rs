use clap::{Parser, Subcommand};
use color_eyre::eyre::eyre;
use color_eyre::Result;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use fantasy_admin::admin::autojoin::{can_trigger, monitor_line};
use fantasy_admin::admin::bulk::{BulkEdit, MAX_LISTED_ERRORS};
use fantasy_admin::api::types::{ActiveStatus, InjuryBanKind};
use fantasy_admin::app::{App, Navigator};
use fantasy_admin::cache::CacheEntry;
use fantasy_admin::config::{self, Config};
use fantasy_admin::mutation::MutationTask;
use fantasy_admin::prefs::Theme;

#[derive(Parser, Debug)]
#[command(name = "ffadmin")]
#[command(about = "Admin client for the fantasy football platform")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/ffadmin/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Sign in (password from FFADMIN_PASSWORD)
  Login {
    #[arg(short, long)]
    email: Option<String>,
  },
  /// Sign out and forget the saved session
  Logout,
  /// Show the signed-in administrator
  Whoami,
  /// Feedback title categories
  #[command(subcommand)]
  Feedback(FeedbackCommand),
  /// Platform users
  #[command(subcommand)]
  Users(UsersCommand),
  /// Players on the active roster
  Roster,
  /// Record an injury or ban against a roster player
  Injury {
    player: String,
    kind: InjuryBanKind,
    description: String,
    #[arg(long = "return")]
    expected_return: Option<String>,
  },
  /// List game weeks
  Gameweeks,
  /// Auto-join job monitor
  #[command(subcommand)]
  Autojoin(AutoJoinCommand),
  /// UI preferences
  #[command(subcommand)]
  Prefs(PrefsCommand),
  /// Upload an image through the upload proxy
  Upload {
    file: PathBuf,
    #[arg(long, default_value = "players")]
    folder: String,
  },
}

#[derive(Subcommand, Debug)]
enum FeedbackCommand {
  List,
  Create {
    title: String,
    #[arg(long)]
    major: bool,
  },
  Status {
    id: String,
    status: ActiveStatus,
  },
  Delete {
    id: String,
  },
}

#[derive(Subcommand, Debug)]
enum UsersCommand {
  List,
  /// Apply the same field values to many users in one request
  Bulk {
    /// Comma-separated user ids
    #[arg(long, value_delimiter = ',', required = true)]
    ids: Vec<String>,
    /// field=value, value parsed as JSON when possible
    #[arg(long = "set", required = true)]
    fields: Vec<String>,
  },
}

#[derive(Subcommand, Debug)]
enum AutoJoinCommand {
  Status { gameweek: String },
  Trigger { gameweek: String },
  /// Poll the status every 30 seconds until interrupted
  Watch { gameweek: String },
}

#[derive(Subcommand, Debug)]
enum PrefsCommand {
  Show,
  Theme { theme: Theme },
  Sidebar {
    #[arg(action = clap::ArgAction::Set)]
    open: bool,
  },
}

/// Prints the reason and points the operator at `ffadmin login`.
struct CliNavigator;

impl Navigator for CliNavigator {
  fn redirect_to_login(&self, reason: &str) {
    eprintln!("Session ended ({}). Run `ffadmin login` to sign in again.", reason);
  }
}

fn init_logging() -> Option<WorkerGuard> {
  let dir = config::data_dir().ok()?;
  std::fs::create_dir_all(&dir).ok()?;
  let appender = tracing_appender::rolling::never(dir, "ffadmin.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  let filter =
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fantasy_admin=info"));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(writer)
    .with_ansi(false)
    .init();

  Some(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;
  let _log_guard = init_logging();

  let args = Args::parse();
  let config = Config::load(args.config.as_deref())?;
  let app = App::new(config, Arc::new(CliNavigator))?;

  let result = run(&app, args.command).await;
  print_notifications(&app);
  result
}

async fn run(app: &App, command: Command) -> Result<()> {
  let client = app.client();
  let notifications = app.notifications();

  match command {
    Command::Login { email } => {
      let email = email
        .or_else(|| app.config().api.email.clone())
        .ok_or_else(|| eyre!("No email given. Pass --email or set api.email in the config."))?;
      let password = Config::get_password()?;
      let user = client.login(&email, &password).await?;
      notifications.success("Signed in", format!("Welcome, {}", user.name));
    }
    Command::Logout => {
      client.logout()?;
      notifications.info("Signed out", "Saved session removed");
    }
    Command::Whoami => match app.session().identity() {
      Some(user) => println!(
        "{} <{}> on {}",
        user.name,
        user.email,
        app.config().display_title()
      ),
      None => println!("Not signed in"),
    },
    Command::Feedback(cmd) => feedback(app, cmd).await?,
    Command::Users(cmd) => users(app, cmd).await?,
    Command::Roster => {
      let roster = client.roster_players().await;
      if let Some(players) = show(app, "Could not load roster", &roster) {
        for p in players {
          println!(
            "{:<26} {:<24} {:<5} {:<4} {}",
            p.id,
            p.name,
            p.team.as_deref().unwrap_or("-"),
            p.position.as_deref().unwrap_or("-"),
            p.price.map(|v| format!("{:.1}", v)).unwrap_or_default()
          );
        }
      }
    }
    Command::Injury {
      player,
      kind,
      description,
      expected_return,
    } => {
      match client
        .create_injury_ban(&player, kind, &description, expected_return)
        .await
      {
        Ok(task) => report(app, "Injury/Ban recorded", "Failed to record injury/ban", task),
        Err(e) => {
          notifications.report_error("Add Injury/Ban unavailable", e);
        }
      }
    }
    Command::Gameweeks => {
      let weeks = client.game_weeks().await;
      if let Some(weeks) = show(app, "Could not load game weeks", &weeks) {
        for w in weeks {
          println!(
            "{:<26} GW{:<3} {:<20} {}",
            w.id,
            w.number,
            w.deadline.as_deref().unwrap_or("-"),
            w.status.as_deref().unwrap_or("-")
          );
        }
      }
    }
    Command::Autojoin(cmd) => autojoin(app, cmd).await?,
    Command::Prefs(cmd) => {
      let prefs = match cmd {
        PrefsCommand::Show => app.preferences().load()?,
        PrefsCommand::Theme { theme } => app.preferences().update(|p| p.theme = theme)?,
        PrefsCommand::Sidebar { open } => app.preferences().update(|p| p.sidebar_open = open)?,
      };
      println!("theme: {:?}\nsidebar open: {}", prefs.theme, prefs.sidebar_open);
    }
    Command::Upload { file, folder } => {
      let bytes = std::fs::read(&file)
        .map_err(|e| eyre!("Failed to read {}: {}", file.display(), e))?;
      let file_name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());
      let task = client.upload_image(&folder, &file_name, bytes).await;
      if let Some(image) = &task.result {
        println!("{}", image.secure_url);
      }
      report(app, "Image uploaded", "Upload failed", task);
    }
  }

  Ok(())
}

async fn feedback(app: &App, cmd: FeedbackCommand) -> Result<()> {
  let client = app.client();
  match cmd {
    FeedbackCommand::List => {
      let titles = client.feedback_titles().await;
      if let Some(titles) = show(app, "Could not load feedback titles", &titles) {
        for t in titles {
          println!(
            "{:<26} {:<8} {:<5} {}",
            t.id,
            t.status.as_str(),
            if t.major { "major" } else { "" },
            t.title
          );
        }
      }
    }
    FeedbackCommand::Create { title, major } => {
      match client.create_feedback_title(&title, major.then_some(true)).await {
        Ok(task) => report(app, "Feedback title created", "Failed to create feedback title", task),
        Err(e) => {
          app.notifications().report_error("Invalid feedback title", e);
        }
      }
    }
    FeedbackCommand::Status { id, status } => {
      let task = client.set_feedback_title_status(&id, status).await;
      report(app, "Status updated", "Failed to update status", task);
    }
    FeedbackCommand::Delete { id } => {
      let task = client.delete_feedback_title(&id).await;
      report(app, "Feedback title deleted", "Failed to delete feedback title", task);
    }
  }
  Ok(())
}

async fn users(app: &App, cmd: UsersCommand) -> Result<()> {
  let client = app.client();
  match cmd {
    UsersCommand::List => {
      let users = client.users().await;
      if let Some(users) = show(app, "Could not load users", &users) {
        for u in users {
          println!(
            "{:<26} {:<24} {:<30} {:<8} {}",
            u.id,
            u.name,
            u.email,
            u.status.as_deref().unwrap_or("-"),
            u.team_name.as_deref().unwrap_or("-")
          );
        }
      }
    }
    UsersCommand::Bulk { ids, fields } => {
      let mut edit = BulkEdit::new();
      for id in ids {
        edit.select(id);
      }
      for field in fields {
        let (name, raw) = field
          .split_once('=')
          .ok_or_else(|| eyre!("Expected field=value, got '{}'", field))?;
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        edit.set_field(name.trim(), value);
      }

      let task = match client.bulk_update_users(&edit).await {
        Ok(task) => task,
        Err(e) => {
          app.notifications().report_error("Invalid bulk update", e);
          return Ok(());
        }
      };
      match task.into_result() {
        Ok(report) if report.has_failures() => {
          app
            .notifications()
            .warning("Bulk update finished with errors", report.summary(MAX_LISTED_ERRORS));
        }
        Ok(report) => {
          app
            .notifications()
            .success("Bulk update finished", report.summary(MAX_LISTED_ERRORS));
        }
        Err(e) => {
          app.notifications().report_error("Bulk update failed", e);
        }
      }
    }
  }
  Ok(())
}

async fn autojoin(app: &App, cmd: AutoJoinCommand) -> Result<()> {
  let client = app.client();
  match cmd {
    AutoJoinCommand::Status { gameweek } => {
      let status = client.auto_join_status(&gameweek).await;
      println!("{}", monitor_line(&status));
    }
    AutoJoinCommand::Trigger { gameweek } => {
      let current = client.auto_join_status(&gameweek).await;
      if let Some(status) = current.data() {
        if !can_trigger(status) {
          app
            .notifications()
            .warning("Auto-join already in progress", monitor_line(&current));
          return Ok(());
        }
      }
      let task = client.trigger_auto_join(&gameweek).await;
      report(app, "Auto-join triggered", "Failed to trigger auto-join", task);
    }
    AutoJoinCommand::Watch { gameweek } => {
      let mut query = client.auto_join_query(&gameweek);
      query.fetch();
      let mut ticker = tokio::time::interval(Duration::from_millis(250));
      loop {
        tokio::select! {
          _ = tokio::signal::ctrl_c() => break,
          _ = ticker.tick() => {
            let changed = query.poll() || query.sync();
            if changed && !query.is_loading() {
              println!("{}", monitor_line(query.entry()));
            }
            print_notifications(app);
          }
        }
      }
    }
  }
  Ok(())
}

/// Data of a read, reporting the error alongside whatever data is cached.
fn show<'a, T>(app: &App, title: &str, entry: &'a CacheEntry<T>) -> Option<&'a T> {
  if let Some(error) = &entry.error {
    if error.is_auth() && !app.session().is_authenticated() {
      eprintln!("Not signed in. Run `ffadmin login` first.");
    }
    app.notifications().report_error(title, error.clone());
  }
  entry.data()
}

/// Report a finished mutation exactly once.
fn report<R>(app: &App, success: &str, failure: &str, task: MutationTask<R>) {
  match task.into_result() {
    Ok(_) => {
      app.notifications().success(success, "");
    }
    Err(e) => {
      if e.is_auth() && !app.session().is_authenticated() {
        eprintln!("Not signed in. Run `ffadmin login` first.");
      }
      app.notifications().report_error(failure, e);
    }
  }
}

fn print_notifications(app: &App) {
  for n in app.notifications().drain() {
    if n.message.is_empty() {
      println!("[{}] {}", n.kind.label(), n.title);
    } else {
      println!("[{}] {}: {}", n.kind.label(), n.title, n.message);
    }
  }
}
