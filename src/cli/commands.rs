use std::path::PathBuf;
use std::sync::Arc;

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::cli::{Args, Command, ProfileAction, SessionFields, SettingsAction};
use crate::config::GlobalSettings;
use crate::dispatch::Dispatcher;
use crate::error::{Error, Result};
use crate::launcher;
use crate::prompt::{
    collect_new_session, collect_settings, collect_update, FilePicker, PromptFilePicker,
    StdinPrompt,
};
use crate::session::{
    Backend, FileBackend, RecentSessions, Session, SessionRegistry, SessionUpdate,
    DEFAULT_PROFILE,
};

pub async fn run_cli(args: Args) -> Result<()> {
    let profile = args.profile.as_deref().unwrap_or(DEFAULT_PROFILE);

    match args.command {
        Some(Command::Add { fields }) => handle_add(profile, fields).await,

        Some(Command::Edit { identifier, fields }) => {
            handle_edit(profile, &identifier, fields).await
        }

        Some(Command::Remove { identifier }) => handle_remove(profile, &identifier).await,

        Some(Command::List { search, json }) => {
            handle_list(profile, search.as_deref().unwrap_or(""), json).await
        }

        Some(Command::Recent { json }) => handle_recent(profile, json).await,

        Some(Command::Connect {
            identifier,
            remote_command,
            print,
        }) => handle_connect(profile, &identifier, remote_command.as_deref(), print).await,

        Some(Command::Scp {
            identifier,
            file,
            print,
        }) => handle_scp(profile, &identifier, file, print).await,

        Some(Command::Settings { action }) => {
            handle_settings(profile, action.unwrap_or(SettingsAction::Show)).await
        }

        Some(Command::Profile { action }) => handle_profile(action).await,

        Some(Command::Version) => {
            println!("ssh-hand v{}", crate::VERSION);
            Ok(())
        }

        None => handle_list(profile, "", false).await,
    }
}

/// Everything a command needs from one profile
struct Context {
    backend: Arc<FileBackend>,
}

impl Context {
    async fn open(profile: &str) -> Result<Self> {
        Ok(Self {
            backend: Arc::new(FileBackend::new(profile).await?),
        })
    }

    fn backend(&self) -> Arc<dyn Backend> {
        self.backend.clone()
    }

    fn store(&self) -> &dyn Backend {
        &*self.backend
    }

    fn profile(&self) -> &str {
        self.backend.profile()
    }
}

async fn handle_add(profile: &str, fields: SessionFields) -> Result<()> {
    let ctx = Context::open(profile).await?;

    // Collect first; nothing is locked or written while the user types.
    let prompt = StdinPrompt::new();
    let new = collect_new_session(&prompt, fields.into_partial()).await?;

    let _lock = ctx.backend.lock()?;
    let mut registry = SessionRegistry::open(ctx.backend()).await?;
    let session = registry.add(new).await?;

    println!("✓ Added session: {}", session.friendlyname);
    println!("  Profile:  {}", ctx.profile());
    println!("  Target:   {}", session.connection_string);
    println!("  Category: {}", session.category);
    println!("  Key:      {}", session.ssh_key_path);
    println!("  ID:       {}", session.id);

    Ok(())
}

async fn handle_edit(profile: &str, identifier: &str, fields: SessionFields) -> Result<()> {
    let ctx = Context::open(profile).await?;

    let (id, current) = {
        let registry = SessionRegistry::open(ctx.backend()).await?;
        let session = registry.find(identifier)?;
        (session.id.clone(), SessionUpdate::from_session(session))
    };

    let clears_x11 = fields.clears_x11();
    let partial = fields.into_partial();
    let update = if clears_x11 || partial.has_any_field() {
        let mut update = partial.merged_onto(&current);
        if clears_x11 {
            update.x11_forward = None;
        }
        update
    } else {
        let prompt = StdinPrompt::new();
        collect_update(&prompt, &current).await?
    };

    // Re-read under the lock so a concurrent change is not overwritten blindly.
    let _lock = ctx.backend.lock()?;
    let mut registry = SessionRegistry::open(ctx.backend()).await?;
    let session = registry.edit(&id, update).await?;

    println!("✓ Updated session: {} ({})", session.friendlyname, session.id);
    Ok(())
}

async fn handle_remove(profile: &str, identifier: &str) -> Result<()> {
    let ctx = Context::open(profile).await?;
    let _lock = ctx.backend.lock()?;
    let mut registry = SessionRegistry::open(ctx.backend()).await?;

    let id = registry.find(identifier)?.id.clone();
    let removed = registry.remove(&id).await?;

    println!(
        "✓ Removed session: {} (from profile '{}')",
        removed.friendlyname,
        ctx.profile()
    );
    Ok(())
}

async fn handle_list(profile: &str, query: &str, json: bool) -> Result<()> {
    let ctx = Context::open(profile).await?;
    let registry = SessionRegistry::open(ctx.backend()).await?;

    if json {
        let matching = registry.search(query);
        println!("{}", serde_json::to_string_pretty(&matching)?);
        return Ok(());
    }

    let index = registry.categorize_matching(query);
    if index.is_empty() {
        if query.is_empty() {
            println!("No sessions found in profile '{}'.", ctx.profile());
        } else {
            println!("No sessions match '{}'.", query);
        }
        return Ok(());
    }

    println!("Profile: {}\n", ctx.profile());
    let mut total = 0;
    for (category, sessions) in index.iter() {
        println!("{}", category);
        for session in sessions {
            print_session_row(session);
            total += 1;
        }
        println!();
    }
    println!("Total: {} sessions", total);

    Ok(())
}

async fn handle_recent(profile: &str, json: bool) -> Result<()> {
    let ctx = Context::open(profile).await?;
    let recent = RecentSessions::load(ctx.backend()).await;

    if json {
        println!("{}", serde_json::to_string_pretty(recent.list())?);
        return Ok(());
    }

    if recent.is_empty() {
        println!("No recent sessions in profile '{}'.", ctx.profile());
        return Ok(());
    }

    for (i, entry) in recent.list().iter().enumerate() {
        let when = entry
            .connected_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        println!(
            "{:>2}. {} {} {}",
            i + 1,
            pad(&entry.session.friendlyname, 24),
            pad(&entry.session.connection_string, 32),
            when
        );
    }
    Ok(())
}

async fn handle_connect(
    profile: &str,
    identifier: &str,
    remote_command: Option<&str>,
    print: bool,
) -> Result<()> {
    let ctx = Context::open(profile).await?;
    let settings = GlobalSettings::load(ctx.store()).await;
    let mut recent = RecentSessions::load(ctx.backend()).await;
    let session = resolve_target(&ctx, &recent, identifier).await?;

    let launcher = launcher::detect(settings.terminal);
    let mut dispatcher = Dispatcher::new(&settings, launcher.as_ref(), &mut recent);

    if print {
        println!("{}", dispatcher.preview_connect(&session, remote_command));
        return Ok(());
    }

    dispatcher.connect(&session, remote_command).await?;
    Ok(())
}

async fn handle_scp(
    profile: &str,
    identifier: &str,
    file: Option<PathBuf>,
    print: bool,
) -> Result<()> {
    let ctx = Context::open(profile).await?;
    let settings = GlobalSettings::load(ctx.store()).await;
    let mut recent = RecentSessions::load(ctx.backend()).await;
    let session = resolve_target(&ctx, &recent, identifier).await?;

    let local = match file {
        Some(path) if path.is_file() => path,
        Some(path) => {
            return Err(Error::validation(format!("Not a file: {}", path.display())));
        }
        None => {
            let prompt = StdinPrompt::new();
            match PromptFilePicker::new(&prompt).choose().await? {
                Some(path) => path,
                None => return Err(Error::Cancelled),
            }
        }
    };

    let launcher = launcher::detect(settings.terminal);
    let mut dispatcher = Dispatcher::new(&settings, launcher.as_ref(), &mut recent);

    if print {
        println!("{}", dispatcher.preview_transfer(&session, &local));
        return Ok(());
    }

    dispatcher.transfer(&session, &local).await?;
    Ok(())
}

async fn handle_settings(profile: &str, action: SettingsAction) -> Result<()> {
    let ctx = Context::open(profile).await?;
    let current = GlobalSettings::load(ctx.store()).await;

    match action {
        SettingsAction::Show => {
            println!("Profile:     {}", ctx.profile());
            println!(
                "SSH key:     {}",
                if current.ssh_key.is_empty() {
                    "(none)"
                } else {
                    &current.ssh_key
                }
            );
            println!("X11 forward: {}", current.x11_forward);
            println!(
                "Terminal:    {}",
                current
                    .terminal
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| "auto".to_string())
            );
        }

        SettingsAction::Set {
            ssh_key,
            x11,
            no_x11,
            terminal,
        } => {
            let updated = if ssh_key.is_none() && !x11 && !no_x11 && terminal.is_none() {
                let prompt = StdinPrompt::new();
                collect_settings(&prompt, &current).await?
            } else {
                GlobalSettings {
                    ssh_key: ssh_key.unwrap_or_else(|| current.ssh_key.clone()),
                    x11_forward: if x11 {
                        true
                    } else if no_x11 {
                        false
                    } else {
                        current.x11_forward
                    },
                    terminal: terminal.or(current.terminal),
                }
            };

            let _lock = ctx.backend.lock()?;
            updated.save(ctx.store()).await?;
            println!("✓ Saved settings for profile '{}'", ctx.profile());
        }
    }

    Ok(())
}

async fn handle_profile(action: ProfileAction) -> Result<()> {
    match action {
        ProfileAction::List => {
            let profiles = FileBackend::list_profiles().await?;
            println!("Profiles:");
            for prof in profiles {
                println!("  {}", prof);
            }
        }

        ProfileAction::Create { name } => {
            FileBackend::create_profile(&name).await?;
            println!("✓ Created profile: {}", name);
        }

        ProfileAction::Delete { name } => {
            FileBackend::delete_profile(&name).await?;
            println!("✓ Deleted profile: {}", name);
        }
    }

    Ok(())
}

// Helper functions

/// Saved sessions first, then snapshots in the recent list
async fn resolve_target(
    ctx: &Context,
    recent: &RecentSessions,
    identifier: &str,
) -> Result<Session> {
    let registry = SessionRegistry::open(ctx.backend()).await?;
    match registry.find(identifier) {
        Ok(session) => Ok(session.clone()),
        Err(Error::SessionNotFound(_)) => recent.find(identifier).cloned(),
        Err(e) => Err(e),
    }
}

fn print_session_row(session: &Session) {
    let x11 = match session.x11_forward {
        Some(true) => "x11",
        Some(false) => "no-x11",
        None => "",
    };
    println!(
        "  {} {} {} {} {}",
        pad(&session.friendlyname, 24),
        pad(&session.connection_string, 32),
        pad(session.ssh_key_path.as_str(), 20),
        pad(x11, 6),
        &session.id
    );
}

/// Truncate to `width` display columns and pad with spaces
fn pad(s: &str, width: usize) -> String {
    let mut out = truncate(s, width);
    let used = UnicodeWidthStr::width(out.as_str());
    out.push_str(&" ".repeat(width.saturating_sub(used)));
    out
}

fn truncate(s: &str, max: usize) -> String {
    if UnicodeWidthStr::width(s) <= max {
        return s.to_string();
    }

    let budget = max.saturating_sub(3);
    let mut out = String::new();
    let mut used = 0;
    for c in s.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > budget {
            break;
        }
        out.push(c);
        used += w;
    }
    if max >= 3 {
        out.push_str("...");
    }
    out
}
