use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

use crate::config::TerminalKind;
use crate::prompt::PartialSession;
use crate::ssh::KeyPolicy;

#[derive(Parser, Debug)]
#[command(name = "ssh-hand")]
#[command(version, about = "Catalogue SSH targets and connect to them quickly", long_about = None)]
pub struct Args {
    /// Profile to use
    #[arg(short, long, global = true, env = "SSH_HAND_PROFILE")]
    pub profile: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Add a new session (prompts for anything not given)
    Add {
        #[command(flatten)]
        fields: SessionFields,
    },

    /// Edit a session (prompts unless a field is given)
    Edit {
        /// Session ID, ID prefix or friendly name
        identifier: String,

        #[command(flatten)]
        fields: SessionFields,
    },

    /// Remove a session
    Remove {
        /// Session ID, ID prefix or friendly name
        identifier: String,
    },

    /// List sessions grouped by category
    List {
        /// Only sessions whose name contains this text
        #[arg(short, long)]
        search: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show recently used sessions
    Recent {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Open an ssh connection
    Connect {
        /// Session ID, name, or position in the recent list
        identifier: String,

        /// Command to run on the remote host
        #[arg(short = 'c', long = "cmd")]
        remote_command: Option<String>,

        /// Print the command instead of running it
        #[arg(long)]
        print: bool,
    },

    /// Copy a local file to the remote home directory
    Scp {
        /// Session ID, name, or position in the recent list
        identifier: String,

        /// File to copy (asked for when omitted)
        file: Option<PathBuf>,

        /// Print the command instead of running it
        #[arg(long)]
        print: bool,
    },

    /// Global SSH key and X11 defaults
    Settings {
        #[command(subcommand)]
        action: Option<SettingsAction>,
    },

    /// Profile management
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },

    /// Show version
    Version,
}

/// Session fields settable from the command line
#[derive(ClapArgs, Debug, Default)]
pub struct SessionFields {
    /// Friendly name
    #[arg(short, long)]
    pub name: Option<String>,

    /// Connection string, e.g. user@host
    #[arg(short, long)]
    pub target: Option<String>,

    /// Category used for grouping
    #[arg(short = 'g', long)]
    pub category: Option<String>,

    /// Key path, "none", or "global"
    #[arg(short, long)]
    pub key: Option<String>,

    /// Always forward X11 for this session
    #[arg(long, conflicts_with_all = ["no_x11", "default_x11"])]
    pub x11: bool,

    /// Never forward X11 for this session
    #[arg(long, conflicts_with = "default_x11")]
    pub no_x11: bool,

    /// Follow the global X11 setting
    #[arg(long)]
    pub default_x11: bool,
}

impl SessionFields {
    /// `Some(None)` when the X11 override should be cleared
    fn x11_choice(&self) -> Option<Option<bool>> {
        if self.x11 {
            Some(Some(true))
        } else if self.no_x11 {
            Some(Some(false))
        } else if self.default_x11 {
            Some(None)
        } else {
            None
        }
    }

    pub fn clears_x11(&self) -> bool {
        self.default_x11
    }

    pub fn into_partial(self) -> PartialSession {
        let x11_forward = self.x11_choice().flatten();
        PartialSession {
            friendlyname: self.name,
            connection_string: self.target,
            category: self.category,
            ssh_key_path: self.key.as_deref().map(KeyPolicy::parse),
            x11_forward,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum SettingsAction {
    /// Print the current settings
    Show,

    /// Change settings (prompts when no option is given)
    Set {
        /// Global key path used by sessions with key "global"
        #[arg(long)]
        ssh_key: Option<String>,

        /// Forward X11 by default
        #[arg(long, conflicts_with = "no_x11")]
        x11: bool,

        /// Do not forward X11 by default
        #[arg(long)]
        no_x11: bool,

        /// inline, terminal or iterm
        #[arg(long)]
        terminal: Option<TerminalKind>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ProfileAction {
    /// List all profiles
    List,

    /// Create a new profile
    Create { name: String },

    /// Delete a profile
    Delete { name: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_flags() {
        let args = Args::try_parse_from([
            "ssh-hand", "add", "--name", "db1", "--target", "user@db", "-g", "infra", "--key",
            "global", "--x11",
        ])
        .unwrap();

        let Some(Command::Add { fields }) = args.command else {
            panic!("expected add");
        };
        let partial = fields.into_partial();
        assert_eq!(partial.friendlyname.as_deref(), Some("db1"));
        assert_eq!(partial.ssh_key_path, Some(KeyPolicy::UseGlobal));
        assert_eq!(partial.x11_forward, Some(true));
    }

    #[test]
    fn test_conflicting_x11_flags() {
        assert!(Args::try_parse_from(["ssh-hand", "add", "--x11", "--no-x11"]).is_err());
    }

    #[test]
    fn test_connect_flags() {
        let args =
            Args::try_parse_from(["ssh-hand", "-p", "work", "connect", "web", "-c", "uptime", "--print"])
                .unwrap();
        assert_eq!(args.profile.as_deref(), Some("work"));
        let Some(Command::Connect {
            identifier,
            remote_command,
            print,
        }) = args.command
        else {
            panic!("expected connect");
        };
        assert_eq!(identifier, "web");
        assert_eq!(remote_command.as_deref(), Some("uptime"));
        assert!(print);
    }

    #[test]
    fn test_settings_terminal_value() {
        let args =
            Args::try_parse_from(["ssh-hand", "settings", "set", "--terminal", "iterm"]).unwrap();
        let Some(Command::Settings {
            action: Some(SettingsAction::Set { terminal, .. }),
        }) = args.command
        else {
            panic!("expected settings set");
        };
        assert_eq!(terminal, Some(TerminalKind::Iterm));
    }
}
