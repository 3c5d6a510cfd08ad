mod args;
mod commands;

pub use args::{Args, Command, ProfileAction, SessionFields, SettingsAction};
pub use commands::run_cli;
