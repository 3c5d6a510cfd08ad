mod command;
mod key;

pub use command::{effective_x11, CommandBuilder};
pub use key::{ensure_private_permissions, resolve, KeyPolicy, KeyResolver};
