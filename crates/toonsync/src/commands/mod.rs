//! Command dispatch: bridges CLI args -> session / sync engine -> output.

pub mod auth;
pub mod config_cmd;
pub mod util;
pub mod webtoons;

use crate::cli::{Command, GlobalOpts};
use crate::context::App;
use crate::error::CliError;

/// Dispatch a server-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, app: &App, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Login(args) => auth::login(app, args, global).await,
        Command::Register(args) => auth::register(app, args, global).await,
        Command::Logout => {
            auth::logout(app, global);
            Ok(())
        }
        Command::Whoami => auth::whoami(app, global).await,
        Command::List(args) => webtoons::list(app, args, global).await,
        Command::Add(args) => webtoons::add(app, args, global).await,
        Command::Edit(args) => webtoons::edit(app, args, global).await,
        Command::Chapter(args) => webtoons::chapter(app, args, global).await,
        Command::Delete(args) => webtoons::delete(app, args, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
