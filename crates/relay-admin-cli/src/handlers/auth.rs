#![deny(clippy::all, clippy::pedantic)]

use std::fs;
use std::path::PathBuf;

use relay_admin::application::AdminContext;
use relay_admin::session::{SessionState, TokenProvider};
use serde::Serialize;

use crate::args::AuthCmd;
use crate::error::CliError;
use crate::print::print_json;

#[derive(Debug, Serialize)]
struct AuthStatus<'a> {
    state: SessionState,
    api_url: &'a str,
}

pub fn handle(ctx: &AdminContext, cmd: AuthCmd) -> Result<(), CliError> {
    match cmd {
        AuthCmd::Login {
            token_file,
            token_env,
        } => login(ctx, token_file, token_env),
        AuthCmd::Logout => {
            ctx.session.logout()?;
            status(ctx)
        }
        AuthCmd::Status => status(ctx),
    }
}

fn login(
    ctx: &AdminContext,
    token_file: Option<PathBuf>,
    token_env: Option<String>,
) -> Result<(), CliError> {
    let token = read_token(token_file, token_env)?;
    ctx.session.store_token(&token)?;
    status(ctx)
}

pub(crate) fn read_token(
    token_file: Option<PathBuf>,
    token_env: Option<String>,
) -> Result<String, CliError> {
    let token = if let Some(path) = token_file {
        fs::read_to_string(&path).map_err(|source| CliError::TokenFile {
            path: path.display().to_string(),
            source,
        })?
    } else {
        token_env.ok_or(CliError::MissingToken)?
    };
    let token = token.trim();
    if token.is_empty() {
        return Err(CliError::MissingToken);
    }
    Ok(token.to_string())
}

fn status(ctx: &AdminContext) -> Result<(), CliError> {
    let state = if ctx.session.read_token().is_some() {
        SessionState::LoggedIn
    } else {
        SessionState::LoggedOut
    };
    print_json(&AuthStatus {
        state,
        api_url: ctx.api.base_url().as_str(),
    })
}
