#![deny(clippy::all, clippy::pedantic)]

use relay_admin::application::AdminContext;
use serde_json::json;

use crate::args::CacheCmd;
use crate::error::CliError;
use crate::print::print_json;

pub fn handle(ctx: &AdminContext, cmd: CacheCmd) -> Result<(), CliError> {
    match cmd {
        CacheCmd::Stats => print_json(&json!({ "profiles": ctx.profiles.cache_stats()? })),
        CacheCmd::Clear => print_json(&json!({ "removed": ctx.profiles.clear_cache()? })),
        CacheCmd::Sweep => print_json(&json!({ "removed": ctx.profiles.sweep_cache()? })),
    }
}
