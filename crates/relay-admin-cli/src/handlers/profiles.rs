#![deny(clippy::all, clippy::pedantic)]

use relay_admin::application::AdminContext;

use crate::args::ProfilesArgs;
use crate::error::CliError;
use crate::print::print_json;

pub async fn handle(ctx: &AdminContext, cmd: ProfilesArgs) -> Result<(), CliError> {
    let lookup = ctx.profiles.lookup(&cmd.pubkeys).await?;
    print_json(&lookup)
}
