#![deny(clippy::all, clippy::pedantic)]

use relay_admin::application::AdminContext;

use crate::args::RatesArgs;
use crate::error::CliError;
use crate::print::print_json;

pub async fn handle(ctx: &AdminContext, cmd: RatesArgs) -> Result<(), CliError> {
    let points = ctx.rates.rates(cmd.source.into()).await?;
    print_json(&points)
}
