#![deny(clippy::all, clippy::pedantic)]

use relay_admin::application::AdminContext;
use serde_json::json;

use super::notifications;
use crate::args::{EventCmd, ReportsCmd};
use crate::error::CliError;
use crate::print::print_json;

pub async fn handle(ctx: &AdminContext, cmd: ReportsCmd) -> Result<(), CliError> {
    match cmd {
        ReportsCmd::Feed(cmd) => notifications::handle(ctx, &ctx.reports, cmd).await,
        ReportsCmd::Event(args) => match args.action {
            EventCmd::Get { id } => print_json(&ctx.reports.event(&id).await?),
            EventCmd::Delete { id } => {
                ctx.reports.delete_event(&id).await?;
                print_json(&json!({ "deleted": id }))
            }
        },
    }
}
