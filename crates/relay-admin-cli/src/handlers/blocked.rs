#![deny(clippy::all, clippy::pedantic)]

use relay_admin::application::AdminContext;
use serde_json::json;

use crate::args::BlockedCmd;
use crate::error::CliError;
use crate::print::print_json;

pub async fn handle(ctx: &AdminContext, cmd: BlockedCmd) -> Result<(), CliError> {
    match cmd {
        BlockedCmd::List => print_json(&ctx.blocked.list().await?),
        BlockedCmd::Add { pubkey, reason } => {
            ctx.blocked.block(&pubkey, reason.as_deref()).await?;
            print_json(&json!({ "blocked": pubkey }))
        }
        BlockedCmd::Remove { pubkey } => {
            ctx.blocked.unblock(&pubkey).await?;
            print_json(&json!({ "unblocked": pubkey }))
        }
    }
}
