#![deny(clippy::all, clippy::pedantic)]

use std::time::Duration;

use relay_admin::application::{
    AdminContext, Feed, NotificationKind, NotificationQuery, NotificationService,
};
use relay_admin::session::SessionState;
use serde::Serialize;
use serde_json::json;
use tokio::sync::watch;

use crate::args::{FeedCmd, ListArgs, WatchArgs};
use crate::error::CliError;
use crate::print::print_json;

pub async fn handle<N: NotificationKind>(
    ctx: &AdminContext,
    service: &NotificationService<N>,
    cmd: FeedCmd,
) -> Result<(), CliError> {
    match cmd {
        FeedCmd::List(args) => print_json(&service.list(query(args)).await?),
        FeedCmd::Stats => print_json(&service.stats().await?),
        FeedCmd::Read { ids } => {
            service.mark_read(&ids).await?;
            print_json(&json!({ "marked_read": ids }))
        }
        FeedCmd::ReadAll { pubkey } => {
            service.mark_all_read(pubkey.as_ref()).await?;
            print_json(&json!({ "marked_all_read": true, "pubkey": pubkey }))
        }
        FeedCmd::Watch(args) => watch_feed(ctx, service, args).await,
    }
}

fn query(args: ListArgs) -> NotificationQuery {
    NotificationQuery {
        page: args.page,
        limit: args.limit,
        filter: args.filter.into(),
        pubkey: args.pubkey,
    }
}

/// Poll the listing (or the stats) and print each settled state until
/// Ctrl-C or the session ends.
pub async fn watch_feed<N: NotificationKind>(
    ctx: &AdminContext,
    service: &NotificationService<N>,
    args: WatchArgs,
) -> Result<(), CliError> {
    if ctx.session.state() == SessionState::LoggedOut {
        return Err(CliError::SessionEnded);
    }
    let session = ctx.session.subscribe();

    if args.stats {
        let interval = interval(args.interval_seconds, ctx.settings.polling.stats)?;
        let mut feed: Feed<(), Option<N::Stats>> = Feed::new(N::NAME, None, interval);
        let service = service.clone();
        feed.watch((), move || {
            let service = service.clone();
            async move { service.stats().await.map(Some) }
        })
        .await?;
        return run(feed, session).await;
    }

    let interval = interval(args.interval_seconds, ctx.settings.polling.notifications)?;
    let query = query(args.list);
    let mut feed = Feed::new(N::NAME, None, interval);
    let service = service.clone();
    let key = query.clone();
    feed.watch(key, move || {
        let service = service.clone();
        let query = query.clone();
        async move { service.list(query).await.map(Some) }
    })
    .await?;
    run(feed, session).await
}

fn interval(seconds: Option<u64>, configured: Duration) -> Result<Duration, CliError> {
    match seconds {
        None => Ok(configured),
        Some(0) => Err(CliError::InvalidInput(
            "--interval-seconds must be greater than zero".into(),
        )),
        Some(seconds) => Ok(Duration::from_secs(seconds)),
    }
}

async fn run<K, T>(
    mut feed: Feed<K, T>,
    mut session: watch::Receiver<SessionState>,
) -> Result<(), CliError>
where
    K: PartialEq,
    T: Clone + Serialize + Send + Sync + 'static,
{
    let mut states = feed.subscribe();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let outcome = loop {
        tokio::select! {
            signal = &mut ctrl_c => break signal.map_err(CliError::Signal),
            changed = session.changed() => {
                if changed.is_err() || *session.borrow_and_update() == SessionState::LoggedOut {
                    break Err(CliError::SessionEnded);
                }
            }
            changed = states.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let state = states.borrow_and_update().clone();
                if !state.loading
                    && let Err(err) = print_json(&state)
                {
                    break Err(err);
                }
            }
        }
    };

    feed.teardown().await;
    outcome
}
