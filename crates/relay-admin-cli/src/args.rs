//! Command-line surface for `relay-admin`.

#![deny(clippy::all, clippy::pedantic)]

use std::fmt;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use relay_admin::api_types::NotificationFilter;
use relay_admin::application::RateSourceKind;
use relay_admin::config::GlobalArgs;
use relay_admin::domain::{EventId, Pubkey};

#[derive(Parser, Debug)]
#[command(name = "relay-admin", version, about = "Nostr relay administration CLI", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Store, drop or inspect the API token
    Auth(AuthArgs),
    /// Bitcoin rate series
    Rates(RatesArgs),
    /// Subscriber profile lookup
    Profiles(ProfilesArgs),
    /// Moderation notifications
    Moderation(FeedArgs),
    /// Payment notifications
    Payments(FeedArgs),
    /// Report notifications and reported events
    Reports(ReportsArgs),
    /// Blocked pubkeys
    Blocked(BlockedArgs),
    /// Local profile cache maintenance
    Cache(CacheArgs),
}

#[derive(Parser, Debug)]
pub struct AuthArgs {
    #[command(subcommand)]
    pub action: AuthCmd,
}

#[derive(Subcommand, Debug)]
pub enum AuthCmd {
    /// Store a token for later invocations
    Login {
        /// File containing the token (takes precedence over env)
        #[arg(long)]
        token_file: Option<PathBuf>,
        /// Token from env (no flag, to keep it out of shell history)
        #[arg(hide = true, env = "RELAY_ADMIN_TOKEN", hide_env_values = true)]
        token_env: Option<String>,
    },
    /// Forget the stored token
    Logout,
    /// Show whether a token is available
    Status,
}

#[derive(Parser, Debug)]
pub struct RatesArgs {
    #[arg(long, value_enum, default_value_t = SourceArg::Relay)]
    pub source: SourceArg,
}

#[derive(Parser, Debug)]
pub struct ProfilesArgs {
    /// Hex pubkeys to resolve
    #[arg(required = true)]
    pub pubkeys: Vec<Pubkey>,
}

#[derive(Parser, Debug)]
pub struct FeedArgs {
    #[command(subcommand)]
    pub action: FeedCmd,
}

#[derive(Subcommand, Debug)]
pub enum FeedCmd {
    /// List one page of notifications
    List(ListArgs),
    /// Aggregate counters
    Stats,
    /// Mark notifications read
    Read {
        #[arg(required = true)]
        ids: Vec<u64>,
    },
    /// Mark all notifications read
    ReadAll {
        #[arg(long)]
        pubkey: Option<Pubkey>,
    },
    /// Poll and print every refresh until interrupted
    Watch(WatchArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    #[arg(long, default_value_t = 1)]
    pub page: u32,
    #[arg(long, default_value_t = 20)]
    pub limit: u32,
    #[arg(long, value_enum, default_value_t = FilterArg::All)]
    pub filter: FilterArg,
    #[arg(long)]
    pub pubkey: Option<Pubkey>,
}

#[derive(Args, Debug, Clone)]
pub struct WatchArgs {
    /// Poll the stats endpoint instead of the listing
    #[arg(long, default_value_t = false)]
    pub stats: bool,
    /// Override the configured polling interval
    #[arg(long)]
    pub interval_seconds: Option<u64>,
    #[command(flatten)]
    pub list: ListArgs,
}

#[derive(Parser, Debug)]
pub struct ReportsArgs {
    #[command(subcommand)]
    pub action: ReportsCmd,
}

#[derive(Subcommand, Debug)]
pub enum ReportsCmd {
    #[command(flatten)]
    Feed(FeedCmd),
    /// Reported events
    Event(EventArgs),
}

#[derive(Parser, Debug)]
pub struct EventArgs {
    #[command(subcommand)]
    pub action: EventCmd,
}

#[derive(Subcommand, Debug)]
pub enum EventCmd {
    /// Show a reported event with its reports
    Get { id: EventId },
    /// Delete a reported event from the relay
    Delete { id: EventId },
}

#[derive(Parser, Debug)]
pub struct BlockedArgs {
    #[command(subcommand)]
    pub action: BlockedCmd,
}

#[derive(Subcommand, Debug)]
pub enum BlockedCmd {
    /// List blocked pubkeys
    List,
    /// Block a pubkey
    Add {
        pubkey: Pubkey,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Unblock a pubkey
    Remove { pubkey: Pubkey },
}

#[derive(Parser, Debug)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub action: CacheCmd,
}

#[derive(Subcommand, Debug)]
pub enum CacheCmd {
    /// Count cached and expired profiles
    Stats,
    /// Remove every cached profile
    Clear,
    /// Remove expired profiles
    Sweep,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum SourceArg {
    Relay,
    Coingecko,
}

impl From<SourceArg> for RateSourceKind {
    fn from(value: SourceArg) -> Self {
        match value {
            SourceArg::Relay => Self::Relay,
            SourceArg::Coingecko => Self::CoinGecko,
        }
    }
}

impl fmt::Display for SourceArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(RateSourceKind::from(*self).as_str())
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum FilterArg {
    All,
    Unread,
    User,
}

impl From<FilterArg> for NotificationFilter {
    fn from(value: FilterArg) -> Self {
        match value {
            FilterArg::All => Self::All,
            FilterArg::Unread => Self::Unread,
            FilterArg::User => Self::User,
        }
    }
}

impl fmt::Display for FilterArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(NotificationFilter::from(*self).as_str())
    }
}
