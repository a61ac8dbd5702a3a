pub mod bridge;
pub mod chart;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod expansion;
pub mod identity;
pub mod ir;
pub mod layout;
pub mod layout_dump;
pub mod render;
pub mod search;
pub mod theme;
pub mod viewport;

pub use bridge::{Command, CommandBridge, Notification, NotificationBus, OriginPolicy, Subscription};
pub use chart::OrgChart;
#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{Config, LayoutConfig, OverlapStrategy, load_config, parse_config};
pub use error::ChartError;
pub use expansion::ExpansionSet;
pub use identity::{Identity, IdentityStrategy};
pub use ir::{ChartVariant, Forest, Item};
pub use layout::{Layout, compute_layout};
pub use render::{Drawing, RenderSurface, render_svg};
pub use search::{Filters, Stats};
pub use theme::{ColorMode, Theme};
pub use viewport::{Clock, FitViewOptions, FitViewScheduler, ManualClock, SystemClock};
