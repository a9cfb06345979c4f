pub mod feishu;
pub mod notifier;
pub mod odds_feed;
pub mod telegram;

pub use feishu::FeishuNotifier;
pub use notifier::{split_message, strip_markup, DeliveryReport, LogNotifier, Notifier};
pub use odds_feed::{FeedProvider, FeedSource, MarketDataProvider, RawFeed};
pub use telegram::TelegramNotifier;
