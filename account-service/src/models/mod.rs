pub mod account;
pub mod activity;
pub mod dto;
pub mod stats;

pub use account::{Account, AccountFeature, AccountStatus, AccountType};
pub use activity::{AccountLog, AccountParameter};
pub use dto::{AccountDto, AccountFeatureDto, AccountTypeDto};
pub use stats::{AccountStats, AccountStatsList};
