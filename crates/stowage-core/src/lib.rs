pub mod config;
pub mod logging;

pub mod appliance;
pub mod bulk;
pub mod checksum;
pub mod control;
pub mod handlers;
pub mod health;
pub mod metadata;
pub mod names;
pub mod recovery;
pub mod storage;
pub mod sync;
