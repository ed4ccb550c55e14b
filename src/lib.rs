pub mod acceptor;
pub mod aggregator;
pub mod config;
pub mod extract;
pub mod health;
pub mod listener;
pub mod partition;
pub mod record;
pub mod row;
pub mod store;
pub mod writer;
