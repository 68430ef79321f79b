// Library for tests to access modules

pub mod config;
pub mod coordinator;
pub mod enricher;
pub mod fetcher;
pub mod models;
pub mod routes;
pub mod selection;
pub mod snapshot;
pub mod tracker;
pub mod version;
pub mod worker;
