// Library for tests to access modules

pub mod avatar;
pub mod config;
pub mod history;
pub mod listing;
pub mod models;
pub mod poller;
pub mod routes;
