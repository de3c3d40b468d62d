mod support;

mod config_store_tests;
mod fleet_tests;
mod poller_tests;
mod pool_tests;
