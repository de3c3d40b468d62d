mod migration_tests;
mod path_tests;
mod settings_tests;
mod vault_tests;
mod wire_tests;
