mod database_tests;
mod migration_tests;
mod pending_tests;
