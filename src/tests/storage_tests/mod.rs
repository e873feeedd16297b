// Storage Tests Module - Testing the storage module
// - settings_tests: Settings defaults, persistence and validation
// - backend_tests: SQLite feed, presence and change subscriptions
// - directory_tests: User directory and push token registry

mod backend_tests;
mod directory_tests;
mod settings_tests;
