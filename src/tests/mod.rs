mod notify_tests;
mod utils;
