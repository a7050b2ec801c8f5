mod test_machine;
mod test_support;

mod config_tests;
mod encode_tests;
