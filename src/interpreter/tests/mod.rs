mod helpers;

mod control_flow_tests;
mod lifetime_tests;
mod stdlib_tests;
mod try_tests;
