mod helpers;

mod traceback_tests;
