mod call_tests;
mod trace_tests;
