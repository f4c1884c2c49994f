mod base_fee_tests;
