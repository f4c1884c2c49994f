mod system_contract_tests;
