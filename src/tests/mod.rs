// Test modules for Convsync
// Each module exercises the public behavior of the corresponding source file

mod storage_tests;
