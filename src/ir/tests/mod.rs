mod interpreter_tests;
