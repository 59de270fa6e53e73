mod function_fusion_tests;
mod fusion_property_tests;
