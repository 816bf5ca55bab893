// Function runtime tests through parsed SQL

pub mod analytic_functions_test;
pub mod extension_functions_test;
pub mod scalar_functions_test;
