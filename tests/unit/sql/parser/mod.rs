// SQL Parser Tests

pub mod alias_binding_test;
pub mod expression_test;
