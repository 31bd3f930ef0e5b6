mod common;
mod unification_test;
