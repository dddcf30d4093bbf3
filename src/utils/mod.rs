pub mod alias_generator;

pub use alias_generator::AliasGenerator;
