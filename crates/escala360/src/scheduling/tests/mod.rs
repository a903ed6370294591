mod audit;
mod common;
mod registry;
mod substitutions;
