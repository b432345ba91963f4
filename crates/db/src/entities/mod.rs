//! `SeaORM` entity definitions.

pub mod fragments;
