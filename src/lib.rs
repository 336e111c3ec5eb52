//! mldsl: a compiler from a line-oriented scripting language to bounded
//! host action placements.
//!
//! The host data ([`catalog::HostData`]) and [`settings::CompilerSettings`]
//! are loaded once; [`dsl::compile_file`] then turns a source file and its
//! imports into a [`dsl::Program`].

pub mod catalog;
pub mod dsl;
pub mod error;
pub mod paths;
pub mod settings;
pub mod util;
