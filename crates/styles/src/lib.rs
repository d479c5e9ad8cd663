//! Style catalog loading and graph template materialization.
//!
//! A catalog is an ordered JSON document of style groups, each tagged
//! with one of three fixed style kinds. At load time every item is
//! resolved into a [`StyleTemplate`] carrying its kind's slot set and a
//! parsed graph template; request handling never re-parses or
//! string-matches kinds.

mod catalog;
mod kind;
mod materialize;

pub use catalog::{StyleCatalog, StyleGroup, StyleTemplate};
pub use kind::StyleKind;
pub use materialize::materialize;
