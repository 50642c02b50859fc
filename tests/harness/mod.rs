//! Integration Test Harness
//!
//! Shared infrastructure for skirmish tests:
//! - `fixtures` - Ready-made stat blocks (fighter, wizard, goblin, dragon...)
//! - `TestTable` - A session wired to scripted dice
//!
//! # Example
//!
//! ```rust,ignore
//! use harness::{fighter, goblin, TestTable};
//!
//! #[test]
//! fn test_fighter_hits_goblin() {
//!     // d20 then the longsword's d8
//!     let mut table = TestTable::new([12, 5]);
//!     let hero = table.add(fighter("Brakka"), 20);
//!     let gob = table.add(goblin("Snik"), 5);
//!     table.start();
//!     let outcome = table.attack(hero, gob, &Default::default()).unwrap();
//!     assert!(outcome.roll.hit);
//! }
//! ```

#![allow(dead_code)]

mod fixtures;
mod table;

pub use fixtures::*;
pub use table::TestTable;
