//! Non-standard language features that are opt-in
//!
//! The flags are fixed at compile time and stored inside the compiled
//! program so an artifact runs with the dialect it was built for.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dialect {
    /// Allow the `set` builtin and set literals
    pub allow_set: bool,
    /// Allow `while` statements and recursive function calls
    pub allow_recursion: bool,
    /// Allow reassignment of globals, and `if`/`for`/`while` at top level
    pub allow_global_reassign: bool,
}

impl Dialect {
    /// Dialect with every optional feature enabled
    pub const fn permissive() -> Self {
        Self {
            allow_set: true,
            allow_recursion: true,
            allow_global_reassign: true,
        }
    }
}
