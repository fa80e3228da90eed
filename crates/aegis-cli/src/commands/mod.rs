//! Command module organization - one file per subcommand.

pub mod benchmark;
pub mod explain;
pub mod gate;
pub mod model;
