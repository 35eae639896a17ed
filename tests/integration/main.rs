//! Integration tests: full rounds through the public API.

mod harness;
mod rounds;
mod simulation;
