#![cfg(test)]

mod common;
mod end_to_end;
mod feeds;
