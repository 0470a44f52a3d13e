#![cfg(test)]

mod fixtures;

mod retries;
mod submissions;
