mod config;
mod evaluate;
mod solve;
