pub mod errors;
pub mod db;
pub mod rating;
pub mod user;
pub mod restaurant;
pub mod waiter;

#[cfg(test)]
mod tests;
