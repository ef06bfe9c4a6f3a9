pub mod modules;
pub use modules::owner_migration;
pub use modules::ticketing;

#[cfg(test)]
mod tests;
