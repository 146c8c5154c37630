pub mod bidding;
pub mod commission;
pub mod lifecycle;
pub mod matching;
pub mod notifier;
pub mod rating;
pub mod registry;

#[cfg(test)]
pub(crate) mod testing;
