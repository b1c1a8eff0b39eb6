pub mod api_types;
pub mod client;
pub mod filters;
pub mod gateway;
mod records;
pub mod types;
pub mod urls;

#[cfg(test)]
pub mod fake;
