mod server;

pub use server::{BillingConfig, Environment, ServerConfig, STRIPE_API_BASE};
