pub mod checkout;
pub mod root;
pub mod signups;
pub mod webhooks;
