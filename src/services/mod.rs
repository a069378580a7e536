pub mod checkout;
pub mod coordinator;
pub mod customers;
pub mod ledger;
pub mod line_items;
pub mod notifications;
pub mod pricing;
