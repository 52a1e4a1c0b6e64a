mod common;
mod compliance;
mod ledger;
mod pay;
