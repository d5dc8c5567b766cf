//! SQL for each table group
//!
//! Every function takes `&mut PgConnection`, so the same statement runs on a
//! pooled connection or inside a transaction. Rows are read with runtime
//! `query_as` into `FromRow` structs and converted with `into_domain`.

pub mod yard;
pub mod invoices;
