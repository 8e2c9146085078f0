//! Transaction domain
//!
//! A unit of work is started by a [`TransactionManager`], lent to store calls
//! through [`Conn`], and finished exactly once by commit or rollback.

mod unit_of_work;

pub use unit_of_work::{Conn, TransactionError, TransactionManager, TxState, UnitOfWork};
