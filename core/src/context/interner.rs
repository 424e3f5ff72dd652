//! Agent names and account keys
//!
//! Regrouping compares accounts across many agent records and rayon workers
//! read names concurrently, so both are stored once in a shared rodeo and
//! agents carry the 4-byte key.

use lasso::{Spur, ThreadedRodeo};
use std::sync::OnceLock;

/// Key of an agent name or account.
pub type IStr = Spur;

static NAMES: OnceLock<ThreadedRodeo> = OnceLock::new();
static UNNAMED: OnceLock<Spur> = OnceLock::new();

fn names() -> &'static ThreadedRodeo {
    NAMES.get_or_init(ThreadedRodeo::default)
}

pub fn intern(s: &str) -> IStr {
    names().get_or_intern(s)
}

/// Intern an account name. Raw records prefix accounts with `:`, which is
/// dropped so records with and without the marker group together.
pub fn intern_account(account: &str) -> IStr {
    intern(account.trim().trim_start_matches(':'))
}

/// Name given to agents the raw record leaves unnamed.
#[inline]
pub fn empty_istr() -> IStr {
    *UNNAMED.get_or_init(|| intern(""))
}

pub fn resolve(key: IStr) -> &'static str {
    names().resolve(&key)
}
