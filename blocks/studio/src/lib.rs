//! Studio workflows that span more than one atom: applying a paid
//! transformation, browsing the public gallery, buying credits and keeping
//! accounts in step with the identity provider.

pub mod gallery;
pub mod identity;
pub mod payments;
pub mod transformations;
pub mod types;

#[cfg(any(test, feature = "testing"))]
pub mod testing;
