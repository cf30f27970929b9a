pub mod branch;
pub mod permission;
pub mod principal;
pub mod role;

pub use branch::{normalize_email, AllowedEmailEntry, Branch, NewBranch};
pub use permission::{codes as permission_codes, Permission};
pub use principal::Principal;
pub use role::Role;
