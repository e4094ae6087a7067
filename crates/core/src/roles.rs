//! User roles carried in access-token claims.

use crate::types::define_text_enum;

define_text_enum! {
    /// Authorization role of a user account.
    ///
    /// `Admin` unlocks the operator-facing ad configuration and reporting routes.
    UserRole {
        User = "USER",
        Admin = "ADMIN",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stored_text() {
        assert_eq!("ADMIN".parse::<UserRole>().unwrap(), UserRole::Admin);
        assert!("admin".parse::<UserRole>().is_err());
    }
}
