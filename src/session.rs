use crate::error::AuthError;

const USERNAME: &str = "admin";
const PASSWORD: &str = "password";

pub fn authenticate(username: &str, password: &str) -> Result<(), AuthError> {
    if username == USERNAME && password == PASSWORD {
        Ok(())
    } else {
        Err(AuthError::InvalidCredentials)
    }
}

#[derive(Debug, Default)]
pub struct Session {
    authenticated: bool,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Flips the session open on a match. A failed attempt leaves it as it was.
    pub fn login(&mut self, username: &str, password: &str) -> Result<(), AuthError> {
        authenticate(username, password)?;
        self.authenticated = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_with_fixed_pair() {
        let mut session = Session::default();
        assert_eq!(session.login("admin", "password"), Ok(()));
        assert!(session.is_authenticated());
    }

    #[test]
    fn test_login_rejects_other_pairs() {
        for (user, pass) in [
            ("admin", "Password"),
            ("Admin", "password"),
            ("admin ", "password"),
            ("", ""),
            ("password", "admin"),
        ] {
            let mut session = Session::default();
            assert_eq!(
                session.login(user, pass),
                Err(AuthError::InvalidCredentials)
            );
            assert!(!session.is_authenticated());
        }
    }
}
