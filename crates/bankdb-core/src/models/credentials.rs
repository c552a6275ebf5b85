use std::fmt;

/// Login credentials for one customer. Password verification lives in the
/// application layer so the comparison discipline stays in one place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerCredentials {
    customer_id: String,
    username: String,
    password: String,
    email: String,
    active: bool,
}

impl CustomerCredentials {
    pub fn new(customer_id: String, username: String, password: String, email: String) -> Self {
        Self {
            customer_id,
            username,
            password,
            email,
            active: true,
        }
    }

    pub fn restore(
        customer_id: String,
        username: String,
        password: String,
        email: String,
        active: bool,
    ) -> Self {
        Self {
            customer_id,
            username,
            password,
            email,
            active,
        }
    }

    pub fn customer_id(&self) -> &str {
        &self.customer_id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_password(&mut self, password: String) {
        self.password = password;
    }

    pub fn set_email(&mut self, email: String) {
        self.email = email;
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }
}

impl fmt::Display for CustomerCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) active={}",
            self.username, self.customer_id, self.active
        )
    }
}
