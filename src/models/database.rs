use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::models::service::validate_port;

/// The relational database behind the backend. Never publicly reachable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSpec {
    #[serde(default = "default_engine")]
    pub engine: String,
    #[serde(default = "default_engine_version")]
    pub engine_version: String,
    pub name: String,
    #[serde(default = "default_port")]
    pub port: u32,
    #[serde(default = "default_instance_class")]
    pub instance_class: String,
    #[serde(default = "default_allocated_storage")]
    pub allocated_storage_gib: u32,
    #[serde(default = "default_max_allocated_storage")]
    pub max_allocated_storage_gib: u32,
    /// Secret holding `username` and `password`.
    pub credentials_secret: String,
    /// Services whose security groups may open connections to the database.
    #[serde(default)]
    pub clients: Vec<String>,
}

fn default_engine() -> String {
    "mysql".to_string()
}

fn default_engine_version() -> String {
    "8.0.43".to_string()
}

fn default_port() -> u32 {
    3306
}

fn default_instance_class() -> String {
    "db.t3.micro".to_string()
}

fn default_allocated_storage() -> u32 {
    20
}

fn default_max_allocated_storage() -> u32 {
    100
}

impl DatabaseSpec {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.name.trim().is_empty() {
            return Err(ConfigurationError::invalid(
                "database.name",
                "database name cannot be empty",
            ));
        }
        validate_port("database.port", self.port)?;
        if self.allocated_storage_gib == 0
            || self.max_allocated_storage_gib < self.allocated_storage_gib
        {
            return Err(ConfigurationError::invalid(
                "database.max_allocated_storage_gib",
                format!(
                    "storage {} GiB cannot grow to {} GiB",
                    self.allocated_storage_gib, self.max_allocated_storage_gib
                ),
            ));
        }
        if self.credentials_secret.trim().is_empty() {
            return Err(ConfigurationError::invalid(
                "database.credentials_secret",
                "credentials secret cannot be empty",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_dev_instance() {
        let db: DatabaseSpec = toml::from_str(
            r#"
            name = "ecommerce"
            credentials_secret = "ecommerce/mysql"
            clients = ["backend"]
            "#,
        )
        .unwrap();
        assert_eq!(db.engine, "mysql");
        assert_eq!(db.engine_version, "8.0.43");
        assert_eq!(db.port, 3306);
        assert_eq!(db.instance_class, "db.t3.micro");
        assert_eq!(db.allocated_storage_gib, 20);
        assert_eq!(db.max_allocated_storage_gib, 100);
        assert!(db.validate().is_ok());
    }

    #[test]
    fn storage_cannot_shrink() {
        let db = DatabaseSpec {
            engine: default_engine(),
            engine_version: default_engine_version(),
            name: "ecommerce".into(),
            port: 3306,
            instance_class: default_instance_class(),
            allocated_storage_gib: 50,
            max_allocated_storage_gib: 20,
            credentials_secret: "ecommerce/mysql".into(),
            clients: vec![],
        };
        let err = db.validate().unwrap_err();
        assert_eq!(err.field(), "database.max_allocated_storage_gib");
    }
}
