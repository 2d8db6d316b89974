//! LDAP connection pool management.
//!
//! ## Security Requirements
//!
//! All connections use LDAPS (TLS from connection start).
//! STARTTLS is NOT supported to prevent downgrade attacks.

use std::sync::Arc;

use ldap3::{Ldap, LdapConnAsync, LdapConnSettings};
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};

use crate::config::LdapConfig;
use crate::error::{LdapError, LdapResult};

/// Connection pool for LDAP connections.
///
/// One bound LDAPS connection is shared; `ldap3` multiplexes operations
/// over it. The semaphore bounds the number of operations in flight.
pub struct LdapConnectionPool {
    config: Arc<LdapConfig>,
    semaphore: Arc<Semaphore>,
    connection: Mutex<Option<Ldap>>,
}

impl LdapConnectionPool {
    /// Creates a new connection pool.
    ///
    /// ## Security
    ///
    /// The configuration must use LDAPS. This is validated at config build time.
    #[must_use]
    pub fn new(config: LdapConfig) -> Self {
        let max_size = config.pool_max_size.max(1);
        Self {
            config: Arc::new(config),
            semaphore: Arc::new(Semaphore::new(max_size)),
            connection: Mutex::new(None),
        }
    }

    /// Gets a connection handle from the pool, connecting on first use.
    ///
    /// ## Errors
    ///
    /// Returns a connection or bind error if the server cannot be reached.
    pub async fn get(&self) -> LdapResult<LdapConnection> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| LdapError::PoolExhausted)?;

        let mut guard = self.connection.lock().await;
        let ldap = match guard.as_ref() {
            Some(ldap) => ldap.clone(),
            None => {
                let ldap = self.create_connection().await?;
                *guard = Some(ldap.clone());
                ldap
            }
        };

        Ok(LdapConnection {
            ldap,
            _permit: permit,
        })
    }

    /// Drops the shared connection so the next `get` reconnects.
    pub async fn invalidate(&self) {
        if let Some(mut ldap) = self.connection.lock().await.take() {
            let _ = ldap.unbind().await;
        }
    }

    /// Creates a new LDAPS connection.
    async fn create_connection(&self) -> LdapResult<Ldap> {
        let settings = LdapConnSettings::new()
            .set_conn_timeout(self.config.connection_timeout)
            .set_no_tls_verify(!self.config.validate_certificates);

        let (conn, mut ldap) =
            LdapConnAsync::with_settings(settings, &self.config.connection_url)
                .await
                .map_err(|e| LdapError::Connection(e.to_string()))?;

        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                tracing::warn!("LDAP connection driver error: {}", e);
            }
        });

        ldap.simple_bind(&self.config.bind_dn, &self.config.bind_credential)
            .await
            .map_err(|e| LdapError::Bind(e.to_string()))?
            .success()
            .map_err(|e| LdapError::Bind(format!("Bind failed: {e:?}")))?;

        tracing::debug!(url = %self.config.connection_url, "LDAP connection established");
        Ok(ldap)
    }

    /// Tests the connection to the LDAP server.
    ///
    /// ## Errors
    ///
    /// Returns an error if the users DN cannot be read.
    pub async fn test_connection(&self) -> LdapResult<()> {
        let mut conn = self.get().await?;

        conn.ldap_mut()
            .search(
                &self.config.users_dn,
                ldap3::Scope::Base,
                "(objectClass=*)",
                vec!["dn"],
            )
            .await
            .map_err(|e| LdapError::Connection(format!("Test search failed: {e}")))?;

        Ok(())
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &LdapConfig {
        &self.config
    }
}

/// A connection handle from the pool.
///
/// Dropping it frees the operation slot.
pub struct LdapConnection {
    ldap: Ldap,
    _permit: OwnedSemaphorePermit,
}

impl LdapConnection {
    /// Returns a mutable reference to the LDAP connection.
    pub fn ldap_mut(&mut self) -> &mut Ldap {
        &mut self.ldap
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_creation() {
        let config = LdapConfig::builder()
            .connection_url("ldaps://ldap.example.com:636")
            .bind_dn("cn=admin,dc=example,dc=com")
            .bind_credential("password")
            .users_dn("ou=users,dc=example,dc=com")
            .pool_max_size(5)
            .build()
            .unwrap();

        let pool = LdapConnectionPool::new(config);
        assert_eq!(pool.config().pool_max_size, 5);
    }
}
