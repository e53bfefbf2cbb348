use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use crate::database::models::{NewUsuario, Rol, Usuario};
use crate::database::{from_row, to_row, RowFilter, StoreError, TableStore};
use crate::names::split_full_name;
use crate::services::ServiceError;
use crate::tenant::TenantContext;

pub const USUARIOS: &str = "usuarios";

/// Result of syncing the caller into the tenant's user table
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    Created(Usuario),
    Existing(Usuario),
}

impl SyncOutcome {
    pub fn user(&self) -> &Usuario {
        match self {
            SyncOutcome::Created(u) | SyncOutcome::Existing(u) => u,
        }
    }

    pub fn created(&self) -> bool {
        matches!(self, SyncOutcome::Created(_))
    }
}

#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn TableStore>,
}

impl UserService {
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        Self { store }
    }

    pub async fn find_by_email(&self, tenant: &TenantContext, email: &str) -> Result<Option<Usuario>, ServiceError> {
        let filter = RowFilter::new().eq("email", email.trim().to_lowercase());
        match self.store.select_one(&tenant.table(USUARIOS), &filter).await? {
            Some(row) => Ok(Some(from_row(row)?)),
            None => Ok(None),
        }
    }

    /// The caller's own row; every tenant-scoped action starts here
    pub async fn require_user(&self, tenant: &TenantContext, email: &str) -> Result<Usuario, ServiceError> {
        self.find_by_email(tenant, email)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))
    }

    /// Creates the user row on first sight; repeated calls return the existing row
    pub async fn sync_user(
        &self,
        tenant: &TenantContext,
        email: &str,
        full_name: Option<&str>,
    ) -> Result<SyncOutcome, ServiceError> {
        let email = email.trim().to_lowercase();
        if email.is_empty() {
            return Err(ServiceError::Validation("Email is required".to_string()));
        }
        if !tenant.owns_email(&email) {
            return Err(ServiceError::Validation(format!(
                "Email {} does not belong to tenant {}",
                email, tenant.key
            )));
        }

        if let Some(existing) = self.find_by_email(tenant, &email).await? {
            debug!("User {} already present in tenant {}", email, tenant.key);
            return Ok(SyncOutcome::Existing(existing));
        }

        let mut name = split_full_name(full_name.unwrap_or_default());
        if name.nombre.is_empty() {
            name.nombre = email.split('@').next().unwrap_or_default().to_string();
        }
        let new_user = NewUsuario {
            nombre: name.nombre,
            apellido: name.apellido,
            email: email.clone(),
            rol: Rol::Estudiante,
        };

        match self.store.insert(&tenant.table(USUARIOS), to_row(&new_user)?).await {
            Ok(row) => {
                let user: Usuario = from_row(row)?;
                info!("Created user {} in tenant {}", user.id, tenant.key);
                Ok(SyncOutcome::Created(user))
            }
            // A concurrent sync won the race on the unique email
            Err(StoreError::Conflict(_)) => {
                let existing = self.require_user(tenant, &email).await?;
                Ok(SyncOutcome::Existing(existing))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn profile(&self, tenant: &TenantContext, email: &str) -> Result<Usuario, ServiceError> {
        self.require_user(tenant, email).await
    }

    pub async fn list_users(&self, tenant: &TenantContext) -> Result<Vec<Usuario>, ServiceError> {
        let rows = self
            .store
            .select(&tenant.table(USUARIOS), &RowFilter::new().order_asc("id"))
            .await?;
        rows.into_iter().map(|r| from_row(r).map_err(ServiceError::from)).collect()
    }

    pub async fn update_role(&self, tenant: &TenantContext, id: i64, rol: Rol) -> Result<Usuario, ServiceError> {
        let mut patch = serde_json::Map::new();
        patch.insert("rol".to_string(), Value::from(rol.as_str()));

        let updated = self
            .store
            .update(&tenant.table(USUARIOS), &RowFilter::new().eq("id", id), patch)
            .await?;
        let row = updated
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", id)))?;

        info!("Set role of user {} in tenant {} to {}", id, tenant.key, rol);
        Ok(from_row(row)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ucb, MemoryStore, StaleReads};

    fn service() -> (UserService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new().unique(&ucb().table(USUARIOS), "email"));
        (UserService::new(store.clone()), store)
    }

    #[tokio::test]
    async fn sync_is_idempotent() {
        let (users, store) = service();
        let tenant = ucb();

        let first = users
            .sync_user(&tenant, "Ana@UCB.edu.bo", Some("Ana María Pérez Rojas"))
            .await
            .unwrap();
        assert!(first.created());
        assert_eq!(first.user().nombre, "Ana María");
        assert_eq!(first.user().apellido, "Pérez Rojas");
        assert_eq!(first.user().email, "ana@ucb.edu.bo");
        assert_eq!(first.user().rol, Rol::Estudiante);

        let second = users.sync_user(&tenant, "ana@ucb.edu.bo", Some("Other Name")).await.unwrap();
        assert_eq!(second, SyncOutcome::Existing(first.user().clone()));
        assert_eq!(store.rows(&tenant.table(USUARIOS)).len(), 1);
    }

    #[tokio::test]
    async fn sync_without_name_uses_email_local_part() {
        let (users, _) = service();
        let outcome = users.sync_user(&ucb(), "luis.rojas@ucb.edu.bo", None).await.unwrap();
        assert_eq!(outcome.user().nombre, "luis.rojas");
        assert_eq!(outcome.user().apellido, "");
    }

    #[tokio::test]
    async fn sync_rejects_emails_of_other_tenants() {
        let (users, store) = service();
        assert!(matches!(
            users.sync_user(&ucb(), "ana@upb.edu.bo", None).await,
            Err(ServiceError::Validation(_))
        ));
        assert!(store.rows(&ucb().table(USUARIOS)).is_empty());
    }

    #[tokio::test]
    async fn profile_requires_existing_row() {
        let (users, _) = service();
        assert!(matches!(
            users.profile(&ucb(), "ghost@ucb.edu.bo").await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn updates_roles_and_reports_missing_ids() {
        let (users, _) = service();
        let tenant = ucb();
        let created = users.sync_user(&tenant, "p@ucb.edu.bo", Some("Pablo Vaca")).await.unwrap();

        let updated = users.update_role(&tenant, created.user().id, Rol::Profesor).await.unwrap();
        assert_eq!(updated.rol, Rol::Profesor);
        assert_eq!(users.list_users(&tenant).await.unwrap()[0].rol, Rol::Profesor);

        assert!(matches!(
            users.update_role(&tenant, 999, Rol::Director).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn concurrent_sync_resolves_to_existing_row() {
        let (users, store) = service();
        let tenant = ucb();
        let first = users.sync_user(&tenant, "ana@ucb.edu.bo", Some("Ana Pérez")).await.unwrap();

        // The lookup misses, the insert hits the unique email, the re-read finds the winner
        let racing = UserService::new(Arc::new(StaleReads::new(store.clone(), 1)));
        let outcome = racing.sync_user(&tenant, "ana@ucb.edu.bo", Some("Ana Pérez")).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Existing(first.user().clone()));
        assert_eq!(store.rows(&tenant.table(USUARIOS)).len(), 1);
    }
}
