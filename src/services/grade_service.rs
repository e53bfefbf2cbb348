use std::sync::Arc;

use chrono::Utc;
use futures::future::try_join_all;
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::{info, warn};

use crate::database::models::{GradeRequest, GradeUpdate, Inscripcion, NewNota, Nota, Rol, Usuario};
use crate::database::{from_row, to_row, Row, RowFilter, TableStore};
use crate::services::course_service::{is_enrolled, INSCRIPCIONES};
use crate::services::ServiceError;
use crate::tenant::TenantContext;

const NOTAS: &str = "notas";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradeAction {
    Read,
    Write,
}

impl GradeAction {
    pub fn allows(&self, rol: Rol) -> bool {
        match self {
            GradeAction::Read => true,
            GradeAction::Write => matches!(rol, Rol::Profesor | Rol::Director),
        }
    }

    pub fn check(&self, user: &Usuario) -> Result<(), ServiceError> {
        if self.allows(user.rol) {
            Ok(())
        } else {
            warn!("Denied {:?} for user {} with role {}", self, user.id, user.rol);
            Err(ServiceError::Forbidden("Only teachers and directors can record grades".to_string()))
        }
    }
}

/// Grades in `<prefix>_notas`. Teachers are limited to courses they are enrolled in.
#[derive(Clone)]
pub struct GradeService {
    store: Arc<dyn TableStore>,
}

impl GradeService {
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        Self { store }
    }

    async fn grades_where(&self, tenant: &TenantContext, filter: RowFilter) -> Result<Vec<Nota>, ServiceError> {
        let rows = self.store.select(&tenant.table(NOTAS), &filter).await?;
        rows.into_iter().map(|r| from_row(r).map_err(ServiceError::from)).collect()
    }

    async fn require_teaches(&self, tenant: &TenantContext, caller: &Usuario, course_id: i64) -> Result<(), ServiceError> {
        if caller.rol == Rol::Profesor && !is_enrolled(self.store.as_ref(), tenant, caller.id, course_id).await? {
            return Err(ServiceError::Forbidden("Not enrolled in this course".to_string()));
        }
        Ok(())
    }

    /// Grades visible to the caller across the tenant
    pub async fn list_grades(&self, tenant: &TenantContext, caller: &Usuario) -> Result<Vec<Nota>, ServiceError> {
        match caller.rol {
            Rol::Director => self.grades_where(tenant, RowFilter::new().order_asc("id")).await,
            Rol::Estudiante => {
                self.grades_where(tenant, RowFilter::new().eq("student_id", caller.id).order_asc("id"))
                    .await
            }
            Rol::Profesor => {
                let rows = self
                    .store
                    .select(&tenant.table(INSCRIPCIONES), &RowFilter::new().eq("usuario_id", caller.id))
                    .await?;
                let courses = rows
                    .into_iter()
                    .map(from_row::<Inscripcion>)
                    .collect::<Result<Vec<_>, _>>()?;
                let per_course = try_join_all(courses.iter().map(|c| {
                    self.grades_where(tenant, RowFilter::new().eq("course_id", c.curso_id))
                }))
                .await?;
                let mut grades: Vec<Nota> = per_course.into_iter().flatten().collect();
                grades.sort_by_key(|g| g.id);
                Ok(grades)
            }
        }
    }

    pub async fn list_course_grades(
        &self,
        tenant: &TenantContext,
        caller: &Usuario,
        course_id: i64,
    ) -> Result<Vec<Nota>, ServiceError> {
        let filter = RowFilter::new().eq("course_id", course_id);
        let filter = match caller.rol {
            Rol::Estudiante => filter.eq("student_id", caller.id),
            _ => {
                self.require_teaches(tenant, caller, course_id).await?;
                filter
            }
        };
        self.grades_where(tenant, filter.order_asc("id")).await
    }

    /// Records a batch of grades. Every entry is checked before any is written.
    pub async fn create_grades(
        &self,
        tenant: &TenantContext,
        caller: &Usuario,
        grades: Vec<GradeRequest>,
    ) -> Result<Vec<Nota>, ServiceError> {
        GradeAction::Write.check(caller)?;
        if grades.is_empty() {
            return Err(ServiceError::Validation("at least one grade is required".to_string()));
        }
        for g in &grades {
            validate_grade(g.grade)?;
            self.require_teaches(tenant, caller, g.course_id).await?;
            if !is_enrolled(self.store.as_ref(), tenant, g.student_id, g.course_id).await? {
                return Err(ServiceError::Validation(format!(
                    "Student {} is not enrolled in course {}",
                    g.student_id, g.course_id
                )));
            }
        }

        let registered_at = Utc::now();
        let mut created = Vec::with_capacity(grades.len());
        for g in grades {
            let new_grade = NewNota {
                student_id: g.student_id,
                course_id: g.course_id,
                grade: g.grade,
                subject: g.subject.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
                registered_at,
            };
            let row = self.store.insert(&tenant.table(NOTAS), to_row(&new_grade)?).await?;
            created.push(from_row::<Nota>(row)?);
        }
        info!("User {} recorded {} grades in tenant {}", caller.id, created.len(), tenant.key);
        Ok(created)
    }

    async fn get_grade(&self, tenant: &TenantContext, id: i64) -> Result<Nota, ServiceError> {
        let row = self
            .store
            .select_one(&tenant.table(NOTAS), &RowFilter::new().eq("id", id))
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Grade {} not found", id)))?;
        Ok(from_row(row)?)
    }

    pub async fn update_grade(
        &self,
        tenant: &TenantContext,
        caller: &Usuario,
        id: i64,
        update: GradeUpdate,
    ) -> Result<Nota, ServiceError> {
        GradeAction::Write.check(caller)?;
        let existing = self.get_grade(tenant, id).await?;
        self.require_teaches(tenant, caller, existing.course_id).await?;

        let mut patch = Row::new();
        if let Some(grade) = update.grade {
            validate_grade(grade)?;
            patch.insert("grade".to_string(), Value::from(grade.to_string()));
        }
        if let Some(subject) = update.subject {
            patch.insert("subject".to_string(), Value::from(subject));
        }
        if patch.is_empty() {
            return Err(ServiceError::Validation("nothing to update".to_string()));
        }

        let updated = self
            .store
            .update(&tenant.table(NOTAS), &RowFilter::new().eq("id", id), patch)
            .await?;
        let row = updated
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::NotFound(format!("Grade {} not found", id)))?;
        info!("User {} updated grade {}", caller.id, id);
        Ok(from_row(row)?)
    }

    pub async fn delete_grade(&self, tenant: &TenantContext, caller: &Usuario, id: i64) -> Result<(), ServiceError> {
        GradeAction::Write.check(caller)?;
        let existing = self.get_grade(tenant, id).await?;
        self.require_teaches(tenant, caller, existing.course_id).await?;

        self.store
            .delete(&tenant.table(NOTAS), &RowFilter::new().eq("id", id))
            .await?;
        info!("User {} deleted grade {}", caller.id, id);
        Ok(())
    }
}

fn validate_grade(grade: Decimal) -> Result<(), ServiceError> {
    if grade.is_sign_negative() {
        return Err(ServiceError::Validation("grade cannot be negative".to_string()));
    }
    Ok(())
}
