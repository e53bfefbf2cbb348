use std::sync::Arc;

use chrono::Utc;
use futures::future::try_join_all;
use serde_json::Value;
use tracing::{info, warn};

use crate::database::models::{
    CourseMember, CourseRequest, Curso, EnrollRequest, Inscripcion, NewCurso, NewInscripcion, Rol, Usuario,
};
use crate::database::{from_row, to_row, Row, RowFilter, StoreError, TableStore};
use crate::services::user_service::USUARIOS;
use crate::services::ServiceError;
use crate::tenant::TenantContext;

pub const CURSOS: &str = "cursos";
pub const INSCRIPCIONES: &str = "inscripciones";

/// Whether `usuario_id` has an `inscripciones` row for `curso_id`
pub async fn is_enrolled(
    store: &dyn TableStore,
    tenant: &TenantContext,
    usuario_id: i64,
    curso_id: i64,
) -> Result<bool, ServiceError> {
    let filter = RowFilter::new().eq("usuario_id", usuario_id).eq("curso_id", curso_id);
    Ok(store.select_one(&tenant.table(INSCRIPCIONES), &filter).await?.is_some())
}

/// Actions on courses and enrollments and the roles allowed to perform them.
/// Teachers are further limited to courses they are enrolled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CourseAction {
    List,
    Manage,
    ViewMembers,
    Enroll,
}

impl CourseAction {
    pub fn allows(&self, rol: Rol) -> bool {
        match self {
            CourseAction::List => true,
            CourseAction::Manage => rol == Rol::Director,
            CourseAction::ViewMembers | CourseAction::Enroll => matches!(rol, Rol::Profesor | Rol::Director),
        }
    }

    fn denial(&self) -> &'static str {
        match self {
            CourseAction::List => "Not allowed",
            CourseAction::Manage => "Only directors can manage courses",
            CourseAction::ViewMembers => "Only teachers and directors can view course members",
            CourseAction::Enroll => "Only teachers and directors can manage enrollments",
        }
    }

    pub fn check(&self, user: &Usuario) -> Result<(), ServiceError> {
        if self.allows(user.rol) {
            Ok(())
        } else {
            warn!("Denied {:?} for user {} with role {}", self, user.id, user.rol);
            Err(ServiceError::Forbidden(self.denial().to_string()))
        }
    }
}

#[derive(Clone)]
pub struct CourseService {
    store: Arc<dyn TableStore>,
}

impl CourseService {
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        Self { store }
    }

    async fn find_course(&self, tenant: &TenantContext, id: i64) -> Result<Option<Curso>, ServiceError> {
        let row = self
            .store
            .select_one(&tenant.table(CURSOS), &RowFilter::new().eq("id", id))
            .await?;
        Ok(row.map(from_row::<Curso>).transpose()?)
    }

    pub async fn get_course(&self, tenant: &TenantContext, id: i64) -> Result<Curso, ServiceError> {
        self.find_course(tenant, id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Course {} not found", id)))
    }

    async fn get_user(&self, tenant: &TenantContext, id: i64) -> Result<Usuario, ServiceError> {
        let row = self
            .store
            .select_one(&tenant.table(USUARIOS), &RowFilter::new().eq("id", id))
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", id)))?;
        Ok(from_row(row)?)
    }

    async fn enrollments_where(&self, tenant: &TenantContext, filter: RowFilter) -> Result<Vec<Inscripcion>, ServiceError> {
        let rows = self.store.select(&tenant.table(INSCRIPCIONES), &filter).await?;
        rows.into_iter().map(|r| from_row(r).map_err(ServiceError::from)).collect()
    }

    /// Checks `action` for the caller's role and, for teachers, enrollment in the course
    async fn authorize(
        &self,
        tenant: &TenantContext,
        caller: &Usuario,
        action: CourseAction,
        curso_id: i64,
    ) -> Result<(), ServiceError> {
        action.check(caller)?;
        if caller.rol == Rol::Profesor && !is_enrolled(self.store.as_ref(), tenant, caller.id, curso_id).await? {
            return Err(ServiceError::Forbidden("Not enrolled in this course".to_string()));
        }
        Ok(())
    }

    pub async fn list_courses(&self, tenant: &TenantContext) -> Result<Vec<Curso>, ServiceError> {
        let rows = self
            .store
            .select(&tenant.table(CURSOS), &RowFilter::new().order_asc("id"))
            .await?;
        rows.into_iter().map(|r| from_row(r).map_err(ServiceError::from)).collect()
    }

    /// Courses the caller is enrolled in. Enrollments pointing at deleted courses are skipped.
    pub async fn my_courses(&self, tenant: &TenantContext, caller: &Usuario) -> Result<Vec<Curso>, ServiceError> {
        let enrollments = self
            .enrollments_where(tenant, RowFilter::new().eq("usuario_id", caller.id).order_asc("curso_id"))
            .await?;
        let courses = try_join_all(enrollments.iter().map(|e| self.find_course(tenant, e.curso_id))).await?;
        Ok(courses.into_iter().flatten().collect())
    }

    fn validated(request: CourseRequest) -> Result<CourseRequest, ServiceError> {
        let nombre = request.nombre.trim();
        if nombre.is_empty() {
            return Err(ServiceError::Validation("nombre is required".to_string()));
        }
        Ok(CourseRequest {
            nombre: nombre.to_string(),
            descripcion: request.descripcion,
        })
    }

    pub async fn create_course(
        &self,
        tenant: &TenantContext,
        caller: &Usuario,
        request: CourseRequest,
    ) -> Result<Curso, ServiceError> {
        CourseAction::Manage.check(caller)?;
        let request = Self::validated(request)?;

        let new_course = NewCurso {
            nombre: request.nombre,
            descripcion: request.descripcion,
            created_at: Utc::now(),
        };
        let row = self.store.insert(&tenant.table(CURSOS), to_row(&new_course)?).await?;
        let curso: Curso = from_row(row)?;
        info!("Director {} created course {} in tenant {}", caller.id, curso.id, tenant.key);
        Ok(curso)
    }

    pub async fn update_course(
        &self,
        tenant: &TenantContext,
        caller: &Usuario,
        id: i64,
        request: CourseRequest,
    ) -> Result<Curso, ServiceError> {
        CourseAction::Manage.check(caller)?;
        let request = Self::validated(request)?;

        let mut patch = Row::new();
        patch.insert("nombre".to_string(), Value::from(request.nombre));
        patch.insert("descripcion".to_string(), request.descripcion.map(Value::from).unwrap_or(Value::Null));

        let updated = self
            .store
            .update(&tenant.table(CURSOS), &RowFilter::new().eq("id", id), patch)
            .await?;
        let row = updated
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::NotFound(format!("Course {} not found", id)))?;
        Ok(from_row(row)?)
    }

    /// Removes the course and its enrollments
    pub async fn delete_course(&self, tenant: &TenantContext, caller: &Usuario, id: i64) -> Result<(), ServiceError> {
        CourseAction::Manage.check(caller)?;
        self.get_course(tenant, id).await?;

        self.store
            .delete(&tenant.table(INSCRIPCIONES), &RowFilter::new().eq("curso_id", id))
            .await?;
        self.store
            .delete(&tenant.table(CURSOS), &RowFilter::new().eq("id", id))
            .await?;
        info!("Director {} deleted course {} in tenant {}", caller.id, id, tenant.key);
        Ok(())
    }

    /// Makes `profesor_id` the course's teacher and enrolls them if needed
    pub async fn assign_teacher(
        &self,
        tenant: &TenantContext,
        caller: &Usuario,
        curso_id: i64,
        profesor_id: i64,
    ) -> Result<Curso, ServiceError> {
        CourseAction::Manage.check(caller)?;
        self.get_course(tenant, curso_id).await?;
        let teacher = self.get_user(tenant, profesor_id).await?;
        if teacher.rol != Rol::Profesor {
            return Err(ServiceError::Validation(format!("User {} is not a teacher", profesor_id)));
        }

        let mut patch = Row::new();
        patch.insert("profesor_id".to_string(), Value::from(profesor_id));
        let updated = self
            .store
            .update(&tenant.table(CURSOS), &RowFilter::new().eq("id", curso_id), patch)
            .await?;
        let row = updated
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::NotFound(format!("Course {} not found", curso_id)))?;

        if !is_enrolled(self.store.as_ref(), tenant, profesor_id, curso_id).await? {
            match self.insert_enrollment(tenant, profesor_id, curso_id).await {
                Ok(_) | Err(ServiceError::Conflict(_)) => {}
                Err(e) => return Err(e),
            }
        }

        info!("Assigned teacher {} to course {} in tenant {}", profesor_id, curso_id, tenant.key);
        Ok(from_row(row)?)
    }

    async fn members(&self, tenant: &TenantContext, curso_id: i64) -> Result<Vec<CourseMember>, ServiceError> {
        let enrollments = self
            .enrollments_where(tenant, RowFilter::new().eq("curso_id", curso_id).order_asc("id"))
            .await?;
        let members = try_join_all(enrollments.into_iter().map(|e| async move {
            let row = self
                .store
                .select_one(&tenant.table(USUARIOS), &RowFilter::new().eq("id", e.usuario_id))
                .await?;
            let usuario = row.map(from_row::<Usuario>).transpose()?;
            Ok::<_, ServiceError>(usuario.map(|usuario| CourseMember {
                inscripcion_id: e.id,
                enrolled_at: e.created_at,
                usuario,
            }))
        }))
        .await?;
        Ok(members.into_iter().flatten().collect())
    }

    /// Everyone enrolled in the course
    pub async fn course_enrollments(
        &self,
        tenant: &TenantContext,
        caller: &Usuario,
        curso_id: i64,
    ) -> Result<Vec<CourseMember>, ServiceError> {
        self.get_course(tenant, curso_id).await?;
        self.authorize(tenant, caller, CourseAction::ViewMembers, curso_id).await?;
        self.members(tenant, curso_id).await
    }

    /// Enrolled students only, for attendance sheets
    pub async fn course_students(
        &self,
        tenant: &TenantContext,
        caller: &Usuario,
        curso_id: i64,
    ) -> Result<Vec<Usuario>, ServiceError> {
        self.get_course(tenant, curso_id).await?;
        self.authorize(tenant, caller, CourseAction::ViewMembers, curso_id).await?;
        Ok(self
            .members(tenant, curso_id)
            .await?
            .into_iter()
            .map(|m| m.usuario)
            .filter(|u| u.rol == Rol::Estudiante)
            .collect())
    }

    async fn insert_enrollment(
        &self,
        tenant: &TenantContext,
        usuario_id: i64,
        curso_id: i64,
    ) -> Result<Inscripcion, ServiceError> {
        let new_enrollment = NewInscripcion {
            usuario_id,
            curso_id,
            created_at: Utc::now(),
        };
        match self
            .store
            .insert(&tenant.table(INSCRIPCIONES), to_row(&new_enrollment)?)
            .await
        {
            Ok(row) => Ok(from_row(row)?),
            Err(StoreError::Conflict(_)) => Err(already_enrolled(usuario_id, curso_id)),
            Err(e) => Err(e.into()),
        }
    }

    /// Directors enroll anyone; teachers enroll students into their own courses
    pub async fn enroll(
        &self,
        tenant: &TenantContext,
        caller: &Usuario,
        request: EnrollRequest,
    ) -> Result<Inscripcion, ServiceError> {
        let EnrollRequest { usuario_id, curso_id } = request;
        self.get_course(tenant, curso_id).await?;
        self.authorize(tenant, caller, CourseAction::Enroll, curso_id).await?;
        let target = self.get_user(tenant, usuario_id).await?;
        if caller.rol == Rol::Profesor && target.rol != Rol::Estudiante {
            return Err(ServiceError::Forbidden("Teachers can only enroll students".to_string()));
        }

        if is_enrolled(self.store.as_ref(), tenant, usuario_id, curso_id).await? {
            return Err(already_enrolled(usuario_id, curso_id));
        }
        let enrollment = self.insert_enrollment(tenant, usuario_id, curso_id).await?;
        info!("User {} enrolled user {} in course {}", caller.id, usuario_id, curso_id);
        Ok(enrollment)
    }

    pub async fn unenroll(&self, tenant: &TenantContext, caller: &Usuario, inscripcion_id: i64) -> Result<(), ServiceError> {
        let filter = RowFilter::new().eq("id", inscripcion_id);
        let enrollment: Inscripcion = match self.store.select_one(&tenant.table(INSCRIPCIONES), &filter).await? {
            Some(row) => from_row(row)?,
            None => return Err(ServiceError::NotFound(format!("Enrollment {} not found", inscripcion_id))),
        };
        self.authorize(tenant, caller, CourseAction::Enroll, enrollment.curso_id).await?;
        if caller.rol == Rol::Profesor {
            let target = self.get_user(tenant, enrollment.usuario_id).await?;
            if target.rol != Rol::Estudiante {
                return Err(ServiceError::Forbidden("Teachers can only remove students".to_string()));
            }
        }

        self.store.delete(&tenant.table(INSCRIPCIONES), &filter).await?;
        info!(
            "User {} removed user {} from course {}",
            caller.id, enrollment.usuario_id, enrollment.curso_id
        );
        Ok(())
    }
}

fn already_enrolled(usuario_id: i64, curso_id: i64) -> ServiceError {
    ServiceError::Conflict(format!("User {} is already enrolled in course {}", usuario_id, curso_id))
}
