use std::sync::Arc;

use chrono::Utc;
use futures::future::try_join_all;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::database::models::{
    Assignment, AssignmentCompletion, CompletionInfo, CompletionStats, CreateAssignmentRequest, NewAssignment, Rol,
    Usuario,
};
use crate::database::{from_row, to_row, Row, RowFilter, StoreError, TableStore};
use crate::services::course_service::{self, INSCRIPCIONES};
use crate::services::ServiceError;
use crate::tenant::TenantContext;

const ASSIGNMENTS: &str = "assignments";
const COMPLETIONS: &str = "assignment_completions";

/// Actions on assignments and the roles allowed to perform them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentAction {
    List,
    Create,
    Complete,
    Detail,
}

impl AssignmentAction {
    pub fn allows(&self, rol: Rol) -> bool {
        match self {
            AssignmentAction::List => matches!(rol, Rol::Estudiante | Rol::Profesor),
            AssignmentAction::Create => rol == Rol::Profesor,
            AssignmentAction::Complete => rol == Rol::Estudiante,
            AssignmentAction::Detail => true,
        }
    }

    fn denial(&self) -> &'static str {
        match self {
            AssignmentAction::List => "Only students and teachers can list course assignments",
            AssignmentAction::Create => "Only teachers can create assignments",
            AssignmentAction::Complete => "Only students can complete assignments",
            AssignmentAction::Detail => "Not allowed",
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

/// One listed assignment, shaped by the caller's role
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum AssignmentEntry {
    Student {
        assignment: Assignment,
        completion: Option<CompletionInfo>,
    },
    Teacher {
        assignment: Assignment,
        completions: CompletionStats,
    },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CourseAssignments {
    pub assignments: Vec<AssignmentEntry>,
    pub user_role: Rol,
    pub total: usize,
}

#[derive(Clone)]
pub struct AssignmentService {
    store: Arc<dyn TableStore>,
}

impl AssignmentService {
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        Self { store }
    }

    async fn require_enrolled(&self, tenant: &TenantContext, user: &Usuario, curso_id: i64) -> Result<(), ServiceError> {
        if course_service::is_enrolled(self.store.as_ref(), tenant, user.id, curso_id).await? {
            Ok(())
        } else {
            Err(ServiceError::Forbidden("Not enrolled in this course".to_string()))
        }
    }

    async fn completions(
        &self,
        tenant: &TenantContext,
        filter: RowFilter,
    ) -> Result<Vec<AssignmentCompletion>, ServiceError> {
        let rows = self.store.select(&tenant.table(COMPLETIONS), &filter).await?;
        rows.into_iter().map(|r| from_row(r).map_err(ServiceError::from)).collect()
    }

    async fn entry_for(
        &self,
        tenant: &TenantContext,
        caller: &Usuario,
        assignment: Assignment,
    ) -> Result<AssignmentEntry, ServiceError> {
        let filter = RowFilter::new().eq("assignment_id", assignment.id);
        if caller.rol == Rol::Profesor {
            let completions = self.completions(tenant, filter).await?;
            Ok(AssignmentEntry::Teacher {
                assignment,
                completions: CompletionStats::from_completions(&completions),
            })
        } else {
            let own = self
                .completions(tenant, filter.eq("student_id", caller.id).limit(1))
                .await?
                .into_iter()
                .next();
            Ok(AssignmentEntry::Student {
                assignment,
                completion: own.map(CompletionInfo::from),
            })
        }
    }

    /// Active assignments of a course, newest first
    pub async fn list_course_assignments(
        &self,
        tenant: &TenantContext,
        caller: &Usuario,
        curso_id: i64,
    ) -> Result<CourseAssignments, ServiceError> {
        AssignmentAction::List.check(caller)?;
        self.require_enrolled(tenant, caller, curso_id).await?;

        let filter = RowFilter::new()
            .eq("curso_id", curso_id)
            .eq("is_active", true)
            .order_desc("created_at");
        let rows = self.store.select(&tenant.table(ASSIGNMENTS), &filter).await?;
        let assignments = rows
            .into_iter()
            .map(from_row::<Assignment>)
            .collect::<Result<Vec<_>, _>>()?;

        let entries = try_join_all(assignments.into_iter().map(|a| self.entry_for(tenant, caller, a))).await?;
        Ok(CourseAssignments {
            total: entries.len(),
            assignments: entries,
            user_role: caller.rol,
        })
    }

    pub async fn create_assignment(
        &self,
        tenant: &TenantContext,
        caller: &Usuario,
        curso_id: i64,
        request: CreateAssignmentRequest,
    ) -> Result<Assignment, ServiceError> {
        AssignmentAction::Create.check(caller)?;
        self.require_enrolled(tenant, caller, curso_id).await?;

        if request.title.trim().is_empty() {
            return Err(ServiceError::Validation("title is required".to_string()));
        }
        if request.assignment_type.trim().is_empty() {
            return Err(ServiceError::Validation("assignment_type is required".to_string()));
        }

        let new_assignment = NewAssignment {
            title: request.title.trim().to_string(),
            description: request.description,
            due_date: request.due_date,
            points: request.points,
            assignment_type: request.assignment_type.trim().to_string(),
            curso_id,
            profesor_id: caller.id,
            created_at: Utc::now(),
            is_active: true,
            status: "active".to_string(),
        };
        let row = self
            .store
            .insert(&tenant.table(ASSIGNMENTS), to_row(&new_assignment)?)
            .await?;
        let assignment: Assignment = from_row(row)?;
        info!("Teacher {} created assignment {} in course {}", caller.id, assignment.id, curso_id);
        Ok(assignment)
    }

    pub async fn get_assignment(&self, tenant: &TenantContext, id: i64) -> Result<Assignment, ServiceError> {
        let row = self
            .store
            .select_one(&tenant.table(ASSIGNMENTS), &RowFilter::new().eq("id", id))
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Assignment {} not found", id)))?;
        Ok(from_row(row)?)
    }

    /// Records the caller's submission, replacing any earlier one
    pub async fn complete_assignment(
        &self,
        tenant: &TenantContext,
        caller: &Usuario,
        assignment_id: i64,
        submitted_content: Option<String>,
    ) -> Result<AssignmentCompletion, ServiceError> {
        AssignmentAction::Complete.check(caller)?;
        let assignment = self.get_assignment(tenant, assignment_id).await?;
        self.require_enrolled(tenant, caller, assignment.curso_id).await?;

        let table = tenant.table(COMPLETIONS);
        let filter = RowFilter::new()
            .eq("assignment_id", assignment_id)
            .eq("student_id", caller.id);

        let mut patch = Row::new();
        patch.insert("completed_at".to_string(), Value::from(Utc::now().to_rfc3339()));
        patch.insert("status".to_string(), Value::from("completed"));
        if let Some(content) = submitted_content {
            patch.insert("submitted_content".to_string(), Value::from(content));
        }

        let existing = self.store.select_one(&table, &filter).await?;
        let row = match existing {
            Some(_) => self.update_completion(&table, &filter, patch).await?,
            None => {
                let mut row = patch.clone();
                row.insert("assignment_id".to_string(), Value::from(assignment_id));
                row.insert("student_id".to_string(), Value::from(caller.id));
                match self.store.insert(&table, row).await {
                    Ok(row) => row,
                    Err(StoreError::Conflict(_)) => self.update_completion(&table, &filter, patch).await?,
                    Err(e) => return Err(e.into()),
                }
            }
        };

        info!("Student {} completed assignment {}", caller.id, assignment_id);
        Ok(from_row(row)?)
    }

    async fn update_completion(
        &self,
        table: &crate::database::TableRef,
        filter: &RowFilter,
        patch: Row,
    ) -> Result<Row, ServiceError> {
        self.store
            .update(table, filter, patch)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::NotFound("Completion not found".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ucb, MemoryStore, StaleReads};
    use serde_json::json;

    fn user(id: i64, rol: Rol) -> Usuario {
        Usuario {
            id,
            nombre: format!("user{}", id),
            apellido: String::new(),
            email: format!("user{}@ucb.edu.bo", id),
            rol,
        }
    }

    /// Course 10 with students 1, 2, teacher 3, director 4 enrolled and one assignment
    fn fixture() -> (AssignmentService, Arc<MemoryStore>) {
        let tenant = ucb();
        let store = Arc::new(MemoryStore::new());
        store.seed(
            &tenant.table(INSCRIPCIONES),
            (1..=4)
                .map(|u| json!({"usuario_id": u, "curso_id": 10}))
                .collect(),
        );
        store.seed(
            &tenant.table(ASSIGNMENTS),
            vec![
                json!({"id": 100, "title": "Ensayo", "description": null, "assignment_type": "homework",
                       "curso_id": 10, "profesor_id": 3, "created_at": "2024-05-01T10:00:00+00:00",
                       "is_active": true, "status": "active", "points": 10}),
                json!({"id": 101, "title": "Viejo", "assignment_type": "quiz", "curso_id": 10, "profesor_id": 3,
                       "created_at": "2024-04-01T10:00:00+00:00", "is_active": false, "status": "active"}),
            ],
        );
        store.seed(
            &tenant.table(COMPLETIONS),
            vec![json!({"assignment_id": 100, "student_id": 2, "status": "completed",
                        "completed_at": "2024-05-02T10:00:00+00:00"})],
        );
        (AssignmentService::new(store.clone()), store)
    }

    fn request() -> CreateAssignmentRequest {
        CreateAssignmentRequest {
            title: "Proyecto".into(),
            description: Some("Final".into()),
            due_date: None,
            points: None,
            assignment_type: "project".into(),
        }
    }

    #[test]
    fn role_matrix() {
        use AssignmentAction::*;
        let expected = [
            (List, [true, true, false]),
            (Create, [false, true, false]),
            (Complete, [true, false, false]),
            (Detail, [true, true, true]),
        ];
        for (action, allowed) in expected {
            for (rol, allow) in Rol::all().into_iter().zip(allowed) {
                assert_eq!(action.allows(rol), allow, "{:?} for {}", action, rol);
            }
        }
    }

    #[tokio::test]
    async fn mismatching_roles_are_forbidden() {
        let (service, _) = fixture();
        let tenant = ucb();

        assert!(matches!(
            service.list_course_assignments(&tenant, &user(4, Rol::Director), 10).await,
            Err(ServiceError::Forbidden(_))
        ));
        for caller in [user(1, Rol::Estudiante), user(4, Rol::Director)] {
            assert!(matches!(
                service.create_assignment(&tenant, &caller, 10, request()).await,
                Err(ServiceError::Forbidden(_))
            ));
        }
        for caller in [user(3, Rol::Profesor), user(4, Rol::Director)] {
            assert!(matches!(
                service.complete_assignment(&tenant, &caller, 100, None).await,
                Err(ServiceError::Forbidden(_))
            ));
        }
    }

    #[tokio::test]
    async fn students_see_their_own_completion() {
        let (service, _) = fixture();
        let tenant = ucb();

        let listed = service
            .list_course_assignments(&tenant, &user(2, Rol::Estudiante), 10)
            .await
            .unwrap();
        assert_eq!(listed.total, 1);
        assert_eq!(listed.user_role, Rol::Estudiante);
        match &listed.assignments[0] {
            AssignmentEntry::Student { assignment, completion } => {
                assert_eq!(assignment.id, 100);
                assert_eq!(completion.as_ref().unwrap().status.as_deref(), Some("completed"));
            }
            other => panic!("unexpected entry {:?}", other),
        }

        let listed = service
            .list_course_assignments(&tenant, &user(1, Rol::Estudiante), 10)
            .await
            .unwrap();
        assert!(matches!(
            &listed.assignments[0],
            AssignmentEntry::Student { completion: None, .. }
        ));
    }

    #[tokio::test]
    async fn teachers_see_completion_stats() {
        let (service, _) = fixture();
        let listed = service
            .list_course_assignments(&ucb(), &user(3, Rol::Profesor), 10)
            .await
            .unwrap();
        let json = serde_json::to_value(&listed).unwrap();
        assert_eq!(json["assignments"][0]["completions"], json!({"total": 1, "completed": 1}));
        assert_eq!(json["user_role"], json!("Profesor"));
    }

    #[tokio::test]
    async fn enrollment_is_required() {
        let (service, _) = fixture();
        assert!(matches!(
            service
                .list_course_assignments(&ucb(), &user(9, Rol::Estudiante), 10)
                .await,
            Err(ServiceError::Forbidden(_))
        ));
        assert!(matches!(
            service.create_assignment(&ucb(), &user(3, Rol::Profesor), 11, request()).await,
            Err(ServiceError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn teacher_creates_assignment() {
        let (service, _) = fixture();
        let created = service
            .create_assignment(&ucb(), &user(3, Rol::Profesor), 10, request())
            .await
            .unwrap();
        assert_eq!(created.profesor_id, 3);
        assert_eq!(created.curso_id, 10);
        assert!(created.is_active);
        assert_eq!(created.status, "active");

        let mut blank = request();
        blank.title = "  ".into();
        assert!(matches!(
            service.create_assignment(&ucb(), &user(3, Rol::Profesor), 10, blank).await,
            Err(ServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn completing_twice_updates_the_same_row() {
        let (service, store) = fixture();
        let tenant = ucb();
        let student = user(1, Rol::Estudiante);

        let first = service
            .complete_assignment(&tenant, &student, 100, Some("v1".into()))
            .await
            .unwrap();
        let second = service
            .complete_assignment(&tenant, &student, 100, Some("v2".into()))
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.submitted_content.as_deref(), Some("v2"));
        assert!(second.is_completed());
        assert_eq!(store.rows(&tenant.table(COMPLETIONS)).len(), 2);

        assert!(matches!(
            service.complete_assignment(&tenant, &student, 555, None).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn resubmitting_without_content_keeps_the_earlier_submission() {
        let (service, _) = fixture();
        let tenant = ucb();
        let student = user(1, Rol::Estudiante);

        service
            .complete_assignment(&tenant, &student, 100, Some("v1".into()))
            .await
            .unwrap();
        let again = service.complete_assignment(&tenant, &student, 100, None).await.unwrap();
        assert_eq!(again.submitted_content.as_deref(), Some("v1"));
        assert!(again.is_completed());
    }

    #[tokio::test]
    async fn conflicting_completion_insert_falls_back_to_update() {
        let tenant = ucb();
        let store = Arc::new(MemoryStore::new().unique(&tenant.table(COMPLETIONS), "student_id"));
        store.seed(&tenant.table(INSCRIPCIONES), vec![json!({"usuario_id": 1, "curso_id": 10})]);
        store.seed(
            &tenant.table(ASSIGNMENTS),
            vec![json!({"id": 100, "title": "Ensayo", "assignment_type": "homework", "curso_id": 10,
                        "profesor_id": 3, "created_at": "2024-05-01T10:00:00+00:00"})],
        );
        store.seed(
            &tenant.table(COMPLETIONS),
            vec![json!({"id": 7, "assignment_id": 100, "student_id": 1, "status": "pending",
                        "submitted_content": "draft"})],
        );

        // Assignment and enrollment reads succeed; only the completion lookup misses
        let racing = AssignmentService::new(Arc::new(StaleReads::after(store.clone(), 2, 1)));
        let completion = racing
            .complete_assignment(&tenant, &user(1, Rol::Estudiante), 100, Some("final".into()))
            .await
            .unwrap();
        assert_eq!(completion.id, 7);
        assert_eq!(completion.submitted_content.as_deref(), Some("final"));
        assert!(completion.is_completed());
        assert_eq!(store.rows(&tenant.table(COMPLETIONS)).len(), 1);
    }
}
