use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::timestamp;

/// Row of `<prefix>_assignments`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Assignment {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "timestamp::option::deserialize")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub points: Option<Decimal>,
    pub assignment_type: String,
    pub curso_id: i64,
    pub profesor_id: i64,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default = "default_status")]
    pub status: String,
}

fn default_true() -> bool {
    true
}

fn default_status() -> String {
    "active".to_string()
}

/// Row of `<prefix>_assignment_completions`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssignmentCompletion {
    pub id: i64,
    pub assignment_id: i64,
    pub student_id: i64,
    #[serde(default, deserialize_with = "timestamp::option::deserialize")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub submitted_content: Option<String>,
    #[serde(default)]
    pub grade: Option<Decimal>,
    #[serde(default)]
    pub feedback: Option<String>,
}

impl AssignmentCompletion {
    pub fn is_completed(&self) -> bool {
        self.status.as_deref() == Some("completed")
    }
}

/// What a student sees of their own submission
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CompletionInfo {
    pub completed_at: Option<DateTime<Utc>>,
    pub status: Option<String>,
    pub submitted_content: Option<String>,
    pub grade: Option<Decimal>,
    pub feedback: Option<String>,
}

impl From<AssignmentCompletion> for CompletionInfo {
    fn from(c: AssignmentCompletion) -> Self {
        Self {
            completed_at: c.completed_at,
            status: c.status,
            submitted_content: c.submitted_content,
            grade: c.grade,
            feedback: c.feedback,
        }
    }
}

/// What a teacher sees per assignment
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
pub struct CompletionStats {
    pub total: usize,
    pub completed: usize,
}

impl CompletionStats {
    pub fn from_completions(completions: &[AssignmentCompletion]) -> Self {
        Self {
            total: completions.len(),
            completed: completions.iter().filter(|c| c.is_completed()).count(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAssignmentRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "timestamp::option::deserialize")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub points: Option<Decimal>,
    #[serde(default)]
    pub assignment_type: String,
}

/// Insert payload for `<prefix>_assignments`
#[derive(Debug, Clone, Serialize)]
pub struct NewAssignment {
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub points: Option<Decimal>,
    pub assignment_type: String,
    pub curso_id: i64,
    pub profesor_id: i64,
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
    pub status: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompleteAssignmentRequest {
    #[serde(default)]
    pub submitted_content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_assignment_rows_from_json() {
        let a: Assignment = serde_json::from_value(json!({
            "id": 1,
            "title": "Ensayo",
            "description": null,
            "due_date": "2024-05-10T23:59:00",
            "points": 20.5,
            "assignment_type": "homework",
            "curso_id": 3,
            "profesor_id": 9,
            "created_at": "2024-05-01T12:00:00+00:00",
            "is_active": true,
            "status": "active"
        }))
        .unwrap();
        assert_eq!(a.points, Some(Decimal::new(205, 1)));
        assert!(a.due_date.is_some());
    }

    #[test]
    fn create_request_accepts_form_style_due_dates() {
        let request: CreateAssignmentRequest = serde_json::from_value(json!({
            "title": "Ensayo",
            "assignment_type": "homework",
            "due_date": "2024-05-10T23:59"
        }))
        .unwrap();
        assert_eq!(
            request.due_date.map(|d| d.to_rfc3339()).as_deref(),
            Some("2024-05-10T23:59:00+00:00")
        );

        let request: CreateAssignmentRequest =
            serde_json::from_value(json!({"title": "Ensayo", "assignment_type": "homework"})).unwrap();
        assert!(request.due_date.is_none());
    }

    #[test]
    fn counts_completed_submissions() {
        let completion = |id, status: &str| AssignmentCompletion {
            id,
            assignment_id: 1,
            student_id: id,
            completed_at: None,
            status: Some(status.to_string()),
            submitted_content: None,
            grade: None,
            feedback: None,
        };
        let stats = CompletionStats::from_completions(&[
            completion(1, "completed"),
            completion(2, "pending"),
            completion(3, "completed"),
        ]);
        assert_eq!(stats, CompletionStats { total: 3, completed: 2 });
    }
}
