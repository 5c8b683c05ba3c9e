use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use std::fmt;
use ts_rs::TS;
use utoipa::ToSchema;
use validator::Validate;

use crate::error::FieldError;

/// QuestionStatus
///
/// The review workflow states. Which moves between them are allowed, and for which
/// roles, lives in the `question_status_transitions` table, not here.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema, sqlx::Type,
    Default,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
#[ts(export)]
pub enum QuestionStatus {
    #[default]
    Draft,
    PendingReview,
    Approved,
    Rejected,
    NeedsRevision,
}

impl QuestionStatus {
    pub const ALL: [QuestionStatus; 5] = [
        QuestionStatus::Draft,
        QuestionStatus::PendingReview,
        QuestionStatus::Approved,
        QuestionStatus::Rejected,
        QuestionStatus::NeedsRevision,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionStatus::Draft => "draft",
            QuestionStatus::PendingReview => "pending_review",
            QuestionStatus::Approved => "approved",
            QuestionStatus::Rejected => "rejected",
            QuestionStatus::NeedsRevision => "needs_revision",
        }
    }

    /// Question content may only be edited while the author holds it.
    pub fn is_editable(&self) -> bool {
        matches!(self, QuestionStatus::Draft | QuestionStatus::NeedsRevision)
    }

    /// Targets that record who reviewed the question.
    pub fn is_review_outcome(&self) -> bool {
        matches!(
            self,
            QuestionStatus::Approved | QuestionStatus::Rejected | QuestionStatus::NeedsRevision
        )
    }
}

impl fmt::Display for QuestionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, sqlx::Type, Default,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
#[ts(export)]
pub enum QuestionType {
    #[default]
    MultipleChoice,
    TrueFalse,
    ShortAnswer,
}

impl QuestionType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "multiple_choice" => Some(QuestionType::MultipleChoice),
            "true_false" => Some(QuestionType::TrueFalse),
            "short_answer" => Some(QuestionType::ShortAnswer),
            _ => None,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, sqlx::Type, Default,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
#[ts(export)]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "easy" => Some(Difficulty::Easy),
            "medium" => Some(Difficulty::Medium),
            "hard" => Some(Difficulty::Hard),
            _ => None,
        }
    }
}

/// Question
///
/// A record from the `questions` table. `options` is stored as a JSON array in a TEXT
/// column and is empty for non multiple-choice questions.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Question {
    pub id: i64,
    pub question_text: String,
    pub question_type: QuestionType,
    #[ts(type = "Array<string>")]
    #[schema(value_type = Vec<String>)]
    pub options: Json<Vec<String>>,
    pub correct_answer: String,
    pub subject: String,
    pub difficulty: Difficulty,
    pub status: QuestionStatus,
    pub created_by: i64,
    pub reviewed_by: Option<i64>,
    #[ts(type = "string | null")]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// CreateQuestionRequest
///
/// New questions always start in `draft`, authored by the caller.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 5000, message = "question_text is required"))]
    pub question_text: String,
    pub question_type: QuestionType,
    #[serde(default)]
    pub options: Vec<String>,
    #[validate(length(min = 1, max = 1000, message = "correct_answer is required"))]
    pub correct_answer: String,
    #[validate(length(min = 1, max = 100, message = "subject is required"))]
    pub subject: String,
    pub difficulty: Difficulty,
}

impl CreateQuestionRequest {
    /// Cross-field checks the derive cannot express.
    pub fn shape_errors(&self) -> Vec<FieldError> {
        shape_errors(self.question_type, &self.options, &self.correct_answer)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct UpdateQuestionRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 5000, message = "question_text must not be empty"))]
    pub question_text: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_type: Option<QuestionType>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 1000, message = "correct_answer must not be empty"))]
    pub correct_answer: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 100, message = "subject must not be empty"))]
    pub subject: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
}

impl UpdateQuestionRequest {
    /// Applies the partial update onto `current` so the merged result can be re-checked.
    pub fn merged_with(&self, current: &Question) -> Question {
        let mut merged = current.clone();
        if let Some(text) = &self.question_text {
            merged.question_text = text.clone();
        }
        if let Some(kind) = self.question_type {
            merged.question_type = kind;
        }
        if let Some(options) = &self.options {
            merged.options = Json(options.clone());
        }
        if let Some(answer) = &self.correct_answer {
            merged.correct_answer = answer.clone();
        }
        if let Some(subject) = &self.subject {
            merged.subject = subject.clone();
        }
        if let Some(difficulty) = self.difficulty {
            merged.difficulty = difficulty;
        }
        merged
    }
}

/// Validates that the options and answer make sense for the question type.
pub fn shape_errors(kind: QuestionType, options: &[String], answer: &str) -> Vec<FieldError> {
    let mut errors = Vec::new();
    match kind {
        QuestionType::MultipleChoice => {
            if options.len() < 2 {
                errors.push(FieldError::new(
                    "options",
                    "multiple_choice questions need at least 2 options",
                ));
            }
            if options.iter().any(|o| o.trim().is_empty()) {
                errors.push(FieldError::new("options", "options must not be empty"));
            }
            if !options.iter().any(|o| o == answer) {
                errors.push(FieldError::new(
                    "correct_answer",
                    "correct_answer must be one of the options",
                ));
            }
        }
        QuestionType::TrueFalse => {
            if answer != "true" && answer != "false" {
                errors.push(FieldError::new(
                    "correct_answer",
                    "correct_answer must be 'true' or 'false'",
                ));
            }
        }
        QuestionType::ShortAnswer => {}
    }
    errors
}

/// QuestionStatusInfo
///
/// A row of the `question_statuses` lookup table.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct QuestionStatusInfo {
    pub name: QuestionStatus,
    pub description: String,
}

/// StatusChangeRequest
///
/// Body of `PATCH /questions/{id}/status`. The optional comment is stored as a review
/// comment on the question.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate)]
#[ts(export)]
pub struct StatusChangeRequest {
    pub status: QuestionStatus,
    #[validate(length(min = 1, max = 2000, message = "comment must be 1-2000 characters"))]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct QuestionComment {
    pub id: i64,
    pub question_id: i64,
    pub user_id: i64,
    pub comment: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    // Loaded via a JOIN on users.
    #[sqlx(default)]
    pub author_username: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct CreateCommentRequest {
    #[validate(length(min = 1, max = 2000, message = "comment must be 1-2000 characters"))]
    pub comment: String,
}

/// StatusHistoryEntry
///
/// One accepted transition, from `question_status_history`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct StatusHistoryEntry {
    pub id: i64,
    pub question_id: i64,
    pub from_status: QuestionStatus,
    pub to_status: QuestionStatus,
    pub changed_by: i64,
    #[ts(type = "string")]
    pub changed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiple_choice_answer_must_be_an_option() {
        let options = vec!["3".to_string(), "4".to_string()];
        assert!(shape_errors(QuestionType::MultipleChoice, &options, "4").is_empty());

        let errors = shape_errors(QuestionType::MultipleChoice, &options, "5");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "correct_answer");
    }

    #[test]
    fn multiple_choice_needs_two_options() {
        let errors = shape_errors(QuestionType::MultipleChoice, &["only".to_string()], "only");
        assert!(errors.iter().any(|e| e.field == "options"));
    }

    #[test]
    fn true_false_answer_is_restricted() {
        assert!(shape_errors(QuestionType::TrueFalse, &[], "true").is_empty());
        assert_eq!(shape_errors(QuestionType::TrueFalse, &[], "yes").len(), 1);
    }

    #[test]
    fn status_serializes_as_snake_case() {
        let json = serde_json::to_string(&QuestionStatus::PendingReview).unwrap();
        assert_eq!(json, r#""pending_review""#);
        assert_eq!(QuestionStatus::NeedsRevision.to_string(), "needs_revision");
    }

    #[test]
    fn only_draft_and_needs_revision_are_editable() {
        let editable: Vec<_> = QuestionStatus::ALL
            .iter()
            .filter(|s| s.is_editable())
            .collect();
        assert_eq!(
            editable,
            vec![&QuestionStatus::Draft, &QuestionStatus::NeedsRevision]
        );
    }
}
