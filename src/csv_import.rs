//! CSV templates and row parsing for the employee and question bulk uploads.
//!
//! Files are small admin uploads, parsed fully in memory. Each data row keeps its
//! 1-based line number (the header is line 1) so failures can be reported per line.

use chrono::NaiveDate;
use validator::Validate;

use crate::{
    error::{AppError, FieldError},
    models::{CreateEmployeeRequest, CreateQuestionRequest, Difficulty, QuestionType},
};

pub const EMPLOYEE_HEADER: [&str; 7] = [
    "employee_code",
    "first_name",
    "last_name",
    "email",
    "department",
    "designation",
    "date_of_joining",
];

pub const QUESTION_HEADER: [&str; 6] = [
    "question_text",
    "question_type",
    "options",
    "correct_answer",
    "subject",
    "difficulty",
];

/// Separator for multiple-choice options inside the single `options` column.
pub const OPTION_SEPARATOR: char = '|';

/// A data row with its position in the uploaded file.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvRow {
    pub line: usize,
    pub values: Vec<String>,
}

/// The downloadable template: the header row only.
pub fn template(header: &[&str]) -> String {
    format!("{}\n", header.join(","))
}

/// parse_csv
///
/// Decodes the upload, checks the header against `expected_header` and returns the
/// non-blank data rows. An empty file, invalid UTF-8 or a header mismatch is a 400.
/// Quoted fields may span several lines; such a row reports the line it starts on.
pub fn parse_csv(data: &[u8], expected_header: &[&str]) -> Result<Vec<CsvRow>, AppError> {
    let text = std::str::from_utf8(data)
        .map_err(|_| AppError::BadRequest("CSV file must be UTF-8 encoded".to_string()))?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut records = split_records(text).into_iter();
    let (_, header_line) = records
        .next()
        .ok_or_else(|| AppError::BadRequest("CSV file is empty".to_string()))?;

    let header: Vec<String> = parse_csv_line(&header_line)
        .into_iter()
        .map(|h| h.trim().to_ascii_lowercase())
        .collect();
    if header != expected_header {
        return Err(AppError::BadRequest(format!(
            "CSV header must be: {}",
            expected_header.join(",")
        )));
    }

    Ok(records
        .filter(|(_, record)| !record.trim().is_empty())
        .map(|(line, record)| CsvRow {
            line,
            values: parse_csv_line(&record),
        })
        .collect())
}

/// Groups physical lines into records, joining lines while a quote is still open.
/// Each record carries the 1-based number of its first line. An unterminated quote
/// swallows the rest of the file into one record.
fn split_records(text: &str) -> Vec<(usize, String)> {
    let mut records = Vec::new();
    let mut open: Option<(usize, String)> = None;

    for (index, line) in text.lines().enumerate() {
        let record = match open.take() {
            Some((start, mut record)) => {
                record.push('\n');
                record.push_str(line);
                (start, record)
            }
            None => (index + 1, line.to_string()),
        };
        // `""` escapes add two quotes, so an odd count means a field is still open.
        if record.1.matches('"').count() % 2 == 1 {
            open = Some(record);
        } else {
            records.push(record);
        }
    }
    records.extend(open);
    records
}

/// Splits one CSV line. Quoted fields may contain commas; `""` inside quotes is a
/// literal quote.
pub fn parse_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        if in_quotes {
            if ch == '"' {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                current.push(ch);
            }
        } else {
            match ch {
                '"' => in_quotes = true,
                ',' => fields.push(std::mem::take(&mut current)),
                _ => current.push(ch),
            }
        }
    }
    fields.push(current);
    fields
}

fn optional(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn check_width(row: &CsvRow, expected: usize) -> Result<(), String> {
    if row.values.len() != expected {
        return Err(format!(
            "expected {expected} columns, found {}",
            row.values.len()
        ));
    }
    Ok(())
}

/// Joins field errors into the single message stored in a `RowFailure`.
pub fn describe(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(|f| format!("{}: {}", f.field, f.message))
        .collect::<Vec<_>>()
        .join("; ")
}

fn validation_message(err: validator::ValidationErrors) -> String {
    match AppError::from(err) {
        AppError::Validation(fields) => describe(&fields),
        other => other.to_string(),
    }
}

/// Converts an employee template row into a validated create request.
pub fn employee_from_row(row: &CsvRow) -> Result<CreateEmployeeRequest, String> {
    check_width(row, EMPLOYEE_HEADER.len())?;
    let v = &row.values;

    let date_of_joining = match optional(&v[6]) {
        Some(raw) => Some(
            NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                .map_err(|_| format!("date_of_joining: '{raw}' is not a YYYY-MM-DD date"))?,
        ),
        None => None,
    };

    let req = CreateEmployeeRequest {
        employee_code: v[0].trim().to_string(),
        first_name: v[1].trim().to_string(),
        last_name: v[2].trim().to_string(),
        email: v[3].trim().to_string(),
        department: optional(&v[4]),
        designation: optional(&v[5]),
        date_of_joining,
    };
    req.validate().map_err(validation_message)?;
    Ok(req)
}

/// Converts a question template row into a validated create request. A blank
/// difficulty defaults to `medium`.
pub fn question_from_row(row: &CsvRow) -> Result<CreateQuestionRequest, String> {
    check_width(row, QUESTION_HEADER.len())?;
    let v = &row.values;

    let question_type = QuestionType::parse(&v[1]).ok_or_else(|| {
        format!(
            "question_type: '{}' must be multiple_choice, true_false or short_answer",
            v[1].trim()
        )
    })?;
    let difficulty = match optional(&v[5]) {
        Some(raw) => Difficulty::parse(&raw)
            .ok_or_else(|| format!("difficulty: '{raw}' must be easy, medium or hard"))?,
        None => Difficulty::default(),
    };
    let options: Vec<String> = v[2]
        .split(OPTION_SEPARATOR)
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(String::from)
        .collect();

    let req = CreateQuestionRequest {
        question_text: v[0].trim().to_string(),
        question_type,
        options,
        correct_answer: v[3].trim().to_string(),
        subject: v[4].trim().to_string(),
        difficulty,
    };
    req.validate().map_err(validation_message)?;

    let shape = req.shape_errors();
    if !shape.is_empty() {
        return Err(describe(&shape));
    }
    Ok(req)
}
